pub mod config;
pub mod error;
pub mod similarity;
pub mod types;

pub use config::{Config, TrackerConfig};
pub use error::TrackerError;
pub use types::*;
