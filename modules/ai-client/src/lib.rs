pub mod claude;
pub mod schema;

pub use claude::Claude;
pub use schema::StructuredOutput;
