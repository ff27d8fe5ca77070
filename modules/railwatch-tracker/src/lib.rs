pub mod dedup;
pub mod extractor;
pub mod filter;
pub mod fra;
pub mod merger;
pub mod notify;
pub mod pipeline;
pub mod stats;
pub mod store;
pub mod suppliers;
pub mod traits;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;
