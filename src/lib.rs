pub mod constants;
pub mod error;
pub mod extract;
pub mod logging;
pub mod pipeline;
pub mod query;
pub mod server;
pub mod storage;
pub mod types;
