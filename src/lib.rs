pub mod config;
pub mod errors;
pub mod models;
pub mod languages;
pub mod retry;
pub mod shutdown;
pub mod broker;
pub mod text_intelligence;
pub mod detection;
pub mod translation;
pub mod gateway;
pub mod server;

pub use config::Config;
pub use errors::{PipelineError, Result};
