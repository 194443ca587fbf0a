pub mod worker;
pub mod routes;

pub use worker::TranslationWorker;
