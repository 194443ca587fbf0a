pub mod interface;
pub mod stage;
pub mod client;
pub mod routes;

pub use interface::LanguageDetector;
pub use stage::DetectionStage;
pub use client::DetectionHttpClient;
