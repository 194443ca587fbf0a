pub mod interface;
pub mod client;

pub use interface::TextIntelligence;
pub use client::OpenAiClient;
