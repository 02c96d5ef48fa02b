// src/services/mod.rs
pub mod analyzer;
pub mod asset_store;
pub mod busy;
pub mod features;
pub mod media;
pub mod publisher;
pub mod review;

pub use analyzer::{AnalysisService, GeminiProvider, OpenAiProvider};
pub use asset_store::AssetStore;
pub use busy::BusyFlag;
pub use media::MediaProcessor;
pub use publisher::Publisher;
