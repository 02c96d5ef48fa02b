// src/config.rs
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub google_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub default_provider: String,
    pub gemini_model: String,
    pub openai_model: String,
    pub model_timeout: Duration,
    pub max_image_edge: u32,
    pub max_upload_bytes: usize,
    pub publish_delay: Duration,
    pub test_asset_path: PathBuf,
}

impl Config {
    pub fn load() -> Self {
        Self {
            bind_addr: env::var("ADLENS_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            google_api_key: non_empty_var("GOOGLE_API_KEY").or_else(|| non_empty_var("GEMINI_API_KEY")),
            openai_api_key: non_empty_var("OPENAI_API_KEY"),
            default_provider: env::var("ADLENS_PROVIDER")
                .unwrap_or_else(|_| "googleai".to_string()),
            gemini_model: env::var("ADLENS_GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-2.0-flash".to_string()),
            openai_model: env::var("ADLENS_OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
            model_timeout: Duration::from_secs(parse_var("ADLENS_MODEL_TIMEOUT_SECS", 120)),
            max_image_edge: parse_var("ADLENS_MAX_IMAGE_EDGE", 2048),
            max_upload_bytes: parse_var("ADLENS_MAX_UPLOAD_BYTES", 50 * 1024 * 1024),
            publish_delay: Duration::from_millis(parse_var("ADLENS_PUBLISH_DELAY_MS", 2500)),
            test_asset_path: env::var("ADLENS_TEST_ASSET")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("public/test-asset.png")),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
