// src/errors.rs
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdlensError {
    /// The hosted model could not be reached or did not produce an answer.
    #[error("Model call failed: {0}")]
    ModelCall(String),

    /// The model answered, but the answer does not fit the analysis schema.
    #[error("Schema validation failed: {0}")]
    SchemaValidation(String),

    #[error("Invalid provider: {0}")]
    InvalidProvider(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("An analysis is already in progress")]
    AnalysisInProgress,

    #[error("A publish is already in progress")]
    PublishInProgress,

    #[error("Media processing error: {0}")]
    MediaProcessing(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AdlensError {
    /// Short label placed in the `error` field of the JSON body.
    pub fn kind(&self) -> &'static str {
        match self {
            AdlensError::ModelCall(_) => "AI service error",
            AdlensError::SchemaValidation(_) => "AI output invalid",
            AdlensError::InvalidProvider(_) => "Invalid provider",
            AdlensError::Validation(_) => "Validation error",
            AdlensError::AssetNotFound(_) => "Asset not found",
            AdlensError::AnalysisInProgress => "Analysis in progress",
            AdlensError::PublishInProgress => "Publish in progress",
            AdlensError::MediaProcessing(_) => "Media processing error",
            AdlensError::Io(_) => "I/O error",
            AdlensError::Serialization(_) => "Data processing error",
        }
    }
}

impl ResponseError for AdlensError {
    fn status_code(&self) -> StatusCode {
        match self {
            AdlensError::ModelCall(_) => StatusCode::SERVICE_UNAVAILABLE,
            AdlensError::SchemaValidation(_) => StatusCode::BAD_GATEWAY,
            AdlensError::InvalidProvider(_)
            | AdlensError::Validation(_)
            | AdlensError::MediaProcessing(_) => StatusCode::BAD_REQUEST,
            AdlensError::AssetNotFound(_) => StatusCode::NOT_FOUND,
            AdlensError::AnalysisInProgress | AdlensError::PublishInProgress => {
                StatusCode::CONFLICT
            }
            AdlensError::Io(_) | AdlensError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.kind(),
            "message": self.to_string()
        }))
    }
}

impl From<serde_json::Error> for AdlensError {
    fn from(err: serde_json::Error) -> Self {
        AdlensError::Serialization(err.to_string())
    }
}
