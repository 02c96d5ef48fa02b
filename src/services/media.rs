// src/services/media.rs
use crate::errors::AdlensError;
use crate::models::MediaFormat;
use base64::{Engine as _, engine::general_purpose};
use image::{GenericImageView, ImageFormat as ImgFormat};
use std::fmt;
use std::path::Path;

/// A self-describing media payload: `data:<mime>;base64,<payload>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    mime: String,
    payload: String,
}

impl DataUri {
    pub fn encode(mime: &str, data: &[u8]) -> Self {
        Self {
            mime: mime.to_string(),
            payload: general_purpose::STANDARD.encode(data),
        }
    }

    pub fn parse(uri: &str) -> Result<Self, AdlensError> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| AdlensError::Validation("media must be a data URI".to_string()))?;
        let (header, payload) = rest.split_once(',').ok_or_else(|| {
            AdlensError::Validation("data URI is missing its payload".to_string())
        })?;
        let mime = header.strip_suffix(";base64").ok_or_else(|| {
            AdlensError::Validation("data URI must use base64 encoding".to_string())
        })?;
        if mime.is_empty() {
            return Err(AdlensError::Validation(
                "data URI must include a MIME type".to_string(),
            ));
        }
        general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| AdlensError::Validation(format!("invalid base64 payload: {}", e)))?;

        Ok(Self {
            mime: mime.to_string(),
            payload: payload.to_string(),
        })
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    /// Base64 payload without the header.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn format(&self) -> MediaFormat {
        MediaFormat::from_mime(&self.mime)
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime, self.payload)
    }
}

/// MIME type guessed from a file extension, used for files read from disk.
pub fn mime_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "image/png",
    }
}

pub struct MediaProcessor {
    max_edge: u32,
}

impl MediaProcessor {
    pub fn new(max_edge: u32) -> Self {
        Self { max_edge }
    }

    /// Normalizes an upload before it is inlined into the model request.
    /// Oversized raster images are downscaled to PNG; everything else passes
    /// through untouched, including images the decoder does not understand.
    pub fn prepare(&self, data: &[u8], mime: &str) -> Result<(Vec<u8>, String), AdlensError> {
        if data.is_empty() {
            return Err(AdlensError::Validation("uploaded file is empty".to_string()));
        }
        if MediaFormat::from_mime(mime) != MediaFormat::Image {
            return Ok((data.to_vec(), mime.to_string()));
        }
        match self.resize_if_needed(data)? {
            Some(resized) => Ok((resized, "image/png".to_string())),
            None => Ok((data.to_vec(), mime.to_string())),
        }
    }

    fn resize_if_needed(&self, data: &[u8]) -> Result<Option<Vec<u8>>, AdlensError> {
        let img = match image::load_from_memory(data) {
            Ok(img) => img,
            Err(e) => {
                log::debug!("Skipping resize of undecodable image: {}", e);
                return Ok(None);
            }
        };

        let (width, height) = img.dimensions();
        if width <= self.max_edge && height <= self.max_edge {
            return Ok(None);
        }

        let ratio = (self.max_edge as f32 / width.max(height) as f32).min(1.0);
        let new_width = ((width as f32 * ratio) as u32).max(1);
        let new_height = ((height as f32 * ratio) as u32).max(1);
        log::info!(
            "Downscaling image from {}x{} to {}x{}",
            width,
            height,
            new_width,
            new_height
        );

        let resized = img.resize(new_width, new_height, image::imageops::FilterType::Lanczos3);

        let mut output = Vec::new();
        resized
            .write_to(&mut std::io::Cursor::new(&mut output), ImgFormat::Png)
            .map_err(|e| {
                AdlensError::MediaProcessing(format!("Failed to encode resized image: {}", e))
            })?;

        Ok(Some(output))
    }
}
