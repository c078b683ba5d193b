//! Image description backends.
//!
//! The describer is picked once from [`VisionSettings`] and passed to the
//! pipeline as a trait object. A failed description never aborts a batch; the
//! image receives [`DESCRIPTION_UNAVAILABLE`] instead.

pub mod command;
pub mod retry;

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::codec::data_url::base64_payload;
use crate::config::settings::{VisionProvider, VisionSettings};
use crate::error::A11yError;
use crate::pipeline::ImageRecord;

/// Alt-text substituted for images whose description could not be produced.
pub const DESCRIPTION_UNAVAILABLE: &str = "Image description unavailable";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescribeError {
    #[error("vision service rate limited: {0}")]
    RateLimited(String),

    #[error("vision service timed out after {0:?}")]
    Timeout(Duration),

    #[error("vision service unavailable: {0}")]
    Unavailable(String),

    #[error("invalid vision response: {0}")]
    InvalidResponse(String),
}

/// Turns an image into a short descriptive sentence.
pub trait ImageDescriber: Send + Sync {
    /// `image_base64` is the bare base64 payload (no `data:` prefix).
    fn describe(&self, image_base64: &str, context: Option<&str>) -> Result<String, DescribeError>;

    fn name(&self) -> &str;

    /// Whether the backend can be reached at all.
    fn check_connection(&self) -> Result<(), DescribeError>;

    /// Whether the backend can produce descriptions once reached.
    fn check_model(&self) -> Result<(), DescribeError> {
        self.check_connection()
    }
}

/// Availability of the configured vision backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionStatus {
    pub provider: String,
    pub connected: bool,
    pub model_available: bool,
}

/// Check a backend. The model check only runs once the connection succeeds.
pub fn vision_status(describer: &dyn ImageDescriber) -> VisionStatus {
    let connected = match describer.check_connection() {
        Ok(()) => true,
        Err(e) => {
            debug!(backend = describer.name(), error = %e, "vision backend not reachable");
            false
        }
    };
    let model_available = connected
        && match describer.check_model() {
            Ok(()) => true,
            Err(e) => {
                debug!(backend = describer.name(), error = %e, "vision model not available");
                false
            }
        };
    VisionStatus {
        provider: describer.name().to_string(),
        connected,
        model_available,
    }
}

/// Backend used when no vision service is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledDescriber;

impl ImageDescriber for DisabledDescriber {
    fn describe(&self, _image_base64: &str, _context: Option<&str>) -> Result<String, DescribeError> {
        Err(DescribeError::Unavailable(
            "no vision provider configured".to_string(),
        ))
    }

    fn name(&self) -> &str {
        "disabled"
    }

    fn check_connection(&self) -> Result<(), DescribeError> {
        Err(DescribeError::Unavailable(
            "no vision provider configured".to_string(),
        ))
    }
}

/// Build the configured describer, wrapped in the rate-limit retry layer.
pub fn from_settings(settings: &VisionSettings) -> crate::error::Result<Arc<dyn ImageDescriber>> {
    match settings.provider {
        VisionProvider::Disabled => Ok(Arc::new(DisabledDescriber)),
        VisionProvider::Command => {
            let describer = command::CommandDescriber::from_argv(
                &settings.command,
                Duration::from_secs(settings.timeout_secs),
            )
            .ok_or_else(|| A11yError::config("vision.command must name a program"))?;
            Ok(Arc::new(retry::RetryingDescriber::new(
                describer,
                settings.max_retries,
                Duration::from_millis(settings.retry_backoff_ms),
            )))
        }
    }
}

pub fn build_prompt(context: Option<&str>) -> String {
    match context.map(str::trim).filter(|c| !c.is_empty()) {
        Some(context) => format!(
            "Describe this image for a visually impaired user. Context: {}. \
             Provide a concise but descriptive alt-text (1-2 sentences) that captures \
             the essential visual information.",
            context
        ),
        None => "Describe this image for a visually impaired user. Provide a concise but \
                 descriptive alt-text (1-2 sentences) that captures the essential visual \
                 information. Focus on the key elements, their arrangement, and any text \
                 visible in the image."
            .to_string(),
    }
}

static FILLER_PREFIXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^(this image shows|the image shows|this is an image of|this depicts|the picture shows)\s*",
        r"(?i)^(here is|here's)\s*(a|an|the)?\s*(description|alt-text|alt text):\s*",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Normalize a model response into alt-text.
///
/// Strips filler openings such as "This image shows", capitalizes the first
/// letter and ensures terminal punctuation.
pub fn clean_alt_text(text: &str) -> String {
    let mut cleaned = text.trim().to_string();
    for prefix in FILLER_PREFIXES.iter() {
        cleaned = prefix.replace(&cleaned, "").into_owned();
    }
    let cleaned = cleaned.trim();

    let mut chars = cleaned.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let mut out: String = first.to_uppercase().chain(chars).collect();
    if !out.ends_with(['.', '!', '?']) {
        out.push('.');
    }
    out
}

/// Describe one image and clean the response. An empty result is an error.
pub fn describe_cleaned(
    describer: &dyn ImageDescriber,
    image_base64: &str,
    context: Option<&str>,
) -> Result<String, DescribeError> {
    let raw = describer.describe(image_base64, context)?;
    let cleaned = clean_alt_text(&raw);
    if cleaned.is_empty() {
        return Err(DescribeError::InvalidResponse(
            "empty description".to_string(),
        ));
    }
    Ok(cleaned)
}

/// Generate alt-text for every image that has inline data and no generated
/// alt-text yet. Returns the number of descriptions produced.
///
/// A failed image gets [`DESCRIPTION_UNAVAILABLE`] with
/// `alt_text_generated = false`; the remaining images are still processed.
pub fn generate_alt_texts(
    describer: &dyn ImageDescriber,
    images: &mut [ImageRecord],
    context: Option<&str>,
) -> usize {
    let mut generated = 0;
    for image in images.iter_mut() {
        if image.alt_text_generated {
            continue;
        }
        let Some(url) = image.data_url.as_deref() else {
            debug!(image = %image.id, format = ?image.format, "no inline data to describe");
            continue;
        };

        match describe_cleaned(describer, base64_payload(url), context) {
            Ok(alt_text) => {
                image.alt_text = Some(alt_text);
                image.alt_text_generated = true;
                generated += 1;
            }
            Err(e) => {
                warn!(
                    image = %image.id,
                    backend = describer.name(),
                    error = %e,
                    "alt-text generation failed"
                );
                image.alt_text = Some(DESCRIPTION_UNAVAILABLE.to_string());
                image.alt_text_generated = false;
            }
        }
    }
    generated
}
