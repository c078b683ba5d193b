pub mod extractor;
pub mod job_runner;
pub mod orchestrator;
pub mod remediator;
pub mod report;

use serde::{Deserialize, Serialize};

use crate::pdf::image_xobject::ImageFormat;

/// One embedded image found during extraction.
///
/// `(page_number, index)` is unique within a document. `id` is regenerated on
/// every extraction pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub id: String,
    /// 1-based
    pub page_number: u32,
    /// 0-based, in XObject dictionary order (not reading order)
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
    #[serde(default)]
    pub alt_text_generated: bool,
}

/// Alt-text supplied for one image at remediation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAltText {
    pub id: String,
    pub alt_text: String,
}

impl ImageAltText {
    pub fn new(id: impl Into<String>, alt_text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            alt_text: alt_text.into(),
        }
    }
}

impl From<&ImageRecord> for ImageAltText {
    fn from(record: &ImageRecord) -> Self {
        Self {
            id: record.id.clone(),
            alt_text: record.alt_text.clone().unwrap_or_default(),
        }
    }
}
