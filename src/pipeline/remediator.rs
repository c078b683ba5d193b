// Phase 7: メタデータ・タグ付けフラグ・構造ツリーを書き込んで新しいPDFを出力する

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::pdf::MetadataRecord;
use crate::pdf::struct_tree::StructElement;
use crate::pdf::writer::PdfEditor;
use crate::pipeline::ImageAltText;

pub const DEFAULT_PRODUCER: &str = concat!("pdf_a11y ", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_CREATOR: &str = "pdf_a11y";
pub const ACCESSIBILITY_KEYWORDS: [&str; 4] = ["accessible", "WCAG", "remediated", "alt-text"];

/// Result of one remediation pass.
#[derive(Debug, Clone)]
pub struct RemediationOutput {
    pub bytes: Vec<u8>,
    /// Number of Figure elements in the attached structure tree.
    pub figures_tagged: usize,
    /// `false` when the structure tree step failed and was skipped.
    pub structure_tree_attached: bool,
    /// Info dictionary fields written from the supplied metadata.
    pub metadata_written: Vec<String>,
}

/// Applies the accessibility fixes to a PDF.
#[derive(Debug, Clone)]
pub struct Remediator {
    producer: String,
    creator: String,
    keywords: Vec<String>,
    clock: Option<DateTime<Utc>>,
}

impl Default for Remediator {
    fn default() -> Self {
        Self {
            producer: DEFAULT_PRODUCER.to_string(),
            creator: DEFAULT_CREATOR.to_string(),
            keywords: ACCESSIBILITY_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            clock: None,
        }
    }
}

impl Remediator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a fixed timestamp for CreationDate/ModDate instead of the current time.
    pub fn with_fixed_clock(mut self, at: DateTime<Utc>) -> Self {
        self.clock = Some(at);
        self
    }

    pub fn with_producer(mut self, producer: impl Into<String>, creator: impl Into<String>) -> Self {
        self.producer = producer.into();
        self.creator = creator.into();
        self
    }

    /// Remediate a PDF byte stream.
    ///
    /// Only opening the source and serializing the result are hard errors.
    /// Every other step is best-effort: a failure is logged and the remaining
    /// steps still run. In particular a failed structure tree leaves an
    /// untagged but metadata-enriched document.
    pub fn remediate(
        &self,
        bytes: &[u8],
        alt_texts: &[ImageAltText],
        metadata: Option<&MetadataRecord>,
    ) -> crate::error::Result<RemediationOutput> {
        let mut editor = PdfEditor::from_bytes(bytes)?;

        let metadata_written = match metadata {
            Some(meta) => match editor.write_metadata(meta) {
                Ok(fields) => fields.into_iter().map(String::from).collect(),
                Err(e) => {
                    warn!(error = %e, "failed to write document metadata");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let now = self.clock.unwrap_or_else(Utc::now);
        let keywords: Vec<&str> = self.keywords.iter().map(String::as_str).collect();
        if let Err(e) = editor.stamp_producer(&self.producer, &self.creator, &keywords, now) {
            warn!(error = %e, "failed to stamp producer information");
        }

        if let Err(e) = editor.mark_tagged() {
            warn!(error = %e, "failed to set MarkInfo");
        }

        let tree = StructElement::document_with_figures(alt_texts.iter().map(|a| a.alt_text.as_str()));
        let (figures_tagged, structure_tree_attached) = match editor.attach_structure_tree(&tree) {
            Ok(count) => {
                debug!(figures = count, "structure tree attached");
                (count, true)
            }
            Err(e) => {
                warn!(error = %e, "structure tree not attached, continuing without tags");
                (0, false)
            }
        };

        if let Err(e) = editor.set_display_doc_title() {
            warn!(error = %e, "failed to set ViewerPreferences");
        }

        if let Some(language) = metadata
            .and_then(|m| m.language.as_deref())
            .filter(|l| !l.is_empty())
            && let Err(e) = editor.set_catalog_language(language)
        {
            warn!(error = %e, "failed to set catalog language");
        }

        let bytes = editor.save_to_bytes()?;
        info!(
            figures = figures_tagged,
            tagged = structure_tree_attached,
            size = bytes.len(),
            "remediation finished"
        );

        Ok(RemediationOutput {
            bytes,
            figures_tagged,
            structure_tree_attached,
            metadata_written,
        })
    }
}
