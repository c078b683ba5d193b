// ドキュメント単位の処理フロー（登録 → 抽出 → 代替テキスト生成 → リメディエーション）

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::codec::data_url::base64_payload;
use crate::config::settings::Settings;
use crate::error::A11yError;
use crate::pdf::MetadataRecord;
use crate::pdf::reader::PdfReader;
use crate::pipeline::extractor::extract_images_from;
use crate::pipeline::remediator::Remediator;
use crate::pipeline::report::{AccessibilityReport, build_report};
use crate::pipeline::{ImageAltText, ImageRecord};
use crate::store::id::new_token;
use crate::store::locks::KeyedLocks;
use crate::store::registry::{
    DocumentRecord, DocumentRegistry, InMemoryRegistry, ProcessingStatus, set_status,
};
use crate::store::storage::{DocumentStorage, FsDocumentStorage};
use crate::vision::{ImageDescriber, VisionStatus, describe_cleaned, vision_status};

/// Images and existing metadata of a freshly processed document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedDocument {
    pub images: Vec<ImageRecord>,
    pub metadata: MetadataRecord,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemediationResult {
    pub document_id: String,
    pub report: AccessibilityReport,
}

/// Per-document outcome of a batch remediation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<AccessibilityReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Remediated file ready for download.
#[derive(Debug, Clone)]
pub struct RemediatedFile {
    /// Original upload name with `_accessible.pdf` in place of `.pdf`.
    pub download_name: String,
    pub bytes: Vec<u8>,
}

/// Document workflow over injected storage, registry and vision backend.
///
/// Extraction and remediation of one document id are serialized; different
/// ids run independently.
pub struct AccessibilityService<S, R> {
    storage: S,
    registry: R,
    describer: Arc<dyn ImageDescriber>,
    remediator: Remediator,
    locks: KeyedLocks,
}

impl AccessibilityService<FsDocumentStorage, InMemoryRegistry> {
    /// Filesystem storage under `storage_dir` (relative paths resolve against
    /// `base_dir`), an in-memory registry and the configured vision backend.
    pub fn from_settings(settings: &Settings, base_dir: &Path) -> crate::error::Result<Self> {
        let describer = crate::vision::from_settings(&settings.vision)?;
        let storage = FsDocumentStorage::new(base_dir.join(&settings.storage_dir));
        info!(
            storage = %storage.root().display(),
            vision = describer.name(),
            "accessibility service configured"
        );
        Ok(Self::new(storage, InMemoryRegistry::new(), describer))
    }
}

impl<S: DocumentStorage, R: DocumentRegistry> AccessibilityService<S, R> {
    pub fn new(storage: S, registry: R, describer: Arc<dyn ImageDescriber>) -> Self {
        Self {
            storage,
            registry,
            describer,
            remediator: Remediator::new(),
            locks: KeyedLocks::new(),
        }
    }

    pub fn with_remediator(mut self, remediator: Remediator) -> Self {
        self.remediator = remediator;
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Whether the injected vision backend is reachable and usable.
    pub fn vision_status(&self) -> VisionStatus {
        vision_status(&*self.describer)
    }

    fn require(&self, id: &str) -> crate::error::Result<DocumentRecord> {
        self.registry
            .get(id)
            .ok_or_else(|| A11yError::not_found(format!("document {id}")))
    }

    /// Mark the record failed and hand the error back.
    fn fail(&self, id: &str, error: A11yError) -> A11yError {
        let message = error.to_string();
        if let Err(e) = self.registry.update(id, &mut |record| {
            record.status = ProcessingStatus::Error;
            record.error = Some(message.clone());
        }) {
            warn!(document = id, error = %e, "failed to record error status");
        }
        error
    }

    /// Store a new upload and register it. The bytes must parse as a PDF.
    pub fn register_upload(
        &self,
        original_name: &str,
        bytes: &[u8],
    ) -> crate::error::Result<DocumentRecord> {
        let reader = PdfReader::from_bytes(bytes)?;
        let id = new_token();
        self.storage.write_upload(&id, bytes)?;

        let record = DocumentRecord {
            id: id.clone(),
            filename: format!("{id}.pdf"),
            original_name: original_name.to_string(),
            uploaded_at: Utc::now(),
            status: ProcessingStatus::Uploaded,
            page_count: reader.page_count(),
            file_size: bytes.len() as u64,
            images: Vec::new(),
            metadata: reader.read_metadata(),
            error: None,
        };
        self.registry.insert(record.clone())?;
        info!(document = %id, name = original_name, pages = record.page_count, "upload registered");
        Ok(record)
    }

    /// Images of a document, extracting them on first access.
    pub fn images(&self, id: &str) -> crate::error::Result<Vec<ImageRecord>> {
        let record = self.require(id)?;
        if !record.images.is_empty() {
            return Ok(record.images);
        }
        Ok(self.process_document(id)?.images)
    }

    /// Extract images and read existing metadata (`extracting` → `uploaded`).
    pub fn process_document(&self, id: &str) -> crate::error::Result<ProcessedDocument> {
        self.locks.with_lock(id, || {
            self.require(id)?;
            set_status(&self.registry, id, ProcessingStatus::Extracting)?;
            self.extract_locked(id).map_err(|e| self.fail(id, e))
        })
    }

    fn extract_locked(&self, id: &str) -> crate::error::Result<ProcessedDocument> {
        let bytes = self.storage.read_upload(id)?;
        let reader = PdfReader::from_bytes(&bytes)?;
        let images = extract_images_from(&reader);
        let metadata = reader.read_metadata();

        let stored = images.clone();
        self.registry.update(id, &mut |record| {
            record.images = stored.clone();
            record.status = ProcessingStatus::Uploaded;
        })?;
        Ok(ProcessedDocument { images, metadata })
    }

    /// Describe every image without generated alt-text
    /// (`generating-alt-text` → `uploaded`).
    ///
    /// Vision failures are absorbed: affected images carry the sentinel text.
    pub fn generate_alt_texts(
        &self,
        id: &str,
        context: Option<&str>,
    ) -> crate::error::Result<Vec<ImageRecord>> {
        self.locks.with_lock(id, || {
            let record = self.require(id)?;
            let mut images = if record.images.is_empty() {
                set_status(&self.registry, id, ProcessingStatus::Extracting)?;
                self.extract_locked(id).map_err(|e| self.fail(id, e))?.images
            } else {
                record.images
            };

            set_status(&self.registry, id, ProcessingStatus::GeneratingAltText)?;
            let generated = crate::vision::generate_alt_texts(&*self.describer, &mut images, context);
            info!(document = id, generated, total = images.len(), "alt-text generation finished");

            let stored = images.clone();
            self.registry.update(id, &mut |record| {
                record.images = stored.clone();
                record.status = ProcessingStatus::Uploaded;
            })?;
            Ok(images)
        })
    }

    /// Describe a single image given as a data URL or bare base64.
    pub fn describe_image(&self, data: &str, context: Option<&str>) -> crate::error::Result<String> {
        describe_cleaned(&*self.describer, base64_payload(data), context).map_err(A11yError::from)
    }

    /// Remediate the stored upload and write the output
    /// (`remediating` → `completed`, or `error` on a fatal failure).
    pub fn remediate(
        &self,
        id: &str,
        alt_texts: &[ImageAltText],
        metadata: Option<&MetadataRecord>,
    ) -> crate::error::Result<RemediationResult> {
        self.locks.with_lock(id, || {
            self.require(id)?;
            set_status(&self.registry, id, ProcessingStatus::Remediating)?;
            self.remediate_locked(id, alt_texts, metadata)
                .map_err(|e| self.fail(id, e))
        })
    }

    fn remediate_locked(
        &self,
        id: &str,
        alt_texts: &[ImageAltText],
        metadata: Option<&MetadataRecord>,
    ) -> crate::error::Result<RemediationResult> {
        let bytes = self.storage.read_upload(id)?;
        let output = self.remediator.remediate(&bytes, alt_texts, metadata)?;
        self.storage.write_output(id, &output.bytes)?;

        let report = build_report(id, alt_texts, metadata, output.structure_tree_attached);
        self.registry.update(id, &mut |record| {
            record.status = ProcessingStatus::Completed;
            if let Some(meta) = metadata {
                record.metadata = meta.clone();
            }
            for image in record.images.iter_mut() {
                if let Some(alt) = alt_texts.iter().find(|a| a.id == image.id) {
                    image.alt_text = Some(alt.alt_text.clone());
                }
            }
        })?;
        info!(document = id, level = report.wcag_level.as_str(), "document remediated");
        Ok(RemediationResult {
            document_id: id.to_string(),
            report,
        })
    }

    /// Remediate several documents in parallel using each document's stored
    /// image alt-texts. One failure never stops the others.
    pub fn remediate_batch(
        &self,
        ids: &[String],
        metadata: Option<&MetadataRecord>,
    ) -> Vec<BatchOutcome> {
        ids.par_iter()
            .map(|id| {
                let result = self.require(id).and_then(|record| {
                    let alt_texts: Vec<ImageAltText> =
                        record.images.iter().map(ImageAltText::from).collect();
                    self.remediate(id, &alt_texts, metadata)
                });
                match result {
                    Ok(done) => BatchOutcome {
                        id: id.clone(),
                        success: true,
                        report: Some(done.report),
                        error: None,
                    },
                    Err(e) => {
                        warn!(document = %id, error = %e, "batch remediation failed");
                        BatchOutcome {
                            id: id.clone(),
                            success: false,
                            report: None,
                            error: Some(e.to_string()),
                        }
                    }
                }
            })
            .collect()
    }

    /// The remediated output of a document.
    pub fn remediated_output(&self, id: &str) -> crate::error::Result<RemediatedFile> {
        let record = self.require(id)?;
        if !self.storage.has_output(id) {
            return Err(A11yError::not_found(format!("remediated output of {id}")));
        }
        let download_name = match record.original_name.strip_suffix(".pdf") {
            Some(stem) => format!("{stem}_accessible.pdf"),
            None => format!("{}_accessible.pdf", record.original_name),
        };
        Ok(RemediatedFile {
            download_name,
            bytes: self.storage.read_output(id)?,
        })
    }
}
