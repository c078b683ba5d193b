// Phase 9: ジョブ単位: PDF読込 -> 画像抽出 -> 代替テキスト補完 -> リメディエーション -> 出力

use std::path::PathBuf;

use tracing::info;

use crate::config::merged::MergedConfig;
use crate::pdf::reader::PdfReader;
use crate::pipeline::extractor::extract_images_from;
use crate::pipeline::remediator::Remediator;
use crate::pipeline::report::{AccessibilityReport, build_report};
use crate::pipeline::{ImageAltText, ImageRecord};
use crate::store::storage::write_atomic;
use crate::vision::{ImageDescriber, generate_alt_texts};

/// Result of processing a single job.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub images_found: usize,
    pub report: AccessibilityReport,
}

/// Apply job-supplied alt-texts by image order. Empty entries are ignored.
fn apply_job_alt_texts(images: &mut [ImageRecord], alt_texts: &[String]) {
    for (image, alt) in images.iter_mut().zip(alt_texts) {
        if !alt.is_empty() {
            image.alt_text = Some(alt.clone());
        }
    }
}

/// Describe the images the job left without alt-text.
fn fill_missing_alt_texts(images: &mut [ImageRecord], describer: &dyn ImageDescriber) {
    let mut pending: Vec<ImageRecord> = images
        .iter()
        .filter(|image| image.alt_text.is_none())
        .cloned()
        .collect();
    if pending.is_empty() {
        return;
    }
    generate_alt_texts(describer, &mut pending, None);
    for described in pending {
        if let Some(image) = images.iter_mut().find(|image| image.id == described.id) {
            *image = described;
        }
    }
}

/// Run a single remediation job.
///
/// Phase A: read and parse the input
/// Phase B: extract images, fill alt-texts from the job or the vision backend
/// Phase C: remediate and write the output
pub fn run_job(
    config: &MergedConfig,
    describer: &dyn ImageDescriber,
    remediator: &Remediator,
) -> crate::error::Result<JobResult> {
    // --- Phase A ---
    let bytes = std::fs::read(&config.input)?;
    let reader = PdfReader::from_bytes(&bytes)?;

    // --- Phase B ---
    let mut images = extract_images_from(&reader);
    apply_job_alt_texts(&mut images, &config.alt_texts);
    if config.generate_alt_text {
        fill_missing_alt_texts(&mut images, describer);
    }
    let alt_texts: Vec<ImageAltText> = images.iter().map(ImageAltText::from).collect();

    // --- Phase C ---
    let output = remediator.remediate(&bytes, &alt_texts, Some(&config.metadata))?;
    write_atomic(&config.output, &output.bytes)?;

    let document_id = config
        .input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let report = build_report(
        &document_id,
        &alt_texts,
        Some(&config.metadata),
        output.structure_tree_attached,
    );
    info!(
        input = %config.input.display(),
        output = %config.output.display(),
        images = images.len(),
        level = report.wcag_level.as_str(),
        "job finished"
    );

    Ok(JobResult {
        input_path: config.input.clone(),
        output_path: config.output.clone(),
        images_found: images.len(),
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::image_xobject::ImageFormat;
    use crate::vision::{DESCRIPTION_UNAVAILABLE, DisabledDescriber};

    fn image(id: &str) -> ImageRecord {
        ImageRecord {
            id: id.into(),
            page_number: 1,
            index: 0,
            width: 1,
            height: 1,
            format: ImageFormat::Png,
            data_url: Some("data:image/png;base64,AAAA".into()),
            alt_text: None,
            alt_text_generated: false,
        }
    }

    #[test]
    fn test_job_alt_texts_apply_by_order() {
        let mut images = vec![image("a"), image("b"), image("c")];
        apply_job_alt_texts(&mut images, &["First".into(), String::new()]);
        assert_eq!(images[0].alt_text.as_deref(), Some("First"));
        assert_eq!(images[1].alt_text, None);
        assert_eq!(images[2].alt_text, None);
    }

    #[test]
    fn test_fill_keeps_job_alt_texts() {
        let mut images = vec![image("a"), image("b")];
        images[0].alt_text = Some("Given".into());
        fill_missing_alt_texts(&mut images, &DisabledDescriber);
        assert_eq!(images[0].alt_text.as_deref(), Some("Given"));
        assert_eq!(images[1].alt_text.as_deref(), Some(DESCRIPTION_UNAVAILABLE));
    }
}
