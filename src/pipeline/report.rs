// Phase 8: リメディエーション結果からWCAG準拠レベルを算出する

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pdf::MetadataRecord;
use crate::pipeline::ImageAltText;
use crate::vision::DESCRIPTION_UNAVAILABLE;

pub const MISSING_TITLE: &str = "MISSING_TITLE";
pub const MISSING_LANGUAGE: &str = "MISSING_LANGUAGE";
pub const MISSING_ALT_TEXT: &str = "MISSING_ALT_TEXT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueType {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessibilityIssue {
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl AccessibilityIssue {
    fn warning(code: &str, message: impl Into<String>) -> Self {
        Self {
            issue_type: IssueType::Warning,
            code: code.to_string(),
            message: message.into(),
            count: None,
        }
    }
}

/// WCAG conformance level. `AAA` is never computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WcagLevel {
    #[serde(rename = "partial")]
    Partial,
    A,
    AA,
    AAA,
}

impl WcagLevel {
    /// No errors and no warnings: `AA`. No errors and at most two warnings: `A`.
    /// Anything else: `Partial`.
    pub fn from_issues(issues: &[AccessibilityIssue]) -> Self {
        let errors = issues
            .iter()
            .filter(|i| i.issue_type == IssueType::Error)
            .count();
        let warnings = issues
            .iter()
            .filter(|i| i.issue_type == IssueType::Warning)
            .count();
        match (errors, warnings) {
            (0, 0) => WcagLevel::AA,
            (0, 1..=2) => WcagLevel::A,
            _ => WcagLevel::Partial,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WcagLevel::Partial => "partial",
            WcagLevel::A => "A",
            WcagLevel::AA => "AA",
            WcagLevel::AAA => "AAA",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessibilityReport {
    pub document_id: String,
    pub timestamp: DateTime<Utc>,
    pub images_processed: usize,
    pub alt_texts_added: usize,
    pub metadata_added: Vec<String>,
    pub wcag_level: WcagLevel,
    /// Whether a structure tree was attached to the output.
    pub tagged: bool,
    pub issues: Vec<AccessibilityIssue>,
}

fn is_meaningful(alt_text: &str) -> bool {
    !alt_text.is_empty() && alt_text != DESCRIPTION_UNAVAILABLE
}

fn has_value(field: Option<&String>) -> bool {
    field.is_some_and(|v| !v.is_empty())
}

pub fn build_report(
    document_id: &str,
    alt_texts: &[ImageAltText],
    metadata: Option<&MetadataRecord>,
    structure_tree_attached: bool,
) -> AccessibilityReport {
    let mut issues = Vec::new();
    let mut metadata_added = Vec::new();

    if has_value(metadata.and_then(|m| m.title.as_ref())) {
        metadata_added.push("title".to_string());
    } else {
        issues.push(AccessibilityIssue::warning(
            MISSING_TITLE,
            "Document title is not set",
        ));
    }

    if has_value(metadata.and_then(|m| m.language.as_ref())) {
        metadata_added.push("language".to_string());
    } else {
        issues.push(AccessibilityIssue::warning(
            MISSING_LANGUAGE,
            "Document language is not set",
        ));
    }

    if has_value(metadata.and_then(|m| m.author.as_ref())) {
        metadata_added.push("author".to_string());
    }
    if has_value(metadata.and_then(|m| m.subject.as_ref())) {
        metadata_added.push("subject".to_string());
    }

    let alt_texts_added = alt_texts
        .iter()
        .filter(|a| is_meaningful(&a.alt_text))
        .count();
    let missing = alt_texts.len() - alt_texts_added;
    if missing > 0 {
        let mut issue = AccessibilityIssue::warning(
            MISSING_ALT_TEXT,
            format!("{} image(s) are missing meaningful alt-text", missing),
        );
        issue.count = Some(missing);
        issues.push(issue);
    }

    AccessibilityReport {
        document_id: document_id.to_string(),
        timestamp: Utc::now(),
        images_processed: alt_texts.len(),
        alt_texts_added,
        metadata_added,
        wcag_level: WcagLevel::from_issues(&issues),
        tagged: structure_tree_attached,
        issues,
    }
}
