use std::path::Path;

use serde::Deserialize;

use crate::error::A11yError;

#[derive(Debug, Clone, Deserialize)]
pub struct JobFile {
    pub jobs: Vec<Job>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    pub input: String,
    pub output: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub language: Option<String>,
    /// 画像の抽出順に対応する代替テキスト
    #[serde(default)]
    pub alt_texts: Vec<String>,
    /// 未指定の画像をビジョンバックエンドで補完するか
    #[serde(default)]
    pub generate_alt_text: bool,
}

impl JobFile {
    pub fn from_yaml(yaml: &str) -> crate::error::Result<Self> {
        serde_yml::from_str(yaml)
            .map_err(|e| A11yError::config(format!("Failed to parse job YAML: {e}")))
    }

    pub fn from_file(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}
