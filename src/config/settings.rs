use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// rayonのスレッド数（0はCPU数）
    pub parallel_workers: usize,
    /// アップロードと修復済みPDFの保存先（相対パスはサービスの基準ディレクトリから）
    pub storage_dir: PathBuf,
    pub vision: VisionSettings,
    pub default_author: Option<String>,
    pub default_language: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            parallel_workers: 0,
            storage_dir: PathBuf::from(".pdf_a11y"),
            vision: VisionSettings::default(),
            default_author: None,
            default_language: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisionProvider {
    #[default]
    Disabled,
    Command,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VisionSettings {
    pub provider: VisionProvider,
    /// 実行するプログラムと引数（`provider: command`のとき必須）
    pub command: Vec<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for VisionSettings {
    fn default() -> Self {
        VisionSettings {
            provider: VisionProvider::Disabled,
            command: Vec::new(),
            timeout_secs: 60,
            max_retries: 2,
            retry_backoff_ms: 20_000,
        }
    }
}

impl Settings {
    pub fn from_yaml(yaml: &str) -> crate::error::Result<Self> {
        serde_yml::from_str(yaml).map_err(|e| {
            crate::error::A11yError::config(format!("Failed to parse settings YAML: {e}"))
        })
    }

    pub fn from_file(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}
