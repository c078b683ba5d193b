pub mod job;
pub mod merged;
pub mod settings;

use settings::Settings;
use std::path::{Path, PathBuf};

use crate::error::A11yError;

/// ビジョンバックエンド・保存先・既定の作成者と言語を記述する設定ファイル名
pub const SETTINGS_FILE_NAME: &str = "settings.yaml";

/// `dir` 直下の設定ファイルを探す。
fn settings_in(dir: &Path) -> Option<PathBuf> {
    let path = dir.join(SETTINGS_FILE_NAME);
    path.is_file().then_some(path)
}

/// ジョブファイルに対応する設定を読み込む。
///
/// ジョブファイルと同じディレクトリの設定ファイルが優先される。
/// 見つからなければビジョン無効・既定の保存先の設定になる。
pub fn load_settings_for_job(job_file_path: &Path) -> crate::error::Result<Settings> {
    let dir = job_file_path
        .parent()
        .ok_or_else(|| A11yError::config("Cannot determine job file directory"))?;

    match settings_in(dir) {
        Some(path) => Settings::from_file(&path),
        None => Ok(Settings::default()),
    }
}

/// サービスやステータス確認用の設定を読み込む。
///
/// 明示されたファイルは存在しなければエラー、
/// 省略時は `cwd` の設定ファイルか既定値を使う。
pub fn load_settings(explicit: Option<&Path>, cwd: &Path) -> crate::error::Result<Settings> {
    match explicit {
        Some(path) => Settings::from_file(path),
        None => match settings_in(cwd) {
            Some(path) => Settings::from_file(&path),
            None => Ok(Settings::default()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use settings::VisionProvider;

    #[test]
    fn test_load_settings_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings(None, dir.path()).unwrap();
        assert_eq!(settings.vision.provider, VisionProvider::Disabled);
        assert_eq!(settings.storage_dir, PathBuf::from(".pdf_a11y"));
    }

    #[test]
    fn test_load_settings_reads_cwd_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE_NAME),
            "vision:\n  provider: command\n  command: [describe]\n",
        )
        .unwrap();
        let settings = load_settings(None, dir.path()).unwrap();
        assert_eq!(settings.vision.provider, VisionProvider::Command);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("other.yaml");
        assert!(load_settings(Some(&missing), dir.path()).is_err());
    }

    #[test]
    fn test_directory_named_like_settings_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(SETTINGS_FILE_NAME)).unwrap();
        let job = dir.path().join("jobs.yaml");
        assert!(load_settings_for_job(&job).is_ok());
    }
}
