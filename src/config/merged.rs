use std::path::PathBuf;

use super::job::Job;
use super::settings::Settings;
use crate::pdf::MetadataRecord;

#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub metadata: MetadataRecord,
    pub alt_texts: Vec<String>,
    pub generate_alt_text: bool,
    pub parallel_workers: usize,
}

impl MergedConfig {
    /// JobのOption値がSomeならJobの値を、NoneならSettingsの値を使用する。
    ///
    /// 相対パスはジョブファイルのディレクトリ基準で解決する。
    pub fn new(settings: &Settings, job: &Job, base_dir: &std::path::Path) -> Self {
        MergedConfig {
            input: base_dir.join(&job.input),
            output: base_dir.join(&job.output),
            metadata: MetadataRecord {
                title: job.title.clone(),
                author: job.author.clone().or_else(|| settings.default_author.clone()),
                subject: job.subject.clone(),
                language: job
                    .language
                    .clone()
                    .or_else(|| settings.default_language.clone()),
                is_tagged: None,
            },
            alt_texts: job.alt_texts.clone(),
            generate_alt_text: job.generate_alt_text,
            parallel_workers: settings.parallel_workers,
        }
    }
}
