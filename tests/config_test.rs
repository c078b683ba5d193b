use std::path::Path;

use pdf_a11y::config::job::JobFile;
use pdf_a11y::config::load_settings_for_job;
use pdf_a11y::config::merged::MergedConfig;
use pdf_a11y::config::settings::{Settings, VisionProvider};
use pdf_a11y::vision;

#[test]
fn test_settings_defaults() {
    let settings = Settings::default();
    assert_eq!(settings.parallel_workers, 0);
    assert_eq!(settings.vision.provider, VisionProvider::Disabled);
    assert_eq!(settings.vision.max_retries, 2);
    assert_eq!(settings.vision.retry_backoff_ms, 20_000);
}

#[test]
fn test_settings_partial_yaml() {
    let settings = Settings::from_yaml(
        "parallel_workers: 3\n\
         default_language: en\n\
         vision:\n  provider: command\n  command: [describe-image, --fast]\n  timeout_secs: 5\n",
    )
    .unwrap();
    assert_eq!(settings.parallel_workers, 3);
    assert_eq!(settings.default_language.as_deref(), Some("en"));
    assert_eq!(settings.vision.provider, VisionProvider::Command);
    assert_eq!(settings.vision.command, vec!["describe-image", "--fast"]);
    assert_eq!(settings.vision.timeout_secs, 5);
    assert_eq!(settings.vision.max_retries, 2);
}

#[test]
fn test_invalid_settings() {
    assert!(Settings::from_yaml("vision:\n  provider: telepathy\n").is_err());
}

#[test]
fn test_command_provider_requires_command() {
    let settings = Settings::from_yaml("vision:\n  provider: command\n").unwrap();
    assert!(vision::from_settings(&settings.vision).is_err());

    let disabled = vision::from_settings(&Settings::default().vision).unwrap();
    assert_eq!(disabled.name(), "disabled");
}

#[test]
fn test_job_file_and_merge() {
    let jobs = JobFile::from_yaml(
        "jobs:\n\
         \x20 - input: in/a.pdf\n\
         \x20   output: out/a.pdf\n\
         \x20   title: Report A\n\
         \x20   alt_texts: [\"First image\", \"\"]\n\
         \x20 - input: /abs/b.pdf\n\
         \x20   output: out/b.pdf\n\
         \x20   language: de\n\
         \x20   generate_alt_text: true\n",
    )
    .unwrap();
    assert_eq!(jobs.jobs.len(), 2);

    let settings = Settings {
        default_author: Some("Docs Team".into()),
        default_language: Some("en".into()),
        ..Settings::default()
    };
    let base = Path::new("/work");
    let a = MergedConfig::new(&settings, &jobs.jobs[0], base);
    assert_eq!(a.input, Path::new("/work/in/a.pdf"));
    assert_eq!(a.metadata.title.as_deref(), Some("Report A"));
    assert_eq!(a.metadata.author.as_deref(), Some("Docs Team"));
    assert_eq!(a.metadata.language.as_deref(), Some("en"));
    assert_eq!(a.alt_texts, vec!["First image", ""]);
    assert!(!a.generate_alt_text);

    let b = MergedConfig::new(&settings, &jobs.jobs[1], base);
    assert_eq!(b.input, Path::new("/abs/b.pdf"));
    assert_eq!(b.metadata.language.as_deref(), Some("de"));
    assert_eq!(b.metadata.title, None);
    assert!(b.generate_alt_text);
}

#[test]
fn test_settings_discovered_next_to_job_file() {
    let dir = tempfile::tempdir().unwrap();
    let job_path = dir.path().join("jobs.yaml");
    assert_eq!(load_settings_for_job(&job_path).unwrap().parallel_workers, 0);

    std::fs::write(dir.path().join("settings.yaml"), "parallel_workers: 7\n").unwrap();
    assert_eq!(load_settings_for_job(&job_path).unwrap().parallel_workers, 7);
}
