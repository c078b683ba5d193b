use std::collections::HashMap;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use pdf_a11y::config::job::JobFile;
use pdf_a11y::config::merged::MergedConfig;
use pdf_a11y::config::{self};
use pdf_a11y::pipeline::extractor::extract_images;
use pdf_a11y::pipeline::orchestrator::{PlannedJob, run_all_jobs};
use pdf_a11y::pipeline::remediator::Remediator;
use pdf_a11y::vision::{self, ImageDescriber};

const USAGE: &str = "\
Usage: pdf_a11y <jobs.yaml>...
       pdf_a11y extract <input.pdf>
       pdf_a11y vision-status [settings.yaml]

  <jobs.yaml>...   Remediate PDF files according to job specifications
                   and print one accessibility report (JSON) per job.
  extract          Print the images embedded in a PDF as JSON.
  vision-status    Check the configured vision backend and print its
                   status as JSON (default: ./settings.yaml if present).
                   Exits non-zero when the backend cannot be used.

Logging is controlled by RUST_LOG (default: info).";

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        eprintln!("{USAGE}");
        return if args.is_empty() {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        };
    }

    if args.iter().any(|a| a == "--version" || a == "-V") {
        eprintln!("pdf_a11y {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    init_logging();

    if args[0] == "extract" {
        return match args.get(1..) {
            Some([input]) => run_extract(Path::new(input)),
            _ => {
                eprintln!("ERROR: extract takes exactly one input file");
                eprintln!("{USAGE}");
                ExitCode::FAILURE
            }
        };
    }

    if args[0] == "vision-status" {
        return match args.get(1..) {
            Some([]) => run_vision_status(None),
            Some([settings]) => run_vision_status(Some(Path::new(settings))),
            _ => {
                eprintln!("ERROR: vision-status takes at most one settings file");
                eprintln!("{USAGE}");
                ExitCode::FAILURE
            }
        };
    }

    run_job_files(&args)
}

fn run_vision_status(settings_path: Option<&Path>) -> ExitCode {
    let settings = match config::load_settings(settings_path, Path::new(".")) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("ERROR: Failed to load settings: {e}");
            return ExitCode::FAILURE;
        }
    };
    let describer = match vision::from_settings(&settings.vision) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("ERROR: {e}");
            return ExitCode::FAILURE;
        }
    };

    let status = vision::vision_status(&*describer);
    match serde_json::to_string(&status) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("ERROR: Failed to serialize vision status: {e}");
            return ExitCode::FAILURE;
        }
    }
    if status.model_available {
        eprintln!("OK: vision backend {} is available", status.provider);
        ExitCode::SUCCESS
    } else {
        eprintln!("ERROR: vision backend {} is not available", status.provider);
        ExitCode::FAILURE
    }
}

fn run_extract(input: &Path) -> ExitCode {
    let bytes = match std::fs::read(input) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("ERROR: Failed to read {}: {e}", input.display());
            return ExitCode::FAILURE;
        }
    };
    let images = match extract_images(&bytes) {
        Ok(images) => images,
        Err(e) => {
            eprintln!("ERROR: {}: {e}", input.display());
            return ExitCode::FAILURE;
        }
    };
    match serde_json::to_string_pretty(&images) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("ERROR: Failed to serialize images: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_job_files(args: &[String]) -> ExitCode {
    let mut jobs: Vec<PlannedJob> = Vec::new();
    let mut workers: Option<usize> = None;
    // settings.yamlごとにバックエンドを1つだけ作る
    let mut describers: HashMap<std::path::PathBuf, Arc<dyn ImageDescriber>> = HashMap::new();

    for job_file_arg in args {
        let job_file_path = Path::new(job_file_arg);

        // Load settings from the same directory as the job file.
        let settings = match config::load_settings_for_job(job_file_path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("ERROR: Failed to load settings for {job_file_arg}: {e}");
                return ExitCode::FAILURE;
            }
        };
        workers.get_or_insert(settings.parallel_workers);

        let job_file = match JobFile::from_file(job_file_path) {
            Ok(jf) => jf,
            Err(e) => {
                eprintln!("ERROR: Failed to load job file {job_file_arg}: {e}");
                return ExitCode::FAILURE;
            }
        };

        // Resolve job file directory for relative paths.
        let job_dir = job_file_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        let describer = match describers.get(&job_dir).cloned() {
            Some(d) => d,
            None => match vision::from_settings(&settings.vision) {
                Ok(d) => {
                    describers.insert(job_dir.clone(), Arc::clone(&d));
                    d
                }
                Err(e) => {
                    eprintln!("ERROR: {job_file_arg}: {e}");
                    return ExitCode::FAILURE;
                }
            },
        };

        for job in &job_file.jobs {
            jobs.push(PlannedJob {
                config: MergedConfig::new(&settings, job, &job_dir),
                describer: Arc::clone(&describer),
            });
        }
    }

    let remediator = Remediator::new();
    let results = match run_all_jobs(&jobs, &remediator, workers.unwrap_or(0)) {
        Ok(results) => results,
        Err(e) => {
            eprintln!("ERROR: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut has_error = false;
    for (job, result) in jobs.iter().zip(&results) {
        match result {
            Ok(job_result) => {
                eprintln!(
                    "OK: {} -> {} ({} images, WCAG {})",
                    job_result.input_path.display(),
                    job_result.output_path.display(),
                    job_result.images_found,
                    job_result.report.wcag_level.as_str()
                );
                match serde_json::to_string(&job_result.report) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        eprintln!("ERROR: Failed to serialize report: {e}");
                        has_error = true;
                    }
                }
            }
            Err(e) => {
                eprintln!(
                    "ERROR: {} -> {}: {e}",
                    job.config.input.display(),
                    job.config.output.display()
                );
                has_error = true;
            }
        }
    }

    if has_error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
