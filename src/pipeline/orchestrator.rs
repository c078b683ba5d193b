// Phase 10: 全ジョブ実行

use std::collections::HashSet;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::warn;

use crate::config::merged::MergedConfig;
use crate::error::A11yError;
use crate::pipeline::job_runner::{JobResult, run_job};
use crate::pipeline::remediator::Remediator;
use crate::vision::ImageDescriber;

/// A job together with the vision backend chosen from its settings file.
pub struct PlannedJob {
    pub config: MergedConfig,
    pub describer: Arc<dyn ImageDescriber>,
}

/// 同じ出力パスに書き込むジョブが複数あればエラーにする。
pub fn check_unique_outputs(jobs: &[PlannedJob]) -> crate::error::Result<()> {
    let mut seen = HashSet::new();
    for job in jobs {
        if !seen.insert(&job.config.output) {
            return Err(A11yError::config(format!(
                "output '{}' is written by more than one job",
                job.config.output.display()
            )));
        }
    }
    Ok(())
}

/// Run multiple jobs in parallel, collecting results in job order.
/// One job failure does NOT prevent other jobs from running.
///
/// `workers == 0` uses one thread per CPU.
pub fn run_all_jobs(
    jobs: &[PlannedJob],
    remediator: &Remediator,
    workers: usize,
) -> crate::error::Result<Vec<crate::error::Result<JobResult>>> {
    check_unique_outputs(jobs)?;

    let run = || -> Vec<crate::error::Result<JobResult>> {
        jobs.par_iter()
            .map(|job| run_job(&job.config, &*job.describer, remediator))
            .collect()
    };

    match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
        Ok(pool) => Ok(pool.install(run)),
        Err(e) => {
            warn!(error = %e, "failed to build worker pool, using the global pool");
            Ok(run())
        }
    }
}
