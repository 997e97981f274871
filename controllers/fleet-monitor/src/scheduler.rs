//! Job scheduler
//!
//! One tokio task per job. A job's runs are awaited in sequence inside its own
//! task, so two runs of the same job can never overlap. Ticks missed while a
//! run overran are skipped, not queued.

use crate::jobs::JobConfig;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{info, warn};

#[derive(Debug)]
/// Runs each job on its own period
pub struct JobScheduler {
    jobs: Vec<JobConfig>,
}

impl JobScheduler {
    /// Scheduler for a fixed job list
    pub fn new(jobs: Vec<JobConfig>) -> Self {
        Self { jobs }
    }

    /// Spawn every job; the returned set only completes if a job task panics.
    pub fn start(self) -> JoinSet<()> {
        let mut tasks = JoinSet::new();
        for job in self.jobs {
            tasks.spawn(run_job(job));
        }
        tasks
    }
}

async fn run_job(config: JobConfig) {
    let mut ticker = interval_at(Instant::now() + config.initial_delay, config.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(
        "Scheduled job {} every {}s after {}s",
        config.name,
        config.period.as_secs(),
        config.initial_delay.as_secs()
    );

    loop {
        ticker.tick().await;

        info!("Job {} to be executed", config.name);
        let started = Instant::now();
        config.job.execute().await;
        info!("Job {} was executed", config.name);

        let elapsed = started.elapsed();
        if elapsed > config.period {
            warn!(
                "Job {} misfired: run took {}s, longer than its {}s period",
                config.name,
                elapsed.as_secs(),
                config.period.as_secs()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::MonitoringJob;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::sleep;

    #[derive(Default)]
    struct CountingJob {
        runtime: Duration,
        started: AtomicUsize,
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    impl CountingJob {
        fn taking(runtime: Duration) -> Arc<Self> {
            Arc::new(Self {
                runtime,
                ..Default::default()
            })
        }

        fn runs(&self) -> usize {
            self.started.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl MonitoringJob for CountingJob {
        async fn execute(&self) {
            self.started.fetch_add(1, Ordering::SeqCst);
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(active, Ordering::SeqCst);
            sleep(self.runtime).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn config(name: &'static str, period: u64, delay: u64, job: &Arc<CountingJob>) -> JobConfig {
        JobConfig {
            name,
            period: Duration::from_secs(period),
            initial_delay: Duration::from_secs(delay),
            job: Arc::clone(job) as Arc<dyn MonitoringJob>,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_on_period() {
        let job = CountingJob::taking(Duration::ZERO);
        let _tasks = JobScheduler::new(vec![config("node-check", 60, 0, &job)]).start();

        sleep(Duration::from_secs(150)).await;

        // t = 0, 60, 120
        assert_eq!(job.runs(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_delay() {
        let job = CountingJob::taking(Duration::ZERO);
        let _tasks = JobScheduler::new(vec![config("deploy-check", 3600, 90, &job)]).start();

        sleep(Duration::from_secs(89)).await;
        assert_eq!(job.runs(), 0);
        sleep(Duration::from_secs(2)).await;
        assert_eq!(job.runs(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrunning_job_never_overlaps() {
        let job = CountingJob::taking(Duration::from_secs(150));
        let _tasks = JobScheduler::new(vec![config("deploy-check", 60, 0, &job)]).start();

        sleep(Duration::from_secs(400)).await;

        assert_eq!(job.max_active.load(Ordering::SeqCst), 1);
        // Missed ticks are dropped rather than replayed back to back.
        assert!(job.runs() <= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_job_does_not_block_others() {
        let slow = CountingJob::taking(Duration::from_secs(3600));
        let fast = CountingJob::taking(Duration::ZERO);
        let _tasks = JobScheduler::new(vec![
            config("deploy-check", 3600, 0, &slow),
            config("node-check", 60, 0, &fast),
        ])
        .start();

        sleep(Duration::from_secs(130)).await;

        assert_eq!(slow.runs(), 1);
        assert_eq!(fast.runs(), 3);
    }
}
