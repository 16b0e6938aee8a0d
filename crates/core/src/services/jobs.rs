//! Scheduled maintenance jobs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use companion_common::{AppResult, config::JobsConfig};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{error, info};

use crate::services::notification::NotificationService;

/// Scheduler configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Interval between read-notification purges.
    pub purge_interval: Duration,
    /// Notifications deleted per batch.
    pub purge_batch_size: u64,
}

impl From<&JobsConfig> for SchedulerConfig {
    fn from(jobs: &JobsConfig) -> Self {
        Self {
            purge_interval: Duration::from_secs(jobs.purge_interval_secs.max(1)),
            purge_batch_size: jobs.effective_batch_size(),
        }
    }
}

/// Executes scheduled jobs.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    /// Delete every read notification. Returns the number deleted.
    async fn purge_read_notifications(&self, batch_size: u64) -> AppResult<u64>;
}

#[async_trait]
impl JobExecutor for NotificationService {
    async fn purge_read_notifications(&self, batch_size: u64) -> AppResult<u64> {
        self.purge_read(batch_size).await
    }
}

/// Spawn the scheduler. The first run happens one interval after start.
pub fn spawn_scheduler<E: JobExecutor + 'static>(
    config: SchedulerConfig,
    executor: Arc<E>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = config.purge_interval;
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match executor
                .purge_read_notifications(config.purge_batch_size)
                .await
            {
                Ok(count) => {
                    if count > 0 {
                        info!(count, "Purged read notifications");
                    }
                }
                Err(e) => {
                    error!(error = %e, "Failed to purge read notifications");
                }
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use companion_common::AppError;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Default)]
    struct CountingExecutor {
        runs: AtomicU64,
        last_batch: AtomicU64,
    }

    #[async_trait]
    impl JobExecutor for CountingExecutor {
        async fn purge_read_notifications(&self, batch_size: u64) -> AppResult<u64> {
            self.last_batch.store(batch_size, Ordering::SeqCst);
            if self.runs.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(AppError::Database("offline".to_string()));
            }
            Ok(3)
        }
    }

    #[test]
    fn test_config_from_jobs() {
        let jobs = JobsConfig::default();
        let config = SchedulerConfig::from(&jobs);
        assert_eq!(config.purge_interval, Duration::from_secs(604_800));
        assert_eq!(config.purge_batch_size, 500);

        let jobs = JobsConfig {
            purge_interval_secs: 0,
            purge_batch_size: 0,
        };
        let config = SchedulerConfig::from(&jobs);
        assert_eq!(config.purge_interval, Duration::from_secs(1));
        assert_eq!(config.purge_batch_size, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_keeps_running_after_failure() {
        let executor = Arc::new(CountingExecutor::default());
        let handle = spawn_scheduler(
            SchedulerConfig {
                purge_interval: Duration::from_secs(60),
                purge_batch_size: 50,
            },
            executor.clone(),
        );

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(executor.runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(executor.runs.load(Ordering::SeqCst), 2);
        assert_eq!(executor.last_batch.load(Ordering::SeqCst), 50);

        handle.abort();
    }
}
