use crate::application::services::AssignmentService;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy)]
pub struct SchedulerSettings {
    pub distribution_interval: Duration,
    pub queue_depth_interval: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            distribution_interval: Duration::from_secs(60),
            queue_depth_interval: Duration::from_secs(30),
        }
    }
}

/// Drives the periodic distribution pass and queue-depth broadcast.
///
/// Both timers live in one task and the pass runs inline. Ticks missed while a
/// pass is running are skipped, not queued. A tick that lands while an
/// on-demand pass holds the service's guard is skipped as well.
pub struct DistributionScheduler {
    assignment_service: AssignmentService,
    settings: SchedulerSettings,
    shutdown: CancellationToken,
}

impl DistributionScheduler {
    pub fn new(
        assignment_service: AssignmentService,
        settings: SchedulerSettings,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            assignment_service,
            settings,
            shutdown,
        }
    }

    pub async fn run(self) {
        info!(
            "Distribution scheduler started (pass every {:?}, queue depth every {:?})",
            self.settings.distribution_interval, self.settings.queue_depth_interval
        );

        let mut distribution = interval(self.settings.distribution_interval);
        distribution.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut queue_depth = interval(self.settings.queue_depth_interval);
        queue_depth.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => break,
                _ = distribution.tick() => self.run_pass().await,
                _ = queue_depth.tick() => {
                    if let Err(e) = self.assignment_service.broadcast_queue_depth().await {
                        error!("Failed to broadcast queue depth: {}", e);
                    }
                }
            }
        }

        info!("Distribution scheduler stopped");
    }

    async fn run_pass(&self) {
        match self
            .assignment_service
            .run_distribution_pass(&self.shutdown)
            .await
        {
            Ok(report) if report.already_running => {
                debug!("Tick skipped; an on-demand pass is still running");
            }
            Ok(report) if report.cancelled => {
                info!(
                    "Distribution pass interrupted by shutdown after {} assignments",
                    report.assigned.len()
                );
            }
            Ok(_) => {}
            // Storage failures are retried on the next tick.
            Err(e) => error!("Distribution pass failed: {}", e),
        }
    }
}
