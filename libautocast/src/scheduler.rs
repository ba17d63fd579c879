//! Periodic cycle scheduling
//!
//! Global mode sweeps every project once per poll interval and runs the due
//! ones, one after another. Dedicated mode runs a single project right away
//! and then once per poll interval regardless of its frequency.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::orchestrator::CycleOrchestrator;
use crate::store::RecordStore;
use crate::types::{CycleResult, Project};

/// Longest uninterrupted sleep; shutdown is noticed within this window
const SHUTDOWN_CHECK: Duration = Duration::from_secs(1);

/// `(lastRunAt ?? createdAt) + agentFrequencyHours`
pub fn next_run(project: &Project) -> DateTime<Utc> {
    let base = project.last_run_at.unwrap_or(project.created_at);
    base + ChronoDuration::hours(i64::from(project.agent_frequency_hours))
}

pub fn is_due(project: &Project, now: DateTime<Utc>) -> bool {
    now >= next_run(project)
}

pub struct Scheduler {
    store: Arc<dyn RecordStore>,
    orchestrator: Arc<CycleOrchestrator>,
    poll_interval: Duration,
    shutdown: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn RecordStore>,
        orchestrator: Arc<CycleOrchestrator>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            orchestrator,
            poll_interval,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that stops the loops once set; hand it to a signal handler
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    fn stopping(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Run every project that is due at `now`, sequentially
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<Vec<CycleResult>> {
        let projects = self.store.get_projects().await?;
        let due: Vec<&Project> = projects.iter().filter(|p| is_due(p, now)).collect();
        info!("{} of {} projects due", due.len(), projects.len());

        let mut results = Vec::with_capacity(due.len());
        for project in due {
            if self.stopping() {
                info!("Shutdown requested, ending sweep early");
                break;
            }
            let result = self.orchestrator.run_cycle(&project.id).await;
            log_outcome(&project.name, &result);
            results.push(result);
        }
        Ok(results)
    }

    /// Sweep all projects every poll interval until shutdown
    pub async fn run_global(&self) {
        info!("Scheduler started, polling every {}", humantime::format_duration(self.poll_interval));
        while !self.stopping() {
            if let Err(e) = self.sweep_once(Utc::now()).await {
                error!("Sweep failed: {}", e);
            }
            self.pause().await;
        }
        info!("Scheduler stopped");
    }

    /// Run one project immediately, then every poll interval until shutdown
    pub async fn run_dedicated(&self, project_id: &str) {
        info!(
            "Dedicated scheduler for {} started, running every {}",
            project_id,
            humantime::format_duration(self.poll_interval)
        );
        loop {
            let result = self.orchestrator.run_cycle(project_id).await;
            log_outcome(project_id, &result);

            self.pause().await;
            if self.stopping() {
                break;
            }
        }
        info!("Dedicated scheduler for {} stopped", project_id);
    }

    async fn pause(&self) {
        let mut remaining = self.poll_interval;
        while !remaining.is_zero() && !self.stopping() {
            let step = remaining.min(SHUTDOWN_CHECK);
            sleep(step).await;
            remaining = remaining.saturating_sub(step);
        }
    }
}

fn log_outcome(project: &str, result: &CycleResult) {
    if result.is_clean() {
        info!("Cycle for {} finished cleanly", project);
    } else {
        for e in &result.errors {
            warn!("Cycle for {}: {}", project, e);
        }
    }
}
