//! Fixed-interval runner with a wall-clock deadline.
//!
//! Each cycle runs in its own task so an error or panic inside it is logged
//! and the loop carries on. The wait between cycles always happens, and is
//! the point where cancellation is observed.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// A unit of work run once per interval
#[async_trait]
pub trait Cycle: Send + Sync + 'static {
    /// Run one cycle, returning the number of records it stored
    async fn run_cycle(&self) -> Result<usize>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Completed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: usize,
    pub failed_cycles: usize,
    pub inserted: usize,
    pub cancelled: bool,
}

pub struct Scheduler {
    interval: Duration,
    duration: Duration,
    state: SchedulerState,
}

impl Scheduler {
    pub fn new(interval: Duration, duration: Duration) -> Self {
        Self {
            interval,
            duration,
            state: SchedulerState::Idle,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Run `cycle` every interval until the deadline passes or `shutdown` fires.
    ///
    /// A cycle starting exactly at the deadline still runs, so a duration of
    /// two intervals yields three cycles.
    pub async fn run<C: Cycle>(&mut self, cycle: Arc<C>, shutdown: CancellationToken) -> RunSummary {
        let started = Instant::now();
        let deadline = started + self.duration;
        self.state = SchedulerState::Running;
        info!(
            interval_secs = self.interval.as_secs(),
            duration_secs = self.duration.as_secs(),
            "Starting periodic scraping"
        );

        let mut summary = RunSummary::default();

        while Instant::now() <= deadline {
            summary.cycles += 1;
            match run_isolated(cycle.clone()).await {
                Some(inserted) => summary.inserted += inserted,
                None => summary.failed_cycles += 1,
            }

            if !wait_for_next(self.interval, &shutdown).await {
                info!("Scheduler received shutdown signal");
                summary.cancelled = true;
                break;
            }
        }

        self.state = SchedulerState::Completed;
        info!(
            cycles = summary.cycles,
            failed_cycles = summary.failed_cycles,
            inserted = summary.inserted,
            elapsed_secs = started.elapsed().as_secs(),
            "Periodic scraping finished"
        );
        summary
    }
}

/// Run one cycle in its own task, turning errors and panics into `None`
async fn run_isolated<C: Cycle>(cycle: Arc<C>) -> Option<usize> {
    let handle = tokio::spawn(async move { cycle.run_cycle().await });

    match handle.await {
        Ok(Ok(inserted)) => Some(inserted),
        Ok(Err(e)) => {
            error!("Error while scraping: {:#}", e);
            None
        }
        Err(e) => {
            warn!("Scraping cycle aborted: {}", e);
            None
        }
    }
}

/// Sleep for `interval`; returns false if `shutdown` fired first
async fn wait_for_next(interval: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(interval) => true,
        _ = shutdown.cancelled() => false,
    }
}
