/// Collection Scheduler
///
/// Runs `collect_once` on a fixed interval until stopped. The first cycle
/// starts immediately; a slow cycle delays the next tick instead of
/// triggering a burst of catch-up runs.

use crate::engine::ForecastEngine;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

pub struct Scheduler;

/// Handle to a running scheduler
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    cycles: Arc<AtomicU64>,
}

impl Scheduler {
    pub fn spawn(engine: Arc<ForecastEngine>, interval: Duration) -> SchedulerHandle {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let cycles = Arc::new(AtomicU64::new(0));
        let counter = cycles.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!("Scheduler started, collecting every {:?}", interval);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown_rx.changed() => break,
                }

                match engine.collect_once().await {
                    Ok(report) => {
                        let cycle = counter.fetch_add(1, Ordering::SeqCst) + 1;
                        match report.trained {
                            Some(metrics) => info!(
                                "Cycle {} complete: corpus {}, retrained ({})",
                                cycle,
                                report.collection.corpus_size,
                                metrics.to_string()
                            ),
                            None => info!(
                                "Cycle {} complete: corpus {}",
                                cycle, report.collection.corpus_size
                            ),
                        }
                    }
                    Err(e) => {
                        counter.fetch_add(1, Ordering::SeqCst);
                        error!("Collection cycle failed: {}", e);
                    }
                }

                if *shutdown_rx.borrow() {
                    break;
                }
            }

            info!("Scheduler stopped");
        });

        SchedulerHandle {
            shutdown,
            task,
            cycles,
        }
    }
}

impl SchedulerHandle {
    /// Cycles finished so far, failed ones included
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    /// Signal shutdown and wait for an in-flight cycle to finish
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!("Scheduler task ended abnormally: {}", e);
        }
    }
}
