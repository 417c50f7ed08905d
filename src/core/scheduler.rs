// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Task scheduler for periodic housekeeping (liveness and auto-resolve sweeps)

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

type TaskFn = Arc<dyn Fn() + Send + Sync + 'static>;

struct ScheduledTask {
    interval: Duration,
    task: TaskFn,
    enabled: Arc<AtomicBool>,
}

pub struct Scheduler {
    tasks: Arc<RwLock<HashMap<String, ScheduledTask>>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn add_task<F>(&self, name: &str, interval: Duration, task: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut tasks = self.tasks.write().await;
        tasks.insert(
            name.to_string(),
            ScheduledTask {
                interval,
                task: Arc::new(task),
                enabled: Arc::new(AtomicBool::new(true)),
            },
        );
        debug!("Scheduled task '{}' with interval {:?}", name, interval);
    }

    /// Pause or resume a task; takes effect on its next tick, even after
    /// [`spawn`](Self::spawn).
    pub async fn enable_task(&self, name: &str, enabled: bool) {
        let tasks = self.tasks.read().await;
        if let Some(task) = tasks.get(name) {
            task.enabled.store(enabled, Ordering::Release);
        }
    }

    /// Start one timer loop per registered task. Each loop stops when the
    /// shutdown signal fires.
    pub async fn spawn(&self, shutdown: &broadcast::Sender<()>) -> Vec<JoinHandle<()>> {
        let tasks = self.tasks.read().await;
        tasks
            .iter()
            .map(|(name, scheduled)| {
                let name = name.clone();
                let period = scheduled.interval.max(Duration::from_millis(1));
                let task = Arc::clone(&scheduled.task);
                let enabled = Arc::clone(&scheduled.enabled);
                let mut shutdown = shutdown.subscribe();

                tokio::spawn(async move {
                    let mut ticker = interval(period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    loop {
                        tokio::select! {
                            _ = ticker.tick() => {
                                if enabled.load(Ordering::Acquire) {
                                    task();
                                }
                            }
                            _ = shutdown.recv() => {
                                debug!("Task '{}' stopped", name);
                                break;
                            }
                        }
                    }
                })
            })
            .collect()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
