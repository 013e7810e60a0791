//! Periodic host performance checks.
//!
//! Samples the host's tick rate and memory use on an interval; breaching a
//! threshold logs a warning and, when configured, broadcasts one to every
//! configured external channel.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::warn;

use crate::common::scheduler::{Scheduler, TaskId};
use crate::config::PerformanceConfig;
use crate::game::PerformanceSource;
use crate::protocol::action::ActionSender;

pub struct PerformanceMonitor {
    config: PerformanceConfig,
    perf: Arc<dyn PerformanceSource>,
    actions: ActionSender,
    groups: Vec<i64>,
    scheduler: Arc<Scheduler>,
    task: Mutex<Option<TaskId>>,
}

impl PerformanceMonitor {
    pub fn new(
        config: PerformanceConfig,
        perf: Arc<dyn PerformanceSource>,
        actions: ActionSender,
        groups: Vec<i64>,
        scheduler: Arc<Scheduler>,
    ) -> Self {
        Self {
            config,
            perf,
            actions,
            groups,
            scheduler,
            task: Mutex::new(None),
        }
    }

    /// Begin the periodic check. A no-op when monitoring is disabled.
    pub fn start(&self) {
        if !self.config.enabled {
            return;
        }

        let config = self.config.clone();
        let perf = self.perf.clone();
        let actions = self.actions.clone();
        let groups = self.groups.clone();

        let id = self.scheduler.schedule_repeating(
            Duration::from_secs(self.config.interval_secs),
            move || {
                let config = config.clone();
                let perf = perf.clone();
                let actions = actions.clone();
                let groups = groups.clone();
                async move {
                    check_once(&config, perf.as_ref(), &actions, &groups);
                }
            },
        );
        *self.task.lock().unwrap() = Some(id);
    }

    pub fn stop(&self) {
        if let Some(id) = self.task.lock().unwrap().take() {
            self.scheduler.cancel(id);
        }
    }
}

/// One sampling pass over the performance source.
fn check_once(
    config: &PerformanceConfig,
    perf: &dyn PerformanceSource,
    actions: &ActionSender,
    groups: &[i64],
) {
    let tps = perf.ticks_per_second();
    if tps < config.tps_warning {
        let message = format!("Server tick rate is low: {:.1}", tps);
        warn!("{}", message);
        if config.send_warnings {
            broadcast_warning(actions, groups, &message);
        }
    }

    let memory = perf.memory_usage();
    if memory.max_mb > 0 {
        let used_percent = memory.used_mb * 100 / memory.max_mb;
        if used_percent > config.memory_warning_percent {
            let message = format!("Server memory use is high: {}%", used_percent);
            warn!("{}", message);
            if config.send_warnings {
                broadcast_warning(actions, groups, &message);
            }
        }
    }
}

fn broadcast_warning(actions: &ActionSender, groups: &[i64], message: &str) {
    for group in groups {
        actions.send_group(*group, format!("[Warning] {}", message));
    }
}
