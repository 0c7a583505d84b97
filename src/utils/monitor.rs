use crate::domain::model::StepReport;
#[cfg(feature = "cli")]
use std::sync::Mutex;
use std::time::Duration;
#[cfg(feature = "cli")]
use std::time::Instant;
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Resources used by the baleen process while one step ran.
#[derive(Debug, Clone, PartialEq)]
pub struct StepUsage {
    pub step: String,
    pub processed: usize,
    pub rss_mb: u64,
    /// 與步驟開始時相比的記憶體變化，可為負
    pub rss_growth_mb: i64,
    pub cpu_percent: f32,
    pub elapsed: Duration,
}

/// The step whose run grew the resident set the most.
pub fn heaviest_step(usages: &[StepUsage]) -> Option<&StepUsage> {
    usages.iter().max_by_key(|u| u.rss_growth_mb)
}

#[cfg(feature = "cli")]
struct StepMark {
    step: String,
    rss_mb: u64,
    started: Instant,
}

#[cfg(feature = "cli")]
#[derive(Default)]
struct MonitorState {
    current: Option<StepMark>,
    usages: Vec<StepUsage>,
    peak_rss_mb: u64,
}

/// Samples the baleen process between pipeline steps. External tools a step
/// launches (CoreNLP, cypher-shell, neo4j) are not counted.
#[cfg(feature = "cli")]
pub struct SystemMonitor {
    system: Mutex<System>,
    pid: Option<Pid>,
    started: Instant,
    state: Mutex<MonitorState>,
}

#[cfg(feature = "cli")]
impl SystemMonitor {
    pub fn new(enabled: bool) -> Self {
        let pid = if enabled {
            match sysinfo::get_current_pid() {
                Ok(pid) => Some(pid),
                Err(e) => {
                    tracing::warn!("Cannot determine baleen PID, step monitoring disabled: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Self {
            system: Mutex::new(System::new()),
            pid,
            started: Instant::now(),
            state: Mutex::new(MonitorState::default()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.pid.is_some()
    }

    /// (rss MB, cpu %) of the baleen process
    fn sample(&self) -> Option<(u64, f32)> {
        let pid = self.pid?;
        let mut system = self.system.lock().ok()?;
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory().with_cpu(),
        );
        let process = system.process(pid)?;
        Some((process.memory() / 1024 / 1024, process.cpu_usage()))
    }

    pub fn step_started(&self, step: &str) {
        let Some((rss_mb, _)) = self.sample() else {
            return;
        };
        if let Ok(mut state) = self.state.lock() {
            state.peak_rss_mb = state.peak_rss_mb.max(rss_mb);
            state.current = Some(StepMark {
                step: step.to_string(),
                rss_mb,
                started: Instant::now(),
            });
        }
    }

    /// Closes the step opened by `step_started` and logs what it used.
    pub fn step_finished(&self, report: &StepReport) -> Option<StepUsage> {
        let (rss_mb, cpu_percent) = self.sample()?;
        let mut state = self.state.lock().ok()?;
        let mark = state.current.take()?;
        state.peak_rss_mb = state.peak_rss_mb.max(rss_mb);

        let usage = StepUsage {
            step: mark.step,
            processed: report.processed,
            rss_mb,
            rss_growth_mb: rss_mb as i64 - mark.rss_mb as i64,
            cpu_percent,
            elapsed: mark.started.elapsed(),
        };
        tracing::info!(
            "📊 {}: {} items in {:?}, baleen RSS {}MB ({:+}MB), CPU {:.1}%",
            usage.step,
            usage.processed,
            usage.elapsed,
            usage.rss_mb,
            usage.rss_growth_mb,
            usage.cpu_percent
        );
        state.usages.push(usage.clone());
        Some(usage)
    }

    pub fn log_summary(&self) {
        let Ok(state) = self.state.lock() else {
            return;
        };
        if state.usages.is_empty() {
            return;
        }
        match heaviest_step(&state.usages) {
            Some(heaviest) if heaviest.rss_growth_mb > 0 => tracing::info!(
                "📊 {} steps in {:?}, peak RSS {}MB, largest growth in {} ({:+}MB)",
                state.usages.len(),
                self.started.elapsed(),
                state.peak_rss_mb,
                heaviest.step,
                heaviest.rss_growth_mb
            ),
            _ => tracing::info!(
                "📊 {} steps in {:?}, peak RSS {}MB",
                state.usages.len(),
                self.started.elapsed(),
                state.peak_rss_mb
            ),
        }
    }
}

// 非 CLI 環境的空實現
#[cfg(not(feature = "cli"))]
#[derive(Default)]
pub struct SystemMonitor;

#[cfg(not(feature = "cli"))]
impl SystemMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self
    }

    pub fn is_enabled(&self) -> bool {
        false
    }

    pub fn step_started(&self, _step: &str) {}

    pub fn step_finished(&self, _report: &StepReport) -> Option<StepUsage> {
        None
    }

    pub fn log_summary(&self) {}
}
