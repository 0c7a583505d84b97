use crate::domain::model::StepReport;
use crate::domain::ports::Step;
use crate::utils::error::{BaleenError, Result};
use crate::utils::monitor::SystemMonitor;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Runs pipeline steps one after another; the first failure stops the run.
pub struct StepRunner {
    steps: Vec<Box<dyn Step>>,
    monitor: Option<SystemMonitor>,
    run_id: String,
}

impl StepRunner {
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            monitor: None,
            run_id: chrono::Utc::now().format("run_%Y%m%d_%H%M%S").to_string(),
        }
    }

    /// 啟用或禁用系統監控
    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        self.monitor = enabled.then(|| SystemMonitor::new(true)).filter(SystemMonitor::is_enabled);
        self
    }

    pub fn add_step(&mut self, step: Box<dyn Step>) {
        self.steps.push(step);
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub async fn run_all(&self) -> Result<Vec<StepReport>> {
        let mut reports = Vec::with_capacity(self.steps.len());
        tracing::info!("🚀 Starting {} with steps: {}", self.run_id, self.step_names().join(" --> "));

        for step in &self.steps {
            tracing::info!("▶️ Running step: {}", step.name());
            if let Some(monitor) = &self.monitor {
                monitor.step_started(step.name());
            }

            let report = match step.run().await {
                Ok(report) => report,
                Err(e) => {
                    tracing::error!("❌ Step {} failed: {}", step.name(), e);
                    return Err(match e {
                        BaleenError::StepError { .. } => e,
                        other => BaleenError::StepError {
                            step: step.name().to_string(),
                            details: other.to_string(),
                        },
                    });
                }
            };

            tracing::info!(
                "✅ Step executed: {} (processed: {}, skipped: {}, duration: {:?})",
                report.step_name,
                report.processed,
                report.skipped,
                report.duration
            );

            if let Some(monitor) = &self.monitor {
                monitor.step_finished(&report);
            }

            reports.push(report);
        }

        if let Some(monitor) = &self.monitor {
            monitor.log_summary();
        }

        Ok(reports)
    }

    pub fn get_execution_summary(reports: &[StepReport]) -> HashMap<String, serde_json::Value> {
        let mut summary = HashMap::new();

        let total_steps = reports.len();
        let total_processed: usize = reports.iter().map(|r| r.processed).sum();
        let total_skipped: usize = reports.iter().map(|r| r.skipped).sum();
        let total_duration: std::time::Duration = reports.iter().map(|r| r.duration).sum();

        summary.insert("total_steps".to_string(), serde_json::Value::Number(total_steps.into()));
        summary.insert("total_processed".to_string(), serde_json::Value::Number(total_processed.into()));
        summary.insert("total_skipped".to_string(), serde_json::Value::Number(total_skipped.into()));
        summary.insert(
            "total_duration_ms".to_string(),
            serde_json::Value::Number((total_duration.as_millis() as u64).into()),
        );

        let step_names: Vec<serde_json::Value> = reports
            .iter()
            .map(|r| serde_json::Value::String(r.step_name.clone()))
            .collect();
        summary.insert("executed_steps".to_string(), serde_json::Value::Array(step_names));

        summary
    }
}

impl Default for StepRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// Run tasks with at most `jobs` of them at the same time. Results keep the
/// order of `tasks`. All tasks run to completion; the first error is returned.
pub async fn run_bounded<T, F>(jobs: usize, tasks: Vec<F>) -> Result<Vec<T>>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(jobs.max(1)));
    let mut set = JoinSet::new();

    for (index, task) in tasks.into_iter().enumerate() {
        let semaphore = semaphore.clone();
        set.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| BaleenError::processing(format!("semaphore closed: {}", e)))?;
            task.await.map(|value| (index, value))
        });
    }

    let mut results = Vec::new();
    let mut first_error = None;

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Ok(result)) => results.push(result),
            Ok(Err(e)) => {
                tracing::error!("❌ {}", e);
                first_error.get_or_insert(e);
            }
            Err(e) => {
                first_error.get_or_insert(BaleenError::processing(format!("task panicked: {}", e)));
            }
        }
    }

    if let Some(e) = first_error {
        return Err(e);
    }

    results.sort_by_key(|(index, _)| *index);
    Ok(results.into_iter().map(|(_, value)| value).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingStep {
        name: String,
        processed: usize,
        fail: bool,
    }

    #[async_trait]
    impl Step for CountingStep {
        fn name(&self) -> &str {
            &self.name
        }

        async fn run(&self) -> Result<StepReport> {
            if self.fail {
                return Err(BaleenError::processing("boom"));
            }
            let mut report = StepReport::new(&self.name);
            for i in 0..self.processed {
                report.output(format!("/tmp/{}", i));
            }
            Ok(report.finish())
        }
    }

    fn step(name: &str, processed: usize, fail: bool) -> Box<dyn Step> {
        Box::new(CountingStep {
            name: name.to_string(),
            processed,
            fail,
        })
    }

    #[tokio::test]
    async fn test_runs_steps_in_order() {
        let mut runner = StepRunner::new();
        runner.add_step(step("core_nlp", 2, false));
        runner.add_step(step("lemma_trees", 1, false));

        let reports = runner.run_all().await.unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].step_name, "core_nlp");
        assert_eq!(reports[1].step_name, "lemma_trees");
        assert!(runner.run_id().starts_with("run_"));
    }

    #[tokio::test]
    async fn test_failure_stops_run() {
        let mut runner = StepRunner::new();
        runner.add_step(step("core_nlp", 1, false));
        runner.add_step(step("lemma_trees", 0, true));
        runner.add_step(step("ext_vars", 1, false));

        let err = runner.run_all().await.unwrap_err();
        match err {
            BaleenError::StepError { step, details } => {
                assert_eq!(step, "lemma_trees");
                assert!(details.contains("boom"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_execution_summary() {
        let mut first = StepReport::new("ext_vars");
        first.output("/tmp/a");
        first.output("/tmp/b");
        first.skip();
        first.duration = Duration::from_millis(100);
        let mut second = StepReport::new("offsets");
        second.output("/tmp/a");
        second.duration = Duration::from_millis(200);

        let summary = StepRunner::get_execution_summary(&[first, second]);
        assert_eq!(summary["total_steps"], serde_json::json!(2));
        assert_eq!(summary["total_processed"], serde_json::json!(3));
        assert_eq!(summary["total_skipped"], serde_json::json!(1));
        assert_eq!(summary["total_duration_ms"], serde_json::json!(300));
        assert_eq!(summary["executed_steps"], serde_json::json!(["ext_vars", "offsets"]));
    }

    #[tokio::test]
    async fn test_run_bounded_limits_concurrency() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let running = running.clone();
                let peak = peak.clone();
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(i)
                }
            })
            .collect();

        let results = run_bounded(2, tasks).await.unwrap();
        assert_eq!(results, (0..8).collect::<Vec<_>>());
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_run_bounded_reports_error() {
        let tasks: Vec<_> = (0..3)
            .map(|i| async move {
                if i == 1 {
                    Err(BaleenError::processing("bad file"))
                } else {
                    Ok(i)
                }
            })
            .collect();

        let err = run_bounded(1, tasks).await.unwrap_err();
        assert!(err.to_string().contains("bad file"));
    }
}
