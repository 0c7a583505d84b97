use crate::config::settings::CleanSettings;
use crate::domain::model::StepReport;
use crate::domain::ports::Step;
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use async_trait::async_trait;

/// Removes a file or a whole directory tree.
pub struct CleanStep {
    settings: CleanSettings,
}

impl CleanStep {
    pub fn new(settings: CleanSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self { settings })
    }
}

#[async_trait]
impl Step for CleanStep {
    fn name(&self) -> &str {
        "clean"
    }

    async fn run(&self) -> Result<StepReport> {
        let mut report = StepReport::new(self.name());
        let path = &self.settings.path;

        match tokio::fs::symlink_metadata(path).await {
            Ok(meta) if meta.is_dir() => {
                tracing::info!("removing directory {}", path.display());
                tokio::fs::remove_dir_all(path).await?;
                report.output(path.clone());
            }
            Ok(_) => {
                tracing::info!("removing file {}", path.display());
                tokio::fs::remove_file(path).await?;
                report.output(path.clone());
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("nothing to remove at {}", path.display());
                report.skip();
            }
            Err(e) => return Err(e.into()),
        }

        Ok(report.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn step(path: std::path::PathBuf) -> CleanStep {
        CleanStep::new(CleanSettings { path }).unwrap()
    }

    #[tokio::test]
    async fn test_removes_directory_tree() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("out");
        std::fs::create_dir_all(target.join("vars")).unwrap();
        std::fs::write(target.join("vars").join("a#vars.json"), "[]").unwrap();

        let report = step(target.clone()).run().await.unwrap();

        assert!(!target.exists());
        assert_eq!(report.processed, 1);
    }

    #[tokio::test]
    async fn test_removes_file() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("rels.csv");
        std::fs::write(&target, "x").unwrap();

        step(target.clone()).run().await.unwrap();
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_missing_path_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let report = step(temp_dir.path().join("missing")).run().await.unwrap();
        assert_eq!(report.processed, 0);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_refuses_root() {
        assert!(CleanStep::new(CleanSettings { path: "/".into() }).is_err());
    }
}
