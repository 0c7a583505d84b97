use crate::domain::model::StepReport;
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// A single stage of the text-mining pipeline.
#[async_trait]
pub trait Step: Send + Sync {
    /// Name used in logs and as the configuration prefix, e.g. `core_nlp`.
    fn name(&self) -> &str;

    async fn run(&self) -> Result<StepReport>;
}

/// Runs Cypher statements against a graph database.
#[async_trait]
pub trait GraphClient: Send + Sync {
    async fn execute(&self, statement: &str) -> Result<()>;

    /// Run a query that returns a single count.
    async fn count(&self, query: &str) -> Result<i64>;

    /// Run a query that returns one column, e.g. `RETURN a.doi`.
    async fn column(&self, query: &str) -> Result<Vec<String>>;
}
