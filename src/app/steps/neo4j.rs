//! Neo4j import and graph post-processing.

use crate::adapters::cypher::CypherShell;
use crate::adapters::process::ExternalCommand;
use crate::config::settings::{Neo4jSettings, ToNeoSettings};
use crate::domain::model::StepReport;
use crate::domain::paths::list_files;
use crate::domain::ports::{GraphClient, Step};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Start or stop the server with `<neo4j_home>/bin/neo4j`.
pub async fn control_server(settings: &Neo4jSettings, action: &str) -> Result<()> {
    let output = ExternalCommand::new(settings.neo4j_script())
        .arg(action)
        .run_unchecked()
        .await?;
    if output.exit_code != 0 {
        // stop 在伺服器沒有執行時也會失敗，只記錄不中斷
        tracing::warn!(
            "neo4j {} exited with code {}: {}",
            action,
            output.exit_code,
            output.stderr.trim()
        );
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerAction {
    Start,
    Stop,
}

impl ServerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerAction::Start => "start",
            ServerAction::Stop => "stop",
        }
    }
}

pub struct ServerStep {
    settings: Neo4jSettings,
    action: ServerAction,
}

impl ServerStep {
    pub fn new(settings: Neo4jSettings, action: ServerAction) -> Self {
        Self { settings, action }
    }
}

#[async_trait]
impl Step for ServerStep {
    fn name(&self) -> &str {
        match self.action {
            ServerAction::Start => "start_server",
            ServerAction::Stop => "stop_server",
        }
    }

    async fn run(&self) -> Result<StepReport> {
        let report = StepReport::new(self.name());
        control_server(&self.settings, self.action.as_str()).await?;
        Ok(report.finish())
    }
}

// ---------------------------------------------------------------------------
// toneo
// ---------------------------------------------------------------------------

pub struct ToNeoStep {
    settings: ToNeoSettings,
}

impl ToNeoStep {
    pub fn new(settings: ToNeoSettings) -> Self {
        Self { settings }
    }

    /// `neo4j-import --into <store> --nodes <csv>… --relationships <csv>… [options]`
    pub fn import_command(&self) -> Result<ExternalCommand> {
        let s = &self.settings;
        let mut cmd = ExternalCommand::new(s.server.neo4j_home.join("bin").join("neo4j-import"))
            .arg("--into")
            .arg(&s.server.store_path);

        for path in list_files(&s.nodes_dir, Some("csv"))? {
            cmd = cmd.arg("--nodes").arg(absolute(&path)?);
        }
        for path in list_files(&s.relations_dir, Some("csv"))? {
            cmd = cmd.arg("--relationships").arg(absolute(&path)?);
        }
        if let Some(options) = &s.options {
            cmd = cmd.split_args(options);
        }

        Ok(cmd)
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(std::path::absolute(path)?)
}

#[async_trait]
impl Step for ToNeoStep {
    fn name(&self) -> &str {
        "toneo"
    }

    async fn run(&self) -> Result<StepReport> {
        let s = &self.settings;
        let mut report = StepReport::new(self.name());
        let import = self.import_command()?;

        control_server(&s.server, "stop").await?;

        if s.server.store_path.exists() {
            tracing::info!("deleting database directory {}", s.server.store_path.display());
            tokio::fs::remove_dir_all(&s.server.store_path).await?;
        }

        let result = import.run().await;
        // 匯入失敗時也要重新啟動伺服器
        control_server(&s.server, "start").await?;
        result?;

        report.output(s.server.store_path.clone());
        Ok(report.finish())
    }
}

// ---------------------------------------------------------------------------
// ppgraph
// ---------------------------------------------------------------------------

pub mod queries {
    pub const COUNT_VARIABLE_TYPES: &str = "MATCH (v:VariableType) RETURN count(*)";

    pub const DELETE_DUPLICATE_TENTAILS: &str = "
        MATCH
            (v1)-[r:TENTAILS_VAR]->(v2)
        WITH
            v1, v2, TAIL (COLLECT (r)) as duplicates
        FOREACH
            (r IN duplicates | DELETE r)";

    /// VariableType nodes at the end of a tentailment chain that occur in no
    /// observed event.
    pub const PRUNE_CHAIN_ENDS: &str = "
        MATCH
            (v:VariableType)
        WHERE
            size((v)-->()) = 0 AND NOT (:EventInst)-[:HAS_VAR]->(v)
        WITH
            v LIMIT 25000
        DETACH DELETE
            v
        RETURN count(*)";

    /// Non-branching middle nodes of tentailment chains, e.g. the two middle
    /// nodes of
    /// (global marine primary production) → (marine primary production) →
    /// (primary production) → (production).
    pub const PRUNE_NON_BRANCHING: &str = "
        MATCH
            (v1:VariableType) -[:TENTAILS_VAR]-> (v2:VariableType) -[:TENTAILS_VAR]-> (v3:VariableType)
        WHERE
            size((v2)--()) = 2 AND (size((v1)--()) > 2 OR (:EventInst)-[:HAS_VAR]->(v1))
        WITH
            DISTINCT v1, v2, v3 LIMIT 25000
        DETACH DELETE
            v2
        MERGE
            (v1) -[:TENTAILS_VAR]-> (v3)
        RETURN count(*)";

    pub const UNIQUE_CONSTRAINTS: [(&str, &str); 7] = [
        ("Article", "doi"),
        ("Sentence", "sentID"),
        ("EventInst", "eventID"),
        ("ChangeInst", "eventID"),
        ("IncreaseInst", "eventID"),
        ("DecreaseInst", "eventID"),
        ("VariableType", "subStr"),
    ];

    pub const AWAIT_INDEXES: &str = "CALL db.awaitIndexes(300)";

    pub const EVENTS: [&str; 3] = ["Change", "Increase", "Decrease"];

    pub fn unique_constraint(label: &str, property: &str) -> String {
        format!("CREATE CONSTRAINT ON (n:{}) ASSERT n.{} IS UNIQUE", label, property)
    }

    /// One `<Event>Type` node per VariableType with at least one
    /// `<Event>Inst`. Labels cannot be parameters, hence formatting.
    pub fn event_types(event: &str) -> String {
        format!(
            "
        MATCH
            (v:VariableType) <-[:HAS_VAR]- (ei:{event}Inst)
        WITH DISTINCT v
        MERGE
            (v) <-[:HAS_VAR]- (:EventType:{event}Type {{direction: \"{direction}\" }})",
            event = event,
            direction = event.to_lowercase()
        )
    }

    pub fn event_type_counts(event: &str) -> String {
        format!(
            "
        MATCH
            (et:{event}Type) -[:HAS_VAR]-> (:VariableType) <-[:HAS_VAR]- (:{event}Inst)
        WITH
            et, count(*) AS n
        SET
            et.n = n",
            event = event
        )
    }

    pub const COOCCURS: &str = "
        MATCH
            (et1:EventType) -[:HAS_VAR]-> (:VariableType) <-[:HAS_VAR]- (ei1:EventInst)
            <-[:HAS_EVENT]- (s:Sentence) -[:HAS_EVENT]->
            (ei2:EventInst) -[:HAS_VAR]-> (:VariableType) <-[:HAS_VAR]- (et2:EventType)
        WHERE
            et1.direction = ei1.direction AND
            et2.direction = ei2.direction AND
            id(et1) < id(et2)
        WITH
            et1, et2, count(*) AS n
        MERGE
            (et1) -[:COOCCURS {n: n}]-> (et2)";

    pub const CAUSES: &str = "
        MATCH
            (et1:EventType) -[:HAS_VAR]-> (:VariableType) <-[:HAS_VAR]- (ei1:EventInst)
            <-[:HAS_CAUSE]- (:CausationInst) -[:HAS_EFFECT]->
            (ei2:EventInst) -[:HAS_VAR]-> (:VariableType) <-[:HAS_VAR]- (et2:EventType)
        WHERE
            et1.direction = ei1.direction AND
            et2.direction = ei2.direction
        WITH
            et1, et2, count(*) AS n
        MERGE
            (et1) -[:CAUSES {n: n}]-> (et2)";
}

/// Repeat a deleting query until it deletes nothing; returns the total.
pub async fn iterative_deletion(graph: &dyn GraphClient, query: &str) -> Result<i64> {
    let mut total = 0;
    let mut iteration = 0;
    loop {
        iteration += 1;
        let deleted = graph.count(query).await?;
        total += deleted;
        tracing::info!("{} deleted after iteration {}", total, iteration);
        if deleted == 0 {
            return Ok(total);
        }
    }
}

/// Remove redundant tentailed VariableType nodes. Pruning is repeated
/// because one deletion often makes room for another.
pub async fn prune_tentails(graph: &dyn GraphClient) -> Result<()> {
    tracing::info!("start pruning of tentailed variables");
    let start_count = graph.count(queries::COUNT_VARIABLE_TYPES).await?;

    tracing::info!("delete TENTAILS_VAR edge duplicates");
    graph.execute(queries::DELETE_DUPLICATE_TENTAILS).await?;

    loop {
        tracing::info!("pruning tentailed VariableType nodes");
        let mut deleted = iterative_deletion(graph, queries::PRUNE_CHAIN_ENDS).await?;
        tracing::info!("removing non-branching tentailed variables nodes");
        deleted += iterative_deletion(graph, queries::PRUNE_NON_BRANCHING).await?;
        if deleted == 0 {
            break;
        }
    }

    let end_count = graph.count(queries::COUNT_VARIABLE_TYPES).await?;
    tracing::info!(
        "📊 pruned {} VariableType nodes, from {} to {}",
        start_count - end_count,
        start_count,
        end_count
    );
    Ok(())
}

pub async fn create_constraints(graph: &dyn GraphClient) -> Result<()> {
    for (label, property) in queries::UNIQUE_CONSTRAINTS {
        tracing::info!("creating uniqueness constraint on {}({})", label, property);
        graph.execute(&queries::unique_constraint(label, property)).await?;
    }
    graph.execute(queries::AWAIT_INDEXES).await?;
    tracing::info!("all constraints online");
    Ok(())
}

pub async fn create_event_types(graph: &dyn GraphClient) -> Result<()> {
    for event in queries::EVENTS {
        tracing::info!("creating {}Type nodes", event);
        graph.execute(&queries::event_types(event)).await?;
        tracing::info!("computing {}Inst counts", event);
        graph.execute(&queries::event_type_counts(event)).await?;
    }
    Ok(())
}

/// Every post-processing stage, in order.
pub async fn postprocess_graph(graph: &dyn GraphClient) -> Result<()> {
    prune_tentails(graph).await?;
    create_constraints(graph).await?;
    create_event_types(graph).await?;
    tracing::info!("creating COOCCURS relations");
    graph.execute(queries::COOCCURS).await?;
    tracing::info!("creating CAUSES relations");
    graph.execute(queries::CAUSES).await?;
    Ok(())
}

pub struct PpGraphStep {
    graph: Box<dyn GraphClient>,
}

impl PpGraphStep {
    pub fn new(settings: &Neo4jSettings) -> Self {
        Self::with_client(Box::new(CypherShell::new(
            &settings.neo4j_home,
            &settings.address,
            &settings.user,
            &settings.password,
        )))
    }

    pub fn with_client(graph: Box<dyn GraphClient>) -> Self {
        Self { graph }
    }
}

#[async_trait]
impl Step for PpGraphStep {
    fn name(&self) -> &str {
        "ppgraph"
    }

    async fn run(&self) -> Result<StepReport> {
        let report = StepReport::new(self.name());
        postprocess_graph(self.graph.as_ref()).await?;
        Ok(report.finish())
    }
}
