//! Citations and metadata set directly on the Article nodes of a running
//! graph, for graphs built before `artscsv` existed, and cleanup of the
//! metadata cache.

use crate::adapters::crossref::{clean_metadata_cache, CrossRefClient, FileCache};
use crate::adapters::cypher::{cypher_string, CypherShell};
use crate::config::settings::{AddCitSettings, AddMetaSettings, CleanMetaCacheSettings, Neo4jSettings};
use crate::domain::model::{ArticleMetadata, StepReport};
use crate::domain::ports::{GraphClient, Step};
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use async_trait::async_trait;

pub mod queries {
    use super::*;

    pub const ALL_ARTICLES: &str = "MATCH (a:Article) RETURN a.doi AS doi";

    pub const ARTICLES_WITHOUT_CITATION: &str = "
        MATCH (a:Article)
        WHERE a.citation IS NULL
        RETURN a.doi AS doi";

    pub const ARTICLES_WITHOUT_METADATA: &str = "
        MATCH (a:Article)
        WHERE ( a.title IS NULL OR
                a.journal IS NULL OR
                a.publisher IS NULL OR
                a.year IS NULL OR
                a.ISSN IS NULL )
        RETURN a.doi AS doi";

    fn text(value: Option<&str>) -> String {
        value.map(cypher_string).unwrap_or_else(|| "null".to_string())
    }

    fn number(value: Option<i64>) -> String {
        value.map(|n| n.to_string()).unwrap_or_else(|| "null".to_string())
    }

    pub fn set_citation(doi: &str, citation: &str) -> String {
        format!(
            "MATCH (a:Article) WHERE a.doi = {} SET a.citation = {}",
            cypher_string(doi),
            cypher_string(citation)
        )
    }

    pub fn set_metadata(metadata: &ArticleMetadata) -> String {
        format!(
            "MATCH (a:Article) WHERE a.doi = {} \
             SET a.title = {}, a.journal = {}, a.year = {}, a.month = {}, a.day = {}, \
             a.ISSN = {}, a.publisher = {}",
            cypher_string(&metadata.doi),
            text(metadata.title.as_deref()),
            text(metadata.journal.as_deref()),
            number(metadata.year),
            number(metadata.month),
            number(metadata.day),
            text(metadata.issn.as_deref()),
            text(metadata.publisher.as_deref()),
        )
    }
}

fn cypher_shell(server: &Neo4jSettings) -> Box<dyn GraphClient> {
    Box::new(CypherShell::new(
        &server.neo4j_home,
        &server.address,
        &server.user,
        &server.password,
    ))
}

// ---------------------------------------------------------------------------
// add_cit
// ---------------------------------------------------------------------------

pub struct AddCitStep {
    settings: AddCitSettings,
    client: CrossRefClient,
    graph: Box<dyn GraphClient>,
}

impl AddCitStep {
    pub fn new(settings: AddCitSettings) -> Result<Self> {
        let graph = cypher_shell(&settings.server);
        Self::with_client(settings, graph)
    }

    pub fn with_client(settings: AddCitSettings, graph: Box<dyn GraphClient>) -> Result<Self> {
        settings.validate()?;
        let client = CrossRefClient::new(&settings.doi_url, "")
            .with_style(&settings.style)
            .with_attempts(settings.attempts)
            .with_online(settings.online);
        Ok(Self {
            settings,
            client,
            graph,
        })
    }
}

#[async_trait]
impl Step for AddCitStep {
    fn name(&self) -> &str {
        "add_cit"
    }

    async fn run(&self) -> Result<StepReport> {
        let s = &self.settings;
        let mut report = StepReport::new(self.name());

        let query = if s.resume {
            queries::ARTICLES_WITHOUT_CITATION
        } else {
            queries::ALL_ARTICLES
        };
        let dois = self.graph.column(query).await?;
        if dois.is_empty() {
            tracing::info!("no Article nodes without citation property");
            return Ok(report.finish());
        }

        let cache = FileCache::open(&s.cache_dir)?;
        for doi in dois {
            let citation = self.client.get_citation(&doi, &cache).await?;
            if citation.is_empty() {
                report.skip();
                continue;
            }
            self.graph.execute(&queries::set_citation(&doi, &citation)).await?;
            tracing::info!("added citation for DOI {}", doi);
            report.processed += 1;
        }

        Ok(report.finish())
    }
}

// ---------------------------------------------------------------------------
// add_meta
// ---------------------------------------------------------------------------

pub struct AddMetaStep {
    settings: AddMetaSettings,
    client: CrossRefClient,
    graph: Box<dyn GraphClient>,
}

impl AddMetaStep {
    pub fn new(settings: AddMetaSettings) -> Result<Self> {
        let graph = cypher_shell(&settings.server);
        Self::with_client(settings, graph)
    }

    pub fn with_client(settings: AddMetaSettings, graph: Box<dyn GraphClient>) -> Result<Self> {
        settings.validate()?;
        let client = CrossRefClient::new(&settings.doi_url, &settings.issn_url)
            .with_attempts(settings.attempts)
            .with_online(settings.online);
        Ok(Self {
            settings,
            client,
            graph,
        })
    }
}

#[async_trait]
impl Step for AddMetaStep {
    fn name(&self) -> &str {
        "add_meta"
    }

    async fn run(&self) -> Result<StepReport> {
        let s = &self.settings;
        let mut report = StepReport::new(self.name());

        let query = if s.resume {
            queries::ARTICLES_WITHOUT_METADATA
        } else {
            queries::ALL_ARTICLES
        };
        let dois = self.graph.column(query).await?;
        if dois.is_empty() {
            tracing::info!("no Article nodes with missing metadata");
            return Ok(report.finish());
        }

        let cache = FileCache::open(&s.cache_dir)?;
        for doi in dois {
            let metadata = self.client.get_all_metadata(&doi, &cache).await?;
            self.graph.execute(&queries::set_metadata(&metadata)).await?;
            tracing::info!("added metadata for DOI {}", doi);
            report.processed += 1;
        }

        Ok(report.finish())
    }
}

// ---------------------------------------------------------------------------
// clean_meta_cache
// ---------------------------------------------------------------------------

pub struct CleanMetaCacheStep {
    settings: CleanMetaCacheSettings,
}

impl CleanMetaCacheStep {
    pub fn new(settings: CleanMetaCacheSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Step for CleanMetaCacheStep {
    fn name(&self) -> &str {
        "clean_meta_cache"
    }

    async fn run(&self) -> Result<StepReport> {
        let mut report = StepReport::new(self.name());
        tracing::info!("cleaning cached metadata from {}", self.settings.cache_dir.display());
        let cache = FileCache::open(&self.settings.cache_dir)?;
        report.processed = clean_metadata_cache(&cache)?.len();
        Ok(report.finish())
    }
}
