//! Article metadata and formatted citations from CrossRef.
//!
//! Every successful lookup is cached in its own file, so a crash halfway
//! through a large collection keeps most of the work.

use crate::domain::model::ArticleMetadata;
use crate::domain::paths::{list_files, quote_doi, unquote_doi};
use crate::utils::error::Result;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

pub const DEFAULT_DOI_URL: &str = "https://doi.org";
pub const DEFAULT_ISSN_URL: &str = "https://api.crossref.org/journals";
pub const DEFAULT_STYLE: &str = "chicago-fullnote-bibliography";
pub const DEFAULT_ATTEMPTS: usize = 10;

const CSL_JSON: &str = "application/vnd.citationstyles.csl+json";

/// One JSON file per key.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        tracing::info!("reading cached data from {}", dir.display());
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", quote_doi(key)))
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let content = std::fs::read_to_string(self.path_for(key)).ok()?;
        match serde_json::from_str(&content) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("ignoring corrupt cache entry for {}: {}", key, e);
                None
            }
        }
    }

    /// Cached keys, sorted.
    pub fn keys(&self) -> Result<Vec<String>> {
        Ok(list_files(&self.dir, Some("json"))?
            .iter()
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()))
            .map(unquote_doi)
            .collect())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        match std::fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        std::fs::write(self.path_for(key), json)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CrossRefClient {
    client: Client,
    doi_url: String,
    issn_url: String,
    style: String,
    attempts: usize,
    online: bool,
}

impl CrossRefClient {
    pub fn new(doi_url: &str, issn_url: &str) -> Self {
        Self {
            client: Client::new(),
            doi_url: doi_url.trim_end_matches('/').to_string(),
            issn_url: issn_url.trim_end_matches('/').to_string(),
            style: DEFAULT_STYLE.to_string(),
            attempts: DEFAULT_ATTEMPTS,
            online: true,
        }
    }

    pub fn with_style(mut self, style: &str) -> Self {
        self.style = style.to_string();
        self
    }

    pub fn with_attempts(mut self, attempts: usize) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    /// Offline clients only answer from the cache.
    pub fn with_online(mut self, online: bool) -> Self {
        self.online = online;
        self
    }

    /// GET with retries. `None` once every attempt failed.
    async fn get_with_retries(&self, url: &str, accept: Option<&str>, what: &str) -> Option<reqwest::Response> {
        let mut last_failure = String::from("no attempt made");

        for attempt in 1..=self.attempts {
            let mut request = self.client.get(url);
            if let Some(accept) = accept {
                request = request.header(ACCEPT, accept);
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::info!("request for {} succeeded", what);
                    return Some(response);
                }
                Ok(response) => {
                    last_failure = format!(
                        "returned {}: {}",
                        response.status().as_u16(),
                        response.status().canonical_reason().unwrap_or("")
                    );
                }
                Err(e) => last_failure = format!("failed: {}", e),
            }
            tracing::debug!("attempt {} for {} {}", attempt, what, last_failure);
        }

        tracing::error!("request for {} {}", what, last_failure);
        None
    }

    /// Raw CSL-JSON metadata for a DOI; an empty object when unavailable.
    pub async fn request_doi_metadata(&self, doi: &str, cache: &FileCache) -> Result<Value> {
        if let Some(cached) = cache.get::<Value>(doi) {
            return Ok(cached);
        }

        if !self.online {
            tracing::warn!("skipping online lookup for DOI {}", doi);
            return Ok(Value::Object(Default::default()));
        }

        let url = format!("{}/{}", self.doi_url, doi);
        let what = format!("metadata of DOI {}", doi);
        let Some(response) = self.get_with_retries(&url, Some(CSL_JSON), &what).await else {
            return Ok(Value::Object(Default::default()));
        };

        let metadata: Value = response.json().await?;
        cache.put(doi, &metadata)?;
        Ok(metadata)
    }

    /// Raw CrossRef journal record for an ISSN; an empty object when unavailable.
    pub async fn request_issn_metadata(&self, issn: &str, cache: &FileCache) -> Result<Value> {
        if let Some(cached) = cache.get::<Value>(issn) {
            return Ok(cached);
        }

        if !self.online {
            tracing::warn!("skipping online lookup for ISSN {}", issn);
            return Ok(Value::Object(Default::default()));
        }

        let url = format!("{}/{}", self.issn_url, issn);
        let what = format!("metadata of ISSN {}", issn);
        let Some(response) = self.get_with_retries(&url, None, &what).await else {
            return Ok(Value::Object(Default::default()));
        };

        let body: Value = response.json().await?;
        let message = body.get("message").cloned().unwrap_or(Value::Null);
        cache.put(issn, &message)?;
        Ok(message)
    }

    pub async fn get_doi_metadata(&self, doi: &str, cache: &FileCache) -> Result<ArticleMetadata> {
        let raw = self.request_doi_metadata(doi, cache).await?;
        Ok(article_metadata_from_csl(doi, &raw))
    }

    /// DOI metadata completed with the journal title and publisher of its ISSN.
    pub async fn get_all_metadata(&self, doi: &str, cache: &FileCache) -> Result<ArticleMetadata> {
        let mut metadata = self.get_doi_metadata(doi, cache).await?;

        if let Some(issn) = metadata.issn.clone() {
            let journal = self.request_issn_metadata(&issn, cache).await?;
            if let Some(title) = text_field(&journal, "title") {
                metadata.journal = Some(title);
            }
            if let Some(publisher) = text_field(&journal, "publisher") {
                metadata.publisher = Some(publisher);
            }
        }

        Ok(metadata)
    }

    /// Formatted citation; empty when unavailable. The trailing ` doi:…` part
    /// is cut off.
    pub async fn get_citation(&self, doi: &str, cache: &FileCache) -> Result<String> {
        if let Some(cached) = cache.get::<String>(doi) {
            return Ok(cached);
        }

        if !self.online {
            tracing::warn!("skipping online lookup of citation for DOI {}", doi);
            return Ok(String::new());
        }

        let url = format!("{}/{}", self.doi_url, doi);
        let accept = format!("text/bibliography; style={}", self.style);
        let what = format!("formatted citation of {}", doi);
        let Some(response) = self.get_with_retries(&url, Some(&accept), &what).await else {
            return Ok(String::new());
        };

        let text = response.text().await?;
        let citation = text.split(" doi:").next().unwrap_or_default().to_string();
        cache.put(doi, &citation)?;
        Ok(citation)
    }
}

/// Remove cached DOI records with incomplete metadata, so the next lookup
/// asks CrossRef again. Journal records (ISSN keys) are kept. Returns the
/// removed keys.
pub fn clean_metadata_cache(cache: &FileCache) -> Result<Vec<String>> {
    let mut removed = Vec::new();
    for key in cache.keys()? {
        if !key.contains('/') {
            continue;
        }
        let Some(raw) = cache.get::<Value>(&key) else {
            continue;
        };
        if !article_metadata_from_csl(&key, &raw).is_complete() {
            tracing::info!("removing incomplete cached metadata for key {}", key);
            cache.remove(&key)?;
            removed.push(key);
        }
    }
    Ok(removed)
}

/// String field that may be given as a string or as a list of strings.
fn text_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.first().and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

pub fn article_metadata_from_csl(doi: &str, raw: &Value) -> ArticleMetadata {
    let title = text_field(raw, "title");
    if title.is_none() {
        tracing::warn!("no title found for DOI {}", doi);
    }
    let publisher = text_field(raw, "publisher");
    let issn = text_field(raw, "ISSN");
    if issn.is_none() {
        tracing::warn!("no ISSN found for DOI {}", doi);
    }
    let journal = text_field(raw, "container-title");

    let published = ["published-online", "published-print", "issued"]
        .iter()
        .find_map(|key| raw.get(*key).filter(|v| !v.is_null()));

    let parts: Vec<i64> = published
        .and_then(|p| p.get("date-parts"))
        .and_then(|d| d.get(0))
        .and_then(Value::as_array)
        .map(|parts| parts.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default();

    if parts.is_empty() {
        tracing::warn!("no publication date found for DOI {}", doi);
    }

    ArticleMetadata {
        doi: doi.to_string(),
        title,
        journal,
        year: parts.first().copied(),
        month: parts.get(1).copied(),
        day: parts.get(2).copied(),
        issn,
        publisher,
    }
}
