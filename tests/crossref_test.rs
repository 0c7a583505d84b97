use baleen::adapters::crossref::{CrossRefClient, FileCache};
use baleen::app::steps::ArtsCsvStep;
use baleen::config::settings::ArtsCsvSettings;
use baleen::domain::ports::Step;
use httpmock::prelude::*;
use serde_json::json;
use tempfile::TempDir;

const CSL_JSON: &str = "application/vnd.citationstyles.csl+json";

fn csl_record() -> serde_json::Value {
    json!({
        "title": "Ocean\n  warming",
        "publisher": "Springer",
        "container-title": "Nature Clim. Change",
        "ISSN": ["1758-678X"],
        "issued": {"date-parts": [[2015, 3]]}
    })
}

#[tokio::test]
async fn test_doi_metadata_is_cached() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let doi_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/10.1038/nclimate").header("accept", CSL_JSON);
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(csl_record());
        })
        .await;

    let temp_dir = TempDir::new()?;
    let cache = FileCache::open(temp_dir.path().join("meta"))?;
    let client = CrossRefClient::new(&server.base_url(), &server.url("/journals"));

    let first = client.get_doi_metadata("10.1038/nclimate", &cache).await?;
    let second = client.get_doi_metadata("10.1038/nclimate", &cache).await?;

    doi_mock.assert_hits_async(1).await;
    assert_eq!(first, second);
    assert_eq!(first.year, Some(2015));
    assert_eq!(first.month, Some(3));
    assert_eq!(first.day, None);
    assert_eq!(first.issn.as_deref(), Some("1758-678X"));
    Ok(())
}

#[tokio::test]
async fn test_failed_lookup_retries_then_returns_empty() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let doi_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/10.1/missing");
            then.status(503);
        })
        .await;

    let temp_dir = TempDir::new()?;
    let cache = FileCache::open(temp_dir.path())?;
    let client = CrossRefClient::new(&server.base_url(), &server.url("/journals")).with_attempts(3);

    let raw = client.request_doi_metadata("10.1/missing", &cache).await?;
    assert_eq!(raw, json!({}));
    doi_mock.assert_hits_async(3).await;

    // 失敗的查詢不寫入快取
    assert!(cache.get::<serde_json::Value>("10.1/missing").is_none());
    Ok(())
}

#[tokio::test]
async fn test_offline_client_only_reads_cache() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let any = server
        .mock_async(|when, then| {
            when.method(GET);
            then.status(200).body("unexpected");
        })
        .await;

    let temp_dir = TempDir::new()?;
    let cache = FileCache::open(temp_dir.path())?;
    cache.put("10.1/cached", &"Cached citation.".to_string())?;
    let client = CrossRefClient::new(&server.base_url(), &server.url("/journals")).with_online(false);

    assert_eq!(client.get_citation("10.1/cached", &cache).await?, "Cached citation.");
    assert_eq!(client.get_citation("10.1/other", &cache).await?, "");
    assert_eq!(client.request_issn_metadata("1234-5678", &cache).await?, json!({}));
    any.assert_hits_async(0).await;
    Ok(())
}

#[tokio::test]
async fn test_citation_drops_doi_suffix() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let cit_mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/10.1/cit")
                .header("accept", "text/bibliography; style=apa");
            then.status(200)
                .body("Smith, J. (2015). Ocean warming. Nature, 1, 2. doi:10.1/cit\n");
        })
        .await;

    let temp_dir = TempDir::new()?;
    let cache = FileCache::open(temp_dir.path())?;
    let client = CrossRefClient::new(&server.base_url(), &server.url("/journals")).with_style("apa");

    let citation = client.get_citation("10.1/cit", &cache).await?;
    assert_eq!(citation, "Smith, J. (2015). Ocean warming. Nature, 1, 2.");
    cit_mock.assert_async().await;
    assert_eq!(cache.get::<String>("10.1/cit").as_deref(), Some(citation.as_str()));
    Ok(())
}

#[tokio::test]
async fn test_issn_record_overrides_journal_and_publisher() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/10.1038/nclimate");
            then.status(200).json_body(csl_record());
        })
        .await;
    let issn_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/journals/1758-678X");
            then.status(200).json_body(json!({
                "status": "ok",
                "message": {"title": "Nature Climate Change", "publisher": "Nature Publishing Group"}
            }));
        })
        .await;

    let temp_dir = TempDir::new()?;
    let cache = FileCache::open(temp_dir.path())?;
    let client = CrossRefClient::new(&server.base_url(), &server.url("/journals"));

    let metadata = client.get_all_metadata("10.1038/nclimate", &cache).await?;
    issn_mock.assert_async().await;
    assert_eq!(metadata.journal.as_deref(), Some("Nature Climate Change"));
    assert_eq!(metadata.publisher.as_deref(), Some("Nature Publishing Group"));
    Ok(())
}

#[tokio::test]
async fn test_artscsv_writes_article_rows() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/10.1038/nclimate").header("accept", CSL_JSON);
            then.status(200).json_body(csl_record());
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/journals/1758-678X");
            then.status(404);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/10.1038/nclimate")
                .header("accept", "text/bibliography; style=chicago-fullnote-bibliography");
            then.status(200).body("Smith, John. “Ocean Warming.”  Nature 1 (2015). doi:10.1038/nclimate");
        })
        .await;

    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();
    std::fs::create_dir_all(root.join("vars"))?;
    std::fs::create_dir_all(root.join("txt"))?;
    std::fs::write(root.join("vars").join("10.1038%2Fnclimate#vars.json"), "[]")?;
    std::fs::write(root.join("vars").join("10.1%2Fnotext#vars.json"), "[]")?;
    std::fs::write(root.join("txt").join("10.1038%2Fnclimate.txt"), "Ocean warming.")?;

    let step = ArtsCsvStep::new(ArtsCsvSettings {
        vars_dir: root.join("vars"),
        text_dir: root.join("txt"),
        meta_cache_dir: root.join("meta_cache"),
        cit_cache_dir: root.join("cit_cache"),
        nodes_dir: root.join("nodes"),
        max_n: None,
        online: true,
        doi_url: server.base_url(),
        issn_url: server.url("/journals"),
        style: "chicago-fullnote-bibliography".to_string(),
        attempts: 1,
    })?;
    let report = step.run().await?;
    assert_eq!(report.processed, 1);
    assert_eq!(report.skipped, 1);

    let mut reader = csv::Reader::from_path(root.join("nodes").join("articles.csv"))?;
    assert_eq!(
        reader.headers()?.iter().collect::<Vec<_>>(),
        ["doi:ID", "filename", "title", "journal", "year", "month", "day", "ISSN", "publisher", "citation", ":LABEL"]
    );
    let rows: Vec<csv::StringRecord> = reader.records().collect::<Result<_, _>>()?;
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(&row[0], "10.1038/nclimate");
    assert_eq!(&row[2], "Ocean warming");
    assert_eq!(&row[3], "Nature Clim. Change");
    assert_eq!((&row[4], &row[5], &row[6]), ("2015", "3", ""));
    assert_eq!(&row[8], "Springer");
    assert_eq!(&row[9], "Smith, John. “Ocean Warming.” Nature 1 (2015).");
    assert_eq!(&row[10], "Article");
    Ok(())
}
