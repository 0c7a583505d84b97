#![cfg(unix)]

use baleen::app::steps::{ServerAction, ServerStep, ToNeoStep};
use baleen::config::settings::{Neo4jSettings, ToNeoSettings};
use baleen::domain::ports::Step;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tempfile::TempDir;

fn script(path: &Path, body: &str) {
    std::fs::write(path, body).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

// 一個測試函式內完成，避免其他測試在寫入腳本時 fork
#[tokio::test]
async fn test_toneo_replaces_store_and_restarts_server() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let home = temp_dir.path().join("neo4j");
    let bin = home.join("bin");
    std::fs::create_dir_all(&bin)?;
    let log = temp_dir.path().join("calls.log");

    script(
        &bin.join("neo4j"),
        &format!("#!/bin/sh\necho \"neo4j $1\" >> '{}'\n[ \"$1\" = start ]\n", log.display()),
    );
    script(
        &bin.join("neo4j-import"),
        &format!(
            "#!/bin/sh\necho \"import $*\" >> '{}'\nmkdir -p \"$2\"\n",
            log.display()
        ),
    );

    let store = temp_dir.path().join("graph.db");
    std::fs::create_dir_all(&store)?;
    std::fs::write(store.join("stale"), "old")?;

    let nodes = temp_dir.path().join("nodes");
    let relations = temp_dir.path().join("relations");
    std::fs::create_dir_all(&nodes)?;
    std::fs::create_dir_all(&relations)?;
    std::fs::write(nodes.join("articles.csv"), "doi:ID,:LABEL\n")?;
    std::fs::write(nodes.join("events.csv"), "eventID:ID,:LABEL\n")?;
    std::fs::write(relations.join("has_event.csv"), ":START_ID,:END_ID,:TYPE\n")?;

    let server = Neo4jSettings {
        neo4j_home: home.clone(),
        store_path: store.clone(),
        address: "localhost:7687".to_string(),
        user: "neo4j".to_string(),
        password: "neo4j".to_string(),
    };

    let step = ToNeoStep::new(ToNeoSettings {
        server: server.clone(),
        nodes_dir: nodes.clone(),
        relations_dir: relations.clone(),
        options: Some("--delimiter ,".to_string()),
    });
    let report = step.run().await?;
    assert_eq!(report.processed, 1);
    assert!(store.exists());
    assert!(!store.join("stale").exists());

    // stop 失敗 (exit 1) 只會記錄警告
    ServerStep::new(server, ServerAction::Stop).run().await?;

    let calls = std::fs::read_to_string(&log)?;
    let lines: Vec<&str> = calls.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "neo4j stop");
    assert_eq!(
        lines[1],
        format!(
            "import --into {} --nodes {} --nodes {} --relationships {} --delimiter ,",
            store.display(),
            nodes.join("articles.csv").display(),
            nodes.join("events.csv").display(),
            relations.join("has_event.csv").display()
        )
    );
    assert_eq!(lines[2], "neo4j start");
    assert_eq!(lines[3], "neo4j stop");
    Ok(())
}
