#![cfg(unix)]

use baleen::app::steps::{PpGraphStep, ServerAction, ServerStep};
use baleen::config::settings::Neo4jSettings;
use baleen::domain::ports::Step;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tempfile::TempDir;

fn script(path: &Path, body: &str) {
    std::fs::write(path, body).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

// 假的 cypher-shell：記錄參數與敘述，
// 前兩次刪除鏈尾變數各回傳 5，之後都是 0
fn cypher_shell(log: &Path, args_log: &Path, state: &Path) -> String {
    format!(
        r#"#!/bin/sh
echo "$* password=$NEO4J_PASSWORD" >> '{args}'
stmt=$(cat)
printf '%s\n--\n' "$stmt" >> '{log}'
case "$stmt" in
  *"size((v)-->()) = 0"*)
    n=$(cat '{state}' 2>/dev/null || echo 0)
    n=$((n + 1))
    echo "$n" > '{state}'
    echo "count(*)"
    if [ "$n" -le 2 ]; then echo 5; else echo 0; fi
    ;;
  *"RETURN count(*)"*)
    echo "count(*)"
    echo 0
    ;;
esac
"#,
        args = args_log.display(),
        log = log.display(),
        state = state.display(),
    )
}

#[tokio::test]
async fn test_server_control_and_graph_postprocessing() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let home = temp_dir.path().join("neo4j");
    let bin = home.join("bin");
    std::fs::create_dir_all(&bin)?;

    let server_log = temp_dir.path().join("server.log");
    let cypher_log = temp_dir.path().join("cypher.log");
    let args_log = temp_dir.path().join("args.log");
    let state = temp_dir.path().join("chain_ends");

    // scripts are all written before anything is spawned
    script(
        &bin.join("neo4j"),
        &format!("#!/bin/sh\necho \"neo4j $1\" >> '{}'\necho 'not running' >&2\nexit 3\n", server_log.display()),
    );
    script(&bin.join("cypher-shell"), &cypher_shell(&cypher_log, &args_log, &state));

    let settings = Neo4jSettings {
        neo4j_home: home.clone(),
        store_path: home.join("data/databases/graph.db"),
        address: "localhost:7687".to_string(),
        user: "neo4j".to_string(),
        password: "s3cret".to_string(),
    };

    // 非零結束碼只記錄警告
    let start = ServerStep::new(settings.clone(), ServerAction::Start);
    assert_eq!(start.name(), "start_server");
    start.run().await?;
    let stop = ServerStep::new(settings.clone(), ServerAction::Stop);
    assert_eq!(stop.name(), "stop_server");
    stop.run().await?;
    assert_eq!(std::fs::read_to_string(&server_log)?, "neo4j start\nneo4j stop\n");

    let report = PpGraphStep::new(&settings).run().await?;
    assert_eq!(report.step_name, "ppgraph");

    // two rounds: chain ends 5, 5, 0 then 0 again
    let statements = std::fs::read_to_string(&cypher_log)?;
    assert_eq!(statements.matches("size((v)-->()) = 0").count(), 4);
    assert_eq!(std::fs::read_to_string(&state)?.trim(), "4");
    assert_eq!(statements.matches("size((v2)--()) = 2").count(), 2);
    assert!(statements.contains("CREATE CONSTRAINT ON (n:Article) ASSERT n.doi IS UNIQUE;"));
    assert!(statements.trim_end().ends_with("--"));
    let causes = statements.find("[:CAUSES {n: n}]").unwrap();
    let cooccurs = statements.find("[:COOCCURS {n: n}]").unwrap();
    assert!(cooccurs < causes);

    // 密碼只經由環境變數傳遞
    let args = std::fs::read_to_string(&args_log)?;
    for line in args.lines() {
        assert_eq!(line, "-a bolt://localhost:7687 -u neo4j --format plain password=s3cret");
    }
    Ok(())
}
