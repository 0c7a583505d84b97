use crate::adapters::process::{CommandOutput, ExternalCommand};
use crate::domain::ports::GraphClient;
use crate::utils::error::{BaleenError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub const PASSWORD_VAR: &str = "NEO4J_PASSWORD";

/// Runs Cypher statements through Neo4j's `cypher-shell`, one process per
/// statement, with the statement passed on stdin. The password goes through
/// `NEO4J_PASSWORD` so it stays out of the argument list.
#[derive(Debug, Clone)]
pub struct CypherShell {
    program: PathBuf,
    address: String,
    user: String,
    password: String,
}

impl CypherShell {
    pub fn new(neo4j_home: &Path, address: &str, user: &str, password: &str) -> Self {
        Self {
            program: neo4j_home.join("bin").join("cypher-shell"),
            address: address.to_string(),
            user: user.to_string(),
            password: password.to_string(),
        }
    }

    fn command(&self) -> ExternalCommand {
        let address = if self.address.contains("://") {
            self.address.clone()
        } else {
            format!("bolt://{}", self.address)
        };

        ExternalCommand::new(&self.program)
            .arg("-a")
            .arg(address)
            .arg("-u")
            .arg(&self.user)
            .arg("--format")
            .arg("plain")
            .env(PASSWORD_VAR, &self.password)
    }

    pub async fn run(&self, statement: &str) -> Result<CommandOutput> {
        let statement = statement.trim();
        tracing::debug!("cypher: {}", statement);
        let mut input = statement.to_string();
        if !input.ends_with(';') {
            input.push(';');
        }
        input.push('\n');
        self.command().stdin(input).run().await
    }

    /// Run a query returning a single count and parse it from the last line.
    pub async fn count(&self, query: &str) -> Result<i64> {
        let output = self.run(query).await?;
        parse_count(&output.stdout)
    }

    pub async fn column(&self, query: &str) -> Result<Vec<String>> {
        let output = self.run(query).await?;
        Ok(parse_column(&output.stdout))
    }
}

#[async_trait]
impl GraphClient for CypherShell {
    async fn execute(&self, statement: &str) -> Result<()> {
        self.run(statement).await?;
        Ok(())
    }

    async fn count(&self, query: &str) -> Result<i64> {
        CypherShell::count(self, query).await
    }

    async fn column(&self, query: &str) -> Result<Vec<String>> {
        CypherShell::column(self, query).await
    }
}

/// Quoted Cypher string literal.
pub fn cypher_string(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Values of a single-column result in `--format plain`: the header line is
/// dropped and string values lose their quotes.
pub fn parse_column(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|value| {
            match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
                Some(inner) => inner.replace("\\\"", "\"").replace("\\\\", "\\"),
                None => value.to_string(),
            }
        })
        .collect()
}

/// With `--format plain` the first line is the column header and the value
/// is on the last non-empty line.
pub fn parse_count(stdout: &str) -> Result<i64> {
    let last = stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .ok_or_else(|| BaleenError::processing("cypher-shell returned no output"))?;

    last.parse().map_err(|_| {
        BaleenError::processing(format!("cypher-shell returned no count: '{}'", last))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("count(v)\n42\n").unwrap(), 42);
        assert_eq!(parse_count("n\n0\n\n").unwrap(), 0);
        assert!(parse_count("").is_err());
        assert!(parse_count("count(v)\n").is_err());
    }

    #[test]
    fn test_parse_column() {
        assert_eq!(
            parse_column("a.doi\n\"10.1/a\"\n\"10.1/\\\"b\\\"\"\n"),
            vec!["10.1/a", "10.1/\"b\""]
        );
        assert_eq!(parse_column("n\n3\n"), vec!["3"]);
        assert!(parse_column("a.doi\n").is_empty());
    }

    #[test]
    fn test_cypher_string() {
        assert_eq!(cypher_string("Smith's \\ notes"), "'Smith\\'s \\\\ notes'");
    }

    #[test]
    fn test_password_not_in_command_line() {
        let shell = CypherShell::new(Path::new("/opt/neo4j"), "localhost:7687", "neo4j", "s3cret");
        let line = shell.command().display();
        assert!(!line.contains("s3cret"));
        assert_eq!(
            line,
            "/opt/neo4j/bin/cypher-shell -a bolt://localhost:7687 -u neo4j --format plain"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_statement_passed_on_stdin() {
        use std::os::unix::fs::PermissionsExt;

        let home = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(home.path().join("bin")).unwrap();
        let script = home.path().join("bin/cypher-shell");
        // 回傳參數數量、密碼與 stdin 內容
        std::fs::write(&script, "#!/bin/sh\necho \"$#\"\necho \"$NEO4J_PASSWORD\"\ncat\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let shell = CypherShell::new(home.path(), "localhost:7687", "neo4j", "secret");
        let output = shell.run("MATCH (n) RETURN count(n)").await.unwrap();
        let lines: Vec<&str> = output.stdout.lines().collect();
        assert_eq!(lines, vec!["6", "secret", "MATCH (n) RETURN count(n);"]);
    }
}
