//! External processes: CoreNLP, the baleen-java tools and the Neo4j scripts.

use crate::config::bootstrap::LIB_PATH_VAR;
use crate::utils::error::{BaleenError, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone)]
pub struct ExternalCommand {
    program: PathBuf,
    args: Vec<OsString>,
    stdin: Option<String>,
    envs: Vec<(OsString, OsString)>,
    timeout: Option<Duration>,
}

/// Options whose value is never logged.
const SECRET_FLAGS: [&str; 2] = ["-p", "--password"];

impl ExternalCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
            envs: Vec::new(),
            timeout: None,
        }
    }

    /// Like [`ExternalCommand::new`], but a bare program name is first looked
    /// up in the `BALEEN_LIB` search path.
    pub fn resolved(program: &str) -> Self {
        Self::new(resolve_program(program, std::env::var_os(LIB_PATH_VAR)))
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Whitespace-separated extra options from configuration.
    pub fn split_args(self, options: &str) -> Self {
        let parts: Vec<String> = options.split_whitespace().map(str::to_string).collect();
        self.args(parts)
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Extra environment variable for the child, e.g. credentials that
    /// must not show up in the argument list.
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout = duration;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Command line for logging, with password values masked.
    pub fn display(&self) -> String {
        let mut line = self.program.display().to_string();
        let mut mask_next = false;
        for arg in &self.args {
            let arg = arg.to_string_lossy();
            line.push(' ');
            if mask_next {
                line.push_str("****");
                mask_next = false;
                continue;
            }
            match arg.split_once('=') {
                Some((flag, _)) if SECRET_FLAGS.contains(&flag) => {
                    line.push_str(flag);
                    line.push_str("=****");
                }
                _ => {
                    mask_next = SECRET_FLAGS.contains(&arg.as_ref());
                    line.push_str(&arg);
                }
            }
        }
        line
    }

    /// Run to completion; a non-zero exit status is an error.
    pub async fn run(&self) -> Result<CommandOutput> {
        let output = self.run_unchecked().await?;
        if output.exit_code != 0 {
            return Err(BaleenError::ProcessError {
                program: self.program.display().to_string(),
                code: Some(output.exit_code),
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }

    /// Run to completion and return whatever the process produced.
    pub async fn run_unchecked(&self) -> Result<CommandOutput> {
        let start = Instant::now();
        tracing::info!("running: {}", self.display());

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if self.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| BaleenError::ProcessError {
            program: self.program.display().to_string(),
            code: None,
            stderr: format!("failed to spawn process: {}", e),
        })?;

        // stdin 與 stdout 同時進行，否則子行程寫滿 stdout 時兩邊互等
        let writer = match (&self.stdin, child.stdin.take()) {
            (Some(input), Some(mut child_stdin)) => {
                let input = input.clone().into_bytes();
                Some(tokio::spawn(async move {
                    let result = child_stdin.write_all(&input).await;
                    // 關閉 stdin，讓子行程讀到 EOF
                    drop(child_stdin);
                    result
                }))
            }
            _ => None,
        };

        let output = match self.timeout {
            Some(limit) => match timeout(limit, child.wait_with_output()).await {
                Ok(result) => result?,
                Err(_) => {
                    if let Some(writer) = writer {
                        writer.abort();
                    }
                    return Err(BaleenError::ProcessError {
                        program: self.program.display().to_string(),
                        code: None,
                        stderr: format!("timed out after {:?}", limit),
                    });
                }
            },
            None => child.wait_with_output().await?,
        };

        if let Some(writer) = writer {
            match writer.await {
                Ok(Ok(())) => {}
                // 子行程沒有讀完 stdin 就結束
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    tracing::debug!("{} closed stdin early", self.program.display());
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(e) => {
                    return Err(BaleenError::processing(format!(
                        "writing stdin of {} failed: {}",
                        self.program.display(),
                        e
                    )))
                }
            }
        }

        let result = CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        tracing::debug!(
            exit_code = result.exit_code,
            duration_ms = result.duration_ms,
            "process finished: {}",
            self.program.display()
        );
        if !result.stdout.trim().is_empty() {
            tracing::debug!("\n{}", result.stdout.trim_end());
        }

        Ok(result)
    }
}

/// Resolve a bare program name against a library search path. Names that
/// contain a path separator, or that are not found, are returned unchanged
/// so the OS `PATH` lookup still applies.
pub fn resolve_program(program: &str, search_path: Option<OsString>) -> PathBuf {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.to_path_buf();
    }

    if let Some(paths) = search_path {
        for dir in std::env::split_paths(&paths) {
            let full = dir.join(program);
            if full.is_file() {
                return full;
            }
        }
    }

    candidate.to_path_buf()
}
