//! Environment bootstrap for an installation directory.
//!
//! `eval "$(baleen env /opt/baleen)"` exports the library search path used to
//! find helper executables and the default configuration file.

use crate::utils::error::{BaleenError, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub const LIB_PATH_VAR: &str = "BALEEN_LIB";
pub const CONFIG_VAR: &str = "BALEEN_INI";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bootstrap {
    dir: PathBuf,
}

impl Bootstrap {
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Installation directory: the given one, else the parent of the `bin/`
    /// holding the running executable, else the current directory.
    pub fn resolve(dir: Option<&Path>) -> Result<Self> {
        if let Some(dir) = dir {
            let dir = std::path::absolute(dir).map_err(|e| {
                BaleenError::config(format!("cannot resolve directory '{}': {}", dir.display(), e))
            })?;
            return Ok(Self::from_dir(dir));
        }

        if let Ok(exe) = std::env::current_exe() {
            if let Some(bin_dir) = exe.parent() {
                if bin_dir.file_name().is_some_and(|n| n == "bin") {
                    if let Some(install_dir) = bin_dir.parent() {
                        return Ok(Self::from_dir(install_dir));
                    }
                }
            }
        }

        let cwd = std::env::current_dir().map_err(|e| {
            BaleenError::config(format!("cannot determine installation directory: {}", e))
        })?;
        Ok(Self::from_dir(cwd))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn lib_dir(&self) -> PathBuf {
        self.dir.join("lib")
    }

    /// `<dir>/lib`, appended to an existing search path if there is one.
    pub fn library_path(&self, existing: Option<OsString>) -> Result<OsString> {
        let mut paths: Vec<PathBuf> = match existing {
            Some(value) if !value.is_empty() => std::env::split_paths(&value).collect(),
            _ => Vec::new(),
        };
        let lib = self.lib_dir();
        if !paths.contains(&lib) {
            paths.push(lib);
        }
        std::env::join_paths(paths)
            .map_err(|e| BaleenError::config(format!("invalid library path: {}", e)))
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join("etc").join("local.ini")
    }

    /// Shell `export` lines for both variables.
    pub fn exports(&self, existing_lib_path: Option<OsString>) -> Result<String> {
        let lib_path = self.library_path(existing_lib_path)?;
        Ok(format!(
            "export {}=\"{}\"\nexport {}=\"{}\"\n",
            LIB_PATH_VAR,
            shell_escape(&lib_path.to_string_lossy()),
            CONFIG_VAR,
            shell_escape(&self.config_path().to_string_lossy()),
        ))
    }
}

/// 雙引號字串中需要跳脫的字元
fn shell_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
