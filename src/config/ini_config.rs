//! INI configuration files.
//!
//! ```ini
//! [DEFAULT]
//! data_dir = ${HOME}/baleen/data
//! core_nlp.out_dir = %(data_dir)s/scnlp
//! core_nlp.threads = 4
//!
//! [test]
//! data_dir = /tmp/baleen-test
//! ```
//!
//! Several files can be read; later files override earlier ones. Values in
//! `[DEFAULT]` are inherited by every section. Keys are case-insensitive.
//! `${VAR}` is replaced by the environment variable, `%(key)s` by another key
//! of the same section.

use crate::utils::error::{BaleenError, Result};
use ini::{Ini, ParseOption};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const DEFAULT_SECTION: &str = "DEFAULT";

const MAX_INTERPOLATION_DEPTH: usize = 10;

type Properties = BTreeMap<String, String>;

#[derive(Debug, Clone, Default)]
pub struct IniConfig {
    sections: BTreeMap<String, Properties>,
    files: Vec<PathBuf>,
}

impl IniConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the given files in order. Every file must exist.
    pub fn from_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut config = Self::new();
        for path in paths {
            config.read_file(path)?;
        }
        Ok(config)
    }

    pub fn read_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(BaleenError::config(format!(
                "config file '{}' not found",
                path.display()
            )));
        }

        tracing::debug!("📁 reading config file {}", path.display());
        let content = std::fs::read_to_string(path)?;
        self.read_str(&content)?;
        self.files.push(path.to_path_buf());
        Ok(())
    }

    pub fn read_str(&mut self, content: &str) -> Result<()> {
        let content = substitute_env_vars(content);
        let opt = ParseOption {
            enabled_quote: false,
            enabled_escape: false,
            ..Default::default()
        };
        let ini = Ini::load_from_str_opt(&content, opt)?;

        for (section, properties) in ini.iter() {
            // 區段外的鍵視同 DEFAULT
            let name = section.unwrap_or(DEFAULT_SECTION).to_string();
            let target = self.sections.entry(name).or_default();
            for (key, value) in properties.iter() {
                target.insert(key.trim().to_lowercase(), value.trim().to_string());
            }
        }

        Ok(())
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn has_section(&self, name: &str) -> bool {
        name == DEFAULT_SECTION || self.sections.contains_key(name)
    }

    /// Section names, sorted, without `DEFAULT`.
    pub fn section_names(&self) -> Vec<String> {
        self.sections
            .keys()
            .filter(|name| name.as_str() != DEFAULT_SECTION)
            .cloned()
            .collect()
    }

    /// A section with the defaults merged in. `%(key)s` references are
    /// expanded when a key is read, so a bad reference only fails the
    /// options that use it.
    pub fn section(&self, name: &str) -> Result<ConfigSection> {
        let mut section = self.raw_section(name)?;
        section.interpolate = true;
        Ok(section)
    }

    /// Like [`IniConfig::section`], but `%(key)s` references are kept as is.
    pub fn raw_section(&self, name: &str) -> Result<ConfigSection> {
        if !self.has_section(name) {
            return Err(BaleenError::config(format!("no section '{}' in configuration", name)));
        }

        let mut values = self.sections.get(DEFAULT_SECTION).cloned().unwrap_or_default();
        if let Some(own) = self.sections.get(name) {
            values.extend(own.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        Ok(ConfigSection {
            name: name.to_string(),
            values,
            interpolate: false,
        })
    }
}

/// 與 TOML 設定相同：未定義的環境變數保留原字串
fn substitute_env_vars(content: &str) -> String {
    static ENV_RE: OnceLock<Regex> = OnceLock::new();
    let re = ENV_RE.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid regex"));

    re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    })
    .to_string()
}

fn interpolate(values: &Properties, key: &str, value: &str, depth: usize) -> Result<String> {
    static REF_RE: OnceLock<Regex> = OnceLock::new();
    let re = REF_RE.get_or_init(|| Regex::new(r"%%|%\(([^)]+)\)s").expect("valid regex"));

    if depth > MAX_INTERPOLATION_DEPTH {
        return Err(BaleenError::ConfigValidationError {
            field: key.to_string(),
            message: "interpolation too deeply nested".to_string(),
        });
    }

    let mut result = String::with_capacity(value.len());
    let mut last = 0;
    for caps in re.captures_iter(value) {
        let whole = caps.get(0).map(|m| m.range()).unwrap_or_default();
        result.push_str(&value[last..whole.start]);
        last = whole.end;

        let Some(reference) = caps.get(1) else {
            result.push('%');
            continue;
        };
        let ref_key = reference.as_str().to_lowercase();
        let ref_value = values.get(&ref_key).ok_or_else(|| BaleenError::ConfigValidationError {
            field: key.to_string(),
            message: format!("bad interpolation reference '%({})s'", ref_key),
        })?;
        result.push_str(&interpolate(values, &ref_key, ref_value, depth + 1)?);
    }
    result.push_str(&value[last..]);

    Ok(result)
}

/// Key/value pairs of one section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSection {
    name: String,
    values: Properties,
    interpolate: bool,
}

impl ConfigSection {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value of a key; an empty value counts as unset.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_lowercase();
        let Some(raw) = self.values.get(&key).filter(|v| !v.is_empty()) else {
            return Ok(None);
        };
        if !self.interpolate {
            return Ok(Some(raw.clone()));
        }
        let value = interpolate(&self.values, &key, raw, 0)?;
        Ok(Some(value).filter(|v| !v.is_empty()))
    }

    pub fn get_path(&self, key: &str) -> Result<Option<PathBuf>> {
        Ok(self.get(key)?.map(PathBuf::from))
    }

    pub fn get_usize(&self, key: &str) -> Result<Option<usize>> {
        self.get(key)?
            .map(|value| {
                value.parse().map_err(|_| BaleenError::InvalidConfigValueError {
                    field: key.to_string(),
                    value: value.clone(),
                    reason: "not a non-negative integer".to_string(),
                })
            })
            .transpose()
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        self.get(key)?.map(|value| parse_bool(key, &value)).transpose()
    }
}

pub fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Ok(true),
        "0" | "no" | "false" | "off" => Ok(false),
        _ => Err(BaleenError::InvalidConfigValueError {
            field: key.to_string(),
            value: value.to_string(),
            reason: "not a boolean".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const BASE: &str = r#"
[DEFAULT]
data_dir = /data
core_nlp.out_dir = %(data_dir)s/scnlp
core_nlp.threads = 4
core_nlp.resume = yes
core_nlp.options =

[test]
data_dir = /tmp/test
"#;

    #[test]
    fn test_default_inheritance_and_interpolation() {
        let mut config = IniConfig::new();
        config.read_str(BASE).unwrap();

        let default = config.section(DEFAULT_SECTION).unwrap();
        assert_eq!(default.get("core_nlp.out_dir").unwrap().as_deref(), Some("/data/scnlp"));

        let test = config.section("test").unwrap();
        assert_eq!(test.get("core_nlp.out_dir").unwrap().as_deref(), Some("/tmp/test/scnlp"));
        assert_eq!(test.get_usize("core_nlp.threads").unwrap(), Some(4));
        assert_eq!(test.get_bool("core_nlp.resume").unwrap(), Some(true));
    }

    #[test]
    fn test_empty_value_is_unset() {
        let mut config = IniConfig::new();
        config.read_str(BASE).unwrap();
        let section = config.section(DEFAULT_SECTION).unwrap();
        assert_eq!(section.get("core_nlp.options").unwrap(), None);
        assert_eq!(section.get("no.such.key").unwrap(), None);
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let mut config = IniConfig::new();
        config.read_str("[DEFAULT]\nLOG_LEVEL = debug\n").unwrap();
        let section = config.section(DEFAULT_SECTION).unwrap();
        assert_eq!(section.get("log_level").unwrap().as_deref(), Some("debug"));
        assert_eq!(section.get("LOG_LEVEL").unwrap().as_deref(), Some("debug"));
    }

    #[test]
    fn test_later_files_override() {
        let temp_dir = TempDir::new().unwrap();
        let first = temp_dir.path().join("first.ini");
        let second = temp_dir.path().join("second.ini");
        fs::write(&first, BASE).unwrap();
        fs::write(&second, "[DEFAULT]\ncore_nlp.threads = 8\n").unwrap();

        let config = IniConfig::from_files(&[&first, &second]).unwrap();
        let section = config.section("test").unwrap();
        assert_eq!(section.get_usize("core_nlp.threads").unwrap(), Some(8));
        assert_eq!(section.get("core_nlp.out_dir").unwrap().as_deref(), Some("/tmp/test/scnlp"));
        assert_eq!(config.files().len(), 2);
    }

    #[test]
    fn test_missing_file() {
        let err = IniConfig::from_files(&["/nonexistent/local.ini"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: config file '/nonexistent/local.ini' not found"
        );
    }

    #[test]
    fn test_env_substitution() {
        std::env::set_var("BALEEN_TEST_HOME", "/home/tester");
        let mut config = IniConfig::new();
        config
            .read_str("[DEFAULT]\ndata_dir = ${BALEEN_TEST_HOME}/data\nother = ${BALEEN_UNSET_VAR_X}\n")
            .unwrap();
        let section = config.section(DEFAULT_SECTION).unwrap();
        assert_eq!(section.get("data_dir").unwrap().as_deref(), Some("/home/tester/data"));
        assert_eq!(section.get("other").unwrap().as_deref(), Some("${BALEEN_UNSET_VAR_X}"));
    }

    #[test]
    fn test_unknown_section_and_bad_reference() {
        let mut config = IniConfig::new();
        config.read_str("[DEFAULT]\na = %(missing)s\n").unwrap();
        assert!(config.section("nope").is_err());
        assert!(config.section(DEFAULT_SECTION).unwrap().get("a").is_err());
        assert_eq!(
            config.raw_section(DEFAULT_SECTION).unwrap().get("a").unwrap().as_deref(),
            Some("%(missing)s")
        );
    }

    #[test]
    fn test_bad_reference_only_fails_its_own_key() {
        let mut config = IniConfig::new();
        config
            .read_str("[DEFAULT]\ndata_dir = /data\nbroken = %(nowhere)s/x\nok = %(data_dir)s/vars\n")
            .unwrap();
        let section = config.section(DEFAULT_SECTION).unwrap();
        assert_eq!(section.get("ok").unwrap().as_deref(), Some("/data/vars"));
        let err = section.get("broken").unwrap_err();
        assert!(err.to_string().contains("nowhere"));
    }

    #[test]
    fn test_percent_escape_and_bool_errors() {
        let mut config = IniConfig::new();
        config.read_str("[DEFAULT]\nratio = 50%%\nflag = maybe\n").unwrap();
        let section = config.section(DEFAULT_SECTION).unwrap();
        assert_eq!(section.get("ratio").unwrap().as_deref(), Some("50%"));
        assert!(section.get_bool("flag").is_err());
    }

    #[test]
    fn test_section_names() {
        let mut config = IniConfig::new();
        config
            .read_str("[CAUSE_1]\npattern = S << x\nrelation = cause\n[CAUSE_2]\npattern = y\n")
            .unwrap();
        assert_eq!(config.section_names(), vec!["CAUSE_1", "CAUSE_2"]);
    }
}
