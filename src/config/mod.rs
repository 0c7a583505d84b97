pub mod bootstrap;
#[cfg(feature = "cli")]
pub mod cli;
pub mod ini_config;
pub mod settings;

#[cfg(feature = "cli")]
pub use cli::{CliConfig, Command};
pub use ini_config::{ConfigSection, IniConfig, DEFAULT_SECTION};

/// Options shared by all steps, read from the selected section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalSettings {
    pub log_level: Option<String>,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl GlobalSettings {
    pub fn from_section(section: &ConfigSection) -> crate::Result<Self> {
        let log_format = match section.get("log_format")?.map(|v| v.to_lowercase()).as_deref() {
            None | Some("compact") => LogFormat::Compact,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(crate::BaleenError::InvalidConfigValueError {
                    field: "LOG_FORMAT".to_string(),
                    value: other.to_string(),
                    reason: "expected 'compact' or 'json'".to_string(),
                })
            }
        };

        Ok(Self {
            log_level: section.get("log_level")?,
            log_format,
        })
    }
}
