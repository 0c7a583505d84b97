use thiserror::Error;

#[derive(Error, Debug)]
pub enum BaleenError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("XML parsing error: {0}")]
    XmlError(#[from] roxmltree::Error),

    #[error("INI parsing error: {0}")]
    IniError(#[from] ini::ParseError),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration value: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Process '{program}' failed with exit code {code:?}: {stderr}")]
    ProcessError {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Step '{step}' failed: {details}")]
    StepError { step: String, details: String },
}

pub type Result<T> = std::result::Result<T, BaleenError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Io,
    Data,
    Configuration,
    ExternalTool,
    Pipeline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl BaleenError {
    pub fn processing(message: impl Into<String>) -> Self {
        BaleenError::ProcessingError {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        BaleenError::ConfigError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            BaleenError::ApiError(_) => ErrorCategory::Network,
            BaleenError::IoError(_) => ErrorCategory::Io,
            BaleenError::CsvError(_)
            | BaleenError::SerializationError(_)
            | BaleenError::XmlError(_)
            | BaleenError::ProcessingError { .. } => ErrorCategory::Data,
            BaleenError::IniError(_)
            | BaleenError::ConfigError { .. }
            | BaleenError::MissingConfigError { .. }
            | BaleenError::InvalidConfigValueError { .. }
            | BaleenError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            BaleenError::ProcessError { .. } => ErrorCategory::ExternalTool,
            BaleenError::StepError { .. } => ErrorCategory::Pipeline,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Data | ErrorCategory::ExternalTool | ErrorCategory::Pipeline => {
                ErrorSeverity::High
            }
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Io => ErrorSeverity::Critical,
        }
    }

    /// 退出碼，對應錯誤嚴重程度
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            BaleenError::ApiError(_) => {
                "Check network access to CrossRef or rerun with online lookups disabled".to_string()
            }
            BaleenError::IoError(_) => {
                "Check that input files exist and output directories are writable".to_string()
            }
            BaleenError::CsvError(_) | BaleenError::SerializationError(_) => {
                "Inspect the input files of this step; rerun the previous step if they are corrupt"
                    .to_string()
            }
            BaleenError::XmlError(_) => {
                "Rerun core-nlp for the affected document; its XML output is not well-formed"
                    .to_string()
            }
            BaleenError::IniError(_) => "Fix the syntax of the INI configuration file".to_string(),
            BaleenError::ConfigError { .. } | BaleenError::ConfigValidationError { .. } => {
                "Check the configuration file given by -c/--config or $BALEEN_INI".to_string()
            }
            BaleenError::MissingConfigError { field } => format!(
                "Pass the option on the command line or set '{}' in the configuration file",
                field
            ),
            BaleenError::InvalidConfigValueError { field, .. } => {
                format!("Correct the value of '{}'", field)
            }
            BaleenError::ProcessError { program, .. } => format!(
                "Run '{}' by hand to inspect its output; check BALEEN_LIB and CORENLP_HOME",
                program
            ),
            BaleenError::ProcessingError { .. } => {
                "Inspect the logged file; rerun the previous pipeline step".to_string()
            }
            BaleenError::StepError { step, .. } => {
                format!("Rerun the failed step with: baleen {} -v", step.replace('_', "-"))
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Network problem: {}", self),
            ErrorCategory::Io => format!("File system problem: {}", self),
            ErrorCategory::Data => format!("Invalid data: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::ExternalTool => format!("External tool failed: {}", self),
            ErrorCategory::Pipeline => format!("Pipeline failed: {}", self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_follow_severity() {
        let missing = BaleenError::MissingConfigError {
            field: "core_nlp.out_dir".to_string(),
        };
        assert_eq!(missing.category(), ErrorCategory::Configuration);
        assert_eq!(missing.exit_code(), 1);

        let io = BaleenError::IoError(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert_eq!(io.severity(), ErrorSeverity::Critical);
        assert_eq!(io.exit_code(), 3);
    }

    #[test]
    fn test_step_error_suggests_command() {
        let err = BaleenError::StepError {
            step: "lemma_trees".to_string(),
            details: "boom".to_string(),
        };
        assert!(err.recovery_suggestion().contains("baleen lemma-trees"));
    }
}
