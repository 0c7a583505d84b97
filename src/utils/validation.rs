use crate::utils::error::{BaleenError, Result};
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(BaleenError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(BaleenError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(BaleenError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(BaleenError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(BaleenError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_existing_dir(field_name: &str, path: &str) -> Result<()> {
    validate_path(field_name, path)?;
    if !std::path::Path::new(path).is_dir() {
        return Err(BaleenError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Directory does not exist".to_string(),
        });
    }
    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(BaleenError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(BaleenError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

/// JVM 記憶體設定，例如 `3g`、`512m`
pub fn validate_memory(field_name: &str, value: &str) -> Result<()> {
    static MEMORY_RE: OnceLock<Regex> = OnceLock::new();
    let re = MEMORY_RE.get_or_init(|| Regex::new(r"^[0-9]+[kKmMgG]?$").expect("valid regex"));

    if !re.is_match(value) {
        return Err(BaleenError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Expected a JVM heap size such as 3g or 512m".to_string(),
        });
    }
    Ok(())
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| BaleenError::MissingConfigError {
        field: field_name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("artscsv.doi_url", "https://doi.org").is_ok());
        assert!(validate_url("artscsv.doi_url", "http://dx.doi.org").is_ok());
        assert!(validate_url("artscsv.doi_url", "").is_err());
        assert!(validate_url("artscsv.doi_url", "invalid-url").is_err());
        assert!(validate_url("artscsv.doi_url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("core_nlp.threads", 4, 1).is_ok());
        assert!(validate_positive_number("core_nlp.threads", 0, 1).is_err());
    }

    #[test]
    fn test_validate_memory() {
        assert!(validate_memory("core_nlp.memory", "3g").is_ok());
        assert!(validate_memory("core_nlp.memory", "512M").is_ok());
        assert!(validate_memory("core_nlp.memory", "lots").is_err());
        assert!(validate_memory("core_nlp.memory", "").is_err());
    }

    #[test]
    fn test_validate_required_field() {
        let missing: Option<String> = None;
        let err = validate_required_field("ext_vars.trees_dir", &missing).unwrap_err();
        assert!(matches!(err, BaleenError::MissingConfigError { .. }));
    }
}
