use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A variable extracted from a change/increase/decrease event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VarRecord {
    pub key: String,
    pub filename: String,
    pub tree_number: usize,
    pub node_number: usize,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub sub_str: String,
    #[serde(default)]
    pub extract_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub char_offset_begin: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub char_offset_end: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ancestor: Option<String>,
    /// 由外部工具產生、我們不需要解讀的欄位，原樣保留
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl VarRecord {
    /// The transform deleted nodes from this variable. The key counts even
    /// when its value is `null`.
    pub fn has_descendants(&self) -> bool {
        self.extra.contains_key("descendants")
    }

    pub fn has_offsets(&self) -> bool {
        self.char_offset_begin.is_some() && self.char_offset_end.is_some()
    }

    /// Transformed by something other than preprocessing, i.e. entailed by
    /// its ancestor.
    pub fn is_tentailed(&self) -> bool {
        self.transform_name
            .as_deref()
            .is_some_and(|name| !name.starts_with("PreProc"))
    }
}

pub fn read_var_records(path: impl AsRef<Path>) -> crate::Result<Vec<VarRecord>> {
    let content = std::fs::read_to_string(path.as_ref())?;
    Ok(serde_json::from_str(&content)?)
}

pub fn write_json_records<T: Serialize>(path: impl AsRef<Path>, records: &[T]) -> crate::Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(records)?;
    std::fs::write(path.as_ref(), json)?;
    Ok(())
}

/// A relation between two tagged variables found by a tree pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationRecord {
    pub filename: String,
    pub sentence_id: String,
    pub from_node_id: String,
    pub to_node_id: String,
    pub pattern_name: String,
    pub relation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleMetadata {
    pub doi: String,
    pub title: Option<String>,
    pub journal: Option<String>,
    pub year: Option<i64>,
    pub month: Option<i64>,
    pub day: Option<i64>,
    #[serde(rename = "ISSN")]
    pub issn: Option<String>,
    pub publisher: Option<String>,
}

impl ArticleMetadata {
    /// Every field was found.
    pub fn is_complete(&self) -> bool {
        self.title.is_some()
            && self.journal.is_some()
            && self.year.is_some()
            && self.month.is_some()
            && self.day.is_some()
            && self.issn.is_some()
            && self.publisher.is_some()
    }
}

/// Outcome of one pipeline step.
#[derive(Debug, Clone)]
pub struct StepReport {
    pub step_name: String,
    pub processed: usize,
    pub skipped: usize,
    pub outputs: Vec<PathBuf>,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

impl StepReport {
    pub fn new(step_name: &str) -> Self {
        Self {
            step_name: step_name.to_string(),
            processed: 0,
            skipped: 0,
            outputs: Vec::new(),
            started_at: Utc::now(),
            duration: Duration::ZERO,
        }
    }

    pub fn output(&mut self, path: impl Into<PathBuf>) {
        self.processed += 1;
        self.outputs.push(path.into());
    }

    pub fn skip(&mut self) {
        self.skipped += 1;
    }

    pub fn finish(mut self) -> Self {
        self.duration = (Utc::now() - self.started_at).to_std().unwrap_or_default();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_record_keeps_unknown_fields() {
        let json = r#"{
            "key": "doc.parse:1:3:OBJ_increase",
            "filename": "doc.parse",
            "treeNumber": 1,
            "nodeNumber": 3,
            "label": "increase",
            "subStr": "growth",
            "extractName": "OBJ_increase",
            "tokens": ["growth"]
        }"#;
        let record: VarRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.sub_str, "growth");
        assert!(!record.has_offsets());
        assert!(record.extra.contains_key("tokens"));

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["tokens"][0], "growth");
        assert!(back.get("charOffsetBegin").is_none());
    }

    #[test]
    fn test_null_descendants_still_present() {
        let record: VarRecord = serde_json::from_value(serde_json::json!({
            "key": "k", "filename": "f", "treeNumber": 1, "nodeNumber": 1, "descendants": null
        }))
        .unwrap();
        assert!(record.has_descendants());
        assert_eq!(serde_json::to_value(&record).unwrap()["descendants"], serde_json::Value::Null);

        let plain: VarRecord = serde_json::from_value(serde_json::json!({
            "key": "k", "filename": "f", "treeNumber": 1, "nodeNumber": 1
        }))
        .unwrap();
        assert!(!plain.has_descendants());
    }

    #[test]
    fn test_tentailed() {
        let mut record: VarRecord = serde_json::from_value(serde_json::json!({
            "key": "k", "filename": "f", "treeNumber": 1, "nodeNumber": 1
        }))
        .unwrap();
        assert!(!record.is_tentailed());
        record.transform_name = Some("PreProcDeleteDT".to_string());
        assert!(!record.is_tentailed());
        record.transform_name = Some("DelMod".to_string());
        assert!(record.is_tentailed());
    }
}
