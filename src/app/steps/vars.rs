//! Variable extraction and clean-up steps.
//!
//! Extraction, preprocessing and pruning are done by external executables,
//! one process per file, at most `jobs` at a time. Offsets are added here.

use crate::adapters::process::ExternalCommand;
use crate::config::settings::{ExtVarsSettings, OffsetsSettings, PrepVarsSettings, PruneVarsSettings};
use crate::core::runner::run_bounded;
use crate::domain::model::{read_var_records, write_json_records, StepReport, VarRecord};
use crate::domain::paths::{derive_path, list_files, Derive};
use crate::domain::ports::Step;
use crate::domain::scnlp::ScnlpDocument;
use crate::domain::tree::ParseTree;
use crate::utils::error::{BaleenError, Result};
use crate::utils::validation::Validate;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Split `pairs` of (input, output) into the ones to process and the number
/// skipped because the output exists.
fn pending(pairs: Vec<(PathBuf, PathBuf)>, resume: bool) -> (Vec<(PathBuf, PathBuf)>, usize) {
    if !resume {
        return (pairs, 0);
    }
    let total = pairs.len();
    let todo: Vec<_> = pairs.into_iter().filter(|(_, out)| !out.exists()).collect();
    let skipped = total - todo.len();
    if skipped > 0 {
        tracing::info!("⏭️ resuming: skipping {} files with existing output", skipped);
    }
    (todo, skipped)
}

// ---------------------------------------------------------------------------
// ext_vars
// ---------------------------------------------------------------------------

pub struct ExtVarsStep {
    settings: ExtVarsSettings,
}

impl ExtVarsStep {
    pub fn new(settings: ExtVarsSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self { settings })
    }

    /// `<vars_dir>/<corename>#…#vars.json` for a parse file.
    pub fn vars_path(&self, parse_path: &Path) -> PathBuf {
        derive_path(
            parse_path,
            Derive::default()
                .dir(&self.settings.vars_dir)
                .append(&["vars"])
                .ext("json"),
        )
    }
}

#[async_trait]
impl Step for ExtVarsStep {
    fn name(&self) -> &str {
        "ext_vars"
    }

    async fn run(&self) -> Result<StepReport> {
        let mut report = StepReport::new(self.name());
        tokio::fs::create_dir_all(&self.settings.vars_dir).await?;

        let pairs = list_files(&self.settings.trees_dir, Some("parse"))?
            .into_iter()
            .map(|tree| {
                let vars = self.vars_path(&tree);
                (tree, vars)
            })
            .collect();
        let (todo, skipped) = pending(pairs, self.settings.resume);
        report.skipped = skipped;

        let tasks: Vec<_> = todo
            .into_iter()
            .map(|(tree, vars)| {
                let cmd = ExternalCommand::resolved(&self.settings.extract_vars_exec)
                    .arg(&tree)
                    .arg(&vars);
                async move {
                    cmd.run().await?;
                    Ok(vars)
                }
            })
            .collect();

        for vars in run_bounded(self.settings.jobs, tasks).await? {
            report.output(vars);
        }

        Ok(report.finish())
    }
}

// ---------------------------------------------------------------------------
// offsets
// ---------------------------------------------------------------------------

pub struct OffsetsStep {
    settings: OffsetsSettings,
}

impl OffsetsStep {
    pub fn new(settings: OffsetsSettings) -> Self {
        Self { settings }
    }
}

/// Add `charOffsetBegin`/`charOffsetEnd` to every record. The CoreNLP file
/// of a record is its parse file name with an `.xml` extension in
/// `scnlp_dir`.
pub fn add_offsets(records: &mut [VarRecord], scnlp_dir: &Path) -> Result<()> {
    let mut docs: HashMap<String, ScnlpDocument> = HashMap::new();
    // 每個句子的節點位置只計算一次
    let mut spans: HashMap<(String, usize), Vec<(usize, usize)>> = HashMap::new();

    for record in records.iter_mut() {
        let cache_key = (record.filename.clone(), record.tree_number);

        if !spans.contains_key(&cache_key) {
            if !docs.contains_key(&record.filename) {
                let scnlp_path = derive_path(
                    &record.filename,
                    Derive::default().dir(scnlp_dir).ext("xml"),
                );
                docs.insert(record.filename.clone(), ScnlpDocument::from_file(&scnlp_path)?);
            }
            let doc = &docs[&record.filename];

            let sentence = doc.sentence(record.tree_number).ok_or_else(|| {
                BaleenError::processing(format!(
                    "{} has no sentence {}",
                    record.filename, record.tree_number
                ))
            })?;
            let parse = sentence.parse.as_deref().ok_or_else(|| {
                BaleenError::processing(format!(
                    "sentence {} of {} has no parse",
                    record.tree_number, record.filename
                ))
            })?;
            let node_spans = ParseTree::parse(parse)?.node_spans(&sentence.token_spans())?;
            spans.insert(cache_key.clone(), node_spans);
        }

        let (begin, end) = record
            .node_number
            .checked_sub(1)
            .and_then(|i| spans[&cache_key].get(i).copied())
            .ok_or_else(|| {
                BaleenError::processing(format!(
                    "tree {} of {} has no node {}",
                    record.tree_number, record.filename, record.node_number
                ))
            })?;

        record.char_offset_begin = Some(begin);
        record.char_offset_end = Some(end);
    }

    Ok(())
}

#[async_trait]
impl Step for OffsetsStep {
    fn name(&self) -> &str {
        "offsets"
    }

    async fn run(&self) -> Result<StepReport> {
        let mut report = StepReport::new(self.name());

        for vars_path in list_files(&self.settings.vars_dir, Some("json"))? {
            let mut records = read_var_records(&vars_path)?;

            if self.settings.resume && records.iter().all(VarRecord::has_offsets) {
                report.skip();
                continue;
            }

            add_offsets(&mut records, &self.settings.scnlp_dir)
                .map_err(|e| BaleenError::processing(format!("{}: {}", vars_path.display(), e)))?;
            tracing::info!("writing vars with offsets to {}", vars_path.display());
            write_json_records(&vars_path, &records)?;
            report.output(vars_path);
        }

        Ok(report.finish())
    }
}

// ---------------------------------------------------------------------------
// prep_vars
// ---------------------------------------------------------------------------

pub struct PrepVarsStep {
    settings: PrepVarsSettings,
}

impl PrepVarsStep {
    pub fn new(settings: PrepVarsSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self { settings })
    }
}

/// Drop empty variables and variables from which a node was deleted.
pub fn retain_clean_vars(records: Vec<VarRecord>) -> Vec<VarRecord> {
    records
        .into_iter()
        .filter(|r| !r.sub_str.is_empty() && !r.has_descendants())
        .collect()
}

#[async_trait]
impl Step for PrepVarsStep {
    fn name(&self) -> &str {
        "prep_vars"
    }

    async fn run(&self) -> Result<StepReport> {
        let s = &self.settings;
        let mut report = StepReport::new(self.name());
        tokio::fs::create_dir_all(&s.out_vars_dir).await?;

        // 沒有指定 tmp_dir 時，用一個步驟結束就刪除的暫存目錄
        let mut scratch = None;
        let tmp_dir = match &s.tmp_dir {
            Some(dir) => dir.clone(),
            None => scratch.insert(tempfile::TempDir::new()?).path().to_path_buf(),
        };
        tokio::fs::create_dir_all(&tmp_dir).await?;

        let pairs = list_files(&s.in_vars_dir, Some("json"))?
            .into_iter()
            .map(|input| {
                let output = derive_path(&input, Derive::default().dir(&s.out_vars_dir));
                (input, output)
            })
            .collect();
        let (todo, skipped) = pending(pairs, s.resume);
        report.skipped = skipped;

        let tasks: Vec<_> = todo
            .into_iter()
            .map(|(input, output)| {
                let tmp_file = derive_path(&input, Derive::default().dir(&tmp_dir));
                let cmd = ExternalCommand::resolved(&s.trans_exec)
                    .arg(&input)
                    .arg(&tmp_file)
                    .arg(&s.trans_file);
                async move {
                    cmd.run().await?;
                    let records = retain_clean_vars(read_var_records(&tmp_file)?);
                    write_json_records(&output, &records)?;
                    Ok(output)
                }
            })
            .collect();

        for output in run_bounded(s.jobs, tasks).await? {
            report.output(output);
        }

        Ok(report.finish())
    }
}

// ---------------------------------------------------------------------------
// prune_vars
// ---------------------------------------------------------------------------

pub struct PruneVarsStep {
    settings: PruneVarsSettings,
}

impl PruneVarsStep {
    pub fn new(settings: PruneVarsSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self { settings })
    }
}

#[async_trait]
impl Step for PruneVarsStep {
    fn name(&self) -> &str {
        "prune_vars"
    }

    async fn run(&self) -> Result<StepReport> {
        let s = &self.settings;
        let mut report = StepReport::new(self.name());
        tokio::fs::create_dir_all(&s.out_vars_dir).await?;

        let pairs = list_files(&s.in_vars_dir, Some("json"))?
            .into_iter()
            .map(|input| {
                let output = derive_path(&input, Derive::default().dir(&s.out_vars_dir));
                (input, output)
            })
            .collect();
        let (todo, skipped) = pending(pairs, s.resume);
        report.skipped = skipped;

        let tasks: Vec<_> = todo
            .into_iter()
            .map(|(input, output)| {
                let cmd = ExternalCommand::resolved(&s.prune_vars_exec)
                    .split_args(&s.options)
                    .arg(&input)
                    .arg(&output);
                async move {
                    cmd.run().await?;
                    Ok(output)
                }
            })
            .collect();

        for output in run_bounded(s.jobs, tasks).await? {
            report.output(output);
        }

        Ok(report.finish())
    }
}
