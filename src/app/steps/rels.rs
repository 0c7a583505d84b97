//! Relation extraction with tree patterns.
//!
//! Variable nodes are first tagged in the parse trees with `_VAR_<key>`
//! label suffixes, so Tregex can match them and report which variables a
//! pattern connected.

use crate::adapters::process::ExternalCommand;
use crate::config::ini_config::IniConfig;
use crate::config::settings::{ExtRelsSettings, TagVarsSettings};
use crate::domain::model::{read_var_records, write_json_records, RelationRecord, StepReport, VarRecord};
use crate::domain::paths::{derive_path, get_doi, list_files, sentence_id, Derive};
use crate::domain::ports::Step;
use crate::domain::tree::ParseTree;
use crate::utils::error::{BaleenError, Result};
use crate::utils::validation::Validate;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const VAR_MARKER: &str = "_VAR_";

// ---------------------------------------------------------------------------
// tag_vars
// ---------------------------------------------------------------------------

pub struct TagVarsStep {
    settings: TagVarsSettings,
}

impl TagVarsStep {
    pub fn new(settings: TagVarsSettings) -> Self {
        Self { settings }
    }
}

/// Variables per tree number as (nodeNumber, key), trees in order of first
/// appearance.
fn group_by_tree(records: &[VarRecord]) -> Vec<(usize, Vec<(usize, String)>)> {
    let mut groups: Vec<(usize, Vec<(usize, String)>)> = Vec::new();
    for record in records {
        let pair = (record.node_number, record.key.clone());
        match groups.iter_mut().find(|(tree, _)| *tree == record.tree_number) {
            Some((_, pairs)) => pairs.push(pair),
            None => groups.push((record.tree_number, vec![pair])),
        }
    }
    groups
}

/// Tagged trees, one per line, for the trees of `parses` holding at least
/// two variables.
pub fn tag_trees(records: &[VarRecord], parses: &[&str]) -> Result<Vec<String>> {
    let mut tagged = Vec::new();

    for (tree_number, pairs) in group_by_tree(records) {
        if pairs.len() < 2 {
            continue;
        }

        let line = tree_number
            .checked_sub(1)
            .and_then(|i| parses.get(i))
            .ok_or_else(|| BaleenError::processing(format!("no parse tree {}", tree_number)))?;
        let mut tree = ParseTree::parse(line)?;
        let mut vars_count = 0;

        for (node_number, key) in pairs {
            let Some(node) = tree.node_mut(node_number) else {
                tracing::error!("skipping variable {}: tree {} has no node {}", key, tree_number, node_number);
                continue;
            };
            if node.is_leaf() {
                tracing::error!(
                    "skipping variable \"{}\" because it is a leaf node ({})",
                    node.label,
                    key
                );
                continue;
            }
            node.label = format!("{}{}{}", node.label, VAR_MARKER, key);
            vars_count += 1;
        }

        if vars_count > 1 {
            tagged.push(tree.to_string());
        }
    }

    Ok(tagged)
}

#[async_trait]
impl Step for TagVarsStep {
    fn name(&self) -> &str {
        "tag_vars"
    }

    async fn run(&self) -> Result<StepReport> {
        let mut report = StepReport::new(self.name());
        tokio::fs::create_dir_all(&self.settings.tagged_dir).await?;

        for vars_path in list_files(&self.settings.vars_dir, Some("json"))? {
            let records = read_var_records(&vars_path)?;
            // 至少要有兩個變數才可能有關係
            let Some(last) = records.last().filter(|_| records.len() > 1) else {
                report.skip();
                continue;
            };

            let parses_path = self.settings.trees_dir.join(&last.filename);
            tracing::info!("reading parses from {}", parses_path.display());
            let content = tokio::fs::read_to_string(&parses_path).await?;
            let parses: Vec<&str> = content.lines().collect();

            let tagged = tag_trees(&records, &parses)
                .map_err(|e| BaleenError::processing(format!("{}: {}", parses_path.display(), e)))?;
            if tagged.is_empty() {
                report.skip();
                continue;
            }

            let tagged_path = derive_path(&last.filename, Derive::default().dir(&self.settings.tagged_dir));
            tracing::info!("writing tagged trees to {}", tagged_path.display());
            let mut out = tagged.join("\n");
            out.push('\n');
            tokio::fs::write(&tagged_path, out).await?;
            report.output(tagged_path);
        }

        Ok(report.finish())
    }
}

// ---------------------------------------------------------------------------
// ext_rels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationPattern {
    pub name: String,
    pub pattern: String,
    pub relation: String,
}

/// Read pattern definitions from an INI file, or from every file in a
/// directory. Each section is a pattern:
///
/// ```ini
/// [CAUSE_1]
/// pattern = S <<# cause << /^NP_VAR/=from << (/^NP_VAR/=to ,, =from)
/// relation = cause
/// ```
pub fn read_patterns(pattern_path: &Path) -> Result<Vec<RelationPattern>> {
    let files = if pattern_path.is_dir() {
        list_files(pattern_path, None)?
    } else {
        vec![pattern_path.to_path_buf()]
    };

    let mut config = IniConfig::new();
    for file in &files {
        tracing::info!("reading relation extraction patterns from {}", file.display());
        config.read_file(file)?;
    }

    let mut patterns = Vec::new();
    for name in config.section_names() {
        // patterns are Tregex syntax, never interpolated
        let section = config.raw_section(&name)?;
        let missing = |key: &str| BaleenError::ConfigValidationError {
            field: format!("{}.{}", name, key),
            message: "pattern definitions need a pattern and a relation".to_string(),
        };
        patterns.push(RelationPattern {
            pattern: section.get("pattern")?.ok_or_else(|| missing("pattern"))?,
            relation: section.get("relation")?.ok_or_else(|| missing("relation"))?,
            name,
        });
    }

    Ok(patterns)
}

/// Relation records from Tregex output: lines come in (from, to) pairs of
/// tagged node labels.
pub fn parse_matches(output: &str, pattern: &RelationPattern) -> Vec<RelationRecord> {
    let lines: Vec<&str> = output.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    if lines.len() % 2 != 0 {
        tracing::warn!("odd number of match lines for pattern {}; ignoring the last one", pattern.name);
    }

    lines
        .chunks_exact(2)
        .filter_map(|pair| {
            let from = var_key(pair[0])?;
            let to = var_key(pair[1])?;
            let mut parts = from.split(':');
            let filename = parts.next()?.to_string();
            let tree_number: usize = parts.next()?.parse().ok()?;
            Some(RelationRecord {
                sentence_id: sentence_id(&get_doi(&filename), tree_number),
                filename,
                from_node_id: from.to_string(),
                to_node_id: to.to_string(),
                pattern_name: pattern.name.clone(),
                relation: pattern.relation.clone(),
            })
        })
        .collect()
}

/// The variable key after the last `_VAR_` marker of a node label.
fn var_key(label: &str) -> Option<&str> {
    label.rsplit_once(VAR_MARKER).map(|(_, key)| key)
}

pub struct ExtRelsStep {
    settings: ExtRelsSettings,
}

impl ExtRelsStep {
    pub fn new(settings: ExtRelsSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self { settings })
    }

    pub fn tregex_command(&self, pattern: &str) -> ExternalCommand {
        let s = &self.settings;
        ExternalCommand::new(&s.java)
            .arg(format!("-Xmx{}", s.memory))
            .arg("-cp")
            .arg(format!("{}/*", s.class_path.display()))
            .arg("edu.stanford.nlp.trees.tregex.TregexPattern")
            .arg("-u")
            .args(["-h", "from", "-h", "to"])
            .arg(pattern)
            .arg(&s.tagged_dir)
    }

    fn rels_path(&self, filename: &str) -> PathBuf {
        derive_path(
            filename,
            Derive::default()
                .dir(&self.settings.rels_dir)
                .append(&["rels"])
                .ext("json"),
        )
    }
}

#[async_trait]
impl Step for ExtRelsStep {
    fn name(&self) -> &str {
        "ext_rels"
    }

    async fn run(&self) -> Result<StepReport> {
        let mut report = StepReport::new(self.name());
        let patterns = read_patterns(&self.settings.pattern_path)?;
        let mut by_file: BTreeMap<String, Vec<RelationRecord>> = BTreeMap::new();

        for pattern in &patterns {
            let output = self.tregex_command(&pattern.pattern).run().await?;
            let records = parse_matches(&output.stdout, pattern);
            tracing::info!("📊 pattern {} matched {} relations", pattern.name, records.len());
            for record in records {
                by_file.entry(record.filename.clone()).or_default().push(record);
            }
        }

        tokio::fs::create_dir_all(&self.settings.rels_dir).await?;
        for (filename, records) in by_file {
            let rels_path = self.rels_path(&filename);
            tracing::info!("writing extracted relations to {}", rels_path.display());
            write_json_records(&rels_path, &records)?;
            report.output(rels_path);
        }

        Ok(report.finish())
    }
}
