//! CSV files in the neo4j-import header format.
//!
//! Node files go to `nodes_dir`, relationship files to `relations_dir`.
//! Relationship files without an explicit header use
//! `:START_ID,:END_ID,:TYPE`.

use crate::adapters::crossref::{CrossRefClient, FileCache};
use crate::config::settings::{ArtsCsvSettings, RelsCsvSettings, ToCsvSettings, UniqNodesSettings};
use crate::domain::model::{read_var_records, ArticleMetadata, RelationRecord, StepReport};
use crate::domain::paths::{derive_path, get_doi, list_files, sentence_id, Derive};
use crate::domain::ports::Step;
use crate::domain::scnlp::{char_slice, ScnlpDocument};
use crate::utils::error::{BaleenError, Result};
use crate::utils::validation::Validate;
use async_trait::async_trait;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const RELATION_HEADER: [&str; 3] = [":START_ID", ":END_ID", ":TYPE"];

type CsvWriter = csv::Writer<File>;

fn create_csv_file(dir: &Path, name: &str, header: &[&str]) -> Result<(CsvWriter, PathBuf)> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(name);
    tracing::info!("creating {}", path.display());
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(header)?;
    Ok((writer, path))
}

fn write_row(writer: &mut CsvWriter, fields: &[&str]) -> Result<()> {
    writer.write_record(fields)?;
    Ok(())
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// DOI to text file; the first file seen wins.
pub fn doi_to_text_file(text_dir: &Path) -> Result<HashMap<String, PathBuf>> {
    let mut doi2txt: HashMap<String, PathBuf> = HashMap::new();

    for path in list_files(text_dir, None)? {
        let doi = get_doi(&path);
        match doi2txt.get(&doi) {
            Some(existing) => tracing::error!(
                "DOI {} already mapped to text file {}; ignoring text file {}",
                doi,
                existing.display(),
                path.display()
            ),
            None => {
                doi2txt.insert(doi, path);
            }
        }
    }

    Ok(doi2txt)
}

fn limited(files: Vec<PathBuf>, max_n: Option<usize>) -> Vec<PathBuf> {
    match max_n {
        Some(n) => files.into_iter().take(n).collect(),
        None => files,
    }
}

// ---------------------------------------------------------------------------
// tocsv
// ---------------------------------------------------------------------------

pub struct ToCsvStep {
    settings: ToCsvSettings,
}

impl ToCsvStep {
    pub fn new(settings: ToCsvSettings) -> Self {
        Self { settings }
    }
}

struct VarTables {
    sentences: CsvWriter,
    variables: CsvWriter,
    events: CsvWriter,
    has_sent: CsvWriter,
    has_var: CsvWriter,
    has_event: CsvWriter,
    tentails_var: CsvWriter,
    paths: Vec<PathBuf>,
}

impl VarTables {
    fn create(nodes_dir: &Path, relations_dir: &Path) -> Result<Self> {
        let mut paths = Vec::new();
        let mut open = |dir: &Path, name: &str, header: &[&str]| -> Result<CsvWriter> {
            let (writer, path) = create_csv_file(dir, name, header)?;
            paths.push(path);
            Ok(writer)
        };

        Ok(Self {
            sentences: open(
                nodes_dir,
                "sentences.csv",
                &["sentID:ID", "treeNumber:int", "charOffsetBegin:int", "charOffsetEnd:int", "sentChars", ":LABEL"],
            )?,
            variables: open(nodes_dir, "variables.csv", &["subStr:ID", ":LABEL"])?,
            events: open(
                nodes_dir,
                "events.csv",
                &[
                    "eventID:ID",
                    "filename",
                    "nodeNumber:int",
                    "extractName",
                    "charOffsetBegin:int",
                    "charOffsetEnd:int",
                    "direction",
                    ":LABEL",
                ],
            )?,
            has_sent: open(relations_dir, "has_sent.csv", &RELATION_HEADER)?,
            has_var: open(relations_dir, "has_var.csv", &RELATION_HEADER)?,
            has_event: open(relations_dir, "has_event.csv", &RELATION_HEADER)?,
            tentails_var: open(
                relations_dir,
                "tentails_var.csv",
                &[":START_ID", ":END_ID", "transformName", ":TYPE"],
            )?,
            paths,
        })
    }

    fn flush(&mut self) -> Result<()> {
        for writer in [
            &mut self.sentences,
            &mut self.variables,
            &mut self.events,
            &mut self.has_sent,
            &mut self.has_var,
            &mut self.has_event,
            &mut self.tentails_var,
        ] {
            writer.flush()?;
        }
        Ok(())
    }
}

/// `Change` for `change`.
fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// neo4j-import fails on newlines in fields.
fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

#[async_trait]
impl Step for ToCsvStep {
    fn name(&self) -> &str {
        "tocsv"
    }

    async fn run(&self) -> Result<StepReport> {
        let s = &self.settings;
        let mut report = StepReport::new(self.name());
        let mut tables = VarTables::create(&s.nodes_dir, &s.relations_dir)?;
        let doi2txt = doi_to_text_file(&s.text_dir)?;
        let mut variable_types: HashSet<String> = HashSet::new();

        for vars_path in limited(list_files(&s.vars_dir, Some("json"))?, s.max_n_vars) {
            let records = read_var_records(&vars_path)?;
            let Some(first) = records.first() else {
                tracing::warn!("skipping empty variables file: {}", vars_path.display());
                report.skip();
                continue;
            };
            tracing::info!("processing variables from file: {}", vars_path.display());

            let doi = get_doi(&vars_path);
            let Some(text_path) = doi2txt.get(&doi) else {
                tracing::error!("no matching text file for DOI {}", doi);
                report.skip();
                continue;
            };
            let text = std::fs::read_to_string(text_path)?;

            let scnlp_path = derive_path(&first.filename, Derive::default().dir(&s.scnlp_dir).ext("xml"));
            let doc = ScnlpDocument::from_file(&scnlp_path)?;

            let mut tree_number = None;
            let mut sent_id = String::new();
            // key → subStr，TENTAILS_VAR 需要祖先的變數型別
            let mut key2var: HashMap<&str, &str> = HashMap::new();

            for rec in &records {
                if tree_number != Some(rec.tree_number) {
                    tree_number = Some(rec.tree_number);
                    sent_id = sentence_id(&doi, rec.tree_number);

                    let (begin, end) = doc
                        .sentence(rec.tree_number)
                        .and_then(|sentence| sentence.span())
                        .ok_or_else(|| {
                            BaleenError::processing(format!(
                                "{} has no tokens for sentence {}",
                                scnlp_path.display(),
                                rec.tree_number
                            ))
                        })?;
                    let sent_chars = single_line(&char_slice(&text, begin, end));

                    write_row(&mut tables.sentences, &[
                        sent_id.as_str(),
                        &rec.tree_number.to_string(),
                        &begin.to_string(),
                        &end.to_string(),
                        &sent_chars,
                        "Sentence",
                    ])?;
                    write_row(&mut tables.has_sent, &[doi.as_str(), &sent_id, "HAS_SENT"])?;
                }

                let var_type = rec.sub_str.as_str();
                key2var.insert(&rec.key, var_type);

                if variable_types.insert(var_type.to_string()) {
                    write_row(&mut tables.variables, &[var_type, "VariableType"])?;
                }

                if rec.is_tentailed() {
                    let transform_name = rec.transform_name.as_deref().unwrap_or_default();
                    let ancestor_type = rec.ancestor.as_deref().and_then(|a| key2var.get(a).copied());
                    match ancestor_type {
                        Some(ancestor_type) => write_row(&mut tables.tentails_var, &[
                            ancestor_type,
                            var_type,
                            transform_name,
                            "TENTAILS_VAR",
                        ])?,
                        None => tracing::error!(
                            "skipping tentailed variable {}: unknown ancestor {:?}",
                            rec.key,
                            rec.ancestor
                        ),
                    }
                } else {
                    let event_labels = format!("EventInst;{}Inst", capitalize(&rec.label));
                    write_row(&mut tables.events, &[
                        rec.key.as_str(),
                        &rec.filename,
                        &rec.node_number.to_string(),
                        &rec.extract_name,
                        &opt(rec.char_offset_begin),
                        &opt(rec.char_offset_end),
                        &rec.label,
                        &event_labels,
                    ])?;
                    write_row(&mut tables.has_event, &[sent_id.as_str(), &rec.key, "HAS_EVENT"])?;
                    write_row(&mut tables.has_var, &[rec.key.as_str(), var_type, "HAS_VAR"])?;
                }
            }

            report.processed += 1;
        }

        tables.flush()?;
        report.outputs = std::mem::take(&mut tables.paths);
        Ok(report.finish())
    }
}

// ---------------------------------------------------------------------------
// artscsv
// ---------------------------------------------------------------------------

pub struct ArtsCsvStep {
    settings: ArtsCsvSettings,
    client: CrossRefClient,
}

impl ArtsCsvStep {
    pub fn new(settings: ArtsCsvSettings) -> Result<Self> {
        settings.validate()?;
        let client = CrossRefClient::new(&settings.doi_url, &settings.issn_url)
            .with_style(&settings.style)
            .with_attempts(settings.attempts)
            .with_online(settings.online);
        Ok(Self { settings, client })
    }
}

/// Trim and collapse runs of whitespace to a single space.
pub fn collapse_whitespace(text: &str) -> String {
    static WS_RE: OnceLock<Regex> = OnceLock::new();
    let re = WS_RE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"));
    re.replace_all(text.trim(), " ").into_owned()
}

fn normalize_metadata(metadata: &mut ArticleMetadata) {
    for field in [
        &mut metadata.title,
        &mut metadata.journal,
        &mut metadata.issn,
        &mut metadata.publisher,
    ] {
        if let Some(value) = field.as_mut() {
            *value = collapse_whitespace(value);
        }
    }
}

#[async_trait]
impl Step for ArtsCsvStep {
    fn name(&self) -> &str {
        "artscsv"
    }

    async fn run(&self) -> Result<StepReport> {
        let s = &self.settings;
        let mut report = StepReport::new(self.name());
        let (mut articles, articles_path) = create_csv_file(
            &s.nodes_dir,
            "articles.csv",
            &[
                "doi:ID",
                "filename",
                "title",
                "journal",
                "year",
                "month",
                "day",
                "ISSN",
                "publisher",
                "citation",
                ":LABEL",
            ],
        )?;

        let doi2txt = doi_to_text_file(&s.text_dir)?;
        let meta_cache = FileCache::open(&s.meta_cache_dir)?;
        let cit_cache = FileCache::open(&s.cit_cache_dir)?;

        for vars_path in limited(list_files(&s.vars_dir, Some("json"))?, s.max_n) {
            let doi = get_doi(&vars_path);
            let Some(text_path) = doi2txt.get(&doi) else {
                tracing::error!("no matching text file for DOI {}", doi);
                report.skip();
                continue;
            };

            let mut metadata = self.client.get_all_metadata(&doi, &meta_cache).await?;
            normalize_metadata(&mut metadata);
            let citation = collapse_whitespace(&self.client.get_citation(&doi, &cit_cache).await?);

            write_row(&mut articles, &[
                doi.as_str(),
                &text_path.display().to_string(),
                &opt(metadata.title),
                &opt(metadata.journal),
                &opt(metadata.year),
                &opt(metadata.month),
                &opt(metadata.day),
                &opt(metadata.issn),
                &opt(metadata.publisher),
                &citation,
                "Article",
            ])?;
            report.processed += 1;
        }

        articles.flush()?;
        report.outputs.push(articles_path);
        Ok(report.finish())
    }
}

// ---------------------------------------------------------------------------
// relscsv
// ---------------------------------------------------------------------------

pub struct RelsCsvStep {
    settings: RelsCsvSettings,
}

impl RelsCsvStep {
    pub fn new(settings: RelsCsvSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Step for RelsCsvStep {
    fn name(&self) -> &str {
        "relscsv"
    }

    async fn run(&self) -> Result<StepReport> {
        let s = &self.settings;
        let mut report = StepReport::new(self.name());

        let (mut causations, causations_path) =
            create_csv_file(&s.nodes_dir, "causations.csv", &[":ID", "patternName", ":LABEL"])?;
        let (mut has_cause, has_cause_path) = create_csv_file(&s.relations_dir, "has_cause.csv", &RELATION_HEADER)?;
        let (mut has_effect, has_effect_path) =
            create_csv_file(&s.relations_dir, "has_effect.csv", &RELATION_HEADER)?;
        let (mut has_event, has_event_path) =
            create_csv_file(&s.relations_dir, "has_event2.csv", &RELATION_HEADER)?;

        // 整個集合共用一個計數器，確保 id 唯一
        let mut causation_n = 0usize;

        for rels_path in limited(list_files(&s.rels_dir, Some("json"))?, s.max_n) {
            tracing::info!("adding CausationInst from file {}", rels_path.display());
            let doi = get_doi(&rels_path);
            let content = std::fs::read_to_string(&rels_path)?;
            let records: Vec<RelationRecord> = serde_json::from_str(&content)?;

            for rec in records {
                let causation_id = format!("{}/CausationInst/{}", doi, causation_n);
                write_row(&mut causations, &[causation_id.as_str(), &rec.pattern_name, "CausationInst"])?;
                write_row(&mut has_cause, &[causation_id.as_str(), &rec.from_node_id, "HAS_CAUSE"])?;
                write_row(&mut has_effect, &[causation_id.as_str(), &rec.to_node_id, "HAS_EFFECT"])?;
                write_row(&mut has_event, &[rec.sentence_id.as_str(), &causation_id, "HAS_EVENT"])?;
                causation_n += 1;
            }
            report.processed += 1;
        }

        for writer in [&mut causations, &mut has_cause, &mut has_effect, &mut has_event] {
            writer.flush()?;
        }
        tracing::info!("📊 wrote {} causations", causation_n);
        report.outputs = vec![causations_path, has_cause_path, has_effect_path, has_event_path];
        Ok(report.finish())
    }
}

// ---------------------------------------------------------------------------
// uniq_nodes
// ---------------------------------------------------------------------------

pub struct UniqNodesStep {
    settings: UniqNodesSettings,
}

impl UniqNodesStep {
    pub fn new(settings: UniqNodesSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self { settings })
    }
}

/// Merge same-named CSV files: one header, then every distinct line in order
/// of first appearance.
pub fn merge_unique_lines(paths: &[PathBuf]) -> Result<String> {
    let mut header: Option<String> = None;
    let mut seen: HashSet<String> = HashSet::new();
    let mut lines: Vec<String> = Vec::new();

    for path in paths {
        let content = std::fs::read_to_string(path)?;
        let mut iter = content.lines();
        let file_header = iter.next().unwrap_or_default();

        match &header {
            Some(h) if h != file_header => {
                return Err(BaleenError::processing(format!(
                    "header of {} differs from earlier files: '{}' vs '{}'",
                    path.display(),
                    file_header,
                    h
                )));
            }
            Some(_) => {}
            None => header = Some(file_header.to_string()),
        }

        for line in iter {
            if seen.insert(line.to_string()) {
                lines.push(line.to_string());
            }
        }
    }

    let mut out = header.unwrap_or_default();
    out.push('\n');
    for line in lines {
        out.push_str(&line);
        out.push('\n');
    }
    Ok(out)
}

#[async_trait]
impl Step for UniqNodesStep {
    fn name(&self) -> &str {
        "uniq_nodes"
    }

    async fn run(&self) -> Result<StepReport> {
        let mut report = StepReport::new(self.name());
        let mut by_name: std::collections::BTreeMap<String, Vec<PathBuf>> = Default::default();

        for dir in &self.settings.in_dirs {
            for path in list_files(dir, Some("csv"))? {
                tracing::info!("reading non-unique csv nodes from {}", path.display());
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                by_name.entry(name).or_default().push(path);
            }
        }

        tokio::fs::create_dir_all(&self.settings.out_dir).await?;
        for (name, paths) in by_name {
            let merged = merge_unique_lines(&paths)?;
            let out_path = self.settings.out_dir.join(&name);
            tracing::info!("writing unique csv nodes to {}", out_path.display());
            tokio::fs::write(&out_path, merged).await?;
            report.output(out_path);
        }

        Ok(report.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("increase"), "Increase");
        assert_eq!(capitalize("CHANGE"), "Change");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  Ocean \n warming\t rates "), "Ocean warming rates");
    }

    #[test]
    fn test_single_line() {
        assert_eq!(single_line("a\r\nb\nc"), "a  b c");
    }

    #[test]
    fn test_doi_to_text_file_first_wins() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("10.1%2Fa#abs.txt"), "x").unwrap();
        std::fs::write(temp_dir.path().join("10.1%2Fa.txt"), "y").unwrap();
        std::fs::write(temp_dir.path().join("10.1%2Fb.txt"), "z").unwrap();

        let doi2txt = doi_to_text_file(temp_dir.path()).unwrap();
        assert_eq!(doi2txt.len(), 2);
        // '#' sorts before '.'
        assert_eq!(doi2txt["10.1/a"], temp_dir.path().join("10.1%2Fa#abs.txt"));
    }

    #[test]
    fn test_merge_unique_lines() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a.csv");
        let b = temp_dir.path().join("b.csv");
        std::fs::write(&a, "subStr:ID,:LABEL\ngrowth,VariableType\nrain,VariableType\n").unwrap();
        std::fs::write(&b, "subStr:ID,:LABEL\nrain,VariableType\nheat,VariableType\n").unwrap();

        let merged = merge_unique_lines(&[a.clone(), b]).unwrap();
        assert_eq!(
            merged,
            "subStr:ID,:LABEL\ngrowth,VariableType\nrain,VariableType\nheat,VariableType\n"
        );

        let c = temp_dir.path().join("c.csv");
        std::fs::write(&c, "doi:ID,:LABEL\n").unwrap();
        assert!(merge_unique_lines(&[a, c]).is_err());
    }
}
