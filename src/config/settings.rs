//! Per-step settings.
//!
//! Every option is resolved in the same order: an explicit command line
//! argument, then `<step>.<option>` from the configuration section, then the
//! built-in default. `--resume` flags toggle whatever the configuration says.

use crate::config::ini_config::ConfigSection;
use crate::utils::error::{BaleenError, Result};
use crate::utils::validation::{
    validate_memory, validate_non_empty_string, validate_path, validate_positive_number,
    validate_url, Validate,
};
use std::path::PathBuf;
use std::time::Duration;

pub const CORENLP_HOME_VAR: &str = "CORENLP_HOME";
pub const CORENLP_VER_VAR: &str = "CORENLP_VER";
pub const DEFAULT_CORENLP_VERSION: &str = "3.5.1";
pub const DEFAULT_ANNOTATORS: &str = "tokenize,ssplit,pos,lemma,parse";
pub const DEFAULT_MEMORY: &str = "3g";
pub const DEFAULT_JAVA: &str = "java";
pub const DEFAULT_OUTPUT_EXT: &str = ".xml";
pub const DEFAULT_PRUNE_OPTIONS: &str = "--unique";
pub const DEFAULT_BOLT_ADDRESS: &str = "localhost:7687";
pub const DEFAULT_NEO4J_USER: &str = "neo4j";
pub const DEFAULT_NEO4J_PASSWORD: &str = "neo4j";

/// Looks up `<step>.<option>` values in a configuration section.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    section: &'a ConfigSection,
    step: &'a str,
}

impl<'a> Resolver<'a> {
    pub fn new(section: &'a ConfigSection, step: &'a str) -> Self {
        Self { section, step }
    }

    pub fn key(&self, option: &str) -> String {
        format!("{}.{}", self.step, option)
    }

    pub fn string(&self, cli: Option<String>, option: &str) -> Result<Option<String>> {
        match cli.filter(|v| !v.is_empty()) {
            Some(value) => Ok(Some(value)),
            None => self.section.get(&self.key(option)),
        }
    }

    pub fn string_or(&self, cli: Option<String>, option: &str, default: &str) -> Result<String> {
        Ok(self
            .string(cli, option)?
            .unwrap_or_else(|| default.to_string()))
    }

    pub fn required_string(&self, cli: Option<String>, option: &str) -> Result<String> {
        self.string(cli, option)?
            .ok_or_else(|| BaleenError::MissingConfigError {
                field: self.key(option),
            })
    }

    pub fn path(&self, cli: Option<PathBuf>, option: &str) -> Result<Option<PathBuf>> {
        match cli.filter(|p| !p.as_os_str().is_empty()) {
            Some(path) => Ok(Some(path)),
            None => self.section.get_path(&self.key(option)),
        }
    }

    pub fn required_path(&self, cli: Option<PathBuf>, option: &str) -> Result<PathBuf> {
        self.path(cli, option)?
            .ok_or_else(|| BaleenError::MissingConfigError {
                field: self.key(option),
            })
    }

    pub fn usize(&self, cli: Option<usize>, option: &str) -> Result<Option<usize>> {
        match cli {
            Some(value) => Ok(Some(value)),
            None => self.section.get_usize(&self.key(option)),
        }
    }

    pub fn usize_or(&self, cli: Option<usize>, option: &str, default: usize) -> Result<usize> {
        Ok(self.usize(cli, option)?.unwrap_or(default))
    }

    pub fn bool_or(&self, cli: Option<bool>, option: &str, default: bool) -> Result<bool> {
        match cli {
            Some(value) => Ok(value),
            None => Ok(self.section.get_bool(&self.key(option))?.unwrap_or(default)),
        }
    }

    /// A flag that inverts the configured value when given.
    pub fn toggle(&self, toggled: bool, option: &str, default: bool) -> Result<bool> {
        Ok(self.bool_or(None, option, default)? ^ toggled)
    }
}

fn timeout_from_secs(secs: Option<usize>) -> Option<Duration> {
    secs.filter(|&s| s > 0).map(|s| Duration::from_secs(s as u64))
}

// ---------------------------------------------------------------------------
// CoreNLP
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
pub struct CoreNlpArgs {
    /// Input: a directory (all *.txt files), a file or a comma-separated list of files
    pub input: Option<String>,
    #[cfg_attr(feature = "cli", arg(long))]
    pub out_dir: Option<PathBuf>,
    /// Comma-separated CoreNLP annotators
    #[cfg_attr(feature = "cli", arg(long))]
    pub annotators: Option<String>,
    /// Directory with the CoreNLP jar files (defaults to $CORENLP_HOME)
    #[cfg_attr(feature = "cli", arg(long))]
    pub class_path: Option<PathBuf>,
    /// CoreNLP version used in output stamps (defaults to $CORENLP_VER)
    #[cfg_attr(feature = "cli", arg(long))]
    pub version: Option<String>,
    /// Maximum Java heap size, e.g. 3g
    #[cfg_attr(feature = "cli", arg(long))]
    pub memory: Option<String>,
    #[cfg_attr(feature = "cli", arg(long))]
    pub threads: Option<usize>,
    #[cfg_attr(feature = "cli", arg(long))]
    pub replace_ext: Option<bool>,
    #[cfg_attr(feature = "cli", arg(long))]
    pub output_ext: Option<String>,
    /// Extra CoreNLP options
    #[cfg_attr(feature = "cli", arg(long, allow_hyphen_values = true))]
    pub options: Option<String>,
    /// Stamp output files with the CoreNLP version
    #[cfg_attr(feature = "cli", arg(long))]
    pub stamp: Option<bool>,
    /// Toggle default for resuming process
    #[cfg_attr(feature = "cli", arg(short, long))]
    pub resume: bool,
    /// Use the shift-reduce constituency parser
    #[cfg_attr(feature = "cli", arg(long))]
    pub use_sr_parser: Option<bool>,
    /// Kill CoreNLP after this many seconds (0 means never)
    #[cfg_attr(feature = "cli", arg(long))]
    pub timeout: Option<usize>,
    /// Java executable
    #[cfg_attr(feature = "cli", arg(long))]
    pub java: Option<String>,
}

/// Step-specific defaults of the CoreNLP steps.
#[derive(Debug, Clone, Copy)]
pub struct CoreNlpPreset {
    pub annotators: &'static str,
    pub options: Option<&'static str>,
    pub fixed_annotators: bool,
}

impl CoreNlpPreset {
    pub const FULL: Self = Self {
        annotators: DEFAULT_ANNOTATORS,
        options: None,
        fixed_annotators: false,
    };

    pub const SPLIT_SENTENCES: Self = Self {
        annotators: "tokenize,ssplit",
        options: Some("-ssplit.newlineIsSentenceBreak always"),
        fixed_annotators: true,
    };

    pub const PARSE_SENTENCES: Self = Self {
        annotators: DEFAULT_ANNOTATORS,
        options: Some("-ssplit.eolonly"),
        fixed_annotators: false,
    };
}

#[derive(Debug, Clone)]
pub struct CoreNlpSettings {
    pub input: String,
    pub out_dir: PathBuf,
    pub annotators: String,
    pub class_path: PathBuf,
    pub version: String,
    pub memory: String,
    pub threads: usize,
    pub replace_ext: bool,
    pub output_ext: String,
    pub options: Option<String>,
    pub stamp: bool,
    pub resume: bool,
    pub use_sr_parser: bool,
    pub timeout: Option<Duration>,
    pub java: String,
}

impl CoreNlpSettings {
    pub fn resolve(
        args: CoreNlpArgs,
        section: &ConfigSection,
        step: &str,
        preset: CoreNlpPreset,
    ) -> Result<Self> {
        let r = Resolver::new(section, step);

        let annotators = if preset.fixed_annotators {
            preset.annotators.to_string()
        } else {
            r.string_or(args.annotators, "annotators", preset.annotators)?
        };

        let class_path = r
            .path(args.class_path, "class_path")?
            .or_else(|| std::env::var_os(CORENLP_HOME_VAR).map(PathBuf::from))
            .ok_or_else(|| BaleenError::MissingConfigError {
                field: r.key("class_path"),
            })?;

        let version = r
            .string(args.version, "version")?
            .or_else(|| std::env::var(CORENLP_VER_VAR).ok().filter(|v| !v.is_empty()))
            .unwrap_or_else(|| DEFAULT_CORENLP_VERSION.to_string());

        let options = r
            .string(args.options, "options")?
            .or_else(|| preset.options.map(str::to_string));

        Ok(Self {
            input: r.required_string(args.input, "input")?,
            out_dir: r.required_path(args.out_dir, "out_dir")?,
            annotators,
            class_path,
            version,
            memory: r.string_or(args.memory, "memory", DEFAULT_MEMORY)?,
            threads: r.usize_or(args.threads, "threads", 1)?,
            replace_ext: r.bool_or(args.replace_ext, "replace_ext", true)?,
            output_ext: r.string_or(args.output_ext, "output_ext", DEFAULT_OUTPUT_EXT)?,
            options,
            stamp: r.bool_or(args.stamp, "stamp", true)?,
            resume: r.toggle(args.resume, "resume", false)?,
            use_sr_parser: !preset.fixed_annotators
                && r.bool_or(args.use_sr_parser, "use_sr_parser", false)?,
            timeout: timeout_from_secs(r.usize(args.timeout, "timeout")?),
            java: r.string_or(args.java, "java", DEFAULT_JAVA)?,
        })
    }

    /// Extension CoreNLP gives its output files.
    pub fn effective_output_ext(&self) -> String {
        if self.stamp {
            format!("#scnlp_v{}{}", self.version, self.output_ext)
        } else {
            self.output_ext.clone()
        }
    }
}

impl Validate for CoreNlpSettings {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("core_nlp.input", &self.input)?;
        validate_non_empty_string("core_nlp.annotators", &self.annotators)?;
        validate_memory("core_nlp.memory", &self.memory)?;
        validate_positive_number("core_nlp.threads", self.threads, 1)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Parse trees and variables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
pub struct LemmaTreesArgs {
    /// Directory with CoreNLP XML output
    #[cfg_attr(feature = "cli", arg(long))]
    pub scnlp_dir: Option<PathBuf>,
    #[cfg_attr(feature = "cli", arg(long))]
    pub out_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct LemmaTreesSettings {
    pub scnlp_dir: PathBuf,
    pub out_dir: PathBuf,
}

impl LemmaTreesSettings {
    pub fn resolve(args: LemmaTreesArgs, section: &ConfigSection) -> Result<Self> {
        let r = Resolver::new(section, "lemma_trees");
        Ok(Self {
            scnlp_dir: r.required_path(args.scnlp_dir, "scnlp_dir")?,
            out_dir: r.required_path(args.out_dir, "out_dir")?,
        })
    }
}

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
pub struct ExtVarsArgs {
    /// Variable extraction executable
    #[cfg_attr(feature = "cli", arg(long))]
    pub extract_vars_exec: Option<String>,
    #[cfg_attr(feature = "cli", arg(long))]
    pub trees_dir: Option<PathBuf>,
    #[cfg_attr(feature = "cli", arg(long))]
    pub vars_dir: Option<PathBuf>,
    /// Toggle default for resuming process
    #[cfg_attr(feature = "cli", arg(short, long))]
    pub resume: bool,
    /// Number of files processed concurrently
    #[cfg_attr(feature = "cli", arg(short, long))]
    pub jobs: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ExtVarsSettings {
    pub extract_vars_exec: String,
    pub trees_dir: PathBuf,
    pub vars_dir: PathBuf,
    pub resume: bool,
    pub jobs: usize,
}

impl ExtVarsSettings {
    pub fn resolve(args: ExtVarsArgs, section: &ConfigSection) -> Result<Self> {
        let r = Resolver::new(section, "ext_vars");
        Ok(Self {
            extract_vars_exec: r.required_string(args.extract_vars_exec, "extract_vars_exec")?,
            trees_dir: r.required_path(args.trees_dir, "trees_dir")?,
            vars_dir: r.required_path(args.vars_dir, "vars_dir")?,
            resume: r.toggle(args.resume, "resume", false)?,
            jobs: r.usize_or(args.jobs, "jobs", 1)?,
        })
    }
}

impl Validate for ExtVarsSettings {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("ext_vars.extract_vars_exec", &self.extract_vars_exec)?;
        validate_positive_number("ext_vars.jobs", self.jobs, 1)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
pub struct OffsetsArgs {
    #[cfg_attr(feature = "cli", arg(long))]
    pub vars_dir: Option<PathBuf>,
    #[cfg_attr(feature = "cli", arg(long))]
    pub scnlp_dir: Option<PathBuf>,
    /// Toggle default for resuming process
    #[cfg_attr(feature = "cli", arg(short, long))]
    pub resume: bool,
}

#[derive(Debug, Clone)]
pub struct OffsetsSettings {
    pub vars_dir: PathBuf,
    pub scnlp_dir: PathBuf,
    pub resume: bool,
}

impl OffsetsSettings {
    pub fn resolve(args: OffsetsArgs, section: &ConfigSection) -> Result<Self> {
        let r = Resolver::new(section, "offsets");
        Ok(Self {
            vars_dir: r.required_path(args.vars_dir, "vars_dir")?,
            scnlp_dir: r.required_path(args.scnlp_dir, "scnlp_dir")?,
            resume: r.toggle(args.resume, "resume", false)?,
        })
    }
}

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
pub struct PrepVarsArgs {
    /// Tree transformation executable
    #[cfg_attr(feature = "cli", arg(long))]
    pub trans_exec: Option<String>,
    /// Tsurgeon transformation file
    #[cfg_attr(feature = "cli", arg(long))]
    pub trans_file: Option<PathBuf>,
    #[cfg_attr(feature = "cli", arg(long))]
    pub in_vars_dir: Option<PathBuf>,
    #[cfg_attr(feature = "cli", arg(long))]
    pub out_vars_dir: Option<PathBuf>,
    /// Directory for intermediate files (defaults to a temporary directory)
    #[cfg_attr(feature = "cli", arg(long))]
    pub tmp_dir: Option<PathBuf>,
    /// Toggle default for resuming process
    #[cfg_attr(feature = "cli", arg(short, long))]
    pub resume: bool,
    /// Number of files processed concurrently
    #[cfg_attr(feature = "cli", arg(short, long))]
    pub jobs: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct PrepVarsSettings {
    pub trans_exec: String,
    pub trans_file: PathBuf,
    pub in_vars_dir: PathBuf,
    pub out_vars_dir: PathBuf,
    pub tmp_dir: Option<PathBuf>,
    pub resume: bool,
    pub jobs: usize,
}

impl PrepVarsSettings {
    pub fn resolve(args: PrepVarsArgs, section: &ConfigSection) -> Result<Self> {
        let r = Resolver::new(section, "prep_vars");
        Ok(Self {
            trans_exec: r.required_string(args.trans_exec, "trans_exec")?,
            trans_file: r.required_path(args.trans_file, "trans_file")?,
            in_vars_dir: r.required_path(args.in_vars_dir, "in_vars_dir")?,
            out_vars_dir: r.required_path(args.out_vars_dir, "out_vars_dir")?,
            tmp_dir: r.path(args.tmp_dir, "tmp_dir")?,
            resume: r.toggle(args.resume, "resume", false)?,
            jobs: r.usize_or(args.jobs, "jobs", 1)?,
        })
    }
}

impl Validate for PrepVarsSettings {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("prep_vars.trans_exec", &self.trans_exec)?;
        validate_path("prep_vars.trans_file", &self.trans_file.to_string_lossy())?;
        validate_positive_number("prep_vars.jobs", self.jobs, 1)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
pub struct PruneVarsArgs {
    /// Variable pruning executable
    #[cfg_attr(feature = "cli", arg(long))]
    pub prune_vars_exec: Option<String>,
    #[cfg_attr(feature = "cli", arg(long))]
    pub in_vars_dir: Option<PathBuf>,
    #[cfg_attr(feature = "cli", arg(long))]
    pub out_vars_dir: Option<PathBuf>,
    /// Options passed to the pruning executable
    #[cfg_attr(feature = "cli", arg(long, allow_hyphen_values = true))]
    pub options: Option<String>,
    /// Toggle default for resuming process
    #[cfg_attr(feature = "cli", arg(short, long))]
    pub resume: bool,
    /// Number of files processed concurrently
    #[cfg_attr(feature = "cli", arg(short, long))]
    pub jobs: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct PruneVarsSettings {
    pub prune_vars_exec: String,
    pub in_vars_dir: PathBuf,
    pub out_vars_dir: PathBuf,
    pub options: String,
    pub resume: bool,
    pub jobs: usize,
}

impl PruneVarsSettings {
    pub fn resolve(args: PruneVarsArgs, section: &ConfigSection) -> Result<Self> {
        let r = Resolver::new(section, "prune_vars");
        Ok(Self {
            prune_vars_exec: r.required_string(args.prune_vars_exec, "prune_vars_exec")?,
            in_vars_dir: r.required_path(args.in_vars_dir, "in_vars_dir")?,
            out_vars_dir: r.required_path(args.out_vars_dir, "out_vars_dir")?,
            options: r.string_or(args.options, "options", DEFAULT_PRUNE_OPTIONS)?,
            resume: r.toggle(args.resume, "resume", false)?,
            jobs: r.usize_or(args.jobs, "jobs", 1)?,
        })
    }
}

impl Validate for PruneVarsSettings {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("prune_vars.prune_vars_exec", &self.prune_vars_exec)?;
        validate_positive_number("prune_vars.jobs", self.jobs, 1)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Relations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
pub struct TagVarsArgs {
    #[cfg_attr(feature = "cli", arg(long))]
    pub vars_dir: Option<PathBuf>,
    #[cfg_attr(feature = "cli", arg(long))]
    pub trees_dir: Option<PathBuf>,
    #[cfg_attr(feature = "cli", arg(long))]
    pub tagged_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct TagVarsSettings {
    pub vars_dir: PathBuf,
    pub trees_dir: PathBuf,
    pub tagged_dir: PathBuf,
}

impl TagVarsSettings {
    pub fn resolve(args: TagVarsArgs, section: &ConfigSection) -> Result<Self> {
        let r = Resolver::new(section, "tag_vars");
        Ok(Self {
            vars_dir: r.required_path(args.vars_dir, "vars_dir")?,
            trees_dir: r.required_path(args.trees_dir, "trees_dir")?,
            tagged_dir: r.required_path(args.tagged_dir, "tagged_dir")?,
        })
    }
}

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
pub struct ExtRelsArgs {
    /// Directory with the CoreNLP jar files (defaults to $CORENLP_HOME)
    #[cfg_attr(feature = "cli", arg(long))]
    pub class_path: Option<PathBuf>,
    #[cfg_attr(feature = "cli", arg(long))]
    pub tagged_dir: Option<PathBuf>,
    /// Pattern file or directory of pattern files
    #[cfg_attr(feature = "cli", arg(long))]
    pub pattern_path: Option<PathBuf>,
    #[cfg_attr(feature = "cli", arg(long))]
    pub rels_dir: Option<PathBuf>,
    #[cfg_attr(feature = "cli", arg(long))]
    pub memory: Option<String>,
    /// Java executable
    #[cfg_attr(feature = "cli", arg(long))]
    pub java: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExtRelsSettings {
    pub class_path: PathBuf,
    pub tagged_dir: PathBuf,
    pub pattern_path: PathBuf,
    pub rels_dir: PathBuf,
    pub memory: String,
    pub java: String,
}

impl ExtRelsSettings {
    pub fn resolve(args: ExtRelsArgs, section: &ConfigSection) -> Result<Self> {
        let r = Resolver::new(section, "ext_rels");
        let class_path = r
            .path(args.class_path, "class_path")?
            .or_else(|| std::env::var_os(CORENLP_HOME_VAR).map(PathBuf::from))
            .ok_or_else(|| BaleenError::MissingConfigError {
                field: r.key("class_path"),
            })?;

        Ok(Self {
            class_path,
            tagged_dir: r.required_path(args.tagged_dir, "tagged_dir")?,
            pattern_path: r.required_path(args.pattern_path, "pattern_path")?,
            rels_dir: r.required_path(args.rels_dir, "rels_dir")?,
            memory: r.string_or(args.memory, "memory", DEFAULT_MEMORY)?,
            java: r.string_or(args.java, "java", DEFAULT_JAVA)?,
        })
    }
}

impl Validate for ExtRelsSettings {
    fn validate(&self) -> Result<()> {
        validate_memory("ext_rels.memory", &self.memory)
    }
}

// ---------------------------------------------------------------------------
// CSV export
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
pub struct ToCsvArgs {
    #[cfg_attr(feature = "cli", arg(long))]
    pub vars_dir: Option<PathBuf>,
    #[cfg_attr(feature = "cli", arg(long))]
    pub scnlp_dir: Option<PathBuf>,
    /// Directory with the original text files
    #[cfg_attr(feature = "cli", arg(long))]
    pub text_dir: Option<PathBuf>,
    #[cfg_attr(feature = "cli", arg(long))]
    pub nodes_dir: Option<PathBuf>,
    #[cfg_attr(feature = "cli", arg(long))]
    pub relations_dir: Option<PathBuf>,
    /// Process at most this many variable files
    #[cfg_attr(feature = "cli", arg(long))]
    pub max_n_vars: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ToCsvSettings {
    pub vars_dir: PathBuf,
    pub scnlp_dir: PathBuf,
    pub text_dir: PathBuf,
    pub nodes_dir: PathBuf,
    pub relations_dir: PathBuf,
    pub max_n_vars: Option<usize>,
}

impl ToCsvSettings {
    pub fn resolve(args: ToCsvArgs, section: &ConfigSection) -> Result<Self> {
        let r = Resolver::new(section, "tocsv");
        Ok(Self {
            vars_dir: r.required_path(args.vars_dir, "vars_dir")?,
            scnlp_dir: r.required_path(args.scnlp_dir, "scnlp_dir")?,
            text_dir: r.required_path(args.text_dir, "text_dir")?,
            nodes_dir: r.required_path(args.nodes_dir, "nodes_dir")?,
            relations_dir: r.required_path(args.relations_dir, "relations_dir")?,
            max_n_vars: r.usize(args.max_n_vars, "max_n_vars")?,
        })
    }
}

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
pub struct ArtsCsvArgs {
    #[cfg_attr(feature = "cli", arg(long))]
    pub vars_dir: Option<PathBuf>,
    #[cfg_attr(feature = "cli", arg(long))]
    pub text_dir: Option<PathBuf>,
    /// Cache directory for article metadata
    #[cfg_attr(feature = "cli", arg(long))]
    pub meta_cache_dir: Option<PathBuf>,
    /// Cache directory for formatted citations
    #[cfg_attr(feature = "cli", arg(long))]
    pub cit_cache_dir: Option<PathBuf>,
    #[cfg_attr(feature = "cli", arg(long))]
    pub nodes_dir: Option<PathBuf>,
    /// Process at most this many variable files
    #[cfg_attr(feature = "cli", arg(long))]
    pub max_n: Option<usize>,
    /// Look up metadata online (otherwise only the caches are used)
    #[cfg_attr(feature = "cli", arg(long))]
    pub online: Option<bool>,
    #[cfg_attr(feature = "cli", arg(long))]
    pub doi_url: Option<String>,
    #[cfg_attr(feature = "cli", arg(long))]
    pub issn_url: Option<String>,
    /// Citation style name
    #[cfg_attr(feature = "cli", arg(long))]
    pub style: Option<String>,
    /// Number of attempts per lookup
    #[cfg_attr(feature = "cli", arg(long))]
    pub attempts: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ArtsCsvSettings {
    pub vars_dir: PathBuf,
    pub text_dir: PathBuf,
    pub meta_cache_dir: PathBuf,
    pub cit_cache_dir: PathBuf,
    pub nodes_dir: PathBuf,
    pub max_n: Option<usize>,
    pub online: bool,
    pub doi_url: String,
    pub issn_url: String,
    pub style: String,
    pub attempts: usize,
}

impl ArtsCsvSettings {
    pub fn resolve(args: ArtsCsvArgs, section: &ConfigSection) -> Result<Self> {
        use crate::adapters::crossref::{
            DEFAULT_ATTEMPTS, DEFAULT_DOI_URL, DEFAULT_ISSN_URL, DEFAULT_STYLE,
        };

        let r = Resolver::new(section, "artscsv");
        Ok(Self {
            vars_dir: r.required_path(args.vars_dir, "vars_dir")?,
            text_dir: r.required_path(args.text_dir, "text_dir")?,
            meta_cache_dir: r.required_path(args.meta_cache_dir, "meta_cache_dir")?,
            cit_cache_dir: r.required_path(args.cit_cache_dir, "cit_cache_dir")?,
            nodes_dir: r.required_path(args.nodes_dir, "nodes_dir")?,
            max_n: r.usize(args.max_n, "max_n")?,
            online: r.bool_or(args.online, "online", true)?,
            doi_url: r.string_or(args.doi_url, "doi_url", DEFAULT_DOI_URL)?,
            issn_url: r.string_or(args.issn_url, "issn_url", DEFAULT_ISSN_URL)?,
            style: r.string_or(args.style, "style", DEFAULT_STYLE)?,
            attempts: r.usize_or(args.attempts, "attempts", DEFAULT_ATTEMPTS)?,
        })
    }
}

impl Validate for ArtsCsvSettings {
    fn validate(&self) -> Result<()> {
        validate_url("artscsv.doi_url", &self.doi_url)?;
        validate_url("artscsv.issn_url", &self.issn_url)?;
        validate_positive_number("artscsv.attempts", self.attempts, 1)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
pub struct RelsCsvArgs {
    #[cfg_attr(feature = "cli", arg(long))]
    pub rels_dir: Option<PathBuf>,
    #[cfg_attr(feature = "cli", arg(long))]
    pub nodes_dir: Option<PathBuf>,
    #[cfg_attr(feature = "cli", arg(long))]
    pub relations_dir: Option<PathBuf>,
    /// Process at most this many relation files
    #[cfg_attr(feature = "cli", arg(long))]
    pub max_n: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct RelsCsvSettings {
    pub rels_dir: PathBuf,
    pub nodes_dir: PathBuf,
    pub relations_dir: PathBuf,
    pub max_n: Option<usize>,
}

impl RelsCsvSettings {
    pub fn resolve(args: RelsCsvArgs, section: &ConfigSection) -> Result<Self> {
        let r = Resolver::new(section, "relscsv");
        Ok(Self {
            rels_dir: r.required_path(args.rels_dir, "rels_dir")?,
            nodes_dir: r.required_path(args.nodes_dir, "nodes_dir")?,
            relations_dir: r.required_path(args.relations_dir, "relations_dir")?,
            max_n: r.usize(args.max_n, "max_n")?,
        })
    }
}

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
pub struct UniqNodesArgs {
    /// Comma-separated directories with node CSV files
    #[cfg_attr(feature = "cli", arg(long))]
    pub in_dirs: Option<String>,
    #[cfg_attr(feature = "cli", arg(long))]
    pub out_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct UniqNodesSettings {
    pub in_dirs: Vec<PathBuf>,
    pub out_dir: PathBuf,
}

impl UniqNodesSettings {
    pub fn resolve(args: UniqNodesArgs, section: &ConfigSection) -> Result<Self> {
        let r = Resolver::new(section, "uniq_nodes");
        let in_dirs: Vec<PathBuf> = r
            .required_string(args.in_dirs, "in_dirs")?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect();

        Ok(Self {
            in_dirs,
            out_dir: r.required_path(args.out_dir, "out_dir")?,
        })
    }
}

impl Validate for UniqNodesSettings {
    fn validate(&self) -> Result<()> {
        if self.in_dirs.is_empty() {
            return Err(BaleenError::ConfigValidationError {
                field: "uniq_nodes.in_dirs".to_string(),
                message: "at least one input directory is required".to_string(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Neo4j
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
pub struct Neo4jArgs {
    /// Neo4j installation directory
    #[cfg_attr(feature = "cli", arg(long))]
    pub neo4j_home: Option<PathBuf>,
    /// Store directory (defaults to <neo4j_home>/data/databases/graph.db)
    #[cfg_attr(feature = "cli", arg(long))]
    pub store_path: Option<PathBuf>,
    /// Bolt address as host:port
    #[cfg_attr(feature = "cli", arg(long))]
    pub address: Option<String>,
    #[cfg_attr(feature = "cli", arg(long))]
    pub user: Option<String>,
    #[cfg_attr(feature = "cli", arg(long))]
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Neo4jSettings {
    pub neo4j_home: PathBuf,
    pub store_path: PathBuf,
    pub address: String,
    pub user: String,
    pub password: String,
}

impl Neo4jSettings {
    /// Looks under `step` first and falls back to the shared `neo4j.*` keys.
    pub fn resolve(args: Neo4jArgs, section: &ConfigSection, step: &str) -> Result<Self> {
        let own = Resolver::new(section, step);
        let shared = Resolver::new(section, "neo4j");

        let neo4j_home = match own.path(args.neo4j_home, "neo4j_home")? {
            Some(path) => path,
            None => shared
                .path(None, "neo4j_home")?
                .ok_or_else(|| BaleenError::MissingConfigError {
                    field: own.key("neo4j_home"),
                })?,
        };

        let store_path = match own.path(args.store_path, "store_path")? {
            Some(path) => path,
            None => shared
                .path(None, "store_path")?
                .unwrap_or_else(|| neo4j_home.join("data").join("databases").join("graph.db")),
        };

        let pick = |cli: Option<String>, option: &str, default: &str| -> Result<String> {
            match own.string(cli, option)? {
                Some(value) => Ok(value),
                None => shared.string_or(None, option, default),
            }
        };

        Ok(Self {
            address: pick(args.address, "address", DEFAULT_BOLT_ADDRESS)?,
            user: pick(args.user, "user", DEFAULT_NEO4J_USER)?,
            password: pick(args.password, "password", DEFAULT_NEO4J_PASSWORD)?,
            neo4j_home,
            store_path,
        })
    }

    pub fn neo4j_script(&self) -> PathBuf {
        self.neo4j_home.join("bin").join("neo4j")
    }
}

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
pub struct ToNeoArgs {
    #[cfg_attr(feature = "cli", command(flatten))]
    pub server: Neo4jArgs,
    #[cfg_attr(feature = "cli", arg(long))]
    pub nodes_dir: Option<PathBuf>,
    #[cfg_attr(feature = "cli", arg(long))]
    pub relations_dir: Option<PathBuf>,
    /// Extra options for neo4j-import
    #[cfg_attr(feature = "cli", arg(long, allow_hyphen_values = true))]
    pub options: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ToNeoSettings {
    pub server: Neo4jSettings,
    pub nodes_dir: PathBuf,
    pub relations_dir: PathBuf,
    pub options: Option<String>,
}

impl ToNeoSettings {
    pub fn resolve(args: ToNeoArgs, section: &ConfigSection) -> Result<Self> {
        let r = Resolver::new(section, "toneo");
        Ok(Self {
            server: Neo4jSettings::resolve(args.server, section, "toneo")?,
            nodes_dir: r.required_path(args.nodes_dir, "nodes_dir")?,
            relations_dir: r.required_path(args.relations_dir, "relations_dir")?,
            options: r.string(args.options, "options")?,
        })
    }
}

// ---------------------------------------------------------------------------
// Article nodes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
pub struct AddCitArgs {
    #[cfg_attr(feature = "cli", command(flatten))]
    pub server: Neo4jArgs,
    /// Cache directory for formatted citations
    #[cfg_attr(feature = "cli", arg(long))]
    pub cache_dir: Option<PathBuf>,
    /// Toggle default for resuming process (only Article nodes without a citation)
    #[cfg_attr(feature = "cli", arg(short, long))]
    pub resume: bool,
    #[cfg_attr(feature = "cli", arg(long))]
    pub online: Option<bool>,
    #[cfg_attr(feature = "cli", arg(long))]
    pub doi_url: Option<String>,
    #[cfg_attr(feature = "cli", arg(long))]
    pub style: Option<String>,
    #[cfg_attr(feature = "cli", arg(long))]
    pub attempts: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct AddCitSettings {
    pub server: Neo4jSettings,
    pub cache_dir: PathBuf,
    pub resume: bool,
    pub online: bool,
    pub doi_url: String,
    pub style: String,
    pub attempts: usize,
}

impl AddCitSettings {
    pub fn resolve(args: AddCitArgs, section: &ConfigSection) -> Result<Self> {
        use crate::adapters::crossref::{DEFAULT_ATTEMPTS, DEFAULT_DOI_URL, DEFAULT_STYLE};

        let r = Resolver::new(section, "add_cit");
        Ok(Self {
            server: Neo4jSettings::resolve(args.server, section, "add_cit")?,
            cache_dir: r.required_path(args.cache_dir, "cache_dir")?,
            resume: r.toggle(args.resume, "resume", false)?,
            online: r.bool_or(args.online, "online", true)?,
            doi_url: r.string_or(args.doi_url, "doi_url", DEFAULT_DOI_URL)?,
            style: r.string_or(args.style, "style", DEFAULT_STYLE)?,
            attempts: r.usize_or(args.attempts, "attempts", DEFAULT_ATTEMPTS)?,
        })
    }
}

impl Validate for AddCitSettings {
    fn validate(&self) -> Result<()> {
        validate_url("add_cit.doi_url", &self.doi_url)?;
        validate_non_empty_string("add_cit.style", &self.style)?;
        validate_positive_number("add_cit.attempts", self.attempts, 1)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
pub struct AddMetaArgs {
    #[cfg_attr(feature = "cli", command(flatten))]
    pub server: Neo4jArgs,
    /// Cache directory for article metadata
    #[cfg_attr(feature = "cli", arg(long))]
    pub cache_dir: Option<PathBuf>,
    /// Toggle default for resuming process (only Article nodes with missing metadata)
    #[cfg_attr(feature = "cli", arg(short, long))]
    pub resume: bool,
    #[cfg_attr(feature = "cli", arg(long))]
    pub online: Option<bool>,
    #[cfg_attr(feature = "cli", arg(long))]
    pub doi_url: Option<String>,
    #[cfg_attr(feature = "cli", arg(long))]
    pub issn_url: Option<String>,
    #[cfg_attr(feature = "cli", arg(long))]
    pub attempts: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct AddMetaSettings {
    pub server: Neo4jSettings,
    pub cache_dir: PathBuf,
    pub resume: bool,
    pub online: bool,
    pub doi_url: String,
    pub issn_url: String,
    pub attempts: usize,
}

impl AddMetaSettings {
    pub fn resolve(args: AddMetaArgs, section: &ConfigSection) -> Result<Self> {
        use crate::adapters::crossref::{DEFAULT_ATTEMPTS, DEFAULT_DOI_URL, DEFAULT_ISSN_URL};

        let r = Resolver::new(section, "add_meta");
        Ok(Self {
            server: Neo4jSettings::resolve(args.server, section, "add_meta")?,
            cache_dir: r.required_path(args.cache_dir, "cache_dir")?,
            resume: r.toggle(args.resume, "resume", false)?,
            online: r.bool_or(args.online, "online", true)?,
            doi_url: r.string_or(args.doi_url, "doi_url", DEFAULT_DOI_URL)?,
            issn_url: r.string_or(args.issn_url, "issn_url", DEFAULT_ISSN_URL)?,
            attempts: r.usize_or(args.attempts, "attempts", DEFAULT_ATTEMPTS)?,
        })
    }
}

impl Validate for AddMetaSettings {
    fn validate(&self) -> Result<()> {
        validate_url("add_meta.doi_url", &self.doi_url)?;
        validate_url("add_meta.issn_url", &self.issn_url)?;
        validate_positive_number("add_meta.attempts", self.attempts, 1)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
pub struct CleanMetaCacheArgs {
    /// Cache directory for article metadata
    #[cfg_attr(feature = "cli", arg(long))]
    pub cache_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct CleanMetaCacheSettings {
    pub cache_dir: PathBuf,
}

impl CleanMetaCacheSettings {
    pub fn resolve(args: CleanMetaCacheArgs, section: &ConfigSection) -> Result<Self> {
        let r = Resolver::new(section, "clean_meta_cache");
        Ok(Self {
            cache_dir: r.required_path(args.cache_dir, "cache_dir")?,
        })
    }
}

// ---------------------------------------------------------------------------
// Misc
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
pub struct MakePatternsArgs {
    #[cfg_attr(feature = "cli", arg(long))]
    pub out_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct MakePatternsSettings {
    pub out_dir: PathBuf,
}

impl MakePatternsSettings {
    pub fn resolve(args: MakePatternsArgs, section: &ConfigSection) -> Result<Self> {
        let r = Resolver::new(section, "make_patterns");
        Ok(Self {
            out_dir: r.path(args.out_dir, "out_dir")?.unwrap_or_else(|| PathBuf::from(".")),
        })
    }
}

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
pub struct CleanArgs {
    /// File or directory to remove
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct CleanSettings {
    pub path: PathBuf,
}

impl CleanSettings {
    pub fn resolve(args: CleanArgs, section: &ConfigSection) -> Result<Self> {
        let r = Resolver::new(section, "clean");
        Ok(Self {
            path: r.required_path(args.path, "dir")?,
        })
    }
}

impl Validate for CleanSettings {
    fn validate(&self) -> Result<()> {
        validate_path("clean.dir", &self.path.to_string_lossy())?;
        if self.path.parent().is_none() {
            return Err(BaleenError::ConfigValidationError {
                field: "clean.dir".to_string(),
                message: format!("refusing to remove '{}'", self.path.display()),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ini_config::{IniConfig, DEFAULT_SECTION};

    fn section(content: &str) -> ConfigSection {
        let mut config = IniConfig::new();
        config.read_str(content).unwrap();
        config.section(DEFAULT_SECTION).unwrap()
    }

    #[test]
    fn test_cli_overrides_ini_overrides_default() {
        let section = section("[DEFAULT]\ncore_nlp.threads = 4\ncore_nlp.memory = 8g\n");
        let r = Resolver::new(&section, "core_nlp");

        assert_eq!(r.usize_or(Some(2), "threads", 1).unwrap(), 2);
        assert_eq!(r.usize_or(None, "threads", 1).unwrap(), 4);
        assert_eq!(r.string_or(None, "memory", "3g").unwrap(), "8g");
        assert_eq!(r.string_or(None, "annotators", "tokenize").unwrap(), "tokenize");
    }

    #[test]
    fn test_resume_toggles_configured_value() {
        let on = section("[DEFAULT]\next_vars.resume = true\n");
        let off = section("[DEFAULT]\n");

        assert!(Resolver::new(&on, "ext_vars").toggle(false, "resume", false).unwrap());
        assert!(!Resolver::new(&on, "ext_vars").toggle(true, "resume", false).unwrap());
        assert!(!Resolver::new(&off, "ext_vars").toggle(false, "resume", false).unwrap());
        assert!(Resolver::new(&off, "ext_vars").toggle(true, "resume", false).unwrap());
    }

    #[test]
    fn test_missing_required_value() {
        let section = section("[DEFAULT]\nlemma_trees.scnlp_dir = /data/scnlp\n");
        let err = LemmaTreesSettings::resolve(LemmaTreesArgs::default(), &section).unwrap_err();
        match err {
            BaleenError::MissingConfigError { field } => assert_eq!(field, "lemma_trees.out_dir"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_core_nlp_defaults_and_stamp() {
        let section = section(
            "[DEFAULT]\ncore_nlp.input = /data/txt\ncore_nlp.out_dir = /data/scnlp\ncore_nlp.class_path = /opt/corenlp\ncore_nlp.version = 3.9.2\n",
        );
        let settings = CoreNlpSettings::resolve(
            CoreNlpArgs::default(),
            &section,
            "core_nlp",
            CoreNlpPreset::FULL,
        )
        .unwrap();

        assert_eq!(settings.annotators, DEFAULT_ANNOTATORS);
        assert_eq!(settings.memory, "3g");
        assert_eq!(settings.threads, 1);
        assert!(settings.stamp);
        assert!(!settings.resume);
        assert_eq!(settings.effective_output_ext(), "#scnlp_v3.9.2.xml");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_split_sentences_preset() {
        let section = section(
            "[DEFAULT]\nsplit_sent.input = a.txt\nsplit_sent.out_dir = out\nsplit_sent.class_path = /opt/corenlp\nsplit_sent.annotators = tokenize,ssplit,pos\n",
        );
        let settings = CoreNlpSettings::resolve(
            CoreNlpArgs::default(),
            &section,
            "split_sent",
            CoreNlpPreset::SPLIT_SENTENCES,
        )
        .unwrap();

        assert_eq!(settings.annotators, "tokenize,ssplit");
        assert_eq!(
            settings.options.as_deref(),
            Some("-ssplit.newlineIsSentenceBreak always")
        );
    }

    #[test]
    fn test_neo4j_shared_keys() {
        let section = section(
            "[DEFAULT]\nneo4j.neo4j_home = /opt/neo4j\nneo4j.password = secret\nppgraph.address = db:7687\n",
        );
        let settings = Neo4jSettings::resolve(Neo4jArgs::default(), &section, "ppgraph").unwrap();

        assert_eq!(settings.address, "db:7687");
        assert_eq!(settings.password, "secret");
        assert_eq!(settings.user, "neo4j");
        assert_eq!(
            settings.store_path,
            PathBuf::from("/opt/neo4j/data/databases/graph.db")
        );
        assert_eq!(settings.neo4j_script(), PathBuf::from("/opt/neo4j/bin/neo4j"));
    }

    #[test]
    fn test_bad_reference_only_fails_steps_that_read_it() {
        let section = section(
            "[DEFAULT]\ndata_dir = /data\nlemma_trees.scnlp_dir = %(data_dir)s/scnlp\nlemma_trees.out_dir = %(data_dir)s/lemtrees\ntocsv.vars_dir = %(typo_dir)s/vars\n",
        );

        let lemma = LemmaTreesSettings::resolve(LemmaTreesArgs::default(), &section).unwrap();
        assert_eq!(lemma.out_dir, PathBuf::from("/data/lemtrees"));

        let err = ToCsvSettings::resolve(ToCsvArgs::default(), &section).unwrap_err();
        assert!(matches!(err, BaleenError::ConfigValidationError { ref field, .. } if field == "tocsv.vars_dir"));
    }

    #[test]
    fn test_clean_refuses_root() {
        let settings = CleanSettings {
            path: PathBuf::from("/"),
        };
        assert!(settings.validate().is_err());
    }
}
