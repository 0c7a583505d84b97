use crate::config::bootstrap::CONFIG_VAR;
use crate::config::ini_config::{IniConfig, DEFAULT_SECTION};
use crate::config::settings::*;
use crate::utils::error::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "baleen")]
#[command(about = "Text mining pipeline for extracting change events and causal relations from scientific abstracts")]
pub struct CliConfig {
    /// Configuration file; may be repeated, later files override earlier ones
    #[arg(short, long = "config", global = true)]
    pub config: Vec<PathBuf>,

    /// Section of the configuration files to use
    #[arg(short, long, global = true, default_value = DEFAULT_SECTION)]
    pub section: String,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log baleen memory and CPU use after each step")]
    pub monitor: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print shell exports for an installation directory
    Env {
        /// Installation directory (defaults to the parent of the executable's bin/)
        dir: Option<PathBuf>,
    },
    /// Run Stanford CoreNLP
    CoreNlp(CoreNlpArgs),
    /// Split text into sentences
    SplitSent(CoreNlpArgs),
    /// Parse sentences (one sentence per line)
    ParseSent(CoreNlpArgs),
    /// Extract lemmatized parse trees
    LemmaTrees(LemmaTreesArgs),
    /// Extract variables in change/increase/decrease events
    ExtVars(ExtVarsArgs),
    /// Add character offsets to extracted variables
    Offsets(OffsetsArgs),
    /// Preprocess variables
    PrepVars(PrepVarsArgs),
    /// Prune variables
    PruneVars(PruneVarsArgs),
    /// Tag variable nodes in parse trees
    TagVars(TagVarsArgs),
    /// Extract relations between events with tree patterns
    ExtRels(ExtRelsArgs),
    /// Convert variables to CSV files for neo4j-import
    Tocsv(ToCsvArgs),
    /// Convert article metadata to CSV files for neo4j-import
    Artscsv(ArtsCsvArgs),
    /// Convert relations to CSV files for neo4j-import
    Relscsv(RelsCsvArgs),
    /// Merge node CSV files into files with unique rows
    UniqNodes(UniqNodesArgs),
    /// Create a new Neo4j database from CSV files
    Toneo(ToNeoArgs),
    /// Post-process the graph after import
    Ppgraph(Neo4jArgs),
    /// Start the Neo4j server
    StartServer(Neo4jArgs),
    /// Stop the Neo4j server
    StopServer(Neo4jArgs),
    /// Add formatted citations to Article nodes in the graph
    AddCit(AddCitArgs),
    /// Add CrossRef metadata to Article nodes in the graph
    AddMeta(AddMetaArgs),
    /// Remove records with incomplete metadata from the metadata cache
    CleanMetaCache(CleanMetaCacheArgs),
    /// Write Tsurgeon pattern files for change/increase/decrease events
    MakePatterns(MakePatternsArgs),
    /// Remove output
    Clean(CleanArgs),
    /// Run complete pipeline: core-nlp --> lemma-trees --> ext-vars --> offsets --> prep-vars --> prune-vars
    RunAll,
}

impl Command {
    /// Name of the pipeline step, as used for configuration keys.
    pub fn step_name(&self) -> &'static str {
        match self {
            Command::Env { .. } => "env",
            Command::CoreNlp(_) => "core_nlp",
            Command::SplitSent(_) => "split_sent",
            Command::ParseSent(_) => "parse_sent",
            Command::LemmaTrees(_) => "lemma_trees",
            Command::ExtVars(_) => "ext_vars",
            Command::Offsets(_) => "offsets",
            Command::PrepVars(_) => "prep_vars",
            Command::PruneVars(_) => "prune_vars",
            Command::TagVars(_) => "tag_vars",
            Command::ExtRels(_) => "ext_rels",
            Command::Tocsv(_) => "tocsv",
            Command::Artscsv(_) => "artscsv",
            Command::Relscsv(_) => "relscsv",
            Command::UniqNodes(_) => "uniq_nodes",
            Command::Toneo(_) => "toneo",
            Command::Ppgraph(_) => "ppgraph",
            Command::StartServer(_) => "start_server",
            Command::StopServer(_) => "stop_server",
            Command::AddCit(_) => "add_cit",
            Command::AddMeta(_) => "add_meta",
            Command::CleanMetaCache(_) => "clean_meta_cache",
            Command::MakePatterns(_) => "make_patterns",
            Command::Clean(_) => "clean",
            Command::RunAll => "run_all",
        }
    }
}

impl CliConfig {
    /// Configuration files to read: the `-c` files, else `$BALEEN_INI`.
    pub fn config_files(&self) -> Vec<PathBuf> {
        if !self.config.is_empty() {
            return self.config.clone();
        }
        std::env::var_os(CONFIG_VAR)
            .filter(|v| !v.is_empty())
            .map(|v| vec![PathBuf::from(v)])
            .unwrap_or_default()
    }

    pub fn load_ini(&self) -> Result<IniConfig> {
        IniConfig::from_files(&self.config_files())
    }
}
