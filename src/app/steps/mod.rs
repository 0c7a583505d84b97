//! Pipeline steps, one per subcommand.

pub mod citations;
pub mod clean;
pub mod core_nlp;
pub mod csv_export;
pub mod lemma_trees;
pub mod neo4j;
pub mod patterns;
pub mod rels;
pub mod vars;

pub use citations::{AddCitStep, AddMetaStep, CleanMetaCacheStep};
pub use clean::CleanStep;
pub use core_nlp::CoreNlpStep;
pub use csv_export::{ArtsCsvStep, RelsCsvStep, ToCsvStep, UniqNodesStep};
pub use lemma_trees::LemmaTreesStep;
pub use neo4j::{PpGraphStep, ServerAction, ServerStep, ToNeoStep};
pub use patterns::MakePatternsStep;
pub use rels::{ExtRelsStep, TagVarsStep};
pub use vars::{ExtVarsStep, OffsetsStep, PrepVarsStep, PruneVarsStep};

use crate::config::ini_config::ConfigSection;
use crate::config::settings::*;
use crate::domain::ports::Step;
use crate::utils::error::Result;

/// The steps of `run_all`, each configured from `section` alone.
pub fn run_all_steps(section: &ConfigSection) -> Result<Vec<Box<dyn Step>>> {
    let steps: Vec<Box<dyn Step>> = vec![
        Box::new(CoreNlpStep::new(
            "core_nlp",
            CoreNlpSettings::resolve(CoreNlpArgs::default(), section, "core_nlp", CoreNlpPreset::FULL)?,
        )?),
        Box::new(LemmaTreesStep::new(LemmaTreesSettings::resolve(
            LemmaTreesArgs::default(),
            section,
        )?)),
        Box::new(ExtVarsStep::new(ExtVarsSettings::resolve(ExtVarsArgs::default(), section)?)?),
        Box::new(OffsetsStep::new(OffsetsSettings::resolve(OffsetsArgs::default(), section)?)),
        Box::new(PrepVarsStep::new(PrepVarsSettings::resolve(PrepVarsArgs::default(), section)?)?),
        Box::new(PruneVarsStep::new(PruneVarsSettings::resolve(
            PruneVarsArgs::default(),
            section,
        )?)?),
    ];
    Ok(steps)
}

#[cfg(feature = "cli")]
pub use builder::build_steps;

#[cfg(feature = "cli")]
mod builder {
    use super::*;
    use crate::config::cli::Command;
    use crate::utils::error::BaleenError;

    /// Build the steps a subcommand runs.
    pub fn build_steps(command: Command, section: &ConfigSection) -> Result<Vec<Box<dyn Step>>> {
        let name = command.step_name();
        let step: Box<dyn Step> = match command {
            Command::Env { .. } => {
                return Err(BaleenError::ConfigError {
                    message: "env does not run pipeline steps".to_string(),
                })
            }
            Command::RunAll => return run_all_steps(section),
            Command::CoreNlp(args) => Box::new(CoreNlpStep::new(
                name,
                CoreNlpSettings::resolve(args, section, name, CoreNlpPreset::FULL)?,
            )?),
            Command::SplitSent(args) => Box::new(CoreNlpStep::new(
                name,
                CoreNlpSettings::resolve(args, section, name, CoreNlpPreset::SPLIT_SENTENCES)?,
            )?),
            Command::ParseSent(args) => Box::new(CoreNlpStep::new(
                name,
                CoreNlpSettings::resolve(args, section, name, CoreNlpPreset::PARSE_SENTENCES)?,
            )?),
            Command::LemmaTrees(args) => {
                Box::new(LemmaTreesStep::new(LemmaTreesSettings::resolve(args, section)?))
            }
            Command::ExtVars(args) => {
                Box::new(ExtVarsStep::new(ExtVarsSettings::resolve(args, section)?)?)
            }
            Command::Offsets(args) => {
                Box::new(OffsetsStep::new(OffsetsSettings::resolve(args, section)?))
            }
            Command::PrepVars(args) => {
                Box::new(PrepVarsStep::new(PrepVarsSettings::resolve(args, section)?)?)
            }
            Command::PruneVars(args) => {
                Box::new(PruneVarsStep::new(PruneVarsSettings::resolve(args, section)?)?)
            }
            Command::TagVars(args) => {
                Box::new(TagVarsStep::new(TagVarsSettings::resolve(args, section)?))
            }
            Command::ExtRels(args) => {
                Box::new(ExtRelsStep::new(ExtRelsSettings::resolve(args, section)?)?)
            }
            Command::Tocsv(args) => Box::new(ToCsvStep::new(ToCsvSettings::resolve(args, section)?)),
            Command::Artscsv(args) => {
                Box::new(ArtsCsvStep::new(ArtsCsvSettings::resolve(args, section)?)?)
            }
            Command::Relscsv(args) => {
                Box::new(RelsCsvStep::new(RelsCsvSettings::resolve(args, section)?))
            }
            Command::UniqNodes(args) => {
                Box::new(UniqNodesStep::new(UniqNodesSettings::resolve(args, section)?)?)
            }
            Command::Toneo(args) => Box::new(ToNeoStep::new(ToNeoSettings::resolve(args, section)?)),
            Command::Ppgraph(args) => {
                Box::new(PpGraphStep::new(&Neo4jSettings::resolve(args, section, name)?))
            }
            Command::StartServer(args) => Box::new(ServerStep::new(
                Neo4jSettings::resolve(args, section, name)?,
                ServerAction::Start,
            )),
            Command::StopServer(args) => Box::new(ServerStep::new(
                Neo4jSettings::resolve(args, section, name)?,
                ServerAction::Stop,
            )),
            Command::AddCit(args) => Box::new(AddCitStep::new(AddCitSettings::resolve(args, section)?)?),
            Command::AddMeta(args) => {
                Box::new(AddMetaStep::new(AddMetaSettings::resolve(args, section)?)?)
            }
            Command::CleanMetaCache(args) => Box::new(CleanMetaCacheStep::new(
                CleanMetaCacheSettings::resolve(args, section)?,
            )),
            Command::MakePatterns(args) => {
                Box::new(MakePatternsStep::new(MakePatternsSettings::resolve(args, section)?))
            }
            Command::Clean(args) => Box::new(CleanStep::new(CleanSettings::resolve(args, section)?)?),
        };
        Ok(vec![step])
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;
    use crate::config::cli::CliConfig;
    use crate::config::ini_config::{IniConfig, DEFAULT_SECTION};
    use clap::Parser;

    fn section(content: &str) -> ConfigSection {
        let mut config = IniConfig::new();
        config.read_str(content).unwrap();
        config.section(DEFAULT_SECTION).unwrap()
    }

    fn command(args: &[&str]) -> crate::config::cli::Command {
        CliConfig::parse_from(std::iter::once("baleen").chain(args.iter().copied())).command
    }

    #[test]
    fn test_build_single_step() {
        let section = section("make_patterns.out_dir = /tmp/patterns\n");
        let steps = build_steps(command(&["make-patterns"]), &section).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].name(), "make_patterns");
    }

    #[test]
    fn test_split_sent_keeps_its_name() {
        let section = section("split_sent.class_path = /opt/corenlp\nsplit_sent.out_dir = /tmp/sent\n");
        let steps = build_steps(command(&["split-sent", "abstracts"]), &section).unwrap();
        assert_eq!(steps[0].name(), "split_sent");
    }

    #[test]
    fn test_run_all_order() {
        let section = section(
            "core_nlp.input = txt\n\
             core_nlp.out_dir = scnlp\n\
             core_nlp.class_path = /opt/corenlp\n\
             lemma_trees.scnlp_dir = scnlp\n\
             lemma_trees.out_dir = lemtrees\n\
             ext_vars.extract_vars_exec = extract-vars\n\
             ext_vars.trees_dir = lemtrees\n\
             ext_vars.vars_dir = vars\n\
             offsets.vars_dir = vars\n\
             offsets.scnlp_dir = scnlp\n\
             prep_vars.trans_exec = transform\n\
             prep_vars.trans_file = prep.tfm\n\
             prep_vars.in_vars_dir = vars\n\
             prep_vars.out_vars_dir = prep\n\
             prune_vars.prune_vars_exec = prune\n\
             prune_vars.in_vars_dir = prep\n\
             prune_vars.out_vars_dir = pruned\n",
        );
        let steps = build_steps(command(&["run-all"]), &section).unwrap();
        let names: Vec<&str> = steps.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            ["core_nlp", "lemma_trees", "ext_vars", "offsets", "prep_vars", "prune_vars"]
        );
    }

    #[test]
    fn test_missing_option_is_reported() {
        let err = build_steps(command(&["lemma-trees"]), &ConfigSection::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains("lemma_trees.scnlp_dir"));
    }

    #[test]
    fn test_env_is_not_a_step() {
        assert!(build_steps(command(&["env"]), &ConfigSection::default()).is_err());
    }
}
