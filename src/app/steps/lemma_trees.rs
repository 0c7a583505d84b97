use crate::adapters::storage::LocalStorage;
use crate::config::settings::LemmaTreesSettings;
use crate::domain::model::StepReport;
use crate::domain::paths::{derive_path, list_files, Derive};
use crate::domain::ports::{Step, Storage};
use crate::domain::scnlp::ScnlpDocument;
use crate::utils::error::{BaleenError, Result};
use async_trait::async_trait;
use std::path::Path;

/// Writes one lemmatized parse tree per sentence for every CoreNLP XML file.
pub struct LemmaTreesStep {
    settings: LemmaTreesSettings,
}

impl LemmaTreesStep {
    pub fn new(settings: LemmaTreesSettings) -> Self {
        Self { settings }
    }
}

/// Lemmatized trees of a CoreNLP document, one per line.
pub fn lemmatized_trees(doc: &ScnlpDocument) -> Result<String> {
    let mut content = String::new();
    for (i, sentence) in doc.sentences.iter().enumerate() {
        let tree = sentence.lemmatized_parse().map_err(|e| {
            BaleenError::processing(format!("sentence {}: {}", i + 1, e))
        })?;
        content.push_str(&tree);
        content.push('\n');
    }
    Ok(content)
}

fn parse_file_name(scnlp_path: &Path) -> String {
    derive_path(scnlp_path, Derive::default().ext("parse"))
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[async_trait]
impl Step for LemmaTreesStep {
    fn name(&self) -> &str {
        "lemma_trees"
    }

    async fn run(&self) -> Result<StepReport> {
        let mut report = StepReport::new(self.name());
        let storage = LocalStorage::new(&self.settings.out_dir);

        for scnlp_path in list_files(&self.settings.scnlp_dir, Some("xml"))? {
            let doc = ScnlpDocument::from_file(&scnlp_path).map_err(|e| {
                BaleenError::processing(format!("{}: {}", scnlp_path.display(), e))
            })?;
            let trees = lemmatized_trees(&doc)
                .map_err(|e| BaleenError::processing(format!("{}: {}", scnlp_path.display(), e)))?;

            let name = parse_file_name(&scnlp_path);
            tracing::info!("writing {}", storage.path_of(&name).display());
            storage.write_file(&name, trees.as_bytes()).await?;
            report.output(storage.path_of(&name));
        }

        Ok(report.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::scnlp::fixtures::SCNLP_XML;
    use tempfile::TempDir;

    #[test]
    fn test_parse_file_name_keeps_tags() {
        assert_eq!(
            parse_file_name(Path::new("/scnlp/10.1%2Fx#scnlp_v3.5.1.xml")),
            "10.1%2Fx#scnlp_v3.5.1.parse"
        );
    }

    #[tokio::test]
    async fn test_writes_one_tree_per_line() {
        let temp_dir = TempDir::new().unwrap();
        let scnlp_dir = temp_dir.path().join("scnlp");
        let out_dir = temp_dir.path().join("trees");
        std::fs::create_dir_all(&scnlp_dir).unwrap();
        std::fs::write(scnlp_dir.join("doc#scnlp_v3.5.1.xml"), SCNLP_XML).unwrap();
        std::fs::write(scnlp_dir.join("notes.txt"), "ignored").unwrap();

        let step = LemmaTreesStep::new(LemmaTreesSettings {
            scnlp_dir,
            out_dir: out_dir.clone(),
        });
        let report = step.run().await.unwrap();

        assert_eq!(report.processed, 1);
        let content = std::fs::read_to_string(out_dir.join("doc#scnlp_v3.5.1.parse")).unwrap();
        assert_eq!(
            content,
            "(ROOT (S (NP (NN growth)) (VP (VBZ increase))))\n(ROOT (S (NP (NN rain)) (VP (VBD fall))))\n"
        );
    }
}
