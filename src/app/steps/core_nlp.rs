use crate::adapters::process::ExternalCommand;
use crate::config::settings::CoreNlpSettings;
use crate::domain::model::StepReport;
use crate::domain::paths::expand_input;
use crate::domain::ports::Step;
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const SR_PARSER_MODEL: &str = "edu/stanford/nlp/models/srparser/englishSR.ser.gz";

/// Runs the Stanford CoreNLP pipeline on text files.
pub struct CoreNlpStep {
    name: String,
    settings: CoreNlpSettings,
}

impl CoreNlpStep {
    pub fn new(name: &str, settings: CoreNlpSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            name: name.to_string(),
            settings,
        })
    }

    /// Where CoreNLP will write the output for `input`.
    pub fn output_path(&self, input: &Path) -> PathBuf {
        let ext = self.settings.effective_output_ext();
        let replace = self.settings.replace_ext || self.settings.stamp;
        let base = if replace {
            input.file_stem()
        } else {
            input.file_name()
        };
        let base = base.map(|b| b.to_string_lossy().into_owned()).unwrap_or_default();
        self.settings.out_dir.join(format!("{}{}", base, ext))
    }

    /// Inputs still to be processed, and the number skipped because their
    /// output already exists.
    pub fn pending_inputs(&self) -> Result<(Vec<PathBuf>, usize)> {
        let inputs = expand_input(&self.settings.input, "txt")?;
        if !self.settings.resume {
            return Ok((inputs, 0));
        }

        let total = inputs.len();
        let pending: Vec<PathBuf> = inputs
            .into_iter()
            .filter(|input| !self.output_path(input).exists())
            .collect();
        let skipped = total - pending.len();
        Ok((pending, skipped))
    }

    pub fn command(&self, filelist: &Path) -> ExternalCommand {
        let s = &self.settings;
        let class_path = format!("{}/*", s.class_path.display());

        let mut cmd = ExternalCommand::new(&s.java)
            .arg(format!("-Xmx{}", s.memory))
            .arg("-cp")
            .arg(class_path)
            .arg("edu.stanford.nlp.pipeline.StanfordCoreNLP")
            .arg("-annotators")
            .arg(&s.annotators)
            .arg("-filelist")
            .arg(filelist)
            .arg("-outputDirectory")
            .arg(&s.out_dir)
            .arg("-threads")
            .arg(s.threads.to_string())
            .timeout(s.timeout);

        if let Some(options) = &s.options {
            cmd = cmd.split_args(options);
        }
        if s.use_sr_parser {
            cmd = cmd.arg("-parse.model").arg(SR_PARSER_MODEL);
        }
        if s.replace_ext || s.stamp {
            cmd = cmd.arg("-replaceExtension");
        }
        let ext = s.effective_output_ext();
        if !ext.is_empty() {
            cmd = cmd.arg("-outputExtension").arg(ext);
        }

        cmd
    }
}

#[async_trait]
impl Step for CoreNlpStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<StepReport> {
        let mut report = StepReport::new(&self.name);
        tokio::fs::create_dir_all(&self.settings.out_dir).await?;

        let (inputs, skipped) = self.pending_inputs()?;
        report.skipped = skipped;
        if skipped > 0 {
            tracing::info!("⏭️ skipping {} input files with existing output", skipped);
        }

        if inputs.is_empty() {
            tracing::info!("💡 no input files left to process");
            return Ok(report.finish());
        }

        // CoreNLP 讀取的檔案清單，一行一個檔名
        let mut filelist = tempfile::NamedTempFile::new()?;
        for input in &inputs {
            writeln!(filelist, "{}", input.display())?;
        }
        filelist.flush()?;

        let output = self.command(filelist.path()).run().await?;
        if !output.stderr.trim().is_empty() {
            tracing::debug!("\n{}", output.stderr.trim_end());
        }

        for input in &inputs {
            report.output(self.output_path(input));
        }

        Ok(report.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::DEFAULT_ANNOTATORS;
    use tempfile::TempDir;

    fn settings(input: &str, out_dir: &Path) -> CoreNlpSettings {
        CoreNlpSettings {
            input: input.to_string(),
            out_dir: out_dir.to_path_buf(),
            annotators: DEFAULT_ANNOTATORS.to_string(),
            class_path: PathBuf::from("/opt/corenlp"),
            version: "3.5.1".to_string(),
            memory: "3g".to_string(),
            threads: 2,
            replace_ext: true,
            output_ext: ".xml".to_string(),
            options: Some("-ssplit.eolonly".to_string()),
            stamp: true,
            resume: false,
            use_sr_parser: true,
            timeout: None,
            java: "java".to_string(),
        }
    }

    #[test]
    fn test_command_line() {
        let step = CoreNlpStep::new("core_nlp", settings("a.txt", Path::new("/out"))).unwrap();
        let line = step.command(Path::new("/tmp/files")).display();
        assert_eq!(
            line,
            "java -Xmx3g -cp /opt/corenlp/* edu.stanford.nlp.pipeline.StanfordCoreNLP \
             -annotators tokenize,ssplit,pos,lemma,parse -filelist /tmp/files \
             -outputDirectory /out -threads 2 -ssplit.eolonly \
             -parse.model edu/stanford/nlp/models/srparser/englishSR.ser.gz \
             -replaceExtension -outputExtension #scnlp_v3.5.1.xml"
        );
    }

    #[test]
    fn test_output_path_without_replace() {
        let mut s = settings("a.txt", Path::new("/out"));
        s.stamp = false;
        s.replace_ext = false;
        let step = CoreNlpStep::new("core_nlp", s).unwrap();
        assert_eq!(step.output_path(Path::new("/in/a.txt")), PathBuf::from("/out/a.txt.xml"));
    }

    #[test]
    fn test_resume_skips_existing_output() {
        let temp_dir = TempDir::new().unwrap();
        let txt_dir = temp_dir.path().join("txt");
        let out_dir = temp_dir.path().join("scnlp");
        std::fs::create_dir_all(&txt_dir).unwrap();
        std::fs::create_dir_all(&out_dir).unwrap();
        std::fs::write(txt_dir.join("a.txt"), "A").unwrap();
        std::fs::write(txt_dir.join("b.txt"), "B").unwrap();
        std::fs::write(out_dir.join("a#scnlp_v3.5.1.xml"), "<root/>").unwrap();

        let mut s = settings(&txt_dir.to_string_lossy(), &out_dir);
        s.resume = true;
        let step = CoreNlpStep::new("core_nlp", s).unwrap();
        let (pending, skipped) = step.pending_inputs().unwrap();

        assert_eq!(pending, vec![txt_dir.join("b.txt")]);
        assert_eq!(skipped, 1);
    }

    #[tokio::test]
    async fn test_nothing_to_do_does_not_start_java() {
        let temp_dir = TempDir::new().unwrap();
        let out_dir = temp_dir.path().join("scnlp");
        std::fs::create_dir_all(&out_dir).unwrap();
        std::fs::write(out_dir.join("a#scnlp_v3.5.1.xml"), "<root/>").unwrap();

        let mut s = settings("/in/a.txt", &out_dir);
        s.resume = true;
        s.java = "/nonexistent/java".to_string();
        let report = CoreNlpStep::new("core_nlp", s).unwrap().run().await.unwrap();

        assert_eq!(report.processed, 0);
        assert_eq!(report.skipped, 1);
    }
}
