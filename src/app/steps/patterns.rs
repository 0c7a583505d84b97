//! Tsurgeon pattern files for change, increase and decrease events.
//!
//! Every general tree pattern is instantiated with each trigger verb or
//! noun. Patterns that mark a node `d1` delete it.

use crate::config::settings::MakePatternsSettings;
use crate::domain::model::StepReport;
use crate::domain::ports::Step;
use crate::utils::error::Result;
use async_trait::async_trait;

const RULE: &str = "%==============================================================================";

const VERB_PATTERNS: [(&str, &str); 4] = [
    ("SUBJ", "NP > (S <+(S|VP) (VP <<# {} !< NP))"),
    ("OBJ", "NP > (VP <<# {} )"),
    ("ATTR1", "NP < (VBN|VBD|VBG=d1 < {}) !<: =d1 !$. PP"),
    ("ATTR2", "NP < (NP < (VBN|VBD|VBG=d1 < {}) $. PP)"),
];

const NOUN_PATTERNS: [(&str, &str); 2] = [
    ("NOM1", "NP <- (/NN/=d1 < {} $ /NN/ )  !$. PP"),
    ("NOM2", "NP < (NP <- (/NN/=d1 < {} $ /NN/ )  $. PP)"),
];

/// Preposition alternatives, then the noun.
const PCOMP_PATTERN: &str = "NP > (PP <<# ({}) $, (NP <<# {}))";

/// Trigger words of one event type.
#[derive(Debug, Clone, Copy)]
pub struct EventTriggers {
    pub name: &'static str,
    pub verbs: &'static [&'static str],
    /// (noun, prepositions of its complement)
    pub nouns: &'static [(&'static str, &'static str)],
}

pub const CHANGE: EventTriggers = EventTriggers {
    name: "change",
    verbs: &[
        "adapt", "adjust", "alter", "change", "evolve", "fluctuate", "modify", "modulate", "mutate",
        "shift", "transform", "vary",
    ],
    nouns: &[
        ("adaptation", "of"),
        ("adjustment", "in|of"),
        ("alteration", "in|of|to"),
        ("change", "in|of|to"),
        ("evolution", "in|of"),
        ("fluctuation", "in|of"),
        ("modification", "in|of|to"),
        ("modulation", "in|of"),
        ("mutation", "in|of"),
        ("shift", "in|of"),
        ("transformation", "of"),
        ("variation", "in|of"),
        ("variance", "in|of"),
        ("variability", "in|of"),
    ],
};

pub const INCREASE: EventTriggers = EventTriggers {
    name: "increase",
    verbs: &[
        "add", "accumulate", "augment", "boost", "double", "elevate", "enhance", "enlarge", "expand",
        "gain", "grow", "heighten", "increase", "intensify", "lengthen", "prolong", "raise", "rise",
        "triple", "strengthen",
    ],
    nouns: &[
        ("addition", "of"),
        ("accumulation", "of"),
        ("augmentation", "of"),
        ("boost", "in|of"),
        ("double", "in"),
        ("enhancement", "in|of"),
        ("enlargement", "of"),
        ("expansion", "in|of"),
        ("gain", "in|of"),
        ("growth", "of"),
        ("increase", "in|of"),
        ("prolongation", "of"),
        ("raise", "in"),
        ("rise", "in|of"),
    ],
};

// TODO: comparative adjectives (higher/lower, warmer/cooler) as triggers
pub const DECREASE: EventTriggers = EventTriggers {
    name: "decrease",
    verbs: &[
        "cut", "decrease", "curb", "decline", "deplete", "diminish", "drop", "exhaust", "export",
        "fall", "lessen", "limit", "lower", "minimize", "mitigate", "recede", "reduce", "shrink",
    ],
    nouns: &[
        ("decrease", "in|of"),
        ("decline", "in|of"),
        ("depletion", "of"),
        ("drop", "in|of"),
        ("exhaustion", "of"),
        ("export", "of"),
        ("fall", "in|of"),
        ("limitation", "of"),
        ("loss", "of"),
        ("mitigation", "of"),
        ("reduction", "in|of"),
        ("shrinkage", "in|of"),
    ],
};

pub const ALL_EVENTS: [EventTriggers; 3] = [CHANGE, INCREASE, DECREASE];

/// Replace the `{}` placeholders in order.
fn fill(template: &str, values: &[&str]) -> String {
    let mut result = String::with_capacity(template.len() + 16);
    let mut parts = template.split("{}");
    if let Some(first) = parts.next() {
        result.push_str(first);
    }
    for (part, value) in parts.zip(values.iter().chain(std::iter::repeat(&""))) {
        result.push_str(value);
        result.push_str(part);
    }
    result
}

/// Named patterns: all verb patterns, then all noun patterns, then the
/// prepositional complements.
pub fn generate_patterns(triggers: &EventTriggers) -> Vec<(String, String)> {
    let mut patterns = Vec::new();

    for (name, template) in VERB_PATTERNS {
        for verb in triggers.verbs {
            patterns.push((format!("{}_{}", name, verb), fill(template, &[verb])));
        }
    }
    for (name, template) in NOUN_PATTERNS {
        for (noun, _) in triggers.nouns {
            patterns.push((format!("{}_{}", name, noun), fill(template, &[noun])));
        }
    }
    for (noun, prep) in triggers.nouns {
        patterns.push((format!("PCOMP_{}", noun), fill(PCOMP_PATTERN, &[prep, noun])));
    }

    patterns
}

pub fn render_patterns(patterns: &[(String, String)]) -> String {
    let mut out = String::new();
    for (name, pattern) in patterns {
        let operation = if pattern.contains("=d1") { "\ndelete d1\n" } else { "" };
        out.push_str(&format!(
            "\n{rule}\n$ {name} $\n{rule}\n\n{pattern}\n{operation}\n",
            rule = RULE,
            name = name,
            pattern = pattern,
            operation = operation
        ));
    }
    out
}

pub struct MakePatternsStep {
    settings: MakePatternsSettings,
}

impl MakePatternsStep {
    pub fn new(settings: MakePatternsSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Step for MakePatternsStep {
    fn name(&self) -> &str {
        "make_patterns"
    }

    async fn run(&self) -> Result<StepReport> {
        let mut report = StepReport::new(self.name());
        tokio::fs::create_dir_all(&self.settings.out_dir).await?;

        for triggers in ALL_EVENTS {
            let patterns = generate_patterns(&triggers);
            let path = self.settings.out_dir.join(format!("{}.tfm", triggers.name));
            tracing::info!("writing {} patterns to {}", patterns.len(), path.display());
            tokio::fs::write(&path, render_patterns(&patterns)).await?;
            report.output(path);
        }

        Ok(report.finish())
    }
}
