//! Stanford CoreNLP XML output.

use crate::utils::error::{BaleenError, Result};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub word: String,
    pub lemma: Option<String>,
    pub begin: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    pub tokens: Vec<Token>,
    pub parse: Option<String>,
}

impl Sentence {
    /// Character span from the first token's begin to the last token's end.
    pub fn span(&self) -> Option<(usize, usize)> {
        Some((self.tokens.first()?.begin, self.tokens.last()?.end))
    }

    pub fn token_spans(&self) -> Vec<(usize, usize)> {
        self.tokens.iter().map(|t| (t.begin, t.end)).collect()
    }

    /// The parse tree with every terminal replaced by its token's lemma.
    pub fn lemmatized_parse(&self) -> Result<String> {
        let parse = self
            .parse
            .as_deref()
            .ok_or_else(|| BaleenError::processing("sentence has no parse"))?;

        let mut lemmas = self.tokens.iter();
        let mut nodes = Vec::new();

        for node in parse.split_whitespace() {
            if node.starts_with('(') {
                nodes.push(node.to_string());
                continue;
            }
            // 終端節點：詞彙後面接著若干個右括號
            let brackets = node.find(')').map(|i| &node[i..]).unwrap_or("");
            let token = lemmas.next().ok_or_else(|| {
                BaleenError::processing("parse tree has more terminals than tokens")
            })?;
            let lemma = token.lemma.as_deref().ok_or_else(|| {
                BaleenError::processing(format!("token '{}' has no lemma", token.word))
            })?;
            nodes.push(format!("{}{}", lemma, brackets));
        }

        Ok(nodes.join(" "))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScnlpDocument {
    pub sentences: Vec<Sentence>,
}

impl ScnlpDocument {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_xml_str(&content)
    }

    pub fn from_xml_str(content: &str) -> Result<Self> {
        let doc = roxmltree::Document::parse(content)?;

        let Some(sentences_elem) = doc.descendants().find(|n| n.has_tag_name("sentences")) else {
            return Ok(Self::default());
        };

        let mut sentences = Vec::new();
        for sentence_elem in sentences_elem.children().filter(|n| n.has_tag_name("sentence")) {
            let mut tokens = Vec::new();

            if let Some(tokens_elem) = child(sentence_elem, "tokens") {
                for token_elem in tokens_elem.children().filter(|n| n.has_tag_name("token")) {
                    tokens.push(Token {
                        word: child_text(token_elem, "word").unwrap_or_default(),
                        lemma: child_text(token_elem, "lemma"),
                        begin: child_offset(token_elem, "CharacterOffsetBegin")?,
                        end: child_offset(token_elem, "CharacterOffsetEnd")?,
                    });
                }
            }

            sentences.push(Sentence {
                tokens,
                parse: child_text(sentence_elem, "parse").map(|p| p.trim().to_string()),
            });
        }

        Ok(Self { sentences })
    }

    /// Sentence by 1-based tree number.
    pub fn sentence(&self, tree_number: usize) -> Option<&Sentence> {
        tree_number.checked_sub(1).and_then(|i| self.sentences.get(i))
    }
}

fn child<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
    name: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name(name))
}

fn child_text(node: roxmltree::Node<'_, '_>, name: &str) -> Option<String> {
    child(node, name).and_then(|n| n.text()).map(str::to_string)
}

fn child_offset(node: roxmltree::Node<'_, '_>, name: &str) -> Result<usize> {
    let text = child_text(node, name)
        .ok_or_else(|| BaleenError::processing(format!("token without {}", name)))?;
    text.trim()
        .parse()
        .map_err(|_| BaleenError::processing(format!("invalid {}: '{}'", name, text)))
}

/// Slice `text` by character (not byte) offsets, as CoreNLP counts them.
pub fn char_slice(text: &str, begin: usize, end: usize) -> String {
    text.chars().skip(begin).take(end.saturating_sub(begin)).collect()
}

#[cfg(test)]
pub(crate) mod fixtures {
    pub const SCNLP_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<root>
  <document>
    <sentences>
      <sentence id="1">
        <tokens>
          <token id="1"><word>Growth</word><lemma>growth</lemma><CharacterOffsetBegin>0</CharacterOffsetBegin><CharacterOffsetEnd>6</CharacterOffsetEnd><POS>NN</POS></token>
          <token id="2"><word>increases</word><lemma>increase</lemma><CharacterOffsetBegin>7</CharacterOffsetBegin><CharacterOffsetEnd>16</CharacterOffsetEnd><POS>VBZ</POS></token>
        </tokens>
        <parse>(ROOT (S (NP (NN Growth)) (VP (VBZ increases)))) </parse>
      </sentence>
      <sentence id="2">
        <tokens>
          <token id="1"><word>Rain</word><lemma>rain</lemma><CharacterOffsetBegin>18</CharacterOffsetBegin><CharacterOffsetEnd>22</CharacterOffsetEnd><POS>NN</POS></token>
          <token id="2"><word>fell</word><lemma>fall</lemma><CharacterOffsetBegin>23</CharacterOffsetBegin><CharacterOffsetEnd>27</CharacterOffsetEnd><POS>VBD</POS></token>
        </tokens>
        <parse>(ROOT (S (NP (NN Rain)) (VP (VBD fell))))</parse>
      </sentence>
    </sentences>
  </document>
</root>
"#;

    pub const TEXT: &str = "Growth increases.\nRain fell.";
}
