//! Phrase structure trees in labeled bracket format, as printed by CoreNLP
//! (`(ROOT (S (NP (NN growth)) (VP (VBZ increase))))`).
//!
//! Nodes are stored in pre-order. Node numbers used in variable records are
//! 1-based indices into this order, leaves included, so the outermost bracket
//! is node 1.

use crate::utils::error::{BaleenError, Result};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub label: String,
    pub children: Vec<usize>,
    pub parent: Option<usize>,
    terminal: bool,
}

impl TreeNode {
    /// Terminal (word) node; bracketed nodes are never leaves, even when empty.
    pub fn is_leaf(&self) -> bool {
        self.terminal
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTree {
    nodes: Vec<TreeNode>,
}

#[derive(Debug, PartialEq, Eq)]
enum Symbol<'a> {
    Open(&'a str),
    Close,
    Leaf(&'a str),
}

fn tokenize(input: &str) -> Vec<Symbol<'_>> {
    let mut symbols = Vec::new();
    let bytes = input.as_bytes();
    let mut i = 0;

    let is_delim = |b: u8| b == b'(' || b == b')' || b.is_ascii_whitespace();

    while i < bytes.len() {
        match bytes[i] {
            b'(' => {
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                let start = i;
                while i < bytes.len() && !is_delim(bytes[i]) {
                    i += 1;
                }
                symbols.push(Symbol::Open(&input[start..i]));
            }
            b')' => {
                symbols.push(Symbol::Close);
                i += 1;
            }
            b if b.is_ascii_whitespace() => i += 1,
            _ => {
                let start = i;
                while i < bytes.len() && !is_delim(bytes[i]) {
                    i += 1;
                }
                symbols.push(Symbol::Leaf(&input[start..i]));
            }
        }
    }

    symbols
}

impl ParseTree {
    /// Parse a single tree. Leading/trailing whitespace and newlines inside
    /// the brackets are ignored.
    pub fn parse(input: &str) -> Result<Self> {
        let mut nodes: Vec<TreeNode> = Vec::new();
        let mut stack: Vec<usize> = Vec::new();

        for symbol in tokenize(input) {
            match symbol {
                Symbol::Open(label) => {
                    if !nodes.is_empty() && stack.is_empty() {
                        return Err(malformed(input, "more than one tree"));
                    }
                    let idx = nodes.len();
                    nodes.push(TreeNode {
                        label: label.to_string(),
                        children: Vec::new(),
                        parent: stack.last().copied(),
                        terminal: false,
                    });
                    if let Some(&parent) = stack.last() {
                        nodes[parent].children.push(idx);
                    }
                    stack.push(idx);
                }
                Symbol::Close => {
                    if stack.pop().is_none() {
                        return Err(malformed(input, "unbalanced closing bracket"));
                    }
                }
                Symbol::Leaf(text) => {
                    let Some(&parent) = stack.last() else {
                        return Err(malformed(input, "leaf outside of brackets"));
                    };
                    let idx = nodes.len();
                    nodes.push(TreeNode {
                        label: text.to_string(),
                        children: Vec::new(),
                        parent: Some(parent),
                        terminal: true,
                    });
                    nodes[parent].children.push(idx);
                }
            }
        }

        if !stack.is_empty() {
            return Err(malformed(input, "unbalanced opening bracket"));
        }
        if nodes.is_empty() {
            return Err(malformed(input, "empty tree"));
        }

        Ok(Self { nodes })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node by 1-based pre-order number.
    pub fn node(&self, number: usize) -> Option<&TreeNode> {
        number.checked_sub(1).and_then(|i| self.nodes.get(i))
    }

    pub fn node_mut(&mut self, number: usize) -> Option<&mut TreeNode> {
        number.checked_sub(1).and_then(move |i| self.nodes.get_mut(i))
    }

    /// Pre-order numbers of all leaves, left to right.
    pub fn leaves(&self) -> Vec<usize> {
        (0..self.nodes.len())
            .filter(|&i| self.nodes[i].is_leaf())
            .map(|i| i + 1)
            .collect()
    }

    /// Character span of every node, indexed by pre-order number minus one,
    /// given the spans of the tokens (one per leaf, in order).
    ///
    /// Non-terminals span from the start of their first child to the end of
    /// their last child.
    pub fn node_spans(&self, token_spans: &[(usize, usize)]) -> Result<Vec<(usize, usize)>> {
        let leaves = self.leaves();
        if leaves.len() != token_spans.len() {
            return Err(BaleenError::processing(format!(
                "tree has {} leaves but sentence has {} tokens",
                leaves.len(),
                token_spans.len()
            )));
        }

        let mut spans = vec![(0usize, 0usize); self.nodes.len()];
        for (leaf, span) in leaves.iter().zip(token_spans) {
            spans[leaf - 1] = *span;
        }

        // 反向的前序走訪保證子節點先於父節點處理
        for idx in (0..self.nodes.len()).rev() {
            let node = &self.nodes[idx];
            if let (Some(&first), Some(&last)) = (node.children.first(), node.children.last()) {
                spans[idx] = (spans[first].0, spans[last].1);
            }
        }

        Ok(spans)
    }

    fn write_node(&self, idx: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = &self.nodes[idx];
        if node.is_leaf() {
            return write!(f, "{}", node.label);
        }
        write!(f, "({}", node.label)?;
        for &child in &node.children {
            write!(f, " ")?;
            self.write_node(child, f)?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for ParseTree {
    /// Single-line labeled bracket format.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_node(0, f)
    }
}

fn malformed(input: &str, reason: &str) -> BaleenError {
    let preview: String = input.chars().take(80).collect();
    BaleenError::processing(format!("malformed parse tree ({}): {}", reason, preview))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TREE: &str = "(ROOT (S (NP (NN growth)) (VP (VBZ increase))))";

    #[test]
    fn test_preorder_numbering() {
        let tree = ParseTree::parse(TREE).unwrap();
        // ROOT S NP NN growth VP VBZ increase
        assert_eq!(tree.len(), 8);
        assert_eq!(tree.node(1).unwrap().label, "ROOT");
        assert_eq!(tree.node(3).unwrap().label, "NP");
        assert_eq!(tree.node(5).unwrap().label, "growth");
        assert!(tree.node(5).unwrap().is_leaf());
        assert_eq!(tree.leaves(), vec![5, 8]);
        assert!(tree.node(0).is_none());
    }

    #[test]
    fn test_display_roundtrips_whitespace() {
        let tree = ParseTree::parse("(ROOT\n  (S\n    (NP (NN growth))\n    (VP (VBZ increase))))").unwrap();
        assert_eq!(tree.to_string(), TREE);
    }

    #[test]
    fn test_node_spans() {
        let tree = ParseTree::parse(TREE).unwrap();
        let spans = tree.node_spans(&[(0, 6), (7, 15)]).unwrap();
        assert_eq!(spans[0], (0, 15));
        assert_eq!(spans[2], (0, 6));
        assert_eq!(spans[5], (7, 15));
    }

    #[test]
    fn test_token_count_mismatch() {
        let tree = ParseTree::parse(TREE).unwrap();
        assert!(tree.node_spans(&[(0, 6)]).is_err());
    }

    #[test]
    fn test_unbalanced() {
        assert!(ParseTree::parse("(ROOT (S (NN x)").is_err());
        assert!(ParseTree::parse("(ROOT (NN x)))").is_err());
        assert!(ParseTree::parse("").is_err());
    }

    #[test]
    fn test_empty_root_label() {
        let tree = ParseTree::parse("( (S (NN x)))").unwrap();
        assert_eq!(tree.node(1).unwrap().label, "");
        assert_eq!(tree.to_string(), "( (S (NN x)))");
    }
}
