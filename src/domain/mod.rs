// Domain layer: records, file naming, CoreNLP documents and parse trees.

pub mod model;
pub mod paths;
pub mod ports;
pub mod scnlp;
pub mod tree;
