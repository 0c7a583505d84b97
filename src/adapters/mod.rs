// Adapters layer: concrete implementations for external systems (processes, http, storage)

pub mod crossref;
pub mod cypher;
pub mod process;
pub mod storage;
