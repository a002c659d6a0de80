pub mod attack_tree;
pub mod config;
pub mod document;
pub mod dread;
pub mod threat_model;

pub use attack_tree::{AttackTree, AttackTreeNode, NodeKind};
pub use config::{Config, ConfigError, LlmMethod};
pub use document::{Chunk, ChunkMetadata, SourceDocument, SourceMetadata, SourceOrigin};
pub use dread::{DreadAssessment, DreadEntry};
pub use threat_model::{ThreatModelEntry, ThreatModelReport};
