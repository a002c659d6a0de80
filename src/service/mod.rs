//! Assessment stages and their orchestration

pub mod attack_tree;
pub mod dread;
pub mod mitigation;
pub mod pipeline;
pub mod repair;
pub mod test_cases;
pub mod threat_model;

pub use pipeline::{ApplicationProfile, AssessmentPipeline, PipelineError};
