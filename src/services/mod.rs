//! 服务层模块

pub mod code_analyzer;
pub mod doc_generator;
pub mod orchestrator;
pub mod repository;
pub mod result_store;

pub use code_analyzer::CodeAnalyzer;
pub use orchestrator::{AnalysisHandle, AnalysisOrchestrator, SubmitError};
pub use result_store::{ResultStore, StoreError};
