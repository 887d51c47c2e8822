//! 分析请求与结果模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{AnalysisError, ErrorKind};
use crate::services::code_analyzer::ProjectSummary;
use crate::services::doc_generator::ArtifactKind;

/// 源的类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    GithubUrl,
    LocalPath,
}

fn default_true() -> bool {
    true
}

/// 分析请求，受理后不再修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// 仓库 URL 或本地路径
    pub source: String,
    /// 未指定时根据 source 推断
    #[serde(default)]
    pub input_type: Option<InputType>,
    /// 未指定时使用配置的默认值
    #[serde(default)]
    pub max_files: Option<usize>,
    #[serde(default = "default_true")]
    pub include_diagrams: bool,
    #[serde(default = "default_true")]
    pub include_documentation: bool,
}

impl AnalysisRequest {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            input_type: None,
            max_files: None,
            include_diagrams: true,
            include_documentation: true,
        }
    }

    /// 基本参数校验
    pub fn validate(&self) -> Result<(), String> {
        if self.source.trim().is_empty() {
            return Err("source cannot be empty".to_string());
        }
        if self.max_files == Some(0) {
            return Err("max_files must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn wants_artifacts(&self) -> bool {
        self.include_documentation || self.include_diagrams
    }
}

/// 生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl AnalysisStatus {
    fn rank(self) -> u8 {
        match self {
            AnalysisStatus::Pending => 0,
            AnalysisStatus::Running => 1,
            AnalysisStatus::Completed | AnalysisStatus::Failed => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AnalysisStatus::Completed | AnalysisStatus::Failed)
    }

    /// 状态只能前进，终态不可再变
    pub fn can_transition_to(self, next: AnalysisStatus) -> bool {
        !self.is_terminal() && next.rank() >= self.rank()
    }
}

/// 附加在结果上的非致命警告
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisWarning {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactKind>,
}

impl AnalysisWarning {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            path: None,
            artifact: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_artifact(mut self, artifact: ArtifactKind) -> Self {
        self.artifact = Some(artifact);
        self
    }
}

/// 终止错误
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&AnalysisError> for ErrorDetail {
    fn from(err: &AnalysisError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal transition {from:?} -> {to:?}")]
pub struct TransitionError {
    pub from: AnalysisStatus,
    pub to: AnalysisStatus,
}

/// 分析结果记录，只由编排器修改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub id: String,
    pub status: AnalysisStatus,
    /// 0-100
    pub progress: u8,
    pub message: String,
    pub request: AnalysisRequest,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub summary: Option<ProjectSummary>,
    pub overview: Option<String>,
    pub file_docs: BTreeMap<String, String>,
    pub sequence_diagram: Option<String>,
    pub class_diagram: Option<String>,
    pub warnings: Vec<AnalysisWarning>,
    pub error: Option<ErrorDetail>,
}

impl AnalysisResult {
    pub fn pending(id: impl Into<String>, request: AnalysisRequest) -> Self {
        Self {
            id: id.into(),
            status: AnalysisStatus::Pending,
            progress: 0,
            message: "Analysis queued".to_string(),
            request,
            started_at: Utc::now(),
            completed_at: None,
            summary: None,
            overview: None,
            file_docs: BTreeMap::new(),
            sequence_diagram: None,
            class_diagram: None,
            warnings: Vec::new(),
            error: None,
        }
    }

    pub fn transition(&mut self, next: AnalysisStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// 进度只增不减
    pub fn advance(&mut self, progress: u8, message: impl Into<String>) {
        self.progress = self.progress.max(progress.min(100));
        self.message = message.into();
    }

    pub fn warn(&mut self, warning: AnalysisWarning) {
        self.warnings.push(warning);
    }

    pub fn complete(&mut self) -> Result<(), TransitionError> {
        self.transition(AnalysisStatus::Completed)?;
        self.advance(100, "Analysis completed");
        Ok(())
    }

    pub fn fail(&mut self, err: &AnalysisError) -> Result<(), TransitionError> {
        self.transition(AnalysisStatus::Failed)?;
        self.message = "Analysis failed".to_string();
        self.error = Some(ErrorDetail::from(err));
        Ok(())
    }
}
