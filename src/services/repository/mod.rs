//! 仓库遍历
//!
//! 源定位 → 工作树（本地校验或克隆）→ 文件枚举。

pub mod scanner;
pub mod source;

use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::config::AppConfig;
use crate::error::AnalysisError;

pub use scanner::{RepositoryScanner, WalkOutcome, WalkedFile};
pub use source::{SourceLocator, WorkingTree};

/// 仓库遍历器
pub struct RepositoryWalker {
    allowed_roots: Vec<PathBuf>,
    allowed_hosts: Vec<String>,
    clone_timeout: Duration,
    scanner: RepositoryScanner,
}

impl RepositoryWalker {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            allowed_roots: config.allowed_roots.clone(),
            allowed_hosts: config.allowed_clone_hosts.clone(),
            clone_timeout: config.clone_timeout(),
            scanner: RepositoryScanner::new(config.max_file_size, &config.ignore_patterns),
        }
    }

    pub fn allowed_hosts(&self) -> &[String] {
        &self.allowed_hosts
    }

    /// 准备工作树：远程仓库克隆到临时目录，本地路径做安全校验
    pub async fn materialize(&self, locator: &SourceLocator) -> Result<WorkingTree, AnalysisError> {
        match locator {
            SourceLocator::Remote { url, host, .. } => {
                info!("Materializing remote source from {}", host);
                source::clone_repository(url, self.clone_timeout).await
            }
            SourceLocator::Local(path) => source::resolve_local(path, &self.allowed_roots),
        }
    }

    /// 枚举工作树中的文件（阻塞调用）
    pub fn enumerate(&self, root: &Path, max_files: usize) -> Result<WalkOutcome, AnalysisError> {
        self.scanner.scan(root, max_files)
    }
}
