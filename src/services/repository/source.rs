//! 源定位与工作树
//!
//! 把请求中的源字符串解析为远程仓库或本地路径，完成安全校验，
//! 并产出一个在分析结束后自动清理的工作树。

use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{info, warn};

use crate::error::AnalysisError;
use crate::models::analysis::InputType;

/// https://host/path、ssh://[user@]host/path、git@host:path
static RE_REMOTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:(?:https|ssh)://(?:[^@/\s]+@)?(?P<host>[A-Za-z0-9.-]+)(?::\d+)?/|git@(?P<scp_host>[A-Za-z0-9.-]+):)(?P<path>[^\s]+)$",
    )
    .unwrap()
});

/// 解析后的源定位符
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocator {
    Remote { url: String, host: String, path: String },
    Local(PathBuf),
}

impl SourceLocator {
    /// 解析源字符串；未指定类型时根据形态推断
    pub fn parse(
        source: &str,
        input_type: Option<InputType>,
        allowed_hosts: &[String],
    ) -> Result<Self, AnalysisError> {
        let source = source.trim();
        if source.is_empty() {
            return Err(AnalysisError::InvalidSource("source is empty".to_string()));
        }

        let input_type = input_type.unwrap_or_else(|| infer_input_type(source));
        match input_type {
            InputType::GithubUrl => Self::parse_remote(source, allowed_hosts),
            InputType::LocalPath => Ok(SourceLocator::Local(PathBuf::from(source))),
        }
    }

    fn parse_remote(source: &str, allowed_hosts: &[String]) -> Result<Self, AnalysisError> {
        let caps = RE_REMOTE.captures(source).ok_or_else(|| {
            AnalysisError::InvalidSource(format!(
                "unsupported repository URL (expected https://, ssh:// or git@): {}",
                source
            ))
        })?;

        let host = caps
            .name("host")
            .or_else(|| caps.name("scp_host"))
            .map(|m| m.as_str().to_ascii_lowercase())
            .unwrap_or_default();
        let path = caps
            .name("path")
            .map(|m| m.as_str().trim_end_matches('/').to_string())
            .unwrap_or_default();

        if !allowed_hosts.iter().any(|h| h.eq_ignore_ascii_case(&host)) {
            return Err(AnalysisError::InvalidSource(format!(
                "host '{}' is not in the clone allow-list",
                host
            )));
        }
        if path.is_empty() || path.split('/').any(|segment| segment == "..") {
            return Err(AnalysisError::InvalidSource(format!(
                "invalid repository path in {}",
                source
            )));
        }

        Ok(SourceLocator::Remote {
            url: source.to_string(),
            host,
            path,
        })
    }

    /// 项目名：最后一段路径，去掉 `.git`
    pub fn project_name(&self) -> String {
        let name = match self {
            SourceLocator::Remote { path, .. } => path.rsplit('/').next().unwrap_or(path).to_string(),
            SourceLocator::Local(dir) => dir
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| dir.to_string_lossy().to_string()),
        };
        let name = name.strip_suffix(".git").unwrap_or(&name).to_string();
        if name.is_empty() {
            "project".to_string()
        } else {
            name
        }
    }
}

fn infer_input_type(source: &str) -> InputType {
    if source.contains("://") || source.starts_with("git@") {
        InputType::GithubUrl
    } else {
        InputType::LocalPath
    }
}

/// 分析用的工作树；克隆出来的临时目录随之一起释放
#[derive(Debug)]
pub struct WorkingTree {
    root: PathBuf,
    temp: Option<TempDir>,
}

impl WorkingTree {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_clone(&self) -> bool {
        self.temp.is_some()
    }
}

/// 校验本地路径
///
/// 路径必须存在且是目录；配置了允许的根目录时，解析后的真实路径必须落在其中。
/// 输入本身是符号链接时，只有目标落在允许的根目录内才接受。
pub fn resolve_local(path: &Path, allowed_roots: &[PathBuf]) -> Result<WorkingTree, AnalysisError> {
    let metadata = fs::symlink_metadata(path).map_err(|e| {
        AnalysisError::InvalidSource(format!("{}: {}", path.display(), e))
    })?;

    let canonical = fs::canonicalize(path)
        .map_err(|e| AnalysisError::InvalidSource(format!("{}: {}", path.display(), e)))?;

    let roots: Vec<PathBuf> = allowed_roots
        .iter()
        .filter_map(|root| fs::canonicalize(root).ok())
        .collect();
    let inside_roots = roots.iter().any(|root| canonical.starts_with(root));

    if metadata.file_type().is_symlink() && !inside_roots {
        warn!("Rejected symlinked source: {}", path.display());
        return Err(AnalysisError::SecurityRejection(format!(
            "{} is a symbolic link outside the allowed roots",
            path.display()
        )));
    }
    if !allowed_roots.is_empty() && !inside_roots {
        warn!("Rejected source outside allowed roots: {}", canonical.display());
        return Err(AnalysisError::SecurityRejection(format!(
            "{} is outside the allowed roots",
            path.display()
        )));
    }
    if !canonical.is_dir() {
        return Err(AnalysisError::InvalidSource(format!(
            "{} is not a directory",
            path.display()
        )));
    }

    Ok(WorkingTree {
        root: canonical,
        temp: None,
    })
}

/// 浅克隆远程仓库到临时目录
pub async fn clone_repository(url: &str, timeout: Duration) -> Result<WorkingTree, AnalysisError> {
    let temp = TempDir::new()
        .map_err(|e| AnalysisError::Internal(format!("cannot create temp dir: {}", e)))?;
    let target = temp.path().join("repo");

    info!("Cloning repository: {}", url);

    let child = Command::new("git")
        .arg("clone")
        .arg("--depth")
        .arg("1")
        .arg("--")
        .arg(url)
        .arg(&target)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| AnalysisError::CloneFailure(format!("cannot run git: {}", e)))?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(AnalysisError::CloneFailure(e.to_string())),
        Err(_) => {
            return Err(AnalysisError::CloneFailure(format!(
                "git clone timed out after {}s",
                timeout.as_secs()
            )))
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let message: String = stderr.trim().chars().take(500).collect();
        warn!("git clone failed for {}: {}", url, message);
        return Err(AnalysisError::CloneFailure(message));
    }

    info!("Clone completed: {}", url);
    Ok(WorkingTree {
        root: target,
        temp: Some(temp),
    })
}
