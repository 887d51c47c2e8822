//! 仓库文件扫描器
//!
//! 枚举工作树下可解析的源文件：按扩展名白名单、忽略规则和大小上限过滤，
//! 排序后截断到请求的文件数上限。符号链接一律不跟随。

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::AnalysisError;
use crate::services::code_analyzer::Language;

/// 默认忽略的目录名
pub const IGNORED_DIRS: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    "node_modules",
    "__pycache__",
    "venv",
    ".venv",
    "env",
    "build",
    "dist",
    "target",
    "out",
    ".idea",
    ".vscode",
    ".next",
    ".cache",
    ".tox",
];

/// 扫描到的单个文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkedFile {
    pub path: PathBuf,
    /// 相对根目录的路径，`/` 分隔
    pub relative: String,
    pub size: u64,
}

/// 一次扫描的结果
#[derive(Debug, Clone)]
pub struct WalkOutcome {
    pub root: PathBuf,
    /// 按相对路径字典序排列，长度不超过上限
    pub files: Vec<WalkedFile>,
    /// 截断前符合条件的文件数
    pub total_eligible: usize,
    pub truncated: bool,
    pub directories: BTreeSet<String>,
}

/// 仓库扫描器
pub struct RepositoryScanner {
    max_file_size: u64,
    /// 编译后的忽略模式（glob patterns）
    ignore_patterns: Vec<glob::Pattern>,
}

impl RepositoryScanner {
    pub fn new(max_file_size: u64, patterns: &[String]) -> Self {
        let ignore_patterns = patterns
            .iter()
            .filter_map(|p| match glob::Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!("Invalid ignore pattern '{}': {}", p, e);
                    None
                }
            })
            .collect();

        Self {
            max_file_size,
            ignore_patterns,
        }
    }

    /// 扫描目录
    ///
    /// 指向根目录之外的符号链接会使整个请求被拒绝；根目录内的符号链接直接跳过。
    pub fn scan(&self, root: &Path, max_files: usize) -> Result<WalkOutcome, AnalysisError> {
        let root = fs::canonicalize(root)
            .map_err(|e| AnalysisError::InvalidSource(format!("{}: {}", root.display(), e)))?;
        if !root.is_dir() {
            return Err(AnalysisError::InvalidSource(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        info!("Starting repository scan: {}", root.display());

        let mut files = Vec::new();
        let mut directories = BTreeSet::new();

        let walker = WalkDir::new(&root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !self.should_ignore(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if entry.depth() == 0 {
                continue;
            }

            let relative = relative_path(&root, entry.path());

            if entry.path_is_symlink() {
                self.check_symlink(&root, &entry, &relative)?;
                debug!("Skipping symlink: {}", relative);
                continue;
            }

            let file_type = entry.file_type();
            if file_type.is_dir() {
                directories.insert(relative);
                continue;
            }
            if !file_type.is_file() || !Language::classify(&relative).is_supported() {
                continue;
            }

            let size = match entry.metadata() {
                Ok(metadata) => metadata.len(),
                Err(e) => {
                    warn!("Cannot stat {}: {}", relative, e);
                    continue;
                }
            };
            if size > self.max_file_size {
                debug!("Skipping oversized file: {} ({} bytes)", relative, size);
                continue;
            }

            files.push(WalkedFile {
                path: entry.into_path(),
                relative,
                size,
            });
        }

        files.sort_by(|a, b| a.relative.cmp(&b.relative));
        let total_eligible = files.len();
        let truncated = total_eligible > max_files;
        if truncated {
            warn!(
                "File limit reached: keeping {} of {} eligible files",
                max_files, total_eligible
            );
            files.truncate(max_files);
        }

        info!(
            "Scan completed: {} files, {} directories",
            files.len(),
            directories.len()
        );

        Ok(WalkOutcome {
            root,
            files,
            total_eligible,
            truncated,
            directories,
        })
    }

    /// 检查是否应该忽略该条目（目录被忽略时整棵子树都不会进入）
    fn should_ignore(&self, entry: &DirEntry) -> bool {
        let name = entry.file_name().to_string_lossy();

        // 忽略隐藏文件/目录（以 . 开头）
        if name.starts_with('.') {
            return true;
        }

        if entry.file_type().is_dir() && IGNORED_DIRS.contains(&&*name) {
            return true;
        }

        self.ignore_patterns.iter().any(|pattern| pattern.matches(&name))
    }

    fn check_symlink(&self, root: &Path, entry: &DirEntry, relative: &str) -> Result<(), AnalysisError> {
        match fs::canonicalize(entry.path()) {
            Ok(target) if target.starts_with(root) => Ok(()),
            Ok(target) => {
                warn!(
                    "Symlink escapes repository root: {} -> {}",
                    relative,
                    target.display()
                );
                Err(AnalysisError::SecurityRejection(format!(
                    "symlink {} points outside the repository",
                    relative
                )))
            }
            // 悬空链接
            Err(_) => Ok(()),
        }
    }
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    fn scanner() -> RepositoryScanner {
        RepositoryScanner::new(1024 * 1024, &["*.min.js".to_string(), "*.log".to_string()])
    }

    fn touch(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "src/main.py", "print('hi')");
        touch(dir.path(), "src/utils/helper.py", "def helper(): pass");
        touch(dir.path(), "app.js", "");
        touch(dir.path(), "README.md", "# readme");
        touch(dir.path(), "vendor.min.js", "");
        touch(dir.path(), "node_modules/lib/index.js", "");
        touch(dir.path(), ".git/hooks/pre-commit.py", "");
        touch(dir.path(), ".hidden.py", "");

        let outcome = scanner().scan(dir.path(), 100).unwrap();
        let names: Vec<&str> = outcome.files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(names, vec!["app.js", "src/main.py", "src/utils/helper.py"]);
        assert!(!outcome.truncated);
        assert!(outcome.directories.contains("src/utils"));
        assert!(!outcome.directories.contains("node_modules"));
    }

    #[test]
    fn test_truncates_in_lexicographic_order() {
        let dir = TempDir::new().unwrap();
        for i in (0..10).rev() {
            touch(dir.path(), &format!("m{}.py", i), "x = 1\n");
        }

        let outcome = scanner().scan(dir.path(), 5).unwrap();
        let names: Vec<&str> = outcome.files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(names, vec!["m0.py", "m1.py", "m2.py", "m3.py", "m4.py"]);
        assert!(outcome.truncated);
        assert_eq!(outcome.total_eligible, 10);
    }

    #[test]
    fn test_skips_oversized_files() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "small.py", "x = 1\n");
        touch(dir.path(), "large.py", &"#".repeat(2048));

        let outcome = RepositoryScanner::new(1024, &[]).scan(dir.path(), 10).unwrap();
        assert_eq!(outcome.files.len(), 1);
        assert_eq!(outcome.files[0].relative, "small.py");
        assert_eq!(outcome.files[0].size, 6);
    }

    #[test]
    fn test_missing_root_is_invalid_source() {
        let dir = TempDir::new().unwrap();
        let err = scanner().scan(&dir.path().join("missing"), 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSource);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escaping_root_is_rejected() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "main.py", "");
        std::os::unix::fs::symlink("/etc", dir.path().join("config")).unwrap();

        let err = scanner().scan(dir.path(), 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SecurityRejection);
    }

    #[cfg(unix)]
    #[test]
    fn test_internal_symlink_is_skipped() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "pkg/mod.py", "");
        std::os::unix::fs::symlink(dir.path().join("pkg"), dir.path().join("alias")).unwrap();

        let outcome = scanner().scan(dir.path(), 10).unwrap();
        let names: Vec<&str> = outcome.files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(names, vec!["pkg/mod.py"]);
    }
}
