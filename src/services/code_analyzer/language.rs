//! 语言分类
//!
//! 按文件扩展名映射到固定的语言集合，未知扩展名一律归为 `Unsupported`。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// 支持解析的语言
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Java,
    Go,
    C,
    Cpp,
    Rust,
    Unsupported,
}

/// 扩展名（小写，不含点）到语言的映射表
const EXTENSION_TABLE: &[(&str, Language)] = &[
    ("py", Language::Python),
    ("pyi", Language::Python),
    ("js", Language::JavaScript),
    ("jsx", Language::JavaScript),
    ("mjs", Language::JavaScript),
    ("cjs", Language::JavaScript),
    ("ts", Language::TypeScript),
    ("tsx", Language::TypeScript),
    ("mts", Language::TypeScript),
    ("cts", Language::TypeScript),
    ("java", Language::Java),
    ("go", Language::Go),
    ("c", Language::C),
    ("h", Language::C),
    ("cpp", Language::Cpp),
    ("cc", Language::Cpp),
    ("cxx", Language::Cpp),
    ("hpp", Language::Cpp),
    ("hh", Language::Cpp),
    ("hxx", Language::Cpp),
    ("rs", Language::Rust),
];

impl Language {
    /// 根据文件名分类，永不失败
    pub fn classify(file_name: &str) -> Language {
        let ext = match Path::new(file_name).extension().and_then(|e| e.to_str()) {
            Some(ext) => ext.to_ascii_lowercase(),
            None => return Language::Unsupported,
        };

        EXTENSION_TABLE
            .iter()
            .find(|(candidate, _)| *candidate == ext)
            .map(|(_, language)| *language)
            .unwrap_or(Language::Unsupported)
    }

    pub fn is_supported(self) -> bool {
        self != Language::Unsupported
    }

    /// 该语言的代码里通常有类（用于类图提示词）
    pub fn has_classes(self) -> bool {
        matches!(
            self,
            Language::Python
                | Language::JavaScript
                | Language::TypeScript
                | Language::Java
                | Language::Cpp
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Java => "java",
            Language::Go => "go",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Rust => "rust",
            Language::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_extensions() {
        assert_eq!(Language::classify("main.py"), Language::Python);
        assert_eq!(Language::classify("App.jsx"), Language::JavaScript);
        assert_eq!(Language::classify("index.TSX"), Language::TypeScript);
        assert_eq!(Language::classify("Main.java"), Language::Java);
        assert_eq!(Language::classify("server.go"), Language::Go);
        assert_eq!(Language::classify("util.h"), Language::C);
        assert_eq!(Language::classify("engine.hpp"), Language::Cpp);
        assert_eq!(Language::classify("lib.rs"), Language::Rust);
    }

    #[test]
    fn test_classify_is_total() {
        for name in [
            "",
            ".",
            "..",
            "Makefile",
            ".gitignore",
            "README.md",
            "archive.tar.gz",
            "weird.",
            "noext",
            "data.json",
            "图片.png",
        ] {
            assert_eq!(Language::classify(name), Language::Unsupported, "{name}");
        }
    }

    #[test]
    fn test_extension_table_round_trip() {
        for (ext, language) in EXTENSION_TABLE {
            let name = format!("file.{}", ext);
            assert_eq!(Language::classify(&name), *language, "{name}");
        }
    }

    #[test]
    fn test_serialized_tag() {
        let json = serde_json::to_string(&Language::JavaScript).unwrap();
        assert_eq!(json, "\"javascript\"");
        assert_eq!(Language::Unsupported.to_string(), "unsupported");
    }
}
