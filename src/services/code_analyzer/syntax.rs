//! 语法树遍历
//!
//! 通过 tree-sitter 解析源码，遍历命名节点收集声明、导入和调用目标。
//! 各语言只提供节点分类规则，遍历逻辑共享。

use std::path::Path;
use tree_sitter::{Language as Grammar, Node, Parser};

use super::language::Language;
use super::types::{Declaration, DeclarationKind};
use super::{c_family, go, java, javascript, python, rust_lang};

/// 单一语言的节点分类规则
pub struct LanguageRules {
    /// 节点是否是类 / 函数声明，是则返回种类和名称
    pub classify: fn(Node<'_>, &[u8]) -> Option<(DeclarationKind, String)>,
    /// 节点携带的导入模块文本
    pub imports: fn(Node<'_>, &[u8]) -> Vec<String>,
    /// 节点是调用表达式时返回被调用的标识符
    pub call_target: fn(Node<'_>, &[u8]) -> Option<String>,
}

/// 一次解析收集到的结构事实
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyntaxFacts {
    pub declarations: Vec<Declaration>,
    pub imports: Vec<String>,
    pub references: Vec<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("no grammar for {0}")]
    NoGrammar(Language),

    #[error("failed to load grammar: {0}")]
    Grammar(String),

    #[error("parser produced no tree")]
    NoTree,

    #[error("syntax error near line {line}")]
    Invalid { line: usize },
}

/// 选择语法；TypeScript 按扩展名区分 tsx
pub fn grammar_for(language: Language, path: &Path) -> Option<Grammar> {
    let grammar: Grammar = match language {
        Language::Python => tree_sitter_python::LANGUAGE.into(),
        Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
        Language::TypeScript => {
            let is_tsx = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("tsx"))
                .unwrap_or(false);
            if is_tsx {
                tree_sitter_typescript::LANGUAGE_TSX.into()
            } else {
                tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
            }
        }
        Language::Java => tree_sitter_java::LANGUAGE.into(),
        Language::Go => tree_sitter_go::LANGUAGE.into(),
        Language::C => tree_sitter_c::LANGUAGE.into(),
        Language::Cpp => tree_sitter_cpp::LANGUAGE.into(),
        Language::Rust => tree_sitter_rust::LANGUAGE.into(),
        Language::Unsupported => return None,
    };
    Some(grammar)
}

fn rules_for(language: Language) -> Option<&'static LanguageRules> {
    match language {
        Language::Python => Some(&python::RULES),
        // JS 和 TS 共用一套节点名
        Language::JavaScript | Language::TypeScript => Some(&javascript::RULES),
        Language::Java => Some(&java::RULES),
        Language::Go => Some(&go::RULES),
        Language::C | Language::Cpp => Some(&c_family::RULES),
        Language::Rust => Some(&rust_lang::RULES),
        Language::Unsupported => None,
    }
}

/// 解析源码并收集结构事实
///
/// 语法树中出现错误节点时整体视为解析失败，由调用方降级为空记录。
pub fn parse_facts(language: Language, path: &Path, source: &str) -> Result<SyntaxFacts, SyntaxError> {
    let grammar = grammar_for(language, path).ok_or(SyntaxError::NoGrammar(language))?;
    let rules = rules_for(language).ok_or(SyntaxError::NoGrammar(language))?;

    let mut parser = Parser::new();
    parser
        .set_language(&grammar)
        .map_err(|e| SyntaxError::Grammar(e.to_string()))?;
    let tree = parser.parse(source, None).ok_or(SyntaxError::NoTree)?;
    let root = tree.root_node();

    if root.has_error() {
        return Err(SyntaxError::Invalid {
            line: first_error_line(root),
        });
    }

    Ok(collect(root, source.as_bytes(), rules))
}

/// 前序遍历所有命名节点（显式栈，避免深层嵌套时递归溢出）
fn collect(root: Node<'_>, src: &[u8], rules: &LanguageRules) -> SyntaxFacts {
    let mut facts = SyntaxFacts::default();
    let mut stack = vec![root];

    while let Some(node) = stack.pop() {
        if let Some((kind, name)) = (rules.classify)(node, src) {
            facts.declarations.push(Declaration {
                name,
                kind,
                start_line: node.start_position().row + 1,
                end_line: node.end_position().row + 1,
            });
        }
        for import in (rules.imports)(node, src) {
            push_unique(&mut facts.imports, import);
        }
        if let Some(target) = (rules.call_target)(node, src) {
            push_unique(&mut facts.references, target);
        }

        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        // 逆序压栈，保证按源码顺序出栈
        stack.extend(children.into_iter().rev());
    }

    facts
}

fn first_error_line(root: Node<'_>) -> usize {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            return node.start_position().row + 1;
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node
            .children(&mut cursor)
            .filter(|child| child.has_error() || child.is_missing())
            .collect();
        stack.extend(children.into_iter().rev());
    }
    root.start_position().row + 1
}

pub(super) fn push_unique(items: &mut Vec<String>, value: String) {
    if !value.is_empty() && !items.contains(&value) {
        items.push(value);
    }
}

/// 节点对应的源码文本
pub(super) fn node_text(node: Node<'_>, src: &[u8]) -> Option<String> {
    node.utf8_text(src).ok().map(|s| s.trim().to_string())
}

/// 指定字段子节点的源码文本
pub(super) fn field_text(node: Node<'_>, field: &str, src: &[u8]) -> Option<String> {
    node.child_by_field_name(field)
        .and_then(|child| node_text(child, src))
        .filter(|s| !s.is_empty())
}

/// 从调用表达式的被调用部分中取出最右侧的标识符
///
/// `a.b.c()` → `c`，`ns::f()` → `f`，`pkg.Func()` → `Func`。
pub(super) fn callee_name(node: Node<'_>, src: &[u8]) -> Option<String> {
    let mut current = node;
    loop {
        let next = match current.kind() {
            "identifier" | "property_identifier" | "field_identifier" | "type_identifier" => {
                return node_text(current, src).filter(|s| !s.is_empty());
            }
            // Python
            "attribute" => current.child_by_field_name("attribute"),
            // JS / TS
            "member_expression" => current.child_by_field_name("property"),
            // Go
            "selector_expression" => current.child_by_field_name("field"),
            // C / C++ / Rust
            "field_expression" => current.child_by_field_name("field"),
            "scoped_identifier" | "qualified_identifier" | "template_function" => {
                current.child_by_field_name("name")
            }
            "generic_function" => current.child_by_field_name("function"),
            // Java
            "generic_type" => current.named_child(0),
            "scoped_type_identifier" => {
                let count = current.named_child_count();
                if count == 0 {
                    None
                } else {
                    current.named_child(count - 1)
                }
            }
            _ => None,
        };
        current = next?;
    }
}

/// 去掉字符串字面量两端的引号 / 尖括号
pub(super) fn strip_string_literal(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '`' | '<' | '>'))
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(facts: &SyntaxFacts, kind: DeclarationKind) -> Vec<&str> {
        facts
            .declarations
            .iter()
            .filter(|d| d.kind == kind)
            .map(|d| d.name.as_str())
            .collect()
    }

    #[test]
    fn test_declarations_in_source_order() {
        let src = "def first():\n    pass\n\nclass Middle:\n    def method(self):\n        pass\n\ndef last():\n    pass\n";
        let facts = parse_facts(Language::Python, Path::new("m.py"), src).unwrap();
        let all: Vec<&str> = facts.declarations.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(all, vec!["first", "Middle", "method", "last"]);

        let middle = &facts.declarations[1];
        assert_eq!(middle.kind, DeclarationKind::Class);
        assert_eq!((middle.start_line, middle.end_line), (4, 6));
    }

    #[test]
    fn test_error_tree_is_rejected() {
        let err = parse_facts(Language::Python, Path::new("bad.py"), "def broken(:\n").unwrap_err();
        assert!(matches!(err, SyntaxError::Invalid { .. }));
    }

    #[test]
    fn test_unsupported_has_no_grammar() {
        let err = parse_facts(Language::Unsupported, Path::new("x.txt"), "hello").unwrap_err();
        assert_eq!(err, SyntaxError::NoGrammar(Language::Unsupported));
    }

    #[test]
    fn test_tsx_grammar_parses_jsx() {
        let src = "export function App() { return <div className=\"x\">hi</div>; }\n";
        let facts = parse_facts(Language::TypeScript, Path::new("App.tsx"), src).unwrap();
        assert_eq!(names(&facts, DeclarationKind::Function), vec!["App"]);
    }

    #[test]
    fn test_empty_source_is_valid() {
        let facts = parse_facts(Language::Go, Path::new("empty.go"), "package main\n").unwrap();
        assert!(facts.declarations.is_empty());
        assert!(facts.imports.is_empty());
    }

    #[test]
    fn test_strip_string_literal() {
        assert_eq!(strip_string_literal("\"fmt\""), "fmt");
        assert_eq!(strip_string_literal("'./utils'"), "./utils");
        assert_eq!(strip_string_literal("<stdio.h>"), "stdio.h");
    }

    #[test]
    fn test_push_unique_skips_duplicates_and_empty() {
        let mut items = Vec::new();
        push_unique(&mut items, "a".to_string());
        push_unique(&mut items, "a".to_string());
        push_unique(&mut items, String::new());
        push_unique(&mut items, "b".to_string());
        assert_eq!(items, vec!["a", "b"]);
    }
}
