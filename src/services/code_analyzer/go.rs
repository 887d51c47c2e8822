//! Go 节点规则
//!
//! Go 没有类，`type X struct/interface` 按类计入。

use tree_sitter::Node;

use super::syntax::{callee_name, field_text, strip_string_literal, LanguageRules};
use super::types::DeclarationKind;

pub(super) const RULES: LanguageRules = LanguageRules {
    classify,
    imports,
    call_target,
};

fn classify(node: Node<'_>, src: &[u8]) -> Option<(DeclarationKind, String)> {
    let kind = match node.kind() {
        "type_spec" => DeclarationKind::Class,
        "function_declaration" | "method_declaration" => DeclarationKind::Function,
        _ => return None,
    };
    field_text(node, "name", src).map(|name| (kind, name))
}

fn imports(node: Node<'_>, src: &[u8]) -> Vec<String> {
    if node.kind() != "import_spec" {
        return Vec::new();
    }
    field_text(node, "path", src)
        .map(|raw| strip_string_literal(&raw))
        .into_iter()
        .collect()
}

fn call_target(node: Node<'_>, src: &[u8]) -> Option<String> {
    if node.kind() != "call_expression" {
        return None;
    }
    node.child_by_field_name("function")
        .and_then(|callee| callee_name(callee, src))
}

#[cfg(test)]
mod tests {
    use crate::services::code_analyzer::language::Language;
    use crate::services::code_analyzer::syntax::parse_facts;
    use crate::services::code_analyzer::types::DeclarationKind;
    use std::path::Path;

    #[test]
    fn test_go_facts() {
        let src = r#"package main

import (
	"fmt"
	log "github.com/sirupsen/logrus"
)

import "os"

type Server struct {
	addr string
}

func (s *Server) Start() error {
	log.Info("starting")
	return listen(s.addr)
}

func main() {
	s := &Server{addr: ":8080"}
	fmt.Println(s.Start())
	os.Exit(0)
}
"#;
        let facts = parse_facts(Language::Go, Path::new("main.go"), src).unwrap();
        assert_eq!(facts.imports, vec!["fmt", "github.com/sirupsen/logrus", "os"]);

        let decls: Vec<(DeclarationKind, &str)> = facts
            .declarations
            .iter()
            .map(|d| (d.kind, d.name.as_str()))
            .collect();
        assert_eq!(
            decls,
            vec![
                (DeclarationKind::Class, "Server"),
                (DeclarationKind::Function, "Start"),
                (DeclarationKind::Function, "main"),
            ]
        );

        for target in ["Info", "listen", "Println", "Start", "Exit"] {
            assert!(facts.references.iter().any(|r| r == target), "{target}");
        }
    }
}
