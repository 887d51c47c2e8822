//! Rust 节点规则

use tree_sitter::Node;

use super::syntax::{callee_name, field_text, LanguageRules};
use super::types::DeclarationKind;

pub(super) const RULES: LanguageRules = LanguageRules {
    classify,
    imports,
    call_target,
};

fn classify(node: Node<'_>, src: &[u8]) -> Option<(DeclarationKind, String)> {
    let kind = match node.kind() {
        "struct_item" | "enum_item" | "trait_item" | "union_item" => DeclarationKind::Class,
        "function_item" | "function_signature_item" => DeclarationKind::Function,
        _ => return None,
    };
    field_text(node, "name", src).map(|name| (kind, name))
}

fn imports(node: Node<'_>, src: &[u8]) -> Vec<String> {
    let field = match node.kind() {
        "use_declaration" => "argument",
        "extern_crate_declaration" => "name",
        _ => return Vec::new(),
    };
    field_text(node, field, src)
        .map(|path| path.split_whitespace().collect::<Vec<_>>().join(" "))
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
