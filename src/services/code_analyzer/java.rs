//! Java 节点规则

use tree_sitter::Node;

use super::syntax::{callee_name, field_text, node_text, LanguageRules};
use super::types::DeclarationKind;

pub(super) const RULES: LanguageRules = LanguageRules {
    classify,
    imports,
    call_target,
};

fn classify(node: Node<'_>, src: &[u8]) -> Option<(DeclarationKind, String)> {
    let kind = match node.kind() {
        "class_declaration" | "interface_declaration" | "enum_declaration"
        | "record_declaration" => DeclarationKind::Class,
        "method_declaration" | "constructor_declaration" => DeclarationKind::Function,
        _ => return None,
    };
    field_text(node, "name", src).map(|name| (kind, name))
}

/// `import static a.b.C.*;` → `a.b.C.*`
fn imports(node: Node<'_>, src: &[u8]) -> Vec<String> {
    if node.kind() != "import_declaration" {
        return Vec::new();
    }
    let Some(text) = node_text(node, src) else {
        return Vec::new();
    };
    let body = text.trim_start_matches("import").trim_end_matches(';').trim();
    let body = body.strip_prefix("static").map(str::trim).unwrap_or(body);
    let module: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    if module.is_empty() {
        Vec::new()
    } else {
        vec![module]
    }
}

fn call_target(node: Node<'_>, src: &[u8]) -> Option<String> {
    match node.kind() {
        "method_invocation" => field_text(node, "name", src),
        "object_creation_expression" => node
            .child_by_field_name("type")
            .and_then(|ty| callee_name(ty, src)),
        _ => None,
    }
}
