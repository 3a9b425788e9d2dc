//
// completions.rs
//
// Completion context classification and the per-context strategies. The line
// prefix ending at the cursor is classified into exactly one context; each
// strategy assembles its item set from the document scope, the builtin
// catalog, or the resolver.
//

use once_cell::sync::Lazy;
use regex::Regex;
use tower_lsp::lsp_types::{CompletionItem, Position};

use crate::chain::{parse_member_chain, ChainToken};
use crate::preprocess::strip_line;
use crate::resolver::{resolve_chain, ResolveContext, ResolveMode};
use crate::symbols::{completion_item, event_snippet_item, Symbol, SymbolKind};

/// The single edit context a line prefix falls into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionContext {
    /// `dim na<cursor>` — naming a fresh variable, nothing to suggest.
    VariableDeclaration,
    /// `sub Na<cursor>` / `structure Na<cursor>` — naming a block.
    HeaderDeclaration,
    /// `sub On<cursor>` — declaring an event handler.
    EventHandlerHeader,
    /// Prefix ends in `=` or `>`, optionally followed by a partial word.
    AssignmentTarget,
    /// `... as Ty<cursor>` — a type annotation.
    TypeAnnotation,
    /// A dotted chain ends at the cursor.
    MemberAccess(Vec<ChainToken>),
    /// Anything else: statement root.
    Root,
}

static DECL_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(dim|global|local|redim)\b").unwrap());
static EVENT_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*sub\s+on\w*$").unwrap());
static BLOCK_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(sub|function|structure)\s+\w*$").unwrap());
static TYPE_ANNOTATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bas\s+\w*$").unwrap());
static ASSIGNMENT_TAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"[=>]\s*\w*$").unwrap());

/// Classify a raw line prefix. Priority order matters: declaration positions
/// win over everything, member access only fires once a dot is present.
pub fn classify_context(prefix: &str) -> CompletionContext {
    let stripped = strip_line(prefix);

    if DECL_KEYWORD.is_match(&stripped) {
        if TYPE_ANNOTATION.is_match(&stripped) {
            return CompletionContext::TypeAnnotation;
        }
        return CompletionContext::VariableDeclaration;
    }
    if EVENT_HEADER.is_match(&stripped) {
        return CompletionContext::EventHandlerHeader;
    }
    if BLOCK_HEADER.is_match(&stripped) {
        return CompletionContext::HeaderDeclaration;
    }
    if ASSIGNMENT_TAIL.is_match(&stripped) {
        return CompletionContext::AssignmentTarget;
    }
    if TYPE_ANNOTATION.is_match(&stripped) {
        return CompletionContext::TypeAnnotation;
    }

    let chain = parse_member_chain(&stripped);
    if chain.len() > 1 {
        return CompletionContext::MemberAccess(chain);
    }
    CompletionContext::Root
}

fn push_symbols<'a>(
    items: &mut Vec<CompletionItem>,
    symbols: impl IntoIterator<Item = &'a Symbol>,
    ctx: &ResolveContext<'a>,
) {
    for symbol in symbols {
        if symbol.is_hidden() {
            continue;
        }
        if let Some(item) = completion_item(symbol, ctx.settings) {
            items.push(item);
        }
    }
}

/// Document symbols in scope at the cursor, hidden ones excluded.
fn scope_symbols<'a>(ctx: &ResolveContext<'a>, position: Position) -> Vec<&'a Symbol> {
    ctx.scope
        .visible_at(position)
        .into_iter()
        .filter(|s| !s.is_hidden())
        .collect()
}

fn root_catalog_items(ctx: &ResolveContext<'_>, items: &mut Vec<CompletionItem>) {
    push_symbols(items, ctx.catalog.classes.values(), ctx);
    push_symbols(items, ctx.catalog.global_procedures.iter(), ctx);
    push_symbols(items, ctx.catalog.keywords.iter(), ctx);
}

/// Compute the completion list for a cursor position. The line prefix must
/// end at the cursor column.
pub fn completions(
    ctx: &ResolveContext<'_>,
    prefix: &str,
    position: Position,
) -> Vec<CompletionItem> {
    let context = classify_context(prefix);
    log::trace!("Completion context at {:?}: {:?}", position, context);

    let mut items = Vec::new();
    match context {
        CompletionContext::VariableDeclaration | CompletionContext::HeaderDeclaration => {}

        CompletionContext::EventHandlerHeader => {
            // Only events that are not already handled in this document.
            let handled: Vec<&str> = ctx
                .symbols
                .iter()
                .filter(|s| s.is_callable())
                .map(|s| s.name.as_str())
                .collect();
            for event in &ctx.catalog.events {
                if handled.iter().any(|h| event.name_matches(h)) {
                    continue;
                }
                if let Some(item) = completion_item(event, ctx.settings) {
                    items.push(item);
                }
            }
        }

        CompletionContext::AssignmentTarget => {
            push_symbols(&mut items, scope_symbols(ctx, position), ctx);
            root_catalog_items(ctx, &mut items);
            if ctx.settings.show_this_completions_on_root {
                push_symbols(&mut items, [ctx.catalog.this_alias(ctx.script_kind)], ctx);
            }
        }

        CompletionContext::TypeAnnotation => {
            let structures = ctx
                .symbols
                .iter()
                .filter(|s| s.kind == SymbolKind::Structure);
            push_symbols(&mut items, structures, ctx);
            push_symbols(&mut items, ctx.catalog.classes.values(), ctx);
            push_symbols(&mut items, ctx.catalog.keywords.iter(), ctx);
        }

        CompletionContext::MemberAccess(mut chain) => {
            // The trailing partial (or empty) token is completed against the
            // resolved parent's members; the client filters by prefix.
            chain.pop();
            if let Some(resolution) =
                resolve_chain(ctx, &chain, position, ResolveMode::Completion)
            {
                push_symbols(&mut items, resolution.children, ctx);
            }
        }

        CompletionContext::Root => {
            push_symbols(&mut items, scope_symbols(ctx, position), ctx);
            root_catalog_items(ctx, &mut items);
            if ctx.settings.show_this_completions_on_root {
                push_symbols(&mut items, [ctx.catalog.this_alias(ctx.script_kind)], ctx);
            }
            if ctx.settings.show_event_snippet_completions_on_root {
                for event in &ctx.catalog.events {
                    if let Some(item) = event_snippet_item(event) {
                        items.push(item);
                    }
                }
            }
        }
    }

    items.retain(|i| !i.label.is_empty());
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::{catalog, DialectVersion, ScriptKind};
    use crate::config::Settings;
    use crate::recognizer::scan_document;
    use crate::scope::ScopeTree;

    fn classify(prefix: &str) -> CompletionContext {
        classify_context(prefix)
    }

    #[test]
    fn classification_priority() {
        assert_eq!(classify("dim co"), CompletionContext::VariableDeclaration);
        assert_eq!(classify("  global x, y"), CompletionContext::VariableDeclaration);
        assert_eq!(classify("dim x as Inte"), CompletionContext::TypeAnnotation);
        assert_eq!(classify("sub OnIni"), CompletionContext::EventHandlerHeader);
        assert_eq!(classify("sub Render"), CompletionContext::HeaderDeclaration);
        assert_eq!(classify("structure Pers"), CompletionContext::HeaderDeclaration);
        assert_eq!(classify("x = "), CompletionContext::AssignmentTarget);
        assert_eq!(classify("if a > "), CompletionContext::AssignmentTarget);
        assert!(matches!(
            classify("System.Sce"),
            CompletionContext::MemberAccess(_)
        ));
        assert_eq!(classify("Prin"), CompletionContext::Root);
        assert_eq!(classify(""), CompletionContext::Root);
    }

    #[test]
    fn function_parameter_annotation_is_a_type_context() {
        assert_eq!(
            classify("sub Move(dx as Dou"),
            CompletionContext::TypeAnnotation
        );
    }

    struct Fixture {
        symbols: Vec<Symbol>,
        settings: Settings,
    }

    impl Fixture {
        fn new(text: &str) -> Self {
            Self {
                symbols: scan_document(text, catalog(DialectVersion::Viz3)),
                settings: Settings::default(),
            }
        }

        fn complete(&self, prefix: &str, position: Position) -> Vec<String> {
            let scope = ScopeTree::build(&self.symbols);
            let ctx = ResolveContext {
                symbols: &self.symbols,
                scope: &scope,
                catalog: catalog(DialectVersion::Viz3),
                script_kind: ScriptKind::Scene,
                settings: &self.settings,
            };
            completions(&ctx, prefix, position)
                .into_iter()
                .map(|i| i.label)
                .collect()
        }
    }

    #[test]
    fn declaration_positions_suggest_nothing() {
        let fx = Fixture::new("");
        assert!(fx.complete("dim co", Position::new(0, 6)).is_empty());
        assert!(fx.complete("sub Render", Position::new(0, 10)).is_empty());
    }

    #[test]
    fn event_header_offers_unhandled_events_only() {
        let fx = Fixture::new("sub OnInit()\nend sub\n");
        let labels = fx.complete("sub On", Position::new(2, 6));
        assert!(labels.iter().any(|l| l == "OnEnter"));
        assert!(!labels.iter().any(|l| l == "OnInit"));
    }

    #[test]
    fn member_access_lists_resolved_children() {
        let fx = Fixture::new("");
        let labels = fx.complete("System.", Position::new(0, 7));
        assert!(labels.iter().any(|l| l == "Scene"));
        assert!(labels.iter().any(|l| l == "SendRemoteCommand"));
        assert!(!labels.iter().any(|l| l == "Println"));
    }

    #[test]
    fn root_context_merges_scope_and_catalogs() {
        let fx = Fixture::new("dim counter as Integer\n");
        let labels = fx.complete("", Position::new(1, 0));
        assert!(labels.iter().any(|l| l == "counter"));
        assert!(labels.iter().any(|l| l == "System"));
        assert!(labels.iter().any(|l| l == "Println"));
        assert!(labels.iter().any(|l| l == "dim")); // lowercased keyword
        assert!(labels.iter().any(|l| l == "This"));
        assert!(labels.iter().any(|l| l == "sub OnInit"));
    }

    #[test]
    fn root_flags_suppress_this_and_event_snippets() {
        let mut fx = Fixture::new("");
        fx.settings.show_this_completions_on_root = false;
        fx.settings.show_event_snippet_completions_on_root = false;
        let labels = fx.complete("", Position::new(0, 0));
        assert!(!labels.iter().any(|l| l == "This"));
        assert!(!labels.iter().any(|l| l.starts_with("sub On")));
    }

    #[test]
    fn hidden_symbols_never_appear() {
        let fx = Fixture::new("sub OnInit()\nend sub\n");
        let labels = fx.complete("", Position::new(2, 0));
        // The handler is hidden; the event snippet for it may exist but the
        // bare hidden method must not.
        assert!(!labels.contains(&String::from("OnInit")));
    }

    #[test]
    fn type_annotation_offers_structures_and_classes() {
        let fx = Fixture::new("structure Person\n\tName As String\nend structure\n");
        let labels = fx.complete("dim p as ", Position::new(3, 9));
        assert!(labels.iter().any(|l| l == "Person"));
        assert!(labels.iter().any(|l| l == "Integer"));
        assert!(!labels.iter().any(|l| l == "Println"));
    }

    #[test]
    fn assignment_target_includes_scope_and_globals() {
        let fx = Fixture::new("dim x as Integer\n");
        let labels = fx.complete("x = ", Position::new(1, 4));
        assert!(labels.iter().any(|l| l == "x"));
        assert!(labels.iter().any(|l| l == "System"));
        assert!(labels.iter().any(|l| l == "Println"));
        // No event snippets in assignment position.
        assert!(!labels.iter().any(|l| l.starts_with("sub On")));
    }
}
