//
// handlers.rs
//
// Pure per-request functions over `&WorldState`. Every handler returns an
// empty/`None` result on any failure; nothing here panics or propagates an
// error to the LSP boundary.
//

use tower_lsp::lsp_types::*;

use crate::builtins::catalog;
use crate::chain::parse_member_chain;
use crate::completions;
use crate::definition;
use crate::preprocess::word_at;
use crate::resolver::{resolve_chain, ResolveContext, ResolveMode};
use crate::scope::{ScopeNode, ScopeTree};
use crate::signature;
use crate::state::WorldState;
use crate::symbols;

/// Borrow one document's generation and run `f` with a ready resolve
/// context.
fn with_context<T>(
    state: &WorldState,
    uri: &Url,
    f: impl FnOnce(&ResolveContext<'_>, &crate::state::Document) -> Option<T>,
) -> Option<T> {
    let doc = state.get_document(uri)?;
    let generation = doc.symbols();
    let scope = ScopeTree::build(&generation);
    let ctx = ResolveContext {
        symbols: &generation,
        scope: &scope,
        catalog: catalog(doc.language.version),
        script_kind: doc.language.kind,
        settings: &state.settings,
    };
    f(&ctx, doc)
}

// ============================================================================
// Completion
// ============================================================================

pub fn completion(state: &WorldState, uri: &Url, position: Position) -> Option<CompletionResponse> {
    if !state.settings.enable_auto_complete {
        return None;
    }
    with_context(state, uri, |ctx, doc| {
        let prefix = doc.line_prefix(position)?;
        let items = completions::completions(ctx, &prefix, position);
        if items.is_empty() {
            None
        } else {
            Some(CompletionResponse::Array(items))
        }
    })
}

// ============================================================================
// Signature Help
// ============================================================================

pub fn signature_help(
    state: &WorldState,
    uri: &Url,
    position: Position,
    context: Option<SignatureHelpContext>,
) -> Option<SignatureHelp> {
    if !state.settings.enable_signature_help {
        return None;
    }
    let previous_active = context
        .and_then(|c| c.active_signature_help)
        .and_then(|h| h.active_signature);
    with_context(state, uri, |ctx, doc| {
        let prefix = doc.line_prefix(position)?;
        signature::signature_help(ctx, &prefix, position, previous_active)
    })
}

// ============================================================================
// Definition
// ============================================================================

pub fn goto_definition(
    state: &WorldState,
    uri: &Url,
    position: Position,
) -> Option<GotoDefinitionResponse> {
    if !state.settings.enable_definition {
        return None;
    }
    with_context(state, uri, |ctx, doc| {
        let line = doc.line_text(position.line)?;
        let link = definition::definition(ctx, uri, &line, position)?;
        Some(GotoDefinitionResponse::Link(vec![link]))
    })
}

// ============================================================================
// Hover
// ============================================================================

pub fn hover(state: &WorldState, uri: &Url, position: Position) -> Option<Hover> {
    with_context(state, uri, |ctx, doc| {
        let line = doc.line_text(position.line)?;
        let (word, _, word_end) = word_at(&line, position.character as usize)?;
        let prefix: String = line.chars().take(word_end).collect();
        let chain = parse_member_chain(&prefix);
        if !chain
            .last()
            .is_some_and(|t| t.name.eq_ignore_ascii_case(&word))
        {
            return None;
        }

        let resolution = resolve_chain(ctx, &chain, position, ResolveMode::Definition)?;
        let symbol = resolution.symbol;

        let mut value = String::new();
        if !symbol.hint.is_empty() {
            value.push_str(&format!("```vizscript\n{}\n```", symbol.hint));
        } else if !symbol.declared_type.is_empty() {
            value.push_str(&format!(
                "```vizscript\n{} As {}\n```",
                symbol.name, symbol.declared_type
            ));
        } else {
            value.push_str(&format!("```vizscript\n{}\n```", symbol.name));
        }
        if !symbol.documentation.is_empty() {
            value.push_str("\n\n");
            value.push_str(&symbol.documentation);
        }

        Some(Hover {
            contents: HoverContents::Markup(MarkupContent {
                kind: MarkupKind::Markdown,
                value,
            }),
            range: None,
        })
    })
}

// ============================================================================
// Document Symbols
// ============================================================================

fn lsp_symbol_kind(kind: symbols::SymbolKind) -> SymbolKind {
    match kind {
        symbols::SymbolKind::Variable => SymbolKind::VARIABLE,
        symbols::SymbolKind::Field => SymbolKind::FIELD,
        symbols::SymbolKind::Parameter => SymbolKind::VARIABLE,
        symbols::SymbolKind::Function => SymbolKind::FUNCTION,
        symbols::SymbolKind::Method => SymbolKind::METHOD,
        symbols::SymbolKind::Structure => SymbolKind::STRUCT,
        symbols::SymbolKind::Class => SymbolKind::CLASS,
        symbols::SymbolKind::Event => SymbolKind::EVENT,
        symbols::SymbolKind::Keyword => SymbolKind::KEY,
    }
}

#[allow(deprecated)]
fn to_document_symbol(symbol: &symbols::Symbol, nested: Vec<DocumentSymbol>) -> Option<DocumentSymbol> {
    let range = symbol.source_range?;
    let selection_range = symbol.name_range.unwrap_or(range);

    // Owned members (parameters, fields) come first, then nested scopes.
    let mut children: Vec<DocumentSymbol> = symbol
        .children
        .iter()
        .filter_map(|c| to_document_symbol(c, Vec::new()))
        .collect();
    children.extend(nested);

    Some(DocumentSymbol {
        name: symbol.name.clone(),
        detail: if symbol.hint.is_empty() {
            None
        } else {
            Some(symbol.hint.clone())
        },
        kind: lsp_symbol_kind(symbol.kind),
        tags: None,
        deprecated: None,
        range,
        selection_range,
        children: if children.is_empty() {
            None
        } else {
            Some(children)
        },
    })
}

fn collect_nested(node: &ScopeNode<'_>) -> Option<DocumentSymbol> {
    let nested: Vec<DocumentSymbol> = node.children.iter().filter_map(collect_nested).collect();
    to_document_symbol(node.symbol?, nested)
}

/// Hierarchical outline of the document. The caller refreshes the symbol
/// generation before asking.
pub fn document_symbol(state: &WorldState, uri: &Url) -> Option<DocumentSymbolResponse> {
    with_context(state, uri, |ctx, _doc| {
        let nested: Vec<DocumentSymbol> = ctx.scope.roots().filter_map(collect_nested).collect();
        Some(DocumentSymbolResponse::Nested(nested))
    })
}
