//
// symbols.rs
//
// The symbol data model shared by the recognizer, the scope tree, and the
// resolver, plus the free-function converters that turn symbols into LSP
// completion items and document symbols.
//

use tower_lsp::lsp_types::{
    CompletionItem, CompletionItemKind, CompletionItemLabelDetails, Documentation, InsertTextFormat,
    MarkupContent, MarkupKind, Position, Range,
};

use crate::config::Settings;

/// What a declared entity is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Field,
    Parameter,
    Function,
    Method,
    Structure,
    Class,
    Event,
    Keyword,
}

/// Hidden symbols stay resolvable but never show up in completion lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Normal,
    Hidden,
}

/// An extra signature carried by a symbol whose name is declared more than
/// once (document overloads and same-named builtin methods).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overload {
    pub hint: String,
    pub documentation: String,
}

/// A declared entity: a document declaration, a builtin catalog entry, or a
/// synthesized alias. Builtin symbols have no source ranges.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    /// Declared or returned type, free-form; may encode `Array[ElementType]`.
    pub declared_type: String,
    pub kind: SymbolKind,
    pub visibility: Visibility,
    /// Full declaration extent, `None` for builtins.
    pub source_range: Option<Range>,
    /// Identifier extent only, `None` for builtins.
    pub name_range: Option<Range>,
    /// Name of the enclosing structure or method, empty at top level.
    pub parent_scope: String,
    /// Owned members: fields of a structure, parameters of a method,
    /// methods and properties of a builtin class.
    pub children: Vec<Symbol>,
    pub overloads: Vec<Overload>,
    /// Code hint shown in detail/signature UI, e.g. `Foo(a As Integer) As String`.
    pub hint: String,
    pub documentation: String,
    pub deprecated: bool,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind) -> Self {
        Self {
            name: name.into(),
            declared_type: String::new(),
            kind,
            visibility: Visibility::Normal,
            source_range: None,
            name_range: None,
            parent_scope: String::new(),
            children: Vec::new(),
            overloads: Vec::new(),
            hint: String::new(),
            documentation: String::new(),
            deprecated: false,
        }
    }

    pub fn with_type(mut self, declared_type: impl Into<String>) -> Self {
        self.declared_type = declared_type.into();
        self
    }

    pub fn is_hidden(&self) -> bool {
        self.visibility == Visibility::Hidden
    }

    /// Case-insensitive name match; the dialect ignores identifier case.
    pub fn name_matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.kind, SymbolKind::Function | SymbolKind::Method)
    }

    /// All signatures of this symbol: its own hint followed by overloads.
    pub fn signatures(&self) -> Vec<(&str, &str)> {
        let mut sigs = vec![(self.hint.as_str(), self.documentation.as_str())];
        for o in &self.overloads {
            sigs.push((o.hint.as_str(), o.documentation.as_str()));
        }
        sigs
    }
}

/// True when `pos` lies inside `range`, bounds included.
pub fn range_contains(range: &Range, pos: Position) -> bool {
    if pos.line < range.start.line || pos.line > range.end.line {
        return false;
    }
    if pos.line == range.start.line && pos.character < range.start.character {
        return false;
    }
    if pos.line == range.end.line && pos.character > range.end.character {
        return false;
    }
    true
}

// ============================================================================
// LSP conversion
// ============================================================================

fn completion_kind(kind: SymbolKind) -> CompletionItemKind {
    match kind {
        SymbolKind::Variable => CompletionItemKind::VARIABLE,
        SymbolKind::Field => CompletionItemKind::FIELD,
        SymbolKind::Parameter => CompletionItemKind::VARIABLE,
        SymbolKind::Function => CompletionItemKind::FUNCTION,
        SymbolKind::Method => CompletionItemKind::METHOD,
        SymbolKind::Structure => CompletionItemKind::STRUCT,
        SymbolKind::Class => CompletionItemKind::CLASS,
        SymbolKind::Event => CompletionItemKind::EVENT,
        SymbolKind::Keyword => CompletionItemKind::KEYWORD,
    }
}

fn commit_characters(kind: SymbolKind) -> Option<Vec<String>> {
    match kind {
        SymbolKind::Variable
        | SymbolKind::Field
        | SymbolKind::Parameter
        | SymbolKind::Class
        | SymbolKind::Structure => Some(vec![String::from(".")]),
        SymbolKind::Function | SymbolKind::Method => Some(vec![String::from("(")]),
        SymbolKind::Event | SymbolKind::Keyword => None,
    }
}

fn documentation_for(symbol: &Symbol) -> Option<Documentation> {
    if symbol.documentation.is_empty() {
        return None;
    }
    Some(Documentation::MarkupContent(MarkupContent {
        kind: MarkupKind::Markdown,
        value: symbol.documentation.clone(),
    }))
}

fn detail_for(symbol: &Symbol) -> Option<String> {
    if !symbol.hint.is_empty() {
        let mut detail = symbol.hint.clone();
        if !symbol.overloads.is_empty() {
            detail.push_str(&format!(" (+{} overloads)", symbol.overloads.len()));
        }
        return Some(detail);
    }
    if !symbol.declared_type.is_empty() {
        return Some(format!("{} As {}", symbol.name, symbol.declared_type));
    }
    None
}

/// Split the parenthesized parameter section of a code hint into individual
/// parameter labels. `Foo(a As Integer, b As String) As Double` yields
/// `["a As Integer", "b As String"]`.
pub fn hint_parameters(hint: &str) -> Vec<String> {
    let open = match hint.find('(') {
        Some(i) => i,
        None => return Vec::new(),
    };
    let mut depth = 0usize;
    let mut close = None;
    for (i, ch) in hint[open..].char_indices() {
        match ch {
            '(' | '[' => depth += 1,
            ')' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    close = Some(open + i);
                    break;
                }
            }
            _ => {}
        }
    }
    let close = match close {
        Some(i) => i,
        None => return Vec::new(),
    };
    let inner = &hint[open + 1..close];
    if inner.trim().is_empty() {
        return Vec::new();
    }
    let mut params = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, ch) in inner.char_indices() {
        match ch {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                params.push(inner[start..i].trim().to_string());
                start = i + 1;
            }
            _ => {}
        }
    }
    params.push(inner[start..].trim().to_string());
    params
}

/// Build a snippet body with tab-stop placeholders from a callable's hint.
pub fn call_snippet(symbol: &Symbol) -> String {
    let params = hint_parameters(&symbol.hint);
    if params.is_empty() {
        return format!("{}()", symbol.name);
    }
    let placeholders = params
        .iter()
        .enumerate()
        .map(|(i, p)| {
            // Placeholder text is the parameter name alone, not `name As Type`.
            let name = p.split_whitespace().next().unwrap_or(p.as_str());
            format!("${{{}:{}}}", i + 1, name)
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("{}({})", symbol.name, placeholders)
}

/// Convert one symbol into a completion item. Returns `None` for items that
/// would render with an empty label.
pub fn completion_item(symbol: &Symbol, settings: &Settings) -> Option<CompletionItem> {
    if symbol.name.is_empty() {
        return None;
    }

    let label = if symbol.kind == SymbolKind::Keyword && settings.keyword_lowercase {
        symbol.name.to_ascii_lowercase()
    } else {
        symbol.name.clone()
    };

    let (insert_text, insert_text_format) =
        if symbol.is_callable() && settings.enable_global_procedure_snippets {
            (Some(call_snippet(symbol)), Some(InsertTextFormat::SNIPPET))
        } else if symbol.kind == SymbolKind::Keyword {
            (Some(label.clone()), None)
        } else {
            (None, None)
        };

    let label_details = if symbol.declared_type.is_empty() {
        None
    } else {
        Some(CompletionItemLabelDetails {
            detail: None,
            description: Some(symbol.declared_type.clone()),
        })
    };

    Some(CompletionItem {
        label,
        label_details,
        kind: Some(completion_kind(symbol.kind)),
        detail: detail_for(symbol),
        documentation: documentation_for(symbol),
        deprecated: if symbol.deprecated { Some(true) } else { None },
        insert_text,
        insert_text_format,
        commit_characters: commit_characters(symbol.kind),
        ..Default::default()
    })
}

/// Convert a builtin event definition into a full handler-skeleton snippet.
pub fn event_snippet_item(event: &Symbol) -> Option<CompletionItem> {
    if event.name.is_empty() {
        return None;
    }
    let header = if event.hint.is_empty() {
        format!("{}()", event.name)
    } else {
        event.hint.clone()
    };
    Some(CompletionItem {
        label: format!("sub {}", event.name),
        kind: Some(CompletionItemKind::SNIPPET),
        detail: Some(format!("sub {}", header)),
        documentation: documentation_for(event),
        insert_text: Some(format!("sub {}\n\t$0\nend sub", header)),
        insert_text_format: Some(InsertTextFormat::SNIPPET),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings::default()
    }

    #[test]
    fn hint_parameters_splits_on_top_level_commas() {
        let params = hint_parameters("Foo(a As Integer, b As Array[Integer]) As String");
        assert_eq!(params, vec!["a As Integer", "b As Array[Integer]"]);
    }

    #[test]
    fn hint_parameters_empty_for_no_arg_hint() {
        assert!(hint_parameters("Foo() As String").is_empty());
        assert!(hint_parameters("Foo").is_empty());
    }

    #[test]
    fn completion_item_skips_empty_label() {
        let sym = Symbol::new("", SymbolKind::Variable);
        assert!(completion_item(&sym, &settings()).is_none());
    }

    #[test]
    fn keyword_case_follows_setting() {
        let sym = Symbol::new("Dim", SymbolKind::Keyword);
        let mut s = settings();
        s.keyword_lowercase = true;
        assert_eq!(completion_item(&sym, &s).unwrap().label, "dim");
        s.keyword_lowercase = false;
        assert_eq!(completion_item(&sym, &s).unwrap().label, "Dim");
    }

    #[test]
    fn call_snippet_uses_parameter_names() {
        let mut sym = Symbol::new("FindContainer", SymbolKind::Method);
        sym.hint = String::from("FindContainer(Name As String) As Container");
        assert_eq!(call_snippet(&sym), "FindContainer(${1:Name})");
    }

    #[test]
    fn range_contains_is_inclusive() {
        let range = Range {
            start: Position::new(1, 4),
            end: Position::new(3, 0),
        };
        assert!(range_contains(&range, Position::new(1, 4)));
        assert!(range_contains(&range, Position::new(2, 100)));
        assert!(range_contains(&range, Position::new(3, 0)));
        assert!(!range_contains(&range, Position::new(1, 3)));
        assert!(!range_contains(&range, Position::new(3, 1)));
    }
}
