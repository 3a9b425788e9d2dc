//
// recognizer.rs
//
// Line-oriented statement recognition. There is no grammar for the dialect;
// a fixed regex cascade classifies each preprocessed line and an explicit
// state value threaded through the scan tracks the pending method/structure
// blocks. The output is the document's flat symbol list, sorted by
// declaration start.
//

use once_cell::sync::Lazy;
use regex::Regex;
use tower_lsp::lsp_types::{Position, Range};

use crate::builtins::BuiltinCatalog;
use crate::preprocess;
use crate::symbols::{Overload, Symbol, SymbolKind, Visibility};

/// Which block keyword opened a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKeyword {
    Sub,
    Function,
}

impl MethodKeyword {
    fn parse(word: &str) -> Self {
        if word.eq_ignore_ascii_case("function") {
            Self::Function
        } else {
            Self::Sub
        }
    }

    fn symbol_kind(self) -> SymbolKind {
        match self {
            Self::Sub => SymbolKind::Method,
            Self::Function => SymbolKind::Function,
        }
    }
}

/// One recognized declaration statement. Columns are character offsets into
/// the preprocessed line.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    MethodStart {
        keyword: MethodKeyword,
        name: String,
        name_start: usize,
        args: String,
        args_start: usize,
        return_type: String,
    },
    MethodEnd {
        keyword: MethodKeyword,
    },
    StructureStart {
        name: String,
        name_start: usize,
    },
    StructureEnd,
    VariableDecl {
        names: Vec<(String, usize)>,
        declared_type: String,
    },
    FieldDecl {
        name: String,
        name_start: usize,
        declared_type: String,
    },
}

static METHOD_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(sub|function)\s+([A-Za-z_]\w*)\s*\(([^)]*)\)\s*(?:as\s+([A-Za-z_][\w\[\]]*))?\s*$")
        .unwrap()
});
static METHOD_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*end\s+(sub|function)\s*$").unwrap());
static STRUCTURE_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*structure\s+([A-Za-z_]\w*)\s*$").unwrap());
static STRUCTURE_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*end\s+structure\s*$").unwrap());
static VARIABLE_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(dim|global|local|redim)\s+(.+?)\s+as\s+([A-Za-z_][\w\[\]]*)\s*$")
        .unwrap()
});
static FIELD_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*([A-Za-z_]\w*)\s+as\s+([A-Za-z_][\w\[\]]*)\s*$").unwrap()
});
static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_]\w*$").unwrap());
static PARAM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:byref\s+|byval\s+)?([A-Za-z_]\w*)\s+as\s+([A-Za-z_][\w\[\]]*)\s*$")
        .unwrap()
});

fn char_col(line: &str, byte_idx: usize) -> usize {
    line[..byte_idx].chars().count()
}

/// Classify one preprocessed line. Pure: no state, no side effects. Returns
/// `None` for every line that matches no declaration pattern.
pub fn classify(line: &str) -> Option<Statement> {
    if let Some(caps) = METHOD_END.captures(line) {
        return Some(Statement::MethodEnd {
            keyword: MethodKeyword::parse(&caps[1]),
        });
    }
    if STRUCTURE_END.is_match(line) {
        return Some(Statement::StructureEnd);
    }
    if let Some(caps) = METHOD_START.captures(line) {
        let name = caps.get(2).unwrap();
        let args = caps.get(3).unwrap();
        return Some(Statement::MethodStart {
            keyword: MethodKeyword::parse(&caps[1]),
            name: name.as_str().to_string(),
            name_start: char_col(line, name.start()),
            args: args.as_str().to_string(),
            args_start: char_col(line, args.start()),
            return_type: caps.get(4).map(|m| m.as_str().to_string()).unwrap_or_default(),
        });
    }
    if let Some(caps) = STRUCTURE_START.captures(line) {
        let name = caps.get(1).unwrap();
        return Some(Statement::StructureStart {
            name: name.as_str().to_string(),
            name_start: char_col(line, name.start()),
        });
    }
    if let Some(caps) = VARIABLE_DECL.captures(line) {
        let list = caps.get(2).unwrap();
        let mut names = Vec::new();
        let mut offset = list.start();
        for part in list.as_str().split(',') {
            let trimmed = part.trim();
            if IDENTIFIER.is_match(trimmed) {
                let at = offset + part.find(trimmed.chars().next().unwrap()).unwrap_or(0);
                names.push((trimmed.to_string(), char_col(line, at)));
            }
            offset += part.len() + 1;
        }
        if names.is_empty() {
            return None;
        }
        return Some(Statement::VariableDecl {
            names,
            declared_type: caps[3].to_string(),
        });
    }
    if let Some(caps) = FIELD_DECL.captures(line) {
        let name = caps.get(1).unwrap();
        // `end`, `next` and friends in front of `as` would be nonsense, but
        // the patterns above already claimed every ambiguous line shape.
        return Some(Statement::FieldDecl {
            name: name.as_str().to_string(),
            name_start: char_col(line, name.start()),
            declared_type: caps[2].to_string(),
        });
    }
    None
}

// ============================================================================
// Scan state machine
// ============================================================================

#[derive(Debug)]
struct OpenMethod {
    keyword: MethodKeyword,
    name: String,
    start: Position,
    name_range: Range,
    params: Vec<Symbol>,
    return_type: String,
    hint: String,
    documentation: String,
}

#[derive(Debug)]
struct OpenStructure {
    name: String,
    start: Position,
    name_range: Range,
    fields: Vec<Symbol>,
}

/// State threaded through the line-by-line scan. One value per scan; never
/// shared across documents or requests.
#[derive(Default)]
pub struct RecognizerState {
    in_metadata: bool,
    open_method: Option<OpenMethod>,
    open_structure: Option<OpenStructure>,
    symbols: Vec<Symbol>,
}

/// Parameter symbols from the raw argument list of a method header.
fn parse_params(args: &str, args_start: usize, line_no: u32, parent: &str) -> Vec<Symbol> {
    let mut params = Vec::new();
    let mut offset = 0usize;
    for part in args.split(',') {
        if let Some(caps) = PARAM.captures(part) {
            let name = caps.get(1).unwrap();
            let mut sym = Symbol::new(name.as_str(), SymbolKind::Parameter)
                .with_type(caps[2].to_string());
            let col = (args_start + offset + name.start()) as u32;
            let name_range = Range {
                start: Position::new(line_no, col),
                end: Position::new(line_no, col + name.as_str().len() as u32),
            };
            sym.name_range = Some(name_range);
            sym.source_range = Some(name_range);
            sym.parent_scope = parent.to_string();
            sym.hint = format!("{} As {}", name.as_str(), &caps[2]);
            params.push(sym);
        }
        offset += part.len() + 1;
    }
    params
}

/// Contiguous comment lines directly above `line_no`, joined into one
/// documentation block.
fn doc_comment_above(lines: &[&str], line_no: usize) -> String {
    let mut doc_lines = Vec::new();
    let mut idx = line_no;
    while idx > 0 {
        idx -= 1;
        match preprocess::comment_text(lines[idx]) {
            Some(text)
                if !preprocess::opens_metadata(lines[idx])
                    && !preprocess::closes_metadata(lines[idx]) =>
            {
                doc_lines.push(text.to_string());
            }
            _ => break,
        }
    }
    doc_lines.reverse();
    doc_lines.join("\n")
}

fn line_indent(line: &str) -> u32 {
    line.chars().take_while(|c| c.is_whitespace()).count() as u32
}

impl RecognizerState {
    /// Scope name stamped onto a variable declared on the current line.
    fn current_scope_name(&self) -> String {
        if let Some(st) = &self.open_structure {
            if self.open_method.is_none() {
                return st.name.clone();
            }
        }
        if let Some(m) = &self.open_method {
            return m.name.clone();
        }
        String::new()
    }

    /// Insert an emitted symbol, folding repeated callable names into the
    /// first declaration's overload list. The repeated declaration itself is
    /// kept hidden so its body still forms a scope.
    fn push_symbol(&mut self, mut sym: Symbol) {
        if sym.is_callable() {
            if let Some(existing) = self
                .symbols
                .iter_mut()
                .find(|s| s.is_callable() && s.name_matches(&sym.name))
            {
                existing.overloads.push(Overload {
                    hint: sym.hint.clone(),
                    documentation: sym.documentation.clone(),
                });
                sym.visibility = Visibility::Hidden;
            }
        }
        self.symbols.push(sym);
    }

    fn step(&mut self, line_no: u32, raw_line: &str, lines: &[&str], catalog: &BuiltinCatalog) {
        // Metadata blocks are an out-of-band channel; nothing inside them is
        // a declaration.
        if self.in_metadata {
            if preprocess::closes_metadata(raw_line) {
                self.in_metadata = false;
            }
            return;
        }
        if preprocess::opens_metadata(raw_line) {
            self.in_metadata = true;
            return;
        }

        let line = preprocess::strip_line(raw_line);
        if line.trim().is_empty() {
            return;
        }

        let Some(statement) = classify(&line) else {
            return;
        };

        match statement {
            Statement::MethodStart {
                keyword,
                name,
                name_start,
                args,
                args_start,
                return_type,
            } => {
                if self.open_method.is_some() {
                    log::trace!("Nested method header '{}' at line {} ignored", name, line_no);
                    return;
                }
                let params = parse_params(&args, args_start, line_no, &name);
                let hint = if return_type.is_empty() {
                    format!("{}({})", name, args.trim())
                } else {
                    format!("{}({}) As {}", name, args.trim(), return_type)
                };
                self.open_method = Some(OpenMethod {
                    keyword,
                    name: name.clone(),
                    start: Position::new(line_no, line_indent(&line)),
                    name_range: Range {
                        start: Position::new(line_no, name_start as u32),
                        end: Position::new(line_no, (name_start + name.len()) as u32),
                    },
                    params,
                    return_type,
                    hint,
                    documentation: doc_comment_above(lines, line_no as usize),
                });
            }
            Statement::MethodEnd { keyword } => match self.open_method.take() {
                Some(m) if m.keyword == keyword => {
                    let end = Position::new(line_no, line.trim_end().len() as u32);
                    let mut sym =
                        Symbol::new(m.name.clone(), keyword.symbol_kind()).with_type(m.return_type);
                    sym.source_range = Some(Range { start: m.start, end });
                    sym.name_range = Some(m.name_range);
                    sym.children = m.params;
                    sym.hint = m.hint;
                    sym.documentation = m.documentation;
                    if catalog.find_event(&sym.name).is_some() {
                        // A handler duplicating a builtin event stays out of
                        // completion lists.
                        sym.visibility = Visibility::Hidden;
                    }
                    self.push_symbol(sym);
                }
                Some(m) => {
                    log::trace!(
                        "Dropping method '{}': closed with mismatched keyword at line {}",
                        m.name,
                        line_no
                    );
                }
                None => {
                    log::trace!("Stray end-of-method at line {} ignored", line_no);
                }
            },
            Statement::StructureStart { name, name_start } => {
                if self.open_structure.is_some() {
                    log::trace!(
                        "Nested structure header '{}' at line {} ignored",
                        name,
                        line_no
                    );
                    return;
                }
                self.open_structure = Some(OpenStructure {
                    start: Position::new(line_no, line_indent(&line)),
                    name_range: Range {
                        start: Position::new(line_no, name_start as u32),
                        end: Position::new(line_no, (name_start + name.len()) as u32),
                    },
                    name,
                    fields: Vec::new(),
                });
            }
            Statement::StructureEnd => {
                if self.open_method.is_some() {
                    // A structure cannot close across an unfinished method.
                    log::trace!(
                        "Dropping structure close at line {}: method still open",
                        line_no
                    );
                    self.open_structure = None;
                    return;
                }
                let Some(st) = self.open_structure.take() else {
                    log::trace!("Stray end-of-structure at line {} ignored", line_no);
                    return;
                };
                let end = Position::new(line_no, line.trim_end().len() as u32);
                let mut sym = Symbol::new(st.name.clone(), SymbolKind::Structure);
                sym.source_range = Some(Range {
                    start: st.start,
                    end,
                });
                sym.name_range = Some(st.name_range);
                sym.children = st.fields;
                sym.hint = format!("structure {}", st.name);
                self.push_symbol(sym);
            }
            Statement::VariableDecl {
                names,
                declared_type,
            } => {
                let parent = self.current_scope_name();
                for (name, col) in names {
                    let mut sym = Symbol::new(name.clone(), SymbolKind::Variable)
                        .with_type(declared_type.clone());
                    let name_range = Range {
                        start: Position::new(line_no, col as u32),
                        end: Position::new(line_no, (col + name.len()) as u32),
                    };
                    sym.name_range = Some(name_range);
                    sym.source_range = Some(Range {
                        start: Position::new(line_no, line_indent(&line)),
                        end: Position::new(line_no, line.trim_end().len() as u32),
                    });
                    sym.parent_scope = parent.clone();
                    self.symbols.push(sym);
                }
            }
            Statement::FieldDecl {
                name,
                name_start,
                declared_type,
            } => {
                // Bare `name As Type` lines only mean something inside an
                // open structure.
                let Some(st) = &mut self.open_structure else {
                    return;
                };
                if self.open_method.is_some() {
                    return;
                }
                let mut sym =
                    Symbol::new(name.clone(), SymbolKind::Field).with_type(declared_type.clone());
                let name_range = Range {
                    start: Position::new(line_no, name_start as u32),
                    end: Position::new(line_no, (name_start + name.len()) as u32),
                };
                sym.name_range = Some(name_range);
                sym.source_range = Some(name_range);
                sym.parent_scope = st.name.clone();
                sym.hint = format!("{} As {}", name, declared_type);
                st.fields.push(sym);
            }
        }
    }
}

/// Rescan an entire document into a fresh, sorted symbol generation. The
/// scan owns all of its state; unclosed blocks at end of input emit nothing.
pub fn scan_document(text: &str, catalog: &BuiltinCatalog) -> Vec<Symbol> {
    let lines: Vec<&str> = text.lines().collect();
    let mut state = RecognizerState::default();
    for (idx, raw_line) in lines.iter().enumerate() {
        state.step(idx as u32, raw_line, &lines, catalog);
    }
    if let Some(m) = &state.open_method {
        log::trace!("Dropping unterminated method '{}'", m.name);
    }
    if let Some(st) = &state.open_structure {
        log::trace!("Dropping unterminated structure '{}'", st.name);
    }
    let mut symbols = state.symbols;
    symbols.sort_by_key(|s| {
        s.source_range
            .map(|r| (r.start.line, r.start.character))
            .unwrap_or((u32::MAX, u32::MAX))
    });
    symbols
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::{catalog, DialectVersion};

    fn scan(text: &str) -> Vec<Symbol> {
        scan_document(text, catalog(DialectVersion::Viz3))
    }

    // ------------------------------------------------------------------
    // classify
    // ------------------------------------------------------------------

    #[test]
    fn classify_variable_declaration() {
        match classify("dim x as Integer").unwrap() {
            Statement::VariableDecl {
                names,
                declared_type,
            } => {
                assert_eq!(names, vec![(String::from("x"), 4)]);
                assert_eq!(declared_type, "Integer");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn classify_multi_name_declaration() {
        match classify("global a, b as Double").unwrap() {
            Statement::VariableDecl { names, .. } => {
                assert_eq!(
                    names,
                    vec![(String::from("a"), 7), (String::from("b"), 10)]
                );
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn classify_method_header_with_return_type() {
        match classify("function Twice(v as Integer) as Integer").unwrap() {
            Statement::MethodStart {
                keyword,
                name,
                args,
                return_type,
                ..
            } => {
                assert_eq!(keyword, MethodKeyword::Function);
                assert_eq!(name, "Twice");
                assert_eq!(args, "v as Integer");
                assert_eq!(return_type, "Integer");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn classify_is_case_insensitive() {
        assert!(matches!(
            classify("END SUB"),
            Some(Statement::MethodEnd {
                keyword: MethodKeyword::Sub
            })
        ));
        assert!(matches!(
            classify("Structure Foo"),
            Some(Statement::StructureStart { .. })
        ));
    }

    #[test]
    fn classify_rejects_plain_statements() {
        assert_eq!(classify("x = y + 1"), None);
        assert_eq!(classify("Println(\"hi\")"), None);
        assert_eq!(classify(""), None);
    }

    // ------------------------------------------------------------------
    // scan_document
    // ------------------------------------------------------------------

    #[test]
    fn extracts_simple_variable() {
        let symbols = scan("dim x as Integer\n");
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].name, "x");
        assert_eq!(symbols[0].declared_type, "Integer");
        assert_eq!(symbols[0].kind, SymbolKind::Variable);
    }

    #[test]
    fn extracts_method_with_parameters() {
        let text = "sub Move(dx as Double, dy as Double)\n\tdim tmp as Double\nend sub\n";
        let symbols = scan(text);
        let method = symbols.iter().find(|s| s.name == "Move").unwrap();
        assert_eq!(method.kind, SymbolKind::Method);
        assert_eq!(method.children.len(), 2);
        assert_eq!(method.children[0].name, "dx");
        assert_eq!(method.children[0].kind, SymbolKind::Parameter);
        let range = method.source_range.unwrap();
        assert_eq!(range.start.line, 0);
        assert_eq!(range.end.line, 2);
        // The local landed in the flat list with the method as parent scope.
        let local = symbols.iter().find(|s| s.name == "tmp").unwrap();
        assert_eq!(local.parent_scope, "Move");
    }

    #[test]
    fn extracts_structure_fields_as_children() {
        let text = "structure Person\n\tName As String\n\tAge As Integer\nend structure\n";
        let symbols = scan(text);
        assert_eq!(symbols.len(), 1);
        let st = &symbols[0];
        assert_eq!(st.kind, SymbolKind::Structure);
        assert_eq!(st.children.len(), 2);
        assert_eq!(st.children[0].kind, SymbolKind::Field);
        assert_eq!(st.children[1].declared_type, "Integer");
    }

    #[test]
    fn field_lines_outside_structures_are_ignored() {
        let symbols = scan("Name As String\n");
        assert!(symbols.is_empty());
    }

    #[test]
    fn mismatched_method_close_drops_declaration() {
        let symbols = scan("sub Broken()\nend function\n");
        assert!(symbols.is_empty());
    }

    #[test]
    fn structure_close_across_open_method_emits_nothing() {
        let text = "structure S\nsub Trapped()\nend structure\n";
        let symbols = scan(text);
        assert!(symbols.iter().all(|s| s.kind != SymbolKind::Structure));
    }

    #[test]
    fn unterminated_blocks_emit_nothing() {
        assert!(scan("sub Forever()\n\tdim x as Integer\n").len() == 1); // only the dim
        assert!(scan("structure Open\n\tA As Integer\n").is_empty());
    }

    #[test]
    fn overloads_merge_and_hide_the_duplicate() {
        let text = "sub Show(a as Integer)\nend sub\nsub Show(a as Integer, b as Integer)\nend sub\n";
        let symbols = scan(text);
        assert_eq!(symbols.len(), 2);
        let first = &symbols[0];
        assert_eq!(first.overloads.len(), 1);
        assert!(first.overloads[0].hint.contains("b as Integer"));
        assert!(symbols[1].is_hidden());
    }

    #[test]
    fn event_handler_subs_are_hidden() {
        let symbols = scan("sub OnInit()\nend sub\n");
        assert_eq!(symbols.len(), 1);
        assert!(symbols[0].is_hidden());
    }

    #[test]
    fn doc_comments_attach_to_methods() {
        let text = "' Moves the widget.\n' Second line.\nsub MoveIt()\nend sub\n";
        let symbols = scan(text);
        assert_eq!(
            symbols[0].documentation,
            "Moves the widget.\nSecond line."
        );
    }

    #[test]
    fn metadata_blocks_are_excluded() {
        let text = "' VSCODE-META-START\ndim hidden as Integer\n' VSCODE-META-END\ndim seen as Integer\n";
        let symbols = scan(text);
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].name, "seen");
    }

    #[test]
    fn comments_and_strings_do_not_confuse_the_scan() {
        let text = "dim s as String ' dim ghost as Integer\n";
        let symbols = scan(text);
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].name, "s");
    }

    #[test]
    fn rescans_are_deterministic() {
        let text = "structure P\n\tX As Double\nend structure\nsub Go(p as P)\n\tdim n as Integer\nend sub\n";
        assert_eq!(scan(text), scan(text));
    }
}
