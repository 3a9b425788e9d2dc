//
// resolver.rs
//
// Member-chain resolution across the three symbol spaces: the versioned
// builtin catalog, the document's scope-filtered symbols, and the
// synthesized `This` alias. Resolution never mutates either space; an
// unresolved hop simply yields `None`.
//

use tower_lsp::lsp_types::Position;

use crate::builtins::{BuiltinCatalog, ScriptKind};
use crate::chain::ChainToken;
use crate::config::Settings;
use crate::scope::ScopeTree;
use crate::symbols::{Symbol, SymbolKind};

/// How the resolved result will be used. Definition stops at the last token
/// even when it has no members; the other modes always want children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    Completion,
    Signature,
    Definition,
}

/// A successful resolution: the symbol the chain ends on and the members
/// visible on it after element/array substitution.
#[derive(Debug)]
pub struct Resolution<'a> {
    pub symbol: &'a Symbol,
    pub children: Vec<&'a Symbol>,
}

/// Everything a resolution walk needs to see, borrowed for one request.
pub struct ResolveContext<'a> {
    pub symbols: &'a [Symbol],
    pub scope: &'a ScopeTree<'a>,
    pub catalog: &'static BuiltinCatalog,
    pub script_kind: ScriptKind,
    pub settings: &'a Settings,
}

impl<'a> ResolveContext<'a> {
    /// Resolve a type name: builtin classes first, then document-level
    /// structure declarations.
    fn find_type(&self, name: &str) -> Option<&'a Symbol> {
        if let Some(class) = self.catalog.find_class(name) {
            return Some(class);
        }
        self.symbols
            .iter()
            .find(|s| s.kind == SymbolKind::Structure && s.name_matches(name))
    }

    /// Members reachable on `symbol` when accessed through `token`. Models
    /// "a variable's members are its type's members" and the array/element
    /// duality.
    fn children_of(&self, symbol: &'a Symbol, token: &ChainToken) -> Vec<&'a Symbol> {
        let declared = symbol.declared_type.trim();

        // Array-typed symbols split on the access form: an explicit index
        // reaches the element type, anything else reaches Array itself.
        let is_array = declared.eq_ignore_ascii_case("array")
            || declared
                .get(..6)
                .is_some_and(|p| p.eq_ignore_ascii_case("array["));
        if is_array {
            if token.is_indexed {
                if let Some(element) = element_type(declared) {
                    if let Some(ty) = self.find_type(element) {
                        return ty.children.iter().collect();
                    }
                }
                return Vec::new();
            }
            return self
                .catalog
                .find_class("Array")
                .map(|c| c.children.iter().collect())
                .unwrap_or_default();
        }

        if !symbol.children.is_empty() {
            return symbol.children.iter().collect();
        }
        if declared.is_empty() {
            return Vec::new();
        }
        self.find_type(declared)
            .map(|ty| ty.children.iter().collect())
            .unwrap_or_default()
    }

    /// First-hop lookup: builtin root spaces, then document symbols visible
    /// at the cursor. Definition mode flips the order and admits hidden
    /// symbols, so a declared handler shadowing a builtin event is still a
    /// navigable target.
    fn resolve_root(
        &self,
        token: &ChainToken,
        position: Position,
        mode: ResolveMode,
    ) -> Option<&'a Symbol> {
        let allow_this = self.settings.show_this_completions_on_root;
        let in_document = |include_hidden: bool| {
            self.scope
                .visible_at(position)
                .into_iter()
                .find(move |s| s.name_matches(&token.name) && (include_hidden || !s.is_hidden()))
        };

        if mode == ResolveMode::Definition {
            return in_document(true).or_else(|| {
                self.catalog
                    .find_root(&token.name, self.script_kind, allow_this)
            });
        }

        self.catalog
            .find_root(&token.name, self.script_kind, allow_this)
            .or_else(|| in_document(false))
    }
}

/// Element type inside `Array[ElementType]`, if present.
fn element_type(declared: &str) -> Option<&str> {
    let open = declared.find('[')?;
    let close = declared.rfind(']')?;
    if close <= open + 1 {
        return None;
    }
    Some(declared[open + 1..close].trim())
}

/// Walk a member chain. The first token resolves against the root spaces;
/// every later token resolves strictly against the previous hop's member
/// set. Any miss aborts the walk.
pub fn resolve_chain<'a>(
    ctx: &ResolveContext<'a>,
    chain: &[ChainToken],
    position: Position,
    mode: ResolveMode,
) -> Option<Resolution<'a>> {
    let (first, rest) = chain.split_first()?;
    if first.name.is_empty() {
        return None;
    }

    let mut current = ctx.resolve_root(first, position, mode)?;
    let mut token = first;

    for next in rest {
        let members = ctx.children_of(current, token);
        current = members
            .into_iter()
            .find(|s| s.name_matches(&next.name))?;
        token = next;
    }

    if mode == ResolveMode::Definition {
        // Navigation needs the symbol itself; members are irrelevant.
        return Some(Resolution {
            symbol: current,
            children: Vec::new(),
        });
    }

    Some(Resolution {
        symbol: current,
        children: ctx.children_of(current, token),
    })
}
