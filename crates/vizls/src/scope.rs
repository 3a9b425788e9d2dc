//
// scope.rs
//
// The containment tree over a document's flat symbol list. Built fresh from
// one symbol generation per request; a node's range strictly contains every
// descendant and siblings stay disjoint because declarations never overlap
// in the line-oriented dialect.
//

use tower_lsp::lsp_types::Position;

use crate::symbols::{range_contains, Symbol};

/// One node of the scope tree. The root wraps no symbol.
#[derive(Debug)]
pub struct ScopeNode<'a> {
    pub symbol: Option<&'a Symbol>,
    pub children: Vec<ScopeNode<'a>>,
}

impl<'a> ScopeNode<'a> {
    fn contains(&self, pos: Position) -> bool {
        match self.symbol.and_then(|s| s.source_range) {
            Some(range) => range_contains(&range, pos),
            // The root spans the whole document.
            None => true,
        }
    }
}

/// Containment tree over one symbol generation.
#[derive(Debug)]
pub struct ScopeTree<'a> {
    root: ScopeNode<'a>,
}

impl<'a> ScopeTree<'a> {
    /// Assemble the tree from a start-sorted symbol list. A symbol becomes a
    /// child of the deepest earlier symbol whose range contains its start.
    pub fn build(symbols: &'a [Symbol]) -> Self {
        let mut root = ScopeNode {
            symbol: None,
            children: Vec::new(),
        };

        for symbol in symbols {
            let Some(range) = symbol.source_range else {
                continue;
            };
            insert(&mut root, symbol, range.start);
        }

        Self { root }
    }

    /// Symbols visible at a position: every ancestor scope's own symbol, the
    /// ancestors' direct children, and the owned members (parameters) of each
    /// ancestor. Hidden symbols are included; callers filter by visibility.
    pub fn visible_at(&self, pos: Position) -> Vec<&'a Symbol> {
        let mut visible = Vec::new();
        let mut node = &self.root;
        loop {
            if let Some(symbol) = node.symbol {
                // The enclosing block itself was already listed as its
                // parent's child; only its owned members (parameters) are new.
                visible.extend(symbol.children.iter());
            }
            for child in &node.children {
                if let Some(symbol) = child.symbol {
                    visible.push(symbol);
                }
            }
            match node.children.iter().find(|c| c.contains(pos) && c.symbol.is_some()) {
                Some(child) => node = child,
                None => break,
            }
        }
        visible
    }

    /// The innermost declared symbol whose range contains the position.
    pub fn innermost_at(&self, pos: Position) -> Option<&'a Symbol> {
        let mut node = &self.root;
        let mut innermost = None;
        while let Some(child) = node
            .children
            .iter()
            .find(|c| c.contains(pos) && c.symbol.is_some())
        {
            innermost = child.symbol;
            node = child;
        }
        innermost
    }

    /// Top-level symbols in declaration order.
    pub fn roots(&self) -> impl Iterator<Item = &ScopeNode<'a>> {
        self.root.children.iter()
    }
}

fn insert<'a>(node: &mut ScopeNode<'a>, symbol: &'a Symbol, start: Position) {
    if let Some(last) = node.children.last_mut() {
        if last.contains(start) {
            insert(last, symbol, start);
            return;
        }
    }
    node.children.push(ScopeNode {
        symbol: Some(symbol),
        children: Vec::new(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::{catalog, DialectVersion};
    use crate::recognizer::scan_document;

    fn scan(text: &str) -> Vec<Symbol> {
        scan_document(text, catalog(DialectVersion::Viz3))
    }

    const TWO_SUBS: &str = "\
dim shared as Integer
sub First(a as Integer)
\tdim inner as String
end sub
sub Second()
\tdim other as Double
end sub
";

    #[test]
    fn top_level_symbols_are_root_children() {
        let symbols = scan(TWO_SUBS);
        let tree = ScopeTree::build(&symbols);
        let names: Vec<_> = tree
            .roots()
            .filter_map(|n| n.symbol.map(|s| s.name.as_str()))
            .collect();
        assert_eq!(names, vec!["shared", "First", "Second"]);
    }

    #[test]
    fn locals_nest_under_their_method() {
        let symbols = scan(TWO_SUBS);
        let tree = ScopeTree::build(&symbols);
        // Inside First's body.
        let visible = tree.visible_at(Position::new(2, 5));
        let names: Vec<_> = visible.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains(&"shared"));
        assert!(names.contains(&"First"));
        assert!(names.contains(&"a")); // parameter
        assert!(names.contains(&"inner"));
        // The sibling sub's local is not in scope.
        assert!(!names.contains(&"other"));
    }

    #[test]
    fn root_position_sees_only_top_level() {
        let symbols = scan(TWO_SUBS);
        let tree = ScopeTree::build(&symbols);
        let visible = tree.visible_at(Position::new(0, 0));
        let names: Vec<_> = visible.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains(&"shared"));
        assert!(names.contains(&"First"));
        assert!(!names.contains(&"inner"));
        assert!(!names.contains(&"a"));
    }

    #[test]
    fn innermost_at_finds_enclosing_method() {
        let symbols = scan(TWO_SUBS);
        let tree = ScopeTree::build(&symbols);
        assert_eq!(tree.innermost_at(Position::new(5, 2)).unwrap().name, "Second");
        assert!(tree.innermost_at(Position::new(0, 0)).is_none());
    }

    #[test]
    fn structure_fields_are_not_visible_outside() {
        let text = "structure P\n\tX As Double\nend structure\ndim p as P\n";
        let symbols = scan(text);
        let tree = ScopeTree::build(&symbols);
        let visible = tree.visible_at(Position::new(3, 0));
        let names: Vec<_> = visible.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains(&"P"));
        assert!(names.contains(&"p"));
        assert!(!names.contains(&"X"));
    }
}
