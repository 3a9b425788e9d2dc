//
// chain.rs
//
// Member-chain extraction from a line prefix ending at the cursor, plus the
// signature-mode helpers: finding the outermost still-open call and counting
// top-level commas. Works on preprocessed text only; strings are expected to
// be blanked before any of this runs.
//

use once_cell::sync::Lazy;
use regex::Regex;

use crate::preprocess::blank_strings;

/// One access token of a dotted expression: `name`, `name[]`, `name[expr]`
/// or `name(` at the end of a prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainToken {
    pub name: String,
    /// `name[expr]` — explicit element access.
    pub is_indexed: bool,
    /// `name[]` — generic array access without an index.
    pub is_generic_array: bool,
    pub is_call: bool,
}

static TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_]\w*)?(\[(#?)\])?(\(\)?)?$").unwrap());

/// Erase the contents of every balanced bracket pair, keeping the brackets.
/// A non-empty erased `[...]` group leaves a `#` marker so indexed access
/// stays distinguishable from `[]`. Text swallowed by a still-open bracket is
/// cut away first: only the expression after the innermost open bracket is
/// live at the cursor.
fn flatten_brackets(prefix: &str) -> String {
    // First pass: find the innermost still-open bracket.
    let mut opens: Vec<usize> = Vec::new();
    for (idx, ch) in prefix.char_indices() {
        match ch {
            '(' | '[' => opens.push(idx),
            ')' | ']' => {
                opens.pop();
            }
            _ => {}
        }
    }
    let live = match opens.last() {
        Some(&idx) => &prefix[idx + 1..],
        None => prefix,
    };

    // Second pass: drop the contents of balanced groups.
    let mut out = String::with_capacity(live.len());
    let mut depth = 0usize;
    let mut open_kind = ' ';
    let mut had_content = false;
    for ch in live.chars() {
        match ch {
            '(' | '[' => {
                if depth == 0 {
                    open_kind = ch;
                    had_content = false;
                    out.push(ch);
                }
                depth += 1;
            }
            ')' | ']' => {
                if depth == 0 {
                    // Unmatched close: whatever precedes it is not part of
                    // the trailing expression.
                    out.clear();
                } else {
                    depth -= 1;
                    if depth == 0 {
                        if open_kind == '[' && had_content {
                            out.push('#');
                        }
                        out.push(ch);
                    }
                }
            }
            _ => {
                if depth == 0 {
                    out.push(ch);
                } else if !ch.is_whitespace() {
                    had_content = true;
                }
            }
        }
    }
    out
}

/// Cut the flattened prefix down to the trailing expression fragment:
/// everything after the last operator, separator, assignment or space.
fn trailing_fragment(flat: &str) -> &str {
    let cut = flat
        .rfind(|c: char| {
            c.is_whitespace()
                || matches!(
                    c,
                    '=' | '<' | '>' | '+' | '-' | '*' | '/' | '&' | ',' | '!' | ';' | ':'
                )
        })
        .map(|i| i + 1)
        .unwrap_or(0);
    &flat[cut..]
}

/// Parse the member chain ending at the cursor from a raw line prefix.
/// Returns an empty vector when the prefix ends in something that is not a
/// chain (operators, fresh statement, unparsable token).
pub fn parse_member_chain(prefix: &str) -> Vec<ChainToken> {
    let blanked = blank_strings(prefix);
    let flat = flatten_brackets(&blanked);
    let fragment = trailing_fragment(&flat);
    if fragment.is_empty() {
        return Vec::new();
    }

    let mut tokens = Vec::new();
    for part in fragment.split('.') {
        let Some(caps) = TOKEN.captures(part) else {
            return Vec::new();
        };
        let name = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let has_brackets = caps.get(2).is_some();
        let has_index = caps.get(3).is_some_and(|m| !m.as_str().is_empty());
        tokens.push(ChainToken {
            name: name.to_string(),
            is_indexed: has_brackets && has_index,
            is_generic_array: has_brackets && !has_index,
            is_call: caps.get(4).is_some(),
        });
    }
    tokens
}

// ============================================================================
// Signature mode
// ============================================================================

/// The call site enclosing the cursor: the callee's member chain and how many
/// top-level commas precede the cursor inside the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    pub chain: Vec<ChainToken>,
    pub comma_count: usize,
}

/// Find the outermost still-open call in the prefix. Signature help wants a
/// call site, not a member path, so this tracks parenthesis balance instead
/// of reusing the chain grammar.
pub fn find_open_call(prefix: &str) -> Option<CallContext> {
    let blanked = blank_strings(prefix);

    let mut opens: Vec<usize> = Vec::new();
    for (idx, ch) in blanked.char_indices() {
        match ch {
            '(' => opens.push(idx),
            ')' => {
                opens.pop();
            }
            _ => {}
        }
    }

    // Walk the net-positive opens from the outside in until one is preceded
    // by a resolvable callee name.
    for &open in &opens {
        let callee_prefix = &blanked[..open];
        let chain = parse_member_chain(callee_prefix);
        if chain.last().is_some_and(|t| !t.name.is_empty()) {
            let comma_count = count_top_level_commas(&blanked[open + 1..]);
            return Some(CallContext { chain, comma_count });
        }
    }
    None
}

/// Count commas at bracket depth zero, ignoring commas nested in
/// parentheses, brackets, braces, or quoted strings.
pub fn count_top_level_commas(args: &str) -> usize {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut count = 0usize;
    for ch in args.chars() {
        if in_string {
            if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => count += 1,
            _ => {}
        }
    }
    count
}
