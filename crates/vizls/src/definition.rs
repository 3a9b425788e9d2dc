//
// definition.rs
//
// Go-to-definition: resolve the chain ending at the clicked word and hand
// back the declaration ranges. Builtins have no navigable source, and a
// click on the declaration itself never jumps.
//

use tower_lsp::lsp_types::{LocationLink, Position, Range, Url};

use crate::chain::parse_member_chain;
use crate::preprocess::word_at;
use crate::resolver::{resolve_chain, ResolveContext, ResolveMode};
use crate::symbols::range_contains;

/// Resolve a definition link for the word under the cursor. Returns at most
/// one link.
pub fn definition(
    ctx: &ResolveContext<'_>,
    uri: &Url,
    line: &str,
    position: Position,
) -> Option<LocationLink> {
    let (word, word_start, word_end) = word_at(line, position.character as usize)?;

    // Parse the chain ending at the end of the clicked word, so a click in
    // the middle of `Position` inside `obj.Position.X` resolves `obj.Position`.
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

    let target_range = symbol.source_range?;
    let target_selection_range = symbol.name_range.unwrap_or(target_range);

    // Jump-to-self is noise: the click already sits on the declaration.
    if position.line == target_selection_range.start.line
        && range_contains(&target_selection_range, position)
    {
        return None;
    }

    let origin = Range {
        start: Position::new(position.line, word_start as u32),
        end: Position::new(position.line, word_end as u32),
    };

    Some(LocationLink {
        origin_selection_range: Some(origin),
        target_uri: uri.clone(),
        target_range,
        target_selection_range,
    })
}
