//
// signature.rs
//
// Signature help: locate the outermost still-open call, resolve its callee,
// and offer the overloads that can still accept the arguments typed so far.
//

use tower_lsp::lsp_types::{
    Documentation, ParameterInformation, ParameterLabel, Position, SignatureHelp,
    SignatureInformation,
};

use crate::chain::find_open_call;
use crate::resolver::{resolve_chain, ResolveContext, ResolveMode};
use crate::symbols::hint_parameters;

fn signature_info(hint: &str, documentation: &str) -> SignatureInformation {
    let parameters: Vec<ParameterInformation> = hint_parameters(hint)
        .into_iter()
        .map(|p| ParameterInformation {
            label: ParameterLabel::Simple(p),
            documentation: None,
        })
        .collect();
    SignatureInformation {
        label: hint.to_string(),
        documentation: if documentation.is_empty() {
            None
        } else {
            Some(Documentation::String(documentation.to_string()))
        },
        parameters: Some(parameters),
        active_parameter: None,
    }
}

/// Compute signature help for a cursor position. `previous_active` is the
/// signature index the client currently shows; it is remapped onto the
/// filtered list, or reset to 0 when the filter removed it.
pub fn signature_help(
    ctx: &ResolveContext<'_>,
    prefix: &str,
    position: Position,
    previous_active: Option<u32>,
) -> Option<SignatureHelp> {
    let call = find_open_call(prefix)?;
    let resolution = resolve_chain(ctx, &call.chain, position, ResolveMode::Signature)?;
    let symbol = resolution.symbol;
    if !symbol.is_callable() && symbol.hint.find('(').is_none() {
        return None;
    }

    // A signature stays on offer while it can still take at least one more
    // argument than the commas already typed.
    let minimum = call.comma_count + 1;
    let all = symbol.signatures();
    let mut offered: Vec<(usize, SignatureInformation)> = Vec::new();
    for (index, (hint, documentation)) in all.iter().enumerate() {
        if hint_parameters(hint).len() >= minimum {
            offered.push((index, signature_info(hint, documentation)));
        }
    }
    if offered.is_empty() {
        return None;
    }

    let active_signature = previous_active
        .and_then(|prev| offered.iter().position(|(orig, _)| *orig == prev as usize))
        .unwrap_or(0) as u32;

    Some(SignatureHelp {
        signatures: offered.into_iter().map(|(_, s)| s).collect(),
        active_signature: Some(active_signature),
        active_parameter: Some(call.comma_count as u32),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::{catalog, DialectVersion, ScriptKind};
    use crate::config::Settings;
    use crate::recognizer::scan_document;
    use crate::scope::ScopeTree;
    use crate::symbols::Symbol;

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

        fn help(
            &self,
            prefix: &str,
            position: Position,
            previous: Option<u32>,
        ) -> Option<SignatureHelp> {
            let scope = ScopeTree::build(&self.symbols);
            let ctx = ResolveContext {
                symbols: &self.symbols,
                scope: &scope,
                catalog: catalog(DialectVersion::Viz3),
                script_kind: ScriptKind::Scene,
                settings: &self.settings,
            };
            signature_help(&ctx, prefix, position, previous)
        }
    }

    const OVERLOADS: &str = "\
sub Place(a as Integer)
end sub
sub Place(a as Integer, b as Integer)
end sub
sub Place(a as Integer, b as Integer, c as Integer)
end sub
";

    #[test]
    fn arity_filter_drops_too_small_signatures() {
        let fx = Fixture::new(OVERLOADS);
        // One comma typed: two arguments underway, so only the 2- and
        // 3-parameter overloads remain.
        let help = fx.help("Place(1, ", Position::new(6, 9), None).unwrap();
        assert_eq!(help.signatures.len(), 2);
        assert_eq!(help.active_parameter, Some(1));
        assert!(help.signatures[0].label.contains("b as Integer"));
    }

    #[test]
    fn active_signature_is_remapped_after_filtering() {
        let fx = Fixture::new(OVERLOADS);
        // Client was showing the third overload (index 2); after one comma
        // the filter keeps originals 1 and 2, so it remaps to index 1.
        let help = fx.help("Place(1, ", Position::new(6, 9), Some(2)).unwrap();
        assert_eq!(help.active_signature, Some(1));
        // A filtered-out previous selection resets to 0.
        let help = fx.help("Place(1, 2, ", Position::new(6, 12), Some(0)).unwrap();
        assert_eq!(help.active_signature, Some(0));
        assert_eq!(help.signatures.len(), 1);
    }

    #[test]
    fn builtin_method_signature_resolves_through_chain() {
        let fx = Fixture::new("");
        let help = fx
            .help("System.Scene.FindContainer(", Position::new(0, 27), None)
            .unwrap();
        assert_eq!(help.signatures.len(), 1);
        assert!(help.signatures[0].label.contains("Name As String"));
        assert_eq!(help.active_parameter, Some(0));
    }

    #[test]
    fn nested_call_reports_the_outer_site() {
        let fx = Fixture::new(OVERLOADS);
        let help = fx
            .help("Place(Min(1, 2), ", Position::new(6, 17), None)
            .unwrap();
        // The comma inside Min() does not advance the outer parameter; the
        // top-level comma does.
        assert_eq!(help.active_parameter, Some(1));
    }

    #[test]
    fn no_help_without_a_call_site() {
        let fx = Fixture::new(OVERLOADS);
        assert!(fx.help("dim x as Integer", Position::new(6, 16), None).is_none());
        assert!(fx.help("Unknown(", Position::new(6, 8), None).is_none());
    }
}
