//
// config.rs
//
// Server settings parsed from LSP initialization options and
// workspace/didChangeConfiguration payloads.
//

/// Effective server configuration. Fields absent from the client payload keep
/// their defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    pub enable_auto_complete: bool,
    pub enable_signature_help: bool,
    pub enable_definition: bool,
    pub show_this_completions_on_root: bool,
    pub show_event_snippet_completions_on_root: bool,
    pub keyword_lowercase: bool,
    pub enable_global_procedure_snippets: bool,
    pub rescan_debounce_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enable_auto_complete: true,
            enable_signature_help: true,
            enable_definition: true,
            show_this_completions_on_root: true,
            show_event_snippet_completions_on_root: true,
            keyword_lowercase: true,
            enable_global_procedure_snippets: true,
            rescan_debounce_ms: 500,
        }
    }
}

/// Parse settings from a client payload, applying present fields over
/// `current`. The payload may nest everything under a `vizscript` key.
pub fn parse_settings(value: &serde_json::Value, current: &Settings) -> Settings {
    let root = value.get("vizscript").unwrap_or(value);
    let mut settings = current.clone();

    if let Some(v) = root.get("enableAutoComplete").and_then(|v| v.as_bool()) {
        settings.enable_auto_complete = v;
    }
    if let Some(v) = root.get("enableSignatureHelp").and_then(|v| v.as_bool()) {
        settings.enable_signature_help = v;
    }
    if let Some(v) = root.get("enableDefinition").and_then(|v| v.as_bool()) {
        settings.enable_definition = v;
    }
    if let Some(v) = root
        .get("showThisCompletionsOnRoot")
        .and_then(|v| v.as_bool())
    {
        settings.show_this_completions_on_root = v;
    }
    if let Some(v) = root
        .get("showEventSnippetCompletionsOnRoot")
        .and_then(|v| v.as_bool())
    {
        settings.show_event_snippet_completions_on_root = v;
    }
    if let Some(v) = root.get("keywordLowercase").and_then(|v| v.as_bool()) {
        settings.keyword_lowercase = v;
    }
    if let Some(v) = root
        .get("enableGlobalProcedureSnippets")
        .and_then(|v| v.as_bool())
    {
        settings.enable_global_procedure_snippets = v;
    }
    if let Some(v) = root.get("rescanDebounceMs").and_then(|v| v.as_u64()) {
        settings.rescan_debounce_ms = v;
    }

    log::info!("Configuration loaded from LSP settings:");
    log::info!("  enable_auto_complete: {}", settings.enable_auto_complete);
    log::info!("  enable_signature_help: {}", settings.enable_signature_help);
    log::info!("  enable_definition: {}", settings.enable_definition);
    log::info!(
        "  show_this_completions_on_root: {}",
        settings.show_this_completions_on_root
    );
    log::info!(
        "  show_event_snippet_completions_on_root: {}",
        settings.show_event_snippet_completions_on_root
    );
    log::info!("  keyword_lowercase: {}", settings.keyword_lowercase);
    log::info!(
        "  enable_global_procedure_snippets: {}",
        settings.enable_global_procedure_snippets
    );
    log::info!("  rescan_debounce_ms: {}", settings.rescan_debounce_ms);

    settings
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_fields_keep_defaults() {
        let settings = parse_settings(&json!({}), &Settings::default());
        assert!(settings.enable_auto_complete);
        assert_eq!(settings.rescan_debounce_ms, 500);
    }

    #[test]
    fn nested_vizscript_section_is_honored() {
        let payload = json!({
            "vizscript": {
                "enableAutoComplete": false,
                "keywordLowercase": false,
                "rescanDebounceMs": 250
            }
        });
        let settings = parse_settings(&payload, &Settings::default());
        assert!(!settings.enable_auto_complete);
        assert!(!settings.keyword_lowercase);
        assert_eq!(settings.rescan_debounce_ms, 250);
        // Untouched fields keep their previous values.
        assert!(settings.enable_signature_help);
    }

    #[test]
    fn flat_payload_is_honored() {
        let payload = json!({ "enableDefinition": false });
        let settings = parse_settings(&payload, &Settings::default());
        assert!(!settings.enable_definition);
    }
}
