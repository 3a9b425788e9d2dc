//
// state.rs
//
// Global LSP state: open documents with their current symbol generation,
// plus the per-URI rescan scheduler that debounces change bursts.
//

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use ropey::Rope;
use tokio_util::sync::CancellationToken;
use tower_lsp::lsp_types::{Position, TextDocumentContentChangeEvent};
use url::Url;

use crate::builtins::{catalog, LanguageVariant};
use crate::config::Settings;
use crate::recognizer::scan_document;
use crate::symbols::Symbol;

/// An open document: rope contents plus the most recent symbol generation.
/// A rescan builds a complete new generation and swaps the `Arc`, so readers
/// holding the old one keep a consistent view.
pub struct Document {
    pub contents: Rope,
    pub language: LanguageVariant,
    pub version: Option<i32>,
    pub revision: u64,
    symbols: Arc<Vec<Symbol>>,
}

impl Document {
    pub fn new(text: &str, language: LanguageVariant, version: Option<i32>) -> Self {
        let mut doc = Self {
            contents: Rope::from_str(text),
            language,
            version,
            revision: 0,
            symbols: Arc::new(Vec::new()),
        };
        doc.rescan();
        doc
    }

    pub fn apply_change(&mut self, change: TextDocumentContentChangeEvent) {
        if let Some(range) = change.range {
            let start_line = (range.start.line as usize).min(self.contents.len_lines().saturating_sub(1));
            let end_line = (range.end.line as usize).min(self.contents.len_lines().saturating_sub(1));

            let start_line_text = self.contents.line(start_line).to_string();
            let end_line_text = self.contents.line(end_line).to_string();

            let start_char =
                utf16_offset_to_char_offset(&start_line_text, range.start.character as usize);
            let end_char = utf16_offset_to_char_offset(&end_line_text, range.end.character as usize);

            let start_idx = self.contents.line_to_char(start_line) + start_char;
            let end_idx = self.contents.line_to_char(end_line) + end_char;

            if start_idx <= end_idx && end_idx <= self.contents.len_chars() {
                self.contents.remove(start_idx..end_idx);
                self.contents.insert(start_idx, &change.text);
            } else {
                log::warn!("Ignoring out-of-bounds change range {:?}", range);
            }
        } else {
            // Full document sync
            self.contents = Rope::from_str(&change.text);
        }

        self.revision += 1;
    }

    pub fn text(&self) -> String {
        self.contents.to_string()
    }

    /// Text of one line, without the trailing newline.
    pub fn line_text(&self, line: u32) -> Option<String> {
        if (line as usize) >= self.contents.len_lines() {
            return None;
        }
        let text = self.contents.line(line as usize).to_string();
        Some(text.trim_end_matches(['\n', '\r']).to_string())
    }

    /// The line prefix ending at an LSP (UTF-16) cursor position.
    pub fn line_prefix(&self, position: Position) -> Option<String> {
        let line = self.line_text(position.line)?;
        let cut = utf16_offset_to_char_offset(&line, position.character as usize);
        Some(line.chars().take(cut).collect())
    }

    /// Recompute the symbol generation from the current contents and swap it
    /// in atomically.
    pub fn rescan(&mut self) {
        let text = self.text();
        let symbols = scan_document(&text, catalog(self.language.version));
        log::trace!(
            "Rescan produced {} symbols (revision {})",
            symbols.len(),
            self.revision
        );
        self.symbols = Arc::new(symbols);
    }

    /// The current symbol generation. Cheap to clone; never mutated in
    /// place.
    pub fn symbols(&self) -> Arc<Vec<Symbol>> {
        self.symbols.clone()
    }
}

fn utf16_offset_to_char_offset(line_text: &str, utf16_offset: usize) -> usize {
    let mut utf16_count = 0;
    let mut char_count = 0;

    for ch in line_text.chars() {
        if utf16_count >= utf16_offset {
            return char_count;
        }
        utf16_count += ch.len_utf16();
        char_count += 1;
    }
    char_count
}

/// Global LSP state behind the backend's `RwLock`.
pub struct WorldState {
    pub documents: HashMap<Url, Document>,
    pub settings: Settings,
}

impl WorldState {
    pub fn new() -> Self {
        Self {
            documents: HashMap::new(),
            settings: Settings::default(),
        }
    }

    pub fn open_document(
        &mut self,
        uri: Url,
        text: &str,
        language_id: &str,
        version: Option<i32>,
    ) {
        let language = LanguageVariant::from_language_id(language_id);
        self.documents
            .insert(uri, Document::new(text, language, version));
    }

    pub fn close_document(&mut self, uri: &Url) {
        self.documents.remove(uri);
    }

    pub fn apply_change(&mut self, uri: &Url, change: TextDocumentContentChangeEvent) {
        if let Some(doc) = self.documents.get_mut(uri) {
            doc.apply_change(change);
        }
    }

    pub fn get_document(&self, uri: &Url) -> Option<&Document> {
        self.documents.get(uri)
    }

    pub fn rescan_document(&mut self, uri: &Url) {
        if let Some(doc) = self.documents.get_mut(uri) {
            doc.rescan();
        }
    }
}

impl Default for WorldState {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks the pending debounced rescan per document. Scheduling cancels any
/// still-pending rescan for the same URI; only the last change of a burst
/// survives to trigger a scan.
#[derive(Debug, Default)]
pub struct RescanScheduler {
    pending: DashMap<Url, CancellationToken>,
}

impl RescanScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a rescan, cancelling pending work for this URI. Returns the
    /// token the new task must watch.
    pub fn schedule(&self, uri: Url) -> CancellationToken {
        let token = CancellationToken::new();
        if let Some(old) = self.pending.insert(uri, token.clone()) {
            old.cancel();
        }
        token
    }

    /// Mark the pending rescan as done.
    pub fn complete(&self, uri: &Url) {
        self.pending.remove(uri);
    }

    /// Cancel pending work for a URI (document closed).
    pub fn cancel(&self, uri: &Url) {
        if let Some((_, token)) = self.pending.remove(uri) {
            token.cancel();
        }
    }
}
