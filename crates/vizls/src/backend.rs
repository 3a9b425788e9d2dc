//
// backend.rs
//
// The tower-lsp server glue. Request handlers take a read lock and delegate
// to `handlers`; document lifecycle notifications take a write lock. Change
// bursts are debounced per URI before the symbol generation is rebuilt.
//

use std::sync::Arc;

use tokio::sync::RwLock;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::Client;
use tower_lsp::LanguageServer;
use tower_lsp::LspService;
use tower_lsp::Server;

use crate::config::parse_settings;
use crate::handlers;
use crate::state::{RescanScheduler, WorldState};

pub struct Backend {
    #[allow(dead_code)]
    client: Client,
    state: Arc<RwLock<WorldState>>,
    rescans: Arc<RescanScheduler>,
}

impl Backend {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            state: Arc::new(RwLock::new(WorldState::new())),
            rescans: Arc::new(RescanScheduler::new()),
        }
    }

    /// Debounce a rescan of `uri`: the sleep is raced against cancellation,
    /// and a newer change cancels this task through the scheduler.
    fn schedule_rescan(&self, uri: Url, debounce_ms: u64) {
        let token = self.rescans.schedule(uri.clone());
        let state_arc = self.state.clone();
        let rescans = self.rescans.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => { return; }
                _ = tokio::time::sleep(std::time::Duration::from_millis(debounce_ms)) => {}
            }

            let mut state = state_arc.write().await;
            state.rescan_document(&uri);
            rescans.complete(&uri);
        });
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        log::info!("Initializing vizls");

        if let Some(options) = params.initialization_options {
            let mut state = self.state.write().await;
            let settings = parse_settings(&options, &state.settings);
            state.settings = settings;
        }

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::INCREMENTAL,
                )),
                completion_provider: Some(CompletionOptions {
                    trigger_characters: Some(vec![String::from(".")]),
                    ..Default::default()
                }),
                signature_help_provider: Some(SignatureHelpOptions {
                    trigger_characters: Some(vec![String::from("("), String::from(",")]),
                    ..Default::default()
                }),
                definition_provider: Some(OneOf::Left(true)),
                document_symbol_provider: Some(OneOf::Left(true)),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: String::from("vizls"),
                version: Some(String::from(env!("CARGO_PKG_VERSION"))),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        log::info!("vizls initialized");
    }

    async fn shutdown(&self) -> Result<()> {
        log::info!("vizls shutting down");
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        log::trace!(
            "Opening {} ({})",
            uri,
            params.text_document.language_id
        );
        let mut state = self.state.write().await;
        state.open_document(
            uri,
            &params.text_document.text,
            &params.text_document.language_id,
            Some(params.text_document.version),
        );
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;

        let debounce_ms = {
            let mut state = self.state.write().await;
            if let Some(doc) = state.documents.get_mut(&uri) {
                doc.version = Some(version);
            }
            for change in params.content_changes {
                state.apply_change(&uri, change);
            }
            state.settings.rescan_debounce_ms
        };

        self.schedule_rescan(uri, debounce_ms);
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = &params.text_document.uri;
        self.rescans.cancel(uri);
        let mut state = self.state.write().await;
        state.close_document(uri);
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        let mut state = self.state.write().await;
        let settings = parse_settings(&params.settings, &state.settings);
        state.settings = settings;
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let state = self.state.read().await;
        Ok(handlers::completion(
            &state,
            &params.text_document_position.text_document.uri,
            params.text_document_position.position,
        ))
    }

    async fn signature_help(&self, params: SignatureHelpParams) -> Result<Option<SignatureHelp>> {
        let state = self.state.read().await;
        Ok(handlers::signature_help(
            &state,
            &params.text_document_position_params.text_document.uri,
            params.text_document_position_params.position,
            params.context,
        ))
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let state = self.state.read().await;
        Ok(handlers::goto_definition(
            &state,
            &params.text_document_position_params.text_document.uri,
            params.text_document_position_params.position,
        ))
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let state = self.state.read().await;
        Ok(handlers::hover(
            &state,
            &params.text_document_position_params.text_document.uri,
            params.text_document_position_params.position,
        ))
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        let uri = params.text_document.uri;
        // The outline request refreshes the generation first, so a pending
        // debounce never serves a stale tree.
        let mut state = self.state.write().await;
        state.rescan_document(&uri);
        Ok(handlers::document_symbol(&state, &uri))
    }
}

pub async fn start_lsp() -> anyhow::Result<()> {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(Backend::new);
    Server::new(stdin, stdout, socket).serve(service).await;

    Ok(())
}
