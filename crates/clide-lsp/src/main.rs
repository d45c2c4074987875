//! `clide-lsp` - C and C++ completion server backed by a translation-unit cache.
//!
//! Opening a document parses it once; completion requests reuse the parsed
//! unit and only reparse when the editor's buffer differs from what the unit
//! was last built from.

mod config;
mod handlers;
mod state;
#[cfg(test)]
mod test_support;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde_json::Value;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService, Server};
use tracing::info;

use crate::handlers::SESSION_STATUS_COMMAND;
use crate::state::{uri_to_path, ServerState, StartupOptions};

#[derive(Debug, Parser)]
#[command(name = "clide-lsp", version, about = "C and C++ completion language server")]
struct Args {
    /// Config file to use instead of the workspace's `clide.toml`.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Extra compiler flag, appended after the configured ones.
    #[arg(long = "arg", value_name = "FLAG", allow_hyphen_values = true)]
    args: Vec<String>,
}

/// The main language server struct.
pub struct ClideServer {
    /// LSP client for sending notifications.
    client: Client,
    /// Server state.
    state: Arc<ServerState>,
}

impl ClideServer {
    fn new(client: Client, options: StartupOptions) -> Self {
        Self {
            client,
            state: Arc::new(ServerState::new(options)),
        }
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for ClideServer {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        info!("clide language server initializing");

        let root = params
            .workspace_folders
            .as_ref()
            .and_then(|folders| folders.first())
            .map(|folder| &folder.uri)
            .or(params.root_uri.as_ref())
            .and_then(uri_to_path)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_default();
        self.state.initialize(&root);

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Options(
                    TextDocumentSyncOptions {
                        open_close: Some(true),
                        change: Some(TextDocumentSyncKind::INCREMENTAL),
                        save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                            include_text: Some(false),
                        })),
                        ..Default::default()
                    },
                )),

                completion_provider: Some(CompletionOptions {
                    trigger_characters: Some(vec![
                        ".".to_string(),
                        ":".to_string(),
                        ">".to_string(),
                    ]),
                    resolve_provider: Some(false),
                    ..Default::default()
                }),

                execute_command_provider: Some(ExecuteCommandOptions {
                    commands: vec![SESSION_STATUS_COMMAND.to_string()],
                    ..Default::default()
                }),

                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "clide-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _params: InitializedParams) {
        info!("clide language server initialized");
        self.client
            .log_message(MessageType::INFO, "clide language server initialized")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        info!("clide language server shutting down");
        let _ = self
            .state
            .run_session(|sessions| {
                sessions.shutdown();
                Ok(())
            })
            .await;
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        handlers::did_open(&self.client, &self.state, params).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        handlers::did_change(&self.state, params);
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        handlers::did_save(&self.client, &self.state, params).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        handlers::did_close(&self.client, &self.state, params).await;
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        Ok(handlers::completion(&self.client, &self.state, params).await)
    }

    async fn execute_command(&self, params: ExecuteCommandParams) -> Result<Option<Value>> {
        Ok(handlers::execute_command(&self.client, &self.state, params).await)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries the protocol.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = args
        .config
        .map(|path| {
            path.canonicalize()
                .with_context(|| format!("config file {}", path.display()))
        })
        .transpose()?;
    let options = StartupOptions {
        config,
        extra_args: args.args,
    };

    info!("Starting clide language server");

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(move |client| ClideServer::new(client, options));
    Server::new(stdin, stdout, socket).serve(service).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_collects_flags() {
        let args = Args::try_parse_from([
            "clide-lsp",
            "--config",
            "ci/clide.toml",
            "--arg",
            "-std=c++20",
            "--arg",
            "-DCI",
        ])
        .expect("parse args");
        assert_eq!(args.config, Some(PathBuf::from("ci/clide.toml")));
        assert_eq!(args.args, vec!["-std=c++20".to_string(), "-DCI".to_string()]);
    }

    #[tokio::test]
    async fn shutdown_releases_open_units() {
        let root = crate::test_support::temp_dir("clide-shutdown");
        let path = root.join("a.c");
        std::fs::write(&path, "int a;\n").expect("write source");

        let (service, _socket) =
            LspService::new(|client| ClideServer::new(client, StartupOptions::default()));
        let server = service.inner();
        server.state.initialize(&root);
        server
            .state
            .run_session({
                let path = path.clone();
                move |sessions| sessions.open(&path)
            })
            .await
            .expect("open");

        server.shutdown().await.expect("shutdown");
        let stats = server.state.sessions().expect("sessions").stats();
        assert_eq!(stats.releases, 1);
        assert_eq!(stats.open_files, 0);
        let _ = std::fs::remove_dir_all(root);
    }
}
