//! Workspace command handlers.

use serde::Serialize;
use serde_json::Value;
use tower_lsp::lsp_types::ExecuteCommandParams;
use tower_lsp::Client;

use crate::state::{path_to_uri, ServerState};

use super::report_error;

pub const SESSION_STATUS_COMMAND: &str = "clide.sessionStatus";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionStatus {
    open_files: Vec<String>,
    documents: usize,
    compile_args: Vec<String>,
    config_path: Option<String>,
    parses: u64,
    reparses: u64,
    completions: u64,
    releases: u64,
}

pub async fn execute_command(
    client: &Client,
    state: &ServerState,
    params: ExecuteCommandParams,
) -> Option<Value> {
    match params.command.as_str() {
        SESSION_STATUS_COMMAND => session_status(client, state).await,
        _ => None,
    }
}

async fn session_status(client: &Client, state: &ServerState) -> Option<Value> {
    let workspace = state.workspace()?;
    let result = state
        .run_session(|sessions| Ok((sessions.open_files(), sessions.stats())))
        .await;
    let (open_files, stats) = match result {
        Ok(status) => status,
        Err(err) => {
            report_error(client, "status", &err).await;
            return None;
        }
    };

    let status = SessionStatus {
        open_files: open_files
            .iter()
            .map(|file| {
                path_to_uri(file.as_path())
                    .map_or_else(|| file.to_string(), |uri| uri.to_string())
            })
            .collect(),
        documents: state.document_count(),
        compile_args: workspace.sessions.compile_args().as_slice().to_vec(),
        config_path: workspace
            .config
            .config_path
            .as_ref()
            .map(|path| path.display().to_string()),
        parses: stats.parses,
        reparses: stats.reparses,
        completions: stats.completions,
        releases: stats.releases,
    };
    serde_json::to_value(status).ok()
}
