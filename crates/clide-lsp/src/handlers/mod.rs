//! LSP request handlers.
//!
//! This module wires handler submodules together.

mod commands;
mod completion;
mod lsp_utils;
mod sync;

use tower_lsp::lsp_types::MessageType;
use tower_lsp::Client;
use tracing::{debug, warn};

use crate::state::HostError;

pub use commands::{execute_command, SESSION_STATUS_COMMAND};
pub use completion::completion;
pub use sync::{did_change, did_close, did_open, did_save};

/// Logs a failed session call and shows backend failures to the user.
///
/// Routine misses (unopened files, stale cursors) stay in the log.
pub(crate) async fn report_error(client: &Client, action: &str, err: &HostError) {
    if err.is_user_visible() {
        warn!("{action} failed: {err}");
        client
            .show_message(MessageType::WARNING, format!("clide: {err}"))
            .await;
    } else {
        debug!("{action} skipped: {err}");
    }
}
