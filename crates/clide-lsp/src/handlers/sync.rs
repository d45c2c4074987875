//! Document synchronization handlers.
//!
//! `didOpen`, `didSave` and `didClose` drive the session lifecycle; edits in
//! between only update the stored buffer, which the next completion request
//! hands to the session cache.

use tower_lsp::lsp_types::*;
use tower_lsp::Client;
use tracing::{info, warn};

use crate::state::{uri_to_path, ServerState};

use super::lsp_utils::position_to_offset;
use super::report_error;

pub async fn did_open(client: &Client, state: &ServerState, params: DidOpenTextDocumentParams) {
    let uri = params.text_document.uri;
    info!("Document opened: {}", uri);

    let Some(path) = uri_to_path(&uri) else {
        warn!("Ignoring non-file document: {}", uri);
        return;
    };
    state.open_document(
        uri,
        path.clone(),
        params.text_document.version,
        params.text_document.text,
    );

    if let Err(err) = state.run_session(move |sessions| sessions.open(&path)).await {
        report_error(client, "open", &err).await;
    }
}

pub fn did_change(state: &ServerState, params: DidChangeTextDocumentParams) {
    let uri = params.text_document.uri;
    let version = params.text_document.version;

    if params.content_changes.is_empty() {
        return;
    }

    let Some(doc) = state.get_document(&uri) else {
        warn!("Received change for unknown document: {}", uri);
        return;
    };

    let Some(updated) = apply_content_changes(doc.text.text(), &params.content_changes) else {
        warn!("Failed to apply incremental changes for {}", uri);
        return;
    };

    state.update_document(&uri, version, updated);
}

pub(crate) fn apply_content_changes(
    content: &str,
    changes: &[TextDocumentContentChangeEvent],
) -> Option<String> {
    let mut updated = content.to_string();
    for change in changes {
        if let Some(range) = change.range {
            let start = position_to_offset(&updated, range.start)?;
            let end = position_to_offset(&updated, range.end)?;
            if start > end || end > updated.len() {
                return None;
            }
            updated.replace_range(start..end, &change.text);
        } else {
            updated = change.text.clone();
        }
    }
    Some(updated)
}

pub async fn did_save(client: &Client, state: &ServerState, params: DidSaveTextDocumentParams) {
    let uri = params.text_document.uri;

    if let Some(text) = params.text {
        state.sync_document_text(&uri, text);
    }
    let Some(doc) = state.get_document(&uri) else {
        warn!("Received save for unknown document: {}", uri);
        return;
    };
    info!("Document saved: {} (version {})", uri, doc.version);

    // A document whose open failed (e.g. the file was not on disk yet) gets
    // its session on the first save.
    let path = doc.path;
    let result = state
        .run_session(move |sessions| {
            if sessions.is_open(&path) {
                sessions.save(&path)
            } else {
                sessions.open(&path)
            }
        })
        .await;
    if let Err(err) = result {
        report_error(client, "save", &err).await;
    }
}

pub async fn did_close(client: &Client, state: &ServerState, params: DidCloseTextDocumentParams) {
    let uri = params.text_document.uri;
    info!("Document closed: {}", uri);

    let Some(doc) = state.close_document(&uri) else {
        return;
    };
    let path = doc.path;
    if let Err(err) = state.run_session(move |sessions| sessions.close(&path)).await {
        report_error(client, "close", &err).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StartupOptions;
    use crate::test_support::{temp_dir, test_client};
    use std::fs;

    #[test]
    fn apply_content_changes_inserts_text() {
        let original = "int main() {\n}\n";
        let change = TextDocumentContentChangeEvent {
            range: Some(Range {
                start: Position::new(1, 0),
                end: Position::new(1, 0),
            }),
            range_length: None,
            text: "    return 0;\n".to_string(),
        };
        let updated = apply_content_changes(original, &[change]).expect("apply change");
        assert_eq!(updated, "int main() {\n    return 0;\n}\n");
    }

    #[test]
    fn apply_content_changes_replaces_range() {
        let original = "int x = 1;\n";
        let change = TextDocumentContentChangeEvent {
            range: Some(Range {
                start: Position::new(0, 8),
                end: Position::new(0, 9),
            }),
            range_length: None,
            text: "2".to_string(),
        };
        let updated = apply_content_changes(original, &[change]).expect("apply change");
        assert_eq!(updated, "int x = 2;\n");
    }

    #[test]
    fn apply_content_changes_counts_utf16_units() {
        let original = "auto s = \"é\"; s.\n";
        let change = TextDocumentContentChangeEvent {
            range: Some(Range {
                start: Position::new(0, 16),
                end: Position::new(0, 16),
            }),
            range_length: None,
            text: "size()".to_string(),
        };
        let updated = apply_content_changes(original, &[change]).expect("apply change");
        assert_eq!(updated, "auto s = \"é\"; s.size()\n");
    }

    #[test]
    fn apply_content_changes_full_sync() {
        let original = "int x = 1;\n";
        let change = TextDocumentContentChangeEvent {
            range: None,
            range_length: None,
            text: "int y = 2;\n".to_string(),
        };
        let updated = apply_content_changes(original, &[change]).expect("apply change");
        assert_eq!(updated, "int y = 2;\n");
    }

    #[tokio::test]
    async fn open_and_close_drive_the_session() {
        let root = temp_dir("clide-sync");
        let path = root.join("main.c");
        fs::write(&path, "int value;\n").expect("write source");
        let uri = Url::from_file_path(&path).expect("uri");

        let client = test_client();
        let state = ServerState::new(StartupOptions::default());
        state.initialize(&root);

        did_open(
            &client,
            &state,
            DidOpenTextDocumentParams {
                text_document: TextDocumentItem::new(
                    uri.clone(),
                    "c".to_string(),
                    1,
                    "int value;\n".to_string(),
                ),
            },
        )
        .await;
        let sessions = state.sessions().expect("sessions");
        assert!(sessions.is_open(&path));

        did_change(
            &state,
            DidChangeTextDocumentParams {
                text_document: VersionedTextDocumentIdentifier::new(uri.clone(), 2),
                content_changes: vec![TextDocumentContentChangeEvent {
                    range: None,
                    range_length: None,
                    text: "int value, other;\n".to_string(),
                }],
            },
        );
        let doc = state.get_document(&uri).expect("document");
        assert_eq!(doc.version, 2);
        assert_eq!(doc.text.text(), "int value, other;\n");

        did_save(
            &client,
            &state,
            DidSaveTextDocumentParams {
                text_document: TextDocumentIdentifier::new(uri.clone()),
                text: None,
            },
        )
        .await;
        assert_eq!(sessions.stats().reparses, 1);

        did_close(
            &client,
            &state,
            DidCloseTextDocumentParams {
                text_document: TextDocumentIdentifier::new(uri.clone()),
            },
        )
        .await;
        assert!(!sessions.is_open(&path));
        assert!(state.get_document(&uri).is_none());
        assert_eq!(sessions.stats().releases, 1);
        let _ = fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn save_opens_a_document_whose_open_failed() {
        let root = temp_dir("clide-sync-new");
        let path = root.join("new.c");
        let uri = Url::from_file_path(&path).expect("uri");

        let client = test_client();
        let state = ServerState::new(StartupOptions::default());
        state.initialize(&root);

        did_open(
            &client,
            &state,
            DidOpenTextDocumentParams {
                text_document: TextDocumentItem::new(
                    uri.clone(),
                    "c".to_string(),
                    1,
                    "int fresh;\n".to_string(),
                ),
            },
        )
        .await;
        let sessions = state.sessions().expect("sessions");
        assert!(!sessions.is_open(&path));
        assert!(state.get_document(&uri).is_some());

        fs::write(&path, "int fresh;\n").expect("write source");
        did_save(
            &client,
            &state,
            DidSaveTextDocumentParams {
                text_document: TextDocumentIdentifier::new(uri.clone()),
                text: None,
            },
        )
        .await;
        assert!(sessions.is_open(&path));
        let stats = sessions.stats();
        assert_eq!(stats.parses, 2);
        assert_eq!(stats.reparses, 0);
        let _ = fs::remove_dir_all(root);
    }
}
