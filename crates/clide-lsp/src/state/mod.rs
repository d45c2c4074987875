//! Server state management.
//!
//! Holds the editor's open buffers and the session cache built at
//! `initialize`. Session calls block on backend work, so they always run on
//! tokio's blocking pool.
#![cfg_attr(not(test), deny(clippy::unwrap_used))]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clide_lexical::LexicalBackend;
use clide_session::{BufferSnapshot, SessionError, SessionManager, TriggerMatcher};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tokio::task::JoinError;
use tower_lsp::lsp_types::Url;
use tracing::{info, warn};

use crate::config::ClideConfig;

mod path;

pub(crate) use path::{path_to_uri, uri_to_path};

pub(crate) type Sessions = SessionManager<LexicalBackend>;

/// Failures of a session call made on behalf of an LSP request.
#[derive(Debug, Error)]
pub enum HostError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("session worker failed: {0}")]
    Worker(#[from] JoinError),

    #[error("server is not initialized")]
    NotInitialized,
}

impl HostError {
    /// Returns true for failures worth a `window/showMessage`.
    pub fn is_user_visible(&self) -> bool {
        match self {
            Self::Session(err) => err.is_user_visible(),
            Self::Worker(_) => true,
            Self::NotInitialized => false,
        }
    }
}

/// An editor buffer.
#[derive(Debug, Clone)]
pub struct Document {
    /// The file the buffer belongs to.
    pub path: PathBuf,
    /// The document version.
    pub version: i32,
    /// The latest buffer text.
    pub text: BufferSnapshot,
}

/// Everything fixed at `initialize`.
pub struct Workspace {
    pub config: ClideConfig,
    pub trigger: TriggerMatcher,
    pub sessions: Arc<Sessions>,
}

/// Command-line overrides applied on top of the workspace config.
#[derive(Debug, Clone, Default)]
pub struct StartupOptions {
    pub config: Option<PathBuf>,
    pub extra_args: Vec<String>,
}

/// Server state shared by all handlers.
pub struct ServerState {
    options: StartupOptions,
    documents: RwLock<FxHashMap<Url, Document>>,
    workspace: OnceCell<Workspace>,
}

impl ServerState {
    pub fn new(options: StartupOptions) -> Self {
        Self {
            options,
            documents: RwLock::new(FxHashMap::default()),
            workspace: OnceCell::new(),
        }
    }

    /// Loads configuration for `root` and starts the session cache.
    ///
    /// Only the first call has any effect.
    pub fn initialize(&self, root: &Path) -> &Workspace {
        self.workspace.get_or_init(|| {
            let config = match &self.options.config {
                Some(path) => ClideConfig::load_file(root, path),
                None => ClideConfig::load(root),
            };
            let trigger = config.trigger_matcher().unwrap_or_else(|err| {
                warn!("{err}; using the default completion trigger");
                TriggerMatcher::default()
            });
            let compile_args = config.compile_args(&self.options.extra_args);
            info!(
                "Workspace {} ({} compile args, config {})",
                config.root.display(),
                compile_args.len(),
                config
                    .config_path
                    .as_deref()
                    .map_or_else(|| "none".to_string(), |path| path.display().to_string())
            );
            let sessions = Arc::new(SessionManager::new(LexicalBackend::new(), compile_args));
            Workspace {
                config,
                trigger,
                sessions,
            }
        })
    }

    pub fn workspace(&self) -> Option<&Workspace> {
        self.workspace.get()
    }

    pub fn sessions(&self) -> Option<Arc<Sessions>> {
        self.workspace().map(|workspace| Arc::clone(&workspace.sessions))
    }

    /// Runs `f` against the session cache on the blocking pool.
    pub async fn run_session<T, F>(&self, f: F) -> Result<T, HostError>
    where
        T: Send + 'static,
        F: FnOnce(&Sessions) -> Result<T, SessionError> + Send + 'static,
    {
        let sessions = self.sessions().ok_or(HostError::NotInitialized)?;
        let result = tokio::task::spawn_blocking(move || f(&sessions)).await?;
        Ok(result?)
    }

    pub fn open_document(&self, uri: Url, path: PathBuf, version: i32, text: String) {
        let document = Document {
            path,
            version,
            text: BufferSnapshot::new(text),
        };
        self.documents.write().insert(uri, document);
    }

    /// Replaces a buffer's text. Returns false for unknown documents.
    pub fn update_document(&self, uri: &Url, version: i32, text: String) -> bool {
        let mut documents = self.documents.write();
        let Some(document) = documents.get_mut(uri) else {
            return false;
        };
        document.version = version;
        document.text = BufferSnapshot::new(text);
        true
    }

    /// Replaces a buffer's text without touching its version.
    pub fn sync_document_text(&self, uri: &Url, text: String) {
        if let Some(document) = self.documents.write().get_mut(uri) {
            document.text = BufferSnapshot::new(text);
        }
    }

    pub fn get_document(&self, uri: &Url) -> Option<Document> {
        self.documents.read().get(uri).cloned()
    }

    pub fn close_document(&self, uri: &Url) -> Option<Document> {
        self.documents.write().remove(uri)
    }

    pub fn document_count(&self) -> usize {
        self.documents.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(path: &str) -> Url {
        Url::parse(&format!("file://{path}")).expect("uri")
    }

    #[test]
    fn documents_track_latest_text() {
        let state = ServerState::new(StartupOptions::default());
        let uri = uri("/src/a.cpp");
        state.open_document(uri.clone(), PathBuf::from("/src/a.cpp"), 1, "int a;".into());
        assert!(state.update_document(&uri, 2, "int b;".into()));

        let document = state.get_document(&uri).expect("document");
        assert_eq!(document.version, 2);
        assert_eq!(document.text.text(), "int b;");

        state.sync_document_text(&uri, "int c;".into());
        let document = state.get_document(&uri).expect("document");
        assert_eq!(document.version, 2);
        assert_eq!(document.text.text(), "int c;");

        assert!(state.close_document(&uri).is_some());
        assert!(!state.update_document(&uri, 3, "int d;".into()));
        assert_eq!(state.document_count(), 0);
    }

    #[tokio::test]
    async fn session_calls_need_initialize() {
        let state = ServerState::new(StartupOptions::default());
        let err = state
            .run_session(|sessions| Ok(sessions.stats()))
            .await
            .expect_err("not initialized");
        assert!(matches!(err, HostError::NotInitialized));
        assert!(!err.is_user_visible());
    }

    #[tokio::test]
    async fn session_errors_pass_through() {
        let state = ServerState::new(StartupOptions {
            config: None,
            extra_args: vec!["-std=c11".to_string()],
        });
        let root = std::env::temp_dir();
        let workspace = state.initialize(&root);
        assert_eq!(workspace.sessions.compile_args().as_slice(), ["-std=c11"]);

        let err = state
            .run_session(|sessions| sessions.save("/nonexistent/clide/a.c"))
            .await
            .expect_err("not open");
        assert!(matches!(err, HostError::Session(SessionError::NotOpen(_))));
        assert!(!err.is_user_visible());
    }
}
