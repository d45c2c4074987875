//! `clide-lexical` - Token-level C/C++ completion backend.
//!
//! Implements [`clide_session::Backend`] without a compiler: each file is
//! lexed with `logos` and indexed into identifiers with guessed declaration
//! kinds. Completion filters that index by the identifier prefix at the
//! cursor and the access context (`.`, `->`, `::`) in front of it.
//!
//! Accuracy is that of a tokenizer, which is enough to keep the session
//! cache and the editor host exercised end to end.

#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]

mod backend;
pub mod index;
mod keywords;
pub mod lexer;

pub use backend::{LexicalBackend, LexicalUnit};
pub use index::{Symbol, SymbolIndex};
pub use keywords::KEYWORDS;
