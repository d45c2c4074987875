//! [`Backend`] implementation over the token-level index.

use std::fs;
use std::path::{Path, PathBuf};

use clide_session::trigger::identifier_prefix;
use clide_session::{
    Backend, BackendCandidate, BackendError, BufferSnapshot, CompileArgs, CompletionChunk,
    CursorKind,
};
use rustc_hash::FxHashSet;
use tracing::debug;

use crate::index::{Symbol, SymbolIndex};
use crate::keywords::KEYWORDS;

const SYMBOL_PRIORITY: u32 = 50;
const KEYWORD_PRIORITY: u32 = 80;

/// A parsed source file: its text plus identifier indexes.
#[derive(Debug)]
pub struct LexicalUnit {
    path: PathBuf,
    text: String,
    index: SymbolIndex,
    /// Headers forced in with `-include`, indexed once at parse time.
    headers: Vec<(PathBuf, SymbolIndex)>,
}

impl LexicalUnit {
    fn new(path: PathBuf, text: String, headers: Vec<(PathBuf, SymbolIndex)>) -> Self {
        let index = SymbolIndex::build(&text);
        Self {
            path,
            text,
            index,
            headers,
        }
    }

    fn update(&mut self, text: String) {
        self.index = SymbolIndex::build(&text);
        self.text = text;
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The text the index was last built from.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn index(&self) -> &SymbolIndex {
        &self.index
    }

    fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.index
            .symbols()
            .iter()
            .chain(self.headers.iter().flat_map(|(_, index)| index.symbols()))
    }
}

/// What precedes the identifier being completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    /// `.` or `->`
    Member,
    /// `::`
    Scope,
    Plain,
}

/// Completion backend that works from tokens alone.
///
/// It needs no compiler installation, understands no semantics and never
/// fails on malformed code. `-include` and `-I` are the only compile
/// arguments it interprets.
#[derive(Debug, Default, Clone, Copy)]
pub struct LexicalBackend;

impl LexicalBackend {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Backend for LexicalBackend {
    type Unit = LexicalUnit;

    fn parse(&self, path: &Path, args: &CompileArgs) -> Result<Self::Unit, BackendError> {
        let text = read_source(path)?;
        let headers = forced_includes(path, args)
            .into_iter()
            .map(|header| {
                let text = read_source(&header)?;
                Ok((header, SymbolIndex::build(&text)))
            })
            .collect::<Result<Vec<_>, BackendError>>()?;
        let unit = LexicalUnit::new(path.to_path_buf(), text, headers);
        debug!(
            "Indexed {} ({} symbols, {} forced includes)",
            path.display(),
            unit.index.len(),
            unit.headers.len()
        );
        Ok(unit)
    }

    fn reparse(
        &self,
        unit: &mut Self::Unit,
        unsaved: Option<&BufferSnapshot>,
    ) -> Result<(), BackendError> {
        let text = match unsaved {
            Some(buffer) => buffer.text().to_string(),
            None => read_source(&unit.path)?,
        };
        unit.update(text);
        Ok(())
    }

    fn completions_at(
        &self,
        unit: &Self::Unit,
        line: u32,
        column: u32,
        unsaved: Option<&BufferSnapshot>,
    ) -> Result<Vec<BackendCandidate>, BackendError> {
        let text = unsaved.map_or(unit.text(), BufferSnapshot::text);
        let line_text = nth_line(text, line).ok_or_else(|| {
            BackendError::new(format!("line {line} is outside {}", unit.path.display()))
        })?;
        let cursor = usize::try_from(column)
            .ok()
            .and_then(|column| column.checked_sub(1))
            .filter(|&cursor| line_text.is_char_boundary(cursor))
            .ok_or_else(|| {
                BackendError::new(format!("column {column} is not a character boundary"))
            })?;

        let before = &line_text[..cursor];
        let prefix = identifier_prefix(before);
        let word = word_at(line_text, cursor, prefix.len());
        let access = access_before(&before[..before.len() - prefix.len()]);

        // A word that occurs once in the file is the one being typed.
        let typed = unit
            .index
            .get(word)
            .filter(|symbol| symbol.occurrences <= 1);
        let mut seen = FxHashSet::default();
        let mut candidates: Vec<BackendCandidate> = unit
            .symbols()
            .filter(|symbol| symbol.name.starts_with(prefix))
            .filter(|symbol| !typed.is_some_and(|typed| std::ptr::eq(typed, *symbol)))
            .filter(|symbol| access != Access::Member || symbol.kind.is_member())
            .filter(|symbol| seen.insert(symbol.name.clone()))
            .map(symbol_candidate)
            .collect();

        if access == Access::Plain {
            candidates.extend(
                KEYWORDS
                    .iter()
                    .filter(|keyword| keyword.starts_with(prefix) && **keyword != word)
                    .map(|keyword| {
                        BackendCandidate::new(
                            CursorKind::Keyword,
                            vec![CompletionChunk::TypedText((*keyword).to_string())],
                        )
                        .with_priority(KEYWORD_PRIORITY)
                    }),
            );
        }
        Ok(candidates)
    }

    fn release(&self, unit: &mut Self::Unit) {
        debug!("Dropping index for {}", unit.path.display());
    }
}

fn read_source(path: &Path) -> Result<String, BackendError> {
    fs::read_to_string(path)
        .map_err(|err| BackendError::new(format!("{}: {err}", path.display())))
}

/// Resolves `-include <file>` arguments against the source directory, then
/// each `-I` directory, then the working directory.
fn forced_includes(source: &Path, args: &CompileArgs) -> Vec<PathBuf> {
    let mut search: Vec<PathBuf> = source.parent().map(Path::to_path_buf).into_iter().collect();
    let mut includes = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "-include" {
            if let Some(file) = iter.next() {
                includes.push(PathBuf::from(file));
            }
        } else if arg == "-I" {
            if let Some(dir) = iter.next() {
                search.push(PathBuf::from(dir));
            }
        } else if let Some(dir) = arg.strip_prefix("-I") {
            search.push(PathBuf::from(dir));
        }
    }
    includes
        .into_iter()
        .map(|file| {
            if file.is_absolute() {
                return file;
            }
            let found = search
                .iter()
                .map(|dir| dir.join(&file))
                .find(|candidate| candidate.is_file());
            found.unwrap_or(file)
        })
        .collect()
}

fn nth_line(text: &str, line: u32) -> Option<&str> {
    let index = usize::try_from(line).ok()?.checked_sub(1)?;
    text.split('\n')
        .nth(index)
        .map(|text| text.strip_suffix('\r').unwrap_or(text))
}

/// The whole identifier around the cursor: the typed prefix plus any
/// identifier characters right after the cursor.
fn word_at(line: &str, cursor: usize, prefix_len: usize) -> &str {
    let rest = &line[cursor..];
    let tail = rest
        .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
        .unwrap_or(rest.len());
    &line[cursor - prefix_len..cursor + tail]
}

fn access_before(text: &str) -> Access {
    let text = text.trim_end();
    if text.ends_with('.') || text.ends_with("->") {
        Access::Member
    } else if text.ends_with("::") {
        Access::Scope
    } else {
        Access::Plain
    }
}

fn symbol_candidate(symbol: &Symbol) -> BackendCandidate {
    let mut chunks = Vec::new();
    if let Some(result_type) = &symbol.result_type {
        chunks.push(CompletionChunk::ResultType(result_type.clone()));
    }
    chunks.push(CompletionChunk::TypedText(symbol.name.to_string()));
    match symbol.params.as_deref() {
        Some([]) => chunks.push(CompletionChunk::Punctuation("()".into())),
        Some(params) => {
            chunks.push(CompletionChunk::Punctuation("(".into()));
            for (n, param) in params.iter().enumerate() {
                if n > 0 {
                    chunks.push(CompletionChunk::Punctuation(", ".into()));
                }
                chunks.push(CompletionChunk::Placeholder(param.clone()));
            }
            chunks.push(CompletionChunk::Punctuation(")".into()));
        }
        None => {}
    }
    BackendCandidate::new(symbol.kind, chunks).with_priority(SYMBOL_PRIORITY)
}
