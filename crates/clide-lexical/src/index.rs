//! Identifier index with guessed declaration kinds.
//!
//! The index is built from a single token pass. It does not resolve types or
//! overloads; it recognizes declaration shapes (`struct X`, `T name;`,
//! `T name(...)`, `#define X`) well enough to label completions.

use clide_session::CursorKind;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::keywords::{is_keyword, is_storage_specifier};
use crate::lexer::{significant_tokens, SignificantToken, TokenKind};

/// Words that start an expression statement rather than a declaration.
const STATEMENT_WORDS: &[&str] = &[
    "return", "else", "case", "goto", "throw", "new", "delete", "sizeof", "do", "co_return",
    "co_yield", "co_await",
];

/// One indexed identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: SmolStr,
    pub kind: CursorKind,
    /// Declared type of a variable or return type of a function.
    pub result_type: Option<String>,
    /// Parameter spellings for anything called with `(...)`.
    pub params: Option<Vec<String>>,
    /// Number of times the identifier appears in the source.
    pub occurrences: u32,
}

/// Identifiers of one source text, in first-occurrence order.
#[derive(Debug, Clone, Default)]
pub struct SymbolIndex {
    symbols: Vec<Symbol>,
    by_name: FxHashMap<SmolStr, usize>,
}

impl SymbolIndex {
    /// Indexes a C or C++ source text.
    #[must_use]
    pub fn build(source: &str) -> Self {
        Indexer::new(source).run()
    }

    #[must_use]
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.by_name.get(name).map(|&slot| &self.symbols[slot])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    fn slot(&mut self, name: &str) -> usize {
        if let Some(&slot) = self.by_name.get(name) {
            return slot;
        }
        let slot = self.symbols.len();
        let name = SmolStr::new(name);
        self.symbols.push(Symbol {
            name: name.clone(),
            kind: CursorKind::Unexposed,
            result_type: None,
            params: None,
            occurrences: 0,
        });
        self.by_name.insert(name, slot);
        slot
    }

    fn record(&mut self, name: &str) {
        let slot = self.slot(name);
        self.symbols[slot].occurrences += 1;
    }

    /// Assigns a kind unless an earlier declaration already did.
    fn classify(
        &mut self,
        name: &str,
        kind: CursorKind,
        result_type: Option<String>,
        params: Option<Vec<String>>,
    ) {
        let slot = self.slot(name);
        let symbol = &mut self.symbols[slot];
        if symbol.kind == CursorKind::Unexposed {
            symbol.kind = kind;
            symbol.result_type = result_type;
            symbol.params = params;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Scope {
    Aggregate(SmolStr),
    Enum,
    Namespace,
    Block,
}

struct Indexer<'src> {
    tokens: Vec<SignificantToken<'src>>,
    index: SymbolIndex,
    scopes: Vec<Scope>,
    /// Scope the next `{` opens, set by `struct X`, `enum`, `namespace`.
    pending: Option<Scope>,
    /// First token of the current declaration.
    decl_start: usize,
    template: bool,
    /// Scope depth of an open `typedef`.
    typedef_depth: Option<usize>,
}

impl<'src> Indexer<'src> {
    fn new(source: &'src str) -> Self {
        Self {
            tokens: significant_tokens(source),
            index: SymbolIndex::default(),
            scopes: Vec::new(),
            pending: None,
            decl_start: 0,
            template: false,
            typedef_depth: None,
        }
    }

    fn run(mut self) -> SymbolIndex {
        let mut i = 0;
        while i < self.tokens.len() {
            i = self.step(i);
        }
        self.index
    }

    fn kind_at(&self, i: usize) -> Option<TokenKind> {
        self.tokens.get(i).map(|token| token.kind)
    }

    fn step(&mut self, i: usize) -> usize {
        match self.tokens[i].kind {
            TokenKind::Directive => return self.directive(i),
            TokenKind::Ident => return self.ident(i),
            TokenKind::LBrace => {
                let scope = self.pending.take().unwrap_or(Scope::Block);
                self.scopes.push(scope);
                self.decl_start = i + 1;
                self.template = false;
            }
            TokenKind::RBrace => {
                self.scopes.pop();
                self.decl_start = i + 1;
            }
            TokenKind::Semicolon => {
                self.decl_start = i + 1;
                self.pending = None;
                self.template = false;
                if self.typedef_depth == Some(self.scopes.len()) {
                    self.typedef_depth = None;
                }
            }
            TokenKind::Colon | TokenKind::LParen => self.decl_start = i + 1,
            _ => {}
        }
        i + 1
    }

    /// Indexes `#define` names and skips every directive line.
    fn directive(&mut self, i: usize) -> usize {
        let end = (i + 1..self.tokens.len())
            .find(|&j| self.tokens[j].starts_line)
            .unwrap_or(self.tokens.len());
        let name = self.tokens[i].text.trim_start_matches('#').trim();
        if name == "define" && i + 1 < end && self.tokens[i + 1].kind == TokenKind::Ident {
            let macro_name = self.tokens[i + 1];
            let function_like = self.tokens.get(i + 2).is_some_and(|open| {
                open.kind == TokenKind::LParen && open.range.start() == macro_name.range.end()
            });
            let params = function_like.then(|| {
                self.tokens[i + 3..end]
                    .iter()
                    .take_while(|token| token.kind != TokenKind::RParen)
                    .filter(|token| token.kind != TokenKind::Comma)
                    .map(|token| token.text.to_string())
                    .collect()
            });
            self.index.record(macro_name.text);
            self.index
                .classify(macro_name.text, CursorKind::MacroDefinition, None, params);
        }
        end
    }

    fn ident(&mut self, i: usize) -> usize {
        let name = self.tokens[i].text;
        match name {
            "template" => return self.template_header(i),
            "struct" | "class" | "union" | "enum" | "namespace" => return self.aggregate(i),
            "typedef" => {
                self.typedef_depth = Some(self.scopes.len());
                return i + 1;
            }
            "using" => {
                if self.kind_at(i + 1) == Some(TokenKind::Ident)
                    && self.kind_at(i + 2) == Some(TokenKind::Eq)
                {
                    let alias = self.tokens[i + 1].text;
                    self.index.record(alias);
                    self.index
                        .classify(alias, CursorKind::TypedefDecl, None, None);
                    return i + 2;
                }
                return i + 1;
            }
            _ if is_keyword(name) => return i + 1,
            _ => {}
        }

        self.index.record(name);
        let prev = i.checked_sub(1).map(|p| self.tokens[p].kind);
        let next = self.kind_at(i + 1);

        if matches!(prev, Some(TokenKind::Dot | TokenKind::Arrow)) {
            let kind = if next == Some(TokenKind::LParen) {
                CursorKind::CxxMethod
            } else {
                CursorKind::FieldDecl
            };
            self.index.classify(name, kind, None, None);
            return i + 1;
        }

        if self.scopes.last() == Some(&Scope::Enum)
            && matches!(prev, Some(TokenKind::LBrace | TokenKind::Comma))
        {
            self.index
                .classify(name, CursorKind::EnumConstantDecl, None, None);
            return i + 1;
        }

        if next == Some(TokenKind::LParen)
            && (self.is_constructor_like(i) || self.looks_like_declaration(i))
        {
            self.callable(i);
            return i + 1;
        }

        let ends_declarator = matches!(
            next,
            Some(
                TokenKind::Semicolon
                    | TokenKind::Eq
                    | TokenKind::Comma
                    | TokenKind::LBracket
                    | TokenKind::RParen
                    | TokenKind::LBrace
                    | TokenKind::Colon
            )
        );
        if self.typedef_depth == Some(self.scopes.len())
            && matches!(next, Some(TokenKind::Semicolon | TokenKind::Comma))
        {
            self.index.classify(name, CursorKind::TypedefDecl, None, None);
        } else if ends_declarator && self.looks_like_declaration(i) {
            let kind = if matches!(self.scopes.last(), Some(Scope::Aggregate(_))) {
                CursorKind::FieldDecl
            } else {
                CursorKind::VarDecl
            };
            let result_type = self.result_type(i);
            self.index.classify(name, kind, result_type, None);
        }
        i + 1
    }

    /// `struct X`, `class X`, `union X`, `enum [class] X`, `namespace X`.
    fn aggregate(&mut self, i: usize) -> usize {
        let keyword = self.tokens[i].text;
        let mut j = i + 1;
        if keyword == "enum"
            && self
                .tokens
                .get(j)
                .is_some_and(|token| matches!(token.text, "class" | "struct"))
        {
            j += 1;
        }

        let declared = self
            .tokens
            .get(j)
            .filter(|token| token.kind == TokenKind::Ident && !is_keyword(token.text))
            .map(|token| token.text);
        let Some(declared) = declared else {
            if self.body_follows(j) {
                self.pending = Some(match keyword {
                    "enum" => Scope::Enum,
                    "namespace" => Scope::Namespace,
                    _ => Scope::Aggregate(SmolStr::default()),
                });
            }
            return j;
        };

        let kind = match keyword {
            "struct" => Some(CursorKind::StructDecl),
            "union" => Some(CursorKind::UnionDecl),
            "enum" => Some(CursorKind::EnumDecl),
            "class" if self.template => Some(CursorKind::ClassTemplate),
            "class" => Some(CursorKind::ClassDecl),
            _ => None,
        };
        self.index.record(declared);
        if let Some(kind) = kind {
            self.index.classify(declared, kind, None, None);
        }
        if self.body_follows(j + 1) {
            self.pending = Some(match keyword {
                "enum" => Scope::Enum,
                "namespace" => Scope::Namespace,
                _ => Scope::Aggregate(SmolStr::new(declared)),
            });
        }
        j + 1
    }

    /// True if a definition body (or base clause) starts at `at`.
    fn body_follows(&self, at: usize) -> bool {
        matches!(
            self.kind_at(at),
            Some(TokenKind::LBrace | TokenKind::Colon)
        )
    }

    /// Skips `template <...>`, indexing its type parameters.
    fn template_header(&mut self, i: usize) -> usize {
        if self.kind_at(i + 1) != Some(TokenKind::Lt) {
            return i + 1;
        }
        let mut depth = 0usize;
        let mut j = i + 1;
        while j < self.tokens.len() {
            let token = self.tokens[j];
            match token.kind {
                TokenKind::Lt => depth += 1,
                TokenKind::Gt => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                TokenKind::Operator if token.text == ">>" => {
                    depth = depth.saturating_sub(2);
                    if depth == 0 {
                        break;
                    }
                }
                TokenKind::Ident
                    if matches!(token.text, "typename" | "class")
                        && self.kind_at(j + 1) == Some(TokenKind::Ident) =>
                {
                    let parameter = self.tokens[j + 1].text;
                    self.index.record(parameter);
                    self.index
                        .classify(parameter, CursorKind::TemplateTypeParameter, None, None);
                    j += 1;
                }
                _ => {}
            }
            j += 1;
        }
        self.template = true;
        self.decl_start = j + 1;
        j + 1
    }

    /// Indexes a function, method, constructor or destructor declaration
    /// together with its parameters.
    fn callable(&mut self, i: usize) {
        let name = self.tokens[i].text;
        let open = i + 1;
        let Some(close) = self.matching_paren(open) else {
            return;
        };
        let params = self.parameters(open + 1, close);
        for param in &params {
            if let Some(param_name) = &param.name {
                self.index.classify(
                    param_name,
                    CursorKind::ParmDecl,
                    param.ty.clone(),
                    None,
                );
            }
        }

        let prev = i.checked_sub(1).map(|p| self.tokens[p]);
        let qualifier = match prev {
            Some(token) if token.kind == TokenKind::ColonColon => {
                i.checked_sub(2).map(|p| self.tokens[p].text)
            }
            _ => None,
        };
        let enclosing = match self.scopes.last() {
            Some(Scope::Aggregate(aggregate)) => Some(aggregate.as_str()),
            _ => qualifier,
        };

        let kind = if prev.is_some_and(|token| token.kind == TokenKind::Tilde) {
            CursorKind::Destructor
        } else if enclosing == Some(name) {
            CursorKind::Constructor
        } else if enclosing.is_some() {
            CursorKind::CxxMethod
        } else if self.template {
            CursorKind::FunctionTemplate
        } else {
            CursorKind::FunctionDecl
        };
        let result_type = match kind {
            CursorKind::Constructor | CursorKind::Destructor => None,
            _ => self.result_type(i),
        };
        let spellings = params.into_iter().map(|param| param.text).collect();
        self.index.classify(name, kind, result_type, Some(spellings));
    }

    fn is_constructor_like(&self, i: usize) -> bool {
        let name = self.tokens[i].text;
        if i >= 1 && self.tokens[i - 1].kind == TokenKind::Tilde {
            return true;
        }
        if i >= 2 && self.tokens[i - 1].kind == TokenKind::ColonColon {
            return self.tokens[i - 2].text == name;
        }
        matches!(self.scopes.last(), Some(Scope::Aggregate(aggregate)) if aggregate == name)
    }

    /// True when the identifier at `i` is preceded by something type-like
    /// within the current declaration.
    fn looks_like_declaration(&self, i: usize) -> bool {
        let mut p = i;
        while p >= 2
            && self.tokens[p - 1].kind == TokenKind::ColonColon
            && self.tokens[p - 2].kind == TokenKind::Ident
        {
            p -= 2;
        }
        if p == 0 || p - 1 < self.decl_start {
            return false;
        }
        let prev = self.tokens[p - 1];
        match prev.kind {
            TokenKind::Ident => !STATEMENT_WORDS.contains(&prev.text),
            TokenKind::Star | TokenKind::Amp | TokenKind::AmpAmp | TokenKind::Gt => true,
            _ => false,
        }
    }

    /// Spelling of the declared type before the name at `i`, without
    /// storage specifiers or a `Class::` qualifier.
    fn result_type(&self, i: usize) -> Option<String> {
        let mut end = i;
        while end >= self.decl_start + 2
            && self.tokens[end - 1].kind == TokenKind::ColonColon
            && self.tokens[end - 2].kind == TokenKind::Ident
        {
            end -= 2;
        }
        if end <= self.decl_start {
            return None;
        }
        let slice = &self.tokens[self.decl_start..end];
        if slice.iter().any(|token| {
            matches!(
                token.kind,
                TokenKind::Comma
                    | TokenKind::Eq
                    | TokenKind::Semicolon
                    | TokenKind::LParen
                    | TokenKind::RParen
                    | TokenKind::LBrace
                    | TokenKind::RBrace
            )
        }) {
            return None;
        }
        let kept: Vec<_> = slice
            .iter()
            .filter(|token| {
                token.kind != TokenKind::Ident
                    || !(is_storage_specifier(token.text) || token.text == "typedef")
            })
            .copied()
            .collect();
        (!kept.is_empty()).then(|| join(&kept))
    }

    fn matching_paren(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        for (offset, token) in self.tokens[open..].iter().enumerate() {
            match token.kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(open + offset);
                    }
                }
                TokenKind::LBrace | TokenKind::RBrace | TokenKind::Semicolon => return None,
                _ => {}
            }
        }
        None
    }

    /// Splits the tokens between parentheses into parameters.
    fn parameters(&self, start: usize, end: usize) -> Vec<Param> {
        let mut params = Vec::new();
        let mut depth = 0i32;
        let mut param_start = start;
        for j in start..=end {
            let kind = if j == end {
                None
            } else {
                Some(self.tokens[j].kind)
            };
            match kind {
                Some(TokenKind::LParen | TokenKind::Lt | TokenKind::LBracket) => depth += 1,
                Some(TokenKind::RParen | TokenKind::Gt | TokenKind::RBracket) => depth -= 1,
                Some(TokenKind::Comma) if depth == 0 => {
                    params.extend(Param::from_tokens(&self.tokens[param_start..j]));
                    param_start = j + 1;
                }
                None => params.extend(Param::from_tokens(&self.tokens[param_start..j])),
                _ => {}
            }
        }
        params
    }
}

struct Param {
    text: String,
    name: Option<String>,
    ty: Option<String>,
}

impl Param {
    fn from_tokens(tokens: &[SignificantToken<'_>]) -> Option<Self> {
        let declarator = tokens
            .iter()
            .position(|token| token.kind == TokenKind::Eq)
            .map_or(tokens, |eq| &tokens[..eq]);
        match declarator {
            [] => None,
            [only] if only.text == "void" => None,
            [.., last] if declarator.len() >= 2
                && last.kind == TokenKind::Ident
                && !is_keyword(last.text) =>
            {
                Some(Self {
                    text: join(declarator),
                    name: Some(last.text.to_string()),
                    ty: Some(join(&declarator[..declarator.len() - 1])),
                })
            }
            _ => Some(Self {
                text: join(declarator),
                name: None,
                ty: None,
            }),
        }
    }
}

/// Joins tokens into a conventional C++ spelling: `const T &value`,
/// `std::vector<int>`, `char *`.
fn join(tokens: &[SignificantToken<'_>]) -> String {
    let mut out = String::new();
    let mut prev: Option<TokenKind> = None;
    for token in tokens {
        if prev.is_some_and(|prev| needs_space(prev, token.kind)) {
            out.push(' ');
        }
        out.push_str(token.text);
        prev = Some(token.kind);
    }
    out
}

fn needs_space(prev: TokenKind, next: TokenKind) -> bool {
    use TokenKind::{
        Amp, AmpAmp, ColonColon, Comma, Gt, LBracket, LParen, Lt, RBracket, RParen, Star, Tilde,
    };
    !matches!(next, Comma | RParen | RBracket | ColonColon | LBracket | LParen | Lt | Gt)
        && !matches!(
            prev,
            ColonColon | LParen | LBracket | Lt | Star | Amp | AmpAmp | Tilde
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use expect_test::{expect, Expect};

    fn check(source: &str, expect: Expect) {
        let index = SymbolIndex::build(source);
        let rendered: String = index
            .symbols()
            .iter()
            .map(|symbol| {
                let mut line = format!("{:?} {}", symbol.kind, symbol.name);
                if let Some(params) = &symbol.params {
                    line.push_str(&format!("({})", params.join(", ")));
                }
                if let Some(ty) = &symbol.result_type {
                    line.push_str(&format!(": {ty}"));
                }
                if symbol.occurrences != 1 {
                    line.push_str(&format!(" x{}", symbol.occurrences));
                }
                line.push('\n');
                line
            })
            .collect();
        expect.assert_eq(&rendered);
    }

    #[test]
    fn c_declarations() {
        check(
            r#"#include <stdio.h>
#define MAX_AGE 120
#define CLAMP(x, lo, hi) ((x) < (lo) ? (lo) : (x))

struct person {
    int age;
    const char *name;
};

typedef unsigned long size_type;

enum color { RED, GREEN = 2, BLUE };

static int count_people(const struct person *people, size_type n);

int main(void) {
    struct person p;
    p.age = CLAMP(p.age, 0, MAX_AGE);
    printf("%d\n", p.age);
    return 0;
}
"#,
            expect![[r#"
                MacroDefinition MAX_AGE x2
                MacroDefinition CLAMP(x, lo, hi) x2
                StructDecl person x3
                FieldDecl age: int x4
                FieldDecl name: const char *
                TypedefDecl size_type x2
                EnumDecl color
                EnumConstantDecl RED
                EnumConstantDecl GREEN
                EnumConstantDecl BLUE
                FunctionDecl count_people(const struct person *people, size_type n): int
                ParmDecl people: const struct person *
                ParmDecl n: size_type
                FunctionDecl main(): int
                VarDecl p: struct person x4
                Unexposed printf
            "#]],
        );
    }

    #[test]
    fn cpp_classes_and_templates() {
        check(
            r#"namespace geo {
template <typename T>
class vec {
public:
    vec(T x, T y);
    ~vec();
    T length() const;
    static vec origin();
private:
    T x_;
};

template <typename T>
T dot(const vec<T> &a, const vec<T> &b);
}

geo::vec::vec(float x, float y) : x_(x) {}

void use(geo::vec &v) {
    auto n = v.length();
    v.normalize();
}
"#,
            expect![[r#"
                Unexposed geo x3
                TemplateTypeParameter T x9
                ClassTemplate vec x9
                ParmDecl x: T x3
                ParmDecl y: T x2
                CxxMethod length(): T x2
                CxxMethod origin(): vec
                FieldDecl x_: T x2
                FunctionTemplate dot(const vec<T> &a, const vec<T> &b): T
                ParmDecl a: const vec<T> &
                ParmDecl b: const vec<T> &
                FunctionDecl use(geo::vec &v): void
                ParmDecl v: geo::vec & x3
                VarDecl n: auto
                CxxMethod normalize
            "#]],
        );
    }

    #[test]
    fn first_declaration_wins() {
        let index = SymbolIndex::build("int total;\nvoid total(int);\nx = total;\n");
        let total = index.get("total").expect("indexed");
        assert_eq!(total.kind, CursorKind::VarDecl);
        assert_eq!(total.occurrences, 3);
        assert!(index.get("int").is_none());
    }

    #[test]
    fn unbalanced_input_still_indexes() {
        let index = SymbolIndex::build("struct s { int a;\nvoid f(int b\n#define M\n");
        assert_eq!(index.get("a").map(|s| s.kind), Some(CursorKind::FieldDecl));
        assert_eq!(index.get("M").map(|s| s.kind), Some(CursorKind::MacroDefinition));
        assert_eq!(index.get("f").map(|s| s.kind), Some(CursorKind::Unexposed));
    }
}
