//! Backend completion candidates and the editor-facing completion record.

/// Declaration kind of the entity a candidate refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorKind {
    /// `struct` declaration.
    StructDecl,
    /// `union` declaration.
    UnionDecl,
    /// `class` declaration.
    ClassDecl,
    /// `enum` declaration.
    EnumDecl,
    /// Enumerator inside an `enum`.
    EnumConstantDecl,
    /// `typedef` or alias declaration.
    TypedefDecl,
    /// Class template.
    ClassTemplate,
    /// Free function.
    FunctionDecl,
    /// Function template.
    FunctionTemplate,
    /// Conversion operator.
    ConversionFunction,
    /// Constructor.
    Constructor,
    /// Destructor.
    Destructor,
    /// Member function.
    CxxMethod,
    /// Data member.
    FieldDecl,
    /// Variable.
    VarDecl,
    /// Function parameter.
    ParmDecl,
    /// Template type parameter.
    TemplateTypeParameter,
    /// Preprocessor directive.
    PreprocessingDirective,
    /// Macro definition.
    MacroDefinition,
    /// Language keyword.
    Keyword,
    /// Anything the backend did not classify.
    Unexposed,
}

impl CursorKind {
    /// Returns the editor-facing kind for this declaration kind.
    #[must_use]
    pub fn completion_kind(self) -> CompletionKind {
        match self {
            Self::StructDecl
            | Self::UnionDecl
            | Self::ClassDecl
            | Self::EnumDecl
            | Self::EnumConstantDecl
            | Self::TypedefDecl
            | Self::ClassTemplate => CompletionKind::Type,
            Self::FunctionDecl | Self::FunctionTemplate | Self::ConversionFunction => {
                CompletionKind::Function
            }
            Self::Constructor | Self::Destructor | Self::CxxMethod | Self::FieldDecl => {
                CompletionKind::Member
            }
            Self::VarDecl => CompletionKind::Variable,
            Self::TemplateTypeParameter => CompletionKind::TypeParameter,
            Self::ParmDecl => CompletionKind::Parameter,
            Self::PreprocessingDirective => CompletionKind::Directive,
            Self::MacroDefinition => CompletionKind::Macro,
            Self::Keyword => CompletionKind::Keyword,
            Self::Unexposed => CompletionKind::Other,
        }
    }

    /// Returns the declaring keyword for aggregate and alias kinds.
    #[must_use]
    pub fn declaration_keyword(self) -> Option<&'static str> {
        match self {
            Self::StructDecl => Some("struct"),
            Self::UnionDecl => Some("union"),
            Self::EnumDecl | Self::EnumConstantDecl => Some("enum"),
            Self::TypedefDecl => Some("typedef"),
            Self::ClassDecl | Self::ClassTemplate => Some("class"),
            _ => None,
        }
    }

    /// Returns true for members reachable through `.` or `->`.
    #[must_use]
    pub fn is_member(self) -> bool {
        matches!(
            self,
            Self::FieldDecl | Self::CxxMethod | Self::Constructor | Self::Destructor
        )
    }
}

/// One piece of a completion string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionChunk {
    /// The text the user is expected to type (the name).
    TypedText(String),
    /// Fixed text inserted as-is.
    Text(String),
    /// An argument slot the user fills in.
    Placeholder(String),
    /// Result type of a function or type of a variable.
    ResultType(String),
    /// Shown to the user, never inserted.
    Informative(String),
    /// Parentheses, brackets, commas and similar punctuation.
    Punctuation(String),
}

/// A completion candidate as produced by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendCandidate {
    /// Declaration kind of the completed entity.
    pub cursor_kind: CursorKind,
    /// Completion string pieces in display order.
    pub chunks: Vec<CompletionChunk>,
    /// One-line documentation, when the backend has any.
    pub brief: Option<String>,
    /// Backend priority (lower is better). Carried, never used to reorder.
    pub priority: u32,
}

impl BackendCandidate {
    /// Creates a candidate with default priority.
    pub fn new(cursor_kind: CursorKind, chunks: Vec<CompletionChunk>) -> Self {
        Self {
            cursor_kind,
            chunks,
            brief: None,
            priority: 50,
        }
    }

    /// Attaches one-line documentation.
    #[must_use]
    pub fn with_brief(mut self, brief: impl Into<String>) -> Self {
        self.brief = Some(brief.into());
        self
    }

    /// Sets the backend priority.
    #[must_use]
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }
}

/// Editor-facing kind of a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompletionKind {
    /// Struct, class, union, enum or typedef.
    Type,
    /// Free function.
    Function,
    /// Data member or member function.
    Member,
    /// Variable.
    Variable,
    /// Template type parameter.
    TypeParameter,
    /// Function parameter.
    Parameter,
    /// Preprocessor directive.
    Directive,
    /// Macro.
    Macro,
    /// Language keyword.
    Keyword,
    /// Unclassified.
    Other,
}

impl CompletionKind {
    /// Returns the one-character tag editors show in the completion menu.
    #[must_use]
    pub fn tag(self) -> char {
        match self {
            Self::Type => 't',
            Self::Function => 'f',
            Self::Member => 'm',
            Self::Variable => 'v',
            Self::TypeParameter => 'p',
            Self::Parameter => 's',
            Self::Directive => 'D',
            Self::Macro => 'M',
            Self::Keyword => 'k',
            Self::Other => '?',
        }
    }
}

/// A completion as returned to the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Display text, e.g. `push_back(const T &value)`.
    pub label: String,
    /// Text to insert; argument slots are written as `<#slot#>`.
    pub insert_text: String,
    /// Editor-facing kind.
    pub kind: CompletionKind,
    /// Declaring keyword and result type, space separated. May be empty.
    pub detail: String,
}

impl From<BackendCandidate> for Completion {
    fn from(candidate: BackendCandidate) -> Self {
        let mut label = String::new();
        let mut insert_text = String::new();
        let mut result_type = None;

        for chunk in candidate.chunks {
            match chunk {
                CompletionChunk::TypedText(text)
                | CompletionChunk::Text(text)
                | CompletionChunk::Punctuation(text) => {
                    label.push_str(&text);
                    insert_text.push_str(&text);
                }
                CompletionChunk::Placeholder(text) => {
                    label.push_str(&text);
                    insert_text.push_str("<#");
                    insert_text.push_str(&text);
                    insert_text.push_str("#>");
                }
                CompletionChunk::Informative(text) => label.push_str(&text),
                CompletionChunk::ResultType(text) => result_type = Some(text),
            }
        }

        let detail = [
            candidate.cursor_kind.declaration_keyword().map(str::to_string),
            result_type,
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");

        Self {
            label,
            insert_text,
            kind: candidate.cursor_kind.completion_kind(),
            detail,
        }
    }
}
