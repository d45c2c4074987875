//! C and C++ keywords offered as completions and excluded from the index.

/// Keywords in the order they are offered.
pub const KEYWORDS: &[&str] = &[
    "alignas", "alignof", "auto", "bool", "break", "case", "catch", "char", "char16_t",
    "char32_t", "class", "const", "const_cast", "consteval", "constexpr", "constinit",
    "continue", "decltype", "default", "delete", "do", "double", "dynamic_cast", "else",
    "enum", "explicit", "export", "extern", "false", "float", "for", "friend", "goto", "if",
    "inline", "int", "long", "mutable", "namespace", "new", "noexcept", "nullptr", "operator",
    "private", "protected", "public", "register", "reinterpret_cast", "restrict", "return",
    "short", "signed", "sizeof", "static", "static_assert", "static_cast", "struct", "switch",
    "template", "this", "thread_local", "throw", "true", "try", "typedef", "typeid",
    "typename", "union", "unsigned", "using", "virtual", "void", "volatile", "wchar_t",
    "while",
];

/// Declaration specifiers that are not part of a declared type.
const STORAGE: &[&str] = &[
    "static", "inline", "extern", "virtual", "explicit", "constexpr", "consteval",
    "constinit", "friend", "register", "thread_local", "mutable",
];

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

pub fn is_storage_specifier(word: &str) -> bool {
    STORAGE.contains(&word)
}
