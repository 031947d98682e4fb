//! Tokens, and the case-mapping utilities handlers use on them.
use std::fmt::{self, Display, Formatter};

/// A lexeme as it appeared in the source.  String literals keep
/// their surrounding quotes (their escapes are already decoded), so
/// `"nop"` and `nop` are different tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(String);

impl Token {
    pub fn new<S: Into<String>>(content: S) -> Token {
        Token(content.into())
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.0
    }

    /// Exact, case-sensitive, comparison with some text.  Handlers
    /// which want case-insensitive matching should lowercase first.
    #[must_use]
    pub fn is(&self, other: &str) -> bool {
        self.0 == other
    }

    #[must_use]
    pub fn is_string_literal(&self) -> bool {
        self.0.len() >= 2 && self.0.starts_with('"') && self.0.ends_with('"')
    }

    /// The form used as a dispatch table key.
    #[must_use]
    pub fn to_lower_case(&self) -> String {
        to_lower_case(&self.0)
    }

    #[must_use]
    pub fn into_content(self) -> String {
        self.0
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Token {
        Token::new(s)
    }
}

/// Lowercase the ASCII letters of `s`, leaving everything else alone.
#[must_use]
pub fn to_lower_case(s: &str) -> String {
    s.to_ascii_lowercase()
}

/// Uppercase the ASCII letters of `s`, leaving everything else alone.
#[must_use]
pub fn to_upper_case(s: &str) -> String {
    s.to_ascii_uppercase()
}

#[test]
fn test_token_equality_is_case_sensitive() {
    let t = Token::new("MOV");
    assert!(t.is("MOV"));
    assert!(!t.is("mov"));
    assert_eq!(t.to_lower_case(), "mov");
}

#[test]
fn test_case_mapping_leaves_non_ascii_alone() {
    assert_eq!(to_lower_case("AbÇ1"), "abÇ1");
    assert_eq!(to_upper_case("abç1"), "ABç1");
}

#[test]
fn test_string_literal_detection() {
    assert!(Token::new("\"x\"").is_string_literal());
    assert!(Token::new("\"\"").is_string_literal());
    assert!(!Token::new("\"").is_string_literal());
    assert!(!Token::new("x").is_string_literal());
}
