//! The token stream which handlers read their operands from.
//!
//! The recognition of individual lexemes is done by a `logos` lexer
//! (see [`Lexeme`]); the [`TokenStream`] drives it from a cursor and
//! keeps track of the line number and of whether the next token is
//! the first on its line.
use logos::Logos;

use super::token::Token;
use super::types::{CompileError, LineNumber};


/// Decode the escapes of a string literal.  The result keeps the
/// surrounding quotes.
fn decode_string_literal(lex: &mut logos::Lexer<Lexeme>) -> String {
    let slice = lex.slice();
    let body = &slice[1..slice.len() - 1];
    let mut result = String::with_capacity(slice.len());
    result.push('"');
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            // The regex only matches a literal whose backslashes are
            // each followed by some character.
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some(other) => result.push(other),
                None => (),
            }
        } else {
            result.push(ch);
        }
    }
    result.push('"');
    result
}

/// Whitespace is space, tab, carriage return and newline.  A `;`
/// starts a comment which extends to the end of the line.  Newlines
/// are not skipped by the lexer because the token stream counts
/// them.
///
/// A `"` which does not start a well-formed string literal (because
/// it is unterminated, or the input ends straight after a backslash)
/// is a lexing error.
#[derive(Logos, Debug, PartialEq, Eq, Clone)]
#[logos(skip r"([ \t\r]|;[^\n]*)+")]
pub(crate) enum Lexeme {
    #[token("\n")]
    Newline,

    #[regex(r#""([^"\\]|\\(.|\n))*""#, decode_string_literal)]
    Quoted(String),

    #[regex(r#"[(){}\[\],:']"#, |lex| lex.slice().to_string())]
    Delimiter(String),

    #[regex(r#"[^ \t\r\n(){}\[\],;:'"]+"#, |lex| lex.slice().to_string())]
    Word(String),
}

/// A cursor over the source text of one compilation unit.
///
/// Invariant: between operations the cursor is never followed by a
/// newline or comment (other than within the whitespace which the
/// lexer skips by itself), because every operation which moves the
/// cursor finishes by skipping past them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenStream {
    source: String,
    cursor: usize,
    line: LineNumber,
    after_newline: bool,
}

impl Default for TokenStream {
    fn default() -> TokenStream {
        TokenStream::new("")
    }
}

impl TokenStream {
    pub fn new<S: Into<String>>(source: S) -> TokenStream {
        let mut stream = TokenStream {
            source: source.into(),
            cursor: 0,
            line: 1,
            // The start of the source is the start of a line.
            after_newline: true,
        };
        stream.skip_to_next_token();
        stream
    }

    fn lexer(&self) -> logos::Lexer<'_, Lexeme> {
        Lexeme::lexer(&self.source[self.cursor..])
    }

    /// Skip over newlines (the lexer skips the other whitespace and
    /// comments) counting them as we go.
    fn skip_to_next_token(&mut self) {
        loop {
            let mut lex = self.lexer();
            let end = match lex.next() {
                Some(Ok(Lexeme::Newline)) => lex.span().end,
                _ => return,
            };
            self.cursor += end;
            self.line += 1;
            self.after_newline = true;
        }
    }

    /// Lex the token at the cursor, without changing any state.
    /// Returns the token and the offset just past it.
    fn lex_at_cursor(&self) -> Option<(Token, usize)> {
        let mut lex = self.lexer();
        loop {
            match lex.next() {
                Some(Ok(Lexeme::Quoted(s) | Lexeme::Delimiter(s) | Lexeme::Word(s))) => {
                    return Some((Token::new(s), self.cursor + lex.span().end));
                }
                Some(Ok(Lexeme::Newline)) => {
                    debug_assert!(false, "newlines should already have been skipped");
                }
                Some(Err(())) | None => {
                    return None;
                }
            }
        }
    }

    /// Consume the next token and return it.  Returns `None` at the
    /// end of the source, and also when the next thing in the source
    /// is a malformed string literal; in that case nothing is
    /// consumed.
    pub fn parse_current(&mut self) -> Option<Token> {
        let (token, end) = self.lex_at_cursor()?;
        self.cursor = end;
        self.after_newline = false;
        self.skip_to_next_token();
        Some(token)
    }

    /// Return the next token without consuming it.
    #[must_use]
    pub fn peek_current(&self) -> Option<Token> {
        self.lex_at_cursor().map(|(token, _)| token)
    }

    /// Consume one token, discarding it.
    pub fn skip_current(&mut self) {
        let _ = self.parse_current();
    }

    /// True when nothing but whitespace and comments remains.  Note
    /// that `peek_current()` can return `None` when this is false (if
    /// the remaining input begins with a malformed string literal).
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.lexer().next().is_none()
    }

    /// Fail unless the next token is the first one on its line.
    ///
    /// # Errors
    ///
    /// A located [`CompileError`] if the cursor is not just after a
    /// line break (or at the start of the source).
    pub fn assert_is_new_line(&self) -> Result<(), CompileError> {
        if self.after_newline {
            Ok(())
        } else {
            Err(self.error("expected a new line here"))
        }
    }

    #[must_use]
    pub fn is_after_newline(&self) -> bool {
        self.after_newline
    }

    /// A description of where the cursor is, for use in diagnostics.
    #[must_use]
    pub fn approx_current_location(&self) -> String {
        match self.peek_current() {
            Some(token) => format!("At line {}, near token '{}'", self.line, token),
            None if self.is_exhausted() => format!("At line {}, end of source", self.line),
            None => format!("At line {}, near a malformed string literal", self.line),
        }
    }

    /// Build a [`CompileError`] located at the cursor.
    pub fn error<M: Into<String>>(&self, message: M) -> CompileError {
        CompileError::new(self.approx_current_location(), message)
    }

    #[must_use]
    pub fn line(&self) -> LineNumber {
        self.line
    }

    /// The byte offset of the cursor within the source.
    #[must_use]
    pub fn position(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl Iterator for TokenStream {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.parse_current()
    }
}
