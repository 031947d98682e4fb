//! The state of one compilation unit, as seen by handlers.
use std::any::{type_name, Any};
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use base::prelude::{BitBuffer, EncodingError};
use serde_yaml::Value;

use super::config::LanguageConfig;
use super::lexer::TokenStream;
use super::token::Token;
use super::types::{AssemblerFailure, HandlerResult, ImplementationError};

/// Everything a handler may read or change: the token stream, the
/// bit buffer, the (read-only) definition document, the text
/// produced by the output hook and a slot in which the language can
/// keep whatever it likes (symbol tables, lists of fixups and so on).
/// The engine never looks inside that slot.
#[derive(Default)]
pub struct UnitContext {
    tokens: TokenStream,
    bits: BitBuffer,
    config: Arc<LanguageConfig>,
    aux: Option<Box<dyn Any + Send>>,
    output: Option<String>,
}

impl Debug for UnitContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitContext")
            .field("tokens", &self.tokens)
            .field("bits", &self.bits.len())
            .field("aux", &self.aux.is_some())
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

impl UnitContext {
    pub(crate) fn new(source: &str, config: Arc<LanguageConfig>) -> UnitContext {
        UnitContext {
            tokens: TokenStream::new(source),
            bits: BitBuffer::new(),
            config,
            aux: None,
            output: None,
        }
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenStream {
        &self.tokens
    }

    pub fn tokens_mut(&mut self) -> &mut TokenStream {
        &mut self.tokens
    }

    #[must_use]
    pub fn peek_current(&self) -> Option<Token> {
        self.tokens.peek_current()
    }

    pub fn parse_current(&mut self) -> Option<Token> {
        self.tokens.parse_current()
    }

    pub fn skip_current(&mut self) {
        self.tokens.skip_current();
    }

    /// Consume the next token, failing if there isn't one.
    ///
    /// # Errors
    ///
    /// A [`CompileError`](super::types::CompileError) describing what
    /// was `expected`.
    pub fn expect_token(&mut self, expected: &str) -> Result<Token, AssemblerFailure> {
        match self.tokens.parse_current() {
            Some(token) => Ok(token),
            None => Err(self.compile_error(format!("expected {expected}"))),
        }
    }

    /// # Errors
    ///
    /// A located compile error unless the next token starts a line.
    pub fn assert_is_new_line(&self) -> HandlerResult {
        self.tokens.assert_is_new_line().map_err(AssemblerFailure::from)
    }

    #[must_use]
    pub fn approx_current_location(&self) -> String {
        self.tokens.approx_current_location()
    }

    /// Make a compile error located at the current position.  This is
    /// how handlers report problems with the program being assembled.
    pub fn compile_error<M: Into<String>>(&self, message: M) -> AssemblerFailure {
        AssemblerFailure::Compile(self.tokens.error(message))
    }

    /// Make an error which reports a defect in the language
    /// definition itself.
    pub fn implementation_error<M: Into<String>>(&self, message: M) -> AssemblerFailure {
        AssemblerFailure::Implementation(ImplementationError::new(message))
    }

    fn encoding_failure(&self, e: EncodingError) -> AssemblerFailure {
        self.compile_error(e.to_string())
    }

    #[must_use]
    pub fn bits(&self) -> &BitBuffer {
        &self.bits
    }

    #[must_use]
    pub fn bit_len(&self) -> usize {
        self.bits.len()
    }

    pub fn write_bit(&mut self, bit: bool) {
        self.bits.write_bit(bit);
    }

    pub fn write_bits<I: IntoIterator<Item = bool>>(&mut self, bits: I) {
        self.bits.write_bits(bits);
    }

    /// # Errors
    ///
    /// A located compile error if `index` is beyond the bits emitted
    /// so far.
    pub fn set_bit(&mut self, index: usize, bit: bool) -> HandlerResult {
        self.bits
            .set_bit(index, bit)
            .map_err(|e| self.encoding_failure(e))
    }

    /// # Errors
    ///
    /// A located compile error if `value` needs more than `width`
    /// bits.
    pub fn write_unsigned(&mut self, value: u64, width: u32) -> HandlerResult {
        self.bits
            .write_unsigned(value, width)
            .map_err(|e| self.encoding_failure(e))
    }

    /// # Errors
    ///
    /// A located compile error if `value` is outside the
    /// two's-complement range of `width` bits.
    pub fn write_signed(&mut self, value: i64, width: u32) -> HandlerResult {
        self.bits
            .write_signed(value, width)
            .map_err(|e| self.encoding_failure(e))
    }

    /// Patch a field which was emitted earlier (for example once a
    /// forward reference has been resolved).
    ///
    /// # Errors
    ///
    /// A located compile error if `value` needs more than `width`
    /// bits or the field is not inside the bits emitted so far.
    pub fn replace_unsigned(&mut self, value: u64, width: u32, start: usize) -> HandlerResult {
        self.bits
            .replace_unsigned(value, width, start)
            .map_err(|e| self.encoding_failure(e))
    }

    /// Pad the output with zero bits to the language's start address
    /// alignment.
    pub fn align_start_address(&mut self) {
        self.bits.align_to(self.config.alignment());
    }

    #[must_use]
    pub fn alignment(&self) -> usize {
        self.config.alignment()
    }

    /// The language definition document.
    #[must_use]
    pub fn config(&self) -> &Value {
        self.config.document()
    }

    #[must_use]
    pub fn config_value(&self, key: &str) -> Option<&Value> {
        self.config.get(key)
    }

    /// Append text to the unit's output.  This is how the output hook
    /// produces its result.
    pub fn emit_output(&mut self, text: &str) {
        self.output.get_or_insert_with(String::new).push_str(text);
    }

    pub(crate) fn take_output(&mut self) -> Option<String> {
        self.output.take()
    }

    pub fn set_aux<T: Any + Send>(&mut self, value: T) {
        self.aux = Some(Box::new(value));
    }

    #[must_use]
    pub fn aux<T: Any + Send>(&self) -> Option<&T> {
        self.aux.as_ref().and_then(|b| b.downcast_ref::<T>())
    }

    pub fn aux_mut<T: Any + Send>(&mut self) -> Option<&mut T> {
        self.aux.as_mut().and_then(|b| b.downcast_mut::<T>())
    }

    /// The auxiliary value, creating it with `make` if the slot is
    /// empty.
    ///
    /// # Errors
    ///
    /// An implementation error if the slot holds a value of some other
    /// type.
    pub fn aux_or_insert_with<T, F>(&mut self, make: F) -> Result<&mut T, AssemblerFailure>
    where
        T: Any + Send,
        F: FnOnce() -> T,
    {
        if self.aux.is_none() {
            self.aux = Some(Box::new(make()));
        }
        match self.aux.as_mut().and_then(|b| b.downcast_mut::<T>()) {
            Some(value) => Ok(value),
            None => Err(AssemblerFailure::Implementation(ImplementationError::new(
                format!(
                    "the auxiliary context does not hold a value of type {}",
                    type_name::<T>()
                ),
            ))),
        }
    }

    pub fn take_aux(&mut self) -> Option<Box<dyn Any + Send>> {
        self.aux.take()
    }
}
