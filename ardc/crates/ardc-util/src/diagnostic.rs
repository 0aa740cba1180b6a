//! Diagnostic collection and reporting.
//!
//! The checker accumulates diagnostics on a [`Handler`] and keeps going;
//! nothing in the static-analysis path throws. Each diagnostic carries a
//! [`Span`] and renders as `<file> <row>:<col> <message>`, one per line.

use std::cell::RefCell;
use std::fmt;

use crate::span::{SourceMap, Span};

/// Diagnostic severity level.
///
/// Errors block a successful exit; warnings do not.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    /// A problem that invalidates the module
    Error,
    /// A problem worth reporting that does not invalidate the module
    Warning,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Error => write!(f, "error"),
            Level::Warning => write!(f, "warning"),
        }
    }
}

/// A unique code identifying a diagnostic category.
///
/// Codes follow `{prefix}{number}`: "E" for errors, "W" for warnings.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagnosticCode {
    pub prefix: &'static str,
    pub number: u32,
}

impl DiagnosticCode {
    #[inline]
    pub const fn new(prefix: &'static str, number: u32) -> Self {
        Self { prefix, number }
    }

    pub fn as_str(&self) -> String {
        format!("{}{:04}", self.prefix, self.number)
    }

    // Static diagnostics (checker)
    /// E0001: name not found in any enclosing scope
    pub const UNDEFINED_SYMBOL: Self = Self::new("E", 1);
    /// E0002: expression type does not fit the expected slot
    pub const TYPE_MISMATCH: Self = Self::new("E", 2);
    /// E0003: two symbols share a name in one scope
    pub const DUPLICATE_NAME: Self = Self::new("E", 3);
    /// E0004: match does not cover every case
    pub const NON_EXHAUSTIVE_MATCH: Self = Self::new("E", 4);
    /// E0005: match arm repeats a case
    pub const DUPLICATE_CASE: Self = Self::new("E", 5);
    /// E0006: mutation of an immutable subject
    pub const INCOMPATIBLE_MUTATION: Self = Self::new("E", 6);
    /// E0007: `try` outside a compatible Result/Maybe function
    pub const BAD_TRY_CONTEXT: Self = Self::new("E", 7);
    /// E0008: trait implementation missing or mismatching a method
    pub const MISSING_TRAIT_METHOD: Self = Self::new("E", 8);
    /// E0009: call with the wrong number of arguments
    pub const WRONG_ARITY: Self = Self::new("E", 9);
    /// E0010: pattern form not valid for the matched type
    pub const UNSUPPORTED_PATTERN: Self = Self::new("E", 10);
    /// E0011: integer range with start > end
    pub const RANGE_INVALID: Self = Self::new("E", 11);
    /// E0012: import path did not resolve
    pub const UNRESOLVED_IMPORT: Self = Self::new("E", 12);
    /// E0013: `break` outside a loop
    pub const BREAK_OUTSIDE_LOOP: Self = Self::new("E", 13);
    /// E0014: declaration not allowed in this position
    pub const MISPLACED_DECLARATION: Self = Self::new("E", 14);

    // Warnings
    /// W0001: import alias shadows an earlier import
    pub const DUPLICATE_IMPORT: Self = Self::new("W", 1);
    /// W0002: variable bound but never read
    pub const UNUSED_VARIABLE: Self = Self::new("W", 2);
}

impl fmt::Debug for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single diagnostic message with severity and location.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub level: Level,
    pub message: String,
    pub span: Span,
    pub code: Option<DiagnosticCode>,
}

impl Diagnostic {
    pub fn new(level: Level, message: impl Into<String>, span: Span) -> Self {
        Self {
            level,
            message: message.into(),
            span,
            code: None,
        }
    }

    pub fn error(message: impl Into<String>, span: Span) -> Self {
        Self::new(Level::Error, message, span)
    }

    pub fn warning(message: impl Into<String>, span: Span) -> Self {
        Self::new(Level::Warning, message, span)
    }

    pub fn with_code(mut self, code: DiagnosticCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Render as `<file> <row>:<col> <message>`.
    pub fn render(&self, sources: &SourceMap) -> String {
        format!(
            "{} {}:{} {}",
            sources.name(self.span.file),
            self.span.line,
            self.span.column,
            self.message
        )
    }
}

/// Collects diagnostics across a whole check run.
///
/// Interior mutability lets deeply nested checking code report without
/// threading `&mut` everywhere, matching how the checker borrows scopes.
#[derive(Default)]
pub struct Handler {
    diagnostics: RefCell<Vec<Diagnostic>>,
}

impl Handler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report an error.
    pub fn error(&self, span: Span, code: DiagnosticCode, message: impl Into<String>) {
        self.emit(Diagnostic::error(message, span).with_code(code));
    }

    /// Report a warning.
    pub fn warning(&self, span: Span, code: DiagnosticCode, message: impl Into<String>) {
        self.emit(Diagnostic::warning(message, span).with_code(code));
    }

    /// Emit a pre-built diagnostic.
    pub fn emit(&self, diagnostic: Diagnostic) {
        self.diagnostics.borrow_mut().push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .borrow()
            .iter()
            .any(|d| d.level == Level::Error)
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .borrow()
            .iter()
            .filter(|d| d.level == Level::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .borrow()
            .iter()
            .filter(|d| d.level == Level::Warning)
            .count()
    }

    /// Snapshot of all diagnostics collected so far.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.borrow().clone()
    }

    pub fn clear(&self) {
        self.diagnostics.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_display() {
        assert_eq!(Level::Error.to_string(), "error");
        assert_eq!(Level::Warning.to_string(), "warning");
    }

    #[test]
    fn test_code_as_str() {
        assert_eq!(DiagnosticCode::UNDEFINED_SYMBOL.as_str(), "E0001");
        assert_eq!(DiagnosticCode::DUPLICATE_IMPORT.as_str(), "W0001");
    }

    #[test]
    fn test_handler_counts() {
        let handler = Handler::new();
        assert!(!handler.has_errors());

        handler.error(Span::DUMMY, DiagnosticCode::TYPE_MISMATCH, "bad type");
        handler.warning(Span::DUMMY, DiagnosticCode::UNUSED_VARIABLE, "unused");

        assert!(handler.has_errors());
        assert_eq!(handler.error_count(), 1);
        assert_eq!(handler.warning_count(), 1);
        assert_eq!(handler.diagnostics().len(), 2);
    }

    #[test]
    fn test_handler_clear() {
        let handler = Handler::new();
        handler.error(Span::DUMMY, DiagnosticCode::TYPE_MISMATCH, "bad");
        handler.clear();
        assert!(!handler.has_errors());
    }

    #[test]
    fn test_render_format() {
        let mut sources = SourceMap::new();
        let file = sources.add("main.ard");
        let diag = Diagnostic::error("undefined symbol 'foo'", Span::point(3, 9).with_file(file));
        assert_eq!(diag.render(&sources), "main.ard 3:9 undefined symbol 'foo'");
    }
}
