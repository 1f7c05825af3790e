use std::cell::{Cell, RefCell};

use crate::span::Span;

/// Raised (as an `Err` value) when a diagnostic is fatal; unwinds the
/// whole compilation via `?`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FatalError;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Fatal,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal error",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Byte offset into the grammar; `None` for file-wide problems.
    pub span: Option<Span>,
    pub message: String,
}

/// Diagnostic sink shared by every pipeline stage. Reporting takes
/// `&self` so stages holding other borrows can still emit.
#[derive(Default)]
pub struct ErrorAccumulator {
    diagnostics: RefCell<Vec<Diagnostic>>,
    any_reported: Cell<bool>,
    error_count: Cell<u32>,
}

impl ErrorAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, severity: Severity, span: Option<Span>, message: impl Into<String>) {
        self.any_reported.set(true);
        if severity >= Severity::Error {
            self.error_count.set(self.error_count.get() + 1);
        }
        self.diagnostics.borrow_mut().push(Diagnostic {
            severity,
            span,
            message: message.into(),
        });
    }

    pub fn info(&self, span: Span, message: impl Into<String>) {
        self.report(Severity::Info, Some(span), message);
    }

    pub fn warning(&self, span: Span, message: impl Into<String>) {
        self.report(Severity::Warning, Some(span), message);
    }

    pub fn error(&self, span: Span, message: impl Into<String>) {
        self.report(Severity::Error, Some(span), message);
    }

    /// Records the diagnostic and hands back the `FatalError` to return.
    #[must_use]
    pub fn fatal(&self, span: Span, message: impl Into<String>) -> FatalError {
        self.report(Severity::Fatal, Some(span), message);
        FatalError
    }

    #[must_use]
    pub fn fatal_no_location(&self, message: impl Into<String>) -> FatalError {
        self.report(Severity::Fatal, None, message);
        FatalError
    }

    /// True when an `Error` or `Fatal` diagnostic was recorded; gates
    /// code emission.
    pub fn has_errors(&self) -> bool {
        self.error_count.get() > 0
    }

    /// True when any diagnostic at all was recorded; drives the exit
    /// status.
    pub fn any_reported(&self) -> bool {
        self.any_reported.get()
    }

    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.diagnostics.borrow_mut())
    }
}
