//! Error types for the expression compiler and evaluator.
//!
//! This module provides:
//! - [`MdefError`] — the error enum for all compilation/evaluation failures
//! - [`Span`] — source location tracking for precise error messages
//! - [`Severity`] — the user/internal error classification

use std::fmt;

/// Source location span for error reporting.
/// Represents a range of characters in the input string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    start: usize,
    end: usize,
}

impl Span {
    /// Create a new span. If `end < start`, they are swapped.
    #[inline]
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        if end < start {
            Span { start: end, end: start }
        } else {
            Span { start, end }
        }
    }

    /// Create a span covering a single position.
    #[inline]
    #[must_use]
    pub fn at(pos: usize) -> Self {
        Span { start: pos, end: pos + 1 }
    }

    /// Format the span for display (1-indexed for users).
    #[must_use]
    pub fn display(&self) -> String {
        if self.end <= self.start {
            String::new()
        } else if self.end - self.start == 1 {
            format!(" at position {}", self.start + 1)
        } else {
            format!(" at positions {}-{}", self.start + 1, self.end)
        }
    }
}

/// The severity classes described in the error-handling design: a user error
/// aborts compilation/evaluation with a message, an internal error indicates
/// an invariant violation that should never occur on validated input.
/// Warnings are not represented here since they never abort anything — call
/// sites log them with `log::warn!` and substitute a zero array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Recoverable failure caused by malformed input.
    User,
    /// Invariant violation; should never occur on expressions that passed
    /// validation.
    Internal,
}

/// Errors that can occur during compilation and evaluation of a spectral
/// model expression.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum MdefError {
    /// The input formula was empty or contained only whitespace.
    EmptyExpression,
    /// Braces in an `atable{}`/`mtable{}`/`etable{}` reference were unbalanced.
    UnbalancedBraces {
        /// Location of the opening brace.
        span: Option<Span>,
    },
    /// A character outside the valid input set was encountered.
    InvalidCharacter {
        /// The offending character.
        ch: char,
        /// Location of the character.
        span: Option<Span>,
    },
    /// A parameter name failed the naming rule (must start with a letter or
    /// underscore, or contain `:`).
    InvalidParameterName {
        /// The rejected name.
        name: String,
        /// Location of the name.
        span: Option<Span>,
    },
    /// A function or model name was not immediately followed by `(`.
    MissingOpenParen {
        /// The function/model name.
        name: String,
    },
    /// The number of commas at a call site did not match the declared arity.
    CommaCountMismatch {
        /// The offending call's name.
        name: String,
    },
    /// A comma appeared at the wrong bracket depth relative to its owning call.
    CommaWrongDepth {
        /// The offending call's name.
        name: String,
    },
    /// A table-model file could not be resolved by the table reader.
    TableFileNotFound {
        /// The filename extracted from the `atable{}`/`mtable{}`/`etable{}` token.
        filename: String,
    },
    /// A numeric literal was expected at the end of the token stream but not
    /// found.
    TrailingNumberExpected,
    /// `n_bins < 1`, or a flux/error array length mismatch in the convolution
    /// evaluation path.
    InvalidBinLayout {
        /// Description of the mismatch.
        msg: String,
    },
    /// Stack underflow, or a non-unity final stack size during evaluation.
    /// Indicates a bug in compilation rather than malformed user input.
    Internal(String),
}

impl MdefError {
    /// Classify this error's severity per the error-handling design.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            MdefError::Internal(_) => Severity::Internal,
            MdefError::EmptyExpression
            | MdefError::UnbalancedBraces { .. }
            | MdefError::InvalidCharacter { .. }
            | MdefError::InvalidParameterName { .. }
            | MdefError::MissingOpenParen { .. }
            | MdefError::CommaCountMismatch { .. }
            | MdefError::CommaWrongDepth { .. }
            | MdefError::TableFileNotFound { .. }
            | MdefError::TrailingNumberExpected
            | MdefError::InvalidBinLayout { .. } => Severity::User,
        }
    }
}

impl fmt::Display for MdefError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MdefError::EmptyExpression => write!(f, "expression cannot be empty"),
            MdefError::UnbalancedBraces { span } => {
                write!(f, "unbalanced braces in table-model reference{}", span.map_or(String::new(), |s| s.display()))
            }
            MdefError::InvalidCharacter { ch, span } => {
                write!(f, "invalid character '{}'{}", ch, span.map_or(String::new(), |s| s.display()))
            }
            MdefError::InvalidParameterName { name, span } => {
                write!(
                    f,
                    "invalid parameter name '{}'{}: must start with a letter or underscore, or contain ':'",
                    name,
                    span.map_or(String::new(), |s| s.display())
                )
            }
            MdefError::MissingOpenParen { name } => {
                write!(f, "a '(' must follow the call to: {name}")
            }
            MdefError::CommaCountMismatch { name } => {
                write!(f, "extra commas detected in call to: {name}")
            }
            MdefError::CommaWrongDepth { name } => {
                write!(f, "comma at wrong bracket depth in call to: {name}")
            }
            MdefError::TableFileNotFound { filename } => {
                write!(f, "table-model file not found: {filename}")
            }
            MdefError::TrailingNumberExpected => {
                write!(f, "last symbol is not a number")
            }
            MdefError::InvalidBinLayout { msg } => write!(f, "invalid bin layout: {msg}"),
            MdefError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for MdefError {}
