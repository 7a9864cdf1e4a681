//! The element tag set shared by the infix sequence and the postfix sequence.

/// Tag classifying one element of the infix or postfix element sequence.
///
/// `UFunc`/`BFunc`/`XsModel`/`ConXsModel`/`TableModel`/`LParen`/`RParen`/`Comma`
/// appear only in the infix sequence; the postfix sequence contains only
/// `Eng`, `EngC`, `Num`, `Param`, `Oper`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementTag {
    /// Energy variable (bin midpoint).
    Eng,
    /// Convolution-offset energy variable (only meaningful inside a
    /// convolution-component expression).
    EngC,
    /// Numeric constant.
    Num,
    /// Reference to a named parameter.
    Param,
    /// Operator or function application site (postfix form of `UFunc`,
    /// `BFunc`, `XsModel`, `ConXsModel`, `TableModel`, or the internal `#`
    /// convolution-multiply rewrite).
    Oper,
    /// Unary math function marker (infix only).
    UFunc,
    /// Binary math function marker (infix only).
    BFunc,
    /// Opening parenthesis (infix only).
    LParen,
    /// Closing parenthesis (infix only).
    RParen,
    /// Argument separator (infix only).
    Comma,
    /// Additive/multiplicative spectral-model call (infix only).
    XsModel,
    /// Convolution spectral-model call (infix only).
    ConXsModel,
    /// Table-based spectral-model call (infix only).
    TableModel,
}

impl ElementTag {
    /// Whether this tag "owns a name" in the `operators` side-table, i.e. is
    /// consumed left-to-right in lockstep with operator/function names
    /// during classification and validation.
    #[must_use]
    pub fn owns_operator_name(self) -> bool {
        matches!(
            self,
            ElementTag::Oper | ElementTag::UFunc | ElementTag::BFunc | ElementTag::XsModel | ElementTag::ConXsModel | ElementTag::TableModel
        )
    }

    /// Human-readable tag name, used by diagnostics traces and tests.
    #[must_use]
    pub fn tag_name(self) -> &'static str {
        match self {
            ElementTag::Eng => "ENG",
            ElementTag::EngC => "ENGC",
            ElementTag::Num => "NUM",
            ElementTag::Param => "PARAM",
            ElementTag::Oper => "OPER",
            ElementTag::UFunc => "UFUNC",
            ElementTag::BFunc => "BFUNC",
            ElementTag::LParen => "LPAREN",
            ElementTag::RParen => "RPAREN",
            ElementTag::Comma => "COMMA",
            ElementTag::XsModel => "XSMODEL",
            ElementTag::ConXsModel => "CONXSMODEL",
            ElementTag::TableModel => "TABLEMODEL",
        }
    }
}
