//! Scalar math functions backing the operator table (`operators.rs`).
//!
//! This module centralizes every unary/binary function the operator table
//! can dispatch to, organized by category for maintainability.
//!
//! # Academic References
//!
//! - **DLMF**: NIST Digital Library of Mathematical Functions <https://dlmf.nist.gov>
//! - **A&S**: Abramowitz & Stegun, "Handbook of Mathematical Functions" (1964)
//! - Lanczos, C. "A Precision Approximation of the Gamma Function" (1964)
//!
//! # Domain Validation
//!
//! `gamma` returns `None` at non-positive-integer poles; the operator table
//! maps a `None` to `f64::NAN` rather than rejecting the expression, matching
//! the "IEEE-754 nonfinite value, caller may post-check" policy for domain
//! errors in arithmetic operators.

/// Polynomial functions (`legendre2..legendre5`).
pub mod polynomials;
/// Special mathematical functions (`erf`, `erfc`, `gamma`).
pub mod special;

pub use polynomials::eval_legendre;
pub use special::{eval_erf, eval_erfc, eval_gamma};

/// Unit step: `1.0` for `x >= 0`, else `0.0`.
pub fn heaviside(x: f64) -> f64 {
    if x >= 0.0 { 1.0 } else { 0.0 }
}

/// Signum returning an exact zero at `x == 0.0`, unlike [`f64::signum`].
pub fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Positive difference `max(a - b, 0.0)`.
pub fn dim(a: f64, b: f64) -> f64 {
    (a - b).max(0.0)
}

/// Symmetric window: `1.0` where `|a| <= b`, else `0.0`.
pub fn boxcar(a: f64, b: f64) -> f64 {
    if a.abs() <= b { 1.0 } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heaviside_and_sign() {
        assert_eq!(heaviside(-1.0), 0.0);
        assert_eq!(heaviside(0.0), 1.0);
        assert_eq!(sign(-3.0), -1.0);
        assert_eq!(sign(0.0), 0.0);
        assert_eq!(sign(3.0), 1.0);
    }

    #[test]
    fn dim_and_boxcar() {
        assert_eq!(dim(5.0, 3.0), 2.0);
        assert_eq!(dim(3.0, 5.0), 0.0);
        assert_eq!(boxcar(1.0, 2.0), 1.0);
        assert_eq!(boxcar(3.0, 2.0), 0.0);
    }
}
