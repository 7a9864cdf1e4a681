//! Process-wide, lazily-built table of arithmetic and math operators.
//!
//! Mirrors the host project's pattern of a single [`std::sync::OnceLock`]-backed
//! static registry populated once on first lookup (see the function registry
//! this crate's math library descends from).

use std::sync::OnceLock;

use rustc_hash::FxHashMap;

use crate::math;

/// Number of operands an operator/function consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Applies in place to a single array.
    Unary,
    /// Consumes two arrays, writing the result into the first.
    Binary,
}

/// A single entry in the operator table: arity, precedence, and the
/// in-place array applier.
pub struct OperatorDef {
    /// Canonical, lowercase name.
    pub name: &'static str,
    /// Arity (1 or 2).
    pub arity: Arity,
    /// Precedence used by the shunting-yard transformer. Arithmetic: `+`/`-`/`@` = 0,
    /// `*`/`/` = 1, `^` = 2 (right-associative). Math functions carry no
    /// meaningful precedence of their own; they are always pushed with the
    /// shunting-yard sentinel precedence `-1` by the transformer, not looked
    /// up here.
    pub precedence: i32,
    unary_fn: Option<fn(f64) -> f64>,
    binary_fn: Option<fn(f64, f64) -> f64>,
}

impl OperatorDef {
    /// Apply a unary operator in place to every element of `arr`.
    ///
    /// # Panics
    /// Panics if called on a binary-arity entry; callers dispatch on
    /// [`OperatorDef::arity`] first.
    pub fn apply_unary(&self, arr: &mut [f64]) {
        let f = self.unary_fn.expect("apply_unary called on a binary operator");
        for v in arr {
            *v = f(*v);
        }
    }

    /// Apply a binary operator elementwise, writing into `a` (the first
    /// operand); `b` is the second (top-of-stack) operand.
    ///
    /// # Panics
    /// Panics if called on a unary-arity entry, or if `a.len() != b.len()`.
    pub fn apply_binary(&self, a: &mut [f64], b: &[f64]) {
        assert_eq!(a.len(), b.len(), "binary operator array length mismatch");
        let f = self.binary_fn.expect("apply_binary called on a unary operator");
        for (x, y) in a.iter_mut().zip(b.iter()) {
            *x = f(*x, *y);
        }
    }
}

fn unary(name: &'static str, precedence: i32, f: fn(f64) -> f64) -> OperatorDef {
    OperatorDef { name, arity: Arity::Unary, precedence, unary_fn: Some(f), binary_fn: None }
}

fn binary(name: &'static str, precedence: i32, f: fn(f64, f64) -> f64) -> OperatorDef {
    OperatorDef { name, arity: Arity::Binary, precedence, unary_fn: None, binary_fn: Some(f) }
}

fn op_ln(x: f64) -> f64 {
    x.ln()
}
fn op_log10(x: f64) -> f64 {
    x.log10()
}
fn op_int(x: f64) -> f64 {
    x.trunc()
}
fn op_sind(x: f64) -> f64 {
    x.to_radians().sin()
}
fn op_cosd(x: f64) -> f64 {
    x.to_radians().cos()
}
fn op_tand(x: f64) -> f64 {
    x.to_radians().tan()
}
fn op_sinhd(x: f64) -> f64 {
    x.to_radians().sinh()
}
fn op_coshd(x: f64) -> f64 {
    x.to_radians().cosh()
}
fn op_tanhd(x: f64) -> f64 {
    x.to_radians().tanh()
}
fn op_gamma(x: f64) -> f64 {
    math::eval_gamma(x).unwrap_or(f64::NAN)
}
fn op_legendre2(x: f64) -> f64 {
    math::eval_legendre(2, x)
}
fn op_legendre3(x: f64) -> f64 {
    math::eval_legendre(3, x)
}
fn op_legendre4(x: f64) -> f64 {
    math::eval_legendre(4, x)
}
fn op_legendre5(x: f64) -> f64 {
    math::eval_legendre(5, x)
}
fn op_neg(x: f64) -> f64 {
    -x
}
fn identity(x: f64) -> f64 {
    x
}
fn op_add(a: f64, b: f64) -> f64 {
    a + b
}
fn op_sub(a: f64, b: f64) -> f64 {
    a - b
}
fn op_mul(a: f64, b: f64) -> f64 {
    a * b
}
fn op_div(a: f64, b: f64) -> f64 {
    a / b
}
fn op_pow(a: f64, b: f64) -> f64 {
    a.powf(b)
}

/// Process-wide operator table. Provides `lookup(name) -> Option<&OperatorDef>`.
pub struct OperatorTable {
    entries: FxHashMap<&'static str, OperatorDef>,
}

impl OperatorTable {
    /// Look up an operator or function by its canonical (case-folded for
    /// functions) name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&OperatorDef> {
        self.entries.get(name)
    }

    /// Precedence of `name`, if it is a known entry.
    #[must_use]
    pub fn precedence(&self, name: &str) -> Option<i32> {
        self.lookup(name).map(|def| def.precedence)
    }

    /// Access the process-wide table, building it on first use.
    #[must_use]
    pub fn global() -> &'static OperatorTable {
        static TABLE: OnceLock<OperatorTable> = OnceLock::new();
        TABLE.get_or_init(build_operator_table)
    }
}

fn build_operator_table() -> OperatorTable {
    let defs = [
        // Arithmetic
        binary("+", 0, op_add),
        binary("-", 0, op_sub),
        unary("@", 0, op_neg),
        binary("*", 1, op_mul),
        binary("/", 1, op_div),
        binary("^", 2, op_pow),
        // Unary math functions. Precedence is unused for these (the
        // transformer always pushes them with sentinel precedence -1) but a
        // value is still recorded for completeness of the table contract.
        unary("exp", -1, f64::exp),
        unary("sin", -1, f64::sin),
        unary("sind", -1, op_sind),
        unary("cos", -1, f64::cos),
        unary("cosd", -1, op_cosd),
        unary("tan", -1, f64::tan),
        unary("tand", -1, op_tand),
        unary("sinh", -1, f64::sinh),
        unary("sinhd", -1, op_sinhd),
        unary("cosh", -1, f64::cosh),
        unary("coshd", -1, op_coshd),
        unary("tanh", -1, f64::tanh),
        unary("tanhd", -1, op_tanhd),
        unary("log", -1, op_log10),
        unary("ln", -1, op_ln),
        unary("sqrt", -1, f64::sqrt),
        unary("abs", -1, f64::abs),
        unary("int", -1, op_int),
        unary("sign", -1, math::sign),
        unary("heaviside", -1, math::heaviside),
        unary("asin", -1, f64::asin),
        unary("acos", -1, f64::acos),
        unary("atan", -1, f64::atan),
        unary("asinh", -1, f64::asinh),
        unary("acosh", -1, f64::acosh),
        unary("atanh", -1, f64::atanh),
        unary("mean", -1, identity), // `mean` is an array-level reduction handled specially by the evaluator, not elementwise
        unary("erf", -1, math::eval_erf),
        unary("erfc", -1, math::eval_erfc),
        unary("gamma", -1, op_gamma),
        unary("legendre2", -1, op_legendre2),
        unary("legendre3", -1, op_legendre3),
        unary("legendre4", -1, op_legendre4),
        unary("legendre5", -1, op_legendre5),
        // Binary math functions
        binary("max", -1, f64::max),
        binary("min", -1, f64::min),
        binary("atan2", -1, f64::atan2),
        binary("dim", -1, math::dim),
        binary("smin", -1, f64::min),
        binary("smax", -1, f64::max),
        binary("boxcar", -1, math::boxcar),
    ];
    let mut entries = FxHashMap::default();
    entries.reserve(defs.len());
    for def in defs {
        entries.insert(def.name, def);
    }
    OperatorTable { entries }
}

/// Whether `name` is a math operator (arithmetic, unary, or binary function)
/// as opposed to a spectral-model or table-model name.
#[must_use]
pub fn is_math_operator(name: &str) -> bool {
    OperatorTable::global().lookup(name).is_some()
}
