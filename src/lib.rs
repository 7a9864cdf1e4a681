#![forbid(unsafe_code)]
//! Compiler and evaluator for user-defined spectral model expressions.
//!
//! A user-defined model is declared as a single text expression over an
//! energy variable, named parameters, and references to other registered
//! model components. [`CompiledExpression::init`] lexes, classifies,
//! validates, and lowers such an expression to postfix form once;
//! [`CompiledExpression::evaluate`] then runs the compiled form repeatedly
//! against different energy grids, parameter values, and spectrum numbers
//! without re-parsing.
//!
//! The registry of available model components and the reader for
//! `atable{}`/`mtable{}`/`etable{}` file references are both owned by the
//! embedding application; this crate only describes the interfaces it
//! consumes, as the [`ModelRegistry`] and [`TableModelReader`] traits.
//!
//! # Example
//! ```
//! use mdef_expr::{CompiledExpression, ComponentInfo, ComponentType, ModelFn, ModelRegistry, TableInfo, TableModelReader, MdefError};
//!
//! struct EmptyRegistry;
//! impl ModelRegistry for EmptyRegistry {
//!     fn is_exact_match(&self, _name: &str) -> bool { false }
//!     fn component_info(&self, _name: &str) -> Option<ComponentInfo> { None }
//!     fn number_parameters(&self, _name: &str) -> Option<usize> { None }
//!     fn has_function_pointer(&self, _name: &str) -> bool { false }
//!     fn function_pointer(&self, _name: &str) -> Option<ModelFn> { None }
//! }
//! impl TableModelReader for EmptyRegistry {
//!     fn table_info(&self, filename: &str) -> Result<TableInfo, MdefError> {
//!         Err(MdefError::TableFileNotFound { filename: filename.to_string() })
//!     }
//!     fn interpolate(&self, _e: &[f64], _params: &[f64], _filename: &str, _spectrum_number: i32, _flux: &mut [f64], _flux_err: &mut [f64], _init_string: &str, _table_type: ComponentType, _interp_log: bool) -> Result<(), MdefError> {
//!         unimplemented!()
//!     }
//! }
//!
//! let mut expr = CompiledExpression::new(0.1, 10.0, ComponentType::Add, "linmod");
//! expr.init("2*e+p", false, &EmptyRegistry, &EmptyRegistry).unwrap();
//!
//! let e = [1.0, 2.0, 3.0];
//! let mut flux = Vec::new();
//! let mut flux_err = Vec::new();
//! expr.evaluate(&e, &[5.0], 1, &mut flux, &mut flux_err, "", &EmptyRegistry, &EmptyRegistry).unwrap();
//! assert_eq!(flux, vec![8.0, 10.0]);
//! ```

mod classifier;
mod error;
mod evaluator;
mod expression;
mod lexer;
mod math;
mod operators;
mod registry;
mod shunting_yard;
mod tags;
mod validator;

pub use error::{MdefError, Severity, Span};
pub use expression::CompiledExpression;
pub use registry::{ComponentInfo, ComponentType, ModelFn, ModelRegistry, TableInfo, TableModelReader};
pub use tags::ElementTag;
