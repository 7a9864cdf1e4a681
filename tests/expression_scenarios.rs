//! End-to-end scenarios exercising `CompiledExpression` against an
//! in-memory registry and table reader, with no models or table files
//! actually registered except where a scenario calls for one.

use std::sync::{Mutex, OnceLock};

use mdef_expr::{ComponentInfo, ComponentType, MdefError, ModelFn, ModelRegistry, TableInfo, TableModelReader};
use mdef_expr::CompiledExpression;

/// Registry with no components and no table files; used for the pure
/// arithmetic scenarios.
struct EmptyRegistry;

impl ModelRegistry for EmptyRegistry {
    fn is_exact_match(&self, _name: &str) -> bool {
        false
    }
    fn component_info(&self, _name: &str) -> Option<ComponentInfo> {
        None
    }
    fn number_parameters(&self, _name: &str) -> Option<usize> {
        None
    }
    fn has_function_pointer(&self, _name: &str) -> bool {
        false
    }
    fn function_pointer(&self, _name: &str) -> Option<ModelFn> {
        None
    }
}

impl TableModelReader for EmptyRegistry {
    fn table_info(&self, filename: &str) -> Result<TableInfo, MdefError> {
        Err(MdefError::TableFileNotFound { filename: filename.to_string() })
    }
    fn interpolate(
        &self,
        _e: &[f64],
        _params: &[f64],
        _filename: &str,
        _spectrum_number: i32,
        _flux: &mut [f64],
        _flux_err: &mut [f64],
        _init_string: &str,
        _table_type: ComponentType,
        _interp_log: bool,
    ) -> Result<(), MdefError> {
        unimplemented!()
    }
}

fn invocation_log() -> &'static Mutex<Vec<Vec<f64>>> {
    static LOG: OnceLock<Mutex<Vec<Vec<f64>>>> = OnceLock::new();
    LOG.get_or_init(|| Mutex::new(Vec::new()))
}

/// The single registered model callable used by the convolution scenario.
/// Records its parameter vector on every call so the test can assert both
/// the call count and the values the fast path derived for it.
fn convmod_callable(_e: &[f64], params: &[f64], _spectrum_number: i32, flux: &mut [f64], flux_err: &mut [f64], _init_string: &str) {
    invocation_log().lock().expect("invocation log mutex poisoned").push(params.to_vec());
    flux.fill(1.0);
    flux_err.fill(0.0);
}

/// Registry exposing a single registered convolution model, `convmod`.
struct ConvolutionRegistry;

impl ModelRegistry for ConvolutionRegistry {
    fn is_exact_match(&self, name: &str) -> bool {
        name == "convmod"
    }
    fn component_info(&self, name: &str) -> Option<ComponentInfo> {
        (name == "convmod").then(|| ComponentInfo {
            canonical_name: "convmod".to_string(),
            declared_type: ComponentType::Con,
            is_user_defined: false,
            is_spectrum_dependent: false,
        })
    }
    fn number_parameters(&self, name: &str) -> Option<usize> {
        (name == "convmod").then_some(2)
    }
    fn has_function_pointer(&self, name: &str) -> bool {
        name == "convmod"
    }
    fn function_pointer(&self, name: &str) -> Option<ModelFn> {
        (name == "convmod").then_some(convmod_callable as ModelFn)
    }
}

impl TableModelReader for ConvolutionRegistry {
    fn table_info(&self, filename: &str) -> Result<TableInfo, MdefError> {
        Err(MdefError::TableFileNotFound { filename: filename.to_string() })
    }
    fn interpolate(
        &self,
        _e: &[f64],
        _params: &[f64],
        _filename: &str,
        _spectrum_number: i32,
        _flux: &mut [f64],
        _flux_err: &mut [f64],
        _init_string: &str,
        _table_type: ComponentType,
        _interp_log: bool,
    ) -> Result<(), MdefError> {
        unimplemented!()
    }
}

fn compile(expr: &str, component_type: ComponentType) -> Result<CompiledExpression, MdefError> {
    let mut compiled = CompiledExpression::new(0.1, 10.0, component_type, "scenario");
    compiled.init(expr, false, &EmptyRegistry, &EmptyRegistry)?;
    Ok(compiled)
}

#[test]
fn bare_energy_variable_integrates_to_bin_width_times_midpoint() {
    let compiled = compile("e", ComponentType::Add).expect("compiles");
    let e = [1.0, 2.0, 4.0];
    let mut flux = Vec::new();
    let mut flux_err = Vec::new();
    compiled.evaluate(&e, &[], 1, &mut flux, &mut flux_err, "", &EmptyRegistry, &EmptyRegistry).expect("evaluates");
    assert_eq!(flux, vec![1.5, 6.0]);
}

#[test]
fn linear_expression_with_one_parameter() {
    let compiled = compile("2*e + p", ComponentType::Add).expect("compiles");
    assert_eq!(compiled.distinct_parameter_names(), &["p".to_string()]);

    let e = [0.0, 1.0, 2.0];
    let mut flux = Vec::new();
    let mut flux_err = Vec::new();
    compiled.evaluate(&e, &[0.5], 1, &mut flux, &mut flux_err, "", &EmptyRegistry, &EmptyRegistry).expect("evaluates");
    assert_eq!(flux, vec![1.5, 3.5]);
}

#[test]
fn negated_square_binds_negation_outside_the_power() {
    let compiled = compile("-e^2", ComponentType::Add).expect("compiles");
    let e = [1.0, 2.0];
    let mut flux = Vec::new();
    let mut flux_err = Vec::new();
    compiled.evaluate(&e, &[], 1, &mut flux, &mut flux_err, "", &EmptyRegistry, &EmptyRegistry).expect("evaluates");
    assert_eq!(flux, vec![-2.25]);
}

#[test]
fn binary_max_function_call() {
    let compiled = compile("max(e, 3)", ComponentType::Add).expect("compiles");
    let e = [1.0, 2.0, 4.0, 8.0];
    let mut flux = Vec::new();
    let mut flux_err = Vec::new();
    compiled.evaluate(&e, &[], 1, &mut flux, &mut flux_err, "", &EmptyRegistry, &EmptyRegistry).expect("evaluates");
    assert_eq!(flux, vec![3.0, 6.0, 24.0]);
}

#[test]
fn division_between_word_operands_is_not_swallowed_into_one_word() {
    let compiled = compile("(e/p)", ComponentType::Add).expect("compiles");
    assert_eq!(compiled.distinct_parameter_names(), &["p".to_string()]);

    let e = [1.0, 3.0];
    let mut flux = Vec::new();
    let mut flux_err = Vec::new();
    compiled.evaluate(&e, &[2.0], 1, &mut flux, &mut flux_err, "", &EmptyRegistry, &EmptyRegistry).expect("evaluates");
    // avg_eng = 2.0, bin width = 2.0: (2.0 / 2.0) * 2.0 = 2.0
    assert_eq!(flux, vec![2.0]);
}

#[test]
fn top_level_comma_is_rejected() {
    let result = compile("a + b, a", ComponentType::Add);
    let err = result.expect_err("a top-level comma is not inside any call");
    assert_eq!(err.severity(), mdef_expr::Severity::User);
    assert!(matches!(err, MdefError::CommaCountMismatch { .. } | MdefError::CommaWrongDepth { .. }));
}

#[test]
fn bare_function_name_without_parens_is_rejected() {
    let result = compile("sin", ComponentType::Add);
    assert!(matches!(result, Err(MdefError::MissingOpenParen { name }) if name == "sin"));
}

#[test]
fn convolution_fast_path_invokes_model_exactly_once_with_derived_parameters() {
    invocation_log().lock().expect("invocation log mutex poisoned").clear();

    let mut compiled = CompiledExpression::new(0.1, 10.0, ComponentType::Con, "convolved");
    compiled.init("convmod(2*p1, p2)", false, &ConvolutionRegistry, &ConvolutionRegistry).expect("compiles");
    assert_eq!(compiled.distinct_parameter_names(), &["p1".to_string(), "p2".to_string()]);

    let e = [1.0, 2.0, 3.0];
    let mut flux = Vec::new();
    let mut flux_err = Vec::new();
    compiled
        .evaluate(&e, &[5.0, 7.0], 1, &mut flux, &mut flux_err, "", &ConvolutionRegistry, &ConvolutionRegistry)
        .expect("evaluates");

    let calls = invocation_log().lock().expect("invocation log mutex poisoned");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0], vec![10.0, 7.0]);
}
