//! Public facade: the immutable compiled-expression value and its
//! construction/evaluation entry points.

use crate::classifier::classify;
use crate::error::MdefError;
use crate::evaluator::convolution::{evaluate_fast_path, evaluate_general_convolution, is_fast_path_eligible};
use crate::evaluator::{evaluate_ordinary, EvalContext};
use crate::lexer::{coalesce_table_models, scan};
use crate::registry::{ComponentType, ModelRegistry, TableModelReader};
use crate::shunting_yard::to_postfix;
use crate::tags::ElementTag;
use crate::validator::validate;

/// A compiled user-defined spectral model expression. Immutable after
/// [`CompiledExpression::init`]; safe to evaluate repeatedly, and from
/// multiple threads provided the supplied registry/table reader are
/// themselves safe for concurrent read access.
#[derive(Debug, Clone, Default)]
pub struct CompiledExpression {
    infix_elements: Vec<ElementTag>,
    postfix_elements: Vec<ElementTag>,
    operators: Vec<String>,
    numerical_consts: Vec<f64>,
    distinct_parameter_names: Vec<String>,
    parameter_indices: Vec<usize>,
    parameter_token_indices: Vec<usize>,
    e_low: f64,
    e_high: f64,
    component_type: ComponentType,
    using_other_mdefs: Vec<String>,
    model_name: String,
    calls_spec_dependent_functions: bool,
}

impl CompiledExpression {
    /// Construct an uncompiled expression value. Call [`CompiledExpression::init`]
    /// to parse and compile `expr_string` before evaluating.
    #[must_use]
    pub fn new(e_low: f64, e_high: f64, component_type: ComponentType, model_name: &str) -> Self {
        CompiledExpression { e_low, e_high, component_type, model_name: model_name.to_string(), ..CompiledExpression::default() }
    }

    /// Parse, validate, and lower `expr_string` to postfix form.
    ///
    /// If `remove_whitespace` is true, whitespace is stripped from the input
    /// before lexing (whitespace is otherwise already insignificant to the
    /// lexer, so this only affects table-model filenames, which may
    /// legitimately contain no whitespace in any case — the flag is honored
    /// for parity with callers that pre-trim less carefully).
    ///
    /// # Errors
    /// Propagates any [`MdefError`] raised while lexing, classifying,
    /// validating, or lowering the expression.
    pub fn init(&mut self, expr_string: &str, remove_whitespace: bool, registry: &dyn ModelRegistry, table_reader: &dyn TableModelReader) -> Result<(), MdefError> {
        let trimmed = expr_string.trim();
        if trimmed.is_empty() {
            return Err(MdefError::EmptyExpression);
        }
        let owned;
        let text: &str = if remove_whitespace {
            owned = expr_string.chars().filter(|c| !c.is_whitespace()).collect::<String>();
            &owned
        } else {
            expr_string
        };

        let raw_tokens = scan(text)?;
        let coalesced = coalesce_table_models(text, raw_tokens)?;
        let classified = classify(&coalesced, self.component_type, registry)?;
        validate(&classified, registry, table_reader)?;
        let postfix = to_postfix(&classified, registry);

        self.infix_elements = classified.infix_elements;
        self.postfix_elements = postfix.postfix_elements;
        self.operators = postfix.operators;
        self.numerical_consts = classified.numerical_consts;
        self.distinct_parameter_names = classified.distinct_parameter_names;
        self.parameter_indices = classified.parameter_indices;
        self.parameter_token_indices = classified.parameter_token_indices;
        self.using_other_mdefs = classified.using_other_mdefs;
        self.calls_spec_dependent_functions = classified.calls_spec_dependent_functions;
        Ok(())
    }

    /// Evaluate this compiled expression against an energy grid, parameter
    /// vector, and spectrum number, writing results into `flux`/`flux_err`.
    ///
    /// # Errors
    /// Returns [`MdefError::InvalidBinLayout`] if `e` has fewer than 2 entries.
    /// Returns [`MdefError::Internal`] if the postfix sequence was malformed
    /// (an invariant that a successfully-[`init`](Self::init)ed expression
    /// always satisfies).
    /// For `Add`/`Mul`/`Mix`/`Pileup`/`Acn` expressions, `flux`/`flux_err`
    /// are output-only and are resized to the bin count. For `Con`
    /// expressions, `flux` is both input (the spectrum produced by the
    /// inner model this convolution wraps) and output, and must already
    /// have length `e.len() - 1`.
    #[allow(clippy::too_many_arguments)]
    pub fn evaluate(&self, e: &[f64], parameters: &[f64], spectrum_number: i32, flux: &mut Vec<f64>, flux_err: &mut Vec<f64>, init_string: &str, registry: &dyn ModelRegistry, table_reader: &dyn TableModelReader) -> Result<(), MdefError> {
        let ctx = EvalContext::new(e, spectrum_number, init_string)?;
        let postfix = crate::shunting_yard::Postfix { postfix_elements: self.postfix_elements.clone(), operators: self.operators.clone() };

        if self.component_type != ComponentType::Con {
            let (result_flux, result_flux_err) = evaluate_ordinary(&postfix, &self.numerical_consts, &self.parameter_indices, parameters, self.component_type, registry, table_reader, &ctx)?;
            *flux = result_flux;
            *flux_err = result_flux_err;
            return Ok(());
        }

        if is_fast_path_eligible(&postfix, registry) {
            let (result_flux, result_flux_err) = evaluate_fast_path(&postfix, &self.numerical_consts, &self.parameter_indices, parameters, registry, &ctx)?;
            *flux = result_flux;
            *flux_err = result_flux_err;
            return Ok(());
        }

        if flux.len() != ctx.n_bins {
            return Err(MdefError::InvalidBinLayout { msg: format!("flux array length {} does not match n_bins {}", flux.len(), ctx.n_bins) });
        }
        evaluate_general_convolution(&postfix, &self.numerical_consts, &self.parameter_indices, parameters, flux, registry, table_reader, &ctx)?;
        flux_err.resize(ctx.n_bins, 0.0);
        Ok(())
    }

    /// Unique parameter names, in first-occurrence order.
    #[must_use]
    pub fn distinct_parameter_names(&self) -> &[String] {
        &self.distinct_parameter_names
    }

    /// Lowercased names of other user-defined models this expression calls.
    #[must_use]
    pub fn using_other_mdefs(&self) -> &[String] {
        &self.using_other_mdefs
    }

    /// Whether any referenced model is spectrum-dependent, or a table model is present.
    #[must_use]
    pub fn calls_spec_dependent_functions(&self) -> bool {
        self.calls_spec_dependent_functions
    }

    /// Declared component type.
    #[must_use]
    pub fn component_type(&self) -> ComponentType {
        self.component_type
    }

    /// Declared lower energy bound.
    #[must_use]
    pub fn e_low(&self) -> f64 {
        self.e_low
    }

    /// Declared upper energy bound.
    #[must_use]
    pub fn e_high(&self) -> f64 {
        self.e_high
    }

    /// Display name.
    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// The postfix element tag sequence (for diagnostics).
    #[must_use]
    pub fn postfix_elements(&self) -> &[ElementTag] {
        &self.postfix_elements
    }

    /// The infix element tag sequence (for diagnostics).
    #[must_use]
    pub fn infix_elements(&self) -> &[ElementTag] {
        &self.infix_elements
    }
}
