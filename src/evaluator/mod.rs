//! Postfix stack-machine evaluator.
//!
//! [`evaluate_ordinary`] implements the ordinary evaluation path (§4.6.1).
//! The general convolution evaluator and the single-convolution fast path
//! live in [`convolution`].

pub mod convolution;

use crate::error::MdefError;
use crate::operators::{Arity, OperatorTable};
use crate::registry::{ComponentType, ModelFn, ModelRegistry, TableModelReader};
use crate::shunting_yard::Postfix;
use crate::tags::ElementTag;

/// Per-call evaluation context: the energy grid and everything derived from it.
pub struct EvalContext<'a> {
    /// Bin-edge energies, length `n_bins + 1`.
    pub e: &'a [f64],
    /// Bin-midpoint energies, length `n_bins`.
    pub avg_engs: Vec<f64>,
    /// Absolute bin widths, length `n_bins`.
    pub bin_widths: Vec<f64>,
    /// Number of bins.
    pub n_bins: usize,
    /// Current spectrum number.
    pub spectrum_number: i32,
    /// Initialization string passed through to model callables.
    pub init_string: &'a str,
}

impl<'a> EvalContext<'a> {
    /// Build a context from an energy-edge array.
    ///
    /// # Errors
    /// Returns [`MdefError::InvalidBinLayout`] if `e` has fewer than 2 entries.
    pub fn new(e: &'a [f64], spectrum_number: i32, init_string: &'a str) -> Result<Self, MdefError> {
        if e.len() < 2 {
            return Err(MdefError::InvalidBinLayout { msg: "energy-edge array must have at least 2 entries".to_string() });
        }
        let n_bins = e.len() - 1;
        let avg_engs: Vec<f64> = (0..n_bins).map(|i| (e[i + 1] + e[i]) / 2.0).collect();
        let bin_widths: Vec<f64> = (0..n_bins).map(|i| (e[i + 1] - e[i]).abs()).collect();
        Ok(EvalContext { e, avg_engs, bin_widths, n_bins, spectrum_number, init_string })
    }

    fn broadcast(&self, value: f64) -> Vec<f64> {
        vec![value; self.n_bins]
    }
}

fn table_filename(name: &str) -> &str {
    let open = name.find('{').unwrap_or(name.len());
    let close = name.rfind('}').unwrap_or(name.len());
    if open + 1 <= close { &name[open + 1..close] } else { "" }
}

fn table_declared_type(name: &str) -> ComponentType {
    if name.starts_with("mtable") || name.starts_with("etable") { ComponentType::Mul } else { ComponentType::Add }
}

struct DeferredConvolution {
    params: Vec<f64>,
    callable: ModelFn,
}

/// Evaluate a non-convolution (ordinary) compiled expression.
///
/// # Errors
/// Returns [`MdefError::Internal`] if the postfix sequence does not reduce
/// to exactly one result (an invariant that validated input always satisfies),
/// or if a registered model reports inconsistent metadata.
#[allow(clippy::too_many_arguments)]
pub fn evaluate_ordinary(
    postfix: &Postfix,
    numerical_consts: &[f64],
    parameter_indices: &[usize],
    parameters: &[f64],
    component_type: ComponentType,
    registry: &dyn ModelRegistry,
    table_reader: &dyn TableModelReader,
    ctx: &EvalContext<'_>,
) -> Result<(Vec<f64>, Vec<f64>), MdefError> {
    let table = OperatorTable::global();
    let mut stack: Vec<(Vec<f64>, bool)> = Vec::new();
    let mut deferred: Vec<DeferredConvolution> = Vec::new();
    let mut last_model_flux_err = ctx.broadcast(0.0);
    let mut num_pos = 0usize;
    let mut par_pos = 0usize;
    let mut operator_idx = 0usize;

    for &tag in &postfix.postfix_elements {
        match tag {
            ElementTag::Eng | ElementTag::EngC => stack.push((ctx.avg_engs.clone(), false)),
            ElementTag::Num => {
                stack.push((ctx.broadcast(numerical_consts[num_pos]), false));
                num_pos += 1;
            }
            ElementTag::Param => {
                let value = parameters[parameter_indices[par_pos]];
                stack.push((ctx.broadcast(value), false));
                par_pos += 1;
            }
            ElementTag::Oper => {
                let name = &postfix.operators[operator_idx];
                operator_idx += 1;
                evaluate_operator(name, registry, table_reader, table, ctx, &mut stack, &mut deferred, &mut last_model_flux_err)?;
            }
            ElementTag::LParen | ElementTag::RParen | ElementTag::Comma | ElementTag::UFunc | ElementTag::BFunc | ElementTag::XsModel | ElementTag::ConXsModel | ElementTag::TableModel => {
                return Err(MdefError::Internal("postfix sequence must contain only Eng/EngC/Num/Param/Oper".to_string()));
            }
        }
    }

    if stack.len() != 1 {
        return Err(MdefError::Internal(format!("evaluation stack ended with {} elements, expected 1", stack.len())));
    }
    let (mut flux, _mark) = stack.pop().expect("checked len == 1 above");
    if component_type == ComponentType::Add {
        for (f, w) in flux.iter_mut().zip(ctx.bin_widths.iter()) {
            *f *= w;
        }
    }
    Ok((flux, last_model_flux_err))
}

#[allow(clippy::too_many_arguments)]
fn evaluate_operator(
    name: &str,
    registry: &dyn ModelRegistry,
    table_reader: &dyn TableModelReader,
    table: &OperatorTable,
    ctx: &EvalContext<'_>,
    stack: &mut Vec<(Vec<f64>, bool)>,
    deferred: &mut Vec<DeferredConvolution>,
    last_model_flux_err: &mut Vec<f64>,
) -> Result<(), MdefError> {
    if name == "mean" {
        let (arr, _mark) = stack.last_mut().ok_or_else(|| MdefError::Internal("stack underflow evaluating mean".to_string()))?;
        let mean = arr.iter().sum::<f64>() / arr.len() as f64;
        arr.iter_mut().for_each(|v| *v = mean);
        return Ok(());
    }

    if name == "#" {
        let (mut flux_prime, mark) = stack.pop().ok_or_else(|| MdefError::Internal("stack underflow evaluating #".to_string()))?;
        let pending = deferred.pop().ok_or_else(|| MdefError::Internal("no deferred convolution model for #".to_string()))?;
        if mark {
            for (f, w) in flux_prime.iter_mut().zip(ctx.bin_widths.iter()) {
                *f *= w;
            }
        }
        let mut flux_err = ctx.broadcast(0.0);
        (pending.callable)(ctx.e, &pending.params, ctx.spectrum_number, &mut flux_prime, &mut flux_err, ctx.init_string);
        if mark {
            for (f, w) in flux_prime.iter_mut().zip(ctx.bin_widths.iter()) {
                *f /= w;
            }
        }
        *last_model_flux_err = flux_err;
        stack.push((flux_prime, mark));
        return Ok(());
    }

    if let Some(def) = table.lookup(name) {
        match def.arity {
            Arity::Unary => {
                let (arr, _mark) = stack.last_mut().ok_or_else(|| MdefError::Internal(format!("stack underflow evaluating unary operator '{name}'")))?;
                def.apply_unary(arr);
            }
            Arity::Binary => {
                let (b, mark_b) = stack.pop().ok_or_else(|| MdefError::Internal(format!("stack underflow evaluating binary operator '{name}'")))?;
                let (a, mark_a) = stack.last_mut().ok_or_else(|| MdefError::Internal(format!("stack underflow evaluating binary operator '{name}'")))?;
                def.apply_binary(a, &b);
                *mark_a = *mark_a || mark_b;
            }
        }
        return Ok(());
    }

    if registry.is_exact_match(name) {
        let info = registry.component_info(name).ok_or_else(|| MdefError::Internal(format!("registry lost info for '{name}' mid-evaluation")))?;
        let n_pars = registry.number_parameters(name).ok_or_else(|| MdefError::Internal(format!("registry lost parameter count for '{name}' mid-evaluation")))?;
        let mut params = Vec::with_capacity(n_pars);
        for _ in 0..n_pars {
            let (arr, _mark) = stack.pop().ok_or_else(|| MdefError::Internal(format!("stack underflow popping parameters for '{name}'")))?;
            params.push(arr[0]);
        }
        params.reverse();

        if info.declared_type == ComponentType::Con && !info.is_user_defined {
            let callable = registry.function_pointer(name).ok_or_else(|| MdefError::Internal(format!("registry has no callable for convolution model '{name}'")))?;
            deferred.push(DeferredConvolution { params, callable });
            return Ok(());
        }

        let callable = registry.function_pointer(name).ok_or_else(|| MdefError::Internal(format!("registry has no callable for model '{name}'")))?;
        let mut mod_flux = ctx.broadcast(0.0);
        let mut mod_flux_err = ctx.broadcast(0.0);
        callable(ctx.e, &params, ctx.spectrum_number, &mut mod_flux, &mut mod_flux_err, ctx.init_string);
        *last_model_flux_err = mod_flux_err;

        let divide_by_bin_width = if info.is_user_defined {
            info.declared_type != ComponentType::Mul && info.declared_type != ComponentType::Pileup
        } else {
            info.declared_type == ComponentType::Add
        };
        if divide_by_bin_width {
            for (f, w) in mod_flux.iter_mut().zip(ctx.bin_widths.iter()) {
                *f /= w;
            }
        }
        stack.push((mod_flux, divide_by_bin_width));
        return Ok(());
    }

    if name.starts_with("atable") || name.starts_with("mtable") || name.starts_with("etable") {
        let filename = table_filename(name);
        let table_type = table_declared_type(name);
        let info = table_reader.table_info(filename)?;
        let n_pars = info.n_pars + usize::from(info.is_redshift) + usize::from(info.is_escale);
        let mut params = Vec::with_capacity(n_pars);
        for _ in 0..n_pars {
            let (arr, _mark) = stack.pop().ok_or_else(|| MdefError::Internal(format!("stack underflow popping parameters for '{name}'")))?;
            params.push(arr[0]);
        }
        params.reverse();

        let mut mod_flux = ctx.broadcast(0.0);
        let mut mod_flux_err = ctx.broadcast(0.0);
        table_reader.interpolate(ctx.e, &params, filename, ctx.spectrum_number, &mut mod_flux, &mut mod_flux_err, ctx.init_string, table_type, info.interp_log)?;
        *last_model_flux_err = mod_flux_err;

        let divide_by_bin_width = table_type == ComponentType::Add;
        if divide_by_bin_width {
            for (f, w) in mod_flux.iter_mut().zip(ctx.bin_widths.iter()) {
                *f /= w;
            }
        }
        stack.push((mod_flux, divide_by_bin_width));
        return Ok(());
    }

    log::warn!("unresolved operator/model name '{name}' during evaluation; substituting zero array");
    stack.push((ctx.broadcast(0.0), false));
    Ok(())
}
