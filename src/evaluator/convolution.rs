//! Convolution evaluation paths: the general per-bin convolution evaluator
//! (§4.6.2) and the single-convolution fast path (§4.6.3).

use super::{table_declared_type, table_filename, EvalContext};
use crate::error::MdefError;
use crate::operators::{Arity, OperatorTable};
use crate::registry::{ComponentType, ModelRegistry, TableModelReader};
use crate::shunting_yard::Postfix;
use crate::tags::ElementTag;

/// Whether `postfix` is eligible for the single-convolution fast path: no
/// `Eng`/`EngC` element, every non-final operator is a plain math operator,
/// and the final element is an `Oper` naming a registered convolution model.
#[must_use]
pub fn is_fast_path_eligible(postfix: &Postfix, registry: &dyn ModelRegistry) -> bool {
    if postfix.postfix_elements.iter().any(|t| matches!(t, ElementTag::Eng | ElementTag::EngC)) {
        return false;
    }
    let Some(&last_tag) = postfix.postfix_elements.last() else {
        return false;
    };
    if last_tag != ElementTag::Oper {
        return false;
    }
    let table = OperatorTable::global();
    let oper_names = &postfix.operators;
    if oper_names.is_empty() {
        return false;
    }
    let non_final_names = &oper_names[..oper_names.len() - 1];
    if non_final_names.iter().any(|n| table.lookup(n).is_none()) {
        return false;
    }
    let Some(final_name) = oper_names.last() else {
        return false;
    };
    registry.component_info(final_name).is_some_and(|info| info.declared_type == ComponentType::Con)
}

/// Evaluate via the single-convolution fast path.
///
/// # Errors
/// Returns [`MdefError::Internal`] on stack underflow or an inconsistent registry.
pub fn evaluate_fast_path(postfix: &Postfix, numerical_consts: &[f64], parameter_indices: &[usize], parameters: &[f64], registry: &dyn ModelRegistry, ctx: &EvalContext<'_>) -> Result<(Vec<f64>, Vec<f64>), MdefError> {
    let table = OperatorTable::global();
    let mut stack: Vec<f64> = Vec::new();
    let mut num_pos = 0usize;
    let mut par_pos = 0usize;
    let mut operator_idx = 0usize;
    let n = postfix.postfix_elements.len();

    for (idx, &tag) in postfix.postfix_elements.iter().enumerate() {
        let is_final = idx == n - 1;
        match tag {
            ElementTag::Num => {
                stack.push(numerical_consts[num_pos]);
                num_pos += 1;
            }
            ElementTag::Param => {
                stack.push(parameters[parameter_indices[par_pos]]);
                par_pos += 1;
            }
            ElementTag::Oper if !is_final => {
                let name = postfix.operators[operator_idx].clone();
                operator_idx += 1;
                let def = table.lookup(&name).ok_or_else(|| MdefError::Internal(format!("fast path encountered non-math operator '{name}'")))?;
                match def.arity {
                    Arity::Unary => {
                        let mut one = [*stack.last().ok_or_else(|| MdefError::Internal("fast path stack underflow".to_string()))?];
                        def.apply_unary(&mut one);
                        *stack.last_mut().expect("checked non-empty above") = one[0];
                    }
                    Arity::Binary => {
                        let b = stack.pop().ok_or_else(|| MdefError::Internal("fast path stack underflow".to_string()))?;
                        let a_val = *stack.last().ok_or_else(|| MdefError::Internal("fast path stack underflow".to_string()))?;
                        let mut a_arr = [a_val];
                        def.apply_binary(&mut a_arr, &[b]);
                        *stack.last_mut().expect("checked non-empty above") = a_arr[0];
                    }
                }
            }
            ElementTag::Oper => {
                let name = postfix.operators.last().ok_or_else(|| MdefError::Internal("fast path has no final operator name".to_string()))?.clone();
                let n_pars = registry.number_parameters(&name).ok_or_else(|| MdefError::Internal(format!("registry lost parameter count for '{name}'")))?;
                if stack.len() < n_pars {
                    return Err(MdefError::Internal(format!("fast path stack underflow collecting parameters for '{name}'")));
                }
                let mut params: Vec<f64> = stack.split_off(stack.len() - n_pars);
                let callable = registry.function_pointer(&name).ok_or_else(|| MdefError::Internal(format!("registry has no callable for '{name}'")))?;
                let mut flux = vec![0.0; ctx.n_bins];
                let mut flux_err = vec![0.0; ctx.n_bins];
                callable(ctx.e, &params, ctx.spectrum_number, &mut flux, &mut flux_err, ctx.init_string);
                params.clear();
                return Ok((flux, flux_err));
            }
            ElementTag::Eng | ElementTag::EngC | ElementTag::LParen | ElementTag::RParen | ElementTag::Comma | ElementTag::UFunc | ElementTag::BFunc | ElementTag::XsModel | ElementTag::ConXsModel | ElementTag::TableModel => {
                return Err(MdefError::Internal("fast path postfix sequence contained a non-scalar element".to_string()));
            }
        }
    }
    Err(MdefError::Internal("fast path postfix sequence had no final operator".to_string()))
}

/// Evaluate via the general per-bin convolution evaluator.
///
/// `flux` is both input (the flux array produced upstream) and output.
///
/// # Errors
/// Returns [`MdefError::InvalidBinLayout`] if `flux.len() != ctx.n_bins`, or
/// [`MdefError::Internal`] on stack underflow / a per-bin stack that does
/// not reduce to exactly one element.
pub fn evaluate_general_convolution(
    postfix: &Postfix,
    numerical_consts: &[f64],
    parameter_indices: &[usize],
    parameters: &[f64],
    flux: &mut [f64],
    registry: &dyn ModelRegistry,
    table_reader: &dyn TableModelReader,
    ctx: &EvalContext<'_>,
) -> Result<(), MdefError> {
    if flux.len() != ctx.n_bins {
        return Err(MdefError::InvalidBinLayout { msg: format!("flux array length {} does not match n_bins {}", flux.len(), ctx.n_bins) });
    }
    let table = OperatorTable::global();
    let mut conv_flux = vec![0.0; ctx.n_bins];

    for i in 0..ctx.n_bins {
        let conv_engs: Vec<f64> = ctx.avg_engs.iter().map(|a| ctx.avg_engs[i] - a).collect();
        let mut stack: Vec<Vec<f64>> = Vec::new();
        let mut num_pos = 0usize;
        let mut par_pos = 0usize;
        let mut operator_idx = 0usize;
        let mut j = 0usize;
        let elements = &postfix.postfix_elements;

        while j < elements.len() {
            match elements[j] {
                ElementTag::Eng => stack.push(ctx.avg_engs.clone()),
                ElementTag::EngC => stack.push(conv_engs.clone()),
                ElementTag::Num => {
                    stack.push(ctx.broadcast(numerical_consts[num_pos]));
                    num_pos += 1;
                }
                ElementTag::Param => {
                    stack.push(ctx.broadcast(parameters[parameter_indices[par_pos]]));
                    par_pos += 1;
                }
                ElementTag::Oper => {
                    let name = postfix.operators[operator_idx].clone();
                    operator_idx += 1;
                    let skipped = evaluate_bin_operator(&name, &mut stack, table, registry, table_reader, ctx)?;
                    if skipped && j + 1 < elements.len() && elements[j + 1] == ElementTag::Oper {
                        operator_idx += 1;
                        j += 1;
                    }
                }
                ElementTag::LParen | ElementTag::RParen | ElementTag::Comma | ElementTag::UFunc | ElementTag::BFunc | ElementTag::XsModel | ElementTag::ConXsModel | ElementTag::TableModel => {
                    return Err(MdefError::Internal("postfix sequence must contain only Eng/EngC/Num/Param/Oper".to_string()));
                }
            }
            j += 1;
        }

        if stack.len() != 1 {
            return Err(MdefError::Internal(format!("per-bin convolution stack ended with {} elements at bin {i}, expected 1", stack.len())));
        }
        let fact = stack.pop().expect("checked len == 1 above");
        let mut sum = 0.0;
        for k in 0..ctx.n_bins {
            sum += flux[k] * fact[k] * ctx.bin_widths[i];
        }
        conv_flux[i] = sum;
    }

    flux.copy_from_slice(&conv_flux);
    Ok(())
}

/// Evaluate one operator within a single bin's postfix pass. Returns `true`
/// if the immediately-following operator in the postfix stream must be
/// skipped (the residual implicit multiplication the direct model
/// invocation already accounts for).
fn evaluate_bin_operator(name: &str, stack: &mut Vec<Vec<f64>>, table: &OperatorTable, registry: &dyn ModelRegistry, table_reader: &dyn TableModelReader, ctx: &EvalContext<'_>) -> Result<bool, MdefError> {
    if name == "mean" {
        let arr = stack.last_mut().ok_or_else(|| MdefError::Internal("stack underflow evaluating mean".to_string()))?;
        let mean = arr.iter().sum::<f64>() / arr.len() as f64;
        arr.iter_mut().for_each(|v| *v = mean);
        return Ok(false);
    }

    if let Some(def) = table.lookup(name) {
        match def.arity {
            Arity::Unary => {
                let arr = stack.last_mut().ok_or_else(|| MdefError::Internal(format!("stack underflow evaluating unary operator '{name}'")))?;
                def.apply_unary(arr);
            }
            Arity::Binary => {
                let b = stack.pop().ok_or_else(|| MdefError::Internal(format!("stack underflow evaluating binary operator '{name}'")))?;
                let a = stack.last_mut().ok_or_else(|| MdefError::Internal(format!("stack underflow evaluating binary operator '{name}'")))?;
                def.apply_binary(a, &b);
            }
        }
        return Ok(false);
    }

    if registry.is_exact_match(name) {
        let info = registry.component_info(name).ok_or_else(|| MdefError::Internal(format!("registry lost info for '{name}' mid-evaluation")))?;
        let n_pars = registry.number_parameters(name).ok_or_else(|| MdefError::Internal(format!("registry lost parameter count for '{name}' mid-evaluation")))?;
        let mut params = Vec::with_capacity(n_pars);
        for _ in 0..n_pars {
            let arr = stack.pop().ok_or_else(|| MdefError::Internal(format!("stack underflow popping parameters for '{name}'")))?;
            params.push(arr[0]);
        }
        params.reverse();
        let callable = registry.function_pointer(name).ok_or_else(|| MdefError::Internal(format!("registry has no callable for '{name}'")))?;
        let mut flux_err = ctx.broadcast(0.0);

        if info.declared_type == ComponentType::Con {
            let mut flux_in = stack.pop().ok_or_else(|| MdefError::Internal(format!("stack underflow popping input flux for sub-convolution '{name}'")))?;
            for (f, w) in flux_in.iter_mut().zip(ctx.bin_widths.iter()) {
                *f *= w;
            }
            callable(ctx.e, &params, ctx.spectrum_number, &mut flux_in, &mut flux_err, ctx.init_string);
            for (f, w) in flux_in.iter_mut().zip(ctx.bin_widths.iter()) {
                *f /= w;
            }
            stack.push(flux_in);
        } else {
            let mut mod_flux = ctx.broadcast(0.0);
            callable(ctx.e, &params, ctx.spectrum_number, &mut mod_flux, &mut flux_err, ctx.init_string);
            if matches!(info.declared_type, ComponentType::Add | ComponentType::Mix) {
                for (f, w) in mod_flux.iter_mut().zip(ctx.bin_widths.iter()) {
                    *f /= w;
                }
            }
            stack.push(mod_flux);
        }
        return Ok(true);
    }

    if name.starts_with("atable") || name.starts_with("mtable") || name.starts_with("etable") {
        let filename = table_filename(name);
        let table_type = table_declared_type(name);
        let info = table_reader.table_info(filename)?;
        let n_pars = info.n_pars + usize::from(info.is_redshift) + usize::from(info.is_escale);
        let mut params = Vec::with_capacity(n_pars);
        for _ in 0..n_pars {
            let arr = stack.pop().ok_or_else(|| MdefError::Internal(format!("stack underflow popping parameters for '{name}'")))?;
            params.push(arr[0]);
        }
        params.reverse();
        let mut mod_flux = ctx.broadcast(0.0);
        let mut flux_err = ctx.broadcast(0.0);
        table_reader.interpolate(ctx.e, &params, filename, ctx.spectrum_number, &mut mod_flux, &mut flux_err, ctx.init_string, table_type, info.interp_log)?;
        if table_type == ComponentType::Add {
            for (f, w) in mod_flux.iter_mut().zip(ctx.bin_widths.iter()) {
                *f /= w;
            }
        }
        stack.push(mod_flux);
        return Ok(true);
    }

    log::warn!("unresolved operator/model name '{name}' during convolution evaluation; substituting zero array");
    stack.push(ctx.broadcast(0.0));
    Ok(false)
}
