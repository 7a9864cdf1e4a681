//! Infix validator: checks bracket pairing, call-site comma arity, and
//! comma nesting depth against the classified element sequence.

use crate::classifier::ClassifiedInfix;
use crate::error::{MdefError, Span};
use crate::registry::{ModelRegistry, TableModelReader};
use crate::tags::ElementTag;

struct Frame {
    /// `Some(name)` for a function/model call scope (owns an expected comma
    /// count); `None` for a bare grouping parenthesis.
    name: Option<String>,
    expected_commas: usize,
    seen_commas: usize,
}

fn table_filename(name: &str) -> &str {
    let open = name.find('{').unwrap_or(name.len());
    let close = name.rfind('}').unwrap_or(name.len());
    if open + 1 <= close { &name[open + 1..close] } else { "" }
}

fn expected_commas_for(
    tag: ElementTag,
    name: &str,
    registry: &dyn ModelRegistry,
    table_reader: &dyn TableModelReader,
) -> Result<usize, MdefError> {
    match tag {
        ElementTag::UFunc => Ok(0),
        ElementTag::BFunc => Ok(1),
        ElementTag::XsModel | ElementTag::ConXsModel => {
            let n = registry.number_parameters(name).ok_or_else(|| MdefError::Internal(format!("registry lost parameter count for '{name}' after classification")))?;
            Ok(n.saturating_sub(1))
        }
        ElementTag::TableModel => {
            let filename = table_filename(name);
            let info = table_reader.table_info(filename)?;
            let total = info.n_pars + usize::from(info.is_redshift) + usize::from(info.is_escale);
            Ok(total.saturating_sub(1))
        }
        _ => Ok(0),
    }
}

/// Validate a classified infix sequence.
///
/// # Errors
/// Returns [`MdefError::MissingOpenParen`] if a function/model name is not
/// immediately followed by `(`; [`MdefError::CommaCountMismatch`] if a call's
/// comma count does not match its declared arity; [`MdefError::CommaWrongDepth`]
/// if a comma appears outside any comma-owning scope; [`MdefError::UnbalancedBraces`]
/// if parentheses are unbalanced.
pub fn validate(classified: &ClassifiedInfix, registry: &dyn ModelRegistry, table_reader: &dyn TableModelReader) -> Result<(), MdefError> {
    let elements = &classified.infix_elements;
    let mut stack: Vec<Frame> = Vec::new();
    let mut operator_idx = 0usize;
    let mut j = 0usize;

    while j < elements.len() {
        let tag = elements[j];
        if tag.owns_operator_name() {
            let name = classified.operators.get(operator_idx).cloned().unwrap_or_default();
            operator_idx += 1;
            if matches!(tag, ElementTag::UFunc | ElementTag::BFunc | ElementTag::XsModel | ElementTag::ConXsModel | ElementTag::TableModel) {
                if elements.get(j + 1) != Some(&ElementTag::LParen) {
                    return Err(MdefError::MissingOpenParen { name });
                }
                let expected_commas = expected_commas_for(tag, &name, registry, table_reader)?;
                stack.push(Frame { name: Some(name), expected_commas, seen_commas: 0 });
                j += 2;
                continue;
            }
            // Oper: a plain arithmetic/math operator site, owns a name but
            // opens no bracket scope of its own.
            j += 1;
            continue;
        }

        match tag {
            ElementTag::LParen => {
                stack.push(Frame { name: None, expected_commas: 0, seen_commas: 0 });
                j += 1;
            }
            ElementTag::RParen => {
                let frame = stack.pop().ok_or(MdefError::UnbalancedBraces { span: Some(Span::at(j)) })?;
                if let Some(name) = frame.name {
                    if frame.seen_commas != frame.expected_commas {
                        return Err(MdefError::CommaCountMismatch { name });
                    }
                }
                j += 1;
            }
            ElementTag::Comma => {
                match stack.last_mut() {
                    Some(frame) if frame.name.is_some() => frame.seen_commas += 1,
                    Some(_) | None => {
                        let owner = stack.iter().rev().find_map(|f| f.name.clone()).unwrap_or_else(|| "<top-level>".to_string());
                        return Err(MdefError::CommaWrongDepth { name: owner });
                    }
                }
                j += 1;
            }
            _ => j += 1,
        }
    }

    if !stack.is_empty() {
        return Err(MdefError::UnbalancedBraces { span: None });
    }
    Ok(())
}
