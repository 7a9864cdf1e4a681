//! Infix classifier: walks the coalesced token stream and produces the
//! typed element sequence plus the operand/operator side-tables.

use crate::error::{MdefError, Span};
use crate::lexer::{RawKind, RawToken};
use crate::registry::{ComponentType, ModelRegistry};
use crate::operators::OperatorTable;
use crate::tags::ElementTag;

/// Output of classification: the parallel sequences that become part of
/// [`crate::expression::CompiledExpression`] once validated and lowered.
#[derive(Debug, Clone, Default)]
pub struct ClassifiedInfix {
    /// Typed element sequence.
    pub infix_elements: Vec<ElementTag>,
    /// Operator/function/model names, in lockstep with name-owning elements.
    pub operators: Vec<String>,
    /// Numeric constants, in lockstep with `Num` elements.
    pub numerical_consts: Vec<f64>,
    /// Unique parameter names in first-occurrence order.
    pub distinct_parameter_names: Vec<String>,
    /// Index into `distinct_parameter_names`, one per `Param` occurrence.
    pub parameter_indices: Vec<usize>,
    /// Source-token index of each `Param` occurrence, for external remapping.
    pub parameter_token_indices: Vec<usize>,
    /// Lowercased names of other user-defined models this expression calls.
    pub using_other_mdefs: Vec<String>,
    /// Whether any referenced model is spectrum-dependent, or a table model is present.
    pub calls_spec_dependent_functions: bool,
}

fn word_text(tok: &RawToken) -> Option<&str> {
    match &tok.kind {
        RawKind::Word(w) => Some(w.as_str()),
        _ => None,
    }
}

fn tok_tag(tok: &RawToken) -> Option<ElementTag> {
    match &tok.kind {
        RawKind::LParen => Some(ElementTag::LParen),
        RawKind::RParen => Some(ElementTag::RParen),
        RawKind::Comma => Some(ElementTag::Comma),
        _ => None,
    }
}

/// Classify a coalesced token stream into the infix element sequence and
/// side-tables.
///
/// # Errors
/// Returns [`MdefError::InvalidParameterName`] for a word that is neither a
/// math operator, a registered model, a table-model reference, nor a valid
/// parameter name. Returns [`MdefError::TrailingNumberExpected`] if a
/// trailing numeric-token run cannot be folded into a single constant.
pub fn classify(tokens: &[RawToken], component_type: ComponentType, registry: &dyn ModelRegistry) -> Result<ClassifiedInfix, MdefError> {
    let table = OperatorTable::global();
    let mut out = ClassifiedInfix::default();
    let mut prev_tag: Option<ElementTag> = None;
    let mut i = 0usize;

    while i < tokens.len() {
        let tok = &tokens[i];
        let tag = match &tok.kind {
            RawKind::Number(value) => {
                out.numerical_consts.push(*value);
                ElementTag::Num
            }
            RawKind::Plus => ElementTag::Oper,
            RawKind::Star => ElementTag::Oper,
            RawKind::Slash => ElementTag::Oper,
            RawKind::Caret => ElementTag::Oper,
            RawKind::Minus => ElementTag::Oper,
            RawKind::LParen | RawKind::RParen | RawKind::Comma => tok_tag(tok).expect("matched bracket/comma kind"),
            RawKind::LBrace | RawKind::RBrace => return Err(MdefError::UnbalancedBraces { span: Some(Span::at(tok.offset)) }),
            RawKind::Word(raw_word) => classify_word(raw_word, component_type, registry, table, &mut out, i)?,
        };

        // Record the operator text for name-owning, single-char arithmetic
        // tokens (words are handled inside `classify_word`).
        if matches!(tok.kind, RawKind::Plus | RawKind::Minus | RawKind::Star | RawKind::Slash | RawKind::Caret) {
            let is_unary_minus = matches!(tok.kind, RawKind::Minus) && (prev_tag.is_none() || matches!(prev_tag, Some(ElementTag::LParen | ElementTag::Oper | ElementTag::Comma)));
            let name = if is_unary_minus {
                "@"
            } else {
                match tok.kind {
                    RawKind::Plus => "+",
                    RawKind::Minus => "-",
                    RawKind::Star => "*",
                    RawKind::Slash => "/",
                    RawKind::Caret => "^",
                    _ => unreachable!(),
                }
            };
            out.operators.push(name.to_string());
        }

        // Implied multiplication before `(` following an eng/param/num/rparen.
        if matches!(tok.kind, RawKind::LParen) && matches!(prev_tag, Some(ElementTag::RParen | ElementTag::Eng | ElementTag::EngC | ElementTag::Param | ElementTag::Num)) {
            out.infix_elements.push(ElementTag::Oper);
            out.operators.push("*".to_string());
        }

        out.infix_elements.push(tag);

        // Implied multiplication after `)` when the next token is a word.
        if matches!(tok.kind, RawKind::RParen) {
            if let Some(next) = tokens.get(i + 1) {
                if word_text(next).is_some() {
                    out.infix_elements.push(ElementTag::Oper);
                    out.operators.push("*".to_string());
                }
            }
        }

        prev_tag = Some(tag);
        i += 1;
    }

    if out.infix_elements.is_empty() {
        return Err(MdefError::EmptyExpression);
    }

    Ok(out)
}

#[allow(clippy::too_many_lines)]
fn classify_word(
    raw_word: &str,
    component_type: ComponentType,
    registry: &dyn ModelRegistry,
    table: &OperatorTable,
    out: &mut ClassifiedInfix,
    token_index: usize,
) -> Result<ElementTag, MdefError> {
    // `.e` / `.E` escape back to the absolute energy axis inside a
    // convolution expression; bare `e`/`E` is the convolution-offset axis there.
    if raw_word == ".e" || raw_word == ".E" {
        return Ok(ElementTag::Eng);
    }
    if raw_word == "e" || raw_word == "E" {
        return Ok(if component_type == ComponentType::Con { ElementTag::EngC } else { ElementTag::Eng });
    }

    let lower = raw_word.to_ascii_lowercase();
    if let Some(def) = table.lookup(&lower) {
        out.operators.push(lower.clone());
        return Ok(match def.arity {
            crate::operators::Arity::Unary => ElementTag::UFunc,
            crate::operators::Arity::Binary => ElementTag::BFunc,
        });
    }

    if registry.is_exact_match(raw_word) {
        let info = registry.component_info(raw_word).ok_or_else(|| MdefError::Internal(format!("registry reported a match for '{raw_word}' but returned no info")))?;
        out.operators.push(info.canonical_name.clone());
        if info.is_user_defined {
            out.using_other_mdefs.push(raw_word.to_ascii_lowercase());
        }
        if info.is_spectrum_dependent {
            out.calls_spec_dependent_functions = true;
        }
        return Ok(if info.declared_type == ComponentType::Con { ElementTag::ConXsModel } else { ElementTag::XsModel });
    }

    let is_table_ref = (raw_word.starts_with("atable") || raw_word.starts_with("mtable") || raw_word.starts_with("etable")) && raw_word.len() > 6;
    if is_table_ref {
        out.operators.push(raw_word.to_string());
        out.calls_spec_dependent_functions = true;
        return Ok(ElementTag::TableModel);
    }

    let valid_param_name = raw_word.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_') || raw_word.contains(':');
    if !valid_param_name {
        return Err(MdefError::InvalidParameterName { name: raw_word.to_string(), span: None });
    }

    let param_index = match out.distinct_parameter_names.iter().position(|n| n == raw_word) {
        Some(idx) => idx,
        None => {
            out.distinct_parameter_names.push(raw_word.to_string());
            out.distinct_parameter_names.len() - 1
        }
    };
    out.parameter_indices.push(param_index);
    out.parameter_token_indices.push(token_index);
    Ok(ElementTag::Param)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::scan;
    use crate::registry::{ComponentInfo, ModelFn, TableInfo, TableModelReader};
    use quickcheck::Arbitrary;

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
        fn table_info(&self, _filename: &str) -> Result<TableInfo, MdefError> {
            Err(MdefError::TableFileNotFound { filename: _filename.to_string() })
        }
        fn interpolate(&self, _e: &[f64], _params: &[f64], _filename: &str, _spectrum_number: i32, _flux: &mut [f64], _flux_err: &mut [f64], _init_string: &str, _table_type: ComponentType, _interp_log: bool) -> Result<(), MdefError> {
            unimplemented!()
        }
    }

    #[test]
    fn classifies_energy_and_parameter() {
        let tokens = scan("2*e + p").unwrap();
        let classified = classify(&tokens, ComponentType::Add, &EmptyRegistry).unwrap();
        assert_eq!(classified.infix_elements, vec![ElementTag::Num, ElementTag::Oper, ElementTag::Eng, ElementTag::Oper, ElementTag::Param]);
        assert_eq!(classified.distinct_parameter_names, vec!["p".to_string()]);
    }

    #[test]
    fn energy_is_offset_axis_inside_convolution() {
        let tokens = scan("e").unwrap();
        let classified = classify(&tokens, ComponentType::Con, &EmptyRegistry).unwrap();
        assert_eq!(classified.infix_elements, vec![ElementTag::EngC]);
    }

    #[test]
    fn dot_e_escapes_to_absolute_energy() {
        let tokens = scan(".e").unwrap();
        let classified = classify(&tokens, ComponentType::Con, &EmptyRegistry).unwrap();
        assert_eq!(classified.infix_elements, vec![ElementTag::Eng]);
    }

    #[test]
    fn unary_minus_is_reclassified() {
        let tokens = scan("-e^2").unwrap();
        let classified = classify(&tokens, ComponentType::Add, &EmptyRegistry).unwrap();
        assert_eq!(classified.operators[0], "@");
    }

    #[test]
    fn implied_multiplication_before_paren() {
        let tokens = scan("2(e)").unwrap();
        let classified = classify(&tokens, ComponentType::Add, &EmptyRegistry).unwrap();
        assert_eq!(classified.infix_elements, vec![ElementTag::Num, ElementTag::Oper, ElementTag::LParen, ElementTag::Eng, ElementTag::RParen]);
    }

    #[test]
    fn qualified_parameter_name_is_accepted() {
        let tokens = scan("1:p").unwrap();
        let classified = classify(&tokens, ComponentType::Add, &EmptyRegistry).unwrap();
        assert_eq!(classified.infix_elements, vec![ElementTag::Param]);
        assert_eq!(classified.distinct_parameter_names, vec!["1:p".to_string()]);
    }

    #[test]
    fn invalid_parameter_name_is_rejected() {
        let tokens = scan("#").unwrap();
        let result = classify(&tokens, ComponentType::Add, &EmptyRegistry);
        assert!(matches!(result, Err(MdefError::InvalidParameterName { .. })));
    }

    /// A small fully-parenthesized arithmetic AST, used by the property test
    /// below to generate syntactically unambiguous input strings.
    #[derive(Debug, Clone)]
    enum Node {
        Num(u8),
        Eng,
        Param,
        Bin(Box<Node>, char, Box<Node>),
    }

    impl Node {
        fn render(&self) -> String {
            match self {
                Node::Num(n) => format!("{n}.0"),
                Node::Eng => "e".to_string(),
                Node::Param => "p".to_string(),
                Node::Bin(l, op, r) => format!("({}{op}{})", l.render(), r.render()),
            }
        }
    }

    impl quickcheck::Arbitrary for Node {
        fn arbitrary(g: &mut quickcheck::Gen) -> Self {
            let depth = g.size().min(4);
            arbitrary_node(g, depth)
        }
    }

    fn arbitrary_node(g: &mut quickcheck::Gen, depth: usize) -> Node {
        if depth == 0 {
            return match u8::arbitrary(g) % 3 {
                0 => Node::Num(u8::arbitrary(g) % 10),
                1 => Node::Eng,
                _ => Node::Param,
            };
        }
        match u8::arbitrary(g) % 4 {
            0 => Node::Num(u8::arbitrary(g) % 10),
            1 => Node::Eng,
            2 => Node::Param,
            _ => {
                let op = ['+', '-', '*', '/'][(u8::arbitrary(g) % 4) as usize];
                Node::Bin(Box::new(arbitrary_node(g, depth - 1)), op, Box::new(arbitrary_node(g, depth - 1)))
            }
        }
    }

    #[test]
    fn operator_count_matches_name_owning_elements() {
        fn prop(node: Node) -> bool {
            let text = node.render();
            let Ok(tokens) = scan(&text) else { return true };
            let Ok(classified) = classify(&tokens, ComponentType::Add, &EmptyRegistry) else { return true };
            let owning = classified.infix_elements.iter().filter(|t| t.owns_operator_name()).count();
            classified.operators.len() == owning
        }
        quickcheck::QuickCheck::new().tests(200).quickcheck(prop as fn(Node) -> bool);
    }
}
