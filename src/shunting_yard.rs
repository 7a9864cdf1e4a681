//! Shunting-yard transformer: lowers the validated infix element sequence
//! to postfix, reordering operator names and rewriting the convolution
//! multiply into the distinguished `#` operator.

use crate::classifier::ClassifiedInfix;
use crate::operators::OperatorTable;
use crate::registry::{ComponentType, ModelRegistry};
use crate::tags::ElementTag;

/// Postfix form of a classified, validated infix sequence.
#[derive(Debug, Clone, Default)]
pub struct Postfix {
    /// Postfix element tags, restricted to `Eng`, `EngC`, `Num`, `Param`, `Oper`.
    pub postfix_elements: Vec<ElementTag>,
    /// Operator names, reordered to match `postfix_elements`' `Oper` occurrences.
    pub operators: Vec<String>,
}

struct StackEntry {
    precedence: i32,
    name: String,
}

/// Lower a validated infix sequence to postfix.
///
/// `component_type` and `registry` are consulted to detect when a `RParen`
/// closes a call to a registered convolution model, in which case the next
/// emitted `*` is rewritten to `#`.
#[must_use]
pub fn to_postfix(classified: &ClassifiedInfix, registry: &dyn ModelRegistry) -> Postfix {
    let table = OperatorTable::global();
    let elements = &classified.infix_elements;
    let mut operator_idx = 0usize;
    let mut stack: Vec<StackEntry> = Vec::new();
    let mut out = Postfix::default();
    let mut rewrite_next_multiply = false;
    let mut j = 0usize;

    while j < elements.len() {
        let tag = elements[j];
        match tag {
            ElementTag::Eng | ElementTag::EngC | ElementTag::Num | ElementTag::Param => {
                out.postfix_elements.push(tag);
                j += 1;
            }
            ElementTag::Oper => {
                let name = classified.operators[operator_idx].clone();
                operator_idx += 1;
                let precedence = table.precedence(&name).unwrap_or(0);
                let effective_name = if rewrite_next_multiply && name == "*" {
                    rewrite_next_multiply = false;
                    "#".to_string()
                } else {
                    name
                };
                while let Some(top) = stack.last() {
                    let stop_for_right_assoc = effective_name == "^" && top.precedence == precedence;
                    if top.precedence >= precedence && !stop_for_right_assoc {
                        let popped = stack.pop().expect("checked non-empty by while-let");
                        out.postfix_elements.push(ElementTag::Oper);
                        out.operators.push(popped.name);
                    } else {
                        break;
                    }
                }
                stack.push(StackEntry { precedence, name: effective_name });
                j += 1;
            }
            ElementTag::UFunc | ElementTag::BFunc | ElementTag::XsModel | ElementTag::ConXsModel | ElementTag::TableModel => {
                let name = classified.operators[operator_idx].clone();
                operator_idx += 1;
                stack.push(StackEntry { precedence: -1, name });
                // Skip the LParen the classifier guaranteed follows.
                j += 2;
            }
            ElementTag::LParen => {
                stack.push(StackEntry { precedence: -1, name: String::new() });
                j += 1;
            }
            ElementTag::RParen => {
                let mut closed_name = String::new();
                while let Some(top) = stack.pop() {
                    if top.precedence == -1 {
                        closed_name = top.name;
                        break;
                    }
                    out.postfix_elements.push(ElementTag::Oper);
                    out.operators.push(top.name);
                }
                if !closed_name.is_empty() {
                    if let Some(info) = registry.component_info(&closed_name) {
                        if info.declared_type == ComponentType::Con {
                            rewrite_next_multiply = true;
                        }
                    }
                    out.postfix_elements.push(ElementTag::Oper);
                    out.operators.push(closed_name);
                }
                j += 1;
            }
            ElementTag::Comma => {
                while let Some(top) = stack.last() {
                    if top.precedence == -1 {
                        break;
                    }
                    let popped = stack.pop().expect("checked non-empty by while-let");
                    out.postfix_elements.push(ElementTag::Oper);
                    out.operators.push(popped.name);
                }
                j += 1;
            }
        }
    }

    while let Some(top) = stack.pop() {
        if top.name.is_empty() {
            continue;
        }
        out.postfix_elements.push(ElementTag::Oper);
        out.operators.push(top.name);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use crate::lexer::scan;
    use crate::registry::{ComponentInfo, ModelFn, TableInfo, TableModelReader};
    use crate::error::MdefError;
    use quickcheck::Arbitrary;

    struct FakeRegistry;
    impl ModelRegistry for FakeRegistry {
        fn is_exact_match(&self, name: &str) -> bool {
            name == "cflux"
        }
        fn component_info(&self, name: &str) -> Option<ComponentInfo> {
            (name == "cflux").then(|| ComponentInfo { canonical_name: "cflux".to_string(), declared_type: ComponentType::Con, is_user_defined: false, is_spectrum_dependent: false })
        }
        fn number_parameters(&self, name: &str) -> Option<usize> {
            (name == "cflux").then_some(3)
        }
        fn has_function_pointer(&self, _name: &str) -> bool {
            true
        }
        fn function_pointer(&self, _name: &str) -> Option<ModelFn> {
            None
        }
    }
    impl TableModelReader for FakeRegistry {
        fn table_info(&self, filename: &str) -> Result<TableInfo, MdefError> {
            Err(MdefError::TableFileNotFound { filename: filename.to_string() })
        }
        fn interpolate(&self, _e: &[f64], _params: &[f64], _filename: &str, _spectrum_number: i32, _flux: &mut [f64], _flux_err: &mut [f64], _init_string: &str, _table_type: ComponentType, _interp_log: bool) -> Result<(), MdefError> {
            unimplemented!()
        }
    }

    #[test]
    fn converts_simple_sum() {
        let tokens = scan("2*e+p").unwrap();
        let classified = classify(&tokens, ComponentType::Add, &FakeRegistry).unwrap();
        let postfix = to_postfix(&classified, &FakeRegistry);
        assert_eq!(postfix.postfix_elements, vec![ElementTag::Num, ElementTag::Eng, ElementTag::Oper, ElementTag::Param, ElementTag::Oper]);
        assert_eq!(postfix.operators, vec!["*".to_string(), "+".to_string()]);
    }

    #[test]
    fn right_associative_power() {
        let tokens = scan("2^3^4").unwrap();
        let classified = classify(&tokens, ComponentType::Add, &FakeRegistry).unwrap();
        let postfix = to_postfix(&classified, &FakeRegistry);
        assert_eq!(postfix.operators, vec!["^".to_string(), "^".to_string()]);
    }

    #[test]
    fn convolution_call_rewrites_following_multiply() {
        let tokens = scan("cflux(a,b,c)*e").unwrap();
        let classified = classify(&tokens, ComponentType::Add, &FakeRegistry).unwrap();
        let postfix = to_postfix(&classified, &FakeRegistry);
        assert!(postfix.operators.contains(&"#".to_string()));
        assert!(!postfix.operators.contains(&"*".to_string()));
    }

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
            arbitrary_node(g, g.size().min(4))
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

    /// Testable property 1 (postfix half): the number of `Oper` elements in
    /// the lowered postfix sequence equals the reordered operator list's length.
    #[test]
    fn postfix_operator_count_matches_oper_elements() {
        fn prop(node: Node) -> bool {
            let text = node.render();
            let Ok(tokens) = scan(&text) else { return true };
            let Ok(classified) = classify(&tokens, ComponentType::Add, &FakeRegistry) else { return true };
            let postfix = to_postfix(&classified, &FakeRegistry);
            let oper_count = postfix.postfix_elements.iter().filter(|t| **t == ElementTag::Oper).count();
            oper_count == postfix.operators.len()
        }
        quickcheck::QuickCheck::new().tests(200).quickcheck(prop as fn(Node) -> bool);
    }
}
