//! Semantic analysis: definition checks, type inference, and the
//! caching / nullability / left-recursion fixed points. Runs after
//! parsing; only `Settings` and rule types are mutated.

use crate::ast::{Expr, Grammar, NonterminalHandle};
use crate::error::ErrorAccumulator;

pub fn analyze(grammar: &mut Grammar, err: &ErrorAccumulator) {
    check_defined(grammar, err);
    infer_types(grammar, err);
    infer_caching(grammar);
    infer_nullability(grammar);
    check_left_recursion(grammar, err);
}

/// Every nonterminal was interned on first mention; one without a
/// defining rule is an error at that first mention. Undefined rules
/// are demoted to leaves so the fixed points below don't cascade
/// spurious reports onto their callers.
fn check_defined(grammar: &mut Grammar, err: &ErrorAccumulator) {
    for (_, nonterminal) in grammar.nonterminals.iter_mut() {
        if nonterminal.expr.is_none() {
            err.error(nonterminal.span, "rule not defined");
            nonterminal.settings.has_left_recursion = false;
            nonterminal.settings.can_accept_empty_string = false;
        }
    }
}

/// A rule with no annotation whose whole body is one unbound character
/// class returns that character; everything else defaults to void.
/// Binding a variable to a void rule is rejected.
fn infer_types(grammar: &mut Grammar, err: &ErrorAccumulator) {
    let handles: Vec<NonterminalHandle> = grammar.nonterminals.keys().collect();
    for handle in &handles {
        let nonterminal = &grammar.nonterminals[*handle];
        if nonterminal.ty.is_some() {
            continue;
        }
        let inferred = match &nonterminal.expr {
            Some(Expr::CharacterClass { variable: None, .. }) => grammar.char_type,
            _ => grammar.void_type,
        };
        grammar.nonterminals[*handle].ty = Some(inferred);
    }

    for handle in &handles {
        let Some(expr) = &grammar.nonterminals[*handle].expr else {
            continue;
        };
        expr.walk(&mut |node| {
            if let Expr::NonterminalRef {
                span,
                target,
                variable: Some(_),
            } = node
            {
                if grammar.types[grammar.rule_type(*target)].is_void {
                    err.error(*span, "variable not allowed on rule returning void");
                }
            }
        });
    }
}

/// Narrows `caching` from the all-true starting state until stable.
fn infer_caching(grammar: &mut Grammar) {
    loop {
        let mut changed = false;
        let handles: Vec<NonterminalHandle> = grammar.nonterminals.keys().collect();
        for handle in handles {
            let nonterminal = &grammar.nonterminals[handle];
            if !nonterminal.settings.caching {
                continue;
            }
            let caching = match &nonterminal.expr {
                Some(expr) => expr.default_needs_caching(),
                None => continue,
            };
            if !caching {
                grammar.nonterminals[handle].settings.caching = false;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

fn infer_nullability(grammar: &mut Grammar) {
    loop {
        let mut changed = false;
        let handles: Vec<NonterminalHandle> = grammar.nonterminals.keys().collect();
        for handle in handles {
            let nullable = match &grammar.nonterminals[handle].expr {
                Some(expr) => expr.can_accept_empty_string(grammar),
                None => continue,
            };
            let settings = &mut grammar.nonterminals[handle].settings;
            if settings.can_accept_empty_string != nullable {
                settings.can_accept_empty_string = nullable;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

/// Plain PEG evaluation of a left-recursive rule loops forever, so any
/// rule still flagged once the fixed point settles is rejected.
fn check_left_recursion(grammar: &mut Grammar, err: &ErrorAccumulator) {
    loop {
        let mut changed = false;
        let handles: Vec<NonterminalHandle> = grammar.nonterminals.keys().collect();
        for handle in handles {
            let recursive = match &grammar.nonterminals[handle].expr {
                Some(expr) => expr.has_left_recursion(grammar),
                None => continue,
            };
            let settings = &mut grammar.nonterminals[handle].settings;
            if settings.has_left_recursion != recursive {
                settings.has_left_recursion = recursive;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    for &handle in &grammar.order {
        let nonterminal = &grammar.nonterminals[handle];
        if nonterminal.expr.is_some() && nonterminal.settings.has_left_recursion {
            err.error(nonterminal.span, "left-recursive rule");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_grammar;
    use crate::source::Source;

    fn analyzed(src: &str) -> (Grammar, Vec<String>) {
        let err = ErrorAccumulator::new();
        let source = Source::new("test.peg", src);
        let mut grammar = parse_grammar(&source, &err).expect("unexpected fatal error");
        analyze(&mut grammar, &err);
        let messages = err.take().into_iter().map(|d| d.message).collect();
        (grammar, messages)
    }

    fn handle(grammar: &Grammar, name: &str) -> NonterminalHandle {
        grammar
            .nonterminals
            .iter()
            .find(|(_, nt)| nt.name == name)
            .map(|(h, _)| h)
            .expect("nonterminal not found")
    }

    #[test]
    fn undefined_rule_reported() {
        let (_, messages) = analyzed("goal = missing EOF;");
        assert!(messages.contains(&"rule not defined".to_owned()));
        // The caller is not dragged into the left-recursion report.
        assert!(!messages.contains(&"left-recursive rule".to_owned()));
    }

    #[test]
    fn lone_unbound_class_infers_char() {
        let (grammar, messages) = analyzed("digit = [0-9]; goal = digit:d EOF;");
        assert!(messages.is_empty());
        let digit = handle(&grammar, "digit");
        assert_eq!(grammar.rule_type(digit), grammar.char_type);
        let goal = handle(&grammar, "goal");
        assert_eq!(grammar.rule_type(goal), grammar.void_type);
    }

    #[test]
    fn bound_class_body_stays_void() {
        let (grammar, _) = analyzed("digit = [0-9]:d;");
        let digit = handle(&grammar, "digit");
        assert_eq!(grammar.rule_type(digit), grammar.void_type);
    }

    #[test]
    fn binding_to_void_rule_rejected() {
        let (_, messages) = analyzed("a = \"x\"; goal = a:v EOF;");
        assert!(messages.contains(&"variable not allowed on rule returning void".to_owned()));
    }

    #[test]
    fn binding_to_char_rule_accepted() {
        let (_, messages) = analyzed("digit = [0-9]; goal = digit:d EOF;");
        assert!(messages.is_empty());
    }

    #[test]
    fn caching_follows_expression_shape() {
        let (grammar, _) = analyzed(
            "a = \"xy\"; single = \"x\"; ref = a; opt = ref?; class = [0-9]; rep = single*; alt = single / ref;",
        );
        let caching = |name: &str| grammar.nonterminals[handle(&grammar, name)].settings.caching;
        assert!(caching("a")); // sequence of terminals
        assert!(!caching("single")); // lone terminal
        assert!(!caching("ref")); // plain rule reference
        assert!(!caching("opt")); // optional propagates the reference
        assert!(caching("class"));
        assert!(caching("rep"));
        assert!(caching("alt")); // backtracking structure
    }

    #[test]
    fn nullability_fixed_point() {
        let (grammar, _) = analyzed("a = \"x\"?; b = \"x\"; c = b; d = a b; e = a c?; f = b+;");
        let nullable = |name: &str| {
            grammar.nonterminals[handle(&grammar, name)]
                .settings
                .can_accept_empty_string
        };
        assert!(nullable("a"));
        assert!(!nullable("b"));
        assert!(!nullable("c"));
        assert!(!nullable("d"));
        assert!(nullable("e"));
        assert!(!nullable("f"));
    }

    #[test]
    fn eof_is_not_nullable() {
        let (grammar, _) = analyzed("a = EOF;");
        assert!(
            !grammar.nonterminals[handle(&grammar, "a")]
                .settings
                .can_accept_empty_string
        );
    }

    #[test]
    fn direct_left_recursion_detected() {
        let (_, messages) = analyzed("a = a \"x\" / \"y\";");
        assert_eq!(
            messages
                .iter()
                .filter(|m| *m == "left-recursive rule")
                .count(),
            1
        );
    }

    #[test]
    fn indirect_left_recursion_detected() {
        let (_, messages) = analyzed("a = b \"x\"; b = a;");
        assert_eq!(
            messages
                .iter()
                .filter(|m| *m == "left-recursive rule")
                .count(),
            2
        );
    }

    #[test]
    fn guarded_recursion_is_fine() {
        let (_, messages) = analyzed("a = \"x\" a / \"x\";");
        assert!(messages.is_empty());
    }

    #[test]
    fn nullable_prefix_still_recursive() {
        let (_, messages) = analyzed("a = b a; b = \"x\"?;");
        assert!(messages.contains(&"left-recursive rule".to_owned()));
    }

    #[test]
    fn recursion_behind_predicate_detected() {
        let (_, messages) = analyzed("a = &a \"x\";");
        assert!(messages.contains(&"left-recursive rule".to_owned()));
    }
}
