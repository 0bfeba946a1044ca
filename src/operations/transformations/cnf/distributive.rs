use crate::datastructures::Clause;
use crate::formulas::{Formula, FormulaKind};
use crate::handlers::{FactorizationCanceled, FactorizationHandler, NopFactorizationHandler};
use crate::util::exceptions::panic_unexpected_formula;

/// Converts an NNF formula into an equivalent set of CNF clauses by
/// recursively distributing disjunction over conjunction, bottom-up.
///
/// An empty result set is the valid (trivially true) CNF; a set containing the
/// empty clause is unsatisfiable.
pub(super) fn distributive_cnf(formula: &Formula) -> Vec<Clause> {
    distributive_cnf_with_handler(formula, &mut NopFactorizationHandler {})
        .expect("Nop handler never cancels.")
}

/// Converts an NNF formula into CNF clauses, consulting `handler` before each
/// distribution step.
///
/// On cancellation the transformation of the whole subformula aborts: no
/// partial clauses are returned, only the [`FactorizationCanceled`] marker.
/// Full distribution is exponential in the worst case; the handler's
/// cancellation predicate is the single safety valve against that blow-up.
pub(super) fn distributive_cnf_with_handler(
    formula: &Formula,
    handler: &mut dyn FactorizationHandler,
) -> Result<Vec<Clause>, FactorizationCanceled> {
    handler.started();
    apply_rec(formula, handler)
}

fn apply_rec(
    formula: &Formula,
    handler: &mut dyn FactorizationHandler,
) -> Result<Vec<Clause>, FactorizationCanceled> {
    match formula.kind() {
        FormulaKind::Lit(literal) => Ok(vec![Clause::unit(*literal)]),
        FormulaKind::True => Ok(Vec::new()),
        FormulaKind::False => Ok(vec![Clause::empty()]),
        FormulaKind::And(ops) => handle_and(ops, handler),
        FormulaKind::Or(ops) => handle_or(ops, handler),
        _ => panic_unexpected_formula(formula),
    }
}

fn handle_and(
    operands: &[Formula],
    handler: &mut dyn FactorizationHandler,
) -> Result<Vec<Clause>, FactorizationCanceled> {
    let mut clauses = Vec::new();
    for op in operands {
        clauses.extend(apply_rec(op, handler)?);
    }
    Ok(clauses)
}

fn handle_or(
    operands: &[Formula],
    handler: &mut dyn FactorizationHandler,
) -> Result<Vec<Clause>, FactorizationCanceled> {
    let mut sets = Vec::with_capacity(operands.len());
    for op in operands {
        sets.push(apply_rec(op, handler)?);
    }
    let mut sets = sets.into_iter();
    let Some(mut result) = sets.next() else {
        // the empty disjunction is unsatisfiable
        return Ok(vec![Clause::empty()]);
    };
    for set in sets {
        result = distribute(&result, &set, handler)?;
    }
    Ok(result)
}

fn distribute(
    left: &[Clause],
    right: &[Clause],
    handler: &mut dyn FactorizationHandler,
) -> Result<Vec<Clause>, FactorizationCanceled> {
    if left.is_empty() || right.is_empty() {
        // one side is trivially true, so the disjunction is as well
        return Ok(Vec::new());
    }
    let left_literals: u64 = left.iter().map(|c| c.len() as u64).sum();
    let right_literals: u64 = right.iter().map(|c| c.len() as u64).sum();
    let projected = left_literals * right.len() as u64 + right_literals * left.len() as u64;
    handler.projected_distribution(projected).inspect_err(|_| {
        log::trace!("distribution canceled at {projected} projected literals");
    })?;
    let mut result = Vec::with_capacity(left.len() * right.len());
    for l in left {
        for r in right {
            result.push(Clause::merge([l, r]));
        }
    }
    Ok(result)
}
