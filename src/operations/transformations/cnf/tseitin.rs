use std::collections::HashMap;

use crate::datastructures::Clause;
use crate::formulas::{Formula, FormulaKind, Literal, Variable, VariableRegistry};
use crate::util::exceptions::panic_unexpected_formula;

/// Polarity mode of a substitution: which implication directions between the
/// auxiliary variable and its defining subformula are emitted.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(super) enum Polarity {
    /// Emit the full biconditional `aux <=> formula`. Preserves the model
    /// count under projection onto the original variables.
    Both,
    /// Emit only `aux => formula`, the direction needed for a positive
    /// occurrence (the only occurrence polarity in NNF). Fewer clauses, but
    /// not model-count-preserving. This is the Plaisted–Greenbaum
    /// optimization.
    Positive,
}

/// An auxiliary variable standing for one distinct non-literal subformula.
#[derive(Clone, Debug)]
pub(super) struct Substitution {
    pub(super) variable: Variable,
    pub(super) formula: Formula,
    pub(super) polarity: Polarity,
}

/// Traverses an NNF formula bottom-up and records one substitution per
/// distinct compound subformula, reserving a fresh auxiliary variable from the
/// registry for each.
///
/// Only indices are reserved here; the orchestrator registers the variables of
/// the substitutions that survive unification.
pub(super) fn tseitin_transform(
    formula: &Formula,
    registry: &VariableRegistry,
    use_plaisted_greenbaum: bool,
) -> Vec<Substitution> {
    let polarity = if use_plaisted_greenbaum { Polarity::Positive } else { Polarity::Both };
    let mut substitutions = Vec::new();
    let mut seen = HashMap::new();
    compute_substitutions(formula, registry, polarity, &mut substitutions, &mut seen);
    substitutions
}

fn compute_substitutions(
    formula: &Formula,
    registry: &VariableRegistry,
    polarity: Polarity,
    substitutions: &mut Vec<Substitution>,
    seen: &mut HashMap<Formula, Variable>,
) {
    if formula.is_literal() || seen.contains_key(formula) {
        return;
    }
    match formula.kind() {
        FormulaKind::And(ops) | FormulaKind::Or(ops) => {
            for op in ops {
                if !op.is_literal() && !op.is_constant() {
                    compute_substitutions(op, registry, polarity, substitutions, seen);
                }
            }
            let variable = registry.reserve_variable();
            substitutions.push(Substitution { variable, formula: formula.clone(), polarity });
            seen.insert(formula.clone(), variable);
        }
        _ => panic_unexpected_formula(formula),
    }
}

/// Unifies substitutions whose defining subformulas are structurally equal:
/// the first substitution is kept, later duplicates are dropped, so the
/// auxiliary-variable count grows with the number of distinct subformulas, not
/// with their occurrence count. Polarity modes are ignored for the comparison;
/// a duplicate with a differing mode widens the kept substitution to
/// [`Polarity::Both`].
pub(super) fn unify(substitutions: Vec<Substitution>) -> Vec<Substitution> {
    let mut positions: HashMap<Formula, usize> = HashMap::new();
    let mut unified: Vec<Substitution> = Vec::with_capacity(substitutions.len());
    for substitution in substitutions {
        if let Some(&position) = positions.get(&substitution.formula) {
            if unified[position].polarity != substitution.polarity {
                unified[position].polarity = Polarity::Both;
            }
        } else {
            positions.insert(substitution.formula.clone(), unified.len());
            unified.push(substitution);
        }
    }
    unified
}

/// Builds the map from defining subformulas to their (unified) auxiliary
/// variables.
pub(super) fn auxiliary_variables(substitutions: &[Substitution]) -> HashMap<Formula, Variable> {
    substitutions.iter().map(|s| (s.formula.clone(), s.variable)).collect()
}

/// Emits the defining clauses of the given (unified) substitutions. The
/// clauses relate each auxiliary variable to the connective semantics of its
/// subformula's operands, with compound operands represented by their own
/// auxiliary variables.
pub(super) fn defining_clauses(
    substitutions: &[Substitution],
    variables: &HashMap<Formula, Variable>,
) -> Vec<Clause> {
    let mut clauses = Vec::new();
    for substitution in substitutions {
        emit(substitution, variables, &mut clauses);
    }
    clauses
}

fn emit(
    substitution: &Substitution,
    variables: &HashMap<Formula, Variable>,
    clauses: &mut Vec<Clause>,
) {
    let pos = substitution.variable.pos_lit();
    let neg = substitution.variable.neg_lit();
    let both = substitution.polarity == Polarity::Both;
    match substitution.formula.kind() {
        FormulaKind::And(ops) => {
            let mut literals = Vec::with_capacity(ops.len());
            for op in ops {
                match op.kind() {
                    FormulaKind::True => {}
                    FormulaKind::False => {
                        // the conjunction is constantly false
                        clauses.push(Clause::unit(neg));
                        return;
                    }
                    _ => literals.push(operand_literal(op, variables)),
                }
            }
            // aux => every operand
            for &literal in &literals {
                clauses.push(Clause::from_literals([neg, literal]));
            }
            if both {
                // all operands => aux
                clauses.push(Clause::from_literals(
                    std::iter::once(pos).chain(literals.iter().map(Literal::negate)),
                ));
            }
        }
        FormulaKind::Or(ops) => {
            let mut literals = Vec::with_capacity(ops.len());
            for op in ops {
                match op.kind() {
                    FormulaKind::False => {}
                    FormulaKind::True => {
                        // the disjunction is constantly true
                        if both {
                            clauses.push(Clause::unit(pos));
                        }
                        return;
                    }
                    _ => literals.push(operand_literal(op, variables)),
                }
            }
            // aux => some operand
            clauses.push(Clause::from_literals(std::iter::once(neg).chain(literals.clone())));
            if both {
                // each operand => aux
                for literal in literals {
                    clauses.push(Clause::from_literals([pos, literal.negate()]));
                }
            }
        }
        _ => panic_unexpected_formula(&substitution.formula),
    }
}

fn operand_literal(operand: &Formula, variables: &HashMap<Formula, Variable>) -> Literal {
    operand.as_literal().unwrap_or_else(|| {
        variables.get(operand).expect("compound operands have substitutions").pos_lit()
    })
}
