use std::collections::HashSet;

use crate::formulas::{Literal, Variable};

/// An `Assignment` stores a set of positive and negative [`Variable`]s.
///
/// Variables are kept in [`HashSet`]s, which makes formula evaluation cheap.
/// Variables absent from both sets are unassigned; evaluation treats them as
/// `false` (see [`evaluate_literal`](`Assignment::evaluate_literal`)).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assignment {
    /// Set of all positive variables of this assignment.
    pub pos: HashSet<Variable>,
    /// Set of all negative variables of this assignment.
    pub neg: HashSet<Variable>,
}

impl Assignment {
    /// Creates a new assignment from sets of positive and negative variables.
    pub const fn new(pos: HashSet<Variable>, neg: HashSet<Variable>) -> Self {
        Self { pos, neg }
    }

    /// Creates a new assignment from literals: positive literals assign their
    /// variable `true`, negative literals `false`.
    pub fn from_literals(literals: &[Literal]) -> Self {
        let mut assignment = Self::default();
        for literal in literals {
            assignment.assign(literal.variable(), literal.phase());
        }
        assignment
    }

    /// Assigns a value to a variable, replacing any previous value.
    pub fn assign(&mut self, variable: Variable, value: bool) {
        if value {
            self.neg.remove(&variable);
            self.pos.insert(variable);
        } else {
            self.pos.remove(&variable);
            self.neg.insert(variable);
        }
    }

    /// Returns the assigned value of a variable, or `None` if it is
    /// unassigned.
    pub fn value_of(&self, variable: Variable) -> Option<bool> {
        if self.pos.contains(&variable) {
            Some(true)
        } else if self.neg.contains(&variable) {
            Some(false)
        } else {
            None
        }
    }

    /// Evaluates a literal under this assignment. An unassigned variable
    /// evaluates to `false`, so its positive literal is `false` and its
    /// negative literal is `true`.
    pub fn evaluate_literal(&self, literal: Literal) -> bool {
        literal.phase() == self.pos.contains(&literal.variable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(index: u32) -> Variable {
        Variable::from_index(index).unwrap()
    }

    #[test]
    fn test_assign_and_query() {
        let mut assignment = Assignment::default();
        assert_eq!(assignment.value_of(var(1)), None);
        assignment.assign(var(1), true);
        assert_eq!(assignment.value_of(var(1)), Some(true));
        assignment.assign(var(1), false);
        assert_eq!(assignment.value_of(var(1)), Some(false));
    }

    #[test]
    fn test_evaluate_literal() {
        let assignment = Assignment::from_literals(&[var(1).pos_lit(), var(2).neg_lit()]);
        assert!(assignment.evaluate_literal(var(1).pos_lit()));
        assert!(!assignment.evaluate_literal(var(1).neg_lit()));
        assert!(assignment.evaluate_literal(var(2).neg_lit()));
        // unassigned variables default to false
        assert!(!assignment.evaluate_literal(var(3).pos_lit()));
        assert!(assignment.evaluate_literal(var(3).neg_lit()));
    }
}
