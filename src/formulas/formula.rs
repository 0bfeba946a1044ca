use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::datastructures::Assignment;

use super::{Literal, Variable};

/// Specifies all kinds of formula nodes.
///
/// The set of connectives is closed: dispatch happens via pattern matching, so
/// adding a connective is a compile-time exhaustiveness error in every
/// operation that consumes formulas.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum FormulaKind {
    /// A literal.
    Lit(Literal),
    /// The constant `true`.
    True,
    /// The constant `false`.
    False,
    /// A conjunction of operands.
    And(Vec<Formula>),
    /// A disjunction of operands.
    Or(Vec<Formula>),
    /// A negation.
    Not(Formula),
    /// An implication.
    Implies(Formula, Formula),
    /// A biconditional.
    BiImplies(Formula, Formula),
    /// An existential quantification over a variable.
    Exists(Variable, Formula),
    /// A universal quantification over a variable.
    ForAll(Variable, Formula),
    /// At least `k` of the operands hold.
    AtLeast(u32, Vec<Formula>),
    /// At most `k` of the operands hold.
    AtMost(u32, Vec<Formula>),
}

/// Normal-form flags of a node. Formulas are immutable once constructed, so
/// the flags are computed bottom-up in the constructors and never invalidated.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
struct Classification {
    nnf: bool,
    cnf: bool,
    strict_cnf: bool,
    clause: bool,
}

#[derive(Debug, Eq, PartialEq, Hash)]
struct FormulaNode {
    kind: FormulaKind,
    class: Classification,
}

/// A propositional formula.
///
/// `Formula` is a cheaply clonable handle to an immutable, reference-counted
/// tree node. Construction is structural: the constructors do not simplify,
/// flatten, or reorder operands, so `Formula::or(vec![a])` really is a
/// disjunction with one operand. This matters for strict normal forms, which
/// are defined over the exact tree shape.
///
/// Every node knows its normal-form classification ([`is_nnf`], [`is_cnf`],
/// [`is_strict_cnf`]); the flags are computed once at construction, so the
/// queries are O(1).
///
/// Equality and hashing are structural: two independently built trees with the
/// same shape compare equal. Comparison short-circuits on shared nodes.
///
/// [`is_nnf`]: Formula::is_nnf
/// [`is_cnf`]: Formula::is_cnf
/// [`is_strict_cnf`]: Formula::is_strict_cnf
#[derive(Clone, Debug)]
pub struct Formula(Arc<FormulaNode>);

impl PartialEq for Formula {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.kind == other.0.kind
    }
}

impl Eq for Formula {}

impl Hash for Formula {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.kind.hash(state);
    }
}

impl Formula {
    fn new(kind: FormulaKind) -> Self {
        let class = classify(&kind);
        Self(Arc::new(FormulaNode { kind, class }))
    }

    /// Creates a formula consisting of a single literal.
    pub fn literal(literal: Literal) -> Self {
        Self::new(FormulaKind::Lit(literal))
    }

    /// Creates a formula consisting of a single positive literal over `variable`.
    pub fn variable(variable: Variable) -> Self {
        Self::literal(variable.pos_lit())
    }

    /// Creates the constant `true` formula.
    pub fn verum() -> Self {
        Self::new(FormulaKind::True)
    }

    /// Creates the constant `false` formula.
    pub fn falsum() -> Self {
        Self::new(FormulaKind::False)
    }

    /// Creates a conjunction of the given operands.
    pub fn and(operands: Vec<Self>) -> Self {
        Self::new(FormulaKind::And(operands))
    }

    /// Creates a disjunction of the given operands.
    pub fn or(operands: Vec<Self>) -> Self {
        Self::new(FormulaKind::Or(operands))
    }

    /// Creates a disjunction of the given literals.
    pub fn clause<I: IntoIterator<Item = Literal>>(literals: I) -> Self {
        Self::or(literals.into_iter().map(Self::literal).collect())
    }

    /// Creates the negation of `operand`.
    pub fn not(operand: Self) -> Self {
        Self::new(FormulaKind::Not(operand))
    }

    /// Creates the implication `left => right`.
    pub fn implies(left: Self, right: Self) -> Self {
        Self::new(FormulaKind::Implies(left, right))
    }

    /// Creates the biconditional `left <=> right`.
    pub fn bi_implies(left: Self, right: Self) -> Self {
        Self::new(FormulaKind::BiImplies(left, right))
    }

    /// Creates the existential quantification of `body` over `variable`.
    pub fn exists(variable: Variable, body: Self) -> Self {
        Self::new(FormulaKind::Exists(variable, body))
    }

    /// Creates the universal quantification of `body` over `variable`.
    pub fn for_all(variable: Variable, body: Self) -> Self {
        Self::new(FormulaKind::ForAll(variable, body))
    }

    /// Creates the cardinality constraint "at least `k` of `operands` hold".
    pub fn at_least(k: u32, operands: Vec<Self>) -> Self {
        Self::new(FormulaKind::AtLeast(k, operands))
    }

    /// Creates the cardinality constraint "at most `k` of `operands` hold".
    pub fn at_most(k: u32, operands: Vec<Self>) -> Self {
        Self::new(FormulaKind::AtMost(k, operands))
    }

    /// Returns the kind of this formula.
    pub fn kind(&self) -> &FormulaKind {
        &self.0.kind
    }

    /// Returns the operands of an n-ary node (`And`, `Or`, `AtLeast`,
    /// `AtMost`); an empty slice for every other kind.
    pub fn operands(&self) -> &[Self] {
        match self.kind() {
            FormulaKind::And(ops)
            | FormulaKind::Or(ops)
            | FormulaKind::AtLeast(_, ops)
            | FormulaKind::AtMost(_, ops) => ops,
            _ => &[],
        }
    }

    /// Returns the literal of this formula, if it is a literal node.
    pub fn as_literal(&self) -> Option<Literal> {
        match self.kind() {
            FormulaKind::Lit(literal) => Some(*literal),
            _ => None,
        }
    }

    /// Returns `true` if this formula is a literal node.
    pub fn is_literal(&self) -> bool {
        matches!(self.kind(), FormulaKind::Lit(_))
    }

    /// Returns `true` if this formula is one of the constants.
    pub fn is_constant(&self) -> bool {
        matches!(self.kind(), FormulaKind::True | FormulaKind::False)
    }

    /// Returns `true` if this formula is a conjunction node.
    pub fn is_and(&self) -> bool {
        matches!(self.kind(), FormulaKind::And(_))
    }

    /// Returns `true` if this formula is a disjunction node.
    pub fn is_or(&self) -> bool {
        matches!(self.kind(), FormulaKind::Or(_))
    }

    /// Returns `true` if this formula is in negation normal form: it consists
    /// only of literals, constants, conjunctions, and disjunctions. (Literal
    /// nodes already carry their polarity, so an NNF tree contains no `Not`.)
    pub fn is_nnf(&self) -> bool {
        self.0.class.nnf
    }

    /// Returns `true` if this formula is in conjunctive normal form: a
    /// constant, a literal, a clause, or a conjunction of literals and
    /// clauses.
    pub fn is_cnf(&self) -> bool {
        self.0.class.cnf
    }

    /// Returns `true` if this formula is in strict conjunctive normal form:
    /// an `And` node whose every child is an `Or` node whose every child is a
    /// literal — exactly two tree levels, no degenerate structure.
    pub fn is_strict_cnf(&self) -> bool {
        self.0.class.strict_cnf
    }

    /// Returns `true` if this formula is a clause: an `Or` node whose every
    /// child is a literal.
    pub fn is_clause(&self) -> bool {
        self.0.class.clause
    }

    /// Returns all variables occurring in this formula, including quantified
    /// ones, in ascending index order.
    pub fn variables(&self) -> BTreeSet<Variable> {
        let mut variables = BTreeSet::new();
        self.collect_variables(&mut variables);
        variables
    }

    fn collect_variables(&self, variables: &mut BTreeSet<Variable>) {
        match self.kind() {
            FormulaKind::Lit(literal) => {
                variables.insert(literal.variable());
            }
            FormulaKind::True | FormulaKind::False => {}
            FormulaKind::And(ops)
            | FormulaKind::Or(ops)
            | FormulaKind::AtLeast(_, ops)
            | FormulaKind::AtMost(_, ops) => {
                for op in ops {
                    op.collect_variables(variables);
                }
            }
            FormulaKind::Not(op) => op.collect_variables(variables),
            FormulaKind::Implies(left, right) | FormulaKind::BiImplies(left, right) => {
                left.collect_variables(variables);
                right.collect_variables(variables);
            }
            FormulaKind::Exists(variable, body) | FormulaKind::ForAll(variable, body) => {
                variables.insert(*variable);
                body.collect_variables(variables);
            }
        }
    }

    /// Evaluates this formula under the given assignment. Unassigned
    /// variables evaluate to `false`, as described on
    /// [`Assignment::evaluate_literal`].
    #[allow(clippy::cast_possible_truncation)]
    pub fn evaluate(&self, assignment: &Assignment) -> bool {
        match self.kind() {
            FormulaKind::Lit(literal) => assignment.evaluate_literal(*literal),
            FormulaKind::True => true,
            FormulaKind::False => false,
            FormulaKind::And(ops) => ops.iter().all(|op| op.evaluate(assignment)),
            FormulaKind::Or(ops) => ops.iter().any(|op| op.evaluate(assignment)),
            FormulaKind::Not(op) => !op.evaluate(assignment),
            FormulaKind::Implies(left, right) => {
                !left.evaluate(assignment) || right.evaluate(assignment)
            }
            FormulaKind::BiImplies(left, right) => {
                left.evaluate(assignment) == right.evaluate(assignment)
            }
            FormulaKind::Exists(variable, body) => {
                evaluate_bound(body, *variable, assignment, bool::max)
            }
            FormulaKind::ForAll(variable, body) => {
                evaluate_bound(body, *variable, assignment, bool::min)
            }
            FormulaKind::AtLeast(k, ops) => {
                ops.iter().filter(|op| op.evaluate(assignment)).count() >= *k as usize
            }
            FormulaKind::AtMost(k, ops) => {
                ops.iter().filter(|op| op.evaluate(assignment)).count() <= *k as usize
            }
        }
    }
}

fn evaluate_bound(
    body: &Formula,
    variable: Variable,
    assignment: &Assignment,
    combine: fn(bool, bool) -> bool,
) -> bool {
    let mut with_true = assignment.clone();
    with_true.assign(variable, true);
    let mut with_false = assignment.clone();
    with_false.assign(variable, false);
    combine(body.evaluate(&with_true), body.evaluate(&with_false))
}

fn classify(kind: &FormulaKind) -> Classification {
    let none = Classification { nnf: false, cnf: false, strict_cnf: false, clause: false };
    match kind {
        FormulaKind::Lit(_) | FormulaKind::True | FormulaKind::False => {
            Classification { nnf: true, cnf: true, ..none }
        }
        FormulaKind::Or(ops) => {
            let clause = ops.iter().all(Formula::is_literal);
            Classification { nnf: ops.iter().all(Formula::is_nnf), cnf: clause, clause, ..none }
        }
        FormulaKind::And(ops) => Classification {
            nnf: ops.iter().all(Formula::is_nnf),
            cnf: ops.iter().all(|op| op.is_literal() || op.is_clause()),
            strict_cnf: ops.iter().all(Formula::is_clause),
            ..none
        },
        _ => none,
    }
}

impl Display for Formula {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.kind() {
            FormulaKind::Lit(literal) => write!(f, "{literal}"),
            FormulaKind::True => f.write_str("$true"),
            FormulaKind::False => f.write_str("$false"),
            FormulaKind::And(ops) => fmt_nary(f, ops, " & "),
            FormulaKind::Or(ops) => fmt_nary(f, ops, " | "),
            FormulaKind::Not(op) => {
                f.write_str("~")?;
                fmt_operand(f, op)
            }
            FormulaKind::Implies(left, right) => {
                fmt_operand(f, left)?;
                f.write_str(" => ")?;
                fmt_operand(f, right)
            }
            FormulaKind::BiImplies(left, right) => {
                fmt_operand(f, left)?;
                f.write_str(" <=> ")?;
                fmt_operand(f, right)
            }
            FormulaKind::Exists(variable, body) => {
                write!(f, "exists[{variable}]: ")?;
                fmt_operand(f, body)
            }
            FormulaKind::ForAll(variable, body) => {
                write!(f, "forall[{variable}]: ")?;
                fmt_operand(f, body)
            }
            FormulaKind::AtLeast(k, ops) => {
                write!(f, "atleast[{k}]")?;
                fmt_nary_bracketed(f, ops)
            }
            FormulaKind::AtMost(k, ops) => {
                write!(f, "atmost[{k}]")?;
                fmt_nary_bracketed(f, ops)
            }
        }
    }
}

fn fmt_nary(f: &mut Formatter<'_>, ops: &[Formula], separator: &str) -> std::fmt::Result {
    for (i, op) in ops.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        fmt_operand(f, op)?;
    }
    Ok(())
}

fn fmt_nary_bracketed(f: &mut Formatter<'_>, ops: &[Formula]) -> std::fmt::Result {
    f.write_str("(")?;
    fmt_nary(f, ops, ", ")?;
    f.write_str(")")
}

fn fmt_operand(f: &mut Formatter<'_>, op: &Formula) -> std::fmt::Result {
    if op.is_literal() || op.is_constant() {
        write!(f, "{op}")
    } else {
        write!(f, "({op})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(value: i32) -> Formula {
        Formula::literal(Literal::from_value(value).unwrap())
    }

    #[test]
    fn test_classification_of_atoms() {
        for formula in [lit(1), lit(-2), Formula::verum(), Formula::falsum()] {
            assert!(formula.is_nnf());
            assert!(formula.is_cnf());
            assert!(!formula.is_strict_cnf());
            assert!(!formula.is_clause());
        }
    }

    #[test]
    fn test_classification_of_clauses() {
        let clause = Formula::or(vec![lit(1), lit(-2)]);
        assert!(clause.is_nnf());
        assert!(clause.is_cnf());
        assert!(clause.is_clause());
        assert!(!clause.is_strict_cnf());

        let nested = Formula::or(vec![lit(1), Formula::and(vec![lit(2), lit(3)])]);
        assert!(nested.is_nnf());
        assert!(!nested.is_cnf());
        assert!(!nested.is_clause());
    }

    #[test]
    fn test_classification_of_conjunctions() {
        let strict = Formula::and(vec![
            Formula::or(vec![lit(1)]),
            Formula::or(vec![lit(2), lit(-3)]),
        ]);
        assert!(strict.is_nnf());
        assert!(strict.is_cnf());
        assert!(strict.is_strict_cnf());

        let cnf = Formula::and(vec![lit(1), Formula::or(vec![lit(2), lit(-3)])]);
        assert!(cnf.is_cnf());
        assert!(!cnf.is_strict_cnf());

        let deep = Formula::and(vec![Formula::and(vec![lit(1)]), lit(2)]);
        assert!(deep.is_nnf());
        assert!(!deep.is_cnf());
    }

    #[test]
    fn test_non_nnf_kinds() {
        let a = lit(1);
        let b = lit(2);
        for formula in [
            Formula::not(a.clone()),
            Formula::implies(a.clone(), b.clone()),
            Formula::bi_implies(a.clone(), b.clone()),
            Formula::exists(Variable::from_index(1).unwrap(), a.clone()),
            Formula::for_all(Variable::from_index(1).unwrap(), a.clone()),
            Formula::at_least(1, vec![a.clone(), b.clone()]),
            Formula::at_most(1, vec![a, b]),
        ] {
            assert!(!formula.is_nnf());
            assert!(!formula.is_cnf());
        }
    }

    #[test]
    fn test_structural_equality() {
        let f1 = Formula::and(vec![lit(1), Formula::or(vec![lit(2), lit(3)])]);
        let f2 = Formula::and(vec![lit(1), Formula::or(vec![lit(2), lit(3)])]);
        let f3 = Formula::and(vec![lit(1), Formula::or(vec![lit(3), lit(2)])]);
        assert_eq!(f1, f2);
        assert_ne!(f1, f3);
    }

    #[test]
    fn test_variables() {
        let formula = Formula::or(vec![lit(3), Formula::and(vec![lit(-1), lit(3)])]);
        let indices: Vec<u32> = formula.variables().iter().map(|v| v.index()).collect();
        assert_eq!(indices, vec![1, 3]);
    }

    #[test]
    fn test_evaluate() {
        let v1 = Variable::from_index(1).unwrap();
        let formula = Formula::or(vec![lit(1), Formula::and(vec![lit(2), lit(-3)])]);
        let mut assignment = Assignment::default();
        assert!(!formula.evaluate(&assignment));
        assignment.assign(v1, true);
        assert!(formula.evaluate(&assignment));

        let mut assignment = Assignment::default();
        assignment.assign(Variable::from_index(2).unwrap(), true);
        assert!(formula.evaluate(&assignment));
        assignment.assign(Variable::from_index(3).unwrap(), true);
        assert!(!formula.evaluate(&assignment));
    }

    #[test]
    fn test_evaluate_extended_kinds() {
        let a = lit(1);
        let b = lit(2);
        let assignment = Assignment::from_literals(&[
            Literal::from_value(1).unwrap(),
            Literal::from_value(-2).unwrap(),
        ]);
        assert!(!Formula::implies(a.clone(), b.clone()).evaluate(&assignment));
        assert!(!Formula::bi_implies(a.clone(), b.clone()).evaluate(&assignment));
        assert!(Formula::not(b.clone()).evaluate(&assignment));
        assert!(Formula::at_least(1, vec![a.clone(), b.clone()]).evaluate(&assignment));
        assert!(Formula::at_most(1, vec![a.clone(), b.clone()]).evaluate(&assignment));
        // exists v2. (v1 & v2) is satisfiable under v1 = true
        let v2 = Variable::from_index(2).unwrap();
        assert!(Formula::exists(v2, Formula::and(vec![a.clone(), b.clone()])).evaluate(&assignment));
        assert!(!Formula::for_all(v2, Formula::and(vec![a, b])).evaluate(&assignment));
    }

    #[test]
    fn test_display() {
        let formula = Formula::and(vec![
            Formula::or(vec![lit(1), lit(-2)]),
            Formula::verum(),
        ]);
        assert_eq!(formula.to_string(), "(v1 | ~v2) & $true");
        let implication = Formula::implies(lit(1), Formula::not(lit(2)));
        assert_eq!(implication.to_string(), "v1 => (~v2)");
    }
}
