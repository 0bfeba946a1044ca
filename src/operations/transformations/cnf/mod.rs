mod distributive;
mod tseitin;

use std::fmt::{Display, Formatter};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;

use crate::datastructures::Clause;
use crate::formulas::{Formula, FormulaKind, Literal, VarType, VariableRegistry};
use crate::handlers::{ComputationHandler, LiteralLimitFactorizationHandler, NopHandler};
use crate::util::exceptions::panic_unexpected_formula;

use distributive::{distributive_cnf, distributive_cnf_with_handler};
use tseitin::{auxiliary_variables, defining_clauses, tseitin_transform, unify, Substitution};

/// Error returned when the input formula of a normalization is not in negation
/// normal form.
///
/// This is a programming-contract failure: callers are responsible for pushing
/// negations down to the literals (and eliminating implications,
/// biconditionals, quantifiers, and cardinality constraints) before
/// normalizing. It is never produced for satisfiable-vs-unsatisfiable or
/// size-related reasons, and nothing is retried internally.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PreconditionViolation;

impl Display for PreconditionViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("input formula is not in negation normal form")
    }
}

impl std::error::Error for PreconditionViolation {}

/// Configuration for the CNF normalization.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CnfConfig {
    use_plaisted_greenbaum: bool,
    maximum_number_of_literals: Option<u64>,
    parallel: bool,
}

impl Default for CnfConfig {
    fn default() -> Self {
        Self { use_plaisted_greenbaum: false, maximum_number_of_literals: None, parallel: false }
    }
}

impl CnfConfig {
    /// Sets whether auxiliary variables are defined with the Plaisted &
    /// Greenbaum optimization: only the implication direction needed for the
    /// occurrence polarity is emitted, which yields smaller formulas that are
    /// not model-count-preserving.
    ///
    /// The default value is `false`.
    #[must_use]
    pub const fn use_plaisted_greenbaum(mut self, use_plaisted_greenbaum: bool) -> Self {
        self.use_plaisted_greenbaum = use_plaisted_greenbaum;
        self
    }

    /// Sets the boundary of how many literals a distribution step may produce
    /// before the distributive transformation is canceled and the conjunct is
    /// transformed with the Tseitin method instead.
    ///
    /// The default is unbounded. Setting the boundary to 0 forces the Tseitin
    /// method for everything that is not already CNF.
    #[must_use]
    pub const fn maximum_number_of_literals(mut self, maximum_number_of_literals: u64) -> Self {
        self.maximum_number_of_literals = Some(maximum_number_of_literals);
        self
    }

    /// Sets whether top-level conjuncts are transformed in parallel.
    ///
    /// Be careful: this does not guarantee determinism. The resulting clause
    /// set is deterministic, but the order of clauses and the specific indices
    /// assigned to auxiliary variables may differ from a sequential run.
    ///
    /// The default value is `false`.
    #[must_use]
    pub const fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

/// Transforms an NNF formula into an equivalent or equisatisfiable formula in
/// strict conjunctive normal form: an `And` node whose every child is an `Or`
/// node whose every child is a literal.
///
/// Every top-level conjunct is transformed independently. A conjunct that is
/// already CNF is restructured into strict form without altering literals; any
/// other conjunct is distributed under the configured literal bound, falling
/// back to the Tseitin transformation when the bound is exceeded. Auxiliary
/// variables introduced by the fallback are registered in `registry`.
///
/// Fails with [`PreconditionViolation`] if `formula` is not in NNF.
///
/// # Examples
///
/// Basic usage:
///
/// ```
/// # use clausify::formulas::{Formula, VariableRegistry};
/// # use clausify::operations::transformations::cnf::{cnf_of, CnfConfig};
/// let mut registry = VariableRegistry::with_variables(["a", "b", "c"]).unwrap();
/// let a = registry.variable("a").unwrap().pos_lit();
/// let b = registry.variable("b").unwrap().pos_lit();
/// let c = registry.variable("c").unwrap().pos_lit();
///
/// // a | (b & c)
/// let formula = Formula::or(vec![
///     Formula::literal(a),
///     Formula::and(vec![Formula::literal(b), Formula::literal(c)]),
/// ]);
/// let cnf = cnf_of(&formula, &mut registry, &CnfConfig::default()).unwrap();
///
/// assert!(cnf.is_strict_cnf());
/// assert_eq!(cnf.to_string(), "(v1 | v2) & (v1 | v3)");
/// ```
pub fn cnf_of(
    formula: &Formula,
    registry: &mut VariableRegistry,
    config: &CnfConfig,
) -> Result<Formula, PreconditionViolation> {
    cnf_of_with_handler(formula, registry, config, &mut NopHandler {})
        .map(|result| result.expect("Nop handler never aborts."))
}

/// Transforms an NNF formula into strict CNF like [`cnf_of`], consulting
/// `handler` at conjunct granularity.
///
/// Returns `Ok(None)` if the handler aborted the run between conjuncts; a
/// conjunct already in progress is not interrupted mid-transform.
pub fn cnf_of_with_handler(
    formula: &Formula,
    registry: &mut VariableRegistry,
    config: &CnfConfig,
    handler: &mut (dyn ComputationHandler + Sync),
) -> Result<Option<Formula>, PreconditionViolation> {
    if !formula.is_nnf() {
        return Err(PreconditionViolation);
    }
    handler.started();
    let conjuncts: Vec<&Formula> = match formula.kind() {
        FormulaKind::And(ops) => ops.iter().collect(),
        _ => vec![formula],
    };

    let outcomes = if config.parallel && conjuncts.len() > 1 {
        transform_parallel(&conjuncts, registry, config, handler)
    } else {
        transform_sequential(&conjuncts, registry, config, handler)
    };
    let Some(outcomes) = outcomes else {
        log::debug!("normalization abandoned between conjuncts");
        return Ok(None);
    };

    let mut substitutions = Vec::new();
    let mut direct: Vec<Option<Vec<Clause>>> = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        match outcome {
            ConjunctOutcome::Direct(clauses) => direct.push(Some(clauses)),
            ConjunctOutcome::Substituted(subs) => {
                substitutions.extend(subs);
                direct.push(None);
            }
        }
    }

    let collected = substitutions.len();
    let substitutions = unify(substitutions);
    if collected > substitutions.len() {
        log::debug!("unified {collected} substitutions into {}", substitutions.len());
    }
    let variables = auxiliary_variables(&substitutions);

    let mut clauses = Vec::new();
    for (conjunct, direct) in conjuncts.iter().zip(direct) {
        match direct {
            Some(conjunct_clauses) => clauses.extend(conjunct_clauses),
            // assert the substituted conjunct through its auxiliary variable
            None => clauses.push(Clause::unit(
                variables.get(*conjunct).expect("roots have substitutions").pos_lit(),
            )),
        }
    }
    clauses.extend(defining_clauses(&substitutions, &variables));

    for substitution in &substitutions {
        registry
            .add_variable(None, Some(substitution.variable.index()), VarType::Bool)
            .expect("reserved indices are unregistered");
    }

    Ok(Some(clauses_to_formula(&clauses)))
}

enum ConjunctOutcome {
    /// The conjunct's clauses, produced directly.
    Direct(Vec<Clause>),
    /// The conjunct required auxiliary variables; its clauses are emitted
    /// after global substitution unification.
    Substituted(Vec<Substitution>),
}

fn transform_sequential(
    conjuncts: &[&Formula],
    registry: &VariableRegistry,
    config: &CnfConfig,
    handler: &(dyn ComputationHandler + Sync),
) -> Option<Vec<ConjunctOutcome>> {
    let mut outcomes = Vec::with_capacity(conjuncts.len());
    for conjunct in conjuncts {
        if handler.aborted() {
            return None;
        }
        outcomes.push(transform_conjunct(conjunct, registry, config));
    }
    Some(outcomes)
}

fn transform_parallel(
    conjuncts: &[&Formula],
    registry: &VariableRegistry,
    config: &CnfConfig,
    handler: &(dyn ComputationHandler + Sync),
) -> Option<Vec<ConjunctOutcome>> {
    let thread_count =
        thread::available_parallelism().map_or(1, NonZeroUsize::get).min(conjuncts.len());
    log::debug!("normalizing {} conjuncts on {thread_count} threads", conjuncts.len());
    let counter = AtomicUsize::new(0);
    let results = Mutex::new(Vec::with_capacity(conjuncts.len()));
    thread::scope(|scope| {
        for _ in 0..thread_count {
            scope.spawn(|| loop {
                if handler.aborted() {
                    break;
                }
                let index = counter.fetch_add(1, Ordering::SeqCst);
                if index >= conjuncts.len() {
                    break;
                }
                let outcome = transform_conjunct(conjuncts[index], registry, config);
                results.lock().expect("no worker panicked").push((index, outcome));
            });
        }
    });
    let mut results = results.into_inner().expect("no worker panicked");
    if results.len() < conjuncts.len() {
        return None;
    }
    results.sort_unstable_by_key(|(index, _)| *index);
    Some(results.into_iter().map(|(_, outcome)| outcome).collect())
}

fn transform_conjunct(
    conjunct: &Formula,
    registry: &VariableRegistry,
    config: &CnfConfig,
) -> ConjunctOutcome {
    if conjunct.is_strict_cnf() {
        return ConjunctOutcome::Direct(conjunct.operands().iter().map(or_to_clause).collect());
    }
    if conjunct.is_cnf() {
        return ConjunctOutcome::Direct(strict_clauses(conjunct));
    }
    let distributed = match config.maximum_number_of_literals {
        None => Ok(distributive_cnf(conjunct)),
        Some(maximum) => {
            let mut handler = LiteralLimitFactorizationHandler::new(maximum);
            distributive_cnf_with_handler(conjunct, &mut handler)
        }
    };
    match distributed {
        Ok(clauses) => ConjunctOutcome::Direct(clauses),
        Err(_) => {
            log::debug!("distribution bound exceeded, falling back to the Tseitin transformation");
            ConjunctOutcome::Substituted(tseitin_transform(
                conjunct,
                registry,
                config.use_plaisted_greenbaum,
            ))
        }
    }
}

/// Restructures a CNF-classified formula into its clauses without altering
/// literals.
fn strict_clauses(formula: &Formula) -> Vec<Clause> {
    match formula.kind() {
        FormulaKind::Lit(literal) => vec![Clause::unit(*literal)],
        FormulaKind::True => Vec::new(),
        FormulaKind::False => vec![Clause::empty()],
        FormulaKind::Or(_) => vec![or_to_clause(formula)],
        FormulaKind::And(ops) => ops.iter().flat_map(strict_clauses).collect(),
        _ => panic_unexpected_formula(formula),
    }
}

fn or_to_clause(or: &Formula) -> Clause {
    Clause::from_literals(
        or.operands().iter().map(|op| op.as_literal().expect("clause operands are literals")),
    )
}

fn clauses_to_formula(clauses: &[Clause]) -> Formula {
    Formula::and(clauses.iter().map(clause_to_formula).collect())
}

fn clause_to_formula(clause: &Clause) -> Formula {
    Formula::clause(
        clause
            .literals()
            .iter()
            .map(|&value| Literal::from_value(value).expect("clause literals are nonzero")),
    )
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::handlers::{TimeoutHandler, Timer};

    use super::*;

    fn lit(value: i32) -> Formula {
        Formula::literal(Literal::from_value(value).unwrap())
    }

    fn clause(literals: &[i32]) -> Clause {
        Clause::new(literals.to_vec()).unwrap()
    }

    fn clauses_of(cnf: &Formula) -> Vec<Clause> {
        assert!(cnf.is_strict_cnf());
        cnf.operands().iter().map(or_to_clause).collect()
    }

    fn registry(count: u32) -> VariableRegistry {
        VariableRegistry::with_variables((1..=count).map(|i| format!("x{i}"))).unwrap()
    }

    #[test]
    fn test_strict_input_is_unchanged() {
        // x & (y | z), already in clausal shape
        let formula = Formula::and(vec![lit(1), Formula::or(vec![lit(2), lit(3)])]);
        let mut reg = registry(3);
        let cnf = cnf_of(&formula, &mut reg, &CnfConfig::default()).unwrap();
        assert_eq!(clauses_of(&cnf), vec![clause(&[1]), clause(&[2, 3])]);
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn test_idempotence() {
        let strict = Formula::and(vec![
            Formula::or(vec![lit(1)]),
            Formula::or(vec![lit(2), lit(3)]),
        ]);
        let mut reg = registry(3);
        let before = reg.clone();
        let cnf = cnf_of(&strict, &mut reg, &CnfConfig::default()).unwrap();
        assert_eq!(cnf, strict);
        assert_eq!(reg, before);

        let again = cnf_of(&cnf, &mut reg, &CnfConfig::default()).unwrap();
        assert_eq!(again, strict);
    }

    #[test]
    fn test_distribution() {
        // a | (b & c)  ->  (a | b) & (a | c)
        let formula = Formula::or(vec![lit(1), Formula::and(vec![lit(2), lit(3)])]);
        let mut reg = registry(3);
        let cnf = cnf_of(&formula, &mut reg, &CnfConfig::default()).unwrap();
        assert_eq!(clauses_of(&cnf), vec![clause(&[1, 2]), clause(&[1, 3])]);
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn test_tseitin_fallback_on_bound() {
        let formula = Formula::or(vec![lit(1), Formula::and(vec![lit(2), lit(3)])]);
        let mut reg = registry(3);
        let config = CnfConfig::default().maximum_number_of_literals(1);
        let cnf = cnf_of(&formula, &mut reg, &config).unwrap();
        assert!(cnf.is_strict_cnf());
        // auxiliary variables for b & c and for the root disjunction
        assert_eq!(reg.len(), 5);
        let clauses = clauses_of(&cnf);
        // root unit clause plus defining clauses of two substitutions
        assert_eq!(clauses[0].len(), 1);
        assert!(clauses.iter().all(|c| !c.is_empty()));
    }

    #[test]
    fn test_forced_tseitin_with_plaisted_greenbaum_is_smaller() {
        let formula = Formula::or(vec![lit(1), Formula::and(vec![lit(2), lit(3)])]);
        let default_config = CnfConfig::default().maximum_number_of_literals(0);
        let pg_config =
            CnfConfig::default().maximum_number_of_literals(0).use_plaisted_greenbaum(true);
        let default_cnf = cnf_of(&formula, &mut registry(3), &default_config).unwrap();
        let pg_cnf = cnf_of(&formula, &mut registry(3), &pg_config).unwrap();
        assert!(pg_cnf.operands().len() < default_cnf.operands().len());
    }

    #[test]
    fn test_substitution_unification_across_conjuncts() {
        let shared = Formula::and(vec![lit(2), lit(3)]);
        let formula = Formula::and(vec![
            Formula::or(vec![lit(1), shared.clone()]),
            Formula::or(vec![lit(4), shared.clone()]),
        ]);
        let mut reg = registry(4);
        let config = CnfConfig::default().maximum_number_of_literals(0);
        let cnf = cnf_of(&formula, &mut reg, &config).unwrap();
        assert!(cnf.is_strict_cnf());
        // three distinct subformulas: b & c and the two disjunctions
        assert_eq!(reg.len(), 7);
    }

    #[test]
    fn test_mixed_conjuncts() {
        // one fast-path conjunct, one distributed conjunct
        let formula = Formula::and(vec![
            Formula::or(vec![lit(1), lit(-2)]),
            Formula::or(vec![lit(3), Formula::and(vec![lit(4), lit(5)])]),
        ]);
        let mut reg = registry(5);
        let cnf = cnf_of(&formula, &mut reg, &CnfConfig::default()).unwrap();
        assert_eq!(
            clauses_of(&cnf),
            vec![clause(&[-2, 1]), clause(&[3, 4]), clause(&[3, 5])]
        );
    }

    #[test]
    fn test_literal_and_constant_conjuncts() {
        let formula = Formula::and(vec![lit(-3), Formula::verum()]);
        let mut reg = registry(3);
        let cnf = cnf_of(&formula, &mut reg, &CnfConfig::default()).unwrap();
        assert_eq!(clauses_of(&cnf), vec![clause(&[-3])]);

        let falsum = Formula::falsum();
        let cnf = cnf_of(&falsum, &mut reg, &CnfConfig::default()).unwrap();
        assert_eq!(clauses_of(&cnf), vec![Clause::empty()]);
    }

    #[test]
    fn test_non_nnf_input_is_rejected() {
        let mut reg = registry(2);
        for formula in [
            Formula::not(lit(1)),
            Formula::implies(lit(1), lit(2)),
            Formula::and(vec![lit(1), Formula::bi_implies(lit(1), lit(2))]),
        ] {
            assert_eq!(
                cnf_of(&formula, &mut reg, &CnfConfig::default()),
                Err(PreconditionViolation)
            );
        }
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_aborted_handler_abandons_run() {
        let formula = Formula::and(vec![
            Formula::or(vec![lit(1), Formula::and(vec![lit(2), lit(3)])]),
            Formula::or(vec![lit(2), Formula::and(vec![lit(3), lit(1)])]),
        ]);
        let mut reg = registry(3);
        let mut handler = TimeoutHandler::new(Timer::SingleTimeout(Duration::ZERO));
        let result =
            cnf_of_with_handler(&formula, &mut reg, &CnfConfig::default(), &mut handler).unwrap();
        assert_eq!(result, None);

        let mut handler = TimeoutHandler::new(Timer::SingleTimeout(Duration::from_secs(3600)));
        let result =
            cnf_of_with_handler(&formula, &mut reg, &CnfConfig::default(), &mut handler).unwrap();
        assert!(result.is_some());
    }

    #[test]
    fn test_parallel_matches_sequential_clause_set() {
        let conjuncts: Vec<Formula> = (0..16)
            .map(|i| {
                Formula::or(vec![
                    lit(i % 5 + 1),
                    Formula::and(vec![lit((i + 1) % 5 + 1), lit(-(i % 3 + 1))]),
                ])
            })
            .collect();
        let formula = Formula::and(conjuncts);
        let sequential = cnf_of(&formula, &mut registry(5), &CnfConfig::default()).unwrap();
        let parallel =
            cnf_of(&formula, &mut registry(5), &CnfConfig::default().parallel(true)).unwrap();
        let sorted = |cnf: &Formula| {
            let mut clauses = clauses_of(cnf);
            clauses.sort_unstable();
            clauses
        };
        assert_eq!(sorted(&sequential), sorted(&parallel));
    }
}
