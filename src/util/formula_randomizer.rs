use crate::formulas::{Formula, Literal, Variable};

/// Configuration for the [`FormulaRandomizer`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormulaRandomizerConfig {
    /// Number of variables to draw literals from.
    pub num_vars: u32,
    /// Maximum nesting depth of generated formulas.
    pub max_depth: u32,
    /// Maximum operand count of generated `And`/`Or` nodes.
    pub max_width: usize,
    /// Seed for the random number generator.
    pub seed: u64,
}

impl Default for FormulaRandomizerConfig {
    fn default() -> Self {
        Self { num_vars: 8, max_depth: 4, max_width: 4, seed: 42 }
    }
}

/// A generator for random formulas in negation normal form.
///
/// Generation is deterministic for a given configuration, so test failures are
/// reproducible from the seed.
pub struct FormulaRandomizer {
    rng: fastrand::Rng,
    config: FormulaRandomizerConfig,
}

impl FormulaRandomizer {
    /// Constructs a new randomizer with the given configuration.
    pub fn new(config: FormulaRandomizerConfig) -> Self {
        Self { rng: fastrand::Rng::with_seed(config.seed), config }
    }

    /// Returns a random literal.
    pub fn literal(&mut self) -> Literal {
        let index = self.rng.u32(1..=self.config.num_vars);
        let variable = Variable::from_index(index).expect("indices start at 1");
        Literal::new(variable, self.rng.bool())
    }

    /// Returns a random NNF formula.
    pub fn nnf(&mut self) -> Formula {
        let max_depth = self.config.max_depth;
        self.nnf_rec(max_depth)
    }

    fn nnf_rec(&mut self, depth: u32) -> Formula {
        // one in four inner nodes degenerates to a literal early
        if depth == 0 || self.rng.u32(0..4) == 0 {
            return Formula::literal(self.literal());
        }
        let width = self.rng.usize(2..=self.config.max_width);
        let operands = (0..width).map(|_| self.nnf_rec(depth - 1)).collect();
        if self.rng.bool() {
            Formula::and(operands)
        } else {
            Formula::or(operands)
        }
    }
}
