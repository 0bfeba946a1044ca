use super::ComputationHandler;

/// A handler trait for the distributive CNF transformation.
pub trait FactorizationHandler: ComputationHandler {
    /// Called before each distribution step with the total literal count the
    /// step would produce. Returning `Err` cancels the transformation of the
    /// whole subformula.
    fn projected_distribution(
        &mut self,
        projected_literals: u64,
    ) -> Result<(), FactorizationCanceled> {
        let _ = projected_literals;
        Ok(())
    }
}

/// Marker signaling that the distributive transformation was canceled.
///
/// Cancellation is a control-flow signal, not an error: the normalization
/// orchestrator consumes it to select the Tseitin fallback, and it never
/// propagates to callers as a failure.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FactorizationCanceled;

/// A no-operation handler for factorizations. This handler does never abort or
/// interrupt a calculation.
pub struct NopFactorizationHandler {}

impl ComputationHandler for NopFactorizationHandler {}

impl FactorizationHandler for NopFactorizationHandler {}

/// A literal limiting handler. This handler does abort as soon as a
/// distribution step would produce more literals than the specified limit.
pub struct LiteralLimitFactorizationHandler {
    /// Indicates whether the handler is aborted.
    pub aborted: bool,
    /// Number of distributions already performed.
    pub dists: u64,
    maximum_number_of_literals: u64,
}

impl LiteralLimitFactorizationHandler {
    /// Constructs a new handler which allows distribution steps up to the
    /// given number of projected literals.
    pub const fn new(maximum_number_of_literals: u64) -> Self {
        Self { aborted: false, dists: 0, maximum_number_of_literals }
    }
}

impl ComputationHandler for LiteralLimitFactorizationHandler {
    fn started(&mut self) {
        self.aborted = false;
        self.dists = 0;
    }

    fn aborted(&self) -> bool {
        self.aborted
    }
}

impl FactorizationHandler for LiteralLimitFactorizationHandler {
    fn projected_distribution(
        &mut self,
        projected_literals: u64,
    ) -> Result<(), FactorizationCanceled> {
        self.dists += 1;
        self.aborted = projected_literals > self.maximum_number_of_literals;
        if self.aborted {
            Err(FactorizationCanceled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_limit() {
        let mut handler = LiteralLimitFactorizationHandler::new(10);
        handler.started();
        assert_eq!(handler.projected_distribution(10), Ok(()));
        assert!(!handler.aborted());
        assert_eq!(handler.projected_distribution(11), Err(FactorizationCanceled));
        assert!(handler.aborted());
        assert_eq!(handler.dists, 2);

        handler.started();
        assert!(!handler.aborted());
        assert_eq!(handler.dists, 0);
    }
}
