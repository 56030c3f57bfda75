//! Routing Policy
//!
//! Decides which side of the topology serves a read. Pure function of the
//! router state, so every rule can be tested without a connection.

/// Router state relevant to a read decision.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadContext {
    /// The router has already handed out its primary
    pub has_used_primary: bool,
    /// A transaction is open on the primary
    pub in_transaction: bool,
    /// At least one secondary is registered
    pub has_secondaries: bool,
    /// The caller asked for the primary explicitly
    pub force_primary: bool,
}

/// Where a read goes, and why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadRoute {
    /// Safe mode after the primary was used (read-your-writes)
    StickyPrimary,
    /// Caller passed `force_primary`
    ForcedPrimary,
    /// Open transaction; only the primary sees its state
    TransactionPrimary,
    /// No secondaries registered
    FallbackPrimary,
    /// Weighted pick among the secondaries
    Secondary,
}

impl ReadRoute {
    pub fn uses_primary(&self) -> bool {
        !matches!(self, Self::Secondary)
    }
}

/// Read-routing rules for one router.
#[derive(Debug, Clone, Copy)]
pub struct RoutingPolicy {
    safe_mode: bool,
}

impl RoutingPolicy {
    pub fn new(safe_mode: bool) -> Self {
        Self { safe_mode }
    }

    pub fn safe_mode(&self) -> bool {
        self.safe_mode
    }

    /// Route a read. Rules are checked in order; the first match wins.
    pub fn route_read(&self, ctx: ReadContext) -> ReadRoute {
        if self.safe_mode && ctx.has_used_primary {
            ReadRoute::StickyPrimary
        } else if ctx.force_primary {
            ReadRoute::ForcedPrimary
        } else if ctx.in_transaction {
            ReadRoute::TransactionPrimary
        } else if !ctx.has_secondaries {
            ReadRoute::FallbackPrimary
        } else {
            ReadRoute::Secondary
        }
    }
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_secondaries() -> ReadContext {
        ReadContext {
            has_secondaries: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_fresh_router_reads_from_secondary() {
        let policy = RoutingPolicy::new(true);
        assert_eq!(policy.route_read(with_secondaries()), ReadRoute::Secondary);
    }

    #[test]
    fn test_safe_mode_sticks_after_primary_use() {
        let policy = RoutingPolicy::new(true);
        let ctx = ReadContext {
            has_used_primary: true,
            ..with_secondaries()
        };
        assert_eq!(policy.route_read(ctx), ReadRoute::StickyPrimary);
    }

    #[test]
    fn test_unsafe_mode_ignores_primary_use() {
        let policy = RoutingPolicy::new(false);
        let ctx = ReadContext {
            has_used_primary: true,
            ..with_secondaries()
        };
        assert_eq!(policy.route_read(ctx), ReadRoute::Secondary);
    }

    #[test]
    fn test_force_primary() {
        let policy = RoutingPolicy::new(false);
        let ctx = ReadContext {
            force_primary: true,
            ..with_secondaries()
        };
        assert_eq!(policy.route_read(ctx), ReadRoute::ForcedPrimary);
    }

    #[test]
    fn test_transaction_pins_to_primary() {
        for safe_mode in [true, false] {
            let policy = RoutingPolicy::new(safe_mode);
            let ctx = ReadContext {
                in_transaction: true,
                ..with_secondaries()
            };
            assert!(policy.route_read(ctx).uses_primary());
        }
    }

    #[test]
    fn test_no_secondaries_falls_back() {
        let policy = RoutingPolicy::default();
        assert_eq!(policy.route_read(ReadContext::default()), ReadRoute::FallbackPrimary);
    }

    #[test]
    fn test_rule_order() {
        let policy = RoutingPolicy::new(true);
        let everything = ReadContext {
            has_used_primary: true,
            in_transaction: true,
            has_secondaries: false,
            force_primary: true,
        };
        assert_eq!(policy.route_read(everything), ReadRoute::StickyPrimary);

        let forced_in_tx = ReadContext {
            has_used_primary: false,
            ..everything
        };
        assert_eq!(policy.route_read(forced_in_tx), ReadRoute::ForcedPrimary);
    }

    #[test]
    fn test_default_is_safe() {
        assert!(RoutingPolicy::default().safe_mode());
        assert!(!ReadRoute::Secondary.uses_primary());
    }
}
