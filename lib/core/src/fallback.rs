//! Ordered fallback chains
//!
//! A chain holds named tiers tried in order; the first tier that yields a
//! value wins. Each tier is a plain closure so it can be unit-tested alone.

use tracing::debug;

type TierFn<'a, I, O> = Box<dyn Fn(&I) -> Option<O> + Send + Sync + 'a>;

struct Tier<'a, I: ?Sized, O> {
    name: &'static str,
    run: TierFn<'a, I, O>,
}

/// Value produced by a chain, tagged with the tier that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<O> {
    pub tier: &'static str,
    /// Zero for the preferred tier.
    pub position: usize,
    pub value: O,
}

impl<O> Resolved<O> {
    /// True when a lower-priority tier answered.
    pub fn degraded(&self) -> bool {
        self.position > 0
    }
}

pub struct FallbackChain<'a, I: ?Sized, O> {
    tiers: Vec<Tier<'a, I, O>>,
}

impl<'a, I: ?Sized, O> Default for FallbackChain<'a, I, O> {
    fn default() -> Self {
        Self { tiers: Vec::new() }
    }
}

impl<'a, I: ?Sized, O> FallbackChain<'a, I, O> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tier with lower priority than all existing ones.
    pub fn tier<F>(mut self, name: &'static str, run: F) -> Self
    where
        F: Fn(&I) -> Option<O> + Send + Sync + 'a,
    {
        self.tiers.push(Tier {
            name,
            run: Box::new(run),
        });
        self
    }

    pub fn tier_names(&self) -> Vec<&'static str> {
        self.tiers.iter().map(|t| t.name).collect()
    }

    /// Run tiers in order until one yields.
    pub fn resolve(&self, input: &I) -> Option<Resolved<O>> {
        for (position, tier) in self.tiers.iter().enumerate() {
            match (tier.run)(input) {
                Some(value) => {
                    debug!(tier = tier.name, position, "fallback chain resolved");
                    return Some(Resolved {
                        tier: tier.name,
                        position,
                        value,
                    });
                }
                None => debug!(tier = tier.name, "fallback tier declined"),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_yielding_tier_wins() {
        let chain: FallbackChain<'_, i32, &str> = FallbackChain::new()
            .tier("positive", |x| (*x > 0).then_some("positive"))
            .tier("zero", |x| (*x == 0).then_some("zero"))
            .tier("any", |_| Some("any"));

        let r = chain.resolve(&5).unwrap();
        assert_eq!((r.tier, r.position, r.value), ("positive", 0, "positive"));
        assert!(!r.degraded());

        let r = chain.resolve(&0).unwrap();
        assert_eq!(r.tier, "zero");
        assert!(r.degraded());

        assert_eq!(chain.resolve(&-3).unwrap().tier, "any");
    }

    #[test]
    fn test_empty_chain_resolves_nothing() {
        let chain: FallbackChain<'_, str, ()> = FallbackChain::new();
        assert!(chain.resolve("x").is_none());
    }

    #[test]
    fn test_tiers_can_borrow() {
        let table = vec![10, 20];
        let chain: FallbackChain<'_, usize, i32> = FallbackChain::new()
            .tier("table", |i| table.get(*i).copied())
            .tier("default", |_| Some(-1));
        assert_eq!(chain.resolve(&1).unwrap().value, 20);
        assert_eq!(chain.resolve(&9).unwrap().value, -1);
        assert_eq!(chain.tier_names(), vec!["table", "default"]);
    }
}
