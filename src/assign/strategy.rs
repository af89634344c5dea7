use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// How a batch of contacts is spread over the eligible callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AssignmentStrategy {
    /// Next contact goes to whoever holds the fewest open contacts.
    #[default]
    LoadBalanced,
    /// Every contact draws a caller independently.
    UniformRandom,
}

impl AssignmentStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LoadBalanced => "load-balanced",
            Self::UniformRandom => "random",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "load-balanced" | "load_balanced" | "balanced" => Some(Self::LoadBalanced),
            "random" | "uniform" | "uniform-random" => Some(Self::UniformRandom),
            _ => None,
        }
    }
}

/// Greedy online load balancing over a fixed caller pool.
#[derive(Debug, Clone)]
pub struct LoadBalancer {
    order: Vec<Uuid>,
    loads: HashMap<Uuid, usize>,
}

impl LoadBalancer {
    /// `order` is the tie-break order; callers missing from `loads` start at zero.
    pub fn new(order: Vec<Uuid>, mut loads: HashMap<Uuid, usize>) -> Self {
        for id in &order {
            loads.entry(*id).or_insert(0);
        }
        Self { order, loads }
    }

    /// Least-loaded caller, first in pool order on ties. Counts the pick.
    pub fn next(&mut self) -> Option<Uuid> {
        let caller = *self
            .order
            .iter()
            .min_by_key(|id| self.loads.get(*id).copied().unwrap_or(usize::MAX))?;
        *self.loads.entry(caller).or_insert(0) += 1;
        Some(caller)
    }

    /// Give back a pick that could not be applied.
    pub fn undo(&mut self, caller: Uuid) {
        if let Some(load) = self.loads.get_mut(&caller) {
            *load = load.saturating_sub(1);
        }
    }

    pub fn load_of(&self, caller: Uuid) -> usize {
        self.loads.get(&caller).copied().unwrap_or(0)
    }
}

/// Uniform draw from the pool.
pub fn pick_uniform<R: Rng + ?Sized>(pool: &[Uuid], rng: &mut R) -> Option<Uuid> {
    pool.choose(rng).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_strategy_parse() {
        assert_eq!(
            AssignmentStrategy::parse("load-balanced"),
            Some(AssignmentStrategy::LoadBalanced)
        );
        assert_eq!(
            AssignmentStrategy::parse("Random"),
            Some(AssignmentStrategy::UniformRandom)
        );
        assert_eq!(AssignmentStrategy::parse("round-robin"), None);
    }

    #[test]
    fn test_load_balancer_fills_lightest_first() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let loads = HashMap::from([(a, 3), (b, 1)]);
        let mut lb = LoadBalancer::new(vec![a, b, c], loads);

        // c starts empty, then b and c alternate until they reach a.
        let picks: Vec<Uuid> = (0..5).map(|_| lb.next().unwrap()).collect();
        assert_eq!(picks, vec![c, b, c, b, c]);
        assert_eq!(lb.load_of(a), 3);
        assert_eq!(lb.load_of(b), 3);
        assert_eq!(lb.load_of(c), 3);

        // All equal: pool order decides.
        assert_eq!(lb.next(), Some(a));
    }

    #[test]
    fn test_load_balancer_undo() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut lb = LoadBalancer::new(vec![a, b], HashMap::new());
        assert_eq!(lb.next(), Some(a));
        lb.undo(a);
        assert_eq!(lb.next(), Some(a));
        assert_eq!(lb.next(), Some(b));
    }

    #[test]
    fn test_empty_pool() {
        let mut lb = LoadBalancer::new(Vec::new(), HashMap::new());
        assert_eq!(lb.next(), None);
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(pick_uniform(&[], &mut rng), None);
    }

    #[test]
    fn test_uniform_pick_stays_in_pool() {
        let pool: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let pick = pick_uniform(&pool, &mut rng).unwrap();
            assert!(pool.contains(&pick));
        }
    }
}
