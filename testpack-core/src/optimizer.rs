// Copyright (c) The testpack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Greedy weighted set-cover over a [`CoverageStore`] snapshot.
//!
//! Computes the decision once and exposes it as a predicate: the optimizer here produces a
//! [`Plan`] whose `contains` method is meant to be plugged straight into
//! [`crate::sequencer::Request::retain`].

use crate::{coverage_store::CoverageStore, test_id::TestId};
use std::{cmp::Ordering, collections::HashSet};
use tracing::warn;

/// Which of the three mutually-exclusive optimizer targets to pursue.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Target {
    /// Pick exactly `k` tests maximising union coverage.
    TestCount(usize),
    /// Pick the smallest cost-prefix whose fractional coverage is at least `c`.
    Coverage(f64),
    /// Pick the coverage-maximising subset with total cost at most `budget_ms`.
    Cost(u64),
}

/// One greedy pick, ordered by a total order over score/cost/id.
///
/// `Selection`'s `Ord` impl is total: score/cost descending, then cost ascending, then id
/// lexicographic. This avoids the classic non-total "priority comparator" bug where `a > b` and
/// `b < a` are both evaluated false, so neither branch fires and the ordering silently breaks.
#[derive(Clone, Debug)]
struct Selection {
    /// `new_covered as f64 / cost_ms as f64`, compared via cross-multiplication to stay exact.
    new_covered: usize,
    cost_ms: u64,
    id: TestId,
}

impl Selection {
    /// Cross-multiplied comparison of `a.new_covered/a.cost_ms` vs `b.new_covered/b.cost_ms`,
    /// avoiding floating-point score storage entirely.
    fn score_cmp(&self, other: &Selection) -> Ordering {
        let lhs = self.new_covered as u128 * other.cost_ms as u128;
        let rhs = other.new_covered as u128 * self.cost_ms as u128;
        lhs.cmp(&rhs)
    }
}

impl Eq for Selection {}

impl PartialEq for Selection {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl PartialOrd for Selection {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Selection {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher score first, so reverse the raw score comparison.
        self.score_cmp(other)
            .reverse()
            // Lower cost first.
            .then_with(|| self.cost_ms.cmp(&other.cost_ms))
            // Lexicographic id, for full determinism.
            .then_with(|| self.id.sort_key().cmp(&other.id.sort_key()))
    }
}

/// The outcome of a greedy run: an ordered selection plus a membership filter.
#[derive(Clone, Debug, Default)]
pub struct Plan {
    selected: Vec<TestId>,
    selected_set: HashSet<TestId>,
    /// `None` when the optimizer was disabled or short-circuited (empty repository, zero total
    /// coverage) — callers should treat this the same as "unfiltered"
    active: bool,
}

impl Plan {
    /// A no-op plan: every test is retained.
    fn passthrough() -> Self {
        Self {
            selected: Vec::new(),
            selected_set: HashSet::new(),
            active: false,
        }
    }

    /// Whether `id` belongs to the computed subset. Always `true` for a passthrough plan.
    pub fn contains(&self, id: &TestId) -> bool {
        !self.active || self.selected_set.contains(id)
    }

    /// The selected tests, in pick order. Empty (but meaningless for filtering) when passthrough.
    pub fn selections(&self) -> &[TestId] {
        &self.selected
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// A human-readable description of the plan, suitable for `--verbose` output.
    pub fn describe(&self) -> String {
        if !self.active {
            return "optimizer disabled; running the full request".to_owned();
        }
        format!("selected {} of the available tests via greedy set cover", self.selected.len())
    }
}

/// Runs the greedy optimizer against `store`, restricted to `candidates`, pursuing `target`.
///
/// Degenerate cases: an empty repository, or one where every candidate has zero
/// coverage, both warn and return a passthrough plan rather than erroring.
pub fn optimize(store: &CoverageStore, candidates: &[TestId], target: Target) -> Plan {
    if store.is_empty() || store.probe_count() == 0 {
        warn!("coverage store is empty; optimizer disabled, running unfiltered request");
        return Plan::passthrough();
    }

    let n = store.probe_count();
    let known: Vec<&TestId> = candidates.iter().filter(|id| store.get(id).is_some()).collect();

    if known
        .iter()
        .all(|id| store.get(id).is_some_and(|t| t.coverage.cardinality() == 0))
    {
        warn!("no candidate has any recorded coverage; optimizer disabled, running unfiltered request");
        return Plan::passthrough();
    }

    let mut covered = crate::bitset::Bitset::new(n);
    let mut selected = Vec::new();
    let mut selected_set = HashSet::new();
    // Ids still in contention, re-scored against the evolving `covered` accumulator each round.
    let mut remaining: Vec<TestId> = known.into_iter().cloned().collect();
    let mut total_cost_ms: u64 = 0;

    loop {
        match target {
            Target::TestCount(k) => {
                if selected.len() >= k || remaining.is_empty() {
                    break;
                }
            }
            Target::Coverage(c) => {
                if covered.cardinality() as f64 / n as f64 >= c || remaining.is_empty() {
                    break;
                }
            }
            Target::Cost(_) => {
                if remaining.is_empty() {
                    break;
                }
            }
        }

        let mut best: Option<Selection> = None;
        for id in &remaining {
            let Some(t) = store.get(id) else { continue };
            let new_covered = covered.union_cardinality(&t.coverage) - covered.cardinality();
            let cost_ms = if t.cost_ms == 0 { 1 } else { t.cost_ms };
            let candidate = Selection {
                new_covered,
                cost_ms,
                id: id.clone(),
            };
            best = Some(match best {
                None => candidate,
                Some(current) => {
                    if candidate.cmp(&current) == Ordering::Less {
                        candidate
                    } else {
                        current
                    }
                }
            });
        }

        let Some(pick) = best else { break };

        if let Target::Cost(budget_ms) = target {
            if total_cost_ms + pick.cost_ms > budget_ms {
                remaining.retain(|id| *id != pick.id);
                continue;
            }
        }

        if let Some(t) = store.get(&pick.id) {
            covered.union_inplace(&t.coverage);
        }
        total_cost_ms += pick.cost_ms;
        remaining.retain(|id| *id != pick.id);
        selected_set.insert(pick.id.clone());
        selected.push(pick.id);
    }

    Plan {
        selected,
        selected_set,
        active: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitset::Bitset;

    fn bits(n: usize, on: &[usize]) -> Bitset {
        let mut b = Bitset::new(n);
        for &i in on {
            b.set(i);
        }
        b
    }

    fn store_with(entries: &[(&str, &[usize], u64)], n: usize) -> CoverageStore {
        let mut store = CoverageStore::new(n);
        for (name, covered, cost) in entries {
            store.record(TestId::new("pkg.T", *name), bits(n, covered), *cost);
        }
        store
    }

    fn ids(entries: &[(&str, &[usize], u64)]) -> Vec<TestId> {
        entries.iter().map(|(name, _, _)| TestId::new("pkg.T", *name)).collect()
    }

    #[test]
    fn empty_store_is_passthrough() {
        let store = CoverageStore::new(0);
        let plan = optimize(&store, &[], Target::TestCount(3));
        assert!(!plan.is_active());
        assert!(plan.contains(&TestId::new("pkg.T", "anything")));
    }

    #[test]
    fn all_zero_coverage_is_passthrough() {
        let entries: &[(&str, &[usize], u64)] = &[("a", &[], 10), ("b", &[], 10)];
        let store = store_with(entries, 8);
        let plan = optimize(&store, &ids(entries), Target::TestCount(1));
        assert!(!plan.is_active());
    }

    #[test]
    fn target_test_count_picks_exactly_k_when_available() {
        let entries: &[(&str, &[usize], u64)] =
            &[("a", &[0, 1], 10), ("b", &[2, 3], 10), ("c", &[0, 1, 2, 3], 10)];
        let store = store_with(entries, 4);
        let plan = optimize(&store, &ids(entries), Target::TestCount(2));
        assert_eq!(plan.selections().len(), 2);
        // `c` covers everything at the same cost, so it should be picked first.
        assert_eq!(plan.selections()[0], TestId::new("pkg.T", "c"));
    }

    #[test]
    fn target_test_count_caps_at_pool_size() {
        let entries: &[(&str, &[usize], u64)] = &[("a", &[0], 10)];
        let store = store_with(entries, 4);
        let plan = optimize(&store, &ids(entries), Target::TestCount(5));
        assert_eq!(plan.selections().len(), 1);
    }

    #[test]
    fn target_coverage_stops_once_threshold_reached() {
        let entries: &[(&str, &[usize], u64)] =
            &[("a", &[0, 1], 10), ("b", &[2, 3], 10), ("c", &[0, 1, 2, 3], 10)];
        let store = store_with(entries, 4);
        let plan = optimize(&store, &ids(entries), Target::Coverage(0.5));
        assert_eq!(plan.selections(), &[TestId::new("pkg.T", "c")]);
    }

    #[test]
    fn target_cost_respects_budget_and_skips_overshooting_candidates() {
        // `c` has the best score but is too expensive for the budget; `a`+`b` together fit.
        let entries: &[(&str, &[usize], u64)] =
            &[("a", &[0, 1], 5), ("b", &[2, 3], 5), ("c", &[0, 1, 2, 3], 100)];
        let store = store_with(entries, 4);
        let plan = optimize(&store, &ids(entries), Target::Cost(10));
        let total: u64 = plan
            .selections()
            .iter()
            .map(|id| store.get(id).unwrap().cost_ms)
            .sum();
        assert!(total <= 10);
        assert!(!plan.selections().contains(&TestId::new("pkg.T", "c")));
    }

    #[test]
    fn zero_cost_candidate_is_treated_as_cost_one() {
        let entries: &[(&str, &[usize], u64)] = &[("a", &[0], 0)];
        let store = store_with(entries, 1);
        let plan = optimize(&store, &ids(entries), Target::TestCount(1));
        assert_eq!(plan.selections().len(), 1);
    }

    #[test]
    fn selection_count_never_exceeds_pool_size() {
        let entries: &[(&str, &[usize], u64)] = &[("a", &[0], 1), ("b", &[1], 1)];
        let store = store_with(entries, 2);
        let plan = optimize(&store, &ids(entries), Target::TestCount(50));
        assert!(plan.selections().len() <= entries.len());
    }

    #[test]
    fn selection_total_order_breaks_ties_by_cost_then_id() {
        let low_cost_a = Selection {
            new_covered: 4,
            cost_ms: 2,
            id: TestId::new("pkg.T", "a"),
        };
        let low_cost_b = Selection {
            new_covered: 4,
            cost_ms: 2,
            id: TestId::new("pkg.T", "b"),
        };
        let high_cost = Selection {
            new_covered: 4,
            cost_ms: 3,
            id: TestId::new("pkg.T", "c"),
        };
        assert_eq!(low_cost_a.cmp(&high_cost), Ordering::Less, "lower cost sorts first");
        assert_eq!(low_cost_a.cmp(&low_cost_b), Ordering::Less, "equal score/cost breaks by id");
    }
}
