//! Multi-objective ranking: Pareto dominance, non-dominated sorting,
//! crowding distance, NSGA-II survivor selection and the running archive of
//! non-dominated solutions.

use crate::individual::Individual;
use crate::objective::Direction;
use log::debug;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// True if `a` dominates `b`: no worse on every objective, strictly better on one.
pub fn dominates(a: &[f64], b: &[f64], directions: &[Direction]) -> bool {
    let mut strictly_better = false;
    for ((x, y), direction) in a.iter().zip(b.iter()).zip(directions.iter()) {
        if direction.better(*y, *x) {
            return false;
        }
        if direction.better(*x, *y) {
            strictly_better = true;
        }
    }
    strictly_better
}

/// Splits objective vectors into fronts of equal non-domination rank.
///
/// Front 0 holds the vectors nobody dominates; front `k` those dominated only
/// by members of earlier fronts. Indices inside a front keep input order.
pub fn non_dominated_sort(objectives: &[&[f64]], directions: &[Direction]) -> Vec<Vec<usize>> {
    let n = objectives.len();
    let mut dominated_by: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut domination_count: Vec<usize> = vec![0; n];

    for p in 0..n {
        for q in (p + 1)..n {
            if dominates(objectives[p], objectives[q], directions) {
                dominated_by[p].push(q);
                domination_count[q] += 1;
            } else if dominates(objectives[q], objectives[p], directions) {
                dominated_by[q].push(p);
                domination_count[p] += 1;
            }
        }
    }

    let mut fronts: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = (0..n).filter(|&i| domination_count[i] == 0).collect();

    while !current.is_empty() {
        let mut next: Vec<usize> = Vec::new();
        for &p in &current {
            for &q in &dominated_by[p] {
                domination_count[q] -= 1;
                if domination_count[q] == 0 {
                    next.push(q);
                }
            }
        }
        next.sort_unstable();
        fronts.push(current);
        current = next;
    }

    fronts
}

/// Crowding distance of every member of one front.
///
/// For each objective the front is sorted by value; the two boundary members
/// get an infinite distance and inner members add the gap between their
/// neighbours normalized by the objective's span on the front.
pub fn crowding_distance(objectives: &[&[f64]]) -> Vec<f64> {
    let n = objectives.len();
    let mut distance = vec![0.0; n];
    if n == 0 {
        return distance;
    }
    if n <= 2 {
        return vec![f64::INFINITY; n];
    }

    let n_objectives = objectives[0].len();
    for m in 0..n_objectives {
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| objectives[a][m].total_cmp(&objectives[b][m]));

        let first = order[0];
        let last = order[n - 1];
        distance[first] = f64::INFINITY;
        distance[last] = f64::INFINITY;

        let span = objectives[last][m] - objectives[first][m];
        if span == 0.0 || !span.is_finite() {
            continue;
        }

        for w in order.windows(3) {
            let (prev, mid, next) = (w[0], w[1], w[2]);
            distance[mid] += (objectives[next][m] - objectives[prev][m]) / span;
        }
    }

    distance
}

/// NSGA-II survivor selection over objective vectors; returns `k` indices.
///
/// Whole fronts are taken in rank order; the front that does not fit is
/// ranked by decreasing crowding distance, ties kept in input order.
pub fn select_nsga2_indices(objectives: &[&[f64]], k: usize, directions: &[Direction]) -> Vec<usize> {
    let mut chosen: Vec<usize> = Vec::with_capacity(k);

    for front in non_dominated_sort(objectives, directions) {
        if chosen.len() >= k {
            break;
        }
        let room = k - chosen.len();
        if front.len() <= room {
            chosen.extend(front);
            continue;
        }

        let front_objectives: Vec<&[f64]> = front.iter().map(|&i| objectives[i]).collect();
        let distance = crowding_distance(&front_objectives);
        let mut ranked: Vec<usize> = (0..front.len()).collect();
        ranked.sort_by(|&a, &b| distance[b].partial_cmp(&distance[a]).unwrap_or(Ordering::Equal));
        chosen.extend(ranked.into_iter().take(room).map(|i| front[i]));
    }

    chosen
}

/// NSGA-II selection of `k` survivors from evaluated individuals.
///
/// Returns exactly `min(k, individuals.len())` individuals. Unevaluated
/// individuals rank as if they had no objective at all and end up in front 0,
/// so callers are expected to evaluate first.
pub fn select_nsga2(individuals: Vec<Individual>, k: usize, directions: &[Direction]) -> Vec<Individual> {
    let chosen = {
        let objectives: Vec<&[f64]> = individuals.iter().map(|i| i.objectives().unwrap_or(&[])).collect();
        select_nsga2_indices(&objectives, k, directions)
    };

    let mut slots: Vec<Option<Individual>> = individuals.into_iter().map(Some).collect();
    chosen.into_iter().filter_map(|i| slots[i].take()).collect()
}

/// Every non-dominated individual seen so far, one per distinct objective vector.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ParetoArchive {
    pub members: Vec<Individual>,
}

impl ParetoArchive {
    pub fn new() -> ParetoArchive {
        ParetoArchive { members: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Merges evaluated candidates into the archive; unevaluated ones are skipped.
    ///
    /// Candidates are considered in order. A candidate is dropped if an archive
    /// member dominates it or already has the exact same objectives; otherwise
    /// it evicts the members it dominates and joins. Returns the number of
    /// candidates that entered.
    pub fn update<'a, I>(&mut self, candidates: I, directions: &[Direction]) -> usize
    where
        I: IntoIterator<Item = &'a Individual>,
    {
        let mut added = 0;
        let mut evicted = 0;

        for candidate in candidates {
            let Some(values) = candidate.objectives() else {
                continue;
            };

            let rejected = self.members.iter().any(|member| {
                let member_values = member.objectives().unwrap_or(&[]);
                member_values == values || dominates(member_values, values, directions)
            });
            if rejected {
                continue;
            }

            let before = self.members.len();
            self.members
                .retain(|member| !dominates(values, member.objectives().unwrap_or(&[]), directions));
            evicted += before - self.members.len();

            self.members.push(candidate.clone());
            added += 1;
        }

        debug!(
            "Pareto archive update: {} added, {} evicted, {} members",
            added,
            evicted,
            self.members.len()
        );
        added
    }

    pub fn objectives(&self) -> Vec<&[f64]> {
        self.members.iter().map(|m| m.objectives().unwrap_or(&[])).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN2: [Direction; 2] = [Direction::Minimize, Direction::Minimize];

    fn evaluated(genes: Vec<u8>, objectives: Vec<f64>) -> Individual {
        let mut individual = Individual::new(genes);
        individual.fitness = Some(objectives);
        individual
    }

    #[test]
    fn test_dominates_respects_directions() {
        assert!(dominates(&[1.0, 1.0], &[2.0, 2.0], &MIN2));
        assert!(dominates(&[1.0, 2.0], &[2.0, 2.0], &MIN2));
        assert!(!dominates(&[1.0, 3.0], &[2.0, 2.0], &MIN2));

        let mixed = [Direction::Minimize, Direction::Maximize];
        assert!(dominates(&[1.0, 3.0], &[2.0, 2.0], &mixed));
        assert!(!dominates(&[1.0, 1.0], &[2.0, 2.0], &mixed));
    }

    #[test]
    fn test_dominates_is_irreflexive_and_antisymmetric() {
        let points = [[0.0, 1.0], [1.0, 0.0], [0.5, 0.5], [1.0, 1.0], [0.0, 0.0]];
        for a in &points {
            assert!(!dominates(a, a, &MIN2));
            for b in &points {
                assert!(!(dominates(a, b, &MIN2) && dominates(b, a, &MIN2)));
            }
        }
    }

    #[test]
    fn test_dominates_is_transitive() {
        let a = [0.0, 0.0];
        let b = [0.5, 0.0];
        let c = [1.0, 0.5];
        assert!(dominates(&a, &b, &MIN2));
        assert!(dominates(&b, &c, &MIN2));
        assert!(dominates(&a, &c, &MIN2));
    }

    #[test]
    fn test_non_dominated_sort_fronts() {
        let data = vec![
            vec![1.0, 4.0], // 0: front 0
            vec![2.0, 2.0], // 1: front 0
            vec![4.0, 1.0], // 2: front 0
            vec![3.0, 3.0], // 3: front 1
            vec![5.0, 5.0], // 4: front 2
            vec![2.5, 4.5], // 5: front 1
        ];
        let objectives: Vec<&[f64]> = data.iter().map(|v| v.as_slice()).collect();
        let fronts = non_dominated_sort(&objectives, &MIN2);
        assert_eq!(fronts, vec![vec![0, 1, 2], vec![3, 5], vec![4]]);
    }

    #[test]
    fn test_non_dominated_sort_duplicates_share_front() {
        let data = vec![vec![1.0, 1.0], vec![1.0, 1.0], vec![2.0, 2.0]];
        let objectives: Vec<&[f64]> = data.iter().map(|v| v.as_slice()).collect();
        let fronts = non_dominated_sort(&objectives, &MIN2);
        assert_eq!(fronts, vec![vec![0, 1], vec![2]]);
    }

    #[test]
    fn test_crowding_distance_boundaries_infinite() {
        let data = vec![vec![0.0, 4.0], vec![1.0, 3.0], vec![3.0, 1.0], vec![4.0, 0.0]];
        let objectives: Vec<&[f64]> = data.iter().map(|v| v.as_slice()).collect();
        let distance = crowding_distance(&objectives);
        assert!(distance[0].is_infinite());
        assert!(distance[3].is_infinite());
        // (3 - 0) / 4 on each objective
        assert!((distance[1] - 1.5).abs() < 1e-12);
        assert!((distance[2] - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_crowding_distance_flat_objective() {
        let data = vec![vec![1.0, 0.0], vec![1.0, 1.0], vec![1.0, 3.0]];
        let objectives: Vec<&[f64]> = data.iter().map(|v| v.as_slice()).collect();
        let distance = crowding_distance(&objectives);
        // only the second objective contributes for the middle point: (3 - 0) / 3
        assert!((distance[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_select_returns_exactly_k() {
        let data: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64, (10 - i) as f64]).collect();
        let objectives: Vec<&[f64]> = data.iter().map(|v| v.as_slice()).collect();
        for k in 0..=10 {
            assert_eq!(select_nsga2_indices(&objectives, k, &MIN2).len(), k);
        }
    }

    #[test]
    fn test_select_fills_fronts_then_crowding() {
        let data = vec![
            vec![0.0, 4.0], // 0 front 0, boundary
            vec![1.0, 3.0], // 1 front 0
            vec![1.2, 2.8], // 2 front 0
            vec![4.0, 0.0], // 3 front 0, boundary
            vec![5.0, 5.0], // 4 front 1
            vec![6.0, 6.0], // 5 front 2
        ];
        let objectives: Vec<&[f64]> = data.iter().map(|v| v.as_slice()).collect();

        let chosen = select_nsga2_indices(&objectives, 5, &MIN2);
        assert_eq!(chosen, vec![0, 1, 2, 3, 4]);

        let chosen = select_nsga2_indices(&objectives, 3, &MIN2);
        assert_eq!(chosen.len(), 3);
        assert!(chosen.contains(&0));
        assert!(chosen.contains(&3));
        assert!(!chosen.contains(&4));
    }

    #[test]
    fn test_select_ties_keep_input_order() {
        let data = vec![vec![1.0, 1.0], vec![1.0, 1.0], vec![1.0, 1.0], vec![1.0, 1.0]];
        let objectives: Vec<&[f64]> = data.iter().map(|v| v.as_slice()).collect();
        // flat objectives: only the sorted boundaries are infinite, the rest tie at 0
        assert_eq!(select_nsga2_indices(&objectives, 3, &MIN2), vec![0, 3, 1]);
    }

    #[test]
    fn test_select_individuals() {
        let pop = vec![
            evaluated(vec![0, 0], vec![3.0, 3.0]),
            evaluated(vec![0, 1], vec![1.0, 1.0]),
            evaluated(vec![1, 1], vec![2.0, 2.0]),
        ];
        let survivors = select_nsga2(pop, 2, &MIN2);
        assert_eq!(survivors.len(), 2);
        assert_eq!(survivors[0].objectives(), Some(&[1.0, 1.0][..]));
        assert_eq!(survivors[1].objectives(), Some(&[2.0, 2.0][..]));
    }

    #[test]
    fn test_archive_keeps_only_non_dominated() {
        let mut archive = ParetoArchive::new();
        let first = vec![
            evaluated(vec![0, 0, 0], vec![2.0, 2.0]),
            evaluated(vec![0, 0, 1], vec![1.0, 3.0]),
            evaluated(vec![0, 1, 1], vec![3.0, 3.0]),
        ];
        assert_eq!(archive.update(first.iter(), &MIN2), 2);
        assert_eq!(archive.len(), 2);

        let second = vec![
            evaluated(vec![1, 0, 0], vec![1.5, 1.5]),
            evaluated(vec![1, 1, 0], vec![1.0, 3.0]),
        ];
        assert_eq!(archive.update(second.iter(), &MIN2), 1);
        let mut values: Vec<Vec<f64>> = archive.objectives().iter().map(|v| v.to_vec()).collect();
        values.sort_by(|a, b| a[0].total_cmp(&b[0]));
        assert_eq!(values, vec![vec![1.0, 3.0], vec![1.5, 1.5]]);

        let objectives = archive.objectives();
        for a in &objectives {
            for b in &objectives {
                assert!(!dominates(a, b, &MIN2));
            }
        }
    }

    #[test]
    fn test_archive_candidate_dominated_by_later_candidate() {
        let mut archive = ParetoArchive::new();
        let batch = vec![
            evaluated(vec![0, 1], vec![2.0, 2.0]),
            evaluated(vec![1, 0], vec![1.0, 1.0]),
        ];
        archive.update(batch.iter(), &MIN2);
        assert_eq!(archive.len(), 1);
        assert_eq!(archive.members[0].objectives(), Some(&[1.0, 1.0][..]));
    }

    #[test]
    fn test_archive_skips_unevaluated() {
        let mut archive = ParetoArchive::new();
        let pending = Individual::new(vec![1, 1]);
        assert_eq!(archive.update([&pending], &MIN2), 0);
        assert!(archive.is_empty());
    }
}
