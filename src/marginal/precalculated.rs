//! Eager enumeration above a fixed log-probability cutoff

// Local Crate Imports
use crate::{
    arena::{ConfArena, ConfSet},
    marginal::conf_order_descending,
    numerics,
    Marginal, PrecalculatedMarginal, DEFAULT_BLOCK_CONFS, DEFAULT_HASH_CAPACITY,
};

// Public API ==========================================================================================================

impl PrecalculatedMarginal {
    /// Specialize a [`Marginal`], memoizing every subisotopologue with log-probability at or
    /// above `lcutoff`. With `sort`, configurations are stored in descending log-probability
    /// order (ties broken by the configurations themselves, so the order is reproducible).
    #[must_use]
    pub fn new(marginal: Marginal, lcutoff: f64, sort: bool) -> Self {
        Self::with_capacity(marginal, lcutoff, sort, DEFAULT_BLOCK_CONFS, DEFAULT_HASH_CAPACITY)
    }

    /// As [`new`](PrecalculatedMarginal::new), with explicit arena block and visited-set
    /// capacities.
    #[must_use]
    pub fn with_capacity(
        marginal: Marginal,
        lcutoff: f64,
        sort: bool,
        block_confs: usize,
        hash_capacity: usize,
    ) -> Self {
        let isotope_count = marginal.isotope_count();
        let mut arena = ConfArena::new(isotope_count, block_confs);
        let mut visited = ConfSet::with_capacity(hash_capacity);
        let mut confs = Vec::new();

        // The feasible set is connected and contains the mode (when non-empty), so a breadth-
        // first sweep from the mode visits all of it. The configurations vector doubles as the
        // BFS queue. An over-threshold check on the mode itself must come first — nothing else
        // filters the seed
        if marginal.mode_lprob() >= lcutoff {
            let mode_id = arena.push(marginal.mode_conf());
            visited.insert(&arena, mode_id);
            confs.push(mode_id);
        }

        let mut current = vec![0_u32; isotope_count];
        let mut next = 0;
        while next < confs.len() {
            current.copy_from_slice(arena.get(confs[next]));
            next += 1;

            for acceptor in 0..isotope_count {
                for donor in 0..isotope_count {
                    if acceptor == donor || current[donor] == 0 {
                        continue;
                    }

                    current[acceptor] += 1;
                    current[donor] -= 1;

                    if !visited.contains(&arena, &current) && marginal.lprob(&current) >= lcutoff {
                        let id = arena.push(&current);
                        visited.insert(&arena, id);
                        confs.push(id);
                    }

                    current[acceptor] -= 1;
                    current[donor] += 1;
                }
            }
        }

        if sort {
            confs.sort_unstable_by(|&a, &b| conf_order_descending(&marginal, &arena, a, b));
        }

        let mut lprobs = Vec::with_capacity(confs.len() + 1);
        let mut probs = Vec::with_capacity(confs.len());
        let mut masses = Vec::with_capacity(confs.len());
        for &id in &confs {
            let lprob = marginal.lprob(arena.get(id));
            lprobs.push(lprob);
            probs.push(lprob.exp());
            masses.push(numerics::conf_mass(arena.get(id), &marginal.atom_masses));
        }
        lprobs.push(f64::NEG_INFINITY);

        Self {
            base: marginal,
            arena,
            confs,
            lprobs,
            probs,
            masses,
        }
    }

    /// The number of memoized subisotopologues.
    #[must_use]
    pub fn len(&self) -> usize {
        self.confs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.confs.is_empty()
    }

    /// Is `idx` within the memoized range?
    #[must_use]
    pub fn in_range(&self, idx: usize) -> bool {
        idx < self.confs.len()
    }

    /// The log-probability of the `idx`-th subisotopologue. `idx == len()` is a legal read and
    /// yields the `−∞` sentinel, so consumers can compare without a bounds branch.
    #[must_use]
    pub fn log_prob(&self, idx: usize) -> f64 {
        self.lprobs[idx]
    }

    #[must_use]
    pub fn prob(&self, idx: usize) -> f64 {
        self.probs[idx]
    }

    #[must_use]
    pub fn mass(&self, idx: usize) -> f64 {
        self.masses[idx]
    }

    #[must_use]
    pub fn configuration(&self, idx: usize) -> &[u32] {
        self.arena.get(self.confs[idx])
    }

    #[must_use]
    pub fn mode_lprob(&self) -> f64 {
        self.base.mode_lprob()
    }

    #[must_use]
    pub fn marginal(&self) -> &Marginal {
        &self.base
    }
}

// Module Tests ========================================================================================================

#[cfg(test)]
mod tests {
    use assert_float_eq::assert_float_absolute_eq;

    use super::*;

    fn carbon(atom_count: u32) -> Marginal {
        Marginal::new(&[12.0, 13.003_354_835_07], &[0.989_3, 0.010_7], atom_count).unwrap()
    }

    #[test]
    fn threshold_keeps_only_the_likely_heavy_isotopes() {
        let precalculated = PrecalculatedMarginal::new(carbon(100), 1e-6_f64.ln(), true);

        // Around C-100, only a handful of heavy carbons clear one-in-a-million
        assert!((8..=12).contains(&precalculated.len()));
        for idx in 0..precalculated.len() {
            let conf = precalculated.configuration(idx);
            assert!(conf[1] <= 11);
            assert_eq!(conf[0] + conf[1], 100);
            assert!(precalculated.log_prob(idx) >= 1e-6_f64.ln());
        }

        let total: f64 = (0..precalculated.len()).map(|idx| precalculated.prob(idx)).sum();
        assert_float_absolute_eq!(total, 1.0, 1e-4);
    }

    #[test]
    fn sorted_output_is_descending() {
        let precalculated = PrecalculatedMarginal::new(carbon(100), 1e-9_f64.ln(), true);
        for idx in 1..precalculated.len() {
            assert!(precalculated.log_prob(idx) <= precalculated.log_prob(idx - 1));
        }
        assert_eq!(precalculated.configuration(0), &[99, 1]);
    }

    #[test]
    fn sentinel_guards_the_end() {
        let precalculated = PrecalculatedMarginal::new(carbon(100), 1e-6_f64.ln(), true);
        let len = precalculated.len();
        assert!(precalculated.in_range(len - 1));
        assert!(!precalculated.in_range(len));
        assert_eq!(precalculated.log_prob(len), f64::NEG_INFINITY);
    }

    #[test]
    fn unsorted_collects_the_same_set() {
        let sorted = PrecalculatedMarginal::new(carbon(100), 1e-6_f64.ln(), true);
        let unsorted = PrecalculatedMarginal::new(carbon(100), 1e-6_f64.ln(), false);
        assert_eq!(sorted.len(), unsorted.len());

        let mut sorted_confs: Vec<_> = (0..sorted.len()).map(|idx| sorted.configuration(idx).to_vec()).collect();
        let mut unsorted_confs: Vec<_> =
            (0..unsorted.len()).map(|idx| unsorted.configuration(idx).to_vec()).collect();
        sorted_confs.sort_unstable();
        unsorted_confs.sort_unstable();
        assert_eq!(sorted_confs, unsorted_confs);
    }

    #[test]
    fn unreachable_cutoff_memoizes_nothing() {
        let precalculated = PrecalculatedMarginal::new(carbon(100), 0.5_f64.ln(), true);
        assert!(precalculated.is_empty());
        assert_eq!(precalculated.log_prob(0), f64::NEG_INFINITY);
    }

    #[test]
    fn probabilities_are_exponentiated_log_probabilities() {
        let precalculated = PrecalculatedMarginal::new(carbon(100), 1e-6_f64.ln(), false);
        for idx in 0..precalculated.len() {
            assert_eq!(
                precalculated.prob(idx).to_bits(),
                precalculated.log_prob(idx).exp().to_bits()
            );
        }
    }
}
