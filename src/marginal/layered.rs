//! Threshold enumeration with an extendable cutoff
//!
//! The layered marginal answers the "I don't know the right threshold yet" workflow: lower the
//! cutoff as many times as needed, and each [`extend`](crate::LayeredMarginal::extend) only
//! explores the newly uncovered shell. Between calls, the boundary configurations that fell below
//! the cutoff (the fringe) are kept alive as the seeds of the next layer.

// Local Crate Imports
use crate::{
    arena::{ConfArena, ConfSet},
    marginal::conf_order_descending,
    numerics,
    LayeredMarginal, Marginal, DEFAULT_BLOCK_CONFS, DEFAULT_HASH_CAPACITY,
};

// Public API ==========================================================================================================

impl LayeredMarginal {
    /// Specialize a [`Marginal`] for layered enumeration. No subisotopologue is accepted until
    /// the first [`extend`](LayeredMarginal::extend).
    #[must_use]
    pub fn new(marginal: Marginal) -> Self {
        Self::with_capacity(marginal, DEFAULT_BLOCK_CONFS, DEFAULT_HASH_CAPACITY)
    }

    /// As [`new`](LayeredMarginal::new), with explicit arena block and visited-set capacities.
    #[must_use]
    pub fn with_capacity(marginal: Marginal, block_confs: usize, hash_capacity: usize) -> Self {
        let mut arena = ConfArena::new(marginal.isotope_count(), block_confs);
        let mode_id = arena.push(marginal.mode_conf());

        Self {
            base: marginal,
            arena,
            // A log-probability: "no layer accepted yet", so every neighbour the first extension
            // meets is trivially below it
            current_threshold: f64::INFINITY,
            confs: Vec::new(),
            fringe: vec![mode_id],
            // Guardians on both ends — see `log_prob`
            lprobs: vec![f64::INFINITY, f64::NEG_INFINITY],
            probs: Vec::new(),
            masses: Vec::new(),
            sorted_up_to: 0,
            hash_capacity,
        }
    }

    /// Lower the cutoff to `new_threshold`, accepting every subisotopologue with log-probability
    /// at or above it. Returns `false` (and does nothing) once the fringe is empty, since
    /// nothing then remains below the current cutoff.
    pub fn extend(&mut self, new_threshold: f64) -> bool {
        if self.fringe.is_empty() {
            return false;
        }

        let mut new_fringe = Vec::new();
        let mut visited = ConfSet::with_capacity(self.hash_capacity);
        for &id in &self.fringe {
            visited.insert(&self.arena, id);
        }

        let isotope_count = self.base.isotope_count();
        let mut current = vec![0_u32; isotope_count];
        while let Some(id) = self.fringe.pop() {
            let current_lprob = self.base.lprob(self.arena.get(id));

            // Still below the new cutoff: this configuration stays on the fringe for a later,
            // deeper extension
            if current_lprob < new_threshold {
                new_fringe.push(id);
                continue;
            }

            self.confs.push(id);
            current.copy_from_slice(self.arena.get(id));
            for acceptor in 0..isotope_count {
                for donor in 0..isotope_count {
                    if acceptor == donor || current[donor] == 0 {
                        continue;
                    }

                    current[acceptor] += 1;
                    current[donor] -= 1;
                    let neighbour_lprob = self.base.lprob(&current);

                    // Expansion only walks downhill — flat steps tie-break on the donor index to
                    // rule out ping-pong between equal configurations — and only below the
                    // previous cutoff, since everything above it was accepted in an earlier layer
                    if neighbour_lprob < self.current_threshold
                        && (current_lprob > neighbour_lprob
                            || (current_lprob == neighbour_lprob && acceptor > donor))
                        && !visited.contains(&self.arena, &current)
                    {
                        let neighbour_id = self.arena.push(&current);
                        visited.insert(&self.arena, neighbour_id);
                        if neighbour_lprob >= new_threshold {
                            self.fringe.push(neighbour_id);
                        } else {
                            new_fringe.push(neighbour_id);
                        }
                    }

                    current[acceptor] -= 1;
                    current[donor] += 1;
                }
            }
        }

        self.current_threshold = new_threshold;
        self.fringe = new_fringe;

        // Each layer is sorted within itself; earlier layers are already in place and never move
        let (base, arena) = (&self.base, &self.arena);
        self.confs[self.sorted_up_to..]
            .sort_unstable_by(|&a, &b| conf_order_descending(base, arena, a, b));

        self.lprobs.pop(); // the −∞ guardian comes off while the arrays grow...
        for &id in &self.confs[self.sorted_up_to..] {
            let lprob = base.lprob(arena.get(id));
            self.lprobs.push(lprob);
            self.probs.push(lprob.exp());
            self.masses
                .push(numerics::conf_mass(arena.get(id), &base.atom_masses));
        }
        self.lprobs.push(f64::NEG_INFINITY); // ...and goes back on afterwards
        self.sorted_up_to = self.confs.len();

        true
    }

    /// The number of accepted subisotopologues.
    #[must_use]
    pub fn len(&self) -> usize {
        self.confs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.confs.is_empty()
    }

    /// The log-probability of the `idx`-th subisotopologue. Both ends are guarded: `idx == -1`
    /// reads `+∞` and `idx == len()` reads `−∞`, so consumers can scan without bounds branches.
    #[must_use]
    pub fn log_prob(&self, idx: isize) -> f64 {
        self.lprobs[(idx + 1) as usize]
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

    /// The cutoff of the most recent extension (`+∞` before the first).
    #[must_use]
    pub fn current_threshold(&self) -> f64 {
        self.current_threshold
    }

    /// The smallest mass accepted so far.
    #[must_use]
    pub fn min_mass(&self) -> f64 {
        self.masses.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// The largest mass accepted so far.
    #[must_use]
    pub fn max_mass(&self) -> f64 {
        self.masses.iter().copied().fold(f64::NEG_INFINITY, f64::max)
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
    use std::collections::HashSet;

    use assert_float_eq::assert_float_absolute_eq;

    use super::*;
    use crate::Massive;

    fn carbon(atom_count: u32) -> Marginal {
        Marginal::new(&[12.0, 13.003_354_835_07], &[0.989_3, 0.010_7], atom_count).unwrap()
    }

    fn accepted_set(layered: &LayeredMarginal) -> HashSet<Vec<u32>> {
        (0..layered.len())
            .map(|idx| layered.configuration(idx).to_vec())
            .collect()
    }

    #[test]
    fn layers_refine_monotonically() {
        let mut layered = LayeredMarginal::new(carbon(100));

        assert!(layered.extend(0.1_f64.ln()));
        let first = accepted_set(&layered);
        assert!(!first.is_empty());

        assert!(layered.extend(1e-3_f64.ln()));
        let second = accepted_set(&layered);
        assert!(first.is_subset(&second));

        assert!(layered.extend(1e-6_f64.ln()));
        let third = accepted_set(&layered);
        assert!(second.is_subset(&third));

        // Everything the deeper layers added sits below the first cutoff
        let marginal = layered.marginal();
        for conf in third.difference(&first) {
            assert!(marginal.lprob(conf) < 0.1_f64.ln());
        }
    }

    #[test]
    fn earlier_layers_stay_in_place() {
        let mut layered = LayeredMarginal::new(carbon(100));
        layered.extend(0.1_f64.ln());
        let first: Vec<_> = (0..layered.len())
            .map(|idx| layered.configuration(idx).to_vec())
            .collect();

        layered.extend(1e-6_f64.ln());
        for (idx, conf) in first.iter().enumerate() {
            assert_eq!(layered.configuration(idx), conf.as_slice());
        }
    }

    #[test]
    fn each_layer_is_sorted_within_itself() {
        let mut layered = LayeredMarginal::new(carbon(100));
        let mut layer_start = 0;
        for threshold in [0.1_f64.ln(), 1e-3_f64.ln(), 1e-6_f64.ln()] {
            layered.extend(threshold);
            for idx in layer_start + 1..layered.len() {
                let idx = idx as isize;
                assert!(layered.log_prob(idx) <= layered.log_prob(idx - 1));
            }
            layer_start = layered.len();
        }
    }

    #[test]
    fn a_cutoff_above_the_mode_accepts_nothing_but_keeps_the_fringe() {
        let mut layered = LayeredMarginal::new(carbon(100));
        assert!(layered.extend(0.5_f64.ln()));
        assert!(layered.is_empty());

        // The mode is still on the fringe, so a deeper cutoff picks it up
        assert!(layered.extend(0.1_f64.ln()));
        assert_eq!(layered.configuration(0), &[99, 1]);
    }

    #[test]
    fn guarded_reads_at_both_ends() {
        let mut layered = LayeredMarginal::new(carbon(100));
        layered.extend(0.1_f64.ln());

        assert_eq!(layered.log_prob(-1), f64::INFINITY);
        assert_eq!(layered.log_prob(layered.len() as isize), f64::NEG_INFINITY);
        assert!(layered.log_prob(0) < 0.0);
    }

    #[test]
    fn an_exhausted_marginal_stops_extending() {
        let mut layered = LayeredMarginal::new(carbon(10));
        assert!(layered.extend(f64::NEG_INFINITY));
        // All 11 configurations of C-10 are now accepted and the fringe is gone
        assert_eq!(layered.len(), 11);
        assert!(!layered.extend(f64::NEG_INFINITY));

        let total: f64 = (0..layered.len()).map(|idx| layered.prob(idx)).sum();
        assert_float_absolute_eq!(total, 1.0, 1e-9);
    }

    #[test]
    fn masses_span_the_accepted_layer() {
        let mut layered = LayeredMarginal::new(carbon(100));
        layered.extend(1e-6_f64.ln());

        assert_eq!(layered.min_mass(), 1200.0);
        assert!(layered.max_mass() > 1200.0);
        assert!(layered.max_mass() <= layered.marginal().heaviest_mass());
    }
}
