//! Lazy best-first enumeration in non-increasing log-probability order

use std::{cmp::Ordering, collections::BinaryHeap};

// External Crate Imports
use smallvec::SmallVec;

// Local Crate Imports
use crate::{
    arena::{ConfArena, ConfId, ConfSet},
    numerics::{self, Summator},
    Marginal, MarginalTrek, DEFAULT_BLOCK_CONFS, DEFAULT_HASH_CAPACITY,
};

// Frontier Ordering ===================================================================================================

// NOTE: Most elements have a handful of stable isotopes, so the inline capacity keeps frontier
// keys off the heap in practice
type ConfKey = SmallVec<[u32; 8]>;

/// A frontier configuration, keyed for the max-heap.
///
/// The entry carries its own copy of the configuration: the heap must order entries by content to
/// break exact log-probability ties, and an `Ord` implementation can't reach back into the arena.
pub(crate) struct FrontierEntry {
    pub(crate) lprob: f64,
    pub(crate) conf: ConfId,
    pub(crate) key: ConfKey,
}

impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher log-probability pops first; exact ties pop in ascending lexicographic order of
        // the configurations (hence the reversed key comparison under a max-heap)
        self.lprob
            .total_cmp(&other.lprob)
            .then_with(|| other.key.cmp(&self.key))
    }
}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for FrontierEntry {
    fn eq(&self, other: &Self) -> bool {
        // NOTE: This must agree with the `Ord` implementation above, which is *not* what a
        // derived `PartialEq` would do — `total_cmp` distinguishes floats that `==` does not
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FrontierEntry {}

// Public API ==========================================================================================================

impl MarginalTrek {
    /// Specialize a [`Marginal`] for lazy best-first enumeration.
    ///
    /// The mode is seeded into the frontier and one expansion step runs immediately, so index 0
    /// (the mode) is always available.
    #[must_use]
    pub fn new(marginal: Marginal) -> Self {
        Self::with_capacity(marginal, DEFAULT_BLOCK_CONFS, DEFAULT_HASH_CAPACITY)
    }

    /// As [`new`](MarginalTrek::new), with explicit arena block and visited-set capacities.
    #[must_use]
    pub fn with_capacity(marginal: Marginal, block_confs: usize, hash_capacity: usize) -> Self {
        let isotope_count = marginal.isotope_count();
        let mut arena = ConfArena::new(isotope_count, block_confs);
        let mut visited = ConfSet::with_capacity(hash_capacity);
        let mut frontier = BinaryHeap::new();

        let mode_id = arena.push(marginal.mode_conf());
        visited.insert(&arena, mode_id);
        frontier.push(FrontierEntry {
            lprob: marginal.mode_lprob(),
            conf: mode_id,
            key: ConfKey::from_slice(marginal.mode_conf()),
        });

        let mut trek = Self {
            scratch: vec![0; isotope_count].into_boxed_slice(),
            base: marginal,
            arena,
            visited,
            frontier,
            confs: Vec::new(),
            lprobs: Vec::new(),
            masses: Vec::new(),
            total_prob: Summator::default(),
        };
        trek.advance();
        trek
    }

    /// Pop the next most probable subisotopologue off the frontier, memoize it, and push its
    /// unvisited neighbours. Returns `false` once the whole marginal has been enumerated.
    pub fn advance(&mut self) -> bool {
        let Some(FrontierEntry { lprob, conf, key }) = self.frontier.pop() else {
            return false;
        };

        self.confs.push(conf);
        self.lprobs.push(lprob);
        self.masses.push(numerics::conf_mass(&key, &self.base.atom_masses));
        self.total_prob.add(lprob.exp());

        let isotope_count = key.len();
        for acceptor in 0..isotope_count {
            for donor in 0..isotope_count {
                // The acceptor must differ from the donor, and the donor must have an atom to
                // give up — both keep the neighbour on the simplex
                if acceptor == donor || key[donor] == 0 {
                    continue;
                }

                self.scratch.copy_from_slice(&key);
                self.scratch[acceptor] += 1;
                self.scratch[donor] -= 1;

                if !self.visited.contains(&self.arena, &self.scratch) {
                    let id = self.arena.push(&self.scratch);
                    self.visited.insert(&self.arena, id);
                    self.frontier.push(FrontierEntry {
                        lprob: self.base.lprob(&self.scratch),
                        conf: id,
                        key: ConfKey::from_slice(&self.scratch),
                    });
                }
            }
        }

        true
    }

    /// Expand until the `idx`-th most probable subisotopologue is memoized. Returns `false` if
    /// the marginal has fewer than `idx + 1` configurations in total.
    pub fn ensure_index(&mut self, idx: usize) -> bool {
        while self.confs.len() <= idx {
            if !self.advance() {
                return false;
            }
        }
        true
    }

    /// Expand until the accumulated probability reaches `cutoff`, returning the length of the
    /// emitted prefix whose total meets it (or the full count if the marginal is exhausted
    /// first).
    ///
    /// Already-memoized configurations are re-scanned with a fresh compensated sum first, so
    /// calling this twice with the same cutoff is idempotent.
    pub fn process_until_cutoff(&mut self, cutoff: f64) -> usize {
        let mut prefix_prob = Summator::default();
        for (idx, &lprob) in self.lprobs.iter().enumerate() {
            prefix_prob.add(lprob.exp());
            if prefix_prob.total() >= cutoff {
                return idx + 1;
            }
        }

        while self.total_prob.total() < cutoff && self.advance() {}
        self.lprobs.len()
    }

    /// The number of subisotopologues memoized so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.confs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.confs.is_empty()
    }

    #[must_use]
    pub fn log_prob(&self, idx: usize) -> f64 {
        self.lprobs[idx]
    }

    #[must_use]
    pub fn prob(&self, idx: usize) -> f64 {
        self.lprobs[idx].exp()
    }

    #[must_use]
    pub fn mass(&self, idx: usize) -> f64 {
        self.masses[idx]
    }

    #[must_use]
    pub fn configuration(&self, idx: usize) -> &[u32] {
        self.arena.get(self.confs[idx])
    }

    /// The compensated sum of every probability emitted so far.
    #[must_use]
    pub fn total_prob(&self) -> f64 {
        self.total_prob.total()
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
