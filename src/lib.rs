//! Marginal isotopic fine structure: the multinomial distribution of isotopes over the atoms of a
//! single element (a subisotopologue), enumerable lazily in decreasing probability order or
//! eagerly above a log-probability cutoff

pub mod arena;
pub mod errors;
mod marginal;
pub mod numerics;

use std::collections::BinaryHeap;

// External Crate Imports
use once_cell::sync::OnceCell;

// Local Crate Imports
use arena::{ConfArena, ConfId, ConfSet};
use marginal::trek::FrontierEntry;
use numerics::Summator;

pub use errors::{MarginalError, Result};

// NOTE: Both are starting sizes, not limits; the arena grows block by block and the visited set
// rehashes as needed
const DEFAULT_BLOCK_CONFS: usize = 1000;
const DEFAULT_HASH_CAPACITY: usize = 1000;

// NOTE: Configurations are plain `&[u32]` slices of length `isotope_count`, summing to
// `atom_count`. Owned copies live either in a `ConfArena` (everything an enumerator discovers) or
// in a `Box<[u32]>` (the cached mode)

/// The marginal distribution of isotopes over all atoms of one element — e.g. the C₂₀₀ part of
/// C₂₀₀H₄₀₂. Construction validates the isotope table; the mode subisotopologue is located on
/// first use and cached. A `Marginal` is consumed (moved) into one of [`MarginalTrek`],
/// [`PrecalculatedMarginal`], or [`LayeredMarginal`] to be enumerated.
#[derive(Clone, Debug)]
pub struct Marginal {
    atom_masses: Box<[f64]>,
    atom_lprobs: Box<[f64]>,
    atom_count: u32,
    loggamma_nominator: f64,
    mode: OnceCell<Mode>,
}

#[derive(Clone, Debug)]
struct Mode {
    conf: Box<[u32]>,
    lprob: f64,
}

/// Lazy best-first enumeration of a [`Marginal`] in non-increasing log-probability order.
pub struct MarginalTrek {
    base: Marginal,
    arena: ConfArena,
    visited: ConfSet,
    frontier: BinaryHeap<FrontierEntry>,
    confs: Vec<ConfId>,
    lprobs: Vec<f64>,
    masses: Vec<f64>,
    total_prob: Summator,
    scratch: Box<[u32]>,
}

/// Eager enumeration of every subisotopologue with log-probability at or above a fixed cutoff.
pub struct PrecalculatedMarginal {
    base: Marginal,
    arena: ConfArena,
    confs: Vec<ConfId>,
    // NOTE: One slot longer than `confs` — `lprobs[len]` is a −∞ sentinel for branch-free
    // comparisons by consumers
    lprobs: Vec<f64>,
    probs: Vec<f64>,
    masses: Vec<f64>,
}

/// A [`PrecalculatedMarginal`] whose cutoff can be lowered repeatedly; each `extend` reuses all
/// prior work by keeping the fringe of boundary subisotopologues alive between calls.
pub struct LayeredMarginal {
    base: Marginal,
    arena: ConfArena,
    current_threshold: f64,
    confs: Vec<ConfId>,
    fringe: Vec<ConfId>,
    // NOTE: Guarded on both ends — `lprobs[0]` is +∞ and `lprobs[len + 1]` is −∞, so accessors
    // index at an offset of one and `log_prob(-1)` is a legal read
    lprobs: Vec<f64>,
    probs: Vec<f64>,
    masses: Vec<f64>,
    sorted_up_to: usize,
    hash_capacity: usize,
}

// =====================================================================================================================

pub trait Massive {
    /// The mass with every atom assigned the lightest isotope.
    fn lightest_mass(&self) -> f64;

    /// The mass with every atom assigned the heaviest isotope.
    fn heaviest_mass(&self) -> f64;

    /// The mass with every atom assigned the most abundant isotope. Frequently, but not always,
    /// equal to [`lightest_mass`](Massive::lightest_mass).
    fn monoisotopic_mass(&self) -> f64;

    /// The abundance-weighted theoretical average mass.
    fn average_mass(&self) -> f64;
}

// Blanket impls

macro_rules! massive_ref_impls {
    ($($ref_type:ty),+ $(,)?) => {
        $(
            impl<T: Massive> Massive for $ref_type {
                fn lightest_mass(&self) -> f64 {
                    (**self).lightest_mass()
                }

                fn heaviest_mass(&self) -> f64 {
                    (**self).heaviest_mass()
                }

                fn monoisotopic_mass(&self) -> f64 {
                    (**self).monoisotopic_mass()
                }

                fn average_mass(&self) -> f64 {
                    (**self).average_mass()
                }
            }
        )+
    };
}

massive_ref_impls!(&T, &mut T, Box<T>);

macro_rules! massive_base_impls {
    ($($enumerator:ty),+ $(,)?) => {
        $(
            impl Massive for $enumerator {
                fn lightest_mass(&self) -> f64 {
                    self.base.lightest_mass()
                }

                fn heaviest_mass(&self) -> f64 {
                    self.base.heaviest_mass()
                }

                fn monoisotopic_mass(&self) -> f64 {
                    self.base.monoisotopic_mass()
                }

                fn average_mass(&self) -> f64 {
                    self.base.average_mass()
                }
            }
        )+
    };
}

massive_base_impls!(MarginalTrek, PrecalculatedMarginal, LayeredMarginal);
