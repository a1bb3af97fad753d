//! Numerically careful building blocks: upward-rounded logarithms, the exact log-factorial table,
//! and compensated summation

mod summator;
mod tables;

pub use summator::Summator;
pub use tables::FACT_TABLE_SIZE;
pub(crate) use tables::{log_abundance, ln_up, minus_log_factorial};

/// The mass of a subisotopologue: `Σ cᵢ·massᵢ`.
pub(crate) fn conf_mass(conf: &[u32], atom_masses: &[f64]) -> f64 {
    let mut mass = 0.0;
    for (&count, &atom_mass) in conf.iter().zip(atom_masses) {
        mass += f64::from(count) * atom_mass;
    }
    mass
}

/// The multinomial log-density of a subisotopologue without its `log(n!)` prefactor:
/// `Σ (cᵢ·log pᵢ − log cᵢ!)`.
///
/// The sum is accumulated left to right so that recomputing it for the same configuration is
/// bit-identical — the enumerators rely on that when comparing stored against recomputed values.
pub(crate) fn unnormalized_lprob(conf: &[u32], atom_lprobs: &[f64]) -> f64 {
    let mut lprob = 0.0;
    for (&count, &atom_lprob) in conf.iter().zip(atom_lprobs) {
        lprob += minus_log_factorial(count) + f64::from(count) * atom_lprob;
    }
    lprob
}

// Module Tests ========================================================================================================
