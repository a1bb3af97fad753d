//! The marginal distribution family: the validated base, its mode, and the three enumerators

pub(crate) mod layered;
mod mode;
pub(crate) mod precalculated;
pub(crate) mod trek;

use std::cmp::Ordering;

// External Crate Imports
use once_cell::sync::OnceCell;

// Local Crate Imports
use crate::{
    arena::{ConfArena, ConfId},
    errors::{MarginalError, Result},
    numerics::{self, FACT_TABLE_SIZE},
    Marginal, Massive, Mode,
};

// Public API ==========================================================================================================

impl Marginal {
    /// Build the marginal of one element from its isotope masses (daltons), natural abundances,
    /// and atom count.
    ///
    /// The abundances must each lie in `(0.0, 1.0]`; summing to one is the caller's
    /// responsibility and is deliberately not enforced (scaled tables are occasionally useful).
    pub fn new(masses: &[f64], probs: &[f64], atom_count: u32) -> Result<Self> {
        if masses.len() != probs.len() || probs.is_empty() {
            return Err(MarginalError::IsotopeTableMismatch(
                masses.len(),
                probs.len(),
            ));
        }
        for (isotope, &p) in probs.iter().enumerate() {
            if p <= 0.0 || p > 1.0 {
                return Err(MarginalError::InvalidIsotopeProbability(isotope, p));
            }
        }
        if atom_count as usize >= FACT_TABLE_SIZE {
            return Err(MarginalError::AtomCountTooLarge(atom_count));
        }

        let atom_lprobs = probs.iter().map(|&p| numerics::log_abundance(p)).collect();
        Ok(Self {
            atom_masses: masses.into(),
            atom_lprobs,
            atom_count,
            // NOTE: Taken from the same table as the −log cᵢ! terms of `unnormalized_lprob`, so
            // the two cancel bit-exactly and a single-isotope marginal gets log-probability 0.0
            loggamma_nominator: -numerics::minus_log_factorial(atom_count),
            mode: OnceCell::new(),
        })
    }

    #[must_use]
    pub fn isotope_count(&self) -> usize {
        self.atom_lprobs.len()
    }

    #[must_use]
    pub fn atom_count(&self) -> u32 {
        self.atom_count
    }

    /// The upward-rounded log-probabilities of the individual isotopes.
    #[must_use]
    pub fn atom_lprobs(&self) -> &[f64] {
        &self.atom_lprobs
    }

    /// The abundance-weighted average mass of a single atom.
    #[must_use]
    pub fn atom_average_mass(&self) -> f64 {
        let mut average = 0.0;
        for (&lprob, &mass) in self.atom_lprobs.iter().zip(self.atom_masses.iter()) {
            average += lprob.exp() * mass;
        }
        average
    }

    /// The variance of the theoretical mass distribution of the whole subisotopologue.
    #[must_use]
    pub fn variance(&self) -> f64 {
        let average = self.atom_average_mass();
        let mut variance = 0.0;
        for (&lprob, &mass) in self.atom_lprobs.iter().zip(self.atom_masses.iter()) {
            let deviation = mass - average;
            variance += lprob.exp() * deviation * deviation;
        }
        variance * f64::from(self.atom_count)
    }

    /// The log-probability of the least probable subisotopologue (every atom on the rarest
    /// isotope).
    #[must_use]
    pub fn smallest_lprob(&self) -> f64 {
        let min_lprob = self.atom_lprobs.iter().copied().fold(f64::INFINITY, f64::min);
        f64::from(self.atom_count) * min_lprob
    }

    /// Estimate `log |{c : logP(c) ≥ logP(mode) − r}|` for an ellipsoid radius `r`, from the
    /// closed-form ratio of the ellipsoid's volume to the simplex's.
    ///
    /// Returns `−∞` for single-isotope marginals, whose distribution is a point.
    #[must_use]
    pub fn log_size_estimate(&self, log_ellipsoid_radius: f64) -> f64 {
        if self.isotope_count() <= 1 {
            return f64::NEG_INFINITY;
        }

        let i = self.isotope_count() as f64;
        let k = i - 1.0;
        let n = f64::from(self.atom_count);
        let sum_lprobs: f64 = self.atom_lprobs.iter().sum();

        let log_v_simplex = k * n.ln() - libm::lgamma(i);
        let log_n_simplex = libm::lgamma(n + i) - libm::lgamma(n + 1.0) - libm::lgamma(i);
        let log_v_ellipsoid = (k * (n.ln() + std::f64::consts::PI.ln() + log_ellipsoid_radius)
            + sum_lprobs)
            * 0.5
            - libm::lgamma((i + 1.0) * 0.5);

        log_n_simplex + log_v_ellipsoid - log_v_simplex
    }

    /// A most-probable subisotopologue — computed by hill climbing on first use, then cached. If
    /// the mode isn't unique, this is one deterministic representative.
    #[must_use]
    pub fn mode_conf(&self) -> &[u32] {
        &self.mode().conf
    }

    /// The log-probability of the mode subisotopologue.
    #[must_use]
    pub fn mode_lprob(&self) -> f64 {
        self.mode().lprob
    }

    /// The mass of the mode subisotopologue.
    #[must_use]
    pub fn mode_mass(&self) -> f64 {
        numerics::conf_mass(self.mode_conf(), &self.atom_masses)
    }

    /// The multinomial log-probability of a configuration:
    /// `log(n!) + Σ (cᵢ·log pᵢ − log cᵢ!)`.
    pub(crate) fn lprob(&self, conf: &[u32]) -> f64 {
        self.loggamma_nominator + numerics::unnormalized_lprob(conf, &self.atom_lprobs)
    }

    fn mode(&self) -> &Mode {
        self.mode.get_or_init(|| {
            let conf = mode::mode_configuration(self.atom_count, &self.atom_lprobs);
            let lprob = self.lprob(&conf);
            Mode { conf, lprob }
        })
    }
}

// Massive Trait Implementation ========================================================================================

impl Massive for Marginal {
    fn lightest_mass(&self) -> f64 {
        let min_mass = self.atom_masses.iter().copied().fold(f64::INFINITY, f64::min);
        f64::from(self.atom_count) * min_mass
    }

    fn heaviest_mass(&self) -> f64 {
        let max_mass = self
            .atom_masses
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        f64::from(self.atom_count) * max_mass
    }

    fn monoisotopic_mass(&self) -> f64 {
        // NOTE: A strict `<` keeps the *first* most-abundant isotope when several tie
        let mut found_lprob = f64::NEG_INFINITY;
        let mut found_mass = 0.0;
        for (&lprob, &mass) in self.atom_lprobs.iter().zip(self.atom_masses.iter()) {
            if found_lprob < lprob {
                found_lprob = lprob;
                found_mass = mass;
            }
        }
        f64::from(self.atom_count) * found_mass
    }

    fn average_mass(&self) -> f64 {
        f64::from(self.atom_count) * self.atom_average_mass()
    }
}

// Shared Enumeration Order ============================================================================================

/// Descending log-probability, with exact ties resolved by ascending lexicographic comparison of
/// the configurations themselves.
///
/// Ties must be broken by *content*, not discovery order, so that sorted output is identical no
/// matter which route the exploration took to find the tied configurations.
pub(crate) fn conf_order_descending(
    base: &Marginal,
    arena: &ConfArena,
    a: ConfId,
    b: ConfId,
) -> Ordering {
    let (conf_a, conf_b) = (arena.get(a), arena.get(b));
    base.lprob(conf_b)
        .total_cmp(&base.lprob(conf_a))
        .then_with(|| conf_a.cmp(conf_b))
}

// Module Tests ========================================================================================================

#[cfg(test)]
mod tests {
    use assert_float_eq::assert_float_absolute_eq;

    use super::*;

    const CARBON_MASSES: [f64; 2] = [12.0, 13.003_354_835_07];
    const CARBON_PROBS: [f64; 2] = [0.989_3, 0.010_7];

    fn carbon(atom_count: u32) -> Marginal {
        Marginal::new(&CARBON_MASSES, &CARBON_PROBS, atom_count).unwrap()
    }

    #[test]
    fn construction_validates_the_isotope_table() {
        let err = Marginal::new(&[12.0], &[0.0], 5).unwrap_err();
        assert_eq!(err, MarginalError::InvalidIsotopeProbability(0, 0.0));

        let err = Marginal::new(&[12.0, 13.0], &[0.9, 1.1], 5).unwrap_err();
        assert_eq!(err, MarginalError::InvalidIsotopeProbability(1, 1.1));

        let err = Marginal::new(&[12.0, 13.0], &[1.0], 5).unwrap_err();
        assert_eq!(err, MarginalError::IsotopeTableMismatch(2, 1));

        let err = Marginal::new(&[], &[], 5).unwrap_err();
        assert_eq!(err, MarginalError::IsotopeTableMismatch(0, 0));

        let err = Marginal::new(&[12.0], &[1.0], u32::MAX).unwrap_err();
        assert_eq!(err, MarginalError::AtomCountTooLarge(u32::MAX));
    }

    #[test]
    fn single_isotope_marginal_is_a_point_distribution() {
        let marginal = Marginal::new(&[12.0], &[1.0], 10).unwrap();
        assert_eq!(marginal.mode_conf(), &[10]);
        assert_eq!(marginal.mode_lprob(), 0.0);
        assert_eq!(marginal.mode_mass(), 120.0);
        assert_eq!(marginal.log_size_estimate(3.0), f64::NEG_INFINITY);
    }

    #[test]
    fn scalar_observables() {
        let marginal = carbon(100);
        assert_eq!(marginal.lightest_mass(), 1200.0);
        assert_float_absolute_eq!(marginal.heaviest_mass(), 1300.335_483_507, 1e-9);
        assert_eq!(marginal.monoisotopic_mass(), 1200.0);

        let atom_average = 0.989_3 * 12.0 + 0.010_7 * 13.003_354_835_07;
        assert_float_absolute_eq!(marginal.atom_average_mass(), atom_average, 1e-9);
        assert_float_absolute_eq!(marginal.average_mass(), 100.0 * atom_average, 1e-7);

        assert_float_absolute_eq!(marginal.smallest_lprob(), 100.0 * (0.010_7_f64).ln(), 1e-9);
    }

    #[test]
    fn variance_scales_linearly_with_atom_count() {
        assert_float_absolute_eq!(carbon(200).variance(), 2.0 * carbon(100).variance(), 1e-9);
    }

    #[test]
    fn carbon_100_mode() {
        let marginal = carbon(100);
        assert_eq!(marginal.mode_conf(), &[99, 1]);
        assert_float_absolute_eq!(
            marginal.mode_lprob(),
            (100.0_f64 * 0.989_3_f64.powi(99) * 0.010_7).ln(),
            1e-9
        );
    }

    #[test]
    fn mode_is_computed_once() {
        let marginal = carbon(100);
        let first = marginal.mode_conf().as_ptr();
        let second = marginal.mode_conf().as_ptr();
        assert_eq!(first, second);
    }

    #[test]
    fn log_size_estimate_grows_with_the_radius() {
        let marginal = carbon(100);
        assert!(marginal.log_size_estimate(2.0) < marginal.log_size_estimate(4.0));
    }

    #[test]
    fn identical_inputs_give_identical_lprobs() {
        let (a, b) = (carbon(100), carbon(100));
        assert_eq!(a.mode_lprob().to_bits(), b.mode_lprob().to_bits());
        for (lp_a, lp_b) in a.atom_lprobs().iter().zip(b.atom_lprobs()) {
            assert_eq!(lp_a.to_bits(), lp_b.to_bits());
        }
    }
}
