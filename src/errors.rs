use miette::Diagnostic;
use thiserror::Error;

use crate::numerics::FACT_TABLE_SIZE;

pub type Result<T, E = MarginalError> = std::result::Result<T, E>;

#[derive(Debug, Diagnostic, Clone, PartialEq, Error)]
pub enum MarginalError {
    #[diagnostic(help(
        "natural isotope abundances are frequencies — every probability must lie in (0.0, 1.0]"
    ))]
    #[error("the probability {1} of isotope {0} lies outside of (0.0, 1.0]")]
    InvalidIsotopeProbability(usize, f64),

    #[diagnostic(help(
        "log-factorials are only tabulated exactly below the table size — split the element \
        across several marginals, or raise the table size at compile time"
    ))]
    #[error(
        "{0} atoms of a single element meet or exceed the factorial table size of {}",
        FACT_TABLE_SIZE
    )]
    AtomCountTooLarge(u32),

    #[diagnostic(help("every isotope needs both a mass and an abundance, and at least one is required"))]
    #[error("got {0} isotope masses but {1} isotope probabilities")]
    IsotopeTableMismatch(usize, usize),
}
