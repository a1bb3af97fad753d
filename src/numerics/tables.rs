use once_cell::sync::Lazy;

/// The number of exactly tabulated log-factorials, and therefore the (exclusive) cap on the atom
/// count of a single marginal.
pub const FACT_TABLE_SIZE: usize = 1 << 20;

/// `log x`, rounded so the result never falls below the true value.
///
/// NOTE: Log-probabilities of neighbouring configurations are compared after summation, and a
/// best-first pop assumes those sums are monotone along any path from the mode. Rounding every
/// `log` *upward* (here: one ULP above the nearest-rounded result, with the exact `log 1 = 0`
/// case preserved) keeps numerical noise from ever pushing a sum below its true value and
/// re-ordering the frontier.
pub(crate) fn ln_up(x: f64) -> f64 {
    if x == 1.0 {
        0.0
    } else {
        x.ln().next_up()
    }
}

/// `−log(x!)` by table lookup.
///
/// Callers guarantee `x < FACT_TABLE_SIZE` — `Marginal` construction rejects larger atom counts,
/// and no configuration entry can exceed the atom count.
pub(crate) fn minus_log_factorial(x: u32) -> f64 {
    MINUS_LOG_FACTORIALS[x as usize]
}

static MINUS_LOG_FACTORIALS: Lazy<Box<[f64]>> = Lazy::new(|| {
    let mut table = vec![0.0; FACT_TABLE_SIZE];
    // log 0! and log 1! are exactly zero; everything else gets the upward nudge
    for (x, entry) in table.iter_mut().enumerate().skip(2) {
        *entry = -libm::lgamma(x as f64 + 1.0).next_up();
    }
    table.into_boxed_slice()
});

/// `log p` for an isotope probability.
///
/// If `p` is bit-for-bit one of the published natural abundances below, its log is taken from a
/// table computed once for the whole process, so every marginal fed the same published constant
/// gets the identical log-probability — equal-probability tie-breaks then behave reproducibly
/// across elements and runs.
pub(crate) fn log_abundance(p: f64) -> f64 {
    for (&known, &known_lprob) in NATURAL_ABUNDANCES.iter().zip(NATURAL_ABUNDANCE_LPROBS.iter()) {
        if known.to_bits() == p.to_bits() {
            return known_lprob;
        }
    }
    ln_up(p)
}

// IUPAC representative natural abundances for the elements most common in mass spectrometry. The
// full periodic table lives with the caller's isotope database; this table only has to make equal
// published constants produce bitwise-equal logs.
#[rustfmt::skip]
const NATURAL_ABUNDANCES: &[f64] = &[
    // Monoisotopic elements (F, Na, Al, P, I, ...)
    1.0,
    // H
    0.999_885, 0.000_115,
    // Li
    0.075_9, 0.924_1,
    // B
    0.199, 0.801,
    // C
    0.989_3, 0.010_7,
    // N
    0.996_36, 0.003_64,
    // O
    0.997_57, 0.000_38, 0.002_05,
    // Mg
    0.789_9, 0.100_0, 0.110_1,
    // Si
    0.922_23, 0.046_85, 0.030_92,
    // S
    0.949_9, 0.007_5, 0.042_5, 0.000_1,
    // Cl
    0.757_6, 0.242_4,
    // K
    0.932_581, 0.000_117, 0.067_302,
    // Ca
    0.969_41, 0.006_47, 0.001_35, 0.020_86, 0.000_04, 0.001_87,
    // Fe
    0.058_45, 0.917_54, 0.021_19, 0.002_82,
    // Cu
    0.691_5, 0.308_5,
    // Zn
    0.491_7, 0.277_3, 0.040_4, 0.184_5, 0.006_1,
    // Se
    0.008_9, 0.093_7, 0.076_3, 0.237_7, 0.496_1, 0.087_3,
    // Br
    0.506_9, 0.493_1,
];

static NATURAL_ABUNDANCE_LPROBS: Lazy<Box<[f64]>> =
    Lazy::new(|| NATURAL_ABUNDANCES.iter().map(|&p| ln_up(p)).collect());

// Module Tests ========================================================================================================

#[cfg(test)]
mod tests {
    use assert_float_eq::assert_float_absolute_eq;

    use super::*;

    #[test]
    fn ln_up_never_under_approximates() {
        for p in [0.000_115, 0.010_7, 0.5, 0.989_3, 0.999_885] {
            assert!(ln_up(p) >= p.ln());
            assert_float_absolute_eq!(ln_up(p), p.ln(), 1e-12);
        }
    }

    #[test]
    fn ln_up_is_exact_at_one() {
        assert_eq!(ln_up(1.0), 0.0);
    }

    #[test]
    fn small_log_factorials() {
        assert_eq!(minus_log_factorial(0), 0.0);
        assert_eq!(minus_log_factorial(1), 0.0);
        // 3! = 6, 10! = 3628800
        assert_float_absolute_eq!(minus_log_factorial(3), -(6.0_f64.ln()), 1e-12);
        assert_float_absolute_eq!(minus_log_factorial(10), -(3_628_800.0_f64.ln()), 1e-9);
    }

    #[test]
    fn log_factorials_never_under_approximate() {
        // Upward rounding of log(x!) means the negated table entry is never above the true value
        for x in [2_u32, 7, 100, 54_321] {
            let x_f64 = f64::from(x);
            assert!(-minus_log_factorial(x) >= libm::lgamma(x_f64 + 1.0));
        }
    }

    #[test]
    fn published_abundances_hit_the_table() {
        assert_eq!(log_abundance(0.989_3).to_bits(), ln_up(0.989_3).to_bits());
        assert_eq!(log_abundance(1.0), 0.0);
        // An unpublished probability falls through to the plain upward-rounded log
        assert_eq!(log_abundance(0.123_456).to_bits(), ln_up(0.123_456).to_bits());
    }
}
