//! Locating the mode of a marginal

use crate::numerics;

/// Find a most-probable subisotopologue by hill climbing.
///
/// The climb starts from a configuration near the mean of the multinomial (the mean lies close to
/// the mode) and repeatedly applies the best unit transfer until no transfer improves the
/// log-density. On equal log-density, the transfer with the larger donor index wins, which pins
/// the climb to one deterministic representative when the mode isn't unique.
pub(crate) fn mode_configuration(atom_count: u32, atom_lprobs: &[f64]) -> Box<[u32]> {
    let mut conf = seed(atom_count, atom_lprobs);
    climb(&mut conf, atom_lprobs);
    conf
}

/// `cᵢ = ⌊n·pᵢ⌋ + 1`, then repair the total back to `n`.
fn seed(atom_count: u32, atom_lprobs: &[f64]) -> Box<[u32]> {
    let n = f64::from(atom_count);
    let mut conf: Box<[u32]> = atom_lprobs
        .iter()
        .map(|&lprob| (n * lprob.exp()) as u32 + 1)
        .collect();

    let assigned: u64 = conf.iter().map(|&count| u64::from(count)).sum();
    let target = u64::from(atom_count);
    if assigned < target {
        // Too few atoms assigned: pile the shortfall onto the first isotope
        conf[0] += (target - assigned) as u32;
    } else {
        // Too many: drain the excess left to right, never taking a count below zero
        let mut excess = assigned - target;
        for count in conf.iter_mut() {
            let taken = u64::from(*count).min(excess);
            *count -= taken as u32;
            excess -= taken;
            if excess == 0 {
                break;
            }
        }
    }

    conf
}

fn climb(conf: &mut [u32], atom_lprobs: &[f64]) {
    let isotope_count = conf.len();
    let mut lprob = numerics::unnormalized_lprob(conf, atom_lprobs);

    let mut improved = true;
    while improved {
        improved = false;
        for donor in 0..isotope_count {
            for acceptor in 0..isotope_count {
                if donor == acceptor || conf[donor] == 0 {
                    continue;
                }

                conf[donor] -= 1;
                conf[acceptor] += 1;
                let new_lprob = numerics::unnormalized_lprob(conf, atom_lprobs);
                if new_lprob > lprob || (new_lprob == lprob && donor > acceptor) {
                    lprob = new_lprob;
                    improved = true;
                } else {
                    conf[donor] += 1;
                    conf[acceptor] -= 1;
                }
            }
        }
    }
}

// Module Tests ========================================================================================================
