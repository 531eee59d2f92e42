//! Reviewer Selector
//!
//! Chooses reviewers from a pool of eligible team members. The selection
//! functions are pure; randomness is supplied by the caller, and
//! [`ReviewerSelector`] owns a seedable generator so that assignments can be
//! replayed deterministically.

use std::sync::{Mutex, MutexGuard, PoisonError};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Number of reviewers assigned to a freshly created pull request
pub const INITIAL_REVIEWERS: usize = 2;

/// Pick the initial reviewers for a pull request.
///
/// `candidates` must not contain duplicates. Returns an empty list for an
/// empty pool, the single candidate for a pool of one, and otherwise exactly
/// two distinct candidates. A colliding second draw is resolved by taking the
/// next candidate (wrapping around), so the call never loops.
pub fn select_initial<R: Rng + ?Sized>(candidates: &[String], rng: &mut R) -> Vec<String> {
    match candidates.len() {
        0 => Vec::new(),
        1 => vec![candidates[0].clone()],
        n => {
            let first = rng.gen_range(0..n);
            let mut second = rng.gen_range(0..n);
            if second == first {
                second = (first + 1) % n;
            }
            vec![candidates[first].clone(), candidates[second].clone()]
        }
    }
}

/// Pick one replacement reviewer uniformly at random.
///
/// Returns `None` when the pool is empty.
pub fn select_replacement<R: Rng + ?Sized>(candidates: &[String], rng: &mut R) -> Option<String> {
    candidates.choose(rng).cloned()
}

/// Shared reviewer selector with an injected random source
#[derive(Debug)]
pub struct ReviewerSelector {
    rng: Mutex<StdRng>,
}

impl ReviewerSelector {
    /// Selector seeded from operating-system entropy
    pub fn from_entropy() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Selector with a fixed seed; identical seeds replay identical draws
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn from_seed_option(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_entropy(),
        }
    }

    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            rng: Mutex::new(rng),
        }
    }

    pub fn initial(&self, candidates: &[String]) -> Vec<String> {
        select_initial(candidates, &mut *self.rng())
    }

    pub fn replacement(&self, candidates: &[String]) -> Option<String> {
        select_replacement(candidates, &mut *self.rng())
    }

    fn rng(&self) -> MutexGuard<'_, StdRng> {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ReviewerSelector {
    fn default() -> Self {
        Self::from_entropy()
    }
}
