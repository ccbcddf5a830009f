//! Resampling
//!
//! Fold layouts for cross-validation conformal. A [`Folds`] value is an arena
//! of independent index partitions; each partition names the records a fold
//! model is fit on and the records it is evaluated on.
use crate::constants::STRATA_BINS;
use crate::errors::ConformalError;
use crate::utils::float_cmp;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// How a fold layout was produced.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum Resampling {
    /// Shuffled K-fold partitioning.
    KFold,
    /// K-fold partitioning balanced over outcome quantile bins.
    StratifiedKFold,
    /// Caller supplied fold ids.
    Assigned,
    /// Bootstrap resamples evaluated on their out-of-bag records.
    Bootstrap,
}

/// One fit / evaluate split of the records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Partition {
    /// Records the fold model is fit on. May contain repeats for bootstrap resamples.
    pub train: Vec<usize>,
    /// Records the fold model is evaluated on.
    pub holdout: Vec<usize>,
}

/// Arena of partitions over `n_records` records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Folds {
    n_records: usize,
    partitions: Vec<Partition>,
    resampling: Resampling,
}

fn from_fold_ids(fold_ids: &[usize], k: usize, resampling: Resampling) -> Result<Folds, ConformalError> {
    let mut holdouts: Vec<Vec<usize>> = vec![Vec::new(); k];
    for (i, f) in fold_ids.iter().enumerate() {
        holdouts[*f].push(i);
    }
    let partitions = holdouts
        .into_iter()
        .enumerate()
        .map(|(f, holdout)| Partition {
            train: (0..fold_ids.len()).filter(|i| fold_ids[*i] != f).collect(),
            holdout,
        })
        .collect();
    let folds = Folds {
        n_records: fold_ids.len(),
        partitions,
        resampling,
    };
    folds.validate()?;
    Ok(folds)
}

fn validate_k(k: usize) -> Result<(), ConformalError> {
    if k < 2 {
        return Err(ConformalError::InvalidConfiguration(format!(
            "at least 2 folds are required, {} requested",
            k
        )));
    }
    Ok(())
}

impl Folds {
    /// Shuffle the records and deal them round-robin into `k` folds.
    ///
    /// * `n_records` - Number of training records.
    /// * `k` - Number of folds, at least 2 and at most `n_records`.
    /// * `seed` - Seed for the shuffle.
    pub fn k_fold(n_records: usize, k: usize, seed: u64) -> Result<Self, ConformalError> {
        validate_k(k)?;
        let mut rng = StdRng::seed_from_u64(seed);
        let mut index: Vec<usize> = (0..n_records).collect();
        index.shuffle(&mut rng);
        let mut fold_ids = vec![0; n_records];
        for (position, i) in index.iter().enumerate() {
            fold_ids[*i] = position % k;
        }
        from_fold_ids(&fold_ids, k, Resampling::KFold)
    }

    /// K-fold partitioning that spreads every outcome quartile evenly over the folds.
    pub fn stratified_k_fold(y: &[f64], k: usize, seed: u64) -> Result<Self, ConformalError> {
        validate_k(k)?;
        let n = y.len();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut by_outcome: Vec<usize> = (0..n).collect();
        by_outcome.sort_by(|a, b| float_cmp(&y[*a], &y[*b]));
        let mut strata: Vec<Vec<usize>> = vec![Vec::new(); STRATA_BINS];
        for (rank, i) in by_outcome.iter().enumerate() {
            strata[rank * STRATA_BINS / n.max(1)].push(*i);
        }
        let mut fold_ids = vec![0; n];
        let mut position = 0;
        for mut stratum in strata {
            stratum.shuffle(&mut rng);
            for i in stratum {
                fold_ids[i] = position % k;
                position += 1;
            }
        }
        from_fold_ids(&fold_ids, k, Resampling::StratifiedKFold)
    }

    /// Build folds from an explicit fold id per record. Ids run from `0` to `k - 1`.
    pub fn from_assignment(fold_ids: &[usize]) -> Result<Self, ConformalError> {
        let k = fold_ids.iter().max().map_or(0, |m| m + 1);
        validate_k(k)?;
        from_fold_ids(fold_ids, k, Resampling::Assigned)
    }

    /// Draw `n_resamples` bootstrap samples; each is evaluated on its out-of-bag records.
    ///
    /// Conformal coverage is not proven for this layout.
    pub fn bootstrap(n_records: usize, n_resamples: usize, seed: u64) -> Result<Self, ConformalError> {
        validate_k(n_resamples)?;
        let mut rng = StdRng::seed_from_u64(seed);
        let mut partitions = Vec::with_capacity(n_resamples);
        for _ in 0..n_resamples {
            let mut in_bag = vec![false; n_records];
            let train: Vec<usize> = (0..n_records)
                .map(|_| {
                    let i = rng.gen_range(0..n_records);
                    in_bag[i] = true;
                    i
                })
                .collect();
            let holdout = (0..n_records).filter(|i| !in_bag[*i]).collect();
            partitions.push(Partition { train, holdout });
        }
        let folds = Folds {
            n_records,
            partitions,
            resampling: Resampling::Bootstrap,
        };
        folds.validate()?;
        Ok(folds)
    }

    /// Check the layout is usable: at least two partitions, none with an empty side,
    /// and every index inside the record range.
    pub fn validate(&self) -> Result<(), ConformalError> {
        validate_k(self.partitions.len())?;
        for (k, p) in self.partitions.iter().enumerate() {
            if p.holdout.is_empty() {
                return Err(ConformalError::InvalidConfiguration(format!(
                    "fold {} has no held-out records",
                    k
                )));
            }
            if p.train.is_empty() {
                return Err(ConformalError::InvalidConfiguration(format!(
                    "fold {} has no training records",
                    k
                )));
            }
            if p.train.iter().chain(&p.holdout).any(|i| *i >= self.n_records) {
                return Err(ConformalError::InvalidConfiguration(format!(
                    "fold {} references a record outside 0..{}",
                    k, self.n_records
                )));
            }
        }
        Ok(())
    }

    /// True when the held-out sets are disjoint, cover every record, and each
    /// fold trains on exactly the remaining records. Only then does the CV+
    /// coverage bound apply.
    pub fn is_disjoint_cover(&self) -> bool {
        let mut seen = vec![false; self.n_records];
        for p in &self.partitions {
            // Deserialized layouts are not validated.
            if p.train.iter().chain(&p.holdout).any(|i| *i >= self.n_records) {
                return false;
            }
            for i in &p.holdout {
                if seen[*i] {
                    return false;
                }
                seen[*i] = true;
            }
            if p.train.len() + p.holdout.len() != self.n_records {
                return false;
            }
            let mut in_train = vec![false; self.n_records];
            for i in &p.train {
                if in_train[*i] {
                    return false;
                }
                in_train[*i] = true;
            }
            if p.holdout.iter().any(|i| in_train[*i]) {
                return false;
            }
        }
        seen.into_iter().all(|s| s)
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    pub fn n_records(&self) -> usize {
        self.n_records
    }

    pub fn resampling(&self) -> Resampling {
        self.resampling
    }

    /// Number of partitions.
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }
}
