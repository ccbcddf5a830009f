/// Tolerance used when comparing a requested level against a calibrated one.
pub const LEVEL_TOLERANCE: f64 = 1e-9;
/// Quantile level used for the point prediction of quantile models.
pub const MEDIAN_LEVEL: f64 = 0.5;
/// Number of outcome bins used by stratified k-fold partitioning.
pub const STRATA_BINS: usize = 4;
/// Maximum number of iteratively reweighted least squares rounds.
pub const IRLS_ITERATION_LIMIT: usize = 200;
/// Convergence threshold on the largest coefficient change between IRLS rounds.
pub const IRLS_TOLERANCE: f64 = 1e-8;
/// Residuals smaller than this are floored when computing IRLS weights.
pub const IRLS_RESIDUAL_FLOOR: f64 = 1e-6;
/// Pivots smaller than this mark the normal equations as singular.
pub const PIVOT_TOLERANCE: f64 = 1e-12;
/// Relative slack subtracted from `(n + 1) * level` before taking the conformal rank.
pub const RANK_RELATIVE_TOLERANCE: f64 = 4.0 * f64::EPSILON;
