//! Non-metric multidimensional scaling.
//!
//! Implements the classic Kruskal procedure: random starting configurations,
//! monotone (isotonic) regression of configuration distances against the rank
//! order of the input dissimilarities, and Guttman majorization updates until
//! stress-1 stops improving. Restarts run in parallel and the lowest-stress
//! solution wins.

use crate::diversity::DissimilarityMatrix;
use crate::error::{EcoError, Result};
use crate::ordinate::OrdinationResult;
use rayon::prelude::*;

/// Optimizer settings for [`nmds`].
#[derive(Debug, Clone)]
pub struct NmdsConfig {
    /// Maximum Guttman iterations per start.
    pub max_iter: usize,
    /// Stop when stress improves by less than this between iterations.
    pub tolerance: f64,
    /// Number of random restarts.
    pub n_starts: usize,
    /// Seed for the restart configurations.
    pub seed: u64,
}

impl Default for NmdsConfig {
    fn default() -> Self {
        Self {
            max_iter: 20,
            tolerance: 1e-4,
            n_starts: 8,
            seed: 42,
        }
    }
}

/// Simple deterministic RNG (xorshift64).
struct Rng {
    state: u64,
}

impl Rng {
    fn new(seed: u64) -> Self {
        Self { state: seed.max(1) }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() as f64) / (u64::MAX as f64)
    }

    /// Approximate standard normal via Box-Muller.
    fn next_normal(&mut self) -> f64 {
        let u1 = self.next_f64().max(1e-10);
        let u2 = self.next_f64();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }
}

/// One candidate embedding from a single random start.
struct Candidate {
    coords: Vec<Vec<f64>>,
    stress: f64,
    converged: bool,
}

/// Pairwise Euclidean distances of a configuration, condensed upper triangle.
fn config_distances(coords: &[Vec<f64>]) -> Vec<f64> {
    let n = coords.len();
    let mut dist = Vec::with_capacity(n * (n - 1) / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            let d: f64 = coords[i]
                .iter()
                .zip(&coords[j])
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            dist.push(d.sqrt());
        }
    }
    dist
}

/// Weighted pool-adjacent-violators: least-squares nondecreasing fit.
fn isotonic_regression(values: &[f64]) -> Vec<f64> {
    // Blocks of (pooled mean, weight), merged while order is violated.
    let mut means: Vec<f64> = Vec::with_capacity(values.len());
    let mut weights: Vec<f64> = Vec::with_capacity(values.len());
    let mut sizes: Vec<usize> = Vec::with_capacity(values.len());
    for &v in values {
        means.push(v);
        weights.push(1.0);
        sizes.push(1);
        while means.len() > 1 {
            let k = means.len();
            if means[k - 2] <= means[k - 1] {
                break;
            }
            let w = weights[k - 2] + weights[k - 1];
            let m = (means[k - 2] * weights[k - 2] + means[k - 1] * weights[k - 1]) / w;
            means.truncate(k - 1);
            weights.truncate(k - 1);
            let merged = sizes[k - 1];
            sizes.truncate(k - 1);
            means[k - 2] = m;
            weights[k - 2] = w;
            sizes[k - 2] += merged;
        }
    }
    let mut fitted = Vec::with_capacity(values.len());
    for (m, s) in means.iter().zip(&sizes) {
        fitted.extend(std::iter::repeat(*m).take(*s));
    }
    fitted
}

/// Kruskal stress-1 between configuration distances and their monotone fit.
fn stress_1(dist: &[f64], fitted: &[f64]) -> f64 {
    let num: f64 = dist
        .iter()
        .zip(fitted)
        .map(|(d, f)| (d - f) * (d - f))
        .sum();
    let den: f64 = dist.iter().map(|d| d * d).sum();
    if den == 0.0 {
        0.0
    } else {
        (num / den).sqrt()
    }
}

fn run_single_start<C>(
    diss: &[f64],
    order: &[usize],
    n: usize,
    k: usize,
    config: &NmdsConfig,
    seed: u64,
    cancelled: &C,
) -> Candidate
where
    C: Fn() -> bool + Sync,
{
    let mut rng = Rng::new(seed);
    let mut coords: Vec<Vec<f64>> = (0..n)
        .map(|_| (0..k).map(|_| rng.next_normal()).collect())
        .collect();

    let n_pairs = diss.len();
    let mut prev_stress = f64::INFINITY;
    let mut stress = f64::INFINITY;
    let mut converged = false;

    for _ in 0..config.max_iter {
        if cancelled() {
            break;
        }
        let dist = config_distances(&coords);

        // Monotone regression in the rank order of the input dissimilarities,
        // then scatter the fitted values back to pair positions.
        let ordered: Vec<f64> = order.iter().map(|&p| dist[p]).collect();
        let fitted_ordered = isotonic_regression(&ordered);
        let mut fitted = vec![0.0; n_pairs];
        for (rank, &p) in order.iter().enumerate() {
            fitted[p] = fitted_ordered[rank];
        }

        stress = stress_1(&dist, &fitted);
        if (prev_stress - stress).abs() < config.tolerance {
            converged = true;
            break;
        }
        prev_stress = stress;

        // Guttman transform: move each point toward the monotone-fitted
        // distances to every other point.
        let mut next = vec![vec![0.0; k]; n];
        let mut pair = 0;
        for i in 0..n {
            for j in (i + 1)..n {
                let d = dist[pair].max(1e-10);
                let ratio = fitted[pair] / d;
                for a in 0..k {
                    let delta = coords[i][a] - coords[j][a];
                    next[i][a] += coords[j][a] + ratio * delta;
                    next[j][a] += coords[i][a] - ratio * delta;
                }
                pair += 1;
            }
        }
        let scale = 1.0 / (n as f64 - 1.0);
        for row in &mut next {
            for v in row.iter_mut() {
                *v *= scale;
            }
        }
        coords = next;
    }

    // Center the configuration so runs are comparable.
    for a in 0..k {
        let mean: f64 = coords.iter().map(|row| row[a]).sum::<f64>() / n as f64;
        for row in &mut coords {
            row[a] -= mean;
        }
    }

    Candidate {
        coords,
        stress,
        converged,
    }
}

/// Non-metric multidimensional scaling of a dissimilarity matrix.
///
/// Runs `config.n_starts` random starts in parallel and keeps the solution
/// with the lowest Kruskal stress-1. A final stress above 0.2 is reported as
/// not converged, following the usual interpretation threshold.
///
/// # Arguments
/// * `dm` - Pairwise dissimilarities between the points to embed
/// * `k` - Number of embedding axes
/// * `config` - Iteration, tolerance, restart and seed settings
pub fn nmds(dm: &DissimilarityMatrix, k: usize, config: &NmdsConfig) -> Result<OrdinationResult> {
    nmds_with_cancel(dm, k, config, || false)
}

/// NMDS with a cooperative cancellation check.
///
/// `cancelled` is polled once per optimizer iteration in every start; when it
/// returns true the start stops where it is and the best configuration found
/// so far is returned with `converged` false.
pub fn nmds_with_cancel<C>(
    dm: &DissimilarityMatrix,
    k: usize,
    config: &NmdsConfig,
    cancelled: C,
) -> Result<OrdinationResult>
where
    C: Fn() -> bool + Sync,
{
    let n = dm.len();
    if k == 0 {
        return Err(EcoError::InvalidParameter(
            "ordination requires at least one axis".to_string(),
        ));
    }
    if n < 3 {
        return Err(EcoError::InvalidParameter(format!(
            "NMDS requires at least 3 points, got {}",
            n
        )));
    }
    if config.n_starts == 0 {
        return Err(EcoError::InvalidParameter(
            "NMDS requires at least one start".to_string(),
        ));
    }

    let diss = dm.condensed();
    let mut order: Vec<usize> = (0..diss.len()).collect();
    order.sort_by(|&a, &b| {
        diss[a]
            .partial_cmp(&diss[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let best = (0..config.n_starts as u64)
        .into_par_iter()
        .map(|start| {
            run_single_start(
                diss,
                &order,
                n,
                k,
                config,
                config.seed.wrapping_add(start.wrapping_mul(0x9e37_79b9_7f4a_7c15)),
                &cancelled,
            )
        })
        .reduce_with(|a, b| if b.stress < a.stress { b } else { a })
        .ok_or_else(|| EcoError::Numerical("no NMDS start produced a solution".to_string()))?;

    let mut converged = best.converged;
    if best.stress >= 0.2 {
        log::warn!(
            "NMDS stress {:.3} exceeds 0.2; embedding is unreliable",
            best.stress
        );
        converged = false;
    }

    Ok(OrdinationResult {
        method: "NMDS".to_string(),
        labels: dm.labels().to_vec(),
        coordinates: best.coords,
        axes: k,
        stress: best.stress,
        converged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn euclid(a: &[f64], b: &[f64]) -> f64 {
        a.iter()
            .zip(b)
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f64>()
            .sqrt()
    }

    #[test]
    fn test_isotonic_regression_pools_violators() {
        let fitted = isotonic_regression(&[1.0, 3.0, 2.0, 4.0]);
        assert_relative_eq!(fitted[0], 1.0);
        assert_relative_eq!(fitted[1], 2.5);
        assert_relative_eq!(fitted[2], 2.5);
        assert_relative_eq!(fitted[3], 4.0);
    }

    #[test]
    fn test_isotonic_regression_monotone_input_unchanged() {
        let input = [0.1, 0.5, 0.5, 0.9];
        let fitted = isotonic_regression(&input);
        for (a, b) in input.iter().zip(&fitted) {
            assert_relative_eq!(a, b);
        }
    }

    #[test]
    fn test_recovers_rank_order_of_square() {
        // Four points on a unit square: diagonals must embed farther apart
        // than edges.
        let labels: Vec<String> = (0..4).map(|i| format!("p{}", i)).collect();
        let s = 2.0_f64.sqrt();
        let dm = DissimilarityMatrix::new(labels, vec![1.0, s, 1.0, 1.0, s, 1.0]).unwrap();
        let config = NmdsConfig {
            max_iter: 200,
            ..NmdsConfig::default()
        };
        let res = nmds(&dm, 2, &config).unwrap();
        assert!(res.stress < 0.05, "stress {}", res.stress);

        let c = &res.coordinates;
        let d02 = euclid(&c[0], &c[2]);
        let d13 = euclid(&c[1], &c[3]);
        let d01 = euclid(&c[0], &c[1]);
        assert!(d02 > d01);
        assert!(d13 > d01);
    }

    #[test]
    fn test_deterministic_for_fixed_seed() {
        let labels: Vec<String> = (0..5).map(|i| format!("p{}", i)).collect();
        let diss: Vec<f64> = (1..=10).map(|i| i as f64 / 10.0).collect();
        let dm = DissimilarityMatrix::new(labels, diss).unwrap();
        let config = NmdsConfig {
            seed: 7,
            ..NmdsConfig::default()
        };
        let a = nmds(&dm, 2, &config).unwrap();
        let b = nmds(&dm, 2, &config).unwrap();
        assert_relative_eq!(a.stress, b.stress);
        assert_eq!(a.coordinates, b.coordinates);
    }

    #[test]
    fn test_rejects_too_few_points() {
        let dm = DissimilarityMatrix::new(
            vec!["a".to_string(), "b".to_string()],
            vec![0.5],
        )
        .unwrap();
        assert!(matches!(
            nmds(&dm, 2, &NmdsConfig::default()),
            Err(EcoError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_rejects_zero_axes() {
        let labels: Vec<String> = (0..3).map(|i| format!("p{}", i)).collect();
        let dm = DissimilarityMatrix::new(labels, vec![0.2, 0.4, 0.6]).unwrap();
        assert!(matches!(
            nmds(&dm, 0, &NmdsConfig::default()),
            Err(EcoError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_cancel_stops_early() {
        let labels: Vec<String> = (0..5).map(|i| format!("p{}", i)).collect();
        let diss: Vec<f64> = (1..=10).map(|i| i as f64 / 10.0).collect();
        let dm = DissimilarityMatrix::new(labels, diss).unwrap();
        // Cancelled from the outset: no iteration runs, so no convergence.
        let res = nmds_with_cancel(&dm, 2, &NmdsConfig::default(), || true).unwrap();
        assert!(!res.converged);
    }

    #[test]
    fn test_coordinates_are_centered() {
        let labels: Vec<String> = (0..4).map(|i| format!("p{}", i)).collect();
        let dm =
            DissimilarityMatrix::new(labels, vec![0.3, 0.6, 0.2, 0.5, 0.7, 0.4]).unwrap();
        let res = nmds(&dm, 2, &NmdsConfig::default()).unwrap();
        for a in 0..2 {
            let mean: f64 =
                res.coordinates.iter().map(|row| row[a]).sum::<f64>() / 4.0;
            assert_relative_eq!(mean, 0.0, epsilon = 1e-9);
        }
    }
}
