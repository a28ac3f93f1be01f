//! Principal coordinates analysis (metric MDS).
//!
//! Double-centers the squared dissimilarity matrix (Gower transform) and
//! takes the leading eigenvectors of the result, scaled by the square roots
//! of their eigenvalues.

use crate::diversity::DissimilarityMatrix;
use crate::error::{EcoError, Result};
use crate::ordinate::OrdinationResult;
use nalgebra::DMatrix;

/// Principal coordinates analysis of a dissimilarity matrix.
///
/// Returns up to `k` axes; fewer if the centered matrix has fewer positive
/// eigenvalues. Negative eigenvalues, which arise for non-Euclidean metrics,
/// are dropped. Stress is reported as 0.0 and convergence is always true
/// since the solution is exact.
pub fn pcoa(dm: &DissimilarityMatrix, k: usize) -> Result<OrdinationResult> {
    let n = dm.len();
    if k == 0 {
        return Err(EcoError::InvalidParameter(
            "ordination requires at least one axis".to_string(),
        ));
    }
    if n < 2 {
        return Err(EcoError::InvalidParameter(format!(
            "PCoA requires at least 2 points, got {}",
            n
        )));
    }

    // Gower centering: B = -1/2 * J * D^2 * J with J = I - 11'/n.
    let mut a = DMatrix::zeros(n, n);
    for i in 0..n {
        for j in 0..n {
            let d = dm.get(i, j);
            a[(i, j)] = -0.5 * d * d;
        }
    }
    let row_means: Vec<f64> = (0..n).map(|i| a.row(i).sum() / n as f64).collect();
    let grand_mean: f64 = row_means.iter().sum::<f64>() / n as f64;
    let mut b = DMatrix::zeros(n, n);
    for i in 0..n {
        for j in 0..n {
            b[(i, j)] = a[(i, j)] - row_means[i] - row_means[j] + grand_mean;
        }
    }

    let eig = b.symmetric_eigen();

    // Eigenpairs sorted by eigenvalue, descending; keep positive ones only.
    let mut idx: Vec<usize> = (0..n).collect();
    idx.sort_by(|&p, &q| {
        eig.eigenvalues[q]
            .partial_cmp(&eig.eigenvalues[p])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let kept: Vec<usize> = idx
        .into_iter()
        .filter(|&p| eig.eigenvalues[p] > 1e-10)
        .take(k)
        .collect();
    if kept.is_empty() {
        return Err(EcoError::Numerical(
            "PCoA found no positive eigenvalues".to_string(),
        ));
    }

    let axes = kept.len();
    let coordinates: Vec<Vec<f64>> = (0..n)
        .map(|i| {
            kept.iter()
                .map(|&p| eig.eigenvectors[(i, p)] * eig.eigenvalues[p].sqrt())
                .collect()
        })
        .collect();

    Ok(OrdinationResult {
        method: "PCoA".to_string(),
        labels: dm.labels().to_vec(),
        coordinates,
        axes,
        stress: 0.0,
        converged: true,
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
    fn test_recovers_euclidean_distances_exactly() {
        // Three collinear points at 0, 3 and 5.
        let labels: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let dm = DissimilarityMatrix::new(labels, vec![3.0, 5.0, 2.0]).unwrap();
        let res = pcoa(&dm, 2).unwrap();
        assert!(res.converged);
        assert_relative_eq!(res.stress, 0.0);

        let c = &res.coordinates;
        assert_relative_eq!(euclid(&c[0], &c[1]), 3.0, epsilon = 1e-8);
        assert_relative_eq!(euclid(&c[0], &c[2]), 5.0, epsilon = 1e-8);
        assert_relative_eq!(euclid(&c[1], &c[2]), 2.0, epsilon = 1e-8);
    }

    #[test]
    fn test_collinear_points_need_one_axis() {
        let labels: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let dm = DissimilarityMatrix::new(labels, vec![1.0, 2.0, 1.0]).unwrap();
        let res = pcoa(&dm, 3).unwrap();
        // One positive eigenvalue is enough for a line.
        assert_eq!(res.axes, 1);
    }

    #[test]
    fn test_unit_square_in_two_axes() {
        let labels: Vec<String> = (0..4).map(|i| format!("p{}", i)).collect();
        let s = 2.0_f64.sqrt();
        let dm = DissimilarityMatrix::new(labels, vec![1.0, s, 1.0, 1.0, s, 1.0]).unwrap();
        let res = pcoa(&dm, 2).unwrap();
        assert_eq!(res.axes, 2);
        let c = &res.coordinates;
        assert_relative_eq!(euclid(&c[0], &c[1]), 1.0, epsilon = 1e-8);
        assert_relative_eq!(euclid(&c[0], &c[2]), s, epsilon = 1e-8);
    }

    #[test]
    fn test_rejects_degenerate_input() {
        let dm = DissimilarityMatrix::new(vec!["only".to_string()], vec![]).unwrap();
        assert!(matches!(
            pcoa(&dm, 2),
            Err(EcoError::InvalidParameter(_))
        ));
    }
}
