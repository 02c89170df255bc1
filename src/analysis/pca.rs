//! Incremental principal component analysis over 3-D acceleration.
//!
//! The engine is seeded with a batch of samples (mean + covariance
//! eigendecomposition), then folds every further sample in with an exact
//! rank-1 scatter update and re-diagonalises the 3×3 covariance. Each call
//! is constant work, so it keeps up with the sensor at sample rate.
//!
//! Axis signs are kept continuous between updates: a freshly computed axis
//! that points away from its predecessor is flipped. The seed basis orients
//! every axis so that its largest-magnitude component is positive.

use log::{debug, warn};
use nalgebra::{Matrix3, SymmetricEigen, Vector3};
use std::cmp::Ordering;

/// 特征分解最大迭代次数，避免异常输入导致死循环
const MAX_EIGEN_ITERATIONS: usize = 1000;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PcaError {
    #[error("Insufficient data: need at least {required} samples, got {actual}")]
    InsufficientData { required: usize, actual: usize },
    #[error("PCA engine has not been initialized")]
    NotInitialized,
}

/// Running PCA basis
#[derive(Debug, Clone, PartialEq)]
pub struct PcaState {
    pub mean: Vector3<f64>,
    /// Orthonormal columns, largest eigenvalue first
    pub components: Matrix3<f64>,
    /// Sample covariance eigenvalues, descending
    pub eigenvalues: Vector3<f64>,
    /// Number of samples folded into the basis
    pub explained_count: u64,
}

impl PcaState {
    /// Projection of `sample` onto the principal axes
    pub fn project(&self, sample: &Vector3<f64>) -> Vector3<f64> {
        self.components.transpose() * (sample - self.mean)
    }
}

#[derive(Debug, Clone, Default)]
pub struct IncrementalPca {
    state: Option<PcaState>,
    // Σ (x - mean)(x - mean)ᵀ
    scatter: Matrix3<f64>,
}

impl IncrementalPca {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    pub fn state(&self) -> Option<&PcaState> {
        self.state.as_ref()
    }

    pub fn reset(&mut self) {
        self.state = None;
        self.scatter = Matrix3::zeros();
    }

    /// Batch PCA over `seed`, stored as the running basis.
    ///
    /// Returns the projection of every seed sample, in order. Calling it
    /// again replaces the previous basis.
    pub fn initialize(&mut self, seed: &[Vector3<f64>]) -> Result<Vec<Vector3<f64>>, PcaError> {
        if seed.len() < 2 {
            return Err(PcaError::InsufficientData {
                required: 2,
                actual: seed.len(),
            });
        }

        let n = seed.len() as f64;
        let mean = seed.iter().fold(Vector3::zeros(), |acc, x| acc + x) / n;
        let scatter = seed.iter().fold(Matrix3::zeros(), |acc, x| {
            let d = x - mean;
            acc + d * d.transpose()
        });

        let (eigenvalues, components) = match sorted_eigen(scatter / (n - 1.0)) {
            Some((values, vectors)) => (values, orient_largest_positive(vectors)),
            None => {
                warn!("PCA seed covariance did not converge, falling back to identity basis");
                (Vector3::zeros(), Matrix3::identity())
            }
        };

        let state = PcaState {
            mean,
            components: orthonormalize(components),
            eigenvalues,
            explained_count: seed.len() as u64,
        };
        debug!(
            "PCA initialized from {} samples, eigenvalues {:?}",
            seed.len(),
            state.eigenvalues.as_slice()
        );

        let projections = seed.iter().map(|x| state.project(x)).collect();
        self.scatter = scatter;
        self.state = Some(state);
        Ok(projections)
    }

    /// Fold one sample into the running basis and return its projection on
    /// the updated axes.
    pub fn update(&mut self, sample: &Vector3<f64>) -> Result<Vector3<f64>, PcaError> {
        let state = self.state.as_mut().ok_or(PcaError::NotInitialized)?;

        // 非有限值不参与更新，直接用当前基投影
        if !sample.iter().all(|v| v.is_finite()) {
            debug!("Skipping non-finite sample in PCA update");
            return Ok(state.project(sample));
        }

        let count = state.explained_count + 1;
        let n = count as f64;
        let delta = sample - state.mean;
        state.mean += delta / n;
        // Welford: 对称的秩一更新
        self.scatter += delta * delta.transpose() * ((n - 1.0) / n);
        state.explained_count = count;

        if let Some((values, vectors)) = sorted_eigen(self.scatter / (n - 1.0)) {
            state.eigenvalues = values;
            state.components = orthonormalize(align_with(vectors, &state.components));
        } else {
            warn!("PCA covariance did not converge after {} samples, keeping previous basis", count);
        }

        Ok(state.project(sample))
    }

    /// Projection without touching the basis
    pub fn project(&self, sample: &Vector3<f64>) -> Result<Vector3<f64>, PcaError> {
        self.state
            .as_ref()
            .map(|state| state.project(sample))
            .ok_or(PcaError::NotInitialized)
    }
}

/// Eigendecomposition of a symmetric 3×3 matrix, sorted by descending eigenvalue.
fn sorted_eigen(covariance: Matrix3<f64>) -> Option<(Vector3<f64>, Matrix3<f64>)> {
    let eigen = SymmetricEigen::try_new(covariance, f64::EPSILON, MAX_EIGEN_ITERATIONS)?;

    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| {
        eigen.eigenvalues[b]
            .partial_cmp(&eigen.eigenvalues[a])
            .unwrap_or(Ordering::Equal)
    });

    let values = Vector3::new(
        eigen.eigenvalues[order[0]],
        eigen.eigenvalues[order[1]],
        eigen.eigenvalues[order[2]],
    );
    let vectors = Matrix3::from_columns(&[
        eigen.eigenvectors.column(order[0]).into_owned(),
        eigen.eigenvectors.column(order[1]).into_owned(),
        eigen.eigenvectors.column(order[2]).into_owned(),
    ]);
    Some((values, vectors))
}

fn orient_largest_positive(mut vectors: Matrix3<f64>) -> Matrix3<f64> {
    for i in 0..3 {
        let mut column = vectors.column_mut(i);
        let pivot = column.iamax();
        if column[pivot] < 0.0 {
            column.neg_mut();
        }
    }
    vectors
}

fn align_with(mut vectors: Matrix3<f64>, previous: &Matrix3<f64>) -> Matrix3<f64> {
    for i in 0..3 {
        if vectors.column(i).dot(&previous.column(i)) < 0.0 {
            vectors.column_mut(i).neg_mut();
        }
    }
    vectors
}

/// Gram–Schmidt on the first two axes; the third is rebuilt as their cross
/// product, keeping the orientation of the incoming third axis.
fn orthonormalize(vectors: Matrix3<f64>) -> Matrix3<f64> {
    let e0 = vectors.column(0).normalize();
    let v1 = vectors.column(1).into_owned();
    let e1 = (v1 - e0 * e0.dot(&v1)).normalize();
    let mut e2 = e0.cross(&e1);
    if e2.dot(&vectors.column(2)) < 0.0 {
        e2 = -e2;
    }
    Matrix3::from_columns(&[e0, e1, e2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn assert_orthonormal(components: &Matrix3<f64>) {
        for i in 0..3 {
            let norm = components.column(i).norm();
            assert!((norm - 1.0).abs() < 1e-9, "axis {} has norm {}", i, norm);
            for j in (i + 1)..3 {
                let dot = components.column(i).dot(&components.column(j));
                assert!(dot.abs() < 1e-9, "axes {} and {} have dot {}", i, j, dot);
            }
        }
    }

    /// Samples spread mostly along `direction`, with small isotropic noise.
    fn elongated_cloud(rng: &mut StdRng, direction: Vector3<f64>, count: usize) -> Vec<Vector3<f64>> {
        let offset = Vector3::new(0.0, 0.0, 9.8);
        (0..count)
            .map(|_| {
                let along = rng.random_range(-20.0..20.0);
                let noise = Vector3::new(
                    rng.random_range(-0.5..0.5),
                    rng.random_range(-0.5..0.5),
                    rng.random_range(-0.5..0.5),
                );
                offset + direction * along + noise
            })
            .collect()
    }

    #[test]
    fn initialize_requires_two_samples() {
        let mut pca = IncrementalPca::new();
        assert_eq!(
            pca.initialize(&[Vector3::new(1.0, 2.0, 3.0)]),
            Err(PcaError::InsufficientData { required: 2, actual: 1 })
        );
        assert!(!pca.is_initialized());
    }

    #[test]
    fn update_before_initialize_fails() {
        let mut pca = IncrementalPca::new();
        assert_eq!(pca.update(&Vector3::zeros()), Err(PcaError::NotInitialized));
    }

    #[test]
    fn seed_basis_finds_dominant_axis() {
        let mut rng = StdRng::seed_from_u64(3);
        let direction = Vector3::new(0.6, 0.0, 0.8);
        let seed = elongated_cloud(&mut rng, direction, 50);

        let mut pca = IncrementalPca::new();
        let projections = pca.initialize(&seed).unwrap();
        assert_eq!(projections.len(), 50);

        let state = pca.state().unwrap();
        assert_orthonormal(&state.components);
        // 符号约定：最大分量为正
        assert!(state.components.column(0).dot(&direction) > 0.99);
        assert!(state.eigenvalues[0] > state.eigenvalues[1]);
        assert!(state.eigenvalues[1] >= state.eigenvalues[2]);

        // 投影后的 PC0 均值为零
        let mean_pc0: f64 = projections.iter().map(|p| p.x).sum::<f64>() / 50.0;
        assert!(mean_pc0.abs() < 1e-9);
    }

    #[test]
    fn updates_keep_basis_orthonormal() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut pca = IncrementalPca::new();
        pca.initialize(&elongated_cloud(&mut rng, Vector3::new(1.0, 0.0, 0.0), 50))
            .unwrap();

        // 主方向在中途改变，基需要旋转
        let turned = Vector3::new(0.0, 0.6, 0.8);
        for sample in elongated_cloud(&mut rng, turned, 5000) {
            pca.update(&sample).unwrap();
            assert_orthonormal(&pca.state().unwrap().components);
        }
        assert_eq!(pca.state().unwrap().explained_count, 5050);
        assert!(pca.state().unwrap().components.column(0).dot(&turned).abs() > 0.98);
    }

    #[test]
    fn incremental_matches_batch_statistics() {
        let mut rng = StdRng::seed_from_u64(5);
        let samples = elongated_cloud(&mut rng, Vector3::new(0.0, 1.0, 0.0), 400);

        let mut incremental = IncrementalPca::new();
        incremental.initialize(&samples[..50]).unwrap();
        for sample in &samples[50..] {
            incremental.update(sample).unwrap();
        }

        let mut batch = IncrementalPca::new();
        batch.initialize(&samples).unwrap();

        let a = incremental.state().unwrap();
        let b = batch.state().unwrap();
        assert!((a.mean - b.mean).norm() < 1e-9);
        assert!((a.eigenvalues - b.eigenvalues).norm() < 1e-6);
        assert!(a.components.column(0).dot(&b.components.column(0)).abs() > 1.0 - 1e-9);
    }

    #[test]
    fn axis_sign_is_continuous() {
        let mut rng = StdRng::seed_from_u64(8);
        let direction = Vector3::new(0.0, 0.0, 1.0);
        let mut pca = IncrementalPca::new();
        pca.initialize(&elongated_cloud(&mut rng, direction, 50)).unwrap();
        let before = pca.state().unwrap().components.column(0).into_owned();

        for sample in elongated_cloud(&mut rng, direction, 200) {
            pca.update(&sample).unwrap();
            let after = pca.state().unwrap().components.column(0).into_owned();
            assert!(after.dot(&before) > 0.0);
        }
    }

    #[test]
    fn non_finite_samples_do_not_poison_basis() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut pca = IncrementalPca::new();
        pca.initialize(&elongated_cloud(&mut rng, Vector3::new(1.0, 0.0, 0.0), 50))
            .unwrap();
        let before = pca.state().unwrap().clone();

        let _ = pca.update(&Vector3::new(f64::NAN, 0.0, 0.0)).unwrap();
        assert_eq!(pca.state().unwrap(), &before);
    }

    #[test]
    fn constant_seed_gives_identity_like_basis() {
        let mut pca = IncrementalPca::new();
        let projections = pca.initialize(&vec![Vector3::zeros(); 50]).unwrap();
        assert!(projections.iter().all(|p| p.norm() == 0.0));
        assert_orthonormal(&pca.state().unwrap().components);
    }

    #[test]
    fn reset_forgets_basis() {
        let mut pca = IncrementalPca::new();
        pca.initialize(&[Vector3::zeros(), Vector3::new(1.0, 0.0, 0.0)]).unwrap();
        pca.reset();
        assert!(!pca.is_initialized());
        assert_eq!(pca.project(&Vector3::zeros()), Err(PcaError::NotInitialized));
    }
}
