use hashbrown::HashMap;
use log::debug;
use nalgebra::{DVector, SymmetricEigen};

use crate::f64_h;
use crate::substitution_models::{FreqVector, QMatrix, SubstMatrix, SubstModel};

/// Number of memoised matrices above which the cache is emptied.
const MAX_CACHED: usize = 4096;

/// Eigendecomposition of a reversible rate matrix through its symmetric form
/// `S = Π^½ Q Π^-½`, giving `P(t) = Π^-½ V exp(Λt) Vᵀ Π^½`.
#[derive(Debug, Clone)]
pub struct EigenSystem {
    left: SubstMatrix,
    right: SubstMatrix,
    eigenvalues: DVector<f64>,
}

impl EigenSystem {
    pub fn new(q: &SubstMatrix, freqs: &FreqVector) -> Self {
        let n = q.nrows();
        let sqrt_pi = freqs.map(f64::sqrt);
        let mut s = SubstMatrix::zeros(n, n);
        for i in 0..n {
            for j in 0..n {
                s[(i, j)] = sqrt_pi[i] * q[(i, j)] / sqrt_pi[j];
            }
        }
        let s = (&s + s.transpose()) * 0.5;
        let eigen = SymmetricEigen::new(s);
        let mut left = eigen.eigenvectors.clone();
        let mut right = eigen.eigenvectors.transpose();
        for i in 0..n {
            left.row_mut(i).scale_mut(1.0 / sqrt_pi[i]);
            right.column_mut(i).scale_mut(sqrt_pi[i]);
        }
        EigenSystem {
            left,
            right,
            eigenvalues: eigen.eigenvalues,
        }
    }

    /// Transition probabilities for a scaled distance, entries clamped to
    /// `[0, 1]`.
    pub fn p(&self, distance: f64) -> SubstMatrix {
        let n = self.left.nrows();
        if distance == 0.0 {
            return SubstMatrix::identity(n, n);
        }
        let mut scaled = self.left.clone();
        for (k, lambda) in self.eigenvalues.iter().enumerate() {
            scaled.column_mut(k).scale_mut((lambda * distance).exp());
        }
        let mut p = scaled * &self.right;
        p.iter_mut().for_each(|x| *x = x.clamp(0.0, 1.0));
        p
    }
}

/// Memoised transition matrices keyed by rate category and branch length.
///
/// The eigendecomposition is built on first use and reused until the cache is
/// invalidated after a model change.
#[derive(Debug, Clone, Default)]
pub struct TransitionCache {
    eigen: Option<EigenSystem>,
    matrices: HashMap<(usize, f64_h), SubstMatrix>,
}

impl TransitionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invalidate(&mut self) {
        self.eigen = None;
        self.matrices.clear();
    }

    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    pub fn p<Q: QMatrix>(&mut self, model: &SubstModel<Q>, category: usize, time: f64) -> &SubstMatrix {
        if self.matrices.len() >= MAX_CACHED {
            debug!("Clearing {} cached transition matrices.", self.matrices.len());
            self.matrices.clear();
        }
        let eigen = self
            .eigen
            .get_or_insert_with(|| EigenSystem::new(model.q(), model.freqs()));
        let rate = model.rates.rate(category);
        self.matrices
            .entry((category, f64_h::from(time)))
            .or_insert_with(|| eigen.p(time * rate))
    }
}
