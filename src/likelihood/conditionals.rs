use nalgebra::DMatrix;

use crate::alphabets::UNKNOWN;
use crate::patterns::PatternInfo;
use crate::substitution_models::{FreqVector, SubstMatrix};

/// Columns whose largest entry drops below 2^-128 are rescaled to a maximum
/// of one.
const SCALE_THRESHOLD: f64 = 2.938_735_877_055_719e-39;

/// Partial likelihoods of a group of leaves, one `states × patterns` matrix
/// per rate category.
///
/// Every pattern carries a log scale factor shared by all categories, the
/// true conditional of pattern `k` is `exp(log_scale[k])` times its column.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalStore {
    categories: Vec<DMatrix<f64>>,
    log_scale: Vec<f64>,
}

impl ConditionalStore {
    pub fn ones(categories: usize, n: usize, patterns: usize) -> Self {
        ConditionalStore {
            categories: vec![DMatrix::from_element(n, patterns, 1.0); categories],
            log_scale: vec![0.0; patterns],
        }
    }

    /// Indicator vectors of the observed leaf states, unknown states are all
    /// ones.
    pub fn leaf(patterns: &PatternInfo, n: usize, categories: usize) -> Self {
        let mut flat = DMatrix::<f64>::zeros(n, patterns.len());
        for (pattern, mut column) in flat.column_iter_mut().enumerate() {
            let state = patterns.leaf_state(pattern);
            if state == UNKNOWN {
                column.fill(1.0);
            } else {
                column[state as usize] = 1.0;
            }
        }
        ConditionalStore {
            categories: vec![flat; categories],
            log_scale: vec![0.0; patterns.len()],
        }
    }

    /// Elementwise product of the inputs, each given with the map from the
    /// output patterns to its own patterns.
    pub fn product(inputs: &[(&ConditionalStore, &[usize])], patterns: usize) -> Self {
        debug_assert!(!inputs.is_empty());
        let (first, _) = inputs[0];
        let mut result = Self::ones(first.n_categories(), first.n_states(), patterns);
        for (input, sources) in inputs {
            debug_assert_eq!(sources.len(), patterns);
            for (out, cat) in result.categories.iter_mut().zip(&input.categories) {
                for (k, &source) in sources.iter().enumerate() {
                    out.column_mut(k).component_mul_assign(&cat.column(source));
                }
            }
            for (scale, &source) in result.log_scale.iter_mut().zip(sources.iter()) {
                *scale += input.log_scale[source];
            }
        }
        result.rescale();
        result
    }

    /// Divides every column whose maximum fell below the threshold by that
    /// maximum. All-zero columns stay zero.
    fn rescale(&mut self) {
        for k in 0..self.n_patterns() {
            let max = self
                .categories
                .iter()
                .map(|flat| flat.column(k).iter().copied().fold(0.0, f64::max))
                .fold(0.0, f64::max);
            if max > 0.0 && max < SCALE_THRESHOLD {
                for flat in self.categories.iter_mut() {
                    flat.column_mut(k).iter_mut().for_each(|x| *x /= max);
                }
                self.log_scale[k] += max.ln();
            }
        }
    }

    /// Propagates the conditional across a branch with one transition matrix
    /// per rate category.
    pub fn extend(&self, transitions: &[SubstMatrix]) -> Self {
        debug_assert_eq!(transitions.len(), self.categories.len());
        ConditionalStore {
            categories: self
                .categories
                .iter()
                .zip(transitions)
                .map(|(flat, p)| p * flat)
                .collect(),
            log_scale: self.log_scale.clone(),
        }
    }

    pub fn category(&self, category: usize) -> &DMatrix<f64> {
        &self.categories[category]
    }

    pub fn log_scale(&self, pattern: usize) -> f64 {
        self.log_scale[pattern]
    }

    pub fn n_categories(&self) -> usize {
        self.categories.len()
    }

    pub fn n_states(&self) -> usize {
        self.categories[0].nrows()
    }

    pub fn n_patterns(&self) -> usize {
        self.categories[0].ncols()
    }

    /// Per-pattern log-likelihoods at a root:
    /// `ln Σ_r w_r Σ_s π_s flat_r[s, k]` plus the pattern's log scale.
    pub fn root_log_likelihoods(&self, freqs: &FreqVector, weights: &[f64]) -> Vec<f64> {
        let mut likelihoods = vec![0.0; self.n_patterns()];
        for (flat, &weight) in self.categories.iter().zip(weights) {
            let site = freqs.transpose() * flat;
            for (l, s) in likelihoods.iter_mut().zip(site.iter()) {
                *l += weight * s;
            }
        }
        likelihoods
            .iter()
            .zip(&self.log_scale)
            .map(|(l, scale)| l.ln() + scale)
            .collect()
    }
}

/// Weighted sum of per-pattern log-likelihoods. A zero likelihood gives `-∞`.
pub(crate) fn weighted_logl(log_likelihoods: &[f64], weights: &[usize]) -> f64 {
    log_likelihoods
        .iter()
        .zip(weights)
        .map(|(l, &w)| w as f64 * l)
        .sum()
}
