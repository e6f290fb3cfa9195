use hashbrown::HashMap;

use crate::alphabets::UNKNOWN;

/// Compressed site patterns of a group of leaves.
///
/// `site_patterns` maps every alignment site to its pattern and `weights`
/// counts the sites sharing each pattern. For a merged pattern set `left` and
/// `right` map every pattern to the pattern of the two inputs it came from.
/// For a leaf, `left` holds the observed state of every pattern and `right`
/// is empty.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PatternInfo {
    pub site_patterns: Vec<usize>,
    pub weights: Vec<usize>,
    pub left: Vec<usize>,
    pub right: Vec<usize>,
}

impl PatternInfo {
    /// One pattern per distinct observed state, in order of first occurrence.
    /// All unknown states share a single pattern.
    pub fn leaf(states: &[u8]) -> Self {
        let mut index = HashMap::<u8, usize>::new();
        let mut info = PatternInfo {
            site_patterns: Vec::with_capacity(states.len()),
            ..Default::default()
        };
        for &state in states {
            let pattern = *index.entry(state).or_insert_with(|| {
                info.weights.push(0);
                info.left.push(state as usize);
                info.weights.len() - 1
            });
            info.weights[pattern] += 1;
            info.site_patterns.push(pattern);
        }
        info
    }

    /// Merges the patterns of two subtrees into this one: each distinct
    /// co-occurring (left, right) pair becomes a pattern whose weight is the
    /// number of sites showing it. Returns the number of patterns.
    pub fn build(&mut self, left: &PatternInfo, right: &PatternInfo, total_sites: usize) -> usize {
        debug_assert_eq!(left.site_patterns.len(), total_sites);
        debug_assert_eq!(right.site_patterns.len(), total_sites);
        self.site_patterns.clear();
        self.weights.clear();
        self.left.clear();
        self.right.clear();

        let mut index = HashMap::<(usize, usize), usize>::with_capacity(total_sites);
        for site in 0..total_sites {
            let key = (left.site_patterns[site], right.site_patterns[site]);
            let pattern = *index.entry(key).or_insert_with(|| {
                self.weights.push(0);
                self.left.push(key.0);
                self.right.push(key.1);
                self.weights.len() - 1
            });
            self.weights[pattern] += 1;
            self.site_patterns.push(pattern);
        }
        self.weights.len()
    }

    pub fn merge(left: &PatternInfo, right: &PatternInfo) -> Self {
        let mut info = PatternInfo::default();
        info.build(left, right, left.total_sites());
        info
    }

    /// Merges any number of pattern sets at once. Returns the merged patterns
    /// and, for every input, the map from merged pattern to input pattern.
    pub fn merge_all(inputs: &[&PatternInfo]) -> (PatternInfo, Vec<Vec<usize>>) {
        let total_sites = inputs.first().map_or(0, |info| info.total_sites());
        let mut sources = vec![Vec::new(); inputs.len()];
        let mut info = PatternInfo {
            site_patterns: Vec::with_capacity(total_sites),
            ..Default::default()
        };
        let mut index = HashMap::<Vec<usize>, usize>::with_capacity(total_sites);
        for site in 0..total_sites {
            let key = inputs
                .iter()
                .map(|input| input.site_patterns[site])
                .collect::<Vec<_>>();
            let pattern = match index.get(&key) {
                Some(&pattern) => pattern,
                None => {
                    for (source, &p) in sources.iter_mut().zip(&key) {
                        source.push(p);
                    }
                    info.weights.push(0);
                    index.insert(key, info.weights.len() - 1);
                    info.weights.len() - 1
                }
            };
            info.weights[pattern] += 1;
            info.site_patterns.push(pattern);
        }
        if sources.len() >= 2 {
            info.left = sources[0].clone();
            info.right = sources[1].clone();
        }
        (info, sources)
    }

    /// Number of distinct patterns.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn total_sites(&self) -> usize {
        self.site_patterns.len()
    }

    /// For leaf pattern sets, the observed state of a pattern.
    pub fn leaf_state(&self, pattern: usize) -> u8 {
        debug_assert!(self.right.is_empty());
        self.left[pattern] as u8
    }

    pub fn is_unknown(&self, pattern: usize) -> bool {
        self.leaf_state(pattern) == UNKNOWN
    }
}

#[cfg(test)]
mod tests;
