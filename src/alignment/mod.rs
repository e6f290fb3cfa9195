use anyhow::bail;
use bio::io::fasta::Record;
use log::info;

use crate::alphabets::{Alphabet, UNKNOWN};
use crate::Result;

/// Integer-encoded multiple sequence alignment, one row per taxon and one
/// column per site. Unresolved characters are stored as [`UNKNOWN`].
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    ids: Vec<String>,
    states: Vec<Vec<u8>>,
    n_states: usize,
}

impl Alignment {
    pub fn new(ids: Vec<String>, states: Vec<Vec<u8>>, n_states: usize) -> Result<Self> {
        if ids.is_empty() {
            bail!("The alignment must contain at least one sequence.");
        }
        if ids.len() != states.len() {
            bail!(
                "Got {} sequence ids for {} sequences.",
                ids.len(),
                states.len()
            );
        }
        if n_states < 2 || n_states >= UNKNOWN as usize {
            bail!("Unsupported number of states: {}.", n_states);
        }
        let len = states[0].len();
        if len == 0 {
            bail!("The alignment must contain at least one site.");
        }
        for (id, row) in ids.iter().zip(&states) {
            if row.len() != len {
                bail!(
                    "Sequence {} has length {}, expected {}, the sequences must be aligned.",
                    id,
                    row.len(),
                    len
                );
            }
            if let Some(state) = row
                .iter()
                .find(|&&s| s != UNKNOWN && s as usize >= n_states)
            {
                bail!("Sequence {} contains invalid state {}.", id, state);
            }
        }
        for (i, id) in ids.iter().enumerate() {
            if ids[..i].contains(id) {
                bail!("Duplicate sequence id {}.", id);
            }
        }
        Ok(Self {
            ids,
            states,
            n_states,
        })
    }

    /// Encodes aligned fasta records with the given alphabet.
    pub fn from_records(records: &[Record], alphabet: &Alphabet) -> Result<Self> {
        info!("Encoding {} aligned sequences.", records.len());
        let ids = records.iter().map(|r| r.id().to_string()).collect();
        let states = records
            .iter()
            .map(|r| r.seq().iter().map(|&c| alphabet.state(c)).collect())
            .collect();
        Self::new(ids, states, alphabet.n_states())
    }

    /// Number of alignment sites.
    pub fn len(&self) -> usize {
        self.states[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn n_states(&self) -> usize {
        self.n_states
    }

    pub fn taxa(&self) -> &[String] {
        &self.ids
    }

    pub fn rows(&self) -> &[Vec<u8>] {
        &self.states
    }

    pub fn row(&self, id: &str) -> Option<&[u8]> {
        self.ids
            .iter()
            .position(|i| i == id)
            .map(|pos| self.states[pos].as_slice())
    }

    pub fn row_index(&self, id: &str) -> Option<usize> {
        self.ids.iter().position(|i| i == id)
    }

    /// Alignment restricted to a single column.
    pub fn site(&self, site: usize) -> Alignment {
        Alignment {
            ids: self.ids.clone(),
            states: self.states.iter().map(|row| vec![row[site]]).collect(),
            n_states: self.n_states,
        }
    }

    /// Counts of every resolved state over all sequences.
    pub fn state_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.n_states];
        for &state in self.states.iter().flatten() {
            if state != UNKNOWN {
                counts[state as usize] += 1;
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests;
