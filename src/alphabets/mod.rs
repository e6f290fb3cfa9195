use lazy_static::lazy_static;

pub static NUCLEOTIDES: &[u8] = b"TCAG";
pub static AMINOACIDS: &[u8] = b"ARNDCQEGHILKMFPSTWYV";
pub static GAP: u8 = b'-';

/// Sentinel state for gaps, ambiguity codes and any other unresolved character.
pub const UNKNOWN: u8 = u8::MAX;

/// Maps sequence characters onto integer states `0..n_states`.
///
/// Everything that is not one of the alphabet symbols, including gaps and
/// ambiguity codes, is encoded as [`UNKNOWN`].
#[derive(Debug, PartialEq)]
pub struct Alphabet {
    symbols: &'static [u8],
    index: &'static [u8; 256],
}

impl Alphabet {
    pub fn symbols(&self) -> &[u8] {
        self.symbols
    }

    pub fn n_states(&self) -> usize {
        self.symbols.len()
    }

    pub fn state(&self, char: u8) -> u8 {
        self.index[char as usize]
    }

    pub fn symbol(&self, state: u8) -> u8 {
        if state == UNKNOWN {
            return GAP;
        }
        self.symbols[state as usize]
    }

    pub fn is_word(&self, word: &[u8]) -> bool {
        word.iter()
            .all(|&c| self.state(c) != UNKNOWN || c == GAP || c.is_ascii_alphabetic())
    }
}

pub fn dna_alphabet() -> Alphabet {
    Alphabet {
        symbols: NUCLEOTIDES,
        index: &NUCLEOTIDE_INDEX,
    }
}

pub fn protein_alphabet() -> Alphabet {
    Alphabet {
        symbols: AMINOACIDS,
        index: &AMINOACID_INDEX,
    }
}

fn make_index(symbols: &[u8]) -> [u8; 256] {
    let mut index = [UNKNOWN; 256];
    for (i, char) in symbols.iter().enumerate() {
        index[*char as usize] = i as u8;
        index[char.to_ascii_lowercase() as usize] = i as u8;
    }
    index
}

lazy_static! {
    static ref NUCLEOTIDE_INDEX: [u8; 256] = make_index(NUCLEOTIDES);
    static ref AMINOACID_INDEX: [u8; 256] = make_index(AMINOACIDS);
}

#[cfg(test)]
mod tests;
