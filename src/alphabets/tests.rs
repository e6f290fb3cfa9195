use rstest::*;

use crate::alphabets::{dna_alphabet, protein_alphabet, GAP, UNKNOWN};

#[rstest]
#[case::upper(b'T', 0)]
#[case::lower(b't', 0)]
#[case::cytosine(b'C', 1)]
#[case::adenine(b'a', 2)]
#[case::guanine(b'G', 3)]
#[case::gap(b'-', UNKNOWN)]
#[case::ambiguous(b'N', UNKNOWN)]
#[case::partial_ambiguity(b'R', UNKNOWN)]
#[case::garbage(b'?', UNKNOWN)]
fn dna_states(#[case] char: u8, #[case] state: u8) {
    assert_eq!(dna_alphabet().state(char), state);
}

#[test]
fn protein_states() {
    let alphabet = protein_alphabet();
    assert_eq!(alphabet.n_states(), 20);
    for (i, &symbol) in alphabet.symbols().iter().enumerate() {
        assert_eq!(alphabet.state(symbol), i as u8);
        assert_eq!(alphabet.symbol(i as u8), symbol);
    }
    assert_eq!(alphabet.state(b'X'), UNKNOWN);
    assert_eq!(alphabet.symbol(UNKNOWN), GAP);
}

#[test]
fn dna_words() {
    let alphabet = dna_alphabet();
    assert!(alphabet.is_word(b"TCAG-NNacgt"));
    assert!(!alphabet.is_word(b"TC*G"));
}
