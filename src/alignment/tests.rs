use assert_matches::assert_matches;

use crate::alignment::Alignment;
use crate::alphabets::{dna_alphabet, UNKNOWN};
use crate::record_wo_desc as record;

#[test]
fn encode_records() {
    let records = vec![record!("A", b"TCAG-"), record!("B", b"tcagn")];
    let msa = Alignment::from_records(&records, &dna_alphabet()).unwrap();
    assert_eq!(msa.len(), 5);
    assert_eq!(msa.n_states(), 4);
    assert_eq!(msa.taxa(), &["A".to_string(), "B".to_string()]);
    assert_eq!(msa.row("A").unwrap(), &[0, 1, 2, 3, UNKNOWN]);
    assert_eq!(msa.row("B").unwrap(), &[0, 1, 2, 3, UNKNOWN]);
    assert_matches!(msa.row("C"), None);
}

#[test]
fn unaligned_records() {
    let records = vec![record!("A", b"TCAG"), record!("B", b"TCA")];
    let err = Alignment::from_records(&records, &dna_alphabet()).unwrap_err();
    assert!(err.to_string().contains("aligned"));
}

#[test]
fn duplicate_ids() {
    let records = vec![record!("A", b"TCAG"), record!("A", b"TCAA")];
    let err = Alignment::from_records(&records, &dna_alphabet()).unwrap_err();
    assert!(err.to_string().contains("Duplicate"));
}

#[test]
fn invalid_states() {
    let res = Alignment::new(
        vec!["A".to_string(), "B".to_string()],
        vec![vec![0, 1], vec![0, 4]],
        4,
    );
    assert!(res.is_err());
    let res = Alignment::new(vec![], vec![], 4);
    assert!(res.is_err());
}

#[test]
fn counts_skip_unknown() {
    let records = vec![record!("A", b"TTAG-"), record!("B", b"TCNGG")];
    let msa = Alignment::from_records(&records, &dna_alphabet()).unwrap();
    assert_eq!(msa.state_counts(), vec![3, 1, 1, 3]);
}

#[test]
fn single_site() {
    let records = vec![record!("A", b"TTAG"), record!("B", b"TCNG")];
    let msa = Alignment::from_records(&records, &dna_alphabet()).unwrap();
    let site = msa.site(2);
    assert_eq!(site.len(), 1);
    assert_eq!(site.row("A").unwrap(), &[2]);
    assert_eq!(site.row("B").unwrap(), &[UNKNOWN]);
}
