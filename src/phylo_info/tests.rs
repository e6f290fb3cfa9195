use crate::phylo_info::PhyloInfoBuilder as PIB;

#[test]
fn leaves_bound_to_rows() {
    let tree = tree!("((A:1,B:1):1,C:1,D:1);");
    let msa = dna_alignment!(("D", b"GG"), ("C", b"AA"), ("B", b"CC"), ("A", b"TT"));
    let info = PIB::new(tree, msa).build().unwrap();
    assert_eq!(info.msa_length(), 2);
    assert_eq!(info.n_states(), 4);
    for (id, state) in [("A", 0), ("B", 1), ("C", 2), ("D", 3)] {
        assert_eq!(info.leaf_states(&info.tree.idx(id)), &[state, state]);
    }
}

#[test]
fn missing_sequence() {
    let tree = tree!("((A:1,B:1):1,C:1,E:1);");
    let msa = dna_alignment!(("D", b"GG"), ("C", b"AA"), ("B", b"CC"), ("A", b"TT"));
    let err = PIB::new(tree, msa).build().unwrap_err();
    assert!(err.to_string().contains("E"));
}

#[test]
fn taxa_count_mismatch() {
    let tree = tree!("((A:1,B:1):1,C:1);");
    let msa = dna_alignment!(("D", b"GG"), ("C", b"AA"), ("B", b"CC"), ("A", b"TT"));
    assert!(PIB::new(tree, msa).build().is_err());
}

#[test]
fn replace_alignment() {
    let tree = tree!("((A:1,B:1):1,C:1,D:1);");
    let msa = dna_alignment!(("D", b"GA"), ("C", b"AA"), ("B", b"CC"), ("A", b"TT"));
    let info = PIB::new(tree, msa.clone()).build().unwrap();
    let single = info.with_alignment(msa.site(1)).unwrap();
    assert_eq!(single.msa_length(), 1);
    assert_eq!(single.leaf_states(&single.tree.idx("D")), &[2]);
}
