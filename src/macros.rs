#[macro_export]
macro_rules! record_wo_desc {
    ($e1:expr,$e2:expr) => {{
        use bio::io::fasta::Record;
        Record::with_attrs($e1, None, $e2)
    }};
}

#[macro_export]
macro_rules! tree {
    ($e:expr) => {{
        use $crate::tree::tree_parser::from_newick;
        from_newick($e).unwrap().pop().unwrap()
    }};
}

#[macro_export]
macro_rules! frequencies {
    ($slice:expr) => {
        $crate::substitution_models::FreqVector::from_column_slice($slice)
    };
}

/// Builds a DNA [`Alignment`](crate::alignment::Alignment) from `(id, sequence)` pairs.
#[macro_export]
macro_rules! dna_alignment {
    ($(($id:expr, $seq:expr)),+ $(,)?) => {{
        use $crate::alignment::Alignment;
        use $crate::alphabets::dna_alphabet;
        let records = vec![$($crate::record_wo_desc!($id, $seq)),+];
        Alignment::from_records(&records, &dna_alphabet()).unwrap()
    }};
}
