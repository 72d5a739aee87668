//! A module with helpers for creating small alignment fixtures in unit
//! tests.

use crate::index::AlignmentIndex;
use crate::io::maf::{MafBlock, MafRow, Strand};

/// Build a row from `(name, start, strand, src_size, text)`; the length
/// field is derived from the text.
pub(crate) fn row(name: &str, start: u64, strand: char, src_size: u64, text: &str) -> MafRow {
    let strand = match strand {
        '+' => Strand::Forward,
        '-' => Strand::Reverse,
        other => panic!("bad strand {other:?} in test fixture"),
    };
    MafRow {
        name: name.to_string(),
        start,
        length: text.bytes().filter(|&c| c != b'-').count() as u64,
        strand,
        src_size,
        text: text.to_string(),
    }
}

pub(crate) fn block(rows: &[(&str, u64, char, u64, &str)]) -> MafBlock {
    MafBlock {
        rows: rows
            .iter()
            .map(|&(name, start, strand, src_size, text)| row(name, start, strand, src_size, text))
            .collect(),
    }
}

pub(crate) fn index_of(blocks: Vec<MafBlock>) -> AlignmentIndex {
    AlignmentIndex::build(blocks, "test.maf").unwrap()
}
