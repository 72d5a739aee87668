//! Reader for MAF (multiple alignment format) files.
//!
//! Only the parts of the format the comparator needs are interpreted: `a`
//! lines open a block, `s` lines contribute rows, and `i`/`e`/`q`
//! annotation lines are skipped without disturbing block boundaries. Deep
//! structural validation is the job of the standalone validator; here we
//! only reject what cannot be represented at all.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::errors::ComparatorError;

/// Which strand of the source sequence a row's text was taken from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Strand {
    Forward,
    Reverse,
}

/// One sequence's contribution to an alignment block.
#[derive(Clone, Debug)]
pub struct MafRow {
    pub name: String,

    /// Start of the aligned region, in strand-local coordinates
    pub start: u64,

    /// Number of non-gap bases in `text`
    pub length: u64,

    pub strand: Strand,

    /// Total length of the source sequence
    pub src_size: u64,

    /// Gapped alignment text, `-` for gaps
    pub text: String,
}

impl MafRow {
    /// Forward-strand position of the first aligned base. For reverse
    /// strand rows positions descend from here, one per non-gap column.
    #[inline]
    pub fn first_position(&self) -> u64 {
        match self.strand {
            Strand::Forward => self.start,
            Strand::Reverse => self.src_size - self.start - 1,
        }
    }
}

/// A set of rows that were aligned together. Has no identity beyond its
/// rows; the block width is the shared gapped text length.
#[derive(Clone, Debug, Default)]
pub struct MafBlock {
    pub rows: Vec<MafRow>,
}

impl MafBlock {
    #[inline]
    pub fn width(&self) -> usize {
        self.rows.first().map(|r| r.text.len()).unwrap_or(0)
    }
}

/// Read all alignment blocks from a MAF file. Files ending in `.gz` are
/// decompressed on the fly.
pub fn read_maf_file(path: impl AsRef<Path>) -> Result<Vec<MafBlock>, ComparatorError> {
    let p = path.as_ref();
    let is_gzipped = p
        .file_name()
        .map(|v| v.to_string_lossy().ends_with(".gz"))
        .unwrap_or(false);

    let reader: Box<dyn BufRead> = if is_gzipped {
        Box::new(File::open(p).map(MultiGzDecoder::new).map(BufReader::new)?)
    } else {
        Box::new(File::open(p).map(BufReader::new)?)
    };

    read_maf(reader, &p.to_string_lossy())
}

/// Read all alignment blocks from an open reader. `label` is only used in
/// error messages.
pub fn read_maf(reader: impl BufRead, label: &str) -> Result<Vec<MafBlock>, ComparatorError> {
    let mut blocks = Vec::new();
    let mut current: Option<MafBlock> = None;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = line_no as u64 + 1;
        let trimmed = line.trim_end();

        if trimmed.is_empty() {
            // A blank line terminates the open block.
            if let Some(block) = current.take() {
                blocks.push(block);
            }
            continue;
        }

        match trimmed.as_bytes()[0] {
            b'#' => continue,
            b'a' => {
                // A new alignment line also implies the end of any open block.
                if let Some(block) = current.take() {
                    blocks.push(block);
                }
                current = Some(MafBlock::default());
            }
            b's' => {
                let row = parse_row(trimmed, label, line_no)?;
                match current.as_mut() {
                    Some(block) => block.rows.push(row),
                    None => {
                        return Err(ComparatorError::Format {
                            path: label.to_string(),
                            line: Some(line_no),
                            reason: "sequence line outside of an alignment block".to_string(),
                        })
                    }
                }
            }
            // Annotation lines carried inside a block; not interpreted here.
            b'i' | b'e' | b'q' => continue,
            _ => {
                return Err(ComparatorError::Format {
                    path: label.to_string(),
                    line: Some(line_no),
                    reason: format!("unrecognized line type {:?}", trimmed.chars().next().unwrap()),
                })
            }
        }
    }

    if let Some(block) = current.take() {
        blocks.push(block);
    }

    Ok(blocks)
}

fn parse_row(line: &str, label: &str, line_no: u64) -> Result<MafRow, ComparatorError> {
    let format_err = |reason: String| ComparatorError::Format {
        path: label.to_string(),
        line: Some(line_no),
        reason,
    };

    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 7 {
        return Err(format_err(format!(
            "expected 7 whitespace separated fields on an 's' line, found {}",
            fields.len()
        )));
    }

    let parse_u64 = |field: &str, what: &str| {
        field
            .parse::<u64>()
            .map_err(|_| format_err(format!("could not parse {what} field {field:?}")))
    };

    let start = parse_u64(fields[2], "start")?;
    let length = parse_u64(fields[3], "length")?;
    let strand = match fields[4] {
        "+" => Strand::Forward,
        "-" => Strand::Reverse,
        other => return Err(format_err(format!("invalid strand field {other:?}"))),
    };
    let src_size = parse_u64(fields[5], "source length")?;

    Ok(MafRow {
        name: fields[1].to_string(),
        start,
        length,
        strand,
        src_size,
        text: fields[6].to_string(),
    })
}
