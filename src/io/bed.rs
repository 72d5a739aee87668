//! Reader for the BED-like interval restriction files accepted by
//! `--bedFiles`. Each line is `sequenceName <tab> start <tab> end` with
//! half-open coordinates.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::errors::ComparatorError;
use crate::regions::RegionMap;

/// Parse every given bed file into a single [`RegionMap`]. Overlapping
/// intervals for the same sequence are rejected.
pub fn read_bed_files(paths: &[impl AsRef<Path>]) -> Result<RegionMap, ComparatorError> {
    let mut map = RegionMap::default();
    for path in paths {
        let p = path.as_ref();
        let reader = File::open(p).map(BufReader::new)?;
        read_bed(reader, &p.to_string_lossy(), &mut map)?;
    }
    map.finish()?;
    Ok(map)
}

/// Parse one bed file from an open reader into `map`. `label` is only
/// used in error messages.
pub fn read_bed(
    reader: impl BufRead,
    label: &str,
    map: &mut RegionMap,
) -> Result<(), ComparatorError> {
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = line_no as u64 + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let format_err = |reason: String| ComparatorError::Format {
            path: label.to_string(),
            line: Some(line_no),
            reason,
        };

        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        if fields.len() < 3 {
            return Err(format_err(format!(
                "expected at least 3 fields on a bed line, found {}",
                fields.len()
            )));
        }
        let start = fields[1]
            .parse::<u64>()
            .map_err(|_| format_err(format!("could not parse start field {:?}", fields[1])))?;
        let end = fields[2]
            .parse::<u64>()
            .map_err(|_| format_err(format!("could not parse end field {:?}", fields[2])))?;
        if end <= start {
            return Err(format_err(format!("empty or inverted interval [{start}, {end})")));
        }

        map.add(fields[0], start, end, label)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::read_bed;
    use crate::errors::ComparatorError;
    use crate::regions::RegionMap;

    #[test]
    fn test_read_intervals() {
        let mut map = RegionMap::default();
        let bed = "# header\napple.chr1\t10\t20\napple.chr1\t30\t40\npear.chr2\t0\t5\n";
        read_bed(Cursor::new(bed), "a.bed", &mut map).unwrap();
        map.finish().unwrap();

        assert!(map.contains("apple.chr1", 10));
        assert!(map.contains("apple.chr1", 19));
        assert!(!map.contains("apple.chr1", 20));
        assert!(map.contains("apple.chr1", 35));
        assert!(!map.contains("apple.chr1", 25));
        assert!(map.contains("pear.chr2", 0));
        assert!(!map.contains("banana.chr9", 0));
    }

    #[test]
    fn test_overlap_rejected() {
        let mut map = RegionMap::default();
        read_bed(Cursor::new("apple\t0\t10\napple\t5\t15\n"), "a.bed", &mut map).unwrap();
        assert!(matches!(map.finish(), Err(ComparatorError::Format { .. })));
    }

    #[test]
    fn test_inverted_interval_rejected() {
        let mut map = RegionMap::default();
        let result = read_bed(Cursor::new("apple\t10\t10\n"), "a.bed", &mut map);
        assert!(matches!(result, Err(ComparatorError::Format { line: Some(1), .. })));
    }
}
