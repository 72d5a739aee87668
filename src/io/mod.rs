pub mod bed;
pub mod maf;
pub mod report;

pub use bed::read_bed_files;
pub use maf::read_maf_file;
pub use report::{read_report, write_report};
