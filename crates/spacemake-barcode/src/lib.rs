//! Read-level barcode helpers for the spacemake pipeline.
//!
//! Two leaf algorithms live here:
//! - [`BarcodeStructure`]: parses slice expressions such as `r1[0:12][::-1]`
//!   into ordered extraction rules and applies them to raw reads.
//! - [`max_barcode_mismatch`]: derives the demultiplexing mismatch budget
//!   from the sample indices of one sequencing run.

mod error;
mod mismatch;
mod structure;

pub use error::{MismatchError, StructureError};
pub use mismatch::{
    hamming_distance, max_barcode_mismatch, MAX_MISMATCH_CEILING, SINGLE_SAMPLE_MISMATCH,
};
pub use structure::{BarcodeStructure, Read, SliceRule, STRUCTURE_GRAMMAR};
