//! Demultiplexing mismatch budget.
//!
//! Two indices that differ at `d` positions stay unambiguous as long as each
//! read is allowed at most `ceil(d / 2) - 1` mismatches. The budget for a run
//! is the smallest such value over all index pairs, capped at
//! [`MAX_MISMATCH_CEILING`].

use crate::error::MismatchError;

/// Budget for a run with a single sample, where no collision is possible.
pub const SINGLE_SAMPLE_MISMATCH: u32 = 4;

/// Upper bound of the budget when two or more samples share a run.
pub const MAX_MISMATCH_CEILING: u32 = 3;

/// Number of positions at which `a` and `b` differ.
///
/// Only the shared prefix is compared.
pub fn hamming_distance(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).filter(|(x, y)| x != y).count()
}

/// Maximum number of index mismatches a demultiplexer may tolerate for the
/// given sample indices.
///
/// Identical indices yield 0, the budget never goes negative. Indices of
/// different lengths are rejected rather than compared on their overlap.
pub fn max_barcode_mismatch<S: AsRef<str>>(indices: &[S]) -> Result<u32, MismatchError> {
    match indices {
        [] => Err(MismatchError::NoIndices),
        [_] => Ok(SINGLE_SAMPLE_MISMATCH),
        _ => {
            let mut budget = MAX_MISMATCH_CEILING;
            for (i, first) in indices.iter().enumerate() {
                for second in &indices[i + 1..] {
                    let (first, second) = (first.as_ref(), second.as_ref());
                    if first.len() != second.len() {
                        return Err(MismatchError::LengthMismatch {
                            first: first.to_string(),
                            first_len: first.len(),
                            second: second.to_string(),
                            second_len: second.len(),
                        });
                    }
                    let distance = hamming_distance(first.as_bytes(), second.as_bytes()) as u32;
                    // ceil(d / 2) - 1, floored at zero
                    let allowed = distance.div_ceil(2).saturating_sub(1);
                    budget = budget.min(allowed);
                }
            }
            Ok(budget)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_sample() {
        assert_eq!(max_barcode_mismatch(&["ACGTACGT"]).unwrap(), 4);
    }

    #[test]
    fn test_no_samples() {
        let empty: [&str; 0] = [];
        assert_eq!(max_barcode_mismatch(&empty), Err(MismatchError::NoIndices));
    }

    #[test]
    fn test_two_indices_four_apart() {
        // differ at positions 4..8
        assert_eq!(max_barcode_mismatch(&["ACGTACGT", "ACGTTGCA"]).unwrap(), 1);
    }

    #[test]
    fn test_ceiling_applies_to_distant_indices() {
        assert_eq!(max_barcode_mismatch(&["AAAAAAAAAA", "CCCCCCCCCC"]).unwrap(), 3);
    }

    #[test]
    fn test_identical_indices_floor_at_zero() {
        assert_eq!(
            max_barcode_mismatch(&["ACGTACGT", "ACGTACGT", "ACGTACGT"]).unwrap(),
            0
        );
    }

    #[test]
    fn test_minimum_over_all_pairs() {
        let indices = ["AAAAAAAA", "CCCCCCCC", "AAAAAACC"];
        // AAAAAAAA vs AAAAAACC: d = 2 -> 0
        assert_eq!(max_barcode_mismatch(&indices).unwrap(), 0);

        let indices = ["AAAAAAAA", "CCCCCCCC", "AAAACCCC"];
        // smallest distance is 4 -> 1
        assert_eq!(max_barcode_mismatch(&indices).unwrap(), 1);
    }

    #[test]
    fn test_odd_distance_rounds_up() {
        // d = 3 -> ceil(1.5) - 1 = 1
        assert_eq!(max_barcode_mismatch(&["AAAAAA", "AAACCC"]).unwrap(), 1);
        // d = 5 -> 2
        assert_eq!(max_barcode_mismatch(&["AAAAAA", "ACCCCC"]).unwrap(), 2);
    }

    #[test]
    fn test_length_mismatch_is_an_error() {
        let err = max_barcode_mismatch(&["ACGTACGT", "ACGTAC"]).unwrap_err();
        assert!(matches!(
            err,
            MismatchError::LengthMismatch {
                first_len: 8,
                second_len: 6,
                ..
            }
        ));
    }

    #[test]
    fn test_hamming_distance_truncates_to_shorter() {
        assert_eq!(hamming_distance(b"ACGT", b"ACGA"), 1);
        assert_eq!(hamming_distance(b"ACGTTT", b"ACG"), 0);
    }
}
