//! Barcode structure and mismatch budget corpus
//!
//! Each case pairs an input with its expected result, using only the
//! re-exported public API.

use spacemake_config::{
    max_barcode_mismatch, BarcodeStructure, ConfigStore, MismatchError, Read, StructureError,
};

// =============================================================================
// Structure expressions
// =============================================================================

#[test]
fn test_accepted_expressions() {
    let cases: &[(&str, Read, usize, bool)] = &[
        ("r1[0:12]", Read::R1, 1, false),
        ("r1[0:12][::-1]", Read::R1, 2, true),
        ("r2[0:9]", Read::R2, 1, false),
        ("r1[2:27]", Read::R1, 1, false),
        ("r2[-10:]", Read::R2, 1, false),
        ("r1[:8][2:]", Read::R1, 2, false),
    ];
    for &(expression, read, rules, reversed) in cases {
        let parsed = BarcodeStructure::parse(expression)
            .unwrap_or_else(|e| panic!("{expression}: {e}"));
        assert_eq!(parsed.read(), read, "{expression}");
        assert_eq!(parsed.rules.len(), rules, "{expression}");
        assert_eq!(parsed.is_reversed(), reversed, "{expression}");
        assert_eq!(parsed.to_string(), expression);
    }
}

#[test]
fn test_rejected_expressions() {
    for expression in ["r1[0,12]", "r1(0:12)", "r1[0:12", "umi", "r1[0:12] "] {
        assert!(
            matches!(
                BarcodeStructure::parse(expression),
                Err(StructureError::Grammar { .. })
            ),
            "{expression} should be rejected"
        );
    }
}

#[test]
fn test_extraction_from_read_pair() {
    let r1 = b"AAAACCCCGGGGTTTTNNNN";
    let r2 = b"ACGTACGTAC";
    let cases: &[(&str, &[u8])] = &[
        ("r1[0:12]", b"AAAACCCCGGGG"),
        ("r1[12:16]", b"TTTT"),
        ("r1[0:4][::-1]", b"AAAA"),
        ("r2[0:4][::-1]", b"TGCA"),
        ("r2[-2:]", b"AC"),
        ("r1[4:12][2:6]", b"CCGG"),
        ("r1[5::9223372036854775807]", b"C"),
        ("r2[-1::-9223372036854775807]", b"C"),
    ];
    for &(expression, expected) in cases {
        let parsed = BarcodeStructure::parse(expression).unwrap();
        assert_eq!(parsed.extract(r1, r2), expected, "{expression}");
    }
}

#[test]
fn test_factory_flavors_extract() {
    let store = ConfigStore::factory_defaults().unwrap();
    let r1: Vec<u8> = b"ACGTACGTACGTACGTACGTACGTACGTACGT".to_vec();
    let r2: Vec<u8> = b"TTTTTTTTTGGGGGGGGG".to_vec();

    let visium = store.barcode_flavor("visium").unwrap();
    let (cell, umi) = visium.extract(&r1, &r2);
    assert_eq!(cell.len(), 16);
    assert_eq!(umi.len(), 12);

    let seq_scope = store.barcode_flavor("seq_scope").unwrap();
    let (cell, umi) = seq_scope.extract(&r1, &r2);
    assert_eq!(cell, &r1[..20]);
    assert_eq!(umi, b"TTTTTTTTT");
}

// =============================================================================
// Mismatch budgets
// =============================================================================

#[test]
fn test_mismatch_budget_corpus() {
    let cases: &[(&[&str], u32)] = &[
        (&["ACGTACGT"], 4),
        (&["ACGTACGT", "ACGTTGCA"], 1),
        (&["AAAAAAAA", "CCCCCCCC"], 3),
        (&["AAAAAAAA", "CCCCCCCC", "AAAAAAAA"], 0),
        (&["AAAAAAAA", "AAAAAACC", "CCCCCCCC"], 0),
        (&["AAAAAAAA", "AAAACCCC", "CCCCCCCC"], 1),
        (&["AAAAAA", "AACCCC"], 1),
    ];
    for &(indices, expected) in cases {
        assert_eq!(max_barcode_mismatch(indices).unwrap(), expected, "{indices:?}");
    }
}

#[test]
fn test_mismatch_budget_rejects_bad_input() {
    let none: &[&str] = &[];
    assert_eq!(max_barcode_mismatch(none), Err(MismatchError::NoIndices));
    assert!(matches!(
        max_barcode_mismatch(&["ACGT", "ACGTAC"]),
        Err(MismatchError::LengthMismatch { first_len: 4, second_len: 6, .. })
    ));
}
