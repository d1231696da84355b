//! Drawing number normalization
//!
//! Drawing numbers arrive with stray padding, doubled spaces and mixed case
//! depending on the design tool that exported them. Normalization only touches
//! whitespace and case: hyphens, underscores, leading zeros and sheet suffixes
//! such as `01of02` survive verbatim, so every sheet stays its own drawing.

/// Canonical form of a raw drawing number.
pub fn normalize(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_trims_and_uppercases() {
        assert_eq!(normalize("  p-91010_1  "), "P-91010_1");
    }

    #[test]
    fn test_normalize_collapses_inner_whitespace() {
        assert_eq!(normalize("P-001 \t  Sheet\n2"), "P-001 SHEET 2");
    }

    #[test]
    fn test_normalize_keeps_separators_and_leading_zeros() {
        assert_eq!(normalize("00123-a_b"), "00123-A_B");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "",
            "   ",
            "p-91010_1 01of02",
            "  Sheet 1 of 2 ",
            "dwg\u{00a0}004",
            "ß-weld",
            "MIXED case\t\tTabs",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn test_sheets_stay_distinct() {
        let base = normalize("P-91010_1");
        let sheet1 = normalize("P-91010_1 01of02");
        let sheet2 = normalize("P-91010_1 02of02");

        assert_ne!(sheet1, sheet2);
        assert_ne!(sheet1, base);
        assert_ne!(sheet2, base);
        assert_eq!(sheet1, "P-91010_1 01OF02");
    }

    #[test]
    fn test_normalize_blank_is_empty() {
        assert_eq!(normalize(" \t "), "");
    }
}
