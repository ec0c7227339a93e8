//! Stderr-based failure classification.
//!
//! Tesseract does not report failure reasons through its exit code, so the
//! only signal is the wording of its diagnostics. That wording changes with
//! engine version and locale; treat the result as a best-effort hint.

use crate::error::FailureKind;

/// Checked in order; the first rule with a matching needle wins.
const RULES: &[(&[&str], FailureKind)] = &[
    (&["Failed loading language"], FailureKind::UnsupportedLanguage),
    (&["dpi is outside", "Estimating resolution"], FailureKind::InvalidDpi),
    (&["Could not set option"], FailureKind::InvalidConfiguration),
];

pub fn classify(stderr: &str) -> FailureKind {
    RULES
        .iter()
        .find(|(needles, _)| needles.iter().any(|needle| stderr.contains(needle)))
        .map(|(_, kind)| *kind)
        .unwrap_or(FailureKind::Other)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_language() {
        let stderr = "Error opening data file /usr/share/tessdata/xyz.traineddata\n\
                      Failed loading language 'xyz'\n\
                      Tesseract couldn't load any languages!";
        assert_eq!(classify(stderr), FailureKind::UnsupportedLanguage);
    }

    #[test]
    fn test_dpi_messages() {
        assert_eq!(
            classify("Warning: Invalid resolution 20 dpi. dpi is outside [70, 2400]"),
            FailureKind::InvalidDpi
        );
        assert_eq!(
            classify("Estimating resolution as 163"),
            FailureKind::InvalidDpi
        );
    }

    #[test]
    fn test_invalid_configuration() {
        assert_eq!(
            classify("Could not set option: wrong-param=aaaaaa"),
            FailureKind::InvalidConfiguration
        );
    }

    #[test]
    fn test_language_wins_over_dpi() {
        let stderr = "Estimating resolution as 300\nFailed loading language 'foo'";
        assert_eq!(classify(stderr), FailureKind::UnsupportedLanguage);
    }

    #[test]
    fn test_unmatched_is_other() {
        assert_eq!(classify("Segmentation fault"), FailureKind::Other);
        assert_eq!(classify(""), FailureKind::Other);
    }
}
