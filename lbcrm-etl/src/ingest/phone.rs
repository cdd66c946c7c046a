//! Phone number normalization

use crate::ingest::sheet::CellValue;

/// Minimum digit count for a usable phone number
pub const MIN_PHONE_DIGITS: usize = 8;

/// Outcome of normalizing a raw phone cell
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NormalizedPhone {
    /// No value in the cell
    Missing,
    /// Fewer than [`MIN_PHONE_DIGITS`] digits after stripping
    Invalid,
    /// Digits only, in input order
    Digits(String),
}

impl NormalizedPhone {
    pub fn digits(&self) -> Option<&str> {
        match self {
            NormalizedPhone::Digits(d) => Some(d),
            _ => None,
        }
    }
}

/// Strip every non-digit character from a phone value
pub fn normalize_phone(value: &str) -> NormalizedPhone {
    if value.is_empty() {
        return NormalizedPhone::Missing;
    }

    let digits: String = value.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < MIN_PHONE_DIGITS {
        NormalizedPhone::Invalid
    } else {
        NormalizedPhone::Digits(digits)
    }
}

/// Normalize a spreadsheet cell
///
/// Numeric cells are rendered without a fractional part first.
pub fn normalize_phone_cell(cell: &CellValue) -> NormalizedPhone {
    match cell {
        CellValue::Empty => NormalizedPhone::Missing,
        CellValue::Text(s) => normalize_phone(s),
        CellValue::Number(n) if !n.is_finite() => NormalizedPhone::Invalid,
        other => other
            .as_text()
            .map_or(NormalizedPhone::Missing, |s| normalize_phone(&s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_formatting() {
        assert_eq!(
            normalize_phone("(11) 98765-4321"),
            NormalizedPhone::Digits("11987654321".to_string())
        );
        assert_eq!(
            normalize_phone("+55 11 3333.4444"),
            NormalizedPhone::Digits("551133334444".to_string())
        );
    }

    #[test]
    fn test_short_values_invalid() {
        assert_eq!(normalize_phone("1234-567"), NormalizedPhone::Invalid);
        assert_eq!(normalize_phone("sem telefone"), NormalizedPhone::Invalid);
        assert_eq!(normalize_phone("   "), NormalizedPhone::Invalid);
    }

    #[test]
    fn test_exactly_eight_digits_valid() {
        assert_eq!(
            normalize_phone("3333-4444"),
            NormalizedPhone::Digits("33334444".to_string())
        );
    }

    #[test]
    fn test_absent_values_missing() {
        assert_eq!(normalize_phone(""), NormalizedPhone::Missing);
        assert_eq!(normalize_phone_cell(&CellValue::Empty), NormalizedPhone::Missing);
    }

    #[test]
    fn test_numeric_cell() {
        assert_eq!(
            normalize_phone_cell(&CellValue::Number(11987654321.0)),
            NormalizedPhone::Digits("11987654321".to_string())
        );
        assert_eq!(
            normalize_phone_cell(&CellValue::Number(f64::NAN)),
            NormalizedPhone::Invalid
        );
    }

    #[test]
    fn test_output_is_exact_digit_filter() {
        let inputs = [
            "(11) 98765-4321",
            "tel: 21 2222 3333 ramal 9",
            "abc",
            "0800 123 4567",
            "12a34b56c78d",
            "١٢٣٤٥٦٧٨ 12",
            "",
        ];

        for input in inputs {
            let expected: String = input.chars().filter(|c| c.is_ascii_digit()).collect();
            match normalize_phone(input) {
                NormalizedPhone::Missing => assert!(input.is_empty()),
                NormalizedPhone::Invalid => assert!(expected.len() < MIN_PHONE_DIGITS),
                NormalizedPhone::Digits(d) => {
                    assert!(d.len() >= MIN_PHONE_DIGITS);
                    assert!(d.chars().all(|c| c.is_ascii_digit()));
                    assert_eq!(d, expected);
                }
            }
        }
    }
}
