//! Decoding of the bracketed array columns of the export view.
//!
//! `str_gender` always carries a bracketed, comma-separated list. `str_value`
//! carries either a bracketed list of the same length, or a bare scalar, in
//! which case the row is a single-valued answer. The leading `[` is the
//! format contract distinguishing the two; it comes from the upstream
//! encoding and is preserved exactly, not re-validated.

use crate::config::{CellValue, DecodeError};

/// The decoded `str_gender`/`str_value` pair of one export row.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct DecodedArrays {
    /// Positionally zipped (classification, raw value) pairs.
    pub pairs: Vec<(String, String)>,
    /// Whether the value column carried a bracketed list itself.
    pub multi_valued: bool,
}

/// Decodes the two array columns and zips them.
///
/// A bare scalar value is wrapped as a one-element list after trimming and
/// after replacing its internal commas with `;`, so it can only zip against
/// a one-element gender list. Mismatched lengths reject the row; they are
/// never truncated or broadcast.
pub fn decode_arrays(raw_gender: &str, raw_value: &str) -> Result<DecodedArrays, DecodeError> {
    let genders = parse_list(raw_gender)?;
    let trimmed = raw_value.trim();
    let multi_valued = trimmed.starts_with('[');
    let values = if multi_valued {
        parse_list(trimmed)?
    } else {
        vec![trimmed.replace(',', ";")]
    };
    if genders.len() != values.len() {
        return Err(DecodeError::CardinalityMismatch {
            genders: genders.len(),
            values: values.len(),
        });
    }
    Ok(DecodedArrays {
        pairs: genders.into_iter().zip(values).collect(),
        multi_valued,
    })
}

impl DecodedArrays {
    /// Applies the post-decode policy.
    ///
    /// Multi-valued rows are categorical multi-selects: the classification is
    /// the gender-array element and the measurement is the constant presence
    /// marker. Single-valued rows keep the gender label as classification and
    /// the decoded measurement as value; a measurement that does not parse as
    /// a number is an error when the indicator's data type is numeric, and a
    /// text value otherwise.
    pub fn classified(&self, data_type: &str) -> Result<Vec<(String, CellValue)>, DecodeError> {
        if self.multi_valued {
            return Ok(self
                .pairs
                .iter()
                .map(|(gender, _)| (gender.clone(), CellValue::Present))
                .collect());
        }
        let mut out: Vec<(String, CellValue)> = Vec::with_capacity(self.pairs.len());
        for (gender, raw) in self.pairs.iter() {
            let cell = match raw.parse::<f64>() {
                Ok(x) => CellValue::Number(x),
                Err(_) if numeric_expected(data_type) => {
                    return Err(DecodeError::NonNumeric {
                        content: raw.clone(),
                    });
                }
                Err(_) => CellValue::Text(raw.clone()),
            };
            out.push((gender.clone(), cell));
        }
        Ok(out)
    }
}

/// Data types for which a non-numeric measurement is a data error.
pub fn numeric_expected(data_type: &str) -> bool {
    matches!(
        data_type.to_ascii_lowercase().as_str(),
        "number" | "numeric" | "integer" | "decimal" | "float"
    )
}

// The source encoding uses [a,b,c]. Elements are trimmed and may carry
// single or double quotes. Nested brackets are malformed.
fn parse_list(raw: &str) -> Result<Vec<String>, DecodeError> {
    let malformed = || DecodeError::Malformed {
        content: raw.to_string(),
    };
    let inner = raw
        .trim()
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(malformed)?;
    if inner.contains('[') || inner.contains(']') {
        return Err(malformed());
    }
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(inner
        .split(',')
        .map(|elt| strip_quotes(elt.trim()).to_string())
        .collect())
}

fn strip_quotes(s: &str) -> &str {
    for quote in ['\'', '"'] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zips_positionally() {
        let decoded = decode_arrays("[a,b,c]", "[1,2,3]").unwrap();
        assert!(decoded.multi_valued);
        assert_eq!(
            decoded.pairs,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
                ("c".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn scalar_value_wraps_against_single_gender() {
        let decoded = decode_arrays("[total]", "42").unwrap();
        assert!(!decoded.multi_valued);
        assert_eq!(decoded.pairs, vec![("total".to_string(), "42".to_string())]);
    }

    #[test]
    fn scalar_value_never_broadcasts() {
        let err = decode_arrays("[male,female]", "42").unwrap_err();
        assert_eq!(
            err,
            DecodeError::CardinalityMismatch {
                genders: 2,
                values: 1
            }
        );
    }

    #[test]
    fn bracketed_lengths_must_match() {
        let err = decode_arrays("[a,b]", "[1,2,3]").unwrap_err();
        assert_eq!(
            err,
            DecodeError::CardinalityMismatch {
                genders: 2,
                values: 3
            }
        );
    }

    #[test]
    fn scalar_internal_commas_become_semicolons() {
        let decoded = decode_arrays("[total]", "yes, partially").unwrap();
        assert_eq!(decoded.pairs[0].1, "yes; partially");
    }

    #[test]
    fn quotes_and_spacing_are_stripped() {
        let decoded = decode_arrays("[ 'male' , \"female\" ]", "[1, 2]").unwrap();
        assert_eq!(decoded.pairs[0].0, "male");
        assert_eq!(decoded.pairs[1].0, "female");
    }

    #[test]
    fn empty_lists_decode() {
        let decoded = decode_arrays("[]", "[]").unwrap();
        assert!(decoded.pairs.is_empty());
    }

    #[test]
    fn malformed_brackets_are_rejected() {
        assert!(matches!(
            decode_arrays("[a,b", "[1,2]"),
            Err(DecodeError::Malformed { .. })
        ));
        assert!(matches!(
            decode_arrays("[a,[b]]", "[1,2]"),
            Err(DecodeError::Malformed { .. })
        ));
    }

    #[test]
    fn multi_valued_classifies_with_presence_marker() {
        let decoded = decode_arrays("[opt1,opt2]", "[x,y]").unwrap();
        let classified = decoded.classified("text").unwrap();
        assert_eq!(
            classified,
            vec![
                ("opt1".to_string(), CellValue::Present),
                ("opt2".to_string(), CellValue::Present),
            ]
        );
    }

    #[test]
    fn single_valued_keeps_measurement() {
        let decoded = decode_arrays("[total]", "42").unwrap();
        let classified = decoded.classified("number").unwrap();
        assert_eq!(
            classified,
            vec![("total".to_string(), CellValue::Number(42.0))]
        );
    }

    #[test]
    fn non_numeric_content_fails_numeric_indicators_only() {
        let decoded = decode_arrays("[total]", "n/a").unwrap();
        assert!(matches!(
            decoded.classified("number"),
            Err(DecodeError::NonNumeric { .. })
        ));
        assert_eq!(
            decoded.classified("text").unwrap(),
            vec![("total".to_string(), CellValue::Text("n/a".to_string()))]
        );
    }
}
