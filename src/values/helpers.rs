//! Helper functions for BSON value conversion

use bson::{Binary, DateTime};

/// Convert DateTime to ISO 8601 string
///
/// # Arguments
/// * `dt` - BSON DateTime value
///
/// # Returns
/// ISO 8601 formatted string or timestamp fallback
pub fn datetime_to_iso_string(dt: &DateTime) -> String {
    dt.try_to_rfc3339_string()
        .unwrap_or_else(|_| format!("{}", dt.timestamp_millis()))
}

/// Convert Binary data to hexadecimal string
pub fn binary_to_hex(bin: &Binary) -> String {
    hex::encode(&bin.bytes)
}

/// Format a double the way survey clients display numbers: integral values
/// without a fractional part, everything else in shortest round-trip form.
///
/// # Arguments
/// * `f` - Double value
///
/// # Returns
/// Formatted string
pub fn format_double(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{:.0}", f)
    } else {
        format!("{}", f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::spec::BinarySubtype;

    #[test]
    fn test_datetime_to_iso_string() {
        let dt = DateTime::from_millis(0);
        assert_eq!(datetime_to_iso_string(&dt), "1970-01-01T00:00:00Z");
    }

    #[test]
    fn test_binary_to_hex() {
        let bin = Binary {
            subtype: BinarySubtype::Generic,
            bytes: vec![0x01, 0x02, 0x03, 0xff],
        };
        assert_eq!(binary_to_hex(&bin), "010203ff");
    }

    #[test]
    fn test_format_double() {
        assert_eq!(format_double(42.0), "42");
        assert_eq!(format_double(-3.0), "-3");
        assert_eq!(format_double(42.5), "42.5");
        assert_eq!(format_double(f64::NAN), "NaN");
    }
}
