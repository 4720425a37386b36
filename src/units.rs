//src/units.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::EnumIter;

/// Pounds per kilogram. Storage is always in kilograms.
pub const KG_TO_LB: f64 = 2.20462;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter)]
pub enum WeightUnit {
    #[default]
    #[serde(rename = "kg", alias = "kilograms")]
    Kilograms,
    #[serde(rename = "lb", alias = "lbs", alias = "pounds")]
    Pounds,
}

impl WeightUnit {
    /// Short label shown next to a weight.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Kilograms => "kg",
            Self::Pounds => "lbs",
        }
    }
}

impl fmt::Display for WeightUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Converts `value` between units. No rounding happens here.
#[must_use]
pub fn convert(value: f64, from: WeightUnit, to: WeightUnit) -> f64 {
    match (from, to) {
        (WeightUnit::Kilograms, WeightUnit::Pounds) => value * KG_TO_LB,
        (WeightUnit::Pounds, WeightUnit::Kilograms) => value / KG_TO_LB,
        _ => value,
    }
}

/// Converts a value typed in the display unit to kilograms for storage.
#[must_use]
pub fn to_storage(value: f64, display: WeightUnit) -> f64 {
    convert(value, display, WeightUnit::Kilograms)
}

/// Converts a stored kilogram value to the display unit.
#[must_use]
pub fn from_storage(kg: f64, display: WeightUnit) -> f64 {
    convert(kg, WeightUnit::Kilograms, display)
}

/// Formats a weight with no decimals when integral, otherwise up to two
/// decimals with trailing zeros dropped.
#[must_use]
pub fn format_weight(value: f64) -> String {
    if value.fract() == 0.0 {
        return format!("{value:.0}");
    }
    let formatted = format!("{value:.2}");
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// "100 kg", "102.5 lbs". One decimal for fractional values.
#[must_use]
pub fn format_weight_with_unit(value: f64, unit: WeightUnit) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0} {unit}")
    } else {
        format!("{value:.1} {unit}")
    }
}

/// Text to pre-fill a weight input field with. Zero shows as empty.
#[must_use]
pub fn format_for_input(value: f64) -> String {
    if value == 0.0 {
        String::new()
    } else {
        format_weight(value)
    }
}

/// Parses user weight input, accepting either "." or "," as the decimal separator.
#[must_use]
pub fn parse_weight(text: &str) -> Option<f64> {
    let normalized = text.trim().replace(',', ".");
    if normalized.is_empty() {
        return None;
    }
    normalized
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Whether `text` is acceptable while typing a weight: empty, or digits
/// with at most one decimal separator.
#[must_use]
pub fn is_valid_weight_input(text: &str) -> bool {
    if text.is_empty() {
        return true;
    }
    let normalized = text.replace(',', ".");
    let mut parts = normalized.split('.');
    let whole = parts.next().unwrap_or_default();
    let fraction = parts.next();
    if parts.next().is_some() {
        return false;
    }
    whole.chars().all(|c| c.is_ascii_digit())
        && fraction.map_or(true, |f| f.chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn conversion_is_identity_for_same_unit() {
        for unit in WeightUnit::iter() {
            assert_eq!(convert(42.5, unit, unit), 42.5);
        }
    }

    #[test]
    fn kg_to_lb_and_back_is_stable() {
        for w in [0.0, 0.5, 1.0, 20.0, 100.0, 142.75, 999.9, 1000.0] {
            let lb = convert(w, WeightUnit::Kilograms, WeightUnit::Pounds);
            let back = convert(lb, WeightUnit::Pounds, WeightUnit::Kilograms);
            let tolerance = 1e-6 * w.abs().max(1.0);
            assert!((back - w).abs() <= tolerance, "{w} came back as {back}");
        }
    }

    #[test]
    fn kg_to_lb_uses_fixed_factor() {
        let lb = convert(100.0, WeightUnit::Kilograms, WeightUnit::Pounds);
        assert!((lb - 220.462).abs() < 1e-9);
    }

    #[test]
    fn formats_integral_and_fractional_weights() {
        assert_eq!(format_weight(100.0), "100");
        assert_eq!(format_weight(102.5), "102.5");
        assert_eq!(format_weight(22.046_2), "22.05");
        assert_eq!(format_weight(7.10), "7.1");
        assert_eq!(format_weight_with_unit(80.0, WeightUnit::Kilograms), "80 kg");
        assert_eq!(format_weight_with_unit(220.462, WeightUnit::Pounds), "220.5 lbs");
        assert_eq!(format_for_input(0.0), "");
        assert_eq!(format_for_input(60.0), "60");
    }

    #[test]
    fn parses_comma_and_dot_separators() {
        assert_eq!(parse_weight("82,5"), Some(82.5));
        assert_eq!(parse_weight("82.5"), Some(82.5));
        assert_eq!(parse_weight(" 60 "), Some(60.0));
        assert_eq!(parse_weight(""), None);
        assert_eq!(parse_weight("abc"), None);
        assert_eq!(parse_weight("1.2.3"), None);
    }

    #[test]
    fn validates_weight_input_while_typing() {
        assert!(is_valid_weight_input(""));
        assert!(is_valid_weight_input("12"));
        assert!(is_valid_weight_input("12,"));
        assert!(is_valid_weight_input("12.5"));
        assert!(!is_valid_weight_input("12.5.1"));
        assert!(!is_valid_weight_input("12,5.1"));
        assert!(!is_valid_weight_input("12a"));
    }
}
