//! Field transform table.
//!
//! A transform chain `parseNumber|omitZero` names entries of this table; each
//! maps to the base-class helper the generated code calls.

/// Transform name -> generated helper
pub const KNOWN_TRANSFORMS: &[(&str, &str)] = &[
    ("parseNumber", "safeNumber"),
    ("parse_number", "safeNumber"),
    ("safeNumber", "safeNumber"),
    ("parseString", "safeString"),
    ("parse_string", "safeString"),
    ("safeString", "safeString"),
    ("parseInteger", "safeInteger"),
    ("safeInteger", "safeInteger"),
    ("parseTimestamp", "safeTimestamp"),
    ("parse_timestamp", "safeTimestamp"),
    ("safeTimestamp", "safeInteger"),
    ("parseTimestampMs", "safeInteger"),
    ("parse_timestamp_ms", "safeInteger"),
    ("omitZero", "omitZero"),
    ("omit_zero", "omitZero"),
    ("lowercase", "safeStringLower"),
    ("uppercase", "safeStringUpper"),
    ("parseCurrencyCode", "safeCurrencyCode"),
    ("parse_currency_code", "safeCurrencyCode"),
    ("parseOrderStatus", "parseOrderStatus"),
    ("parse_order_status", "parseOrderStatus"),
    ("parseSymbol", "safeSymbol"),
    ("parse_symbol", "safeSymbol"),
    ("parseBoolean", "safeBool"),
    ("safeBool", "safeBool"),
];

pub fn transform_helper(name: &str) -> Option<&'static str> {
    KNOWN_TRANSFORMS
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, helper)| *helper)
}

pub fn is_known_transform(name: &str) -> bool {
    transform_helper(name).is_some()
}

/// Helpers that read a key out of a container (`this.safeX(obj, key)`)
pub fn is_accessor(helper: &str) -> bool {
    matches!(
        helper,
        "safeNumber"
            | "safeString"
            | "safeInteger"
            | "safeTimestamp"
            | "safeStringLower"
            | "safeStringUpper"
            | "safeBool"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(transform_helper("parseNumber"), Some("safeNumber"));
        assert_eq!(transform_helper("parse_timestamp_ms"), Some("safeInteger"));
        assert!(!is_known_transform("toNumberish"));
        assert!(is_accessor("safeStringLower"));
        assert!(!is_accessor("omitZero"));
    }
}
