//! Query language detection.
//!
//! Detection runs only on queries long enough to classify reliably;
//! anything shorter falls back to the variant's document language. Codes
//! come back from the detector as ISO 639-3 and are normalized to the
//! two-letter codes used in variant descriptors.

/// Normalizes an ISO 639-3 detector code to the two-letter codes used in
/// configuration. Unknown codes pass through unchanged.
#[must_use]
pub fn normalize_lang(code: &str) -> String {
    match code {
        "zho" | "cmn" | "lzh" => "zh".to_string(),
        "eng" => "en".to_string(),
        "jpn" => "ja".to_string(),
        other => other.to_string(),
    }
}

/// Detects the language of `query`.
///
/// Queries shorter than `min_len` characters, and queries the detector
/// cannot classify, fall back to `default`.
#[must_use]
pub fn detect_language(query: &str, min_len: usize, default: &str) -> String {
    if query.chars().count() < min_len {
        return default.to_string();
    }
    whatlang::detect(query).map_or_else(
        || default.to_string(),
        |info| normalize_lang(info.lang().code()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lang() {
        assert_eq!(normalize_lang("cmn"), "zh");
        assert_eq!(normalize_lang("zho"), "zh");
        assert_eq!(normalize_lang("lzh"), "zh");
        assert_eq!(normalize_lang("eng"), "en");
        assert_eq!(normalize_lang("jpn"), "ja");
        assert_eq!(normalize_lang("kor"), "kor");
    }

    #[test]
    fn test_short_query_falls_back() {
        assert_eq!(detect_language("条件格式", 10, "zh"), "zh");
        assert_eq!(detect_language("short", 10, "en"), "en");
        assert_eq!(detect_language("", 10, "ja"), "ja");
    }

    #[test]
    fn test_detects_english() {
        let lang = detect_language(
            "how do I apply conditional formatting to a spreadsheet cell",
            10,
            "zh",
        );
        assert_eq!(lang, "en");
    }

    #[test]
    fn test_detects_chinese() {
        let lang = detect_language("如何在表格单元格中应用条件格式规则的说明", 10, "en");
        assert_eq!(lang, "zh");
    }

    #[test]
    fn test_min_len_counts_chars_not_bytes() {
        // Ten ideographs are thirty bytes but exactly ten characters.
        let query = "条件格式规则使用说明书";
        assert!(query.chars().count() >= 10);
        let lang = detect_language(query, 10, "en");
        assert_eq!(lang, "zh");
    }
}
