use serde::Serialize;

const CJK_PUNCTUATION: &str = "，。；：「」『』（）！？《》、—•％￥＄";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LanguageCheck {
    /// Text contains Chinese punctuation or CJK ideographs
    pub ok: bool,
    /// Share of ASCII letters among all characters, to 3 decimals
    pub ratio_en: f64,
}

/// Advisory only; the result is logged and never changes control flow
pub fn check_language(text: &str) -> LanguageCheck {
    let has_punctuation = text.chars().any(|c| CJK_PUNCTUATION.contains(c));
    let has_ideograph = text.chars().any(|c| ('\u{4E00}'..='\u{9FFF}').contains(&c));

    let total = text.chars().count().max(1);
    let letters = text.chars().filter(char::is_ascii_alphabetic).count();
    let ratio = letters as f64 / total as f64;

    LanguageCheck {
        ok: has_punctuation || has_ideograph,
        ratio_en: (ratio * 1000.0).round() / 1000.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chinese_text() {
        let check = check_language("台積電營收創新高");
        assert!(check.ok);
        assert_eq!(check.ratio_en, 0.0);
    }

    #[test]
    fn test_punctuation_only_counts() {
        assert!(check_language("AI，ok").ok);
    }

    #[test]
    fn test_english_text() {
        let check = check_language("abc d");
        assert!(!check.ok);
        assert_eq!(check.ratio_en, 0.8);
    }

    #[test]
    fn test_empty_text() {
        let check = check_language("");
        assert!(!check.ok);
        assert_eq!(check.ratio_en, 0.0);
    }

    #[test]
    fn test_ratio_rounding() {
        // 1 letter out of 3 characters
        assert_eq!(check_language("a12").ratio_en, 0.333);
    }
}
