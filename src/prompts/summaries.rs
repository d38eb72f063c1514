use super::template::{Axis, Selections};

const NEWS_TYPES: &[(&str, &str)] = &[
    ("財經", "強調數據、法人觀點、市場影響與風險因子。"),
    ("科技", "聚焦技術趨勢、產品節點與產業鏈脈絡。"),
    ("產業", "供應鏈動態、產能、成本與毛利走勢。"),
    ("事件", "時間軸、關鍵當事人與影響評估。"),
    ("政策", "法規要求、適用範圍與產業影響。"),
];

const TARGET_STYLES: &[(&str, &str)] = &[
    ("經濟日報", "倒金字塔結構，正式專業，財經術語適中，聚焦數據與影響。"),
    ("中央社", "平實中性，重事實與來源，標準新聞結構。"),
    ("數位時代", "現代活潑，科技新詞，故事敘述，重趨勢與創新。"),
    ("券商研報", "分析導向，投資術語，邏輯推演，重投資價值。"),
];

const TONES: &[(&str, &str)] = &[
    ("客觀中性", "保持客觀描述，避免誇張與推測。"),
    ("積極正面", "語氣偏正向，強調機會與利多面。"),
    ("謹慎保守", "語氣保守，提醒風險與限制。"),
];

/// Built-in `(label, summary)` pairs for an axis
pub fn default_options(axis: Axis) -> &'static [(&'static str, &'static str)] {
    match axis {
        Axis::NewsType => NEWS_TYPES,
        Axis::TargetStyle => TARGET_STYLES,
        Axis::Tone => TONES,
    }
}

pub fn summary(axis: Axis, label: &str) -> Option<&'static str> {
    default_options(axis)
        .iter()
        .find(|(known, _)| *known == label)
        .map(|(_, text)| *text)
}

/// Summary lines for whichever selected labels are known
pub fn preview_for_choice(selections: &Selections) -> Vec<String> {
    Axis::ALL
        .iter()
        .filter_map(|&axis| {
            let label = selections.get(axis)?;
            let text = summary(axis, label)?;
            Some(format!("[{}] {}: {}", axis.title(), label, text))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_lookup() {
        assert!(summary(Axis::Tone, "謹慎保守").unwrap().contains("風險"));
        assert_eq!(summary(Axis::Tone, "激昂"), None);
        assert_eq!(default_options(Axis::TargetStyle).len(), 4);
    }

    #[test]
    fn test_preview_skips_unknown_labels() {
        let selections = Selections {
            news_type: Some("科技".to_string()),
            target_style: Some("自家風格".to_string()),
            tone: None,
        };
        let lines = preview_for_choice(&selections);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("[news category] 科技: "));
    }
}
