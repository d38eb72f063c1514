use std::io::{BufRead, Write};

use serde_json::Value;

use crate::models::{HeadlineCandidate, Stage, StageRecord};
use crate::pipeline::decision::{CategoryMenu, Decision, DecisionProvider, default_headline};
use crate::prompts::summaries;
use crate::prompts::{Axis, Selections};

/// Reads operator choices from `input` and writes menus to `output`.
///
/// Empty input or end of input always picks the menu default.
pub struct ConsoleDecisions<R: BufRead, W: Write> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> ConsoleDecisions<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn say(&mut self, text: &str) {
        writeln!(self.output, "{}", text).ok();
    }

    /// Print `prompt` and read one width-folded, trimmed line; `None` at end of input
    fn ask(&mut self, prompt: &str) -> Option<String> {
        write!(self.output, "{} ", prompt).ok();
        self.output.flush().ok();

        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(fold_width(line.trim())),
        }
    }

    fn show_record(&mut self, stage: Stage, record: &StageRecord) {
        match record {
            StageRecord::Delta(delta) => {
                let scored = delta
                    .quality_report
                    .get("professionalism_score")
                    .is_some_and(|score| score.as_i64().unwrap_or(0) > 0);
                if scored && !delta.needs_retry {
                    let report = serde_json::to_string_pretty(&Value::Object(
                        delta.quality_report.clone(),
                    ))
                    .unwrap_or_default();
                    self.say(&format!("Quality report:\n{}", report));
                } else {
                    self.say(
                        "Delta has no score (response was repaired or degraded). \
                         Consider retrying with revision notes.",
                    );
                }
            }
            _ => match record.quality_score() {
                Some(score) if score > 0 => self.say(&format!(
                    "{} quality score: {}/10, model suggests retry: {}",
                    stage,
                    score,
                    record.needs_retry()
                )),
                _ => self.say(&format!(
                    "{} has no score (response was repaired or degraded). \
                     Consider retrying or adjusting parameters.",
                    stage
                )),
            },
        }

        match record {
            StageRecord::Alpha(alpha) => {
                self.say(&format!("Key points: {}", alpha.key_points.join(", ")))
            }
            StageRecord::Beta(beta) => self.say(&format!(
                "Words: {}, tone score: {}, readability: {}",
                beta.word_count, beta.tone_score, beta.readability_score
            )),
            StageRecord::Gamma(gamma) => {
                self.say(&format!("Appeal score: {}/10", gamma.appeal_score))
            }
            StageRecord::Delta(_) => {}
        }
    }

    /// One label for `menu`; `None` keeps the current label
    fn choose_from_list(&mut self, menu: &CategoryMenu) -> Option<String> {
        self.say(&format!("\nChoose {}", menu.axis.title()));
        for (i, label) in menu.options.iter().enumerate() {
            let marker = if menu.current.as_deref() == Some(label.as_str()) {
                " (current)"
            } else {
                ""
            };
            let summary = summaries::summary(menu.axis, label).unwrap_or("");
            self.say(&format!("  {}) {}{}\n     -> {}", i + 1, label, marker, summary));
        }
        self.say("  0) custom value");

        let default_index = menu
            .current
            .as_ref()
            .and_then(|current| menu.options.iter().position(|o| o == current))
            .unwrap_or(0);

        loop {
            let choice = self.ask(&format!(
                "Option number, or type a custom value [{}]:",
                default_index + 1
            ))?;

            if choice.is_empty() {
                return menu
                    .options
                    .get(default_index)
                    .cloned()
                    .or_else(|| menu.current.clone());
            }

            if let Ok(index) = choice.parse::<usize>() {
                if index == 0 {
                    let custom = self.ask("Custom value:")?;
                    if custom.is_empty() {
                        self.say("Custom value cannot be empty.");
                        continue;
                    }
                    self.say(&format!("-> custom value set: {}", custom));
                    return Some(custom);
                }
                if let Some(label) = menu.options.get(index - 1) {
                    return Some(label.clone());
                }
                self.say("Invalid option, choose again.");
                continue;
            }

            self.say(&format!("-> custom value set: {}", choice));
            return Some(choice);
        }
    }
}

impl<R: BufRead, W: Write> DecisionProvider for ConsoleDecisions<R, W> {
    fn choose_action(&mut self, stage: Stage, record: &StageRecord, attempt: u32) -> Decision {
        self.say(&format!("\n=== {} (attempt {}) ===", stage, attempt));
        self.show_record(stage, record);

        if stage == Stage::Delta {
            let Some(choice) = self.ask("Accept the final draft? (y accept / n retry with revision notes / q quit) [y]:")
            else {
                return Decision::Accept;
            };
            return match choice.to_lowercase().as_str() {
                "" | "y" | "yes" => Decision::Accept,
                "n" | "r" => Decision::Retry,
                "q" | "quit" => Decision::Cancel,
                _ => Decision::Unrecognized(choice),
            };
        }

        let next = match stage.next() {
            Some(next) => format!("accept and continue to {}", next),
            None => "accept".to_string(),
        };
        let menu = format!(
            "{} actions:\n  1) {} (a)\n  2) retry (r)\n  3) quit (q)\nChoose [1]:",
            stage, next
        );
        let Some(choice) = self.ask(&menu) else {
            return Decision::Accept;
        };
        match choice.to_lowercase().as_str() {
            "" | "1" | "a" => Decision::Accept,
            "2" | "r" => Decision::Retry,
            "3" | "q" => Decision::Cancel,
            _ => Decision::Unrecognized(choice),
        }
    }

    fn choose_headline(&mut self, candidates: &[HeadlineCandidate], recommended: &str) -> String {
        let fallback = default_headline(candidates, recommended);
        let default_index = candidates
            .iter()
            .position(|c| c.recommended)
            .unwrap_or(0);

        self.say("\nHeadline options:");
        for (i, candidate) in candidates.iter().enumerate() {
            let marker = if candidate.recommended { " (recommended)" } else { "" };
            self.say(&format!(
                "  {}) {}{}: {}",
                i + 1,
                candidate.kind,
                marker,
                candidate.text
            ));
        }
        self.say("  0) custom headline");

        let Some(choice) = self.ask(&format!("Choose a headline [{}]:", default_index + 1)) else {
            return fallback;
        };

        match choice.parse::<usize>() {
            Ok(0) => match self.ask("Custom headline:") {
                Some(custom) if !custom.is_empty() => custom,
                _ => fallback,
            },
            Ok(index) => candidates
                .get(index - 1)
                .map(|c| c.text.clone())
                .unwrap_or(fallback),
            Err(_) => fallback,
        }
    }

    fn choose_categorical_overrides(&mut self, menus: &[CategoryMenu]) -> Selections {
        let mut selections = Selections::default();

        for menu in menus {
            let Some(chosen) = self.choose_from_list(menu) else {
                break;
            };
            let custom = !menu.options.contains(&chosen);
            selections.set(menu.axis, Some(chosen));

            if custom && matches!(menu.axis, Axis::NewsType | Axis::TargetStyle) {
                let go = self
                    .ask(&format!(
                        "Custom {} set. Go straight to generation? [y/n] [y]:",
                        menu.axis.title()
                    ))
                    .unwrap_or_default()
                    .to_lowercase();
                if matches!(go.as_str(), "" | "y" | "yes") {
                    break;
                }
            }
        }

        selections
    }

    fn revision_notes(&mut self) -> String {
        self.ask("Revision instructions for this retry (leave empty to rerun as is):")
            .unwrap_or_default()
    }
}

/// Fold full-width ASCII forms and the ideographic space to their ASCII forms
pub fn fold_width(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
            '\u{3000}' => ' ',
            c => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlphaRecord, DeltaRecord};
    use std::io::Cursor;

    fn console(script: &str) -> ConsoleDecisions<Cursor<Vec<u8>>, Vec<u8>> {
        ConsoleDecisions::new(Cursor::new(script.as_bytes().to_vec()), Vec::new())
    }

    fn alpha() -> StageRecord {
        StageRecord::Alpha(AlphaRecord::default())
    }

    fn candidates() -> Vec<HeadlineCandidate> {
        vec![
            HeadlineCandidate {
                kind: "news".to_string(),
                text: "A".to_string(),
                recommended: false,
            },
            HeadlineCandidate {
                kind: "data".to_string(),
                text: "B".to_string(),
                recommended: true,
            },
        ]
    }

    fn menus() -> Vec<CategoryMenu> {
        vec![
            CategoryMenu {
                axis: Axis::NewsType,
                options: vec!["財經".to_string(), "科技".to_string()],
                current: Some("財經".to_string()),
            },
            CategoryMenu {
                axis: Axis::TargetStyle,
                options: vec!["經濟日報".to_string(), "中央社".to_string()],
                current: Some("經濟日報".to_string()),
            },
            CategoryMenu {
                axis: Axis::Tone,
                options: vec!["客觀中性".to_string()],
                current: Some("客觀中性".to_string()),
            },
        ]
    }

    #[test]
    fn test_fold_width() {
        assert_eq!(fold_width("２"), "2");
        assert_eq!(fold_width("Ｒ"), "R");
        assert_eq!(fold_width("\u{3000}ｑ "), "q");
        assert_eq!(fold_width("財經"), "財經");
    }

    #[test]
    fn test_stage_menu_choices() {
        let mut c = console("2\n\nｑ\nR\nmaybe\n");
        assert_eq!(c.choose_action(Stage::Alpha, &alpha(), 1), Decision::Retry);
        assert_eq!(c.choose_action(Stage::Alpha, &alpha(), 2), Decision::Accept);
        assert_eq!(c.choose_action(Stage::Beta, &alpha(), 1), Decision::Cancel);
        assert_eq!(c.choose_action(Stage::Beta, &alpha(), 2), Decision::Retry);
        assert_eq!(
            c.choose_action(Stage::Gamma, &alpha(), 1),
            Decision::Unrecognized("maybe".to_string())
        );
        // End of input
        assert_eq!(c.choose_action(Stage::Gamma, &alpha(), 2), Decision::Accept);
    }

    #[test]
    fn test_delta_menu_choices() {
        let delta = StageRecord::Delta(DeltaRecord::default());
        let mut c = console("n\nyes\nquit\nok\n");
        assert_eq!(c.choose_action(Stage::Delta, &delta, 1), Decision::Retry);
        assert_eq!(c.choose_action(Stage::Delta, &delta, 2), Decision::Accept);
        assert_eq!(c.choose_action(Stage::Delta, &delta, 3), Decision::Cancel);
        assert_eq!(
            c.choose_action(Stage::Delta, &delta, 4),
            Decision::Unrecognized("ok".to_string())
        );
    }

    #[test]
    fn test_headline_menu() {
        let mut c = console("\n1\n0\nMy headline\n0\n\n9\n");
        assert_eq!(c.choose_headline(&candidates(), "B"), "B");
        assert_eq!(c.choose_headline(&candidates(), "B"), "A");
        assert_eq!(c.choose_headline(&candidates(), "B"), "My headline");
        assert_eq!(c.choose_headline(&candidates(), "B"), "B");
        assert_eq!(c.choose_headline(&candidates(), "B"), "B");

        let output = String::from_utf8(c.into_output()).unwrap();
        assert!(output.contains("2) data (recommended): B"));
    }

    #[test]
    fn test_category_reselection() {
        let mut c = console("2\n2\n\n");
        let selections = c.choose_categorical_overrides(&menus());
        assert_eq!(selections.news_type.as_deref(), Some("科技"));
        assert_eq!(selections.target_style.as_deref(), Some("中央社"));
        assert_eq!(selections.tone.as_deref(), Some("客觀中性"));
    }

    #[test]
    fn test_custom_value_short_circuits() {
        let mut c = console("體育\ny\n");
        let selections = c.choose_categorical_overrides(&menus());
        assert_eq!(selections.news_type.as_deref(), Some("體育"));
        assert_eq!(selections.target_style, None);
        assert_eq!(selections.tone, None);
    }

    #[test]
    fn test_custom_value_without_short_circuit() {
        let mut c = console("0\n\n體育\nn\n1\n1\n");
        let selections = c.choose_categorical_overrides(&menus());
        assert_eq!(selections.news_type.as_deref(), Some("體育"));
        assert_eq!(selections.target_style.as_deref(), Some("經濟日報"));
        assert_eq!(selections.tone.as_deref(), Some("客觀中性"));

        let output = String::from_utf8(c.into_output()).unwrap();
        assert!(output.contains("Custom value cannot be empty."));
    }

    #[test]
    fn test_revision_notes() {
        let mut c = console("  Add the date  \n");
        assert_eq!(c.revision_notes(), "Add the date");
        assert_eq!(c.revision_notes(), "");
    }
}
