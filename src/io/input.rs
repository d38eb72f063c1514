use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

/// Source id used for text passed directly on the command line
pub const CLI_SOURCE: &str = "CLI_INPUT";

/// One raw text to run through the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText {
    /// File path, or `CLI_INPUT`
    pub source: String,
    pub text: String,
}

/// Gather pipeline inputs from inline text and `.txt` files.
///
/// Directories are walked recursively in file-name order. Missing paths,
/// non-`.txt` files and unreadable files are skipped with a warning.
pub fn collect_inputs(raw_data: Option<&str>, paths: &[PathBuf]) -> Vec<SourceText> {
    let mut inputs = Vec::new();

    if let Some(text) = raw_data.filter(|text| !text.is_empty()) {
        inputs.push(SourceText {
            source: CLI_SOURCE.to_string(),
            text: text.to_string(),
        });
    }

    for path in paths {
        if !path.exists() {
            warn!("Path does not exist, skipping: {:?}", path);
            continue;
        }

        if path.is_dir() {
            let walker = WalkDir::new(path).sort_by_file_name().into_iter();
            for entry in walker {
                match entry {
                    Ok(entry) if entry.file_type().is_file() && is_txt(entry.path()) => {
                        read_into(entry.path(), &mut inputs);
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Failed to walk {:?}: {}", path, e),
                }
            }
        } else if is_txt(path) {
            read_into(path, &mut inputs);
        } else {
            warn!("Not a .txt file, skipping: {:?}", path);
        }
    }

    inputs
}

fn is_txt(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"))
}

fn read_into(path: &Path, inputs: &mut Vec<SourceText>) {
    match std::fs::read_to_string(path) {
        Ok(text) => inputs.push(SourceText {
            source: path.display().to_string(),
            text,
        }),
        Err(e) => warn!("Failed to read {:?}: {}", path, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_inline_text_only() {
        let inputs = collect_inputs(Some("hello"), &[]);
        assert_eq!(
            inputs,
            vec![SourceText {
                source: CLI_SOURCE.to_string(),
                text: "hello".to_string()
            }]
        );
        assert!(collect_inputs(Some(""), &[]).is_empty());
    }

    #[test]
    fn test_directory_walk_filters_txt() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("b.txt"), "second").unwrap();
        fs::write(dir.path().join("a.TXT"), "first").unwrap();
        fs::write(dir.path().join("notes.md"), "ignored").unwrap();
        fs::write(dir.path().join("nested").join("c.txt"), "nested").unwrap();

        let inputs = collect_inputs(None, &[dir.path().to_path_buf()]);
        let texts: Vec<&str> = inputs.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "nested"]);
    }

    #[test]
    fn test_missing_and_non_txt_paths_are_skipped() {
        let dir = TempDir::new().unwrap();
        let md = dir.path().join("story.md");
        fs::write(&md, "ignored").unwrap();
        let txt = dir.path().join("story.txt");
        fs::write(&txt, "kept").unwrap();

        let inputs = collect_inputs(
            Some("inline"),
            &[dir.path().join("missing.txt"), md, txt.clone()],
        );
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].source, CLI_SOURCE);
        assert_eq!(inputs[1].source, txt.display().to_string());
    }
}
