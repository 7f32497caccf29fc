use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::CompareArgs;
use aoilog::util::collect_files;

#[derive(Debug, Clone, PartialEq, Eq)]
struct FileDifference {
    relative_path: String,
    lines: Vec<usize>,
}

pub fn run(args: CompareArgs) -> Result<()> {
    info!(
        left = %args.left.display(),
        right = %args.right.display(),
        extension = %args.extension,
        "starting compare"
    );

    let differences = compare_trees(&args.left, &args.right, &args.extension)?;
    if differences.is_empty() {
        info!("no differences found");
        return Ok(());
    }

    let report = render_report(&differences);
    fs::write(&args.output_path, report)
        .with_context(|| format!("failed to write {}", args.output_path.display()))?;

    info!(
        files = differences.len(),
        path = %args.output_path.display(),
        "wrote difference report"
    );
    Ok(())
}

fn compare_trees(left: &Path, right: &Path, extension: &str) -> Result<Vec<FileDifference>> {
    let left_files = files_with_extension(left, extension)?;
    let right_files = files_with_extension(right, extension)?;

    let mut differences = Vec::new();
    for (relative_path, left_path) in &left_files {
        let Some(right_path) = right_files.get(relative_path) else {
            continue;
        };

        let left_text = read_lossy(left_path)?;
        let right_text = read_lossy(right_path)?;
        let lines = differing_lines(&left_text, &right_text);
        if !lines.is_empty() {
            differences.push(FileDifference {
                relative_path: relative_path.clone(),
                lines,
            });
        }
    }

    Ok(differences)
}

/// Files below `root` keyed by their `/`-separated path relative to `root`.
fn files_with_extension(root: &Path, extension: &str) -> Result<BTreeMap<String, PathBuf>> {
    let mut files = BTreeMap::new();

    for path in collect_files(root)? {
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case(extension))
            .unwrap_or(false);
        if !matches {
            continue;
        }

        let relative = path
            .strip_prefix(root)
            .with_context(|| format!("{} is outside {}", path.display(), root.display()))?
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.insert(relative, path);
    }

    Ok(files)
}

fn read_lossy(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// 1-based numbers of lines that differ, terminators included. A line missing
/// on one side compares as empty.
fn differing_lines(left: &str, right: &str) -> Vec<usize> {
    let left_lines: Vec<&str> = left.split_inclusive('\n').collect();
    let right_lines: Vec<&str> = right.split_inclusive('\n').collect();
    let line_count = left_lines.len().max(right_lines.len());

    (0..line_count)
        .filter(|&index| {
            let left_line = left_lines.get(index).copied().unwrap_or_default();
            let right_line = right_lines.get(index).copied().unwrap_or_default();
            left_line != right_line
        })
        .map(|index| index + 1)
        .collect()
}

fn render_report(differences: &[FileDifference]) -> String {
    let mut lines = Vec::new();
    for difference in differences {
        lines.push(format!("[{}]", difference.relative_path));
        lines.extend(difference.lines.iter().map(|line| format!("Line {line}")));
        lines.push(String::new());
    }
    lines.join("\n")
}
