//! Offline pass that keeps only annotated frames with a usable bounding box.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

const ANNOTATION_SUFFIX: &str = "_annotations.txt";

#[derive(Debug, Clone)]
pub struct DatasetPaths {
    pub annotations: PathBuf,
    pub frames: PathBuf,
    pub output: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterReport {
    pub scanned: usize,
    pub kept: usize,
    pub invalid: usize,
    pub missing_frame: usize,
}

/// An annotation is usable when one non-blank line has exactly five
/// space-separated fields (`class cx cy w h`).
pub fn is_valid_annotation(content: &str) -> bool {
    content
        .split('\n')
        .any(|line| !line.trim().is_empty() && line.split(' ').count() == 5)
}

/// Copy every valid annotation and its `.jpg` frame into `paths.output`.
pub fn filter_dataset(paths: &DatasetPaths) -> Result<FilterReport> {
    fs::create_dir_all(&paths.output)
        .with_context(|| format!("creating {}", paths.output.display()))?;

    let mut annotation_files: Vec<PathBuf> = fs::read_dir(&paths.annotations)
        .with_context(|| format!("reading {}", paths.annotations.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && annotation_stem(p).is_some())
        .collect();
    annotation_files.sort();

    let mut report = FilterReport::default();
    for annotation_path in annotation_files {
        report.scanned += 1;
        let content = fs::read_to_string(&annotation_path)
            .with_context(|| format!("reading {}", annotation_path.display()))?;

        if !is_valid_annotation(&content) {
            debug!(file = %annotation_path.display(), "No valid bounding box");
            report.invalid += 1;
            continue;
        }

        let Some(stem) = annotation_stem(&annotation_path) else { continue };
        let frame_name = format!("{stem}.jpg");
        let frame_path = paths.frames.join(&frame_name);
        if !frame_path.exists() {
            debug!(frame = %frame_path.display(), "Frame missing");
            report.missing_frame += 1;
            continue;
        }

        copy_into(&annotation_path, &paths.output)?;
        copy_into(&frame_path, &paths.output)?;
        report.kept += 1;
    }

    info!(
        scanned = report.scanned,
        kept = report.kept,
        invalid = report.invalid,
        missing_frame = report.missing_frame,
        "Filtering complete, results in {}",
        paths.output.display()
    );
    Ok(report)
}

fn annotation_stem(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    name.strip_suffix(ANNOTATION_SUFFIX).map(str::to_owned)
}

fn copy_into(file: &Path, dir: &Path) -> Result<()> {
    let name = file
        .file_name()
        .with_context(|| format!("{} has no file name", file.display()))?;
    fs::copy(file, dir.join(name))
        .with_context(|| format!("copying {} to {}", file.display(), dir.display()))?;
    Ok(())
}
