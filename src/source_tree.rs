// ============================================================================
// 源码树 - walk, prune, read and write source units
// ============================================================================

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::MigrationConfig;

/// One source file, split into lines without terminators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    pub path: PathBuf,
    pub lines: Vec<String>,
}

impl SourceUnit {
    /// Split text on `\n`, dropping a trailing `\r` per line
    pub fn from_text(path: impl Into<PathBuf>, text: &str) -> Self {
        let lines = text
            .lines()
            .map(str::to_string)
            .collect();
        Self {
            path: path.into(),
            lines,
        }
    }

    /// Read a file; invalid UTF-8 is replaced rather than rejected
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => {
                warn!(path = %path.display(), "not valid UTF-8, decoding lossily");
                String::from_utf8_lossy(err.as_bytes()).into_owned()
            }
        };
        Ok(Self::from_text(path, &text))
    }
}

/// Summary of a `prune` run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneSummary {
    pub removed_dirs: usize,
    pub removed_files: usize,
}

/// Remove the configured irrelevant subtrees (and, optionally, every regular
/// file at the top of the source root). Missing entries are skipped.
pub fn prune(config: &MigrationConfig) -> Result<PruneSummary> {
    let root = &config.source_dir;
    let mut summary = PruneSummary::default();

    for relative in &config.prune {
        let target = root.join(relative);
        if target.is_dir() {
            fs::remove_dir_all(&target)
                .with_context(|| format!("failed to remove {}", target.display()))?;
            summary.removed_dirs += 1;
        } else if target.is_file() {
            fs::remove_file(&target)
                .with_context(|| format!("failed to remove {}", target.display()))?;
            summary.removed_files += 1;
        }
    }

    if config.prune_top_level_files && root.is_dir() {
        let entries = fs::read_dir(root)
            .with_context(|| format!("failed to list {}", root.display()))?;
        for entry in entries {
            let entry = entry.with_context(|| format!("failed to list {}", root.display()))?;
            if entry.file_type()?.is_file() {
                fs::remove_file(entry.path())
                    .with_context(|| format!("failed to remove {}", entry.path().display()))?;
                summary.removed_files += 1;
            }
        }
    }

    info!(
        dirs = summary.removed_dirs,
        files = summary.removed_files,
        "source tree prepared"
    );
    Ok(summary)
}

/// Paths of every source file under `root`, sorted
pub fn collect_source_files(root: &Path, config: &MigrationConfig) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
        if entry.file_type().is_file() && config.is_source_file(entry.path()) {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

/// Mirror `path` (inside `source_root`) under `output_root`
pub fn output_path(source_root: &Path, output_root: &Path, path: &Path) -> Result<PathBuf> {
    let relative = path.strip_prefix(source_root).with_context(|| {
        format!(
            "{} is not inside {}",
            path.display(),
            source_root.display()
        )
    })?;
    Ok(output_root.join(relative))
}

/// Write lines, each terminated with `\n`, creating parent directories
pub fn write_lines<S: AsRef<str>>(path: &Path, lines: &[S]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for line in lines {
        writer.write_all(line.as_ref().as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
