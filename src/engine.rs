// ============================================================================
// 迁移引擎 - run orchestration
// ============================================================================
//
// fetch (optional) -> prepare (optional) -> load mapping -> walk source tree
// -> rewrite units (rayon) -> write mirrored outputs (unless dry run)
//
// ============================================================================

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::archive;
use crate::config::MigrationConfig;
use crate::rewriter::{Migrator, RewriteStats, RewrittenUnit};
use crate::source_tree::{self, SourceUnit};
use crate::symbol_table::SymbolTable;

/// Optional stages of a run
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Download and extract the legacy archive first
    pub fetch: bool,
    /// Prune irrelevant subtrees before walking
    pub prepare: bool,
    /// Rewrite without writing any output
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub started_at: DateTime<Local>,
    pub elapsed_ms: u128,
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub flat_mappings: usize,
    pub double_mappings: usize,
    pub skipped_mapping_lines: usize,
    pub units: usize,
    pub files_written: usize,
    pub dry_run: bool,
    pub stats: RewriteStats,
}

impl MigrationReport {
    /// Human-readable summary
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "🔁 Migration {} -> {}\n",
            self.source_dir.display(),
            self.output_dir.display()
        ));
        out.push_str("----------------------------------------\n");
        out.push_str(&format!(
            "Started:   {}\n",
            self.started_at.format("%Y-%m-%d %H:%M:%S")
        ));
        out.push_str(&format!("Elapsed:   {} ms\n", self.elapsed_ms));
        out.push_str(&format!(
            "Mapping:   {} flat, {} double, {} skipped lines\n",
            self.flat_mappings, self.double_mappings, self.skipped_mapping_lines
        ));
        if self.dry_run {
            out.push_str(&format!("Units:     {} (dry run, nothing written)\n", self.units));
        } else {
            out.push_str(&format!(
                "Units:     {} ({} written)\n",
                self.units, self.files_written
            ));
        }
        out.push_str("----------------------------------------\n");
        out.push_str(&format!("Changed lines:       {}\n", self.stats.changed_lines));
        out.push_str(&format!("Dropped imports:     {}\n", self.stats.dropped_imports));
        out.push_str(&format!("Flat replacements:   {}\n", self.stats.flat_replacements));
        out.push_str(&format!("Nested replacements: {}\n", self.stats.nested_replacements));
        out.push_str(&format!("Manual patches:      {}\n", self.stats.patches_applied));
        out
    }
}

/// Run a full migration as configured
pub fn run_migration(config: &MigrationConfig, options: &RunOptions) -> Result<MigrationReport> {
    config.validate()?;
    let started_at = Local::now();
    let timer = Instant::now();

    if options.fetch {
        archive::download(&config.archive_url, &config.archive_path)?;
        archive::extract(&config.archive_path, &config.source_dir)?;
    }
    if options.prepare {
        source_tree::prune(config)?;
    }

    let table = SymbolTable::load(&config.mapping)?;
    let rules = config.rewrite_rules();
    let migrator = Migrator::new(&table, &rules);

    let files = source_tree::collect_source_files(&config.source_dir, config)?;
    let total = files.len();
    info!(units = total, root = %config.source_dir.display(), "source tree loaded");

    // Every unit is rewritten before anything is written
    let units = rewrite_units(&migrator, &files, config.parallel)?;
    if !options.dry_run {
        write_units(&units, config)?;
    }

    let mut stats = RewriteStats::default();
    for unit in &units {
        stats += unit.stats;
    }

    let report = MigrationReport {
        started_at,
        elapsed_ms: timer.elapsed().as_millis(),
        source_dir: config.source_dir.clone(),
        output_dir: config.output_dir.clone(),
        flat_mappings: table.flat_len(),
        double_mappings: table.double_len(),
        skipped_mapping_lines: table.skipped_lines(),
        units: units.len(),
        files_written: if options.dry_run { 0 } else { units.len() },
        dry_run: options.dry_run,
        stats,
    };

    info!(
        units = report.units,
        changed_lines = stats.changed_lines,
        elapsed_ms = report.elapsed_ms as u64,
        "migration finished"
    );
    Ok(report)
}

/// Read and rewrite every file; the first read error aborts
pub fn rewrite_units(
    migrator: &Migrator<'_>,
    files: &[PathBuf],
    parallel: bool,
) -> Result<Vec<RewrittenUnit>> {
    let total = files.len();
    let done = AtomicUsize::new(0);
    let process = |path: &PathBuf| -> Result<RewrittenUnit> {
        let unit = SourceUnit::read(path)?;
        let rewritten = migrator.rewrite_unit(&unit);

        let n = done.fetch_add(1, Ordering::Relaxed) + 1;
        info!("[{}/{}] {}", n, total, path.display());
        Ok(rewritten)
    };

    if parallel {
        files.par_iter().map(process).collect()
    } else {
        files.iter().map(process).collect()
    }
}

/// Write rewritten units to their mirrored paths under `output_dir`
pub fn write_units(units: &[RewrittenUnit], config: &MigrationConfig) -> Result<()> {
    let write = |unit: &RewrittenUnit| -> Result<()> {
        let target = source_tree::output_path(&config.source_dir, &config.output_dir, &unit.path)?;
        source_tree::write_lines(&target, &unit.lines)
            .with_context(|| format!("while migrating {}", unit.path.display()))
    };

    if config.parallel {
        units.par_iter().try_for_each(write)
    } else {
        units.iter().try_for_each(write)
    }
}
