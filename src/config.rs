//! 迁移配置 (srg-remap.yml)
//!
//! All fields are optional in the YAML file; missing ones fall back to the
//! CraftBukkit defaults below. CLI flags override file values.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::rewriter::patches::{ManualPatch, PatchTable};
use crate::rewriter::{QualifierStyle, RewriteRules};

/// Config file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "srg-remap.yml";

const DEFAULT_ARCHIVE_URL: &str =
    "https://hub.spigotmc.org/stash/rest/api/latest/projects/SPIGOT/repos/craftbukkit/archive?format=zip";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MigrationConfig {
    /// Where `migrate --fetch` downloads the legacy distribution from
    pub archive_url: String,
    /// Downloaded archive location
    pub archive_path: PathBuf,
    /// Legacy source root (archive is extracted here)
    pub source_dir: PathBuf,
    /// Mirrored output root
    pub output_dir: PathBuf,
    /// SRG mapping file
    pub mapping: PathBuf,
    /// Subtrees of `source_dir` removed by `--prepare`
    pub prune: Vec<PathBuf>,
    /// `--prepare` also removes regular files directly under `source_dir`
    pub prune_top_level_files: bool,
    /// File extensions (without dot) treated as source units
    pub extensions: Vec<String>,
    /// Root of the namespace being migrated, e.g. "net.minecraft"
    pub legacy_namespace: String,
    /// Foreign roots whose identifiers are never rewritten
    pub protected_roots: Vec<String>,
    /// Appended after the built-in manual patches
    pub extra_patches: Vec<ManualPatch>,
    pub qualifier: QualifierStyle,
    /// Rewrite units on the rayon pool
    pub parallel: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            archive_url: DEFAULT_ARCHIVE_URL.to_string(),
            archive_path: PathBuf::from("OldCraftBukkit/CraftBukkit.zip"),
            source_dir: PathBuf::from("OldCraftBukkit"),
            output_dir: PathBuf::from("NewCraftBukkit"),
            mapping: PathBuf::from("bukkit_srg.srg"),
            prune: vec![
                PathBuf::from("src/assembly"),
                PathBuf::from("src/main/resources"),
                PathBuf::from("src/test"),
                PathBuf::from("nms-patches"),
            ],
            prune_top_level_files: true,
            extensions: vec!["java".to_string()],
            legacy_namespace: "net.minecraft".to_string(),
            protected_roots: vec!["org.bukkit".to_string(), "com.mojang".to_string()],
            extra_patches: Vec::new(),
            qualifier: QualifierStyle::default(),
            parallel: true,
        }
    }
}

impl MigrationConfig {
    /// Parse a YAML document
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text).context("invalid migration config")?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path (must exist), or from `srg-remap.yml` in the
    /// working directory if present, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        if !required && !path.exists() {
            return Ok(Self::default());
        }

        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("in config {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.namespace().is_empty() {
            bail!("legacy_namespace must not be empty");
        }
        if self.namespace().split('.').any(str::is_empty) {
            bail!(
                "legacy_namespace {:?} is not a dotted package name",
                self.legacy_namespace
            );
        }
        if self.extensions.is_empty() {
            bail!("extensions must list at least one file extension");
        }
        if self.source_dir == self.output_dir {
            bail!(
                "source_dir and output_dir must differ (both are {})",
                self.source_dir.display()
            );
        }
        Ok(())
    }

    /// `legacy_namespace` without surrounding whitespace or trailing dots
    fn namespace(&self) -> &str {
        self.legacy_namespace.trim().trim_end_matches('.')
    }

    /// Engine-facing subset of the configuration
    pub fn rewrite_rules(&self) -> RewriteRules {
        RewriteRules {
            legacy_namespace: self.namespace().to_string(),
            protected_roots: self.protected_roots.clone(),
            patches: PatchTable::builtin().with_extra(self.extra_patches.iter().cloned()),
            qualifier: self.qualifier,
        }
    }

    /// Whether `path` has one of the configured source extensions
    pub fn is_source_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|wanted| wanted == ext))
    }
}
