// ============================================================================
// 符号表模块 - SRG 映射表 (legacy name -> new name)
// ============================================================================

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

// ============================================================================
// SymbolRecord - one class-level rename
// ============================================================================

/// A single class-level rename parsed from the mapping source
///
/// `legacy_short_name` keeps the nesting of the legacy class (`Outer.Inner`),
/// `new_qualified_name` is either `New` (flat) or `NewOuter.NewInner` (double).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolRecord {
    /// e.g. "Entity", "PacketPlayOutTitle.EnumTitleAction"
    pub legacy_short_name: String,
    /// e.g. "net.minecraft.server." (trailing dot, empty for the default package)
    pub legacy_qualifier_prefix: String,
    /// e.g. "Entity", "ClientboundSetTitlesPacket.Type"
    pub new_qualified_name: String,
    /// e.g. "net.minecraft.world.entity."
    pub new_qualifier_prefix: String,
}

/// Records are shared between the table maps and every per-unit context
pub type SymbolRef = Arc<SymbolRecord>;

impl SymbolRecord {
    /// `legacy_qualifier_prefix + legacy_short_name`
    pub fn legacy_qualified_name(&self) -> String {
        format!("{}{}", self.legacy_qualifier_prefix, self.legacy_short_name)
    }

    /// `new_qualifier_prefix + new_qualified_name`
    pub fn new_fully_qualified_name(&self) -> String {
        format!("{}{}", self.new_qualifier_prefix, self.new_qualified_name)
    }

    /// Whether the new name is `Outer.Inner`
    pub fn is_double(&self) -> bool {
        self.new_qualified_name.contains('.')
    }

    /// (outer, inner) of the new name, if it is nested
    pub fn new_segments(&self) -> Option<(&str, &str)> {
        split_pair(&self.new_qualified_name)
    }

    /// (outer, inner) of the legacy name, if it is nested
    pub fn legacy_segments(&self) -> Option<(&str, &str)> {
        split_pair(&self.legacy_short_name)
    }
}

fn split_pair(name: &str) -> Option<(&str, &str)> {
    let (outer, inner) = name.split_once('.')?;
    if outer.is_empty() || inner.is_empty() || inner.contains('.') {
        return None;
    }
    Some((outer, inner))
}

// ============================================================================
// Mapping line parsing
// ============================================================================

/// Where a parsed entry belongs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Flat,
    Double,
}

/// Member-level entries (fields / methods) are indented under their class
fn is_member_line(line: &str) -> bool {
    line.starts_with("    ") || line.starts_with('\t')
}

/// Split a slash path into (dotted prefix with trailing dot, simple name)
///
/// `net/minecraft/server/Foo$Bar` -> ("net.minecraft.server.", "Foo.Bar")
fn split_path(path: &str) -> Option<(String, String)> {
    let (package, last) = match path.rsplit_once('/') {
        Some((package, last)) => (Some(package), last),
        None => (None, path),
    };

    let simple = last.replace('$', ".");
    if simple.is_empty() || simple.split('.').any(str::is_empty) {
        return None;
    }

    let prefix = match package {
        Some(pkg) if pkg.split('/').any(str::is_empty) => return None,
        Some(pkg) => format!("{}.", pkg.replace('/', ".")),
        None => String::new(),
    };

    Some((prefix, simple))
}

/// Parse one raw mapping line into a record and its placement
fn parse_entry(line: &str) -> Option<(SymbolRecord, Placement)> {
    let mut tokens = line.split_whitespace();
    let (legacy, new) = match (tokens.next(), tokens.next(), tokens.next()) {
        (Some(legacy), Some(new), None) => (legacy, new),
        _ => return None,
    };

    let (legacy_prefix, legacy_short) = split_path(legacy)?;
    let (new_prefix, new_name) = split_path(new)?;

    let placement = match new_name.split('.').count() {
        1 => Placement::Flat,
        2 => Placement::Double,
        _ => return None,
    };

    Some((
        SymbolRecord {
            legacy_short_name: legacy_short,
            legacy_qualifier_prefix: legacy_prefix,
            new_qualified_name: new_name,
            new_qualifier_prefix: new_prefix,
        },
        placement,
    ))
}

// ============================================================================
// SymbolTable - flat + double maps, read-only after construction
// ============================================================================

/// The parsed mapping source
///
/// Both maps are keyed by the legacy short name; a name lives in only one of
/// them. The table is built once and shared read-only for the whole run.
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    flat: HashMap<String, SymbolRef>,
    double: HashMap<String, SymbolRef>,
    /// legacy prefix -> flat records under it (sorted by short name)
    by_prefix: BTreeMap<String, Vec<SymbolRef>>,
    /// double records sorted by key
    double_sorted: Vec<SymbolRef>,
    skipped_lines: usize,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the table from raw mapping lines
    ///
    /// Malformed lines are dropped and counted, never fatal.
    pub fn parse<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = Self::new();

        for line in lines {
            let line = line.as_ref();
            if is_member_line(line) {
                continue;
            }
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            match parse_entry(trimmed) {
                Some((record, placement)) => table.insert(record, placement),
                None => table.skipped_lines += 1,
            }
        }

        table.rebuild_indices();
        table
    }

    /// Read and parse a mapping file
    ///
    /// Fails only if the file cannot be opened or read.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open mapping file {}", path.display()))?;

        let lines = BufReader::new(file)
            .lines()
            .collect::<std::io::Result<Vec<String>>>()
            .with_context(|| format!("failed to read mapping file {}", path.display()))?;

        let table = Self::parse(lines);
        info!(
            flat = table.flat_len(),
            double = table.double_len(),
            skipped = table.skipped_lines(),
            "Detected {} class names and {} double class names in {}",
            table.flat_len(),
            table.double_len(),
            path.display()
        );
        Ok(table)
    }

    fn insert(&mut self, record: SymbolRecord, placement: Placement) {
        let key = record.legacy_short_name.clone();
        let record = Arc::new(record);
        match placement {
            Placement::Flat => {
                self.double.remove(&key);
                self.flat.insert(key, record);
            }
            Placement::Double => {
                self.flat.remove(&key);
                self.double.insert(key, record);
            }
        }
    }

    fn rebuild_indices(&mut self) {
        self.by_prefix.clear();
        for record in self.flat.values() {
            self.by_prefix
                .entry(record.legacy_qualifier_prefix.clone())
                .or_default()
                .push(Arc::clone(record));
        }
        for group in self.by_prefix.values_mut() {
            group.sort_by(|a, b| a.legacy_short_name.cmp(&b.legacy_short_name));
        }

        self.double_sorted = self.double.values().cloned().collect();
        self.double_sorted
            .sort_by(|a, b| a.legacy_short_name.cmp(&b.legacy_short_name));
    }

    /// Flat record by legacy short name
    pub fn flat(&self, legacy_short_name: &str) -> Option<&SymbolRef> {
        self.flat.get(legacy_short_name)
    }

    /// Double record by legacy key (`Outer.Inner`, or a plain name that became nested)
    pub fn double(&self, key: &str) -> Option<&SymbolRef> {
        self.double.get(key)
    }

    /// Resolve a dotted import path to a record
    ///
    /// Priority:
    /// 1. double map by the last two segments (`Outer.Inner`)
    /// 2. flat map by the last segment
    /// 3. double map by the last segment
    pub fn resolve_import(&self, path: &str) -> Option<&SymbolRef> {
        let mut segments = path.rsplit('.');
        let last = segments.next().filter(|s| !s.is_empty())?;

        if let Some(outer) = segments.next() {
            if let Some(record) = self.double.get(&format!("{outer}.{last}")) {
                return Some(record);
            }
        }

        self.flat.get(last).or_else(|| self.double.get(last))
    }

    /// Flat records whose legacy prefix is exactly `prefix`
    pub fn under_prefix(&self, prefix: &str) -> &[SymbolRef] {
        self.by_prefix.get(prefix).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Flat records grouped by legacy prefix, in prefix order
    pub fn prefix_groups(&self) -> impl Iterator<Item = (&str, &[SymbolRef])> {
        self.by_prefix
            .iter()
            .map(|(prefix, records)| (prefix.as_str(), records.as_slice()))
    }

    /// Double records in key order
    pub fn double_records(&self) -> &[SymbolRef] {
        &self.double_sorted
    }

    pub fn flat_len(&self) -> usize {
        self.flat.len()
    }

    pub fn double_len(&self) -> usize {
        self.double.len()
    }

    /// Number of unindented lines that did not form a valid entry
    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    pub fn is_empty(&self) -> bool {
        self.flat.is_empty() && self.double.is_empty()
    }
}
