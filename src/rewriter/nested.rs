// ============================================================================
// Nested-class pass
// ============================================================================
//
// After the flat pass an outer class reference already carries its new name,
// but the inner segment behind it still has the legacy name:
//
//     net.minecraft.server.AbstractContainerMenu.Slot
//                          ^ rewritten outer    ^ legacy inner
//
// The inner segment looks like a plain member access, so the flat pass never
// matches it on its own. This pass searches for `prefix + newOuter.legacyInner`
// and swaps in the full nested name.
//
// ============================================================================

use std::collections::BTreeMap;

use memchr::memmem::Finder;

use super::line::splice;
use super::QualifierStyle;
use crate::symbol_table::{SymbolRef, SymbolTable};

struct NestedPattern {
    record: SymbolRef,
    len: usize,
    finder: Finder<'static>,
}

impl NestedPattern {
    fn apply(&self, line: &mut String, style: QualifierStyle) -> usize {
        let mut cursor = 0;
        let mut spliced = 0;

        while cursor < line.len() {
            let Some(offset) = self.finder.find(&line.as_bytes()[cursor..]) else {
                break;
            };
            let start = cursor + offset;
            let end = start + self.len;

            // `...Outer.SlotView` is a different identifier
            if line[end..].chars().next().is_some_and(char::is_alphabetic) {
                cursor = end;
                continue;
            }

            cursor = splice(line, start, end, &self.record, style);
            spliced += 1;
        }

        spliced
    }
}

/// Patterns sharing one qualifier prefix; the prefix is checked first
struct PrefixGroup {
    prefix: Option<Finder<'static>>,
    patterns: Vec<NestedPattern>,
}

/// Precompiled nested patterns for every double record, built once per run
pub struct NestedPass {
    style: QualifierStyle,
    groups: Vec<PrefixGroup>,
}

impl NestedPass {
    pub fn new(table: &SymbolTable, style: QualifierStyle) -> Self {
        let mut grouped: BTreeMap<String, Vec<NestedPattern>> = BTreeMap::new();

        for record in table.double_records() {
            // Both sides must be `Outer.Inner`
            let (Some((new_outer, _)), Some((_, legacy_inner))) =
                (record.new_segments(), record.legacy_segments())
            else {
                continue;
            };

            let prefix = match style {
                QualifierStyle::Legacy => record.legacy_qualifier_prefix.as_str(),
                QualifierStyle::Mapped => record.new_qualifier_prefix.as_str(),
            };
            let pattern = format!("{prefix}{new_outer}.{legacy_inner}");

            grouped.entry(prefix.to_string()).or_default().push(NestedPattern {
                record: record.clone(),
                len: pattern.len(),
                finder: Finder::new(pattern.as_bytes()).into_owned(),
            });
        }

        let groups = grouped
            .into_iter()
            .map(|(prefix, patterns)| PrefixGroup {
                prefix: (!prefix.is_empty()).then(|| Finder::new(prefix.as_bytes()).into_owned()),
                patterns,
            })
            .collect();

        Self { style, groups }
    }

    /// Number of usable nested patterns
    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.patterns.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rewrite nested references in place; returns the number of splices
    pub fn apply(&self, line: &mut String) -> usize {
        let mut spliced = 0;
        for group in &self.groups {
            if let Some(prefix) = &group.prefix {
                if prefix.find(line.as_bytes()).is_none() {
                    continue;
                }
            }
            for pattern in &group.patterns {
                spliced += pattern.apply(line, self.style);
            }
        }
        spliced
    }
}
