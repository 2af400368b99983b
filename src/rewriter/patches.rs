//! Manual patch layer
//!
//! Literal substring fixes for artifacts produced when the flat and nested
//! passes both fire on overlapping text. Append-only: a new artifact gets a
//! new literal entry here (or in `extra_patches`), never a new inference rule.

use serde::{Deserialize, Serialize};

/// Known double-substitution artifacts
const BUILTIN_PATCHES: &[(&str, &str)] = &[(
    "net.minecraft.world.net.minecraft.world.inventory.AbstractContainerMenu",
    "net.minecraft.world.inventory.AbstractContainerMenu",
)];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualPatch {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchTable {
    entries: Vec<ManualPatch>,
}

impl PatchTable {
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN_PATCHES
                .iter()
                .map(|(from, to)| ManualPatch {
                    from: from.to_string(),
                    to: to.to_string(),
                })
                .collect(),
        }
    }

    /// Append entries after the existing ones (empty `from` is ignored)
    pub fn with_extra(mut self, extra: impl IntoIterator<Item = ManualPatch>) -> Self {
        self.entries
            .extend(extra.into_iter().filter(|patch| !patch.from.is_empty()));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply every entry in order; returns how many entries fired
    pub fn apply(&self, line: &mut String) -> usize {
        let mut fired = 0;
        for patch in &self.entries {
            if line.contains(&patch.from) {
                *line = line.replace(&patch.from, &patch.to);
                fired += 1;
            }
        }
        fired
    }
}
