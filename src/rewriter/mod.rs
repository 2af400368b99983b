//! Rewrite engine
//!
//! Per unit:
//! 1. `Resolver` builds the unit's `ResolutionContext`
//! 2. legacy-namespace import lines are dropped
//! 3. every other line goes through the flat pass (`line`), the nested-class
//!    pass (`nested`) and the manual patch table (`patches`)
//!
//! Rewriting never fails; text that cannot be resolved confidently is left
//! as it is.

pub mod line;
pub mod nested;
pub mod patches;

use std::ops::AddAssign;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::MigrationConfig;
use crate::resolver::{is_import_line, ResolutionContext, Resolver};
use crate::source_tree::SourceUnit;
use crate::symbol_table::SymbolTable;
use line::Candidate;
use nested::NestedPass;
use patches::PatchTable;

/// What gets inserted in front of a rewritten class name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualifierStyle {
    /// Keep the legacy package: `legacy.pkg.` + new name
    #[default]
    Legacy,
    /// Use the package from the mapping's right-hand side
    Mapped,
}

/// Engine-facing settings, derived from `MigrationConfig`
#[derive(Debug, Clone)]
pub struct RewriteRules {
    pub legacy_namespace: String,
    pub protected_roots: Vec<String>,
    pub patches: PatchTable,
    pub qualifier: QualifierStyle,
}

impl Default for RewriteRules {
    fn default() -> Self {
        MigrationConfig::default().rewrite_rules()
    }
}

/// Counters for one unit (or summed over a run)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RewriteStats {
    pub flat_replacements: usize,
    pub nested_replacements: usize,
    pub patches_applied: usize,
    pub dropped_imports: usize,
    pub changed_lines: usize,
}

impl AddAssign for RewriteStats {
    fn add_assign(&mut self, other: Self) {
        self.flat_replacements += other.flat_replacements;
        self.nested_replacements += other.nested_replacements;
        self.patches_applied += other.patches_applied;
        self.dropped_imports += other.dropped_imports;
        self.changed_lines += other.changed_lines;
    }
}

/// Output of `Migrator::rewrite_unit`
#[derive(Debug, Clone)]
pub struct RewrittenUnit {
    pub path: PathBuf,
    pub lines: Vec<String>,
    pub stats: RewriteStats,
}

/// Rewrites lines of one unit against its resolution context
pub struct LineRewriter<'a> {
    rules: &'a RewriteRules,
    context: &'a ResolutionContext,
    nested: &'a NestedPass,
    candidates: Vec<Candidate>,
}

impl<'a> LineRewriter<'a> {
    fn new(rules: &'a RewriteRules, context: &'a ResolutionContext, nested: &'a NestedPass) -> Self {
        let mut candidates: Vec<Candidate> = context
            .candidates()
            .filter_map(|(record, explicit)| Candidate::new(record.clone(), explicit))
            .collect();
        // Longer tokens first (stable), so a token never loses to its own prefix
        candidates.sort_by(|a, b| b.token.len().cmp(&a.token.len()));

        Self {
            rules,
            context,
            nested,
            candidates,
        }
    }

    pub fn rewrite_line(&self, line: &str) -> String {
        self.rewrite_line_with_stats(line, &mut RewriteStats::default())
    }

    pub fn rewrite_line_with_stats(&self, line: &str, stats: &mut RewriteStats) -> String {
        if is_import_line(line) {
            return line.to_string();
        }

        let mut out = line.to_string();
        for candidate in &self.candidates {
            stats.flat_replacements += candidate.rewrite(&mut out, self.context, self.rules);
        }
        if !self.nested.is_empty() {
            stats.nested_replacements += self.nested.apply(&mut out);
        }
        stats.patches_applied += self.rules.patches.apply(&mut out);
        out
    }
}

/// The rewrite engine for a whole run
///
/// Holds the read-only table and the precompiled nested patterns; `Sync`, so
/// one instance is shared by all rayon workers.
pub struct Migrator<'a> {
    table: &'a SymbolTable,
    rules: &'a RewriteRules,
    nested: NestedPass,
}

impl<'a> Migrator<'a> {
    pub fn new(table: &'a SymbolTable, rules: &'a RewriteRules) -> Self {
        Self {
            table,
            rules,
            nested: NestedPass::new(table, rules.qualifier),
        }
    }

    pub fn resolver(&self) -> Resolver<'a> {
        Resolver::new(self.table, &self.rules.legacy_namespace)
    }

    /// Line rewriter bound to one unit's context
    pub fn line_rewriter<'c>(&'c self, context: &'c ResolutionContext) -> LineRewriter<'c> {
        LineRewriter::new(self.rules, context, &self.nested)
    }

    /// Rewrite a unit's lines; legacy-namespace imports are dropped
    pub fn rewrite_lines<S: AsRef<str>>(&self, lines: &[S]) -> (Vec<String>, RewriteStats) {
        let resolver = self.resolver();
        let context = resolver.resolve(lines);
        let rewriter = self.line_rewriter(&context);

        let mut stats = RewriteStats::default();
        let mut out = Vec::with_capacity(lines.len());

        for line in lines {
            let line = line.as_ref();
            if let Some((dropped, rest)) = resolver.strip_legacy_imports(line) {
                stats.dropped_imports += dropped;
                if !rest.is_empty() {
                    out.push(rest);
                }
                continue;
            }

            let rewritten = rewriter.rewrite_line_with_stats(line, &mut stats);
            if rewritten != line {
                stats.changed_lines += 1;
            }
            out.push(rewritten);
        }

        (out, stats)
    }

    pub fn rewrite_unit(&self, unit: &SourceUnit) -> RewrittenUnit {
        let (lines, stats) = self.rewrite_lines(&unit.lines);
        debug!(
            path = %unit.path.display(),
            changed = stats.changed_lines,
            dropped_imports = stats.dropped_imports,
            "unit rewritten"
        );
        RewrittenUnit {
            path: unit.path.clone(),
            lines,
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MAPPING: &[&str] = &[
        "net/minecraft/server/Entity net/minecraft/world/entity/Entity",
        "net/minecraft/server/EntityPlayer net/minecraft/server/level/ServerPlayer",
        "net/minecraft/server/World net/minecraft/world/level/Level",
        "net/minecraft/server/Container net/minecraft/world/inventory/AbstractContainerMenu",
        "net/minecraft/server/Container$Slot net/minecraft/world/inventory/AbstractContainerMenu$SlotView",
    ];

    fn rewrite(lines: &[&str]) -> (Vec<String>, RewriteStats) {
        let table = SymbolTable::parse(MAPPING);
        let rules = RewriteRules::default();
        let migrator = Migrator::new(&table, &rules);
        migrator.rewrite_lines(lines)
    }

    #[test]
    fn test_legacy_imports_dropped_even_if_unused() {
        let (out, stats) = rewrite(&[
            "package org.bukkit.craftbukkit;",
            "",
            "import net.minecraft.server.World;",
            "import net.minecraft.server.NotInMapping;",
            "import org.bukkit.Location;",
            "",
            "public class CraftThing {}",
        ]);

        assert_eq!(
            out,
            vec![
                "package org.bukkit.craftbukkit;",
                "",
                "import org.bukkit.Location;",
                "",
                "public class CraftThing {}",
            ]
        );
        assert_eq!(stats.dropped_imports, 2);
        assert_eq!(stats.changed_lines, 0);
    }

    #[test]
    fn test_qualification_contract() {
        let (out, stats) = rewrite(&[
            "import net.minecraft.server.World;",
            "class A {",
            "    World world;",
            "    net.minecraft.server.EntityPlayer player;",
            "}",
        ]);

        assert_eq!(
            out,
            vec![
                "class A {",
                "    net.minecraft.server.Level world;",
                "    net.minecraft.server.ServerPlayer player;",
                "}",
            ]
        );
        assert_eq!(stats.flat_replacements, 2);
        assert_eq!(stats.changed_lines, 2);
    }

    #[test]
    fn test_foreign_import_collision() {
        let (out, _) = rewrite(&[
            "import net.minecraft.server.Entity;",
            "import org.bukkit.entity.Entity;",
            "Entity bukkitEntity = getBukkitEntity();",
        ]);

        assert_eq!(
            out,
            vec![
                "import org.bukkit.entity.Entity;",
                "Entity bukkitEntity = getBukkitEntity();",
            ]
        );
    }

    #[test]
    fn test_legacy_statement_removed_from_shared_import_line() {
        let (out, stats) = rewrite(&[
            "import org.bukkit.Location; import net.minecraft.server.World;",
            "import net.minecraft.server.Entity; import net.minecraft.server.Container;",
            "World w;",
        ]);

        assert_eq!(
            out,
            vec!["import org.bukkit.Location;", "net.minecraft.server.Level w;"]
        );
        assert_eq!(stats.dropped_imports, 3);
        assert!(out.iter().all(|line| !line.contains("import net.minecraft")));
    }

    #[test]
    fn test_nested_match_at_end_of_line() {
        let (out, stats) = rewrite(&["import net.minecraft.server.Container;", "x = Container.Slot"]);

        assert_eq!(out, vec!["x = net.minecraft.server.AbstractContainerMenu.SlotView"]);
        assert_eq!(stats.nested_replacements, 1);
    }

    #[test]
    fn test_nested_pass_follows_outer_rename() {
        let (out, stats) = rewrite(&[
            "import net.minecraft.server.Container;",
            "Container.Slot slot = menu.getSlot(0);",
        ]);

        // flat: Container -> net.minecraft.server.AbstractContainerMenu
        // nested: ...AbstractContainerMenu.Slot -> ...AbstractContainerMenu.SlotView
        assert_eq!(
            out,
            vec!["net.minecraft.server.AbstractContainerMenu.SlotView slot = menu.getSlot(0);"]
        );
        assert_eq!(stats.flat_replacements, 1);
        assert_eq!(stats.nested_replacements, 1);
    }

    #[test]
    fn test_other_import_lines_verbatim() {
        let table = SymbolTable::parse(MAPPING);
        let rules = RewriteRules::default();
        let migrator = Migrator::new(&table, &rules);
        let context = migrator.resolver().resolve(&["import net.minecraft.server.World;"]);
        let rewriter = migrator.line_rewriter(&context);

        assert_eq!(
            rewriter.rewrite_line("import static org.bukkit.World.Environment;"),
            "import static org.bukkit.World.Environment;"
        );
        assert_eq!(rewriter.rewrite_line("World w;"), "net.minecraft.server.Level w;");
    }

    #[test]
    fn test_patch_layer_runs_last() {
        let table = SymbolTable::parse(MAPPING);
        let rules = RewriteRules::default();
        let migrator = Migrator::new(&table, &rules);
        let context = ResolutionContext::default();
        let rewriter = migrator.line_rewriter(&context);

        let mut stats = RewriteStats::default();
        let out = rewriter.rewrite_line_with_stats(
            "(net.minecraft.world.net.minecraft.world.inventory.AbstractContainerMenu) m",
            &mut stats,
        );
        assert_eq!(out, "(net.minecraft.world.inventory.AbstractContainerMenu) m");
        assert_eq!(stats.patches_applied, 1);
    }

    #[test]
    fn test_stats_add_assign() {
        let mut total = RewriteStats::default();
        total += RewriteStats {
            flat_replacements: 2,
            changed_lines: 1,
            ..Default::default()
        };
        total += RewriteStats {
            flat_replacements: 1,
            dropped_imports: 3,
            ..Default::default()
        };
        assert_eq!(total.flat_replacements, 3);
        assert_eq!(total.dropped_imports, 3);
        assert_eq!(total.changed_lines, 1);
    }

    fn fragment() -> impl Strategy<Value = &'static str> {
        prop::sample::select(vec![
            "Entity",
            "EntityPlayer",
            "World",
            "WorldServerSettings",
            "net.minecraft.server.EntityPlayer",
            "net.minecraft.server.World",
            "org.bukkit.World",
            "getWorld()",
            " ",
            "(",
            ")",
            ".",
            ";",
            "x",
            "<",
            ">",
        ])
    }

    fn body_line() -> impl Strategy<Value = String> {
        prop::collection::vec(fragment(), 0..12).prop_map(|parts| parts.concat())
    }

    proptest! {
        /// Re-running the engine on its own output changes nothing
        #[test]
        fn prop_idempotent_on_migrated_output(body in prop::collection::vec(body_line(), 0..6)) {
            let mut unit: Vec<String> = vec![
                "import net.minecraft.server.Entity;".to_string(),
                "import net.minecraft.server.World;".to_string(),
                "import org.bukkit.Location;".to_string(),
            ];
            unit.extend(body);

            let table = SymbolTable::parse(MAPPING);
            let rules = RewriteRules::default();
            let migrator = Migrator::new(&table, &rules);

            let (first, _) = migrator.rewrite_lines(&unit);
            let (second, _) = migrator.rewrite_lines(&first);
            prop_assert_eq!(first, second);
        }

        /// A purely alphabetic line has no standalone token to rewrite
        #[test]
        fn prop_letters_only_lines_unchanged(line in "[a-zA-Z]{6,40}") {
            prop_assume!(line != "Entity");
            let lines = [
                "import net.minecraft.server.Entity;".to_string(),
                "import net.minecraft.server.World;".to_string(),
                line.clone(),
            ];
            let (out, _) = rewrite(&lines.iter().map(String::as_str).collect::<Vec<_>>());
            prop_assert_eq!(out, vec![line]);
        }

        /// Lines without any mapped name pass through byte-for-byte
        #[test]
        fn prop_unrelated_lines_pass_through(line in "[a-z0-9 (){};=.,\"+*/-]{0,60}") {
            prop_assume!(!is_import_line(&line));
            let (out, stats) = rewrite(&["import net.minecraft.server.World;", line.as_str()]);
            prop_assert_eq!(out, vec![line]);
            prop_assert_eq!(stats.changed_lines, 0);
        }
    }
}
