// ============================================================================
// Per-unit symbol resolution
// ============================================================================
//
// For one source unit, works out which mapping records the rewriter has to
// try:
// - records named by legacy-namespace imports (explicit)
// - records referenced inline as `prefix.Name` without an import (implicit)
// and which simple names are imported from foreign namespaces (collisions).
//
// ============================================================================

use std::collections::HashSet;

use memchr::memmem;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::symbol_table::{SymbolRef, SymbolTable};

/// `import [static] a.b.C;` / `import a.b.*;` (one match per statement)
static IMPORT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bimport\s+(?P<static>static\s+)?(?P<path>[\w$.]+?)(?P<wildcard>\.\*)?\s*;")
        .expect("import regex is valid")
});

/// A parsed import statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportLine<'a> {
    /// The whole statement, `import ... ;`
    pub statement: &'a str,
    /// Dotted path without the trailing `.*`
    pub path: &'a str,
    pub is_static: bool,
    pub is_wildcard: bool,
}

impl ImportLine<'_> {
    /// Last path segment (None for wildcard imports)
    pub fn simple_name(&self) -> Option<&str> {
        if self.is_wildcard {
            return None;
        }
        self.path.rsplit('.').next().filter(|s| !s.is_empty())
    }
}

/// Every import statement on an import line (`import a.B; import c.D;`)
pub fn parse_imports(line: &str) -> Vec<ImportLine<'_>> {
    if !is_import_line(line) {
        return Vec::new();
    }
    IMPORT_REGEX
        .captures_iter(line)
        .filter_map(|caps| {
            Some(ImportLine {
                statement: caps.get(0)?.as_str(),
                path: caps.name("path")?.as_str(),
                is_static: caps.name("static").is_some(),
                is_wildcard: caps.name("wildcard").is_some(),
            })
        })
        .collect()
}

/// First import statement on the line
pub fn parse_import(line: &str) -> Option<ImportLine<'_>> {
    parse_imports(line).into_iter().next()
}

/// Any line starting with the `import` keyword, well-formed or not
pub fn is_import_line(line: &str) -> bool {
    line.trim_start()
        .strip_prefix("import")
        .is_some_and(|rest| rest.starts_with(char::is_whitespace))
}

/// Whether a dotted path lies in `namespace` (segment-aligned)
pub fn in_namespace(path: &str, namespace: &str) -> bool {
    match path.strip_prefix(namespace) {
        Some("") => true,
        Some(rest) => rest.starts_with('.'),
        None => false,
    }
}

/// Symbols in play for one source unit
#[derive(Debug, Clone, Default)]
pub struct ResolutionContext {
    /// Records named by legacy imports, in import order
    pub explicit_imports: Vec<SymbolRef>,
    /// Simple names imported from any other namespace
    pub foreign_short_names: HashSet<String>,
    /// Records referenced fully qualified in the body without an import
    pub implicitly_used: Vec<SymbolRef>,
}

impl ResolutionContext {
    pub fn is_foreign(&self, simple_name: &str) -> bool {
        self.foreign_short_names.contains(simple_name)
    }

    /// explicit ∪ implicit, each paired with whether it came from an import
    pub fn candidates(&self) -> impl Iterator<Item = (&SymbolRef, bool)> {
        self.explicit_imports
            .iter()
            .map(|record| (record, true))
            .chain(self.implicitly_used.iter().map(|record| (record, false)))
    }
}

/// Builds a `ResolutionContext` per unit against a shared table
pub struct Resolver<'a> {
    table: &'a SymbolTable,
    legacy_namespace: &'a str,
}

impl<'a> Resolver<'a> {
    pub fn new(table: &'a SymbolTable, legacy_namespace: &'a str) -> Self {
        Self {
            table,
            legacy_namespace,
        }
    }

    /// Whether any statement on the line imports from the legacy namespace
    pub fn is_legacy_import(&self, line: &str) -> bool {
        parse_imports(line)
            .iter()
            .any(|import| in_namespace(import.path, self.legacy_namespace))
    }

    /// Remove the legacy-namespace statements from an import line
    ///
    /// Returns `None` when the line has no legacy statement. Otherwise returns
    /// the number of removed statements and the remaining statements joined
    /// by a space (empty when nothing is left).
    pub fn strip_legacy_imports(&self, line: &str) -> Option<(usize, String)> {
        let imports = parse_imports(line);
        let (legacy, kept): (Vec<&ImportLine<'_>>, Vec<&ImportLine<'_>>) = imports
            .iter()
            .partition(|import| in_namespace(import.path, self.legacy_namespace));
        if legacy.is_empty() {
            return None;
        }

        let indent = &line[..line.len() - line.trim_start().len()];
        let rest = kept
            .iter()
            .map(|import| import.statement)
            .collect::<Vec<_>>()
            .join(" ");
        if rest.is_empty() {
            Some((legacy.len(), rest))
        } else {
            Some((legacy.len(), format!("{indent}{rest}")))
        }
    }

    fn register_import(
        &self,
        import: ImportLine<'_>,
        ctx: &mut ResolutionContext,
        explicit_seen: &mut HashSet<SymbolRef>,
    ) {
        if !in_namespace(import.path, self.legacy_namespace) {
            if let Some(name) = import.simple_name() {
                ctx.foreign_short_names.insert(name.to_string());
            }
            return;
        }

        let records: &[SymbolRef] = if import.is_wildcard {
            self.table.under_prefix(&format!("{}.", import.path))
        } else {
            match self.table.resolve_import(import.path) {
                Some(record) => std::slice::from_ref(record),
                None => &[],
            }
        };

        for record in records {
            if explicit_seen.insert(record.clone()) {
                ctx.explicit_imports.push(record.clone());
            }
        }
    }

    pub fn resolve<S: AsRef<str>>(&self, lines: &[S]) -> ResolutionContext {
        let mut ctx = ResolutionContext::default();
        let mut explicit_seen: HashSet<SymbolRef> = HashSet::new();
        let mut implicit_seen: HashSet<SymbolRef> = HashSet::new();
        let mut body: Vec<&str> = Vec::with_capacity(lines.len());

        // Pass 1: imports
        for line in lines {
            let line = line.as_ref();
            let imports = parse_imports(line);
            if imports.is_empty() {
                body.push(line);
                continue;
            }

            for import in imports {
                self.register_import(import, &mut ctx, &mut explicit_seen);
            }
        }

        // Pass 2: inline `prefix.Name` references in the body
        for (prefix, group) in self.table.prefix_groups() {
            let finder = memmem::Finder::new(prefix.as_bytes());
            for line in &body {
                for record in group {
                    if explicit_seen.contains(record) || implicit_seen.contains(record) {
                        continue;
                    }
                    if mentions(line, &finder, prefix, &record.legacy_short_name) {
                        implicit_seen.insert(record.clone());
                        ctx.implicitly_used.push(record.clone());
                    }
                }
            }
        }

        ctx
    }
}

/// Substring test for `prefix + name`, driven by the prefix finder
fn mentions(line: &str, finder: &memmem::Finder<'_>, prefix: &str, name: &str) -> bool {
    if prefix.is_empty() {
        return line.contains(name);
    }
    let bytes = line.as_bytes();
    finder
        .find_iter(bytes)
        .any(|pos| bytes[pos + prefix.len()..].starts_with(name.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SymbolTable {
        SymbolTable::parse([
            "net/minecraft/server/Entity net/minecraft/world/entity/Entity",
            "net/minecraft/server/EntityPlayer net/minecraft/server/level/ServerPlayer",
            "net/minecraft/server/World net/minecraft/world/level/Level",
            "net/minecraft/server/WorldServer net/minecraft/server/level/ServerLevel",
            "net/minecraft/server/Container$Slot net/minecraft/world/inventory/AbstractContainerMenu$SlotView",
        ])
    }

    fn names(records: &[SymbolRef]) -> Vec<&str> {
        records.iter().map(|r| r.legacy_short_name.as_str()).collect()
    }

    #[test]
    fn test_parse_import_forms() {
        let import = parse_import("import net.minecraft.server.Entity;").unwrap();
        assert_eq!(import.path, "net.minecraft.server.Entity");
        assert!(!import.is_static);
        assert!(!import.is_wildcard);
        assert_eq!(import.simple_name(), Some("Entity"));

        let import = parse_import("  import static org.bukkit.Bukkit.getServer ; // x").unwrap();
        assert_eq!(import.path, "org.bukkit.Bukkit.getServer");
        assert!(import.is_static);

        let import = parse_import("import java.util.*;").unwrap();
        assert_eq!(import.path, "java.util");
        assert!(import.is_wildcard);
        assert_eq!(import.simple_name(), None);

        assert!(parse_import("// import a.b.C;").is_none());
        assert!(parse_import("String important = \"import\";").is_none());
        assert!(parse_import("package net.minecraft.server;").is_none());
    }

    #[test]
    fn test_is_import_line() {
        assert!(is_import_line("import org.bukkit.World;"));
        assert!(is_import_line("\timport static a.B.c;"));
        assert!(!is_import_line("importantValue = 1;"));
        assert!(!is_import_line("// import a.b.C;"));
    }

    #[test]
    fn test_in_namespace_is_segment_aligned() {
        assert!(in_namespace("net.minecraft.server.Entity", "net.minecraft"));
        assert!(in_namespace("net.minecraft", "net.minecraft"));
        assert!(!in_namespace("net.minecraftforge.Event", "net.minecraft"));
        assert!(!in_namespace("org.bukkit.World", "net.minecraft"));
    }

    #[test]
    fn test_explicit_and_foreign_imports() {
        let table = table();
        let resolver = Resolver::new(&table, "net.minecraft");
        let lines = [
            "package org.bukkit.craftbukkit;",
            "import net.minecraft.server.Entity;",
            "import net.minecraft.server.Entity;",
            "import net.minecraft.server.Container.Slot;",
            "import net.minecraft.server.Unmapped;",
            "import org.bukkit.World;",
            "import java.util.*;",
        ];

        let ctx = resolver.resolve(&lines);
        assert_eq!(names(&ctx.explicit_imports), vec!["Entity", "Container.Slot"]);
        assert!(ctx.is_foreign("World"));
        assert_eq!(ctx.foreign_short_names.len(), 1);
        assert!(ctx.implicitly_used.is_empty());
        assert!(resolver.is_legacy_import(lines[1]));
        assert!(!resolver.is_legacy_import(lines[5]));
    }

    #[test]
    fn test_several_statements_on_one_line() {
        let table = table();
        let resolver = Resolver::new(&table, "net.minecraft");
        let line = "import org.bukkit.Location; import net.minecraft.server.World;import java.util.List;";

        let imports = parse_imports(line);
        assert_eq!(imports.len(), 3);
        assert_eq!(imports[1].statement, "import net.minecraft.server.World;");

        let ctx = resolver.resolve(&[line]);
        assert_eq!(names(&ctx.explicit_imports), vec!["World"]);
        assert!(ctx.is_foreign("Location"));
        assert!(ctx.is_foreign("List"));

        assert!(resolver.is_legacy_import(line));
        assert_eq!(
            resolver.strip_legacy_imports(line),
            Some((1, "import org.bukkit.Location; import java.util.List;".to_string()))
        );
        assert_eq!(
            resolver.strip_legacy_imports("    import net.minecraft.server.World; import net.minecraft.server.Entity;"),
            Some((2, String::new()))
        );
        assert_eq!(resolver.strip_legacy_imports("import org.bukkit.Location;"), None);
    }

    #[test]
    fn test_implicit_inline_references() {
        let table = table();
        let resolver = Resolver::new(&table, "net.minecraft");
        let lines = [
            "import net.minecraft.server.Entity;",
            "public class CraftPlayer {",
            "    net.minecraft.server.EntityPlayer handle;",
            "    net.minecraft.server.Entity other;",
            "    net.minecraft.server.EntityPlayer again;",
            "}",
        ];

        let ctx = resolver.resolve(&lines);
        assert_eq!(names(&ctx.explicit_imports), vec!["Entity"]);
        // Entity is covered by the import, EntityPlayer is found once
        assert_eq!(names(&ctx.implicitly_used), vec!["EntityPlayer"]);
    }

    #[test]
    fn test_implicit_is_plain_substring() {
        let table = table();
        let resolver = Resolver::new(&table, "net.minecraft");
        let lines = ["net.minecraft.server.WorldServer world;"];

        let ctx = resolver.resolve(&lines);
        // `prefix + World` is a substring of `prefix + WorldServer`
        assert_eq!(names(&ctx.implicitly_used), vec!["World", "WorldServer"]);
    }

    #[test]
    fn test_import_lines_not_scanned_for_implicit() {
        let table = table();
        let resolver = Resolver::new(&table, "net.minecraft");
        let lines = ["import static net.minecraft.server.World.foo;"];

        let ctx = resolver.resolve(&lines);
        assert!(ctx.implicitly_used.is_empty());
        assert!(ctx.explicit_imports.is_empty());
    }

    #[test]
    fn test_legacy_wildcard_import() {
        let table = table();
        let resolver = Resolver::new(&table, "net.minecraft");
        let ctx = resolver.resolve(&["import net.minecraft.server.*;"]);

        assert_eq!(
            names(&ctx.explicit_imports),
            vec!["Entity", "EntityPlayer", "World", "WorldServer"]
        );
    }

    #[test]
    fn test_candidates_order() {
        let table = table();
        let resolver = Resolver::new(&table, "net.minecraft");
        let ctx = resolver.resolve(&[
            "import net.minecraft.server.World;",
            "net.minecraft.server.Entity e;",
        ]);

        let candidates: Vec<_> = ctx
            .candidates()
            .map(|(r, explicit)| (r.legacy_short_name.as_str(), explicit))
            .collect();
        assert_eq!(candidates, vec![("World", true), ("Entity", false)]);
    }
}
