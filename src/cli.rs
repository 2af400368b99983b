//! CLI 模式处理器
//!
//! 默认输出人类可读格式，使用 --json 参数可输出 JSON 格式

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use serde_json::{json, Value};

use crate::config::MigrationConfig;
use crate::engine::{self, RunOptions};
use crate::rewriter::Migrator;
use crate::source_tree::SourceUnit;
use crate::symbol_table::{SymbolRef, SymbolTable};

/// CLI Commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// 🔁 全量迁移 - rewrite the whole legacy tree into the output tree
    Migrate {
        /// Download and extract the legacy archive first
        #[arg(long)]
        fetch: bool,

        /// Remove irrelevant subtrees and top-level files before migrating
        #[arg(long)]
        prepare: bool,

        /// Rewrite everything but write nothing
        #[arg(long)]
        dry_run: bool,

        /// Process units one after another
        #[arg(long)]
        sequential: bool,

        /// SRG mapping file (overrides config)
        #[arg(long)]
        mapping: Option<PathBuf>,

        /// Legacy source root (overrides config)
        #[arg(long)]
        source: Option<PathBuf>,

        /// Output root (overrides config)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// 🔍 单文件重写 - print one rewritten file
    Rewrite {
        /// Source file
        #[arg(short, long)]
        file: PathBuf,

        /// SRG mapping file (overrides config)
        #[arg(long)]
        mapping: Option<PathBuf>,
    },

    /// 🔬 解析上下文 - show which records a file resolves to
    Inspect {
        #[arg(short, long)]
        file: PathBuf,

        #[arg(long)]
        mapping: Option<PathBuf>,
    },

    /// 📋 映射表统计
    Mapping {
        /// Legacy short name (`Entity`, `Container.Slot`) or dotted import path
        #[arg(short, long)]
        lookup: Option<String>,

        #[arg(long)]
        mapping: Option<PathBuf>,
    },

    /// ℹ️ 引擎状态
    Status,
}

/// 处理 CLI 命令
pub fn handle_command(cmd: Command, json_output: bool, config_path: Option<&Path>) -> Result<()> {
    let result = run_command(cmd, json_output, config_path);

    match result {
        Ok(value) => {
            if json_output {
                let output = json!({
                    "success": true,
                    "data": value
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print_value(&value);
            }
            Ok(())
        }
        Err(e) => {
            if json_output {
                let output = json!({
                    "success": false,
                    "error": format!("{e:#}")
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
                std::process::exit(1);
            }
            Err(e)
        }
    }
}

fn run_command(cmd: Command, json_output: bool, config_path: Option<&Path>) -> Result<Value> {
    let mut config = MigrationConfig::load(config_path)?;

    match cmd {
        Command::Migrate {
            fetch,
            prepare,
            dry_run,
            sequential,
            mapping,
            source,
            output,
        } => {
            if let Some(mapping) = mapping {
                config.mapping = mapping;
            }
            if let Some(source) = source {
                config.source_dir = source;
            }
            if let Some(output) = output {
                config.output_dir = output;
            }
            if sequential {
                config.parallel = false;
            }

            let options = RunOptions {
                fetch,
                prepare,
                dry_run,
            };
            let report = engine::run_migration(&config, &options)?;

            if json_output {
                Ok(serde_json::to_value(&report)?)
            } else {
                Ok(json!(report.render()))
            }
        }

        Command::Rewrite { file, mapping } => {
            override_mapping(&mut config, mapping);
            let table = SymbolTable::load(&config.mapping)?;
            let rules = config.rewrite_rules();
            let migrator = Migrator::new(&table, &rules);

            let unit = SourceUnit::read(&file)?;
            let rewritten = migrator.rewrite_unit(&unit);

            if json_output {
                Ok(json!({
                    "path": file,
                    "lines": rewritten.lines,
                    "stats": rewritten.stats,
                }))
            } else {
                Ok(json!(rewritten.lines.join("\n")))
            }
        }

        Command::Inspect { file, mapping } => {
            override_mapping(&mut config, mapping);
            let table = SymbolTable::load(&config.mapping)?;
            let rules = config.rewrite_rules();
            let migrator = Migrator::new(&table, &rules);

            let unit = SourceUnit::read(&file)?;
            let context = migrator.resolver().resolve(&unit.lines);

            let mut foreign: Vec<&String> = context.foreign_short_names.iter().collect();
            foreign.sort();

            if json_output {
                Ok(json!({
                    "path": file,
                    "explicit_imports": context.explicit_imports.iter().map(record_json).collect::<Vec<_>>(),
                    "implicitly_used": context.implicitly_used.iter().map(record_json).collect::<Vec<_>>(),
                    "foreign_short_names": foreign,
                }))
            } else {
                let mut out = format!("🔬 {}\n", file.display());
                out.push_str("----------------------------------------\n");
                out.push_str(&format!("Explicit imports ({}):\n", context.explicit_imports.len()));
                for record in &context.explicit_imports {
                    out.push_str(&format!("  {}\n", record_line(record)));
                }
                out.push_str(&format!("Implicitly used ({}):\n", context.implicitly_used.len()));
                for record in &context.implicitly_used {
                    out.push_str(&format!("  {}\n", record_line(record)));
                }
                out.push_str(&format!("Foreign simple names ({}): ", foreign.len()));
                out.push_str(
                    &foreign
                        .iter()
                        .map(|s| s.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                );
                Ok(json!(out))
            }
        }

        Command::Mapping { lookup, mapping } => {
            override_mapping(&mut config, mapping);
            let table = SymbolTable::load(&config.mapping)?;

            let found = lookup.as_deref().map(|name| {
                table
                    .flat(name)
                    .or_else(|| table.double(name))
                    .or_else(|| table.resolve_import(name))
            });

            if json_output {
                let mut value = json!({
                    "mapping": config.mapping,
                    "flat": table.flat_len(),
                    "double": table.double_len(),
                    "skipped_lines": table.skipped_lines(),
                });
                if let Some(found) = found {
                    value["lookup"] = found.map(record_json).unwrap_or(Value::Null);
                }
                Ok(value)
            } else {
                let mut out = format!(
                    "📋 {}\nFlat: {} | Double: {} | Skipped lines: {}",
                    config.mapping.display(),
                    table.flat_len(),
                    table.double_len(),
                    table.skipped_lines()
                );
                if let (Some(name), Some(found)) = (lookup.as_deref(), found) {
                    match found {
                        Some(record) => out.push_str(&format!("\n{}", record_line(record))),
                        None => out.push_str(&format!("\n{name}: not in mapping")),
                    }
                }
                Ok(json!(out))
            }
        }

        Command::Status => {
            let version = env!("CARGO_PKG_VERSION");
            if json_output {
                Ok(json!({
                    "version": version,
                    "config_file": config_path,
                    "config": serde_json::to_value(&config).context("failed to serialize config")?,
                }))
            } else {
                Ok(json!(format!(
                    "SRG Remap v{}\n\
                    Namespace: {} (protected: {})\n\
                    Mapping: {}\n\
                    Source: {} -> Output: {}\n\
                    Qualifier: {:?} | Parallel: {} | Extra patches: {}",
                    version,
                    config.legacy_namespace,
                    config.protected_roots.join(", "),
                    config.mapping.display(),
                    config.source_dir.display(),
                    config.output_dir.display(),
                    config.qualifier,
                    config.parallel,
                    config.extra_patches.len()
                )))
            }
        }
    }
}

fn override_mapping(config: &mut MigrationConfig, mapping: Option<PathBuf>) {
    if let Some(mapping) = mapping {
        config.mapping = mapping;
    }
}

fn record_json(record: &SymbolRef) -> Value {
    json!({
        "legacy": record.legacy_qualified_name(),
        "new": record.new_fully_qualified_name(),
        "double": record.is_double(),
    })
}

fn record_line(record: &SymbolRef) -> String {
    format!(
        "{} -> {}",
        record.legacy_qualified_name(),
        record.new_fully_qualified_name()
    )
}

/// 打印 Value，智能处理字符串和其他类型
fn print_value(value: &Value) {
    match value {
        Value::String(s) => println!("{s}"),
        _ => println!("{}", serde_json::to_string_pretty(value).unwrap_or_default()),
    }
}
