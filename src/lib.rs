// ============================================================================
// SRG Remap - Library Interface
// ============================================================================
//
// Rewrites a legacy Java source tree so references into a renamed namespace
// use the names from an SRG class mapping. The binary (main.rs) is a thin
// CLI over these modules; integration tests use them directly.

pub mod archive;
pub mod cli;
pub mod config;
pub mod engine;
pub mod resolver;
pub mod rewriter;
pub mod source_tree;
pub mod symbol_table;
