//! `cbridge decls`: summarise a declaration document.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use cbridge_decl::Declarations;

/// Type node counts keyed by kind.
pub fn kind_counts(decls: &Declarations) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for ty in decls.types.values() {
        *counts.entry(ty.kind_name()).or_insert(0) += 1;
    }
    counts
}

pub fn run(input: &Path) -> Result<()> {
    let decls =
        Declarations::load(input).with_context(|| format!("loading {}", input.display()))?;

    println!("--- Declarations ({}) ---", input.display());
    println!("  Files:      {}", decls.files.len());
    println!("  Functions:  {}", decls.functions.len());
    println!(
        "  Variadic:   {}",
        decls.functions.iter().filter(|f| f.variadic).count()
    );
    println!("  Variables:  {}", decls.variables.len());
    println!("  Types:      {}", decls.types.len());
    for (kind, n) in kind_counts(&decls) {
        println!("    {kind:<16} {n}");
    }
    Ok(())
}
