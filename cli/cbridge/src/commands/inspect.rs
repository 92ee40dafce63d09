//! `cbridge inspect`: list lowered declarations of one package.

use std::path::Path;

use anyhow::{bail, Result};
use cbridge_core::Bindings;
use serde::Serialize;

use crate::commands::generate;
use crate::manifest::CbridgeManifest;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    pub kind: String,
    pub native: String,
    pub managed: String,
}

/// Every emitted declaration in output order, methods after their type.
pub fn rows(bindings: &Bindings) -> Vec<Row> {
    let mut rows = Vec::new();
    for v in &bindings.variables {
        rows.push(Row {
            kind: "variable".into(),
            native: v.native_name.clone(),
            managed: v.managed_name.clone(),
        });
    }
    for t in &bindings.types {
        rows.push(Row {
            kind: t.kind_name().into(),
            native: t.native_name.clone(),
            managed: t.managed_name.clone(),
        });
        for m in bindings.methods(t) {
            rows.push(Row {
                kind: "method".into(),
                native: m.native_name.clone(),
                managed: format!("{}.{}", t.managed_name, m.managed_name),
            });
        }
    }
    for f in &bindings.functions {
        rows.push(Row {
            kind: "function".into(),
            native: f.native_name.clone(),
            managed: f.managed_name.clone(),
        });
    }
    for t in &bindings.trampolines {
        rows.push(Row {
            kind: "trampoline".into(),
            native: t.c_name(),
            managed: t.go_name(),
        });
    }
    rows
}

/// Run `cbridge inspect`.
pub fn run(
    manifest: &CbridgeManifest,
    project_dir: &Path,
    package: &str,
    export: Option<&str>,
) -> Result<()> {
    let packages = generate::prepare(manifest, project_dir, &[package.to_string()])?;
    let Some(pkg) = packages.first() else {
        bail!("package '{package}' was not prepared");
    };
    let bindings = Bindings::collect(pkg);
    let rows = rows(&bindings);

    match export.unwrap_or("text") {
        "json" => {
            let json = serde_json::json!({
                "package": pkg.name(),
                "declarations": rows,
                "statistics": bindings.statistics(),
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        "text" => {
            let width = rows.iter().map(|r| r.native.len()).max().unwrap_or(0);
            println!("--- {} ({}) ---", pkg.name(), pkg.config().path);
            for r in &rows {
                println!("  {:<10} {:<width$}  {}", r.kind, r.native, r.managed);
            }
            println!();
            println!("{}", bindings.statistics());
        }
        other => bail!("unknown export format '{other}' (expected text or json)"),
    }
    Ok(())
}
