//! `cbridge generate`: lower every selected package and write its sources.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cbridge_core::render::{c_header, c_source, go_source};
use cbridge_core::{Bindings, Generator, Package, PackageConfig, Statistics};
use cbridge_decl::Declarations;

use crate::manifest::CbridgeManifest;

/// File names generated for one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFiles {
    pub go: String,
    pub c: String,
    pub h: String,
}

impl OutputFiles {
    pub fn for_package(config: &PackageConfig, arch: &str) -> Self {
        Self {
            go: config
                .go_file
                .clone()
                .unwrap_or_else(|| format!("auto_{arch}.go")),
            c: config
                .c_file
                .clone()
                .unwrap_or_else(|| format!("auto_{arch}.c")),
            h: config
                .h_file
                .clone()
                .unwrap_or_else(|| format!("auto_{arch}.h")),
        }
    }
}

/// Load the declaration document and prepare the requested packages
/// (all of them when `selected` is empty).
pub fn prepare(
    manifest: &CbridgeManifest,
    project_dir: &Path,
    selected: &[String],
) -> Result<Vec<Package>> {
    let decls_path = manifest.declarations_path(project_dir);
    let decls = Declarations::load(&decls_path)
        .with_context(|| format!("loading declarations from {}", decls_path.display()))?;
    log::info!(
        "{}: {} functions, {} types",
        decls_path.display(),
        decls.functions.len(),
        decls.types.len()
    );

    let generator = Generator::new(
        decls,
        manifest.package.clone(),
        manifest.project.pointer_width,
    );
    let packages = if selected.is_empty() {
        generator.prepare()
    } else {
        generator.prepare_only(selected)
    };
    packages.context("preparing packages")
}

/// Run `cbridge generate`.
pub fn run(
    manifest: &CbridgeManifest,
    project_dir: &Path,
    selected: &[String],
    output_dir: Option<&Path>,
    dry_run: bool,
) -> Result<()> {
    let packages = prepare(manifest, project_dir, selected)?;
    let root = manifest.output_root(project_dir, output_dir);

    let mut total = Statistics::default();
    for pkg in &packages {
        let bindings = Bindings::collect(pkg);
        let files = OutputFiles::for_package(pkg.config(), &manifest.project.arch);

        if dry_run {
            print!("{}", go_source(&bindings, Some(&files.h)));
        } else {
            let dir = root.join(pkg.name());
            let written = write_package(&bindings, &dir, &files)?;
            for path in &written {
                println!("  wrote {}", path.display());
            }
        }

        let stats = bindings.statistics();
        log::info!("{}: {stats}", pkg.name());
        if !dry_run {
            println!("{}: {stats}", pkg.name());
        }
        total.variables += stats.variables;
        total.types += stats.types;
        total.functions += stats.functions;
        total.methods += stats.methods;
        total.trampolines += stats.trampolines;
    }

    if !dry_run {
        println!(
            "Generated {} package(s): {total}",
            packages.len()
        );
    }
    Ok(())
}

/// Write the Go source, plus the C stub and header when the package has
/// trampolines. Returns the written paths.
pub fn write_package(bindings: &Bindings, dir: &Path, files: &OutputFiles) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut written = Vec::new();
    let go_path = dir.join(&files.go);
    fs::write(&go_path, go_source(bindings, Some(&files.h)))
        .with_context(|| format!("writing {}", go_path.display()))?;
    written.push(go_path);

    if !bindings.trampolines.is_empty() {
        let c_path = dir.join(&files.c);
        let c = c_source(bindings)
            .with_context(|| format!("rendering trampolines for {}", bindings.package.name()))?;
        fs::write(&c_path, c).with_context(|| format!("writing {}", c_path.display()))?;
        written.push(c_path);

        let h_path = dir.join(&files.h);
        let h = c_header(bindings)
            .with_context(|| format!("rendering header for {}", bindings.package.name()))?;
        fs::write(&h_path, h).with_context(|| format!("writing {}", h_path.display()))?;
        written.push(h_path);
    }
    Ok(written)
}
