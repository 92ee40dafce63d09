//! `cbridge.toml` manifest parsing and project configuration.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use cbridge_core::PackageConfig;
use serde::{Deserialize, Serialize};

pub const MANIFEST_NAME: &str = "cbridge.toml";

/// The top-level manifest of a binding project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CbridgeManifest {
    /// Project settings (required).
    pub project: ProjectConfig,
    /// One entry per generated Go package.
    #[serde(default)]
    pub package: Vec<PackageConfig>,
}

/// Project-wide settings shared by every package.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProjectConfig {
    /// Declaration document produced by the C front end.
    pub declarations: PathBuf,
    /// Directory receiving one subdirectory per package.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Native pointer width in bytes on the target.
    #[serde(default = "default_pointer_width")]
    pub pointer_width: usize,
    /// Architecture suffix of the generated file names.
    #[serde(default = "default_arch")]
    pub arch: String,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_pointer_width() -> usize {
    8
}

fn default_arch() -> String {
    "amd64".to_string()
}

impl CbridgeManifest {
    /// Search upward from `start_dir` for a `cbridge.toml` file, parse and
    /// return it along with the directory it was found in.
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(MANIFEST_NAME);
            if candidate.is_file() {
                let manifest = Self::load(&candidate)?;
                return Ok(Some((manifest, dir)));
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    /// Parse the manifest at an explicit path.
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let manifest: CbridgeManifest =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Parse a manifest from a TOML string.
    #[cfg(test)]
    pub fn from_str(s: &str) -> Result<Self> {
        let manifest: CbridgeManifest = toml::from_str(s).context("parsing cbridge.toml")?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<()> {
        if self.project.pointer_width == 0 {
            bail!("pointer-width must be positive");
        }
        for p in &self.package {
            if p.name.is_empty() {
                bail!("every [[package]] needs a name");
            }
            if p.pattern.is_some() && p.prefix.is_some() {
                log::warn!("package {}: pattern takes precedence over prefix", p.name);
            }
        }
        Ok(())
    }

    /// Declaration document path, resolved against the manifest directory.
    pub fn declarations_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.project.declarations)
    }

    /// Output root, resolved against the manifest directory unless
    /// overridden on the command line.
    pub fn output_root(&self, project_dir: &Path, overridden: Option<&Path>) -> PathBuf {
        match overridden {
            Some(dir) => dir.to_path_buf(),
            None => project_dir.join(&self.project.output_dir),
        }
    }

    pub fn package(&self, name: &str) -> Option<&PackageConfig> {
        self.package.iter().find(|p| p.name == name)
    }
}

/// Find the manifest: an explicit path wins, otherwise search upward from
/// `cwd`. Returns the manifest and the directory relative paths resolve
/// against.
pub fn locate(explicit: Option<&Path>, cwd: &Path) -> Result<(CbridgeManifest, PathBuf)> {
    if let Some(path) = explicit {
        let manifest = CbridgeManifest::load(path)?;
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| cwd.to_path_buf());
        return Ok((manifest, dir));
    }
    match CbridgeManifest::find_and_load(cwd)? {
        Some(found) => Ok(found),
        None => bail!("no {MANIFEST_NAME} found in {} or any parent", cwd.display()),
    }
}
