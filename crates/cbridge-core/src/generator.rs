//! Multi-package generation: include ordering and preparation.

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use cbridge_decl::Declarations;

use crate::error::{BridgeError, Result};
use crate::package::{Package, PackageConfig};

/// Owns the shared declaration document and every package configuration.
pub struct Generator {
    decls: Rc<Declarations>,
    configs: Vec<PackageConfig>,
    pointer_width: usize,
}

impl Generator {
    pub fn new(decls: Declarations, configs: Vec<PackageConfig>, pointer_width: usize) -> Self {
        Self {
            decls: Rc::new(decls),
            configs,
            pointer_width,
        }
    }

    /// Package names ordered so that every package follows the packages it
    /// includes.
    pub fn order(&self) -> Result<Vec<String>> {
        let mut by_name: BTreeMap<&str, &PackageConfig> = BTreeMap::new();
        for c in &self.configs {
            if by_name.insert(&c.name, c).is_some() {
                return Err(BridgeError::DuplicatePackage {
                    package: c.name.clone(),
                });
            }
        }

        let mut order = Vec::with_capacity(self.configs.len());
        let mut done = BTreeSet::new();
        for c in &self.configs {
            let mut path = Vec::new();
            visit(&c.name, &by_name, &mut path, &mut done, &mut order)?;
        }
        Ok(order)
    }

    /// Prepare every package in include order.
    pub fn prepare(&self) -> Result<Vec<Package>> {
        let order = self.order()?;
        let mut prepared: Vec<Package> = Vec::with_capacity(order.len());
        for name in &order {
            let Some(config) = self.configs.iter().find(|c| &c.name == name) else {
                continue;
            };
            let mut pkg = Package::new(config.clone(), Rc::clone(&self.decls), self.pointer_width)?;
            let closure = self.includes_of(name);
            let included: Vec<&Package> = prepared
                .iter()
                .filter(|p| closure.contains(p.name()))
                .collect();
            pkg.prepare(&included)?;
            prepared.push(pkg);
        }
        Ok(prepared)
    }

    /// Prepare the named packages. Everything is prepared so that includes
    /// resolve; only the named packages are returned.
    pub fn prepare_only(&self, names: &[String]) -> Result<Vec<Package>> {
        for n in names {
            if !self.configs.iter().any(|c| &c.name == n) {
                return Err(BridgeError::UnknownPackage { package: n.clone() });
            }
        }
        let all = self.prepare()?;
        Ok(all
            .into_iter()
            .filter(|p| names.iter().any(|n| n == p.name()))
            .collect())
    }

    /// Transitive includes of a package.
    fn includes_of(&self, name: &str) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![name.to_string()];
        while let Some(n) = stack.pop() {
            if let Some(c) = self.configs.iter().find(|c| c.name == n) {
                for inc in &c.include {
                    if seen.insert(inc.clone()) {
                        stack.push(inc.clone());
                    }
                }
            }
        }
        seen.remove(name);
        seen
    }
}

fn visit(
    name: &str,
    by_name: &BTreeMap<&str, &PackageConfig>,
    path: &mut Vec<String>,
    done: &mut BTreeSet<String>,
    order: &mut Vec<String>,
) -> Result<()> {
    if done.contains(name) {
        return Ok(());
    }
    if path.iter().any(|p| p == name) {
        return Err(BridgeError::IncludeCycle {
            package: name.to_string(),
        });
    }
    let Some(config) = by_name.get(name) else {
        return Ok(());
    };
    path.push(name.to_string());
    for inc in &config.include {
        if !by_name.contains_key(inc.as_str()) {
            return Err(BridgeError::UnknownInclude {
                package: name.to_string(),
                include: inc.clone(),
            });
        }
        visit(inc, by_name, path, done, order)?;
    }
    path.pop();
    done.insert(name.to_string());
    order.push(name.to_string());
    Ok(())
}
