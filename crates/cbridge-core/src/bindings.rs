//! The ordered set of declarations a prepared package emits.

use std::fmt;

use serde::Serialize;

use crate::callback::Trampoline;
use crate::func::{Function, Variable};
use crate::package::Package;
use crate::types::Declarable;

/// Counts of emitted declarations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub variables: usize,
    pub types: usize,
    pub functions: usize,
    pub methods: usize,
    pub trampolines: usize,
}

impl Statistics {
    pub fn total(&self) -> usize {
        self.variables + self.types + self.functions + self.methods + self.trampolines
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} declarations wrapped", self.total())
    }
}

/// Emitted declarations of one package, sorted by managed name (native
/// name when unnamed).
#[derive(Debug)]
pub struct Bindings<'a> {
    pub package: &'a Package,
    pub variables: Vec<&'a Variable>,
    pub types: Vec<&'a Declarable>,
    pub functions: Vec<&'a Function>,
    pub trampolines: Vec<&'a Trampoline>,
}

impl<'a> Bindings<'a> {
    pub fn collect(package: &'a Package) -> Self {
        let keep = |managed: &str, native: &str| {
            !managed.is_empty() && !managed.contains('.') && !package.is_excluded(native)
        };

        let mut variables: Vec<&Variable> = package
            .variables
            .iter()
            .filter(|v| keep(&v.managed_name, &v.native_name))
            .filter(|v| {
                let ok = v.initializer(&package.types).is_some();
                if !ok {
                    log::warn!("variable {} has no single-statement conversion", v.native_name);
                }
                ok
            })
            .collect();
        variables.sort_by(|a, b| {
            sort_key(&a.managed_name, &a.native_name).cmp(sort_key(&b.managed_name, &b.native_name))
        });

        let mut types = Vec::new();
        for d in package.types.values() {
            if d.is_emitted() && !package.is_excluded(&d.native_name) {
                types.push(d);
            } else {
                log::debug!(
                    "pruned {} '{}' ({})",
                    d.kind_name(),
                    d.native_name,
                    if d.superseded_by.is_some() { "superseded" } else { "not exported" }
                );
            }
        }
        types.sort_by(|a, b| {
            sort_key(&a.managed_name, &a.native_name).cmp(sort_key(&b.managed_name, &b.native_name))
        });

        let mut functions: Vec<&Function> = package
            .functions
            .iter()
            .filter(|f| keep(&f.managed_name, &f.native_name))
            .collect();
        functions.sort_by(|a, b| {
            sort_key(&a.managed_name, &a.native_name).cmp(sort_key(&b.managed_name, &b.native_name))
        });

        let mut trampolines: Vec<&Trampoline> = package.trampolines.iter().collect();
        trampolines.sort_by(|a, b| a.name.cmp(&b.name));

        Self {
            package,
            variables,
            types,
            functions,
            trampolines,
        }
    }

    pub fn statistics(&self) -> Statistics {
        Statistics {
            variables: self.variables.len(),
            types: self.types.len(),
            functions: self.functions.len(),
            methods: self.types.iter().map(|t| t.methods.len()).sum(),
            trampolines: self.trampolines.len(),
        }
    }

    /// Methods of a type in name order.
    pub fn methods<'d>(&self, decl: &'d Declarable) -> Vec<&'d Function> {
        let mut methods: Vec<&Function> = decl.methods.iter().collect();
        methods.sort_by(|a, b| a.managed_name.cmp(&b.managed_name));
        methods
    }
}

fn sort_key<'s>(managed: &'s str, native: &'s str) -> &'s str {
    if managed.is_empty() {
        native
    } else {
        managed
    }
}
