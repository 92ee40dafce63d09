//! One generated Go package: configuration, ownership and preparation.
//!
//! [`Package::prepare`] runs the whole lowering pipeline for a package:
//! functions and callbacks, global variables, owned enumerations, the
//! field fixed point, pass-through alias detection, naming and method
//! promotion.

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use cbridge_decl::{Declarations, FileId, NativeFunction, TypeId};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::callback::{build_trampoline, detect, rewrite, signature_key, trampoline_name, Trampoline};
use crate::error::{BridgeError, Result};
use crate::func::{add_method, lower_function, lower_variable, optimize_method_names, Function, Variable};
use crate::lower::{LowerRules, Lowerer};
use crate::naming::{NameFilter, NameTable};
use crate::types::{DeclKind, DeclMap, TypeDesc};

/// Package section of the manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PackageConfig {
    /// Go package name; also the qualifier used by including packages.
    pub name: String,
    /// Go import path.
    pub path: String,
    /// Headers whose declarations this package owns. Empty owns every file.
    pub headers: Vec<String>,
    /// Name pattern; capture group 1 is the meaningful part.
    pub pattern: Option<String>,
    /// Literal name prefix, used when no pattern is given.
    pub prefix: Option<String>,
    /// Native names never exported.
    pub excluded: Vec<String>,
    /// Native types carrying a 0/1 truth value.
    pub bool_types: Vec<String>,
    /// Native type name → managed number type.
    pub type_rules: BTreeMap<String, String>,
    /// Packages whose types this one references instead of redeclaring.
    pub include: Vec<String>,
    /// `#cgo` directives, without the `#cgo ` prefix.
    pub cgo_directives: Vec<String>,
    pub go_file: Option<String>,
    pub c_file: Option<String>,
    pub h_file: Option<String>,
}

impl PackageConfig {
    /// Compile the name filter. A pattern wins over a prefix; with neither,
    /// every name matches.
    pub fn filter(&self) -> Result<NameFilter> {
        let invalid = |source| BridgeError::InvalidPattern {
            package: self.name.clone(),
            source,
        };
        match (&self.pattern, &self.prefix) {
            (Some(p), _) => Ok(NameFilter::Pattern(Regex::new(p).map_err(invalid)?)),
            (None, Some(prefix)) => Ok(NameFilter::Prefix(prefix.clone())),
            (None, None) => Ok(NameFilter::Pattern(Regex::new(".*").map_err(invalid)?)),
        }
    }
}

/// A package and, once prepared, its lowered declarations.
#[derive(Debug)]
pub struct Package {
    config: PackageConfig,
    decls: Rc<Declarations>,
    filter: NameFilter,
    rules: LowerRules,
    owned_files: BTreeSet<FileId>,
    names: NameTable,
    /// Trampoline names keyed by callback signature.
    trampoline_names: NameTable,
    pub(crate) types: DeclMap,
    pub(crate) functions: Vec<Function>,
    pub(crate) variables: Vec<Variable>,
    pub(crate) trampolines: Vec<Trampoline>,
    /// `(qualifier, import path)` of every included package.
    pub(crate) included: Vec<(String, String)>,
}

impl Package {
    pub fn new(config: PackageConfig, decls: Rc<Declarations>, pointer_width: usize) -> Result<Self> {
        let filter = config.filter()?;
        let rules = LowerRules {
            type_rules: config.type_rules.clone(),
            bool_types: config.bool_types.iter().cloned().collect(),
            pointer_width,
        };
        let owned_files = if config.headers.is_empty() {
            decls.files.iter().map(|f| f.id.clone()).collect()
        } else {
            decls.files_matching(&config.headers)
        };
        if owned_files.is_empty() {
            log::warn!(
                "package '{}' owns no files (headers: {})",
                config.name,
                config.headers.join(", ")
            );
        }
        Ok(Self {
            config,
            decls,
            filter,
            rules,
            owned_files,
            names: NameTable::new(),
            trampoline_names: NameTable::new(),
            types: DeclMap::new(),
            functions: Vec::new(),
            variables: Vec::new(),
            trampolines: Vec::new(),
            included: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &PackageConfig {
        &self.config
    }

    pub fn decls(&self) -> &Declarations {
        &self.decls
    }

    pub fn types(&self) -> &DeclMap {
        &self.types
    }

    pub fn pointer_width(&self) -> usize {
        self.rules.pointer_width
    }

    pub fn owns(&self, file: &str) -> bool {
        self.owned_files.contains(file)
    }

    pub fn is_excluded(&self, native: &str) -> bool {
        self.config.excluded.iter().any(|e| e == native)
    }

    /// Whether a native declaration is exported by this package.
    pub fn exported(&self, native: &str, file: &str) -> bool {
        !native.is_empty()
            && !self.is_excluded(native)
            && self.owns(file)
            && self.filter.matches(native)
    }

    /// Name under which this package emits the type a reference to `id`
    /// resolves to, if it emits one.
    pub fn lookup_global(&self, id: &str) -> Option<&str> {
        self.types
            .target(id)
            .filter(|d| d.is_emitted())
            .map(|d| d.managed_name.as_str())
    }

    /// Lower everything this package exports. `included` holds the
    /// already prepared packages this one may reference.
    pub fn prepare(&mut self, included: &[&Package]) -> Result<()> {
        self.names.clear();
        self.trampoline_names.clear();
        self.types.clear();
        self.functions.clear();
        self.variables.clear();
        self.trampolines.clear();
        self.included = included
            .iter()
            .map(|p| (p.config.name.clone(), p.config.path.clone()))
            .collect();

        let decls = Rc::clone(&self.decls);
        let wanted: Vec<&NativeFunction> = decls
            .functions
            .iter()
            .filter(|f| {
                if f.variadic {
                    log::debug!("skipping variadic function {}", f.name);
                    return false;
                }
                self.exported(&f.name, &f.file)
            })
            .collect();
        let wanted_vars: Vec<_> = decls
            .variables
            .iter()
            .filter(|v| self.exported(&v.name, &v.file))
            .collect();
        let wanted_enums: Vec<TypeId> = decls
            .enumerations()
            .filter(|(_, e)| self.owns(&e.file) && !self.is_excluded(&e.name))
            .map(|(id, _)| id.clone())
            .collect();

        let mut functions = Vec::with_capacity(wanted.len());
        {
            let mut l = Lowerer::new(&decls, &mut self.types, &self.rules);
            for native in wanted {
                let mut f = lower_function(&mut l, native)?;
                if let Some(site) = detect(&decls, native)? {
                    let key = signature_key(&decls, &site)?;
                    let existing = self.trampolines.iter().position(|t| t.key == key);
                    let index = match existing {
                        Some(i) => i,
                        None => {
                            let candidate = trampoline_name(&self.filter, &site, &native.name);
                            let name = self.trampoline_names.resolve(&key, &candidate);
                            let t = build_trampoline(&mut l, &decls, &site, name)?;
                            self.trampolines.push(t);
                            self.trampolines.len() - 1
                        }
                    };
                    let tramp = &self.trampolines[index];
                    log::debug!("{}: callback pair through {}", native.name, tramp.name);
                    rewrite(&mut f, &site, tramp);
                }
                functions.push(f);
            }
            for v in wanted_vars {
                self.variables.push(lower_variable(&mut l, v)?);
            }
            for id in &wanted_enums {
                l.declare(id)?;
            }
            let rounds = l.populate_fields()?;
            log::debug!("package {}: fields reached a fixed point after {rounds} passes", self.config.name);
        }

        self.detect_pass_through();
        self.name_types(included);
        self.name_enum_values();
        self.bind_functions(functions);
        for id in self.types.ids() {
            if let Some(d) = self.types.get_mut(&id) {
                optimize_method_names(d);
            }
        }
        for v in self.variables.iter_mut() {
            v.managed_name = self.names.resolve(&v.id, &self.filter.upper_name(&v.native_name));
        }

        log::info!(
            "package {}: {} functions, {} variables, {} types, {} trampolines",
            self.config.name,
            self.functions.len(),
            self.variables.len(),
            self.types.len(),
            self.trampolines.len()
        );
        Ok(())
    }

    /// An exported typedef over a struct or union of the same (or no) name
    /// takes over the composite's identity; a typedef over an enumeration
    /// takes over its constants.
    fn detect_pass_through(&mut self) {
        let mut pairs = Vec::new();
        for alias in self.types.values() {
            let DeclKind::Alias {
                literal: TypeDesc::Declared(lid),
                ..
            } = &alias.kind
            else {
                continue;
            };
            if !alias.standalone || !self.exported(&alias.native_name, &alias.file) {
                continue;
            }
            let Some(literal) = self.types.get(lid) else {
                continue;
            };
            let pass_through = match literal.kind {
                DeclKind::Struct { .. } | DeclKind::Union { .. } => {
                    literal.native_name.is_empty() || literal.native_name == alias.native_name
                }
                DeclKind::Enum { .. } => true,
                DeclKind::Alias { .. } => false,
            };
            if pass_through && literal.superseded_by.is_none() {
                pairs.push((alias.id.clone(), lid.clone(), literal.kind_name() != "enum"));
            }
        }
        for (alias, literal, assume) in pairs {
            if self.types.get(&literal).is_some_and(|l| l.superseded_by.is_some()) {
                continue;
            }
            log::debug!("{literal} superseded by alias {alias}");
            if let Some(l) = self.types.get_mut(&literal) {
                l.superseded_by = Some(alias.clone());
            }
            if assume {
                // Methods land on the alias; they share a scope with the fields.
                let members = self
                    .types
                    .get(&literal)
                    .map(|l| l.members.clone())
                    .unwrap_or_default();
                if let Some(a) = self.types.get_mut(&alias) {
                    a.members = members;
                    a.assumed_identity = Some(literal);
                }
            }
        }
    }

    fn name_types(&mut self, included: &[&Package]) {
        for id in self.types.ids() {
            let Some(d) = self.types.get(&id) else { continue };
            if !d.standalone || d.superseded_by.is_some() || d.native_name.is_empty() {
                continue;
            }
            let key = d.naming_key().to_string();
            let name = if self.exported(&d.native_name, &d.file) {
                let candidate = self.filter.upper_name(&d.native_name);
                self.names.resolve(&key, &candidate)
            } else {
                included
                    .iter()
                    .find_map(|p| {
                        p.lookup_global(&id)
                            .map(|n| format!("{}.{n}", p.config.name))
                    })
                    .unwrap_or_default()
            };
            if name.is_empty() {
                log::debug!("{} '{}' left unnamed", d.kind_name(), d.native_name);
            }
            if let Some(d) = self.types.get_mut(&id) {
                d.managed_name = name;
            }
        }
    }

    fn name_enum_values(&mut self) {
        let enums: Vec<TypeId> = self
            .types
            .values()
            .filter(|d| matches!(d.kind, DeclKind::Enum { .. }))
            .filter(|d| self.types.target(&d.id).is_some_and(|t| t.is_emitted()))
            .map(|d| d.id.clone())
            .collect();
        for id in enums {
            let Some(d) = self.types.get_mut(&id) else { continue };
            let DeclKind::Enum { values, .. } = &mut d.kind else { continue };
            for v in values.iter_mut() {
                if self.config.excluded.contains(&v.native_name) {
                    continue;
                }
                v.managed_name = self.names.resolve(&v.id, &self.filter.upper_name(&v.native_name));
            }
        }
    }

    /// Turn functions into methods where possible; name the rest at
    /// package scope.
    fn bind_functions(&mut self, functions: Vec<Function>) {
        for mut f in functions {
            if let Some(tid) = f.receiver_type(&self.types) {
                f.promote();
                let candidate = self.filter.upper_name(&f.native_name);
                if let Some(decl) = self.types.get_mut(&tid) {
                    let native = f.native_name.clone();
                    if let Some(name) = add_method(decl, f, &candidate) {
                        log::debug!("{native} bound as method {}.{name}", decl.managed_name);
                    }
                    continue;
                }
                log::warn!("receiver type {tid} vanished; dropping {}", f.native_name);
                continue;
            }
            f.managed_name = self.names.resolve(&f.id, &self.filter.upper_name(&f.native_name));
            self.functions.push(f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "files": [{"id": "f1", "name": "/usr/include/point.h"}, {"id": "f2", "name": "/usr/include/other.h"}],
        "types": {
            "void": {"kind": "fundamental", "name": "void"},
            "int": {"kind": "fundamental", "name": "int", "size": 4},
            "double": {"kind": "fundamental", "name": "double", "size": 8},
            "s_point": {"kind": "struct", "name": "point_t", "file": "f1", "size": 8,
                "fields": [{"name": "x", "type": "int"}, {"name": "y", "type": "int"}]},
            "point_t": {"kind": "typedef", "name": "point_t", "file": "f1", "base": "s_point", "size": 8},
            "pp": {"kind": "pointer", "pointee": "point_t", "size": 8},
            "e_dir": {"kind": "enumeration", "name": "point_dir", "file": "f1", "size": 4,
                "values": [{"name": "POINT_NORTH", "value": 0}, {"name": "POINT_SOUTH", "value": 1}]},
            "dir_t": {"kind": "typedef", "name": "point_dir_t", "file": "f1", "base": "e_dir", "size": 4},
            "e_other": {"kind": "enumeration", "name": "other_mode", "file": "f2", "size": 4,
                "values": [{"name": "OTHER_A", "value": 0}]}
        },
        "functions": [
            {"id": "fn1", "name": "point_norm", "file": "f1", "returns": "double",
             "arguments": [{"name": "p", "type": "pp"}]},
            {"id": "fn2", "name": "point_make", "file": "f1", "returns": "point_t",
             "arguments": [{"name": "x", "type": "int"}, {"name": "y", "type": "int"}]},
            {"id": "fn3", "name": "point_printf", "file": "f1", "returns": "int",
             "arguments": [], "variadic": true},
            {"id": "fn4", "name": "point_secret", "file": "f1", "returns": "int", "arguments": []},
            {"id": "fn5", "name": "point_heading", "file": "f1", "returns": "dir_t", "arguments": []},
            {"id": "fn6", "name": "other_place", "file": "f2", "returns": "void",
             "arguments": [{"name": "p", "type": "pp"}]}
        ],
        "variables": [
            {"id": "v1", "name": "point_origin", "file": "f1", "type": "point_t"}
        ]
    }"#;

    fn prepared() -> Package {
        let decls = Rc::new(Declarations::parse(DOC).unwrap());
        let config = PackageConfig {
            name: "point".into(),
            path: "example.com/point".into(),
            headers: vec!["point.h".into()],
            pattern: Some("(?i)^point_(.*)".into()),
            excluded: vec!["point_secret".into()],
            ..PackageConfig::default()
        };
        let mut pkg = Package::new(config, decls, 8).unwrap();
        pkg.prepare(&[]).unwrap();
        pkg
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let config = PackageConfig {
            name: "bad".into(),
            pattern: Some("(".into()),
            ..PackageConfig::default()
        };
        assert!(matches!(
            config.filter(),
            Err(BridgeError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn ownership_by_header_suffix() {
        let pkg = prepared();
        assert!(pkg.owns("f1"));
        assert!(!pkg.owns("f2"));
        assert!(!pkg.exported("point_secret", "f1"));
        assert!(pkg.exported("point_norm", "f1"));
    }

    #[test]
    fn alias_takes_over_struct() {
        let pkg = prepared();
        let s = pkg.types().get("s_point").unwrap();
        assert_eq!(s.superseded_by.as_deref(), Some("point_t"));
        assert!(!s.is_emitted());
        let alias = pkg.types().get("point_t").unwrap();
        assert_eq!(alias.managed_name, "Point");
        assert!(alias.is_emitted());
        assert_eq!(alias.assumed_identity.as_deref(), Some("s_point"));
    }

    #[test]
    fn pointer_first_argument_becomes_method() {
        let pkg = prepared();
        let alias = pkg.types().get("point_t").unwrap();
        assert_eq!(alias.methods.len(), 1);
        assert_eq!(alias.methods[0].managed_name, "Norm");
        let names: Vec<_> = pkg.functions.iter().map(|f| f.managed_name.as_str()).collect();
        assert_eq!(names, vec!["Make", "Heading"]);
    }

    #[test]
    fn variadic_and_excluded_are_skipped() {
        let pkg = prepared();
        assert!(pkg.functions.iter().all(|f| f.native_name != "point_printf"));
        assert!(pkg.functions.iter().all(|f| f.native_name != "point_secret"));
    }

    #[test]
    fn enum_typedef_carries_constants() {
        let pkg = prepared();
        let e = pkg.types().get("e_dir").unwrap();
        assert_eq!(e.superseded_by.as_deref(), Some("dir_t"));
        let alias = pkg.types().get("dir_t").unwrap();
        assert_eq!(alias.managed_name, "Dir");
        let consts: Vec<_> = alias
            .enum_values(pkg.types())
            .iter()
            .map(|v| v.managed_name.as_str())
            .collect();
        assert_eq!(consts, vec!["North", "South"]);
        assert!(pkg.types().get("e_other").is_none());
    }

    #[test]
    fn variables_are_named() {
        let pkg = prepared();
        assert_eq!(pkg.variables.len(), 1);
        assert_eq!(pkg.variables[0].managed_name, "Origin");
    }

    #[test]
    fn prepare_is_repeatable() {
        let mut pkg = prepared();
        pkg.prepare(&[]).unwrap();
        assert_eq!(pkg.types().get("point_t").unwrap().managed_name, "Point");
        assert_eq!(pkg.functions.len(), 2);
    }

    #[test]
    fn included_types_are_qualified() {
        let decls = Rc::new(Declarations::parse(DOC).unwrap());
        let base = PackageConfig {
            name: "point".into(),
            path: "example.com/point".into(),
            headers: vec!["point.h".into()],
            pattern: Some("(?i)^point_(.*)".into()),
            ..PackageConfig::default()
        };
        let mut base = Package::new(base, Rc::clone(&decls), 8).unwrap();
        base.prepare(&[]).unwrap();

        let user = PackageConfig {
            name: "other".into(),
            path: "example.com/other".into(),
            headers: vec!["other.h".into()],
            prefix: Some("other_".into()),
            include: vec!["point".into()],
            ..PackageConfig::default()
        };
        let mut user = Package::new(user, decls, 8).unwrap();
        user.prepare(&[&base]).unwrap();
        assert_eq!(base.lookup_global("s_point"), Some("Point"));
        let alias = user.types().get("point_t").unwrap();
        assert_eq!(alias.managed_name, "point.Point");
        assert!(!alias.is_emitted());
        // Methods are never attached to another package's type.
        assert_eq!(user.functions.len(), 1);
        assert_eq!(user.functions[0].managed_name, "Place");
        let e = user.types().get("e_other").unwrap();
        assert_eq!(e.managed_name, "Mode");
        assert_eq!(user.included, vec![("point".to_string(), "example.com/point".to_string())]);
    }
}
