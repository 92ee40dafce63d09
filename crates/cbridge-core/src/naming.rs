//! Name resolution: native snake_case names to Go identifiers.
//!
//! A [`NameFilter`] strips the library prefix; [`NameTable`] binds names to
//! native identities so that every scope stays collision-free.

use std::collections::HashMap;

use regex::Regex;

/// Selects and shortens the native names a package owns.
#[derive(Debug, Clone)]
pub enum NameFilter {
    /// Regular expression; capture group 1, when present, is the meaningful
    /// part of the name.
    Pattern(Regex),
    /// Literal prefix stripped from matching names.
    Prefix(String),
}

impl Default for NameFilter {
    fn default() -> Self {
        NameFilter::Prefix(String::new())
    }
}

impl NameFilter {
    /// Whether the filter selects `native`.
    pub fn matches(&self, native: &str) -> bool {
        match self {
            NameFilter::Pattern(re) => re.is_match(native),
            NameFilter::Prefix(p) => native.starts_with(p.as_str()),
        }
    }

    /// Upper camel case name for types, functions, methods and constants.
    pub fn upper_name(&self, native: &str) -> String {
        let meaningful = match self {
            NameFilter::Pattern(re) => re
                .captures(native)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str())
                .filter(|s| s.len() > 2),
            NameFilter::Prefix(p) if !p.is_empty() => {
                native.strip_prefix(p.as_str()).filter(|s| s.len() > 2)
            }
            NameFilter::Prefix(_) => None,
        };
        upper_name(meaningful.unwrap_or(native))
    }
}

/// Upper camel case without any prefix handling.
pub fn upper_name(s: &str) -> String {
    let s = if s.len() > 3 {
        s.strip_suffix("_t").unwrap_or(s)
    } else {
        s
    };
    snake_to_camel(s)
}

/// `foo_BAR_baz` → `FooBarBaz`. Segments written fully in upper case are
/// lowered first.
pub fn snake_to_camel(s: &str) -> String {
    s.split('_')
        .map(|seg| {
            let seg = if seg.to_uppercase() == seg {
                seg.to_lowercase()
            } else {
                seg.to_string()
            };
            let mut chars = seg.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Lower camel case for parameters and locals.
pub fn lower_camel(s: &str) -> String {
    if s.len() <= 1 {
        return s.to_string();
    }
    let camel = snake_to_camel(s);
    let mut chars = camel.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => camel,
    }
}

const RESERVED: &[&str] = &[
    "break", "case", "chan", "const", "continue", "default", "defer", "else", "fallthrough",
    "for", "func", "go", "goto", "if", "import", "interface", "map", "package", "range",
    "return", "select", "struct", "switch", "type", "var", "true", "false", "iota", "nil",
    "append", "cap", "close", "complex", "copy", "delete", "imag", "len", "make", "new",
    "panic", "print", "println", "real", "recover", "string", "error",
];

/// Parameter name: lower camel case, suffixed with `_` when it would
/// shadow a Go keyword or predeclared identifier.
pub fn lower_name(native: &str) -> String {
    let mut s = lower_camel(native);
    if RESERVED.contains(&s.as_str()) {
        s.push('_');
    }
    s
}

/// Name-to-identity bindings for one scope.
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    by_name: HashMap<String, String>,
    by_id: HashMap<String, String>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `candidate` (or the first free `candidate_…_` variant) to `id`.
    ///
    /// Repeated calls for the same identity return the name bound first.
    /// An empty candidate binds nothing and yields an empty name.
    pub fn resolve(&mut self, id: &str, candidate: &str) -> String {
        if let Some(bound) = self.by_id.get(id) {
            return bound.clone();
        }
        if candidate.is_empty() {
            return String::new();
        }
        let mut name = candidate.to_string();
        while self.by_name.contains_key(&name) {
            name.push('_');
        }
        self.by_name.insert(name.clone(), id.to_string());
        self.by_id.insert(id.to_string(), name.clone());
        name
    }

    /// The name bound to `id`, if any.
    pub fn lookup(&self, id: &str) -> Option<&str> {
        self.by_id.get(id).map(String::as_str)
    }

    /// Whether `name` is taken in this scope.
    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Rebind `id` to `name`. Fails when `name` is taken by another identity.
    pub fn rename(&mut self, id: &str, name: &str) -> bool {
        match self.by_name.get(name) {
            Some(owner) if owner != id => return false,
            Some(_) => return true,
            None => {}
        }
        if let Some(old) = self.by_id.remove(id) {
            self.by_name.remove(&old);
        }
        self.by_name.insert(name.to_string(), id.to_string());
        self.by_id.insert(id.to_string(), name.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_name.clear();
        self.by_id.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_case_conversion() {
        assert_eq!(snake_to_camel("make_point"), "MakePoint");
        assert_eq!(snake_to_camel("RGB_value"), "RgbValue");
        assert_eq!(snake_to_camel("_point"), "Point");
        assert_eq!(lower_camel("make_point"), "makePoint");
        assert_eq!(lower_camel("x"), "x");
    }

    #[test]
    fn trailing_t_is_trimmed_only_for_long_names() {
        assert_eq!(upper_name("point_t"), "Point");
        assert_eq!(upper_name("a_t"), "AT");
    }

    #[test]
    fn pattern_capture_group_needs_three_chars() {
        let filter = NameFilter::Pattern(Regex::new("^gsl_(.*)").unwrap());
        assert_eq!(filter.upper_name("gsl_rng_type"), "RngType");
        assert_eq!(filter.upper_name("gsl_io"), "GslIo");
        assert!(filter.matches("gsl_rng"));
        assert!(!filter.matches("rng"));
    }

    #[test]
    fn prefix_filter() {
        let filter = NameFilter::Prefix("point_".into());
        assert!(filter.matches("point_norm"));
        assert!(!filter.matches("make_point"));
        assert_eq!(filter.upper_name("point_norm"), "Norm");
        assert_eq!(filter.upper_name("point_t"), "Point");
    }

    #[test]
    fn reserved_parameter_names() {
        assert_eq!(lower_name("type"), "type_");
        assert_eq!(lower_name("len"), "len_");
        assert_eq!(lower_name("count"), "count");
    }

    #[test]
    fn table_suffixes_collisions() {
        let mut t = NameTable::new();
        assert_eq!(t.resolve("a", "Point"), "Point");
        assert_eq!(t.resolve("b", "Point"), "Point_");
        assert_eq!(t.resolve("c", "Point"), "Point__");
    }

    #[test]
    fn table_is_idempotent() {
        let mut t = NameTable::new();
        t.resolve("a", "Point");
        assert_eq!(t.resolve("b", "Point"), "Point_");
        assert_eq!(t.resolve("b", "Point"), "Point_");
        assert_eq!(t.resolve("a", "Other"), "Point");
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn empty_candidate_binds_nothing() {
        let mut t = NameTable::new();
        assert_eq!(t.resolve("a", ""), "");
        assert!(t.is_empty());
    }

    #[test]
    fn rename_respects_other_owners() {
        let mut t = NameTable::new();
        t.resolve("a", "PointNorm");
        t.resolve("b", "Norm");
        assert!(!t.rename("a", "Norm"));
        assert!(t.rename("a", "Length"));
        assert_eq!(t.lookup("a"), Some("Length"));
        assert!(!t.contains_name("PointNorm"));
    }
}
