//! Declaration document (`*.decls.json`) parsing and querying.
//!
//! The document is produced by running the native compiler's declaration
//! extractor over a header and reducing its output to identity-keyed nodes.
//! Every node is immutable once loaded; the generator only reads it.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DeclError, Result};
use crate::fundamental::Fundamental;

/// Identity of a type node.
pub type TypeId = String;

/// Identity of a compilation unit (source file).
pub type FileId = String;

/// External classification of what a pointer-typed argument represents.
///
/// The generator never infers this; it is supplied by the extractor or by
/// hand-written annotations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerKind {
    /// No classification supplied.
    #[default]
    Unset,
    /// Plain pointer to a single value.
    Plain,
    /// Pointer to the first element of an array.
    Array,
    /// Pointer to an array of arrays.
    ArrayArray,
    /// NUL-terminated C string.
    String,
    /// Array of C strings.
    StringArray,
    /// Output parameter written by the callee.
    Return,
    /// Reference to a composite passed by address.
    Reference,
    /// Pointer type reached through a typedef (`typedef struct x *x_ref`).
    Typedef,
}

/// A source file listed by the extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub id: FileId,
    pub name: String,
}

/// A named enumerator inside an enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumValue {
    pub name: String,
    pub value: i64,
}

/// An enumeration declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enumeration {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub file: FileId,
    pub size: usize,
    #[serde(default)]
    pub values: Vec<EnumValue>,
}

/// A struct or union field, in author order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeId,
}

/// A struct or union declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Composite {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub file: FileId,
    pub size: usize,
    #[serde(default)]
    pub fields: Vec<Field>,
}

/// A typedef declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Typedef {
    pub name: String,
    #[serde(default)]
    pub file: FileId,
    /// The literal type the typedef names.
    pub base: TypeId,
    /// The fully resolved root (through every typedef and qualifier).
    /// Computed on load when the extractor omits it.
    #[serde(default)]
    pub root: Option<TypeId>,
    #[serde(default)]
    pub size: usize,
}

/// A function argument (or function-type parameter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argument {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeId,
    #[serde(default)]
    pub ptr_kind: PointerKind,
}

/// A function type, the pointee of a function pointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionType {
    pub returns: TypeId,
    #[serde(default)]
    pub arguments: Vec<Argument>,
}

/// A type node. The identity is the key under which it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NativeType {
    Fundamental {
        name: String,
        #[serde(default)]
        size: usize,
    },
    Enumeration(Enumeration),
    Array {
        element: TypeId,
        length: usize,
        #[serde(default)]
        size: usize,
    },
    Struct(Composite),
    Union(Composite),
    Pointer {
        pointee: TypeId,
        #[serde(default)]
        size: usize,
    },
    Typedef(Typedef),
    FunctionType(FunctionType),
    CvQualified {
        base: TypeId,
    },
    /// A node the extractor itself could not describe.
    Unimplemented {
        #[serde(default)]
        name: String,
    },
    /// Any kind this schema does not know.
    #[serde(other)]
    Unsupported,
}

impl NativeType {
    /// The declared name, for named kinds.
    pub fn name(&self) -> Option<&str> {
        match self {
            NativeType::Fundamental { name, .. } => Some(name),
            NativeType::Enumeration(e) => Some(&e.name),
            NativeType::Struct(c) | NativeType::Union(c) => Some(&c.name),
            NativeType::Typedef(t) => Some(&t.name),
            _ => None,
        }
    }

    /// The compilation unit, for declared kinds.
    pub fn file(&self) -> Option<&str> {
        match self {
            NativeType::Enumeration(e) => Some(&e.file),
            NativeType::Struct(c) | NativeType::Union(c) => Some(&c.file),
            NativeType::Typedef(t) => Some(&t.file),
            _ => None,
        }
    }

    /// Short kind label for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            NativeType::Fundamental { .. } => "fundamental",
            NativeType::Enumeration(_) => "enumeration",
            NativeType::Array { .. } => "array",
            NativeType::Struct(_) => "struct",
            NativeType::Union(_) => "union",
            NativeType::Pointer { .. } => "pointer",
            NativeType::Typedef(_) => "typedef",
            NativeType::FunctionType(_) => "function_type",
            NativeType::CvQualified { .. } => "cv_qualified",
            NativeType::Unimplemented { .. } => "unimplemented",
            NativeType::Unsupported => "unsupported",
        }
    }
}

/// Explicit callback pairing supplied by the extractor for one function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackHint {
    /// Index of the function-pointer argument.
    pub arg_index: usize,
    /// Index of the user-data argument paired with it.
    pub data_index: usize,
    /// Index of the user-data parameter inside the callback signature.
    pub callback_data_index: usize,
}

/// A function declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeFunction {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub file: FileId,
    pub returns: TypeId,
    #[serde(default)]
    pub arguments: Vec<Argument>,
    #[serde(default)]
    pub variadic: bool,
    #[serde(default)]
    pub callback: Option<CallbackHint>,
}

/// A global variable declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeVariable {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub file: FileId,
    #[serde(rename = "type")]
    pub ty: TypeId,
}

/// A complete declaration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Declarations {
    #[serde(default)]
    pub files: Vec<SourceFile>,
    #[serde(default)]
    pub types: BTreeMap<TypeId, NativeType>,
    #[serde(default)]
    pub functions: Vec<NativeFunction>,
    #[serde(default)]
    pub variables: Vec<NativeVariable>,
}

impl Declarations {
    /// Parse a declaration document from a JSON string.
    ///
    /// Validates every identity reference and fills in missing typedef roots.
    pub fn parse(input: &str) -> Result<Self> {
        let mut decls: Declarations = serde_json::from_str(input)?;
        decls.validate()?;
        decls.resolve_roots()?;
        log::debug!(
            "loaded {} types, {} functions, {} variables from {} files",
            decls.types.len(),
            decls.functions.len(),
            decls.variables.len(),
            decls.files.len()
        );
        Ok(decls)
    }

    /// Parse a declaration document from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Look up a type node.
    pub fn ty(&self, id: &str) -> Result<&NativeType> {
        self.types.get(id).ok_or_else(|| DeclError::UnknownType {
            id: id.to_string(),
            context: "lookup".to_string(),
        })
    }

    /// File identities whose name ends with one of `headers`.
    ///
    /// Matching on the path suffix lets a manifest name `gsl/gsl_rng.h`
    /// without knowing the system include directory.
    pub fn files_matching(&self, headers: &[String]) -> BTreeSet<FileId> {
        self.files
            .iter()
            .filter(|f| {
                headers.iter().any(|h| {
                    f.name == *h
                        || f.name.ends_with(&format!("/{}", h.trim_start_matches('/')))
                })
            })
            .map(|f| f.id.clone())
            .collect()
    }

    /// All enumerations, in identity order.
    pub fn enumerations(&self) -> impl Iterator<Item = (&TypeId, &Enumeration)> {
        self.types.iter().filter_map(|(id, ty)| match ty {
            NativeType::Enumeration(e) => Some((id, e)),
            _ => None,
        })
    }

    /// Strip qualifiers and typedefs until a structural node is reached.
    pub fn strip(&self, id: &str) -> Result<(TypeId, &NativeType)> {
        let mut current = id.to_string();
        let mut seen = HashSet::new();
        loop {
            if !seen.insert(current.clone()) {
                return Err(DeclError::TypedefCycle { id: id.to_string() });
            }
            match self.ty(&current)? {
                NativeType::CvQualified { base } => current = base.clone(),
                NativeType::Typedef(t) => current = t.base.clone(),
                other => return Ok((current, other)),
            }
        }
    }

    /// Strip qualifiers only, keeping typedef names.
    pub fn strip_qualifiers(&self, id: &str) -> Result<(TypeId, &NativeType)> {
        let mut current = id.to_string();
        loop {
            match self.ty(&current)? {
                NativeType::CvQualified { base } => current = base.clone(),
                other => return Ok((current, other)),
            }
        }
    }

    /// Whether the type is `void *` (through typedefs and qualifiers).
    pub fn is_void_pointer(&self, id: &str) -> Result<bool> {
        match self.strip(id)?.1 {
            NativeType::Pointer { pointee, .. } => self.is_void(pointee),
            _ => Ok(false),
        }
    }

    /// Whether the type is `void` (through typedefs and qualifiers).
    pub fn is_void(&self, id: &str) -> Result<bool> {
        Ok(match self.strip(id)?.1 {
            NativeType::Fundamental { name, .. } => {
                Fundamental::parse(name).is_some_and(|f| f.is_void())
            }
            _ => false,
        })
    }

    /// Whether the type is a `char *` (through typedefs and qualifiers).
    pub fn is_c_string(&self, id: &str) -> Result<bool> {
        match self.strip(id)?.1 {
            NativeType::Pointer { pointee, .. } => Ok(match self.strip(pointee)?.1 {
                NativeType::Fundamental { name, .. } => {
                    Fundamental::parse(name) == Some(Fundamental::Char)
                }
                _ => false,
            }),
            _ => Ok(false),
        }
    }

    /// If the type is a pointer to a function type, return the function
    /// type's identity and the name of the outermost typedef on the way.
    pub fn function_pointer(&self, id: &str) -> Result<Option<(TypeId, Option<String>)>> {
        let typedef_name = match self.strip_qualifiers(id)?.1 {
            NativeType::Typedef(t) => Some(t.name.clone()),
            _ => None,
        };
        match self.strip(id)?.1 {
            NativeType::Pointer { pointee, .. } => {
                let (fn_id, target) = self.strip(pointee)?;
                Ok(match target {
                    NativeType::FunctionType(_) => Some((fn_id, typedef_name)),
                    _ => None,
                })
            }
            _ => Ok(None),
        }
    }

    /// Look up a function type node.
    pub fn function_type(&self, id: &str) -> Result<&FunctionType> {
        match self.ty(id)? {
            NativeType::FunctionType(f) => Ok(f),
            other => Err(DeclError::InvalidDocument {
                detail: format!("'{id}' is a {}, expected a function type", other.kind_name()),
            }),
        }
    }

    /// C spelling of a type, used for trampoline stubs.
    pub fn c_spelling(&self, id: &str) -> Result<String> {
        Ok(match self.ty(id)? {
            NativeType::Fundamental { name, .. } => match Fundamental::parse(name) {
                Some(f) => f.to_string(),
                None => name.clone(),
            },
            NativeType::Enumeration(e) => format!("enum {}", e.name),
            NativeType::Struct(c) => format!("struct {}", c.name),
            NativeType::Union(c) => format!("union {}", c.name),
            NativeType::Typedef(t) => t.name.clone(),
            NativeType::Pointer { pointee, .. } => match self.ty(pointee)? {
                NativeType::FunctionType(_) => "void*".to_string(),
                _ => format!("{}*", self.c_spelling(pointee)?),
            },
            NativeType::Array { element, .. } => format!("{}*", self.c_spelling(element)?),
            NativeType::CvQualified { base } => self.c_spelling(base)?,
            NativeType::FunctionType(_) => "void*".to_string(),
            NativeType::Unimplemented { .. } | NativeType::Unsupported => "void*".to_string(),
        })
    }

    fn validate(&self) -> Result<()> {
        let files: HashSet<&str> = self.files.iter().map(|f| f.id.as_str()).collect();
        let check_type = |id: &str, context: &dyn Fn() -> String| -> Result<()> {
            if self.types.contains_key(id) {
                Ok(())
            } else {
                Err(DeclError::UnknownType {
                    id: id.to_string(),
                    context: context(),
                })
            }
        };
        let check_file = |id: &str, context: &dyn Fn() -> String| -> Result<()> {
            if id.is_empty() || files.contains(id) {
                Ok(())
            } else {
                Err(DeclError::UnknownFile {
                    id: id.to_string(),
                    context: context(),
                })
            }
        };

        for (id, ty) in &self.types {
            let ctx = || format!("type '{id}'");
            if let Some(file) = ty.file() {
                check_file(file, &ctx)?;
            }
            match ty {
                NativeType::Array { element, .. } => check_type(element, &ctx)?,
                NativeType::Struct(c) | NativeType::Union(c) => {
                    for f in &c.fields {
                        check_type(&f.ty, &ctx)?;
                    }
                }
                NativeType::Pointer { pointee, .. } => check_type(pointee, &ctx)?,
                NativeType::Typedef(t) => {
                    check_type(&t.base, &ctx)?;
                    if let Some(root) = &t.root {
                        check_type(root, &ctx)?;
                    }
                }
                NativeType::FunctionType(f) => {
                    check_type(&f.returns, &ctx)?;
                    for a in &f.arguments {
                        check_type(&a.ty, &ctx)?;
                    }
                }
                NativeType::CvQualified { base } => check_type(base, &ctx)?,
                _ => {}
            }
        }

        let mut function_ids = HashSet::new();
        for func in &self.functions {
            let ctx = || format!("function '{}'", func.name);
            if !function_ids.insert(func.id.as_str()) {
                return Err(DeclError::InvalidDocument {
                    detail: format!("duplicate function identity '{}'", func.id),
                });
            }
            check_file(&func.file, &ctx)?;
            check_type(&func.returns, &ctx)?;
            for a in &func.arguments {
                check_type(&a.ty, &ctx)?;
            }
            if let Some(hint) = &func.callback {
                let n = func.arguments.len();
                if hint.arg_index >= n || hint.data_index >= n || hint.arg_index == hint.data_index
                {
                    return Err(DeclError::InvalidDocument {
                        detail: format!(
                            "function '{}' has callback indices ({}, {}) outside its {n} arguments",
                            func.name, hint.arg_index, hint.data_index
                        ),
                    });
                }
            }
        }

        for var in &self.variables {
            let ctx = || format!("variable '{}'", var.name);
            check_file(&var.file, &ctx)?;
            check_type(&var.ty, &ctx)?;
        }
        Ok(())
    }

    fn resolve_roots(&mut self) -> Result<()> {
        let missing: Vec<TypeId> = self
            .types
            .iter()
            .filter_map(|(id, ty)| match ty {
                NativeType::Typedef(t) if t.root.is_none() => Some(id.clone()),
                _ => None,
            })
            .collect();
        for id in missing {
            let (root, _) = self.strip(&id)?;
            if let Some(NativeType::Typedef(t)) = self.types.get_mut(&id) {
                t.root = Some(root);
            }
        }
        Ok(())
    }
}
