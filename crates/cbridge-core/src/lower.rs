//! Native type nodes to [`TypeDesc`]s.
//!
//! Declarable types are created on first reference and memoized by
//! identity in the [`DeclMap`]; struct and union fields are filled in later
//! by [`Lowerer::populate_fields`], which runs to a fixed point.

use std::collections::{BTreeMap, BTreeSet};

use cbridge_decl::{Declarations, Fundamental, NativeType, PointerKind};

use crate::error::{BridgeError, Result};
use crate::naming::upper_name;
use crate::types::{
    managed_number, DeclKind, DeclMap, Declarable, EnumConst, FieldDesc, Strategy, TypeDesc,
};

/// Per-package lowering rules.
#[derive(Debug, Clone, Default)]
pub struct LowerRules {
    /// Native type name → managed number name.
    pub type_rules: BTreeMap<String, String>,
    /// Native type names carrying a 0/1 truth value.
    pub bool_types: BTreeSet<String>,
    pub pointer_width: usize,
}

/// Lowers native types into the package's declaration map.
pub struct Lowerer<'a> {
    decls: &'a Declarations,
    map: &'a mut DeclMap,
    rules: &'a LowerRules,
}

impl<'a> Lowerer<'a> {
    pub fn new(decls: &'a Declarations, map: &'a mut DeclMap, rules: &'a LowerRules) -> Self {
        Self { decls, map, rules }
    }

    pub fn map(&self) -> &DeclMap {
        self.map
    }

    /// Lower a type as seen through an argument's pointer classification.
    pub fn resolve(&mut self, id: &str, kind: PointerKind) -> Result<TypeDesc> {
        let decls = self.decls;
        if kind == PointerKind::Unset {
            if let Some(name) = decls.ty(id)?.name() {
                if self.rules.bool_types.contains(name) {
                    let base = self.declare(id)?;
                    return Ok(TypeDesc::Boolean {
                        native: base.native_name(self.map),
                        size: base.size(self.map, self.rules.pointer_width),
                    });
                }
            }
            return self.declare(id);
        }

        let pointee = match decls.strip(id)?.1 {
            NativeType::Pointer { pointee, .. } => pointee.clone(),
            other => {
                log::debug!(
                    "pointer kind {kind:?} on non-pointer {} '{id}', lowering by value",
                    other.kind_name()
                );
                return self.declare(id);
            }
        };

        Ok(match kind {
            PointerKind::String => TypeDesc::String,
            PointerKind::StringArray => TypeDesc::StringArray,
            PointerKind::Typedef => self.declare(id)?,
            PointerKind::ArrayArray => match decls.strip(&pointee)?.1 {
                NativeType::Pointer { pointee: inner, .. } => {
                    let inner = inner.clone();
                    TypeDesc::SliceOfSlice(Box::new(self.value(&inner, id)?))
                }
                _ => TypeDesc::Slice(Box::new(self.value(&pointee, id)?)),
            },
            _ => {
                let target = self.declare(&pointee)?;
                if target.is_void() {
                    TypeDesc::Pointer(Box::new(TypeDesc::Void))
                } else {
                    match kind {
                        PointerKind::Array => TypeDesc::Slice(Box::new(target)),
                        PointerKind::Return => TypeDesc::ReturnPointer(Box::new(target)),
                        _ => TypeDesc::Pointer(Box::new(target)),
                    }
                }
            }
        })
    }

    /// Lower a function or callback return type; `None` for void.
    pub fn resolve_return(&mut self, id: &str) -> Result<Option<TypeDesc>> {
        if self.decls.is_void(id)? {
            return Ok(None);
        }
        if self.decls.is_c_string(id)? {
            return Ok(Some(TypeDesc::String));
        }
        let ty = self.resolve(id, PointerKind::Unset)?;
        Ok(if ty.is_void() { None } else { Some(ty) })
    }

    /// Lower a type that must carry a value.
    pub fn value(&mut self, id: &str, context: &str) -> Result<TypeDesc> {
        let ty = self.declare(id)?;
        if ty.is_void() {
            return Err(BridgeError::VoidValue {
                context: context.to_string(),
            });
        }
        Ok(ty)
    }

    /// Lower and declare.
    pub fn declare(&mut self, id: &str) -> Result<TypeDesc> {
        self.equal_type(id, true)
    }

    /// Lower a native type by kind. With `declare`, declarable results are
    /// marked standalone; otherwise they only serve as a typedef literal.
    pub fn equal_type(&mut self, id: &str, declare: bool) -> Result<TypeDesc> {
        if let Some(existing) = self.map.get_mut(id) {
            existing.standalone |= declare;
            return Ok(TypeDesc::Declared(id.to_string()));
        }

        let decls = self.decls;
        let ty = decls.ty(id)?;
        if let Some(name) = ty.name() {
            if let Some(managed) = self.rules.type_rules.get(name) {
                let native = match ty {
                    NativeType::Fundamental { .. } => Fundamental::parse(name)
                        .map(|f| f.cgo_name().to_string())
                        .unwrap_or_else(|| format!("C.{name}")),
                    _ => format!("C.{name}"),
                };
                return Ok(TypeDesc::Number {
                    managed: managed.clone(),
                    native,
                    size: type_size(ty),
                });
            }
        }

        match ty {
            NativeType::Fundamental { name, size } => fundamental(id, name, *size),
            NativeType::Enumeration(e) => {
                let base = managed_number(cbridge_decl::NumClass::Signed, e.size * 8)
                    .ok_or_else(|| BridgeError::UnsupportedType {
                        id: id.to_string(),
                        detail: format!("enumeration of {} bytes", e.size),
                    })?;
                let values = e
                    .values
                    .iter()
                    .map(|v| EnumConst {
                        id: format!("{id}::{}", v.name),
                        native_name: v.name.clone(),
                        managed_name: String::new(),
                        value: v.value,
                    })
                    .collect();
                let kind = DeclKind::Enum {
                    base: base.to_string(),
                    values,
                };
                Ok(self.insert(Declarable::new(id, &e.name, &e.file, e.size, kind), declare))
            }
            NativeType::Array {
                element, length, ..
            } => {
                let (element, length) = (element.clone(), *length);
                let elem = self.value(&element, &format!("array '{id}'"))?;
                Ok(TypeDesc::Array {
                    elem: Box::new(elem),
                    len: length,
                })
            }
            NativeType::Struct(c) => {
                let d = Declarable::new(id, &c.name, &c.file, c.size, DeclKind::Struct { fields: None });
                Ok(self.insert(d, declare))
            }
            NativeType::Union(c) => {
                let d = Declarable::new(id, &c.name, &c.file, c.size, DeclKind::Union { fields: None });
                Ok(self.insert(d, declare))
            }
            NativeType::Pointer { pointee, .. } => {
                let pointee = pointee.clone();
                Ok(TypeDesc::Pointer(Box::new(self.declare(&pointee)?)))
            }
            NativeType::Typedef(t) => {
                let (name, file, size, base) =
                    (t.name.clone(), t.file.clone(), t.size, t.base.clone());
                let root = t.root.clone().unwrap_or_else(|| base.clone());
                let root_ty = decls.ty(&root)?;
                let literal_is_enum = matches!(root_ty, NativeType::Enumeration(_));
                let conv = match root_ty {
                    NativeType::Fundamental { .. } | NativeType::Enumeration(_) => Strategy::Cast,
                    NativeType::Pointer { .. } => Strategy::PointerReinterpret,
                    _ => Strategy::ValueReinterpret,
                };
                let literal = self.equal_type(&base, literal_is_enum)?;
                if literal.is_void() {
                    return Ok(TypeDesc::Void);
                }
                let size = if size == 0 {
                    literal.size(self.map, self.rules.pointer_width)
                } else {
                    size
                };
                let kind = DeclKind::Alias {
                    literal,
                    root,
                    conv,
                };
                Ok(self.insert(Declarable::new(id, &name, &file, size, kind), declare))
            }
            NativeType::FunctionType(_) => Ok(TypeDesc::OpaqueFunction),
            NativeType::CvQualified { base } => {
                let base = base.clone();
                self.declare(&base)
            }
            NativeType::Unimplemented { name } => {
                log::debug!("unimplemented native type '{name}' ({id}) lowered to void");
                Ok(TypeDesc::Void)
            }
            NativeType::Unsupported => Err(BridgeError::UnsupportedType {
                id: id.to_string(),
                detail: "no lowering for this node kind".to_string(),
            }),
        }
    }

    fn insert(&mut self, mut decl: Declarable, declare: bool) -> TypeDesc {
        let id = decl.id.clone();
        decl.standalone = declare;
        self.map.insert(decl);
        TypeDesc::Declared(id)
    }

    /// Fill in struct and union fields until a full pass adds nothing.
    /// Returns the number of passes that did work.
    pub fn populate_fields(&mut self) -> Result<usize> {
        let mut rounds = 0;
        loop {
            let pending: Vec<String> = self
                .map
                .values()
                .filter(|d| d.fields_pending())
                .map(|d| d.id.clone())
                .collect();
            if pending.is_empty() {
                break;
            }
            rounds += 1;
            let before = self.map.len();
            for id in &pending {
                let fields = self.lower_fields(id)?;
                if let Some(d) = self.map.get_mut(id) {
                    match &mut d.kind {
                        DeclKind::Struct { fields: slot } | DeclKind::Union { fields: slot } => {
                            *slot = Some(fields);
                        }
                        _ => {}
                    }
                }
            }
            log::debug!(
                "field pass {rounds}: populated {} types, {} new declarations",
                pending.len(),
                self.map.len() - before
            );
        }
        Ok(rounds)
    }

    fn lower_fields(&mut self, id: &str) -> Result<Vec<FieldDesc>> {
        let decls = self.decls;
        let native_fields = match decls.ty(id)? {
            NativeType::Struct(c) | NativeType::Union(c) => c.fields.clone(),
            _ => Vec::new(),
        };
        let mut fields = Vec::with_capacity(native_fields.len());
        for (index, field) in native_fields.iter().enumerate() {
            let ty = self.value(&field.ty, &format!("field '{}' of '{id}'", field.name))?;
            let candidate = if field.name.is_empty() {
                format!("Field{index}")
            } else {
                upper_name(&field.name)
            };
            let managed_name = match self.map.get_mut(id) {
                Some(d) => d.members.resolve(&format!("{id}.{index}"), &candidate),
                None => candidate,
            };
            fields.push(FieldDesc {
                native_name: field.name.clone(),
                managed_name,
                size: ty.size(self.map, self.rules.pointer_width),
                ty,
            });
        }
        Ok(fields)
    }
}

fn type_size(ty: &NativeType) -> usize {
    match ty {
        NativeType::Fundamental { size, .. }
        | NativeType::Array { size, .. }
        | NativeType::Pointer { size, .. } => *size,
        NativeType::Enumeration(e) => e.size,
        NativeType::Struct(c) | NativeType::Union(c) => c.size,
        NativeType::Typedef(t) => t.size,
        _ => 0,
    }
}

fn fundamental(id: &str, name: &str, size: usize) -> Result<TypeDesc> {
    let f = Fundamental::parse(name).ok_or_else(|| BridgeError::UnsupportedType {
        id: id.to_string(),
        detail: format!("unknown fundamental type '{name}'"),
    })?;
    if f.is_void() {
        return Ok(TypeDesc::Void);
    }
    let managed = if f == Fundamental::Bool {
        Some("bool")
    } else {
        f.num_class().and_then(|class| managed_number(class, size * 8))
    };
    let managed = managed.ok_or_else(|| BridgeError::UnsupportedType {
        id: id.to_string(),
        detail: format!("'{name}' of {size} bytes has no managed number type"),
    })?;
    Ok(TypeDesc::Number {
        managed: managed.to_string(),
        native: f.cgo_name().to_string(),
        size,
    })
}
