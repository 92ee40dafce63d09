//! Managed type descriptors and the declaration map.
//!
//! A [`TypeDesc`] describes how one native type appears on the Go side.
//! Structs, unions, enums and typedefs are *declarable*: they live in the
//! [`DeclMap`] keyed by native identity and are referenced with
//! [`TypeDesc::Declared`].

use std::collections::BTreeMap;

use cbridge_decl::{NumClass, TypeId};

use crate::func::Function;
use crate::naming::NameTable;

/// How a value crosses the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// `(T)(x)`
    Cast,
    /// `(T)(unsafe.Pointer(x))`
    PointerReinterpret,
    /// `*(*T)(unsafe.Pointer(&x))`; needs a size assertion.
    ValueReinterpret,
    /// Variant-specific code (strings, slices, booleans, ...).
    Special,
}

/// A managed callable type: `func(inputs) (outputs)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub inputs: Vec<TypeDesc>,
    pub outputs: Vec<TypeDesc>,
}

impl Signature {
    pub fn managed_name(&self, map: &DeclMap) -> String {
        let list = |tys: &[TypeDesc]| {
            tys.iter()
                .map(|t| t.managed_name(map))
                .collect::<Vec<_>>()
                .join(", ")
        };
        match self.outputs.len() {
            0 => format!("func({})", list(&self.inputs)),
            1 => format!("func({}) {}", list(&self.inputs), list(&self.outputs)),
            _ => format!("func({}) ({})", list(&self.inputs), list(&self.outputs)),
        }
    }
}

/// Managed representation of a native type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDesc {
    /// No value; only valid as a return type or pointee.
    Void,
    Number {
        managed: String,
        native: String,
        size: usize,
    },
    /// A native integer type carrying a 0/1 truth value.
    Boolean {
        native: String,
        size: usize,
    },
    Array {
        elem: Box<TypeDesc>,
        len: usize,
    },
    /// Pointer to the first element of a caller-owned array.
    Slice(Box<TypeDesc>),
    /// Pointer to an array of element arrays.
    SliceOfSlice(Box<TypeDesc>),
    /// NUL-terminated string.
    String,
    /// Array of NUL-terminated strings.
    StringArray,
    Pointer(Box<TypeDesc>),
    /// Output parameter, address passed in.
    ReturnPointer(Box<TypeDesc>),
    /// Output parameter seen from inside a trampoline.
    CallbackReturnPointer(Box<TypeDesc>),
    /// A managed callable carried through a user-data slot.
    FunctionSignature(Box<Signature>),
    /// A native function type used as a value.
    OpaqueFunction,
    Declared(TypeId),
}

impl TypeDesc {
    pub fn is_void(&self) -> bool {
        matches!(self, TypeDesc::Void)
    }

    /// Go spelling on the managed side.
    pub fn managed_name(&self, map: &DeclMap) -> String {
        match self {
            TypeDesc::Void => String::new(),
            TypeDesc::Number { managed, .. } => managed.clone(),
            TypeDesc::Boolean { .. } => "bool".to_string(),
            TypeDesc::Array { elem, len } => format!("[{len}]{}", elem.managed_name(map)),
            TypeDesc::Slice(elem) => format!("[]{}", elem.managed_name(map)),
            TypeDesc::SliceOfSlice(elem) => format!("[][]{}", elem.managed_name(map)),
            TypeDesc::String => "string".to_string(),
            TypeDesc::StringArray => "[]string".to_string(),
            TypeDesc::Pointer(pointee) => match pointee.as_ref() {
                TypeDesc::Void => "unsafe.Pointer".to_string(),
                TypeDesc::OpaqueFunction => "uintptr".to_string(),
                TypeDesc::Declared(id) if !map.is_named(id) => "uintptr".to_string(),
                other => format!("*{}", other.managed_name(map)),
            },
            TypeDesc::ReturnPointer(pointee) | TypeDesc::CallbackReturnPointer(pointee) => {
                pointee.managed_name(map)
            }
            TypeDesc::FunctionSignature(sig) => sig.managed_name(map),
            TypeDesc::OpaqueFunction => "[0]byte".to_string(),
            TypeDesc::Declared(id) => map.managed_name(id),
        }
    }

    /// cgo spelling on the native side.
    pub fn native_name(&self, map: &DeclMap) -> String {
        match self {
            TypeDesc::Void => String::new(),
            TypeDesc::Number { native, .. } | TypeDesc::Boolean { native, .. } => native.clone(),
            TypeDesc::Array { elem, len } => format!("[{len}]{}", elem.native_name(map)),
            TypeDesc::Slice(elem) => format!("*{}", elem.native_name(map)),
            TypeDesc::SliceOfSlice(elem) => format!("**{}", elem.native_name(map)),
            TypeDesc::String => "*C.char".to_string(),
            TypeDesc::StringArray => "**C.char".to_string(),
            TypeDesc::Pointer(pointee)
            | TypeDesc::ReturnPointer(pointee)
            | TypeDesc::CallbackReturnPointer(pointee) => match pointee.as_ref() {
                TypeDesc::Void => "unsafe.Pointer".to_string(),
                TypeDesc::OpaqueFunction => "*[0]byte".to_string(),
                other => format!("*{}", other.native_name(map)),
            },
            TypeDesc::FunctionSignature(_) => "unsafe.Pointer".to_string(),
            TypeDesc::OpaqueFunction => "[0]byte".to_string(),
            TypeDesc::Declared(id) => map.get(id).map(Declarable::native_repr).unwrap_or_default(),
        }
    }

    /// Byte size on the native side.
    pub fn size(&self, map: &DeclMap, pointer_width: usize) -> usize {
        match self {
            TypeDesc::Void | TypeDesc::OpaqueFunction => 0,
            TypeDesc::Number { size, .. } | TypeDesc::Boolean { size, .. } => *size,
            TypeDesc::Array { elem, len } => elem.size(map, pointer_width) * len,
            TypeDesc::Declared(id) => map.get(id).map(|d| d.size).unwrap_or(0),
            _ => pointer_width,
        }
    }

    /// Conversion strategy used in both directions.
    pub fn strategy(&self, map: &DeclMap) -> Strategy {
        match self {
            TypeDesc::Number { .. } => Strategy::Cast,
            TypeDesc::Array { .. } | TypeDesc::OpaqueFunction => Strategy::ValueReinterpret,
            TypeDesc::Pointer(pointee) if pointee.is_void() => Strategy::Cast,
            TypeDesc::Pointer(_) => Strategy::PointerReinterpret,
            TypeDesc::Declared(id) => match map.get(id).map(|d| &d.kind) {
                Some(DeclKind::Enum { .. }) => Strategy::Cast,
                Some(DeclKind::Alias { conv, .. }) => *conv,
                _ => Strategy::ValueReinterpret,
            },
            _ => Strategy::Special,
        }
    }

    /// The pointee of a plain pointer.
    pub fn pointee(&self) -> Option<&TypeDesc> {
        match self {
            TypeDesc::Pointer(p) => Some(p),
            _ => None,
        }
    }
}

/// A struct or union field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDesc {
    pub native_name: String,
    pub managed_name: String,
    pub ty: TypeDesc,
    pub size: usize,
}

/// One enumerator.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumConst {
    /// `"<enum id>::<native name>"`
    pub id: String,
    pub native_name: String,
    pub managed_name: String,
    pub value: i64,
}

/// Shape of a declarable type.
#[derive(Debug, Clone)]
pub enum DeclKind {
    /// Fields are `None` until the fixed-point pass populates them.
    Struct { fields: Option<Vec<FieldDesc>> },
    Union { fields: Option<Vec<FieldDesc>> },
    Enum { base: String, values: Vec<EnumConst> },
    /// A typedef: its literal type, resolved root and conversion.
    Alias {
        literal: TypeDesc,
        root: TypeId,
        conv: Strategy,
    },
}

/// A type that may be declared in the generated package.
#[derive(Debug, Clone)]
pub struct Declarable {
    pub id: TypeId,
    pub native_name: String,
    pub file: String,
    /// Empty until named; empty after naming means "not exported".
    pub managed_name: String,
    pub size: usize,
    pub kind: DeclKind,
    pub methods: Vec<Function>,
    /// Fields and methods share this scope.
    pub members: NameTable,
    /// Declared in its own right rather than only as a typedef literal.
    pub standalone: bool,
    /// Alias that took over this type's identity.
    pub superseded_by: Option<TypeId>,
    /// Identity this alias took over.
    pub assumed_identity: Option<TypeId>,
}

impl Declarable {
    pub fn new(id: &str, native_name: &str, file: &str, size: usize, kind: DeclKind) -> Self {
        Self {
            id: id.to_string(),
            native_name: native_name.to_string(),
            file: file.to_string(),
            managed_name: String::new(),
            size,
            kind,
            methods: Vec::new(),
            members: NameTable::new(),
            standalone: false,
            superseded_by: None,
            assumed_identity: None,
        }
    }

    /// Identity used for package-scope naming.
    pub fn naming_key(&self) -> &str {
        self.assumed_identity.as_deref().unwrap_or(&self.id)
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            DeclKind::Struct { .. } => "struct",
            DeclKind::Union { .. } => "union",
            DeclKind::Enum { .. } => "enum",
            DeclKind::Alias { .. } => "alias",
        }
    }

    /// Whether this declaration gets its own `type` in the output.
    pub fn is_emitted(&self) -> bool {
        self.standalone
            && !self.managed_name.is_empty()
            && !self.managed_name.contains('.')
            && self.superseded_by.is_none()
    }

    /// Whether struct/union fields still need populating.
    pub fn fields_pending(&self) -> bool {
        matches!(
            self.kind,
            DeclKind::Struct { fields: None } | DeclKind::Union { fields: None }
        )
    }

    pub fn fields(&self) -> &[FieldDesc] {
        match &self.kind {
            DeclKind::Struct { fields: Some(f) } | DeclKind::Union { fields: Some(f) } => f,
            _ => &[],
        }
    }

    /// cgo spelling of the native type.
    pub fn native_repr(&self) -> String {
        let name = &self.native_name;
        match &self.kind {
            DeclKind::Struct { .. } if name == "__va_list_tag" => {
                "_Ctype_struct___va_list_tag".to_string()
            }
            DeclKind::Struct { .. } | DeclKind::Union { .. } if name.is_empty() => {
                format!("[{}]byte", self.size)
            }
            DeclKind::Struct { .. } => format!("C.struct_{name}"),
            DeclKind::Union { .. } => format!("C.union_{name}"),
            DeclKind::Enum { .. } if name.is_empty() => native_int(self.size).to_string(),
            DeclKind::Enum { .. } => format!("C.enum_{name}"),
            DeclKind::Alias { .. } => format!("C.{name}"),
        }
    }

    /// Inline Go definition (the part after `type Name`).
    pub fn spec(&self, map: &DeclMap) -> String {
        match &self.kind {
            DeclKind::Struct { .. } => {
                let fields = self.fields();
                if fields.is_empty() {
                    return "struct{}".to_string();
                }
                let mut out = String::from("struct {\n");
                for f in fields {
                    out.push_str(&format!("\t{} {}\n", f.managed_name, f.ty.managed_name(map)));
                }
                out.push('}');
                out
            }
            DeclKind::Union { .. } => format!("[{}]byte", self.size),
            DeclKind::Enum { base, .. } => base.clone(),
            DeclKind::Alias { literal, .. } => match literal {
                TypeDesc::Declared(lid) => match map.get(lid) {
                    Some(l) if l.is_emitted() => l.managed_name.clone(),
                    Some(l) => l.spec(map),
                    None => String::new(),
                },
                other => other.managed_name(map),
            },
        }
    }

    /// Enumerators carried by this declaration, directly or through an
    /// enum-typed alias literal.
    pub fn enum_values<'a>(&'a self, map: &'a DeclMap) -> &'a [EnumConst] {
        match &self.kind {
            DeclKind::Enum { values, .. } => values,
            DeclKind::Alias {
                literal: TypeDesc::Declared(lid),
                ..
            } => map.get(lid).map(|l| l.enum_values(map)).unwrap_or(&[]),
            _ => &[],
        }
    }
}

/// Identity → declarable type.
#[derive(Debug, Clone, Default)]
pub struct DeclMap {
    entries: BTreeMap<TypeId, Declarable>,
}

impl DeclMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&Declarable> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Declarable> {
        self.entries.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Insert unless present. Returns whether it was inserted.
    pub fn insert(&mut self, decl: Declarable) -> bool {
        if self.entries.contains_key(&decl.id) {
            return false;
        }
        self.entries.insert(decl.id.clone(), decl);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> Vec<TypeId> {
        self.entries.keys().cloned().collect()
    }

    pub fn values(&self) -> impl Iterator<Item = &Declarable> {
        self.entries.values()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// The entry a reference to `id` actually names, following supersession
    /// to a named alias.
    pub fn target(&self, id: &str) -> Option<&Declarable> {
        let d = self.entries.get(id)?;
        match d.superseded_by.as_ref().and_then(|a| self.entries.get(a)) {
            Some(alias) if !alias.managed_name.is_empty() => Some(alias),
            _ => Some(d),
        }
    }

    /// Whether a reference to `id` has a managed name.
    pub fn is_named(&self, id: &str) -> bool {
        self.target(id).is_some_and(|d| !d.managed_name.is_empty())
    }

    /// Managed spelling of a reference to `id`, with the unnamed fallbacks.
    pub fn managed_name(&self, id: &str) -> String {
        let Some(d) = self.target(id) else {
            return String::new();
        };
        if !d.managed_name.is_empty() {
            return d.managed_name.clone();
        }
        match &d.kind {
            DeclKind::Enum { base, .. } => base.clone(),
            DeclKind::Alias { literal, conv, .. } => match conv {
                Strategy::Cast => literal.managed_name(self),
                Strategy::PointerReinterpret => "uintptr".to_string(),
                _ => format!("[{}]byte", d.size),
            },
            _ => format!("[{}]byte", d.size),
        }
    }
}

/// Go number type for a (class, bit width) pair.
pub fn managed_number(class: NumClass, bits: usize) -> Option<&'static str> {
    Some(match (class, bits) {
        (NumClass::Signed, 8) => "int8",
        (NumClass::Unsigned, 8) => "byte",
        (NumClass::Signed, 16) => "int16",
        (NumClass::Unsigned, 16) => "uint16",
        (NumClass::Signed, 32) => "int32",
        (NumClass::Unsigned, 32) => "uint32",
        (NumClass::Signed, 64) => "int64",
        (NumClass::Unsigned, 64) => "uint64",
        (NumClass::Float, 32) => "float32",
        (NumClass::Float, 64) => "float64",
        (NumClass::Complex, 64) => "complex64",
        (NumClass::Complex, 128) => "complex128",
        _ => return None,
    })
}

/// Native integer of the given byte size, for anonymous enums.
fn native_int(size: usize) -> &'static str {
    match size {
        1 => "C.schar",
        2 => "C.short",
        8 => "C.longlong",
        _ => "C.int",
    }
}

/// Render enumerator values: non-negative values as upper-case hex padded
/// to the widest non-negative value, negative values in decimal.
pub fn enum_literals(values: &[i64]) -> Vec<String> {
    let width = values
        .iter()
        .filter(|v| **v >= 0)
        .map(|v| format!("{v:X}").len())
        .max()
        .unwrap_or(1);
    values
        .iter()
        .map(|v| {
            if *v < 0 {
                v.to_string()
            } else {
                format!("0x{v:0width$X}")
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(map: &mut DeclMap) {
        let int = TypeDesc::Number {
            managed: "int32".into(),
            native: "C.int".into(),
            size: 4,
        };
        let fields = vec![
            FieldDesc {
                native_name: "x".into(),
                managed_name: "X".into(),
                ty: int.clone(),
                size: 4,
            },
            FieldDesc {
                native_name: "y".into(),
                managed_name: "Y".into(),
                ty: int,
                size: 4,
            },
        ];
        let mut d = Declarable::new(
            "s1",
            "point_t",
            "f1",
            8,
            DeclKind::Struct {
                fields: Some(fields),
            },
        );
        d.standalone = true;
        map.insert(d);
    }

    #[test]
    fn hex_literals_are_padded() {
        assert_eq!(enum_literals(&[0, 1, 0x100]), vec!["0x000", "0x001", "0x100"]);
        assert_eq!(enum_literals(&[-1, 15]), vec!["-1", "0xF"]);
        assert_eq!(enum_literals(&[-2, -1]), vec!["-2", "-1"]);
    }

    #[test]
    fn number_table() {
        assert_eq!(managed_number(NumClass::Unsigned, 8), Some("byte"));
        assert_eq!(managed_number(NumClass::Signed, 8), Some("int8"));
        assert_eq!(managed_number(NumClass::Complex, 128), Some("complex128"));
        assert_eq!(managed_number(NumClass::Float, 128), None);
    }

    #[test]
    fn unnamed_struct_falls_back_to_bytes() {
        let mut map = DeclMap::new();
        point(&mut map);
        let ty = TypeDesc::Declared("s1".into());
        assert_eq!(ty.managed_name(&map), "[8]byte");
        assert_eq!(ty.native_name(&map), "C.struct_point_t");
        assert_eq!(TypeDesc::Pointer(Box::new(ty)).managed_name(&map), "uintptr");
    }

    #[test]
    fn named_struct_spelling() {
        let mut map = DeclMap::new();
        point(&mut map);
        map.get_mut("s1").unwrap().managed_name = "Point".into();
        let ty = TypeDesc::Declared("s1".into());
        assert_eq!(ty.managed_name(&map), "Point");
        assert_eq!(ty.strategy(&map), Strategy::ValueReinterpret);
        let ptr = TypeDesc::Pointer(Box::new(ty));
        assert_eq!(ptr.managed_name(&map), "*Point");
        assert_eq!(ptr.native_name(&map), "*C.struct_point_t");
        assert_eq!(ptr.strategy(&map), Strategy::PointerReinterpret);
        let spec = map.get("s1").unwrap().spec(&map);
        assert_eq!(spec, "struct {\n\tX int32\n\tY int32\n}");
    }

    #[test]
    fn superseded_struct_takes_alias_name() {
        let mut map = DeclMap::new();
        point(&mut map);
        let mut alias = Declarable::new(
            "td1",
            "point_t",
            "f1",
            8,
            DeclKind::Alias {
                literal: TypeDesc::Declared("s1".into()),
                root: "s1".into(),
                conv: Strategy::ValueReinterpret,
            },
        );
        alias.standalone = true;
        alias.managed_name = "Point".into();
        alias.assumed_identity = Some("s1".into());
        map.insert(alias);
        map.get_mut("s1").unwrap().superseded_by = Some("td1".into());
        assert_eq!(TypeDesc::Declared("s1".into()).managed_name(&map), "Point");
        let alias = map.get("td1").unwrap();
        assert!(alias.is_emitted());
        assert_eq!(alias.naming_key(), "s1");
        assert!(alias.spec(&map).starts_with("struct {"));
    }

    #[test]
    fn void_pointer_and_function_pointer() {
        let map = DeclMap::new();
        let vp = TypeDesc::Pointer(Box::new(TypeDesc::Void));
        assert_eq!(vp.managed_name(&map), "unsafe.Pointer");
        assert_eq!(vp.native_name(&map), "unsafe.Pointer");
        let fp = TypeDesc::Pointer(Box::new(TypeDesc::OpaqueFunction));
        assert_eq!(fp.managed_name(&map), "uintptr");
        assert_eq!(fp.native_name(&map), "*[0]byte");
        assert_eq!(fp.size(&map, 8), 8);
    }

    #[test]
    fn signature_spelling() {
        let map = DeclMap::new();
        let int = TypeDesc::Number {
            managed: "int32".into(),
            native: "C.int".into(),
            size: 4,
        };
        let sig = Signature {
            inputs: vec![int.clone(), TypeDesc::String],
            outputs: vec![int.clone()],
        };
        assert_eq!(sig.managed_name(&map), "func(int32, string) int32");
        let sig = Signature {
            inputs: vec![],
            outputs: vec![int.clone(), int],
        };
        assert_eq!(sig.managed_name(&map), "func() (int32, int32)");
    }
}
