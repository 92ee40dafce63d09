//! Function, method and global variable lowering.

use cbridge_decl::{Argument, NativeFunction, NativeVariable, PointerKind, TypeId};

use crate::conv::Assign;
use crate::error::Result;
use crate::lower::Lowerer;
use crate::naming::lower_name;
use crate::types::{DeclKind, DeclMap, Declarable, Strategy, TypeDesc};

/// A parameter on the managed side.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: TypeDesc,
    /// Output parameters are returned instead of passed in.
    pub is_output: bool,
}

/// One argument of the native call.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeArg {
    /// Local holding the converted value (`_x`).
    pub native_name: String,
    /// Managed expression converted into it.
    pub managed_expr: String,
    pub ty: TypeDesc,
}

/// A lowered native function: package-level function or method.
#[derive(Debug, Clone)]
pub struct Function {
    pub id: String,
    pub native_name: String,
    pub file: String,
    pub managed_name: String,
    pub receiver: Option<Param>,
    pub params: Vec<Param>,
    pub args: Vec<NativeArg>,
    /// Named result `ret`, converted from `_ret`.
    pub ret: Option<Param>,
}

impl Function {
    pub fn inputs(&self) -> impl Iterator<Item = &Param> {
        self.params.iter().filter(|p| !p.is_output)
    }

    /// Output parameters followed by the return value.
    pub fn outputs(&self) -> Vec<&Param> {
        self.params
            .iter()
            .filter(|p| p.is_output)
            .chain(self.ret.as_ref())
            .collect()
    }

    /// The type this function can become a method of: its first parameter
    /// is a pointer to a declared, unqualified, named type.
    pub fn receiver_type(&self, map: &DeclMap) -> Option<TypeId> {
        let first = self.params.first().filter(|p| !p.is_output)?;
        let TypeDesc::Declared(id) = first.ty.pointee()? else {
            return None;
        };
        let spelled = first.ty.managed_name(map);
        if spelled.contains('.') || spelled.contains('[') || spelled == "uintptr" {
            return None;
        }
        let target = map.target(id)?;
        match target.kind {
            // Go forbids methods on named pointer types.
            DeclKind::Alias {
                conv: Strategy::PointerReinterpret,
                ..
            } => None,
            _ => Some(target.id.clone()),
        }
    }

    /// Turn the first parameter into the receiver.
    pub fn promote(&mut self) {
        if !self.params.is_empty() {
            self.receiver = Some(self.params.remove(0));
        }
    }
}

/// Lower native arguments into managed parameters and native call arguments.
///
/// Every argument yields exactly one of each, in order.
pub fn lower_arguments(
    l: &mut Lowerer<'_>,
    arguments: &[Argument],
    context: &str,
) -> Result<(Vec<Param>, Vec<NativeArg>)> {
    let mut params = Vec::with_capacity(arguments.len());
    let mut args = Vec::with_capacity(arguments.len());
    for (i, a) in arguments.iter().enumerate() {
        let name = if a.name.is_empty() {
            format!("arg{i}")
        } else {
            lower_name(&a.name)
        };
        let ty = l.resolve(&a.ty, a.ptr_kind)?;
        if ty.is_void() {
            return Err(crate::error::BridgeError::VoidValue {
                context: format!("argument '{name}' of {context}"),
            });
        }
        args.push(NativeArg {
            native_name: format!("_{name}"),
            managed_expr: name.clone(),
            ty: ty.clone(),
        });
        params.push(Param {
            name,
            ty,
            is_output: a.ptr_kind == PointerKind::Return,
        });
    }
    Ok((params, args))
}

/// Result parameter for a native return type; `ret` unless a parameter
/// already uses that name.
pub fn return_param(ty: Option<TypeDesc>, params: &[Param]) -> Option<Param> {
    let ty = ty?;
    let mut name = "ret".to_string();
    while params.iter().any(|p| p.name == name) {
        name.push('_');
    }
    Some(Param {
        name,
        ty,
        is_output: true,
    })
}

/// Lower a native function. Names are assigned later.
pub fn lower_function(l: &mut Lowerer<'_>, f: &NativeFunction) -> Result<Function> {
    let context = format!("function '{}'", f.name);
    let (params, args) = lower_arguments(l, &f.arguments, &context)?;
    let ret = return_param(l.resolve_return(&f.returns)?, &params);
    Ok(Function {
        id: f.id.clone(),
        native_name: f.name.clone(),
        file: f.file.clone(),
        managed_name: String::new(),
        receiver: None,
        params,
        args,
        ret,
    })
}

/// A global variable mirrored as a package-level Go variable.
#[derive(Debug, Clone)]
pub struct Variable {
    pub id: String,
    pub native_name: String,
    pub file: String,
    pub managed_name: String,
    pub ty: TypeDesc,
}

impl Variable {
    /// `Name = <native symbol converted>`, when that is a single statement.
    pub fn initializer(&self, map: &DeclMap) -> Option<String> {
        let native = format!("C.{}", self.native_name);
        let lines = self.ty.to_managed(map, Assign::Set, &self.managed_name, &native);
        match lines.as_slice() {
            [line] if !line.starts_with("//") => Some(line.clone()),
            _ => None,
        }
    }
}

pub fn lower_variable(l: &mut Lowerer<'_>, v: &NativeVariable) -> Result<Variable> {
    let ty = l.value(&v.ty, &format!("variable '{}'", v.name))?;
    Ok(Variable {
        id: v.id.clone(),
        native_name: v.name.clone(),
        file: v.file.clone(),
        managed_name: String::new(),
        ty,
    })
}

/// Register a method on its type at most once per native identity.
/// Returns the bound method name.
pub fn add_method(decl: &mut Declarable, mut method: Function, candidate: &str) -> Option<String> {
    if decl.methods.iter().any(|m| m.id == method.id) {
        return None;
    }
    let name = decl.members.resolve(&method.id, candidate);
    method.managed_name = name.clone();
    decl.methods.push(method);
    Some(name)
}

/// Drop the owning type's name from method names where the shorter name is
/// still an exported identifier and unique among the type's members.
pub fn optimize_method_names(decl: &mut Declarable) {
    let type_name = decl.managed_name.clone();
    if type_name.is_empty() {
        return;
    }
    for i in 0..decl.methods.len() {
        let current = decl.methods[i].managed_name.clone();
        let shorter = current
            .strip_prefix(type_name.as_str())
            .or_else(|| current.strip_suffix(type_name.as_str()));
        let Some(shorter) = shorter else { continue };
        let exported = shorter.chars().next().is_some_and(|c| c.is_ascii_uppercase());
        if !exported || decl.members.contains_name(shorter) {
            continue;
        }
        let id = decl.methods[i].id.clone();
        if decl.members.rename(&id, shorter) {
            log::debug!("method {type_name}.{current} shortened to {shorter}");
            decl.methods[i].managed_name = shorter.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::LowerRules;
    use cbridge_decl::Declarations;

    const DOC: &str = r#"{
        "files": [{"id": "f1", "name": "point.h"}],
        "types": {
            "int": {"kind": "fundamental", "name": "int", "size": 4},
            "double": {"kind": "fundamental", "name": "double", "size": 8},
            "void": {"kind": "fundamental", "name": "void"},
            "point": {"kind": "struct", "name": "point", "file": "f1", "size": 8,
                "fields": [{"name": "x", "type": "int"}, {"name": "y", "type": "int"}]},
            "pp": {"kind": "pointer", "pointee": "point", "size": 8},
            "dp": {"kind": "pointer", "pointee": "double", "size": 8},
            "ip": {"kind": "pointer", "pointee": "int", "size": 8}
        },
        "functions": [
            {"id": "f_norm", "name": "point_norm", "file": "f1", "returns": "double",
             "arguments": [{"name": "p", "type": "pp"}]},
            {"id": "f_split", "name": "point_split", "file": "f1", "returns": "void",
             "arguments": [{"name": "p", "type": "pp"},
                           {"name": "len", "type": "dp", "ptr_kind": "return"},
                           {"type": "int"}]},
            {"id": "f_sum", "name": "sum", "file": "f1", "returns": "int",
             "arguments": [{"name": "xs", "type": "ip", "ptr_kind": "array"},
                           {"name": "n", "type": "int"}]}
        ]
    }"#;

    fn lower(id: &str) -> (Function, DeclMap) {
        let decls = Declarations::parse(DOC).unwrap();
        let rules = LowerRules {
            pointer_width: 8,
            ..LowerRules::default()
        };
        let mut map = DeclMap::new();
        let f = {
            let mut l = Lowerer::new(&decls, &mut map, &rules);
            let native = decls.functions.iter().find(|f| f.id == id).unwrap();
            lower_function(&mut l, native).unwrap()
        };
        (f, map)
    }

    #[test]
    fn output_pointer_becomes_result() {
        let (f, _) = lower("f_split");
        assert_eq!(f.inputs().count(), 2);
        let outs = f.outputs();
        assert_eq!(outs.len(), 1);
        assert_eq!(outs[0].name, "len_");
        assert!(f.ret.is_none());
        assert_eq!(f.args.len(), 3);
        assert_eq!(f.args[2].native_name, "_arg2");
    }

    #[test]
    fn return_value_is_named_ret() {
        let (f, _) = lower("f_sum");
        let ret = f.ret.as_ref().unwrap();
        assert_eq!(ret.name, "ret");
        assert_eq!(f.outputs().len(), 1);
    }

    #[test]
    fn receiver_requires_named_type() {
        let (f, mut map) = lower("f_norm");
        assert_eq!(f.receiver_type(&map), None);
        map.get_mut("point").unwrap().managed_name = "Point".into();
        assert_eq!(f.receiver_type(&map), Some("point".to_string()));
    }

    #[test]
    fn slice_parameter_is_not_a_receiver() {
        let (f, map) = lower("f_sum");
        assert_eq!(f.receiver_type(&map), None);
    }

    #[test]
    fn promote_drops_first_parameter() {
        let (mut f, _) = lower("f_norm");
        f.promote();
        assert!(f.params.is_empty());
        assert_eq!(f.receiver.as_ref().unwrap().name, "p");
        assert_eq!(f.args.len(), 1);
    }

    #[test]
    fn method_names_are_shortened() {
        let (norm, mut map) = lower("f_norm");
        let (split, _) = lower("f_split");
        let decl = map.get_mut("point").unwrap();
        decl.managed_name = "Point".into();
        decl.members.resolve("point.0", "X");
        assert_eq!(add_method(decl, norm.clone(), "PointNorm").as_deref(), Some("PointNorm"));
        assert_eq!(add_method(decl, norm, "PointNorm"), None);
        add_method(decl, split, "X");
        optimize_method_names(decl);
        let names: Vec<_> = decl.methods.iter().map(|m| m.managed_name.as_str()).collect();
        assert_eq!(names, vec!["Norm", "X_"]);
    }
}
