//! Callback detection and trampoline synthesis.
//!
//! A native function taking a function pointer plus a `void *` user-data
//! argument is exposed with a Go `func` parameter instead. The Go callable
//! travels through the user-data slot; one exported trampoline per
//! callback type unpacks it and calls it.

use cbridge_decl::{Declarations, NativeFunction, TypeId};

use crate::error::{BridgeError, Result};
use crate::func::{lower_arguments, return_param, Function, NativeArg, Param};
use crate::lower::Lowerer;
use crate::naming::{lower_camel, NameFilter};
use crate::types::{Signature, TypeDesc};

/// A function-pointer/user-data argument pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackSite {
    pub arg_index: usize,
    pub data_index: usize,
    /// Index of the user-data parameter in the callback's own signature.
    pub callback_data_index: usize,
    /// Function type the pointer points at.
    pub fn_type: TypeId,
    /// Name of the typedef the pointer was declared through, if any.
    pub typedef_name: Option<String>,
}

/// Find the callback pair of a native function, if it has one.
///
/// An explicit hint in the declaration document wins over the
/// function-pointer-then-`void *` pattern.
pub fn detect(decls: &Declarations, f: &NativeFunction) -> Result<Option<CallbackSite>> {
    if let Some(hint) = &f.callback {
        let invalid = |detail: String| BridgeError::InvalidCallback {
            function: f.name.clone(),
            detail,
        };
        let arity = f.arguments.len();
        if hint.data_index >= arity || hint.data_index == hint.arg_index {
            return Err(invalid(format!("bad user-data index {}", hint.data_index)));
        }
        let arg = f
            .arguments
            .get(hint.arg_index)
            .ok_or_else(|| invalid(format!("no argument {}", hint.arg_index)))?;
        let (fn_type, typedef_name) = decls
            .function_pointer(&arg.ty)?
            .ok_or_else(|| invalid(format!("argument {} is not a function pointer", hint.arg_index)))?;
        return Ok(Some(CallbackSite {
            arg_index: hint.arg_index,
            data_index: hint.data_index,
            callback_data_index: hint.callback_data_index,
            fn_type,
            typedef_name,
        }));
    }

    for (i, pair) in f.arguments.windows(2).enumerate() {
        let Some((fn_type, typedef_name)) = decls.function_pointer(&pair[0].ty)? else {
            continue;
        };
        if !decls.is_void_pointer(&pair[1].ty)? {
            continue;
        }
        let ft = decls.function_type(&fn_type)?;
        let mut slot = None;
        for (j, a) in ft.arguments.iter().enumerate() {
            if decls.is_void_pointer(&a.ty)? {
                slot = Some(j);
                break;
            }
        }
        if let Some(j) = slot {
            return Ok(Some(CallbackSite {
                arg_index: i,
                data_index: i + 1,
                callback_data_index: j,
                fn_type,
                typedef_name,
            }));
        }
    }
    Ok(None)
}

/// Base name of the trampoline for a callback site.
pub fn trampoline_name(filter: &NameFilter, site: &CallbackSite, function: &str) -> String {
    let base = site.typedef_name.as_deref().unwrap_or(function);
    format!("{}Callback", lower_camel(&filter.upper_name(base)))
}

/// Structural identity of a callback's native signature: C spelling and
/// pointer kind of the return and every parameter, plus the user-data slot.
/// Callbacks with equal keys share one trampoline.
pub fn signature_key(decls: &Declarations, site: &CallbackSite) -> Result<String> {
    let ft = decls.function_type(&site.fn_type)?;
    let mut params = Vec::with_capacity(ft.arguments.len());
    for a in &ft.arguments {
        params.push(format!("{}:{:?}", decls.c_spelling(&a.ty)?, a.ptr_kind));
    }
    Ok(format!(
        "{}({})@{}",
        decls.c_spelling(&ft.returns)?,
        params.join(","),
        site.callback_data_index
    ))
}

/// An exported Go function matching a native callback signature.
#[derive(Debug, Clone)]
pub struct Trampoline {
    pub name: String,
    /// Signature identity, see [`signature_key`].
    pub key: String,
    pub fn_type: TypeId,
    /// One per native callback parameter; the data slot is typed as the
    /// managed callable.
    pub params: Vec<Param>,
    pub args: Vec<NativeArg>,
    pub ret: Option<Param>,
    pub data_index: usize,
}

impl Trampoline {
    /// Exported Go entry point.
    pub fn go_name(&self) -> String {
        format!("{}_Go", self.name)
    }

    /// C stub forwarding to the Go entry point.
    pub fn c_name(&self) -> String {
        format!("{}_C", self.name)
    }

    /// Managed callable type the user passes in.
    pub fn signature(&self) -> Signature {
        match &self.params[self.data_index].ty {
            TypeDesc::FunctionSignature(sig) => sig.as_ref().clone(),
            _ => build_signature(&self.params, self.data_index, self.ret.as_ref()),
        }
    }

    pub fn data_param(&self) -> &Param {
        &self.params[self.data_index]
    }

    /// Parameters passed to the managed callable.
    pub fn call_inputs(&self) -> impl Iterator<Item = &Param> {
        self.params
            .iter()
            .enumerate()
            .filter(move |(i, p)| *i != self.data_index && !p.is_output)
            .map(|(_, p)| p)
    }

    /// Values returned by the managed callable.
    pub fn call_outputs(&self) -> Vec<&Param> {
        self.params
            .iter()
            .enumerate()
            .filter(|(i, p)| *i != self.data_index && p.is_output)
            .map(|(_, p)| p)
            .chain(self.ret.as_ref())
            .collect()
    }
}

fn build_signature(params: &[Param], data_index: usize, ret: Option<&Param>) -> Signature {
    let rest = || params.iter().enumerate().filter(|(i, _)| *i != data_index);
    Signature {
        inputs: rest()
            .filter(|(_, p)| !p.is_output)
            .map(|(_, p)| p.ty.clone())
            .collect(),
        outputs: rest()
            .filter(|(_, p)| p.is_output)
            .map(|(_, p)| p.ty.clone())
            .chain(ret.map(|r| r.ty.clone()))
            .collect(),
    }
}

/// Lower the callback's function type into a trampoline.
pub fn build_trampoline(
    l: &mut Lowerer<'_>,
    decls: &Declarations,
    site: &CallbackSite,
    name: String,
) -> Result<Trampoline> {
    let ft = decls.function_type(&site.fn_type)?;
    let cdi = site.callback_data_index;
    let slot_ok = match ft.arguments.get(cdi) {
        Some(a) => decls.is_void_pointer(&a.ty)?,
        None => false,
    };
    if !slot_ok {
        return Err(BridgeError::InvalidCallback {
            function: name,
            detail: format!("callback parameter {cdi} is not a void pointer"),
        });
    }

    let (mut params, mut args) = lower_arguments(l, &ft.arguments, &format!("callback '{name}'"))?;
    for p in params.iter_mut() {
        if let TypeDesc::ReturnPointer(inner) = &p.ty {
            p.ty = TypeDesc::CallbackReturnPointer(inner.clone());
        }
    }
    for a in args.iter_mut() {
        if let TypeDesc::ReturnPointer(inner) = &a.ty {
            a.ty = TypeDesc::CallbackReturnPointer(inner.clone());
        }
    }
    let ret = return_param(l.resolve_return(&ft.returns)?, &params);

    let sig = TypeDesc::FunctionSignature(Box::new(build_signature(&params, cdi, ret.as_ref())));
    params[cdi].ty = sig.clone();
    params[cdi].is_output = false;
    args[cdi].ty = sig;

    let key = signature_key(decls, site)?;
    log::debug!("trampoline {name} for callback signature {key}");
    Ok(Trampoline {
        name,
        key,
        fn_type: site.fn_type.clone(),
        params,
        args,
        ret,
        data_index: cdi,
    })
}

/// Rewrite a lowered function so that its callback pair is driven by a
/// managed callable: the function pointer becomes the trampoline's C stub
/// and the user data becomes the address of the callable.
pub fn rewrite(function: &mut Function, site: &CallbackSite, trampoline: &Trampoline) {
    let sig = TypeDesc::FunctionSignature(Box::new(trampoline.signature()));
    let callable = function.params[site.arg_index].name.clone();

    function.params[site.arg_index] = Param {
        name: callable.clone(),
        ty: sig.clone(),
        is_output: false,
    };
    function.args[site.arg_index].managed_expr = format!("C.{}", trampoline.c_name());
    let data = &mut function.args[site.data_index];
    data.managed_expr = callable;
    data.ty = sig;
    function.params.remove(site.data_index);
}
