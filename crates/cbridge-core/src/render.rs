//! Source text for a package's bindings: the Go file, and the C stubs and
//! header that forward native callbacks into Go.

use regex::Regex;

use crate::bindings::Bindings;
use crate::callback::Trampoline;
use crate::conv::Assign;
use crate::error::Result;
use crate::func::{Function, Param};
use crate::types::{enum_literals, DeclKind, DeclMap, Declarable, FieldDesc, Strategy, TypeDesc};

const GENERATED: &str = "// Code generated by cbridge. DO NOT EDIT.";

/// Render the Go source. `header_file` is included in the cgo preamble
/// when the package has trampolines.
pub fn go_source(b: &Bindings<'_>, header_file: Option<&str>) -> String {
    let pkg = b.package;
    let map = pkg.types();
    let mut body = String::new();

    for v in &b.variables {
        if let Some(init) = v.initializer(map) {
            body.push_str(&format!("var {init}\n"));
        }
    }
    if !b.variables.is_empty() {
        body.push('\n');
    }

    for d in &b.types {
        render_type(&mut body, b, d, map, pkg.pointer_width());
    }
    render_size_checks(&mut body, &b.types, map);
    for f in &b.functions {
        render_function(&mut body, f, map);
    }
    for t in &b.trampolines {
        render_trampoline(&mut body, t, map);
    }

    let config = pkg.config();
    let mut out = format!("{GENERATED}\n\npackage {}\n\n/*\n", config.name);
    for h in &config.headers {
        out.push_str(&format!("#include <{h}>\n"));
    }
    if !b.trampolines.is_empty() {
        if let Some(h) = header_file {
            out.push_str(&format!("#include \"{h}\"\n"));
        }
    }
    out.push_str("#include <stdlib.h>\n");
    for d in &config.cgo_directives {
        out.push_str(&format!("#cgo {d}\n"));
    }
    out.push_str("*/\nimport \"C\"\n\n");

    let mut imports = Vec::new();
    if body.contains("unsafe.") {
        imports.push("\t\"unsafe\"".to_string());
    }
    for (name, path) in &pkg.included {
        if uses_package(&body, name) {
            imports.push(format!("\t{name} \"{path}\""));
        }
    }
    if !imports.is_empty() {
        out.push_str(&format!("import (\n{}\n)\n\n", imports.join("\n")));
    }

    out.push_str(body.trim_end());
    out.push('\n');
    out
}

fn uses_package(body: &str, name: &str) -> bool {
    match Regex::new(&format!(r"\b{}\.", regex::escape(name))) {
        Ok(re) => re.is_match(body),
        Err(_) => body.contains(&format!("{name}.")),
    }
}

fn render_type(out: &mut String, b: &Bindings<'_>, d: &Declarable, map: &DeclMap, pointer_width: usize) {
    let name = &d.managed_name;
    out.push_str(&format!("// {name} wraps {}.\n", d.native_repr()));
    out.push_str(&format!("type {name} {}\n\n", d.spec(map)));

    let values = d.enum_values(map);
    if values.iter().any(|v| !v.managed_name.is_empty()) {
        let literals = enum_literals(&values.iter().map(|v| v.value).collect::<Vec<_>>());
        out.push_str("const (\n");
        for (v, lit) in values.iter().zip(literals) {
            if !v.managed_name.is_empty() {
                out.push_str(&format!("\t{} {name} = {lit}\n", v.managed_name));
            }
        }
        out.push_str(")\n\n");
    }

    // Union members are views over the backing bytes.
    for f in union_fields(d, map) {
        let ty = f.ty.managed_name(map);
        if f.size <= pointer_width {
            out.push_str(&format!(
                "func (u *{name}) {}() {ty} {{\n\treturn *(*{ty})(unsafe.Pointer(u))\n}}\n\n",
                f.managed_name
            ));
        } else {
            out.push_str(&format!(
                "func (u *{name}) {}() *{ty} {{\n\treturn (*{ty})(unsafe.Pointer(u))\n}}\n\n",
                f.managed_name
            ));
        }
    }

    for m in b.methods(d) {
        render_function(out, m, map);
    }
}

fn union_fields<'a>(d: &'a Declarable, map: &'a DeclMap) -> &'a [FieldDesc] {
    match &d.kind {
        DeclKind::Union { .. } => d.fields(),
        DeclKind::Alias {
            literal: TypeDesc::Declared(lid),
            ..
        } => match map.get(lid) {
            Some(l) if matches!(l.kind, DeclKind::Union { .. }) && !l.is_emitted() => l.fields(),
            _ => &[],
        },
        _ => &[],
    }
}

/// Size assertions for every type converted by value reinterpretation.
fn render_size_checks(out: &mut String, types: &[&Declarable], map: &DeclMap) {
    let mut checks = String::new();
    for d in types {
        let ty = TypeDesc::Declared(d.id.clone());
        if ty.strategy(map) != Strategy::ValueReinterpret || d.size == 0 {
            continue;
        }
        if is_empty_struct(d, map) {
            continue;
        }
        let native = d.native_repr();
        let managed = &d.managed_name;
        checks.push_str(&format!(
            "\tif unsafe.Sizeof(*new({native})) != unsafe.Sizeof(*new({managed})) {{\n"
        ));
        checks.push_str(&format!(
            "\t\tpanic(\"cbridge: size of {managed} does not match {native}\")\n\t}}\n"
        ));
    }
    if !checks.is_empty() {
        out.push_str(&format!("func init() {{\n{checks}}}\n\n"));
    }
}

/// A struct without fields, directly or as the literal of an alias that
/// renders it inline.
fn is_empty_struct(d: &Declarable, map: &DeclMap) -> bool {
    match &d.kind {
        DeclKind::Struct { .. } => d.fields().is_empty(),
        DeclKind::Alias {
            literal: TypeDesc::Declared(lid),
            ..
        } => match map.get(lid) {
            Some(l) if !l.is_emitted() => is_empty_struct(l, map),
            _ => false,
        },
        _ => false,
    }
}

fn param_list<'p>(params: impl Iterator<Item = &'p Param>, map: &DeclMap) -> String {
    params
        .map(|p| format!("{} {}", p.name, p.ty.managed_name(map)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_function(out: &mut String, f: &Function, map: &DeclMap) {
    let receiver = match &f.receiver {
        Some(r) => format!("({} {}) ", r.name, r.ty.managed_name(map)),
        None => String::new(),
    };
    let outputs = f.outputs();
    let results = if outputs.is_empty() {
        String::new()
    } else {
        format!(" ({})", param_list(outputs.iter().copied(), map))
    };
    out.push_str(&format!(
        "func {receiver}{}({}){results} {{\n",
        f.managed_name,
        param_list(f.inputs(), map)
    ));

    for a in &f.args {
        for line in a.ty.to_native(map, Assign::Define, &a.managed_expr, &a.native_name) {
            out.push_str(&format!("\t{line}\n"));
        }
    }
    let call_args = f
        .args
        .iter()
        .map(|a| a.native_name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    match &f.ret {
        Some(r) => {
            let local = format!("_{}", r.name);
            out.push_str(&format!("\t{local} := C.{}({call_args})\n", f.native_name));
            for line in r.ty.to_managed(map, Assign::Set, &r.name, &local) {
                out.push_str(&format!("\t{line}\n"));
            }
        }
        None => out.push_str(&format!("\tC.{}({call_args})\n", f.native_name)),
    }
    if !outputs.is_empty() {
        out.push_str("\treturn\n");
    }
    out.push_str("}\n\n");
}

/// Native parameter type of an exported trampoline. Exported Go functions
/// receive every pointer except C strings as `unsafe.Pointer`.
fn trampoline_native(ty: &TypeDesc, map: &DeclMap) -> String {
    match ty {
        TypeDesc::String => "*C.char".to_string(),
        TypeDesc::Pointer(_)
        | TypeDesc::Slice(_)
        | TypeDesc::SliceOfSlice(_)
        | TypeDesc::StringArray
        | TypeDesc::ReturnPointer(_)
        | TypeDesc::CallbackReturnPointer(_)
        | TypeDesc::FunctionSignature(_) => "unsafe.Pointer".to_string(),
        other => other.native_name(map),
    }
}

fn render_trampoline(out: &mut String, t: &Trampoline, map: &DeclMap) {
    let params = t
        .args
        .iter()
        .map(|a| format!("{} {}", a.native_name, trampoline_native(&a.ty, map)))
        .collect::<Vec<_>>()
        .join(", ");
    let result = match &t.ret {
        Some(r) => format!(" (_{} {})", r.name, r.ty.native_name(map)),
        None => String::new(),
    };
    out.push_str(&format!("//export {}\n", t.go_name()));
    out.push_str(&format!("func {}({params}){result} {{\n", t.go_name()));

    let data = t.data_param();
    let data_native = &t.args[t.data_index].native_name;
    for line in data.ty.to_managed(map, Assign::Define, &data.name, data_native) {
        out.push_str(&format!("\t{line}\n"));
    }
    for (i, p) in t.params.iter().enumerate() {
        if i == t.data_index || p.is_output {
            continue;
        }
        let lines = p.ty.to_managed(map, Assign::Define, &p.name, &t.args[i].native_name);
        let unconverted = lines.iter().all(|l| l.starts_with("//"));
        for line in lines {
            out.push_str(&format!("\t{line}\n"));
        }
        if unconverted {
            out.push_str(&format!("\tvar {} {}\n", p.name, p.ty.managed_name(map)));
        }
    }

    let inputs = t.call_inputs().map(|p| p.name.as_str()).collect::<Vec<_>>().join(", ");
    let outputs = t.call_outputs();
    if outputs.is_empty() {
        out.push_str(&format!("\t{}({inputs})\n", data.name));
    } else {
        let names = outputs.iter().map(|p| p.name.as_str()).collect::<Vec<_>>().join(", ");
        out.push_str(&format!("\t{names} := {}({inputs})\n", data.name));
    }

    for (i, p) in t.params.iter().enumerate() {
        if i == t.data_index || !p.is_output {
            continue;
        }
        for line in p.ty.to_native(map, Assign::Set, &p.name, &t.args[i].native_name) {
            out.push_str(&format!("\t{line}\n"));
        }
    }
    if let Some(r) = &t.ret {
        for line in r.ty.to_native(map, Assign::Set, &r.name, &format!("_{}", r.name)) {
            out.push_str(&format!("\t{line}\n"));
        }
        out.push_str("\treturn\n");
    }
    out.push_str("}\n\n");
}

/// C prototype of a trampoline's stub plus its argument names.
fn c_prototype(b: &Bindings<'_>, t: &Trampoline) -> Result<(String, Vec<String>, bool)> {
    let decls = b.package.decls();
    let ft = decls.function_type(&t.fn_type)?;
    let returns_void = decls.is_void(&ft.returns)?;
    let ret = if returns_void {
        "void".to_string()
    } else {
        decls.c_spelling(&ft.returns)?
    };
    let mut params = Vec::with_capacity(ft.arguments.len());
    let mut names = Vec::with_capacity(ft.arguments.len());
    for (i, a) in ft.arguments.iter().enumerate() {
        let name = if a.name.is_empty() {
            format!("arg{i}")
        } else {
            a.name.clone()
        };
        params.push(format!("{} {name}", decls.c_spelling(&a.ty)?));
        names.push(name);
    }
    let params = if params.is_empty() {
        "void".to_string()
    } else {
        params.join(", ")
    };
    Ok((format!("{ret} {}({params})", t.c_name()), names, returns_void))
}

/// C stubs forwarding each native callback into its exported Go function.
pub fn c_source(b: &Bindings<'_>) -> Result<String> {
    let mut out = format!("{GENERATED}\n\n#include \"_cgo_export.h\"\n");
    for t in &b.trampolines {
        let (proto, args, returns_void) = c_prototype(b, t)?;
        let call = format!("{}({})", t.go_name(), args.join(", "));
        let stmt = if returns_void {
            format!("{call};")
        } else {
            format!("return {call};")
        };
        out.push_str(&format!("\n{proto} {{\n\t{stmt}\n}}\n"));
    }
    Ok(out)
}

/// Prototypes of the C stubs, included from the Go preamble.
pub fn c_header(b: &Bindings<'_>) -> Result<String> {
    let guard = format!("CBRIDGE_{}_H", b.package.name().to_uppercase());
    let mut out = format!("{GENERATED}\n\n#ifndef {guard}\n#define {guard}\n\n");
    for t in &b.trampolines {
        let (proto, _, _) = c_prototype(b, t)?;
        out.push_str(&format!("extern {proto};\n"));
    }
    out.push_str(&format!("\n#endif /* {guard} */\n"));
    Ok(out)
}
