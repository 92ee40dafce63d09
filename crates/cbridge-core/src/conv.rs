//! Marshaling statements between managed and native values.
//!
//! Every emitter returns Go source lines; nothing here has side effects on
//! the declaration map.

use crate::types::{DeclMap, Strategy, TypeDesc};

/// How the destination variable is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assign {
    /// `x := ...`
    Define,
    /// `x = ...`
    Set,
}

impl Assign {
    pub fn op(self) -> &'static str {
        match self {
            Assign::Define => ":=",
            Assign::Set => "=",
        }
    }
}

fn cast(assign: Assign, src: &str, dst: &str, ty: &str) -> String {
    format!("{dst} {} ({ty})({src})", assign.op())
}

fn pointer_reinterpret(assign: Assign, src: &str, dst: &str, ty: &str) -> String {
    format!("{dst} {} ({ty})(unsafe.Pointer({src}))", assign.op())
}

fn value_reinterpret(assign: Assign, src: &str, dst: &str, ty: &str) -> String {
    format!("{dst} {} *(*{ty})(unsafe.Pointer(&{src}))", assign.op())
}

fn by_strategy(strategy: Strategy, assign: Assign, src: &str, dst: &str, ty: &str) -> String {
    match strategy {
        Strategy::PointerReinterpret => pointer_reinterpret(assign, src, dst, ty),
        Strategy::ValueReinterpret => value_reinterpret(assign, src, dst, ty),
        Strategy::Cast | Strategy::Special => cast(assign, src, dst, ty),
    }
}

/// `c` points at the first element of `g`, or is nil when `g` is empty.
fn slice_lines(assign: Assign, g: &str, c: &str, elem_native: &str) -> Vec<String> {
    let head = match assign {
        Assign::Define => format!("var {c} *{elem_native}"),
        Assign::Set => format!("{c} = nil"),
    };
    vec![
        head,
        format!("if len({g}) > 0 {{"),
        format!("\t{c} = (*{elem_native})(unsafe.Pointer(&{g}[0]))"),
        "}".to_string(),
    ]
}

impl TypeDesc {
    /// Statements converting managed `g` into native `c`.
    pub fn to_native(&self, map: &DeclMap, assign: Assign, g: &str, c: &str) -> Vec<String> {
        match self {
            TypeDesc::Void => Vec::new(),
            TypeDesc::Boolean { native, .. } => {
                let mut lines = match assign {
                    Assign::Define => vec![format!("var {c} {native}")],
                    Assign::Set => vec![format!("{c} = ({native})(0)")],
                };
                lines.push(format!("if {g} {{"));
                lines.push(format!("\t{c} = ({native})(1)"));
                lines.push("}".to_string());
                lines
            }
            TypeDesc::String => vec![
                format!("{c} {} C.CString({g})", assign.op()),
                format!("defer C.free(unsafe.Pointer({c}))"),
            ],
            TypeDesc::Slice(elem) => slice_lines(assign, g, c, &elem.native_name(map)),
            TypeDesc::SliceOfSlice(elem) => {
                let elem = elem.native_name(map);
                let tmp = format!("{c}_");
                let mut lines = vec![
                    format!("{tmp} := make([]*{elem}, len({g}))"),
                    format!("for i := range {g} {{"),
                    format!("\tif len({g}[i]) > 0 {{"),
                    format!("\t\t{tmp}[i] = (*{elem})(unsafe.Pointer(&{g}[i][0]))"),
                    "\t}".to_string(),
                    "}".to_string(),
                ];
                lines.extend(slice_lines(assign, &tmp, c, &format!("*{elem}")));
                lines
            }
            TypeDesc::StringArray => {
                let tmp = format!("{c}_");
                let mut lines = vec![
                    format!("{tmp} := make([]*C.char, len({g}))"),
                    format!("for i := range {g} {{"),
                    format!("\t{tmp}[i] = C.CString({g}[i])"),
                    format!("\tdefer C.free(unsafe.Pointer({tmp}[i]))"),
                    "}".to_string(),
                ];
                lines.extend(slice_lines(assign, &tmp, c, "*C.char"));
                lines
            }
            TypeDesc::ReturnPointer(_) => {
                vec![pointer_reinterpret(assign, &format!("&{g}"), c, &self.native_name(map))]
            }
            TypeDesc::CallbackReturnPointer(pointee) => {
                let tmp = format!("{c}_v");
                let mut lines = pointee.to_native(map, Assign::Define, g, &tmp);
                lines.push(format!("*(*{})({c}) = {tmp}", pointee.native_name(map)));
                lines
            }
            TypeDesc::FunctionSignature(_) => {
                vec![format!("{c} {} unsafe.Pointer(&{g})", assign.op())]
            }
            _ => vec![by_strategy(self.strategy(map), assign, g, c, &self.native_name(map))],
        }
    }

    /// Statements converting native `c` into managed `g`.
    pub fn to_managed(&self, map: &DeclMap, assign: Assign, g: &str, c: &str) -> Vec<String> {
        match self {
            TypeDesc::Void | TypeDesc::ReturnPointer(_) | TypeDesc::CallbackReturnPointer(_) => {
                Vec::new()
            }
            TypeDesc::Boolean { .. } => vec![format!("{g} {} (bool)({c} == 1)", assign.op())],
            TypeDesc::String => vec![format!("{g} {} C.GoString({c})", assign.op())],
            TypeDesc::Slice(_) | TypeDesc::SliceOfSlice(_) | TypeDesc::StringArray => {
                let managed = self.managed_name(map);
                log::warn!("no managed conversion for {managed} ({c} -> {g})");
                vec![format!("// no managed conversion for {managed}")]
            }
            TypeDesc::FunctionSignature(sig) => vec![format!(
                "{g} {} *(*{})({c})",
                assign.op(),
                sig.managed_name(map)
            )],
            _ => vec![by_strategy(self.strategy(map), assign, c, g, &self.managed_name(map))],
        }
    }
}
