//! End-to-end generation from inline declaration documents.

use std::rc::Rc;

use cbridge_core::render::{c_header, c_source, go_source};
use cbridge_core::{Bindings, Generator, Package, PackageConfig};
use cbridge_decl::Declarations;

const POINT: &str = r#"{
    "files": [{"id": "f1", "name": "/usr/include/point.h"}],
    "types": {
        "int": {"kind": "fundamental", "name": "int", "size": 4},
        "double": {"kind": "fundamental", "name": "double", "size": 8},
        "s1": {"kind": "struct", "name": "point_t", "file": "f1", "size": 8,
            "fields": [{"name": "x", "type": "int"}, {"name": "y", "type": "int"}]},
        "p1": {"kind": "pointer", "pointee": "s1", "size": 8}
    },
    "functions": [
        {"id": "fn1", "name": "make_point", "file": "f1", "returns": "s1",
         "arguments": [{"name": "x", "type": "int"}, {"name": "y", "type": "int"}]},
        {"id": "fn2", "name": "point_norm", "file": "f1", "returns": "double",
         "arguments": [{"name": "p", "type": "p1"}]},
        {"id": "fn3", "name": "MAKE_POINT", "file": "f1", "returns": "s1",
         "arguments": [{"name": "x", "type": "int"}, {"name": "y", "type": "int"}]}
    ]
}"#;

const WALK: &str = r#"{
    "files": [{"id": "f1", "name": "walk.h"}],
    "types": {
        "int": {"kind": "fundamental", "name": "int", "size": 4},
        "void": {"kind": "fundamental", "name": "void"},
        "vp": {"kind": "pointer", "pointee": "void", "size": 8},
        "visit_fn": {"kind": "function_type", "returns": "int",
            "arguments": [{"name": "value", "type": "int"}, {"name": "user", "type": "vp"}]},
        "visit_p": {"kind": "pointer", "pointee": "visit_fn", "size": 8},
        "walk_visit_t": {"kind": "typedef", "name": "walk_visit_t", "file": "f1", "base": "visit_p", "size": 8}
    },
    "functions": [
        {"id": "a", "name": "walk_all", "file": "f1", "returns": "int",
         "arguments": [{"name": "limit", "type": "int"}, {"name": "visit", "type": "walk_visit_t"},
                       {"name": "data", "type": "vp"}]},
        {"id": "b", "name": "walk_some", "file": "f1", "returns": "void",
         "arguments": [{"name": "visit", "type": "walk_visit_t"}, {"name": "data", "type": "vp"}]}
    ]
}"#;

const UNION: &str = r#"{
    "files": [{"id": "f1", "name": "value.h"}],
    "types": {
        "char": {"kind": "fundamental", "name": "char", "size": 1},
        "double": {"kind": "fundamental", "name": "double", "size": 8},
        "c9": {"kind": "array", "element": "char", "length": 9, "size": 9},
        "u1": {"kind": "union", "name": "point_value", "file": "f1", "size": 16,
            "fields": [{"name": "real", "type": "double"}, {"name": "tag", "type": "c9"}]}
    },
    "functions": [
        {"id": "fn1", "name": "point_value_real", "file": "f1", "returns": "double",
         "arguments": [{"name": "v", "type": "u1"}]}
    ]
}"#;

fn package(doc: &str, name: &str, pattern: &str, header: &str) -> Package {
    let decls = Rc::new(Declarations::parse(doc).unwrap());
    let config = PackageConfig {
        name: name.into(),
        path: format!("example.com/{name}"),
        headers: vec![header.into()],
        pattern: Some(pattern.into()),
        ..PackageConfig::default()
    };
    let mut pkg = Package::new(config, decls, 8).unwrap();
    pkg.prepare(&[]).unwrap();
    pkg
}

#[test]
fn point_struct_and_constructor() {
    let pkg = package(POINT, "point", "(?i)point", "point.h");
    let b = Bindings::collect(&pkg);
    let go = go_source(&b, None);

    assert!(go.starts_with("// Code generated by cbridge. DO NOT EDIT.\n\npackage point\n"));
    assert!(go.contains("#include <point.h>\n#include <stdlib.h>\n*/\nimport \"C\"\n"));
    assert!(go.contains("import (\n\t\"unsafe\"\n)"));
    assert!(go.contains("type Point struct {\n\tX int32\n\tY int32\n}"));
    assert!(go.contains(
        "func MakePoint(x int32, y int32) (ret Point) {\n\
         \t_x := (C.int)(x)\n\
         \t_y := (C.int)(y)\n\
         \t_ret := C.make_point(_x, _y)\n\
         \tret = *(*Point)(unsafe.Pointer(&_ret))\n\
         \treturn\n}"
    ));
    assert!(go.contains(
        "\tif unsafe.Sizeof(*new(C.struct_point_t)) != unsafe.Sizeof(*new(Point)) {"
    ));
}

#[test]
fn pointer_receiver_becomes_method() {
    let pkg = package(POINT, "point", "(?i)point", "point.h");
    let b = Bindings::collect(&pkg);
    let go = go_source(&b, None);
    assert!(go.contains("func (p *Point) Norm() (ret float64) {"));
    assert!(go.contains("\t_p := (*C.struct_point_t)(unsafe.Pointer(p))\n"));
    assert!(!go.contains("func PointNorm("));
}

#[test]
fn colliding_names_are_suffixed() {
    let pkg = package(POINT, "point", "(?i)point", "point.h");
    let b = Bindings::collect(&pkg);
    let names: Vec<_> = b.functions.iter().map(|f| f.managed_name.as_str()).collect();
    assert_eq!(names, vec!["MakePoint", "MakePoint_"]);
}

#[test]
fn statistics_count_emitted_declarations() {
    let pkg = package(POINT, "point", "(?i)point", "point.h");
    let stats = Bindings::collect(&pkg).statistics();
    assert_eq!(stats.types, 1);
    assert_eq!(stats.functions, 2);
    assert_eq!(stats.methods, 1);
    assert_eq!(stats.to_string(), "4 declarations wrapped");
}

#[test]
fn names_are_stable_across_runs() {
    let mut pkg = package(POINT, "point", "(?i)point", "point.h");
    let first = go_source(&Bindings::collect(&pkg), None);
    pkg.prepare(&[]).unwrap();
    let second = go_source(&Bindings::collect(&pkg), None);
    assert_eq!(first, second);
}

#[test]
fn shared_callback_has_one_trampoline() {
    let pkg = package(WALK, "walk", "^walk_(.*)", "walk.h");
    let b = Bindings::collect(&pkg);
    assert_eq!(b.trampolines.len(), 1);

    let go = go_source(&b, Some("auto_amd64.h"));
    assert!(go.contains("#include \"auto_amd64.h\"\n"));
    assert_eq!(go.matches("//export visitCallback_Go").count(), 1);
    assert!(go.contains("func All(limit int32, visit func(int32) int32) (ret int32) {"));
    assert!(go.contains("\t_visit := (C.walk_visit_t)(unsafe.Pointer(C.visitCallback_C))\n"));
    assert!(go.contains("\t_data := unsafe.Pointer(&visit)\n"));
    assert!(go.contains("func Some(visit func(int32) int32) {"));
    assert!(go.contains(
        "func visitCallback_Go(_value C.int, _user unsafe.Pointer) (_ret C.int) {\n\
         \tuser := *(*func(int32) int32)(_user)\n\
         \tvalue := (int32)(_value)\n\
         \tret := user(value)\n\
         \t_ret = (C.int)(ret)\n\
         \treturn\n}"
    ));

    let c = c_source(&b).unwrap();
    assert!(c.contains("#include \"_cgo_export.h\""));
    assert!(c.contains("int visitCallback_C(int value, void* user) {\n\treturn visitCallback_Go(value, user);\n}"));
    let h = c_header(&b).unwrap();
    assert!(h.contains("#ifndef CBRIDGE_WALK_H"));
    assert!(h.contains("extern int visitCallback_C(int value, void* user);"));
}

#[test]
fn union_accessors_switch_at_pointer_width() {
    let pkg = package(UNION, "value", "^point_(.*)", "value.h");
    let b = Bindings::collect(&pkg);
    let go = go_source(&b, None);
    assert!(go.contains("type Value [16]byte"));
    assert!(go.contains(
        "func (u *Value) Real() float64 {\n\treturn *(*float64)(unsafe.Pointer(u))\n}"
    ));
    assert!(go.contains(
        "func (u *Value) Tag() *[9]int8 {\n\treturn (*[9]int8)(unsafe.Pointer(u))\n}"
    ));
    assert!(go.contains("func ValueReal(v Value) (ret float64) {"));
    assert!(go.contains("\t_v := *(*C.union_point_value)(unsafe.Pointer(&v))\n"));
    assert!(go.contains(
        "\tif unsafe.Sizeof(*new(C.union_point_value)) != unsafe.Sizeof(*new(Value)) {"
    ));
}

#[test]
fn raw_callback_pointer_shares_one_trampoline() {
    const DOC: &str = r#"{
        "files": [{"id": "f1", "name": "walk.h"}],
        "types": {
            "int": {"kind": "fundamental", "name": "int", "size": 4},
            "void": {"kind": "fundamental", "name": "void"},
            "vp": {"kind": "pointer", "pointee": "void", "size": 8},
            "visit_fn": {"kind": "function_type", "returns": "int",
                "arguments": [{"name": "value", "type": "int"}, {"name": "user", "type": "vp"}]},
            "visit_p": {"kind": "pointer", "pointee": "visit_fn", "size": 8}
        },
        "functions": [
            {"id": "a", "name": "walk_all", "file": "f1", "returns": "void",
             "arguments": [{"name": "visit", "type": "visit_p"}, {"name": "data", "type": "vp"}]},
            {"id": "b", "name": "walk_some", "file": "f1", "returns": "void",
             "arguments": [{"name": "visit", "type": "visit_p"}, {"name": "data", "type": "vp"}]}
        ]
    }"#;
    let pkg = package(DOC, "walk", "^walk_(.*)", "walk.h");
    let b = Bindings::collect(&pkg);
    let names: Vec<_> = b.trampolines.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["allCallback"]);

    let go = go_source(&b, Some("auto_amd64.h"));
    assert_eq!(go.matches("unsafe.Pointer(C.allCallback_C)").count(), 2);
    assert!(go.contains("func Some(visit func(int32) int32) {"));
}

#[test]
fn distinct_callback_signatures_get_distinct_trampolines() {
    const DOC: &str = r#"{
        "files": [{"id": "f1", "name": "walk.h"}],
        "types": {
            "int": {"kind": "fundamental", "name": "int", "size": 4},
            "double": {"kind": "fundamental", "name": "double", "size": 8},
            "void": {"kind": "fundamental", "name": "void"},
            "vp": {"kind": "pointer", "pointee": "void", "size": 8},
            "int_fn": {"kind": "function_type", "returns": "int",
                "arguments": [{"name": "value", "type": "int"}, {"name": "user", "type": "vp"}]},
            "int_p": {"kind": "pointer", "pointee": "int_fn", "size": 8},
            "walk_visit_t": {"kind": "typedef", "name": "walk_visit_t", "file": "f1", "base": "int_p", "size": 8},
            "real_fn": {"kind": "function_type", "returns": "void",
                "arguments": [{"name": "value", "type": "double"}, {"name": "user", "type": "vp"}]},
            "real_p": {"kind": "pointer", "pointee": "real_fn", "size": 8},
            "visit_t": {"kind": "typedef", "name": "visit_t", "file": "f1", "base": "real_p", "size": 8}
        },
        "functions": [
            {"id": "a", "name": "walk_ints", "file": "f1", "returns": "void",
             "arguments": [{"name": "visit", "type": "walk_visit_t"}, {"name": "data", "type": "vp"}]},
            {"id": "b", "name": "walk_floats", "file": "f1", "returns": "void",
             "arguments": [{"name": "visit", "type": "visit_t"}, {"name": "data", "type": "vp"}]}
        ]
    }"#;
    let pkg = package(DOC, "walk", "^walk_(.*)", "walk.h");
    let b = Bindings::collect(&pkg);
    let names: Vec<_> = b.trampolines.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["visitCallback", "visitCallback_"]);

    let go = go_source(&b, Some("auto_amd64.h"));
    assert!(go.contains("func Ints(visit func(int32) int32) {"));
    assert!(go.contains("func Floats(visit func(float64)) {"));
    assert!(go.contains("unsafe.Pointer(C.visitCallback__C)"));

    let c = c_source(&b).unwrap();
    assert!(c.contains("void visitCallback__C(double value, void* user) {"));
}

#[test]
fn methods_do_not_shadow_fields_of_aliased_struct() {
    const DOC: &str = r#"{
        "files": [{"id": "f1", "name": "point.h"}],
        "types": {
            "int": {"kind": "fundamental", "name": "int", "size": 4},
            "s1": {"kind": "struct", "name": "point_t", "file": "f1", "size": 8,
                "fields": [{"name": "x", "type": "int"}, {"name": "y", "type": "int"}]},
            "point_t": {"kind": "typedef", "name": "point_t", "file": "f1", "base": "s1", "size": 8},
            "pp": {"kind": "pointer", "pointee": "point_t", "size": 8}
        },
        "functions": [
            {"id": "fn1", "name": "point_make", "file": "f1", "returns": "point_t",
             "arguments": [{"name": "x", "type": "int"}, {"name": "y", "type": "int"}]},
            {"id": "fn2", "name": "point_x", "file": "f1", "returns": "int",
             "arguments": [{"name": "p", "type": "pp"}]}
        ]
    }"#;
    let pkg = package(DOC, "point", "^point_(.*)", "point.h");
    let b = Bindings::collect(&pkg);
    assert_eq!(b.types.len(), 1);
    let go = go_source(&b, None);
    assert!(go.contains("type Point struct {\n\tX int32\n\tY int32\n}"));
    assert!(go.contains("func (p *Point) PointX() (ret int32) {"));
    assert!(!go.contains(") X() "));
}

#[test]
fn empty_struct_has_no_size_check() {
    const DOC: &str = r#"{
        "files": [{"id": "f1", "name": "handle.h"}],
        "types": {
            "h1": {"kind": "struct", "name": "handle_t", "file": "f1", "size": 16}
        },
        "functions": [
            {"id": "fn1", "name": "handle_open", "file": "f1", "returns": "h1", "arguments": []}
        ]
    }"#;
    let pkg = package(DOC, "handle", "^handle_(.*)", "handle.h");
    let go = go_source(&Bindings::collect(&pkg), None);
    assert!(go.contains("type Handle struct{}"));
    assert!(!go.contains("func init()"));
}

#[test]
fn included_package_types_are_referenced() {
    const DOC: &str = r#"{
        "files": [{"id": "f1", "name": "point.h"}, {"id": "f2", "name": "shape.h"}],
        "types": {
            "int": {"kind": "fundamental", "name": "int", "size": 4},
            "s1": {"kind": "struct", "name": "point_t", "file": "f1", "size": 8,
                "fields": [{"name": "x", "type": "int"}, {"name": "y", "type": "int"}]}
        },
        "functions": [
            {"id": "fn1", "name": "point_origin", "file": "f1", "returns": "s1", "arguments": []},
            {"id": "fn2", "name": "shape_center", "file": "f2", "returns": "s1", "arguments": []}
        ]
    }"#;
    let configs = vec![
        PackageConfig {
            name: "shape".into(),
            path: "example.com/shape".into(),
            headers: vec!["shape.h".into()],
            prefix: Some("shape_".into()),
            include: vec!["point".into()],
            ..PackageConfig::default()
        },
        PackageConfig {
            name: "point".into(),
            path: "example.com/point".into(),
            headers: vec!["point.h".into()],
            prefix: Some("point_".into()),
            ..PackageConfig::default()
        },
    ];
    let generator = Generator::new(Declarations::parse(DOC).unwrap(), configs, 8);
    let pkgs = generator.prepare().unwrap();
    assert_eq!(pkgs[0].name(), "point");

    let shape = Bindings::collect(&pkgs[1]);
    assert!(shape.types.is_empty());
    let go = go_source(&shape, None);
    assert!(go.contains("\tpoint \"example.com/point\"\n"));
    assert!(go.contains("func Center() (ret point.Point) {"));
    assert!(!go.contains("type Point"));
}
