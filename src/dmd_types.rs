use crate::{*, host::*, types::*};
use std::rc::Rc;

// DMD backend type names, as they appear in "_AArray_<key>_<value>" names, mapped to D types.
// This is the backend's internal vocabulary (tysize/tystring in dmd's backend), so new compiler versions
// only need new table entries.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DmdType {
    // No usable layout; shown as a raw address. (void, cent, struct, template, ...)
    Opaque,
    Named(&'static str),
    // SIMD vector: element type, number of lanes.
    Vector(&'static str, usize),
    VoidPointer,
    VoidReference,
}

use DmdType::*;

pub static DMD_TYPES: &[(&str, DmdType)] = &[
    ("bool", Named("bool")),
    ("char", Named("char")),
    ("signed char", Named("byte")),
    ("unsigned char", Named("ubyte")),
    ("char8_t", Named("char")),
    ("char16_t", Named("wchar")),
    ("short", Named("short")),
    ("wchar_t", Named("wchar")),
    ("unsigned short", Named("ushort")),
    ("enum", Named("uint")),
    ("int", Named("int")),
    ("unsigned", Named("uint")),
    ("long", Named("int")),
    ("unsigned long", Named("uint")),
    ("dchar", Named("dchar")),
    ("long long", Named("long")),
    ("uns long long", Named("ulong")),
    ("cent", Opaque),
    ("ucent", Opaque),
    ("float", Named("float")),
    ("double", Named("double")),
    ("double alias", Named("double")),
    ("long double", Named("real")),
    ("imaginary float", Named("ifloat")),
    ("imaginary double", Named("idouble")),
    ("imaginary long double", Named("ireal")),
    ("complex float", Named("cfloat")),
    ("complex double", Named("cdouble")),
    ("complex long double", Named("creal")),

    // 128-bit vectors.
    ("float[4]", Vector("float", 4)),
    ("double[2]", Vector("double", 2)),
    ("signed char[16]", Vector("byte", 16)),
    ("unsigned char[16]", Vector("ubyte", 16)),
    ("short[8]", Vector("short", 8)),
    ("unsigned short[8]", Vector("ushort", 8)),
    ("long[4]", Vector("int", 4)),
    ("unsigned long[4]", Vector("uint", 4)),
    ("long long[2]", Vector("long", 2)),
    ("unsigned long long[2]", Vector("ulong", 2)),
    // 256-bit.
    ("float[8]", Vector("float", 8)),
    ("double[4]", Vector("double", 4)),
    ("signed char[32]", Vector("byte", 32)),
    ("unsigned char[32]", Vector("ubyte", 32)),
    ("short[16]", Vector("short", 16)),
    ("unsigned short[16]", Vector("ushort", 16)),
    ("long[8]", Vector("int", 8)),
    ("unsigned long[8]", Vector("uint", 8)),
    ("long long[4]", Vector("long", 4)),
    ("unsigned long long[4]", Vector("ulong", 4)),
    // 512-bit.
    ("float[16]", Vector("float", 16)),
    ("double[8]", Vector("double", 8)),
    ("signed char[64]", Vector("byte", 64)),
    ("unsigned char[64]", Vector("ubyte", 64)),
    ("short[32]", Vector("short", 32)),
    ("unsigned short[32]", Vector("ushort", 32)),
    ("long[16]", Vector("int", 16)),
    ("unsigned long[16]", Vector("uint", 16)),
    ("long long[8]", Vector("long", 8)),
    ("unsigned long long[8]", Vector("ulong", 8)),

    ("nullptr_t", Opaque),
    ("*", VoidPointer),
    ("&", VoidReference),
    ("void", Opaque),
    ("noreturn", Opaque),
    ("struct", Opaque),
    ("array", Opaque),
    ("C func", VoidPointer),
    ("Pascal func", VoidPointer),
    ("std func", VoidPointer),
    ("member func", VoidPointer),
    ("D func", VoidPointer),
    ("__near &", VoidReference),
    ("__ss *", VoidPointer),
    ("__cs *", VoidPointer),
    ("__far16 *", VoidPointer),
    ("__far *", VoidPointer),
    ("__huge *", VoidPointer),
    ("__handle *", VoidPointer),
    ("__immutable *", VoidPointer),
    ("__shared *", VoidPointer),
    ("__restrict *", VoidPointer),
    ("__fg *", VoidPointer),
    ("far C func", VoidPointer),
    ("far Pascal func", VoidPointer),
    ("far std func", VoidPointer),
    ("_far16 Pascal func", VoidPointer),
    ("sys func", VoidPointer),
    ("far sys func", VoidPointer),
    ("__far &", VoidReference),
    ("interrupt func", VoidPointer),
    ("memptr", VoidPointer),
    ("ident", Opaque),
    ("template", Opaque),
    ("vtshape", Opaque),
];

pub fn lookup_dmd_type(fragment: &str) -> DmdType {
    DMD_TYPES.iter().find(|(name, _)| *name == fragment).map_or(Opaque, |(_, t)| *t)
}

// Unknown fragments, and names the host doesn't know, become the opaque type.
pub fn resolve_dmd_type<D: Debuggee + ?Sized>(host: &D, fragment: &str) -> Rc<TypeInfo> {
    let types = host.types();
    let named = |name: &str| host.resolve_type(name).unwrap_or_else(|| types.builtin.unknown.clone());
    match lookup_dmd_type(fragment) {
        Opaque => types.builtin.unknown.clone(),
        Named(name) => named(name),
        Vector(elem, lanes) => {
            let elem = named(elem);
            if elem.is_opaque() {
                return elem;
            }
            host.lanes_type(elem, lanes)
        }
        VoidPointer => types.pointer_to(types.builtin.void.clone(), PointerFlags::empty()),
        VoidReference => types.pointer_to(types.builtin.void.clone(), PointerFlags::REFERENCE),
    }
}
