use crate::{*, error::*, type_names::*};
use std::{collections::HashMap, rc::Rc, fmt};
use bitflags::*;

// The host debugger's notion of types, reduced to what the printers need: size and shape.
// Types form an immutable graph of Rc<TypeInfo>. Anything we can't figure out becomes Type::Unknown ("opaque"):
// pointer-sized, shown as a raw address.

bitflags! { pub struct PrimitiveFlags: u8 {
    const SIGNED = 0x1;
    const FLOAT = 0x2;
    const CHAR = 0x4;
    const BOOL = 0x10;
    // ifloat/idouble/ireal. FLOAT is also set.
    const IMAGINARY = 0x20;
    // cfloat/cdouble/creal: two floats of half the size. FLOAT is also set.
    const COMPLEX = 0x40;
}}

bitflags! { pub struct PointerFlags: u8 {
    const REFERENCE = 0x1;
}}

#[derive(Clone, Debug)]
pub struct PointerType {
    pub flags: PointerFlags,
    pub type_: Rc<TypeInfo>,
}

bitflags! { pub struct ArrayFlags: u8 {
    // SIMD vector (__vector(T[N]) in D, gdb's Type.vector()). Same layout as a static array.
    const VECTOR = 0x1;
}}

// Static array or vector. (D dynamic arrays are structs, see TypeFlags::DYNAMIC_ARRAY.)
#[derive(Clone, Debug)]
pub struct ArrayType {
    pub flags: ArrayFlags,
    pub type_: Rc<TypeInfo>,
    pub len: usize,
}

#[derive(Clone, Debug)]
pub struct StructField {
    pub name: String,
    pub offset: usize,
    pub type_: Rc<TypeInfo>,
}

#[derive(Clone, Debug, Default)]
pub struct StructType {
    pub fields: Vec<StructField>,
}
impl StructType {
    pub fn field(&self, name: &str) -> Option<&StructField> { self.fields.iter().find(|f| f.name == name) }
}

#[derive(Clone, Debug)]
pub enum Type {
    Unknown, // opaque: unresolved name, unknown layout
    Void,
    Primitive(PrimitiveFlags),
    Pointer(PointerType),
    Array(ArrayType),
    Struct(StructType),
}
impl Type {
    pub fn as_pointer(&self) -> Option<&PointerType> { match self { Type::Pointer(p) => Some(p), _ => None } }
    pub fn as_array(&self) -> Option<&ArrayType> { match self { Type::Array(a) => Some(a), _ => None } }
    pub fn as_struct(&self) -> Option<&StructType> { match self { Type::Struct(s) => Some(s), _ => None } }
    pub fn kind_name(&self) -> &'static str {
        match self {
            Type::Unknown => "unknown",
            Type::Void => "void",
            Type::Primitive(_) => "primitive",
            Type::Pointer(p) if p.flags.contains(PointerFlags::REFERENCE) => "reference",
            Type::Pointer(_) => "pointer",
            Type::Array(a) if a.flags.contains(ArrayFlags::VECTOR) => "vector",
            Type::Array(_) => "array",
            Type::Struct(_) => "struct",
        }
    }
}

bitflags! { pub struct TypeFlags: u8 {
    const BUILTIN = 0x1;
    // Struct {size_t length; T* ptr;}, i.e. T[].
    const DYNAMIC_ARRAY = 0x2;
    // Struct {Impl* ptr;}, i.e. V[K].
    const ASSOC_ARRAY = 0x4;
}}

#[derive(Clone, Debug)]
pub struct TypeInfo {
    pub name: String,
    pub size: usize,
    pub flags: TypeFlags,
    pub t: Type,
}
impl TypeInfo {
    pub fn is_opaque(&self) -> bool { match self.t { Type::Unknown => true, _ => false } }

    pub fn alignment(&self, word_size: usize) -> usize {
        match &self.t {
            Type::Unknown | Type::Pointer(_) => word_size,
            Type::Void => 1,
            Type::Primitive(f) if f.contains(PrimitiveFlags::COMPLEX) => (self.size / 2).max(1).min(16),
            Type::Primitive(_) => self.size.max(1).min(16),
            Type::Array(a) => a.type_.alignment(word_size),
            Type::Struct(s) => s.fields.iter().map(|f| f.type_.alignment(word_size)).max().unwrap_or(1),
        }
    }

    // Element type of a D dynamic array.
    pub fn dynamic_array_element(&self) -> Option<&Rc<TypeInfo>> {
        if !self.flags.contains(TypeFlags::DYNAMIC_ARRAY) {
            return None;
        }
        Some(&self.t.as_struct()?.field("ptr")?.type_.t.as_pointer()?.type_)
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "<{}>", self.t.kind_name())
        } else {
            write!(f, "{}", self.name)
        }
    }
}

pub struct BuiltinTypes {
    pub unknown: Rc<TypeInfo>,
    pub void: Rc<TypeInfo>,
    pub void_pointer: Rc<TypeInfo>,
    pub size_t: Rc<TypeInfo>,
    pub char_: Rc<TypeInfo>,
    pub wchar: Rc<TypeInfo>,
    pub dchar: Rc<TypeInfo>,
}

// Name -> type mapping of one debuggee, pre-populated with D's builtin types.
// User-defined types can be added by the host (e.g. from debug info), see add_struct().
pub struct Types {
    name_to_type: HashMap<String, Rc<TypeInfo>>,
    pub builtin: BuiltinTypes,
    pub word_size: usize,
}

impl Types {
    pub fn new(word_size: usize) -> Self {
        let prim = |name: &str, size: usize, flags: PrimitiveFlags| Rc::new(TypeInfo {name: name.to_string(), size, flags: TypeFlags::BUILTIN, t: Type::Primitive(flags)});
        let void = Rc::new(TypeInfo {name: "void".to_string(), size: 0, flags: TypeFlags::BUILTIN, t: Type::Void});
        let unknown = Rc::new(TypeInfo {name: "<unknown>".to_string(), size: word_size, flags: TypeFlags::BUILTIN, t: Type::Unknown});
        let void_pointer = Rc::new(TypeInfo {name: "void*".to_string(), size: word_size, flags: TypeFlags::BUILTIN, t: Type::Pointer(PointerType {flags: PointerFlags::empty(), type_: void.clone()})});
        let size_t = prim(if word_size == 8 {"ulong"} else {"uint"}, word_size, PrimitiveFlags::empty());
        let char_ = prim("char", 1, PrimitiveFlags::CHAR);
        let wchar = prim("wchar", 2, PrimitiveFlags::CHAR);
        let dchar = prim("dchar", 4, PrimitiveFlags::CHAR);
        let mut types = Types {name_to_type: HashMap::new(), builtin: BuiltinTypes {unknown, void: void.clone(), void_pointer: void_pointer.clone(), size_t: size_t.clone(), char_: char_.clone(), wchar: wchar.clone(), dchar: dchar.clone()}, word_size};

        // x87 extended precision, padded to 16 bytes on 64-bit and 12 bytes on 32-bit targets.
        let real_size = if word_size == 8 {16} else {12};
        let (s, f, i, c) = (PrimitiveFlags::SIGNED, PrimitiveFlags::FLOAT, PrimitiveFlags::FLOAT | PrimitiveFlags::IMAGINARY, PrimitiveFlags::FLOAT | PrimitiveFlags::COMPLEX);
        for t in [void, void_pointer, char_, wchar, dchar,
                  prim("bool", 1, PrimitiveFlags::BOOL),
                  prim("byte", 1, s), prim("ubyte", 1, PrimitiveFlags::empty()),
                  prim("short", 2, s), prim("ushort", 2, PrimitiveFlags::empty()),
                  prim("int", 4, s), prim("uint", 4, PrimitiveFlags::empty()),
                  prim("long", 8, s), prim("ulong", 8, PrimitiveFlags::empty()),
                  prim("cent", 16, s), prim("ucent", 16, PrimitiveFlags::empty()),
                  prim("float", 4, f), prim("double", 8, f), prim("real", real_size, f),
                  prim("ifloat", 4, i), prim("idouble", 8, i), prim("ireal", real_size, i),
                  prim("cfloat", 8, c), prim("cdouble", 16, c), prim("creal", real_size * 2, c)] {
            types.name_to_type.insert(t.name.clone(), t);
        }
        types.add_alias("size_t", size_t);
        let ptrdiff_t = types.find_by_name(if word_size == 8 {"long"} else {"int"}).unwrap();
        types.add_alias("ptrdiff_t", ptrdiff_t);
        for (name, elem) in [("string", types.builtin.char_.clone()), ("wstring", types.builtin.wchar.clone()), ("dstring", types.builtin.dchar.clone())] {
            let t = types.dynamic_array_of(elem, name);
            types.add_alias(name, t);
        }
        types
    }

    pub fn add(&mut self, t: TypeInfo) -> Rc<TypeInfo> {
        let t = Rc::new(t);
        self.name_to_type.insert(t.name.clone(), t.clone());
        t
    }

    pub fn add_alias(&mut self, name: &str, t: Rc<TypeInfo>) {
        self.name_to_type.insert(name.to_string(), t);
    }

    // Lays out fields in order, with natural alignment.
    pub fn add_struct(&mut self, name: &str, fields: &[(&str, Rc<TypeInfo>)]) -> Rc<TypeInfo> {
        let t = self.make_struct(name, fields, TypeFlags::empty());
        self.add(t)
    }

    fn make_struct(&self, name: &str, fields: &[(&str, Rc<TypeInfo>)], flags: TypeFlags) -> TypeInfo {
        let mut s = StructType::default();
        let (mut offset, mut align) = (0usize, 1usize);
        for (field_name, type_) in fields {
            let a = type_.alignment(self.word_size);
            offset = (offset + a - 1) / a * a;
            align = align.max(a);
            s.fields.push(StructField {name: field_name.to_string(), offset, type_: type_.clone()});
            offset += type_.size;
        }
        let size = (offset + align - 1) / align * align;
        TypeInfo {name: name.to_string(), size, flags, t: Type::Struct(s)}
    }

    pub fn pointer_to(&self, t: Rc<TypeInfo>, flags: PointerFlags) -> Rc<TypeInfo> {
        let name = format!("{}{}", t.name, if flags.contains(PointerFlags::REFERENCE) {"&"} else {"*"});
        Rc::new(TypeInfo {name, size: self.word_size, flags: TypeFlags::empty(), t: Type::Pointer(PointerType {flags, type_: t})})
    }

    pub fn array_of(&self, t: Rc<TypeInfo>, len: usize, flags: ArrayFlags) -> Rc<TypeInfo> {
        let name = if flags.contains(ArrayFlags::VECTOR) {format!("__vector({}[{}])", t.name, len)} else {format!("{}[{}]", t.name, len)};
        Rc::new(TypeInfo {name, size: t.size.saturating_mul(len), flags: TypeFlags::empty(), t: Type::Array(ArrayType {flags, type_: t, len})})
    }

    // T[]: {size_t length; T* ptr;}
    pub fn dynamic_array_of(&self, elem: Rc<TypeInfo>, name: &str) -> Rc<TypeInfo> {
        let ptr = self.pointer_to(elem, PointerFlags::empty());
        Rc::new(self.make_struct(name, &[("length", self.builtin.size_t.clone()), ("ptr", ptr)], TypeFlags::DYNAMIC_ARRAY))
    }

    // V[K]: {Impl* ptr;}. Key and value types are recovered from the name when printing.
    pub fn assoc_array(&self, name: &str) -> Rc<TypeInfo> {
        Rc::new(self.make_struct(name, &[("ptr", self.builtin.void_pointer.clone())], TypeFlags::ASSOC_ARRAY))
    }

    pub fn find_by_name(&self, name: &str) -> Option<Rc<TypeInfo>> {
        self.name_to_type.get(name).cloned()
    }

    // Resolves a D type expression like "immutable(char)[]", "int*[4]", "Foo[string]".
    // Returns None if some part of it isn't a known type.
    pub fn resolve(&self, expr: &str) -> Option<Rc<TypeInfo>> {
        self.resolve_recurse(expr, 0)
    }

    fn resolve_recurse(&self, expr: &str, depth: usize) -> Option<Rc<TypeInfo>> {
        let s = expr.trim();
        if s.is_empty() || depth > 32 {
            return None;
        }
        if let Some(t) = self.find_by_name(s) {
            return Some(t);
        }
        if let Some(inner) = s.strip_suffix('*') {
            let t = self.resolve_recurse(inner, depth + 1)?;
            let mut p = (*self.pointer_to(t, PointerFlags::empty())).clone();
            p.name = s.to_string();
            return Some(Rc::new(p));
        }
        if s.ends_with(']') {
            let (outer, inner) = split_bracketed(s)?;
            let elem = self.resolve_recurse(outer, depth + 1)?;
            let inner = inner.trim();
            if inner.is_empty() {
                return Some(self.dynamic_array_of(elem, s));
            }
            if let Ok(len) = inner.parse::<usize>() {
                let mut a = (*self.array_of(elem, len, ArrayFlags::empty())).clone();
                a.name = s.to_string();
                return Some(Rc::new(a));
            }
            return Some(self.assoc_array(s));
        }
        // Type qualifiers don't affect layout: const(T), immutable(T), shared(T), inout(T), or the prefix form "const T".
        for q in ["const", "immutable", "shared", "inout"] {
            if let Some(rest) = s.strip_prefix(q) {
                if let Some(inner) = rest.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
                    return self.resolve_recurse(inner, depth + 1);
                }
                if rest.starts_with(' ') {
                    return self.resolve_recurse(rest, depth + 1);
                }
            }
        }
        if let Some(inner) = s.strip_prefix("__vector(").and_then(|r| r.strip_suffix(')')) {
            let t = self.resolve_recurse(inner, depth + 1)?;
            let a = t.t.as_array()?;
            return Some(self.array_of(a.type_.clone(), a.len, ArrayFlags::VECTOR));
        }
        if is_dmd_aa_name(s) {
            return Some(self.assoc_array(s));
        }
        if let Some(elem) = s.strip_prefix("_Array_") {
            let elem = self.find_by_name(elem).unwrap_or_else(|| self.builtin.unknown.clone());
            return Some(self.dynamic_array_of(elem, s));
        }
        None
    }
}
