use crate::{*, error::*, types::*, value::*, host::*, aa::*, type_names::*, dmd_types::*};
use std::rc::Rc;

// The parts of D container printing that don't depend on the host debugger: reading slices, decoding strings,
// resolving an AA's key/value types and turning its entries into (key label, value) children.
// gdb.rs and lldb.rs wrap these into their hosts' printer protocols.

// Type name patterns the printers are registered for. Same for both hosts.
pub const STRING_PATTERN: &str = r"^_Array_char$|^_Array_char8_t$|^string$|^(?:const|immutable)?\(?char\)?\s*\[\]$";
pub const WSTRING_PATTERN: &str = r"^_Array_wchar_t$|^_Array_char16_t$|^wstring$|^(?:const|immutable)?\(?wchar\)?\s*\[\]$";
pub const DSTRING_PATTERN: &str = r"^_Array_dchar$|^dstring$|^(?:const|immutable)?\(?dchar\)?\s*\[\]$";
pub const ARRAY_PATTERN: &str = r"^_Array_|\[\]$";
// Ends with "[...]", but not "[N]" (static array).
pub const ASSOC_ARRAY_PATTERN: &str = r"^_AArray_|[^0-9\[][^\[]*\]$";

#[derive(Clone, Debug)]
pub struct Child {
    pub name: String,
    pub value: Value,
}

// T[]: {size_t length; T* ptr;}
#[derive(Clone, Debug)]
pub struct ArrayView {
    pub len: usize,
    pub ptr: usize,
    pub elem: Rc<TypeInfo>,
}

impl ArrayView {
    pub fn read<D: Debuggee + ?Sized>(host: &mut D, v: &Value) -> Result<Self> {
        let len = v.field("length")?.read_unsigned(host.memory())?;
        let ptr = v.field("ptr")?;
        let elem = match ptr.type_.t.as_pointer() {
            Some(p) => p.type_.clone(),
            None => return err!(TypeMismatch, "{}.ptr is not a pointer", v.type_),
        };
        // void[] is bytes.
        let elem = if matches!(elem.t, Type::Void) {host.types().find_by_name("ubyte").unwrap_or(elem)} else {elem};
        Ok(Self {len, ptr: ptr.read_unsigned(host.memory())?, elem})
    }

    pub fn element(&self, i: usize) -> Option<Value> {
        if i >= self.len {
            return None;
        }
        Some(Value::at(self.ptr.wrapping_add(i.wrapping_mul(self.elem.size)), self.elem.clone()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodeUnit {
    Utf8,
    Utf16,
    Utf32,
}

impl CodeUnit {
    pub fn size(self) -> usize { match self { Self::Utf8 => 1, Self::Utf16 => 2, Self::Utf32 => 4 } }
    // D string literal suffix.
    pub fn suffix(self) -> &'static str { match self { Self::Utf8 => "", Self::Utf16 => "w", Self::Utf32 => "d" } }

    pub fn element_type(self, types: &Types) -> Rc<TypeInfo> {
        match self {
            Self::Utf8 => types.builtin.char_.clone(),
            Self::Utf16 => types.builtin.wchar.clone(),
            Self::Utf32 => types.builtin.dchar.clone(),
        }
    }
}

// Invalid sequences become U+FFFD.
pub fn decode_code_units(bytes: &[u8], unit: CodeUnit) -> String {
    match unit {
        CodeUnit::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        CodeUnit::Utf16 => {
            let units = bytes.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]]));
            char::decode_utf16(units).map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER)).collect()
        }
        CodeUnit::Utf32 => bytes.chunks_exact(4).map(|c| char::from_u32(u32::from_le_bytes([c[0], c[1], c[2], c[3]])).unwrap_or(char::REPLACEMENT_CHARACTER)).collect(),
    }
}

#[derive(Clone, Debug)]
pub struct StringView {
    pub array: ArrayView,
    pub unit: CodeUnit,
}

impl StringView {
    pub fn read<D: Debuggee + ?Sized>(host: &mut D, v: &Value, unit: CodeUnit) -> Result<Self> {
        let mut array = ArrayView::read(host, v)?;
        // The pointer type may be anything from char* to ubyte*, the printer decides the encoding.
        array.elem = unit.element_type(host.types());
        Ok(Self {array, unit})
    }

    // Decoded contents. Uninitialized slices tend to have garbage lengths, so at most max_string_len code units are read,
    // and "..." is appended if the string is longer.
    pub fn text<D: Debuggee + ?Sized>(&self, host: &mut D) -> Result<String> {
        let max = host.settings().max_string_len;
        let n = self.array.len.min(max);
        let mut s = if n == 0 {
            String::new()
        } else {
            let bytes = host.memory().read_vec(self.array.ptr, n * self.unit.size())?;
            decode_code_units(&bytes, self.unit)
        };
        if self.array.len > max {
            s.push_str("...");
        }
        Ok(s)
    }

    pub fn quoted<D: Debuggee + ?Sized>(&self, host: &mut D) -> Result<String> {
        let text = self.text(host)?;
        Ok(format!("\"{}\"", escape_string(&text, host.settings().string_escaping)))
    }
}

// Key/value types are resolved once, when the view is created. Memory is re-read on every request.
#[derive(Clone, Debug)]
pub struct AssocArrayView {
    pub names: AATypeNames,
    pub key_type: Rc<TypeInfo>,
    pub value_type: Rc<TypeInfo>,
    pub layout: AALayout,
}

impl AssocArrayView {
    pub fn read<D: Debuggee + ?Sized>(host: &mut D, v: &Value) -> Result<Self> {
        let names = decode_aa_type_name(&v.type_.name);
        let key_type = resolve_type_name(host, &names.key);
        let value_type = resolve_type_name(host, &names.value);
        // Normally a struct {Impl* ptr;}, but some compilers describe the AA as a bare pointer.
        let handle = match &v.type_.t {
            Type::Struct(_) => v.field("ptr")?,
            _ => Value {val: v.val.clone(), type_: host.types().builtin.void_pointer.clone()},
        };
        let impl_ptr = handle.read_unsigned(host.memory())?;
        let (word_size, pointer_size) = (host.word_size(), host.pointer_size());
        let layout = AALayout::read(host.memory(), impl_ptr, word_size, pointer_size)?;
        Ok(Self {names, key_type, value_type, layout})
    }

    pub fn len(&self) -> usize { self.layout.visible_len() }

    pub fn entries(&self) -> OccupiedEntries { self.layout.cursor() }

    pub fn entry<D: Debuggee + ?Sized>(&self, host: &mut D, entry_addr: usize) -> AAEntry {
        materialize_entry(host, entry_addr, &self.key_type, &self.value_type, self.layout.valoff as usize)
    }

    pub fn check_walked_count<D: Debuggee + ?Sized>(&self, host: &mut D, walked: usize) {
        if walked != self.len() {
            log!(host.log(), "AA @0x{:x}: found {} filled buckets, but used - deleted = {}", self.layout.impl_ptr, walked, self.len());
        }
    }
}

// Unknown names, and names that resolve to void, become the opaque type.
pub fn resolve_type_name<D: Debuggee + ?Sized>(host: &D, name: &TypeName) -> Rc<TypeInfo> {
    let t = match name {
        TypeName::Unknown => return host.opaque(),
        TypeName::Dmd(fragment) => resolve_dmd_type(host, fragment),
        TypeName::Expr(expr) => match host.resolve_type(expr) {
            Some(t) => t,
            None => return host.opaque(),
        },
    };
    if matches!(t.t, Type::Void) {host.opaque()} else {t}
}

#[derive(Clone, Debug)]
pub struct AAEntry {
    pub key_label: String,
    pub value: Value,
}

pub fn opaque_key_label(entry_addr: usize) -> String { format!("[(void*) 0x{:x}]", entry_addr) }

// Key at entry_addr, value at entry_addr + valoff. Keys are shown as the host would show them (so string keys are quoted);
// keys of unknown type, or that can't be read, are shown as the entry address.
// Values of unknown type become a void* pointing at the value.
pub fn materialize_entry<D: Debuggee + ?Sized>(host: &mut D, entry_addr: usize, key_type: &Rc<TypeInfo>, value_type: &Rc<TypeInfo>, valoff: usize) -> AAEntry {
    let key_label = if key_type.is_opaque() {
        opaque_key_label(entry_addr)
    } else {
        match try_format_value(host, &Value::at(entry_addr, key_type.clone())) {
            Ok(s) => s,
            Err(e) => {
                log!(host.log(), "AA key @0x{:x}: {}", entry_addr, e);
                opaque_key_label(entry_addr)
            }
        }
    };
    let value_addr = entry_addr.wrapping_add(valoff);
    let value = if value_type.is_opaque() {
        Value::from_usize(value_addr, host.types().builtin.void_pointer.clone())
    } else {
        Value::at(value_addr, value_type.clone())
    };
    AAEntry {key_label, value}
}

#[cfg(test)]
mod tests {
    use crate::{*, pretty::*, gdb::*, lldb::*, fixtures::*, host::*, value::*, settings::*, types::*, type_names::*};

    fn gdb(mem: MemoryBuilder) -> GdbHost { GdbHost::new(HostContext::for_tests(mem.build())) }

    #[test]
    fn decode_units() {
        assert_eq!(decode_code_units("añ✓".as_bytes(), CodeUnit::Utf8), "añ✓");
        assert_eq!(decode_code_units(&[b'a', 0xff, b'b'], CodeUnit::Utf8), "a\u{fffd}b");
        let w: Vec<u8> = "h€𝄞".encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        assert_eq!(decode_code_units(&w, CodeUnit::Utf16), "h€𝄞");
        assert_eq!(decode_code_units(&[0x00, 0xd8, 0x41, 0x00], CodeUnit::Utf16), "\u{fffd}A");
        let d: Vec<u8> = [0x41u32, 0x1f600, 0x110000].iter().flat_map(|c| c.to_le_bytes()).collect();
        assert_eq!(decode_code_units(&d, CodeUnit::Utf32), "A😀\u{fffd}");
    }

    #[test]
    fn string_view() {
        let mut mem = MemoryBuilder::new(8);
        let s = mem.string("hello\tworld");
        let a = mem.alloc(s);
        let w = mem.wstring("wide");
        let b = mem.alloc(w);
        let empty = mem.slice(0, 0);
        let c = mem.alloc(empty);
        let mut h = gdb(mem);
        let string = h.types().resolve("string").unwrap();
        let wstring = h.types().resolve("wstring").unwrap();

        let v = StringView::read(&mut h, &Value::at(a, string.clone()), CodeUnit::Utf8).unwrap();
        assert_eq!(v.array.len, 11);
        assert_eq!(v.text(&mut h).unwrap(), "hello\tworld");
        assert_eq!(v.quoted(&mut h).unwrap(), "\"hello\\tworld\"");
        h.context.settings.max_string_len = 5;
        assert_eq!(v.text(&mut h).unwrap(), "hello...");
        h.context.settings.max_string_len = 10000;

        let v = StringView::read(&mut h, &Value::at(b, wstring), CodeUnit::Utf16).unwrap();
        assert_eq!(v.text(&mut h).unwrap(), "wide");

        // Empty slice with null pointer: nothing to read.
        let v = StringView::read(&mut h, &Value::at(c, string), CodeUnit::Utf8).unwrap();
        assert_eq!(v.text(&mut h).unwrap(), "");
    }

    #[test]
    fn array_view() {
        let mut mem = MemoryBuilder::new(8);
        let data = mem.alloc(vec![1, 0, 0, 0, 2, 0, 0, 0]);
        let s = mem.slice(2, data);
        let a = mem.alloc(s);
        let mut h = gdb(mem);
        let t = h.types().resolve("int[]").unwrap();
        let view = ArrayView::read(&mut h, &Value::at(a, t)).unwrap();
        assert_eq!((view.len, view.ptr), (2, data));
        assert_eq!(format_value(&mut h, &view.element(1).unwrap()), "2");
        assert!(view.element(2).is_none());

        let int = h.types().resolve("int").unwrap();
        assert!(ArrayView::read(&mut h, &Value::at(a, int)).unwrap_err().is_not_container());
    }

    #[test]
    fn type_name_resolution() {
        let h = gdb(MemoryBuilder::new(8));
        assert!(resolve_type_name(&h, &TypeName::Unknown).is_opaque());
        assert_eq!(resolve_type_name(&h, &TypeName::Dmd("uns long long".to_string())).name, "ulong");
        assert_eq!(resolve_type_name(&h, &TypeName::Expr("immutable(char)[]".to_string())).size, 16);
        let f = resolve_type_name(&h, &TypeName::Dmd("frobnicate".to_string()));
        assert!(f.is_opaque());
        assert!(resolve_type_name(&h, &TypeName::Expr("Frobnicate".to_string())).is_opaque());
        assert!(resolve_type_name(&h, &TypeName::Expr("void".to_string())).is_opaque());
    }

    #[test]
    fn entries() {
        let mut mem = MemoryBuilder::new(8);
        let e = mem.entry(&[7, 0, 0, 0], &[9, 0, 0, 0], 8);
        let mut h = gdb(mem);
        let int = h.types().resolve("int").unwrap();
        let opaque = h.opaque();

        let ent = materialize_entry(&mut h, e, &int, &int, 8);
        assert_eq!(ent.key_label, "7");
        assert_eq!(format_value(&mut h, &ent.value), "9");

        let ent = materialize_entry(&mut h, e, &opaque, &opaque, 8);
        assert_eq!(ent.key_label, format!("[(void*) 0x{:x}]", e));
        assert_eq!(format_value(&mut h, &ent.value), format!("(void*) 0x{:x}", e + 8));

        // Stale entry pointer.
        let ent = materialize_entry(&mut h, 0x4000, &int, &int, 8);
        assert_eq!(ent.key_label, "[(void*) 0x4000]");
        assert_eq!(format_value(&mut h, &ent.value), "<error: bad address>");
        assert!(h.context.log.contains("AA key @0x4000"));
    }

    #[test]
    fn assoc_array_view() {
        let mut mem = MemoryBuilder::new(8);
        let a = mem.entry(&[1, 0, 0, 0], &[10, 0, 0, 0], 4);
        let b = mem.entry(&[2, 0, 0, 0], &[20, 0, 0, 0], 4);
        let aa = mem.aa(&AABuilder {buckets: vec![(filled(8, 1), a), (filled(8, 2), 0), (0, 0), (filled(8, 3), b)], used: 3, deleted: 1, valoff: 4});
        let handle = mem.word(aa);
        let v = mem.alloc(handle);
        let mut h = gdb(mem);
        let t = h.types().resolve("_AArray_int_uint").unwrap();
        let view = AssocArrayView::read(&mut h, &Value::at(v, t)).unwrap();
        assert_eq!(view.names, AATypeNames {key: TypeName::Dmd("int".to_string()), value: TypeName::Dmd("uint".to_string())});
        assert_eq!((view.key_type.name.as_str(), view.value_type.name.as_str()), ("int", "uint"));
        assert_eq!(view.len(), 2);

        let mut cursor = view.entries();
        let mut labels: Vec<String> = Vec::new();
        while let Some(e) = cursor.next_entry(h.memory()) {
            let e = view.entry(&mut h, e.unwrap());
            labels.push(format!("{} = {}", e.key_label, format_value(&mut h, &e.value)));
        }
        assert_eq!(labels, vec!["1 = 10", "2 = 20"]);
        view.check_walked_count(&mut h, 2);
        assert!(!h.context.log.contains("filled buckets"));
        view.check_walked_count(&mut h, 3);
        assert!(h.context.log.contains("found 3 filled buckets, but used - deleted = 2"));
    }

    #[test]
    fn unknown_fragment_on_both_hosts() {
        let mut mem = MemoryBuilder::new(8);
        let e = mem.entry(&[1, 2, 3, 4], &[5, 0, 0, 0], 8);
        let ranges = mem.build();
        let mut g = GdbHost::new(HostContext::for_tests(ranges.clone()));
        let mut l = LldbHost::new(HostContext::for_tests(ranges));
        for host in [&mut g as &mut dyn Debuggee, &mut l as &mut dyn Debuggee] {
            let key = resolve_type_name(host, &TypeName::Dmd("frobnicate".to_string()));
            let value = resolve_type_name(host, &TypeName::Dmd("int".to_string()));
            let ent = materialize_entry(host, e, &key, &value, 8);
            assert_eq!(ent.key_label, format!("[(void*) 0x{:x}]", e));
            assert_eq!(format_value(host, &ent.value), "5");
        }
    }
}
