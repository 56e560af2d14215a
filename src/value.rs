use crate::{*, error::*, memory::*, types::*, host::*, settings::*};
use std::{rc::Rc, fmt::Write, ops::Range};

// Just a byte array that avoids heap allocation if length is <= 24 bytes.
// Doesn't store an exact length. The length is determined by data type, stored separately.
#[derive(Debug, Clone)]
pub enum ValueBlob {
    Small([u8; 24]),
    Big(Vec<u8>),
}

impl ValueBlob {
    pub fn new(v: usize) -> Self {
        let mut a = [0u8; 24];
        a[..8].copy_from_slice(&(v as u64).to_le_bytes());
        Self::Small(a)
    }

    pub fn with_capacity(bytes: usize) -> Self {
        if bytes <= 24 {
            Self::Small([0; 24])
        } else {
            Self::Big(vec![0; bytes])
        }
    }

    pub fn from_slice(s: &[u8]) -> Self {
        let mut r = Self::with_capacity(s.len());
        r.as_mut_slice()[..s.len()].copy_from_slice(s);
        r
    }

    pub fn as_slice(&self) -> &[u8] { match self { Self::Small(a) => &a[..], Self::Big(v) => &v[..] } }
    pub fn as_mut_slice(&mut self) -> &mut [u8] { match self { Self::Small(a) => &mut a[..], Self::Big(v) => &mut v[..] } }
    pub fn capacity(&self) -> usize { self.as_slice().len() }

    pub fn get_usize_prefix(&self) -> usize {
        let mut a = [0u8; 8];
        a.copy_from_slice(&self.as_slice()[..8]);
        u64::from_le_bytes(a) as usize
    }

    // Little-endian unsigned integer of 1..=8 bytes.
    pub fn get_uint(&self, offset: usize, size: usize) -> Result<u64> {
        let s = self.as_slice();
        if size == 0 || size > 8 || offset.saturating_add(size) > s.len() {
            return err!(Internal, "blob read out of bounds: {}+{} > {}", offset, size, s.len());
        }
        let mut a = [0u8; 8];
        a[..size].copy_from_slice(&s[offset..offset+size]);
        Ok(u64::from_le_bytes(a))
    }

    pub fn byte_range(&self, r: Range<usize>) -> Result<Self> {
        let slice = self.as_slice();
        if r.start > r.end || r.end > slice.len() {
            return err!(Runtime, "blob slice out of bounds: [{}, {}) > {}", r.start, r.end, slice.len());
        }
        Ok(Self::from_slice(&slice[r]))
    }
}

// Values read straight from memory are kept as an address until someone needs the bytes,
// so that e.g. a string's characters are only read when the string is printed.
#[derive(Debug, Clone)]
pub enum AddrOrValueBlob {
    Addr(usize),
    Blob(ValueBlob),
}

impl AddrOrValueBlob {
    pub fn into_value(self, bytes: usize, memory: &mut CachedMemReader) -> Result<ValueBlob> {
        Ok(match self {
            Self::Blob(b) => {
                if b.capacity() < bytes {
                    return err!(Internal, "value too short: {} < {}", b.capacity(), bytes);
                }
                b
            }
            Self::Addr(a) => {
                let mut b = ValueBlob::with_capacity(bytes);
                memory.read(a, &mut b.as_mut_slice()[..bytes])?;
                b
            }
        })
    }

    pub fn addr(&self) -> Option<usize> { match self { Self::Addr(a) => Some(*a), _ => None } }
}

#[derive(Debug, Clone)]
pub struct Value {
    pub val: AddrOrValueBlob,
    pub type_: Rc<TypeInfo>,
}

impl Value {
    pub fn at(addr: usize, type_: Rc<TypeInfo>) -> Self { Self {val: AddrOrValueBlob::Addr(addr), type_} }
    pub fn from_usize(x: usize, type_: Rc<TypeInfo>) -> Self { Self {val: AddrOrValueBlob::Blob(ValueBlob::new(x)), type_} }

    pub fn addr(&self) -> Option<usize> { self.val.addr() }

    pub fn read(&self, memory: &mut CachedMemReader) -> Result<ValueBlob> {
        self.val.clone().into_value(self.type_.size, memory)
    }

    // Integer or pointer of up to 8 bytes, zero-extended.
    pub fn read_unsigned(&self, memory: &mut CachedMemReader) -> Result<usize> {
        let size = self.type_.size;
        if size == 0 || size > 8 {
            return err!(TypeMismatch, "expected an integer, got {} ({} bytes)", self.type_, size);
        }
        Ok(self.read(memory)?.get_uint(0, size)? as usize)
    }

    pub fn field(&self, name: &str) -> Result<Value> {
        let s = match self.type_.t.as_struct() {
            Some(s) => s,
            None => return err!(NotContainer, "{} is not a struct", self.type_),
        };
        let f = match s.field(name) {
            Some(f) => f,
            None => return err!(NoField, "{} has no field '{}'", self.type_, name),
        };
        let val = match &self.val {
            AddrOrValueBlob::Addr(a) => AddrOrValueBlob::Addr(a + f.offset),
            AddrOrValueBlob::Blob(b) => AddrOrValueBlob::Blob(b.byte_range(f.offset..f.offset + f.type_.size)?),
        };
        Ok(Value {val, type_: f.type_.clone()})
    }

    // i-th element of a static array or vector.
    pub fn element(&self, i: usize) -> Result<Value> {
        let a = match self.type_.t.as_array() {
            Some(a) => a,
            None => return err!(NotContainer, "{} is not an array", self.type_),
        };
        if i >= a.len {
            return err!(Runtime, "index {} out of bounds ({})", i, a.len);
        }
        let size = a.type_.size;
        let val = match &self.val {
            AddrOrValueBlob::Addr(addr) => AddrOrValueBlob::Addr(addr + i * size),
            AddrOrValueBlob::Blob(b) => AddrOrValueBlob::Blob(b.byte_range(i * size..(i + 1) * size)?),
        };
        Ok(Value {val, type_: a.type_.clone()})
    }
}

pub const MAX_NESTING: usize = 8;
const MAX_OUTPUT_LEN: usize = 10000;

// Renders any value on one line. Never fails: unreadable memory becomes "<error: ...>" (and a log line).
pub fn format_value<D: Debuggee + ?Sized>(host: &mut D, v: &Value) -> String {
    match try_format_value(host, v) {
        Ok(s) => s,
        Err(e) => {
            log!(host.log(), "{} @{:?}: {}", v.type_, v.addr(), e);
            format!("<error: {}>", e)
        }
    }
}

pub fn try_format_value<D: Debuggee + ?Sized>(host: &mut D, v: &Value) -> Result<String> {
    let mut out = String::new();
    format_value_recurse(host, v, &mut out)?;
    Ok(out)
}

fn summarize_nested<D: Debuggee + ?Sized>(host: &mut D, v: &Value) -> Option<Result<String>> {
    if host.context().nesting >= MAX_NESTING {
        return Some(Ok("{...}".to_string()));
    }
    host.context_mut().nesting += 1;
    let r = host.summarize(v);
    host.context_mut().nesting -= 1;
    r
}

// A field or element that can't be shown becomes "<error: ...>" in place, its siblings are unaffected.
fn format_member<D: Debuggee + ?Sized>(host: &mut D, member: Result<Value>, out: &mut String) {
    let mark = out.len();
    let e = match member {
        Ok(m) => match format_value_recurse(host, &m, out) {
            Ok(()) => return,
            Err(e) => {
                log!(host.log(), "{} @{:?}: {}", m.type_, m.addr(), e);
                e
            }
        },
        Err(e) => {
            log!(host.log(), "{}", e);
            e
        }
    };
    out.truncate(mark);
    let _ = write!(out, "<error: {}>", e);
}

fn format_value_recurse<D: Debuggee + ?Sized>(host: &mut D, v: &Value, out: &mut String) -> Result<()> {
    if out.len() > MAX_OUTPUT_LEN {
        out.push_str("...");
        return Ok(());
    }
    let t = v.type_.clone();
    if let Type::Struct(_) = &t.t {
        if let Some(r) = summarize_nested(host, v) {
            out.push_str(&r?);
            return Ok(());
        }
    }
    match &t.t {
        Type::Unknown => {
            // No layout: show where it is.
            let x = match &v.val {
                AddrOrValueBlob::Addr(a) => *a,
                AddrOrValueBlob::Blob(b) => b.get_usize_prefix(),
            };
            write!(out, "0x{:x}", x)?;
        }
        Type::Void => out.push_str("void"),
        &Type::Primitive(p) => {
            let blob = v.read(host.memory())?;
            let escaping = host.settings().string_escaping;
            format_primitive(p, t.size, &blob.as_slice()[..t.size], escaping, out)?;
        }
        Type::Pointer(p) => {
            let x = v.read_unsigned(host.memory())?;
            if p.flags.contains(PointerFlags::REFERENCE) {
                if let Type::Void = p.type_.t {
                    write!(out, "(void&) 0x{:x}", x)?;
                } else {
                    format_value_recurse(host, &Value::at(x, p.type_.clone()), out)?;
                }
            } else if let Type::Void = p.type_.t {
                write!(out, "(void*) 0x{:x}", x)?;
            } else if x == 0 {
                out.push_str("null");
            } else {
                write!(out, "0x{:x}", x)?;
            }
        }
        Type::Array(a) => {
            let (open, close) = if a.flags.contains(ArrayFlags::VECTOR) {("{", "}")} else {("[", "]")};
            out.push_str(open);
            let n = a.len.min(host.settings().max_array_elements);
            for i in 0..n {
                if i != 0 {
                    out.push_str(", ");
                }
                format_member(host, v.element(i), out);
            }
            if a.len > n {
                out.push_str(", ...");
            }
            out.push_str(close);
        }
        Type::Struct(s) => {
            out.push('{');
            for (idx, f) in s.fields.iter().enumerate() {
                if idx != 0 {
                    out.push_str(", ");
                }
                write!(out, "{}: ", f.name)?;
                format_member(host, v.field(&f.name), out);
            }
            out.push('}');
        }
    }
    Ok(())
}

fn format_primitive(p: PrimitiveFlags, size: usize, bytes: &[u8], escaping: StringEscaping, out: &mut String) -> Result<()> {
    if p.contains(PrimitiveFlags::COMPLEX) {
        let half = size / 2;
        format_float(&bytes[..half], out)?;
        out.push_str(" + ");
        format_float(&bytes[half..], out)?;
        out.push('i');
        return Ok(());
    }
    if p.contains(PrimitiveFlags::FLOAT) {
        format_float(bytes, out)?;
        if p.contains(PrimitiveFlags::IMAGINARY) {
            out.push('i');
        }
        return Ok(());
    }
    if size == 16 {
        // cent/ucent
        let mut a = [0u8; 16];
        a.copy_from_slice(bytes);
        if p.contains(PrimitiveFlags::SIGNED) {
            write!(out, "{}", i128::from_le_bytes(a))?;
        } else {
            write!(out, "{}", u128::from_le_bytes(a))?;
        }
        return Ok(());
    }
    if size == 0 || size > 8 {
        write!(out, "<bad size: {}>", size)?;
        return Ok(());
    }
    let mut a = [0u8; 8];
    a[..size].copy_from_slice(bytes);
    let mut x = u64::from_le_bytes(a);

    if p.contains(PrimitiveFlags::CHAR) {
        // A single UTF-8 or UTF-16 code unit is only a character on its own below these limits.
        let limit = match size { 1 => 0x80, 2 => 0xd800, _ => 0x110000 };
        match char::from_u32(x as u32) {
            Some(c) if x < limit && !c.is_control() => write!(out, "{} '{}'", x, escape_string(&c.to_string(), escaping))?,
            _ => write!(out, "{}", x)?,
        }
    } else if p.contains(PrimitiveFlags::BOOL) {
        match x {
            0 => out.push_str("false"),
            1 => out.push_str("true"),
            _ => write!(out, "{}", x)?,
        }
    } else if p.contains(PrimitiveFlags::SIGNED) {
        // Sign-extend.
        if size < 8 && x & 1 << (size*8-1) as u32 != 0 {
            x |= !((1u64 << size*8)-1);
        }
        write!(out, "{}", x as i64)?;
    } else {
        write!(out, "{}", x)?;
    }
    Ok(())
}

fn format_float(bytes: &[u8], out: &mut String) -> Result<()> {
    match bytes.len() {
        4 => write!(out, "{:?}", f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))?,
        8 => {
            let mut a = [0u8; 8];
            a.copy_from_slice(bytes);
            write!(out, "{:?}", f64::from_le_bytes(a))?;
        }
        // x87 80-bit extended precision, possibly padded.
        10 | 12 | 16 => write!(out, "{:?}", f80_to_f64(bytes))?,
        n => write!(out, "<bad float size: {}>", n)?,
    }
    Ok(())
}

// Loses precision, good enough for display.
pub fn f80_to_f64(b: &[u8]) -> f64 {
    let mut m = [0u8; 8];
    m.copy_from_slice(&b[..8]);
    let mantissa = u64::from_le_bytes(m);
    let se = u16::from_le_bytes([b[8], b[9]]);
    let sign = if se & 0x8000 != 0 {-1.0} else {1.0};
    let exp = (se & 0x7fff) as i32;
    if exp == 0x7fff {
        return if mantissa << 1 == 0 {sign * f64::INFINITY} else {f64::NAN};
    }
    if mantissa == 0 {
        return sign * 0.0;
    }
    // The mantissa has an explicit integer bit, so value = mantissa * 2^(exp - bias - 63).
    let e = if exp == 0 {1 - 16383 - 63} else {exp - 16383 - 63};
    sign * (mantissa as f64) * 2f64.powi(e / 2) * 2f64.powi(e - e / 2)
}

// Control characters (U+0000..U+001F) according to the escaping mode.
pub fn escape_string(s: &str, mode: StringEscaping) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        let control = (c as u32) < 0x20;
        match mode {
            StringEscaping::None => out.push(c),
            StringEscaping::Remove => if !control { out.push(c) },
            StringEscaping::Unicode if control => out.push(char::from_u32(c as u32 + 0x2400).unwrap_or(c)),
            StringEscaping::Unicode => out.push(c),
            StringEscaping::Escape => match c {
                '\\' | '"' => {
                    out.push('\\');
                    out.push(c);
                }
                '\0' => out.push_str("\\0"),
                '\x07' => out.push_str("\\a"),
                '\x08' => out.push_str("\\b"),
                '\t' => out.push_str("\\t"),
                '\x0c' => out.push_str("\\f"),
                '\n' => out.push_str("\\n"),
                '\x0b' => out.push_str("\\v"),
                '\r' => out.push_str("\\r"),
                _ if control => { let _ = write!(out, "\\x{:02x}", c as u32); }
                _ => out.push(c),
            }
        }
    }
    out
}
