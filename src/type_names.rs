// Recovering key and value types of an associative array from its type name.
//
// Compilers name AA types in debug info in one of two ways:
//  * DMD: "_AArray_<key>_<value>", where key and value are DMD backend type names (see dmd_types.rs),
//    e.g. "_AArray_int_uint" or "_AArray_char16_t_int". Ambiguous in general, since the fragments may contain underscores.
//    For types the backend can't name, the fragment is literally "key" or "value".
//  * LDC: plain D syntax, "<value>[<key>]", e.g. "int[string]" or "int[][immutable(char)[]]".

pub const DMD_AA_PREFIX: &str = "_AArray_";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeName {
    Unknown,
    // DMD backend type name fragment, to be looked up in the legacy table.
    Dmd(String),
    // D type expression, to be resolved by the host.
    Expr(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AATypeNames {
    pub key: TypeName,
    pub value: TypeName,
}
impl AATypeNames {
    pub fn unknown() -> Self { Self {key: TypeName::Unknown, value: TypeName::Unknown} }
}

pub fn is_dmd_aa_name(name: &str) -> bool { name.starts_with(DMD_AA_PREFIX) }
pub fn is_bracketed_aa_name(name: &str) -> bool { name.ends_with(']') }

// Never fails: whatever can't be recovered stays Unknown.
pub fn decode_aa_type_name(name: &str) -> AATypeNames {
    if let Some(rest) = name.strip_prefix(DMD_AA_PREFIX) {
        decode_dmd(rest)
    } else if is_bracketed_aa_name(name) {
        decode_bracketed(name)
    } else {
        AATypeNames::unknown()
    }
}

fn decode_dmd(rest: &str) -> AATypeNames {
    // Type names may start with '_', but none that start with '_' is shorter than 3 characters, so skip the first 2.
    let from = if rest.starts_with('_') {2} else {0};
    let mut split = match rest.get(from..).and_then(|s| s.find('_')) {
        Some(i) => i + from,
        None => return AATypeNames::unknown(),
    };
    // Some type names end with "_t" (char16_t, wchar_t); don't split inside them.
    if rest[split..].starts_with("_t_") {
        split += 2;
    }
    let (key, value) = (&rest[..split], &rest[split+1..]);
    AATypeNames {
        key: if key == "key" || key.is_empty() {TypeName::Unknown} else {TypeName::Dmd(key.to_string())},
        value: if value == "value" || value.is_empty() {TypeName::Unknown} else {TypeName::Dmd(value.to_string())},
    }
}

fn decode_bracketed(name: &str) -> AATypeNames {
    let Some((value, key)) = split_bracketed(name) else { return AATypeNames::unknown() };
    let (value, key) = (value.trim_end(), key.trim());
    AATypeNames {
        key: if key.is_empty() {TypeName::Unknown} else {TypeName::Expr(key.to_string())},
        value: if value.is_empty() {TypeName::Unknown} else {TypeName::Expr(value.to_string())},
    }
}

// For "<outer>[<inner>]", finds the '[' matching the last ']' and returns (outer, inner).
// E.g. "int[][string[]]" -> ("int[]", "string[]"). None if `s` doesn't end with ']' or brackets don't balance.
pub fn split_bracketed(s: &str) -> Option<(&str, &str)> {
    let bytes = s.as_bytes();
    if bytes.last() != Some(&b']') {
        return None;
    }
    let mut depth = 0usize;
    for i in (0..bytes.len()).rev() {
        match bytes[i] {
            b']' => depth += 1,
            b'[' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some((&s[..i], &s[i+1..s.len()-1]));
                }
            }
            _ => (),
        }
    }
    None
}
