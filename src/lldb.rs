use crate::{*, error::*, types::*, value::*, host::*, pretty::*, aa::*};
use std::rc::Rc;
use regex::Regex;

// Formatters shaped after LLDB's Python API: a category of synthetic child providers and summaries, each attached to
// a type name (exact or regex). The providers don't keep the host; every call gets it passed in.

pub struct LldbHost {
    pub context: HostContext,
    pub category: Category,
}

impl Debuggee for LldbHost {
    fn context(&self) -> &HostContext { &self.context }
    fn context_mut(&mut self) -> &mut HostContext { &mut self.context }

    fn resolve_type(&self, name: &str) -> Option<Rc<TypeInfo>> { self.context.types.resolve(name) }

    // No vector types here, lanes are a plain fixed-size array.
    fn lanes_type(&self, elem: Rc<TypeInfo>, lanes: usize) -> Rc<TypeInfo> { self.context.types.array_of(elem, lanes, ArrayFlags::empty()) }

    fn summarize(&mut self, v: &Value) -> Option<Result<String>> { self.try_summary_for(v) }
}

impl LldbHost {
    pub fn new(context: HostContext) -> Self {
        let mut host = LldbHost {context, category: Category::new("D")};
        match build_category() {
            Ok(c) => host.category = c,
            Err(e) => log!(host.context.log, "failed to build D category: {}", e),
        }
        host
    }

    // A provider for the value's type, already update()d.
    pub fn synthetic_for(&mut self, v: &Value) -> Option<Box<dyn SyntheticProvider>> {
        let constructor = self.category.find_synthetic(&v.type_.name)?;
        let mut provider = constructor(v);
        provider.update(self);
        Some(provider)
    }

    // What LLDB shows next to the value. A summary that failed to read memory shows nothing (the error is in the log).
    pub fn summary_for(&mut self, v: &Value) -> Option<String> {
        self.try_summary_for(v)?.ok()
    }

    pub fn try_summary_for(&mut self, v: &Value) -> Option<Result<String>> {
        match self.category.find_summary(&v.type_.name)? {
            SummaryKind::Synthetic(constructor) => synth_summary(self, constructor, v),
            SummaryKind::Function(f) => f(self, v).map(Ok),
        }
    }

    // Summary if there is one, otherwise the value formatted structurally.
    pub fn print_value(&mut self, v: &Value) -> String {
        self.context.memory.invalidate();
        format_value(self, v)
    }

    pub fn children(&mut self, v: &Value) -> Vec<Child> {
        let mut provider = match self.synthetic_for(v) {
            Some(p) => p,
            None => return Vec::new(),
        };
        if !provider.has_children(self) {
            return Vec::new();
        }
        let n = provider.num_children(self).min(self.context.settings.max_array_elements);
        (0..n).filter_map(|i| provider.get_child_at_index(self, i)).collect()
    }

    fn refresh(&mut self) {
        if self.context.nesting == 0 {
            self.context.memory.invalidate();
        }
    }
}

pub trait SyntheticProvider {
    // Re-reads the value's state from memory. The return value means "children are cached", which they never are.
    fn update(&mut self, host: &mut LldbHost) -> bool { false }
    fn num_children(&mut self, host: &mut LldbHost) -> usize { 0 }
    fn has_children(&mut self, host: &mut LldbHost) -> bool { false }
    fn get_child_at_index(&mut self, host: &mut LldbHost, index: usize) -> Option<Child> { None }
    fn get_child_index(&mut self, host: &mut LldbHost, name: &str) -> Option<usize> { None }
    // Not part of LLDB's provider protocol, but lets the summary share the provider's reading code.
    // Err if the value couldn't be read.
    fn get_summary(&mut self, host: &mut LldbHost) -> Option<Result<String>> { None }
}

pub type ProviderConstructor = fn(&Value) -> Box<dyn SyntheticProvider>;
pub type SummaryFunction = fn(&mut LldbHost, &Value) -> Option<String>;

pub fn synth_summary(host: &mut LldbHost, constructor: ProviderConstructor, v: &Value) -> Option<Result<String>> {
    let mut provider = constructor(v);
    provider.update(host);
    provider.get_summary(host)
}

// Summary of a child inside another summary: the child's own summary, else its plain value; structs without a summary are elided.
pub fn obj_summary(host: &mut LldbHost, v: &Value) -> String {
    if host.context.nesting >= MAX_NESTING {
        return "{...}".to_string();
    }
    host.context.nesting += 1;
    let summary = host.try_summary_for(v);
    host.context.nesting -= 1;
    match summary {
        Some(Ok(s)) => s,
        Some(Err(e)) => format!("<error: {}>", e),
        None if v.type_.t.as_struct().is_some() => "{...}".to_string(),
        None => format_value(host, v),
    }
}

// "a, b, c". Stops adding children once summary_clip_len characters are reached, and gives up ("...") if the result is
// still longer than summary_max_len (e.g. one huge string).
pub fn sequence_summary(host: &mut LldbHost, provider: &mut dyn SyntheticProvider, shownames: bool) -> String {
    let (clip, max) = (host.context.settings.summary_clip_len, host.context.settings.summary_max_len);
    let mut s = String::new();
    let n = provider.num_children(host);
    for i in 0..n {
        if i > 0 {
            s.push_str(", ");
        }
        if s.chars().count() >= clip {
            s.push_str("...");
            break;
        }
        match provider.get_child_at_index(host, i) {
            None => s.push_str("<None>"),
            Some(c) => {
                if shownames {
                    s.push_str(&c.name);
                    s.push_str(" = ");
                }
                s.push_str(&obj_summary(host, &c.value));
            }
        }
    }
    if s.chars().count() > max {
        return "...".to_string();
    }
    s
}

fn log_update_error(host: &mut LldbHost, v: &Value, e: &Error) {
    log!(host.log(), "{} @{:?}: {}", v.type_, v.addr(), e);
}

pub struct DArrayProvider {
    value: Value,
    view: Option<ArrayView>,
    // Why the last update() failed.
    error: Option<Error>,
}

impl DArrayProvider {
    fn with_value(value: &Value) -> Self { Self {value: value.clone(), view: None, error: None} }
    pub fn new(value: &Value) -> Box<dyn SyntheticProvider> { Box::new(Self::with_value(value)) }
}

impl SyntheticProvider for DArrayProvider {
    fn update(&mut self, host: &mut LldbHost) -> bool {
        host.refresh();
        self.error = None;
        self.view = match ArrayView::read(host, &self.value) {
            Ok(v) => Some(v),
            Err(e) => {
                log_update_error(host, &self.value, &e);
                self.error = Some(e);
                None
            }
        };
        false
    }

    fn num_children(&mut self, host: &mut LldbHost) -> usize { self.view.as_ref().map_or(0, |v| v.len) }
    fn has_children(&mut self, host: &mut LldbHost) -> bool { true }

    fn get_child_at_index(&mut self, host: &mut LldbHost, index: usize) -> Option<Child> {
        let value = self.view.as_ref()?.element(index)?;
        Some(Child {name: format!("[{}]", index), value})
    }

    fn get_child_index(&mut self, host: &mut LldbHost, name: &str) -> Option<usize> {
        match name.trim_start_matches('[').trim_end_matches(']').parse::<usize>() {
            Ok(i) => Some(i),
            Err(e) => {
                log!(host.log(), "bad child name '{}': {}", name, e);
                None
            }
        }
    }

    fn get_summary(&mut self, host: &mut LldbHost) -> Option<Result<String>> {
        if let Some(e) = &self.error {
            return Some(Err(e.clone()));
        }
        self.view.as_ref()?;
        let n = self.num_children(host);
        Some(Ok(format!("[{}] {{{}}}", n, sequence_summary(host, self, false))))
    }
}

// Children are the code units (as for any array), but the value is shown only as its quoted text.
pub struct DStringProvider {
    array: DArrayProvider,
    unit: CodeUnit,
    view: Option<StringView>,
}

impl DStringProvider {
    fn with_unit(value: &Value, unit: CodeUnit) -> Box<dyn SyntheticProvider> {
        Box::new(Self {array: DArrayProvider::with_value(value), unit, view: None})
    }
    pub fn new_utf8(value: &Value) -> Box<dyn SyntheticProvider> { Self::with_unit(value, CodeUnit::Utf8) }
    pub fn new_utf16(value: &Value) -> Box<dyn SyntheticProvider> { Self::with_unit(value, CodeUnit::Utf16) }
    pub fn new_utf32(value: &Value) -> Box<dyn SyntheticProvider> { Self::with_unit(value, CodeUnit::Utf32) }
}

impl SyntheticProvider for DStringProvider {
    fn update(&mut self, host: &mut LldbHost) -> bool {
        host.refresh();
        self.array.error = None;
        self.view = match StringView::read(host, &self.array.value, self.unit) {
            Ok(v) => Some(v),
            Err(e) => {
                log_update_error(host, &self.array.value, &e);
                self.array.error = Some(e);
                None
            }
        };
        self.array.view = self.view.as_ref().map(|v| v.array.clone());
        false
    }

    fn num_children(&mut self, host: &mut LldbHost) -> usize { self.array.num_children(host) }
    fn has_children(&mut self, host: &mut LldbHost) -> bool { false }
    fn get_child_at_index(&mut self, host: &mut LldbHost, index: usize) -> Option<Child> { self.array.get_child_at_index(host, index) }
    fn get_child_index(&mut self, host: &mut LldbHost, name: &str) -> Option<usize> { self.array.get_child_index(host, name) }

    fn get_summary(&mut self, host: &mut LldbHost) -> Option<Result<String>> {
        if let Some(e) = &self.array.error {
            return Some(Err(e.clone()));
        }
        let view = self.view.as_ref()?;
        match view.quoted(host) {
            Ok(s) => Some(Ok(s + view.unit.suffix())),
            Err(e) => {
                log!(host.log(), "ReadMemory error: {}", e);
                Some(Err(e))
            }
        }
    }
}

struct AAWalk {
    view: AssocArrayView,
    cursor: OccupiedEntries,
    // Entry addresses found so far, in bucket order; child i is walked[i].
    walked: Vec<usize>,
    checked: bool,
}

pub struct DAssocArrayProvider {
    value: Value,
    walk: Option<AAWalk>,
    error: Option<Error>,
}

impl DAssocArrayProvider {
    pub fn new(value: &Value) -> Box<dyn SyntheticProvider> { Box::new(Self {value: value.clone(), walk: None, error: None}) }

    // Advances the bucket walk only as far as needed.
    fn entry_at(&mut self, host: &mut LldbHost, index: usize) -> Result<Option<usize>> {
        let w = match &mut self.walk {
            Some(w) => w,
            None => return Ok(None),
        };
        while w.walked.len() <= index {
            match w.cursor.next_entry(host.memory()) {
                Some(Ok(entry)) => w.walked.push(entry),
                Some(Err(e)) => {
                    log!(host.log(), "ReadMemory error: {}", e);
                    return Err(e);
                }
                None => {
                    if !w.checked {
                        w.view.check_walked_count(host, w.walked.len());
                        w.checked = true;
                    }
                    return Ok(None);
                }
            }
        }
        Ok(Some(w.walked[index]))
    }
}

impl SyntheticProvider for DAssocArrayProvider {
    fn update(&mut self, host: &mut LldbHost) -> bool {
        host.refresh();
        self.error = None;
        self.walk = match AssocArrayView::read(host, &self.value) {
            Ok(view) => Some(AAWalk {cursor: view.entries(), view, walked: Vec::new(), checked: false}),
            Err(e) => {
                log_update_error(host, &self.value, &e);
                self.error = Some(e);
                None
            }
        };
        false
    }

    fn num_children(&mut self, host: &mut LldbHost) -> usize { self.walk.as_ref().map_or(0, |w| w.view.len()) }
    fn has_children(&mut self, host: &mut LldbHost) -> bool { self.num_children(host) > 0 }

    fn get_child_at_index(&mut self, host: &mut LldbHost, index: usize) -> Option<Child> {
        let entry = match self.entry_at(host, index) {
            Ok(Some(e)) => e,
            Ok(None) => {
                let (found, len) = self.walk.as_ref().map_or((0, 0), |w| (w.walked.len(), w.view.len()));
                log!(host.log(), "not found index {}, remaining {}, len: {}", index, index - found, len);
                return None;
            }
            Err(_) => return None,
        };
        let e = self.walk.as_ref()?.view.entry(host, entry);
        Some(Child {name: e.key_label, value: e.value})
    }

    // Children are named by their key labels.
    fn get_child_index(&mut self, host: &mut LldbHost, name: &str) -> Option<usize> {
        let mut index = 0;
        while let Ok(Some(entry)) = self.entry_at(host, index) {
            if self.walk.as_ref()?.view.entry(host, entry).key_label == name {
                return Some(index);
            }
            index += 1;
        }
        None
    }

    fn get_summary(&mut self, host: &mut LldbHost) -> Option<Result<String>> {
        if let Some(e) = &self.error {
            return Some(Err(e.clone()));
        }
        self.walk.as_ref()?;
        let n = self.num_children(host);
        Some(Ok(format!("[{}] {{{}}}", n, sequence_summary(host, self, true))))
    }
}

pub enum TypeNameSpecifier {
    Exact(String),
    Regex(Regex),
}

impl TypeNameSpecifier {
    pub fn new(type_name: &str, is_regex: bool) -> Result<Self> {
        Ok(if is_regex {Self::Regex(Regex::new(type_name)?)} else {Self::Exact(type_name.to_string())})
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Exact(s) => s == name,
            Self::Regex(r) => r.is_match(name),
        }
    }
}

#[derive(Clone, Copy)]
pub enum SummaryKind {
    // get_summary() of a freshly updated provider.
    Synthetic(ProviderConstructor),
    Function(SummaryFunction),
}

pub struct Category {
    pub name: String,
    pub enabled: bool,
    synthetics: Vec<(TypeNameSpecifier, ProviderConstructor)>,
    summaries: Vec<(TypeNameSpecifier, SummaryKind)>,
}

impl Category {
    pub fn new(name: &str) -> Self { Self {name: name.to_string(), enabled: true, synthetics: Vec::new(), summaries: Vec::new()} }

    // Also attaches a summary that comes from the same provider.
    pub fn attach_synthetic_to_type(&mut self, constructor: ProviderConstructor, type_name: &str, is_regex: bool) -> Result<()> {
        self.synthetics.push((TypeNameSpecifier::new(type_name, is_regex)?, constructor));
        self.attach_summary(SummaryKind::Synthetic(constructor), type_name, is_regex)
    }

    pub fn attach_summary_to_type(&mut self, f: SummaryFunction, type_name: &str, is_regex: bool) -> Result<()> {
        self.attach_summary(SummaryKind::Function(f), type_name, is_regex)
    }

    fn attach_summary(&mut self, kind: SummaryKind, type_name: &str, is_regex: bool) -> Result<()> {
        self.summaries.push((TypeNameSpecifier::new(type_name, is_regex)?, kind));
        Ok(())
    }

    // The most recently attached match wins.
    pub fn find_synthetic(&self, type_name: &str) -> Option<ProviderConstructor> {
        if !self.enabled {
            return None;
        }
        self.synthetics.iter().rev().find(|(name, _)| name.matches(type_name)).map(|&(_, c)| c)
    }

    pub fn find_summary(&self, type_name: &str) -> Option<SummaryKind> {
        if !self.enabled {
            return None;
        }
        self.summaries.iter().rev().find(|(name, _)| name.matches(type_name)).map(|&(_, k)| k)
    }
}

// Attached from the most general to the most specific, so that strings take precedence over arrays.
pub fn build_category() -> Result<Category> {
    let mut c = Category::new("D");
    c.attach_synthetic_to_type(DAssocArrayProvider::new, ASSOC_ARRAY_PATTERN, true)?;
    c.attach_synthetic_to_type(DArrayProvider::new, ARRAY_PATTERN, true)?;
    c.attach_synthetic_to_type(DStringProvider::new_utf8, STRING_PATTERN, true)?;
    c.attach_synthetic_to_type(DStringProvider::new_utf16, WSTRING_PATTERN, true)?;
    c.attach_synthetic_to_type(DStringProvider::new_utf32, DSTRING_PATTERN, true)?;
    Ok(c)
}

#[cfg(test)]
mod tests {
    use crate::{*, lldb::*, fixtures::*, host::*, value::*, memory::*, settings::*};
    use std::sync::Arc;

    fn host(mem: MemoryBuilder) -> LldbHost { LldbHost::new(HostContext::for_tests(mem.build())) }

    fn value(h: &LldbHost, addr: usize, type_name: &str) -> Value { Value::at(addr, h.types().resolve(type_name).unwrap()) }

    fn ints(xs: &[i32]) -> Vec<u8> { xs.iter().flat_map(|x| x.to_le_bytes()).collect() }

    #[test]
    fn provider_selection() {
        let h = host(MemoryBuilder::new(8));
        let c = &h.category;
        let is = |name: &str, ctor: ProviderConstructor| c.find_synthetic(name).map(|f| f as usize) == Some(ctor as usize);
        assert!(is("string", DStringProvider::new_utf8));
        assert!(is("immutable(char)[]", DStringProvider::new_utf8));
        assert!(is("_Array_char16_t", DStringProvider::new_utf16));
        assert!(is("dstring", DStringProvider::new_utf32));
        assert!(is("int[]", DArrayProvider::new));
        assert!(is("_Array_int", DArrayProvider::new));
        assert!(is("int[string]", DAssocArrayProvider::new));
        assert!(is("_AArray_int_int", DAssocArrayProvider::new));
        assert!(c.find_synthetic("int[4]").is_none());
        assert!(c.find_summary("int").is_none());
        assert!(matches!(c.find_summary("wstring"), Some(SummaryKind::Synthetic(_))));
    }

    #[test]
    fn string_summaries() {
        let mut mem = MemoryBuilder::new(8);
        let (s, w, d) = (mem.string("hi"), mem.wstring("hi"), mem.dstring("hi"));
        let (a, b, c) = (mem.alloc(s), mem.alloc(w), mem.alloc(d));
        let bad = mem.slice(2, 0x5000);
        let e = mem.alloc(bad);
        let mut h = host(mem);
        let v = value(&h, a, "string");
        assert_eq!(h.summary_for(&v).as_deref(), Some("\"hi\""));
        let v = value(&h, b, "wstring");
        assert_eq!(h.summary_for(&v).as_deref(), Some("\"hi\"w"));
        let v = value(&h, c, "dstring");
        assert_eq!(h.summary_for(&v).as_deref(), Some("\"hi\"d"));
        assert!(h.children(&v).is_empty());

        let v = value(&h, e, "string");
        assert_eq!(h.summary_for(&v), None);
        assert!(h.context.log.contains("ReadMemory error: bad address"));
        assert!(h.try_summary_for(&v).unwrap().is_err());
    }

    #[test]
    fn array_summaries() {
        let mut mem = MemoryBuilder::new(8);
        let data = mem.alloc(ints(&[1, 2, 3]));
        let s = mem.slice(3, data);
        let a = mem.alloc(s);
        let many: Vec<i32> = (0..20).collect();
        let data = mem.alloc(ints(&many));
        let s = mem.slice(20, data);
        let b = mem.alloc(s);
        let long: String = std::iter::repeat('x').take(120).collect();
        let long = mem.string(&long);
        let strings = mem.alloc(long);
        let s = mem.slice(1, strings);
        let c = mem.alloc(s);
        let mut h = host(mem);

        let v = value(&h, a, "int[]");
        assert_eq!(h.print_value(&v), "[3] {1, 2, 3}");
        let v = value(&h, b, "int[]");
        assert_eq!(h.print_value(&v), "[20] {0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, ...}");
        let v = value(&h, c, "string[]");
        assert_eq!(h.print_value(&v), "[1] {...}");
    }

    #[test]
    fn array_children() {
        let mut mem = MemoryBuilder::new(8);
        let data = mem.alloc(ints(&[5, 6, 7]));
        let s = mem.slice(3, data);
        let a = mem.alloc(s);
        let mut h = host(mem);
        let v = value(&h, a, "int[]");
        let mut p = h.synthetic_for(&v).unwrap();
        assert!(p.has_children(&mut h));
        assert_eq!(p.num_children(&mut h), 3);
        let c = p.get_child_at_index(&mut h, 1).unwrap();
        assert_eq!(c.name, "[1]");
        assert_eq!(format_value(&mut h, &c.value), "6");
        assert!(p.get_child_at_index(&mut h, 3).is_none());
        assert_eq!(p.get_child_index(&mut h, "[2]"), Some(2));
        assert_eq!(p.get_child_index(&mut h, "length"), None);
        assert_eq!(h.children(&v).len(), 3);
    }

    #[test]
    fn map_summaries_and_children() {
        let mut mem = MemoryBuilder::new(8);
        let (k1, k2) = (mem.string("a"), mem.string("b"));
        let aa = mem.aa_of(&[(k1, ints(&[1])), (k2, ints(&[2]))], 16);
        let handle = mem.word(aa);
        let a = mem.alloc(handle);
        let mut h = host(mem);
        let v = value(&h, a, "int[string]");
        assert_eq!(h.print_value(&v), "[2] {\"a\" = 1, \"b\" = 2}");

        let mut p = h.synthetic_for(&v).unwrap();
        assert!(p.has_children(&mut h));
        assert_eq!(p.get_child_index(&mut h, "\"b\""), Some(1));
        assert_eq!(p.get_child_index(&mut h, "\"c\""), None);
        let c = p.get_child_at_index(&mut h, 0).unwrap();
        assert_eq!(c.name, "\"a\"");
        assert_eq!(format_value(&mut h, &c.value), "1");
        assert!(p.get_child_at_index(&mut h, 2).is_none());
        assert!(h.context.log.contains("not found index 2, remaining 0, len: 2"));
    }

    #[test]
    fn tombstones_and_empty_maps() {
        let mut mem = MemoryBuilder::new(8);
        let a = mem.entry(&ints(&[1]), &ints(&[10]), 4);
        let b = mem.entry(&ints(&[2]), &ints(&[20]), 4);
        let aa = mem.aa(&AABuilder {buckets: vec![(filled(8, 1), a), (filled(8, 2), 0), (filled(8, 3), b)], used: 3, deleted: 1, valoff: 4});
        let handle = mem.word(aa);
        let x = mem.alloc(handle);
        let null = mem.word(0);
        let y = mem.alloc(null);
        let mut h = host(mem);

        let v = value(&h, x, "_AArray_int_int");
        assert_eq!(h.print_value(&v), "[2] {1 = 10, 2 = 20}");
        let names: Vec<String> = h.children(&v).into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["1", "2"]);

        let v = value(&h, y, "int[int]");
        let mut p = h.synthetic_for(&v).unwrap();
        assert!(!p.has_children(&mut h));
        assert_eq!(p.get_summary(&mut h).unwrap().unwrap(), "[0] {}");
    }

    #[test]
    fn nested_structs_are_elided() {
        let mut mem = MemoryBuilder::new(8);
        let data = mem.alloc(ints(&[1, 2, 3, 4]));
        let s = mem.slice(2, data);
        let a = mem.alloc(s);
        let mut h = host(mem);
        let int = h.types().resolve("int").unwrap();
        let pair = h.context.types.add_struct("Pair", &[("x", int.clone()), ("y", int)]);
        let v = value(&h, a, "Pair[]");
        assert_eq!(pair.size, 8);
        assert_eq!(h.print_value(&v), "[2] {{...}, {...}}");
        // At top level the struct is shown field by field.
        assert_eq!(h.print_value(&Value::at(data, pair)), "{x: 1, y: 2}");
    }

    #[test]
    fn unreadable_members_are_isolated() {
        let mut mem = MemoryBuilder::new(8);
        let good = mem.string("ok");
        let bad = mem.slice(2, 0x5000);
        // struct S {int x; string bad; string good;}
        let s = [ints(&[1, 0]), bad.clone(), good.clone()].concat();
        let a = mem.alloc(s.clone());
        let b = mem.alloc([good, bad].concat());
        let slice = mem.slice(2, b);
        let d = mem.alloc(slice);
        let aa = mem.aa_of(&[(ints(&[7]), s)], 8);
        let handle = mem.word(aa);
        let c = mem.alloc(handle);
        let mut h = host(mem);
        let (int, string) = (h.types().resolve("int").unwrap(), h.types().resolve("string").unwrap());
        let st = h.context.types.add_struct("S", &[("x", int), ("bad", string.clone()), ("good", string)]);

        let expected = "{x: 1, bad: <error: bad address>, good: \"ok\"}";
        assert_eq!(h.print_value(&Value::at(a, st)), expected);
        let v = value(&h, b, "string[2]");
        assert_eq!(h.print_value(&v), "[\"ok\", <error: bad address>]");
        let v = value(&h, d, "string[]");
        assert_eq!(h.print_value(&v), "[2] {\"ok\", <error: bad address>}");

        // Map summaries elide structs, the expanded child shows which member is bad.
        let v = value(&h, c, "S[int]");
        assert_eq!(h.print_value(&v), "[1] {7 = {...}}");
        let children = h.children(&v);
        assert_eq!(children.len(), 1);
        assert_eq!(format_value(&mut h, &children[0].value), expected);
    }

    #[test]
    fn update_rereads_memory() {
        let mut mem = MemoryBuilder::new(8);
        let e = mem.entry(&ints(&[1]), &ints(&[10]), 4);
        let aa = mem.aa(&AABuilder {buckets: vec![(filled(8, 1), e)], used: 1, deleted: 0, valoff: 4});
        let handle = mem.word(aa);
        let x = mem.alloc(handle);
        let ranges = mem.build();
        let mut h = LldbHost::new(HostContext::for_tests(ranges.clone()));
        let v = value(&h, x, "int[int]");
        let mut p = h.synthetic_for(&v).unwrap();
        assert_eq!(p.get_summary(&mut h).unwrap().unwrap(), "[1] {1 = 10}");

        // The value changes while the debuggee runs.
        let ranges: Vec<(usize, Vec<u8>)> = ranges.into_iter().map(|(addr, data)| if addr == e {(addr, ints(&[1, 11]))} else {(addr, data)}).collect();
        h.context.memory.mem = MemReader::Snapshot(Arc::new(SnapshotMemReader::new(ranges).unwrap()));
        p.update(&mut h);
        assert_eq!(p.get_summary(&mut h).unwrap().unwrap(), "[1] {1 = 11}");
    }

    #[test]
    fn custom_summaries() {
        fn answer(_host: &mut LldbHost, _v: &Value) -> Option<String> { Some("42".to_string()) }
        let mut h = host(MemoryBuilder::new(8));
        h.category.attach_summary_to_type(answer, "Answer", false).unwrap();
        h.context.types.add_struct("Answer", &[]);
        let v = value(&h, 0x1000, "Answer");
        assert_eq!(h.print_value(&v), "42");
        let v = value(&h, 0x1000, "int");
        assert_eq!(h.summary_for(&v), None);
        assert!(h.category.attach_summary_to_type(answer, "[", true).is_err());

        h.category.enabled = false;
        let v = value(&h, 0x1000, "Answer");
        assert_eq!(h.summary_for(&v), None);
    }
}
