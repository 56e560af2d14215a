use crate::{*, error::*, types::*, value::*, host::*, pretty::*, aa::*};
use std::{rc::Rc, fmt::Write};
use regex::Regex;

// Printers shaped after gdb's Python pretty-printing API: a collection of (name, type name regex, printer constructor),
// consulted in registration order, and printer objects with display_hint(), to_string() and lazily produced children.

pub struct GdbHost {
    pub context: HostContext,
    // Most recently registered first, like gdb.printing.register_pretty_printer().
    printers: Vec<PrettyPrinterCollection>,
}

impl Debuggee for GdbHost {
    fn context(&self) -> &HostContext { &self.context }
    fn context_mut(&mut self) -> &mut HostContext { &mut self.context }

    fn resolve_type(&self, name: &str) -> Option<Rc<TypeInfo>> { self.context.types.resolve(name) }

    // gdb.Type.vector()
    fn lanes_type(&self, elem: Rc<TypeInfo>, lanes: usize) -> Rc<TypeInfo> { self.context.types.array_of(elem, lanes, ArrayFlags::VECTOR) }

    fn summarize(&mut self, v: &Value) -> Option<Result<String>> {
        let printer = match self.lookup_printer(v)? {
            Ok(p) => p,
            Err(e) => return Some(Err(e)),
        };
        Some(self.render(&*printer))
    }
}

impl GdbHost {
    pub fn new(context: HostContext) -> Self {
        let mut host = GdbHost {context, printers: Vec::new()};
        match build_pretty_printer() {
            Ok(pp) => host.register_pretty_printer(pp),
            Err(e) => log!(host.context.log, "failed to build D pretty-printers: {}", e),
        }
        host
    }

    pub fn register_pretty_printer(&mut self, pp: PrettyPrinterCollection) {
        self.printers.insert(0, pp);
    }

    pub fn find_printer(&self, type_name: &str) -> Option<&RegexpSubprinter> {
        self.printers.iter().find_map(|pp| pp.lookup(type_name))
    }

    // Instantiates the printer for the value, if any applies to its type name.
    pub fn lookup_printer(&mut self, v: &Value) -> Option<Result<Box<dyn GdbPrinter>>> {
        let constructor = self.find_printer(&v.type_.name)?.constructor;
        if self.context.nesting == 0 {
            // The debuggee may have run since the last top-level request.
            self.context.memory.invalidate();
        }
        Some(constructor(self, v))
    }

    // What `print v` would show: printer output with children in braces, or plain formatting.
    pub fn print_value(&mut self, v: &Value) -> String {
        self.context.memory.invalidate();
        format_value(self, v)
    }

    // Children as a front end would list them when the value is expanded.
    pub fn children(&mut self, v: &Value) -> Vec<Child> {
        let printer = match self.lookup_printer(v) {
            None => return Vec::new(),
            Some(Ok(p)) => p,
            Some(Err(e)) => {
                log!(self.context.log, "{}: {}", v.type_, e);
                return Vec::new();
            }
        };
        let mut children = printer.children();
        let mut res: Vec<Child> = Vec::new();
        while res.len() < self.context.settings.max_array_elements {
            match children.next(self) {
                Some(Ok(c)) => res.push(c),
                Some(Err(_)) | None => break,
            }
        }
        res
    }

    fn render(&mut self, printer: &dyn GdbPrinter) -> Result<String> {
        let mut s = printer.to_string(self)?;
        if printer.display_hint() == Some("string") {
            s = format!("\"{}\"", escape_string(&s, self.context.settings.string_escaping));
        }
        let mut children = printer.children();
        if children.is_leaf() {
            return Ok(s);
        }
        s.push_str(" = {");
        let limit = self.context.settings.max_array_elements;
        let mut count = 0usize;
        while let Some(child) = children.next(self) {
            if count != 0 {
                s.push_str(", ");
            }
            if count == limit {
                s.push_str("...");
                break;
            }
            match child {
                Ok(c) => {
                    let text = format_value(self, &c.value);
                    // Real gdb drops child names under the "array" hint; map keys are kept here so the entries stay readable.
                    if printer.named_children() {
                        write!(s, "[{}] = {}", c.name, text)?;
                    } else {
                        s.push_str(&text);
                    }
                }
                Err(e) => {
                    write!(s, "<error: {}>", e)?;
                    break;
                }
            }
            count += 1;
        }
        s.push('}');
        Ok(s)
    }
}

pub trait GdbPrinter {
    fn display_hint(&self) -> Option<&'static str> { None }
    fn to_string(&self, host: &mut GdbHost) -> Result<String>;
    // Each call starts a new, lazy pass over the children.
    fn children(&self) -> GdbChildren { GdbChildren::Leaf }
    // Whether children are shown as "[name] = value" rather than just values.
    fn named_children(&self) -> bool { false }
}

pub enum GdbChildren {
    Leaf,
    Array {view: ArrayView, index: usize},
    AssocArray {view: AssocArrayView, cursor: OccupiedEntries, walked: usize},
}

impl GdbChildren {
    pub fn is_leaf(&self) -> bool { match self { Self::Leaf => true, _ => false } }

    // Materializes the next child. Read errors are logged, reported once, and end the iteration.
    pub fn next(&mut self, host: &mut GdbHost) -> Option<Result<Child>> {
        match self {
            Self::Leaf => None,
            Self::Array {view, index} => {
                let value = view.element(*index)?;
                let name = index.to_string();
                *index += 1;
                Some(Ok(Child {name, value}))
            }
            Self::AssocArray {view, cursor, walked} => match cursor.next_entry(host.memory()) {
                Some(Ok(entry)) => {
                    *walked += 1;
                    let e = view.entry(host, entry);
                    Some(Ok(Child {name: e.key_label, value: e.value}))
                }
                Some(Err(e)) => {
                    log!(host.log(), "ReadMemory error: {}", e);
                    Some(Err(e))
                }
                None => {
                    if *walked != usize::MAX {
                        view.check_walked_count(host, *walked);
                        *walked = usize::MAX;
                    }
                    None
                }
            }
        }
    }
}

pub struct DStringPrinter {
    view: StringView,
}
impl GdbPrinter for DStringPrinter {
    fn display_hint(&self) -> Option<&'static str> { Some("string") }
    fn to_string(&self, host: &mut GdbHost) -> Result<String> { self.view.text(host) }
}

pub struct DArrayPrinter {
    view: ArrayView,
}
impl GdbPrinter for DArrayPrinter {
    fn display_hint(&self) -> Option<&'static str> { Some("array") }
    fn to_string(&self, _host: &mut GdbHost) -> Result<String> { Ok(format!("[{}] @ 0x{:x}", self.view.len, self.view.ptr)) }
    fn children(&self) -> GdbChildren { GdbChildren::Array {view: self.view.clone(), index: 0} }
}

pub struct DAssocArrayPrinter {
    view: AssocArrayView,
}
impl GdbPrinter for DAssocArrayPrinter {
    fn display_hint(&self) -> Option<&'static str> { Some("array") }
    fn to_string(&self, _host: &mut GdbHost) -> Result<String> { Ok(format!("[{}]", self.view.len())) }
    fn children(&self) -> GdbChildren { GdbChildren::AssocArray {view: self.view.clone(), cursor: self.view.entries(), walked: 0} }
    fn named_children(&self) -> bool { true }
}

pub type PrinterConstructor = fn(&mut GdbHost, &Value) -> Result<Box<dyn GdbPrinter>>;

fn new_string_printer(host: &mut GdbHost, v: &Value) -> Result<Box<dyn GdbPrinter>> { Ok(Box::new(DStringPrinter {view: StringView::read(host, v, CodeUnit::Utf8)?})) }
fn new_wstring_printer(host: &mut GdbHost, v: &Value) -> Result<Box<dyn GdbPrinter>> { Ok(Box::new(DStringPrinter {view: StringView::read(host, v, CodeUnit::Utf16)?})) }
fn new_dstring_printer(host: &mut GdbHost, v: &Value) -> Result<Box<dyn GdbPrinter>> { Ok(Box::new(DStringPrinter {view: StringView::read(host, v, CodeUnit::Utf32)?})) }
fn new_array_printer(host: &mut GdbHost, v: &Value) -> Result<Box<dyn GdbPrinter>> { Ok(Box::new(DArrayPrinter {view: ArrayView::read(host, v)?})) }
fn new_assoc_array_printer(host: &mut GdbHost, v: &Value) -> Result<Box<dyn GdbPrinter>> { Ok(Box::new(DAssocArrayPrinter {view: AssocArrayView::read(host, v)?})) }

pub struct RegexpSubprinter {
    pub name: String,
    pub enabled: bool,
    pub regexp: Regex,
    pub constructor: PrinterConstructor,
}

// gdb.printing.RegexpCollectionPrettyPrinter
pub struct PrettyPrinterCollection {
    pub name: String,
    pub enabled: bool,
    pub subprinters: Vec<RegexpSubprinter>,
}

impl PrettyPrinterCollection {
    pub fn new(name: &str) -> Self { Self {name: name.to_string(), enabled: true, subprinters: Vec::new()} }

    pub fn add_printer(&mut self, name: &str, regexp: &str, constructor: PrinterConstructor) -> Result<()> {
        self.subprinters.push(RegexpSubprinter {name: name.to_string(), enabled: true, regexp: Regex::new(regexp)?, constructor});
        Ok(())
    }

    // First enabled subprinter whose regex matches anywhere in the type name.
    pub fn lookup(&self, type_name: &str) -> Option<&RegexpSubprinter> {
        if !self.enabled {
            return None;
        }
        self.subprinters.iter().find(|p| p.enabled && p.regexp.is_match(type_name))
    }
}

// Strings are registered before arrays, so that they win.
pub fn build_pretty_printer() -> Result<PrettyPrinterCollection> {
    let mut pp = PrettyPrinterCollection::new("dlang_utils");
    pp.add_printer("string", STRING_PATTERN, new_string_printer)?;
    pp.add_printer("wstring", WSTRING_PATTERN, new_wstring_printer)?;
    pp.add_printer("dstring", DSTRING_PATTERN, new_dstring_printer)?;
    pp.add_printer("arrays", ARRAY_PATTERN, new_array_printer)?;
    pp.add_printer("hashmaps", ASSOC_ARRAY_PATTERN, new_assoc_array_printer)?;
    Ok(pp)
}
