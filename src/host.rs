use crate::{*, error::*, memory::*, types::*, settings::*, log::*, value::*};
use std::rc::Rc;

// What the printers need from a host debugger: read debuggee memory, resolve type names, build vector types.
// Each front end (gdb.rs, lldb.rs) binds this to its host's conventions; everything else (aa.rs, pretty.rs, value.rs) only talks to this trait.
pub trait Debuggee {
    fn context(&self) -> &HostContext;
    fn context_mut(&mut self) -> &mut HostContext;

    // gdb.lookup_type() / SBTarget.FindFirstType() equivalent. Accepts D type expressions like "int[string]".
    fn resolve_type(&self, name: &str) -> Option<Rc<TypeInfo>>;

    // Type for a legacy "T[N]" SIMD vector fragment, the way this host represents it.
    fn lanes_type(&self, elem: Rc<TypeInfo>, lanes: usize) -> Rc<TypeInfo>;

    fn memory(&mut self) -> &mut CachedMemReader { &mut self.context_mut().memory }
    fn types(&self) -> &Types { &self.context().types }
    fn settings(&self) -> &Settings { &self.context().settings }
    fn log(&mut self) -> &mut Log { &mut self.context_mut().log }
    fn word_size(&self) -> usize { self.context().types.word_size }
    // Separate from word_size only because the ABI description distinguishes them; on all supported targets they're equal.
    fn pointer_size(&self) -> usize { self.context().types.word_size }
    fn opaque(&self) -> Rc<TypeInfo> { self.context().types.builtin.unknown.clone() }

    // Text for a value that has a registered printer (strings, arrays, maps), as this host would show it nested inside another value.
    // None if no printer applies, then the value is formatted structurally.
    fn summarize(&mut self, v: &Value) -> Option<Result<String>> { None }
}

// The state both front ends share.
pub struct HostContext {
    pub memory: CachedMemReader,
    pub types: Types,
    pub settings: Settings,
    pub log: Log,
    // How many printers are currently running on the stack; containers nested deeper are elided.
    pub nesting: usize,
}

impl HostContext {
    pub fn new(memory: MemReader, settings: Settings) -> Self {
        let types = Types::new(settings.word_size);
        HostContext {memory: CachedMemReader::new(memory), types, settings, log: Log::new(), nesting: 0}
    }

    #[cfg(test)]
    pub fn for_tests(ranges: Vec<(usize, Vec<u8>)>) -> Self {
        Self::for_tests_with(ranges, Settings::default())
    }

    #[cfg(test)]
    pub fn for_tests_with(ranges: Vec<(usize, Vec<u8>)>, settings: Settings) -> Self {
        Self::new(MemReader::Snapshot(std::sync::Arc::new(SnapshotMemReader::new(ranges).unwrap())), settings)
    }
}
