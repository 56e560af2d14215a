#![allow(dead_code)]
#![allow(unused_variables)]
#![allow(unused_imports)]

pub mod error;
pub mod log;
pub mod settings;
pub mod memory;
pub mod types;
pub mod type_names;
pub mod dmd_types;
pub mod aa;
pub mod value;
pub mod host;
pub mod pretty;
pub mod gdb;
pub mod lldb;

#[cfg(test)]
mod fixtures;
