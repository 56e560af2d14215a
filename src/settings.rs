use crate::{*, error::*};
use std::str::FromStr;

// What to do with control characters when showing a string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StringEscaping {
    Remove, // drop them
    Unicode, // replace with the corresponding "control picture" symbols (U+2400..U+241F)
    Escape, // C-style escapes: \n, \t, \x1b, ...; also escapes backslashes and quotes
    None,
}

impl FromStr for StringEscaping {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "remove" => Ok(Self::Remove),
            "unicode" => Ok(Self::Unicode),
            "escape" => Ok(Self::Escape),
            "none" => Ok(Self::None),
            _ => err!(Usage, "unknown string escaping mode '{}' (expected remove, unicode, escape or none)", s),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub string_escaping: StringEscaping,
    // Strings longer than this many code units are cut off. Uninitialized slices tend to have garbage lengths.
    pub max_string_len: usize,
    // One-line summaries of arrays and maps stop adding elements after this many characters, and give up entirely after summary_max_len.
    pub summary_clip_len: usize,
    pub summary_max_len: usize,
    // Static arrays and vectors are printed inline up to this many elements.
    pub max_array_elements: usize,
    // size_t and pointer size of the debuggee.
    pub word_size: usize,
}

impl Default for Settings {
    fn default() -> Self { Settings {
        string_escaping: StringEscaping::Escape,
        max_string_len: 10000,
        summary_clip_len: 32,
        summary_max_len: 100,
        max_array_elements: 100,
        word_size: 8,
    } }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.word_size != 4 && self.word_size != 8 {
            return err!(Usage, "unsupported word size: {}", self.word_size);
        }
        if self.summary_clip_len > self.summary_max_len {
            return err!(Usage, "summary clip length ({}) exceeds max length ({})", self.summary_clip_len, self.summary_max_len);
        }
        Ok(())
    }
}
