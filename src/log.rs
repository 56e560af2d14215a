use std::{collections::VecDeque, io::{self, Write}};

// A short in-memory log of things that went wrong while rendering values: unreadable memory, inconsistent maps, etc.
// Rendering itself never fails (we always show something), so this is the only place where the details end up.
// The host decides what to do with it; the CLI dumps it to stderr before exiting.
pub struct Log {
    pub lines: VecDeque<String>,
}

const MAX_LINES: usize = 100;

impl Log {
    pub fn new() -> Log {
        Log {lines: VecDeque::new()}
    }

    pub fn add_line(&mut self, line: String) {
        self.lines.push_back(line);
        while self.lines.len() > MAX_LINES {
            self.lines.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn last(&self) -> Option<&str> { self.lines.back().map(|s| s.as_str()) }

    pub fn contains(&self, needle: &str) -> bool { self.lines.iter().any(|l| l.contains(needle)) }

    pub fn dump(&self, out: &mut dyn Write) -> io::Result<()> {
        for line in &self.lines {
            writeln!(out, "{}", line)?;
        }
        Ok(())
    }
}

#[macro_export]
macro_rules! log {
    ($log:expr, $($arg:tt)*) => (
        ($log).add_line(format!($($arg)*))
    );
}
