//! Newline-delimited message reassembly.

/// Turns arbitrary text fragments into complete `\n`-terminated lines.
///
/// The unterminated tail of the last fragment is carried over to the next
/// call. One instance belongs to exactly one stream and is dropped with it.
/// Blank lines are yielded as-is; filtering them is the caller's job.
#[derive(Debug, Default)]
pub struct LineReassembler {
    buffer: String,
}

impl LineReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `fragment` and returns the lines it completed.
    pub fn feed(&mut self, fragment: &str) -> CompleteLines {
        self.buffer.push_str(fragment);
        match self.buffer.rfind('\n') {
            Some(last_newline) => {
                let tail = self.buffer.split_off(last_newline + 1);
                let complete = std::mem::replace(&mut self.buffer, tail);
                CompleteLines::new(complete)
            }
            None => CompleteLines::new(String::new()),
        }
    }

    /// Takes the unterminated tail, if it holds anything but whitespace.
    pub fn finish(&mut self) -> Option<String> {
        let tail = std::mem::take(&mut self.buffer);
        (!tail.trim().is_empty()).then_some(tail)
    }

    /// The not-yet-terminated text carried between fragments.
    pub fn pending(&self) -> &str {
        &self.buffer
    }
}

/// Lazy iterator over the lines completed by one [`LineReassembler::feed`] call.
#[derive(Debug)]
pub struct CompleteLines {
    text: String,
    cursor: usize,
}

impl CompleteLines {
    fn new(text: String) -> Self {
        Self { text, cursor: 0 }
    }
}

impl Iterator for CompleteLines {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.text.get(self.cursor..)?;
        let end = rest.find('\n')?;
        let line = rest[..end].to_string();
        self.cursor += end + 1;
        Some(line)
    }
}
