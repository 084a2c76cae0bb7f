//! Line sources the runner reads commands from.

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, BufRead, Write};

/// Outcome of a single read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// One physical line, with or without its terminator.
    Line(String),
    /// The user interrupted the read (Ctrl-C).
    Interrupted,
    /// No more input.
    Eof,
}

/// Something the runner can pull command lines from.
pub trait LineReader {
    /// Show `prompt` (if this source shows prompts at all) and read one line.
    fn read_line(&mut self, prompt: &str, stdout: &mut dyn Write) -> io::Result<Input>;
}

/// Reads lines from any buffered stream, writing prompts to the output stream.
pub struct StreamReader<R> {
    reader: R,
    prompts: bool,
}

impl<R: BufRead> StreamReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            prompts: true,
        }
    }

    /// Stop printing prompts, as for `-c` scripts.
    pub fn without_prompts(mut self) -> Self {
        self.prompts = false;
        self
    }
}

impl<R: BufRead> LineReader for StreamReader<R> {
    fn read_line(&mut self, prompt: &str, stdout: &mut dyn Write) -> io::Result<Input> {
        if self.prompts {
            stdout.write_all(prompt.as_bytes())?;
            stdout.flush()?;
        }
        let mut line = String::new();
        match self.reader.read_line(&mut line)? {
            0 => Ok(Input::Eof),
            _ => Ok(Input::Line(line)),
        }
    }
}

/// Interactive terminal input backed by `rustyline`. No history is kept.
pub struct Editor {
    editor: DefaultEditor,
}

impl Editor {
    pub fn new() -> rustyline::Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
        })
    }
}

impl LineReader for Editor {
    fn read_line(&mut self, prompt: &str, _stdout: &mut dyn Write) -> io::Result<Input> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(Input::Line(line)),
            Err(ReadlineError::Interrupted) => Ok(Input::Interrupted),
            Err(ReadlineError::Eof) => Ok(Input::Eof),
            Err(ReadlineError::Io(err)) => Err(err),
            Err(err) => Err(io::Error::other(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_stream_reader_writes_prompts() {
        let mut reader = StreamReader::new(Cursor::new("ls\npwd"));
        let mut out = Vec::new();
        assert_eq!(reader.read_line("~$ ", &mut out).unwrap(), Input::Line("ls\n".to_string()));
        assert_eq!(reader.read_line("> ", &mut out).unwrap(), Input::Line("pwd".to_string()));
        assert_eq!(reader.read_line("~$ ", &mut out).unwrap(), Input::Eof);
        assert_eq!(out, b"~$ > ~$ ");
    }

    #[test]
    fn test_script_lines_are_silent() {
        let mut reader = StreamReader::new(Cursor::new("echo hi\n")).without_prompts();
        let mut out = Vec::new();
        assert_eq!(
            reader.read_line("~$ ", &mut out).unwrap(),
            Input::Line("echo hi\n".to_string())
        );
        assert_eq!(reader.read_line("~$ ", &mut out).unwrap(), Input::Eof);
        assert!(out.is_empty());
    }
}
