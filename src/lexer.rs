//! A module implementing lexical analysis (tokenization) for the shell.
//!
//! The [`Tokenizer`] is fed one physical line at a time and keeps its state
//! between calls, so a command spanning several lines (open quotation,
//! trailing backslash, trailing pipe) is assembled before it is reported
//! complete.

use crate::error::ShellError;
use regex::Regex;
use std::sync::LazyLock;

static IDENTIFIER_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[0-9]|[A-Za-z_][A-Za-z0-9_]*)").expect("identifier pattern is valid")
});

/// Split `text` into its leading variable name (a single digit, or a letter or
/// underscore followed by word characters) and the remainder.
pub(crate) fn split_identifier(text: &str) -> (&str, &str) {
    match IDENTIFIER_PREFIX.find(text) {
        Some(found) => text.split_at(found.end()),
        None => ("", text),
    }
}

/// Whether the whole of `text` is a valid variable name.
pub(crate) fn is_identifier(text: &str) -> bool {
    let (name, rest) = split_identifier(text);
    !name.is_empty() && rest.is_empty()
}

/// Represents a token resulting from lexical analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Unquoted text. Backslashes are kept verbatim until escape resolution.
    Word(String),
    /// Single-quoted text, taken literally.
    WeakQuote(String),
    /// Double-quoted text; escapes and `$name` references are still live.
    StrongQuote(String),
    /// Argument boundary.
    Space,
    /// The pipe operator, `|`.
    Pipe,
    /// The variable sigil, `$`.
    VariableSigil,
    /// The inline assignment sign, `=`.
    AssignSigil,
}

impl Token {
    /// Text the token contributes to an argument.
    pub fn text(&self) -> &str {
        match self {
            Token::Word(text) | Token::WeakQuote(text) | Token::StrongQuote(text) => text,
            Token::Space => " ",
            Token::Pipe => "|",
            Token::VariableSigil => "$",
            Token::AssignSigil => "=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum LexingState {
    #[default]
    ReadingWord,
    ReadingWeakQuote,
    ReadingStrongQuote,
}

/// Incremental tokenizer.
///
/// Feed lines with [`Tokenizer::tokenize`], check [`Tokenizer::is_complete`]
/// and take the finished command with [`Tokenizer::collect`].
#[derive(Debug, Default)]
pub struct Tokenizer {
    buffer: String,
    state: LexingState,
    backslashes: usize,
    pending_space: bool,
    continuation: bool,
    fresh_quote: bool,
    tokens: Vec<Token>,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one physical line to the running state.
    ///
    /// The whole line is always processed; the first syntax error found on
    /// it is returned afterwards. Tokens accumulated so far are never
    /// discarded.
    pub fn tokenize(&mut self, line: &str) -> Result<(), ShellError> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let line = line.strip_suffix('\r').unwrap_or(line);

        self.continuation = false;
        let mut first_error = None;
        for ch in line.chars() {
            let handled = match self.state {
                LexingState::ReadingWord => self.handle_word(ch),
                LexingState::ReadingWeakQuote => {
                    self.handle_weak_quote(ch);
                    Ok(())
                }
                LexingState::ReadingStrongQuote => {
                    self.handle_strong_quote(ch);
                    Ok(())
                }
            };
            if let Err(err) = handled {
                first_error.get_or_insert(err);
            }
        }
        self.finish_line();

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// True when no quotation is open, no backslash escapes the line break,
    /// and the last token is not a pipe waiting for its right-hand side.
    pub fn is_complete(&self) -> bool {
        self.state == LexingState::ReadingWord
            && self.backslashes % 2 == 0
            && self.buffer.is_empty()
            && !self.continuation
            && self.tokens.last() != Some(&Token::Pipe)
    }

    /// Take the tokens of a complete command and start over.
    ///
    /// Returns `None` while the command is incomplete or when nothing was
    /// accumulated.
    pub fn collect(&mut self) -> Option<Vec<Token>> {
        if !self.is_complete() {
            return None;
        }
        let tokens = std::mem::take(&mut self.tokens);
        self.reset();
        if tokens.is_empty() { None } else { Some(tokens) }
    }

    /// Drop everything, including a half-typed multi-line command.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn handle_word(&mut self, ch: char) -> Result<(), ShellError> {
        if ch == '\\' {
            self.backslashes += 1;
            return Ok(());
        }
        if self.is_escaped() {
            self.push_char(ch);
            return Ok(());
        }
        match ch {
            c if c.is_whitespace() => {
                self.flush();
                self.pending_space = true;
            }
            '\'' => self.open_quote(LexingState::ReadingWeakQuote),
            '"' => self.open_quote(LexingState::ReadingStrongQuote),
            '|' => {
                self.flush();
                return self.push_pipe();
            }
            '$' => {
                self.flush();
                self.emit_pending_space();
                self.tokens.push(Token::VariableSigil);
            }
            '=' => {
                self.flush();
                return self.push_assign();
            }
            c => self.push_char(c),
        }
        Ok(())
    }

    fn handle_weak_quote(&mut self, ch: char) {
        match ch {
            '\'' => self.close_quote(),
            c => self.buffer.push(c),
        }
    }

    fn handle_strong_quote(&mut self, ch: char) {
        match ch {
            '\\' => self.backslashes += 1,
            '"' if !self.is_escaped() => self.close_quote(),
            c => self.push_char(c),
        }
    }

    fn finish_line(&mut self) {
        match self.state {
            LexingState::ReadingWord if self.is_escaped() => {
                // The last backslash escapes the line break itself.
                self.backslashes -= 1;
                self.materialize_backslashes();
                self.continuation = true;
            }
            LexingState::ReadingWord => self.flush(),
            LexingState::ReadingWeakQuote | LexingState::ReadingStrongQuote => {
                self.materialize_backslashes();
                if !(self.fresh_quote && self.buffer.is_empty()) {
                    self.buffer.push('\n');
                }
            }
        }
        self.fresh_quote = false;
    }

    fn is_escaped(&self) -> bool {
        self.backslashes % 2 == 1
    }

    fn materialize_backslashes(&mut self) {
        self.buffer.extend(std::iter::repeat_n('\\', self.backslashes));
        self.backslashes = 0;
    }

    fn push_char(&mut self, ch: char) {
        self.materialize_backslashes();
        self.buffer.push(ch);
    }

    fn open_quote(&mut self, state: LexingState) {
        self.flush();
        self.state = state;
        self.fresh_quote = true;
    }

    fn close_quote(&mut self) {
        self.materialize_backslashes();
        let text = std::mem::take(&mut self.buffer);
        let token = match self.state {
            LexingState::ReadingWeakQuote => Token::WeakQuote(text),
            _ => Token::StrongQuote(text),
        };
        self.emit(token);
        self.state = LexingState::ReadingWord;
    }

    /// Turn the unflushed word text into tokens. Text following a `$` is
    /// split into the variable name and whatever trails it.
    fn flush(&mut self) {
        self.materialize_backslashes();
        if self.buffer.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.buffer);
        self.emit_pending_space();
        if self.tokens.last() == Some(&Token::VariableSigil) {
            let (name, rest) = split_identifier(&text);
            for part in [name, rest] {
                if !part.is_empty() {
                    self.tokens.push(Token::Word(part.to_string()));
                }
            }
        } else {
            self.tokens.push(Token::Word(text));
        }
    }

    fn emit(&mut self, token: Token) {
        self.emit_pending_space();
        self.tokens.push(token);
    }

    /// Spaces are emitted lazily, right before the next real token, which
    /// keeps them away from the start, the end and both sides of a pipe.
    fn emit_pending_space(&mut self) {
        let requested = std::mem::take(&mut self.pending_space);
        let after_word = !matches!(self.tokens.last(), None | Some(Token::Space | Token::Pipe));
        if requested && after_word {
            self.tokens.push(Token::Space);
        }
    }

    fn push_pipe(&mut self) -> Result<(), ShellError> {
        self.pending_space = false;
        if matches!(self.tokens.last(), None | Some(Token::Pipe)) {
            return Err(ShellError::unexpected_token("|"));
        }
        if self.tokens.last() == Some(&Token::Space) {
            self.tokens.pop();
        }
        self.tokens.push(Token::Pipe);
        Ok(())
    }

    fn push_assign(&mut self) -> Result<(), ShellError> {
        let attached = !self.pending_space;
        let named = matches!(self.tokens.last(), Some(Token::Word(name)) if is_identifier(name));
        if attached && named {
            self.tokens.push(Token::AssignSigil);
            return Ok(());
        }
        match self.tokens.last() {
            Some(last) if attached && !matches!(last, Token::Space | Token::Pipe) => {
                let blame = format!("`{}'", last.text());
                Err(ShellError::syntax("not a valid identifier").with_blame(blame))
            }
            _ => Err(ShellError::unexpected_token("=")),
        }
    }
}
