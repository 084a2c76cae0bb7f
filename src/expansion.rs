//! Rewrite rules applied to a completed token sequence before execution.
//!
//! Rules work on the whole sequence rather than token by token, because
//! variable expansion merges a `$` sigil and the following name into a
//! single word.

use crate::env::Environment;
use crate::lexer::{Token, is_identifier, split_identifier};
use std::collections::HashMap;
use std::path::Path;

/// Read-only view of the session an expansion rule may consult.
pub struct Scope<'a> {
    pub home_dir: &'a Path,
    pub vars: &'a HashMap<String, String>,
}

impl<'a> Scope<'a> {
    pub fn new(env: &'a Environment) -> Self {
        Self {
            home_dir: env.config.home_dir(),
            vars: &env.vars,
        }
    }

    /// Value of a variable, empty when unset.
    fn lookup(&self, name: &str) -> &str {
        self.vars.get(name).map(String::as_str).unwrap_or("")
    }
}

/// A single rewrite step over the token sequence.
pub type ExpansionRule = fn(Vec<Token>, &Scope<'_>) -> Vec<Token>;

/// Ordered list of expansion rules.
pub struct ExpansionChain {
    rules: Vec<ExpansionRule>,
}

impl ExpansionChain {
    pub fn new(rules: Vec<ExpansionRule>) -> Self {
        Self { rules }
    }

    /// Append a rule that runs after the existing ones.
    pub fn with_rule(mut self, rule: ExpansionRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Thread `tokens` through every rule in order.
    pub fn execute(&self, tokens: Vec<Token>, scope: &Scope<'_>) -> Vec<Token> {
        self.rules.iter().fold(tokens, |tokens, rule| rule(tokens, scope))
    }
}

impl Default for ExpansionChain {
    /// Tilde expansion, then variable expansion, then escape resolution.
    fn default() -> Self {
        Self::new(vec![tilde_expansion, variable_expansion, resolve_escapes])
    }
}

/// Expand a bare `~` word or a `~/` prefix to the home directory.
pub fn tilde_expansion(tokens: Vec<Token>, scope: &Scope<'_>) -> Vec<Token> {
    tokens
        .into_iter()
        .map(|token| match token {
            Token::Word(text) if text == "~" => Token::Word(protect(&home(scope))),
            Token::Word(text) if text.starts_with("~/") => {
                let home = protect(&home(scope));
                let separator = if home.ends_with('/') { "" } else { "/" };
                Token::Word(format!("{home}{separator}{}", &text[2..]))
            }
            other => other,
        })
        .collect()
}

fn home(scope: &Scope<'_>) -> String {
    scope.home_dir.display().to_string()
}

/// Replace `$name` pairs with the variable's value and substitute `$name`
/// references embedded in double-quoted text.
///
/// An `=` right after a substituted word becomes plain text: `$FOO=bar` is a
/// command word, never an assignment to whatever `FOO` holds.
pub fn variable_expansion(tokens: Vec<Token>, scope: &Scope<'_>) -> Vec<Token> {
    let mut expanded: Vec<Token> = Vec::with_capacity(tokens.len());
    let mut substituted = false;
    for token in tokens {
        let was_substituted = std::mem::take(&mut substituted);
        match token {
            Token::Word(name) if expanded.last() == Some(&Token::VariableSigil) => {
                expanded.pop();
                let text = if is_identifier(&name) {
                    protect(scope.lookup(&name))
                } else {
                    format!("${name}")
                };
                expanded.push(Token::Word(text));
                substituted = true;
            }
            Token::AssignSigil if was_substituted => expanded.push(Token::Word("=".to_string())),
            Token::StrongQuote(text) => {
                expanded.push(Token::StrongQuote(expand_quoted(&text, scope)))
            }
            other => expanded.push(other),
        }
    }
    expanded
}

fn expand_quoted(text: &str, scope: &Scope<'_>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(['\\', '$']) {
        let (before, marker) = rest.split_at(pos);
        out.push_str(before);
        if let Some(escaped) = marker.strip_prefix('\\') {
            // Escapes are resolved later; an escaped `$` is not a reference.
            out.push('\\');
            let mut chars = escaped.chars();
            if let Some(ch) = chars.next() {
                out.push(ch);
            }
            rest = chars.as_str();
        } else {
            let (name, tail) = split_identifier(&marker[1..]);
            if name.is_empty() {
                out.push('$');
            } else {
                out.push_str(&protect(scope.lookup(name)));
            }
            rest = tail;
        }
    }
    out.push_str(rest);
    out
}

/// Escape backslashes of substituted text so escape resolution gives them
/// back unchanged.
fn protect(value: &str) -> String {
    value.replace('\\', r"\\")
}

/// Drop the backslash of every escape in unquoted and double-quoted text.
pub fn resolve_escapes(tokens: Vec<Token>, _scope: &Scope<'_>) -> Vec<Token> {
    tokens
        .into_iter()
        .map(|token| match token {
            Token::Word(text) => Token::Word(unescape(&text)),
            Token::StrongQuote(text) => Token::StrongQuote(unescape(&text)),
            other => other,
        })
        .collect()
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
        } else if let Some(escaped) = chars.next() {
            out.push(escaped);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn env() -> Environment {
        Environment::with_vars(
            Config::new("/home/ann", "ann", "/tmp"),
            [
                ("FOO".to_string(), "bar".to_string()),
                ("WIN".to_string(), r"C:\temp".to_string()),
            ],
        )
    }

    fn word(text: &str) -> Token {
        Token::Word(text.to_string())
    }

    fn expand(tokens: Vec<Token>) -> Vec<Token> {
        let env = env();
        ExpansionChain::default().execute(tokens, &Scope::new(&env))
    }

    #[test]
    fn test_tilde_expansion() {
        assert_eq!(
            expand(vec![
                word("~"),
                Token::Space,
                word("~/src"),
                Token::Space,
                word("a~"),
                Token::Space,
                Token::WeakQuote("~".to_string()),
            ]),
            vec![
                word("/home/ann"),
                Token::Space,
                word("/home/ann/src"),
                Token::Space,
                word("a~"),
                Token::Space,
                Token::WeakQuote("~".to_string()),
            ]
        );
    }

    #[test]
    fn test_variable_merges_sigil_and_name() {
        assert_eq!(
            expand(vec![word("echo"), Token::Space, Token::VariableSigil, word("FOO")]),
            vec![word("echo"), Token::Space, word("bar")]
        );
    }

    #[test]
    fn test_assign_sigil_after_variable_is_text() {
        assert_eq!(
            expand(vec![
                Token::VariableSigil,
                word("FOO"),
                Token::AssignSigil,
                word("x"),
            ]),
            vec![word("bar"), word("="), word("x")]
        );
        assert_eq!(
            expand(vec![word("A"), Token::AssignSigil, Token::VariableSigil, word("FOO")]),
            vec![word("A"), Token::AssignSigil, word("bar")]
        );
    }

    #[test]
    fn test_single_digit_variable() {
        assert_eq!(
            expand(vec![Token::VariableSigil, word("9"), word("FOO")]),
            vec![word(""), word("FOO")]
        );
    }

    #[test]
    fn test_sigil_without_name_stays_literal() {
        assert_eq!(
            expand(vec![Token::VariableSigil, word("-x")]),
            vec![word("$-x")]
        );
        assert_eq!(
            expand(vec![word("cost"), Token::VariableSigil]),
            vec![word("cost"), Token::VariableSigil]
        );
    }

    #[test]
    fn test_strong_quote_substitution() {
        assert_eq!(
            expand(vec![Token::StrongQuote(r"hi $FOO, $NOPE! \$FOO costs $".to_string())]),
            vec![Token::StrongQuote("hi bar, ! $FOO costs $".to_string())]
        );
    }

    #[test]
    fn test_weak_quote_untouched() {
        let quoted = Token::WeakQuote(r"$FOO \n".to_string());
        assert_eq!(expand(vec![quoted.clone()]), vec![quoted]);
    }

    #[test]
    fn test_substituted_backslashes_survive() {
        assert_eq!(
            expand(vec![Token::VariableSigil, word("WIN")]),
            vec![word(r"C:\temp")]
        );
        assert_eq!(
            expand(vec![Token::StrongQuote("$WIN".to_string())]),
            vec![Token::StrongQuote(r"C:\temp".to_string())]
        );
    }

    #[test]
    fn test_escape_resolution() {
        assert_eq!(
            expand(vec![
                word(r#"\"Hello"#),
                word(r"a\\b"),
                word(r"abc\"),
                Token::StrongQuote(r#"s/\'/\"/g"#.to_string()),
            ]),
            vec![
                word(r#""Hello"#),
                word(r"a\b"),
                word("abc"),
                Token::StrongQuote(r#"s/'/"/g"#.to_string()),
            ]
        );
    }

    #[test]
    fn test_custom_rule_runs_last() {
        fn shout(tokens: Vec<Token>, _scope: &Scope<'_>) -> Vec<Token> {
            tokens
                .into_iter()
                .map(|token| match token {
                    Token::Word(text) => Token::Word(text.to_uppercase()),
                    other => other,
                })
                .collect()
        }

        let env = env();
        let chain = ExpansionChain::default().with_rule(shout);
        assert_eq!(
            chain.execute(vec![Token::VariableSigil, word("FOO")], &Scope::new(&env)),
            vec![word("BAR")]
        );
    }
}
