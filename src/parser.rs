use crate::command::{Assignment, Pipeline, Stage};
use crate::lexer::{Token, is_identifier};

/// An argument under construction: the merged text of adjacent tokens.
#[derive(Debug, Default)]
struct Argument {
    text: String,
    parts: usize,
    named: bool,
    assign_at: Option<usize>,
}

impl Argument {
    fn push(&mut self, token: &Token) {
        match (token, self.parts) {
            (Token::Word(text), 0) => self.named = is_identifier(text),
            (Token::AssignSigil, 1) if self.named => self.assign_at = Some(self.text.len()),
            _ => {}
        }
        self.text.push_str(token.text());
        self.parts += 1;
    }
}

#[derive(Debug, Default)]
struct StageBuilder {
    arguments: Vec<Argument>,
    current: Option<Argument>,
}

impl StageBuilder {
    fn push(&mut self, token: &Token) {
        self.current.get_or_insert_with(Argument::default).push(token);
    }

    fn end_argument(&mut self) {
        if let Some(argument) = self.current.take() {
            self.arguments.push(argument);
        }
    }

    /// Close the stage. Leading `NAME=VALUE` arguments become assignments,
    /// everything from the first ordinary argument on is `argv`.
    fn finish(&mut self) -> Option<Stage> {
        self.end_argument();
        let arguments = std::mem::take(&mut self.arguments);
        if arguments.is_empty() {
            return None;
        }

        let mut stage = Stage::default();
        for argument in arguments {
            match argument.assign_at {
                Some(pos) if stage.argv.is_empty() => stage.assignments.push(Assignment {
                    name: argument.text[..pos].to_string(),
                    value: argument.text[pos + 1..].to_string(),
                }),
                _ => stage.argv.push(argument.text),
            }
        }
        Some(stage)
    }
}

/// Split an expanded token sequence into pipeline stages.
///
/// Pipes separate stages and spaces separate arguments; adjacent tokens of
/// any other kind are merged into one argument, so `'quoted'adjacent` is a
/// single argument.
pub fn construct_pipeline(tokens: &[Token]) -> Pipeline {
    let mut stages = Vec::new();
    let mut builder = StageBuilder::default();

    for token in tokens {
        match token {
            Token::Pipe => stages.extend(builder.finish()),
            Token::Space => builder.end_argument(),
            token => builder.push(token),
        }
    }
    stages.extend(builder.finish());

    Pipeline { stages }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Tokenizer;

    fn pipeline(line: &str) -> Pipeline {
        let mut tokenizer = Tokenizer::new();
        tokenizer.tokenize(line).unwrap();
        construct_pipeline(&tokenizer.collect().unwrap_or_default())
    }

    fn argv(stage: &Stage) -> Vec<&str> {
        stage.argv.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_adjacent_tokens_merge() {
        let pipeline = pipeline("echo check 'some nice text'Test");
        assert_eq!(pipeline.len(), 1);
        assert_eq!(argv(&pipeline.stages[0]), ["echo", "check", "some nice textTest"]);
    }

    #[test]
    fn test_pipes_split_stages() {
        let pipeline = pipeline("ls -l | grep myfile");
        assert_eq!(pipeline.len(), 2);
        assert_eq!(argv(&pipeline.stages[0]), ["ls", "-l"]);
        assert_eq!(argv(&pipeline.stages[1]), ["grep", "myfile"]);
    }

    #[test]
    fn test_empty_input_has_no_stages() {
        assert!(construct_pipeline(&[]).is_empty());
    }

    #[test]
    fn test_assignment_only_stage() {
        let pipeline = pipeline("FOO=bar");
        let stage = &pipeline.stages[0];
        assert!(stage.is_assignment_only());
        assert_eq!(
            stage.assignments,
            vec![Assignment {
                name: "FOO".to_string(),
                value: "bar".to_string()
            }]
        );
    }

    #[test]
    fn test_leading_assignments_prefix_command() {
        let pipeline = pipeline("A=1 B='x y' env A=2");
        let stage = &pipeline.stages[0];
        assert_eq!(stage.assignments.len(), 2);
        assert_eq!(stage.assignments[1].name, "B");
        assert_eq!(stage.assignments[1].value, "x y");
        assert_eq!(argv(stage), ["env", "A=2"]);
        assert_eq!(stage.name(), Some("env"));
        assert_eq!(stage.args(), ["A=2".to_string()]);
    }

    #[test]
    fn test_empty_value_assignment() {
        let pipeline = pipeline("EMPTY=");
        assert_eq!(pipeline.stages[0].assignments[0].value, "");
    }

    #[test]
    fn test_empty_quotes_are_arguments() {
        let tokens = [
            Token::Word("echo".to_string()),
            Token::Space,
            Token::WeakQuote(String::new()),
        ];
        assert_eq!(argv(&construct_pipeline(&tokens).stages[0]), ["echo", ""]);
    }

    #[test]
    fn test_leftover_sigils_are_text() {
        let tokens = [
            Token::Word("cost".to_string()),
            Token::VariableSigil,
            Token::Space,
            Token::WeakQuote("x".to_string()),
            Token::AssignSigil,
        ];
        assert_eq!(argv(&construct_pipeline(&tokens).stages[0]), ["cost$", "x="]);
    }
}
