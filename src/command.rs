/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// One `NAME=VALUE` prefix of a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub name: String,
    pub value: String,
}

/// A single command of a pipeline: its leading inline assignments and its
/// argument list (`argv[0]` is the command name).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stage {
    pub assignments: Vec<Assignment>,
    pub argv: Vec<String>,
}

impl Stage {
    /// The command name, if the stage has any arguments.
    pub fn name(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }

    /// Arguments following the command name.
    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }

    pub fn is_assignment_only(&self) -> bool {
        self.argv.is_empty() && !self.assignments.is_empty()
    }
}

/// Stages connected by pipes, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
}

impl Pipeline {
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }
}
