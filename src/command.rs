use std::fmt;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// Operator joining an element of an and/or list to the one after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    /// `&&`: the continuation runs only if the current element succeeded.
    And,
    /// `||`: the continuation runs only if the current element failed.
    Or,
}

impl LogicOp {
    /// Whether the continuation should run after an element finished with `status`.
    pub fn should_continue(self, status: ExitCode) -> bool {
        match self {
            LogicOp::And => status == 0,
            LogicOp::Or => status != 0,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            LogicOp::And => "&&",
            LogicOp::Or => "||",
        }
    }
}

/// One pipeline stage of a parsed line, plus the links that make up the
/// whole command graph.
///
/// The first stage of a pipeline carries the pipeline-level links:
/// `logic_next` points at the next element of an and/or list, and
/// `sequence_next` (set on the first stage of the first element only)
/// points at the unit after a `;`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    /// Program or builtin name followed by its arguments.
    pub argv: Vec<String>,
    /// File replacing standard input (`< path`).
    pub input_redirect: Option<String>,
    /// File replacing standard output (`> path` or `>> path`).
    pub output_redirect: Option<String>,
    /// Open `output_redirect` for appending instead of truncating it.
    pub append: bool,
    /// The pipeline this stage belongs to runs without blocking the caller.
    pub background: bool,
    /// Next stage of the same pipeline.
    pub pipe_next: Option<Box<Command>>,
    /// Unit following a `;`, run regardless of this unit's outcome.
    pub sequence_next: Option<Box<Command>>,
    /// Next element of the and/or list with the operator that joins it.
    pub logic_next: Option<(LogicOp, Box<Command>)>,
}

impl Command {
    /// Create a lone stage running `argv` with no redirections or links.
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Program or builtin name, if any.
    pub fn name(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }

    /// Iterate over the stages of the pipeline starting at `self`.
    pub fn stages(&self) -> Stages<'_> {
        Stages { next: Some(self) }
    }

    pub fn has_redirect(&self) -> bool {
        self.input_redirect.is_some() || self.output_redirect.is_some()
    }

    /// Whether the pipeline starting at `self` runs in the background.
    pub fn is_background(&self) -> bool {
        self.stages().any(|stage| stage.background)
    }

    fn fmt_stage(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.argv.join(" "))?;
        if let Some(path) = &self.input_redirect {
            write!(f, " < {path}")?;
        }
        if let Some(path) = &self.output_redirect {
            let op = if self.append { ">>" } else { ">" };
            write!(f, " {op} {path}")?;
        }
        Ok(())
    }

    fn fmt_pipeline(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stage) in self.stages().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            stage.fmt_stage(f)?;
        }
        if self.is_background() {
            f.write_str(" &")?;
        }
        Ok(())
    }
}

/// Iterator over the stages of one pipeline, following `pipe_next`.
pub struct Stages<'a> {
    next: Option<&'a Command>,
}

impl<'a> Iterator for Stages<'a> {
    type Item = &'a Command;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.pipe_next.as_deref();
        Some(current)
    }
}

/// Renders the graph back to normalized line text.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_pipeline(f)?;
        let mut element = self;
        while let Some((op, next)) = &element.logic_next {
            write!(f, " {} ", op.symbol())?;
            next.fmt_pipeline(f)?;
            element = next;
        }
        if let Some(next) = &self.sequence_next {
            write!(f, "; {next}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_follow_pipe_links() {
        let mut head = Command::new(["ls", "-l"]);
        head.pipe_next = Some(Box::new(Command::new(["wc"])));
        let names: Vec<_> = head.stages().filter_map(Command::name).collect();
        assert_eq!(names, ["ls", "wc"]);
    }

    #[test]
    fn background_flag_on_any_stage_covers_pipeline() {
        let mut tail = Command::new(["wc"]);
        tail.background = true;
        let mut head = Command::new(["yes"]);
        head.pipe_next = Some(Box::new(tail));
        assert!(head.is_background());
        assert!(!Command::new(["yes"]).is_background());
    }

    #[test]
    fn logic_op_continuation() {
        assert!(LogicOp::And.should_continue(0));
        assert!(!LogicOp::And.should_continue(1));
        assert!(LogicOp::Or.should_continue(127));
        assert!(!LogicOp::Or.should_continue(0));
    }

    #[test]
    fn display_renders_whole_graph() {
        let mut first = Command::new(["echo", "a"]);
        first.output_redirect = Some("x".to_string());
        first.pipe_next = Some(Box::new(Command::new(["wc"])));
        first.logic_next = Some((LogicOp::Or, Box::new(Command::new(["b"]))));
        first.sequence_next = Some(Box::new(Command::new(["c"])));
        assert_eq!(first.to_string(), "echo a > x | wc || b; c");
    }
}
