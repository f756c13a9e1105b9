use crate::builtin::Builtins;
use crate::command::{Command, ExitCode};
use crate::env::Environment;
use crate::error::{Outcome, report};
use crate::expand::substitute_all;
use crate::parser;
use crate::pipeline::{Job, run_pipeline};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io;
use std::path::Path;

/// A shell interpreter that parses lines and executes them.
///
/// The interpreter owns the [`Environment`] (variables, previous directory,
/// `PATH` cache), the builtin table and the list of background jobs.
///
/// Example
/// ```no_run
/// use lemuen::Interpreter;
/// let mut sh = Interpreter::default();
/// let outcome = sh.run_line("echo hello world && true");
/// assert_eq!(outcome.status(), 0);
/// ```
pub struct Interpreter {
    env: Environment,
    builtins: Builtins,
    jobs: Vec<Job>,
}

impl Interpreter {
    /// Create an interpreter working on the given environment.
    pub fn new(env: Environment) -> Self {
        Self {
            env,
            builtins: Builtins::default(),
            jobs: Vec::new(),
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    /// Background jobs that have not finished yet.
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    /// Parse and run one line of input.
    ///
    /// Blank lines succeed without running anything. A syntax error is
    /// reported and yields a failure without running any part of the line.
    pub fn run_line(&mut self, line: &str) -> Outcome {
        match parser::parse(line) {
            Ok(Some(command)) => {
                log::debug!("parsed `{command}`");
                self.execute(&command)
            }
            Ok(None) => Outcome::SUCCESS,
            Err(err) => {
                log::error!("failed to parse {line:?}: {err}");
                report(&err);
                Outcome::Failed(err.into())
            }
        }
    }

    /// Execute a command graph: each `;` unit in turn, regardless of the
    /// previous unit's status. The result is that of the last unit run.
    ///
    /// Stops early only when the `exit` builtin runs.
    pub fn execute(&mut self, command: &Command) -> Outcome {
        let mut unit = Some(command);
        let mut outcome = Outcome::SUCCESS;
        while let Some(current) = unit {
            outcome = self.execute_and_or(current);
            if let Outcome::Exit(_) = outcome {
                break;
            }
            unit = current.sequence_next.as_deref();
        }
        outcome
    }

    /// Evaluate an and/or list left to right with short-circuiting.
    fn execute_and_or(&mut self, first: &Command) -> Outcome {
        let mut outcome = self.execute_pipeline(first);
        let mut element = first;
        while let Some((op, next)) = &element.logic_next {
            if let Outcome::Exit(_) = outcome {
                break;
            }
            if op.should_continue(outcome.status()) {
                outcome = self.execute_pipeline(next);
            } else {
                log::debug!(
                    "skipping `{}` after status {}",
                    next.argv.join(" "),
                    outcome.status()
                );
            }
            element = next;
        }
        outcome
    }

    /// Run one pipeline. A lone builtin without redirections that is not
    /// backgrounded runs in this process so that it can change the shell's
    /// own state; everything else is forked.
    fn execute_pipeline(&mut self, head: &Command) -> Outcome {
        let in_process = head.pipe_next.is_none() && !head.has_redirect() && !head.background;
        if in_process {
            let argv = substitute_all(&head.argv, &self.env);
            if argv.first().is_some_and(|name| self.builtins.is_builtin(name)) {
                let code = self.builtins.run(&argv, &mut io::stdout(), &mut self.env);
                return match self.env.should_exit.take() {
                    Some(code) => Outcome::Exit(code),
                    None => Outcome::Exited(code),
                };
            }
        }
        run_pipeline(head, &mut self.env, &self.builtins, &mut self.jobs)
    }

    /// Reap background jobs without blocking and return those that finished.
    pub fn reap_jobs(&mut self) -> Vec<Job> {
        for job in &mut self.jobs {
            job.reap();
        }
        let (done, running) = self.jobs.drain(..).partition(Job::is_done);
        self.jobs = running;
        for job in &done {
            log::info!("[{}] {} done", job.leader, job.name);
        }
        done
    }

    /// Read-Eval-Print Loop on the controlling terminal.
    ///
    /// Returns the status the shell should exit with: the `exit` argument,
    /// or the last command's status at end of input.
    pub fn repl(&mut self, prompt: &str, history: Option<&Path>) -> anyhow::Result<ExitCode> {
        let mut rl = DefaultEditor::new()?;
        if let Some(path) = history {
            if let Err(err) = rl.load_history(path) {
                log::debug!("no history loaded from {}: {err}", path.display());
            }
        }

        let mut status = 0;
        let code = loop {
            self.reap_jobs();
            match rl.readline(prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str())?;
                    }
                    match self.run_line(&line) {
                        Outcome::Exit(code) => {
                            println!("Bye from Lemuen Shell!");
                            break code;
                        }
                        outcome => status = outcome.status(),
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => {
                    println!();
                    break status;
                }
                Err(err) => return Err(err.into()),
            }
        };

        if let Some(path) = history {
            if let Err(err) = rl.save_history(path) {
                log::warn!("failed to save history to {}: {err}", path.display());
            }
        }
        Ok(code)
    }
}

impl Default for Interpreter {
    /// An interpreter over a snapshot of the process environment.
    fn default() -> Self {
        Self::new(Environment::new())
    }
}
