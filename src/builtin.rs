use crate::command::ExitCode;
use crate::env::Environment;
use crate::error::{FAILURE, report};
use crate::expand::expand_tilde;
use anyhow::{Context, Result, anyhow, bail};
use argh::{EarlyExit, FromArgs};
use std::collections::BTreeMap;
use std::env;
use std::io::Write;
use std::marker::PhantomData;
use std::path::PathBuf;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed
/// inside whichever process runs them: the shell itself on the fast path, or
/// a forked child when redirected, backgrounded or part of a pipeline.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "echo" or "cd".
    fn name() -> &'static str;

    /// One-line usage shown by `help`.
    fn usage() -> &'static str;

    /// How many leading words may be read as options; the rest are operands.
    fn options_end(args: &[&str]) -> usize {
        args.len()
    }

    /// Executes the command.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode>;
}

/// Uniform invoke contract behind which every builtin is stored.
trait Handler {
    fn invoke(&self, argv: &[String], stdout: &mut dyn Write, env: &mut Environment) -> ExitCode;
}

struct Entry<T>(PhantomData<T>);

impl<T: BuiltinCommand> Handler for Entry<T> {
    fn invoke(&self, argv: &[String], stdout: &mut dyn Write, env: &mut Environment) -> ExitCode {
        let mut args: Vec<&str> = argv.iter().skip(1).map(String::as_str).collect();
        // A lone `-` is an operand, not an option.
        let mut split = T::options_end(&args);
        if let Some(pos) = args.iter().position(|arg| *arg == "-") {
            split = split.min(pos);
        }
        if split < args.len() && !args[..split].contains(&"--") {
            args.insert(split, "--");
        }
        let command = match T::from_args(&[T::name()], &args) {
            Ok(command) => command,
            Err(EarlyExit { output, status }) => {
                return match status {
                    Ok(()) => match writeln!(stdout, "{}", output.trim_end()) {
                        Ok(()) => 0,
                        Err(e) => {
                            report(format_args!("{}: {e}", T::name()));
                            FAILURE
                        }
                    },
                    Err(()) => {
                        report(format_args!("{}: {}", T::name(), output.trim_end()));
                        FAILURE
                    }
                };
            }
        };
        let code = match command.execute(stdout, env) {
            Ok(code) => code,
            Err(e) => {
                report(format_args!("{e:#}"));
                FAILURE
            }
        };
        if let Err(e) = stdout.flush() {
            log::warn!("{}: flushing output failed: {e}", T::name());
        }
        code
    }
}

/// Name-keyed table of builtin commands.
pub struct Builtins {
    table: BTreeMap<&'static str, Box<dyn Handler>>,
}

impl Builtins {
    fn register<T: BuiltinCommand + 'static>(&mut self) {
        self.table.insert(T::name(), Box::new(Entry::<T>(PhantomData)));
    }

    /// Whether `name` refers to a builtin.
    pub fn is_builtin(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    /// Run the builtin named by `argv[0]` and return its exit status.
    ///
    /// Returns [`FAILURE`] if `argv` does not name a builtin.
    pub fn run(&self, argv: &[String], stdout: &mut dyn Write, env: &mut Environment) -> ExitCode {
        match argv.first().and_then(|name| self.table.get(name.as_str())) {
            Some(handler) => handler.invoke(argv, stdout, env),
            None => FAILURE,
        }
    }
}

impl Default for Builtins {
    /// All builtins: `cd`, `echo`, `exit`, `export`, `help`, `pwd`, `unset`.
    fn default() -> Self {
        let mut builtins = Self {
            table: BTreeMap::new(),
        };
        builtins.register::<Cd>();
        builtins.register::<Exit>();
        builtins.register::<Pwd>();
        builtins.register::<Echo>();
        builtins.register::<Help>();
        builtins.register::<Export>();
        builtins.register::<Unset>();
        builtins
    }
}

/// `(name, usage)` of every builtin, in the order `help` lists them.
fn topics() -> [(&'static str, &'static str); 7] {
    [
        (Cd::name(), Cd::usage()),
        (Exit::name(), Exit::usage()),
        (Pwd::name(), Pwd::usage()),
        (Echo::name(), Echo::usage()),
        (Help::name(), Help::usage()),
        (Export::name(), Export::usage()),
        (Unset::name(), Unset::usage()),
    ]
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn usage() -> &'static str {
        "pwd - Print working directory"
    }

    fn execute(self, stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
        let cwd = env::current_dir().context("pwd")?;
        writeln!(stdout, "{}", cwd.display())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the home directory.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; `-` means the previous directory and a
    /// leading `~` the home directory.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn usage() -> &'static str {
        "cd [directory] - Change directory"
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let target = match self.target.as_deref() {
            None | Some("") => env.home_dir().ok_or_else(|| anyhow!("cd: HOME not set"))?,
            Some("-") => env
                .previous_dir
                .clone()
                .ok_or_else(|| anyhow!("cd: no previous directory"))?,
            Some(dir) => PathBuf::from(expand_tilde(dir, env).as_ref()),
        };

        let current = env::current_dir().ok();
        env::set_current_dir(&target)
            .with_context(|| format!("cd: {}", target.display()))?;

        let now = env::current_dir().unwrap_or(target);
        env.set_var("PWD", now.display().to_string());
        if let Some(previous) = current {
            env.set_var("OLDPWD", previous.display().to_string());
            env.previous_dir = Some(previous);
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Exit the shell.
pub struct Exit {
    #[argh(positional)]
    /// exit status, 0 when omitted; only the low 8 bits are used.
    pub code: Option<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn usage() -> &'static str {
        "exit [n] - Exit shell with status n"
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let code = match self.code.as_deref() {
            None => 0,
            Some(text) => text
                .parse::<i64>()
                .map_err(|_| anyhow!("exit: {text}: numeric argument required"))?,
        };
        let code = (code & 0xff) as ExitCode;
        env.should_exit = Some(code);
        Ok(code)
    }
}

#[derive(FromArgs)]
/// write the arguments to standard output, separated by spaces.
/// by default, a trailing newline is printed.
pub struct Echo {
    #[argh(switch, short = 'n')]
    /// do not output the trailing newline.
    pub no_newline: bool,

    #[argh(positional, greedy)]
    /// values to print as-is, separated by spaces.
    pub args: Vec<String>,
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn usage() -> &'static str {
        "echo [-n] [args...] - Print arguments"
    }

    /// Only a leading `-n` is an option; `echo -5` or `echo --help` print as written.
    fn options_end(args: &[&str]) -> usize {
        usize::from(args.first() == Some(&"-n"))
    }

    fn execute(self, stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
        let s = self.args.join(" ");
        if self.no_newline {
            write!(stdout, "{}", s)?;
        } else {
            writeln!(stdout, "{}", s)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Show help for builtin commands.
pub struct Help {
    #[argh(positional)]
    /// builtin to describe; all builtins are listed when omitted.
    pub topic: Option<String>,
}

impl BuiltinCommand for Help {
    fn name() -> &'static str {
        "help"
    }

    fn usage() -> &'static str {
        "help [command] - Show help"
    }

    fn execute(self, stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
        match self.topic {
            None => {
                writeln!(stdout, "Lemuen Shell - Available builtin commands:")?;
                writeln!(stdout, "==========================================")?;
                for (_, usage) in topics() {
                    writeln!(stdout, "  {usage}")?;
                }
                writeln!(
                    stdout,
                    "\nFor more information about a command, type: help <command>"
                )?;
            }
            Some(topic) => match topics().iter().find(|(name, _)| *name == topic) {
                Some((_, usage)) => writeln!(stdout, "{usage}")?,
                None => bail!("help: no help topics match '{topic}'"),
            },
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Set a variable passed to executed commands.
pub struct Export {
    #[argh(positional)]
    /// assignment in the form name=value.
    pub assignment: String,
}

impl BuiltinCommand for Export {
    fn name() -> &'static str {
        "export"
    }

    fn usage() -> &'static str {
        "export name=value - Set environment variable"
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let Some((name, value)) = self.assignment.split_once('=') else {
            bail!("export: invalid format, use: name=value");
        };
        if !is_name(name) {
            bail!("export: `{name}': not a valid identifier");
        }
        env.set_var(name, value);
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Remove a variable.
pub struct Unset {
    #[argh(positional)]
    /// name of the variable to remove.
    pub name: String,
}

impl BuiltinCommand for Unset {
    fn name() -> &'static str {
        "unset"
    }

    fn usage() -> &'static str {
        "unset name - Unset environment variable"
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        env.unset_var(&self.name);
        Ok(0)
    }
}

fn is_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}
