//! Forked execution of pipelines: pipes, redirections, waiting and jobs.

use crate::builtin::Builtins;
use crate::command::{Command, ExitCode};
use crate::env::Environment;
use crate::error::{Error, FAILURE, Outcome, report};
use crate::expand::{substitute, substitute_all};
use crate::signal;
use nix::errno::Errno;
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, dup2_stdin, dup2_stdout, execve, fork, pipe, setpgid};
use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::fd::OwnedFd;
use std::os::unix::ffi::OsStringExt;
use std::os::unix::fs::OpenOptionsExt;

/// A background pipeline whose children have not all been reaped yet.
#[derive(Debug)]
pub struct Job {
    /// Process group leader: the first child forked for the pipeline.
    pub leader: Pid,
    /// Program name of the leading stage.
    pub name: String,
    pending: Vec<Pid>,
}

impl Job {
    /// Children of this job that have not been reaped.
    pub fn pending(&self) -> &[Pid] {
        &self.pending
    }

    pub fn is_done(&self) -> bool {
        self.pending.is_empty()
    }

    /// Collect whichever children have terminated, without blocking.
    pub(crate) fn reap(&mut self) {
        self.pending.retain(|&pid| {
            match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::StillAlive) | Err(Errno::EINTR) => true,
                Ok(status) => {
                    log::debug!("reaped background process {pid}: {status:?}");
                    false
                }
                Err(errno) => {
                    log::warn!("waitpid({pid}) failed: {errno}");
                    false
                }
            }
        });
    }
}

enum Program {
    Builtin,
    External { path: CString, argv: Vec<CString> },
}

/// A stage with its words substituted and its program resolved.
struct Stage {
    argv: Vec<String>,
    input: Option<String>,
    output: Option<(String, bool)>,
    program: Program,
}

impl Stage {
    fn prepare(
        command: &Command,
        env: &mut Environment,
        builtins: &Builtins,
    ) -> Result<Self, Error> {
        let argv = substitute_all(&command.argv, env);
        let input = command
            .input_redirect
            .as_deref()
            .map(|path| substitute(path, env).into_owned());
        let output = command
            .output_redirect
            .as_deref()
            .map(|path| (substitute(path, env).into_owned(), command.append));

        let name = argv.first().map(String::as_str).unwrap_or_default();
        let program = if builtins.is_builtin(name) {
            Program::Builtin
        } else {
            let path = env
                .resolve_command(name)
                .ok_or_else(|| Error::NotFound(name.to_owned()))?;
            log::debug!("resolved {name} to {}", path.display());
            let nul = |_| Error::Spawn {
                context: "argument contains a NUL byte",
                source: Errno::EINVAL,
            };
            Program::External {
                path: CString::new(path.into_os_string().into_vec()).map_err(nul)?,
                argv: argv
                    .iter()
                    .map(|arg| CString::new(arg.as_bytes()))
                    .collect::<Result<_, _>>()
                    .map_err(nul)?,
            }
        };
        Ok(Self {
            argv,
            input,
            output,
            program,
        })
    }
}

/// Run a pipeline (one or more stages) in forked children.
///
/// Foreground pipelines are waited for and yield the last stage's status.
/// Background pipelines are put in their own process group, announced as
/// `[<pid>] <name>`, recorded in `jobs` and yield success immediately.
pub(crate) fn run_pipeline(
    head: &Command,
    env: &mut Environment,
    builtins: &Builtins,
    jobs: &mut Vec<Job>,
) -> Outcome {
    let background = head.is_background();
    let stage_count = head.stages().count();
    let envp = env.envp();

    let mut children: Vec<(Pid, String)> = Vec::with_capacity(stage_count);
    let mut last_pid = None;
    let mut failure = None;
    let mut group: Option<Pid> = None;
    let mut prev_read: Option<OwnedFd> = None;

    for (i, command) in head.stages().enumerate() {
        let is_last = i + 1 == stage_count;
        let (next_read, write_end) = if is_last {
            (None, None)
        } else {
            match pipe() {
                Ok((read, write)) => (Some(read), Some(write)),
                Err(source) => {
                    let err = Error::Spawn {
                        context: "pipe failed",
                        source,
                    };
                    report(&err);
                    failure = Some(err);
                    break;
                }
            }
        };

        let stage = match Stage::prepare(command, env, builtins) {
            Ok(stage) => stage,
            Err(err) => {
                // Not forked; dropping this stage's pipe ends gives its
                // neighbours EOF and EPIPE.
                report(&err);
                if is_last {
                    failure = Some(err);
                }
                prev_read = next_read;
                continue;
            }
        };

        flush_stdout();
        // SAFETY: the child only rewires descriptors and then either execs
        // or runs a builtin and exits; it never returns into the caller.
        match unsafe { fork() } {
            Ok(ForkResult::Child) => {
                let join = background.then(|| group.unwrap_or(Pid::from_raw(0)));
                drop(next_read);
                let code = run_child(&stage, prev_read, write_end, join, env, builtins, &envp);
                flush_stdout();
                std::process::exit(code & 0xff);
            }
            Ok(ForkResult::Parent { child }) => {
                log::debug!("forked {child} for `{}`", stage.argv.join(" "));
                if background {
                    let leader = *group.get_or_insert(child);
                    if let Err(errno) = setpgid(child, leader) {
                        // The child may already have done it, or exited.
                        log::debug!("setpgid({child}, {leader}): {errno}");
                    }
                }
                if is_last {
                    last_pid = Some(child);
                }
                let name = stage.argv.into_iter().next().unwrap_or_default();
                children.push((child, name));
            }
            Err(source) => {
                let err = Error::Spawn {
                    context: "fork failed",
                    source,
                };
                report(&err);
                if is_last {
                    failure = Some(err);
                }
            }
        }
        // The parent keeps no pipe ends belonging to forked stages.
        drop(prev_read);
        drop(write_end);
        prev_read = next_read;
    }
    drop(prev_read);

    if background {
        let Some((leader, name)) = children.first().cloned() else {
            return failure.map_or(Outcome::Exited(FAILURE), Outcome::Failed);
        };
        println!("[{leader}] {name}");
        flush_stdout();
        jobs.push(Job {
            leader,
            name,
            pending: children.into_iter().map(|(pid, _)| pid).collect(),
        });
        return Outcome::SUCCESS;
    }

    let mut last_status = None;
    for (pid, _) in &children {
        match wait_for(*pid) {
            Ok(status) => {
                log::debug!("process {pid} finished: {status:?}");
                if Some(*pid) == last_pid {
                    last_status = Some(exit_code(status));
                }
            }
            Err(errno) => log::warn!("waitpid({pid}) failed: {errno}"),
        }
    }
    match (failure, last_status) {
        (Some(err), _) => Outcome::Failed(err),
        (None, Some(code)) => Outcome::Exited(code),
        (None, None) => Outcome::Exited(FAILURE),
    }
}

/// Body of a forked stage. Returns the status the child exits with when it
/// does not exec.
fn run_child(
    stage: &Stage,
    stdin: Option<OwnedFd>,
    stdout: Option<OwnedFd>,
    group: Option<Pid>,
    env: &mut Environment,
    builtins: &Builtins,
    envp: &[CString],
) -> ExitCode {
    if let Some(group) = group {
        if let Err(errno) = setpgid(Pid::from_raw(0), group) {
            log::warn!("setpgid failed: {errno}");
        }
    }
    if let Err(err) = connect(stdin, stdout).and_then(|()| redirect(stage)) {
        report(&err);
        return FAILURE;
    }
    if let Err(errno) = signal::restore_default() {
        log::warn!("restoring signal dispositions failed: {errno}");
    }

    match &stage.program {
        Program::Builtin => builtins.run(&stage.argv, &mut io::stdout(), env),
        Program::External { path, argv } => match execve(path, argv, envp) {
            Ok(never) => match never {},
            Err(source) => {
                report(Error::Spawn {
                    context: "exec failed",
                    source,
                });
                FAILURE
            }
        },
    }
}

/// Install the pipe ends as standard input and output.
fn connect(stdin: Option<OwnedFd>, stdout: Option<OwnedFd>) -> Result<(), Error> {
    let spawn = |context| move |source| Error::Spawn { context, source };
    if let Some(fd) = stdin {
        dup2_stdin(&fd).map_err(spawn("failed to connect input pipe"))?;
    }
    if let Some(fd) = stdout {
        dup2_stdout(&fd).map_err(spawn("failed to connect output pipe"))?;
    }
    Ok(())
}

/// Apply the stage's own redirections, overriding any pipe wiring.
fn redirect(stage: &Stage) -> Result<(), Error> {
    let io_error = |path: &str| {
        let path = path.to_owned();
        move |source: io::Error| Error::Io { path, source }
    };
    if let Some(path) = &stage.input {
        let file = File::open(path).map_err(io_error(path))?;
        dup2_stdin(&file)
            .map_err(io::Error::from)
            .map_err(io_error(path))?;
    }
    if let Some((path, append)) = &stage.output {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .append(*append)
            .truncate(!*append)
            .mode(0o644)
            .open(path)
            .map_err(io_error(path))?;
        dup2_stdout(&file)
            .map_err(io::Error::from)
            .map_err(io_error(path))?;
    }
    Ok(())
}

fn flush_stdout() {
    if let Err(e) = io::stdout().flush() {
        log::debug!("flushing standard output failed: {e}");
    }
}

/// Block until `pid` terminates.
fn wait_for(pid: Pid) -> nix::Result<WaitStatus> {
    loop {
        match waitpid(pid, None) {
            Err(Errno::EINTR) => continue,
            result => return result,
        }
    }
}

/// Shell exit code for a terminated child: its own code, or 128 + signal.
fn exit_code(status: WaitStatus) -> ExitCode {
    match status {
        WaitStatus::Exited(_, code) => code,
        WaitStatus::Signaled(_, signal, _) => 128 + signal as ExitCode,
        _ => FAILURE,
    }
}
