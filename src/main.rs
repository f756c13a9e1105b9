use argh::FromArgs;
use lemuen::{Interpreter, signal};
use std::io::Write;
use std::path::PathBuf;

#[derive(FromArgs)]
/// Lemuen, a small interactive command shell.
struct Args {
    #[argh(option, short = 'c')]
    /// run COMMAND and exit with its status instead of starting the prompt.
    command: Option<String>,

    #[argh(option, default = "String::from(\"lemuen> \")")]
    /// prompt shown before each line.
    prompt: String,

    #[argh(option)]
    /// file to load line history from and save it to.
    history: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args: Args = argh::from_env();
    let mut sh = Interpreter::default();

    let code = match args.command {
        Some(line) => sh.run_line(&line).status(),
        None => {
            if let Err(errno) = signal::ignore_job_control() {
                log::warn!("failed to ignore job-control signals: {errno}");
            }
            sh.repl(&args.prompt, args.history.as_deref())?
        }
    };

    std::io::stdout().flush()?;
    std::process::exit(code & 0xff);
}
