//! End-to-end behaviour of `lemuen -c LINE`.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn lemuen(line: &str, dir: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_lemuen"))
        .arg("-c")
        .arg(line)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .stdin(Stdio::null())
        .output()
        .expect("failed to run lemuen")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn status(output: &Output) -> i32 {
    output.status.code().expect("lemuen killed by a signal")
}

#[test]
fn echo_builtin() {
    let tmp = TempDir::new().unwrap();
    let out = lemuen("echo hello   world", tmp.path());
    assert_eq!(stdout(&out), "hello world\n");
    assert_eq!(status(&out), 0);
}

#[test]
fn pipeline_status_is_last_stage() {
    let tmp = TempDir::new().unwrap();
    assert_eq!(status(&lemuen("false | true", tmp.path())), 0);
    assert_eq!(status(&lemuen("true | false", tmp.path())), 1);
    assert_eq!(status(&lemuen("false | false | true", tmp.path())), 0);
}

#[test]
fn child_exit_code_is_kept() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("seven.sh"), "exit 7\n").unwrap();
    assert_eq!(status(&lemuen("sh seven.sh", tmp.path())), 7);
}

#[test]
fn pipeline_passes_data_through() {
    let tmp = TempDir::new().unwrap();
    let out = lemuen("echo one two three | tr a-z A-Z | wc -w", tmp.path());
    assert_eq!(stdout(&out).trim(), "3");
    assert_eq!(status(&out), 0);
}

#[test]
fn producer_dies_quietly_when_reader_exits() {
    let tmp = TempDir::new().unwrap();
    let out = lemuen("yes | head -n 1", tmp.path());
    assert_eq!(stdout(&out), "y\n");
    assert_eq!(stderr(&out), "");
    assert_eq!(status(&out), 0);
}

#[test]
fn echo_prints_option_like_words() {
    let tmp = TempDir::new().unwrap();
    let out = lemuen("echo --help ; echo -5 ; echo -e x ; echo -n done", tmp.path());
    assert_eq!(stdout(&out), "--help\n-5\n-e x\ndone");
    assert_eq!(stderr(&out), "");
    assert_eq!(status(&out), 0);
}

#[test]
fn builtin_inside_pipeline() {
    let tmp = TempDir::new().unwrap();
    let out = lemuen("echo piped | cat", tmp.path());
    assert_eq!(stdout(&out), "piped\n");
}

#[test]
fn redirection_round_trip() {
    let tmp = TempDir::new().unwrap();
    let out = lemuen("echo hi > out.txt && cat out.txt", tmp.path());
    assert_eq!(stdout(&out), "hi\n");
    assert_eq!(status(&out), 0);
    assert_eq!(fs::read_to_string(tmp.path().join("out.txt")).unwrap(), "hi\n");

    let out = lemuen("cat < out.txt", tmp.path());
    assert_eq!(stdout(&out), "hi\n");
}

#[test]
fn append_after_truncate() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("log.txt");
    fs::write(&file, "stale\n").unwrap();
    let line = "echo one > log.txt ; echo two >> log.txt ; echo three >>log.txt";
    let out = lemuen(line, tmp.path());
    assert_eq!(status(&out), 0);
    assert_eq!(fs::read_to_string(&file).unwrap(), "one\ntwo\nthree\n");
}

#[test]
fn redirection_overrides_pipe() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("in.txt"), "from file\n").unwrap();
    let out = lemuen("echo mid > mid.txt | cat", tmp.path());
    assert_eq!(stdout(&out), "");
    assert_eq!(fs::read_to_string(tmp.path().join("mid.txt")).unwrap(), "mid\n");

    let out = lemuen("echo ignored | cat < in.txt", tmp.path());
    assert_eq!(stdout(&out), "from file\n");
}

#[test]
fn missing_input_file_fails_stage() {
    let tmp = TempDir::new().unwrap();
    let out = lemuen("cat < missing.txt", tmp.path());
    assert_eq!(status(&out), 1);
    assert!(stderr(&out).contains("missing.txt"), "stderr: {}", stderr(&out));
}

#[test]
fn and_short_circuit_then_sequence() {
    let tmp = TempDir::new().unwrap();
    let out = lemuen("false && echo no ; echo yes", tmp.path());
    assert_eq!(stdout(&out), "yes\n");
    assert_eq!(status(&out), 0);
}

#[test]
fn or_runs_on_failure_only() {
    let tmp = TempDir::new().unwrap();
    let out = lemuen("false || echo fallback", tmp.path());
    assert_eq!(stdout(&out), "fallback\n");
    let out = lemuen("true || echo never", tmp.path());
    assert_eq!(stdout(&out), "");
    assert_eq!(status(&out), 0);
}

#[test]
fn sequence_status_is_last_unit() {
    let tmp = TempDir::new().unwrap();
    assert_eq!(status(&lemuen("true ; false", tmp.path())), 1);
    assert_eq!(status(&lemuen("false ; true", tmp.path())), 0);
}

#[test]
fn command_not_found() {
    let tmp = TempDir::new().unwrap();
    let out = lemuen("nosuchcmd123", tmp.path());
    assert_eq!(status(&out), 127);
    assert!(stderr(&out).contains("command not found: nosuchcmd123"));
    assert_eq!(stdout(&out), "");
}

#[test]
fn missing_stage_does_not_stop_siblings() {
    let tmp = TempDir::new().unwrap();
    let out = lemuen("nosuchcmd123 | echo still", tmp.path());
    assert_eq!(stdout(&out), "still\n");
    assert_eq!(status(&out), 0);

    let out = lemuen("echo lost | nosuchcmd123", tmp.path());
    assert_eq!(status(&out), 127);
}

#[test]
fn syntax_error() {
    let tmp = TempDir::new().unwrap();
    let out = lemuen("echo a | | wc", tmp.path());
    assert_eq!(status(&out), 1);
    assert!(stderr(&out).contains("syntax error"));
    assert_eq!(stdout(&out), "");
}

#[test]
fn exit_terminates_with_code() {
    let tmp = TempDir::new().unwrap();
    let out = lemuen("exit 7 ; echo unreachable", tmp.path());
    assert_eq!(status(&out), 7);
    assert_eq!(stdout(&out), "");
}

#[test]
fn exit_in_pipeline_only_ends_the_child() {
    let tmp = TempDir::new().unwrap();
    let out = lemuen("exit 4 | true ; echo after", tmp.path());
    assert_eq!(stdout(&out), "after\n");
    assert_eq!(status(&out), 0);
}

#[test]
fn variables_are_substituted_and_exported() {
    let tmp = TempDir::new().unwrap();
    let out = lemuen(
        r"export NAME=lemuen ; echo $NAME ${NAME}sh \$NAME [$UNSET_VAR_XYZ] ; sh -c env | grep ^NAME=",
        tmp.path(),
    );
    assert_eq!(stdout(&out), "lemuen lemuensh $NAME []\nNAME=lemuen\n");
}

#[test]
fn unset_hides_variable_from_children() {
    let tmp = TempDir::new().unwrap();
    let out = lemuen("export GONE=1 ; unset GONE ; env | grep -c ^GONE=", tmp.path());
    assert_eq!(stdout(&out).trim(), "0");
}

#[test]
fn forked_builtin_state_is_discarded() {
    let tmp = TempDir::new().unwrap();
    let out = lemuen("export LOST=1 | true ; echo [$LOST]", tmp.path());
    assert_eq!(stdout(&out), "[]\n");
    let out = lemuen("export KEPT=1 ; echo [$KEPT]", tmp.path());
    assert_eq!(stdout(&out), "[1]\n");
}

#[test]
fn cd_changes_directory_for_later_commands() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir(tmp.path().join("sub")).unwrap();
    let out = lemuen("cd sub && pwd && /bin/pwd ; cd - ; pwd", tmp.path());
    let top = tmp.path().canonicalize().unwrap();
    let sub = top.join("sub");
    assert_eq!(
        stdout(&out),
        format!("{}\n{}\n{}\n", sub.display(), sub.display(), top.display())
    );
}

#[test]
fn path_changes_select_different_programs() {
    let tmp = TempDir::new().unwrap();
    for (dir, word) in [("a", "first"), ("b", "second")] {
        let dir = tmp.path().join(dir);
        fs::create_dir(&dir).unwrap();
        let tool = dir.join("which-one");
        fs::write(&tool, format!("#!/bin/sh\necho {word}\n")).unwrap();
        fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();
    }
    let a = tmp.path().join("a");
    let b = tmp.path().join("b");
    let line = format!(
        "export PATH={a}:{b} ; which-one ; export PATH={b}:{a} ; which-one",
        a = a.display(),
        b = b.display()
    );
    let out = lemuen(&line, tmp.path());
    assert_eq!(stdout(&out), "first\nsecond\n");
}

#[test]
fn non_executable_is_not_found() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("script"), "#!/bin/sh\necho nope\n").unwrap();
    let out = lemuen("./script", tmp.path());
    assert_eq!(status(&out), 127);
}

#[test]
fn background_returns_immediately() {
    let tmp = TempDir::new().unwrap();
    let started = Instant::now();
    let out = Command::new(env!("CARGO_BIN_EXE_lemuen"))
        .arg("-c")
        .arg("sleep 5 > /dev/null & ; echo foreground")
        .current_dir(tmp.path())
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .expect("failed to run lemuen");
    assert!(started.elapsed() < Duration::from_secs(4));

    let text = stdout(&out);
    let mut lines = text.lines();
    let notice = lines.next().expect("job notification");
    assert!(notice.starts_with('[') && notice.ends_with("] sleep"), "{notice}");
    let pid: i32 = notice[1..notice.find(']').unwrap()].parse().unwrap();
    assert!(pid > 0);
    assert_eq!(lines.next(), Some("foreground"));
    assert_eq!(status(&out), 0);
}

#[test]
fn help_lists_builtins() {
    let tmp = TempDir::new().unwrap();
    let out = lemuen("help", tmp.path());
    for name in ["cd", "exit", "pwd", "echo", "help", "export", "unset"] {
        assert!(stdout(&out).contains(&format!("  {name}")), "{name} missing");
    }
}
