use std::process::Stdio;

use tokio::process::Command;

/// Build the platform shell invocation for a command line (`sh -c` / `cmd /C`).
pub(crate) fn shell_command(command_line: &str) -> Command {
    cfg_if::cfg_if! {
        if #[cfg(target_family = "windows")] {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(command_line);
        } else {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command_line);
        }
    }
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    cmd
}

/// Captured output is reported as text even when the command writes invalid UTF-8.
pub(crate) fn decode(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}
