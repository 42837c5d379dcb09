use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use log::warn;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use tokio::sync::Mutex;

use crate::config::Settings;
use crate::error::{LedgerError, Result};
use crate::mcp::{decode_args, tool_schema, Content, McpServer, ToolDef, ToolOutput};

/// Binaries that are never run: destructive system mutators and
/// remote-access clients.
const BLACKLISTED_COMMANDS: &[&str] = &[
    "rm", "rmdir", "dd", "mkfs", "fdisk", "parted", "shred", "shutdown", "reboot", "halt",
    "poweroff", "init", "sudo", "su", "chown", "ssh", "scp", "sftp", "telnet", "nc", "ncat",
    "netcat", "kill", "killall", "pkill",
];

/// Shell metacharacters refused in the command and every argument; commands
/// are spawned directly, never through a shell, and these have no legitimate
/// use in that mode.
const BLOCKED_METACHARACTERS: &[char] = &[';', '|', '&', '`', '$', '>', '<', '(', ')'];

const HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct CommandRecord {
    command: String,
    arguments: Vec<String>,
    working_directory: String,
    started: DateTime<Utc>,
    exit_code: Option<i32>,
    timed_out: bool,
}

type History = Arc<Mutex<VecDeque<CommandRecord>>>;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ExecuteCommandArgs {
    command: String,
    #[serde(default)]
    arguments: Vec<String>,
    working_directory: Option<String>,
    /// Seconds; the configured default applies when omitted.
    timeout: Option<u64>,
    capture_output: Option<bool>,
    #[serde(default)]
    environment: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ValidateCommandArgs {
    command: String,
    #[serde(default)]
    arguments: Vec<String>,
    working_directory: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct HistoryArgs {
    limit: Option<usize>,
}

/// Applies the blacklist and metacharacter policy without executing.
fn check_policy(command: &str, arguments: &[String]) -> Result<()> {
    let base = Path::new(command)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(command)
        .to_lowercase();
    if BLACKLISTED_COMMANDS.contains(&base.as_str()) {
        return Err(LedgerError::Blocked(format!(
            "command refused by policy (blocked_keyword: \"{}\")",
            base
        )));
    }
    for piece in std::iter::once(command).chain(arguments.iter().map(|s| s.as_str())) {
        if let Some(c) = piece.chars().find(|c| BLOCKED_METACHARACTERS.contains(c)) {
            return Err(LedgerError::Blocked(format!(
                "shell metacharacter '{}' refused in '{}'",
                c, piece
            )));
        }
    }
    Ok(())
}

/// Resolves and confines the working directory to the configured root,
/// symlinks included.
fn resolve_working_dir(settings: &Settings, requested: Option<&str>) -> Result<PathBuf> {
    let root = settings.terminal_root.canonicalize().map_err(|err| {
        LedgerError::Validation(format!(
            "terminal root {} is not usable: {}",
            settings.terminal_root.display(),
            err
        ))
    })?;
    let target = match requested {
        Some(dir) => {
            let path = PathBuf::from(dir);
            if path.is_absolute() {
                path
            } else {
                root.join(path)
            }
        }
        None => root.clone(),
    };
    let resolved = target.canonicalize().map_err(|_| {
        LedgerError::Validation(format!("working directory '{}' does not exist", target.display()))
    })?;
    if !resolved.starts_with(&root) {
        return Err(LedgerError::Blocked(format!(
            "working directory '{}' escapes the allowed root '{}'",
            resolved.display(),
            root.display()
        )));
    }
    Ok(resolved)
}

/// Kills the child's whole process group. `start_kill` alone signals only
/// the leader pid and would leak grandchildren past the timeout.
#[cfg(unix)]
fn kill_process_group(child: &tokio::process::Child) {
    if let Some(pid) = child.id() {
        unsafe {
            libc::killpg(pid as libc::pid_t, libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &tokio::process::Child) {}

fn truncate_output(bytes: &[u8], cap: usize) -> (String, bool) {
    let truncated = bytes.len() > cap;
    let slice = &bytes[..bytes.len().min(cap)];
    (String::from_utf8_lossy(slice).into_owned(), truncated)
}

async fn execute(
    settings: &Settings,
    history: &History,
    args: ExecuteCommandArgs,
) -> Result<ToolOutput> {
    check_policy(&args.command, &args.arguments)?;
    let working_dir = resolve_working_dir(settings, args.working_directory.as_deref())?;
    let capture = args.capture_output.unwrap_or(true);
    let timeout = Duration::from_secs(args.timeout.unwrap_or(settings.terminal_timeout_secs));

    let mut command = tokio::process::Command::new(&args.command);
    command
        .args(&args.arguments)
        .current_dir(&working_dir)
        .envs(&args.environment)
        .stdin(Stdio::null())
        .kill_on_drop(true);
    if capture {
        command.stdout(Stdio::piped()).stderr(Stdio::piped());
    } else {
        command.stdout(Stdio::null()).stderr(Stdio::null());
    }
    #[cfg(unix)]
    command.process_group(0);

    let started = Utc::now();
    let mut child = command.spawn().map_err(|err| {
        LedgerError::Validation(format!("failed to spawn '{}': {}", args.command, err))
    })?;

    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();
    let read_streams = async {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        if let Some(pipe) = stdout_pipe.as_mut() {
            let _ = pipe.read_to_end(&mut stdout).await;
        }
        if let Some(pipe) = stderr_pipe.as_mut() {
            let _ = pipe.read_to_end(&mut stderr).await;
        }
        (stdout, stderr)
    };

    let run = async { tokio::join!(read_streams, child.wait()) };
    let ((stdout, stderr), status) = match tokio::time::timeout(timeout, run).await {
        Ok((streams, status)) => (streams, status),
        Err(_) => {
            // Budget exceeded: the child is its own process-group leader
            // (set at spawn), so SIGKILL the whole group to take any
            // grandchildren down with it, then reap.
            kill_process_group(&child);
            let _ = child.start_kill();
            let _ = child.wait().await;
            push_history(
                history,
                &args,
                &working_dir,
                started,
                None,
                true,
            )
            .await;
            return Err(LedgerError::Timeout(format!(
                "command '{}' exceeded {}s and was killed",
                args.command,
                timeout.as_secs()
            )));
        }
    };
    let status = status?;

    let cap = settings.terminal_output_cap;
    let (stdout_text, stdout_truncated) = truncate_output(&stdout, cap);
    let (stderr_text, stderr_truncated) = truncate_output(&stderr, cap);
    push_history(history, &args, &working_dir, started, status.code(), false).await;

    let payload = serde_json::json!({
        "success": status.success(),
        "exitCode": status.code(),
        "stdout": stdout_text,
        "stderr": stderr_text,
        "stdoutTruncated": stdout_truncated,
        "stderrTruncated": stderr_truncated,
        "workingDirectory": working_dir.display().to_string(),
    });
    Ok(ToolOutput::success(vec![Content::json(&payload)?]))
}

async fn push_history(
    history: &History,
    args: &ExecuteCommandArgs,
    working_dir: &Path,
    started: DateTime<Utc>,
    exit_code: Option<i32>,
    timed_out: bool,
) {
    let mut history = history.lock().await;
    if history.len() >= HISTORY_LIMIT {
        history.pop_front();
    }
    history.push_back(CommandRecord {
        command: args.command.clone(),
        arguments: args.arguments.clone(),
        working_directory: working_dir.display().to_string(),
        started,
        exit_code,
        timed_out,
    });
}

/// Builds the Terminal tool server.
pub fn build_server(settings: Arc<Settings>) -> McpServer {
    let mut server = McpServer::new("terminal", env!("CARGO_PKG_VERSION")).with_instructions(
        "Runs child processes under a command blacklist, a confined working \
         directory and per-call timeouts. validate_command applies the same \
         policy without executing.",
    );
    let history: History = Arc::new(Mutex::new(VecDeque::new()));

    let exec_settings = Arc::clone(&settings);
    let exec_history = Arc::clone(&history);
    server.tools.register(ToolDef {
        name: "execute_terminal_command".to_string(),
        description: "Run a child process under the terminal policy".to_string(),
        input_schema: tool_schema::<ExecuteCommandArgs>(),
        handler: Arc::new(move |args| {
            let settings = Arc::clone(&exec_settings);
            let history = Arc::clone(&exec_history);
            async move {
                let args: ExecuteCommandArgs = decode_args(args)?;
                execute(&settings, &history, args).await
            }
            .boxed()
        }),
    });

    let validate_settings = Arc::clone(&settings);
    server.tools.register(ToolDef {
        name: "validate_command".to_string(),
        description: "Apply the terminal policy to a command without running it".to_string(),
        input_schema: tool_schema::<ValidateCommandArgs>(),
        handler: Arc::new(move |args| {
            let settings = Arc::clone(&validate_settings);
            async move {
                let args: ValidateCommandArgs = decode_args(args)?;
                let verdict = check_policy(&args.command, &args.arguments).and_then(|_| {
                    resolve_working_dir(&settings, args.working_directory.as_deref()).map(|_| ())
                });
                let payload = match verdict {
                    Ok(()) => serde_json::json!({ "success": true, "allowed": true }),
                    Err(err) => {
                        warn!("validate_command refused: {}", err);
                        serde_json::json!({
                            "success": true,
                            "allowed": false,
                            "reason": err.to_string(),
                        })
                    }
                };
                Ok(ToolOutput::success(vec![Content::json(&payload)?]))
            }
            .boxed()
        }),
    });

    let history_handle = history;
    server.tools.register(ToolDef {
        name: "get_command_history".to_string(),
        description: "Recent commands run by this server, newest last".to_string(),
        input_schema: tool_schema::<HistoryArgs>(),
        handler: Arc::new(move |args| {
            let history = Arc::clone(&history_handle);
            async move {
                let args: HistoryArgs = decode_args(args)?;
                let history = history.lock().await;
                let records: Vec<&CommandRecord> = history
                    .iter()
                    .rev()
                    .take(args.limit.unwrap_or(20))
                    .collect();
                let payload = serde_json::json!({
                    "success": true,
                    "count": records.len(),
                    "commands": records,
                });
                Ok(ToolOutput::success(vec![Content::json(&payload)?]))
            }
            .boxed()
        }),
    });

    server
}
