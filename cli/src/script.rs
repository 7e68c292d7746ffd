//! The wrapped command, run as a child process.

use std::process::{ExitStatus, Stdio};

use anyhow::{anyhow, Context};
use runonce_core::api::{script_fn, Script, ScriptContext, SinkHandle};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

pub const EXECUTION_ENV_KEY: &str = "RUNONCE_EXECUTION_ENV";

pub fn execution_env_value() -> String {
    format!("runonce {}", env!("CARGO_PKG_VERSION"))
}

/// Spawn `command` with inherited stdin and its output piped into the guard.
pub fn command_script(command: Vec<String>) -> Script {
    script_fn(move |ctx, stdout, stderr| async move {
        run_command(&command, &ctx, stdout, stderr)
            .await
            .map_err(|e| anyhow!("command runtime error: {e:#}"))
    })
}

async fn run_command(
    command: &[String],
    ctx: &ScriptContext,
    stdout: SinkHandle,
    stderr: SinkHandle,
) -> anyhow::Result<()> {
    let (program, rest) = command
        .split_first()
        .ok_or_else(|| anyhow!("empty command"))?;

    tracing::debug!(name = %ctx.name, program = %program, "spawning command");
    let mut child = Command::new(program)
        .args(rest)
        .env(EXECUTION_ENV_KEY, execution_env_value())
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("spawn {program}"))?;

    let out = child.stdout.take().ok_or_else(|| anyhow!("stdout not piped"))?;
    let err = child.stderr.take().ok_or_else(|| anyhow!("stderr not piped"))?;

    let waited = async {
        tokio::select! {
            status = child.wait() => status.map_err(anyhow::Error::from),
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("interrupted, killing the command");
                let _ = child.kill().await;
                Err(anyhow!("interrupted"))
            }
        }
    };
    let pumped = async { tokio::try_join!(pump(out, stdout, "stdout"), pump(err, stderr, "stderr")) };

    let (status, pumped) = tokio::join!(waited, pumped);
    let status: ExitStatus = status?;
    let (out_bytes, err_bytes) = pumped?;
    tracing::debug!(
        status = %status,
        stdout_bytes = out_bytes,
        stderr_bytes = err_bytes,
        "command finished"
    );

    if !status.success() {
        return Err(anyhow!("{status}"));
    }
    Ok(())
}

async fn pump<R>(mut rd: R, wr: SinkHandle, label: &'static str) -> anyhow::Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; 16 * 1024];
    let mut total = 0u64;
    loop {
        let n = rd
            .read(&mut buf)
            .await
            .with_context(|| format!("read {label}"))?;
        if n == 0 {
            break;
        }
        wr.write_all(&buf[..n])
            .await
            .with_context(|| format!("write {label}"))?;
        total += n as u64;
    }
    wr.flush().await.with_context(|| format!("flush {label}"))?;
    Ok(total)
}
