use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use crate::error::GuardError;
use crate::sink::SinkHandle;

pub(crate) fn is_affirmative(answer: &str) -> bool {
    let answer = answer.trim().to_lowercase();
    answer == "y" || answer == "yes"
}

/// Ask the operator to confirm; anything but `y`/`yes` cancels.
pub(crate) async fn confirm(
    message: &str,
    name: &str,
    output: &SinkHandle,
    input: &mut (dyn AsyncRead + Unpin + Send),
) -> Result<(), GuardError> {
    let question = format!("{} [y/n]:", message.replacen("{}", name, 1));
    output
        .write_str(&question)
        .await
        .map_err(GuardError::Prompt)?;
    output.flush().await.map_err(GuardError::Prompt)?;

    let mut reader = BufReader::new(input);
    let mut answer = String::new();
    let read = reader
        .read_line(&mut answer)
        .await
        .map_err(GuardError::Prompt)?;
    if read == 0 {
        return Err(GuardError::Prompt(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "no answer on input",
        )));
    }

    if is_affirmative(&answer) {
        Ok(())
    } else {
        tracing::info!(answer = %answer.trim(), "execution not confirmed");
        Err(GuardError::Cancelled)
    }
}
