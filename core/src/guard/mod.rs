//! The execution guard: refuses stale, repeated or unconfirmed runs, then
//! frames the wrapped command's output into the execution log.

mod prompt;
mod transcript;

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use chrono::NaiveDate;
use futures::FutureExt;
use tokio::io::AsyncRead;

use crate::clock::{Clock, SystemClock};
use crate::destination::{Destination, LocalDestination};
use crate::error::GuardError;
use crate::naming::{NameTemplate, NamingContext};
use crate::sink::{SinkHandle, StreamPair};

pub use transcript::GENERATOR_LINE;

pub const DEFAULT_DIALOG_MESSAGE: &str = "Do you really execute `{}` ?";

/// What the wrapped command learns about the run it belongs to.
#[derive(Debug, Clone)]
pub struct ScriptContext {
    pub name: String,
    pub args: Vec<String>,
    pub exec_date: NaiveDate,
}

pub type ScriptFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// The wrapped command. Receives the stdout and stderr writers; every byte
/// written reaches both the destination and the console.
pub type Script = Box<dyn FnOnce(ScriptContext, SinkHandle, SinkHandle) -> ScriptFuture + Send>;

/// Box an async closure as a [`Script`].
pub fn script_fn<F, Fut>(f: F) -> Script
where
    F: FnOnce(ScriptContext, SinkHandle, SinkHandle) -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Box::new(move |ctx, stdout, stderr| Box::pin(f(ctx, stdout, stderr)))
}

/// Inputs to a guard. Everything except `script` has a default.
#[derive(Default)]
pub struct GuardOptions {
    /// Explicit run name; wins over `default_name_template`.
    pub name: Option<String>,
    pub default_name_template: Option<String>,
    /// Command line of the wrapped command; defaults to this process's args.
    pub args: Option<Vec<String>>,
    /// Day the run is scheduled for; defaults to today.
    pub exec_date: Option<NaiveDate>,
    pub confirm_dialog: Option<bool>,
    /// Confirmation question; must contain exactly one `{}` for the name.
    pub dialog_message: Option<String>,
    pub destination: Option<Box<dyn Destination>>,
    pub script: Option<Script>,
    pub prompt_input: Option<Box<dyn AsyncRead + Unpin + Send>>,
    /// Where the live echo goes; defaults to process stdout/stderr.
    pub console: Option<StreamPair>,
    pub clock: Option<Arc<dyn Clock>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Unvalidated,
    Validated,
    DateMismatch,
    CheckFailed,
    AlreadyLogged,
    Cancelled,
    Running,
    /// The wrapped command returned successfully. Failures after this point
    /// (footer, close, panics) no longer count against the command.
    Completed,
    Failed,
}

struct Prepared {
    name: String,
    args: Vec<String>,
    exec_date: NaiveDate,
    confirm_dialog: bool,
    dialog_message: String,
    destination: Box<dyn Destination>,
    script: Option<Script>,
    prompt_input: Box<dyn AsyncRead + Unpin + Send>,
    console: StreamPair,
    clock: Arc<dyn Clock>,
}

pub struct ExecutionGuard {
    options: Option<GuardOptions>,
    state: GuardState,
}

impl ExecutionGuard {
    pub fn new(options: GuardOptions) -> Self {
        Self {
            options: Some(options),
            state: GuardState::Unvalidated,
        }
    }

    pub fn state(&self) -> GuardState {
        self.state
    }

    fn validate(&mut self) -> Result<Prepared, GuardError> {
        let options = self
            .options
            .take()
            .ok_or_else(|| GuardError::Config("guard has already run".to_string()))?;

        let script = options
            .script
            .ok_or_else(|| GuardError::Config("Script is required".to_string()))?;
        let clock = options.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let args = options
            .args
            .unwrap_or_else(|| std::env::args().collect::<Vec<_>>());
        let exec_date = options.exec_date.unwrap_or_else(|| clock.today());

        let name = match (options.name, options.default_name_template) {
            (Some(name), _) if !name.is_empty() => name,
            (_, Some(template)) if !template.trim().is_empty() => {
                let ctx = NamingContext {
                    args: &args,
                    exec_date,
                    today: clock.today(),
                };
                NameTemplate::parse(&template)?.render(&ctx)?
            }
            _ => {
                let first = args
                    .first()
                    .ok_or_else(|| GuardError::Config("no arguments".to_string()))?;
                base_name(first)
            }
        };
        if name.is_empty() {
            return Err(GuardError::Config("name is empty".to_string()));
        }

        let mut destination = options.destination.unwrap_or_else(|| {
            tracing::warn!("log destination is not specified, using a log file in the current directory");
            Box::new(LocalDestination::in_current_dir())
        });
        destination.set_name(&name);

        let dialog_message = options
            .dialog_message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_DIALOG_MESSAGE.to_string());
        let placeholders = dialog_message.matches("{}").count();
        if placeholders != 1 {
            return Err(GuardError::Config(format!(
                "dialog message must contain exactly one {{}} placeholder for the name: found {placeholders}"
            )));
        }

        self.state = GuardState::Validated;
        Ok(Prepared {
            name,
            args,
            exec_date,
            confirm_dialog: options.confirm_dialog.unwrap_or(true),
            dialog_message,
            destination,
            script: Some(script),
            prompt_input: options
                .prompt_input
                .unwrap_or_else(|| Box::new(tokio::io::stdin())),
            console: options
                .console
                .unwrap_or_else(|| StreamPair::new(SinkHandle::stdout(), SinkHandle::stderr())),
            clock,
        })
    }

    /// Validate, check, confirm and run the wrapped command once.
    ///
    /// A panic in the wrapped command is re-raised unchanged. A panic after
    /// the command completed is logged and swallowed, since the transcript
    /// has already been written by then.
    #[tracing::instrument(name = "guard.run", skip(self))]
    pub async fn run(&mut self) -> Result<(), GuardError> {
        let mut prepared = self.validate()?;
        let outcome = AssertUnwindSafe(self.execute(&mut prepared))
            .catch_unwind()
            .await;
        match outcome {
            Ok(result) => result,
            Err(panic) if self.state == GuardState::Completed => {
                tracing::error!(panic = %panic_message(panic.as_ref()), "panicked after the script completed");
                Ok(())
            }
            Err(panic) => {
                tracing::info!("script is not complete, but panicked");
                std::panic::resume_unwind(panic)
            }
        }
    }

    async fn execute(&mut self, p: &mut Prepared) -> Result<(), GuardError> {
        let today = p.clock.today();
        if p.exec_date != today {
            self.state = GuardState::DateMismatch;
            return Err(GuardError::DateMismatch {
                scheduled: p.exec_date,
                today,
            });
        }

        let location = p.destination.to_string();
        match p.destination.exists().await {
            Ok(false) => {}
            Ok(true) => {
                self.state = GuardState::AlreadyLogged;
                return Err(GuardError::AlreadyExists { location });
            }
            Err(source) => {
                self.state = GuardState::CheckFailed;
                return Err(GuardError::DestinationCheck { location, source });
            }
        }

        tracing::info!(destination = %location, "log output to `{}`", location);
        if p.confirm_dialog {
            let answer = prompt::confirm(
                &p.dialog_message,
                &p.name,
                &p.console.stderr,
                p.prompt_input.as_mut(),
            )
            .await;
            if let Err(err) = answer {
                self.state = GuardState::Cancelled;
                return Err(err);
            }
        }

        self.running(p, location).await
    }

    async fn running(&mut self, p: &mut Prepared, location: String) -> Result<(), GuardError> {
        self.state = GuardState::Running;

        let pair = match p.destination.open().await {
            Ok(pair) => pair,
            Err(source) => {
                self.state = GuardState::Failed;
                // Members of a composite that did open still need releasing.
                close_quietly(p.destination.as_mut()).await;
                return Err(GuardError::DestinationOpen { location, source });
            }
        };
        let transcript = pair.merged();

        let header = transcript::header(&p.name, &p.clock.now());
        if let Err(source) = transcript.write_str(&header).await {
            self.state = GuardState::Failed;
            close_quietly(p.destination.as_mut()).await;
            return Err(GuardError::TranscriptWrite { location, source });
        }

        let script = p
            .script
            .take()
            .ok_or_else(|| GuardError::Config("Script is required".to_string()))?;
        let ctx = ScriptContext {
            name: p.name.clone(),
            args: p.args.clone(),
            exec_date: p.exec_date,
        };
        let writers = pair.tee(&p.console);
        let outcome = AssertUnwindSafe(async move { script(ctx, writers.stdout, writers.stderr).await })
            .catch_unwind()
            .await;

        match outcome {
            Err(panic) => {
                let footer = transcript::footer(&p.clock.now(), None);
                if let Err(err) = transcript.write_str(&footer).await {
                    tracing::warn!(destination = %location, error = %err, "footer write failed");
                }
                close_quietly(p.destination.as_mut()).await;
                std::panic::resume_unwind(panic)
            }
            Ok(Err(script_err)) => {
                self.state = GuardState::Failed;
                let message = format!("{script_err:#}");
                let footer = transcript::footer(&p.clock.now(), Some(&message));
                if let Err(err) = transcript.write_str(&footer).await {
                    tracing::warn!(destination = %location, error = %err, "footer write failed");
                }
                close_quietly(p.destination.as_mut()).await;
                Err(GuardError::Script(script_err))
            }
            Ok(Ok(())) => {
                if let Err(err) = p.console.stderr.write_str("\n").await {
                    tracing::debug!(error = %err, "console newline write failed");
                }
                self.state = GuardState::Completed;

                let footer = transcript::footer(&p.clock.now(), None);
                let written = transcript.write_str(&footer).await;
                let closed = p.destination.close().await;
                if let Err(source) = written {
                    if let Err(err) = closed {
                        tracing::error!(destination = %location, error = %err, "log destination close failed");
                    }
                    return Err(GuardError::TranscriptWrite { location, source });
                }
                closed.map_err(|source| GuardError::DestinationClose { location, source })
            }
        }
    }
}

async fn close_quietly(destination: &mut dyn Destination) {
    if let Err(err) = destination.close().await {
        tracing::error!(destination = %destination, error = %err, "log destination close failed");
    }
}

fn base_name(arg: &str) -> String {
    Path::new(arg)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| arg.to_string())
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_name_strips_directories() {
        assert_eq!(base_name("/usr/local/bin/cleanup.sh"), "cleanup.sh");
        assert_eq!(base_name("cleanup"), "cleanup");
    }

    #[test]
    fn panic_message_reads_str_and_string_payloads() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
    }
}
