mod common;

use std::panic::AssertUnwindSafe;

use chrono::{Duration, SecondsFormat};
use common::{at_noon, fixed_clock, BrokenSink, Console, FakeDestination, FakeState};
use futures::FutureExt;
use pretty_assertions::assert_eq;
use runonce_core::api::{
    script_fn, ExecutionGuard, GuardError, GuardOptions, GuardState, LocalDestination, SinkHandle,
    StreamPair,
};

fn options(console: &Console, input: &'static str) -> GuardOptions {
    GuardOptions {
        name: Some("test_run".to_string()),
        args: Some(vec!["test_run".to_string()]),
        console: Some(console.pair()),
        prompt_input: Some(Box::new(input.as_bytes())),
        clock: Some(fixed_clock()),
        script: Some(script_fn(|_ctx, stdout, _stderr| async move {
            stdout.write_str("run!\n").await?;
            Ok::<(), anyhow::Error>(())
        })),
        ..Default::default()
    }
}

fn stamp() -> String {
    at_noon().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[tokio::test]
async fn runs_once_then_refuses_the_second_time() {
    let dir = tempfile::tempdir().unwrap();
    let console = Console::default();

    let mut guard = ExecutionGuard::new(GuardOptions {
        destination: Some(Box::new(LocalDestination::new(dir.path()))),
        ..options(&console, "yes\n")
    });
    guard.run().await.unwrap();
    assert_eq!(guard.state(), GuardState::Completed);

    let path = dir.path().join("test_run.log");
    let expected = format!(
        "# This log is generated by runonce\nname: test_run\nstart: {s}\n---\nrun!\n\n---\nend: {s}\n",
        s = stamp()
    );
    assert_eq!(std::fs::read_to_string(&path).unwrap(), expected);
    assert_eq!(console.stdout.contents(), "run!\n");
    assert_eq!(
        console.stderr.contents(),
        "Do you really execute `test_run` ? [y/n]:\n"
    );

    let mut again = ExecutionGuard::new(GuardOptions {
        destination: Some(Box::new(LocalDestination::new(dir.path()))),
        ..options(&Console::default(), "yes\n")
    });
    let err = again.run().await.unwrap_err();
    assert_eq!(
        err.to_string(),
        format!(
            "Can't execute! Execution log destination [{}] already exists",
            path.display()
        )
    );
    assert!(err.is_refusal());
    assert_eq!(again.state(), GuardState::AlreadyLogged);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), expected);
}

#[tokio::test]
async fn refuses_a_run_scheduled_for_another_day() {
    let console = Console::default();
    let (dest, state) = FakeDestination::new(FakeState::default());
    let mut guard = ExecutionGuard::new(GuardOptions {
        destination: Some(Box::new(dest)),
        exec_date: Some(at_noon().date_naive() - Duration::days(1)),
        ..options(&console, "yes\n")
    });

    let err = guard.run().await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "exec_date: 2022-06-04 is not today! (today: 2022-06-05)"
    );
    assert_eq!(guard.state(), GuardState::DateMismatch);
    assert_eq!(state.opened(), 0);
    assert_eq!(console.stderr.contents(), "");
}

#[tokio::test]
async fn declined_prompt_cancels_without_opening() {
    let console = Console::default();
    let (dest, state) = FakeDestination::new(FakeState::default());
    let mut guard = ExecutionGuard::new(GuardOptions {
        destination: Some(Box::new(dest)),
        ..options(&console, "no\n")
    });

    let err = guard.run().await.unwrap_err();
    assert!(matches!(err, GuardError::Cancelled));
    assert_eq!(err.to_string(), "canceled.");
    assert_eq!(guard.state(), GuardState::Cancelled);
    assert_eq!(state.opened(), 0);
}

#[tokio::test]
async fn closed_prompt_input_is_a_prompt_error() {
    let (dest, state) = FakeDestination::new(FakeState::default());
    let mut guard = ExecutionGuard::new(GuardOptions {
        destination: Some(Box::new(dest)),
        ..options(&Console::default(), "")
    });

    let err = guard.run().await.unwrap_err();
    assert!(matches!(err, GuardError::Prompt(_)));
    assert_eq!(state.opened(), 0);
}

#[tokio::test]
async fn no_confirm_dialog_skips_the_prompt() {
    let console = Console::default();
    let (dest, state) = FakeDestination::new(FakeState::default());
    let mut guard = ExecutionGuard::new(GuardOptions {
        destination: Some(Box::new(dest)),
        confirm_dialog: Some(false),
        ..options(&console, "")
    });

    guard.run().await.unwrap();
    assert_eq!(state.opened(), 1);
    assert_eq!(state.closed(), 1);
    assert_eq!(console.stderr.contents(), "\n");
}

#[tokio::test]
async fn split_destination_gets_banners_on_both_channels() {
    let (dest, state) = FakeDestination::new(FakeState::default());
    let mut guard = ExecutionGuard::new(GuardOptions {
        destination: Some(Box::new(dest)),
        confirm_dialog: Some(false),
        script: Some(script_fn(|_ctx, stdout, stderr| async move {
            stdout.write_str("out\n").await?;
            stderr.write_str("err\n").await?;
            Ok::<(), anyhow::Error>(())
        })),
        ..options(&Console::default(), "")
    });
    guard.run().await.unwrap();

    let out = state.stdout.contents();
    let err = state.stderr.contents();
    assert!(out.starts_with("# This log is generated by runonce\nname: test_run\n"));
    assert!(err.starts_with("# This log is generated by runonce\nname: test_run\n"));
    assert!(out.contains("---\nout\n\n---\nend: "));
    assert!(err.contains("---\nerr\n\n---\nend: "));
    assert!(!out.contains("err\n"));
}

#[tokio::test]
async fn script_failure_is_recorded_in_the_footer() {
    let (dest, state) = FakeDestination::new(FakeState::default());
    let mut guard = ExecutionGuard::new(GuardOptions {
        destination: Some(Box::new(dest)),
        confirm_dialog: Some(false),
        script: Some(script_fn(|_ctx, stdout, _stderr| async move {
            stdout.write_str("partial\n").await?;
            Err::<(), anyhow::Error>(anyhow::anyhow!("boom"))
        })),
        ..options(&Console::default(), "")
    });

    let err = guard.run().await.unwrap_err();
    assert!(matches!(err, GuardError::Script(_)));
    assert_eq!(err.to_string(), "boom");
    assert_eq!(guard.state(), GuardState::Failed);
    assert!(state
        .stdout
        .contents()
        .ends_with(&format!("partial\n\n---\nend: {}\nerror: boom\n", stamp())));
    assert_eq!(state.closed(), 1);
}

#[tokio::test]
async fn open_failure_still_closes_the_destination() {
    let (dest, state) = FakeDestination::new(FakeState {
        fail_open: true,
        ..Default::default()
    });
    let mut guard = ExecutionGuard::new(GuardOptions {
        destination: Some(Box::new(dest)),
        confirm_dialog: Some(false),
        ..options(&Console::default(), "")
    });

    let err = guard.run().await.unwrap_err();
    assert!(matches!(err, GuardError::DestinationOpen { .. }));
    assert!(err
        .to_string()
        .starts_with("Can't execute! Execution log destination [fake://test_run] initialize failed"));
    assert_eq!(state.closed(), 1);
}

#[tokio::test]
async fn panic_in_script_is_re_raised_after_the_footer() {
    let (dest, state) = FakeDestination::new(FakeState::default());
    let mut guard = ExecutionGuard::new(GuardOptions {
        destination: Some(Box::new(dest)),
        confirm_dialog: Some(false),
        script: Some(script_fn(|_ctx, _stdout, _stderr| async move {
            if true {
                panic!("script exploded");
            }
            Ok::<(), anyhow::Error>(())
        })),
        ..options(&Console::default(), "")
    });

    let outcome = AssertUnwindSafe(guard.run()).catch_unwind().await;
    let payload = outcome.expect_err("panic should propagate");
    assert_eq!(payload.downcast_ref::<&str>(), Some(&"script exploded"));
    assert_eq!(guard.state(), GuardState::Running);
    assert!(state.stdout.contents().contains("\n---\nend: "));
    assert!(!state.stdout.contents().contains("error:"));
    assert_eq!(state.closed(), 1);
}

#[tokio::test]
async fn panic_after_completion_is_swallowed() {
    let (dest, state) = FakeDestination::new(FakeState {
        panic_on_close: true,
        ..Default::default()
    });
    let mut guard = ExecutionGuard::new(GuardOptions {
        destination: Some(Box::new(dest)),
        confirm_dialog: Some(false),
        ..options(&Console::default(), "")
    });

    guard.run().await.unwrap();
    assert_eq!(guard.state(), GuardState::Completed);
    assert_eq!(state.closed(), 1);
}

#[tokio::test]
async fn name_comes_from_template_when_not_given() {
    let (dest, state) = FakeDestination::new(FakeState::default());
    let mut guard = ExecutionGuard::new(GuardOptions {
        name: None,
        default_name_template: Some("{{ .Name }}-{{ arg 1 }}".to_string()),
        args: Some(vec!["/opt/bin/cleanup".to_string(), "users".to_string()]),
        destination: Some(Box::new(dest)),
        confirm_dialog: Some(false),
        ..options(&Console::default(), "")
    });

    guard.run().await.unwrap();
    assert_eq!(*state.name.lock().unwrap(), "cleanup-users");
}

#[tokio::test]
async fn rejects_bad_configuration_before_checking_anything() {
    let (dest, state) = FakeDestination::new(FakeState::default());
    let mut guard = ExecutionGuard::new(GuardOptions {
        destination: Some(Box::new(dest)),
        dialog_message: Some("run {} as {}?".to_string()),
        ..options(&Console::default(), "yes\n")
    });
    assert!(matches!(guard.run().await, Err(GuardError::Config(_))));
    assert_eq!(guard.state(), GuardState::Unvalidated);
    assert_eq!(state.opened(), 0);

    let mut guard = ExecutionGuard::new(GuardOptions {
        script: None,
        ..options(&Console::default(), "yes\n")
    });
    let err = guard.run().await.unwrap_err();
    assert_eq!(err.to_string(), "config error: Script is required");
}

#[tokio::test]
async fn failed_existence_check_refuses_without_opening() {
    let console = Console::default();
    let (dest, state) = FakeDestination::new(FakeState {
        exists_error: true,
        ..Default::default()
    });
    let mut guard = ExecutionGuard::new(GuardOptions {
        destination: Some(Box::new(dest)),
        ..options(&console, "yes\n")
    });

    let err = guard.run().await.unwrap_err();
    assert!(matches!(err, GuardError::DestinationCheck { .. }));
    assert!(err.is_refusal());
    assert_eq!(
        err.to_string(),
        "Can't execute! Execution log destination [fake://test_run] check failed: io error: metadata request timed out"
    );
    assert_eq!(guard.state(), GuardState::CheckFailed);
    assert_eq!(state.opened(), 0);
    assert_eq!(console.stderr.contents(), "");
}

#[tokio::test]
async fn broken_console_stderr_does_not_fail_a_completed_run() {
    let console = Console::default();
    let (dest, state) = FakeDestination::new(FakeState::default());
    let mut guard = ExecutionGuard::new(GuardOptions {
        destination: Some(Box::new(dest)),
        confirm_dialog: Some(false),
        console: Some(StreamPair::new(
            console.stdout.handle(),
            SinkHandle::new(BrokenSink),
        )),
        ..options(&console, "")
    });

    guard.run().await.unwrap();
    assert_eq!(guard.state(), GuardState::Completed);
    assert_eq!(console.stdout.contents(), "run!\n");
    assert!(state.stdout.contents().contains("run!\n\n---\nend: "));
    assert_eq!(state.closed(), 1);
}
