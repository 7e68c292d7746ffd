use mockito::{Matcher, Server};
use runonce_core::api::{
    script_fn, AppConfig, ExecutionGuard, GuardError, GuardOptions, ObjectStoreConfig, SinkHandle,
    StreamPair,
};
use runonce_plugins::factory::build_destination;

fn config(endpoint: String) -> AppConfig {
    AppConfig {
        s3: ObjectStoreConfig {
            bucket: Some("ops-logs".to_string()),
            object_prefix: "batch/".to_string(),
            endpoint: Some(endpoint),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn quiet_console() -> StreamPair {
    StreamPair::new(
        SinkHandle::from_writer(tokio::io::sink()),
        SinkHandle::from_writer(tokio::io::sink()),
    )
}

async fn options(cfg: &AppConfig) -> GuardOptions {
    GuardOptions {
        name: Some("nightly".to_string()),
        args: Some(vec!["nightly".to_string()]),
        confirm_dialog: Some(false),
        console: Some(quiet_console()),
        destination: Some(build_destination(cfg).await.unwrap()),
        script: Some(script_fn(|_ctx, stdout, _stderr| async move {
            stdout.write_str("run!\n").await?;
            Ok::<(), anyhow::Error>(())
        })),
        ..Default::default()
    }
}

#[tokio::test]
async fn transcript_is_uploaded_as_one_object() {
    let mut server = Server::new_async().await;
    let head = server
        .mock("HEAD", "/ops-logs/batch/nightly.log")
        .with_status(404)
        .create_async()
        .await;
    let put = server
        .mock("PUT", "/ops-logs/batch/nightly.log")
        .match_body(Matcher::Regex(
            r"(?s)^# This log is generated by runonce\nname: nightly\nstart: .*\n---\nrun!\n\n---\nend: .*\n$"
                .to_string(),
        ))
        .with_status(200)
        .create_async()
        .await;

    let cfg = config(server.url());
    let mut guard = ExecutionGuard::new(options(&cfg).await);
    guard.run().await.unwrap();

    head.assert_async().await;
    put.assert_async().await;
}

#[tokio::test]
async fn existing_object_refuses_the_run() {
    let mut server = Server::new_async().await;
    let _head = server
        .mock("HEAD", "/ops-logs/batch/nightly.log")
        .with_status(200)
        .create_async()
        .await;
    let put = server
        .mock("PUT", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let cfg = config(server.url());
    let mut guard = ExecutionGuard::new(options(&cfg).await);
    let err = guard.run().await.unwrap_err();
    assert!(matches!(err, GuardError::AlreadyExists { .. }));
    assert_eq!(
        err.to_string(),
        "Can't execute! Execution log destination [s3://ops-logs/batch/nightly.log] already exists"
    );
    put.assert_async().await;
}

#[tokio::test]
async fn rejected_upload_fails_the_run_after_the_script() {
    let mut server = Server::new_async().await;
    let _head = server
        .mock("HEAD", "/ops-logs/batch/nightly.log")
        .with_status(404)
        .create_async()
        .await;
    let _put = server
        .mock("PUT", "/ops-logs/batch/nightly.log")
        .with_status(403)
        .with_body("AccessDenied")
        .create_async()
        .await;

    let cfg = config(server.url());
    let mut guard = ExecutionGuard::new(options(&cfg).await);
    let err = guard.run().await.unwrap_err();
    assert!(
        matches!(
            err,
            GuardError::DestinationClose { .. }
                | GuardError::TranscriptWrite { .. }
                | GuardError::Script(_)
        ),
        "unexpected error: {err}"
    );
}
