#![cfg(unix)]

use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fleetfs_fsops::{
    CloudOp, CloudPath, CloudToolRecognizer, CommandSpec, FsOpsError, RsyncRecognizer,
    SyncEndpoint, SyncPlan, TransferExecutor, cloud_args, sync_args,
};
use fleetfs_test_support::fixtures::{scratch_dir, write_payload};
use fleetfs_test_support::process::{is_gone, wait_until_gone};
use fleetfs_test_support::scripts::{
    failing_tool, fake_cloud_tool, fake_rsync, hanging_tool, lingering_helper_tool,
};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

fn executor() -> TransferExecutor {
    TransferExecutor::default().with_reap_interval(Duration::from_millis(20))
}

#[tokio::test]
async fn sync_reports_monotonic_progress_and_completes() -> anyhow::Result<()> {
    let dir = scratch_dir()?;
    let tool = fake_rsync(dir.path())?;
    let source = write_payload(&dir.path().join("src/report.pdf"), 4_096)?;
    let destination = dir.path().join("dst/report.pdf");
    let plan = SyncPlan {
        source: SyncEndpoint::local(&source),
        destination: SyncEndpoint::local(&destination),
        remove_source: false,
    };
    let spec = CommandSpec::new(&tool, sync_args(&plan));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let summary = timeout(
        Duration::from_secs(10),
        executor().execute(
            &CancellationToken::new(),
            &spec,
            RsyncRecognizer::default(),
            move |percent, bytes| {
                if let Ok(mut guard) = sink.lock() {
                    guard.push((percent, bytes));
                }
            },
        ),
    )
    .await??;

    assert_eq!(summary.total_bytes, 4_096);
    assert_eq!(summary.exit_code, 0);
    assert_eq!(fs::read(&destination)?, fs::read(&source)?);

    let seen = seen.lock().map_err(|_| anyhow::anyhow!("poisoned"))?.clone();
    assert_eq!(seen.last(), Some(&(100, 4_096)));
    assert!(seen.windows(2).all(|pair| pair[0].0 <= pair[1].0 && pair[0].1 <= pair[1].1));
    Ok(())
}

#[tokio::test]
async fn remove_source_flag_is_honoured() -> anyhow::Result<()> {
    let dir = scratch_dir()?;
    let tool = fake_rsync(dir.path())?;
    let source = write_payload(&dir.path().join("a.bin"), 10)?;
    let destination = dir.path().join("moved/a.bin");
    let plan = SyncPlan {
        source: SyncEndpoint::local(&source),
        destination: SyncEndpoint::local(&destination),
        remove_source: true,
    };
    executor()
        .execute(
            &CancellationToken::new(),
            &CommandSpec::new(&tool, sync_args(&plan)),
            RsyncRecognizer::default(),
            |_, _| {},
        )
        .await?;
    assert!(!source.exists());
    assert_eq!(fs::read(&destination)?.len(), 10);
    Ok(())
}

#[tokio::test]
async fn failing_tool_surfaces_exit_code_and_output() -> anyhow::Result<()> {
    let dir = scratch_dir()?;
    let tool = failing_tool(dir.path(), 12, "rsync: connection unexpectedly closed")?;
    let result = executor()
        .execute(
            &CancellationToken::new(),
            &CommandSpec::new(&tool, Vec::new()),
            RsyncRecognizer::default(),
            |_, _| {},
        )
        .await;
    match result {
        Err(FsOpsError::TransferFailed { code, detail, .. }) => {
            assert_eq!(code, Some(12));
            assert!(detail.contains("connection unexpectedly closed"));
        }
        other => anyhow::bail!("unexpected result: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn missing_program_is_a_spawn_error() -> anyhow::Result<()> {
    let dir = scratch_dir()?;
    let result = executor()
        .execute(
            &CancellationToken::new(),
            &CommandSpec::new(dir.path().join("no-such-tool"), Vec::new()),
            RsyncRecognizer::default(),
            |_, _| {},
        )
        .await;
    assert!(matches!(result, Err(FsOpsError::Spawn { .. })));
    Ok(())
}

#[tokio::test]
async fn cancel_kills_the_whole_process_group() -> anyhow::Result<()> {
    let dir = scratch_dir()?;
    let pid_file = dir.path().join("pids");
    let tool = hanging_tool(dir.path(), &pid_file)?;
    let cancel = CancellationToken::new();
    let spec = CommandSpec::new(&tool, Vec::new());

    let run = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            executor()
                .execute(&cancel, &spec, RsyncRecognizer::default(), |_, _| {})
                .await
        })
    };

    let pids = timeout(Duration::from_secs(10), async {
        loop {
            if let Ok(raw) = fs::read_to_string(&pid_file) {
                let pids: Vec<u32> = raw.lines().filter_map(|line| line.trim().parse().ok()).collect();
                if pids.len() == 2 {
                    return pids;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await?;

    cancel.cancel();
    let result = timeout(Duration::from_secs(10), run).await??;
    assert!(matches!(result, Err(FsOpsError::Canceled)));

    let (primary, helper) = (pids[0], pids[1]);
    assert!(is_gone(primary), "primary tool process must be reaped");
    assert!(
        wait_until_gone(helper, Duration::from_secs(5), true).await,
        "forked helper must be killed with the group"
    );
    Ok(())
}

#[tokio::test]
async fn helper_holding_output_open_does_not_block_completion() -> anyhow::Result<()> {
    let dir = scratch_dir()?;
    let pid_file = dir.path().join("helper.pid");
    let tool = lingering_helper_tool(dir.path(), &pid_file, 10)?;

    let mut seen = Vec::new();
    let result = timeout(
        Duration::from_secs(5),
        executor()
            .with_drain_grace(Duration::from_millis(100))
            .execute(
                &CancellationToken::new(),
                &CommandSpec::new(&tool, Vec::new()),
                RsyncRecognizer::default(),
                |percent, bytes| seen.push((percent, bytes)),
            ),
    )
    .await;

    if let Some(helper) = fs::read_to_string(&pid_file)
        .ok()
        .and_then(|raw| raw.trim().parse::<i32>().ok())
    {
        let _ = kill(Pid::from_raw(helper), Signal::SIGKILL);
    }

    let summary = result.map_err(|_| anyhow::anyhow!("execute waited on the lingering helper"))??;
    assert_eq!(summary.exit_code, 0);
    assert_eq!(summary.total_bytes, 10);
    assert_eq!(seen, vec![(100, 10)]);
    Ok(())
}

#[tokio::test]
async fn pre_canceled_token_never_spawns() -> anyhow::Result<()> {
    let dir = scratch_dir()?;
    let marker = dir.path().join("ran");
    let tool = fleetfs_test_support::scripts::write_script(
        dir.path(),
        "marker",
        &format!("touch '{}'\n", marker.display()),
    )?;
    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = executor()
        .execute(
            &cancel,
            &CommandSpec::new(&tool, Vec::new()),
            RsyncRecognizer::default(),
            |_, _| {},
        )
        .await;
    assert!(matches!(result, Err(FsOpsError::Canceled)));
    assert!(!marker.exists());
    Ok(())
}

#[tokio::test]
async fn cloud_tool_upload_reports_progress() -> anyhow::Result<()> {
    let dir = scratch_dir()?;
    let remotes = dir.path().join("remotes");
    let tool = fake_cloud_tool(dir.path(), &remotes)?;
    let source = write_payload(&dir.path().join("local/a.bin"), 2_048)?;
    let op = CloudOp::Upload {
        from: source.clone(),
        to: CloudPath::new("google_alice_work", "backup/a.bin"),
        remove_source: false,
    };

    let mut seen = Vec::new();
    let summary = executor()
        .execute(
            &CancellationToken::new(),
            &CommandSpec::new(&tool, cloud_args(&op)),
            CloudToolRecognizer,
            |percent, bytes| seen.push((percent, bytes)),
        )
        .await?;

    assert_eq!(summary.total_bytes, 2_048);
    assert_eq!(seen, vec![(50, 1_024), (100, 2_048)]);
    assert_eq!(
        fs::read(remotes.join("google_alice_work/backup/a.bin"))?,
        fs::read(&source)?
    );
    Ok(())
}
