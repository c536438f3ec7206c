//! Chunked collaboration strategies with pause/resume checkpoints.

use std::io::{self, SeekFrom};

use fleetfs_core::{
    CollaborationLocation, PauseInfo, TransferError, TransferOutcome, TransferResult,
};
use fleetfs_runtime::{TaskContext, TransferJob};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::debug;

use super::{StrategyDispatcher, ensure_parent, percent_of};

/// Bytes moved per collaboration call.
pub(crate) const CHUNK_SIZE: usize = 8 * 1024 * 1024;

pub(super) async fn push(
    dispatcher: &StrategyDispatcher,
    job: &TransferJob,
    ctx: &TaskContext,
) -> TransferResult<TransferOutcome> {
    let request = &job.request;
    let source = dispatcher.local_path(&request.source, &request.source.path)?;
    let target =
        dispatcher.collaboration_location(&request.destination, &request.destination_subpath())?;

    let mut file = File::open(&source)
        .await
        .map_err(|err| TransferError::failed("collaboration.open_source", err))?;
    let total = file
        .metadata()
        .await
        .map_err(|err| TransferError::failed("collaboration.stat_source", err))?
        .len();
    ctx.set_total_bytes(total);

    let mut offset = resume_offset(ctx, total);
    file.seek(SeekFrom::Start(offset))
        .await
        .map_err(|err| TransferError::failed("collaboration.seek_source", err))?;
    debug!(repo_id = %target.repo_id, offset, total, "pushing to collaboration");

    let mut buffer = vec![0_u8; CHUNK_SIZE];
    loop {
        let len = read_chunk(&mut file, &mut buffer).await?;
        let end = checked_end(offset, len, total, "collaboration.read_source")?;
        let last = end >= total;
        tokio::select! {
            biased;
            () = ctx.cancel_token().cancelled() => return stop(ctx, offset, &target),
            pushed = dispatcher.collaboration.push_chunk(&target, offset, &buffer[..len], last) => {
                pushed.map_err(|err| TransferError::failed("collaboration.push_chunk", err))?;
            }
        }
        offset = end;
        ctx.report_progress(percent_of(offset, total), offset);
        if last {
            break;
        }
    }

    if request.action.removes_source() {
        tokio::fs::remove_file(&source)
            .await
            .map_err(|err| TransferError::failed("collaboration.remove_source", err))?;
    }
    Ok(TransferOutcome::Completed)
}

pub(super) async fn pull(
    dispatcher: &StrategyDispatcher,
    job: &TransferJob,
    ctx: &TaskContext,
) -> TransferResult<TransferOutcome> {
    let request = &job.request;
    let origin = dispatcher.collaboration_location(&request.source, &request.source.path)?;
    let destination =
        dispatcher.local_path(&request.destination, &request.destination_subpath())?;
    ensure_parent(&destination).await?;

    let total = tokio::select! {
        biased;
        () = ctx.cancel_token().cancelled() => return Err(TransferError::Canceled),
        size = dispatcher.collaboration.file_size(&origin) => {
            size.map_err(|err| TransferError::failed("collaboration.file_size", err))?
        }
    };
    ctx.set_total_bytes(total);

    let mut offset = resume_offset(ctx, total);
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&destination)
        .await
        .map_err(|err| TransferError::failed("collaboration.open_destination", err))?;
    file.set_len(offset)
        .await
        .map_err(|err| TransferError::failed("collaboration.truncate_destination", err))?;
    file.seek(SeekFrom::Start(offset))
        .await
        .map_err(|err| TransferError::failed("collaboration.seek_destination", err))?;
    debug!(repo_id = %origin.repo_id, offset, total, "pulling from collaboration");

    while offset < total {
        let wanted = usize::try_from(total - offset).map_or(CHUNK_SIZE, |left| left.min(CHUNK_SIZE));
        let chunk = tokio::select! {
            biased;
            () = ctx.cancel_token().cancelled() => {
                flush(&mut file).await?;
                return stop(ctx, offset, &origin);
            }
            fetched = dispatcher.collaboration.fetch_chunk(&origin, offset, wanted) => {
                fetched.map_err(|err| TransferError::failed("collaboration.fetch_chunk", err))?
            }
        };
        let end = checked_end(offset, chunk.len(), total, "collaboration.fetch_chunk")?;
        file.write_all(&chunk)
            .await
            .map_err(|err| TransferError::failed("collaboration.write_destination", err))?;
        offset = end;
        ctx.report_progress(percent_of(offset, total), offset);
    }
    flush(&mut file).await?;
    ctx.report_progress(100, offset);
    Ok(TransferOutcome::Completed)
}

pub(super) async fn server_side_copy(
    dispatcher: &StrategyDispatcher,
    job: &TransferJob,
    ctx: &TaskContext,
) -> TransferResult<TransferOutcome> {
    let request = &job.request;
    let from = dispatcher.collaboration_location(&request.source, &request.source.path)?;
    let to =
        dispatcher.collaboration_location(&request.destination, &request.destination_subpath())?;
    tokio::select! {
        biased;
        () = ctx.cancel_token().cancelled() => return Err(TransferError::Canceled),
        copied = dispatcher
            .collaboration
            .server_side_copy(&from, &to, request.action.removes_source()) => {
            copied.map_err(|err| TransferError::failed("collaboration.server_side_copy", err))?;
        }
    }
    ctx.report_progress(100, 0);
    Ok(TransferOutcome::Completed)
}

fn resume_offset(ctx: &TaskContext, total: u64) -> u64 {
    ctx.resume_from().map_or(0, |info| info.offset.min(total))
}

/// End offset of a chunk of `len` bytes at `offset`; an empty chunk short of `total`
/// means the payload shrank or the backend stopped serving it.
fn checked_end(
    offset: u64,
    len: usize,
    total: u64,
    operation: &'static str,
) -> TransferResult<u64> {
    if len == 0 && offset < total {
        return Err(TransferError::failed(
            operation,
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("payload ended at {offset} of {total} bytes"),
            ),
        ));
    }
    Ok(offset.saturating_add(len as u64))
}

/// Checkpoint on pause, abort otherwise.
fn stop(
    ctx: &TaskContext,
    offset: u64,
    location: &CollaborationLocation,
) -> TransferResult<TransferOutcome> {
    if ctx.pause_requested() {
        Ok(TransferOutcome::Paused(PauseInfo {
            offset,
            location: Some(format!("{}:{}", location.repo_id, location.path)),
        }))
    } else {
        Err(TransferError::Canceled)
    }
}

/// Fill `buffer` from `file`; a short count means end of file.
async fn read_chunk(file: &mut File, buffer: &mut [u8]) -> TransferResult<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        let read = file
            .read(&mut buffer[filled..])
            .await
            .map_err(|err| TransferError::failed("collaboration.read_source", err))?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    Ok(filled)
}

async fn flush(file: &mut File) -> TransferResult<()> {
    file.flush()
        .await
        .map_err(|err| TransferError::failed("collaboration.flush_destination", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetfs_core::render_error_chain;

    #[test]
    fn chunks_advance_the_offset() -> TransferResult<()> {
        assert_eq!(checked_end(0, 40, 100, "collaboration.read_source")?, 40);
        assert_eq!(checked_end(40, 60, 100, "collaboration.read_source")?, 100);
        assert_eq!(checked_end(0, 0, 0, "collaboration.read_source")?, 0);
        Ok(())
    }

    #[test]
    fn empty_chunk_before_the_end_is_a_failure() {
        let shrunk = checked_end(40, 0, 100, "collaboration.read_source");
        assert!(matches!(
            shrunk,
            Err(TransferError::Failed {
                operation: "collaboration.read_source",
                ..
            })
        ));

        let truncated = checked_end(40, 0, 100, "collaboration.fetch_chunk")
            .err()
            .map(|err| render_error_chain(&err));
        assert_eq!(
            truncated.as_deref(),
            Some("transfer failed: payload ended at 40 of 100 bytes")
        );
    }
}
