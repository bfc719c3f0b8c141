//! Admin socket client used by `lm-ctl`.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use lifecycle_core::{AdminReply, AdminRequest, ParseError};

#[derive(Debug, Error)]
pub enum CtlError {
    #[error("cannot reach admin socket {path}: {source}")]
    Connect {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("admin socket I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("no reply within {0:?}")]
    Timeout(Duration),

    #[error("daemon closed the connection without replying")]
    NoReply,

    #[error(transparent)]
    BadReply(#[from] ParseError),
}

/// Send one request and wait for its reply line.
pub async fn request(
    socket: &Path,
    request: &AdminRequest,
    wait: Duration,
) -> Result<AdminReply, CtlError> {
    let stream = UnixStream::connect(socket)
        .await
        .map_err(|source| CtlError::Connect {
            path: socket.display().to_string(),
            source,
        })?;
    let (read_half, mut write_half) = stream.into_split();
    write_half
        .write_all(format!("{}\n", request.encode()).as_bytes())
        .await?;

    let mut lines = BufReader::new(read_half).lines();
    let line = tokio::time::timeout(wait, lines.next_line())
        .await
        .map_err(|_| CtlError::Timeout(wait))??
        .ok_or(CtlError::NoReply)?;
    Ok(line.trim().parse()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::UnixListener;

    async fn one_shot_daemon(path: &Path, reply: &'static str) -> tokio::task::JoinHandle<String> {
        let listener = UnixListener::bind(path).unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = stream.into_split();
            let mut lines = BufReader::new(read_half).lines();
            let line = lines.next_line().await.unwrap().unwrap();
            write_half.write_all(reply.as_bytes()).await.unwrap();
            line
        })
    }

    #[tokio::test]
    async fn test_request_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.sock");
        let daemon = one_shot_daemon(&path, "ACK_REQ_USER_VM_SHUTDOWN\n").await;

        let reply = request(
            &path,
            &AdminRequest::UserVmShutdown {
                vm_name: "vm2".to_string(),
            },
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(reply, AdminReply::AckReqUserVmShutdown);
        assert_eq!(daemon.await.unwrap(), "REQ_USER_VM_SHUTDOWN:vm2");
    }

    #[tokio::test]
    async fn test_unknown_reply_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.sock");
        let _daemon = one_shot_daemon(&path, "WHATEVER\n").await;

        let result = request(&path, &AdminRequest::SystemShutdown, Duration::from_secs(5)).await;

        assert!(matches!(result, Err(CtlError::BadReply(_))));
    }

    #[tokio::test]
    async fn test_missing_socket() {
        let dir = tempfile::tempdir().unwrap();

        let result = request(
            &dir.path().join("absent.sock"),
            &AdminRequest::SystemShutdown,
            Duration::from_secs(1),
        )
        .await;

        assert!(matches!(result, Err(CtlError::Connect { .. })));
    }
}
