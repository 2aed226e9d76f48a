use std::{future::Future, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    signal::unix::{SignalKind, signal},
    sync::{OwnedSemaphorePermit, Semaphore},
    time::{Instant, timeout},
};

use crate::{
    config::ServerConfig,
    http::{HttpError, HttpLimits, read_request, write_response},
    resolutions::ResolutionStore,
    routes::{Router, busy_response, framing_error_response},
};

/// Upper bound on how long a rejected connection is drained before closing.
const REJECT_DRAIN_TIMEOUT: Duration = Duration::from_millis(250);
const REJECT_DRAIN_BYTES: u64 = 1024 * 1024;
const BUSY_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Per-connection behavior shared by every accepted socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub limits: HttpLimits,
    /// How long a connection may take to deliver the next full request,
    /// idle keep-alive time included.
    pub read_timeout: Duration,
    pub max_connections: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            limits: HttpLimits::default(),
            read_timeout: Duration::from_secs(10),
            max_connections: 1024,
        }
    }
}

pub async fn run(config: &ServerConfig, store: Arc<ResolutionStore>) -> Result<()> {
    let listener = TcpListener::bind(config.bind_address)
        .await
        .with_context(|| format!("unable to bind {}", config.bind_address))?;

    let mut sigint =
        signal(SignalKind::interrupt()).context("unable to listen for SIGINT (Ctrl+C)")?;
    let mut sigterm = signal(SignalKind::terminate()).context("unable to listen for SIGTERM")?;
    let shutdown = async move {
        tokio::select! {
            _ = sigint.recv() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
        }
    };

    serve(listener, Router::new(store), config.connection_settings(), shutdown).await
}

/// Accepts connections until `shutdown` resolves with the reason for stopping.
pub async fn serve<F>(
    listener: TcpListener,
    router: Router,
    settings: ConnectionSettings,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = &'static str>,
{
    let local_addr = listener
        .local_addr()
        .context("unable to read listener address")?;
    tracing::info!(
        target: "server",
        address = %local_addr,
        max_header_bytes = settings.limits.max_header_bytes,
        max_body_bytes = settings.limits.max_body_bytes,
        read_timeout_ms = settings.read_timeout.as_millis() as u64,
        max_connections = settings.max_connections,
        "server_listening"
    );

    let slots = Arc::new(Semaphore::new(settings.max_connections));
    tokio::pin!(shutdown);
    let reason = loop {
        tokio::select! {
            reason = &mut shutdown => break reason,
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer)) => match Arc::clone(&slots).try_acquire_owned() {
                        Ok(permit) => {
                            let router = router.clone();
                            tokio::spawn(async move {
                                let result =
                                    handle_connection(stream, &router, &settings, permit).await;
                                if let Err(err) = result {
                                    tracing::warn!(
                                        target: "server",
                                        peer = %peer,
                                        error = %err,
                                        "connection_failed"
                                    );
                                }
                            });
                        }
                        Err(_) => {
                            tracing::warn!(target: "server", peer = %peer, "connection_rejected_busy");
                            tokio::spawn(reject_busy(stream));
                        }
                    },
                    Err(err) => {
                        tracing::warn!(target: "server", error = %err, "accept_failed");
                    }
                }
            }
        }
    };

    tracing::info!(target: "server", address = %local_addr, signal = reason, "server_stopped");
    Ok(())
}

/// Serves requests until the peer closes, asks to close, stalls past the read
/// timeout, or sends something unframeable. The permit frees the connection
/// slot when this returns.
async fn handle_connection(
    mut stream: TcpStream,
    router: &Router,
    settings: &ConnectionSettings,
    _permit: OwnedSemaphorePermit,
) -> Result<(), HttpError> {
    let (reader, mut writer) = stream.split();
    let mut reader = BufReader::new(reader);

    loop {
        let read = timeout(
            settings.read_timeout,
            read_request(&mut reader, &settings.limits),
        )
        .await;
        let Ok(read) = read else {
            tracing::debug!(
                target: "http",
                timeout_ms = settings.read_timeout.as_millis() as u64,
                "connection_timed_out"
            );
            writer.shutdown().await?;
            return Ok(());
        };

        let request = match read {
            Ok(Some(request)) => request,
            Ok(None) => return Ok(()),
            Err(err) => {
                let Some(response) = framing_error_response(&err) else {
                    return Err(err);
                };
                tracing::debug!(
                    target: "http",
                    status = response.status.as_u16(),
                    error = %err,
                    "request_rejected"
                );
                write_response(&mut writer, &response, false).await?;
                writer.shutdown().await?;
                drain(&mut reader).await;
                return Ok(());
            }
        };

        let started = Instant::now();
        let response = router.dispatch(&request);
        let keep_alive = request.keep_alive();
        tracing::debug!(
            target: "http",
            method = %request.method,
            path = %request.path,
            status = response.status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request_handled"
        );

        write_response(&mut writer, &response, keep_alive).await?;
        if !keep_alive {
            return Ok(());
        }
    }
}

async fn reject_busy(mut stream: TcpStream) {
    let response = busy_response().encode(false);
    let _ = timeout(BUSY_WRITE_TIMEOUT, async {
        stream.write_all(&response).await?;
        stream.shutdown().await
    })
    .await;
}

/// Reads off whatever the peer is still sending so closing the socket does
/// not reset the connection before the error response is read.
async fn drain<R: AsyncRead + Unpin>(reader: &mut R) {
    let mut limited = AsyncReadExt::take(&mut *reader, REJECT_DRAIN_BYTES);
    let _ = tokio::time::timeout(
        REJECT_DRAIN_TIMEOUT,
        tokio::io::copy(&mut limited, &mut tokio::io::sink()),
    )
    .await;
}
