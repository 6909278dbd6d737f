use std::{
    io,
    net::{Ipv4Addr, SocketAddr},
    pin::pin,
    time::Duration,
};

use futures::{Stream, StreamExt, stream};
use tarpc::server::{BaseChannel, Channel};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::{
    DEFAULT_PORT, bincode_transport,
    error::ServerError,
    project::{OssProject, ProjectService},
};

/// Configuration for a [`ProjectServer`].
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address the listener binds to.
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
        }
    }
}

/// Bound listener serving [`ProjectService`] to every connection it accepts.
#[derive(Debug)]
pub struct ProjectServer {
    listener: TcpListener,
}

impl ProjectServer {
    /// Binds the listener. Fails immediately if the address is unavailable.
    pub async fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.bind_addr,
                source,
            })?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener.local_addr().map_err(ServerError::LocalAddr)
    }

    /// Accepts connections until accepting fails with a non-transient error.
    ///
    /// Each connection runs on its own task and each request on another, so a
    /// slow call never holds up the rest. Aborted handshakes and descriptor
    /// exhaustion are retried after a backoff of 5 ms doubling up to 1 s.
    pub async fn serve(self) -> Result<(), ServerError> {
        serve_incoming(accept_stream(self.listener)).await
    }
}

fn accept_stream(
    listener: TcpListener,
) -> impl Stream<Item = io::Result<(TcpStream, SocketAddr)>> {
    stream::unfold(listener, |listener| async move {
        let accepted = listener.accept().await;
        Some((accepted, listener))
    })
}

async fn serve_incoming<I>(incoming: I) -> Result<(), ServerError>
where
    I: Stream<Item = io::Result<(TcpStream, SocketAddr)>>,
{
    let mut incoming = pin!(incoming);
    let mut backoff = AcceptBackoff::default();
    while let Some(accepted) = incoming.next().await {
        match accepted {
            Ok((stream, peer)) => {
                backoff.reset();
                debug!(%peer, "accepted connection");
                tokio::spawn(serve_connection(stream));
            }
            Err(err) if is_transient(&err) => {
                let delay = backoff.next_delay();
                warn!(
                    error = %err,
                    retry_in_ms = delay.as_millis() as u64,
                    "accept failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(ServerError::Accept(err)),
        }
    }
    Ok(())
}

// Same values on Linux, macOS and the BSDs.
#[cfg(unix)]
const ENFILE: i32 = 23;
#[cfg(unix)]
const EMFILE: i32 = 24;

/// Whether an accept error clears up on its own, so the listener should keep going.
fn is_transient(err: &io::Error) -> bool {
    if matches!(
        err.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
    ) {
        return true;
    }
    #[cfg(unix)]
    if matches!(err.raw_os_error(), Some(EMFILE | ENFILE)) {
        return true;
    }
    false
}

/// Delay between retried accepts: 5 ms, doubling up to 1 s, reset by the next
/// successful accept.
#[derive(Debug, Default)]
struct AcceptBackoff {
    current: Option<Duration>,
}

impl AcceptBackoff {
    const INITIAL: Duration = Duration::from_millis(5);
    const MAX: Duration = Duration::from_secs(1);

    fn next_delay(&mut self) -> Duration {
        let delay = match self.current {
            None => Self::INITIAL,
            Some(previous) => (previous * 2).min(Self::MAX),
        };
        self.current = Some(delay);
        delay
    }

    fn reset(&mut self) {
        self.current = None;
    }
}

async fn serve_connection(stream: TcpStream) {
    if let Err(err) = stream.set_nodelay(true) {
        debug!(error = %err, "failed to set TCP_NODELAY");
    }
    let transport = bincode_transport(stream);
    BaseChannel::with_defaults(transport)
        .execute(ProjectService.serve())
        .for_each(|fut| async move {
            tokio::spawn(fut);
        })
        .await;
}

/// Binds with `config` and serves until the process is killed.
pub async fn run(config: ServerConfig) -> Result<(), ServerError> {
    let server = ProjectServer::bind(&config).await?;
    info!(addr = %server.local_addr()?, "project server listening");
    server.serve().await
}
