use std::{io, net::SocketAddr, time::Duration};

use tarpc::client::RpcError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("failed to read local address: {0}")]
    LocalAddr(#[source] io::Error),
    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("did not connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    #[error("did not connect to {endpoint} within {timeout:?}")]
    ConnectTimeout { endpoint: String, timeout: Duration },
    #[error("call did not complete within {timeout:?}")]
    DeadlineExceeded { timeout: Duration },
    #[error("call failed: {0}")]
    Rpc(#[source] RpcError),
}

impl ClientError {
    /// Folds tarpc's own deadline error into [`ClientError::DeadlineExceeded`].
    pub(crate) fn from_rpc(err: RpcError, timeout: Duration) -> Self {
        match err {
            RpcError::DeadlineExceeded => Self::DeadlineExceeded { timeout },
            other => Self::Rpc(other),
        }
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Self::DeadlineExceeded { .. })
    }
}
