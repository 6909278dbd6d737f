//! tarpc service for listing and creating OSS projects, plus the TCP server
//! and client that speak it.

use std::time::Duration;

use tarpc::tokio_serde::formats::Bincode;
use tokio::io::{AsyncRead, AsyncWrite};

pub mod cli;
pub mod client;
pub mod error;
pub mod logging;
pub mod project;
pub mod server;

pub use client::{ClientConfig, ProjectClient};
pub use error::{ClientError, ServerError};
pub use project::{
    OssProject, OssProjectClient, Project, ProjectCreateStatus, ProjectName, ProjectService,
    ProjectTitles,
};
pub use server::{ProjectServer, ServerConfig};

/// TCP port the server listens on and the client dials.
pub const DEFAULT_PORT: u16 = 50088;

/// Project queried when the client is given no name.
pub const DEFAULT_PROJECT: &str = "fluentd";

/// Custodian reported for every listed project.
pub const DEFAULT_CUSTODIAN: &str = "cncf";

/// Budget for a single client call, measured from when the call starts.
pub const CALL_TIMEOUT: Duration = Duration::from_secs(1);

/// Creates a tarpc transport that frames messages and serializes them with [`Bincode`].
///
/// Client and server must both wrap their socket with this so the framing and
/// encoding agree.
pub fn bincode_transport<S, Item, SinkItem>(
    stream: S,
) -> tarpc::serde_transport::Transport<S, Item, SinkItem, Bincode<Item, SinkItem>>
where
    S: AsyncRead + AsyncWrite,
    Item: for<'de> serde::Deserialize<'de>,
    SinkItem: serde::Serialize,
{
    tarpc::serde_transport::Transport::from((stream, Bincode::default()))
}
