use std::time::{Duration, Instant};

use tarpc::{client, context};
use tokio::{net::TcpStream, time::timeout};
use tracing::debug;

use crate::{
    CALL_TIMEOUT, DEFAULT_PORT, bincode_transport,
    error::ClientError,
    project::{OssProjectClient, Project, ProjectCreateStatus, ProjectName, ProjectTitles},
};

/// Configuration for a [`ProjectClient`].
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Port appended to the host to form the endpoint.
    pub port: u16,
    /// Budget for each call, from the moment it is issued.
    pub call_timeout: Duration,
    /// Budget for establishing the TCP connection.
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            call_timeout: CALL_TIMEOUT,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl ClientConfig {
    /// Joins `host` with the configured port, bracketing bare IPv6 literals.
    pub fn endpoint(&self, host: &str) -> String {
        if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]:{}", self.port)
        } else {
            format!("{host}:{}", self.port)
        }
    }
}

/// Plaintext connection to an [`OssProject`](crate::project::OssProject) server.
///
/// Dropping the client closes the connection.
#[derive(Clone, Debug)]
pub struct ProjectClient {
    inner: OssProjectClient,
    call_timeout: Duration,
}

impl ProjectClient {
    pub async fn connect(host: &str, config: &ClientConfig) -> Result<Self, ClientError> {
        let endpoint = config.endpoint(host);
        debug!(%endpoint, "connecting");

        let stream = match timeout(config.connect_timeout, TcpStream::connect(&endpoint)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(ClientError::Connect { endpoint, source }),
            Err(_) => {
                return Err(ClientError::ConnectTimeout {
                    endpoint,
                    timeout: config.connect_timeout,
                });
            }
        };
        if let Err(err) = stream.set_nodelay(true) {
            debug!(error = %err, "failed to set TCP_NODELAY");
        }

        let transport = bincode_transport(stream);
        let inner = OssProjectClient::new(client::Config::default(), transport).spawn();

        Ok(Self {
            inner,
            call_timeout: config.call_timeout,
        })
    }

    pub async fn list_projects(
        &self,
        name: impl Into<String>,
    ) -> Result<ProjectTitles, ClientError> {
        let call = self
            .inner
            .list_projects(self.call_context(), ProjectName::new(name));
        match timeout(self.call_timeout, call).await {
            Ok(result) => result.map_err(|err| ClientError::from_rpc(err, self.call_timeout)),
            Err(_) => Err(self.deadline_exceeded()),
        }
    }

    pub async fn create_project(
        &self,
        name: impl Into<String>,
    ) -> Result<ProjectCreateStatus, ClientError> {
        let call = self
            .inner
            .create_project(self.call_context(), Project::new(name));
        match timeout(self.call_timeout, call).await {
            Ok(result) => result.map_err(|err| ClientError::from_rpc(err, self.call_timeout)),
            Err(_) => Err(self.deadline_exceeded()),
        }
    }

    // The deadline travels with the request so the server can drop expired work too.
    fn call_context(&self) -> context::Context {
        let mut ctx = context::current();
        ctx.deadline = Instant::now() + self.call_timeout;
        ctx
    }

    fn deadline_exceeded(&self) -> ClientError {
        ClientError::DeadlineExceeded {
            timeout: self.call_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, SocketAddr};

    use futures::StreamExt;
    use tarpc::server::{BaseChannel, Channel};
    use tokio::net::TcpListener;

    use super::*;
    use crate::{
        project::OssProject,
        server::{ProjectServer, ServerConfig},
    };

    fn loopback(port: u16) -> ClientConfig {
        ClientConfig {
            port,
            ..ClientConfig::default()
        }
    }

    async fn spawn_project_server() -> u16 {
        let server = ProjectServer::bind(&ServerConfig {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
        })
        .await
        .expect("bind loopback");
        let port = server.local_addr().expect("local addr").port();
        tokio::spawn(server.serve());
        port
    }

    /// Answers correctly, but only after the client's budget has run out.
    #[derive(Clone)]
    struct SlowProjectService {
        delay: Duration,
    }

    impl OssProject for SlowProjectService {
        async fn list_projects(self, _: context::Context, request: ProjectName) -> ProjectTitles {
            tokio::time::sleep(self.delay).await;
            ProjectTitles {
                names: vec![request.name],
                custodians: vec!["cncf".to_string()],
            }
        }

        async fn create_project(self, _: context::Context, _: Project) -> ProjectCreateStatus {
            tokio::time::sleep(self.delay).await;
            ProjectCreateStatus::default()
        }
    }

    async fn spawn_slow_server(delay: Duration) -> u16 {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("bind loopback");
        let port = listener.local_addr().expect("local addr").port();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let service = SlowProjectService { delay };
                tokio::spawn(
                    BaseChannel::with_defaults(bincode_transport(stream))
                        .execute(service.serve())
                        .for_each(|fut| async move {
                            tokio::spawn(fut);
                        }),
                );
            }
        });
        port
    }

    #[test]
    fn endpoint_joins_host_and_port() {
        let config = ClientConfig::default();
        assert_eq!(config.endpoint("localhost"), "localhost:50088");
        assert_eq!(config.endpoint("10.0.0.7"), "10.0.0.7:50088");
        assert_eq!(config.endpoint("::1"), "[::1]:50088");
        assert_eq!(config.endpoint("[::1]"), "[::1]:50088");
    }

    #[test]
    fn default_call_budget_is_one_second() {
        assert_eq!(ClientConfig::default().call_timeout, Duration::from_secs(1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn lists_project_over_tcp() -> Result<(), ClientError> {
        let port = spawn_project_server().await;
        let client = ProjectClient::connect("127.0.0.1", &loopback(port)).await?;

        let titles = client.list_projects("myproj").await?;
        assert_eq!(titles.names, vec!["myproj".to_string()]);
        assert_eq!(titles.custodians, vec!["cncf".to_string()]);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn creates_project_over_tcp() -> Result<(), ClientError> {
        let port = spawn_project_server().await;
        let client = ProjectClient::connect("127.0.0.1", &loopback(port)).await?;

        let status = client.create_project("envoy").await?;
        assert!(status.is_ok());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn serves_concurrent_calls_on_one_connection() -> Result<(), ClientError> {
        let port = spawn_project_server().await;
        let client = ProjectClient::connect("127.0.0.1", &loopback(port)).await?;

        let (a, b, c) = tokio::join!(
            client.list_projects("a"),
            client.list_projects("b"),
            client.create_project("c"),
        );
        assert_eq!(a?.names, vec!["a".to_string()]);
        assert_eq!(b?.names, vec!["b".to_string()]);
        assert!(c?.is_ok());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn unreachable_server_fails_to_connect() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("bind loopback");
        let port = listener.local_addr().expect("local addr").port();
        drop(listener);

        let err = ProjectClient::connect("127.0.0.1", &loopback(port))
            .await
            .err()
            .expect("connect to a closed port should fail");
        assert!(
            matches!(err, ClientError::Connect { .. }),
            "unexpected error: {err}"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn slow_server_exceeds_deadline() -> Result<(), ClientError> {
        let port = spawn_slow_server(Duration::from_millis(1500)).await;
        let client = ProjectClient::connect("127.0.0.1", &loopback(port)).await?;

        let started = std::time::Instant::now();
        let err = client
            .list_projects("myproj")
            .await
            .expect_err("call should outlive its budget");
        assert!(err.is_deadline_exceeded(), "unexpected error: {err}");
        assert!(started.elapsed() < Duration::from_millis(1400));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shorter_budget_applies_to_create() -> Result<(), ClientError> {
        let port = spawn_slow_server(Duration::from_millis(300)).await;
        let config = ClientConfig {
            call_timeout: Duration::from_millis(100),
            ..loopback(port)
        };
        let client = ProjectClient::connect("127.0.0.1", &config).await?;

        let err = client
            .create_project("envoy")
            .await
            .expect_err("call should outlive its budget");
        assert!(err.is_deadline_exceeded(), "unexpected error: {err}");
        Ok(())
    }
}
