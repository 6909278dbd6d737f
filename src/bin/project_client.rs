use std::process;

use clap::Parser;
use oss_project_rpc::{
    ClientConfig, ClientError, ProjectClient, ProjectTitles, cli::ClientCli, logging,
};
use tracing::error;

async fn list(cli: &ClientCli) -> Result<ProjectTitles, ClientError> {
    let client = ProjectClient::connect(&cli.host, &ClientConfig::default()).await?;
    client.list_projects(cli.name.as_str()).await
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = ClientCli::parse();
    logging::init_logging();

    match list(&cli).await {
        Ok(titles) => println!("Projects: {titles}"),
        Err(err @ (ClientError::Connect { .. } | ClientError::ConnectTimeout { .. })) => {
            error!(error = %err, "did not connect");
            process::exit(1);
        }
        Err(err) => {
            error!(error = %err, "could not get project");
            process::exit(1);
        }
    }
}
