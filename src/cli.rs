use clap::Parser;

use crate::DEFAULT_PROJECT;

/// Queries an OSS project server for a project and prints what it returns.
#[derive(Debug, Parser)]
#[command(name = "project_client")]
#[command(version)]
pub struct ClientCli {
    /// Server host; the port is fixed
    pub host: String,

    /// Project name to look up
    #[arg(value_name = "PROJECT-NAME", default_value = DEFAULT_PROJECT)]
    pub name: String,
}
