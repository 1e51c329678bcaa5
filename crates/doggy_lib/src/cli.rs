use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[clap(author, about, version)]
pub struct CliOptions {
    /// Path to the YAML configuration file.
    #[clap(long)]
    pub config: PathBuf,
    /// The URL of the PostgreSQL database to use. Overrides `databaseUrl` in
    /// the configuration file.
    #[clap(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,
    /// The port on which the API server should listen. Overrides
    /// `graphql.port` in the configuration file.
    #[clap(long, env = "PORT")]
    pub port: Option<u16>,
}
