// Server CLI Commands
//
// Create a Rackspace cloud server and bootstrap it with Chef.

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;
use std::time::Duration;

use rackstrap::bootstrap::SshBootstrap;
use rackstrap::compute::ServerRequest;
use rackstrap::config::Config;
use rackstrap::provision::ServerCreate;
use rackstrap::rackspace::RackspaceClient;

use super::BootstrapFlags;

#[derive(Args)]
pub struct ServerArgs {
    #[command(subcommand)]
    pub action: ServerAction,
}

#[derive(Subcommand)]
pub enum ServerAction {
    /// Create a new server and bootstrap it
    #[command(override_usage = "rackstrap server create [RUN_LIST]... [OPTIONS]")]
    Create(CreateArgs),
}

#[derive(Args)]
pub struct CreateArgs {
    /// The flavor of server
    #[arg(short, long, default_value_t = 1)]
    pub flavor: u32,

    /// The image of the server
    #[arg(short, long, default_value_t = 49)]
    pub image: u32,

    /// The server name
    #[arg(short = 'N', long, default_value = "my-server")]
    pub server_name: String,

    /// Your rackspace API key
    #[arg(short = 'K', long = "rackspace-api-key", env = "RACKSPACE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Your rackspace API username
    #[arg(short = 'A', long = "rackspace-api-username", env = "RACKSPACE_API_USERNAME")]
    pub api_username: Option<String>,

    /// Seconds to wait after the server is ready before bootstrapping
    #[arg(long, default_value_t = 15)]
    pub bootstrap_delay: u64,

    #[command(flatten)]
    pub bootstrap: BootstrapFlags,

    /// Run list entries for the new node (e.g. "role[base]" "recipe[nginx]")
    pub run_list: Vec<String>,
}

impl CreateArgs {
    pub fn into_command(self) -> ServerCreate {
        let request = ServerRequest {
            name: self.server_name,
            image_id: self.image,
            flavor_id: self.flavor,
        };

        let mut command = ServerCreate::new(request, self.run_list, self.bootstrap.into());
        command.initial_sleep_delay = Duration::from_secs(self.bootstrap_delay);
        command
    }
}

pub async fn execute(args: ServerArgs, settings: Config, verbose: bool) -> Result<()> {
    match args.action {
        ServerAction::Create(create_args) => execute_create(create_args, settings, verbose).await,
    }
}

async fn execute_create(mut args: CreateArgs, settings: Config, verbose: bool) -> Result<()> {
    let settings = settings.with_credentials(args.api_username.take(), args.api_key.take());
    let credentials = settings.credentials()?;

    if verbose {
        println!("{} Authenticating as {}", "→".blue(), credentials.username);
        println!("  Auth URL: {}", settings.rackspace_auth_url);
    }

    let client = RackspaceClient::authenticate(
        &settings.rackspace_auth_url,
        &credentials.username,
        &credentials.api_key,
    )
    .await?;

    let command = args.into_command();
    let bootstrapper = SshBootstrap::new(settings);
    let server = command.run(&client, &bootstrapper).await?;

    println!();
    println!("{} {}", "✓".green(), format!("Server {} bootstrapped", server.name).green().bold());
    if let Some(ip) = server.public_ip() {
        println!("  {} {}", "SSH:".bold(), format!("ssh {}@{}", command.bootstrap.ssh_user, ip).cyan());
    }

    Ok(())
}
