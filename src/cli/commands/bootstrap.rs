// Bootstrap CLI Command
//
// Install chef-client on an existing machine and register it with the
// Chef server.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use rackstrap::bootstrap::{BootstrapConfig, BootstrapOptions, Bootstrapper, SshBootstrap};
use rackstrap::config::Config;

use super::BootstrapFlags;

#[derive(Args)]
#[command(override_usage = "rackstrap bootstrap <HOST> [RUN_LIST]... [OPTIONS]")]
pub struct BootstrapArgs {
    /// Target server IP or hostname
    pub host: String,

    /// Run list entries for the node
    pub run_list: Vec<String>,

    #[command(flatten)]
    pub bootstrap: BootstrapFlags,

    /// Run the bootstrap script with sudo
    #[arg(long)]
    pub sudo: bool,
}

impl BootstrapArgs {
    pub fn into_config(self) -> BootstrapConfig {
        let options: BootstrapOptions = self.bootstrap.into();
        BootstrapConfig::for_host(&self.host, &self.run_list, &options, self.sudo)
    }
}

pub async fn execute(args: BootstrapArgs, settings: Config, verbose: bool) -> Result<()> {
    let config = args.into_config();

    if verbose {
        println!("{} Bootstrapping {}@{}", "→".blue(), config.ssh_user, config.host);
        println!("  Distro:   {}", config.distro);
        println!("  Run list: {}", config.run_list.join(", "));
    }

    SshBootstrap::new(settings).run(&config).await?;

    println!("{} {}", "✓".green(), format!("Bootstrapped {}", config.host).green().bold());
    Ok(())
}
