// CLI commands module

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};

use rackstrap::bootstrap::{BootstrapOptions, DEFAULT_DISTRO};
use rackstrap::config::{default_config_path, load_config, Config};

pub mod bootstrap;
pub mod server;

/// SSH and Chef flags shared by `server create` and `bootstrap`
#[derive(Args, Debug)]
pub struct BootstrapFlags {
    /// The ssh username
    #[arg(short = 'x', long, default_value = "root")]
    pub ssh_user: String,

    /// The ssh password (defaults to the server's generated password)
    #[arg(short = 'P', long)]
    pub ssh_password: Option<String>,

    /// The SSH identity file used for authentication
    #[arg(short = 'I', long)]
    pub identity_file: Option<PathBuf>,

    /// The Chef node name for the new node (defaults to the server name)
    #[arg(long)]
    pub node_name: Option<String>,

    /// Install the pre-release chef gems
    #[arg(long)]
    pub prerelease: bool,

    /// Bootstrap a distro using a template
    #[arg(short, long, default_value = DEFAULT_DISTRO)]
    pub distro: String,

    /// Full path to location of template to use
    #[arg(long)]
    pub template_file: Option<PathBuf>,
}

impl From<BootstrapFlags> for BootstrapOptions {
    fn from(flags: BootstrapFlags) -> Self {
        Self {
            ssh_user: flags.ssh_user,
            ssh_password: flags.ssh_password,
            identity_file: flags.identity_file,
            node_name: flags.node_name,
            prerelease: flags.prerelease,
            distro: flags.distro,
            template_file: flags.template_file,
        }
    }
}

/// Load the config file named on the command line, or the default one
pub fn load_settings(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => load_config(path),
        None => {
            let path = default_config_path().context("Could not determine home directory")?;
            load_config(&path)
        }
    }
}
