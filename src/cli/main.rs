// Rackstrap CLI - Command Line Interface

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod commands;

use commands::{bootstrap, server};

/// Rackstrap - create Rackspace cloud servers and bootstrap them with Chef
#[derive(Parser)]
#[command(name = "rackstrap")]
#[command(version)]
#[command(about = "Create Rackspace cloud servers and bootstrap them with Chef", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file (default: ~/.rackstrap/config.json)
    #[arg(long, global = true, env = "RACKSTRAP_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cloud server management
    Server(server::ServerArgs),

    /// Bootstrap an existing machine with Chef over SSH
    Bootstrap(bootstrap::BootstrapArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match commands::load_settings(cli.config.as_deref()) {
        Ok(settings) => match cli.command {
            Commands::Server(args) => server::execute(args, settings, cli.verbose).await,
            Commands::Bootstrap(args) => bootstrap::execute(args, settings, cli.verbose).await,
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_server_create_defaults() {
        let cli = Cli::try_parse_from(["rackstrap", "server", "create", "role[base]", "recipe[nginx]"]).unwrap();

        let Commands::Server(server::ServerArgs { action: server::ServerAction::Create(args) }) = cli.command else {
            panic!("expected server create");
        };

        assert_eq!(args.flavor, 1);
        assert_eq!(args.image, 49);
        assert_eq!(args.server_name, "my-server");
        assert_eq!(args.bootstrap_delay, 15);
        assert_eq!(args.run_list, vec!["role[base]", "recipe[nginx]"]);
        assert_eq!(args.bootstrap.ssh_user, "root");
        assert_eq!(args.bootstrap.distro, "ubuntu10.04-gems");
        assert!(!args.bootstrap.prerelease);
        assert!(args.bootstrap.template_file.is_none());

        let command = args.into_command();
        assert_eq!(command.request.flavor_id, 1);
        assert_eq!(command.request.image_id, 49);
        assert_eq!(command.request.name, "my-server");
        assert_eq!(command.initial_sleep_delay, Duration::from_secs(15));
    }

    #[test]
    fn test_server_create_short_flags() {
        let cli = Cli::try_parse_from([
            "rackstrap", "server", "create",
            "-f", "3", "-i", "62", "-N", "db-1",
            "-K", "key", "-A", "alice",
            "-x", "ubuntu", "-P", "pw", "-I", "/keys/id_rsa",
            "-d", "centos5-gems", "--prerelease",
            "--node-name", "db01.example.com",
            "--template-file", "/tmp/t.sh",
            "--bootstrap-delay", "0",
        ])
        .unwrap();

        let Commands::Server(server::ServerArgs { action: server::ServerAction::Create(args) }) = cli.command else {
            panic!("expected server create");
        };

        assert_eq!(args.api_key.as_deref(), Some("key"));
        assert_eq!(args.api_username.as_deref(), Some("alice"));

        let command = args.into_command();
        assert_eq!(command.request.flavor_id, 3);
        assert_eq!(command.request.image_id, 62);
        assert_eq!(command.request.name, "db-1");
        assert_eq!(command.initial_sleep_delay, Duration::ZERO);
        assert_eq!(command.bootstrap.ssh_user, "ubuntu");
        assert_eq!(command.bootstrap.ssh_password.as_deref(), Some("pw"));
        assert_eq!(command.bootstrap.identity_file, Some(PathBuf::from("/keys/id_rsa")));
        assert_eq!(command.bootstrap.node_name.as_deref(), Some("db01.example.com"));
        assert_eq!(command.bootstrap.distro, "centos5-gems");
        assert!(command.bootstrap.prerelease);
        assert_eq!(command.bootstrap.template_file, Some(PathBuf::from("/tmp/t.sh")));
    }

    #[test]
    fn test_flavor_must_be_numeric() {
        assert!(Cli::try_parse_from(["rackstrap", "server", "create", "-f", "large"]).is_err());
    }

    #[test]
    fn test_bootstrap_command() {
        let cli = Cli::try_parse_from(["rackstrap", "bootstrap", "203.0.113.9", "role[base]", "--sudo", "-x", "ubuntu"]).unwrap();

        let Commands::Bootstrap(args) = cli.command else {
            panic!("expected bootstrap");
        };

        let config = args.into_config();
        assert_eq!(config.host, "203.0.113.9");
        assert_eq!(config.run_list, vec!["role[base]"]);
        assert_eq!(config.ssh_user, "ubuntu");
        assert!(config.use_sudo);
        assert_eq!(config.chef_node_name, None);
    }
}
