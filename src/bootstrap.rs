// Chef Bootstrap
//
// Installs and registers chef-client on a fresh machine over SSH.
// Renders a distro install script and pipes it to `bash -s` on the host.

use anyhow::{Context, Result};
use async_trait::async_trait;
use colored::Colorize;
use handlebars::Handlebars;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, Command};
use tracing::{debug, info};

use crate::compute::Server;
use crate::config::Config;

pub const DEFAULT_DISTRO: &str = "ubuntu10.04-gems";

const CHEF_CLIENT_SETUP: &str = include_str!("../templates/chef-client-setup.sh");

/// Everything one bootstrap run needs to know about its target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapConfig {
    pub host: String,
    pub run_list: Vec<String>,
    pub server_name: Option<String>,
    pub ssh_user: String,
    pub ssh_password: Option<String>,
    pub identity_file: Option<PathBuf>,
    pub chef_node_name: Option<String>,
    pub prerelease: bool,
    pub distro: String,
    pub use_sudo: bool,
    pub template_file: Option<PathBuf>,
}

/// Operator supplied bootstrap settings, shared by `server create` and `bootstrap`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapOptions {
    pub ssh_user: String,
    pub ssh_password: Option<String>,
    pub identity_file: Option<PathBuf>,
    pub node_name: Option<String>,
    pub prerelease: bool,
    pub distro: String,
    pub template_file: Option<PathBuf>,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            ssh_user: "root".to_string(),
            ssh_password: None,
            identity_file: None,
            node_name: None,
            prerelease: false,
            distro: DEFAULT_DISTRO.to_string(),
            template_file: None,
        }
    }
}

impl BootstrapConfig {
    /// Bootstrap an existing host with the options as given
    pub fn for_host(host: &str, run_list: &[String], options: &BootstrapOptions, use_sudo: bool) -> Self {
        Self {
            host: host.to_string(),
            run_list: run_list.to_vec(),
            server_name: None,
            ssh_user: options.ssh_user.clone(),
            ssh_password: options.ssh_password.clone(),
            identity_file: options.identity_file.clone(),
            chef_node_name: options.node_name.clone(),
            prerelease: options.prerelease,
            distro: options.distro.clone(),
            use_sudo,
            template_file: options.template_file.clone(),
        }
    }
}

/// Derive the bootstrap settings for a server that just became ready.
///
/// The generated root password stands in for a missing ssh password and the
/// server name for a missing node name. Sudo is never used.
pub fn bootstrap_for_node(
    options: &BootstrapOptions,
    run_list: &[String],
    server: &Server,
) -> Result<BootstrapConfig> {
    let host = server
        .public_ip()
        .with_context(|| format!("Server {} has no public address", server.name))?;

    Ok(BootstrapConfig {
        host: host.to_string(),
        run_list: run_list.to_vec(),
        server_name: Some(server.name.clone()),
        ssh_user: options.ssh_user.clone(),
        ssh_password: options.ssh_password.clone().or_else(|| server.password.clone()),
        identity_file: options.identity_file.clone(),
        chef_node_name: Some(options.node_name.clone().unwrap_or_else(|| server.name.clone())),
        prerelease: options.prerelease,
        distro: options.distro.clone(),
        use_sudo: false,
        template_file: options.template_file.clone(),
    })
}

/// Runs a bootstrap against a host
#[async_trait]
pub trait Bootstrapper: Send + Sync {
    async fn run(&self, config: &BootstrapConfig) -> Result<()>;
}

fn builtin_template(distro: &str) -> Option<&'static str> {
    match distro {
        "ubuntu10.04-gems" => Some(include_str!("../templates/ubuntu10.04-gems.sh")),
        "ubuntu10.04-apt" => Some(include_str!("../templates/ubuntu10.04-apt.sh")),
        "centos5-gems" => Some(include_str!("../templates/centos5-gems.sh")),
        "fedora13-gems" => Some(include_str!("../templates/fedora13-gems.sh")),
        _ => None,
    }
}

fn version_string(prerelease: bool, chef_version: Option<&str>) -> String {
    if prerelease {
        "--prerelease".to_string()
    } else if let Some(version) = chef_version {
        format!("--version {}", version)
    } else {
        String::new()
    }
}

/// Render the install script for a bootstrap run
pub fn render_bootstrap_script(config: &BootstrapConfig, settings: &Config) -> Result<String> {
    let template = match &config.template_file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read template file: {}", path.display()))?,
        None => builtin_template(&config.distro)
            .with_context(|| format!("Unknown bootstrap distro: {}", config.distro))?
            .to_string(),
    };

    let validation_key = std::fs::read_to_string(&settings.validation_key)
        .with_context(|| format!("Failed to read validation key: {}", settings.validation_key.display()))?;

    let first_boot = serde_json::json!({ "run_list": config.run_list });

    let context = serde_json::json!({
        "chef_server_url": settings.chef_server_url,
        "validation_client_name": settings.validation_client_name,
        "validation_key": validation_key.trim_end(),
        "node_name": config.chef_node_name,
        "version_string": version_string(config.prerelease, settings.chef_version.as_deref()),
        "first_boot_json": serde_json::to_string(&first_boot)?,
    });

    let mut handlebars = Handlebars::new();
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars
        .register_partial("chef_client_setup", CHEF_CLIENT_SETUP)
        .map_err(|e| anyhow::anyhow!("Failed to register chef client setup template: {e}"))?;
    handlebars
        .register_template_string("bootstrap", template)
        .map_err(|e| anyhow::anyhow!("Failed to parse bootstrap template: {e}"))?;

    handlebars
        .render("bootstrap", &context)
        .map_err(|e| anyhow::anyhow!("Failed to render bootstrap template: {e}"))
}

/// The local process that carries the script to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl SshInvocation {
    pub fn for_config(config: &BootstrapConfig) -> Self {
        let mut ssh_args = vec![
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "UserKnownHostsFile=/dev/null".to_string(),
        ];

        if let Some(ref key) = config.identity_file {
            ssh_args.push("-i".to_string());
            ssh_args.push(key.display().to_string());
        }

        ssh_args.push(format!("{}@{}", config.ssh_user, config.host));
        ssh_args.push(if config.use_sudo { "sudo bash -s" } else { "bash -s" }.to_string());

        // ssh only reads passwords from a tty, sshpass feeds it from SSHPASS
        match (&config.identity_file, &config.ssh_password) {
            (None, Some(password)) => {
                let mut args = vec!["-e".to_string(), "ssh".to_string()];
                args.extend(ssh_args);
                Self {
                    program: "sshpass".to_string(),
                    args,
                    env: vec![("SSHPASS".to_string(), password.clone())],
                }
            }
            _ => Self {
                program: "ssh".to_string(),
                args: ssh_args,
                env: Vec::new(),
            },
        }
    }
}

/// Bootstraps through the system ssh client
pub struct SshBootstrap {
    settings: Config,
    // Replaces the ssh invocation, used to run the script locally
    invocation: Option<SshInvocation>,
}

impl SshBootstrap {
    pub fn new(settings: Config) -> Self {
        Self { settings, invocation: None }
    }

    #[cfg(test)]
    pub(crate) fn with_invocation(settings: Config, invocation: SshInvocation) -> Self {
        Self { settings, invocation: Some(invocation) }
    }
}

#[async_trait]
impl Bootstrapper for SshBootstrap {
    async fn run(&self, config: &BootstrapConfig) -> Result<()> {
        let script = render_bootstrap_script(config, &self.settings)?;
        let invocation = self
            .invocation
            .clone()
            .unwrap_or_else(|| SshInvocation::for_config(config));

        match config.server_name {
            Some(ref name) => info!("Bootstrapping {} ({}) with distro {}", name, config.host, config.distro),
            None => info!("Bootstrapping {} with distro {}", config.host, config.distro),
        }
        debug!("Running: {} {}", invocation.program, invocation.args.join(" "));

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to execute {}", invocation.program))?;

        let stdin = child.stdin.take().context("ssh stdin not captured")?;
        let stdout = child.stdout.take().context("ssh stdout not captured")?;
        let stderr = child.stderr.take().context("ssh stderr not captured")?;

        let (fed, out, err) = tokio::join!(
            feed_script(stdin, script),
            relay_lines(&config.host, stdout),
            relay_lines(&config.host, stderr),
        );

        // Exit status takes precedence over a broken stdin pipe
        let status = child.wait().await.context("Failed to wait for ssh")?;
        if !status.success() {
            if let Err(e) = fed {
                debug!("Script was not fully sent: {:#}", e);
            }
            anyhow::bail!("Bootstrap of {} failed: ssh exited with {}", config.host, status);
        }
        fed?;
        out?;
        err?;

        info!("Bootstrap of {} complete", config.host);
        Ok(())
    }
}

async fn feed_script(mut stdin: ChildStdin, script: String) -> Result<()> {
    stdin
        .write_all(script.as_bytes())
        .await
        .context("Failed to send bootstrap script")?;
    stdin.shutdown().await.context("Failed to close ssh stdin")?;
    Ok(())
}

/// Print each output line prefixed with the host. Returns the number of lines.
async fn relay_lines<R: AsyncRead + Unpin>(host: &str, stream: R) -> Result<usize> {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    let mut relayed = 0;

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .await
            .context("Failed to read ssh output")?;
        if read == 0 {
            return Ok(relayed);
        }

        // Remote tools do not always print UTF-8
        let line = String::from_utf8_lossy(&buf);
        println!("{} {}", host.cyan(), line.trim_end_matches(&['\r', '\n'][..]));
        relayed += 1;
    }
}
