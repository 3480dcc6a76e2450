// Server Provisioning
//
// `server create`: create one server, wait for it to come up, then hand it
// to the bootstrapper.

use anyhow::Result;
use colored::Colorize;
use std::io::Write;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::bootstrap::{bootstrap_for_node, BootstrapOptions, Bootstrapper};
use crate::compute::{CloudServers, Server, ServerRequest};

/// Grace period between the server reporting ready and sshd accepting logins
pub const DEFAULT_INITIAL_SLEEP_DELAY: Duration = Duration::from_secs(15);

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct ServerCreate {
    pub request: ServerRequest,
    pub run_list: Vec<String>,
    pub bootstrap: BootstrapOptions,
    pub initial_sleep_delay: Duration,
    pub poll_interval: Duration,
}

impl ServerCreate {
    pub fn new(request: ServerRequest, run_list: Vec<String>, bootstrap: BootstrapOptions) -> Self {
        Self {
            request,
            run_list,
            bootstrap,
            initial_sleep_delay: DEFAULT_INITIAL_SLEEP_DELAY,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Create the server, wait for it and bootstrap it. Returns the ready server.
    pub async fn run(&self, cloud: &dyn CloudServers, bootstrapper: &dyn Bootstrapper) -> Result<Server> {
        let created = cloud.create_server(&self.request).await?;

        print_server(&created);

        print!("\n{}", "Requesting server".magenta());
        std::io::stdout().flush()?;

        let mut server = self.wait_until_ready(cloud, created.id).await?;
        // Reloads never carry the password, only the create response does
        if server.password.is_none() {
            server.password = created.password;
        }

        println!(
            "\nServer ready, waiting {} seconds to bootstrap.",
            self.initial_sleep_delay.as_secs()
        );
        sleep(self.initial_sleep_delay).await;

        let config = bootstrap_for_node(&self.bootstrap, &self.run_list, &server)?;
        bootstrapper.run(&config).await?;

        Ok(server)
    }

    /// Reload the server until it reports ready. No timeout.
    async fn wait_until_ready(&self, cloud: &dyn CloudServers, id: u64) -> Result<Server> {
        loop {
            let server = cloud.get_server(id).await?;

            print!(".");
            std::io::stdout().flush()?;

            if server.is_ready() {
                info!("Server {} is {}", id, server.status);
                return Ok(server);
            }
            if server.is_failed() {
                warn!("Server {} failed to build", id);
                anyhow::bail!("Server {} ({}) entered {} state", server.name, id, server.status);
            }

            sleep(self.poll_interval).await;
        }
    }
}

fn print_server(server: &Server) {
    println!("{}: {}", "Name".cyan(), server.name);
    println!("{}: {}", "Flavor".cyan(), server.flavor_id);
    println!("{}: {}", "Image".cyan(), server.image_id);
    println!("{}: {}", "Public Address".cyan(), server.addresses.public.join(", "));
    println!("{}: {}", "Private Address".cyan(), server.addresses.private.join(", "));
    println!("{}: {}", "Password".cyan(), server.password.as_deref().unwrap_or(""));
}
