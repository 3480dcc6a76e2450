// Rackstrap Library
//
// Rackspace server provisioning and Chef bootstrap, shared by the CLI

pub mod bootstrap;
pub mod compute;
pub mod config;
pub mod provision;
pub mod rackspace;

pub use bootstrap::{BootstrapConfig, BootstrapOptions, Bootstrapper, SshBootstrap};
pub use compute::{CloudServers, Server, ServerRequest};
pub use config::{load_config, Config};
pub use provision::ServerCreate;
pub use rackspace::RackspaceClient;
