//! Command dispatch: bridges CLI args -> `SiteServer` workflows -> output.

pub mod api;
pub mod collections;
pub mod config_cmd;
pub mod connect;
pub mod devices;
pub mod rules;
pub mod scripts;
pub mod util;
pub mod variables;

use cmas_core::SiteServer;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Which settings object a `*-vars` command works on.
#[derive(Debug, Clone, Copy)]
pub enum VariableTarget {
    Device,
    Collection,
}

/// Dispatch a site-server-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, site: &SiteServer, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Connect => connect::handle(site, global),
        Command::Api(args) => api::handle(site, args, global).await,
        Command::Collections(args) => collections::handle(site, args, global).await,
        Command::Rules(args) => rules::handle(site, args, global).await,
        Command::Devices(args) => devices::handle(site, args, global).await,
        Command::DeviceVars(args) => {
            variables::handle(site, VariableTarget::Device, args, global).await
        }
        Command::CollectionVars(args) => {
            variables::handle(site, VariableTarget::Collection, args, global).await
        }
        Command::Scripts(args) => scripts::handle(site, args, global).await,
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "config and completions run without a site server".into(),
        )),
    }
}
