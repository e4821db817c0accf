//! Device command handlers.

use cmas_core::{DeviceQuery, SiteServer, SmsDevice};
use tabled::Tabled;

use crate::cli::{DevicesArgs, DevicesCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Resource ID")]
    resource_id: u32,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Domain")]
    domain: String,
    #[tabled(rename = "Client")]
    client: String,
    #[tabled(rename = "OS")]
    os: String,
}

impl From<&SmsDevice> for DeviceRow {
    fn from(d: &SmsDevice) -> Self {
        Self {
            resource_id: d.resource_id,
            name: d.name.clone().unwrap_or_default(),
            domain: d.domain.clone().unwrap_or_default(),
            client: match d.client {
                Some(1) => "yes".into(),
                Some(_) => "no".into(),
                None => String::new(),
            },
            os: d.operating_system_name_and_version.clone().unwrap_or_default(),
        }
    }
}

fn detail(d: &SmsDevice) -> String {
    output::detail_lines(&[
        ("Resource ID", Some(d.resource_id.to_string())),
        ("Name", d.name.clone()),
        ("Domain", d.domain.clone()),
        ("Client", d.client.map(|c| (c == 1).to_string())),
        ("Active", d.active.map(|a| (a == 1).to_string())),
        ("OS", d.operating_system_name_and_version.clone()),
        ("Last logon", d.last_logon_user.clone()),
        ("IP addresses", d.ip_addresses.as_ref().map(|ips| ips.join(", "))),
    ])
}

fn label(d: &SmsDevice) -> String {
    d.name.clone().unwrap_or_else(|| d.resource_id.to_string())
}

pub async fn handle(
    site: &SiteServer,
    args: DevicesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        DevicesCommand::List { name, resource_id } => {
            let query = DeviceQuery {
                name: util::pattern(name.as_deref())?,
                resource_id,
            };
            let rows = site.get_devices(&query).await?;
            let out = output::render_list(global.output, &rows, |d| DeviceRow::from(d), label)?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Get { device } => {
            let found = site.resolve_device(&device).await?;
            let out = output::render_single(global.output, &found, detail, label)?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
