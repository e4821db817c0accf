//! `cmas connect`: show what the validated connection resolved to.

use cmas_core::SiteServer;
use serde::Serialize;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct ConnectionSummary<'a> {
    server: &'a str,
    site_code: &'a str,
    base_url: &'a str,
}

pub fn handle(site: &SiteServer, global: &GlobalOpts) -> Result<(), CliError> {
    let summary = ConnectionSummary {
        server: site.server(),
        site_code: site.site_code(),
        base_url: site.client().base_url().as_str(),
    };
    let out = output::render_single(
        global.output,
        &summary,
        |s| {
            output::detail_lines(&[
                ("Server", Some(s.server.to_owned())),
                ("Site code", Some(s.site_code.to_owned())),
                ("Admin Service", Some(s.base_url.to_owned())),
            ])
        },
        |s| s.site_code.to_owned(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
