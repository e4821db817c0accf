//! `cmas api`: raw pass-through to any Admin Service path.

use cmas_core::SiteServer;

use crate::cli::{ApiArgs, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(site: &SiteServer, args: ApiArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let body = args.body.as_deref().map(util::read_json_arg).transpose()?;

    let value = site
        .raw_request(&args.method, &args.path, args.filter.as_deref(), body.as_ref())
        .await?;

    // Untyped data has no table shape; table and plain fall back to pretty JSON.
    let format = match global.output {
        OutputFormat::Table | OutputFormat::Plain => OutputFormat::Json,
        other => other,
    };
    let out = output::render_single(format, &value, |_| String::new(), |_| String::new())?;
    output::print_output(&out, global.quiet);
    Ok(())
}
