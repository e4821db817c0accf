//! Membership rule command handlers.

use cmas_core::{CollectionRule, RuleKind, SiteServer};
use tabled::Tabled;

use crate::cli::{GlobalOpts, RuleKindArg, RulesArgs, RulesCommand};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct RuleRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Target")]
    target: String,
}

impl From<&CollectionRule> for RuleRow {
    fn from(r: &CollectionRule) -> Self {
        Self {
            kind: r.kind().map_or_else(
                || r.odata_type.trim_start_matches("#AdminService.").to_owned(),
                |k| k.to_string(),
            ),
            name: r.rule_name.clone().unwrap_or_default(),
            target: r.target(),
        }
    }
}

impl From<RuleKindArg> for RuleKind {
    fn from(kind: RuleKindArg) -> Self {
        match kind {
            RuleKindArg::Direct => Self::Direct,
            RuleKindArg::Query => Self::Query,
            RuleKindArg::Include => Self::Include,
            RuleKindArg::Exclude => Self::Exclude,
        }
    }
}

fn rule_label(r: &CollectionRule) -> String {
    r.rule_name.clone().unwrap_or_else(|| r.target())
}

pub async fn handle(
    site: &SiteServer,
    args: RulesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        RulesCommand::List {
            collection,
            kind,
            name,
        } => {
            let pattern = util::pattern(name.as_deref())?;
            let rules = site
                .get_membership_rules(&collection, kind.map(Into::into), pattern.as_ref())
                .await?;
            let out =
                output::render_list(global.output, &rules, |r| RuleRow::from(r), rule_label)?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        RulesCommand::AddDirect {
            collection,
            devices,
        } => {
            let outcome = site.add_direct_rules(&collection, &devices).await?;
            util::print_outcome(&outcome, global)
        }

        RulesCommand::AddQuery {
            collection,
            name,
            query,
        } => {
            let outcome = site.add_query_rule(&collection, &name, &query).await?;
            util::print_outcome(&outcome, global)
        }

        RulesCommand::AddInclude {
            collection,
            include,
        } => {
            let outcome = site.add_include_rule(&collection, &include).await?;
            util::print_outcome(&outcome, global)
        }

        RulesCommand::AddExclude {
            collection,
            exclude,
        } => {
            let outcome = site.add_exclude_rule(&collection, &exclude).await?;
            util::print_outcome(&outcome, global)
        }

        RulesCommand::Remove {
            collection,
            kind,
            name,
        } => {
            let pattern = util::pattern(name.as_deref())?;
            let what = match (&pattern, kind) {
                (Some(p), _) => format!("rules matching '{p}'"),
                (None, Some(k)) => {
                    format!("all {} rules", RuleKind::from(k).to_string().to_lowercase())
                }
                (None, None) => "ALL membership rules".to_owned(),
            };
            if !util::confirm(&format!("Remove {what} from '{collection}'?"), global)? {
                return Ok(());
            }

            let removed = site
                .remove_membership_rules(&collection, kind.map(Into::into), pattern.as_ref())
                .await?;
            let out =
                output::render_list(global.output, &removed, |r| RuleRow::from(r), rule_label)?;
            output::print_output(&out, global.quiet);
            util::done(&format!("Removed {} rule(s)", removed.len()), global);
            Ok(())
        }
    }
}
