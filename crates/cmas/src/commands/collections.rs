//! Collection command handlers.

use cmas_core::{
    CollectionMember, CollectionQuery, CollectionType, NewCollection, RefreshType, SiteServer,
    SmsCollection,
};
use tabled::Tabled;

use crate::cli::{CollectionKindArg, CollectionsArgs, CollectionsCommand, GlobalOpts, RefreshArg};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct CollectionRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Members")]
    members: String,
    #[tabled(rename = "Limiting")]
    limiting: String,
    #[tabled(rename = "Refresh")]
    refresh: String,
}

impl From<&SmsCollection> for CollectionRow {
    fn from(c: &SmsCollection) -> Self {
        Self {
            id: c.collection_id.clone(),
            name: c.name.clone(),
            kind: c.collection_type.to_string(),
            members: c.member_count.map(|n| n.to_string()).unwrap_or_default(),
            limiting: c
                .limit_to_collection_name
                .clone()
                .or_else(|| c.limit_to_collection_id.clone())
                .unwrap_or_default(),
            refresh: c.refresh_type.to_string(),
        }
    }
}

#[derive(Tabled)]
struct MemberRow {
    #[tabled(rename = "Resource ID")]
    resource_id: u32,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Domain")]
    domain: String,
    #[tabled(rename = "Client")]
    client: String,
    #[tabled(rename = "Direct")]
    direct: String,
}

impl From<&CollectionMember> for MemberRow {
    fn from(m: &CollectionMember) -> Self {
        let yes_no = |v: Option<bool>| match v {
            Some(true) => "yes".to_owned(),
            Some(false) => "no".to_owned(),
            None => String::new(),
        };
        Self {
            resource_id: m.resource_id,
            name: m.name.clone().unwrap_or_default(),
            domain: m.domain.clone().unwrap_or_default(),
            client: yes_no(m.is_client),
            direct: yes_no(m.is_direct),
        }
    }
}

fn detail(c: &SmsCollection) -> String {
    output::detail_lines(&[
        ("ID", Some(c.collection_id.clone())),
        ("Name", Some(c.name.clone())),
        ("Type", Some(c.collection_type.to_string())),
        ("Members", c.member_count.map(|n| n.to_string())),
        ("Limiting ID", c.limit_to_collection_id.clone()),
        ("Limiting name", c.limit_to_collection_name.clone()),
        ("Refresh", Some(c.refresh_type.to_string())),
        ("Comment", c.comment.clone().filter(|s| !s.is_empty())),
    ])
}

// ── Arg conversions ─────────────────────────────────────────────────

impl From<CollectionKindArg> for CollectionType {
    fn from(kind: CollectionKindArg) -> Self {
        match kind {
            CollectionKindArg::Device => Self::Device,
            CollectionKindArg::User => Self::User,
        }
    }
}

impl From<RefreshArg> for RefreshType {
    fn from(refresh: RefreshArg) -> Self {
        match refresh {
            RefreshArg::Manual => Self::Manual,
            RefreshArg::Periodic => Self::Periodic,
            RefreshArg::Continuous => Self::Continuous,
            RefreshArg::Both => Self::Both,
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    site: &SiteServer,
    args: CollectionsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        CollectionsCommand::List { name, id, kind } => {
            let query = CollectionQuery {
                name: util::pattern(name.as_deref())?,
                id,
                kind: kind.map(Into::into),
            };
            let rows = site.get_collections(&query).await?;
            let out = output::render_list(
                global.output,
                &rows,
                |c| CollectionRow::from(c),
                |c| c.collection_id.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        CollectionsCommand::Get { collection } => {
            let found = site.resolve_collection(&collection).await?;
            let out = output::render_single(global.output, &found, detail, |c| {
                c.collection_id.clone()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        CollectionsCommand::Create {
            name,
            limiting_collection,
            kind,
            refresh,
            comment,
        } => {
            let created = site
                .new_collection(&NewCollection {
                    name,
                    limiting_collection,
                    kind: kind.into(),
                    refresh_type: refresh.into(),
                    comment,
                })
                .await?;
            let out = output::render_single(global.output, &created, detail, |c| {
                c.collection_id.clone()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        CollectionsCommand::Delete { collection } => {
            if !util::confirm(
                &format!("Delete collection '{collection}'? Deployments targeting it go too."),
                global,
            )? {
                return Ok(());
            }
            let removed = site.remove_collection(&collection).await?;
            util::done(
                &format!("Deleted {} ({})", removed.name, removed.collection_id),
                global,
            );
            Ok(())
        }

        CollectionsCommand::Refresh { collection } => {
            let refreshed = site.refresh_collection(&collection).await?;
            util::done(
                &format!("Membership refresh requested for {}", refreshed.collection_id),
                global,
            );
            Ok(())
        }

        CollectionsCommand::Members { collection } => {
            let members = site.collection_members(&collection).await?;
            let out = output::render_list(
                global.output,
                &members,
                |m| MemberRow::from(m),
                |m| m.name.clone().unwrap_or_else(|| m.resource_id.to_string()),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
