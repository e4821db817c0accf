// ── Device lookups ──

use cmas_api::models::SmsDevice;
use cmas_api::{Filter, NamePattern};

use crate::error::CoreError;
use crate::exactly_one;
use crate::site::SiteServer;

/// Filters for [`SiteServer::get_devices`]. Empty matches everything.
#[derive(Debug, Clone, Default)]
pub struct DeviceQuery {
    pub name: Option<NamePattern>,
    pub resource_id: Option<u32>,
}

impl SiteServer {
    pub async fn get_devices(&self, query: &DeviceQuery) -> Result<Vec<SmsDevice>, CoreError> {
        let mut parts = Vec::new();
        if let Some(id) = query.resource_id {
            parts.push(Filter::eq_num("ResourceID", id));
        }
        if let Some(filter) = query.name.as_ref().and_then(|n| n.server_filter("Name")) {
            parts.push(filter);
        }

        let mut rows = self
            .client()
            .list_devices(Filter::all(parts).as_ref())
            .await?;
        if let Some(pattern) = &query.name {
            rows.retain(|d| d.name.as_deref().is_some_and(|n| pattern.matches(n)));
        }
        Ok(rows)
    }

    /// Resolve a device by resource ID (numeric input) or exact name.
    pub async fn resolve_device(&self, name_or_id: &str) -> Result<SmsDevice, CoreError> {
        if let Ok(resource_id) = name_or_id.trim().parse::<u32>() {
            return self
                .client()
                .get_device(resource_id)
                .await
                .map_err(|e| {
                    if e.is_not_found() {
                        CoreError::not_found("device", name_or_id)
                    } else {
                        e.into()
                    }
                });
        }

        let rows = self
            .get_devices(&DeviceQuery {
                name: Some(NamePattern::Exact(name_or_id.to_owned())),
                ..DeviceQuery::default()
            })
            .await?;
        exactly_one(rows, "device", name_or_id)
    }
}
