// ── Collection workflows ──
//
// Lookups accept exact names, wildcards or IDs. Mutations resolve their
// targets first, so a typo fails before anything is written.

use cmas_api::models::{
    CollectionMember, CollectionType, NewCollectionBody, RefreshType, SmsCollection,
};
use cmas_api::{Filter, NamePattern};
use tracing::info;

use crate::error::CoreError;
use crate::exactly_one;
use crate::site::SiteServer;

/// Filters for [`SiteServer::get_collections`]. Empty matches everything.
#[derive(Debug, Clone, Default)]
pub struct CollectionQuery {
    pub name: Option<NamePattern>,
    pub id: Option<String>,
    pub kind: Option<CollectionType>,
}

/// Input for [`SiteServer::new_collection`].
#[derive(Debug, Clone)]
pub struct NewCollection {
    pub name: String,
    /// Name or ID of the limiting collection.
    pub limiting_collection: String,
    pub kind: CollectionType,
    pub refresh_type: RefreshType,
    pub comment: Option<String>,
}

impl SiteServer {
    pub async fn get_collections(
        &self,
        query: &CollectionQuery,
    ) -> Result<Vec<SmsCollection>, CoreError> {
        let mut parts = Vec::new();
        if let Some(id) = &query.id {
            parts.push(Filter::eq("CollectionID", id.clone()));
        }
        if let Some(filter) = query.name.as_ref().and_then(|n| n.server_filter("Name")) {
            parts.push(filter);
        }
        if let Some(kind) = query.kind {
            parts.push(Filter::eq_num("CollectionType", u32::from(kind)));
        }

        let mut rows = self
            .client()
            .list_collections(Filter::all(parts).as_ref())
            .await?;
        if let Some(pattern) = &query.name {
            rows.retain(|c| pattern.matches(&c.name));
        }
        Ok(rows)
    }

    /// Resolve a collection by ID or exact name.
    ///
    /// An ID match wins over a name match.
    pub async fn resolve_collection(&self, name_or_id: &str) -> Result<SmsCollection, CoreError> {
        let filter = Filter::any(vec![
            Filter::eq("CollectionID", name_or_id),
            Filter::eq("Name", name_or_id),
        ]);
        let rows = self.client().list_collections(filter.as_ref()).await?;

        let (by_id, by_name): (Vec<_>, Vec<_>) = rows
            .into_iter()
            .partition(|c| c.collection_id.eq_ignore_ascii_case(name_or_id));
        if by_id.len() == 1 {
            return exactly_one(by_id, "collection", name_or_id);
        }

        let by_name = by_name
            .into_iter()
            .filter(|c| c.name.eq_ignore_ascii_case(name_or_id))
            .collect();
        exactly_one(by_name, "collection", name_or_id)
    }

    pub async fn new_collection(&self, spec: &NewCollection) -> Result<SmsCollection, CoreError> {
        if spec.name.trim().is_empty() {
            return Err(CoreError::validation("collection name must not be empty"));
        }
        if spec.kind == CollectionType::Other {
            return Err(CoreError::validation(
                "collection type must be device or user",
            ));
        }

        let limiting = self.resolve_collection(&spec.limiting_collection).await?;

        let existing = self
            .get_collections(&CollectionQuery {
                name: Some(NamePattern::Exact(spec.name.clone())),
                ..CollectionQuery::default()
            })
            .await?;
        if let Some(found) = existing.first() {
            return Err(CoreError::Conflict {
                message: format!(
                    "collection '{}' already exists ({})",
                    found.name, found.collection_id
                ),
            });
        }

        let body = NewCollectionBody {
            name: spec.name.clone(),
            collection_type: spec.kind,
            limit_to_collection_id: limiting.collection_id,
            refresh_type: spec.refresh_type,
            comment: spec.comment.clone(),
        };
        let created = match self.client().create_collection(&body).await? {
            Some(created) => created,
            None => self.resolve_collection(&spec.name).await?,
        };

        info!(
            collection_id = %created.collection_id,
            name = %created.name,
            "created collection"
        );
        Ok(created)
    }

    /// Returns the collection that was deleted.
    pub async fn remove_collection(&self, name_or_id: &str) -> Result<SmsCollection, CoreError> {
        let collection = self.resolve_collection(name_or_id).await?;
        self.client()
            .delete_collection(&collection.collection_id)
            .await?;
        info!(collection_id = %collection.collection_id, "removed collection");
        Ok(collection)
    }

    /// Ask the site to re-evaluate membership now.
    pub async fn refresh_collection(&self, name_or_id: &str) -> Result<SmsCollection, CoreError> {
        let collection = self.resolve_collection(name_or_id).await?;
        self.client()
            .request_refresh(&collection.collection_id)
            .await?;
        info!(collection_id = %collection.collection_id, "requested membership refresh");
        Ok(collection)
    }

    pub async fn collection_members(
        &self,
        name_or_id: &str,
    ) -> Result<Vec<CollectionMember>, CoreError> {
        let collection = self.resolve_collection(name_or_id).await?;
        Ok(self
            .client()
            .list_collection_members(&collection.collection_id)
            .await?)
    }
}
