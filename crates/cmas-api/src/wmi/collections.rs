// Collection endpoints
//
// `SMS_Collection` CRUD plus the `RequestRefresh` method and the
// `SMS_FullCollectionMembership` view.

use serde_json::json;
use tracing::debug;

use super::class;
use crate::client::AdminClient;
use crate::error::Error;
use crate::models::{CollectionMember, NewCollectionBody, SmsCollection};
use crate::odata::Filter;

impl AdminClient {
    /// List collections, optionally narrowed by `$filter`.
    ///
    /// Lazy properties (`CollectionRules`) are not populated here.
    pub async fn list_collections(
        &self,
        filter: Option<&Filter>,
    ) -> Result<Vec<SmsCollection>, Error> {
        self.get_value(&Self::wmi(class::COLLECTION), filter).await
    }

    /// Keyed fetch; includes lazy properties.
    ///
    /// `GET wmi/SMS_Collection('<id>')`
    pub async fn get_collection(&self, collection_id: &str) -> Result<SmsCollection, Error> {
        self.get_entity(&Self::wmi_key(class::COLLECTION, collection_id))
            .await
    }

    /// Returns the created entity when the service echoes it back.
    pub async fn create_collection(
        &self,
        body: &NewCollectionBody,
    ) -> Result<Option<SmsCollection>, Error> {
        debug!(name = %body.name, "creating collection");
        self.post(&Self::wmi(class::COLLECTION), body).await
    }

    pub async fn delete_collection(&self, collection_id: &str) -> Result<(), Error> {
        debug!(collection_id, "deleting collection");
        self.delete(&Self::wmi_key(class::COLLECTION, collection_id))
            .await
    }

    /// `POST wmi/SMS_Collection('<id>')/AdminService.RequestRefresh`
    pub async fn request_refresh(&self, collection_id: &str) -> Result<(), Error> {
        debug!(collection_id, "requesting membership refresh");
        self.post_no_response(
            &Self::wmi_method(class::COLLECTION, collection_id, "RequestRefresh"),
            &json!({}),
        )
        .await
    }

    pub async fn list_collection_members(
        &self,
        collection_id: &str,
    ) -> Result<Vec<CollectionMember>, Error> {
        let filter = Filter::eq("CollectionID", collection_id);
        self.get_value(&Self::wmi(class::FULL_COLLECTION_MEMBERSHIP), Some(&filter))
            .await
    }
}
