// Settings objects that carry device and collection variables
//
// Both `SMS_MachineSettings` and `SMS_CollectionSettings` store their
// variables as one embedded array, so updates always PUT the whole object.
// A target that never had variables has no settings object at all.

use tracing::debug;

use super::class;
use crate::client::AdminClient;
use crate::error::Error;
use crate::models::{CollectionSettings, MachineSettings};

impl AdminClient {
    /// Returns `None` when the device has no settings object.
    pub async fn get_machine_settings(
        &self,
        resource_id: u32,
    ) -> Result<Option<MachineSettings>, Error> {
        not_found_as_none(
            self.get_entity(&Self::wmi_key(class::MACHINE_SETTINGS, resource_id))
                .await,
        )
    }

    pub async fn create_machine_settings(&self, settings: &MachineSettings) -> Result<(), Error> {
        debug!(resource_id = settings.resource_id, "creating machine settings");
        self.post_no_response(&Self::wmi(class::MACHINE_SETTINGS), settings)
            .await
    }

    pub async fn update_machine_settings(&self, settings: &MachineSettings) -> Result<(), Error> {
        debug!(
            resource_id = settings.resource_id,
            variables = settings.machine_variables.len(),
            "updating machine settings"
        );
        self.put(
            &Self::wmi_key(class::MACHINE_SETTINGS, settings.resource_id),
            settings,
        )
        .await
    }

    /// Returns `None` when the collection has no settings object.
    pub async fn get_collection_settings(
        &self,
        collection_id: &str,
    ) -> Result<Option<CollectionSettings>, Error> {
        not_found_as_none(
            self.get_entity(&Self::wmi_key(class::COLLECTION_SETTINGS, collection_id))
                .await,
        )
    }

    pub async fn create_collection_settings(
        &self,
        settings: &CollectionSettings,
    ) -> Result<(), Error> {
        debug!(collection_id = %settings.collection_id, "creating collection settings");
        self.post_no_response(&Self::wmi(class::COLLECTION_SETTINGS), settings)
            .await
    }

    pub async fn update_collection_settings(
        &self,
        settings: &CollectionSettings,
    ) -> Result<(), Error> {
        debug!(
            collection_id = %settings.collection_id,
            variables = settings.collection_variables.len(),
            "updating collection settings"
        );
        self.put(
            &Self::wmi_key(class::COLLECTION_SETTINGS, &settings.collection_id),
            settings,
        )
        .await
    }
}

fn not_found_as_none<T>(result: Result<T, Error>) -> Result<Option<T>, Error> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
