// Device (`SMS_R_System`) endpoints

use super::class;
use crate::client::AdminClient;
use crate::error::Error;
use crate::models::SmsDevice;
use crate::odata::Filter;

impl AdminClient {
    pub async fn list_devices(&self, filter: Option<&Filter>) -> Result<Vec<SmsDevice>, Error> {
        self.get_value(&Self::wmi(class::SYSTEM), filter).await
    }

    /// `GET wmi/SMS_R_System(<resource id>)`
    pub async fn get_device(&self, resource_id: u32) -> Result<SmsDevice, Error> {
        self.get_entity(&Self::wmi_key(class::SYSTEM, resource_id))
            .await
    }
}
