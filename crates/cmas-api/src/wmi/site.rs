// Site endpoint
//
// `SMS_Site` is the cheapest authenticated query the service offers, so it
// doubles as the connection check.

use tracing::debug;

use super::class;
use crate::client::AdminClient;
use crate::error::Error;
use crate::models::SmsSite;

impl AdminClient {
    /// `GET wmi/SMS_Site`
    pub async fn list_sites(&self) -> Result<Vec<SmsSite>, Error> {
        debug!("listing sites");
        self.get_value(&Self::wmi(class::SITE), None).await
    }
}
