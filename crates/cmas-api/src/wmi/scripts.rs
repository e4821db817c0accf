// Script endpoints
//
// `SMS_Scripts` lookups, the client operation that runs a script, and the
// two execution views used to report progress and output.

use tracing::debug;

use super::class;
use crate::client::AdminClient;
use crate::error::Error;
use crate::models::{
    ClientOperationRequest, ClientOperationResult, ScriptExecutionStatus, ScriptExecutionTask,
    SmsScript,
};
use crate::odata::Filter;

impl AdminClient {
    pub async fn list_scripts(&self, filter: Option<&Filter>) -> Result<Vec<SmsScript>, Error> {
        self.get_value(&Self::wmi(class::SCRIPTS), filter).await
    }

    /// Keyed fetch; includes the lazy hash, version and parameter schema.
    pub async fn get_script(&self, script_guid: &str) -> Result<SmsScript, Error> {
        self.get_entity(&Self::wmi_key(class::SCRIPTS, script_guid))
            .await
    }

    /// `POST wmi/SMS_ClientOperation/AdminService.InitiateClientOperationEx`
    pub async fn initiate_client_operation(
        &self,
        request: &ClientOperationRequest,
    ) -> Result<ClientOperationResult, Error> {
        debug!(
            operation_type = request.operation_type,
            collection = %request.target_collection_id,
            targets = request.target_resource_ids.len(),
            "initiating client operation"
        );
        self.post(
            &Self::wmi_static_method(class::CLIENT_OPERATION, "InitiateClientOperationEx"),
            request,
        )
        .await
    }

    pub async fn list_execution_tasks(
        &self,
        filter: Option<&Filter>,
    ) -> Result<Vec<ScriptExecutionTask>, Error> {
        self.get_value(&Self::wmi(class::SCRIPTS_EXECUTION_TASK), filter)
            .await
    }

    pub async fn list_execution_statuses(
        &self,
        filter: Option<&Filter>,
    ) -> Result<Vec<ScriptExecutionStatus>, Error> {
        self.get_value(&Self::wmi(class::SCRIPTS_EXECUTION_STATUS), filter)
            .await
    }
}
