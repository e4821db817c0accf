// Membership rule methods on `SMS_Collection`

use serde::Serialize;
use tracing::debug;

use super::class;
use crate::client::AdminClient;
use crate::error::Error;
use crate::models::CollectionRule;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RuleBody<'a> {
    collection_rule: &'a CollectionRule,
}

impl AdminClient {
    /// `POST wmi/SMS_Collection('<id>')/AdminService.AddMembershipRule`
    pub async fn add_membership_rule(
        &self,
        collection_id: &str,
        rule: &CollectionRule,
    ) -> Result<(), Error> {
        debug!(collection_id, rule_type = %rule.odata_type, "adding membership rule");
        self.post_no_response(
            &Self::wmi_method(class::COLLECTION, collection_id, "AddMembershipRule"),
            &RuleBody {
                collection_rule: rule,
            },
        )
        .await
    }

    /// `POST wmi/SMS_Collection('<id>')/AdminService.DeleteMembershipRule`
    pub async fn delete_membership_rule(
        &self,
        collection_id: &str,
        rule: &CollectionRule,
    ) -> Result<(), Error> {
        debug!(collection_id, rule_type = %rule.odata_type, "deleting membership rule");
        self.post_no_response(
            &Self::wmi_method(class::COLLECTION, collection_id, "DeleteMembershipRule"),
            &RuleBody {
                collection_rule: rule,
            },
        )
        .await
    }
}
