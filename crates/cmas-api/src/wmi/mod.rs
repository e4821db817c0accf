// Admin Service WMI endpoints
//
// One file per vendor class family. Each adds methods to `AdminClient`.

mod collections;
mod devices;
mod rules;
mod scripts;
mod site;
mod variables;

/// Vendor class names used in `wmi/<Class>` paths.
pub mod class {
    pub const SITE: &str = "SMS_Site";
    pub const COLLECTION: &str = "SMS_Collection";
    pub const FULL_COLLECTION_MEMBERSHIP: &str = "SMS_FullCollectionMembership";
    pub const SYSTEM: &str = "SMS_R_System";
    pub const MACHINE_SETTINGS: &str = "SMS_MachineSettings";
    pub const COLLECTION_SETTINGS: &str = "SMS_CollectionSettings";
    pub const SCRIPTS: &str = "SMS_Scripts";
    pub const CLIENT_OPERATION: &str = "SMS_ClientOperation";
    pub const SCRIPTS_EXECUTION_TASK: &str = "SMS_ScriptsExecutionTask";
    pub const SCRIPTS_EXECUTION_STATUS: &str = "SMS_ScriptsExecutionStatus";
}
