//! Clap derive structures for the `cmas` CLI.
//!
//! Defines the complete command tree, global flags, and shared value enums.
//! This file is also compiled by build.rs for man pages, so it may only
//! depend on clap and clap_complete.

use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// cmas -- Configuration Manager Admin Service from the command line
#[derive(Debug, Parser)]
#[command(
    name = "cmas",
    version,
    about = "Manage Configuration Manager collections, variables and scripts through the Admin Service",
    long_about = "Talks to the Configuration Manager Admin Service REST API\n\
        (https://<site-server>/AdminService/) to manage collections,\n\
        membership rules, device and collection variables, and to run\n\
        approved scripts on clients.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Site server profile to use
    #[arg(long, short = 'p', env = "CMAS_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Site server host name or Admin Service URL (overrides profile)
    #[arg(long, short = 'S', env = "CMAS_SERVER", global = true)]
    pub server: Option<String>,

    /// Site code (defaults to the one reported by the server)
    #[arg(long, env = "CMAS_SITE_CODE", global = true)]
    pub site_code: Option<String>,

    /// Account for basic auth (DOMAIN\user or UPN)
    #[arg(long, env = "CMAS_USERNAME", global = true)]
    pub username: Option<String>,

    /// Password for basic auth
    #[arg(long, env = "CMAS_PASSWORD", global = true, hide = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Bearer token (cloud management gateway)
    #[arg(long, env = "CMAS_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "CMAS_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "CMAS_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds [default: profile, then 30]
    #[arg(long, env = "CMAS_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Value Enums ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CollectionKindArg {
    Device,
    User,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RefreshArg {
    /// Only when refreshed by hand
    Manual,
    /// On the collection's schedule
    Periodic,
    /// Incremental updates
    Continuous,
    /// Periodic and incremental
    Both,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RuleKindArg {
    Direct,
    Query,
    Include,
    Exclude,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Validate the connection and show the site code
    Connect,

    /// Send a raw request to any Admin Service path
    Api(ApiArgs),

    /// Manage collections
    #[command(alias = "coll", alias = "c")]
    Collections(CollectionsArgs),

    /// Manage collection membership rules
    Rules(RulesArgs),

    /// Look up devices
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Manage device variables
    DeviceVars(VariablesArgs),

    /// Manage collection variables
    CollectionVars(VariablesArgs),

    /// List, run and track scripts
    Scripts(ScriptsArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  API
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ApiArgs {
    /// HTTP method (GET, POST, PUT, DELETE, ...)
    pub method: String,

    /// Path below /AdminService/, e.g. "wmi/SMS_Site" or "v1.0/Device"
    pub path: String,

    /// OData $filter expression, sent as-is
    #[arg(long, short = 'f')]
    pub filter: Option<String>,

    /// JSON request body, or @file to read it from a file
    #[arg(long, short = 'b')]
    pub body: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COLLECTIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CollectionsArgs {
    #[command(subcommand)]
    pub command: CollectionsCommand,
}

#[derive(Debug, Subcommand)]
pub enum CollectionsCommand {
    /// List collections
    #[command(alias = "ls")]
    List {
        /// Name or wildcard pattern (e.g. "Pilot*")
        #[arg(long, short = 'n')]
        name: Option<String>,

        /// Collection ID
        #[arg(long)]
        id: Option<String>,

        /// Only device or user collections
        #[arg(long)]
        kind: Option<CollectionKindArg>,
    },

    /// Show one collection
    Get {
        /// Collection name or ID
        collection: String,
    },

    /// Create a collection
    Create {
        /// Name of the new collection
        name: String,

        /// Limiting collection name or ID
        #[arg(long, short = 'l')]
        limiting_collection: String,

        #[arg(long, default_value = "device")]
        kind: CollectionKindArg,

        #[arg(long, default_value = "manual")]
        refresh: RefreshArg,

        #[arg(long)]
        comment: Option<String>,
    },

    /// Delete a collection
    #[command(alias = "rm")]
    Delete {
        /// Collection name or ID
        collection: String,
    },

    /// Ask the site to re-evaluate membership
    Refresh {
        /// Collection name or ID
        collection: String,
    },

    /// List collection members
    Members {
        /// Collection name or ID
        collection: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  RULES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub command: RulesCommand,
}

#[derive(Debug, Subcommand)]
pub enum RulesCommand {
    /// List membership rules of a collection
    #[command(alias = "ls")]
    List {
        /// Collection name or ID
        collection: String,

        #[arg(long)]
        kind: Option<RuleKindArg>,

        /// Rule name or wildcard pattern
        #[arg(long, short = 'n')]
        name: Option<String>,
    },

    /// Add one direct rule per device
    AddDirect {
        /// Collection name or ID
        collection: String,

        /// Device names or resource IDs
        #[arg(required = true)]
        devices: Vec<String>,
    },

    /// Add a WQL query rule
    AddQuery {
        /// Collection name or ID
        collection: String,

        /// Rule name
        #[arg(long, short = 'n')]
        name: String,

        /// WQL query expression
        #[arg(long, short = 'q')]
        query: String,
    },

    /// Include the members of another collection
    AddInclude {
        /// Collection name or ID
        collection: String,

        /// Collection to include (name or ID)
        include: String,
    },

    /// Exclude the members of another collection
    AddExclude {
        /// Collection name or ID
        collection: String,

        /// Collection to exclude (name or ID)
        exclude: String,
    },

    /// Remove matching membership rules
    #[command(alias = "rm")]
    Remove {
        /// Collection name or ID
        collection: String,

        #[arg(long)]
        kind: Option<RuleKindArg>,

        /// Rule name or wildcard pattern
        #[arg(long, short = 'n')]
        name: Option<String>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  DEVICES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List devices
    #[command(alias = "ls")]
    List {
        /// Name or wildcard pattern (e.g. "LAB-*")
        #[arg(long, short = 'n')]
        name: Option<String>,

        #[arg(long)]
        resource_id: Option<u32>,
    },

    /// Show one device
    Get {
        /// Device name or resource ID
        device: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  VARIABLES (device-vars / collection-vars)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct VariablesArgs {
    #[command(subcommand)]
    pub command: VariablesCommand,
}

#[derive(Debug, Subcommand)]
pub enum VariablesCommand {
    /// List variables
    #[command(alias = "ls")]
    List {
        /// Device or collection (name or ID)
        target: String,

        /// Variable name or wildcard pattern
        #[arg(long, short = 'n')]
        name: Option<String>,
    },

    /// Create a variable
    Add {
        /// Device or collection (name or ID)
        target: String,

        name: String,

        value: String,

        /// Hide the value in the console and API responses
        #[arg(long)]
        masked: bool,
    },

    /// Change an existing variable
    Set {
        /// Device or collection (name or ID)
        target: String,

        name: String,

        value: String,

        /// Change the masked flag (kept as-is when omitted)
        #[arg(long)]
        masked: Option<bool>,
    },

    /// Remove variables
    #[command(alias = "rm")]
    Remove {
        /// Device or collection (name or ID)
        target: String,

        /// Variable name or wildcard pattern; all variables when omitted
        #[arg(long, short = 'n')]
        name: Option<String>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SCRIPTS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ScriptsArgs {
    #[command(subcommand)]
    pub command: ScriptsCommand,
}

#[derive(Debug, Subcommand)]
pub enum ScriptsCommand {
    /// List scripts
    #[command(alias = "ls")]
    List {
        /// Script name or wildcard pattern
        #[arg(long, short = 'n')]
        name: Option<String>,
    },

    /// Show one script with its parameters
    Get {
        /// Script name (or GUID with --guid)
        script: String,

        /// Treat SCRIPT as a script GUID
        #[arg(long)]
        guid: bool,
    },

    /// Run an approved script on a collection or on devices
    #[command(group(ArgGroup::new("script").required(true).args(["name", "guid"])))]
    Run {
        /// Script name
        #[arg(long, short = 'n')]
        name: Option<String>,

        /// Script GUID
        #[arg(long)]
        guid: Option<String>,

        /// Target collection (name or ID)
        #[arg(long, short = 'c')]
        collection: Option<String>,

        /// Target device (name or resource ID); repeatable
        #[arg(long = "device", short = 'd')]
        devices: Vec<String>,

        /// Script parameter as NAME=VALUE; repeatable
        #[arg(long = "param", short = 'P', value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },

    /// Show execution status and output of script runs
    Status {
        /// Client operation ID returned by `scripts run`
        #[arg(long)]
        operation_id: Option<u64>,

        /// Collection ID
        #[arg(long)]
        collection_id: Option<String>,

        /// Script name
        #[arg(long)]
        script_name: Option<String>,
    },
}

/// Parse `NAME=VALUE`. The value may itself contain `=`.
pub fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_owned(), value.to_owned()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{raw}'")),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current configuration (secrets masked)
    Show,

    /// Set a value on the active profile
    Set {
        /// Profile key (server, site_code, auth_mode, username, ...)
        key: String,

        /// Value to set
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store the profile's password or token in the system keyring
    SetSecret {
        /// Profile name
        #[arg(long)]
        profile: Option<String>,
    },

    /// Print the config file path
    Path,

    /// Validate a config file and list the profiles it defines
    Check {
        /// Config file [default: the standard config path]
        file: Option<PathBuf>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
