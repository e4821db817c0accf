// ── Device and collection variables ──
//
// Variables are an embedded array on a settings object, so every change
// is read-modify-write of the whole object. Device and collection variables
// differ only in the settings class, which `Settings` hides.

use std::fmt;

use cmas_api::NamePattern;
use cmas_api::models::{CollectionSettings, MachineSettings, Variable};
use serde_json::Map;
use tracing::info;

use crate::error::CoreError;
use crate::site::SiteServer;

/// Locale written into newly created settings objects (en-US).
const DEFAULT_LOCALE_ID: u32 = 1033;

/// Which settings object a variable belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableScope {
    Device(u32),
    Collection(String),
}

impl fmt::Display for VariableScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Device(id) => write!(f, "device {id}"),
            Self::Collection(id) => write!(f, "collection {id}"),
        }
    }
}

enum Settings {
    Machine(MachineSettings),
    Collection(CollectionSettings),
}

impl Settings {
    fn variables(&self) -> &[Variable] {
        match self {
            Self::Machine(s) => &s.machine_variables,
            Self::Collection(s) => &s.collection_variables,
        }
    }

    fn variables_mut(&mut self) -> &mut Vec<Variable> {
        match self {
            Self::Machine(s) => &mut s.machine_variables,
            Self::Collection(s) => &mut s.collection_variables,
        }
    }

    fn into_variables(self) -> Vec<Variable> {
        match self {
            Self::Machine(s) => s.machine_variables,
            Self::Collection(s) => s.collection_variables,
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.variables()
            .iter()
            .position(|v| v.name.eq_ignore_ascii_case(name))
    }
}

impl SiteServer {
    /// Scope for a device given by name or resource ID.
    pub async fn device_scope(&self, name_or_id: &str) -> Result<VariableScope, CoreError> {
        Ok(VariableScope::Device(
            self.resolve_device(name_or_id).await?.resource_id,
        ))
    }

    /// Scope for a collection given by name or ID.
    pub async fn collection_scope(&self, name_or_id: &str) -> Result<VariableScope, CoreError> {
        Ok(VariableScope::Collection(
            self.resolve_collection(name_or_id).await?.collection_id,
        ))
    }

    /// Variables in `scope`, optionally filtered by name. A target without a
    /// settings object has no variables.
    pub async fn get_variables(
        &self,
        scope: &VariableScope,
        name: Option<&NamePattern>,
    ) -> Result<Vec<Variable>, CoreError> {
        let Some(settings) = self.load_settings(scope).await? else {
            return Ok(Vec::new());
        };
        Ok(settings
            .into_variables()
            .into_iter()
            .filter(|v| name.is_none_or(|p| p.matches(&v.name)))
            .collect())
    }

    pub async fn new_variable(
        &self,
        scope: &VariableScope,
        name: &str,
        value: &str,
        masked: bool,
    ) -> Result<Variable, CoreError> {
        if name.trim().is_empty() {
            return Err(CoreError::validation("variable name must not be empty"));
        }

        let loaded = self.load_settings(scope).await?;
        let exists = loaded.is_some();
        let mut settings = match loaded {
            Some(settings) => settings,
            None => self.empty_settings(scope),
        };
        if let Some(i) = settings.position(name) {
            return Err(CoreError::Conflict {
                message: format!(
                    "variable '{}' already exists on {scope}",
                    settings.variables()[i].name
                ),
            });
        }

        let variable = Variable {
            name: name.to_owned(),
            value: Some(value.to_owned()),
            is_masked: masked,
        };
        settings.variables_mut().push(variable.clone());
        self.store_settings(&settings, exists).await?;

        info!(%scope, name, masked, "created variable");
        Ok(variable)
    }

    /// Change an existing variable. `masked: None` keeps the current flag.
    pub async fn set_variable(
        &self,
        scope: &VariableScope,
        name: &str,
        value: &str,
        masked: Option<bool>,
    ) -> Result<Variable, CoreError> {
        let mut settings = self
            .load_settings(scope)
            .await?
            .ok_or_else(|| CoreError::not_found("variable", name))?;
        let index = settings
            .position(name)
            .ok_or_else(|| CoreError::not_found("variable", name))?;

        let variable = &mut settings.variables_mut()[index];
        variable.value = Some(value.to_owned());
        if let Some(masked) = masked {
            variable.is_masked = masked;
        }
        let updated = variable.clone();

        self.store_settings(&settings, true).await?;
        info!(%scope, name, "updated variable");
        Ok(updated)
    }

    /// Remove matching variables (all of them when `name` is `None`).
    ///
    /// The settings object is kept even when its array becomes empty.
    /// Returns the removed variables.
    pub async fn remove_variables(
        &self,
        scope: &VariableScope,
        name: Option<&NamePattern>,
    ) -> Result<Vec<Variable>, CoreError> {
        let Some(mut settings) = self.load_settings(scope).await? else {
            return match name {
                Some(pattern) => Err(CoreError::not_found("variable", pattern.to_string())),
                None => Ok(Vec::new()),
            };
        };

        let (removed, kept): (Vec<Variable>, Vec<Variable>) = std::mem::take(settings.variables_mut())
            .into_iter()
            .partition(|v| name.is_none_or(|p| p.matches(&v.name)));
        *settings.variables_mut() = kept;

        if removed.is_empty() {
            return match name {
                Some(pattern) => Err(CoreError::not_found("variable", pattern.to_string())),
                None => Ok(removed),
            };
        }

        self.store_settings(&settings, true).await?;
        info!(%scope, removed = removed.len(), "removed variables");
        Ok(removed)
    }

    // ── Internals ────────────────────────────────────────────────────

    async fn load_settings(&self, scope: &VariableScope) -> Result<Option<Settings>, CoreError> {
        Ok(match scope {
            VariableScope::Device(id) => self
                .client()
                .get_machine_settings(*id)
                .await?
                .map(Settings::Machine),
            VariableScope::Collection(id) => self
                .client()
                .get_collection_settings(id)
                .await?
                .map(Settings::Collection),
        })
    }

    fn empty_settings(&self, scope: &VariableScope) -> Settings {
        match scope {
            VariableScope::Device(id) => Settings::Machine(MachineSettings {
                resource_id: *id,
                source_site: Some(self.site_code().to_owned()),
                locale_id: Some(DEFAULT_LOCALE_ID),
                machine_variables: Vec::new(),
                extra: Map::new(),
            }),
            VariableScope::Collection(id) => Settings::Collection(CollectionSettings {
                collection_id: id.clone(),
                locale_id: Some(DEFAULT_LOCALE_ID),
                collection_variables: Vec::new(),
                extra: Map::new(),
            }),
        }
    }

    async fn store_settings(&self, settings: &Settings, exists: bool) -> Result<(), CoreError> {
        let client = self.client();
        match (settings, exists) {
            (Settings::Machine(s), true) => client.update_machine_settings(s).await?,
            (Settings::Machine(s), false) => client.create_machine_settings(s).await?,
            (Settings::Collection(s), true) => client.update_collection_settings(s).await?,
            (Settings::Collection(s), false) => client.create_collection_settings(s).await?,
        }
        Ok(())
    }
}
