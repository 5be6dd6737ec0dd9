use crate::template::TemplateDefinition;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod store;

pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsBlob {
    #[serde(default)]
    pub custom_templates: BTreeMap<String, TemplateDefinition>,
}
