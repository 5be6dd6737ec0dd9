pub mod builtin;
pub mod payload;
pub mod registry;
pub mod substitute;

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateOrigin {
    Builtin,
    User,
}

impl TemplateOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Builtin => "builtin",
            Self::User => "user",
        }
    }
}

impl fmt::Display for TemplateOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDefinition {
    pub markup_pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_rules: Option<String>,
}

impl TemplateDefinition {
    pub fn new(markup_pattern: impl Into<String>) -> Self {
        Self {
            markup_pattern: markup_pattern.into(),
            style_rules: None,
        }
    }

    pub fn with_style_rules(mut self, style_rules: impl Into<String>) -> Self {
        let style_rules = style_rules.into();
        self.style_rules = if style_rules.trim().is_empty() {
            None
        } else {
            Some(style_rules)
        };
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub identifier: String,
    pub definition: TemplateDefinition,
    pub origin: TemplateOrigin,
}

impl Template {
    pub fn markup_pattern(&self) -> &str {
        &self.definition.markup_pattern
    }

    pub fn style_rules(&self) -> Option<&str> {
        self.definition.style_rules.as_deref()
    }

    pub fn is_builtin(&self) -> bool {
        self.origin == TemplateOrigin::Builtin
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("template name {identifier} is taken by a built-in template")]
    NameConflict { identifier: String },
    #[error("built-in template {identifier} cannot be deleted")]
    ProtectedName { identifier: String },
    #[error("no template named {identifier}")]
    NotFound { identifier: String },
    #[error("invalid template name {identifier:?}: {reason}")]
    InvalidIdentifier {
        identifier: String,
        reason: &'static str,
    },
}
