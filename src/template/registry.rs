use crate::template::builtin::builtin_templates;
use crate::template::substitute::lint;
use crate::template::{RegistryError, Template, TemplateDefinition, TemplateOrigin};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct TemplateRegistry {
    builtins: Vec<Arc<Template>>,
    user: BTreeMap<String, Arc<Template>>,
    revision: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRejection {
    pub identifier: String,
    pub error: RegistryError,
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::with_builtins(builtin_templates())
    }

    pub fn with_builtins(builtins: Vec<Template>) -> Self {
        Self {
            builtins: builtins.into_iter().map(Arc::new).collect(),
            user: BTreeMap::new(),
            revision: 0,
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn register(
        &mut self,
        identifier: &str,
        definition: TemplateDefinition,
    ) -> Result<(), RegistryError> {
        validate_identifier(identifier)?;
        if self.builtin(identifier).is_some() {
            return Err(RegistryError::NameConflict {
                identifier: identifier.to_string(),
            });
        }

        for issue in lint(&definition.markup_pattern) {
            warn!(
                template = identifier,
                offset = issue.offset,
                reason = %issue.reason,
                "placeholder will be rendered literally"
            );
        }

        let template = Template {
            identifier: identifier.to_string(),
            definition,
            origin: TemplateOrigin::User,
        };
        let replaced = self
            .user
            .insert(identifier.to_string(), Arc::new(template))
            .is_some();
        self.revision += 1;
        debug!(template = identifier, replaced, "registered user template");
        Ok(())
    }

    pub fn unregister(&mut self, identifier: &str) -> Result<(), RegistryError> {
        if self
            .builtins
            .iter()
            .any(|template| template.identifier == identifier)
        {
            return Err(RegistryError::ProtectedName {
                identifier: identifier.to_string(),
            });
        }
        if self.user.remove(identifier).is_some() {
            self.revision += 1;
            debug!(template = identifier, "unregistered user template");
        }
        Ok(())
    }

    pub fn resolve(&self, identifier: &str) -> Result<Arc<Template>, RegistryError> {
        self.builtins
            .iter()
            .find(|template| template.identifier == identifier)
            .or_else(|| self.user.get(identifier))
            .cloned()
            .ok_or_else(|| RegistryError::NotFound {
                identifier: identifier.to_string(),
            })
    }

    pub fn all(&self) -> std::vec::IntoIter<Arc<Template>> {
        self.builtins
            .iter()
            .chain(self.user.values())
            .cloned()
            .collect::<Vec<_>>()
            .into_iter()
    }

    pub fn count(&self) -> usize {
        self.builtins.len() + self.user.len()
    }

    pub fn user_definitions(&self) -> BTreeMap<String, TemplateDefinition> {
        self.user
            .iter()
            .map(|(identifier, template)| (identifier.clone(), template.definition.clone()))
            .collect()
    }

    pub fn load_user(
        &mut self,
        definitions: BTreeMap<String, TemplateDefinition>,
    ) -> Vec<LoadRejection> {
        let mut rejections = Vec::new();
        for (identifier, definition) in definitions {
            if let Err(error) = self.register(&identifier, definition) {
                rejections.push(LoadRejection { identifier, error });
            }
        }
        rejections
    }

    pub fn style_sheet(&self) -> String {
        self.all()
            .filter_map(|template| {
                template
                    .style_rules()
                    .map(|rules| format!("/* {} */\n{}", template.identifier, rules.trim()))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    // Built-ins also claim their case-insensitive spellings, since tags are
    // matched case-insensitively.
    fn builtin(&self, identifier: &str) -> Option<&Arc<Template>> {
        self.builtins
            .iter()
            .find(|template| template.identifier.eq_ignore_ascii_case(identifier))
    }
}

fn validate_identifier(identifier: &str) -> Result<(), RegistryError> {
    let reason = if identifier.is_empty() {
        Some("name is empty")
    } else if identifier.chars().any(char::is_whitespace) {
        Some("name contains whitespace")
    } else if identifier.chars().any(|ch| matches!(ch, '{' | '}' | '"' | '<' | '>')) {
        Some("name contains markup or JSON delimiters")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(RegistryError::InvalidIdentifier {
            identifier: identifier.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::builtin::TASK_MANAGER;

    fn definition(markup: &str) -> TemplateDefinition {
        TemplateDefinition::new(markup)
    }

    #[test]
    fn builtin_name_cannot_be_registered() {
        let mut registry = TemplateRegistry::new();
        let revision = registry.revision();

        assert_eq!(
            registry.register(TASK_MANAGER, definition("<p/>")),
            Err(RegistryError::NameConflict {
                identifier: TASK_MANAGER.to_string()
            })
        );
        assert!(matches!(
            registry.register("taskmanager", definition("<p/>")),
            Err(RegistryError::NameConflict { .. })
        ));
        assert_eq!(registry.revision(), revision);
        assert!(registry.resolve(TASK_MANAGER).expect("builtin").is_builtin());
    }

    #[test]
    fn registered_template_resolves_to_its_definition() {
        let mut registry = TemplateRegistry::new();
        let custom = definition("<p>field-ref(a)</p>").with_style_rules(".p { }");

        registry
            .register("Custom1", custom.clone())
            .expect("custom template should register");

        let resolved = registry.resolve("Custom1").expect("custom template should resolve");
        assert_eq!(resolved.definition, custom);
        assert_eq!(resolved.origin, TemplateOrigin::User);
    }

    #[test]
    fn register_overwrites_existing_user_entry() {
        let mut registry = TemplateRegistry::new();
        registry.register("Card", definition("one")).expect("first");
        registry.register("Card", definition("two")).expect("second");

        assert_eq!(registry.count(), 2);
        assert_eq!(
            registry.resolve("Card").expect("card").markup_pattern(),
            "two"
        );
    }

    #[test]
    fn unregister_rules() {
        let mut registry = TemplateRegistry::new();
        assert_eq!(
            registry.unregister(TASK_MANAGER),
            Err(RegistryError::ProtectedName {
                identifier: TASK_MANAGER.to_string()
            })
        );

        let revision = registry.revision();
        registry.unregister("Missing").expect("absent name is a no-op");
        assert_eq!(registry.revision(), revision);

        registry.register("Card", definition("x")).expect("register");
        registry.unregister("Card").expect("unregister");
        assert!(matches!(
            registry.resolve("Card"),
            Err(RegistryError::NotFound { .. })
        ));
    }

    #[test]
    fn invalid_identifiers_are_rejected() {
        let mut registry = TemplateRegistry::new();
        for bad in ["", "two words", "<b>"] {
            assert!(matches!(
                registry.register(bad, definition("x")),
                Err(RegistryError::InvalidIdentifier { .. })
            ));
        }
    }

    #[test]
    fn all_is_a_snapshot_in_match_order() {
        let mut registry = TemplateRegistry::new();
        registry.register("Zeta", definition("z")).expect("zeta");
        registry.register("Alpha", definition("a")).expect("alpha");

        let snapshot = registry.all();
        registry.unregister("Alpha").expect("unregister");

        let order: Vec<String> = snapshot.map(|template| template.identifier.clone()).collect();
        assert_eq!(order, vec![TASK_MANAGER, "Alpha", "Zeta"]);
        assert_eq!(registry.all().count(), 2);
    }

    #[test]
    fn style_sheet_concatenates_rules_of_every_template() {
        let mut registry = TemplateRegistry::with_builtins(Vec::new());
        registry
            .register("A", definition("a").with_style_rules(".a { color: red; }"))
            .expect("a");
        registry.register("B", definition("b")).expect("b");
        registry
            .register("C", definition("c").with_style_rules(".c { color: blue; }"))
            .expect("c");

        let sheet = registry.style_sheet();
        assert!(sheet.contains(".a { color: red; }"));
        assert!(sheet.contains(".c { color: blue; }"));
        assert!(sheet.find(".a").expect("a") < sheet.find(".c").expect("c"));
        assert!(!sheet.contains("/* B */"));
    }

    #[test]
    fn load_user_keeps_going_past_rejections() {
        let mut registry = TemplateRegistry::new();
        let mut stored = BTreeMap::new();
        stored.insert(TASK_MANAGER.to_string(), definition("shadow"));
        stored.insert("Mood".to_string(), definition("field-ref(mood)"));

        let rejections = registry.load_user(stored);
        assert_eq!(rejections.len(), 1);
        assert_eq!(rejections[0].identifier, TASK_MANAGER);
        assert!(registry.resolve("Mood").is_ok());
        assert_eq!(registry.user_definitions().len(), 1);
    }
}
