use crate::template::{Template, TemplateDefinition, TemplateOrigin};

const TASK_MANAGER_MARKUP: &str = include_str!("builtin/task_manager.html");
const TASK_MANAGER_STYLES: &str = include_str!("builtin/task_manager.css");

pub const TASK_MANAGER: &str = "TaskManager";

pub fn builtin_templates() -> Vec<Template> {
    vec![Template {
        identifier: TASK_MANAGER.to_string(),
        definition: TemplateDefinition::new(TASK_MANAGER_MARKUP)
            .with_style_rules(TASK_MANAGER_STYLES),
        origin: TemplateOrigin::Builtin,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::substitute::{lint, placeholders};

    #[test]
    fn builtin_patterns_are_well_formed() {
        for template in builtin_templates() {
            assert!(
                lint(template.markup_pattern()).is_empty(),
                "{} has malformed placeholders",
                template.identifier
            );
            assert!(template.style_rules().is_some());
        }
    }

    #[test]
    fn task_manager_exposes_its_four_fields() {
        let templates = builtin_templates();
        let task_manager = &templates[0];
        let mut names: Vec<&str> = placeholders(task_manager.markup_pattern())
            .into_iter()
            .map(|placeholder| placeholder.name)
            .collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names, vec!["affection", "followers", "mentalDarkness", "stress"]);
    }
}
