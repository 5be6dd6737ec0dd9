use crate::document::{Document, Element, NodeId};
use crate::template::registry::TemplateRegistry;
use tracing::debug;

pub const STYLE_ELEMENT_ID: &str = "stylebox-styles";

#[derive(Debug, Default)]
pub struct StyleApplier {
    applied_revision: Option<u64>,
}

impl StyleApplier {
    pub fn apply(&mut self, document: &mut Document, registry: &TemplateRegistry) -> bool {
        let existing = style_element(document);
        if existing.is_some() && self.applied_revision == Some(registry.revision()) {
            return false;
        }

        let element = match existing {
            Some(element) => element,
            None => {
                let head = document.head();
                let element = document
                    .create_element(Element::new("style").with_attr("id", STYLE_ELEMENT_ID));
                document.append_child(head, element);
                element
            }
        };
        document.set_text(element, &registry.style_sheet());
        self.applied_revision = Some(registry.revision());
        debug!(revision = registry.revision(), "applied template styles");
        true
    }
}

pub fn style_element(document: &Document) -> Option<NodeId> {
    document.find_first(document.head(), |_, element| {
        element.is("style") && element.attr("id") == Some(STYLE_ELEMENT_ID)
    })
}
