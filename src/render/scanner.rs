use crate::document::{Document, NodeId};
use crate::template::payload::{ParseNotReady, Payload};
use crate::template::registry::TemplateRegistry;
use crate::template::Template;
use std::sync::Arc;
use tracing::trace;

pub const TAG_PREFIXES: [&str; 3] = ["language-", "lang-", ""];
pub const TAG_ATTRIBUTES: [&str; 2] = ["data-lang", "data-language"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    Tag,
    Prefix,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub block: NodeId,
    pub template: String,
    pub strategy: MatchStrategy,
    pub payload_text: String,
    pub payload: Payload,
}

pub fn code_blocks(document: &Document, root: NodeId) -> impl Iterator<Item = NodeId> + '_ {
    document
        .descendants(root)
        .filter(|node| document.element(*node).is_some_and(|element| element.is("pre")))
}

pub fn scan<'a>(
    document: &'a Document,
    root: NodeId,
    registry: &TemplateRegistry,
) -> impl Iterator<Item = Candidate> + 'a {
    let templates: Vec<Arc<Template>> = registry.all().collect();
    code_blocks(document, root).filter_map(move |block| classify(document, block, &templates))
}

pub fn inspect(document: &Document, block: NodeId, registry: &TemplateRegistry) -> Option<Candidate> {
    let templates: Vec<Arc<Template>> = registry.all().collect();
    classify(document, block, &templates)
}

fn classify(document: &Document, block: NodeId, templates: &[Arc<Template>]) -> Option<Candidate> {
    let code = document.first_child_element(block, "code").unwrap_or(block);
    let text = document.text_content(code);

    let (template, strategy, payload_text) = match match_tag(document, block, code, templates) {
        Some(template) => (
            template,
            MatchStrategy::Tag,
            strip_identifier(text.trim(), templates),
        ),
        None => {
            let trimmed = text.trim();
            let template = templates
                .iter()
                .find(|template| trimmed.starts_with(template.identifier.as_str()))?;
            (
                template,
                MatchStrategy::Prefix,
                trimmed[template.identifier.len()..].trim_start(),
            )
        }
    };

    match Payload::parse(payload_text) {
        Ok(payload) => Some(Candidate {
            block,
            template: template.identifier.clone(),
            strategy,
            payload_text: payload_text.to_string(),
            payload,
        }),
        Err(reason) => {
            not_ready(block, &template.identifier, &reason);
            None
        }
    }
}

/// A tagged block may still repeat an identifier in front of its payload.
fn strip_identifier<'t>(text: &'t str, templates: &[Arc<Template>]) -> &'t str {
    templates
        .iter()
        .find_map(|template| {
            let rest = text.strip_prefix(template.identifier.as_str())?;
            let at_boundary = rest.is_empty()
                || rest.starts_with('{')
                || rest.starts_with(char::is_whitespace);
            at_boundary.then(|| rest.trim_start())
        })
        .unwrap_or(text)
}

fn not_ready(block: NodeId, template: &str, reason: &ParseNotReady) {
    trace!(%block, template, %reason, "payload not ready");
}

fn match_tag<'t>(
    document: &Document,
    block: NodeId,
    code: NodeId,
    templates: &'t [Arc<Template>],
) -> Option<&'t Arc<Template>> {
    let mut tags: Vec<&str> = Vec::new();
    for node in [code, block] {
        let Some(element) = document.element(node) else {
            continue;
        };
        tags.extend(element.classes());
        tags.extend(
            TAG_ATTRIBUTES
                .iter()
                .filter_map(|attribute| element.attr(attribute)),
        );
    }
    if tags.is_empty() {
        return None;
    }

    templates.iter().find(|template| {
        tags.iter()
            .any(|tag| tag_names(tag, &template.identifier))
    })
}

fn tag_names(tag: &str, identifier: &str) -> bool {
    TAG_PREFIXES.iter().any(|prefix| {
        if let Some(rest) = tag.strip_prefix(prefix) {
            if rest == identifier {
                return true;
            }
        }
        tag.len() == prefix.len() + identifier.len()
            && tag.is_char_boundary(prefix.len())
            && tag[..prefix.len()].eq_ignore_ascii_case(prefix)
            && tag[prefix.len()..].eq_ignore_ascii_case(identifier)
    })
}
