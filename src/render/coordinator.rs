use crate::document::{Document, Element, NodeId};
use crate::render::scanner::{inspect, scan, Candidate};
use crate::template::registry::TemplateRegistry;
use crate::template::substitute::substitute;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

pub const CONTAINER_CLASS: &str = "stylebox";
pub const TEMPLATE_ATTR: &str = "data-stylebox-template";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplacementMode {
    /// Swap the block out of the tree for the widget. The block stays alive,
    /// detached, and is revisited through the widget.
    #[default]
    Replace,
    Hide,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRecord {
    pub source: NodeId,
    pub template: String,
    pub last_payload_text: String,
    pub rendered: NodeId,
    last_markup: String,
    registry_revision: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub rendered: usize,
    pub rerendered: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub pruned: usize,
}

impl ReconcileReport {
    pub fn changed_anything(&self) -> bool {
        self.rendered + self.rerendered + self.pruned > 0
    }
}

#[derive(Debug, Default)]
pub struct RenderCoordinator {
    mode: ReplacementMode,
    records: BTreeMap<NodeId, RenderRecord>,
}

impl RenderCoordinator {
    pub fn new(mode: ReplacementMode) -> Self {
        Self {
            mode,
            records: BTreeMap::new(),
        }
    }

    pub fn mode(&self) -> ReplacementMode {
        self.mode
    }

    pub fn record(&self, block: NodeId) -> Option<&RenderRecord> {
        self.records.get(&block)
    }

    pub fn records(&self) -> impl Iterator<Item = &RenderRecord> {
        self.records.values()
    }

    pub fn reconcile(
        &mut self,
        document: &mut Document,
        region: NodeId,
        registry: &TemplateRegistry,
    ) -> ReconcileReport {
        let mut candidates: Vec<Candidate> = scan(document, region, registry).collect();
        if self.mode == ReplacementMode::Replace {
            for record in self.records.values() {
                let swapped_out = document.contains(record.source)
                    && !document.is_attached(record.source)
                    && document.contains(record.rendered)
                    && document.is_ancestor(region, record.rendered);
                if swapped_out {
                    candidates.extend(inspect(document, record.source, registry));
                }
            }
        }

        let mut report = ReconcileReport::default();
        for candidate in candidates {
            self.apply(document, registry, candidate, &mut report);
        }
        self.prune(document, &mut report);

        if report.changed_anything() {
            debug!(
                %region,
                rendered = report.rendered,
                rerendered = report.rerendered,
                unchanged = report.unchanged,
                skipped = report.skipped,
                pruned = report.pruned,
                "reconciled"
            );
        }
        report
    }

    fn apply(
        &mut self,
        document: &mut Document,
        registry: &TemplateRegistry,
        candidate: Candidate,
        report: &mut ReconcileReport,
    ) {
        let template = match registry.resolve(&candidate.template) {
            Ok(template) => template,
            Err(err) => {
                debug!(block = %candidate.block, %err, "skipping block");
                report.skipped += 1;
                return;
            }
        };
        let mode = self.mode;
        let revision = registry.revision();

        let Some(record) = self.records.get_mut(&candidate.block) else {
            let markup = substitute(template.markup_pattern(), &candidate.payload);
            let container = create_container(document, &template.identifier, &markup);
            place(document, mode, candidate.block, container);
            debug!(block = %candidate.block, template = %template.identifier, "rendered");
            self.records.insert(
                candidate.block,
                RenderRecord {
                    source: candidate.block,
                    template: template.identifier.clone(),
                    last_payload_text: candidate.payload_text,
                    rendered: container,
                    last_markup: markup,
                    registry_revision: revision,
                },
            );
            report.rendered += 1;
            return;
        };

        let container_alive = document.contains(record.rendered);
        if container_alive
            && record.last_payload_text == candidate.payload_text
            && record.template == template.identifier
            && record.registry_revision == revision
        {
            if mode == ReplacementMode::Hide {
                document.set_attr(record.source, "hidden", "");
            }
            report.unchanged += 1;
            return;
        }

        let markup = substitute(template.markup_pattern(), &candidate.payload);
        record.registry_revision = revision;
        record.last_payload_text = candidate.payload_text;
        if container_alive && markup == record.last_markup && record.template == template.identifier
        {
            report.unchanged += 1;
            return;
        }

        if container_alive {
            fill_container(document, record.rendered, &template.identifier, &markup);
        } else {
            let container = create_container(document, &template.identifier, &markup);
            place(document, mode, record.source, container);
            record.rendered = container;
        }
        debug!(block = %record.source, template = %template.identifier, "re-rendered");
        record.template = template.identifier.clone();
        record.last_markup = markup;
        report.rerendered += 1;
    }

    fn prune(&mut self, document: &mut Document, report: &mut ReconcileReport) {
        let mode = self.mode;
        self.records.retain(|block, record| {
            let present = match mode {
                ReplacementMode::Hide => document.is_attached(record.source),
                ReplacementMode::Replace => {
                    document.contains(record.source)
                        && (document.is_attached(record.source)
                            || document.is_attached(record.rendered))
                }
            };
            if !present {
                if document.contains(record.rendered) {
                    document.remove(record.rendered);
                }
                // A swapped-out source is only reachable through its record.
                if mode == ReplacementMode::Replace && !document.is_attached(record.source) {
                    document.remove(record.source);
                }
                debug!(%block, "source block gone, dropping render record");
                report.pruned += 1;
            }
            present
        });
    }
}

fn create_container(document: &mut Document, template: &str, markup: &str) -> NodeId {
    let container = document.create_element(
        Element::new("div")
            .with_class(CONTAINER_CLASS)
            .with_attr(TEMPLATE_ATTR, template),
    );
    let content = document.create_markup(markup);
    document.append_child(container, content);
    container
}

fn fill_container(document: &mut Document, container: NodeId, template: &str, markup: &str) {
    document.set_attr(container, TEMPLATE_ATTR, template);
    document.clear_children(container);
    let content = document.create_markup(markup);
    document.append_child(container, content);
}

fn place(document: &mut Document, mode: ReplacementMode, block: NodeId, container: NodeId) {
    match mode {
        ReplacementMode::Replace => {
            if !document.replace(block, container) {
                debug!(%block, "block is detached, widget has nowhere to go");
            }
        }
        ReplacementMode::Hide => {
            document.set_attr(block, "hidden", "");
            document.insert_after(block, container);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::builtin::TASK_MANAGER;
    use crate::template::TemplateDefinition;

    struct Fixture {
        document: Document,
        registry: TemplateRegistry,
        message: NodeId,
    }

    impl Fixture {
        fn new() -> Self {
            let mut document = Document::new();
            let body = document.body();
            let message = document.create_element(Element::new("div").with_class("mes_text"));
            document.append_child(body, message);
            Self {
                document,
                registry: TemplateRegistry::new(),
                message,
            }
        }

        fn block(&mut self, tag: &str, text: &str) -> (NodeId, NodeId) {
            let pre = self.document.create_element(Element::new("pre"));
            let code = self
                .document
                .create_element(Element::new("code").with_class(format!("language-{tag}")));
            self.document.append_child(self.message, pre);
            self.document.append_child(pre, code);
            self.document.set_text(code, text);
            (pre, code)
        }

        fn reconcile(&mut self, coordinator: &mut RenderCoordinator) -> ReconcileReport {
            coordinator.reconcile(&mut self.document, self.message, &self.registry)
        }

        fn html(&self) -> String {
            self.document.inner_html(self.message)
        }
    }

    fn both_modes() -> [ReplacementMode; 2] {
        [ReplacementMode::Replace, ReplacementMode::Hide]
    }

    #[test]
    fn task_manager_end_to_end() {
        for mode in both_modes() {
            let mut fixture = Fixture::new();
            let mut coordinator = RenderCoordinator::new(mode);
            let (pre, code) = fixture.block(TASK_MANAGER, "{\"followers\": 12, \"stress\": 40}");

            let report = fixture.reconcile(&mut coordinator);
            assert_eq!(report.rendered, 1);
            let html = fixture.html();
            assert!(html.contains("<div class=\"tm-stat-value-big\">12</div>"));
            assert!(html.contains("style=\"width:40%\""));

            let first_container = coordinator.record(pre).expect("record exists").rendered;
            fixture
                .document
                .set_text(code, "{\"followers\": 13, \"stress\": 40}");
            let report = fixture.reconcile(&mut coordinator);
            assert_eq!(report.rerendered, 1);

            let html = fixture.html();
            assert!(html.contains("<div class=\"tm-stat-value-big\">13</div>"));
            assert!(!html.contains("<div class=\"tm-stat-value-big\">12</div>"));
            assert_eq!(html.matches("tm-window").count(), 1);
            assert_eq!(
                coordinator.record(pre).expect("record exists").rendered,
                first_container
            );
        }
    }

    #[test]
    fn reconcile_twice_is_a_no_op() {
        for mode in both_modes() {
            let mut fixture = Fixture::new();
            let mut coordinator = RenderCoordinator::new(mode);
            fixture.block(TASK_MANAGER, "{\"followers\": 1}");
            fixture.reconcile(&mut coordinator);

            let html = fixture.html();
            let revision = fixture.document.revision();
            let report = fixture.reconcile(&mut coordinator);

            assert!(!report.changed_anything());
            assert_eq!(report.unchanged, 1);
            assert_eq!(fixture.document.revision(), revision);
            assert_eq!(fixture.html(), html);
        }
    }

    #[test]
    fn unfinished_payload_stays_unseen() {
        let mut fixture = Fixture::new();
        let mut coordinator = RenderCoordinator::default();
        let (pre, code) = fixture.block(TASK_MANAGER, "{\"followers\": ");

        let report = fixture.reconcile(&mut coordinator);
        assert_eq!(report, ReconcileReport::default());
        assert!(coordinator.record(pre).is_none());
        assert!(fixture.html().starts_with("<pre>"));

        fixture.document.set_text(code, "{\"followers\": 5}");
        assert_eq!(fixture.reconcile(&mut coordinator).rendered, 1);
    }

    #[test]
    fn invalid_update_keeps_the_last_good_render() {
        for mode in both_modes() {
            let mut fixture = Fixture::new();
            let mut coordinator = RenderCoordinator::new(mode);
            let (pre, code) = fixture.block(TASK_MANAGER, "{\"followers\": 7}");
            fixture.reconcile(&mut coordinator);
            let rendered = fixture.html();

            fixture.document.set_text(code, "{\"followers\": 7, \"str");
            let report = fixture.reconcile(&mut coordinator);

            assert!(!report.changed_anything());
            assert!(coordinator.record(pre).is_some());
            assert!(fixture.html().contains("<div class=\"tm-stat-value-big\">7</div>"));
            if mode == ReplacementMode::Replace {
                assert_eq!(fixture.html(), rendered);
            }
        }
    }

    #[test]
    fn exactly_one_visible_representation() {
        let mut fixture = Fixture::new();
        let mut coordinator = RenderCoordinator::new(ReplacementMode::Replace);
        let (pre, _) = fixture.block(TASK_MANAGER, "{}");
        fixture.reconcile(&mut coordinator);
        assert!(!fixture.document.is_attached(pre));
        assert!(!fixture.html().contains("<pre"));

        let mut fixture = Fixture::new();
        let mut coordinator = RenderCoordinator::new(ReplacementMode::Hide);
        let (pre, _) = fixture.block(TASK_MANAGER, "{}");
        fixture.reconcile(&mut coordinator);
        let record = coordinator.record(pre).expect("record exists");
        assert_eq!(
            fixture.document.children(fixture.message),
            &[pre, record.rendered]
        );
        assert!(fixture.html().starts_with("<pre hidden>"));
    }

    #[test]
    fn removed_blocks_are_pruned() {
        for mode in both_modes() {
            let mut fixture = Fixture::new();
            let mut coordinator = RenderCoordinator::new(mode);
            let (pre, _) = fixture.block(TASK_MANAGER, "{}");
            fixture.reconcile(&mut coordinator);
            let container = coordinator.record(pre).expect("record").rendered;

            fixture.document.remove(pre);
            let report = fixture.reconcile(&mut coordinator);

            assert_eq!(report.pruned, 1);
            assert!(coordinator.record(pre).is_none());
            assert!(!fixture.document.contains(container));
            assert_eq!(fixture.html(), "");
        }
    }

    #[test]
    fn swapped_out_source_is_freed_with_its_message() {
        let mut fixture = Fixture::new();
        let mut coordinator = RenderCoordinator::new(ReplacementMode::Replace);
        let (pre, code) = fixture.block(TASK_MANAGER, "{}");
        fixture.reconcile(&mut coordinator);

        fixture.document.remove(fixture.message);
        let body = fixture.document.body();
        let report = coordinator.reconcile(&mut fixture.document, body, &fixture.registry);

        assert_eq!(report.pruned, 1);
        assert!(!fixture.document.contains(pre));
        assert!(!fixture.document.contains(code));
    }

    #[test]
    fn tagged_block_with_another_identifier_renders_with_its_tag() {
        let mut fixture = Fixture::new();
        fixture
            .registry
            .register("Mood", TemplateDefinition::new("<i>field-ref(a)</i>"))
            .expect("register");
        let mut coordinator = RenderCoordinator::default();
        let (pre, _) = fixture.block("Mood", "TaskManager {\"a\": 1}");

        let report = fixture.reconcile(&mut coordinator);
        assert_eq!(report.rendered, 1);
        assert_eq!(coordinator.record(pre).expect("record").template, "Mood");
        assert!(fixture.html().contains("<i>1</i>"));
    }

    #[test]
    fn records_outside_the_region_survive() {
        let mut fixture = Fixture::new();
        let mut coordinator = RenderCoordinator::default();
        let (pre, _) = fixture.block(TASK_MANAGER, "{}");
        fixture.reconcile(&mut coordinator);

        let body = fixture.document.body();
        let other = fixture.document.create_element(Element::new("div"));
        fixture.document.append_child(body, other);
        let report = coordinator.reconcile(&mut fixture.document, other, &fixture.registry);

        assert_eq!(report, ReconcileReport::default());
        assert!(coordinator.record(pre).is_some());
    }

    #[test]
    fn deleted_template_is_skipped_and_old_render_kept() {
        let mut fixture = Fixture::new();
        fixture
            .registry
            .register("Mood", TemplateDefinition::new("<i>field-ref(mood)</i>"))
            .expect("register");
        let mut coordinator = RenderCoordinator::new(ReplacementMode::Hide);
        let (pre, code) = fixture.block("Mood", "{\"mood\": \"calm\"}");
        fixture.reconcile(&mut coordinator);

        fixture.registry.unregister("Mood").expect("unregister");
        fixture.document.set_text(code, "{\"mood\": \"tense\"}");
        let report = fixture.reconcile(&mut coordinator);

        assert_eq!(report.rerendered, 0);
        assert!(fixture.html().contains("<i>calm</i>"));
        assert!(coordinator.record(pre).is_some());
    }

    #[test]
    fn template_edit_rerenders_existing_widgets() {
        let mut fixture = Fixture::new();
        fixture
            .registry
            .register("Mood", TemplateDefinition::new("<i>field-ref(mood)</i>"))
            .expect("register");
        let mut coordinator = RenderCoordinator::default();
        fixture.block("Mood", "{\"mood\": \"calm\"}");
        fixture.reconcile(&mut coordinator);

        fixture
            .registry
            .register("Mood", TemplateDefinition::new("<b>field-ref(mood)</b>"))
            .expect("re-register");
        let report = fixture.reconcile(&mut coordinator);

        assert_eq!(report.rerendered, 1);
        assert!(fixture.html().contains("<b>calm</b>"));
    }

    #[test]
    fn failure_in_one_block_does_not_affect_others() {
        let mut fixture = Fixture::new();
        let mut coordinator = RenderCoordinator::default();
        fixture.block(TASK_MANAGER, "{not json");
        fixture.block(TASK_MANAGER, "{\"followers\": 3}");

        let report = fixture.reconcile(&mut coordinator);
        assert_eq!(report.rendered, 1);
        assert!(fixture.html().contains(">3</div>"));
    }
}
