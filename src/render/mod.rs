pub mod coordinator;
pub mod notify;
pub mod scanner;
pub mod style;

use crate::document::{Document, NodeId};
use crate::settings::store::PersistenceAdapter;
use crate::template::registry::{LoadRejection, TemplateRegistry};
use crate::template::{RegistryError, TemplateDefinition};
use coordinator::{ReconcileReport, RenderCoordinator, ReplacementMode};
use style::StyleApplier;
use tracing::info;

pub struct Pipeline {
    registry: TemplateRegistry,
    coordinator: RenderCoordinator,
    styles: StyleApplier,
    persistence: PersistenceAdapter,
}

impl Pipeline {
    pub fn new(persistence: PersistenceAdapter, mode: ReplacementMode) -> Self {
        Self {
            registry: TemplateRegistry::new(),
            coordinator: RenderCoordinator::new(mode),
            styles: StyleApplier::default(),
            persistence,
        }
    }

    pub fn load(
        persistence: PersistenceAdapter,
        mode: ReplacementMode,
    ) -> (Self, Vec<LoadRejection>) {
        let mut pipeline = Self::new(persistence, mode);
        let rejections = pipeline.persistence.load_into(&mut pipeline.registry);
        info!(
            templates = pipeline.registry.count(),
            mode = ?mode,
            "pipeline ready"
        );
        (pipeline, rejections)
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    pub fn coordinator(&self) -> &RenderCoordinator {
        &self.coordinator
    }

    pub fn register_template(
        &mut self,
        document: &mut Document,
        identifier: &str,
        definition: TemplateDefinition,
    ) -> Result<u64, RegistryError> {
        self.registry.register(identifier, definition)?;
        self.styles.apply(document, &self.registry);
        Ok(self.persistence.request_save())
    }

    pub fn unregister_template(
        &mut self,
        document: &mut Document,
        identifier: &str,
    ) -> Result<Option<u64>, RegistryError> {
        let before = self.registry.revision();
        self.registry.unregister(identifier)?;
        if self.registry.revision() == before {
            return Ok(None);
        }
        self.styles.apply(document, &self.registry);
        Ok(Some(self.persistence.request_save()))
    }

    pub fn flush_templates(&mut self, ticket: u64) -> bool {
        self.persistence.flush(ticket, &self.registry)
    }

    pub fn reconcile(&mut self, document: &mut Document, region: NodeId) -> ReconcileReport {
        self.styles.apply(document, &self.registry);
        self.coordinator.reconcile(document, region, &self.registry)
    }
}
