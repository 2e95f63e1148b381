//! Bridges one embedded editor instance to the generator: mount once,
//! regenerate on structural edits, dispose once.

use crate::generator::Generator;
use crate::graph::{BlockGraph, Workspace};
use crate::schema::SchemaRegistry;
use crate::toolbox::ToolboxDefinition;
use anyhow::{bail, Result};
use std::sync::Arc;

/// The editor component the adapter hosts.
pub trait EmbeddedEditor {
    fn inject(&mut self, registry: &SchemaRegistry, toolbox: &ToolboxDefinition) -> Result<()>;
    fn graph(&self) -> &dyn BlockGraph;
    fn dispose(&mut self);
}

/// Editor change notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Create { block_id: String },
    Delete { block_id: String },
    Change { block_id: String, name: String },
    Move { block_id: String },
    Selected { block_id: Option<String> },
    Scroll,
    Zoom,
}

impl ChangeEvent {
    /// Create, delete, change and move alter the graph; the rest are UI-only.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ChangeEvent::Create { .. }
                | ChangeEvent::Delete { .. }
                | ChangeEvent::Change { .. }
                | ChangeEvent::Move { .. }
        )
    }

    /// Parses the editor's event type names (`create`, `delete`, `change`,
    /// `move`, `selected`, `viewport_change`, ...).
    pub fn from_kind(kind: &str, block_id: Option<&str>) -> Option<Self> {
        let id = block_id.unwrap_or_default().to_string();
        match kind {
            "create" => Some(ChangeEvent::Create { block_id: id }),
            "delete" => Some(ChangeEvent::Delete { block_id: id }),
            "change" => Some(ChangeEvent::Change {
                block_id: id,
                name: String::new(),
            }),
            "move" => Some(ChangeEvent::Move { block_id: id }),
            "selected" => Some(ChangeEvent::Selected {
                block_id: block_id.map(str::to_string),
            }),
            "viewport_change" => Some(ChangeEvent::Scroll),
            "zoom" => Some(ChangeEvent::Zoom),
            _ => None,
        }
    }
}

pub type Observer = Box<dyn FnMut(&str)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    Unmounted,
    Mounted,
    Disposed,
}

pub struct WorkspaceAdapter<E: EmbeddedEditor> {
    generator: Generator,
    registry: Arc<SchemaRegistry>,
    toolbox: Arc<ToolboxDefinition>,
    editor: Option<E>,
    observers: Vec<Observer>,
    state: AdapterState,
    last_code: Option<String>,
}

impl<E: EmbeddedEditor> WorkspaceAdapter<E> {
    pub fn new(generator: Generator, registry: Arc<SchemaRegistry>, toolbox: Arc<ToolboxDefinition>) -> Self {
        Self {
            generator,
            registry,
            toolbox,
            editor: None,
            observers: Vec::new(),
            state: AdapterState::Unmounted,
            last_code: None,
        }
    }

    pub fn state(&self) -> AdapterState {
        self.state
    }

    /// Injects the editor. Returns `Ok(false)` when already mounted; the
    /// extra editor is dropped without being injected.
    pub fn mount(&mut self, mut editor: E) -> Result<bool> {
        match self.state {
            AdapterState::Mounted => {
                tracing::debug!("workspace already mounted, ignoring");
                return Ok(false);
            }
            AdapterState::Disposed => bail!("Cannot mount a disposed workspace adapter."),
            AdapterState::Unmounted => {}
        }
        editor.inject(&self.registry, &self.toolbox)?;
        self.editor = Some(editor);
        self.state = AdapterState::Mounted;
        tracing::info!(generator = self.generator.name(), "workspace mounted");
        Ok(true)
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&str) + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn editor(&self) -> Option<&E> {
        self.editor.as_ref()
    }

    pub fn editor_mut(&mut self) -> Option<&mut E> {
        self.editor.as_mut()
    }

    /// Regenerates and notifies observers on structural events. Returns the
    /// delivered text, or `None` when the event was ignored.
    pub fn handle_event(&mut self, event: &ChangeEvent) -> Option<String> {
        if !event.is_structural() {
            return None;
        }
        let editor = match (&self.state, &self.editor) {
            (AdapterState::Mounted, Some(editor)) => editor,
            _ => {
                tracing::debug!(?event, "event while not mounted, ignoring");
                return None;
            }
        };
        let code = self.generator.workspace_to_code(editor.graph());
        tracing::debug!(?event, bytes = code.len(), "regenerated");
        for observer in self.observers.iter_mut() {
            observer(&code);
        }
        self.last_code = Some(code.clone());
        Some(code)
    }

    /// Text delivered by the most recent regeneration.
    pub fn current_code(&self) -> Option<&str> {
        self.last_code.as_deref()
    }

    /// Tears the editor down. Returns `false` when there was nothing to do.
    pub fn dispose(&mut self) -> bool {
        if self.state == AdapterState::Disposed {
            return false;
        }
        if let Some(mut editor) = self.editor.take() {
            editor.dispose();
        }
        self.observers.clear();
        self.state = AdapterState::Disposed;
        tracing::info!("workspace disposed");
        true
    }
}

impl<E: EmbeddedEditor> Drop for WorkspaceAdapter<E> {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Editor without a UI: an in-memory workspace checked against the
/// injected registry.
#[derive(Debug, Default)]
pub struct HeadlessEditor {
    workspace: Workspace,
    injected: bool,
    disposed: bool,
    palette: Vec<String>,
}

impl HeadlessEditor {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            workspace,
            ..Self::default()
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn workspace_mut(&mut self) -> &mut Workspace {
        &mut self.workspace
    }

    pub fn is_injected(&self) -> bool {
        self.injected
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Block types offered by the toolbox after injection.
    pub fn palette(&self) -> &[String] {
        &self.palette
    }
}

impl EmbeddedEditor for HeadlessEditor {
    fn inject(&mut self, registry: &SchemaRegistry, toolbox: &ToolboxDefinition) -> Result<()> {
        let unknown = toolbox.unknown_types(registry);
        if !unknown.is_empty() {
            bail!(
                "Toolbox references unregistered block types: {}.",
                unknown.join(", ")
            );
        }
        self.palette = toolbox.type_ids().into_iter().map(str::to_string).collect();
        self.injected = true;
        Ok(())
    }

    fn graph(&self) -> &dyn BlockGraph {
        &self.workspace
    }

    fn dispose(&mut self) {
        self.disposed = true;
        self.palette.clear();
    }
}
