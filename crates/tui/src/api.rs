//! Capability surface exported to other plugins.
//!
//! Stable contract: named tabs, particle exporters, and a small set of UI
//! primitives so callers never take a direct dependency on the UI toolkit.
//! Registries are keyed by `mod-name/item-name`; re-registering a key
//! replaces the previous entry (hot-reload deduplication) and moves it to
//! the end of the list.

/// UI primitives offered to tab and exporter callbacks.
pub trait UiPrims {
    /// Renders a line of text.
    fn text(&mut self, text: &str);
    /// Renders a button; returns true when it was pressed this frame.
    fn button(&mut self, label: &str) -> bool;
    /// Renders a single-line text input; returns true when `value` changed.
    fn text_input(&mut self, label: &str, value: &mut String, max_length: usize) -> bool;
}

/// A registered tab.
pub trait Tab: Send + Sync {
    /// Display name of the tab.
    fn name(&self) -> &str;
    /// Renders the tab body.
    fn render(&mut self, ui: &mut dyn UiPrims);
    /// Whether the tab should currently appear.
    fn visible(&self) -> bool {
        true
    }
    /// Called each time the tab is opened.
    fn on_open(&mut self) {}
    /// Called each time the tab is closed.
    fn on_close(&mut self) {}
}

struct RegisteredTab {
    key: String,
    mod_name: String,
    tab: Box<dyn Tab>,
}

/// Ordered tab registry.
#[derive(Default)]
pub struct TabRegistry {
    tabs: Vec<RegisteredTab>,
}

impl TabRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tab under `mod_name/tab.name()`.
    pub fn register(&mut self, mod_name: impl Into<String>, tab: Box<dyn Tab>) {
        let mod_name = mod_name.into();
        let key = format!("{mod_name}/{}", tab.name());
        self.tabs.retain(|t| t.key != key);
        self.tabs.push(RegisteredTab { key, mod_name, tab });
    }

    /// Number of registered tabs.
    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    /// True when no tabs are registered.
    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    /// Currently visible tabs as `(mod name, tab)` pairs, in registration
    /// order.
    pub fn visible_tabs(&mut self) -> Vec<(&str, &mut (dyn Tab + 'static))> {
        self.tabs
            .iter_mut()
            .filter(|t| t.tab.visible())
            .map(|t| (t.mod_name.as_str(), t.tab.as_mut()))
            .collect()
    }
}

/// A particle type, as described to exporters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParticleDescription {
    /// Particle type name.
    pub name: String,
    /// Texture path or identifier.
    pub texture: String,
    /// Color, as the host renders it (e.g. hex).
    pub color: String,
    /// Lifetime range in seconds.
    pub life_min: f32,
    /// Upper lifetime bound.
    pub life_max: f32,
    /// Speed range.
    pub speed_min: f32,
    /// Upper speed bound.
    pub speed_max: f32,
}

/// An emitter, as described to exporters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EmitterDescription {
    /// Emitter position.
    pub position: (f32, f32),
    /// Emission interval in seconds.
    pub interval: f32,
    /// Particles per emission.
    pub amount: u32,
}

/// Produces exportable text; `None` means nothing to export for this input.
pub type ExportTextFn =
    dyn Fn(&ParticleDescription, &EmitterDescription) -> Option<String> + Send + Sync;

/// Renders custom exporter controls.
pub type ExportRenderFn =
    dyn Fn(&mut dyn UiPrims, &ParticleDescription, &EmitterDescription) + Send + Sync;

enum ExporterKind {
    /// Renders a button that yields text for the host to copy out.
    Text { tooltip: String, f: Box<ExportTextFn> },
    /// Fully custom controls.
    Custom(Box<ExportRenderFn>),
}

struct ParticleExporter {
    key: String,
    kind: ExporterKind,
}

/// Registry of particle exporters, same key and dedup rules as tabs.
#[derive(Default)]
pub struct ParticleExporterRegistry {
    exporters: Vec<ParticleExporter>,
}

impl ParticleExporterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a text exporter rendered as a single button.
    pub fn register_text_exporter(
        &mut self,
        mod_name: &str,
        name: &str,
        tooltip: impl Into<String>,
        f: impl Fn(&ParticleDescription, &EmitterDescription) -> Option<String>
        + Send
        + Sync
        + 'static,
    ) {
        self.insert(ParticleExporter {
            key: format!("{mod_name}/{name}"),
            kind: ExporterKind::Text {
                tooltip: tooltip.into(),
                f: Box::new(f),
            },
        });
    }

    /// Registers an exporter with fully custom controls.
    pub fn register_custom_exporter(
        &mut self,
        mod_name: &str,
        name: &str,
        f: impl Fn(&mut dyn UiPrims, &ParticleDescription, &EmitterDescription)
        + Send
        + Sync
        + 'static,
    ) {
        self.insert(ParticleExporter {
            key: format!("{mod_name}/{name}"),
            kind: ExporterKind::Custom(Box::new(f)),
        });
    }

    fn insert(&mut self, exporter: ParticleExporter) {
        self.exporters.retain(|e| e.key != exporter.key);
        self.exporters.push(exporter);
    }

    /// Registered exporter keys, in order.
    pub fn keys(&self) -> Vec<&str> {
        self.exporters.iter().map(|e| e.key.as_str()).collect()
    }

    /// Renders every exporter. Text exporters become a button labeled with
    /// their key; a press produces the exported text, handed to `on_export`.
    pub fn render_all(
        &self,
        ui: &mut dyn UiPrims,
        particle: &ParticleDescription,
        emitter: &EmitterDescription,
        mut on_export: impl FnMut(&str, String),
    ) {
        for exporter in &self.exporters {
            match &exporter.kind {
                ExporterKind::Text { tooltip, f } => {
                    if ui.button(&exporter.key)
                        && let Some(text) = f(particle, emitter)
                    {
                        on_export(&exporter.key, text);
                    }
                    if !tooltip.is_empty() {
                        ui.text(tooltip);
                    }
                }
                ExporterKind::Custom(f) => f(ui, particle, emitter),
            }
        }
    }
}
