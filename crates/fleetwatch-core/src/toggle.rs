//! Layer control panel state.
//!
//! Purely local toggle state. The map session reconciles against
//! [`ViewToggleState`]; the panel never touches the map directly.

use crate::base_layer::BaseLayerRegistry;
use crate::config::MapConfig;
use crate::overlay::OverlayRegistry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Which base layer and which overlays should be on the map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewToggleState {
    pub active_base_layer_id: String,
    pub visible_overlay_ids: BTreeSet<String>,
}

impl ViewToggleState {
    pub fn new(
        active_base_layer_id: impl Into<String>,
        visible_overlay_ids: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            active_base_layer_id: active_base_layer_id.into(),
            visible_overlay_ids: visible_overlay_ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Initial state from configuration.
    pub fn from_config(map: &MapConfig) -> Self {
        Self::new(map.default_base_layer.clone(), map.default_overlays.iter().cloned())
    }

    pub fn is_overlay_visible(&self, id: &str) -> bool {
        self.visible_overlay_ids.contains(id)
    }
}

/// Toggle state machine behind the layer control widget.
#[derive(Debug, Clone)]
pub struct LayerControlPanel {
    state: ViewToggleState,
    overlay_ids: Vec<String>,
    base_layer_ids: Vec<String>,
    panel_open: bool,
}

impl LayerControlPanel {
    /// Creates the panel, dropping initial ids the registries do not know.
    pub fn new(
        initial: ViewToggleState,
        overlays: &OverlayRegistry,
        base_layers: &BaseLayerRegistry,
    ) -> Self {
        let mut state = initial;

        state.visible_overlay_ids.retain(|id| {
            let known = overlays.contains(id);
            if !known {
                warn!("Ignoring unknown overlay '{}' in initial visibility set", id);
            }
            known
        });

        if !base_layers.contains(&state.active_base_layer_id) {
            let fallback = base_layers.first().id.clone();
            warn!(
                "Unknown initial base layer '{}', falling back to '{}'",
                state.active_base_layer_id, fallback
            );
            state.active_base_layer_id = fallback;
        }

        Self {
            state,
            overlay_ids: overlays.ids().map(str::to_string).collect(),
            base_layer_ids: base_layers
                .list_layers()
                .iter()
                .map(|layer| layer.id.clone())
                .collect(),
            panel_open: false,
        }
    }

    pub fn state(&self) -> &ViewToggleState {
        &self.state
    }

    /// Flips an overlay's visibility. Unknown ids are a logged no-op.
    ///
    /// Returns true if the state changed.
    pub fn toggle_overlay(&mut self, id: &str) -> bool {
        let visible = !self.state.is_overlay_visible(id);
        self.set_overlay_visible(id, visible)
    }

    /// Sets an overlay's visibility. Returns true if the state changed.
    pub fn set_overlay_visible(&mut self, id: &str, visible: bool) -> bool {
        if !self.overlay_ids.iter().any(|known| known == id) {
            warn!("Ignoring toggle for unknown overlay '{}'", id);
            return false;
        }

        let changed = if visible {
            self.state.visible_overlay_ids.insert(id.to_string())
        } else {
            self.state.visible_overlay_ids.remove(id)
        };
        if changed {
            debug!(overlay = id, visible, "Overlay visibility toggled");
        }
        changed
    }

    /// Selects the active base layer. Unknown ids are a logged no-op.
    ///
    /// Returns true if the state changed.
    pub fn switch_base_layer(&mut self, id: &str) -> bool {
        if !self.base_layer_ids.iter().any(|known| known == id) {
            warn!("Ignoring switch to unknown base layer '{}'", id);
            return false;
        }
        if self.state.active_base_layer_id == id {
            return false;
        }
        debug!(from = %self.state.active_base_layer_id, to = id, "Base layer switched");
        self.state.active_base_layer_id = id.to_string();
        true
    }

    /// Opens or collapses the panel. Returns the new open state.
    pub fn toggle_panel_visibility(&mut self) -> bool {
        self.panel_open = !self.panel_open;
        self.panel_open
    }

    pub fn is_panel_open(&self) -> bool {
        self.panel_open
    }

    /// Overlay ids in registry order.
    pub fn overlay_ids(&self) -> &[String] {
        &self.overlay_ids
    }

    /// Base layer ids in catalog order.
    pub fn base_layer_ids(&self) -> &[String] {
        &self.base_layer_ids
    }
}
