//! Layer control panel widget.

use eframe::egui;
use fleetwatch_core::base_layer::BaseLayerRegistry;
use fleetwatch_core::overlay::OverlayRegistry;
use fleetwatch_core::toggle::LayerControlPanel;

/// Shows the collapsible layer control. Returns true if the toggle state
/// changed and the map needs reconciling.
pub fn show(
    ui: &mut egui::Ui,
    panel: &mut LayerControlPanel,
    overlays: &OverlayRegistry,
    base_layers: &BaseLayerRegistry,
) -> bool {
    let arrow = if panel.is_panel_open() { "⏷" } else { "⏵" };
    if ui.button(format!("{arrow} Layers")).clicked() {
        panel.toggle_panel_visibility();
    }
    if !panel.is_panel_open() {
        return false;
    }

    let mut changed = false;

    ui.add_space(6.0);
    ui.label(egui::RichText::new("Base map").strong());
    for base in base_layers.list_layers() {
        let selected = panel.state().active_base_layer_id == base.id;
        if ui.radio(selected, base.label.as_str()).clicked() && !selected {
            changed |= panel.switch_base_layer(&base.id);
        }
    }

    ui.add_space(6.0);
    ui.label(egui::RichText::new("Geofences").strong());
    for overlay in overlays.iter() {
        let mut visible = panel.state().is_overlay_visible(&overlay.id);
        if ui.checkbox(&mut visible, overlay.name.as_str()).changed() {
            changed |= panel.set_overlay_visible(&overlay.id, visible);
        }
    }
    if overlays.is_empty() {
        ui.colored_label(egui::Color32::GRAY, "No overlays loaded");
    }

    changed
}
