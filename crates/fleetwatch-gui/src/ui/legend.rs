//! Alert/normal counters shown next to the map.

use crate::ui::map::to_color32;
use eframe::egui;
use fleetwatch_core::config::MarkerPalette;
use fleetwatch_core::legend::LegendCounts;

/// Shows the legend with one card per category.
pub fn show(ui: &mut egui::Ui, counts: &LegendCounts, palette: &MarkerPalette) {
    ui.horizontal(|ui| {
        counter_card(
            ui,
            "Alerts",
            counts.alerts,
            to_color32(palette.alert.fill, 1.0),
        );
        counter_card(
            ui,
            "Normal",
            counts.normal,
            to_color32(palette.normal.fill, 1.0),
        );
    });

    if counts.alerts > 0 {
        ui.horizontal(|ui| {
            swatch(ui, to_color32(palette.barrier_color, 1.0));
            ui.label(format!("Barrier {}", counts.barrier));
            swatch(ui, to_color32(palette.polygon_color, 1.0));
            ui.label(format!("Polygon {}", counts.polygon));
            ui.label(
                egui::RichText::new(format!("{:.0}% alerts", counts.alert_ratio() * 100.0))
                    .small()
                    .color(egui::Color32::GRAY),
            );
        });
    }
}

fn counter_card(ui: &mut egui::Ui, title: &str, value: usize, color: egui::Color32) {
    egui::Frame::new()
        .fill(egui::Color32::from_gray(40))
        .corner_radius(egui::CornerRadius::same(5))
        .inner_margin(10.0)
        .show(ui, |ui| {
            ui.vertical(|ui| {
                ui.label(egui::RichText::new(title).size(12.0).color(egui::Color32::GRAY));
                ui.label(
                    egui::RichText::new(value.to_string())
                        .size(22.0)
                        .strong()
                        .color(color),
                );
            });
        });
}

fn swatch(ui: &mut egui::Ui, color: egui::Color32) {
    let (rect, _) = ui.allocate_exact_size(egui::vec2(10.0, 10.0), egui::Sense::hover());
    ui.painter().circle_filled(rect.center(), 5.0, color);
}
