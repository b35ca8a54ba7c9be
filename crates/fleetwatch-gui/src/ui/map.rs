//! Map panel: tiles, geofence overlays and vehicle markers.

use crate::backend::WalkersBackend;
use eframe::egui;
use fleetwatch_core::classifier::MarkerTooltip;
use fleetwatch_core::config::MarkerPalette;
use fleetwatch_core::overlay::{FeatureGeometry, GeofenceOverlay, OverlayKind};
use fleetwatch_core::session::MarkerSpec;
use fleetwatch_core::types::{Color, GeoPoint};
use walkers::{Map, MapMemory, Plugin, Projector};

/// Converts a palette color to egui, scaling alpha by `opacity`.
pub fn to_color32(color: Color, opacity: f32) -> egui::Color32 {
    let color = color.with_opacity(opacity);
    egui::Color32::from_rgba_unmultiplied(color.r, color.g, color.b, color.a)
}

fn project(projector: &Projector, point: GeoPoint) -> egui::Pos2 {
    let v = projector.project(walkers::lat_lon(point.latitude, point.longitude));
    egui::pos2(v.x, v.y)
}

/// Draws overlays and markers, then the hover tooltip.
struct FleetLayers<'a> {
    overlays: Vec<&'a GeofenceOverlay>,
    markers: Vec<&'a MarkerSpec>,
    palette: &'a MarkerPalette,
    map_rect: egui::Rect,
}

enum Hover<'a> {
    Marker(&'a MarkerTooltip),
    Feature(&'a str),
}

impl<'a> Plugin for FleetLayers<'a> {
    fn run(
        self: Box<Self>,
        ui: &mut egui::Ui,
        response: &egui::Response,
        projector: &Projector,
        _memory: &MapMemory,
    ) {
        let painter = ui.painter().with_clip_rect(self.map_rect);
        let hover_pos = response.hover_pos();
        let mut hover = None;

        for overlay in &self.overlays {
            for feature in &overlay.features {
                let mut hit = false;
                for part in &feature.parts {
                    hit |= draw_geometry(&painter, projector, overlay, part, hover_pos);
                }
                if hit {
                    if let Some(label) = feature.label.as_deref() {
                        hover = Some(Hover::Feature(label));
                    }
                }
            }
        }

        // Normal markers come first, so later hits are the alerts drawn on top
        let visible = self.map_rect.expand(16.0);
        for marker in &self.markers {
            let pos = project(projector, marker.position);
            if !visible.contains(pos) {
                continue;
            }
            draw_marker(&painter, pos, marker);

            if let (Some(pointer), Some(tooltip)) = (hover_pos, marker.tooltip.as_ref()) {
                if pointer.distance(pos) <= marker.style.radius + 3.0 {
                    hover = Some(Hover::Marker(tooltip));
                }
            }
        }

        if let (Some(pointer), Some(hover)) = (hover_pos, hover) {
            draw_tooltip(ui, &painter, pointer, &hover, self.palette);
        }
    }
}

/// Draws one geometry part. Returns true if the pointer is over it.
fn draw_geometry(
    painter: &egui::Painter,
    projector: &Projector,
    overlay: &GeofenceOverlay,
    part: &FeatureGeometry,
    pointer: Option<egui::Pos2>,
) -> bool {
    let style = &overlay.style;
    let stroke = egui::Stroke::new(style.weight, to_color32(style.color, style.opacity));

    match part {
        FeatureGeometry::Polygon(rings) => {
            let mut hit = false;
            for (i, ring) in rings.iter().enumerate() {
                let points: Vec<egui::Pos2> =
                    ring.iter().map(|p| project(projector, *p)).collect();
                if points.len() < 3 {
                    continue;
                }
                // Only the outer ring is filled and hit-tested
                let fill = match (i, style.fill_opacity) {
                    (0, Some(opacity)) => to_color32(style.color, opacity),
                    _ => egui::Color32::TRANSPARENT,
                };
                if i == 0 {
                    hit = pointer.is_some_and(|p| point_in_ring(p, &points));
                }
                painter.add(egui::Shape::Path(egui::epaint::PathShape {
                    points,
                    closed: true,
                    fill,
                    stroke: stroke.into(),
                }));
            }
            hit
        }
        FeatureGeometry::Line(line) => {
            let points: Vec<egui::Pos2> = line.iter().map(|p| project(projector, *p)).collect();
            if points.len() < 2 {
                return false;
            }
            match (&style.dash, overlay.kind) {
                (Some(dash), OverlayKind::Line) if dash.len() >= 2 => {
                    painter.extend(egui::Shape::dashed_line(&points, stroke, dash[0], dash[1]));
                }
                _ => {
                    painter.add(egui::Shape::line(points.clone(), stroke));
                }
            }
            pointer.is_some_and(|p| {
                points
                    .windows(2)
                    .any(|seg| distance_to_segment(p, seg[0], seg[1]) <= style.weight + 3.0)
            })
        }
    }
}

fn draw_marker(painter: &egui::Painter, pos: egui::Pos2, marker: &MarkerSpec) {
    let style = &marker.style;
    if let Some(halo) = style.halo {
        painter.circle_filled(pos, style.radius * 1.8, to_color32(halo, 1.0));
    }
    painter.circle_filled(pos, style.radius, to_color32(style.fill, style.opacity));
    painter.circle_stroke(
        pos,
        style.radius,
        egui::Stroke::new(style.border_width, to_color32(style.border, 1.0)),
    );
}

fn draw_tooltip(
    ui: &egui::Ui,
    painter: &egui::Painter,
    pointer: egui::Pos2,
    hover: &Hover<'_>,
    palette: &MarkerPalette,
) {
    let font = egui::FontId::proportional(12.0);
    let text_color = ui.visuals().strong_text_color();

    let mut job = egui::text::LayoutJob::default();
    let append = |job: &mut egui::text::LayoutJob, text: &str, color: egui::Color32| {
        job.append(
            text,
            0.0,
            egui::TextFormat::simple(font.clone(), color),
        );
    };

    match hover {
        Hover::Feature(label) => append(&mut job, label, text_color),
        Hover::Marker(tooltip) => {
            append(&mut job, &tooltip.vehicle_id, text_color);
            append(&mut job, &format!("\n{}", tooltip.time), egui::Color32::GRAY);
            for tag in &tooltip.tags {
                append(&mut job, "\n", text_color);
                append(&mut job, tag.label(), to_color32(tag.color(palette), 1.0));
            }
        }
    }

    let galley = painter.layout_job(job);
    let origin = pointer + egui::vec2(14.0, 14.0);
    let rect = egui::Rect::from_min_size(origin, galley.size()).expand(6.0);
    painter.rect_filled(rect, egui::CornerRadius::same(4), ui.visuals().extreme_bg_color);
    painter.galley(origin, galley, text_color);
}

/// Even-odd point in polygon test in screen space.
fn point_in_ring(p: egui::Pos2, ring: &[egui::Pos2]) -> bool {
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (a, b) = (ring[i], ring[j]);
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

fn distance_to_segment(p: egui::Pos2, a: egui::Pos2, b: egui::Pos2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_sq();
    if len_sq <= f32::EPSILON {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

/// Shows the map, or a placeholder while no session is live.
pub fn show(ui: &mut egui::Ui, backend: &mut WalkersBackend, palette: &MarkerPalette) {
    let map_rect = ui.available_rect_before_wrap();

    let Some(parts) = backend.frame_parts(map_rect.size()) else {
        ui.vertical_centered(|ui| {
            ui.add_space(50.0);
            ui.label(
                egui::RichText::new("Map not ready")
                    .size(16.0)
                    .color(egui::Color32::GRAY),
            );
        });
        return;
    };

    let layers = FleetLayers {
        overlays: parts.overlays,
        markers: parts.markers,
        palette,
        map_rect,
    };
    let attribution = parts.attribution.to_string();
    ui.add(Map::new(Some(parts.tiles), parts.memory, parts.home).with_plugin(layers));

    if !attribution.is_empty() {
        ui.painter().text(
            map_rect.max - egui::vec2(5.0, 5.0),
            egui::Align2::RIGHT_BOTTOM,
            attribution,
            egui::FontId::proportional(10.0),
            egui::Color32::from_white_alpha(150),
        );
    }
}
