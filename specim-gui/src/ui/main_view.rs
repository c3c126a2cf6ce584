//! Main view (central panel): selection image and integrated map.

use eframe::egui::{self, PointerButton};
use egui_plot::{Line, Plot, PlotImage, PlotPoint, PlotPoints, PlotResponse};
use specim_core::Roi;

use crate::app::SpecimApp;
use crate::session::{Dataset, Panel};
use crate::state::RoiDrag;
use crate::util::f64_to_f32;
use crate::viewer::roi::{draw_rect, draw_rect_draft, ROI_COLORS};

/// Centre and size of an image spanning `[x0, x1, y0, y1]`.
fn placement(extent: [f64; 4]) -> (PlotPoint, egui::Vec2) {
    let [x0, x1, y0, y1] = extent;
    let width = (x1 - x0).abs().max(1.0);
    let height = (y1 - y0).abs().max(1.0);
    (
        PlotPoint::new((x0 + x1) / 2.0, (y0 + y1) / 2.0),
        egui::vec2(f64_to_f32(width), f64_to_f32(height)),
    )
}

/// Update a rectangle drag from the plot response; returns a finished ROI.
fn track_roi_drag(
    drag: &mut Option<RoiDrag>,
    response: &egui::Response,
    pointer: Option<PlotPoint>,
) -> Option<(bool, Roi)> {
    for (button, secondary) in [(PointerButton::Primary, false), (PointerButton::Secondary, true)] {
        if response.drag_started_by(button) {
            if let Some(p) = pointer {
                *drag = Some(RoiDrag {
                    secondary,
                    start: [p.x, p.y],
                    current: [p.x, p.y],
                });
            }
        }
    }
    if let (Some(d), Some(p)) = (drag.as_mut(), pointer) {
        d.current = [p.x, p.y];
    }
    for (button, secondary) in [(PointerButton::Primary, false), (PointerButton::Secondary, true)] {
        if response.drag_stopped_by(button) && drag.is_some_and(|d| d.secondary == secondary) {
            return drag.take().map(|d| (secondary, d.roi()));
        }
    }
    None
}

impl SpecimApp {
    /// Render the central panel with the selection image.
    pub(crate) fn render_central_panel(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            if self.session.is_none() {
                ui.centered_and_justified(|ui| ui.label("No data: open a file"));
                return;
            }
            let height = ui.available_height();
            self.render_image_plot(ui, height * 0.6);
            ui.separator();
            self.render_derived_plot(ui);
        });
    }

    fn render_image_plot(&mut self, ui: &mut egui::Ui, height: f32) {
        let (Some(session), Some(texture)) = (&self.session, &self.image_texture) else {
            return;
        };
        let dataset = session.dataset();
        let (center, size) = placement(dataset.image_extent());
        let (x_label, y_label) = dataset.image_labels();
        let rois = [session.roi(Panel::Primary), session.roi(Panel::Secondary)];
        let roi2_enabled = session.roi2_enabled();
        let texture_id = texture.id();
        let draft = self.ui_state.roi_drag;

        let PlotResponse {
            inner: pointer,
            response,
            ..
        } = Plot::new("image")
            .height(height)
            .x_axis_label(x_label)
            .y_axis_label(y_label)
            .allow_drag(false)
            .allow_zoom(false)
            .allow_scroll(false)
            .allow_boxed_zoom(false)
            .show(ui, |plot_ui| {
                plot_ui.image(PlotImage::new(texture_id, center, size));
                for (i, roi) in rois.iter().enumerate() {
                    if let Some(roi) = roi {
                        draw_rect(plot_ui, roi, ROI_COLORS[i], &format!("ROI {}", i + 1));
                    }
                }
                if let Some(d) = draft {
                    draw_rect_draft(plot_ui, &d.roi(), ROI_COLORS[usize::from(d.secondary)]);
                }
                plot_ui.pointer_coordinate()
            });

        if let Some((secondary, roi)) =
            track_roi_drag(&mut self.ui_state.roi_drag, &response, pointer)
        {
            if secondary && !roi2_enabled {
                return;
            }
            let panel = if secondary {
                Panel::Secondary
            } else {
                Panel::Primary
            };
            self.with_session("ROI", |s| s.select_roi(panel, roi));
        }
    }

    fn render_derived_plot(&mut self, ui: &mut egui::Ui) {
        let Some(session) = &self.session else {
            return;
        };
        let derived = session.derived_image();
        let plot = Plot::new("derived")
            .allow_drag(false)
            .allow_scroll(false)
            .y_axis_label("Integrated");
        match session.dataset() {
            Dataset::EnergyMap(map) => {
                let points: Vec<[f64; 2]> = map
                    .incident()
                    .values()
                    .iter()
                    .zip(derived.iter())
                    .map(|(&x, &y)| [x, y])
                    .collect();
                plot.x_axis_label("Incident energy (eV)").show(ui, |plot_ui| {
                    plot_ui.line(Line::new(PlotPoints::new(points)).name("Integrated"));
                });
            }
            Dataset::SpectrumImage(_) => {
                let Some(texture) = &self.derived_texture else {
                    return;
                };
                let (center, size) = placement(session.dataset().image_extent());
                let texture_id = texture.id();
                plot.data_aspect(1.0).show(ui, |plot_ui| {
                    plot_ui.image(PlotImage::new(texture_id, center, size));
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placement_of_degenerate_extent() {
        let (center, size) = placement([500.0, 500.0, 100.0, 200.0]);
        assert_eq!((center.x, center.y), (500.0, 150.0));
        assert_eq!(size, egui::vec2(1.0, 100.0));
    }
}
