//! ROI and energy-span rendering helpers.

use eframe::egui::{Align2, Color32, Stroke};
use egui_plot::{Line, PlotPoint, PlotPoints, PlotUi, Polygon, Text};
use specim_core::{EnergyWindow, Roi};

/// Outline colors for ROI 1 and ROI 2.
pub const ROI_COLORS: [Color32; 2] = [
    Color32::from_rgb(0xef, 0x44, 0x44),
    Color32::from_rgb(0x4a, 0x9e, 0xff),
];

/// Shading for the background window.
pub const BACKGROUND_COLOR: Color32 = Color32::from_rgb(0xf5, 0x9e, 0x0b);
/// Shading for the integration window.
pub const INTEGRATION_COLOR: Color32 = Color32::from_rgb(0x10, 0xb9, 0x81);

fn fill_color(color: Color32) -> Color32 {
    Color32::from_rgba_unmultiplied(color.r(), color.g(), color.b(), 40)
}

fn rect_points(roi: &Roi) -> Vec<[f64; 2]> {
    vec![
        [roi.x0, roi.y0],
        [roi.x1, roi.y0],
        [roi.x1, roi.y1],
        [roi.x0, roi.y1],
    ]
}

/// Draw a labelled rectangle.
pub fn draw_rect(plot_ui: &mut PlotUi, roi: &Roi, color: Color32, label: &str) {
    plot_ui.polygon(
        Polygon::new(rect_points(roi))
            .stroke(Stroke::new(1.5, color))
            .fill_color(fill_color(color)),
    );
    plot_ui.text(
        Text::new(PlotPoint::new(roi.x0, roi.y1), label)
            .color(color)
            .anchor(Align2::LEFT_TOP),
    );
}

/// Draw a rectangle still being dragged.
pub fn draw_rect_draft(plot_ui: &mut PlotUi, roi: &Roi, color: Color32) {
    let mut points = rect_points(roi);
    points.push([roi.x0, roi.y0]);
    plot_ui.line(Line::new(PlotPoints::new(points)).color(color).width(1.0));
}

/// Shade an energy window across the vertical range `y`.
pub fn draw_span(plot_ui: &mut PlotUi, window: EnergyWindow, y: (f64, f64), color: Color32) {
    let roi = Roi::new(window.start, window.end, y.0, y.1);
    plot_ui.polygon(
        Polygon::new(rect_points(&roi))
            .stroke(Stroke::new(1.0, color))
            .fill_color(fill_color(color)),
    );
}
