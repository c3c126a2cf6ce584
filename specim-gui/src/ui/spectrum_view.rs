//! Spectrum panels: ROI spectra, fitted backgrounds and window selection.

use eframe::egui::{self, PointerButton};
use egui_plot::{Legend, Line, Plot, PlotBounds, PlotPoint, PlotPoints, PlotResponse};
use specim_core::EnergyWindow;

use super::theme::accent;
use crate::app::SpecimApp;
use crate::session::{BrowserSession, Panel};
use crate::state::{RangeSlider, SpanDrag};
use crate::viewer::roi::{draw_span, BACKGROUND_COLOR, INTEGRATION_COLOR, ROI_COLORS};
use crate::BrowserMode;

/// Smallest value shown on a log axis.
const LOG_FLOOR: f64 = 1e-12;

/// Map a value to plot space.
fn to_plot(value: f64, log: bool) -> f64 {
    if log {
        value.max(LOG_FLOOR).log10()
    } else {
        value
    }
}

fn series(energies: &[f64], values: impl IntoIterator<Item = f64>, log: bool) -> PlotPoints {
    PlotPoints::new(
        energies
            .iter()
            .zip(values)
            .map(|(&e, v)| [e, to_plot(v, log)])
            .collect(),
    )
}

/// Everything one panel draws, copied out of the session.
struct PanelView {
    panel: Panel,
    energies: Vec<f64>,
    spectrum: Vec<f64>,
    background: Option<Vec<f64>>,
    fit: Option<(Vec<f64>, Vec<f64>)>,
    x_limits: (f64, f64),
    y_limits: (f64, f64),
}

impl PanelView {
    fn new(session: &BrowserSession, panel: Panel) -> Self {
        Self {
            panel,
            energies: session.dataset().loss().values().to_vec(),
            spectrum: session.spectrum(panel).to_vec(),
            background: session.background(panel).map(|b| b.to_vec()),
            fit: session.subtracted_spectrum(panel),
            x_limits: session.x_limits(panel),
            y_limits: session.y_limits(panel),
        }
    }
}

/// Update a span drag from the plot response; returns a finished window
/// and whether it targets integration.
fn track_span_drag(
    drag: &mut Option<SpanDrag>,
    response: &egui::Response,
    pointer: Option<PlotPoint>,
) -> Option<(bool, EnergyWindow)> {
    for (button, integration) in [(PointerButton::Primary, false), (PointerButton::Secondary, true)] {
        if response.drag_started_by(button) {
            if let Some(p) = pointer {
                *drag = Some(SpanDrag {
                    integration,
                    start: p.x,
                    current: p.x,
                });
            }
        }
    }
    if let (Some(d), Some(p)) = (drag.as_mut(), pointer) {
        d.current = p.x;
    }
    for (button, integration) in [(PointerButton::Primary, false), (PointerButton::Secondary, true)] {
        if response.drag_stopped_by(button) && drag.is_some_and(|d| d.integration == integration)
        {
            return drag.take().map(|d| (integration, d.window()));
        }
    }
    None
}

impl SpecimApp {
    /// Render the right-hand panel with one plot per active ROI.
    pub(crate) fn render_spectrum_panel(&mut self, ctx: &egui::Context) {
        let Some(session) = &self.session else {
            return;
        };
        let mut views = vec![PanelView::new(session, Panel::Primary)];
        if session.roi2_enabled() {
            views.push(PanelView::new(session, Panel::Secondary));
        }
        let loss = session.dataset().loss();
        let windows = (
            session.edge().background_or_full(loss),
            session.edge().integration_or_full(loss),
        );
        let flags = (session.fit_active(), session.int_active(), session.y_log());

        egui::SidePanel::right("spectra")
            .resizable(true)
            .default_width(560.0)
            .show(ctx, |ui| {
                let rows = if views.len() > 1 { 2.0 } else { 1.0 };
                let height = ui.available_height() / rows - 8.0;
                for view in &views {
                    self.render_spectrum_plot(ui, view, windows, flags, height);
                }
            });
    }

    fn render_spectrum_plot(
        &mut self,
        ui: &mut egui::Ui,
        view: &PanelView,
        (bg_window, int_window): (EnergyWindow, EnergyWindow),
        (fit_active, int_active, log): (bool, bool, bool),
        height: f32,
    ) {
        let fitting = self.mode == BrowserMode::Fit;
        let index = usize::from(view.panel == Panel::Secondary);
        let draft = self.ui_state.span_drag.filter(|_| fitting);
        let y_range = (to_plot(view.y_limits.0, log), to_plot(view.y_limits.1, log));

        let PlotResponse {
            inner: pointer,
            response,
            ..
        } = Plot::new(("spectrum", index))
            .height(height)
            .legend(Legend::default())
            .x_axis_label("Energy loss (eV)")
            .y_axis_label(if log { "log10(intensity)" } else { "Intensity" })
            .allow_drag(false)
            .allow_zoom(false)
            .allow_scroll(false)
            .allow_boxed_zoom(false)
            .show(ui, |plot_ui| {
                plot_ui.set_plot_bounds(PlotBounds::from_min_max(
                    [view.x_limits.0, y_range.0],
                    [view.x_limits.1, y_range.1],
                ));
                if fitting && fit_active {
                    draw_span(plot_ui, bg_window, y_range, BACKGROUND_COLOR);
                }
                if fitting && int_active {
                    draw_span(plot_ui, int_window, y_range, INTEGRATION_COLOR);
                }
                if let Some(d) = draft {
                    let color = if d.integration {
                        INTEGRATION_COLOR
                    } else {
                        BACKGROUND_COLOR
                    };
                    draw_span(plot_ui, d.window(), y_range, color);
                }

                plot_ui.line(
                    Line::new(series(&view.energies, view.spectrum.iter().copied(), log))
                        .color(ROI_COLORS[index])
                        .name(format!("ROI {}", index + 1)),
                );
                if fitting && fit_active {
                    if let Some(background) = &view.background {
                        let start = view.energies.partition_point(|&e| e < bg_window.start);
                        plot_ui.line(
                            Line::new(series(
                                &view.energies[start..],
                                background[start..].iter().copied(),
                                log,
                            ))
                            .color(accent::RED)
                            .style(egui_plot::LineStyle::dashed_loose())
                            .name("Background"),
                        );
                    }
                    if let Some((energies, values)) = &view.fit {
                        plot_ui.line(
                            Line::new(series(energies, values.iter().copied(), log))
                                .color(accent::GREEN)
                                .name("Subtracted"),
                        );
                    }
                }
                plot_ui.pointer_coordinate()
            });

        if !fitting {
            return;
        }
        if let Some((integration, window)) =
            track_span_drag(&mut self.ui_state.span_drag, &response, pointer)
        {
            if integration {
                self.ui_state.integration = RangeSlider::from_window(window);
                self.with_session("integration window", |s| {
                    s.set_integration_window(window);
                    Ok(())
                });
            } else {
                self.ui_state.background = RangeSlider::from_window(window);
                self.with_session("background window", |s| {
                    s.set_background_window(window);
                    Ok(())
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_log_mapping_floors_non_positive_values() {
        assert_relative_eq!(to_plot(100.0, true), 2.0, epsilon = 1e-12);
        assert_relative_eq!(to_plot(-1.0, true), -12.0, epsilon = 1e-9);
        assert_eq!(to_plot(-1.0, false), -1.0);
    }
}
