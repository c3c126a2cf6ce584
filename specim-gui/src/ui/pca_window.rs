//! PCA window: scree plot and low-rank filtering.

use eframe::egui;
use egui_plot::{Bar, BarChart, Plot};

use super::theme::{accent, form_label, primary_button};
use crate::app::SpecimApp;
use crate::util::usize_to_f64;

impl SpecimApp {
    /// Render the PCA window (if visible).
    pub(crate) fn render_pca_window(&mut self, ctx: &egui::Context) {
        if !self.ui_state.show_pca || self.session.is_none() {
            return;
        }
        let mut open = true;
        egui::Window::new("PCA")
            .open(&mut open)
            .default_width(420.0)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(form_label("Components"));
                    ui.add(egui::DragValue::new(&mut self.ui_state.scree_max).range(1..=500));
                    if ui.button("Scree").clicked() {
                        let max = self.ui_state.scree_max;
                        self.ui_state.scree = self.with_session("PCA scree", |s| s.pca_scree(max));
                    }
                });

                if let Some(scree) = &self.ui_state.scree {
                    let bars: Vec<Bar> = scree
                        .iter()
                        .enumerate()
                        .map(|(i, &ratio)| {
                            Bar::new(usize_to_f64(i + 1), ratio.max(1e-12).log10())
                                .width(0.8)
                                .fill(accent::BLUE)
                        })
                        .collect();
                    Plot::new("scree")
                        .height(200.0)
                        .x_axis_label("Component")
                        .y_axis_label("log10(explained variance ratio)")
                        .show(ui, |plot_ui| plot_ui.bar_chart(BarChart::new(bars)));
                } else {
                    ui.label("Compute the scree plot to choose a component count.");
                }

                ui.separator();
                ui.horizontal(|ui| {
                    ui.label(form_label("Keep"));
                    ui.add(egui::DragValue::new(&mut self.ui_state.pca_components).range(1..=500));
                    if ui.add(primary_button("Filter")).clicked() {
                        let n = self.ui_state.pca_components;
                        if self.with_session("PCA filter", |s| s.pca_filter(n)).is_some() {
                            self.ui_state.scree = None;
                            self.processing.info(format!("PCA filter kept {n} components"));
                        }
                    }
                });
            });
        if !open {
            self.ui_state.show_pca = false;
        }
    }
}
