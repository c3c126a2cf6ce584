//! Control panel (left sidebar) and status bar rendering.

use eframe::egui;
use rfd::FileDialog;
use specim_algorithms::{BackgroundModel, OutlierConfig, ShearAxis};
use specim_io::{FileKind, RawDtype, RawOptions};

use super::theme::{accent, form_label, primary_button, section_header, ThemeColors};
use crate::app::SpecimApp;
use crate::session::Panel;
use crate::state::RangeSlider;
use crate::util::format_value;
use crate::viewer::Colormap;
use crate::BrowserMode;

/// Two sliders bounding one energy range. Returns whether either moved.
fn range_sliders(
    ui: &mut egui::Ui,
    label: &str,
    slider: &mut RangeSlider,
    bounds: (f64, f64),
    step: f64,
) -> bool {
    ui.label(form_label(label));
    let lo = ui
        .add(egui::Slider::new(&mut slider.lo, bounds.0..=bounds.1).step_by(step).text("from"))
        .changed();
    let hi = ui
        .add(egui::Slider::new(&mut slider.hi, bounds.0..=bounds.1).step_by(step).text("to"))
        .changed();
    lo || hi
}

impl SpecimApp {
    /// Render the left control panel.
    pub(crate) fn render_side_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(280.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    self.render_file_section(ui);
                    if self.session.is_none() {
                        return;
                    }
                    ui.separator();
                    self.render_view_section(ui);
                    if self.mode == BrowserMode::Fit {
                        ui.separator();
                        self.render_fit_section(ui);
                    }
                    ui.separator();
                    self.render_tools_section(ui);
                });
            });
    }

    fn render_file_section(&mut self, ui: &mut egui::Ui) {
        ui.label(
            egui::RichText::new("SPECIM")
                .size(14.0)
                .strong()
                .color(accent::BLUE),
        );
        ui.horizontal(|ui| {
            let can_load = !self.processing.is_loading;
            if ui
                .add_enabled(can_load, primary_button("Open..."))
                .clicked()
            {
                if let Some(path) = FileDialog::new()
                    .add_filter("HyperSpy", &["hspy", "h5", "hdf5"])
                    .add_filter("Raw cube", &["raw", "bin", "dat"])
                    .pick_file()
                {
                    match FileKind::from_path(&path) {
                        FileKind::Hspy => self.load_file(path, None),
                        FileKind::Raw => {
                            self.ui_state.raw.pending = Some(path);
                            self.ui_state.raw.show_dialog = true;
                        }
                    }
                }
            }
            if ui
                .add_enabled(self.session.is_some(), egui::Button::new("Save..."))
                .clicked()
            {
                self.save_cube();
            }
        });
        if let Some(path) = &self.selected_file {
            let name = path.file_name().unwrap_or_default().to_string_lossy();
            ui.label(egui::RichText::new(name).size(11.0).weak());
        }
        if let Some(session) = &self.session {
            let (rows, cols, channels) = session.dataset().cube().dim();
            let kind = if session.dataset().is_energy_map() {
                "Energy map"
            } else {
                "Spectrum image"
            };
            ui.label(
                egui::RichText::new(format!("{kind}: {rows}x{cols}x{channels}")).size(11.0),
            );
        }
    }

    fn save_cube(&mut self) {
        let Some(session) = &self.session else {
            return;
        };
        let Some(path) = FileDialog::new()
            .add_filter("HyperSpy", &["hspy"])
            .add_filter("Raw f32", &["raw"])
            .save_file()
        else {
            return;
        };
        match specim_io::save(&path, session.dataset().cube()) {
            Ok(()) => self.processing.info(format!("Saved {}", path.display())),
            Err(e) => self.processing.error(format!("Save failed: {e}")),
        }
    }

    fn render_view_section(&mut self, ui: &mut egui::Ui) {
        let Some(session) = &self.session else {
            return;
        };
        let loss = session.dataset().loss();
        let bounds = (loss.min(), loss.max());
        let step = loss.dispersion().abs();
        let mut y_locked = session.y_locked();
        let mut y_log = session.y_log();
        let mut roi2 = session.roi2_enabled();

        ui.label(section_header("View"));
        let mut view = self.ui_state.view;
        if range_sliders(ui, "Energy range", &mut view, bounds, step) {
            self.ui_state.view = view;
            self.with_session("view", |s| {
                s.set_view_window(view.window());
                Ok(())
            });
        }

        ui.horizontal(|ui| {
            if ui.checkbox(&mut y_locked, "Lock Y").changed() {
                self.with_session("lock", |s| {
                    s.set_y_locked(y_locked);
                    Ok(())
                });
            }
            if ui.checkbox(&mut y_log, "Log Y").changed() {
                self.with_session("log scale", |s| {
                    s.set_y_log(y_log);
                    Ok(())
                });
            }
        });
        if ui.checkbox(&mut roi2, "Second ROI (right drag)").changed() {
            self.with_session("ROI 2", |s| {
                s.set_roi2_enabled(roi2);
                Ok(())
            });
        }

        ui.horizontal(|ui| {
            ui.label(form_label("Colormap"));
            let before = (self.colormap, self.log_image);
            egui::ComboBox::from_id_salt("colormap")
                .selected_text(self.colormap.to_string())
                .show_ui(ui, |ui| {
                    for cmap in Colormap::ALL {
                        ui.selectable_value(&mut self.colormap, cmap, cmap.to_string());
                    }
                });
            ui.checkbox(&mut self.log_image, "Log");
            if before != (self.colormap, self.log_image) {
                self.textures_dirty = true;
            }
        });
    }

    fn render_fit_section(&mut self, ui: &mut egui::Ui) {
        let Some(session) = &self.session else {
            return;
        };
        let loss = session.dataset().loss();
        let bounds = (loss.min(), loss.max());
        let step = loss.dispersion().abs();
        let options = *session.options();
        let can_subtract = session.fit_active() && session.int_active();
        let params = [Panel::Primary, Panel::Secondary].map(|p| session.background_params(p));
        let lc_exponents = session.lc_exponents();
        let has_exponents = session.exponent_map().is_some();

        ui.label(section_header("Background"));
        let mut background = self.ui_state.background;
        if range_sliders(ui, "Fit window", &mut background, bounds, step) {
            self.ui_state.background = background;
            self.with_session("background window", |s| {
                s.set_background_window(background.window());
                Ok(())
            });
        }
        let mut integration = self.ui_state.integration;
        if range_sliders(ui, "Integration window", &mut integration, bounds, step) {
            self.ui_state.integration = integration;
            self.with_session("integration window", |s| {
                s.set_integration_window(integration.window());
                Ok(())
            });
        }

        ui.horizontal(|ui| {
            for model in BackgroundModel::ALL {
                if ui.radio(options.model == model, model.label()).clicked() {
                    self.with_session("model", |s| {
                        s.set_fit_model(model);
                        Ok(())
                    });
                }
            }
        });

        let (mut lc, mut lba, mut log) = (options.lc, options.lba, options.log);
        let mut flags_changed = false;
        ui.horizontal(|ui| {
            flags_changed |= ui
                .add_enabled(
                    options.model != BackgroundModel::Linear,
                    egui::Checkbox::new(&mut lc, "LC"),
                )
                .changed();
            flags_changed |= ui.checkbox(&mut lba, "LBA").changed();
            flags_changed |= ui.checkbox(&mut log, "Log fit").changed();
        });
        if flags_changed {
            self.with_session("fit options", |s| {
                s.set_fit_flags(lc, lba, log);
                Ok(())
            });
        }
        self.render_option_fields(ui);

        ui.horizontal(|ui| {
            if ui
                .add_enabled(can_subtract, primary_button("Fast"))
                .on_hover_text("Subtract with the ROI 1 exponent")
                .clicked()
            {
                self.with_session("fast subtraction", |s| s.fast_subtract());
            }
            if ui
                .add_enabled(can_subtract, primary_button("Full"))
                .on_hover_text("Fit every pixel")
                .clicked()
            {
                self.with_session("full subtraction", |s| s.full_subtract());
            }
            if ui.button("Clear").clicked() {
                self.with_session("clear", |s| {
                    s.clear_subtraction();
                    Ok(())
                });
            }
        });

        for (i, p) in params.iter().enumerate() {
            if let Some(p) = p {
                ui.label(format!(
                    "ROI {}: A = {}, r = {}",
                    i + 1,
                    format_value(p.amplitude),
                    format_value(p.exponent)
                ));
            }
        }
        if let Some((r1, r2)) = lc_exponents {
            ui.label(format!("LC: r1 = {r1:.3}, r2 = {r2:.3}"));
        }

        ui.horizontal(|ui| {
            if ui.button("Export map...").clicked() {
                self.export_derived(false);
            }
            if ui
                .add_enabled(has_exponents, egui::Button::new("Export r..."))
                .clicked()
            {
                self.export_derived(true);
            }
        });
    }

    fn render_option_fields(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label(form_label("LC %"));
            let lc = ui.add(egui::TextEdit::singleline(&mut self.ui_state.lc_text).desired_width(70.0));
            ui.label(form_label("LBA px"));
            let lba =
                ui.add(egui::TextEdit::singleline(&mut self.ui_state.lba_text).desired_width(40.0));

            if lc.lost_focus() {
                let text = self.ui_state.lc_text.clone();
                if self
                    .with_session("LC percentiles", |s| s.set_lc_percentiles(&text))
                    .is_none()
                {
                    if let Some(s) = &self.session {
                        let (lo, hi) = s.options().lc_percentiles;
                        self.ui_state.lc_text = format!("({lo}, {hi})");
                    }
                }
            }
            if lba.lost_focus() {
                let text = self.ui_state.lba_text.clone();
                if self
                    .with_session("LBA FWHM", |s| s.set_lba_fwhm(&text))
                    .is_none()
                {
                    if let Some(s) = &self.session {
                        self.ui_state.lba_text = format!("{}", s.options().lba_fwhm);
                    }
                }
            }
        });
    }

    fn export_derived(&mut self, exponents: bool) {
        let Some(session) = &self.session else {
            return;
        };
        let image = if exponents {
            session.exponent_map()
        } else {
            Some(session.derived_image())
        };
        let Some(image) = image else {
            return;
        };
        let Some(path) = FileDialog::new()
            .add_filter("TIFF", &["tif", "tiff"])
            .save_file()
        else {
            return;
        };
        match crate::export::write_tiff(&path, image) {
            Ok(()) => self.processing.info(format!("Exported {}", path.display())),
            Err(e) => self.processing.error(format!("Export failed: {e:#}")),
        }
    }

    fn render_tools_section(&mut self, ui: &mut egui::Ui) {
        egui::CollapsingHeader::new(section_header("Tools"))
            .default_open(false)
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.label(form_label("Spike x std"));
                    ui.add(
                        egui::DragValue::new(&mut self.ui_state.outlier_threshold)
                            .speed(0.1)
                            .range(0.5..=50.0),
                    );
                    ui.checkbox(&mut self.ui_state.outlier_neighbors, "Neighbors");
                });
                if ui.button("Remove outliers").clicked() {
                    let config = OutlierConfig::default()
                        .with_threshold(self.ui_state.outlier_threshold)
                        .with_neighbors(self.ui_state.outlier_neighbors);
                    if let Some(report) =
                        self.with_session("outliers", |s| s.remove_outliers(&config))
                    {
                        self.processing.info(format!(
                            "Replaced {} channels in {} spectra",
                            report.channels_replaced, report.spectra_cleaned
                        ));
                    }
                }

                ui.separator();
                ui.horizontal(|ui| {
                    ui.label(form_label("Shear deg"));
                    ui.add(
                        egui::DragValue::new(&mut self.ui_state.shear_angle)
                            .speed(0.1)
                            .range(-60.0..=60.0),
                    );
                    ui.radio_value(&mut self.ui_state.shear_axis, ShearAxis::X, "x");
                    ui.radio_value(&mut self.ui_state.shear_axis, ShearAxis::Y, "y");
                });
                if ui.button("Apply shear").clicked() {
                    let (angle, axis) = (self.ui_state.shear_angle, self.ui_state.shear_axis);
                    self.with_session("shear", |s| s.shear(angle, axis));
                }

                ui.separator();
                if ui.button("PCA...").clicked() {
                    self.ui_state.show_pca = true;
                }
            });
    }

    /// Render the bottom status bar.
    pub(crate) fn render_status_bar(&mut self, ctx: &egui::Context) {
        let colors = ThemeColors::from_ctx(ctx);
        egui::TopBottomPanel::bottom("status_bar")
            .frame(
                egui::Frame::none()
                    .fill(colors.bg_header)
                    .inner_margin(egui::Margin::symmetric(12.0, 4.0)),
            )
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    let color = if self.processing.is_error {
                        accent::RED
                    } else {
                        colors.text_muted
                    };
                    if self.processing.is_loading {
                        ui.add(
                            egui::ProgressBar::new(self.processing.progress)
                                .desired_width(120.0),
                        );
                    }
                    ui.label(
                        egui::RichText::new(&self.processing.status_text)
                            .size(11.0)
                            .color(color),
                    );
                    if let Some(err) = self.session.as_ref().and_then(|s| s.last_error()) {
                        ui.label(
                            egui::RichText::new(format!("last fit: {err}"))
                                .size(11.0)
                                .color(colors.text_primary),
                        );
                    }
                });
            });
    }

    /// Ask for the shape and calibration of a raw file before loading it.
    pub(crate) fn render_raw_dialog(&mut self, ctx: &egui::Context) {
        if !self.ui_state.raw.show_dialog {
            return;
        }
        let mut open = true;
        let mut submit = false;
        egui::Window::new("Raw cube")
            .open(&mut open)
            .collapsible(false)
            .show(ctx, |ui| {
                let raw = &mut self.ui_state.raw;
                ui.horizontal(|ui| {
                    ui.label(form_label("Shape RxCxE"));
                    ui.text_edit_singleline(&mut raw.shape_text);
                });
                ui.checkbox(&mut raw.f64_samples, "64-bit samples");
                ui.horizontal(|ui| {
                    ui.label(form_label("Offset"));
                    ui.add(egui::DragValue::new(&mut raw.energy_offset).speed(0.1));
                    ui.label(form_label("Dispersion"));
                    ui.add(egui::DragValue::new(&mut raw.dispersion).speed(0.01));
                });
                submit = ui.add(primary_button("Load")).clicked();
            });
        if submit {
            match self.raw_options() {
                Some(options) => {
                    self.ui_state.raw.show_dialog = false;
                    if let Some(path) = self.ui_state.raw.pending.take() {
                        self.load_file(path, Some(options));
                    }
                }
                None => self
                    .processing
                    .error("Shape must look like 64x64x1024 with a nonzero dispersion"),
            }
        }
        if !open {
            self.ui_state.raw.show_dialog = false;
            self.ui_state.raw.pending = None;
        }
    }

    fn raw_options(&self) -> Option<RawOptions> {
        let raw = &self.ui_state.raw;
        let dims: Vec<usize> = raw
            .shape_text
            .split(['x', 'X', ','])
            .map(|p| p.trim().parse().ok())
            .collect::<Option<_>>()?;
        let [rows, cols, channels] = dims.as_slice() else {
            return None;
        };
        if raw.dispersion == 0.0 || !raw.dispersion.is_finite() {
            return None;
        }
        let dtype = if raw.f64_samples {
            RawDtype::F64
        } else {
            RawDtype::F32
        };
        Some(
            RawOptions::new((*rows, *cols, *channels))
                .with_dtype(dtype)
                .with_calibration(raw.energy_offset, raw.dispersion),
        )
    }
}
