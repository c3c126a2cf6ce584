//! Application theme and color definitions.
//!
//! Provides light and dark themes with monospace fonts, following system preference.

use eframe::egui::{self, Color32, FontFamily, FontId, Rounding, Stroke, TextStyle, Visuals};

/// Color palette for the dark theme.
pub mod dark {
    use eframe::egui::Color32;

    pub const BG_DARK: Color32 = Color32::from_rgb(0x1a, 0x1a, 0x1a);
    pub const BG_PANEL: Color32 = Color32::from_rgb(0x1f, 0x1f, 0x1f);
    pub const BG_HEADER: Color32 = Color32::from_rgb(0x25, 0x25, 0x25);
    pub const BG_INPUT: Color32 = Color32::from_rgb(0x2a, 0x2a, 0x2a);

    pub const BORDER: Color32 = Color32::from_rgb(0x33, 0x33, 0x33);
    pub const BORDER_LIGHT: Color32 = Color32::from_rgb(0x44, 0x44, 0x44);

    pub const TEXT_PRIMARY: Color32 = Color32::from_rgb(0xe0, 0xe0, 0xe0);
    pub const TEXT_MUTED: Color32 = Color32::from_rgb(0x88, 0x88, 0x88);

    pub const BUTTON_HOVER: Color32 = Color32::from_rgb(0x3a, 0x3a, 0x3a);
}

/// Color palette for the light theme.
pub mod light {
    use eframe::egui::Color32;

    pub const BG_DARK: Color32 = Color32::from_rgb(0xf5, 0xf5, 0xf5);
    pub const BG_PANEL: Color32 = Color32::from_rgb(0xff, 0xff, 0xff);
    pub const BG_HEADER: Color32 = Color32::from_rgb(0xfa, 0xfa, 0xfa);
    pub const BG_INPUT: Color32 = Color32::from_rgb(0xf0, 0xf0, 0xf0);

    pub const BORDER: Color32 = Color32::from_rgb(0xd0, 0xd0, 0xd0);
    pub const BORDER_LIGHT: Color32 = Color32::from_rgb(0xc0, 0xc0, 0xc0);

    pub const TEXT_PRIMARY: Color32 = Color32::from_rgb(0x1a, 0x1a, 0x1a);
    pub const TEXT_MUTED: Color32 = Color32::from_rgb(0x66, 0x66, 0x66);

    pub const BUTTON_HOVER: Color32 = Color32::from_rgb(0xdd, 0xdd, 0xdd);
}

/// Shared accent colors (same for both themes).
pub mod accent {
    use eframe::egui::Color32;

    pub const BLUE: Color32 = Color32::from_rgb(0x4a, 0x9e, 0xff);
    pub const GREEN: Color32 = Color32::from_rgb(0x10, 0xb9, 0x81);
    pub const RED: Color32 = Color32::from_rgb(0xef, 0x44, 0x44);
}

/// Theme-aware colors used by the panels.
#[derive(Clone, Copy)]
pub struct ThemeColors {
    pub bg_header: Color32,
    pub text_primary: Color32,
    pub text_muted: Color32,
}

impl ThemeColors {
    /// Get colors for the current theme from context.
    pub fn from_ctx(ctx: &egui::Context) -> Self {
        if ctx.style().visuals.dark_mode {
            Self {
                bg_header: dark::BG_HEADER,
                text_primary: dark::TEXT_PRIMARY,
                text_muted: dark::TEXT_MUTED,
            }
        } else {
            Self {
                bg_header: light::BG_HEADER,
                text_primary: light::TEXT_PRIMARY,
                text_muted: light::TEXT_MUTED,
            }
        }
    }
}

struct Palette {
    bg_dark: Color32,
    bg_panel: Color32,
    bg_input: Color32,
    border: Color32,
    border_light: Color32,
    text_primary: Color32,
    text_muted: Color32,
    button_hover: Color32,
}

const DARK: Palette = Palette {
    bg_dark: dark::BG_DARK,
    bg_panel: dark::BG_PANEL,
    bg_input: dark::BG_INPUT,
    border: dark::BORDER,
    border_light: dark::BORDER_LIGHT,
    text_primary: dark::TEXT_PRIMARY,
    text_muted: dark::TEXT_MUTED,
    button_hover: dark::BUTTON_HOVER,
};

const LIGHT: Palette = Palette {
    bg_dark: light::BG_DARK,
    bg_panel: light::BG_PANEL,
    bg_input: light::BG_INPUT,
    border: light::BORDER,
    border_light: light::BORDER_LIGHT,
    text_primary: light::TEXT_PRIMARY,
    text_muted: light::TEXT_MUTED,
    button_hover: light::BUTTON_HOVER,
};

/// Configure style based on current visuals (dark/light mode).
pub fn configure_style(ctx: &egui::Context) {
    let is_dark = ctx.style().visuals.dark_mode;
    let visuals = if is_dark {
        build_visuals(Visuals::dark(), &DARK, 0.3)
    } else {
        build_visuals(Visuals::light(), &LIGHT, 0.2)
    };
    ctx.set_visuals(visuals);
    configure_fonts_and_spacing(ctx);
}

fn build_visuals(mut visuals: Visuals, p: &Palette, selection_alpha: f32) -> Visuals {
    visuals.window_fill = p.bg_panel;
    visuals.panel_fill = p.bg_panel;
    visuals.faint_bg_color = p.bg_dark;
    visuals.extreme_bg_color = p.bg_input;

    let rounding = Rounding::same(4.0);
    let w = &mut visuals.widgets;

    w.noninteractive.bg_fill = p.bg_input;
    w.noninteractive.fg_stroke = Stroke::new(1.0, p.text_muted);
    w.noninteractive.bg_stroke = Stroke::new(1.0, p.border);
    w.noninteractive.rounding = rounding;

    w.inactive.bg_fill = p.bg_input;
    w.inactive.fg_stroke = Stroke::new(1.0, p.text_primary);
    w.inactive.bg_stroke = Stroke::new(1.0, p.border_light);
    w.inactive.rounding = rounding;

    w.hovered.bg_fill = p.button_hover;
    w.hovered.fg_stroke = Stroke::new(1.0, p.text_primary);
    w.hovered.bg_stroke = Stroke::new(1.0, accent::BLUE);
    w.hovered.rounding = rounding;

    w.active.bg_fill = accent::BLUE;
    w.active.fg_stroke = Stroke::new(1.0, Color32::WHITE);
    w.active.bg_stroke = Stroke::new(1.0, accent::BLUE);
    w.active.rounding = rounding;

    w.open.bg_fill = p.bg_input;
    w.open.fg_stroke = Stroke::new(1.0, p.text_primary);
    w.open.bg_stroke = Stroke::new(1.0, p.border_light);
    w.open.rounding = rounding;

    visuals.selection.bg_fill = accent::BLUE.gamma_multiply(selection_alpha);
    visuals.selection.stroke = Stroke::new(1.0, accent::BLUE);
    visuals
}

/// Configure fonts and spacing (theme-independent).
fn configure_fonts_and_spacing(ctx: &egui::Context) {
    let mut style = (*ctx.style()).clone();

    style.text_styles = [
        (TextStyle::Small, FontId::new(10.0, FontFamily::Monospace)),
        (TextStyle::Body, FontId::new(12.0, FontFamily::Monospace)),
        (TextStyle::Button, FontId::new(12.0, FontFamily::Monospace)),
        (TextStyle::Heading, FontId::new(14.0, FontFamily::Monospace)),
        (
            TextStyle::Monospace,
            FontId::new(12.0, FontFamily::Monospace),
        ),
    ]
    .into();

    style.spacing.item_spacing = egui::vec2(8.0, 6.0);
    style.spacing.button_padding = egui::vec2(10.0, 6.0);
    style.spacing.indent = 16.0;

    ctx.set_style(style);
}

/// Style a button as the primary action button.
pub fn primary_button(text: &str) -> egui::Button<'_> {
    egui::Button::new(egui::RichText::new(text).color(Color32::WHITE))
        .fill(accent::GREEN)
        .rounding(Rounding::same(4.0))
}

/// Create a section header label.
pub fn section_header(text: &str) -> egui::RichText {
    egui::RichText::new(text.to_uppercase()).size(11.0).strong()
}

/// Create a form label.
pub fn form_label(text: &str) -> egui::RichText {
    egui::RichText::new(text.to_uppercase()).size(10.0)
}
