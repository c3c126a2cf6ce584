//! Specim GUI application entry point.

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use specim_gui::{BrowserMode, BrowserOptions};

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let initial = std::env::args_os().nth(1).map(std::path::PathBuf::from);
    let options = BrowserOptions::default().with_mode(BrowserMode::Fit);
    specim_gui::run_app(initial, &options)
}
