//! Background work for the browser.

mod loader;

pub use loader::load_file_worker;
