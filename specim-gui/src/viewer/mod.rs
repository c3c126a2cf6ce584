//! Visualization helpers for the image and spectrum panels.

mod colormap;
pub mod roi;
mod texture;

pub use colormap::Colormap;
pub use texture::image_to_color;
