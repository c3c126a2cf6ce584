//! specim-core: Core types for EELS/RIXS spectrum-image analysis.
//!
//! This crate provides the data model shared by the numeric utilities,
//! the browser and the bindings: energy axes, intensity cubes, RIXS
//! energy maps, edge records and ROI index mapping.
//!

pub mod axis;
pub mod cube;
pub mod edge;
pub mod energy_map;
pub mod error;
pub mod roi;
pub mod stats;

pub use axis::EnergyAxis;
pub use cube::SpectrumImage;
pub use edge::{Edge, EnergyWindow};
pub use energy_map::EnergyMap;
pub use error::{Error, Result};
pub use roi::Roi;
