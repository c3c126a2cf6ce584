//! Colormap definitions and application logic.

use crate::util::f32_to_u8;

/// Available colormaps for image display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Colormap {
    /// Grayscale - black to white.
    #[default]
    Grayscale,
    /// Hot (Thermal) - black to red to yellow to white.
    Hot,
    /// Viridis (approximate) - blue to teal to green to yellow.
    Viridis,
    /// Inverted grayscale - white to black.
    GrayscaleInverted,
}

impl Colormap {
    /// All colormaps, in menu order.
    pub const ALL: [Self; 4] = [
        Self::Grayscale,
        Self::Hot,
        Self::Viridis,
        Self::GrayscaleInverted,
    ];
}

impl std::fmt::Display for Colormap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Colormap::Grayscale => write!(f, "Grayscale"),
            Colormap::Hot => write!(f, "Hot (Thermal)"),
            Colormap::Viridis => write!(f, "Viridis"),
            Colormap::GrayscaleInverted => write!(f, "Grayscale (inverted)"),
        }
    }
}

impl Colormap {
    /// Apply the colormap to a normalized value [0, 1] and return RGBA bytes.
    #[must_use]
    pub fn apply(self, val: f32) -> [u8; 4] {
        let val = if val.is_finite() {
            val.clamp(0.0, 1.0)
        } else {
            0.0
        };
        match self {
            Colormap::Grayscale => {
                let v = f32_to_u8(val * 255.0);
                [v, v, v, 255]
            }
            Colormap::GrayscaleInverted => {
                let v = f32_to_u8((1.0 - val) * 255.0);
                [v, v, v, 255]
            }
            Colormap::Hot => {
                if val < 1.0 / 3.0 {
                    [f32_to_u8(val * 3.0 * 255.0), 0, 0, 255]
                } else if val < 2.0 / 3.0 {
                    [255, f32_to_u8((val * 3.0 - 1.0) * 255.0), 0, 255]
                } else {
                    [255, 255, f32_to_u8((val * 3.0 - 2.0) * 255.0), 255]
                }
            }
            Colormap::Viridis => {
                let r = f32_to_u8(255.0 * val.powf(2.0));
                let g = f32_to_u8(255.0 * val);
                let b = f32_to_u8(255.0 * (1.0 - val));
                [r, g, b, 255]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints() {
        assert_eq!(Colormap::Grayscale.apply(0.0), [0, 0, 0, 255]);
        assert_eq!(Colormap::Grayscale.apply(1.0), [255, 255, 255, 255]);
        assert_eq!(Colormap::GrayscaleInverted.apply(0.0), [255, 255, 255, 255]);
        assert_eq!(Colormap::Hot.apply(1.0), [255, 255, 255, 255]);
        assert_eq!(Colormap::Grayscale.apply(f32::NAN), [0, 0, 0, 255]);
        assert_eq!(Colormap::Grayscale.apply(2.0), [255, 255, 255, 255]);
    }
}
