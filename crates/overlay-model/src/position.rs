//! Overlay placement on the video frame.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use vidmark_common::error::VidmarkError;

/// Where the overlay image is composited.
///
/// Each variant maps to a fixed `overlay` filter expression. `W`/`H` are the
/// main video dimensions, `w`/`h` the overlay's; edge placements keep a 5px margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverlayPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    #[default]
    BottomCenter,
    Center,
}

impl OverlayPosition {
    /// Every position, in declaration order.
    pub const ALL: [OverlayPosition; 6] = [
        OverlayPosition::TopLeft,
        OverlayPosition::TopRight,
        OverlayPosition::BottomLeft,
        OverlayPosition::BottomRight,
        OverlayPosition::BottomCenter,
        OverlayPosition::Center,
    ];

    /// Filter-graph expression handed to the engine.
    pub fn filter_expression(self) -> &'static str {
        match self {
            Self::TopLeft => "overlay=5:5",
            Self::TopRight => "overlay=W-w-5:5",
            Self::BottomLeft => "overlay=5:H-h-5",
            Self::BottomRight => "overlay=W-w-5:H-h-5",
            Self::BottomCenter => "overlay=x=(W-w)/2:y=H-h-5",
            Self::Center => "overlay=(W-w)/2:(H-h)/2",
        }
    }

    /// Kebab-case name used on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Self::TopLeft => "top-left",
            Self::TopRight => "top-right",
            Self::BottomLeft => "bottom-left",
            Self::BottomRight => "bottom-right",
            Self::BottomCenter => "bottom-center",
            Self::Center => "center",
        }
    }
}

impl fmt::Display for OverlayPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OverlayPosition {
    type Err = VidmarkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|position| position.name() == normalized)
            .ok_or_else(|| {
                let known = Self::ALL.map(OverlayPosition::name).join(", ");
                VidmarkError::invalid_argument(format!(
                    "Unknown overlay position: {s}. Use one of: {known}"
                ))
            })
    }
}
