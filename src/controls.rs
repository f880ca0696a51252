//! Camera control catalog.
//!
//! Every control belongs to exactly one of two provider sub-interfaces:
//! the image-processing group (video proc amp / V4L2 user class) or the
//! camera group (mechanical and optical controls). The partition is fixed
//! and lives in a single lookup table, [`CONTROL_GROUPS`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlKind {
    Brightness = 0,
    Contrast = 1,
    Hue = 2,
    Saturation = 3,
    Sharpness = 4,
    Gamma = 5,
    WhiteBalance = 6,
    BacklightComp = 7,
    Gain = 8,
    Pan = 9,
    Tilt = 10,
    Roll = 11,
    Zoom = 12,
    Exposure = 13,
    Iris = 14,
    Focus = 15,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlGroup {
    ImageProcessing,
    Camera,
}

use ControlGroup::{Camera, ImageProcessing};

/// `kind as usize` indexes this table.
pub const CONTROL_GROUPS: [ControlGroup; 16] = [
    ImageProcessing, // Brightness
    ImageProcessing, // Contrast
    ImageProcessing, // Hue
    ImageProcessing, // Saturation
    ImageProcessing, // Sharpness
    ImageProcessing, // Gamma
    ImageProcessing, // WhiteBalance
    ImageProcessing, // BacklightComp
    ImageProcessing, // Gain
    Camera,          // Pan
    Camera,          // Tilt
    Camera,          // Roll
    Camera,          // Zoom
    Camera,          // Exposure
    Camera,          // Iris
    Camera,          // Focus
];

impl ControlKind {
    pub const ALL: [ControlKind; 16] = [
        ControlKind::Brightness,
        ControlKind::Contrast,
        ControlKind::Hue,
        ControlKind::Saturation,
        ControlKind::Sharpness,
        ControlKind::Gamma,
        ControlKind::WhiteBalance,
        ControlKind::BacklightComp,
        ControlKind::Gain,
        ControlKind::Pan,
        ControlKind::Tilt,
        ControlKind::Roll,
        ControlKind::Zoom,
        ControlKind::Exposure,
        ControlKind::Iris,
        ControlKind::Focus,
    ];

    pub fn group(self) -> ControlGroup {
        CONTROL_GROUPS[self as usize]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ControlKind::Brightness => "BRIGHTNESS",
            ControlKind::Contrast => "CONTRAST",
            ControlKind::Hue => "HUE",
            ControlKind::Saturation => "SATURATION",
            ControlKind::Sharpness => "SHARPNESS",
            ControlKind::Gamma => "GAMMA",
            ControlKind::WhiteBalance => "WHITE_BALANCE",
            ControlKind::BacklightComp => "BACKLIGHT_COMP",
            ControlKind::Gain => "GAIN",
            ControlKind::Pan => "PAN",
            ControlKind::Tilt => "TILT",
            ControlKind::Roll => "ROLL",
            ControlKind::Zoom => "ZOOM",
            ControlKind::Exposure => "EXPOSURE",
            ControlKind::Iris => "IRIS",
            ControlKind::Focus => "FOCUS",
        }
    }
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase().replace('-', "_");
        ControlKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| format!("unknown control: {s}"))
    }
}

/// Auto vs. manual setting accompanying a control value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlMode {
    Auto,
    Manual,
}

impl ControlMode {
    /// Provider flag bits: `0x1` auto, `0x2` manual.
    pub const AUTO_FLAG: i32 = 0x0001;
    pub const MANUAL_FLAG: i32 = 0x0002;

    /// Anything without the auto bit set reads as manual.
    pub fn from_flags(flags: i32) -> Self {
        if flags & Self::AUTO_FLAG != 0 {
            ControlMode::Auto
        } else {
            ControlMode::Manual
        }
    }

    pub fn flags(self) -> i32 {
        match self {
            ControlMode::Auto => Self::AUTO_FLAG,
            ControlMode::Manual => Self::MANUAL_FLAG,
        }
    }
}

/// Range and current value of one control as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ControlState {
    pub kind: ControlKind,
    pub min: i32,
    pub max: i32,
    pub step: i32,
    pub current: i32,
    pub default: i32,
    pub mode: ControlMode,
}

impl ControlState {
    pub fn group(&self) -> ControlGroup {
        self.kind.group()
    }

    pub fn contains(&self, value: i32) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// `current + step`, or `None` when that would leave the declared range.
    pub fn next_step(&self) -> Option<i32> {
        let next = self.current.checked_add(self.step.max(1))?;
        self.contains(next).then_some(next)
    }
}
