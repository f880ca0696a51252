use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One physical capture device as seen in a single enumeration snapshot.
///
/// `index` is only meaningful within the snapshot that produced it; use
/// `symbolic_reference` to identify the device across snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub index: usize,
    pub name: String,
    pub symbolic_reference: String,
}

impl DeviceDescriptor {
    pub fn new(index: usize, name: impl Into<String>, symbolic_reference: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            symbolic_reference: symbolic_reference.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Four-character code identifying a pixel/frame encoding on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    pub const fn new(code: &[u8; 4]) -> Self {
        Self(*code)
    }

    /// Little-endian packing, as used by both Media Foundation subtypes and V4L2.
    pub fn as_u32(&self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    pub fn from_u32(value: u32) -> Self {
        Self(value.to_le_bytes())
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc({})", self)
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            let c = if b.is_ascii_graphic() { b as char } else { '.' };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

/// Closed set of frame encodings the core knows how to name.
///
/// Only `Mjpeg` and `Yuy2` are recognized when reading a device's native
/// capability list; `Nv12` can be requested but most providers reject it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FrameEncoding {
    Mjpeg,
    Yuy2,
    Nv12,
}

impl FrameEncoding {
    pub const RECOGNIZED: [FrameEncoding; 2] = [FrameEncoding::Mjpeg, FrameEncoding::Yuy2];

    pub fn fourcc(&self) -> FourCc {
        match self {
            FrameEncoding::Mjpeg => FourCc::new(b"MJPG"),
            FrameEncoding::Yuy2 => FourCc::new(b"YUY2"),
            FrameEncoding::Nv12 => FourCc::new(b"NV12"),
        }
    }

    /// Maps a native subtype back to an encoding the enumeration recognizes.
    ///
    /// `YUYV` is the V4L2 spelling of the same packed 4:2:2 layout as `YUY2`.
    pub fn from_native(fourcc: FourCc) -> Option<Self> {
        if fourcc == FourCc::new(b"YUYV") {
            return Some(FrameEncoding::Yuy2);
        }
        FrameEncoding::RECOGNIZED
            .into_iter()
            .find(|encoding| encoding.fourcc() == fourcc)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FrameEncoding::Mjpeg => "MJPEG",
            FrameEncoding::Yuy2 => "YUY2",
            FrameEncoding::Nv12 => "NV12",
        }
    }
}

impl fmt::Display for FrameEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FrameEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MJPEG" | "MJPG" => Ok(FrameEncoding::Mjpeg),
            "YUY2" | "YUYV" => Ok(FrameEncoding::Yuy2),
            "NV12" => Ok(FrameEncoding::Nv12),
            other => Err(format!("unknown frame encoding: {other}")),
        }
    }
}

/// Requested or negotiated stream format. Compared structurally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormatSpec {
    pub resolution: Resolution,
    pub encoding: FrameEncoding,
    pub frame_rate: u32,
}

impl FormatSpec {
    pub const fn new(width: u32, height: u32, encoding: FrameEncoding, frame_rate: u32) -> Self {
        Self {
            resolution: Resolution::new(width, height),
            encoding,
            frame_rate,
        }
    }

    pub fn width(&self) -> u32 {
        self.resolution.width
    }

    pub fn height(&self) -> u32 {
        self.resolution.height
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_encoding(mut self, encoding: FrameEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_frame_rate(mut self, frame_rate: u32) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    pub fn is_well_formed(&self) -> bool {
        self.resolution.width > 0 && self.resolution.height > 0 && self.frame_rate > 0
    }
}

/// 640x480 MJPEG at 15 fps, used when `init` is given no preferred format.
impl Default for FormatSpec {
    fn default() -> Self {
        FormatSpec::new(640, 480, FrameEncoding::Mjpeg, 15)
    }
}

impl fmt::Display for FormatSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.resolution, self.frame_rate, self.encoding)
    }
}

/// Parses `WIDTHxHEIGHT@FPS:ENCODING`, e.g. `1280x720@30:MJPEG`.
impl FromStr for FormatSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (size_fps, encoding) = s
            .split_once(':')
            .ok_or_else(|| "format should be WIDTHxHEIGHT@FPS:ENCODING".to_string())?;
        let (size, fps) = size_fps
            .split_once('@')
            .ok_or_else(|| "size should be WIDTHxHEIGHT@FPS".to_string())?;
        let (width, height) = size
            .split_once('x')
            .ok_or_else(|| "size should be WIDTHxHEIGHT".to_string())?;

        let width: u32 = width.parse().map_err(|e| format!("bad width: {e}"))?;
        let height: u32 = height.parse().map_err(|e| format!("bad height: {e}"))?;
        let frame_rate: u32 = fps.parse().map_err(|e| format!("bad frame rate: {e}"))?;
        let encoding: FrameEncoding = encoding.parse()?;

        Ok(FormatSpec::new(width, height, encoding, frame_rate))
    }
}

/// One raw encoded frame as delivered by the provider.
#[derive(Debug, Clone, Serialize)]
pub struct Frame {
    /// 1-based, restarts whenever the stream is reopened.
    pub sequence: u64,
    /// Microseconds since the stream was opened.
    pub timestamp_us: u64,
    pub format: FormatSpec,
    #[serde(skip)]
    pub data: Bytes,
}

impl Frame {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Host platform detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    Windows,
    MacOS,
    Linux,
    Unknown,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOS
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else {
            Platform::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::MacOS => "macos",
            Platform::Linux => "linux",
            Platform::Unknown => "unknown",
        }
    }
}
