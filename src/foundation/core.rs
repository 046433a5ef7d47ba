use crate::foundation::error::{XssimError, XssimResult};

/// Rational frames-per-second.
///
/// Carried through negotiation to the output caps; never used by the SSIM computation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator.
    pub num: u32,
    /// Denominator (must be > 0).
    pub den: u32,
}

impl Fps {
    /// Create a validated frame rate.
    ///
    /// `0/1` is accepted: it is the conventional "variable/unknown" rate of raw streams.
    pub fn new(num: u32, den: u32) -> XssimResult<Self> {
        if den == 0 {
            return Err(XssimError::validation("Fps den must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Duration of one frame in nanoseconds, or `None` for the unknown rate.
    pub fn frame_duration_ns(self) -> Option<u64> {
        if self.num == 0 {
            return None;
        }
        Some(u64::from(self.den) * 1_000_000_000 / u64::from(self.num))
    }
}

impl Default for Fps {
    fn default() -> Self {
        Self { num: 30, den: 1 }
    }
}

impl std::fmt::Display for Fps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl std::str::FromStr for Fps {
    type Err = XssimError;

    /// Parse `N` or `N/D`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |v: &str| {
            v.trim()
                .parse::<u32>()
                .map_err(|e| XssimError::validation(format!("invalid fps '{s}': {e}")))
        };
        match s.split_once('/') {
            Some((n, d)) => Self::new(parse(n)?, parse(d)?),
            None => Self::new(parse(s)?, 1),
        }
    }
}

/// Pixel layout of raw input frames. Only the luma plane is ever compared.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Single 8-bit luma plane.
    #[default]
    Gray8,
    /// Planar 4:2:0: 8-bit luma plane followed by two quarter-size chroma planes.
    I420,
}

impl PixelFormat {
    /// Bytes occupied by one tightly packed frame of this format.
    pub fn frame_len(self, width: u32, height: u32) -> usize {
        let luma = (width as usize) * (height as usize);
        match self {
            Self::Gray8 => luma,
            Self::I420 => {
                let cw = (width as usize).div_ceil(2);
                let ch = (height as usize).div_ceil(2);
                luma + 2 * cw * ch
            }
        }
    }
}

/// Per-buffer metadata forwarded from the second input to the visualization output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameMeta {
    /// Presentation timestamp in nanoseconds.
    pub pts_ns: Option<u64>,
    /// Frame duration in nanoseconds.
    pub duration_ns: Option<u64>,
    /// Opaque buffer flag bits.
    pub flags: u32,
}

impl FrameMeta {
    /// Metadata for the `index`-th frame of a constant-rate stream.
    pub fn for_index(index: u64, fps: Fps) -> Self {
        let duration_ns = fps.frame_duration_ns();
        Self {
            pts_ns: duration_ns.map(|d| d.saturating_mul(index)),
            duration_ns,
            flags: 0,
        }
    }
}

/// Round `v` up to the next multiple of 4.
pub fn round_up_4(v: u32) -> u32 {
    v.div_ceil(4) * 4
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
