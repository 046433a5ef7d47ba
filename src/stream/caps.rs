use crate::{
    foundation::core::{Fps, PixelFormat},
    foundation::error::{XssimError, XssimResult},
    ssim::compute::MIN_DIMENSION,
    stream::frame::LumaFrame,
};

/// Stream capabilities agreed before streaming.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Caps {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frame rate, passed through to the output.
    pub fps: Fps,
    /// Pixel layout.
    pub format: PixelFormat,
}

impl Caps {
    /// Gray8 caps.
    pub fn gray(width: u32, height: u32, fps: Fps) -> Self {
        Self {
            width,
            height,
            fps,
            format: PixelFormat::Gray8,
        }
    }

    /// `(width, height)`.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Which of the two inputs a capability or buffer came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InputPad {
    /// The reference stream.
    First,
    /// The processed stream; its metadata is forwarded downstream.
    Second,
}

impl std::fmt::Display for InputPad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::First => f.write_str("sink0"),
            Self::Second => f.write_str("sink1"),
        }
    }
}

/// One-time agreement on width/height/framerate for a session.
///
/// The first capability exchange (or the first frame pair, when no exchange happened) fixes the
/// geometry; every later exchange and every pair must match it exactly.
#[derive(Clone, Debug, Default)]
pub struct Negotiator {
    fixed: Option<Caps>,
}

impl Negotiator {
    /// Create an unnegotiated negotiator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Output caps once fixed: same geometry and rate as the inputs, Gray8.
    pub fn output_caps(&self) -> Option<Caps> {
        self.fixed
    }

    /// Return `true` once the geometry is fixed.
    pub fn is_fixed(&self) -> bool {
        self.fixed.is_some()
    }

    /// Offer input caps on `pad`.
    ///
    /// Returns the freshly published output caps on the first successful call, `None` for
    /// later calls that agree with them.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn set_caps(&mut self, pad: InputPad, caps: Caps) -> XssimResult<Option<Caps>> {
        match self.fixed {
            None => {
                if caps.width < MIN_DIMENSION || caps.height < MIN_DIMENSION {
                    return Err(XssimError::validation(format!(
                        "{pad}: {}x{} is below the {MIN_DIMENSION}x{MIN_DIMENSION} minimum",
                        caps.width, caps.height
                    )));
                }
                let out = Caps::gray(caps.width, caps.height, caps.fps);
                tracing::info!(
                    %pad,
                    width = out.width,
                    height = out.height,
                    fps = %out.fps,
                    "output caps fixed"
                );
                self.fixed = Some(out);
                Ok(Some(out))
            }
            Some(fixed) => {
                if fixed.size() != caps.size() {
                    tracing::error!(%pad, "mismatch on negotiated caps");
                    return Err(XssimError::dimension_mismatch(
                        fixed.size(),
                        caps.size(),
                        format!("{pad} caps"),
                    ));
                }
                Ok(None)
            }
        }
    }

    /// Validate a frame pair against the negotiated geometry, fixing it from the pair (with
    /// `fps`) when no capability exchange happened yet.
    ///
    /// Returns the output caps when this call fixed them.
    pub fn check_pair(
        &mut self,
        a: &LumaFrame,
        b: &LumaFrame,
        fps: Fps,
    ) -> XssimResult<Option<Caps>> {
        let size_a = (a.width(), a.height());
        let size_b = (b.width(), b.height());
        if size_a != size_b {
            return Err(XssimError::dimension_mismatch(
                size_a,
                size_b,
                "frame pair disagrees",
            ));
        }

        let published = match self.fixed {
            None => self.set_caps(InputPad::First, Caps::gray(size_a.0, size_a.1, fps))?,
            Some(_) => None,
        };

        let Some(fixed) = self.fixed else {
            return Err(XssimError::evaluation("caps not fixed after negotiation"));
        };
        for (pad, size) in [(InputPad::First, size_a), (InputPad::Second, size_b)] {
            if size != fixed.size() {
                return Err(XssimError::dimension_mismatch(
                    fixed.size(),
                    size,
                    format!("{pad} buffer"),
                ));
            }
        }
        Ok(published)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/stream/caps.rs"]
mod tests;
