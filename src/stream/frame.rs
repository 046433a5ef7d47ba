use crate::foundation::core::FrameMeta;
use crate::foundation::error::{XssimError, XssimResult};

/// One 8-bit luma plane handed over by an input source.
///
/// Immutable once built; `stride >= width` and `data` covers every row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LumaFrame {
    width: u32,
    height: u32,
    stride: usize,
    data: Vec<u8>,
    meta: FrameMeta,
}

impl LumaFrame {
    /// Wrap a luma plane, validating its layout.
    pub fn new(
        width: u32,
        height: u32,
        stride: usize,
        data: Vec<u8>,
        meta: FrameMeta,
    ) -> XssimResult<Self> {
        if width == 0 || height == 0 {
            return Err(XssimError::validation(
                "frame width/height must be non-zero",
            ));
        }
        if stride < width as usize {
            return Err(XssimError::validation(format!(
                "frame stride {stride} is smaller than width {width}"
            )));
        }
        let need = stride * (height as usize - 1) + width as usize;
        if data.len() < need {
            return Err(XssimError::validation(format!(
                "frame data has {} bytes, {width}x{height} with stride {stride} needs {need}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            stride,
            data,
            meta,
        })
    }

    /// Tightly packed plane (`stride == width`).
    pub fn packed(width: u32, height: u32, data: Vec<u8>, meta: FrameMeta) -> XssimResult<Self> {
        Self::new(width, height, width as usize, data, meta)
    }

    /// Constant-valued packed plane.
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self {
            width,
            height,
            stride: width as usize,
            data: vec![value; width as usize * height as usize],
            meta: FrameMeta::default(),
        }
    }

    /// Replace the metadata.
    pub fn with_meta(mut self, meta: FrameMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes between the starts of consecutive rows.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Raw plane bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Buffer metadata.
    pub fn meta(&self) -> FrameMeta {
        self.meta
    }

    /// One row of `width` samples.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.width as usize]
    }
}

/// Visualization output for one processed pair: one gray byte per pixel, brighter is more
/// similar.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VisFrame {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row stride in bytes (width rounded up to 4).
    pub stride: u32,
    /// `stride * height` gray bytes.
    pub data: Vec<u8>,
    /// Metadata copied from the pair's second input.
    pub meta: FrameMeta,
}

impl VisFrame {
    /// Copy the visible `width x height` area into a tightly packed buffer.
    pub fn to_packed(&self) -> Vec<u8> {
        if self.stride == self.width {
            return self.data.clone();
        }
        let (w, s) = (self.width as usize, self.stride as usize);
        let mut out = Vec::with_capacity(w * self.height as usize);
        for line in self.data.chunks_exact(s) {
            out.extend_from_slice(&line[..w]);
        }
        out
    }
}

#[cfg(test)]
#[path = "../../tests/unit/stream/frame.rs"]
mod tests;
