use crate::{FlightError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// 1x1 grey PNG served when no rendered frame is available.
const PLACEHOLDER_PNG: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

/// An encoded camera frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFrame {
    pub width: u32,
    pub height: u32,
    pub mime: &'static str,
    pub data: Vec<u8>,
}

impl ImageFrame {
    /// Wraps PNG bytes, reading the dimensions from the IHDR chunk.
    pub fn from_png(data: Vec<u8>) -> Result<Self> {
        if data.len() < 24 || data[..8] != PNG_SIGNATURE || &data[12..16] != b"IHDR" {
            return Err(FlightError::Image("not a PNG image".to_string()));
        }
        let width = u32::from_be_bytes([data[16], data[17], data[18], data[19]]);
        let height = u32::from_be_bytes([data[20], data[21], data[22], data[23]]);
        if width == 0 || height == 0 {
            return Err(FlightError::Image("empty image".to_string()));
        }
        Ok(Self {
            width,
            height,
            mime: "image/png",
            data,
        })
    }

    /// The built-in 1x1 placeholder frame.
    pub fn placeholder() -> Result<Self> {
        let data = STANDARD
            .decode(PLACEHOLDER_PNG)
            .map_err(|e| FlightError::Image(e.to_string()))?;
        Self::from_png(data)
    }

    /// Encodes the frame as a `data:` URL.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.data))
    }
}
