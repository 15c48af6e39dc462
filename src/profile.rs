//! Encoding profile — the quadruple (resolution, bitrate, fps) that drives
//! the encoder subprocess for one sink.

use crate::error::{RestreamerError, Result};

/// Resolution floor (width, height), minimum bitrate and minimum fps a
/// profile is allowed to degrade to.
pub const MIN_WIDTH: u32 = 320;
pub const MIN_HEIGHT: u32 = 240;
pub const MIN_BITRATE_KBPS: u32 = 300;
pub const MIN_FPS: u32 = 10;

/// An immutable encoding profile: resolution, bitrate, framerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingProfile {
    pub width: u32,
    pub height: u32,
    pub bitrate_kbps: u32,
    pub fps: u32,
}

impl EncodingProfile {
    /// Construct a profile, validating all invariants from the data model.
    pub fn new(width: u32, height: u32, bitrate_kbps: u32, fps: u32) -> Result<Self> {
        if width == 0 || height == 0 || bitrate_kbps == 0 || fps == 0 {
            return Err(RestreamerError::Config(
                "profile fields must be strictly positive".into(),
            ));
        }
        if width < MIN_WIDTH || height < MIN_HEIGHT {
            return Err(RestreamerError::Config(format!(
                "resolution {width}x{height} below floor {MIN_WIDTH}x{MIN_HEIGHT}"
            )));
        }
        if bitrate_kbps < MIN_BITRATE_KBPS {
            return Err(RestreamerError::Config(format!(
                "bitrate {bitrate_kbps}k below floor {MIN_BITRATE_KBPS}k"
            )));
        }
        if fps < MIN_FPS {
            return Err(RestreamerError::Config(format!(
                "fps {fps} below floor {MIN_FPS}"
            )));
        }
        Ok(Self { width, height, bitrate_kbps, fps })
    }

    pub fn resolution_str(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_below_floor() {
        assert!(EncodingProfile::new(100, 100, 300, 12).is_err());
        assert!(EncodingProfile::new(320, 240, 299, 12).is_err());
        assert!(EncodingProfile::new(320, 240, 300, 9).is_err());
    }

    #[test]
    fn accepts_at_floor() {
        let p = EncodingProfile::new(320, 240, 300, 10).unwrap();
        assert_eq!(p.resolution_str(), "320x240");
    }

    #[test]
    fn rejects_zero_fields() {
        assert!(EncodingProfile::new(0, 240, 300, 12).is_err());
    }
}
