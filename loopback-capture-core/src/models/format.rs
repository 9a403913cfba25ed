/// PCM format requested from a capture engine.
///
/// Validation mirrors what the platform capture APIs accept for a
/// shared-mode PCM stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureFormat {
    /// Sample rate in Hz (default: 44100).
    pub sample_rate: u32,

    /// Bits per sample (default: 16). Must be a nonzero multiple of 8, at most 32.
    pub bit_depth: u16,

    /// Number of interleaved channels (default: 2).
    pub channels: u16,
}

impl CaptureFormat {
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate < 1000 {
            return Err(format!("sample rate too low: {} Hz", self.sample_rate));
        }
        if self.bit_depth == 0 || self.bit_depth > 32 || self.bit_depth % 8 != 0 {
            return Err(format!("unsupported bit depth: {}", self.bit_depth));
        }
        if self.channels == 0 || self.channels > 1024 {
            return Err(format!("unsupported channel count: {}", self.channels));
        }
        Ok(())
    }

    /// Bytes per interleaved frame.
    pub fn block_align(&self) -> u16 {
        self.bit_depth / 8 * self.channels
    }

    /// Average byte rate of the stream.
    pub fn avg_bytes_per_sec(&self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }
}

impl Default for CaptureFormat {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            bit_depth: 16,
            channels: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_format_is_valid() {
        let format = CaptureFormat::default();
        assert!(format.validate().is_ok());
        assert_eq!(format.block_align(), 4);
        assert_eq!(format.avg_bytes_per_sec(), 176_400);
    }

    #[test]
    fn rejects_out_of_range_fields() {
        let mut format = CaptureFormat::default();
        format.sample_rate = 999;
        assert!(format.validate().is_err());

        let mut format = CaptureFormat::default();
        format.bit_depth = 12;
        assert!(format.validate().is_err());

        let mut format = CaptureFormat::default();
        format.channels = 0;
        assert!(format.validate().is_err());
    }
}
