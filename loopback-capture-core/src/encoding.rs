//! Narrow → wide text conversion for the engine boundary.
//!
//! Output paths arrive at the C boundary as narrow strings and leave
//! toward the platform capture API as NUL-terminated UTF-16. The
//! conversion must be lossless: a path that cannot be represented is
//! reported as an error, never truncated.

use crate::models::error::CaptureError;

/// NUL-terminated UTF-16 path buffer handed to capture engines.
///
/// Owns its storage; the buffer is released when the value drops,
/// on every exit path including conversion failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidePath {
    units: Vec<u16>,
}

impl WidePath {
    /// UTF-16 code units without the terminating NUL.
    pub fn as_units(&self) -> &[u16] {
        &self.units[..self.units.len() - 1]
    }

    /// Pointer to a NUL-terminated UTF-16 string, valid while `self` lives.
    pub fn as_ptr(&self) -> *const u16 {
        self.units.as_ptr()
    }

    /// Number of code units, excluding the terminating NUL.
    pub fn len(&self) -> usize {
        self.units.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Convert a path into the wide representation the platform capture API
/// requires.
///
/// Every Unicode scalar in `path` is encoded as UTF-16 and exactly one
/// terminating NUL is appended. An interior NUL cannot survive a
/// NUL-terminated handoff, so it is rejected rather than silently
/// shortening the path.
pub fn to_wide(path: &str) -> Result<WidePath, CaptureError> {
    if path.contains('\0') {
        return Err(CaptureError::EncodingError(
            "output path contains an interior NUL".into(),
        ));
    }

    let mut units: Vec<u16> = path.encode_utf16().collect();
    units.push(0);
    Ok(WidePath { units })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_round_trip() {
        let wide = to_wide("C:\\out\\clip.wav").unwrap();
        assert_eq!(String::from_utf16(wide.as_units()).unwrap(), "C:\\out\\clip.wav");
        assert_eq!(wide.len(), 15);
    }

    #[test]
    fn exactly_one_terminating_nul() {
        let wide = to_wide("a").unwrap();
        // SAFETY: reading len + 1 units is within the owned buffer.
        let raw = unsafe { std::slice::from_raw_parts(wide.as_ptr(), wide.len() + 1) };
        assert_eq!(raw, &[b'a' as u16, 0]);
        assert!(!wide.as_units().contains(&0));
    }

    #[test]
    fn non_bmp_text_uses_surrogate_pairs() {
        let wide = to_wide("clip-🎙.wav").unwrap();
        assert_eq!(String::from_utf16(wide.as_units()).unwrap(), "clip-🎙.wav");
        // "🎙" is outside the BMP: two code units.
        assert_eq!(wide.len(), "clip-.wav".len() + 2);
    }

    #[test]
    fn interior_nul_is_rejected() {
        let err = to_wide("C:\\out\0clip.wav").unwrap_err();
        assert!(matches!(err, CaptureError::EncodingError(_)));
    }

    #[test]
    fn empty_path_converts_to_bare_terminator() {
        let wide = to_wide("").unwrap();
        assert!(wide.is_empty());
        assert_eq!(wide.len(), 0);
    }
}
