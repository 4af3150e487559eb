//! OS-backed cryptographically secure randomness.
//!
//! There is exactly one source of entropy in this crate: the operating
//! system CSPRNG via `rand::rngs::OsRng`. No user-space fallback generator
//! exists — if the OS source is unavailable, callers get an error, not a
//! weaker substitute.

use rand::RngCore;

use crate::error::CryptoError;

/// Maximum number of bytes a single call will hand back.
pub const MAX_REQUEST_LEN: usize = 65_536;

/// Fill a caller-provided buffer with OS-random bytes.
///
/// Rejects zero-length and oversized requests — these are almost always a
/// caller bug (an uninitialised length variable, or an attempt to seed a
/// bulk buffer that should be streamed instead).
pub fn fill(buf: &mut [u8]) -> Result<(), CryptoError> {
    if buf.is_empty() {
        return Err(CryptoError::input("random request length must be > 0"));
    }
    if buf.len() > MAX_REQUEST_LEN {
        return Err(CryptoError::input(format!(
            "random request length {} exceeds maximum {}",
            buf.len(),
            MAX_REQUEST_LEN
        )));
    }
    rand::rngs::OsRng.fill_bytes(buf);
    Ok(())
}

/// Allocate and fill `len` bytes of OS-random data.
pub fn bytes(len: usize) -> Result<Vec<u8>, CryptoError> {
    let mut out = vec![0u8; len.max(1)];
    if len == 0 {
        return Err(CryptoError::input("random request length must be > 0"));
    }
    fill(&mut out)?;
    Ok(out)
}

/// Fixed-size convenience wrapper used throughout the crate for 32-byte keys.
pub fn bytes_32() -> Result<[u8; 32], CryptoError> {
    let mut out = [0u8; 32];
    fill(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_length() {
        assert!(bytes(0).is_err());
    }

    #[test]
    fn rejects_oversized_request() {
        assert!(bytes(MAX_REQUEST_LEN + 1).is_err());
    }

    #[test]
    fn fills_requested_length() {
        let b = bytes(32).unwrap();
        assert_eq!(b.len(), 32);
    }

    #[test]
    fn two_calls_differ() {
        let a = bytes_32().unwrap();
        let b = bytes_32().unwrap();
        assert_ne!(a, b);
    }
}
