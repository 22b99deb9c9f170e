//! Adler-32 checksum carried in the optional frame checksum field.

const MOD_ADLER: u32 = 65521;

/// Largest run of bytes that can be summed before `b` may overflow a `u32`.
const NMAX: usize = 5552;

/// Compute the Adler-32 checksum of `data`.
///
/// Returns `(b << 16) | a`; the checksum of an empty slice is `1`.
pub fn adler32(data: &[u8]) -> u32 {
    let mut a: u32 = 1;
    let mut b: u32 = 0;

    for chunk in data.chunks(NMAX) {
        for &byte in chunk {
            a += u32::from(byte);
            b += a;
        }
        a %= MOD_ADLER;
        b %= MOD_ADLER;
    }

    (b << 16) | a
}
