// SPDX-License-Identifier: LGPL-2.1

//! Adler-32 combination math.
//!
//! `adler32_combine` merges the checksums of two independently processed byte
//! segments into the checksum of their concatenation without re-scanning
//! either segment. The identity comes from zlib's `adler32_combine()` and
//! operates on the two 16-bit halves of each checksum, parameterized by the
//! length of the second segment. The length term makes the formula asymmetric:
//! it must be folded strictly left-to-right over segments in stream order.

/// Largest prime smaller than 2^16, the Adler-32 modulus.
pub const ADLER_BASE: u64 = 65521;

/// Checksum of `A ++ B` given `adler1 = adler32(A)`, `adler2 = adler32(B)` and `len2 = B.len()`.
///
/// A `None` first operand starts the fold and returns `adler2` unchanged.
pub fn adler32_combine(adler1: Option<u32>, adler2: u32, len2: u64) -> u32 {
  let adler1 = match adler1 {
    Some(sum) => sum as u64,
    None => return adler2,
  };
  let rem = len2 % ADLER_BASE;
  let a1lo = adler1 & 0xffff;
  let a1hi = adler1 >> 16;
  let a2lo = adler2 as u64 & 0xffff;
  let a2hi = adler2 as u64 >> 16;

  // Both subtractions are padded with ADLER_BASE so the arithmetic stays unsigned.
  let sum1 = (a1lo + a2lo + ADLER_BASE - 1) % ADLER_BASE;
  let sum2 = (rem * a1lo + a1hi + a2hi + 2 * ADLER_BASE - rem) % ADLER_BASE;

  (sum1 | (sum2 << 16)) as u32
}

#[cfg(test)]
mod tests {
  use simd_adler32::Adler32;

  use super::*;

  fn adler32(data: &[u8]) -> u32 {
    let mut hash = Adler32::new();
    hash.write(data);
    hash.finish()
  }

  #[test]
  fn none_seed_returns_second_operand() {
    assert_eq!(adler32_combine(None, 0xDEADBEEF, 1234), 0xDEADBEEF);
  }

  #[test]
  fn combine_matches_whole_stream_checksum() {
    crate::init_test_logger();
    let a = b"the quick brown fox ".as_slice();
    let b = b"jumps over the lazy dog".as_slice();
    let whole = adler32(&[a, b].concat());
    assert_eq!(adler32_combine(Some(adler32(a)), adler32(b), b.len() as u64), whole);
  }

  #[test]
  fn fold_over_three_segments_in_order() {
    let segments: [&[u8]; 3] = [b"alpha", b"beta-beta", &[0u8; 300]];
    let whole = adler32(&segments.concat());
    let mut folded = None;
    for seg in segments {
      folded = Some(adler32_combine(folded, adler32(seg), seg.len() as u64));
    }
    assert_eq!(folded, Some(whole));
  }

  #[test]
  fn combine_is_order_sensitive() {
    let a = b"aaaaaaa".as_slice();
    let b = b"zzz".as_slice();
    let fwd = adler32_combine(Some(adler32(a)), adler32(b), b.len() as u64);
    let rev = adler32_combine(Some(adler32(b)), adler32(a), a.len() as u64);
    assert_ne!(fwd, rev);
    assert_eq!(fwd, adler32(&[a, b].concat()));
  }

  #[test]
  fn empty_second_segment_is_identity() {
    let a = b"some payload".as_slice();
    let sum = adler32(a);
    // adler32 of the empty string is 1.
    assert_eq!(adler32_combine(Some(sum), 1, 0), sum);
  }

  #[test]
  fn lengths_beyond_the_modulus() {
    let a = vec![0x5A; 70000];
    let b = vec![0xA5; 66000];
    let whole = adler32(&[a.as_slice(), b.as_slice()].concat());
    assert_eq!(adler32_combine(Some(adler32(&a)), adler32(&b), b.len() as u64), whole);
  }
}
