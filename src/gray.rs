//! Reflected binary Gray code on fixed-width bit vectors.
//!
//! Bits are stored one per `u8` (0 or 1), most significant bit first. Two
//! consecutive integers always differ in a single bit once encoded, so one
//! flipped bit in a genotype moves the decoded value by a bounded amount.

/// Encodes `n` as a Gray code of exactly `length` bits.
///
/// `n` must fit in `length` bits; higher bits are silently dropped.
///
/// # Examples
///
/// ```
/// # use grayopt::gray::int_to_gray;
/// assert_eq!(int_to_gray(5, 4), vec![0, 1, 1, 1]);
/// ```
pub fn int_to_gray(n: u64, length: usize) -> Vec<u8> {
    let g = n ^ (n >> 1);
    (0..length)
        .rev()
        .map(|i| if i < 64 { ((g >> i) & 1) as u8 } else { 0 })
        .collect()
}

/// Decodes a Gray code back to its integer.
///
/// Each integer bit is the running XOR parity of the code bits seen so far.
/// An empty code decodes to 0.
///
/// # Examples
///
/// ```
/// # use grayopt::gray::gray_to_int;
/// assert_eq!(gray_to_int(&[0, 1, 1, 1]), 5);
/// ```
pub fn gray_to_int(code: &[u8]) -> u64 {
    let mut n: u64 = 0;
    let mut parity: u8 = 0;
    for &bit in code {
        parity ^= bit & 1;
        n = (n << 1) | parity as u64;
    }
    n
}
