//! Channel coding of small UCI payloads
//!
//! Payloads of `A <= 11` bits are not polar coded. Following 3GPP TS 38.212 section 5.3.3, a
//! single bit is repeated, two bits `c0, c1` are sent as the cyclic pattern `c0, c1, c0 ^ c1`, and
//! three to eleven bits use the `(32, A)` code built from the basis sequences of Table 5.3.3.3-1.
//! In every case the codeword of period `P` (1, 3 or 32) is repeated cyclically or truncated to
//! the `E` bits of the resource.
//!
//! The decoder folds the `E` LLR values onto one period and correlates them against all `2^A`
//! candidate codewords. It returns the best candidate along with its correlation normalized so
//! that a noiseless input scores `1.0`; the caller compares this score with its acceptance
//! threshold.

use tracing::trace;

use crate::{common, Bit, Error};

/// Maximum number of bits handled by the block code
pub const MAX_BLOCK_BITS: usize = 11;

/// Period of the `(32, A)` codeword
const BASIS_LEN: usize = 32;

/// Basis sequences `M_{i,n}` of Table 5.3.3.3-1 of 3GPP TS 38.212 (row `i`, column `n`)
const BASIS_SEQUENCES: [[u8; MAX_BLOCK_BITS]; BASIS_LEN] = [
    [1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 1],
    [1, 1, 1, 0, 0, 0, 0, 0, 0, 1, 1],
    [1, 0, 0, 1, 0, 0, 1, 0, 1, 1, 1],
    [1, 0, 1, 1, 0, 0, 0, 0, 1, 0, 1],
    [1, 1, 1, 1, 0, 0, 0, 1, 0, 0, 1],
    [1, 1, 0, 0, 1, 0, 1, 1, 1, 0, 1],
    [1, 0, 1, 0, 1, 0, 1, 0, 1, 1, 1],
    [1, 0, 0, 1, 1, 0, 0, 1, 1, 0, 1],
    [1, 1, 0, 1, 1, 0, 0, 1, 0, 1, 1],
    [1, 0, 1, 1, 1, 0, 1, 0, 0, 1, 1],
    [1, 0, 1, 0, 0, 1, 1, 1, 0, 1, 1],
    [1, 1, 1, 0, 0, 1, 1, 0, 1, 0, 1],
    [1, 0, 0, 1, 0, 1, 0, 1, 1, 1, 1],
    [1, 1, 0, 1, 0, 1, 0, 1, 0, 1, 1],
    [1, 0, 0, 0, 1, 1, 0, 1, 0, 0, 1],
    [1, 1, 0, 0, 1, 1, 1, 1, 0, 1, 1],
    [1, 1, 1, 0, 1, 1, 1, 0, 0, 1, 0],
    [1, 0, 0, 1, 1, 1, 0, 0, 1, 0, 0],
    [1, 1, 0, 1, 1, 1, 1, 1, 0, 0, 0],
    [1, 0, 0, 0, 0, 1, 1, 0, 0, 0, 0],
    [1, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1],
    [1, 1, 0, 1, 0, 0, 0, 0, 0, 1, 1],
    [1, 0, 0, 0, 1, 0, 0, 1, 1, 0, 1],
    [1, 1, 1, 0, 1, 0, 0, 0, 1, 1, 1],
    [1, 1, 1, 1, 1, 0, 1, 1, 1, 1, 0],
    [1, 1, 0, 0, 0, 1, 1, 1, 0, 0, 1],
    [1, 0, 1, 1, 0, 1, 0, 0, 1, 1, 0],
    [1, 1, 1, 1, 0, 1, 0, 1, 1, 1, 0],
    [1, 0, 1, 0, 1, 1, 1, 0, 1, 0, 0],
    [1, 0, 1, 1, 1, 1, 1, 1, 1, 0, 0],
    [1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1],
    [1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
];

/// Row masks of the `(32, A)` code for each `A` (index `A`, empty below 3)
static BASIS_MASKS: [[u32; BASIS_LEN]; MAX_BLOCK_BITS + 1] = basis_masks();

/// Smallest `E` for which distinct payloads of `A` bits give distinct coded bits (index `A`)
const MIN_CODED_BITS: [usize; MAX_BLOCK_BITS + 1] = [0, 1, 2, 3, 5, 6, 11, 11, 11, 11, 11, 17];

/// Returns the smallest number of coded bits that can carry `a` bits, or `None` if `a` is not
/// in `[1, 11]`.
///
/// # Examples
///
/// ```
/// use nr_uci::block_code;
///
/// assert_eq!(block_code::min_coded_bits(1), Some(1));
/// assert_eq!(block_code::min_coded_bits(11), Some(17));
/// assert_eq!(block_code::min_coded_bits(12), None);
/// ```
#[must_use]
pub fn min_coded_bits(a: usize) -> Option<usize> {
    if (1 ..= MAX_BLOCK_BITS).contains(&a) {
        Some(MIN_CODED_BITS[a])
    } else {
        None
    }
}

/// Encodes `A = info_bits.len()` bits into `E = output.len()` coded bits.
///
/// # Errors
///
/// Returns an error if `A` is not in `[1, 11]` or if `E` is below the minimum for `A`.
///
/// # Examples
///
/// ```
/// use nr_uci::block_code;
/// use nr_uci::Bit::{One, Zero};
///
/// let mut output = [Zero; 7];
/// block_code::encode(&[One, Zero], &mut output)?;
/// assert_eq!(output, [One, Zero, One, One, Zero, One, One]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn encode(info_bits: &[Bit], output: &mut [Bit]) -> Result<(), Error> {
    let a = info_bits.len();
    check_lengths(a, output.len())?;
    let masks = row_masks(a);
    let value = common::pack_msb_first(info_bits);
    for (out, mask) in output.iter_mut().zip(masks.iter().cycle()) {
        *out = Bit::from_lsb((mask & value).count_ones());
    }
    Ok(())
}

/// Decodes `a` bits from the LLR values of the `E = llr.len()` coded bits.
///
/// The decoded bits are appended to `info_bits`. Returns the normalized correlation of the
/// selected codeword with the input, which is `1.0` for a noiseless input and at most `1.0`.
///
/// # Errors
///
/// Returns an error if `a` is not in `[1, 11]`, if `E` is below the minimum for `a`, or if the
/// LLR values carry no energy.
pub fn decode(llr: &[f32], a: usize, info_bits: &mut Vec<Bit>) -> Result<f32, Error> {
    let e = llr.len();
    check_lengths(a, e)?;
    let energy: f32 = llr.iter().map(|x| x * x).sum();
    if !energy.is_normal() {
        return Err(Error::DecodeRejected(
            "No signal energy in block code LLR values".to_string(),
        ));
    }
    let masks = row_masks(a);
    let mut folded = [0.0; BASIS_LEN];
    let folded = &mut folded[.. masks.len()];
    for (idx, &x) in llr.iter().enumerate() {
        folded[idx % masks.len()] += x;
    }
    let mut best_value = 0;
    let mut best_corr = f32::NEG_INFINITY;
    for value in 0 .. 1u32 << a {
        let corr: f32 = folded
            .iter()
            .zip(masks)
            .map(|(&x, mask)| x * Bit::from_lsb((mask & value).count_ones()).antipodal())
            .sum();
        if corr > best_corr {
            best_corr = corr;
            best_value = value;
        }
    }
    #[allow(clippy::cast_precision_loss)]
    let e_f32 = e as f32;
    let norm_corr = best_corr / ((energy / e_f32).sqrt() * e_f32);
    trace!(a, e, norm_corr, "Block code decoded");
    common::unpack_msb_first(best_value, a, info_bits);
    Ok(norm_corr)
}

/// Checks `a` and `e` against the block code limits.
fn check_lengths(a: usize, e: usize) -> Result<(), Error> {
    let min_e = min_coded_bits(a).ok_or_else(|| {
        Error::InvalidInput(format!(
            "Block code carries 1 to {MAX_BLOCK_BITS} bits (found {a})"
        ))
    })?;
    if e < min_e {
        return Err(Error::InvalidConfig(format!(
            "Block code needs at least {min_e} coded bits for {a} bits (found {e})"
        )));
    }
    Ok(())
}

/// Returns, for each position of one codeword period, the mask of the payload bits (first bit in
/// the MSB) whose sum gives the coded bit.
fn row_masks(a: usize) -> &'static [u32] {
    match a {
        1 => &[0b1],
        2 => &[0b10, 0b01, 0b11],
        _ => &BASIS_MASKS[a],
    }
}

/// Returns the row masks built from the first `A` basis sequences, for `A` in `[3, 11]`.
const fn basis_masks() -> [[u32; BASIS_LEN]; MAX_BLOCK_BITS + 1] {
    let mut table = [[0; BASIS_LEN]; MAX_BLOCK_BITS + 1];
    let mut a = 3;
    while a <= MAX_BLOCK_BITS {
        let mut row = 0;
        while row < BASIS_LEN {
            let mut mask = 0;
            let mut n = 0;
            while n < a {
                mask <<= 1;
                if BASIS_SEQUENCES[row][n] == 1 {
                    mask |= 1;
                }
                n += 1;
            }
            table[a][row] = mask;
            row += 1;
        }
        a += 1;
    }
    table
}
