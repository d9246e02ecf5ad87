//! Polar transform
//!
//! The encoder computes `x = u G_N` with `G_N` the `n`-th Kronecker power of `[[1, 0], [1, 1]]`.
//! Two kernels are available: a portable element-by-element loop and a lane-parallel loop that
//! processes fixed-width chunks the compiler can map onto vector instructions. Both produce
//! identical results.

use serde::{Deserialize, Serialize};

use crate::{Bit, Error};

/// Number of elements processed together by the lane-parallel kernel
pub(crate) const LANES: usize = 16;

/// Enumeration of polar kernel implementations
#[derive(Clone, Copy, Eq, Hash, PartialEq, Debug, Default, Deserialize, Serialize)]
pub enum Kernel {
    /// Element-by-element loops
    Portable,
    /// Fixed-width chunked loops
    #[default]
    Lanes,
}

impl Kernel {
    /// Returns the kernel to use given whether vectorisation is disabled.
    #[must_use]
    pub fn select(disable_simd: bool) -> Self {
        if disable_simd {
            Kernel::Portable
        } else {
            Kernel::Lanes
        }
    }
}

/// Polar encoder for mother codes up to a maximum length
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct PolarEncoder {
    /// Kernel implementation
    kernel: Kernel,
    /// Maximum `log2(N)`
    n_max_log: usize,
}

impl PolarEncoder {
    /// Returns polar encoder.
    ///
    /// # Parameters
    ///
    /// - `kernel`: Kernel implementation.
    ///
    /// - `n_max_log`: Maximum `log2(N)` of the codes to be encoded.
    #[must_use]
    pub fn new(kernel: Kernel, n_max_log: usize) -> Self {
        Self { kernel, n_max_log }
    }

    /// Computes the polar transform of `input` into `output`.
    ///
    /// # Errors
    ///
    /// Returns an error if the lengths differ, or if the length is not a power of 2 no greater
    /// than `2^n_max_log`.
    ///
    /// # Examples
    ///
    /// ```
    /// use nr_uci::polar_encoder::{Kernel, PolarEncoder};
    /// use nr_uci::Bit::{One, Zero};
    ///
    /// let encoder = PolarEncoder::new(Kernel::Portable, 10);
    /// let mut output = [Zero; 4];
    /// encoder.encode(&[Zero, One, Zero, One], &mut output)?;
    /// assert_eq!(output, [Zero, Zero, One, One]);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn encode(&self, input: &[Bit], output: &mut [Bit]) -> Result<(), Error> {
        let n = input.len();
        if output.len() != n || !n.is_power_of_two() || n > 1 << self.n_max_log {
            return Err(Error::InvalidInput(format!(
                "Polar encoder expects input and output of equal power-of-2 length up to {} \
                 (found {} and {})",
                1 << self.n_max_log,
                n,
                output.len()
            )));
        }
        output.copy_from_slice(input);
        let mut half = 1;
        while half < n {
            for block in output.chunks_exact_mut(2 * half) {
                let (lo, hi) = block.split_at_mut(half);
                xor_into(self.kernel, lo, hi);
            }
            half *= 2;
        }
        Ok(())
    }
}

/// Replaces each element of `lo` with its XOR with the matching element of `hi`.
pub(crate) fn xor_into(kernel: Kernel, lo: &mut [Bit], hi: &[Bit]) {
    match kernel {
        Kernel::Portable => {
            for (a, &b) in lo.iter_mut().zip(hi) {
                *a ^= b;
            }
        }
        Kernel::Lanes => {
            let mut lo_chunks = lo.chunks_exact_mut(LANES);
            let mut hi_chunks = hi.chunks_exact(LANES);
            for (a, b) in (&mut lo_chunks).zip(&mut hi_chunks) {
                for lane in 0 .. LANES {
                    a[lane] ^= b[lane];
                }
            }
            for (a, &b) in lo_chunks.into_remainder().iter_mut().zip(hi_chunks.remainder()) {
                *a ^= b;
            }
        }
    }
}

#[cfg(test)]
mod tests_of_polar_encoder {
    use super::*;
    use crate::utils;
    use Bit::{One, Zero};

    #[test]
    fn test_select() {
        assert_eq!(Kernel::select(true), Kernel::Portable);
        assert_eq!(Kernel::select(false), Kernel::Lanes);
    }

    #[test]
    fn test_encode() {
        let encoder = PolarEncoder::new(Kernel::Portable, 5);
        let mut output = [Zero; 8];
        // Invalid input
        assert!(encoder.encode(&[Zero; 8], &mut output[.. 4]).is_err());
        assert!(encoder.encode(&[Zero; 6], &mut output[.. 6]).is_err());
        assert!(encoder
            .encode(&[Zero; 64], &mut [Zero; 64])
            .is_err());
        // Valid input
        encoder.encode(&[One, Zero], &mut output[.. 2]).unwrap();
        assert_eq!(output[.. 2], [One, Zero]);
        encoder.encode(&[Zero, One], &mut output[.. 2]).unwrap();
        assert_eq!(output[.. 2], [One, One]);
        // Last input bit drives every output bit
        let mut input = [Zero; 8];
        input[7] = One;
        encoder.encode(&input, &mut output).unwrap();
        assert_eq!(output, [One; 8]);
        // First input bit drives only the first output bit
        let mut input = [Zero; 8];
        input[0] = One;
        encoder.encode(&input, &mut output).unwrap();
        assert_eq!(output, [One, Zero, Zero, Zero, Zero, Zero, Zero, Zero]);
    }

    #[test]
    fn test_encode_is_involution() {
        for kernel in [Kernel::Portable, Kernel::Lanes] {
            let encoder = PolarEncoder::new(kernel, 10);
            let input = utils::random_bits(1024);
            let mut codeword = vec![Zero; 1024];
            let mut recovered = vec![Zero; 1024];
            encoder.encode(&input, &mut codeword).unwrap();
            encoder.encode(&codeword, &mut recovered).unwrap();
            assert_eq!(recovered, input);
        }
    }

    #[test]
    fn test_kernels_agree() {
        let portable = PolarEncoder::new(Kernel::Portable, 10);
        let lanes = PolarEncoder::new(Kernel::Lanes, 10);
        for n in [32, 64, 256, 1024] {
            let input = utils::random_bits(n);
            let mut x_portable = vec![Zero; n];
            let mut x_lanes = vec![One; n];
            portable.encode(&input, &mut x_portable).unwrap();
            lanes.encode(&input, &mut x_lanes).unwrap();
            assert_eq!(x_portable, x_lanes);
        }
    }

    #[test]
    fn test_xor_into() {
        let mut lo = vec![Zero; 20];
        let hi: Vec<Bit> = (0 .. 20).map(Bit::from_lsb).collect();
        xor_into(Kernel::Lanes, &mut lo, &hi);
        assert_eq!(lo, hi);
        xor_into(Kernel::Portable, &mut lo, &hi);
        assert!(lo.iter().all(|&b| b == Zero));
    }
}
