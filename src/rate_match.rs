//! Rate matching for polar-coded UCI
//!
//! The `N` polar code bits go through the sub-block interleaver, then bit selection produces the
//! `E` transmitted bits by repetition (`E >= N`), puncturing of the first `N - E` interleaved bits,
//! or shortening of the last `N - E` interleaved bits. For UCI the selected bits then go through
//! the triangular channel interleaver (3GPP TS 38.212 section 5.4.1 with `I_BIL = 1`).
//!
//! De-rate-matching reverses these steps on LLR values. Repeated positions are combined by
//! addition, punctured positions get a neutral LLR of `0`, and shortened positions are known to
//! be `Zero` and get [`KNOWN_ZERO_LLR`].

use crate::polar_code::N_MIN_LOG;
use crate::{Bit, Error, Interleaver};

/// LLR value assigned to bits known to be `Zero`
pub const KNOWN_ZERO_LLR: f32 = 1.0e6;

/// Enumeration of bit selection modes
#[derive(Clone, Copy, Eq, Hash, PartialEq, Debug)]
pub enum RateMatchMode {
    /// `E >= N`: code bits are repeated cyclically
    Repetition,
    /// `E < N` and `16 K <= 7 E`: the first `N - E` interleaved bits are not transmitted
    Puncturing,
    /// `E < N` and `16 K > 7 E`: the last `N - E` interleaved bits are not transmitted
    Shortening,
}

impl RateMatchMode {
    /// Returns the bit selection mode for `k` information bits, `e` rate-matched bits, and mother
    /// code length `n`.
    ///
    /// # Examples
    ///
    /// ```
    /// use nr_uci::rate_match::RateMatchMode;
    ///
    /// assert_eq!(RateMatchMode::select(31, 100, 128), RateMatchMode::Puncturing);
    /// assert_eq!(RateMatchMode::select(100, 120, 128), RateMatchMode::Shortening);
    /// ```
    #[must_use]
    pub fn select(k: usize, e: usize, n: usize) -> Self {
        if e >= n {
            RateMatchMode::Repetition
        } else if 16 * k <= 7 * e {
            RateMatchMode::Puncturing
        } else {
            RateMatchMode::Shortening
        }
    }
}

/// Rate matcher and de-rate-matcher for polar-coded UCI
#[derive(Clone, Debug)]
pub struct RateMatcher {
    /// Sub-block interleavers, one per `log2(N)` from 5 up to the maximum
    sub_block: Vec<Interleaver>,
    /// Channel interleaver for the most recent `E`
    channel: Option<Interleaver>,
    /// Bits after sub-block interleaving
    y_bits: Vec<Bit>,
    /// Bits after bit selection
    e_bits: Vec<Bit>,
    /// LLR values after channel deinterleaving
    e_llr: Vec<f32>,
    /// LLR values before sub-block deinterleaving
    y_llr: Vec<f32>,
}

impl RateMatcher {
    /// Returns rate matcher for mother codes of length up to `2^n_max_log`.
    ///
    /// # Errors
    ///
    /// Returns an error if `n_max_log < 5`.
    pub fn new(n_max_log: usize) -> Result<Self, Error> {
        if n_max_log < N_MIN_LOG {
            return Err(Error::InvalidInput(format!(
                "Maximum polar code length exponent must be at least {N_MIN_LOG} (found \
                 {n_max_log})"
            )));
        }
        let sub_block = (N_MIN_LOG ..= n_max_log)
            .map(|n_log| Interleaver::polar_sub_block(1 << n_log))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            sub_block,
            channel: None,
            y_bits: Vec::new(),
            e_bits: Vec::new(),
            e_llr: Vec::new(),
            y_llr: Vec::new(),
        })
    }

    /// Generates the `E = output.len()` rate-matched bits from the `N = codeword.len()` polar code
    /// bits.
    ///
    /// # Parameters
    ///
    /// - `codeword`: Polar code bits.
    ///
    /// - `k`: Number of information bits (payload plus CRC), which decides between puncturing and
    ///   shortening.
    ///
    /// - `output`: Buffer for the rate-matched bits.
    ///
    /// # Errors
    ///
    /// Returns an error if `N` is not a supported mother code length or if `E` is `0`.
    pub fn rate_match(
        &mut self,
        codeword: &[Bit],
        k: usize,
        output: &mut [Bit],
    ) -> Result<(), Error> {
        let n = codeword.len();
        let e = output.len();
        self.prepare(n, e)?;
        let sub_block = &self.sub_block[n.trailing_zeros() as usize - N_MIN_LOG];
        self.y_bits.resize(n, Bit::Zero);
        sub_block.interleave(codeword, &mut self.y_bits)?;
        self.e_bits.clear();
        match RateMatchMode::select(k, e, n) {
            RateMatchMode::Repetition => {
                self.e_bits.extend(self.y_bits.iter().cycle().take(e));
            }
            RateMatchMode::Puncturing => self.e_bits.extend_from_slice(&self.y_bits[n - e ..]),
            RateMatchMode::Shortening => self.e_bits.extend_from_slice(&self.y_bits[.. e]),
        }
        let channel = self.channel.as_ref().ok_or_else(missing_channel_interleaver)?;
        channel.interleave(&self.e_bits, output)
    }

    /// Recovers LLR values for the `N = output.len()` polar code bits from those of the
    /// `E = llr.len()` rate-matched bits.
    ///
    /// # Parameters
    ///
    /// - `llr`: LLR values of the rate-matched bits, with positive values indicating that `Zero`
    ///   is more likely.
    ///
    /// - `k`: Number of information bits (payload plus CRC).
    ///
    /// - `output`: Buffer for the LLR values of the polar code bits.
    ///
    /// # Errors
    ///
    /// Returns an error if `N` is not a supported mother code length or if `E` is `0`.
    pub fn derate_match(
        &mut self,
        llr: &[f32],
        k: usize,
        output: &mut [f32],
    ) -> Result<(), Error> {
        let n = output.len();
        let e = llr.len();
        self.prepare(n, e)?;
        self.e_llr.resize(e, 0.0);
        let channel = self.channel.as_ref().ok_or_else(missing_channel_interleaver)?;
        channel.deinterleave(llr, &mut self.e_llr)?;
        self.y_llr.resize(n, 0.0);
        match RateMatchMode::select(k, e, n) {
            RateMatchMode::Repetition => {
                self.y_llr.fill(0.0);
                for (idx, &x) in self.e_llr.iter().enumerate() {
                    self.y_llr[idx % n] += x;
                }
            }
            RateMatchMode::Puncturing => {
                self.y_llr[.. n - e].fill(0.0);
                self.y_llr[n - e ..].copy_from_slice(&self.e_llr);
            }
            RateMatchMode::Shortening => {
                self.y_llr[.. e].copy_from_slice(&self.e_llr);
                self.y_llr[e ..].fill(KNOWN_ZERO_LLR);
            }
        }
        let sub_block = &self.sub_block[n.trailing_zeros() as usize - N_MIN_LOG];
        sub_block.deinterleave(&self.y_llr, output)
    }

    /// Checks the lengths and makes the channel interleaver match `e`.
    fn prepare(&mut self, n: usize, e: usize) -> Result<(), Error> {
        let n_max = 1 << (N_MIN_LOG + self.sub_block.len() - 1);
        if !n.is_power_of_two() || n < 1 << N_MIN_LOG || n > n_max {
            return Err(Error::InvalidInput(format!(
                "Mother code length must be a power of 2 in [{}, {}] (found {})",
                1 << N_MIN_LOG,
                n_max,
                n
            )));
        }
        if e == 0 {
            return Err(Error::InvalidInput(
                "Number of rate-matched bits must be positive".to_string(),
            ));
        }
        if self.channel.as_ref().map_or(true, |c| c.len() != e) {
            self.channel = Some(Interleaver::triangular(e)?);
        }
        Ok(())
    }
}

/// Returns the error for a channel interleaver that was never set up.
fn missing_channel_interleaver() -> Error {
    Error::InvalidInput("Channel interleaver used before being set up".to_string())
}

#[cfg(test)]
mod tests_of_rate_match {
    use float_eq::assert_float_eq;

    use super::*;
    use crate::utils;
    use Bit::{One, Zero};

    /// Returns the LLR values of `bits` with unit magnitude.
    fn unit_llr(bits: &[Bit]) -> Vec<f32> {
        bits.iter().map(|b| b.antipodal()).collect()
    }

    #[test]
    fn test_select() {
        assert_eq!(RateMatchMode::select(31, 128, 128), RateMatchMode::Repetition);
        assert_eq!(RateMatchMode::select(31, 300, 256), RateMatchMode::Repetition);
        assert_eq!(RateMatchMode::select(31, 100, 128), RateMatchMode::Puncturing);
        assert_eq!(RateMatchMode::select(35, 80, 128), RateMatchMode::Puncturing);
        assert_eq!(RateMatchMode::select(36, 80, 128), RateMatchMode::Shortening);
        assert_eq!(RateMatchMode::select(100, 120, 128), RateMatchMode::Shortening);
    }

    #[test]
    fn test_new() {
        assert!(RateMatcher::new(4).is_err());
        assert_eq!(RateMatcher::new(10).unwrap().sub_block.len(), 6);
    }

    #[test]
    fn test_rate_match() {
        let mut matcher = RateMatcher::new(10).unwrap();
        let mut output = vec![Zero; 100];
        // Invalid input
        assert!(matcher.rate_match(&[Zero; 16], 10, &mut output).is_err());
        assert!(matcher.rate_match(&[Zero; 48], 10, &mut output).is_err());
        assert!(matcher.rate_match(&vec![Zero; 2048], 10, &mut output).is_err());
        assert!(matcher.rate_match(&[Zero; 32], 10, &mut []).is_err());
        // Valid input: the transmitted bits are a permutation of the selected code bits
        let codeword = utils::random_bits(128);
        matcher.rate_match(&codeword, 31, &mut output).unwrap();
        let ones = |bits: &[Bit]| bits.iter().filter(|&&b| b == One).count();
        assert_eq!(ones(&output), ones(&matcher.e_bits));
        assert_eq!(matcher.e_bits[..], matcher.y_bits[28 ..]);
    }

    #[test]
    fn test_derate_match_repetition() {
        let mut matcher = RateMatcher::new(10).unwrap();
        let codeword = utils::random_bits(256);
        let mut tx = vec![Zero; 300];
        matcher.rate_match(&codeword, 31, &mut tx).unwrap();
        let mut llr = vec![0.0; 256];
        matcher.derate_match(&unit_llr(&tx), 31, &mut llr).unwrap();
        for (&b, &x) in codeword.iter().zip(&llr) {
            assert!(x * b.antipodal() >= 1.0);
        }
        let total: f32 = llr.iter().map(|x| x.abs()).sum();
        assert_float_eq!(total, 300.0, abs <= 1e-3);
    }

    #[test]
    fn test_derate_match_puncturing() {
        let mut matcher = RateMatcher::new(10).unwrap();
        let codeword = utils::random_bits(128);
        let mut tx = vec![Zero; 100];
        matcher.rate_match(&codeword, 31, &mut tx).unwrap();
        let mut llr = vec![5.0; 128];
        matcher.derate_match(&unit_llr(&tx), 31, &mut llr).unwrap();
        let punctured = &matcher.sub_block[2].all_in_index_given_out_index[.. 28];
        for (idx, (&b, &x)) in codeword.iter().zip(&llr).enumerate() {
            if punctured.contains(&idx) {
                assert_float_eq!(x, 0.0, abs <= 0.0);
            } else {
                assert_float_eq!(x, b.antipodal(), abs <= 0.0);
            }
        }
    }

    #[test]
    fn test_derate_match_shortening() {
        let mut matcher = RateMatcher::new(10).unwrap();
        let codeword = utils::random_bits(128);
        let mut tx = vec![Zero; 120];
        matcher.rate_match(&codeword, 100, &mut tx).unwrap();
        let mut llr = vec![0.0; 128];
        matcher.derate_match(&unit_llr(&tx), 100, &mut llr).unwrap();
        let shortened = &matcher.sub_block[2].all_in_index_given_out_index[120 ..];
        for (idx, (&b, &x)) in codeword.iter().zip(&llr).enumerate() {
            if shortened.contains(&idx) {
                assert_float_eq!(x, KNOWN_ZERO_LLR, abs <= 0.0);
            } else {
                assert_float_eq!(x, b.antipodal(), abs <= 0.0);
            }
        }
    }

    #[test]
    fn test_channel_interleaver_cache() {
        let mut matcher = RateMatcher::new(10).unwrap();
        let mut tx = vec![Zero; 100];
        matcher.rate_match(&[One; 128], 31, &mut tx).unwrap();
        assert_eq!(matcher.channel.as_ref().map(Interleaver::len), Some(100));
        let mut tx = vec![Zero; 60];
        matcher.rate_match(&[One; 64], 20, &mut tx).unwrap();
        assert_eq!(matcher.channel.as_ref().map(Interleaver::len), Some(60));
        assert!(tx.iter().all(|&b| b == One));
    }
}
