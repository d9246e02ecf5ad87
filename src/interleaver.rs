//! Interleavers used in polar rate matching
//!
//! An [`Interleaver`] is a fixed permutation of `L` positions. Besides arbitrary permutations,
//! two patterns from 3GPP TS 38.212 section 5.4.1 are provided: the sub-block interleaver applied
//! to the `N` polar code bits, and the triangular (isosceles right triangle) channel interleaver
//! applied to the `E` rate-matched bits of UCI.

use crate::Error;

/// Sub-block interleaver pattern `P(i)` of Table 5.4.1.1-1 of 3GPP TS 38.212
const SUB_BLOCK_PATTERN: [usize; 32] = [
    0, 1, 2, 4, 3, 5, 6, 7, 8, 16, 9, 17, 10, 18, 11, 19, 12, 20, 13, 21, 14, 22, 15, 23, 24, 25,
    26, 28, 27, 29, 30, 31,
];

/// Interleaver for sequences of a given length
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Interleaver {
    /// Length of input/output sequence
    pub(crate) length: usize,
    /// Input index for each output index (needed in interleaving)
    pub(crate) all_in_index_given_out_index: Vec<usize>,
    /// Output index for each input index (needed in deinterleaving)
    pub(crate) all_out_index_given_in_index: Vec<usize>,
}

impl Interleaver {
    /// Returns interleaver corresponding to a given permutation.
    ///
    /// # Parameters
    ///
    /// - `perm`: Permutation of integers in `[0, L)` for some positive integer `L`. If the
    ///   interleaver input is the sequence `x[0], x[1], ..., x[L-1]`, then its output is the
    ///   sequence `x[perm[0]], x[perm[1]], ..., x[perm[L-1]]`.
    ///
    /// # Errors
    ///
    /// Returns an error if `perm` is not a permutation of the integers in `[0, L)` for some
    /// positive integer `L`.
    ///
    /// # Examples
    ///
    /// ```
    /// use nr_uci::Interleaver;
    ///
    /// let perm = [0, 3, 2, 5, 4, 7, 6, 1];
    /// let interleaver = Interleaver::new(&perm)?;
    /// assert_eq!(interleaver.len(), 8);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(perm: &[usize]) -> Result<Self, Error> {
        if perm.is_empty() {
            return Err(Error::InvalidInput(
                "Permutation defining interleaver cannot be empty".to_string(),
            ));
        }
        let mut seen = vec![false; perm.len()];
        for &idx in perm {
            if idx >= perm.len() || seen[idx] {
                return Err(Error::InvalidInput(format!(
                    "Expected permutation of all integers in the range [0, {}), found {:?}",
                    perm.len(),
                    perm
                )));
            }
            seen[idx] = true;
        }
        Ok(Self::from_valid_perm(perm.to_vec()))
    }

    /// Returns the sub-block interleaver for a polar mother code of length `n`.
    ///
    /// Output bit `k` is input bit `J(k) = P(i) * (n / 32) + k mod (n / 32)`, where
    /// `i = floor(32 * k / n)` and `P` is the 32-entry pattern of 3GPP TS 38.212.
    ///
    /// # Errors
    ///
    /// Returns an error if `n` is not a power of 2 greater than or equal to 32.
    ///
    /// # Examples
    ///
    /// ```
    /// use nr_uci::Interleaver;
    ///
    /// let interleaver = Interleaver::polar_sub_block(64)?;
    /// let input: Vec<usize> = (0 .. 64).collect();
    /// let mut output = vec![0; 64];
    /// interleaver.interleave(&input, &mut output)?;
    /// assert_eq!(output[4 .. 10], [4, 5, 8, 9, 6, 7]);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn polar_sub_block(n: usize) -> Result<Self, Error> {
        if n < 32 || !n.is_power_of_two() {
            return Err(Error::InvalidInput(format!(
                "Sub-block interleaver length must be a power of 2 no less than 32 (found {n})"
            )));
        }
        let sub_block_len = n / 32;
        let perm = (0 .. n)
            .map(|k| SUB_BLOCK_PATTERN[k / sub_block_len] * sub_block_len + k % sub_block_len)
            .collect();
        Ok(Self::from_valid_perm(perm))
    }

    /// Returns the triangular channel interleaver for `e` rate-matched bits.
    ///
    /// The input is written row by row into an isosceles right triangle with `T` columns (the
    /// smallest `T` with `T * (T + 1) / 2 >= e`) and read column by column, skipping the unused
    /// cells at the end of the last rows.
    ///
    /// # Errors
    ///
    /// Returns an error if `e` is `0`.
    ///
    /// # Examples
    ///
    /// ```
    /// use nr_uci::Interleaver;
    ///
    /// let interleaver = Interleaver::triangular(6)?;
    /// let mut output = ['-'; 6];
    /// interleaver.interleave(&['a', 'b', 'c', 'd', 'e', 'f'], &mut output)?;
    /// assert_eq!(output, ['a', 'd', 'f', 'b', 'e', 'c']);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn triangular(e: usize) -> Result<Self, Error> {
        if e == 0 {
            return Err(Error::InvalidInput(
                "Length of interleaver must be a positive integer".to_string(),
            ));
        }
        let mut num_cols = 0;
        while num_cols * (num_cols + 1) / 2 < e {
            num_cols += 1;
        }
        // Row `i` holds `num_cols - i` cells and starts at input index `row_start[i]`.
        let row_start: Vec<usize> = (0 .. num_cols)
            .scan(0, |start, i| {
                let this = *start;
                *start += num_cols - i;
                Some(this)
            })
            .collect();
        let mut perm = Vec::with_capacity(e);
        for col in 0 .. num_cols {
            for &start in row_start.iter().take(num_cols - col) {
                let in_index = start + col;
                if in_index < e {
                    perm.push(in_index);
                }
            }
        }
        Ok(Self::from_valid_perm(perm))
    }

    /// Returns the length of the input/output sequence.
    #[must_use]
    pub fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if the interleaver has zero length.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Generates interleaver output given its input.
    ///
    /// # Parameters
    ///
    /// - `input`: Interleaver input.
    ///
    /// - `output`: Buffer for interleaver output.
    ///
    /// # Errors
    ///
    /// Returns an error if `input.len()` or `output.len()` is not equal to `self.len()`.
    ///
    /// # Examples
    ///
    /// ```
    /// use nr_uci::Interleaver;
    ///
    /// let perm = [0, 3, 2, 5, 4, 7, 6, 1];
    /// let interleaver = Interleaver::new(&perm)?;
    /// let input = ['a', 'b', 'c', 'd', 'e', 'f', 'g', 'h'];
    /// let mut output = ['-'; 8];
    /// interleaver.interleave(&input, &mut output)?;
    /// assert_eq!(output, ['a', 'd', 'c', 'f', 'e', 'h', 'g', 'b']);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn interleave<T: Copy>(&self, input: &[T], output: &mut [T]) -> Result<(), Error> {
        self.check_lengths(input.len(), output.len())?;
        for (out, &in_index) in output.iter_mut().zip(&self.all_in_index_given_out_index) {
            *out = input[in_index];
        }
        Ok(())
    }

    /// Generates interleaver input given its output.
    ///
    /// # Parameters
    ///
    /// - `output`: Interleaver output.
    ///
    /// - `input`: Buffer for interleaver input.
    ///
    /// # Errors
    ///
    /// Returns an error if `output.len()` or `input.len()` is not equal to `self.len()`.
    ///
    /// # Examples
    ///
    /// ```
    /// use nr_uci::Interleaver;
    ///
    /// let perm = [0, 3, 2, 5, 4, 7, 6, 1];
    /// let interleaver = Interleaver::new(&perm)?;
    /// let output = ['a', 'd', 'c', 'f', 'e', 'h', 'g', 'b'];
    /// let mut input = ['-'; 8];
    /// interleaver.deinterleave(&output, &mut input)?;
    /// assert_eq!(input, ['a', 'b', 'c', 'd', 'e', 'f', 'g', 'h']);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn deinterleave<T: Copy>(&self, output: &[T], input: &mut [T]) -> Result<(), Error> {
        self.check_lengths(output.len(), input.len())?;
        for (inp, &out_index) in input.iter_mut().zip(&self.all_out_index_given_in_index) {
            *inp = output[out_index];
        }
        Ok(())
    }

    /// Checks that both sequences have the interleaver length.
    fn check_lengths(&self, src_len: usize, dst_len: usize) -> Result<(), Error> {
        if src_len != self.length || dst_len != self.length {
            return Err(Error::InvalidInput(format!(
                "Invalid interleaver sequence lengths (expected {}, found {} and {})",
                self.length, src_len, dst_len
            )));
        }
        Ok(())
    }

    /// Returns interleaver corresponding to a valid permutation.
    fn from_valid_perm(perm_vec: Vec<usize>) -> Self {
        let length = perm_vec.len();
        let mut all_out_index_given_in_index = vec![0; length];
        for (out_index, &in_index) in perm_vec.iter().enumerate() {
            all_out_index_given_in_index[in_index] = out_index;
        }
        Self {
            length,
            all_in_index_given_out_index: perm_vec,
            all_out_index_given_in_index,
        }
    }
}

#[cfg(test)]
mod tests_of_interleaver {
    use super::*;

    #[test]
    fn test_new() {
        // Invalid input
        assert!(Interleaver::new(&[]).is_err());
        assert!(Interleaver::new(&[1, 2, 3, 4]).is_err());
        assert!(Interleaver::new(&[0, 1, 2, 4]).is_err());
        assert!(Interleaver::new(&[0, 0, 1, 2]).is_err());
        // Valid input
        let interleaver = Interleaver::new(&[0, 3, 2, 5, 4, 7, 6, 1]).unwrap();
        assert_eq!(interleaver.length, 8);
        assert_eq!(
            interleaver.all_in_index_given_out_index,
            [0, 3, 2, 5, 4, 7, 6, 1]
        );
        assert_eq!(
            interleaver.all_out_index_given_in_index,
            [0, 7, 2, 1, 4, 3, 6, 5]
        );
    }

    #[test]
    fn test_polar_sub_block() {
        // Invalid input
        assert!(Interleaver::polar_sub_block(16).is_err());
        assert!(Interleaver::polar_sub_block(96).is_err());
        // Valid input
        let interleaver = Interleaver::polar_sub_block(32).unwrap();
        assert_eq!(interleaver.all_in_index_given_out_index, SUB_BLOCK_PATTERN);
        let interleaver = Interleaver::polar_sub_block(64).unwrap();
        assert_eq!(
            interleaver.all_in_index_given_out_index[.. 16],
            [0, 1, 2, 3, 4, 5, 8, 9, 6, 7, 10, 11, 12, 13, 14, 15]
        );
        for n in [128, 256, 512, 1024] {
            let interleaver = Interleaver::polar_sub_block(n).unwrap();
            assert!(Interleaver::new(&interleaver.all_in_index_given_out_index).is_ok());
            assert_eq!(interleaver.all_in_index_given_out_index[n - 1], n - 1);
        }
    }

    #[test]
    fn test_triangular() {
        // Invalid input
        assert!(Interleaver::triangular(0).is_err());
        // Valid input
        assert_eq!(
            Interleaver::triangular(1).unwrap().all_in_index_given_out_index,
            [0]
        );
        assert_eq!(
            Interleaver::triangular(6).unwrap().all_in_index_given_out_index,
            [0, 3, 5, 1, 4, 2]
        );
        assert_eq!(
            Interleaver::triangular(10)
                .unwrap()
                .all_in_index_given_out_index,
            [0, 4, 7, 9, 1, 5, 8, 2, 6, 3]
        );
        for e in [7, 100, 1000, 5376] {
            let interleaver = Interleaver::triangular(e).unwrap();
            assert!(Interleaver::new(&interleaver.all_in_index_given_out_index).is_ok());
        }
    }

    #[test]
    fn test_interleave() {
        let interleaver = Interleaver::new(&[0, 3, 2, 5, 4, 7, 6, 1]).unwrap();
        let mut output = ['-'; 8];
        // Invalid input
        let input = ['a', 'b', 'c', 'd', 'e', 'f', 'g'];
        assert!(interleaver.interleave(&input, &mut output).is_err());
        // Valid input
        let input = ['a', 'b', 'c', 'd', 'e', 'f', 'g', 'h'];
        for _ in 0 .. 2 {
            interleaver.interleave(&input, &mut output).unwrap();
            assert_eq!(output, ['a', 'd', 'c', 'f', 'e', 'h', 'g', 'b']);
        }
    }

    #[test]
    fn test_deinterleave() {
        let interleaver = Interleaver::new(&[0, 3, 2, 5, 4, 7, 6, 1]).unwrap();
        let mut input = ['-'; 8];
        // Invalid output
        let output = ['a', 'd', 'c', 'f', 'e', 'h', 'g'];
        assert!(interleaver.deinterleave(&output, &mut input).is_err());
        // Valid output
        let output = ['a', 'd', 'c', 'f', 'e', 'h', 'g', 'b'];
        for _ in 0 .. 2 {
            interleaver.deinterleave(&output, &mut input).unwrap();
            assert_eq!(input, ['a', 'b', 'c', 'd', 'e', 'f', 'g', 'h']);
        }
    }

    #[test]
    fn test_from_valid_perm() {
        let interleaver = Interleaver::from_valid_perm(vec![0, 3, 2, 5, 4, 7, 6, 1]);
        assert_eq!(interleaver.length, 8);
        assert_eq!(
            interleaver.all_out_index_given_in_index,
            [0, 7, 2, 1, 4, 3, 6, 5]
        );
    }
}
