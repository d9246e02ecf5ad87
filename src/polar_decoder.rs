//! Successive-cancellation polar decoder
//!
//! The decoder walks the polar code tree depth first. Each node of length `2h` computes the
//! min-sum `f` update for its left child, decodes it, computes the `g` update for its right child
//! using the left child's partial sums, decodes it, and combines both partial sums. Leaves take a
//! hard decision on information bits, set frozen bits to zero, and obtain parity-check bits from
//! the same five-bit shift register used by the encoder's channel allocation.
//!
//! LLR values are positive when `Zero` is more likely. The working buffers are allocated once for
//! the largest supported code and reused across calls.

use crate::polar_code::{BitRole, ParityRegister, PolarCode};
use crate::polar_encoder::{self, Kernel, LANES};
use crate::{Bit, Error};

/// Successive-cancellation decoder for polar codes up to a maximum length
#[derive(Clone, Debug)]
pub struct PolarDecoder {
    /// Kernel implementation
    kernel: Kernel,
    /// Maximum `log2(N)`
    n_max_log: usize,
    /// LLR values; a node of length `L` reads its input from `alpha[L .. 2 * L]`
    alpha: Vec<f32>,
    /// Partial sums (re-encoded decisions) of every decoded node, indexed like the codeword
    beta: Vec<Bit>,
}

impl PolarDecoder {
    /// Returns polar decoder.
    ///
    /// # Parameters
    ///
    /// - `kernel`: Kernel implementation.
    ///
    /// - `n_max_log`: Maximum `log2(N)` of the codes to be decoded.
    ///
    /// # Errors
    ///
    /// Returns an error if the working buffers cannot be allocated.
    pub fn new(kernel: Kernel, n_max_log: usize) -> Result<Self, Error> {
        let n_max = 1 << n_max_log;
        let mut alpha = Vec::new();
        alpha
            .try_reserve_exact(2 * n_max)
            .map_err(|e| Error::AllocationFailure(format!("Polar decoder LLR buffer: {e}")))?;
        alpha.resize(2 * n_max, 0.0);
        let mut beta = Vec::new();
        beta.try_reserve_exact(n_max)
            .map_err(|e| Error::AllocationFailure(format!("Polar decoder bit buffer: {e}")))?;
        beta.resize(n_max, Bit::Zero);
        Ok(Self {
            kernel,
            n_max_log,
            alpha,
            beta,
        })
    }

    /// Decodes the `N` encoder input bits of a polar code from the LLR values of its codeword.
    ///
    /// # Parameters
    ///
    /// - `code`: Polar code description.
    ///
    /// - `codeword_llr`: LLR values for the `N` codeword bits, with positive values indicating
    ///   that `Zero` is more likely. Any finite values are accepted.
    ///
    /// - `input_hat`: Buffer of length `N` for the decisions on the encoder input bits.
    ///
    /// # Errors
    ///
    /// Returns an error if `codeword_llr` or `input_hat` does not have length `N`, or if `N`
    /// exceeds the maximum length of the decoder.
    pub fn decode(
        &mut self,
        code: &PolarCode,
        codeword_llr: &[f32],
        input_hat: &mut [Bit],
    ) -> Result<(), Error> {
        let n = code.n();
        if code.n_log() > self.n_max_log {
            return Err(Error::InvalidInput(format!(
                "Polar code length {} exceeds decoder maximum {}",
                n,
                1 << self.n_max_log
            )));
        }
        if codeword_llr.len() != n || input_hat.len() != n {
            return Err(Error::InvalidInput(format!(
                "Polar decoder expects {} LLR values and {} output bits (found {} and {})",
                n,
                n,
                codeword_llr.len(),
                input_hat.len()
            )));
        }
        self.alpha[n .. 2 * n].copy_from_slice(codeword_llr);
        let mut node = Node {
            kernel: self.kernel,
            roles: code.roles(),
            alpha: &mut self.alpha[.. 2 * n],
            beta: &mut self.beta[.. n],
            input_hat,
            register: ParityRegister::default(),
        };
        node.decode(0, n);
        Ok(())
    }
}

/// State shared by all nodes during one decoding pass
struct Node<'a> {
    kernel: Kernel,
    roles: &'a [BitRole],
    alpha: &'a mut [f32],
    beta: &'a mut [Bit],
    input_hat: &'a mut [Bit],
    register: ParityRegister,
}

impl Node<'_> {
    /// Decodes the node covering codeword positions `offset .. offset + len`.
    fn decode(&mut self, offset: usize, len: usize) {
        if len == 1 {
            self.decide_leaf(offset);
            return;
        }
        let half = len / 2;
        {
            let (child, parent) = self.alpha.split_at_mut(len);
            let (a, b) = parent[.. len].split_at(half);
            f_update(self.kernel, a, b, &mut child[half ..]);
        }
        self.decode(offset, half);
        {
            let (child, parent) = self.alpha.split_at_mut(len);
            let (a, b) = parent[.. len].split_at(half);
            g_update(
                self.kernel,
                a,
                b,
                &self.beta[offset .. offset + half],
                &mut child[half ..],
            );
        }
        self.decode(offset + half, half);
        let (left, right) = self.beta[offset .. offset + len].split_at_mut(half);
        polar_encoder::xor_into(self.kernel, left, right);
    }

    /// Decides encoder input bit `idx` from the leaf LLR value in `alpha[1]`.
    fn decide_leaf(&mut self, idx: usize) {
        self.register.advance();
        let bit = match self.roles[idx] {
            BitRole::Frozen => Bit::Zero,
            BitRole::ParityCheck => self.register.emit_parity(),
            BitRole::Info => {
                let bit = hard_decision(self.alpha[1]);
                self.register.update(bit);
                bit
            }
        };
        self.input_hat[idx] = bit;
        self.beta[idx] = bit;
    }
}

/// Returns `One` for negative LLR values and `Zero` otherwise.
fn hard_decision(llr: f32) -> Bit {
    if llr < 0.0 {
        Bit::One
    } else {
        Bit::Zero
    }
}

/// Min-sum check-node update `sign(a) sign(b) min(|a|, |b|)`.
fn f_min_sum(a: f32, b: f32) -> f32 {
    let magnitude = a.abs().min(b.abs());
    if (a < 0.0) == (b < 0.0) {
        magnitude
    } else {
        -magnitude
    }
}

/// Variable-node update `b + a` if the left partial sum is `Zero`, `b - a` otherwise.
fn g_combine(a: f32, b: f32, u: Bit) -> f32 {
    match u {
        Bit::Zero => b + a,
        Bit::One => b - a,
    }
}

/// Computes the LLR values of a left child from those of its parent.
fn f_update(kernel: Kernel, a: &[f32], b: &[f32], out: &mut [f32]) {
    match kernel {
        Kernel::Portable => {
            for ((o, &x), &y) in out.iter_mut().zip(a).zip(b) {
                *o = f_min_sum(x, y);
            }
        }
        Kernel::Lanes => {
            let mut out_chunks = out.chunks_exact_mut(LANES);
            let mut a_chunks = a.chunks_exact(LANES);
            let mut b_chunks = b.chunks_exact(LANES);
            for ((o, x), y) in (&mut out_chunks).zip(&mut a_chunks).zip(&mut b_chunks) {
                for lane in 0 .. LANES {
                    o[lane] = f_min_sum(x[lane], y[lane]);
                }
            }
            for ((o, &x), &y) in out_chunks
                .into_remainder()
                .iter_mut()
                .zip(a_chunks.remainder())
                .zip(b_chunks.remainder())
            {
                *o = f_min_sum(x, y);
            }
        }
    }
}

/// Computes the LLR values of a right child from those of its parent and the left partial sums.
fn g_update(kernel: Kernel, a: &[f32], b: &[f32], u: &[Bit], out: &mut [f32]) {
    match kernel {
        Kernel::Portable => {
            for (((o, &x), &y), &s) in out.iter_mut().zip(a).zip(b).zip(u) {
                *o = g_combine(x, y, s);
            }
        }
        Kernel::Lanes => {
            let mut out_chunks = out.chunks_exact_mut(LANES);
            let mut a_chunks = a.chunks_exact(LANES);
            let mut b_chunks = b.chunks_exact(LANES);
            let mut u_chunks = u.chunks_exact(LANES);
            for (((o, x), y), s) in (&mut out_chunks)
                .zip(&mut a_chunks)
                .zip(&mut b_chunks)
                .zip(&mut u_chunks)
            {
                for lane in 0 .. LANES {
                    o[lane] = g_combine(x[lane], y[lane], s[lane]);
                }
            }
            for (((o, &x), &y), &s) in out_chunks
                .into_remainder()
                .iter_mut()
                .zip(a_chunks.remainder())
                .zip(b_chunks.remainder())
                .zip(u_chunks.remainder())
            {
                *o = g_combine(x, y, s);
            }
        }
    }
}
