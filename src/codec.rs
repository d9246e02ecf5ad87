//! UCI encoder and decoder for PUCCH formats 2, 3 and 4
//!
//! A [`UciCodec`] owns every working buffer and coding engine needed to map a UCI value onto the
//! `E` coded bits of a PUCCH resource and back. The buffers are sized for the largest payload and
//! resource at construction and reused by every call, so one codec is meant to be owned by each
//! processing thread. Dropping the codec releases everything it owns.
//!
//! For each call, `A` is computed from the UCI configuration and `E` from the PUCCH resource.
//! Payloads of up to 11 bits use the block code of [`crate::block_code`]. Longer payloads get a
//! 6-bit or 11-bit CRC, are polar coded and rate matched, with segmentation into two code blocks
//! for the longest payloads (3GPP TS 38.212 section 6.3.1.2.1).

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::block_code;
use crate::crc::Crc;
use crate::polar_code::{PolarCode, N_MAX_LOG_UCI};
use crate::polar_decoder::PolarDecoder;
use crate::polar_encoder::{Kernel, PolarEncoder};
use crate::pucch::{PucchResource, MAX_E};
use crate::rate_match::RateMatcher;
use crate::uci::{UciConfig, UciData, UciValue, MAX_UCI_BITS};
use crate::{Bit, Error};

/// Default acceptance threshold of the block code decoder
pub const DEFAULT_BLOCK_CODE_THRESHOLD: f32 = 0.5;

/// Largest payload carried by the block code
const MAX_SHORT_BLOCK_BITS: usize = block_code::MAX_BLOCK_BITS;

/// Largest number of code blocks
const MAX_NOF_CODE_BLOCKS: usize = 2;

/// Largest number of CRC bits
const MAX_CRC_LEN: usize = 11;

/// UCI codec initialization arguments
#[derive(Clone, Copy, PartialEq, Debug, Deserialize, Serialize)]
pub struct CodecArgs {
    /// Use the portable polar kernels instead of the lane-parallel ones
    pub disable_simd: bool,
    /// Smallest normalized correlation accepted by the block code decoder
    pub block_code_threshold: f32,
}

impl Default for CodecArgs {
    fn default() -> Self {
        Self {
            disable_simd: false,
            block_code_threshold: DEFAULT_BLOCK_CODE_THRESHOLD,
        }
    }
}

impl CodecArgs {
    /// Returns the block code threshold, replacing a zero or non-normal value with the default.
    fn effective_threshold(&self) -> f32 {
        if self.block_code_threshold.is_normal() {
            self.block_code_threshold
        } else {
            warn!(
                threshold = self.block_code_threshold,
                default = DEFAULT_BLOCK_CODE_THRESHOLD,
                "Invalid block code threshold replaced by default"
            );
            DEFAULT_BLOCK_CODE_THRESHOLD
        }
    }
}

/// Enumeration of UCI coding paths
#[derive(Clone, Copy, Eq, Hash, PartialEq, Debug)]
pub enum CodingPath {
    /// Block code for `A <= 11`
    ShortBlock,
    /// CRC-aided polar code for `A >= 12`
    Polar,
}

impl CodingPath {
    /// Returns the coding path for `a` UCI bits.
    ///
    /// # Examples
    ///
    /// ```
    /// use nr_uci::codec::CodingPath;
    ///
    /// assert_eq!(CodingPath::for_payload(11), CodingPath::ShortBlock);
    /// assert_eq!(CodingPath::for_payload(12), CodingPath::Polar);
    /// ```
    #[must_use]
    pub fn for_payload(a: usize) -> Self {
        if a <= MAX_SHORT_BLOCK_BITS {
            CodingPath::ShortBlock
        } else {
            CodingPath::Polar
        }
    }
}

/// Returns the number of CRC bits attached to `a` UCI bits.
///
/// # Examples
///
/// ```
/// use nr_uci::codec;
///
/// assert_eq!(codec::crc_len(11), 0);
/// assert_eq!(codec::crc_len(19), 6);
/// assert_eq!(codec::crc_len(20), 11);
/// ```
#[must_use]
pub fn crc_len(a: usize) -> usize {
    match a {
        0 ..= 11 => 0,
        12 ..= 19 => 6,
        _ => 11,
    }
}

/// Returns the number `C` of code blocks for `a` UCI bits over `e` coded bits.
#[must_use]
pub fn num_code_blocks(a: usize, e: usize) -> usize {
    if a >= 1013 || (a >= 360 && e >= 1088) {
        2
    } else {
        1
    }
}

/// Code block parameters of the polar path
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
struct Segmentation {
    /// Number of code blocks
    num_blocks: usize,
    /// Number of zero bits prepended to the payload of the first code block
    num_prefix: usize,
    /// Number of payload bits per code block
    payload_per_block: usize,
    /// Number of polar information bits (payload plus CRC) per code block
    k: usize,
    /// Number of rate-matched bits per code block
    e: usize,
}

impl Segmentation {
    /// Returns segmentation for `a` UCI bits over `e` coded bits.
    fn new(a: usize, e: usize) -> Self {
        let num_blocks = num_code_blocks(a, e);
        let payload_per_block = a.div_ceil(num_blocks);
        Self {
            num_blocks,
            num_prefix: payload_per_block * num_blocks - a,
            payload_per_block,
            k: payload_per_block + crc_len(a),
            e: e / num_blocks,
        }
    }
}

/// UCI encoder and decoder with preallocated working state
#[derive(Debug)]
pub struct UciCodec {
    /// Smallest normalized correlation accepted by the block code decoder
    block_code_threshold: f32,
    /// 6-bit CRC engine
    crc6: Crc,
    /// 11-bit CRC engine
    crc11: Crc,
    /// Polar encoder
    encoder: PolarEncoder,
    /// Polar decoder
    decoder: PolarDecoder,
    /// Rate matcher and de-rate-matcher
    rate_matcher: RateMatcher,
    /// Polar code of the latest code block shape
    code: Option<PolarCode>,
    /// UCI bit sequence
    bit_sequence: Vec<Bit>,
    /// Code block (payload and CRC) before encoding or after decoding
    block: Vec<Bit>,
    /// Polar encoder input
    allocated: Vec<Bit>,
    /// Polar codeword
    codeword: Vec<Bit>,
    /// Coded bits
    coded: Vec<Bit>,
    /// LLR values of the coded bits
    coded_llr: Vec<f32>,
    /// LLR values of the polar codeword
    codeword_llr: Vec<f32>,
}

impl UciCodec {
    /// Returns UCI codec.
    ///
    /// # Errors
    ///
    /// Returns an error if a working buffer cannot be allocated.
    ///
    /// # Examples
    ///
    /// ```
    /// use nr_uci::codec::{CodecArgs, UciCodec};
    /// use nr_uci::pucch::PucchResource;
    /// use nr_uci::uci::{UciConfig, UciValue};
    /// use nr_uci::Bit::{One, Zero};
    ///
    /// let mut codec = UciCodec::new(&CodecArgs::default())?;
    /// let resource = PucchResource::format2(0, 1, 12, 2);
    /// let cfg = UciConfig { o_ack: 2, ..UciConfig::default() };
    /// let value = UciValue { ack: vec![One, Zero], ..UciValue::default() };
    /// let mut coded = Vec::new();
    /// assert_eq!(codec.encode_pucch(&resource, &cfg, &value, &mut coded)?, 32);
    /// let llr: Vec<i8> = coded.iter().map(|&b| if b == One { -10 } else { 10 }).collect();
    /// assert_eq!(codec.decode_pucch(&resource, &cfg, &llr)?, value);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(args: &CodecArgs) -> Result<Self, Error> {
        let kernel = Kernel::select(args.disable_simd);
        let n_max = 1 << N_MAX_LOG_UCI;
        let max_block_len = MAX_UCI_BITS.div_ceil(MAX_NOF_CODE_BLOCKS) + MAX_CRC_LEN;
        let codec = Self {
            block_code_threshold: args.effective_threshold(),
            crc6: Crc::crc6(),
            crc11: Crc::crc11(),
            encoder: PolarEncoder::new(kernel, N_MAX_LOG_UCI),
            decoder: PolarDecoder::new(kernel, N_MAX_LOG_UCI)?,
            rate_matcher: RateMatcher::new(N_MAX_LOG_UCI)?,
            code: None,
            bit_sequence: reserved(MAX_UCI_BITS, "UCI bit sequence")?,
            block: reserved(max_block_len, "code block")?,
            allocated: reserved(n_max, "polar encoder input")?,
            codeword: reserved(n_max, "polar codeword")?,
            coded: reserved(MAX_E, "coded bits")?,
            coded_llr: reserved(MAX_E, "coded LLR values")?,
            codeword_llr: reserved(n_max, "codeword LLR values")?,
        };
        debug!(
            ?kernel,
            threshold = codec.block_code_threshold,
            "Initialized UCI codec"
        );
        Ok(codec)
    }

    /// Encodes a UCI value for transmission on a PUCCH resource.
    ///
    /// On success, `output` holds exactly the `E` coded bits of the resource and `E` is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource is invalid, if the configuration is invalid or cannot fit
    /// in `E` bits, or if the value does not match the configuration. `output` is left unchanged
    /// in that case.
    pub fn encode_pucch(
        &mut self,
        resource: &PucchResource,
        cfg: &UciConfig,
        value: &UciValue,
        output: &mut Vec<Bit>,
    ) -> Result<usize, Error> {
        let e = resource.nof_bits()?;
        self.bit_sequence.clear();
        cfg.pack(value, &mut self.bit_sequence)?;
        let a = self.bit_sequence.len();
        let path = CodingPath::for_payload(a);
        match path {
            CodingPath::ShortBlock => self.encode_short_block(e)?,
            CodingPath::Polar => self.encode_polar(e)?,
        }
        output.clear();
        output.extend_from_slice(&self.coded);
        debug!(a, e, ?path, uci = %UciData { cfg, value }, "Encoded UCI on PUCCH");
        Ok(e)
    }

    /// Decodes a UCI value from the LLR values received on a PUCCH resource.
    ///
    /// # Parameters
    ///
    /// - `resource`: PUCCH resource.
    ///
    /// - `cfg`: UCI configuration.
    ///
    /// - `llr`: LLR values of the `E` coded bits, with positive values indicating that `Zero` is
    ///   more likely.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DecodeRejected`] if no valid UCI is recovered (CRC mismatch, or block
    /// code correlation below the threshold), and other errors if the resource or configuration
    /// is invalid or if `llr.len()` differs from `E`.
    pub fn decode_pucch(
        &mut self,
        resource: &PucchResource,
        cfg: &UciConfig,
        llr: &[i8],
    ) -> Result<UciValue, Error> {
        let e = resource.nof_bits()?;
        cfg.validate()?;
        if llr.len() != e {
            return Err(Error::InvalidInput(format!(
                "Expected {e} LLR values for the PUCCH resource (found {})",
                llr.len()
            )));
        }
        let a = cfg.total_bits();
        self.coded_llr.clear();
        self.coded_llr.extend(llr.iter().map(|&x| f32::from(x)));
        self.bit_sequence.clear();
        let path = CodingPath::for_payload(a);
        match path {
            CodingPath::ShortBlock => self.decode_short_block(a)?,
            CodingPath::Polar => self.decode_polar(a)?,
        }
        let value = cfg.unpack(&self.bit_sequence)?;
        debug!(a, e, ?path, uci = %UciData { cfg, value: &value }, "Decoded UCI on PUCCH");
        Ok(value)
    }

    /// Encodes the UCI bit sequence with the block code into `E` coded bits.
    fn encode_short_block(&mut self, e: usize) -> Result<(), Error> {
        self.coded.resize(e, Bit::Zero);
        block_code::encode(&self.bit_sequence, &mut self.coded)
    }

    /// Decodes `a` UCI bits from the coded LLR values with the block code.
    fn decode_short_block(&mut self, a: usize) -> Result<(), Error> {
        let norm_corr = block_code::decode(&self.coded_llr, a, &mut self.bit_sequence)?;
        if norm_corr < self.block_code_threshold {
            return Err(Error::DecodeRejected(format!(
                "Block code correlation {norm_corr:.3} below threshold {:.3}",
                self.block_code_threshold
            )));
        }
        Ok(())
    }

    /// Encodes the UCI bit sequence with the polar code into `E` coded bits.
    fn encode_polar(&mut self, e: usize) -> Result<(), Error> {
        let a = self.bit_sequence.len();
        let seg = Segmentation::new(a, e);
        self.set_code(seg.k, seg.e)?;
        let crc = self.crc_for(a);
        self.coded.clear();
        self.coded.resize(e, Bit::Zero);
        for r in 0 .. seg.num_blocks {
            // Payload bits of block `r` within the zero-prefixed sequence
            let start = r * seg.payload_per_block;
            self.block.clear();
            self.block.extend(
                (start .. start + seg.payload_per_block).map(|idx| {
                    idx.checked_sub(seg.num_prefix)
                        .map_or(Bit::Zero, |idx| self.bit_sequence[idx])
                }),
            );
            crc.attach(&mut self.block);
            let code = self.code.as_ref().ok_or_else(missing_code)?;
            let n = code.n();
            self.allocated.resize(n, Bit::Zero);
            self.codeword.resize(n, Bit::Zero);
            code.allocate(&self.block, &mut self.allocated)?;
            self.encoder.encode(&self.allocated, &mut self.codeword)?;
            self.rate_matcher.rate_match(
                &self.codeword,
                seg.k,
                &mut self.coded[r * seg.e .. (r + 1) * seg.e],
            )?;
        }
        Ok(())
    }

    /// Decodes `a` UCI bits from the coded LLR values with the polar code.
    fn decode_polar(&mut self, a: usize) -> Result<(), Error> {
        let e = self.coded_llr.len();
        let seg = Segmentation::new(a, e);
        self.set_code(seg.k, seg.e)?;
        let crc = self.crc_for(a);
        for r in 0 .. seg.num_blocks {
            let block_llr = &self.coded_llr[r * seg.e .. (r + 1) * seg.e];
            let energy: f32 = block_llr.iter().map(|x| x * x).sum();
            if !energy.is_normal() {
                return Err(Error::DecodeRejected(format!(
                    "No signal energy in code block {r} of {}",
                    seg.num_blocks
                )));
            }
            let code = self.code.as_ref().ok_or_else(missing_code)?;
            let n = code.n();
            self.codeword_llr.resize(n, 0.0);
            self.allocated.resize(n, Bit::Zero);
            self.rate_matcher
                .derate_match(block_llr, seg.k, &mut self.codeword_llr)?;
            self.decoder
                .decode(code, &self.codeword_llr, &mut self.allocated)?;
            self.block.clear();
            code.deallocate(&self.allocated, &mut self.block);
            if !crc.matches(&self.block) {
                return Err(Error::DecodeRejected(format!(
                    "CRC mismatch in code block {r} of {}",
                    seg.num_blocks
                )));
            }
            let skip = if r == 0 { seg.num_prefix } else { 0 };
            self.bit_sequence
                .extend_from_slice(&self.block[skip .. seg.payload_per_block]);
        }
        Ok(())
    }

    /// Makes the cached polar code match `k` information bits over `e` rate-matched bits.
    fn set_code(&mut self, k: usize, e: usize) -> Result<(), Error> {
        if let Some(code) = self.code.as_ref() {
            if code.k() == k && code.e() == e {
                trace!(k, e, "Reusing polar code");
                return Ok(());
            }
        }
        self.code = Some(PolarCode::new(k, e, N_MAX_LOG_UCI)?);
        Ok(())
    }

    /// Returns the CRC engine for `a` UCI bits (`a >= 12`).
    fn crc_for(&self, a: usize) -> Crc {
        if crc_len(a) == 6 {
            self.crc6
        } else {
            self.crc11
        }
    }
}

/// Returns an empty vector with reserved capacity.
fn reserved<T>(capacity: usize, name: &str) -> Result<Vec<T>, Error> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(capacity)
        .map_err(|e| Error::AllocationFailure(format!("UCI {name} buffer: {e}")))?;
    Ok(buffer)
}

/// Returns the error for a polar code that was never set up.
fn missing_code() -> Error {
    Error::InvalidInput("Polar code used before being set up".to_string())
}
