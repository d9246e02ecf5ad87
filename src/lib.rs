//! This crate implements encoding and decoding of uplink control information (UCI) carried on 5G
//! NR PUCCH formats 2, 3 and 4, following 3GPP TS 38.212. A UCI value (HARQ-ACK bits, SR bits
//! and CSI part 1 reports) is turned into a bit sequence of `A` bits and mapped onto the `E` coded
//! bits of a PUCCH resource. Payloads of up to 11 bits use a short block code decoded by
//! correlation. Longer payloads are protected by a 6-bit or 11-bit CRC, polar coded with
//! parity-check bits where required, rate matched by sub-block interleaving, bit selection and
//! channel interleaving, and segmented into two code blocks for the longest payloads. The polar
//! decoder is a successive-cancellation decoder with min-sum updates.
//!
//! The [`codec::UciCodec`] type ties these stages together and owns all working memory; the
//! [`sim`] module evaluates its block error rate over a BPSK-AWGN channel.

#![warn(
    clippy::complexity,
    clippy::pedantic,
    clippy::perf,
    clippy::style,
    clippy::suspicious,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_allocation,
    unused_import_braces,
    unused_qualifications
)]

pub mod block_code;
pub mod codec;
mod common;
pub mod crc;
mod interleaver;
pub mod polar_code;
pub mod polar_decoder;
pub mod polar_encoder;
pub mod pucch;
pub mod rate_match;
pub mod sim;
pub mod uci;
pub mod utils;

pub use common::{Bit, Error};
pub use interleaver::Interleaver;
