//! Simulator to evaluate performance of UCI on PUCCH formats 2, 3 and 4 over BPSK-AWGN channel
//!
//! Each block carries a random UCI value of the configured shape. The value is encoded onto the
//! `E` coded bits of the PUCCH resource, sent over a BPSK-AWGN channel, quantized to signed-byte
//! LLR values and decoded. A block counts as an error if the transmitted value is not delivered,
//! either because the decoder rejects it or because it returns a different value (false accept).
//!
//! Blocks within a run are simulated in parallel, with one [`UciCodec`] per worker.

use std::fs::File;
use std::io::BufWriter;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::codec::{CodecArgs, UciCodec};
use crate::pucch::PucchResource;
use crate::uci::{UciConfig, UciValue};
use crate::{utils, Bit, Error};

/// Scale applied to channel LLR values before quantization to signed bytes
const LLR_SCALE: f64 = 2.0;

/// Parameters for UCI simulation over BPSK-AWGN channel
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct SimParams {
    /// PUCCH resource
    pub resource: PucchResource,
    /// UCI configuration
    pub uci: UciConfig,
    /// Codec initialization arguments
    pub codec_args: CodecArgs,
    /// Ratio (dB) of symbol energy to noise power spectral density at BPSK-AWGN channel output
    pub es_over_n0_db: f64,
    /// Desired minimum number of block errors
    pub num_block_errors_min: u32,
    /// Number of blocks to be transmitted per run
    pub num_blocks_per_run: u32,
    /// Minimum number of runs of blocks to be simulated
    pub num_runs_min: u32,
    /// Maximum number of runs of blocks to be simulated
    pub num_runs_max: u32,
}

/// Results from UCI simulation over BPSK-AWGN channel
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct SimResults {
    /// Simulation parameters
    pub params: SimParams,
    /// Number of UCI bits per block
    pub num_uci_bits_per_block: usize,
    /// Number of coded bits per block
    pub num_coded_bits_per_block: usize,
    /// Number of blocks transmitted
    pub num_blocks: u32,
    /// Number of blocks in error (rejected or falsely accepted)
    pub num_block_errors: u32,
    /// Number of blocks rejected by the decoder
    pub num_rejections: u32,
    /// Number of blocks decoded to a value other than the one transmitted
    pub num_false_accepts: u32,
    /// Number of coded bits in error at the BPSK slicer output
    pub num_coded_bit_errors: u64,
}

/// Outcome of the transmission of one block
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
enum BlockOutcome {
    /// Transmitted value recovered
    Delivered,
    /// Decoder reported no valid UCI
    Rejected,
    /// Decoder returned a different value
    FalseAccept,
}

impl SimResults {
    /// Returns initialized simulation results.
    fn new(params: &SimParams, num_coded_bits_per_block: usize) -> Self {
        Self {
            params: params.clone(),
            num_uci_bits_per_block: params.uci.total_bits(),
            num_coded_bits_per_block,
            num_blocks: 0,
            num_block_errors: 0,
            num_rejections: 0,
            num_false_accepts: 0,
            num_coded_bit_errors: 0,
        }
    }

    /// Returns block error rate.
    #[must_use]
    pub fn block_error_rate(&self) -> f64 {
        if self.num_blocks > 0 {
            f64::from(self.num_block_errors) / f64::from(self.num_blocks)
        } else {
            0.0
        }
    }

    /// Returns false accept rate.
    #[must_use]
    pub fn false_accept_rate(&self) -> f64 {
        if self.num_blocks > 0 {
            f64::from(self.num_false_accepts) / f64::from(self.num_blocks)
        } else {
            0.0
        }
    }

    /// Returns coded bit error rate at the BPSK slicer output.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn coded_bit_error_rate(&self) -> f64 {
        let num_coded_bits = u64::from(self.num_blocks) * self.num_coded_bits_per_block as u64;
        if num_coded_bits > 0 {
            self.num_coded_bit_errors as f64 / num_coded_bits as f64
        } else {
            0.0
        }
    }

    /// Logs progress message.
    fn log_progress_message(&self) {
        info!(
            es_over_n0_db = self.params.es_over_n0_db,
            a = self.num_uci_bits_per_block,
            e = self.num_coded_bits_per_block,
            blocks = self.num_blocks,
            block_errors = self.num_block_errors,
            false_accepts = self.num_false_accepts,
            "BLER = {:.2e}, FAR = {:.2e}, coded BER = {:.2e}",
            self.block_error_rate(),
            self.false_accept_rate(),
            self.coded_bit_error_rate(),
        );
    }

    /// Returns `true` iff the simulation is complete.
    fn run_complete(&self) -> bool {
        let num_runs = self.num_blocks / self.params.num_blocks_per_run;
        num_runs >= self.params.num_runs_max
            || (num_runs >= self.params.num_runs_min
                && self.num_block_errors >= self.params.num_block_errors_min)
    }

    /// Updates simulation results after a block.
    fn update_after_block(&mut self, outcome: BlockOutcome, num_coded_bit_errors: usize) {
        self.num_blocks += 1;
        match outcome {
            BlockOutcome::Delivered => {}
            BlockOutcome::Rejected => {
                self.num_block_errors += 1;
                self.num_rejections += 1;
            }
            BlockOutcome::FalseAccept => {
                self.num_block_errors += 1;
                self.num_false_accepts += 1;
            }
        }
        self.num_coded_bit_errors += num_coded_bit_errors as u64;
    }
}

/// Runs UCI simulations over BPSK-AWGN channel and saves results to a JSON file.
///
/// # Parameters
///
/// - `all_params`: Parameters for each simulation scenario of interest.
///
/// - `json_filename`: Name of the JSON file to which all simulation results must be written.
///
/// # Errors
///
/// Returns an error if any invalid simulation parameters are encountered, or if there is an error
/// in creating or writing to the JSON file for the simulation results.
///
/// # Examples
///
/// ```no_run
/// use nr_uci::codec::CodecArgs;
/// use nr_uci::pucch::PucchResource;
/// use nr_uci::sim::{self, SimParams};
/// use nr_uci::uci::UciConfig;
///
/// let params = SimParams {
///     resource: PucchResource::format2(0, 4, 12, 2),
///     uci: UciConfig { o_ack: 12, o_sr: 2, ..UciConfig::default() },
///     codec_args: CodecArgs::default(),
///     es_over_n0_db: -3.0,
///     num_block_errors_min: 100,
///     num_blocks_per_run: 1000,
///     num_runs_min: 1,
///     num_runs_max: 10,
/// };
/// sim::run_bpsk_awgn_sims(&[params], "results.json")?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn run_bpsk_awgn_sims(all_params: &[SimParams], json_filename: &str) -> Result<(), Error> {
    let mut all_results = Vec::with_capacity(all_params.len());
    for params in all_params {
        all_results.push(bpsk_awgn_sim(params)?);
    }
    save_all_sim_results_to_file(&all_results, json_filename)?;
    Ok(())
}

/// Runs UCI simulation over BPSK-AWGN channel.
///
/// # Errors
///
/// Returns an error if the simulation parameters are invalid or if a codec cannot be created.
pub fn bpsk_awgn_sim(params: &SimParams) -> Result<SimResults, Error> {
    check_sim_params(params)?;
    let num_coded_bits_per_block = params.resource.nof_bits()?;
    let mut results = SimResults::new(params, num_coded_bits_per_block);
    debug!(?params, "Starting simulation");
    while !results.run_complete() {
        let run: Vec<(BlockOutcome, usize)> = (0 .. params.num_blocks_per_run)
            .into_par_iter()
            .map_init(
                || UciCodec::new(&params.codec_args),
                |codec, _| match codec {
                    Ok(codec) => simulate_block(codec, params),
                    Err(err) => Err(Error::AllocationFailure(err.to_string())),
                },
            )
            .collect::<Result<_, _>>()?;
        for (outcome, num_coded_bit_errors) in run {
            results.update_after_block(outcome, num_coded_bit_errors);
        }
        results.log_progress_message();
    }
    Ok(results)
}

/// Transmits one random UCI value and returns the outcome and the number of coded bit errors.
fn simulate_block(
    codec: &mut UciCodec,
    params: &SimParams,
) -> Result<(BlockOutcome, usize), Error> {
    let value = random_uci_value(&params.uci)?;
    let mut coded = Vec::new();
    codec.encode_pucch(&params.resource, &params.uci, &value, &mut coded)?;
    let coded_llr = utils::bpsk_awgn_channel(&coded, params.es_over_n0_db);
    let num_coded_bit_errors = utils::error_count(&utils::bpsk_slicer(&coded_llr), &coded);
    let llr = utils::quantize_llrs(&coded_llr, LLR_SCALE);
    let outcome = match codec.decode_pucch(&params.resource, &params.uci, &llr) {
        Ok(value_hat) if value_hat == value => BlockOutcome::Delivered,
        Ok(_) => BlockOutcome::FalseAccept,
        Err(err) if err.is_decode_rejected() => BlockOutcome::Rejected,
        Err(err) => return Err(err),
    };
    Ok((outcome, num_coded_bit_errors))
}

/// Returns a random UCI value of the shape implied by a configuration.
fn random_uci_value(cfg: &UciConfig) -> Result<UciValue, Error> {
    let bits: Vec<Bit> = utils::random_bits(cfg.total_bits());
    cfg.unpack(&bits)
}

/// Checks validity of simulation parameters.
fn check_sim_params(params: &SimParams) -> Result<(), Error> {
    if params.num_blocks_per_run == 0 {
        return Err(Error::InvalidInput(
            "Number of blocks per run cannot be zero".to_string(),
        ));
    }
    if params.num_runs_min > params.num_runs_max {
        return Err(Error::InvalidInput(format!(
            "Minimum number of runs ({}) exceeds maximum number of runs ({})",
            params.num_runs_min, params.num_runs_max
        )));
    }
    params.resource.validate()?;
    params.uci.validate()
}

/// Saves all simulation results to a JSON file.
fn save_all_sim_results_to_file(
    all_results: &[SimResults],
    json_filename: &str,
) -> Result<(), Error> {
    let writer = BufWriter::new(File::create(json_filename)?);
    serde_json::to_writer_pretty(writer, all_results)?;
    Ok(())
}

#[cfg(test)]
mod tests_of_functions {
    use super::*;
    use crate::uci::{CsiQuantity, CsiReportConfig, CsiReportType};
    use float_eq::assert_float_eq;

    fn params_for_test() -> SimParams {
        SimParams {
            resource: PucchResource::format2(0, 4, 12, 2),
            uci: UciConfig {
                o_ack: 12,
                o_sr: 2,
                ..UciConfig::default()
            },
            codec_args: CodecArgs::default(),
            es_over_n0_db: 20.0,
            num_block_errors_min: 1,
            num_blocks_per_run: 8,
            num_runs_min: 1,
            num_runs_max: 2,
        }
    }

    #[test]
    fn test_check_sim_params() {
        let mut params = params_for_test();
        assert!(check_sim_params(&params).is_ok());
        params.num_blocks_per_run = 0;
        assert!(check_sim_params(&params).is_err());
        params = params_for_test();
        params.num_runs_min = 3;
        assert!(check_sim_params(&params).is_err());
        params = params_for_test();
        params.resource.nof_symbols = 3;
        assert!(check_sim_params(&params).is_err());
        params = params_for_test();
        params.uci.o_ack = 0;
        params.uci.o_sr = 0;
        assert!(check_sim_params(&params).is_err());
    }

    #[test]
    fn test_random_uci_value() {
        let cfg = UciConfig {
            o_ack: 3,
            o_sr: 2,
            csi: vec![CsiReportConfig {
                report_id: 1,
                cell_index: 0,
                report_type: CsiReportType::Periodic,
                quantity: CsiQuantity::CriRiPmiCqi {
                    cri_bits: 1,
                    ri_bits: 1,
                    pmi_bits: 4,
                    cqi_bits: 4,
                },
            }],
        };
        let value = random_uci_value(&cfg).unwrap();
        assert_eq!(value.ack.len(), 3);
        assert!(value.sr < 4);
        assert_eq!(value.csi.len(), 1);
        let mut bits = Vec::new();
        cfg.pack(&value, &mut bits).unwrap();
        assert_eq!(bits.len(), 15);
    }

    #[test]
    fn test_sim_results() {
        let params = params_for_test();
        let mut results = SimResults::new(&params, 128);
        assert_eq!(results.num_uci_bits_per_block, 14);
        assert_float_eq!(results.block_error_rate(), 0.0, abs <= 1e-12);
        assert!(!results.run_complete());
        for _ in 0 .. 5 {
            results.update_after_block(BlockOutcome::Delivered, 2);
        }
        results.update_after_block(BlockOutcome::Rejected, 10);
        results.update_after_block(BlockOutcome::FalseAccept, 12);
        assert!(!results.run_complete());
        results.update_after_block(BlockOutcome::Delivered, 0);
        assert!(results.run_complete());
        assert_eq!(results.num_blocks, 8);
        assert_eq!(results.num_block_errors, 2);
        assert_eq!(results.num_rejections, 1);
        assert_eq!(results.num_false_accepts, 1);
        assert_eq!(results.num_coded_bit_errors, 32);
        assert_float_eq!(results.block_error_rate(), 0.25, abs <= 1e-12);
        assert_float_eq!(results.false_accept_rate(), 0.125, abs <= 1e-12);
        assert_float_eq!(results.coded_bit_error_rate(), 32.0 / 1024.0, abs <= 1e-12);
    }

    #[test]
    fn test_run_complete() {
        let mut params = params_for_test();
        params.num_block_errors_min = 100;
        let mut results = SimResults::new(&params, 128);
        for _ in 0 .. 15 {
            results.update_after_block(BlockOutcome::Rejected, 0);
        }
        assert!(!results.run_complete());
        results.update_after_block(BlockOutcome::Rejected, 0);
        assert!(results.run_complete());
    }

    #[test]
    fn test_bpsk_awgn_sim() {
        let params = params_for_test();
        let results = bpsk_awgn_sim(&params).unwrap();
        assert_eq!(results.num_coded_bits_per_block, 128);
        assert_eq!(results.num_blocks, 16);
        assert_eq!(results.num_block_errors, 0);
        assert_eq!(results.num_coded_bit_errors, 0);
        let mut params = params_for_test();
        params.uci.o_ack = 3;
        params.uci.o_sr = 0;
        let results = bpsk_awgn_sim(&params).unwrap();
        assert_eq!(results.num_uci_bits_per_block, 3);
        assert_eq!(results.num_block_errors, 0);
        let mut params = params_for_test();
        params.num_runs_min = 5;
        assert!(bpsk_awgn_sim(&params).is_err());
    }

    #[test]
    fn test_run_bpsk_awgn_sims() {
        let json_filename = std::env::temp_dir().join("nr_uci_test_run_bpsk_awgn_sims.json");
        let json_filename = json_filename.to_str().unwrap();
        let mut all_params = vec![params_for_test(), params_for_test()];
        all_params[1].es_over_n0_db = 15.0;
        run_bpsk_awgn_sims(&all_params, json_filename).unwrap();
        let file = File::open(json_filename).unwrap();
        let all_results: Vec<SimResults> = serde_json::from_reader(file).unwrap();
        assert_eq!(all_results.len(), 2);
        for (results, params) in all_results.iter().zip(&all_params) {
            assert_eq!(&results.params, params);
            assert_eq!(results.num_blocks, 16);
        }
        std::fs::remove_file(json_filename).unwrap();
    }
}
