//! This crate simulates the BLER-versus-SNR performance of uplink control information (UCI) on 5G
//! NR PUCCH formats 2, 3 and 4 over a BPSK-AWGN channel. Simulation parameters are specified on
//! the command line, and simulation results are saved to a JSON file.
//!
//! Build the executable with `cargo build --release` and then run `./target/release/nr-uci -h`
//! for help on the command-line interface. Set `RUST_LOG` to change the log level (default
//! `info`).

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

use anyhow::Result;
use clap::parser::ValueSource;
use clap::{crate_name, crate_version, value_parser, Arg, ArgAction, ArgMatches, Command};
use nr_uci::codec::CodecArgs;
use nr_uci::pucch::{Modulation, PucchResource, NOF_SYMBOLS_PER_SLOT};
use nr_uci::sim::{self, SimParams};
use nr_uci::uci::{CsiQuantity, CsiReportConfig, CsiReportType, UciConfig};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Main function
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let timer = Instant::now();
    let matches = command_line_parser().get_matches();
    let json_filename = &json_filename_from_matches(&matches);
    sim::run_bpsk_awgn_sims(&all_sim_params(&matches), json_filename)?;
    info!("Elapsed time: {:.3?}", timer.elapsed());
    Ok(())
}

/// Returns command line parser.
fn command_line_parser() -> Command {
    Command::new(crate_name!())
        .version(crate_version!())
        .about("Evaluates UCI performance on NR PUCCH formats 2, 3 and 4 over a BPSK-AWGN channel")
        .arg(format_name())
        .arg(num_prb())
        .arg(num_symbols())
        .arg(occ_length())
        .arg(modulation_name())
        .arg(intra_slot_hopping())
        .arg(additional_dmrs())
        .arg(num_ack_bits())
        .arg(num_sr_bits())
        .arg(num_cqi_bits())
        .arg(block_code_threshold())
        .arg(disable_simd())
        .arg(first_snr_db())
        .arg(snr_step_db())
        .arg(num_snr())
        .arg(num_block_errors_min())
        .arg(num_blocks_per_run())
        .arg(num_runs_min())
        .arg(num_runs_max())
        .arg(json_filename())
}

/// Returns argument for PUCCH format name.
fn format_name() -> Arg {
    Arg::new("format_name")
        .short('g')
        .value_parser(["2", "3", "4"])
        .default_value("2")
        .help("PUCCH format")
}

/// Returns argument for number of PRBs.
fn num_prb() -> Arg {
    Arg::new("num_prb")
        .short('m')
        .value_parser(value_parser!(usize))
        .default_value("4")
        .help("Number of PRBs (formats 2 and 3)")
}

/// Returns argument for number of OFDM symbols.
fn num_symbols() -> Arg {
    Arg::new("num_symbols")
        .short('y')
        .value_parser(value_parser!(usize))
        .default_value("2")
        .help("Number of OFDM symbols, ending at the last symbol of the slot")
}

/// Returns argument for orthogonal cover code length.
fn occ_length() -> Arg {
    Arg::new("occ_length")
        .short('o')
        .value_parser(value_parser!(usize))
        .default_value("2")
        .help("Orthogonal cover code length (format 4)")
}

/// Returns argument for modulation name.
fn modulation_name() -> Arg {
    Arg::new("modulation_name")
        .short('q')
        .value_parser(["QPSK", "PiOver2BPSK"])
        .default_value("QPSK")
        .help("Modulation scheme (formats 3 and 4)")
}

/// Returns argument for intra-slot frequency hopping.
fn intra_slot_hopping() -> Arg {
    Arg::new("intra_slot_hopping")
        .short('j')
        .action(ArgAction::SetTrue)
        .help("Enable intra-slot frequency hopping (formats 3 and 4)")
}

/// Returns argument for additional DM-RS.
fn additional_dmrs() -> Arg {
    Arg::new("additional_dmrs")
        .short('a')
        .action(ArgAction::SetTrue)
        .help("Enable additional DM-RS (formats 3 and 4)")
}

/// Returns argument for number of HARQ-ACK bits.
fn num_ack_bits() -> Arg {
    Arg::new("num_ack_bits")
        .short('k')
        .value_parser(value_parser!(usize))
        .default_value("12")
        .help("Number of HARQ-ACK bits")
}

/// Returns argument for number of SR bits.
fn num_sr_bits() -> Arg {
    Arg::new("num_sr_bits")
        .short('w')
        .value_parser(value_parser!(usize))
        .default_value("2")
        .help("Number of SR bits")
}

/// Returns argument for number of CQI bits.
fn num_cqi_bits() -> Arg {
    Arg::new("num_cqi_bits")
        .short('i')
        .value_parser(value_parser!(usize))
        .default_value("0")
        .help("Number of CQI bits in a periodic CSI report (no report if zero)")
}

/// Returns argument for block code acceptance threshold.
fn block_code_threshold() -> Arg {
    Arg::new("block_code_threshold")
        .short('t')
        .value_parser(value_parser!(f32))
        .default_value("0.5")
        .help("Acceptance threshold of the block code decoder")
}

/// Returns argument for disabling the lane-parallel polar kernels.
fn disable_simd() -> Arg {
    Arg::new("disable_simd")
        .short('d')
        .action(ArgAction::SetTrue)
        .help("Use the portable polar kernels")
}

/// Returns argument for first Es/N0 (dB).
fn first_snr_db() -> Arg {
    Arg::new("first_snr_db")
        .short('r')
        .value_parser(value_parser!(f64))
        .allow_negative_numbers(true)
        .default_value("-6.0")
        .help("First Es/N0 (dB)")
}

/// Returns argument for Es/N0 step (dB).
fn snr_step_db() -> Arg {
    Arg::new("snr_step_db")
        .short('p')
        .value_parser(value_parser!(f64))
        .allow_negative_numbers(true)
        .default_value("1.0")
        .help("Es/N0 step (dB)")
}

/// Returns argument for number of Es/N0 values.
fn num_snr() -> Arg {
    Arg::new("num_snr")
        .short('s')
        .value_parser(value_parser!(u32))
        .default_value("4")
        .help("Number of Es/N0 values")
}

/// Returns argument for desired minimum number of block errors.
fn num_block_errors_min() -> Arg {
    Arg::new("num_block_errors_min")
        .short('e')
        .value_parser(value_parser!(u32))
        .default_value("500")
        .help("Desired minimum number of block errors")
}

/// Returns argument for number of blocks to be transmitted per run.
fn num_blocks_per_run() -> Arg {
    Arg::new("num_blocks_per_run")
        .short('b')
        .value_parser(value_parser!(u32))
        .default_value("1000")
        .help("Number of blocks to be transmitted per run")
}

/// Returns argument for minimum number of runs of blocks to be simulated.
fn num_runs_min() -> Arg {
    Arg::new("num_runs_min")
        .short('n')
        .value_parser(value_parser!(u32))
        .default_value("10")
        .help("Minimum number of runs of blocks to be simulated")
}

/// Returns argument for maximum number of runs of blocks to be simulated.
fn num_runs_max() -> Arg {
    Arg::new("num_runs_max")
        .short('x')
        .value_parser(value_parser!(u32))
        .default_value("100")
        .help("Maximum number of runs of blocks to be simulated")
}

/// Returns argument for name of JSON file to which results must be saved.
fn json_filename() -> Arg {
    Arg::new("json_filename")
        .short('f')
        .default_value("results.json")
        .help("Name of JSON file to which results must be saved")
}

/// Returns simulation parameters based on command-line arguments.
fn all_sim_params(matches: &ArgMatches) -> Vec<SimParams> {
    let mut num_runs_min = num_runs_min_from_matches(matches);
    let mut num_runs_max = num_runs_max_from_matches(matches);
    if num_runs_min > num_runs_max {
        if let Some(ValueSource::DefaultValue) = matches.value_source("num_runs_min") {
            num_runs_min = num_runs_max;
        }
        if let Some(ValueSource::DefaultValue) = matches.value_source("num_runs_max") {
            num_runs_max = num_runs_min;
        }
    }
    let resource = resource_from_matches(matches);
    let uci = uci_config_from_matches(matches);
    let codec_args = codec_args_from_matches(matches);
    all_es_over_n0_db_from_matches(matches)
        .into_iter()
        .map(|es_over_n0_db| SimParams {
            resource,
            uci: uci.clone(),
            codec_args,
            es_over_n0_db,
            num_block_errors_min: num_block_errors_min_from_matches(matches),
            num_blocks_per_run: num_blocks_per_run_from_matches(matches),
            num_runs_min,
            num_runs_max,
        })
        .collect()
}

// OK to unwrap in the functions below: All command-line arguments have default values, so an
// error cannot occur.

/// Returns PUCCH resource.
fn resource_from_matches(matches: &ArgMatches) -> PucchResource {
    let nof_prb: usize = *matches.get_one("num_prb").unwrap();
    let nof_symbols: usize = *matches.get_one("num_symbols").unwrap();
    let occ_length: usize = *matches.get_one("occ_length").unwrap();
    let start_symbol = NOF_SYMBOLS_PER_SLOT.saturating_sub(nof_symbols);
    let modulation = modulation_from_matches(matches);
    let resource = match matches.get_one::<String>("format_name").unwrap().as_str() {
        "2" => PucchResource::format2(0, nof_prb, start_symbol, nof_symbols),
        "3" => PucchResource::format3(0, nof_prb, start_symbol, nof_symbols, modulation),
        "4" => PucchResource::format4(0, start_symbol, nof_symbols, occ_length, modulation),
        _ => panic!("Invalid PUCCH format name"),
    };
    resource
        .with_intra_slot_hopping(matches.get_flag("intra_slot_hopping"))
        .with_additional_dmrs(matches.get_flag("additional_dmrs"))
}

/// Returns modulation scheme.
fn modulation_from_matches(matches: &ArgMatches) -> Modulation {
    match matches
        .get_one::<String>("modulation_name")
        .unwrap()
        .as_str()
    {
        "QPSK" => Modulation::Qpsk,
        "PiOver2BPSK" => Modulation::PiOver2Bpsk,
        _ => panic!("Invalid modulation name"),
    }
}

/// Returns UCI configuration.
fn uci_config_from_matches(matches: &ArgMatches) -> UciConfig {
    let cqi_bits: usize = *matches.get_one("num_cqi_bits").unwrap();
    let csi = if cqi_bits > 0 {
        vec![CsiReportConfig {
            report_id: 0,
            cell_index: 0,
            report_type: CsiReportType::Periodic,
            quantity: CsiQuantity::CriRiPmiCqi {
                cri_bits: 0,
                ri_bits: 0,
                pmi_bits: 0,
                cqi_bits,
            },
        }]
    } else {
        Vec::new()
    };
    UciConfig {
        o_ack: *matches.get_one("num_ack_bits").unwrap(),
        o_sr: *matches.get_one("num_sr_bits").unwrap(),
        csi,
    }
}

/// Returns codec initialization arguments.
fn codec_args_from_matches(matches: &ArgMatches) -> CodecArgs {
    CodecArgs {
        disable_simd: matches.get_flag("disable_simd"),
        block_code_threshold: *matches.get_one("block_code_threshold").unwrap(),
    }
}

/// Returns all Es/N0 (dB) values.
fn all_es_over_n0_db_from_matches(matches: &ArgMatches) -> Vec<f64> {
    let first_snr_db: f64 = *matches.get_one("first_snr_db").unwrap();
    let snr_step_db: f64 = *matches.get_one("snr_step_db").unwrap();
    let num_snr: u32 = *matches.get_one("num_snr").unwrap();
    (0 .. num_snr)
        .map(|n| first_snr_db + snr_step_db * f64::from(n))
        .collect()
}

/// Returns desired minimum number of block errors.
fn num_block_errors_min_from_matches(matches: &ArgMatches) -> u32 {
    *matches.get_one("num_block_errors_min").unwrap()
}

/// Returns number of blocks to be transmitted per run.
fn num_blocks_per_run_from_matches(matches: &ArgMatches) -> u32 {
    *matches.get_one("num_blocks_per_run").unwrap()
}

/// Returns minimum number of runs of blocks to be simulated.
fn num_runs_min_from_matches(matches: &ArgMatches) -> u32 {
    *matches.get_one("num_runs_min").unwrap()
}

/// Returns maximum number of runs of blocks to be simulated.
fn num_runs_max_from_matches(matches: &ArgMatches) -> u32 {
    *matches.get_one("num_runs_max").unwrap()
}

/// Returns name of JSON file to which simulation results must be saved.
fn json_filename_from_matches(matches: &ArgMatches) -> String {
    matches
        .get_one::<String>("json_filename")
        .unwrap()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::assert_float_eq;
    use nr_uci::pucch::PucchFormat;

    fn command_line_for_test() -> Vec<&'static str> {
        vec![
            crate_name!(),
            "-g",
            "3",
            "-m",
            "2",
            "-y",
            "10",
            "-q",
            "PiOver2BPSK",
            "-j",
            "-k",
            "4",
            "-w",
            "1",
            "-i",
            "7",
            "-t",
            "0.6",
            "-d",
            "-r",
            "-4.0",
            "-p",
            "0.2",
            "-s",
            "6",
            "-e",
            "50",
            "-b",
            "100",
            "-n",
            "10",
            "-x",
            "20",
            "-f",
            "results.json",
        ]
    }

    #[test]
    fn test_command_line_parser() {
        assert!(command_line_parser()
            .try_get_matches_from(command_line_for_test())
            .is_ok());
        assert!(command_line_parser()
            .try_get_matches_from([crate_name!(), "-g", "1"])
            .is_err());
    }

    #[test]
    fn test_all_sim_params() {
        let matches = command_line_parser().get_matches_from(command_line_for_test());
        let all_params = all_sim_params(&matches);
        let all_es_over_n0_db = [-4.0, -3.8, -3.6, -3.4, -3.2, -3.0];
        assert_eq!(all_params.len(), 6);
        for (idx, params) in all_params.iter().enumerate() {
            assert_eq!(params.resource.format, PucchFormat::Format3);
            assert_eq!(params.resource.nof_prb, 2);
            assert_eq!(params.resource.start_symbol, 4);
            assert_eq!(params.resource.nof_symbols, 10);
            assert_eq!(params.resource.modulation, Modulation::PiOver2Bpsk);
            assert!(params.resource.intra_slot_hopping);
            assert!(!params.resource.additional_dmrs);
            assert_eq!(params.uci.o_ack, 4);
            assert_eq!(params.uci.o_sr, 1);
            assert_eq!(params.uci.total_bits(), 12);
            assert!(params.codec_args.disable_simd);
            assert_float_eq!(params.codec_args.block_code_threshold, 0.6, abs <= 1e-6);
            assert_float_eq!(params.es_over_n0_db, all_es_over_n0_db[idx], abs <= 1e-9);
            assert_eq!(params.num_block_errors_min, 50);
            assert_eq!(params.num_blocks_per_run, 100);
            assert_eq!(params.num_runs_min, 10);
            assert_eq!(params.num_runs_max, 20);
        }
    }

    #[test]
    fn test_default_sim_params() {
        let matches = command_line_parser().get_matches_from([crate_name!(), "-n", "200"]);
        let all_params = all_sim_params(&matches);
        assert_eq!(all_params.len(), 4);
        let params = &all_params[0];
        assert_eq!(params.resource, PucchResource::format2(0, 4, 12, 2));
        assert_eq!(params.resource.nof_bits().unwrap(), 128);
        assert_eq!(params.uci.total_bits(), 14);
        assert!(params.uci.csi.is_empty());
        assert_eq!(params.codec_args, CodecArgs::default());
        assert_eq!(params.num_runs_min, 200);
        assert_eq!(params.num_runs_max, 200);
    }
}
