//! PUCCH resources carrying UCI
//!
//! A [`PucchResource`] describes a PUCCH format 2, 3 or 4 allocation as configured by upper
//! layers. Its validation follows the ranges of 3GPP TS 38.331 (`PUCCH-Resource`), and the number
//! of coded bits `E` it carries follows Table 6.3.1.4-1 of 3GPP TS 38.212, with the DM-RS symbols
//! of formats 3 and 4 taken from Table 6.4.1.3.3.2-1 of 3GPP TS 38.211.

use serde::{Deserialize, Serialize};

use crate::Error;

/// Number of OFDM symbols in a slot
pub const NOF_SYMBOLS_PER_SLOT: usize = 14;

/// Maximum number of PRBs in a carrier
pub const MAX_NOF_PRB: usize = 275;

/// Largest number of coded bits carried by a PUCCH resource
pub const MAX_E: usize = 4608;

/// Number of subcarriers per PRB
const NOF_SUBCARRIERS_PER_PRB: usize = 12;

/// Allowed PRB counts for format 3
const FORMAT3_NOF_PRB: [usize; 12] = [1, 2, 3, 4, 5, 6, 8, 9, 10, 12, 15, 16];

/// Enumeration of PUCCH formats able to carry more than 2 UCI bits
#[derive(Clone, Copy, Eq, Hash, PartialEq, Debug, Deserialize, Serialize)]
pub enum PucchFormat {
    /// Short format on 1 or 2 symbols, QPSK, up to 16 PRBs
    Format2,
    /// Long format on 4 to 14 symbols, up to 16 PRBs
    Format3,
    /// Long format on 4 to 14 symbols, 1 PRB with orthogonal cover code
    Format4,
}

/// Enumeration of PUCCH modulation schemes
#[derive(Clone, Copy, Eq, Hash, PartialEq, Debug, Default, Deserialize, Serialize)]
pub enum Modulation {
    /// pi/2-BPSK (1 bit per symbol)
    PiOver2Bpsk,
    /// QPSK (2 bits per symbol)
    #[default]
    Qpsk,
}

impl Modulation {
    /// Returns the modulation order `Qm`.
    #[must_use]
    pub fn order(self) -> usize {
        match self {
            Modulation::PiOver2Bpsk => 1,
            Modulation::Qpsk => 2,
        }
    }
}

/// PUCCH format 2, 3 or 4 resource
#[derive(Clone, Copy, Eq, Hash, PartialEq, Debug, Deserialize, Serialize)]
pub struct PucchResource {
    /// PUCCH format
    pub format: PucchFormat,
    /// Index of the first PRB
    pub starting_prb: usize,
    /// Number of PRBs
    pub nof_prb: usize,
    /// Index of the first OFDM symbol in the slot
    pub start_symbol: usize,
    /// Number of OFDM symbols
    pub nof_symbols: usize,
    /// Modulation scheme
    pub modulation: Modulation,
    /// Orthogonal cover code length (format 4 only)
    pub occ_length: usize,
    /// Intra-slot frequency hopping
    pub intra_slot_hopping: bool,
    /// Additional DM-RS (formats 3 and 4)
    pub additional_dmrs: bool,
}

impl PucchResource {
    /// Returns format 2 resource (QPSK).
    #[must_use]
    pub fn format2(
        starting_prb: usize,
        nof_prb: usize,
        start_symbol: usize,
        nof_symbols: usize,
    ) -> Self {
        Self {
            format: PucchFormat::Format2,
            starting_prb,
            nof_prb,
            start_symbol,
            nof_symbols,
            modulation: Modulation::Qpsk,
            occ_length: 1,
            intra_slot_hopping: false,
            additional_dmrs: false,
        }
    }

    /// Returns format 3 resource without frequency hopping or additional DM-RS.
    #[must_use]
    pub fn format3(
        starting_prb: usize,
        nof_prb: usize,
        start_symbol: usize,
        nof_symbols: usize,
        modulation: Modulation,
    ) -> Self {
        Self {
            format: PucchFormat::Format3,
            starting_prb,
            nof_prb,
            start_symbol,
            nof_symbols,
            modulation,
            occ_length: 1,
            intra_slot_hopping: false,
            additional_dmrs: false,
        }
    }

    /// Returns format 4 resource without frequency hopping or additional DM-RS.
    #[must_use]
    pub fn format4(
        starting_prb: usize,
        start_symbol: usize,
        nof_symbols: usize,
        occ_length: usize,
        modulation: Modulation,
    ) -> Self {
        Self {
            format: PucchFormat::Format4,
            starting_prb,
            nof_prb: 1,
            start_symbol,
            nof_symbols,
            modulation,
            occ_length,
            intra_slot_hopping: false,
            additional_dmrs: false,
        }
    }

    /// Returns the resource with intra-slot frequency hopping enabled or disabled.
    #[must_use]
    pub fn with_intra_slot_hopping(mut self, enabled: bool) -> Self {
        self.intra_slot_hopping = enabled;
        self
    }

    /// Returns the resource with additional DM-RS enabled or disabled.
    #[must_use]
    pub fn with_additional_dmrs(mut self, enabled: bool) -> Self {
        self.additional_dmrs = enabled;
        self
    }

    /// Checks that the resource parameters are within the legal ranges for its format.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of range.
    pub fn validate(&self) -> Result<(), Error> {
        let (symbol_range, prb_ok) = match self.format {
            PucchFormat::Format2 => {
                if self.modulation != Modulation::Qpsk {
                    return Err(self.invalid("format 2 supports QPSK only"));
                }
                (1 ..= 2, (1 ..= 16).contains(&self.nof_prb))
            }
            PucchFormat::Format3 => (4 ..= 14, FORMAT3_NOF_PRB.contains(&self.nof_prb)),
            PucchFormat::Format4 => {
                if self.occ_length != 2 && self.occ_length != 4 {
                    return Err(self.invalid("format 4 OCC length must be 2 or 4"));
                }
                (4 ..= 14, self.nof_prb == 1)
            }
        };
        if !symbol_range.contains(&self.nof_symbols) {
            return Err(self.invalid("number of symbols out of range"));
        }
        if !prb_ok {
            return Err(self.invalid("number of PRBs not allowed"));
        }
        if self.start_symbol + self.nof_symbols > NOF_SYMBOLS_PER_SLOT {
            return Err(self.invalid("symbols exceed the slot"));
        }
        if self.starting_prb + self.nof_prb > MAX_NOF_PRB {
            return Err(self.invalid("PRBs exceed the carrier"));
        }
        Ok(())
    }

    /// Returns the modulation order `Qm`.
    #[must_use]
    pub fn modulation_order(&self) -> usize {
        self.modulation.order()
    }

    /// Returns the number of DM-RS symbols (always `0` for format 2, whose DM-RS is multiplexed
    /// in frequency).
    #[must_use]
    pub fn dmrs_symbols(&self) -> usize {
        match self.format {
            PucchFormat::Format2 => 0,
            PucchFormat::Format3 | PucchFormat::Format4 => match self.nof_symbols {
                0 ..= 3 => 0,
                4 => 1 + usize::from(self.intra_slot_hopping),
                5 ..= 9 => 2,
                _ => 2 + 2 * usize::from(self.additional_dmrs),
            },
        }
    }

    /// Returns the number of symbols carrying UCI.
    #[must_use]
    pub fn nof_uci_symbols(&self) -> usize {
        self.nof_symbols.saturating_sub(self.dmrs_symbols())
    }

    /// Returns the number `E` of coded bits the resource carries.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource is invalid.
    ///
    /// # Examples
    ///
    /// ```
    /// use nr_uci::pucch::{Modulation, PucchResource};
    ///
    /// assert_eq!(PucchResource::format2(0, 4, 12, 2).nof_bits()?, 128);
    /// assert_eq!(PucchResource::format3(0, 1, 0, 14, Modulation::Qpsk).nof_bits()?, 288);
    /// assert!(PucchResource::format2(0, 0, 12, 2).nof_bits().is_err());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn nof_bits(&self) -> Result<usize, Error> {
        self.validate()?;
        let e = match self.format {
            PucchFormat::Format2 => 16 * self.nof_symbols * self.nof_prb,
            PucchFormat::Format3 => {
                NOF_SUBCARRIERS_PER_PRB
                    * self.modulation_order()
                    * self.nof_uci_symbols()
                    * self.nof_prb
            }
            PucchFormat::Format4 => {
                NOF_SUBCARRIERS_PER_PRB * self.modulation_order() * self.nof_uci_symbols()
                    / self.occ_length
            }
        };
        if e == 0 || e > MAX_E {
            return Err(self.invalid("no valid number of coded bits"));
        }
        Ok(e)
    }

    /// Returns the error for an out-of-range parameter.
    fn invalid(&self, reason: &str) -> Error {
        Error::InvalidResource(format!("{reason} ({self:?})"))
    }
}
