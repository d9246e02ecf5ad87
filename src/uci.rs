//! UCI configuration, values and bit sequence generation
//!
//! The UCI bit sequence of 3GPP TS 38.212 section 6.3.1.1 carries the HARQ-ACK bits first, then
//! the SR bits, then the CSI part 1 reports. Reports are ordered by the priority value of 3GPP
//! TS 38.214 section 5.2.5, lowest first, and each report field is packed MSB first.

use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{common, Bit, Error};

/// Maximum number of UCI bits on PUCCH
pub const MAX_UCI_BITS: usize = 1706;

/// Maximum number of SR bits
pub const MAX_SR_BITS: usize = 4;

/// Maximum width of a single CSI report field
pub const MAX_CSI_FIELD_BITS: usize = 32;

/// Number of bits of the RSRP field of an L1-RSRP report
pub const RSRP_BITS: usize = 7;

/// Maximum number of fields in a CSI report
const MAX_CSI_FIELDS: usize = 4;

/// Number of serving cells `N_cells` in the CSI priority rule
const PRIORITY_NOF_CELLS: usize = 32;

/// Number of report configurations `M_s` in the CSI priority rule
const PRIORITY_NOF_REPORTS: usize = 64;

/// Enumeration of CSI report types
#[derive(Clone, Copy, Eq, Hash, PartialEq, Debug, Deserialize, Serialize)]
pub enum CsiReportType {
    /// Aperiodic report on PUSCH
    Aperiodic,
    /// Semi-persistent report on PUSCH
    SemiPersistentPusch,
    /// Semi-persistent report on PUCCH
    SemiPersistentPucch,
    /// Periodic report on PUCCH
    Periodic,
}

impl CsiReportType {
    /// Returns the index `y` used in the priority rule.
    fn priority_index(self) -> usize {
        match self {
            CsiReportType::Aperiodic => 0,
            CsiReportType::SemiPersistentPusch => 1,
            CsiReportType::SemiPersistentPucch => 2,
            CsiReportType::Periodic => 3,
        }
    }
}

/// Enumeration of CSI report quantities with their field widths
#[derive(Clone, Copy, Eq, Hash, PartialEq, Debug, Deserialize, Serialize)]
pub enum CsiQuantity {
    /// CRI, RI, PMI and wideband CQI
    CriRiPmiCqi {
        /// Number of CRI bits
        cri_bits: usize,
        /// Number of RI bits
        ri_bits: usize,
        /// Number of PMI bits
        pmi_bits: usize,
        /// Number of CQI bits
        cqi_bits: usize,
    },
    /// CRI and L1-RSRP
    CriRsrp {
        /// Number of CRI bits
        cri_bits: usize,
    },
}

impl CsiQuantity {
    /// Returns the widths of the report fields, in transmission order. Unused trailing fields
    /// have zero width.
    fn field_widths(&self) -> [usize; MAX_CSI_FIELDS] {
        match *self {
            CsiQuantity::CriRiPmiCqi {
                cri_bits,
                ri_bits,
                pmi_bits,
                cqi_bits,
            } => [cri_bits, ri_bits, pmi_bits, cqi_bits],
            CsiQuantity::CriRsrp { cri_bits } => [cri_bits, RSRP_BITS, 0, 0],
        }
    }
}

/// CSI report configuration
#[derive(Clone, Copy, Eq, Hash, PartialEq, Debug, Deserialize, Serialize)]
pub struct CsiReportConfig {
    /// Report configuration identifier `s`
    pub report_id: usize,
    /// Serving cell index `c`
    pub cell_index: usize,
    /// Report type
    pub report_type: CsiReportType,
    /// Reported quantity
    pub quantity: CsiQuantity,
}

impl CsiReportConfig {
    /// Returns the priority value of the report (lower values have higher priority).
    ///
    /// # Examples
    ///
    /// ```
    /// use nr_uci::uci::{CsiQuantity, CsiReportConfig, CsiReportType};
    ///
    /// let report = CsiReportConfig {
    ///     report_id: 3,
    ///     cell_index: 1,
    ///     report_type: CsiReportType::Periodic,
    ///     quantity: CsiQuantity::CriRsrp { cri_bits: 2 },
    /// };
    /// assert_eq!(report.priority(), 3 * 4096 + 64 + 3);
    /// ```
    #[must_use]
    pub fn priority(&self) -> usize {
        let y = self.report_type.priority_index();
        let k = usize::from(!matches!(self.quantity, CsiQuantity::CriRsrp { .. }));
        2 * PRIORITY_NOF_CELLS * PRIORITY_NOF_REPORTS * y
            + PRIORITY_NOF_CELLS * PRIORITY_NOF_REPORTS * k
            + PRIORITY_NOF_REPORTS * self.cell_index
            + self.report_id
    }

    /// Returns the number of bits of the report.
    #[must_use]
    pub fn nof_bits(&self) -> usize {
        self.quantity.field_widths().iter().sum()
    }
}

/// Values of the fields of a CSI report
#[derive(Clone, Copy, Eq, Hash, PartialEq, Debug, Deserialize, Serialize)]
pub enum CsiReportValue {
    /// CRI, RI, PMI and wideband CQI
    CriRiPmiCqi {
        /// CSI-RS resource indicator
        cri: u32,
        /// Rank indicator
        ri: u32,
        /// Precoding matrix indicator
        pmi: u32,
        /// Channel quality indicator
        cqi: u32,
    },
    /// CRI and L1-RSRP
    CriRsrp {
        /// CSI-RS resource indicator
        cri: u32,
        /// Quantized RSRP
        rsrp: u32,
    },
}

impl CsiReportValue {
    /// Returns the field values, in transmission order, padded with zeros.
    fn fields(&self) -> [u32; MAX_CSI_FIELDS] {
        match *self {
            CsiReportValue::CriRiPmiCqi { cri, ri, pmi, cqi } => [cri, ri, pmi, cqi],
            CsiReportValue::CriRsrp { cri, rsrp } => [cri, rsrp, 0, 0],
        }
    }

    /// Returns report value of the given quantity from field values in transmission order.
    fn from_fields(quantity: &CsiQuantity, fields: [u32; MAX_CSI_FIELDS]) -> Self {
        match quantity {
            CsiQuantity::CriRiPmiCqi { .. } => CsiReportValue::CriRiPmiCqi {
                cri: fields[0],
                ri: fields[1],
                pmi: fields[2],
                cqi: fields[3],
            },
            CsiQuantity::CriRsrp { .. } => CsiReportValue::CriRsrp {
                cri: fields[0],
                rsrp: fields[1],
            },
        }
    }

    /// Returns `true` if the value has the shape of the given quantity.
    fn matches(&self, quantity: &CsiQuantity) -> bool {
        matches!(
            (self, quantity),
            (CsiReportValue::CriRiPmiCqi { .. }, CsiQuantity::CriRiPmiCqi { .. })
                | (CsiReportValue::CriRsrp { .. }, CsiQuantity::CriRsrp { .. })
        )
    }
}

/// UCI configuration: what a PUCCH transmission carries
#[derive(Clone, Eq, Hash, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct UciConfig {
    /// Number of HARQ-ACK bits
    pub o_ack: usize,
    /// Number of SR bits
    pub o_sr: usize,
    /// CSI part 1 reports
    pub csi: Vec<CsiReportConfig>,
}

impl UciConfig {
    /// Returns the total number `A` of UCI bits.
    ///
    /// # Examples
    ///
    /// ```
    /// use nr_uci::uci::{CsiQuantity, CsiReportConfig, CsiReportType, UciConfig};
    ///
    /// let cfg = UciConfig {
    ///     o_ack: 4,
    ///     o_sr: 1,
    ///     csi: vec![CsiReportConfig {
    ///         report_id: 0,
    ///         cell_index: 0,
    ///         report_type: CsiReportType::Periodic,
    ///         quantity: CsiQuantity::CriRiPmiCqi {
    ///             cri_bits: 0,
    ///             ri_bits: 1,
    ///             pmi_bits: 2,
    ///             cqi_bits: 4,
    ///         },
    ///     }],
    /// };
    /// assert_eq!(cfg.total_bits(), 12);
    /// ```
    #[must_use]
    pub fn total_bits(&self) -> usize {
        self.o_ack + self.o_sr + self.csi.iter().map(CsiReportConfig::nof_bits).sum::<usize>()
    }

    /// Checks that the configuration describes between 1 and [`MAX_UCI_BITS`] bits with fields
    /// of supported widths.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be carried.
    pub fn validate(&self) -> Result<(), Error> {
        let a = self.total_bits();
        if a == 0 || a > MAX_UCI_BITS {
            return Err(Error::InvalidConfig(format!(
                "Number of UCI bits must be in [1, {MAX_UCI_BITS}] (found {a})"
            )));
        }
        if self.o_sr > MAX_SR_BITS {
            return Err(Error::InvalidConfig(format!(
                "At most {MAX_SR_BITS} SR bits are supported (found {})",
                self.o_sr
            )));
        }
        if let Some(report) = self.csi.iter().find(|report| {
            report
                .quantity
                .field_widths()
                .iter()
                .any(|&width| width > MAX_CSI_FIELD_BITS)
        }) {
            return Err(Error::InvalidConfig(format!(
                "CSI report {} has a field wider than {MAX_CSI_FIELD_BITS} bits",
                report.report_id
            )));
        }
        Ok(())
    }

    /// Returns the CSI reports with their configuration indices, in transmission order.
    pub fn csi_in_priority_order(&self) -> impl Iterator<Item = (usize, &CsiReportConfig)> {
        self.csi
            .iter()
            .enumerate()
            .sorted_by_key(|(_, report)| report.priority())
    }

    /// Appends the UCI bit sequence of a value to `bits`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or if the value does not have the shape
    /// the configuration implies. Nothing is appended in that case.
    pub fn pack(&self, value: &UciValue, bits: &mut Vec<Bit>) -> Result<(), Error> {
        self.validate()?;
        self.check_value(value)?;
        bits.extend_from_slice(&value.ack);
        common::unpack_msb_first(value.sr, self.o_sr, bits);
        for (idx, report) in self.csi_in_priority_order() {
            for (field, width) in value.csi[idx]
                .fields()
                .into_iter()
                .zip(report.quantity.field_widths())
            {
                common::unpack_msb_first(field, width, bits);
            }
        }
        Ok(())
    }

    /// Returns the value carried by a UCI bit sequence.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or if `bits.len()` is not the total
    /// number of UCI bits.
    pub fn unpack(&self, bits: &[Bit]) -> Result<UciValue, Error> {
        self.validate()?;
        if bits.len() != self.total_bits() {
            return Err(Error::InvalidInput(format!(
                "Expected {} UCI bits (found {})",
                self.total_bits(),
                bits.len()
            )));
        }
        let (ack, rest) = bits.split_at(self.o_ack);
        let (sr, mut rest) = rest.split_at(self.o_sr);
        let mut csi = vec![None; self.csi.len()];
        for (idx, report) in self.csi_in_priority_order() {
            let mut fields = [0; MAX_CSI_FIELDS];
            for (field, width) in fields.iter_mut().zip(report.quantity.field_widths()) {
                let (field_bits, tail) = rest.split_at(width);
                *field = common::pack_msb_first(field_bits);
                rest = tail;
            }
            csi[idx] = Some(CsiReportValue::from_fields(&report.quantity, fields));
        }
        Ok(UciValue {
            ack: ack.to_vec(),
            sr: common::pack_msb_first(sr),
            csi: csi.into_iter().flatten().collect(),
        })
    }

    /// Checks that a value has the shape implied by the configuration.
    fn check_value(&self, value: &UciValue) -> Result<(), Error> {
        if value.ack.len() != self.o_ack {
            return Err(Error::InvalidInput(format!(
                "Expected {} HARQ-ACK bits (found {})",
                self.o_ack,
                value.ack.len()
            )));
        }
        if !fits(value.sr, self.o_sr) {
            return Err(Error::InvalidInput(format!(
                "SR value {} does not fit in {} bits",
                value.sr, self.o_sr
            )));
        }
        if value.csi.len() != self.csi.len() {
            return Err(Error::InvalidInput(format!(
                "Expected {} CSI report values (found {})",
                self.csi.len(),
                value.csi.len()
            )));
        }
        for (report, report_value) in self.csi.iter().zip(&value.csi) {
            let fits_widths = report_value
                .fields()
                .into_iter()
                .zip(report.quantity.field_widths())
                .all(|(field, width)| fits(field, width));
            if !report_value.matches(&report.quantity) || !fits_widths {
                return Err(Error::InvalidInput(format!(
                    "CSI report value {report_value:?} does not match report {}",
                    report.report_id
                )));
            }
        }
        Ok(())
    }
}

/// Returns `true` if `value` can be represented with `width` bits.
fn fits(value: u32, width: usize) -> bool {
    width >= MAX_CSI_FIELD_BITS || value >> width == 0
}

/// UCI value: the content of a PUCCH transmission
#[derive(Clone, Eq, Hash, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct UciValue {
    /// HARQ-ACK bits
    pub ack: Vec<Bit>,
    /// SR value
    pub sr: u32,
    /// CSI report values, in the order of the configured reports
    pub csi: Vec<CsiReportValue>,
}

/// UCI configuration together with a value, for logging
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct UciData<'a> {
    /// UCI configuration
    pub cfg: &'a UciConfig,
    /// UCI value
    pub value: &'a UciValue,
}

impl fmt::Display for UciData<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.cfg.o_ack > 0 {
            let ack: String = self
                .value
                .ack
                .iter()
                .map(|&b| if b == Bit::One { '1' } else { '0' })
                .collect();
            parts.push(format!("ack={ack}"));
        }
        if self.cfg.o_sr > 0 {
            parts.push(format!("sr={}", self.value.sr));
        }
        for (report, value) in self.cfg.csi.iter().zip(&self.value.csi) {
            let fields = match value {
                CsiReportValue::CriRiPmiCqi { cri, ri, pmi, cqi } => {
                    format!("cri={cri} ri={ri} pmi={pmi} cqi={cqi}")
                }
                CsiReportValue::CriRsrp { cri, rsrp } => format!("cri={cri} rsrp={rsrp}"),
            };
            parts.push(format!("csi{}=[{fields}]", report.report_id));
        }
        write!(f, "{}", parts.join(", "))
    }
}
