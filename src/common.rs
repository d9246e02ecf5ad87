//! Types needed in multiple modules

use serde::{Deserialize, Serialize};

/// Enumeration of binary symbol values
#[derive(Clone, Eq, Hash, PartialEq, Debug, Copy, Default, Deserialize, Serialize)]
pub enum Bit {
    /// Binary symbol `0`
    #[default]
    Zero = 0,
    /// Binary symbol `1`
    One = 1,
}

impl Bit {
    /// Returns the bit with value `value & 1`.
    #[must_use]
    pub fn from_lsb(value: u32) -> Self {
        if value & 1 == 0 {
            Bit::Zero
        } else {
            Bit::One
        }
    }

    /// Returns `1.0` for `Zero` and `-1.0` for `One`.
    #[must_use]
    pub(crate) fn antipodal(self) -> f32 {
        match self {
            Bit::Zero => 1.0,
            Bit::One => -1.0,
        }
    }
}

impl std::ops::BitXor for Bit {
    type Output = Bit;

    fn bitxor(self, rhs: Bit) -> Bit {
        if self == rhs {
            Bit::Zero
        } else {
            Bit::One
        }
    }
}

impl std::ops::BitXorAssign for Bit {
    fn bitxor_assign(&mut self, rhs: Bit) {
        *self = *self ^ rhs;
    }
}

impl From<bool> for Bit {
    fn from(value: bool) -> Self {
        if value {
            Bit::One
        } else {
            Bit::Zero
        }
    }
}

/// Custom error type
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// PUCCH resource parameters outside the legal range for the format
    #[error("Invalid PUCCH resource: {0}")]
    InvalidResource(String),
    /// UCI configuration that cannot be carried (no bits, too many bits, or too few coded bits)
    #[error("Invalid UCI configuration: {0}")]
    InvalidConfig(String),
    /// Invalid input error
    #[error("{0}")]
    InvalidInput(String),
    /// Scratch buffer reservation failed
    #[error("Allocation failure: {0}")]
    AllocationFailure(String),
    /// No valid UCI could be recovered from the soft bits
    #[error("Decoding rejected: {0}")]
    DecodeRejected(String),
    /// File read/write error
    #[error("{0}")]
    FileReadWriteError(#[from] std::io::Error),
    /// Serde read/write error
    #[error("{0}")]
    SerdeReadWriteError(#[from] serde_json::Error),
}

impl Error {
    /// Returns `true` if the error signals that no valid UCI was received (as opposed to a
    /// malformed request).
    #[must_use]
    pub fn is_decode_rejected(&self) -> bool {
        matches!(self, Error::DecodeRejected(_))
    }
}

/// Packs bits into an integer, MSB first.
pub(crate) fn pack_msb_first(bits: &[Bit]) -> u32 {
    bits.iter()
        .fold(0, |acc, &b| (acc << 1) | u32::from(b == Bit::One))
}

/// Appends the `num_bits` least significant bits of `value` to `bits`, MSB first.
pub(crate) fn unpack_msb_first(value: u32, num_bits: usize, bits: &mut Vec<Bit>) {
    bits.extend((0 .. num_bits).rev().map(|i| Bit::from_lsb(value >> i)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use Bit::{One, Zero};

    #[test]
    fn test_bitxor() {
        assert_eq!(Zero ^ Zero, Zero);
        assert_eq!(Zero ^ One, One);
        assert_eq!(One ^ Zero, One);
        assert_eq!(One ^ One, Zero);
        let mut b = One;
        b ^= One;
        assert_eq!(b, Zero);
    }

    #[test]
    fn test_bit_serde() {
        assert_eq!(serde_json::to_string(&[Zero, One]).unwrap(), r#"["Zero","One"]"#);
        let bits: Vec<Bit> = serde_json::from_str(r#"["One","One","Zero"]"#).unwrap();
        assert_eq!(bits, [One, One, Zero]);
    }

    #[test]
    fn test_from_lsb() {
        assert_eq!(Bit::from_lsb(0), Zero);
        assert_eq!(Bit::from_lsb(3), One);
        assert_eq!(Bit::from_lsb(6), Zero);
    }

    #[test]
    fn test_pack_msb_first() {
        assert_eq!(pack_msb_first(&[]), 0);
        assert_eq!(pack_msb_first(&[One, Zero, One, One]), 0b1011);
    }

    #[test]
    fn test_unpack_msb_first() {
        let mut bits = vec![One];
        unpack_msb_first(0b0110, 4, &mut bits);
        assert_eq!(bits, [One, Zero, One, One, Zero]);
        unpack_msb_first(0b1, 0, &mut bits);
        assert_eq!(bits.len(), 5);
    }

    #[test]
    fn test_is_decode_rejected() {
        assert!(Error::DecodeRejected("crc".to_string()).is_decode_rejected());
        assert!(!Error::InvalidConfig("a".to_string()).is_decode_rejected());
    }
}
