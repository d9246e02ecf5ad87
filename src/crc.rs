//! Cyclic redundancy check over bit sequences
//!
//! The two polynomials used for UCI on PUCCH are those of 3GPP TS 38.212 section 5.1:
//! `gCRC6(D) = D^6 + D^5 + 1` and `gCRC11(D) = D^11 + D^10 + D^9 + D^5 + 1`. The register starts
//! at zero, bits are processed MSB first, and the parity bits are appended MSB first.

use crate::{common, Bit, Error};

/// Generator polynomial of the 6-bit CRC (without the `D^6` term)
pub const CRC6_POLY: u32 = 0x21;

/// Generator polynomial of the 11-bit CRC (without the `D^11` term)
pub const CRC11_POLY: u32 = 0x621;

/// CRC engine for a generator polynomial of a given degree
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct Crc {
    /// Generator polynomial, excluding the leading term
    poly: u32,
    /// Number of parity bits (degree of the generator polynomial)
    order: usize,
    /// Mask selecting the `order` least significant bits
    mask: u32,
}

impl Crc {
    /// Returns CRC engine for a given generator polynomial.
    ///
    /// # Parameters
    ///
    /// - `poly`: Generator polynomial, excluding the leading `D^order` term. Must be less than
    ///   `2^order` and odd (a CRC generator always has a nonzero constant term).
    ///
    /// - `order`: Number of parity bits, in the range `[1, 32]`.
    ///
    /// # Errors
    ///
    /// Returns an error if `order` or `poly` is invalid.
    ///
    /// # Examples
    ///
    /// ```
    /// use nr_uci::crc::{Crc, CRC6_POLY};
    ///
    /// let crc6 = Crc::new(CRC6_POLY, 6)?;
    /// assert_eq!(crc6.order(), 6);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(poly: u32, order: usize) -> Result<Self, Error> {
        if order == 0 || order > 32 {
            return Err(Error::InvalidInput(format!(
                "CRC order must be in the range [1, 32] (found {order})"
            )));
        }
        let mask = if order == 32 {
            u32::MAX
        } else {
            (1 << order) - 1
        };
        if poly & !mask != 0 || poly & 1 == 0 {
            return Err(Error::InvalidInput(format!(
                "Invalid generator polynomial {poly:#x} for a CRC of order {order}"
            )));
        }
        Ok(Self { poly, order, mask })
    }

    /// Returns the 6-bit CRC engine used for `12 <= A <= 19`.
    #[must_use]
    pub fn crc6() -> Self {
        Self {
            poly: CRC6_POLY,
            order: 6,
            mask: 0x3f,
        }
    }

    /// Returns the 11-bit CRC engine used for `A >= 20`.
    #[must_use]
    pub fn crc11() -> Self {
        Self {
            poly: CRC11_POLY,
            order: 11,
            mask: 0x7ff,
        }
    }

    /// Returns the number of parity bits.
    #[must_use]
    pub fn order(&self) -> usize {
        self.order
    }

    /// Returns the parity bits for a bit sequence as an integer (first parity bit in the MSB).
    ///
    /// # Examples
    ///
    /// ```
    /// use nr_uci::{crc::Crc, Bit};
    ///
    /// let crc6 = Crc::crc6();
    /// assert_eq!(crc6.checksum(&[Bit::One]), 0b100001);
    /// ```
    #[must_use]
    pub fn checksum(&self, bits: &[Bit]) -> u32 {
        let msb = self.order - 1;
        bits.iter().fold(0u32, |reg, &b| {
            let feedback = ((reg >> msb) & 1) ^ (b as u32);
            let shifted = (reg << 1) & self.mask;
            if feedback == 1 {
                shifted ^ self.poly
            } else {
                shifted
            }
        })
    }

    /// Appends the parity bits of the current contents of `bits` to it.
    ///
    /// # Examples
    ///
    /// ```
    /// use nr_uci::{crc::Crc, Bit};
    /// use Bit::{One, Zero};
    ///
    /// let crc6 = Crc::crc6();
    /// let mut bits = vec![One];
    /// crc6.attach(&mut bits);
    /// assert_eq!(bits, [One, One, Zero, Zero, Zero, Zero, One]);
    /// ```
    pub fn attach(&self, bits: &mut Vec<Bit>) {
        let parity = self.checksum(bits);
        common::unpack_msb_first(parity, self.order, bits);
    }

    /// Returns `true` if the trailing `order` bits of `bits` are the parity bits of the leading
    /// ones. Sequences shorter than `order` never match.
    #[must_use]
    pub fn matches(&self, bits: &[Bit]) -> bool {
        if bits.len() < self.order {
            return false;
        }
        let (payload, parity) = bits.split_at(bits.len() - self.order);
        self.checksum(payload) == common::pack_msb_first(parity)
    }
}

#[cfg(test)]
mod tests_of_crc {
    use super::*;
    use Bit::{One, Zero};

    fn payload() -> Vec<Bit> {
        vec![One, Zero, One, One, Zero, Zero, One, Zero, One, One, One, Zero]
    }

    #[test]
    fn test_new() {
        // Invalid input
        assert!(Crc::new(0x21, 0).is_err());
        assert!(Crc::new(0x21, 33).is_err());
        assert!(Crc::new(0x61, 6).is_err());
        assert!(Crc::new(0x20, 6).is_err());
        // Valid input
        assert_eq!(Crc::new(CRC6_POLY, 6).unwrap(), Crc::crc6());
        assert_eq!(Crc::new(CRC11_POLY, 11).unwrap(), Crc::crc11());
        assert!(Crc::new(0x04c1_1db7, 32).is_ok());
    }

    #[test]
    fn test_checksum() {
        assert_eq!(Crc::crc6().checksum(&[]), 0);
        assert_eq!(Crc::crc6().checksum(&payload()), 0b101110);
        assert_eq!(Crc::crc11().checksum(&payload()), 0b111_1101_0101);
        // Leading zeros do not change the parity bits
        let mut padded = vec![Zero; 5];
        padded.extend(payload());
        assert_eq!(Crc::crc11().checksum(&padded), 0b111_1101_0101);
    }

    #[test]
    fn test_attach() {
        let mut bits = payload();
        Crc::crc6().attach(&mut bits);
        assert_eq!(bits.len(), 18);
        assert_eq!(&bits[12 ..], [One, Zero, One, One, One, Zero]);
    }

    #[test]
    fn test_matches() {
        for crc in [Crc::crc6(), Crc::crc11()] {
            let mut bits = payload();
            crc.attach(&mut bits);
            assert!(crc.matches(&bits));
            for idx in 0 .. bits.len() {
                let mut corrupted = bits.clone();
                corrupted[idx] ^= One;
                assert!(!crc.matches(&corrupted));
            }
        }
        assert!(!Crc::crc11().matches(&[One, Zero]));
    }
}
