//! Polar code construction for UCI
//!
//! Implements the construction of 3GPP TS 38.212 sections 5.3.1.1 and 5.3.1.2 for a code with
//! `K` information bits (payload plus CRC) transmitted over `E` rate-matched bits: choice of the
//! mother code length `N`, pre-freezing of punctured or shortened positions, selection of the
//! information and parity-check (PC) bit positions from the reliability sequence, and the
//! allocation of the information bits onto the `N` polar encoder inputs.

use tracing::trace;

use crate::rate_match::RateMatchMode;
use crate::{Bit, Error, Interleaver};

/// Maximum `log2(N)` for UCI
pub const N_MAX_LOG_UCI: usize = 10;

/// Minimum `log2(N)`
pub(crate) const N_MIN_LOG: usize = 5;

/// Number of PC bits when `18 <= K <= 25`
const NUM_PC_BITS: usize = 3;

/// Polar sequence `Q_0^{Nmax-1}` of Table 5.3.1.2-1 of 3GPP TS 38.212, in ascending order of
/// reliability
const RELIABILITY_SEQUENCE: [u16; 1024] = [
    0, 1, 2, 4, 8, 16, 32, 3, 5, 64, 9, 6, 17, 10, 18, 128, 12, 33, 65, 20, 256, 34, 24, 36, 7, 129,
    66, 512, 11, 40, 68, 130, 19, 13, 48, 14, 72, 257, 21, 132, 35, 258, 26, 513, 80, 37, 25, 22,
    136, 260, 264, 38, 514, 96, 67, 41, 144, 28, 69, 42, 516, 49, 74, 272, 160, 520, 288, 528, 192,
    544, 70, 44, 131, 81, 50, 73, 15, 320, 133, 52, 23, 134, 384, 76, 137, 82, 56, 27, 97, 39, 259,
    84, 138, 145, 261, 29, 43, 98, 515, 88, 140, 30, 146, 71, 262, 265, 161, 576, 45, 100, 640, 51,
    148, 46, 75, 266, 273, 517, 104, 162, 53, 193, 152, 77, 164, 768, 268, 274, 518, 54, 83, 57,
    521, 112, 135, 78, 289, 194, 85, 276, 522, 58, 168, 139, 99, 86, 60, 280, 89, 290, 529, 524,
    196, 141, 101, 147, 176, 142, 530, 321, 31, 200, 90, 545, 292, 322, 532, 263, 149, 102, 105,
    304, 296, 163, 92, 47, 267, 385, 546, 324, 208, 386, 150, 153, 165, 106, 55, 328, 536, 577, 548,
    113, 154, 79, 269, 108, 578, 224, 166, 519, 552, 195, 270, 641, 523, 275, 580, 291, 59, 169,
    560, 114, 277, 156, 87, 197, 116, 170, 61, 531, 525, 642, 281, 278, 526, 177, 293, 388, 91, 584,
    769, 198, 172, 120, 201, 336, 62, 282, 143, 103, 178, 294, 93, 644, 202, 592, 323, 392, 297,
    770, 107, 180, 151, 209, 284, 648, 94, 204, 298, 400, 608, 352, 325, 533, 155, 210, 305, 547,
    300, 109, 184, 534, 537, 115, 167, 225, 326, 306, 772, 157, 656, 329, 110, 117, 212, 171, 776,
    330, 226, 549, 538, 387, 308, 216, 416, 271, 279, 158, 337, 550, 672, 118, 332, 579, 540, 389,
    173, 121, 553, 199, 784, 179, 228, 338, 312, 704, 390, 174, 554, 581, 393, 283, 122, 448, 353,
    561, 203, 63, 340, 394, 527, 582, 556, 181, 295, 285, 232, 124, 205, 182, 643, 562, 286, 585,
    299, 354, 211, 401, 185, 396, 344, 586, 645, 593, 535, 240, 206, 95, 327, 564, 800, 402, 356,
    307, 301, 417, 213, 568, 832, 588, 186, 646, 404, 227, 896, 594, 418, 302, 649, 771, 360, 539,
    111, 331, 214, 309, 188, 449, 217, 408, 609, 596, 551, 650, 229, 159, 420, 310, 541, 773, 610,
    657, 333, 119, 600, 339, 218, 368, 652, 230, 391, 313, 450, 542, 334, 233, 555, 774, 175, 123,
    658, 612, 341, 777, 220, 314, 424, 395, 673, 583, 355, 287, 183, 234, 125, 557, 660, 616, 342,
    316, 241, 778, 563, 345, 452, 397, 403, 207, 674, 558, 785, 432, 357, 187, 236, 664, 624, 587,
    780, 705, 126, 242, 565, 398, 346, 456, 358, 405, 303, 569, 244, 595, 189, 566, 676, 361, 706,
    589, 215, 786, 647, 348, 419, 406, 464, 680, 801, 362, 590, 409, 570, 788, 597, 572, 219, 311,
    708, 598, 601, 651, 421, 792, 802, 611, 602, 410, 231, 688, 653, 248, 369, 190, 364, 654, 659,
    335, 480, 315, 221, 370, 613, 422, 425, 451, 614, 543, 235, 412, 343, 372, 775, 317, 222, 426,
    453, 237, 559, 833, 804, 712, 834, 661, 808, 779, 617, 604, 433, 720, 816, 836, 347, 897, 243,
    662, 454, 318, 675, 618, 898, 781, 376, 428, 665, 736, 567, 840, 625, 238, 359, 457, 399, 787,
    591, 678, 434, 677, 349, 245, 458, 666, 620, 363, 127, 191, 782, 407, 436, 626, 571, 465, 681,
    246, 707, 350, 599, 668, 790, 460, 249, 682, 573, 411, 803, 789, 709, 365, 440, 628, 689, 374,
    423, 466, 793, 250, 371, 481, 574, 413, 603, 366, 468, 655, 900, 805, 615, 684, 710, 429, 794,
    252, 373, 605, 848, 690, 713, 632, 482, 806, 427, 904, 414, 223, 663, 692, 835, 619, 472, 455,
    796, 809, 714, 721, 837, 716, 864, 810, 606, 912, 722, 696, 377, 435, 817, 319, 621, 812, 484,
    430, 838, 667, 488, 239, 378, 459, 622, 627, 437, 380, 818, 461, 496, 669, 679, 724, 841, 629,
    351, 467, 438, 737, 251, 462, 442, 441, 469, 247, 683, 842, 738, 899, 670, 783, 849, 820, 728,
    928, 791, 367, 901, 630, 685, 844, 633, 711, 253, 691, 824, 902, 686, 740, 850, 375, 444, 470,
    483, 415, 485, 905, 795, 473, 634, 744, 852, 960, 865, 693, 797, 906, 715, 807, 474, 636, 694,
    254, 717, 575, 913, 798, 811, 379, 697, 431, 607, 489, 866, 723, 486, 908, 718, 813, 476, 856,
    839, 725, 698, 914, 752, 868, 819, 814, 439, 929, 490, 623, 671, 739, 916, 463, 843, 381, 497,
    930, 821, 726, 961, 872, 492, 631, 729, 700, 443, 741, 845, 920, 382, 822, 851, 730, 498, 880,
    742, 445, 471, 635, 932, 687, 903, 825, 500, 846, 745, 826, 732, 446, 962, 936, 475, 853, 867,
    637, 907, 487, 695, 746, 828, 753, 854, 857, 504, 799, 255, 964, 909, 719, 477, 915, 638, 748,
    944, 869, 491, 699, 754, 858, 478, 968, 383, 910, 815, 976, 870, 917, 727, 493, 873, 701, 931,
    756, 860, 499, 731, 823, 922, 874, 918, 502, 933, 743, 760, 881, 494, 702, 921, 501, 876, 847,
    992, 447, 733, 827, 934, 882, 937, 963, 747, 505, 855, 924, 734, 829, 965, 938, 884, 506, 749,
    945, 966, 755, 859, 940, 830, 911, 871, 639, 888, 479, 946, 750, 969, 508, 861, 757, 970, 919,
    875, 862, 758, 948, 977, 923, 972, 761, 877, 952, 495, 703, 935, 978, 883, 762, 503, 925, 878,
    735, 993, 885, 939, 994, 980, 926, 764, 941, 967, 886, 831, 947, 507, 889, 984, 751, 942, 996,
    971, 890, 509, 949, 973, 1000, 892, 950, 863, 759, 1008, 510, 979, 953, 763, 974, 954, 879, 981,
    982, 927, 995, 765, 956, 887, 985, 997, 986, 943, 891, 998, 766, 511, 988, 1001, 951, 1002, 893,
    975, 894, 1009, 955, 1004, 1010, 957, 983, 958, 987, 1012, 999, 1016, 767, 989, 1003, 990, 1005,
    959, 1011, 1013, 895, 1006, 1014, 1017, 1018, 991, 1020, 1007, 1015, 1019, 1021, 1022, 1023,
];

/// Role of each polar encoder input bit
#[derive(Clone, Copy, Eq, Hash, PartialEq, Debug)]
pub enum BitRole {
    /// Frozen bit (always `Zero`)
    Frozen,
    /// Information bit (payload or CRC)
    Info,
    /// Parity-check bit computed from preceding information bits
    ParityCheck,
}

/// Five-bit cyclic shift register generating the PC bits.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct ParityRegister([Bit; 5]);

impl ParityRegister {
    /// Cyclically shifts the register by one position; must be called once per input bit.
    pub(crate) fn advance(&mut self) {
        self.0.rotate_left(1);
    }

    /// Returns the value of a PC bit at the current position and accumulates it, which clears
    /// the current register cell.
    pub(crate) fn emit_parity(&mut self) -> Bit {
        let bit = self.0[0];
        self.0[0] = Bit::Zero;
        bit
    }

    /// Accumulates an information bit.
    pub(crate) fn update(&mut self, bit: Bit) {
        self.0[0] ^= bit;
    }
}

/// Polar code description
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct PolarCode {
    /// `log2(N)`
    n_log: usize,
    /// Number of information bits (payload plus CRC)
    k: usize,
    /// Number of rate-matched bits
    e: usize,
    /// Number of PC bits
    num_pc: usize,
    /// Role of each of the `N` encoder input bits
    roles: Vec<BitRole>,
}

impl PolarCode {
    /// Returns polar code for `k` information bits and `e` rate-matched bits.
    ///
    /// # Parameters
    ///
    /// - `k`: Number of information bits, including the CRC bits.
    ///
    /// - `e`: Number of bits after rate matching.
    ///
    /// - `n_max_log`: Maximum `log2(N)`, in the range `[5, 10]` ([`N_MAX_LOG_UCI`] for UCI).
    ///
    /// # Errors
    ///
    /// Returns an error if `n_max_log` is out of range, if `k` or `e` is `0`, or if the
    /// information and PC bits do not fit in the positions left after pre-freezing.
    ///
    /// # Examples
    ///
    /// ```
    /// use nr_uci::polar_code::{PolarCode, N_MAX_LOG_UCI};
    ///
    /// let code = PolarCode::new(31, 100, N_MAX_LOG_UCI)?;
    /// assert_eq!(code.n(), 128);
    /// assert_eq!(code.num_pc(), 0);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(k: usize, e: usize, n_max_log: usize) -> Result<Self, Error> {
        if !(N_MIN_LOG ..= N_MAX_LOG_UCI).contains(&n_max_log) {
            return Err(Error::InvalidInput(format!(
                "Maximum polar code length exponent must be in [{N_MIN_LOG}, {N_MAX_LOG_UCI}] \
                 (found {n_max_log})"
            )));
        }
        if k == 0 || e == 0 {
            return Err(Error::InvalidConfig(format!(
                "Polar code needs a positive number of information and coded bits (K = {k}, \
                 E = {e})"
            )));
        }
        let n_log = mother_code_log_len(k, e, n_max_log);
        let n = 1 << n_log;
        let (num_pc, num_pc_wm) = num_parity_check_bits(k, e);
        let prefrozen = prefrozen_positions(k, e, n)?;
        // Candidate positions in ascending order of reliability
        let candidates: Vec<usize> = RELIABILITY_SEQUENCE
            .iter()
            .map(|&idx| usize::from(idx))
            .filter(|&idx| idx < n && !prefrozen[idx])
            .collect();
        if candidates.len() < k + num_pc {
            return Err(Error::InvalidConfig(format!(
                "Cannot place {} information and PC bits in {} available positions (K = {k}, \
                 E = {e}, N = {n})",
                k + num_pc,
                candidates.len()
            )));
        }
        let info_set = &candidates[candidates.len() - k - num_pc ..];
        let mut roles = vec![BitRole::Frozen; n];
        for &idx in info_set {
            roles[idx] = BitRole::Info;
        }
        for &idx in &info_set[.. num_pc - num_pc_wm] {
            roles[idx] = BitRole::ParityCheck;
        }
        if num_pc_wm > 0 {
            // Minimum row weight among the K most reliable positions, most reliable first
            let most_reliable = &info_set[num_pc ..];
            let min_weight = most_reliable.iter().map(|idx| idx.count_ones()).min();
            if let Some(idx) = most_reliable
                .iter()
                .rev()
                .find(|idx| Some(idx.count_ones()) == min_weight)
            {
                roles[*idx] = BitRole::ParityCheck;
            }
        }
        trace!(k, e, n, num_pc, num_pc_wm, "Constructed polar code");
        Ok(Self {
            n_log,
            k,
            e,
            num_pc,
            roles,
        })
    }

    /// Returns the mother code length `N`.
    #[must_use]
    pub fn n(&self) -> usize {
        1 << self.n_log
    }

    /// Returns `log2(N)`.
    #[must_use]
    pub fn n_log(&self) -> usize {
        self.n_log
    }

    /// Returns the number of information bits `K`.
    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Returns the number of rate-matched bits `E`.
    #[must_use]
    pub fn e(&self) -> usize {
        self.e
    }

    /// Returns the number of PC bits.
    #[must_use]
    pub fn num_pc(&self) -> usize {
        self.num_pc
    }

    /// Returns the role of each encoder input bit.
    #[must_use]
    pub fn roles(&self) -> &[BitRole] {
        &self.roles
    }

    /// Places the information bits on the encoder input and computes the PC bits.
    ///
    /// # Parameters
    ///
    /// - `info_bits`: The `K` information bits, in order.
    ///
    /// - `input`: Buffer of length `N` for the polar encoder input.
    ///
    /// # Errors
    ///
    /// Returns an error if `info_bits.len() != K` or `input.len() != N`.
    pub fn allocate(&self, info_bits: &[Bit], input: &mut [Bit]) -> Result<(), Error> {
        if info_bits.len() != self.k || input.len() != self.n() {
            return Err(Error::InvalidInput(format!(
                "Polar channel allocation expects {} information bits and {} input bits (found \
                 {} and {})",
                self.k,
                self.n(),
                info_bits.len(),
                input.len()
            )));
        }
        let mut register = ParityRegister::default();
        let mut info_iter = info_bits.iter();
        for (u, role) in input.iter_mut().zip(&self.roles) {
            register.advance();
            *u = match role {
                BitRole::Frozen => Bit::Zero,
                BitRole::ParityCheck => register.emit_parity(),
                BitRole::Info => {
                    let bit = info_iter.next().copied().unwrap_or_default();
                    register.update(bit);
                    bit
                }
            };
        }
        Ok(())
    }

    /// Appends the information bits found in the encoder input `input` to `info_bits`.
    pub fn deallocate(&self, input: &[Bit], info_bits: &mut Vec<Bit>) {
        info_bits.extend(
            input
                .iter()
                .zip(&self.roles)
                .filter(|&(_, &role)| role == BitRole::Info)
                .map(|(&u, _)| u),
        );
    }
}

/// Returns `log2(N)` for `k` information bits and `e` rate-matched bits.
///
/// # Examples
///
/// ```
/// use nr_uci::polar_code::{mother_code_log_len, N_MAX_LOG_UCI};
///
/// assert_eq!(mother_code_log_len(31, 100, N_MAX_LOG_UCI), 7);
/// ```
#[must_use]
pub fn mother_code_log_len(k: usize, e: usize, n_max_log: usize) -> usize {
    let ceil_log2_e = ceil_log2(e);
    let n1 = if ceil_log2_e > 0 && 8 * e <= 9 * (1 << (ceil_log2_e - 1)) && 16 * k < 9 * e {
        ceil_log2_e - 1
    } else {
        ceil_log2_e
    };
    // Minimum code rate 1/8
    let n2 = ceil_log2(8 * k);
    n1.min(n2).min(n_max_log).max(N_MIN_LOG)
}

/// Returns the total number of PC bits and the number placed by minimum row weight.
fn num_parity_check_bits(k: usize, e: usize) -> (usize, usize) {
    if (18 ..= 25).contains(&k) {
        let num_pc_wm = usize::from(e + NUM_PC_BITS > k + 192);
        (NUM_PC_BITS, num_pc_wm)
    } else {
        (0, 0)
    }
}

/// Returns a mask of the encoder input positions frozen because of puncturing or shortening.
fn prefrozen_positions(k: usize, e: usize, n: usize) -> Result<Vec<bool>, Error> {
    let mut prefrozen = vec![false; n];
    let mode = RateMatchMode::select(k, e, n);
    if mode == RateMatchMode::Repetition {
        return Ok(prefrozen);
    }
    let sub_block = Interleaver::polar_sub_block(n)?;
    let pattern = &sub_block.all_in_index_given_out_index;
    if mode == RateMatchMode::Puncturing {
        for &idx in &pattern[.. n - e] {
            prefrozen[idx] = true;
        }
        let num_low = if 4 * e >= 3 * n {
            (3 * n - 2 * e).div_ceil(4)
        } else {
            (9 * n - 4 * e).div_ceil(16)
        };
        for flag in &mut prefrozen[.. num_low] {
            *flag = true;
        }
    } else {
        for &idx in &pattern[e ..] {
            prefrozen[idx] = true;
        }
    }
    Ok(prefrozen)
}

/// Returns `ceil(log2(x))` for `x >= 1`.
fn ceil_log2(x: usize) -> usize {
    x.next_power_of_two().trailing_zeros() as usize
}

#[cfg(test)]
mod tests_of_polar_code {
    use super::*;
    use Bit::{One, Zero};

    fn indices_with_role(code: &PolarCode, role: BitRole) -> Vec<usize> {
        (0 .. code.n()).filter(|&i| code.roles[i] == role).collect()
    }

    #[test]
    fn test_reliability_sequence() {
        let mut seq: Vec<u16> = RELIABILITY_SEQUENCE.to_vec();
        seq.sort_unstable();
        assert!(seq.into_iter().map(usize::from).eq(0 .. 1024));
        assert_eq!(RELIABILITY_SEQUENCE[.. 8], [0, 1, 2, 4, 8, 16, 32, 3]);
    }

    #[test]
    fn test_new() {
        // Invalid input
        assert!(PolarCode::new(31, 100, 4).is_err());
        assert!(PolarCode::new(31, 100, 11).is_err());
        assert!(PolarCode::new(0, 100, N_MAX_LOG_UCI).is_err());
        assert!(PolarCode::new(31, 0, N_MAX_LOG_UCI).is_err());
        assert!(PolarCode::new(31, 30, N_MAX_LOG_UCI).is_err());
        assert!(PolarCode::new(18, 20, N_MAX_LOG_UCI).is_err());
        // Valid input, puncturing without PC bits
        let code = PolarCode::new(31, 100, N_MAX_LOG_UCI).unwrap();
        assert_eq!((code.n(), code.k(), code.e(), code.num_pc()), (128, 31, 100, 0));
        assert_eq!(indices_with_role(&code, BitRole::Info).len(), 31);
        assert!(indices_with_role(&code, BitRole::ParityCheck).is_empty());
        // Valid input, PC bits at the least reliable information positions
        let code = PolarCode::new(18, 40, N_MAX_LOG_UCI).unwrap();
        assert_eq!(code.n(), 64);
        assert_eq!(indices_with_role(&code, BitRole::ParityCheck), [7, 11, 36]);
        assert_eq!(indices_with_role(&code, BitRole::Info).len(), 18);
        // Valid input, one PC bit placed by minimum row weight
        let code = PolarCode::new(25, 300, N_MAX_LOG_UCI).unwrap();
        assert_eq!(code.n(), 256);
        assert_eq!(indices_with_role(&code, BitRole::ParityCheck), [242, 244, 248]);
        // Valid input, shortening with the smallest mother code
        let code = PolarCode::new(18, 21, N_MAX_LOG_UCI).unwrap();
        assert_eq!(code.n(), 32);
        assert_eq!(indices_with_role(&code, BitRole::ParityCheck), [0, 1, 2]);
    }

    #[test]
    fn test_allocate() {
        let code = PolarCode::new(18, 40, N_MAX_LOG_UCI).unwrap();
        let mut input = vec![One; code.n()];
        // Invalid input
        assert!(code.allocate(&[Zero; 17], &mut input).is_err());
        assert!(code.allocate(&[Zero; 18], &mut input[.. 32]).is_err());
        // Valid input
        code.allocate(&[Zero; 18], &mut input).unwrap();
        assert!(input.iter().all(|&b| b == Zero));
        let info_bits = [One; 18];
        code.allocate(&info_bits, &mut input).unwrap();
        for (idx, &role) in code.roles.iter().enumerate() {
            match role {
                BitRole::Frozen => assert_eq!(input[idx], Zero),
                BitRole::Info => assert_eq!(input[idx], One),
                BitRole::ParityCheck => {}
            }
        }
        // A PC bit is the parity of the earlier information bits congruent to it modulo 5
        let parity_at_7 = (0 .. 7)
            .filter(|&i| i % 5 == 7 % 5 && code.roles[i] == BitRole::Info)
            .count()
            % 2;
        assert_eq!(input[7], Bit::from_lsb(u32::try_from(parity_at_7).unwrap()));
    }

    #[test]
    fn test_deallocate() {
        let code = PolarCode::new(31, 100, N_MAX_LOG_UCI).unwrap();
        let info_bits: Vec<Bit> = (0 .. 31).map(|i| Bit::from_lsb(i % 3)).collect();
        let mut input = vec![Zero; code.n()];
        code.allocate(&info_bits, &mut input).unwrap();
        let mut recovered = vec![One];
        code.deallocate(&input, &mut recovered);
        assert_eq!(recovered[0], One);
        assert_eq!(recovered[1 ..], info_bits);
    }

    #[test]
    fn test_mother_code_log_len() {
        assert_eq!(mother_code_log_len(31, 100, N_MAX_LOG_UCI), 7);
        assert_eq!(mother_code_log_len(18, 40, N_MAX_LOG_UCI), 6);
        assert_eq!(mother_code_log_len(25, 300, N_MAX_LOG_UCI), 8);
        assert_eq!(mother_code_log_len(40, 1000, N_MAX_LOG_UCI), 9);
        // E slightly above a power of 2 and low rate
        assert_eq!(mother_code_log_len(20, 130, N_MAX_LOG_UCI), 7);
        // Bounded below and above
        assert_eq!(mother_code_log_len(18, 18, N_MAX_LOG_UCI), 5);
        assert_eq!(mother_code_log_len(500, 5000, N_MAX_LOG_UCI), 10);
        assert_eq!(mother_code_log_len(500, 5000, 9), 9);
    }

    #[test]
    fn test_num_parity_check_bits() {
        assert_eq!(num_parity_check_bits(17, 100), (0, 0));
        assert_eq!(num_parity_check_bits(18, 100), (3, 0));
        assert_eq!(num_parity_check_bits(25, 214), (3, 0));
        assert_eq!(num_parity_check_bits(25, 215), (3, 1));
        assert_eq!(num_parity_check_bits(26, 1000), (0, 0));
    }

    #[test]
    fn test_prefrozen_positions() {
        // Repetition
        assert!(prefrozen_positions(31, 128, 128)
            .unwrap()
            .iter()
            .all(|&f| !f));
        // Shortening freezes exactly N - E positions
        let prefrozen = prefrozen_positions(100, 120, 128).unwrap();
        assert_eq!(prefrozen.iter().filter(|&&f| f).count(), 8);
        assert!(prefrozen[127]);
        // Puncturing also freezes the lowest positions
        let prefrozen = prefrozen_positions(31, 100, 128).unwrap();
        assert!(prefrozen[.. 26].iter().all(|&f| f));
    }

    #[test]
    fn test_ceil_log2() {
        assert_eq!(ceil_log2(1), 0);
        assert_eq!(ceil_log2(2), 1);
        assert_eq!(ceil_log2(3), 2);
        assert_eq!(ceil_log2(1024), 10);
        assert_eq!(ceil_log2(1025), 11);
    }
}
