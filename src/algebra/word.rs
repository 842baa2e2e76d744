//! DeltaWord: fixed-width bit vector under XOR. An Abelian group where every
//! element is its own inverse.

use core::fmt;
use core::ops::{BitXor, BitXorAssign};

/// Width W = 64 x `LIMBS` bits. Limbs are little endian: `limbs[0]` holds bits 0..64.
///
/// Words of different widths are different types, so composing them is a
/// compile error rather than a runtime check.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct DeltaWord<const LIMBS: usize> {
    limbs: [u64; LIMBS],
}

pub type Word64 = DeltaWord<1>;
pub type Word128 = DeltaWord<2>;
pub type Word256 = DeltaWord<4>;
pub type Word512 = DeltaWord<8>;

impl<const LIMBS: usize> DeltaWord<LIMBS> {
    const NONZERO_WIDTH: () = assert!(LIMBS > 0, "DeltaWord needs at least one 64-bit limb");

    /// Width in bits.
    pub const BITS: usize = LIMBS * 64;
    /// Encoded width in bytes.
    pub const BYTES: usize = LIMBS * 8;

    /// The identity. `compose(a, ZERO) == a`.
    pub const ZERO: Self = {
        let () = Self::NONZERO_WIDTH;
        Self { limbs: [0u64; LIMBS] }
    };

    #[inline(always)]
    pub const fn from_limbs(limbs: [u64; LIMBS]) -> Self {
        let () = Self::NONZERO_WIDTH;
        Self { limbs }
    }

    /// Low limb set to `value`, every other limb zero.
    #[inline(always)]
    pub const fn from_u64(value: u64) -> Self {
        let mut word = Self::ZERO;
        word.limbs[0] = value;
        word
    }

    #[inline(always)]
    pub const fn limbs(&self) -> &[u64; LIMBS] {
        &self.limbs
    }

    /// Low 64 bits.
    #[inline(always)]
    pub const fn low_u64(&self) -> u64 {
        self.limbs[0]
    }

    /// Bitwise XOR. Total, constant-time, no side effects.
    #[inline(always)]
    pub fn compose(self, other: Self) -> Self {
        let mut limbs = self.limbs;
        for (limb, rhs) in limbs.iter_mut().zip(other.limbs.iter()) {
            *limb ^= rhs;
        }
        Self { limbs }
    }

    /// The delta that moves state `from` to state `to`.
    ///
    /// `compose(from, transition(from, to)) == to`.
    #[inline(always)]
    pub fn transition(from: Self, to: Self) -> Self {
        from.compose(to)
    }

    #[inline(always)]
    pub fn is_zero(&self) -> bool {
        self.limbs.iter().fold(0u64, |acc, limb| acc | limb) == 0
    }

    #[inline(always)]
    pub fn count_ones(&self) -> u32 {
        self.limbs.iter().map(|limb| limb.count_ones()).sum()
    }

    /// 64-bit mix of every limb. Used by hashed bank distribution.
    #[inline(always)]
    pub fn fingerprint(&self) -> u64 {
        self.limbs.iter().fold(0x9E37_79B9_7F4A_7C15u64, |acc, &limb| {
            let mut z = acc ^ limb;
            z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
            z ^ (z >> 31)
        })
    }

    /// Append `BYTES` little-endian bytes.
    #[inline]
    pub fn extend_le(&self, out: &mut Vec<u8>) {
        for limb in &self.limbs {
            out.extend_from_slice(&limb.to_le_bytes());
        }
    }

    /// Parse exactly `BYTES` little-endian bytes.
    #[inline]
    pub fn from_le_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::BYTES {
            return None;
        }
        let mut limbs = [0u64; LIMBS];
        for (limb, chunk) in limbs.iter_mut().zip(bytes.chunks_exact(8)) {
            *limb = u64::from_le_bytes(chunk.try_into().ok()?);
        }
        Some(Self::from_limbs(limbs))
    }
}

impl<const LIMBS: usize> Default for DeltaWord<LIMBS> {
    #[inline(always)]
    fn default() -> Self {
        Self::ZERO
    }
}

impl<const LIMBS: usize> From<u64> for DeltaWord<LIMBS> {
    #[inline(always)]
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl<const LIMBS: usize> From<[u64; LIMBS]> for DeltaWord<LIMBS> {
    #[inline(always)]
    fn from(limbs: [u64; LIMBS]) -> Self {
        Self::from_limbs(limbs)
    }
}

impl<const LIMBS: usize> BitXor for DeltaWord<LIMBS> {
    type Output = Self;

    #[inline(always)]
    fn bitxor(self, rhs: Self) -> Self {
        self.compose(rhs)
    }
}

impl<const LIMBS: usize> BitXorAssign for DeltaWord<LIMBS> {
    #[inline(always)]
    fn bitxor_assign(&mut self, rhs: Self) {
        *self = self.compose(rhs);
    }
}

impl<const LIMBS: usize> fmt::LowerHex for DeltaWord<LIMBS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            f.write_str("0x")?;
        }
        for limb in self.limbs.iter().rev() {
            write!(f, "{limb:016x}")?;
        }
        Ok(())
    }
}

impl<const LIMBS: usize> fmt::UpperHex for DeltaWord<LIMBS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            f.write_str("0x")?;
        }
        for limb in self.limbs.iter().rev() {
            write!(f, "{limb:016X}")?;
        }
        Ok(())
    }
}

impl<const LIMBS: usize> fmt::Display for DeltaWord<LIMBS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:#x}")
    }
}

impl<const LIMBS: usize> fmt::Debug for DeltaWord<LIMBS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeltaWord<{}>({self:#x})", Self::BITS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_size() {
        assert_eq!(core::mem::size_of::<Word64>(), 8);
        assert_eq!(core::mem::size_of::<Word256>(), 32);
        assert_eq!(Word128::BITS, 128);
        assert_eq!(Word512::BYTES, 64);
    }

    #[test]
    fn test_compose_is_xor() {
        let a = Word64::from_u64(0x11);
        let b = Word64::from_u64(0x22);
        assert_eq!(a.compose(b), Word64::from_u64(0x33));
        assert_eq!(a ^ b, Word64::from_u64(0x33));
    }

    #[test]
    fn test_self_inverse_and_identity() {
        let a = Word256::from_limbs([1, u64::MAX, 0xDEAD_BEEF, 7]);
        assert_eq!(a.compose(a), Word256::ZERO);
        assert_eq!(a.compose(Word256::ZERO), a);
        assert!(Word256::ZERO.is_zero());
        assert!(!a.is_zero());
    }

    #[test]
    fn test_transition() {
        let from = Word128::from_limbs([0xAAAA, 0x5555]);
        let to = Word128::from_limbs([0x0F0F, 0xF0F0]);
        let delta = Word128::transition(from, to);
        assert_eq!(from ^ delta, to);
    }

    #[test]
    fn test_le_codec() {
        let word = Word128::from_limbs([0x0102_0304_0506_0708, 0x1112_1314_1516_1718]);
        let mut buf = Vec::new();
        word.extend_le(&mut buf);
        assert_eq!(buf.len(), Word128::BYTES);
        assert_eq!(buf[0], 0x08);
        assert_eq!(buf[8], 0x18);
        assert_eq!(Word128::from_le_slice(&buf), Some(word));
        assert_eq!(Word128::from_le_slice(&buf[..15]), None);
    }

    #[test]
    fn test_hex_formatting() {
        let word = Word128::from_limbs([0x33, 0x1]);
        assert_eq!(format!("{word:x}"), "00000000000000010000000000000033");
        assert_eq!(format!("{}", Word64::from_u64(0xAB)), "0x00000000000000ab");
        assert_eq!(format!("{:#X}", Word64::from_u64(0xAB)), "0x00000000000000AB");
    }

    #[test]
    fn test_count_ones_and_fingerprint() {
        let word = Word256::from_limbs([0b1011, 0, u64::MAX, 1]);
        assert_eq!(word.count_ones(), 3 + 64 + 1);
        assert_eq!(word.fingerprint(), word.fingerprint());
        assert_ne!(word.fingerprint(), Word256::ZERO.fingerprint());
    }
}
