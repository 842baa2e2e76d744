//! Contribution wire frame.
//! Format: [Magic:4][Version:1][Kind:1][Limbs:2][Node:8][Sequence:8][CRC32:4][Value:8*Limbs]
//! Integers little endian. CRC32 covers the value bytes.

use zerocopy::byteorder::little_endian::{U16, U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::algebra::DeltaWord;

/// Magic bytes identifying a contribution frame.
pub const WIRE_MAGIC: [u8; 4] = [0xDB, 0xA4, 0xC7, 0x0B];

/// Current protocol version.
pub const WIRE_VERSION: u8 = 1;

/// What a contribution's value is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ContributionKind {
    /// The node's merged accumulator.
    Accumulator = 1,
    /// The node's reconstructed state. Folding states only yields the global
    /// state when every node started from zero over a disjoint partition; a
    /// shared initial state is folded once per node and cancels in pairs.
    /// Nodes sharing an initial state send `Accumulator` and the aggregator
    /// supplies the state through `MergeSession::with_base`.
    State = 2,
}

impl ContributionKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::Accumulator),
            2 => Some(Self::State),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("frame shorter than its header or value")]
    InsufficientData,
    #[error("bad frame magic")]
    InvalidMagic,
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),
    #[error("unknown contribution kind {0}")]
    InvalidKind(u8),
    #[error("frame carries {found}-limb words, expected {expected}")]
    WidthMismatch { expected: usize, found: usize },
    #[error("value CRC mismatch")]
    CrcMismatch,
}

/// Frame header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct WireHeader {
    pub magic: [u8; 4],
    pub version: u8,
    pub kind: u8,
    pub limbs: U16,
    pub node: U64,
    pub sequence: U64,
    pub crc32: U32,
}

const _: () = {
    assert!(core::mem::size_of::<WireHeader>() == 28);
};

impl WireHeader {
    pub const SIZE: usize = 28;

    fn validate<const LIMBS: usize>(&self) -> Result<ContributionKind, ProtocolError> {
        if self.magic != WIRE_MAGIC {
            return Err(ProtocolError::InvalidMagic);
        }
        if self.version != WIRE_VERSION {
            return Err(ProtocolError::UnsupportedVersion(self.version));
        }
        let kind =
            ContributionKind::from_u8(self.kind).ok_or(ProtocolError::InvalidKind(self.kind))?;
        let limbs = self.limbs.get() as usize;
        if limbs != LIMBS {
            return Err(ProtocolError::WidthMismatch {
                expected: LIMBS,
                found: limbs,
            });
        }
        Ok(kind)
    }
}

/// One node's whole accumulator (or state) as of `sequence`. Not an increment:
/// a later contribution from the same node replaces an earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contribution<const LIMBS: usize> {
    pub node: u64,
    /// Monotonic per node. Only used to detect duplicate delivery.
    pub sequence: u64,
    pub kind: ContributionKind,
    pub value: DeltaWord<LIMBS>,
}

impl<const LIMBS: usize> Contribution<LIMBS> {
    /// Full frame size for this width.
    pub const ENCODED_LEN: usize = WireHeader::SIZE + DeltaWord::<LIMBS>::BYTES;

    pub const fn accumulator(node: u64, sequence: u64, value: DeltaWord<LIMBS>) -> Self {
        Self {
            node,
            sequence,
            kind: ContributionKind::Accumulator,
            value,
        }
    }

    pub const fn state(node: u64, sequence: u64, value: DeltaWord<LIMBS>) -> Self {
        Self {
            node,
            sequence,
            kind: ContributionKind::State,
            value,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::ENCODED_LEN);
        buf.resize(WireHeader::SIZE, 0);
        self.value.extend_le(&mut buf);

        let header = WireHeader {
            magic: WIRE_MAGIC,
            version: WIRE_VERSION,
            kind: self.kind as u8,
            limbs: U16::new(LIMBS as u16),
            node: U64::new(self.node),
            sequence: U64::new(self.sequence),
            crc32: U32::new(crc32fast::hash(&buf[WireHeader::SIZE..])),
        };
        buf[..WireHeader::SIZE].copy_from_slice(header.as_bytes());
        buf
    }

    /// Decode one frame from the front of `buf`.
    /// Returns the contribution and the bytes consumed.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), ProtocolError> {
        let (header, rest) =
            WireHeader::read_from_prefix(buf).map_err(|_| ProtocolError::InsufficientData)?;
        let kind = header.validate::<LIMBS>()?;

        let value_bytes = rest
            .get(..DeltaWord::<LIMBS>::BYTES)
            .ok_or(ProtocolError::InsufficientData)?;
        if crc32fast::hash(value_bytes) != header.crc32.get() {
            return Err(ProtocolError::CrcMismatch);
        }
        let value = DeltaWord::from_le_slice(value_bytes).ok_or(ProtocolError::InsufficientData)?;

        Ok((
            Self {
                node: header.node.get(),
                sequence: header.sequence.get(),
                kind,
                value,
            },
            Self::ENCODED_LEN,
        ))
    }
}

/// Decode back-to-back frames. Stops at the first error.
pub fn decode_stream<const LIMBS: usize>(
    mut buf: &[u8],
) -> Result<Vec<Contribution<LIMBS>>, ProtocolError> {
    let mut out = Vec::with_capacity(buf.len() / Contribution::<LIMBS>::ENCODED_LEN);
    while !buf.is_empty() {
        let (contribution, used) = Contribution::decode(buf)?;
        out.push(contribution);
        buf = &buf[used..];
    }
    Ok(out)
}
