//! Checkpoints. One record per accumulator: initial state, every bank's
//! accumulator and undo ring, and the global order log.
//!
//! Layout: [CheckpointHeader:64][initial:W][bank records][order:4*n]
//! Bank record: [accumulator:W][history_count:8][history:W*capacity][applied:8]
//! History slots are oldest first, zero padded to capacity. All integers little endian.
//! The header's BLAKE3 hash covers header bytes 0..32 plus the body.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::algebra::DeltaWord;

use super::config::{ConfigError, Distribution, EngineConfig};

pub const CHECKPOINT_MAGIC: [u8; 4] = [0xDB, 0xA4, 0xC0, 0x01];
pub const CHECKPOINT_VERSION: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CheckpointError {
    #[error("checkpoint is truncated")]
    Truncated,
    #[error("trailing bytes after checkpoint body")]
    TrailingBytes,
    #[error("bad checkpoint magic")]
    InvalidMagic,
    #[error("unsupported checkpoint version {0}")]
    UnsupportedVersion(u16),
    #[error("checkpoint words are {found} limbs wide, expected {expected}")]
    WidthMismatch { expected: usize, found: usize },
    #[error("unknown distribution tag {0}")]
    InvalidDistribution(u8),
    #[error("checkpoint hash mismatch")]
    HashMismatch,
    #[error("invalid checkpoint configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
    #[error("bank {bank} history holds {len} entries, capacity is {capacity}")]
    HistoryOverflow {
        bank: usize,
        len: usize,
        capacity: usize,
    },
    #[error("order log references bank {bank}, only {banks} banks exist")]
    InvalidOrderEntry { bank: u32, banks: usize },
}

/// On-disk checkpoint header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct CheckpointHeader {
    pub magic: [u8; 4],
    pub version: u16,
    pub distribution: u8,
    _pad: u8,
    /// Word width in 64-bit limbs.
    pub limbs: u32,
    pub banks: u32,
    pub history_capacity: u64,
    pub order_len: u64,
    pub hash: [u8; 32],
}

const _: () = {
    assert!(core::mem::size_of::<CheckpointHeader>() == 64);
};

impl CheckpointHeader {
    pub const SIZE: usize = 64;
    /// Bytes of the header covered by `hash`.
    const HASHED_PREFIX: usize = 32;

    fn compute_hash(&self, body: &[u8]) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.as_bytes()[..Self::HASHED_PREFIX]);
        hasher.update(body);
        *hasher.finalize().as_bytes()
    }
}

/// One bank as persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankRecord<const LIMBS: usize> {
    pub accumulator: DeltaWord<LIMBS>,
    /// Oldest first.
    pub history: Vec<DeltaWord<LIMBS>>,
    pub applied: u64,
}

/// A consistent cut of a `ParallelAccumulator`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint<const LIMBS: usize> {
    pub initial_state: DeltaWord<LIMBS>,
    pub distribution: Distribution,
    pub history_capacity: usize,
    pub banks: Vec<BankRecord<LIMBS>>,
    /// Bank index of each undoable delta, oldest first.
    pub order: Vec<u32>,
}

/// Cursor over the checkpoint body.
struct BodyReader<'a> {
    buf: &'a [u8],
}

impl<'a> BodyReader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], CheckpointError> {
        if self.buf.len() < n {
            return Err(CheckpointError::Truncated);
        }
        let (head, rest) = self.buf.split_at(n);
        self.buf = rest;
        Ok(head)
    }

    fn word<const LIMBS: usize>(&mut self) -> Result<DeltaWord<LIMBS>, CheckpointError> {
        let bytes = self.take(DeltaWord::<LIMBS>::BYTES)?;
        DeltaWord::from_le_slice(bytes).ok_or(CheckpointError::Truncated)
    }

    fn u64(&mut self) -> Result<u64, CheckpointError> {
        let bytes = self.take(8)?;
        Ok(u64::from_le_bytes(bytes.try_into().map_err(|_| CheckpointError::Truncated)?))
    }

    fn u32(&mut self) -> Result<u32, CheckpointError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes(bytes.try_into().map_err(|_| CheckpointError::Truncated)?))
    }
}

impl<const LIMBS: usize> Checkpoint<LIMBS> {
    pub fn config(&self) -> EngineConfig {
        EngineConfig {
            banks: self.banks.len(),
            history_capacity: self.history_capacity,
            distribution: self.distribution,
        }
    }

    /// Structural checks. Everything `decode` accepts passes this.
    pub fn validate(&self) -> Result<(), CheckpointError> {
        self.config().validate()?;
        for (bank, record) in self.banks.iter().enumerate() {
            if record.history.len() > self.history_capacity {
                return Err(CheckpointError::HistoryOverflow {
                    bank,
                    len: record.history.len(),
                    capacity: self.history_capacity,
                });
            }
        }
        if let Some(&bank) = self.order.iter().find(|&&b| b as usize >= self.banks.len()) {
            return Err(CheckpointError::InvalidOrderEntry {
                bank,
                banks: self.banks.len(),
            });
        }
        Ok(())
    }

    fn body_len(banks: usize, history_capacity: usize, order_len: usize) -> Option<usize> {
        let word = DeltaWord::<LIMBS>::BYTES;
        let record = history_capacity.checked_mul(word)?.checked_add(word + 16)?;
        banks
            .checked_mul(record)?
            .checked_add(word)?
            .checked_add(order_len.checked_mul(4)?)
    }

    pub fn encode(&self) -> Result<Vec<u8>, CheckpointError> {
        self.validate()?;

        let body_len = Self::body_len(self.banks.len(), self.history_capacity, self.order.len())
            .ok_or(CheckpointError::Truncated)?;
        let mut body = Vec::with_capacity(body_len);

        self.initial_state.extend_le(&mut body);
        for record in &self.banks {
            record.accumulator.extend_le(&mut body);
            body.extend_from_slice(&(record.history.len() as u64).to_le_bytes());
            for delta in &record.history {
                delta.extend_le(&mut body);
            }
            for _ in record.history.len()..self.history_capacity {
                DeltaWord::<LIMBS>::ZERO.extend_le(&mut body);
            }
            body.extend_from_slice(&record.applied.to_le_bytes());
        }
        for bank in &self.order {
            body.extend_from_slice(&bank.to_le_bytes());
        }

        let mut header = CheckpointHeader {
            magic: CHECKPOINT_MAGIC,
            version: CHECKPOINT_VERSION,
            distribution: self.distribution as u8,
            _pad: 0,
            limbs: LIMBS as u32,
            banks: self.banks.len() as u32,
            history_capacity: self.history_capacity as u64,
            order_len: self.order.len() as u64,
            hash: [0u8; 32],
        };
        header.hash = header.compute_hash(&body);

        let mut out = Vec::with_capacity(CheckpointHeader::SIZE + body.len());
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(&body);
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CheckpointError> {
        if bytes.len() < CheckpointHeader::SIZE {
            return Err(CheckpointError::Truncated);
        }
        let (header_bytes, body) = bytes.split_at(CheckpointHeader::SIZE);
        let header = CheckpointHeader::read_from_bytes(header_bytes)
            .map_err(|_| CheckpointError::Truncated)?;

        if header.magic != CHECKPOINT_MAGIC {
            return Err(CheckpointError::InvalidMagic);
        }
        if header.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::UnsupportedVersion(header.version));
        }
        if header.limbs as usize != LIMBS {
            return Err(CheckpointError::WidthMismatch {
                expected: LIMBS,
                found: header.limbs as usize,
            });
        }
        let distribution = Distribution::from_u8(header.distribution)
            .ok_or(CheckpointError::InvalidDistribution(header.distribution))?;

        // Constant-time comparison via blake3::Hash.
        if blake3::Hash::from(header.compute_hash(body)) != blake3::Hash::from(header.hash) {
            return Err(CheckpointError::HashMismatch);
        }

        let config = EngineConfig {
            banks: header.banks as usize,
            history_capacity: header.history_capacity as usize,
            distribution,
        };
        config.validate()?;

        let order_len = header.order_len as usize;
        let expected = Self::body_len(config.banks, config.history_capacity, order_len)
            .ok_or(CheckpointError::Truncated)?;
        if body.len() < expected {
            return Err(CheckpointError::Truncated);
        }
        if body.len() > expected {
            return Err(CheckpointError::TrailingBytes);
        }

        let mut reader = BodyReader { buf: body };
        let initial_state = reader.word()?;

        let mut banks = Vec::with_capacity(config.banks);
        for bank in 0..config.banks {
            let accumulator = reader.word()?;
            let len = reader.u64()? as usize;
            if len > config.history_capacity {
                return Err(CheckpointError::HistoryOverflow {
                    bank,
                    len,
                    capacity: config.history_capacity,
                });
            }
            let mut history = Vec::with_capacity(len);
            for slot in 0..config.history_capacity {
                let delta = reader.word()?;
                if slot < len {
                    history.push(delta);
                }
            }
            let applied = reader.u64()?;
            banks.push(BankRecord {
                accumulator,
                history,
                applied,
            });
        }

        let mut order = Vec::with_capacity(order_len);
        for _ in 0..order_len {
            let bank = reader.u32()?;
            if bank as usize >= config.banks {
                return Err(CheckpointError::InvalidOrderEntry {
                    bank,
                    banks: config.banks,
                });
            }
            order.push(bank);
        }

        Ok(Self {
            initial_state,
            distribution,
            history_capacity: config.history_capacity,
            banks,
            order,
        })
    }
}

/// Checkpoint file manager for writing and reading checkpoints.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    checkpoint_path: PathBuf,
}

impl CheckpointManager {
    pub fn new(checkpoint_path: impl AsRef<Path>) -> Self {
        Self {
            checkpoint_path: checkpoint_path.as_ref().to_path_buf(),
        }
    }

    /// Write to a sibling temp file, fsync, then rename over the target.
    pub fn write_checkpoint<const LIMBS: usize>(
        &self,
        checkpoint: &Checkpoint<LIMBS>,
    ) -> io::Result<()> {
        let bytes = checkpoint
            .encode()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let tmp_path = self.checkpoint_path.with_extension("tmp");
        let mut file = File::create(&tmp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        std::fs::rename(&tmp_path, &self.checkpoint_path)
    }

    /// Read the checkpoint back.
    /// Returns None if the file is missing, corrupt, or fails integrity verification.
    pub fn read_checkpoint<const LIMBS: usize>(&self) -> io::Result<Option<Checkpoint<LIMBS>>> {
        let mut file = match File::open(&self.checkpoint_path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        match Checkpoint::decode(&bytes) {
            Ok(checkpoint) => Ok(Some(checkpoint)),
            Err(err) => {
                tracing::warn!(
                    path = %self.checkpoint_path.display(),
                    error = %err,
                    "discarding unreadable checkpoint"
                );
                Ok(None)
            }
        }
    }

    pub fn exists(&self) -> bool {
        self.checkpoint_path.exists()
    }

    pub fn path(&self) -> &Path {
        &self.checkpoint_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::{Word128, Word64};

    fn sample() -> Checkpoint<2> {
        Checkpoint {
            initial_state: Word128::from_limbs([0xAA, 0xBB]),
            distribution: Distribution::RoundRobin,
            history_capacity: 3,
            banks: vec![
                BankRecord {
                    accumulator: Word128::from_limbs([0x11 ^ 0x44, 0]),
                    history: vec![Word128::from_u64(0x11), Word128::from_u64(0x44)],
                    applied: 2,
                },
                BankRecord {
                    accumulator: Word128::from_u64(0x22),
                    history: vec![Word128::from_u64(0x22)],
                    applied: 1,
                },
            ],
            order: vec![0, 1, 0],
        }
    }

    #[test]
    fn test_header_size() {
        assert_eq!(core::mem::size_of::<CheckpointHeader>(), 64);
    }

    #[test]
    fn test_encode_decode() {
        let checkpoint = sample();
        let bytes = checkpoint.encode().unwrap();
        // header + initial + 2 * (acc + count + 3 slots + applied) + 3 order entries
        assert_eq!(bytes.len(), 64 + 16 + 2 * (16 + 8 + 48 + 8) + 12);
        assert_eq!(Checkpoint::<2>::decode(&bytes).unwrap(), checkpoint);
    }

    #[test]
    fn test_corruption_detected() {
        let mut bytes = sample().encode().unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        assert_eq!(Checkpoint::<2>::decode(&bytes), Err(CheckpointError::HashMismatch));

        let mut bytes = sample().encode().unwrap();
        bytes[12] ^= 0x01; // banks field
        assert_eq!(Checkpoint::<2>::decode(&bytes), Err(CheckpointError::HashMismatch));
    }

    #[test]
    fn test_rejects_bad_header() {
        let bytes = sample().encode().unwrap();
        assert_eq!(Checkpoint::<2>::decode(&bytes[..40]), Err(CheckpointError::Truncated));

        let mut bad_magic = bytes.clone();
        bad_magic[0] = 0;
        assert_eq!(Checkpoint::<2>::decode(&bad_magic), Err(CheckpointError::InvalidMagic));

        assert_eq!(
            Checkpoint::<1>::decode(&bytes),
            Err(CheckpointError::WidthMismatch { expected: 1, found: 2 })
        );
    }

    #[test]
    fn test_truncated_body() {
        let bytes = sample().encode().unwrap();
        assert!(Checkpoint::<2>::decode(&bytes[..bytes.len() - 4]).is_err());
    }

    #[test]
    fn test_validate() {
        let mut checkpoint = sample();
        checkpoint.order.push(5);
        assert_eq!(
            checkpoint.validate(),
            Err(CheckpointError::InvalidOrderEntry { bank: 5, banks: 2 })
        );

        let mut checkpoint = sample();
        checkpoint.banks[1].history = vec![Word128::ZERO; 4];
        assert!(matches!(
            checkpoint.encode(),
            Err(CheckpointError::HistoryOverflow { bank: 1, len: 4, capacity: 3 })
        ));

        let mut checkpoint = sample();
        checkpoint.history_capacity = 0;
        assert_eq!(
            checkpoint.validate(),
            Err(CheckpointError::InvalidConfig(ConfigError::ZeroHistoryCapacity))
        );
    }

    #[test]
    fn test_manager_roundtrip() {
        let path = std::env::temp_dir().join(format!("deltabank_ckpt_{}.ckpt", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let manager = CheckpointManager::new(&path);

        assert!(!manager.exists());
        assert!(manager.read_checkpoint::<2>().unwrap().is_none());

        manager.write_checkpoint(&sample()).unwrap();
        assert!(manager.exists());
        assert_eq!(manager.read_checkpoint::<2>().unwrap(), Some(sample()));

        // Wrong width reads as "no usable checkpoint", not an I/O error.
        assert!(manager.read_checkpoint::<1>().unwrap().is_none());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_single_limb_roundtrip() {
        let checkpoint = Checkpoint::<1> {
            initial_state: Word64::from_u64(7),
            distribution: Distribution::Hashed,
            history_capacity: 1,
            banks: vec![BankRecord {
                accumulator: Word64::ZERO,
                history: Vec::new(),
                applied: 0,
            }],
            order: Vec::new(),
        };
        let bytes = checkpoint.encode().unwrap();
        assert_eq!(Checkpoint::<1>::decode(&bytes).unwrap(), checkpoint);
    }
}
