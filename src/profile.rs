//! Protocol profiles describing the static parameters of each supported downlink.
use std::{collections::HashMap, fs::File, io::BufReader, path::Path, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{primitives::reed_solomon, Error, Result};

const PROFILESDB: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/src/profiles.json"));

/// Default CCSDS attached sync marker.
pub const ASM: [u8; 4] = [0x1a, 0xcf, 0xfc, 0x1d];

/// Carrier phase ambiguity of a sync word hypothesis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseShift {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl PhaseShift {
    pub const ALL: [PhaseShift; 4] = [Self::Deg0, Self::Deg90, Self::Deg180, Self::Deg270];
}

/// Reed-Solomon symbol representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RsVariant {
    /// CCSDS dual-basis representation.
    Ccsds,
    /// Conventional (Berlekamp) representation.
    Conventional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Coding {
    /// K=7, rate 1/2 convolutional code, polynomials 0x4f and 0x6d.
    Viterbi27,
    /// No inner code, symbols are hard-sliced directly into bits.
    Uncoded,
}

/// How records are laid out in the input stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputEncoding {
    /// One soft symbol per byte, 128 being the neutral value.
    SoftSymbols,
    /// Eight hard bits per byte, MSB first.
    PackedBits,
}

/// A single correlation hypothesis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncWord {
    /// Expected hard symbols, first symbol in the most significant used bit.
    #[serde(with = "hex_pattern")]
    pub pattern: u64,
    pub phase: PhaseShift,
    pub iq_inverted: bool,
}

impl SyncWord {
    /// Build the hypothesis for `base` as seen through the given phase rotation and I/Q
    /// swap.
    #[must_use]
    pub fn distorted(base: u64, bits: usize, phase: PhaseShift, iq_inverted: bool) -> Self {
        Self {
            pattern: distort(base, bits, phase, iq_inverted),
            phase,
            iq_inverted,
        }
    }
}

/// Apply a phase rotation, preceded by an optional I/Q swap, to every symbol pair of a
/// `bits` wide hard symbol pattern.
#[must_use]
pub fn distort(pattern: u64, bits: usize, phase: PhaseShift, iq_inverted: bool) -> u64 {
    let mut out = 0u64;
    for pair in 0..bits / 2 {
        let shift = bits - 2 - 2 * pair;
        let mut i = (pattern >> (shift + 1)) & 1;
        let mut q = (pattern >> shift) & 1;
        if iq_inverted {
            std::mem::swap(&mut i, &mut q);
        }
        let (i, q) = match phase {
            PhaseShift::Deg0 => (i, q),
            PhaseShift::Deg90 => (q ^ 1, i),
            PhaseShift::Deg180 => (i ^ 1, q ^ 1),
            PhaseShift::Deg270 => (q, i ^ 1),
        };
        out = (out << 2) | (i << 1) | q;
    }
    out
}

/// Static parameters of a downlink protocol.
///
/// Profiles are looked up by key from a [Registry] and never mutated after
/// construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolProfile {
    pub key: String,
    #[serde(default)]
    pub description: String,
    pub input: InputEncoding,
    pub coding: Coding,
    /// Symbols per coded frame.
    pub coded_frame_size: usize,
    /// Bytes per decoded frame, sync word included.
    pub frame_size: usize,
    pub frame_bits: usize,
    /// Width of each sync word pattern in symbols.
    pub sync_bits: usize,
    /// Bytes of sync word at the start of each decoded frame.
    pub sync_word_size: usize,
    pub sync_words: Vec<SyncWord>,
    pub min_correlation: u32,
    pub flywheel_recheck: u32,
    pub lock_window_divisor: usize,
    /// Coded symbols carried over from the previous frame, 0 to disable.
    pub tail_symbols: usize,
    /// Frames are NRZ-M encoded.
    pub differential: bool,
    pub rs_blocks: usize,
    /// Parity bytes over all interleaved blocks.
    pub rs_parity_block_size: usize,
    pub rs_variant: RsVariant,
    /// Frames per statistics averaging window.
    pub average_window: u64,
}

impl ProtocolProfile {
    /// Size of the payload forwarded for each accepted frame.
    #[must_use]
    pub fn payload_size(&self) -> usize {
        self.frame_size - self.rs_parity_block_size - self.sync_word_size
    }

    /// Length of the interleaved Reed-Solomon code block following the sync word.
    #[must_use]
    pub fn codeblock_size(&self) -> usize {
        self.frame_size - self.sync_word_size
    }

    #[must_use]
    pub fn correlation_words(&self) -> Vec<u64> {
        self.sync_words.iter().map(|w| w.pattern).collect()
    }

    /// Check the profile parameters are consistent with each other.
    ///
    /// # Errors
    /// [Error::InvalidProfile] naming the first inconsistency found.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| {
            Err(Error::InvalidProfile {
                key: self.key.clone(),
                reason,
            })
        };

        if self.key.is_empty() {
            return invalid("key must not be empty".into());
        }
        if self.frame_size == 0 || self.frame_bits != self.frame_size * 8 {
            return invalid(format!(
                "frame_bits={} does not match frame_size={}",
                self.frame_bits, self.frame_size
            ));
        }
        let expected_coded = match self.coding {
            Coding::Viterbi27 => self.frame_bits * 2,
            Coding::Uncoded => self.frame_bits,
        };
        if self.coded_frame_size != expected_coded {
            return invalid(format!(
                "coded_frame_size={} expected {expected_coded} for {:?}",
                self.coded_frame_size, self.coding
            ));
        }
        if self.sync_words.is_empty() {
            return invalid("at least one sync word is required".into());
        }
        if self.sync_bits == 0 || self.sync_bits > 64 || self.sync_bits % 2 != 0 {
            return invalid(format!("sync_bits={} must be even and in 2..=64", self.sync_bits));
        }
        if u64::from(self.min_correlation) > self.sync_bits as u64 {
            return invalid(format!(
                "min_correlation={} exceeds sync_bits={}",
                self.min_correlation, self.sync_bits
            ));
        }
        if self.lock_window_divisor == 0
            || self.coded_frame_size / self.lock_window_divisor < self.sync_bits
        {
            return invalid(format!(
                "lock_window_divisor={} leaves no room for a sync word",
                self.lock_window_divisor
            ));
        }
        if self.flywheel_recheck == 0 || self.average_window == 0 {
            return invalid("flywheel_recheck and average_window must be positive".into());
        }
        if self.tail_symbols % 16 != 0 || self.tail_symbols >= self.coded_frame_size {
            return invalid(format!(
                "tail_symbols={} must be a multiple of 16 shorter than a frame",
                self.tail_symbols
            ));
        }
        if self.coding == Coding::Uncoded && self.tail_symbols != 0 {
            return invalid("tail carryover requires convolutional coding".into());
        }
        if self.rs_blocks == 0
            || self.sync_word_size >= self.frame_size
            || self.codeblock_size() != self.rs_blocks * reed_solomon::N
        {
            return invalid(format!(
                "{} bytes after the sync word cannot hold {} RS blocks",
                self.codeblock_size(),
                self.rs_blocks
            ));
        }
        if self.rs_parity_block_size != self.rs_blocks * reed_solomon::PARITY_LEN {
            return invalid(format!(
                "rs_parity_block_size={} expected {}",
                self.rs_parity_block_size,
                self.rs_blocks * reed_solomon::PARITY_LEN
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ProfileDb {
    profiles: Vec<ProtocolProfile>,
}

/// Protocol profiles by key.
///
/// The default registry contains the built-in `lrpt`, `hrd` and `hrd-cadu` profiles.
/// Additional profiles may be loaded using [Registry::with_file].
///
/// # Example
/// ```
/// use wxdecode::Registry;
///
/// let registry = Registry::default();
/// let lrpt = registry.get("lrpt").unwrap();
/// assert_eq!(lrpt.payload_size(), 892);
/// ```
#[derive(Debug, Clone)]
pub struct Registry {
    profiles: HashMap<String, Arc<ProtocolProfile>>,
}

impl Default for Registry {
    fn default() -> Self {
        let db: ProfileDb =
            serde_json::from_str(PROFILESDB).expect("built-in profile db is not valid");
        Self {
            profiles: db
                .profiles
                .into_iter()
                .map(|p| (p.key.clone(), Arc::new(p)))
                .collect(),
        }
    }
}

impl Registry {
    /// Load profiles from a JSON file of the form `{"profiles": [...]}`.
    ///
    /// If `built_in` is true the built-in profiles are included, with profiles from the
    /// file replacing any built-in of the same key.
    ///
    /// # Errors
    /// [Error::Open] if the file cannot be opened, [Error::Json] if it cannot be parsed, or
    /// [Error::InvalidProfile] if any profile fails validation.
    pub fn with_file<P: AsRef<Path>>(path: P, built_in: bool) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Error::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let db: ProfileDb = serde_json::from_reader(BufReader::new(file))?;

        let mut registry = if built_in {
            Self::default()
        } else {
            Self {
                profiles: HashMap::new(),
            }
        };
        for profile in db.profiles {
            profile.validate()?;
            registry
                .profiles
                .insert(profile.key.clone(), Arc::new(profile));
        }
        Ok(registry)
    }

    /// Look up a profile by key.
    ///
    /// # Errors
    /// [Error::UnknownProtocol] if there is no profile for `key`.
    pub fn get(&self, key: &str) -> Result<Arc<ProtocolProfile>> {
        self.profiles
            .get(key)
            .cloned()
            .ok_or_else(|| Error::UnknownProtocol(key.to_string()))
    }

    /// All profile keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

mod hex_pattern {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{value:#018x}"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let s = String::deserialize(deserializer)?;
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(&s);
        u64::from_str_radix(digits, 16).map_err(D::Error::custom)
    }
}
