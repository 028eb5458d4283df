//! Sortable 128-bit identifiers rendered as 26 Crockford base32 characters.
//!
//! The top 48 bits hold the creation time in Unix milliseconds and the low 80
//! bits are random. Identifiers produced by one process are strictly
//! increasing, so ordering rows by `id` is ordering them by creation.

use std::{
  fmt,
  str::FromStr,
  sync::{Mutex, PoisonError},
};

use chrono::{DateTime, Utc};
use rand_core::{OsRng, RngCore as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::Error;

const ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Length of the textual form of an [`Id`].
pub const ENCODED_LEN: usize = 26;

const RANDOM_BITS: u32 = 80;
const RANDOM_MASK: u128 = (1 << RANDOM_BITS) - 1;

static GENERATOR: Mutex<IdGenerator> = Mutex::new(IdGenerator::new());

// ─── Id ──────────────────────────────────────────────────────────────────────

/// A globally unique, lexicographically sortable identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(u128);

impl Id {
  /// Produce a fresh identifier from the process-wide generator.
  pub fn new() -> Self {
    let now = Utc::now().timestamp_millis().max(0) as u64;
    let mut random = [0u8; 10];
    OsRng.fill_bytes(&mut random);

    GENERATOR
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .next_id(now, random)
  }

  pub const fn as_u128(self) -> u128 { self.0 }

  /// The creation time embedded in the identifier.
  pub fn timestamp(self) -> DateTime<Utc> {
    let millis = (self.0 >> RANDOM_BITS) as i64;
    DateTime::from_timestamp_millis(millis).unwrap_or(DateTime::UNIX_EPOCH)
  }

  fn encode(self) -> [u8; ENCODED_LEN] {
    let mut out = [0u8; ENCODED_LEN];
    for (i, slot) in out.iter_mut().enumerate() {
      let shift = 5 * (ENCODED_LEN - 1 - i);
      *slot = ALPHABET[((self.0 >> shift) & 0x1f) as usize];
    }
    out
  }
}

impl Default for Id {
  fn default() -> Self { Self::new() }
}

impl fmt::Display for Id {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let encoded = self.encode();
    // The alphabet is pure ASCII.
    f.write_str(std::str::from_utf8(&encoded).map_err(|_| fmt::Error)?)
  }
}

impl fmt::Debug for Id {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Id({self})")
  }
}

impl FromStr for Id {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let malformed = || Error::MalformedId(s.to_owned());

    if s.len() != ENCODED_LEN {
      return Err(malformed());
    }

    let mut value: u128 = 0;
    for (i, byte) in s.bytes().enumerate() {
      let digit = decode_digit(byte).ok_or_else(malformed)?;
      // 26 * 5 = 130 bits; the leading character may only carry three.
      if i == 0 && digit > 7 {
        return Err(malformed());
      }
      value = (value << 5) | u128::from(digit);
    }
    Ok(Self(value))
  }
}

fn decode_digit(byte: u8) -> Option<u8> {
  let upper = byte.to_ascii_uppercase();
  let normalized = match upper {
    b'O' => b'0',
    b'I' | b'L' => b'1',
    other => other,
  };
  ALPHABET
    .iter()
    .position(|&c| c == normalized)
    .map(|p| p as u8)
}

impl Serialize for Id {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for Id {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
  }
}

// ─── Generator ───────────────────────────────────────────────────────────────

/// Monotonic id source.
///
/// Within one millisecond (or if the wall clock steps backwards) the previous
/// value is incremented instead of drawing a new random suffix, so successive
/// ids never compare lower than their predecessors.
#[derive(Debug)]
pub struct IdGenerator {
  last: u128,
}

impl IdGenerator {
  pub const fn new() -> Self { Self { last: 0 } }

  /// Build the next identifier from a millisecond timestamp and 80 random
  /// bits.
  pub fn next_id(&mut self, unix_millis: u64, random: [u8; 10]) -> Id {
    let mut tail = [0u8; 16];
    tail[6..].copy_from_slice(&random);
    let random = u128::from_be_bytes(tail) & RANDOM_MASK;

    let candidate = (u128::from(unix_millis) << RANDOM_BITS) | random;
    self.last = if candidate > self.last {
      candidate
    } else {
      self.last.wrapping_add(1)
    };
    Id(self.last)
  }
}

impl Default for IdGenerator {
  fn default() -> Self { Self::new() }
}
