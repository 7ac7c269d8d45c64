//! Turns a requested capacity range into the size of a new volume.

use csi::volume::CapacityRange;
use std::fmt;
use thiserror::Error;
use tracing::warn;

pub const KIB: u64 = 1 << 10;
pub const MIB: u64 = 1 << 20;
pub const GIB: u64 = 1 << 30;
pub const TIB: u64 = 1 << 40;

pub const MINIMUM_VOLUME_SIZE: u64 = GIB;
pub const MAXIMUM_VOLUME_SIZE: u64 = 16 * TIB;
pub const DEFAULT_VOLUME_SIZE: u64 = 16 * GIB;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapacityError {
  #[error("limit ({limit}) can not be less than required ({required}) size")]
  InvalidRange { required: ByteSize, limit: ByteSize },

  #[error("limit ({limit}) can not be less than minimum supported volume size ({minimum})")]
  BelowMinimum { limit: ByteSize, minimum: ByteSize },

  #[error("requested ({requested}) can not exceed maximum supported volume size ({maximum})")]
  AboveMaximum {
    requested: ByteSize,
    maximum: ByteSize,
  },
}

/// Size of a volume created for `range`.
///
/// Unset bounds (absent or zero) fall back to the default size. A required
/// size below the minimum is raised to the minimum, everything else outside
/// `[MINIMUM_VOLUME_SIZE, MAXIMUM_VOLUME_SIZE]` is an error.
pub fn resolve(range: Option<&CapacityRange>) -> Result<u64, CapacityError> {
  let (required, limit) = match range {
    None => return Ok(DEFAULT_VOLUME_SIZE),
    Some(range) => (range.required(), range.limit()),
  };

  match (required, limit) {
    (None, None) => return Ok(DEFAULT_VOLUME_SIZE),
    (Some(required), Some(limit)) if limit < required => {
      return Err(CapacityError::InvalidRange {
        required: ByteSize(required),
        limit: ByteSize(limit),
      })
    }
    (Some(required), None) if required < MINIMUM_VOLUME_SIZE => {
      warn!(
        "Requested capacity {} is below the minimum, using {}",
        ByteSize(required),
        ByteSize(MINIMUM_VOLUME_SIZE)
      );
      return Ok(MINIMUM_VOLUME_SIZE);
    }
    _ => (),
  }

  if let Some(limit) = limit.filter(|&limit| limit < MINIMUM_VOLUME_SIZE) {
    return Err(CapacityError::BelowMinimum {
      limit: ByteSize(limit),
      minimum: ByteSize(MINIMUM_VOLUME_SIZE),
    });
  }

  let too_large = match (required, limit) {
    (Some(required), _) if required > MAXIMUM_VOLUME_SIZE => Some(required),
    (None, Some(limit)) if limit > MAXIMUM_VOLUME_SIZE => Some(limit),
    _ => None,
  };
  if let Some(requested) = too_large {
    return Err(CapacityError::AboveMaximum {
      requested: ByteSize(requested),
      maximum: ByteSize(MAXIMUM_VOLUME_SIZE),
    });
  }

  Ok(match (required, limit) {
    (Some(required), None) => required,
    (None, Some(limit)) => limit,
    // The limit is at least the minimum here, so raising the required size
    // never leaves the range.
    (Some(required), Some(_)) => required.max(MINIMUM_VOLUME_SIZE),
    (None, None) => DEFAULT_VOLUME_SIZE,
  })
}

/// A byte count printed with binary units, `1Gi`, `1.5Gi`, `16Ti`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ByteSize(pub u64);

impl fmt::Display for ByteSize {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    const UNITS: [(u64, &str); 4] = [(TIB, "Ti"), (GIB, "Gi"), (MIB, "Mi"), (KIB, "Ki")];

    let bytes = self.0;
    let (unit, suffix) = match UNITS.iter().find(|(unit, _)| bytes >= *unit) {
      Some(&(unit, suffix)) => (unit, suffix),
      None => return write!(f, "{}", bytes),
    };

    if bytes % unit == 0 {
      return write!(f, "{}{}", bytes / unit, suffix);
    }

    let value = format!("{:.2}", bytes as f64 / unit as f64);
    let value = value.trim_end_matches('0').trim_end_matches('.');
    write!(f, "{}{}", value, suffix)
  }
}
