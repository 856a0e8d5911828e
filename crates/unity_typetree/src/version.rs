//! Engine version identifiers used for type database matching.

use derive_more::derive::{Constructor, Display};
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A parsed engine version string such as `5.3.5f1`.
///
/// Only `major` and `minor` participate in the type database's approximate matching; `patch` and
/// `suffix` are kept so a version round-trips through its display form.
#[derive(Constructor, Display, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[display("{major}.{minor}.{patch}{suffix}")]
pub struct UnityVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub suffix: String,
}

fn split_component(component: &str) -> (u32, &str) {
    let digits = component.len() - component.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    (component[..digits].parse().unwrap_or(0), &component[digits..])
}

impl FromStr for UnityVersion {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        if value.is_empty() {
            return Err(Error::InvalidVersion(value.to_owned()));
        }

        let mut parts = value.splitn(3, '.');
        let (major, _) = split_component(parts.next().unwrap_or_default());
        let (minor, _) = split_component(parts.next().unwrap_or_default());
        let (patch, suffix) = split_component(parts.next().unwrap_or_default());

        Ok(UnityVersion::new(major, minor, patch, suffix.to_owned()))
    }
}
