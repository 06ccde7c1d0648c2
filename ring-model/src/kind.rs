use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which of the three ring families a given builder/ring file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RingKind {
    Account,
    Container,
    Object,
}

impl RingKind {
    pub const ALL: [RingKind; 3] = [RingKind::Account, RingKind::Container, RingKind::Object];

    pub fn as_str(&self) -> &'static str {
        match self {
            RingKind::Account => "account",
            RingKind::Container => "container",
            RingKind::Object => "object",
        }
    }

    /// Dispersion report only runs (and only gates) for container/object rings.
    pub fn requires_dispersion(&self) -> bool {
        !matches!(self, RingKind::Account)
    }

    pub fn builder_filename(&self) -> String {
        format!("{}.builder", self.as_str())
    }

    pub fn ring_filename(&self) -> String {
        format!("{}.ring.gz", self.as_str())
    }
}

impl fmt::Display for RingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unrecognized ring kind: {0}")]
pub struct ParseRingKindError(String);

impl FromStr for RingKind {
    type Err = ParseRingKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "account" => Ok(RingKind::Account),
            "container" => Ok(RingKind::Container),
            "object" => Ok(RingKind::Object),
            other => Err(ParseRingKindError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_match_the_fixed_namespace() {
        assert_eq!(RingKind::Account.builder_filename(), "account.builder");
        assert_eq!(RingKind::Container.ring_filename(), "container.ring.gz");
    }

    #[test]
    fn only_account_skips_dispersion() {
        assert!(!RingKind::Account.requires_dispersion());
        assert!(RingKind::Container.requires_dispersion());
        assert!(RingKind::Object.requires_dispersion());
    }

    #[test]
    fn round_trips_through_str() {
        for kind in RingKind::ALL {
            assert_eq!(kind.as_str().parse::<RingKind>().unwrap(), kind);
        }
        assert!("bogus".parse::<RingKind>().is_err());
    }
}
