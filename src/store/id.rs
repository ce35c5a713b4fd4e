//! Artifact identifiers

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque artifact identifier.
///
/// Backed by a random (version 4) UUID: 122 bits drawn from the operating
/// system's secure entropy source, carrying no creation order or timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactId(Uuid);

impl ArtifactId {
    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse the canonical hyphenated form. Only random (v4) ids are accepted,
    /// so anything this server never could have issued is rejected up front.
    pub fn parse(s: &str) -> Option<Self> {
        // Uuid::parse_str also accepts braced/urn/simple forms; links only
        // ever carry the 36-char hyphenated form.
        if s.len() != 36 {
            return None;
        }
        let uuid = Uuid::parse_str(s).ok()?;
        (uuid.get_version_num() == 4).then_some(Self(uuid))
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl Serialize for ArtifactId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl FromStr for ArtifactId {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s).ok_or(())
    }
}
