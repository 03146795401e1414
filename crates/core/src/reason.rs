// SPDX-License-Identifier: MIT

//! The fixed catalog of reason tags and their severities

use serde::{Deserialize, Serialize};

/// Why a profile is tracked.
///
/// The catalog is fixed: records only ever carry tags from this set, and the
/// confirmation UI renders one toggle per tag in catalog order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReasonTag {
    Griefer,
    Cheater,
    Exploiter,
    #[serde(rename = "Hate speech")]
    HateSpeech,
    Toxic,
    Leaver,
}

impl ReasonTag {
    /// All tags, in the order the confirmation UI presents them
    pub const CATALOG: [ReasonTag; 6] = [
        ReasonTag::Griefer,
        ReasonTag::Cheater,
        ReasonTag::Exploiter,
        ReasonTag::HateSpeech,
        ReasonTag::Toxic,
        ReasonTag::Leaver,
    ];

    /// Severity tier, 0..=2; drives the card color
    pub fn severity(self) -> u8 {
        match self {
            ReasonTag::Griefer | ReasonTag::Cheater => 2,
            ReasonTag::Exploiter | ReasonTag::HateSpeech => 1,
            ReasonTag::Toxic | ReasonTag::Leaver => 0,
        }
    }

    /// Human label, matching the wire representation
    pub fn label(self) -> &'static str {
        match self {
            ReasonTag::Griefer => "Griefer",
            ReasonTag::Cheater => "Cheater",
            ReasonTag::Exploiter => "Exploiter",
            ReasonTag::HateSpeech => "Hate speech",
            ReasonTag::Toxic => "Toxic",
            ReasonTag::Leaver => "Leaver",
        }
    }
}

impl std::fmt::Display for ReasonTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        griefer = { ReasonTag::Griefer, 2, "Griefer" },
        cheater = { ReasonTag::Cheater, 2, "Cheater" },
        exploiter = { ReasonTag::Exploiter, 1, "Exploiter" },
        hate_speech = { ReasonTag::HateSpeech, 1, "Hate speech" },
        toxic = { ReasonTag::Toxic, 0, "Toxic" },
        leaver = { ReasonTag::Leaver, 0, "Leaver" },
    )]
    fn severity_and_label(tag: ReasonTag, severity: u8, label: &str) {
        assert_eq!(tag.severity(), severity);
        assert_eq!(tag.label(), label);
    }

    #[test]
    fn wire_names_are_human_labels() {
        for tag in ReasonTag::CATALOG {
            let json = serde_json::to_string(&tag).unwrap();
            assert_eq!(json, format!("\"{}\"", tag.label()));
            let back: ReasonTag = serde_json::from_str(&json).unwrap();
            assert_eq!(back, tag);
        }
    }
}
