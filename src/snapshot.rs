// src/snapshot.rs
//! Session snapshot: raw inputs plus the built profile, as one flat JSON object.
//! The crate only (de)serializes; storing it is the session layer's job.

use serde::{Deserialize, Serialize};

use crate::profile::Profile;

pub const SNAPSHOT_FORMAT: &str = "grantmatch.snapshot.v1";

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("unsupported snapshot format: {0}")]
    UnsupportedVersion(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub format_version: String,
    #[serde(default)]
    pub publication_text: String,
    #[serde(default)]
    pub proposal_text: String,
    #[serde(default)]
    pub profile: Option<Profile>,
}

impl Snapshot {
    pub fn capture(publication_text: &str, proposal_text: &str, profile: Option<&Profile>) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT.to_string(),
            publication_text: publication_text.to_string(),
            proposal_text: proposal_text.to_string(),
            profile: profile.cloned(),
        }
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self, SnapshotError> {
        let snap: Snapshot = serde_json::from_str(s)?;
        if snap.format_version != SNAPSHOT_FORMAT {
            return Err(SnapshotError::UnsupportedVersion(snap.format_version));
        }
        Ok(snap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restore_preserves_profile() {
        let mut profile = Profile {
            themes: vec!["control".into()],
            ..Profile::default()
        };
        profile.keyword_recency_weights.insert("control".into(), 1.0);

        let snap = Snapshot::capture("pubs 2024", "", Some(&profile));
        let back = Snapshot::from_json(&snap.to_json().unwrap()).unwrap();
        assert_eq!(back, snap);
        assert_eq!(back.profile.unwrap().keyword_recency_weights["control"], 1.0);
    }

    #[test]
    fn unknown_version_is_rejected() {
        let err = Snapshot::from_json(r#"{"format_version": "v0", "publication_text": "x"}"#)
            .unwrap_err();
        assert!(matches!(err, SnapshotError::UnsupportedVersion(v) if v == "v0"));
    }

    #[test]
    fn broken_json_is_a_json_error() {
        assert!(matches!(Snapshot::from_json("{"), Err(SnapshotError::Json(_))));
    }
}
