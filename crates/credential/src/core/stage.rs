//! Stage labels and the version → labels map of a secret

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use super::id::VersionId;

/// Role of a secret version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageLabel {
    /// In active use.
    Current,
    /// Newly created, not yet promoted.
    Pending,
    /// Superseded, retained for rollback and the cleanup grace window.
    Previous,
}

impl StageLabel {
    /// All labels, in promotion order.
    pub const ALL: [Self; 3] = [Self::Pending, Self::Current, Self::Previous];

    /// Canonical label name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Current => "CURRENT",
            Self::Pending => "PENDING",
            Self::Previous => "PREVIOUS",
        }
    }
}

impl fmt::Display for StageLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown stage label.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown stage label: {0}")]
pub struct UnknownStageLabel(pub String);

impl FromStr for StageLabel {
    type Err = UnknownStageLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CURRENT" => Ok(Self::Current),
            "PENDING" => Ok(Self::Pending),
            "PREVIOUS" => Ok(Self::Previous),
            other => Err(UnknownStageLabel(other.to_owned())),
        }
    }
}

/// A label observed on more than one version at once.
///
/// The store reassigns labels atomically, so this is only ever seen while a
/// move is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageConflict {
    /// Label held more than once.
    pub label: StageLabel,
    /// Versions currently holding it.
    pub holders: Vec<VersionId>,
}

/// Version → stage labels map of one secret.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageMap(BTreeMap<VersionId, BTreeSet<StageLabel>>);

impl StageMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `label` on `version`.
    pub fn insert(&mut self, version: VersionId, label: StageLabel) {
        self.0.entry(version).or_default().insert(label);
    }

    /// Records a version that carries no label.
    pub fn insert_unlabelled(&mut self, version: VersionId) {
        self.0.entry(version).or_default();
    }

    /// Returns `true` if `version` is stored, labelled or not.
    pub fn contains(&self, version: &VersionId) -> bool {
        self.0.contains_key(version)
    }

    /// Labels held by `version`, empty if the version is unknown.
    pub fn labels(&self, version: &VersionId) -> impl Iterator<Item = StageLabel> + '_ {
        self.0.get(version).into_iter().flatten().copied()
    }

    /// Returns `true` if `version` holds `label`.
    pub fn has(&self, version: &VersionId, label: StageLabel) -> bool {
        self.0.get(version).is_some_and(|labels| labels.contains(&label))
    }

    /// All versions holding `label`.
    pub fn holders(&self, label: StageLabel) -> Vec<&VersionId> {
        self.0
            .iter()
            .filter(|(_, labels)| labels.contains(&label))
            .map(|(version, _)| version)
            .collect()
    }

    /// The single version holding `label`, if any.
    ///
    /// # Errors
    ///
    /// Returns a [`StageConflict`] when more than one version holds it.
    pub fn sole_holder(&self, label: StageLabel) -> Result<Option<&VersionId>, StageConflict> {
        match self.holders(label).as_slice() {
            [] => Ok(None),
            [only] => Ok(Some(*only)),
            many => Err(StageConflict {
                label,
                holders: many.iter().map(|v| (*v).clone()).collect(),
            }),
        }
    }

    /// Number of versions in the map.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the secret has no versions.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(VersionId, StageLabel)> for StageMap {
    fn from_iter<I: IntoIterator<Item = (VersionId, StageLabel)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (version, label) in iter {
            map.insert(version, label);
        }
        map
    }
}
