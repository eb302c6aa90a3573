//! Relation kinds and the derived bidirectional index.
//!
//! Requirements store relations one-directionally (`from` side only). The
//! index rebuilds both directions from those edges so consumers can traverse
//! either way without assuming the stored edges are symmetric.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::requirement::Requirement;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    DependsOn,
    RelatedTo,
    ConflictsWith,
}

impl RelationType {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "depends_on" => Some(Self::DependsOn),
            "related_to" => Some(Self::RelatedTo),
            "conflicts_with" => Some(Self::ConflictsWith),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DependsOn => "depends_on",
            Self::RelatedTo => "related_to",
            Self::ConflictsWith => "conflicts_with",
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationIndex {
    outgoing: BTreeMap<String, BTreeSet<String>>,
    incoming: BTreeMap<String, BTreeSet<String>>,
}

impl RelationIndex {
    /// Build from stored edges. Edges to ids outside `requirements` are dropped.
    #[must_use]
    pub fn build(requirements: &[Requirement]) -> Self {
        let known: BTreeSet<&str> = requirements.iter().map(|r| r.id.as_str()).collect();
        let mut index = Self::default();
        for req in requirements {
            for to in &req.related_ids {
                if to == &req.id || !known.contains(to.as_str()) {
                    continue;
                }
                index
                    .outgoing
                    .entry(req.id.clone())
                    .or_default()
                    .insert(to.clone());
                index
                    .incoming
                    .entry(to.clone())
                    .or_default()
                    .insert(req.id.clone());
            }
        }
        index
    }

    #[must_use]
    pub fn outgoing(&self, id: &str) -> Vec<&str> {
        self.outgoing
            .get(id)
            .map(|s| s.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn incoming(&self, id: &str) -> Vec<&str> {
        self.incoming
            .get(id)
            .map(|s| s.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Every requirement connected to `id` in either direction, sorted.
    #[must_use]
    pub fn neighbors(&self, id: &str) -> Vec<&str> {
        let mut all: BTreeSet<&str> = self.outgoing(id).into_iter().collect();
        all.extend(self.incoming(id));
        all.into_iter().collect()
    }

    /// Edges stored in one direction only, as `(from, to)`.
    #[must_use]
    pub fn one_way_edges(&self) -> Vec<(&str, &str)> {
        self.outgoing
            .iter()
            .flat_map(|(from, tos)| tos.iter().map(move |to| (from.as_str(), to.as_str())))
            .filter(|(from, to)| {
                !self
                    .outgoing
                    .get(*to)
                    .is_some_and(|back| back.contains(*from))
            })
            .collect()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.outgoing.values().map(BTreeSet::len).sum()
    }
}
