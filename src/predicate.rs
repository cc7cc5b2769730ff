//! Occurrence download predicates.
//!
//! Trees serialize to the download API shape: `{"type":"equals","key","value"}`,
//! `{"type":"in","key","values"}`, and `{"type":"and"|"or","predicates"}`.

use serde::{Deserialize, Serialize};

use crate::domain::{BasisOfRecord, DatasetKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PredicateKey {
    TaxonKey,
    Country,
    HasCoordinate,
    HasGeospatialIssue,
    OccurrenceStatus,
    BasisOfRecord,
    DatasetKey,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Predicate {
    Equals { key: PredicateKey, value: String },
    In { key: PredicateKey, values: Vec<String> },
    And { predicates: Vec<Predicate> },
    Or { predicates: Vec<Predicate> },
}

impl Predicate {
    pub fn equals(key: PredicateKey, value: impl Into<String>) -> Self {
        Predicate::Equals {
            key,
            value: value.into(),
        }
    }

    pub fn children(&self) -> &[Predicate] {
        match self {
            Predicate::And { predicates } | Predicate::Or { predicates } => predicates,
            _ => &[],
        }
    }

    pub fn depth(&self) -> usize {
        1 + self.children().iter().map(Predicate::depth).max().unwrap_or(0)
    }
}

/// Filters applied to every download request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticFilters {
    pub taxon_key: String,
    pub countries: Vec<String>,
    pub has_coordinate: bool,
    pub has_geospatial_issue: bool,
    pub occurrence_status: String,
}

impl Default for StaticFilters {
    fn default() -> Self {
        Self {
            taxon_key: "6".to_string(),
            countries: vec!["PT".to_string(), "ES".to_string()],
            has_coordinate: true,
            has_geospatial_issue: false,
            occurrence_status: "PRESENT".to_string(),
        }
    }
}

impl StaticFilters {
    pub fn predicates(&self) -> Vec<Predicate> {
        let mut predicates = vec![Predicate::equals(PredicateKey::TaxonKey, &self.taxon_key)];
        if !self.countries.is_empty() {
            predicates.push(Predicate::In {
                key: PredicateKey::Country,
                values: self.countries.clone(),
            });
        }
        predicates.push(Predicate::equals(
            PredicateKey::HasCoordinate,
            self.has_coordinate.to_string(),
        ));
        predicates.push(Predicate::equals(
            PredicateKey::HasGeospatialIssue,
            self.has_geospatial_issue.to_string(),
        ));
        predicates.push(Predicate::equals(
            PredicateKey::OccurrenceStatus,
            &self.occurrence_status,
        ));
        predicates
    }
}

/// How basis-of-record values join the top-level conjunction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BasisGrouping {
    /// One equals child per value directly under the top-level `and`.
    #[default]
    Flat,
    /// All values in a single nested `or` child.
    AnyOf,
}

#[derive(Debug, Clone)]
pub struct PredicateBuilder {
    statics: Vec<Predicate>,
    grouping: BasisGrouping,
}

impl PredicateBuilder {
    pub fn new(filters: &StaticFilters, grouping: BasisGrouping) -> Self {
        Self {
            statics: filters.predicates(),
            grouping,
        }
    }

    pub fn static_count(&self) -> usize {
        self.statics.len()
    }

    /// Children come in a fixed order: static filters, basis of record, dataset keys.
    pub fn build(&self, keys: &[DatasetKey], basis: &[BasisOfRecord]) -> Predicate {
        let mut predicates = Vec::with_capacity(self.statics.len() + basis.len() + keys.len());
        predicates.extend(self.statics.iter().cloned());

        let basis_predicates = basis
            .iter()
            .map(|value| Predicate::equals(PredicateKey::BasisOfRecord, value.as_str()));
        match self.grouping {
            BasisGrouping::Flat => predicates.extend(basis_predicates),
            BasisGrouping::AnyOf if !basis.is_empty() => predicates.push(Predicate::Or {
                predicates: basis_predicates.collect(),
            }),
            BasisGrouping::AnyOf => {}
        }

        predicates.extend(
            keys.iter()
                .map(|key| Predicate::equals(PredicateKey::DatasetKey, key.as_str())),
        );
        Predicate::And { predicates }
    }
}
