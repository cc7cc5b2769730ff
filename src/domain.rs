use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GeobioError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetKey(String);

impl DatasetKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry of the remote dataset catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    pub key: DatasetKey,
    #[serde(default)]
    pub description: Option<String>,
}

impl DatasetDescriptor {
    pub fn new(key: impl Into<String>, description: Option<&str>) -> Self {
        Self {
            key: DatasetKey::new(key),
            description: description.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BasisOfRecord {
    PreservedSpecimen,
    LivingSpecimen,
    FossilSpecimen,
    HumanObservation,
    MachineObservation,
    MaterialSample,
    MaterialCitation,
    Observation,
    Occurrence,
}

impl BasisOfRecord {
    pub fn as_str(&self) -> &'static str {
        match self {
            BasisOfRecord::PreservedSpecimen => "PRESERVED_SPECIMEN",
            BasisOfRecord::LivingSpecimen => "LIVING_SPECIMEN",
            BasisOfRecord::FossilSpecimen => "FOSSIL_SPECIMEN",
            BasisOfRecord::HumanObservation => "HUMAN_OBSERVATION",
            BasisOfRecord::MachineObservation => "MACHINE_OBSERVATION",
            BasisOfRecord::MaterialSample => "MATERIAL_SAMPLE",
            BasisOfRecord::MaterialCitation => "MATERIAL_CITATION",
            BasisOfRecord::Observation => "OBSERVATION",
            BasisOfRecord::Occurrence => "OCCURRENCE",
        }
    }
}

impl fmt::Display for BasisOfRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BasisOfRecord {
    type Err = GeobioError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "PRESERVED_SPECIMEN" => Ok(BasisOfRecord::PreservedSpecimen),
            "LIVING_SPECIMEN" => Ok(BasisOfRecord::LivingSpecimen),
            "FOSSIL_SPECIMEN" => Ok(BasisOfRecord::FossilSpecimen),
            "HUMAN_OBSERVATION" => Ok(BasisOfRecord::HumanObservation),
            "MACHINE_OBSERVATION" => Ok(BasisOfRecord::MachineObservation),
            "MATERIAL_SAMPLE" => Ok(BasisOfRecord::MaterialSample),
            "MATERIAL_CITATION" => Ok(BasisOfRecord::MaterialCitation),
            "OBSERVATION" => Ok(BasisOfRecord::Observation),
            "OCCURRENCE" => Ok(BasisOfRecord::Occurrence),
            _ => Err(GeobioError::InvalidBasis(value.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_basis_of_record_loosely() {
        let basis: BasisOfRecord = "preserved specimen".parse().unwrap();
        assert_eq!(basis, BasisOfRecord::PreservedSpecimen);
        let basis: BasisOfRecord = "LIVING_SPECIMEN".parse().unwrap();
        assert_eq!(basis.as_str(), "LIVING_SPECIMEN");
    }

    #[test]
    fn parse_basis_of_record_invalid() {
        let err = "herbarium".parse::<BasisOfRecord>().unwrap_err();
        assert_matches!(err, GeobioError::InvalidBasis(_));
    }

    #[test]
    fn descriptor_without_description_deserializes() {
        let descriptor: DatasetDescriptor =
            serde_json::from_str(r#"{"key":"abc","title":"x"}"#).unwrap();
        assert_eq!(descriptor.key.as_str(), "abc");
        assert!(descriptor.description.is_none());
    }
}
