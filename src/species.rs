use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde_json::Value;

use crate::error::GeobioError;

pub trait SpeciesClient: Send + Sync {
    fn match_name(&self, name: &str) -> Result<Option<u64>, GeobioError>;
    fn red_list_category(&self, usage_key: u64) -> Result<Option<String>, GeobioError>;
    fn synonyms(&self, usage_key: u64, limit: u32) -> Result<Vec<String>, GeobioError>;
}

#[derive(Clone)]
pub struct SpeciesHttpClient {
    client: Client,
    base_url: String,
}

impl SpeciesHttpClient {
    pub fn new(base_url: &str) -> Result<Self, GeobioError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("geobio/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| GeobioError::SpeciesHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| GeobioError::SpeciesHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// `None` for 204/404, the service's way of saying "nothing here".
    fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Option<Value>, GeobioError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .map_err(|err| GeobioError::SpeciesHttp(err.to_string()))?;
        match response.status() {
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => return Ok(None),
            status if !status.is_success() => {
                let message = response
                    .text()
                    .unwrap_or_else(|_| "species request failed".to_string());
                return Err(GeobioError::SpeciesStatus {
                    status: status.as_u16(),
                    message,
                });
            }
            _ => {}
        }
        let value = response
            .json::<Value>()
            .map_err(|err| GeobioError::SpeciesHttp(err.to_string()))?;
        Ok(Some(value))
    }
}

impl SpeciesClient for SpeciesHttpClient {
    fn match_name(&self, name: &str) -> Result<Option<u64>, GeobioError> {
        let url = format!("{}/species/match", self.base_url);
        let value = self.get_json(&url, &[("name", name.to_string())])?;
        Ok(value.as_ref().and_then(usage_key))
    }

    fn red_list_category(&self, usage_key: u64) -> Result<Option<String>, GeobioError> {
        let url = format!("{}/species/{usage_key}/iucnRedListCategory", self.base_url);
        let value = self.get_json(&url, &[])?;
        Ok(value
            .as_ref()
            .and_then(|value| value.get("category"))
            .and_then(|value| value.as_str())
            .map(|value| value.to_string()))
    }

    fn synonyms(&self, usage_key: u64, limit: u32) -> Result<Vec<String>, GeobioError> {
        let url = format!("{}/species/{usage_key}/synonyms", self.base_url);
        let Some(value) = self.get_json(&url, &[("limit", limit.to_string())])? else {
            return Ok(Vec::new());
        };
        let page: SynonymPage = serde_json::from_value(value)
            .map_err(|err| GeobioError::SpeciesHttp(err.to_string()))?;
        Ok(page
            .results
            .into_iter()
            .filter_map(|entry| entry.scientific_name)
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct SynonymPage {
    #[serde(default)]
    results: Vec<SynonymEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynonymEntry {
    scientific_name: Option<String>,
}

/// Backbone key of a name match; `NONE` matches carry no key.
pub fn usage_key(value: &Value) -> Option<u64> {
    let match_type = value.get("matchType").and_then(|v| v.as_str());
    if match_type == Some("NONE") {
        return None;
    }
    value.get("usageKey").and_then(|v| v.as_u64())
}

/// Red-list category per checklist name, in name order.
pub fn conservation_status<S: SpeciesClient + ?Sized>(
    client: &S,
    checklist: &[String],
) -> Result<BTreeMap<String, Option<String>>, GeobioError> {
    let mut statuses = BTreeMap::new();
    for name in checklist {
        let category = match client.match_name(name)? {
            Some(key) => client.red_list_category(key)?,
            None => {
                tracing::warn!(name = %name, "no backbone match");
                None
            }
        };
        statuses.insert(name.clone(), category);
    }
    Ok(statuses)
}

pub fn synonyms_for<S: SpeciesClient + ?Sized>(
    client: &S,
    name: &str,
    limit: u32,
) -> Result<Vec<String>, GeobioError> {
    match client.match_name(name)? {
        Some(key) => client.synonyms(key, limit),
        None => {
            tracing::warn!(name = %name, "no backbone match");
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct StaticSpecies;

    impl SpeciesClient for StaticSpecies {
        fn match_name(&self, name: &str) -> Result<Option<u64>, GeobioError> {
            Ok(match name {
                "Quercus suber" => Some(2_878_688),
                "Quercus faginea" => Some(2_879_737),
                _ => None,
            })
        }

        fn red_list_category(&self, usage_key: u64) -> Result<Option<String>, GeobioError> {
            Ok((usage_key == 2_878_688).then(|| "LC".to_string()))
        }

        fn synonyms(&self, _usage_key: u64, limit: u32) -> Result<Vec<String>, GeobioError> {
            let all = ["Quercus occidentalis J.Gay", "Suber vulgaris Gand."];
            Ok(all.iter().take(limit as usize).map(|s| s.to_string()).collect())
        }
    }

    #[test]
    fn status_per_checklist_name() {
        let checklist = vec![
            "Quercus suber".to_string(),
            "Quercus faginea".to_string(),
            "Nonexistent plant".to_string(),
        ];
        let statuses = conservation_status(&StaticSpecies, &checklist).unwrap();
        assert_eq!(statuses["Quercus suber"].as_deref(), Some("LC"));
        assert_eq!(statuses["Quercus faginea"], None);
        assert_eq!(statuses["Nonexistent plant"], None);
    }

    #[test]
    fn synonyms_respect_limit() {
        let names = synonyms_for(&StaticSpecies, "Quercus suber", 1).unwrap();
        assert_eq!(names, ["Quercus occidentalis J.Gay"]);
        assert!(synonyms_for(&StaticSpecies, "Nonexistent plant", 10).unwrap().is_empty());
    }

    #[test]
    fn usage_key_ignores_none_match() {
        assert_eq!(usage_key(&json!({"usageKey": 2878688, "matchType": "EXACT"})), Some(2_878_688));
        assert_eq!(usage_key(&json!({"matchType": "NONE", "confidence": 100})), None);
    }
}
