use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::dataset_filter::default_keywords;
use crate::download::Credentials;
use crate::error::GeobioError;
use crate::predicate::{BasisGrouping, StaticFilters};

pub const DEFAULT_CONFIG_FILE: &str = "geobio.json";
pub const DEFAULT_API_BASE: &str = "https://api.gbif.org/v1";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub catalog: Option<CatalogSettings>,
    #[serde(default)]
    pub download: Option<DownloadSettings>,
    #[serde(default)]
    pub dataset_keywords: Option<Vec<String>>,
    #[serde(default)]
    pub species_endpoint: Option<String>,
    #[serde(default)]
    pub regions: Option<RegionPaths>,
    #[serde(default)]
    pub account: Option<Account>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CatalogSettings {
    pub endpoint: String,
    pub page_size: u64,
    /// Highest offset a page request may start at.
    pub offset_ceiling: u64,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            endpoint: format!("{DEFAULT_API_BASE}/dataset/search"),
            page_size: 1000,
            offset_ceiling: 52_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DownloadSettings {
    pub endpoint: String,
    pub format: String,
    pub send_notification: bool,
    pub filters: StaticFilters,
    pub basis_grouping: BasisGrouping,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            endpoint: format!("{DEFAULT_API_BASE}/occurrence/download/request"),
            format: "SIMPLE_CSV".to_string(),
            send_notification: true,
            filters: StaticFilters::default(),
            basis_grouping: BasisGrouping::default(),
        }
    }
}

/// Territorial boundary layers used by downstream spatial analysis.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RegionPaths {
    pub portugal: Option<Utf8PathBuf>,
    pub spain: Option<Utf8PathBuf>,
    pub biogeography: Option<Utf8PathBuf>,
}

#[derive(Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Account {
    pub user: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("email", &self.email)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    pub schema_version: u32,
    pub catalog: CatalogSettings,
    pub download: DownloadSettings,
    pub dataset_keywords: Vec<String>,
    pub species_endpoint: String,
    pub regions: RegionPaths,
    #[serde(skip)]
    pub account: Account,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: 1,
            catalog: CatalogSettings::default(),
            download: DownloadSettings::default(),
            dataset_keywords: default_keywords(),
            species_endpoint: DEFAULT_API_BASE.to_string(),
            regions: RegionPaths::default(),
            account: Account::default(),
        }
    }
}

impl Settings {
    /// Overlays account and region values from the environment.
    ///
    /// `lookup` is normally `std::env::var(..).ok()`; the binary calls this
    /// once at startup so components never read the process environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        if let Some(user) = read("GBIF_USER") {
            self.account.user = Some(user);
        }
        if let Some(password) = read("GBIF_PWD") {
            self.account.password = Some(password);
        }
        if let Some(email) = read("GBIF_EMAIL") {
            self.account.email = Some(email);
        }
        if let Some(path) = read("PORTUGAL") {
            self.regions.portugal = Some(Utf8PathBuf::from(path));
        }
        if let Some(path) = read("ESPANHA") {
            self.regions.spain = Some(Utf8PathBuf::from(path));
        }
        if let Some(path) = read("IBERIAN_BIOGEOGRAPHY") {
            self.regions.biogeography = Some(Utf8PathBuf::from(path));
        }
    }

    pub fn credentials(&self) -> Option<Credentials> {
        Credentials::from_parts(self.account.user.as_deref(), self.account.password.as_deref())
    }

    pub fn creator(&self) -> String {
        self.account.user.clone().unwrap_or_default()
    }

    pub fn notification_addresses(&self) -> Vec<String> {
        self.account.email.iter().cloned().collect()
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `path`, or `geobio.json` in the working directory when present.
    pub fn resolve(path: Option<&str>) -> Result<Settings, GeobioError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            tracing::debug!("no {DEFAULT_CONFIG_FILE} found; using defaults");
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| GeobioError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| GeobioError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<Settings, GeobioError> {
        let catalog = config.catalog.unwrap_or_default();
        if catalog.page_size == 0 {
            return Err(GeobioError::ConfigParse(
                "catalog.page_size must be greater than zero".to_string(),
            ));
        }

        let defaults = Settings::default();
        Ok(Settings {
            schema_version: config.schema_version.unwrap_or(defaults.schema_version),
            catalog,
            download: config.download.unwrap_or(defaults.download),
            dataset_keywords: config.dataset_keywords.unwrap_or(defaults.dataset_keywords),
            species_endpoint: config.species_endpoint.unwrap_or(defaults.species_endpoint),
            regions: config.regions.unwrap_or(defaults.regions),
            account: config.account.unwrap_or(defaults.account),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn defaults_match_gbif() {
        let settings = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(settings.schema_version, 1);
        assert_eq!(settings.catalog.page_size, 1000);
        assert_eq!(settings.catalog.offset_ceiling, 52_000);
        assert_eq!(settings.download.format, "SIMPLE_CSV");
        assert_eq!(settings.dataset_keywords, default_keywords());
        assert!(settings.credentials().is_none());
    }

    #[test]
    fn zero_page_size_rejected() {
        let config: Config = serde_json::from_str(r#"{"catalog":{"page_size":0}}"#).unwrap();
        assert_matches!(
            ConfigLoader::resolve_config(config),
            Err(GeobioError::ConfigParse(_))
        );
    }

    #[test]
    fn env_overlay_fills_account_and_regions() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("GBIF_USER", "botanist"),
            ("GBIF_PWD", "secret"),
            ("GBIF_EMAIL", "botanist@example.org"),
            ("ESPANHA", "/data/es.shp"),
            ("PORTUGAL", " "),
        ]);
        let mut settings = Settings::default();
        settings.apply_env(|name| env.get(name).map(|value| value.to_string()));

        assert_eq!(settings.creator(), "botanist");
        assert_eq!(settings.notification_addresses(), ["botanist@example.org"]);
        assert!(settings.credentials().is_some());
        assert_eq!(settings.regions.spain.as_deref(), Some(camino::Utf8Path::new("/data/es.shp")));
        assert!(settings.regions.portugal.is_none());
    }

    #[test]
    fn serialized_settings_omit_account() {
        let mut settings = Settings::default();
        settings.account.password = Some("secret".to_string());
        let json = serde_json::to_string(&settings).unwrap();
        assert!(!json.contains("secret"));
    }
}
