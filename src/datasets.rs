// ABOUTME: Dataset definitions registry: listing-page URL, file discovery rules, table name mapping
// ABOUTME: Mirrors the original's datasets.yaml-backed load_supported_datasets/get_dataset_config
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! # Dataset Definitions
//!
//! A [`DatasetDefinition`] names the PhysioNet listing pages to scrape for a
//! MIMIC-IV release, plus the table-name derivation rule data-io uses when
//! converting each downloaded CSV to a Parquet-backed view. `mimic-iv-demo`
//! and `mimic-iv-full` are built in; additional datasets can be loaded from
//! a JSON file (the Rust-native analogue of the original's `datasets.yaml`).

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{DATASET_MIMIC_DEMO, DATASET_MIMIC_FULL, DEFAULT_MIMIC_VERSION};
use crate::errors::{M3Error, M3Result};

/// One MIMIC-IV module's listing page (`hosp` or `icu`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleSource {
    /// Module name, used as a table-name/view-name prefix.
    pub module: String,
    /// HTML listing page to scrape for `.csv.gz` anchors.
    pub listing_url: String,
}

/// Definition of a downloadable, convertible MIMIC dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetDefinition {
    /// Stable identifier, e.g. `mimic-iv-demo`.
    pub key: String,
    /// Human-readable name.
    pub name: String,
    /// Module listing pages to discover files from. Empty means no
    /// auto-download is possible for this dataset (manual fetch only).
    #[serde(default)]
    pub modules: Vec<ModuleSource>,
    /// Default file name for the single-file embedded analytical database.
    pub default_filename: String,
    /// Table queried after registration to verify the ingest populated the
    /// database (row-count sanity check).
    pub primary_verification_table: String,
    /// GCP project hosting this dataset's BigQuery datasets, if the Cloud
    /// backend supports this dataset.
    #[serde(default)]
    pub cloud_project: Option<String>,
    /// Child BigQuery dataset ids (e.g. `mimiciv_3_1_hosp`) this dataset
    /// spans, if the Cloud backend supports this dataset.
    #[serde(default)]
    pub cloud_dataset_ids: Option<Vec<String>>,
    /// Whether downloading this dataset requires PhysioNet credentials.
    pub requires_authentication: bool,
    /// Free-form labels, e.g. `mimic, clinical, demo`.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl DatasetDefinition {
    /// Built-in definition for the small, freely downloadable demo subset.
    #[must_use]
    pub fn mimic_iv_demo() -> Self {
        Self {
            key: DATASET_MIMIC_DEMO.to_owned(),
            name: "MIMIC-IV Clinical Database Demo".to_owned(),
            modules: vec![
                ModuleSource {
                    module: "hosp".to_owned(),
                    listing_url: "https://physionet.org/files/mimic-iv-demo/2.2/hosp/".to_owned(),
                },
                ModuleSource {
                    module: "icu".to_owned(),
                    listing_url: "https://physionet.org/files/mimic-iv-demo/2.2/icu/".to_owned(),
                },
            ],
            default_filename: "mimic-iv-demo.db".to_owned(),
            primary_verification_table: "hosp_admissions".to_owned(),
            cloud_project: None,
            cloud_dataset_ids: None,
            requires_authentication: false,
            tags: vec!["mimic".to_owned(), "clinical".to_owned(), "demo".to_owned()],
        }
    }

    /// Built-in definition for the full, credentialed PhysioNet release.
    ///
    /// Unlike the demo dataset, there is no public listing page to scrape:
    /// the full release requires a manual, credentialed PhysioNet download,
    /// so `modules` is empty and the auto-discover/download stages have
    /// nothing to do for this dataset.
    #[must_use]
    pub fn mimic_iv_full() -> Self {
        Self {
            key: DATASET_MIMIC_FULL.to_owned(),
            name: "MIMIC-IV Clinical Database".to_owned(),
            modules: Vec::new(),
            default_filename: "mimic-iv-full.db".to_owned(),
            primary_verification_table: "hosp_admissions".to_owned(),
            cloud_project: Some("physionet-data".to_owned()),
            cloud_dataset_ids: Some(vec![
                format!("mimiciv_{DEFAULT_MIMIC_VERSION}_hosp"),
                format!("mimiciv_{DEFAULT_MIMIC_VERSION}_icu"),
            ]),
            requires_authentication: true,
            tags: vec!["mimic".to_owned(), "clinical".to_owned(), "full".to_owned()],
        }
    }

    /// Derive a table/view name from a downloaded file name, the same rule
    /// the original's `_etl_csv_collection_to_sqlite` used: lowercase, strip
    /// the `.csv`/`.csv.gz` suffix, replace `-`/`.` with `_`, and prefix
    /// with the owning module.
    #[must_use]
    pub fn table_name(module: &str, file_stem: &str) -> String {
        let cleaned = file_stem
            .to_lowercase()
            .trim_end_matches(".csv.gz")
            .trim_end_matches(".csv")
            .replace(['-', '.'], "_");
        format!("{}_{}", module.to_lowercase(), cleaned)
    }
}

/// Registry of known dataset definitions, keyed by `key`.
#[derive(Debug, Clone, Default)]
pub struct DatasetRegistry {
    datasets: HashMap<String, DatasetDefinition>,
}

impl DatasetRegistry {
    /// Registry pre-populated with the built-in datasets.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::default();
        registry.register(DatasetDefinition::mimic_iv_demo());
        registry.register(DatasetDefinition::mimic_iv_full());
        registry
    }

    /// Register or replace a dataset definition.
    pub fn register(&mut self, dataset: DatasetDefinition) {
        self.datasets.insert(dataset.key.clone(), dataset);
    }

    /// Load additional dataset definitions from a JSON file (a list of
    /// `DatasetDefinition`) and merge them into the registry.
    ///
    /// # Errors
    ///
    /// Returns `M3Error::Config` if the file can't be read or parsed.
    pub fn load_custom(&mut self, path: &Path) -> M3Result<()> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| M3Error::Config(format!("failed to read dataset file {}: {e}", path.display())))?;
        let datasets: Vec<DatasetDefinition> = serde_json::from_str(&raw)
            .map_err(|e| M3Error::Config(format!("invalid dataset definitions in {}: {e}", path.display())))?;
        for dataset in datasets {
            self.register(dataset);
        }
        Ok(())
    }

    /// Look up a dataset by key.
    ///
    /// # Errors
    ///
    /// Returns `M3Error::Validation` if no dataset is registered under `key`.
    pub fn get(&self, key: &str) -> M3Result<&DatasetDefinition> {
        self.datasets
            .get(key)
            .ok_or_else(|| M3Error::Validation(format!("unknown dataset '{key}'")))
    }

    /// All registered dataset keys.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        self.datasets.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_include_demo_and_full() {
        let registry = DatasetRegistry::with_builtins();
        assert!(registry.get(DATASET_MIMIC_DEMO).is_ok());
        assert!(registry.get(DATASET_MIMIC_FULL).is_ok());
    }

    #[test]
    fn unknown_dataset_errors() {
        let registry = DatasetRegistry::with_builtins();
        assert!(registry.get("not-a-real-dataset").is_err());
    }

    #[test]
    fn table_name_derivation_matches_expected_shape() {
        assert_eq!(
            DatasetDefinition::table_name("icu", "ICUSTAYS.csv.gz"),
            "icu_icustays"
        );
        assert_eq!(
            DatasetDefinition::table_name("hosp", "lab-events.csv"),
            "hosp_lab_events"
        );
    }
}
