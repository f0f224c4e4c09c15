//! The curated dataset catalog.
//!
//! Catalog items are built once at startup and never mutated. Each item maps
//! a selectable dataset to its source repository and config, to the name of
//! the view it is registered under, and to any supplemental metadata configs
//! that carry regulator information the primary config lacks.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::OtherHasher;
use crate::error::{Result, TfscopeError};

pub const DEFAULT_SAMPLE_ID_FIELD: &str = "sample_id";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupplementalDatasetConfig {
    pub config_name: String,
    pub db_name: String,
    pub sample_id_field: String,
}

impl SupplementalDatasetConfig {
    pub fn new(config_name: &str, db_name: &str) -> Self {
        Self {
            config_name: config_name.to_string(),
            db_name: db_name.to_string(),
            sample_id_field: DEFAULT_SAMPLE_ID_FIELD.to_string(),
        }
    }
    pub fn with_sample_id_field(mut self, field: &str) -> Self {
        self.sample_id_field = field.to_string();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetCatalogItem {
    pub id: String,
    pub name: String,
    pub repo_id: String,
    pub config_name: String,
    pub db_name: String,
    pub sample_id_field: String,
    pub supplemental_configs: Vec<SupplementalDatasetConfig>,
    pub selectable: bool,
    pub unsupported_reason: Option<String>,
}

impl DatasetCatalogItem {
    pub fn new(id: &str, name: &str, repo_id: &str, config_name: &str, db_name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            repo_id: repo_id.to_string(),
            config_name: config_name.to_string(),
            db_name: db_name.to_string(),
            sample_id_field: DEFAULT_SAMPLE_ID_FIELD.to_string(),
            supplemental_configs: Vec::new(),
            selectable: true,
            unsupported_reason: None,
        }
    }
    pub fn with_sample_id_field(mut self, field: &str) -> Self {
        self.sample_id_field = field.to_string();
        self
    }
    pub fn with_supplemental(mut self, supplemental: SupplementalDatasetConfig) -> Self {
        self.supplemental_configs.push(supplemental);
        self
    }
    pub fn unsupported(mut self, reason: &str) -> Self {
        self.selectable = false;
        self.unsupported_reason = Some(reason.to_string());
        self
    }
}

#[derive(Debug, Clone)]
pub struct Catalog {
    items: Vec<DatasetCatalogItem>,
    by_id: HashMap<String, usize, OtherHasher>,
    by_db_name: HashMap<String, usize, OtherHasher>,
}

impl Catalog {
    pub fn new(items: Vec<DatasetCatalogItem>) -> Self {
        let mut by_id = HashMap::<String, usize, OtherHasher>::default();
        let mut by_db_name = HashMap::<String, usize, OtherHasher>::default();
        for (i, item) in items.iter().enumerate() {
            by_id.insert(item.id.clone(), i);
            by_db_name.insert(item.db_name.clone(), i);
        }
        Self {
            items,
            by_id,
            by_db_name,
        }
    }
    pub fn items(&self) -> &[DatasetCatalogItem] {
        &self.items
    }
    pub fn by_id(&self, id: &str) -> Option<&DatasetCatalogItem> {
        self.by_id.get(id).map(|&i| &self.items[i])
    }
    pub fn by_db_name(&self, db_name: &str) -> Option<&DatasetCatalogItem> {
        self.by_db_name.get(db_name).map(|&i| &self.items[i])
    }
    /// (repository, config) pairs of selectable items and their supplemental configs.
    pub fn managed_keys(&self) -> HashSet<(String, String)> {
        let mut keys = HashSet::new();
        for item in self.items.iter().filter(|item| item.selectable) {
            keys.insert((item.repo_id.clone(), item.config_name.clone()));
            for supplemental in &item.supplemental_configs {
                keys.insert((item.repo_id.clone(), supplemental.config_name.clone()));
            }
        }
        keys
    }
    /// Validates an active-set selection. Duplicate ids are dropped, order is kept.
    pub fn select(&self, ids: &[String]) -> Result<Vec<&DatasetCatalogItem>> {
        let mut seen = HashSet::new();
        let mut selected = Vec::new();
        for id in ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            let item = self
                .by_id(id)
                .ok_or_else(|| TfscopeError::UnknownDataset(id.clone()))?;
            if !item.selectable {
                return Err(TfscopeError::DatasetNotSelectable {
                    id: id.clone(),
                    reason: item
                        .unsupported_reason
                        .clone()
                        .unwrap_or_else(|| "This dataset is not selectable".to_string()),
                });
            }
            selected.push(item);
        }
        Ok(selected)
    }
    /// Ids of the items whose backing view is registered in the engine.
    pub fn active_ids(&self, tables: &[String]) -> HashSet<String> {
        self.items
            .iter()
            .filter(|item| tables.iter().any(|table| *table == item.db_name))
            .map(|item| item.id.clone())
            .collect()
    }
    /// The catalog curated from the BrentLab datacards.
    pub fn builtin() -> Self {
        const SRA: &str = "sra_accession";
        Self::new(vec![
            DatasetCatalogItem::new(
                "hackett",
                "Hackett 2020",
                "BrentLab/hackett_2020",
                "hackett_2020",
                "hackett",
            ),
            DatasetCatalogItem::new(
                "kemmeren",
                "Kemmeren 2014",
                "BrentLab/kemmeren_2014",
                "kemmeren_2014",
                "kemmeren",
            ),
            DatasetCatalogItem::new(
                "harbison",
                "Harbison 2004",
                "BrentLab/harbison_2004",
                "harbison_2004",
                "harbison",
            ),
            DatasetCatalogItem::new(
                "hughes_overexpression",
                "Hughes 2006 Overexpression",
                "BrentLab/hughes_2006",
                "overexpression",
                "hughes_overexpression",
            ),
            DatasetCatalogItem::new(
                "hughes_knockout",
                "Hughes 2006 Knockout",
                "BrentLab/hughes_2006",
                "knockout",
                "hughes_knockout",
            ),
            DatasetCatalogItem::new(
                "hu_reimand",
                "Hu 2007 / Reimand 2010",
                "BrentLab/hu_2007_reimand_2010",
                "hu_2007_reimand_2010",
                "hu_reimand",
            )
            .unsupported("Current datacard validation fails for this repository"),
            DatasetCatalogItem::new(
                "mahendrawada_chec",
                "Mahendrawada 2025 ChEC",
                "BrentLab/mahendrawada_2025",
                "mahendrawada_chec_seq",
                "mahendrawada_chec",
            ),
            DatasetCatalogItem::new(
                "mahendrawada_chec_replicates",
                "Mahendrawada 2025 ChEC Replicates",
                "BrentLab/mahendrawada_2025",
                "chec_mahendrawada_m2025_af_replicates",
                "mahendrawada_chec_replicates",
            )
            .with_sample_id_field(SRA)
            .with_supplemental(
                SupplementalDatasetConfig::new(
                    "chec_genome_map_meta",
                    "mahendrawada_chec_replicates_regmeta",
                )
                .with_sample_id_field(SRA),
            ),
            DatasetCatalogItem::new(
                "mahendrawada_chec_combined",
                "Mahendrawada 2025 ChEC Combined",
                "BrentLab/mahendrawada_2025",
                "chec_mahendrawada_m2025_af_combined",
                "mahendrawada_chec_combined",
            )
            .with_supplemental(SupplementalDatasetConfig::new(
                "chec_mahendrawada_m2025_af_combined_meta",
                "mahendrawada_chec_combined_regmeta",
            )),
            DatasetCatalogItem::new(
                "mahendrawada_rna",
                "Mahendrawada 2025 RNA-seq",
                "BrentLab/mahendrawada_2025",
                "rna_seq",
                "mahendrawada_rna",
            ),
            DatasetCatalogItem::new(
                "mahendrawada_rna_reprocessed",
                "Mahendrawada 2025 RNA-seq Reprocessed",
                "BrentLab/mahendrawada_2025",
                "rnaseq_reprocessed",
                "mahendrawada_rna_reprocessed",
            ),
            DatasetCatalogItem::new(
                "mahendrawada_degron",
                "Mahendrawada 2025 Degron Counts",
                "BrentLab/mahendrawada_2025",
                "degron_counts",
                "mahendrawada_degron",
            )
            .with_sample_id_field(SRA)
            .with_supplemental(
                SupplementalDatasetConfig::new("degron_counts_meta", "mahendrawada_degron_regmeta")
                    .with_sample_id_field(SRA),
            ),
            DatasetCatalogItem::new(
                "mahendrawada_mnase_fusion",
                "Mahendrawada 2025 MNase Fusion RNA-seq",
                "BrentLab/mahendrawada_2025",
                "mnase_fusion_rnaseq_counts",
                "mahendrawada_mnase_fusion",
            )
            .with_sample_id_field(SRA)
            .with_supplemental(
                SupplementalDatasetConfig::new(
                    "mnase_fusion_rnaseq_counts_meta",
                    "mahendrawada_mnase_fusion_regmeta",
                )
                .with_sample_id_field(SRA),
            ),
            DatasetCatalogItem::new(
                "mahendrawada_wt_baseline",
                "Mahendrawada 2025 WT Baseline Counts",
                "BrentLab/mahendrawada_2025",
                "wt_baseline_counts",
                "mahendrawada_wt_baseline",
            )
            .with_sample_id_field(SRA),
            DatasetCatalogItem::new(
                "mahendrawada_wt_degron_control",
                "Mahendrawada 2025 WT Degron Control",
                "BrentLab/mahendrawada_2025",
                "wt_degron_control_counts",
                "mahendrawada_wt_degron_control",
            )
            .with_sample_id_field(SRA),
            DatasetCatalogItem::new(
                "rossi_replicates",
                "Rossi 2021 Replicates",
                "BrentLab/rossi_2021",
                "rossi_2021_af_replicates",
                "rossi_replicates",
            )
            .with_supplemental(SupplementalDatasetConfig::new(
                "rossi_2021_metadata",
                "rossi_replicates_regmeta",
            )),
            DatasetCatalogItem::new(
                "rossi_combined",
                "Rossi 2021 Combined",
                "BrentLab/rossi_2021",
                "rossi_2021_af_combined",
                "rossi_combined",
            )
            .with_supplemental(SupplementalDatasetConfig::new(
                "rossi_2021_metadata_sample",
                "rossi_combined_regmeta",
            )),
        ])
    }
}
