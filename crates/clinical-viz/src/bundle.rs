//! The uploaded cohort bundle: the patient table plus the column catalogs
//! that drive each exploration view.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::config::{LegendLabels, Tooltips};
use crate::error::{Result, VizError};
use crate::types::{CellValue, Dataset, ID_FIELD};

/// Keys every bundle must carry.
pub const REQUIRED_KEYS: [&str; 6] = [
    "dataframe",
    "availableDimensions",
    "availableInputClinicalVar",
    "availableOutputClinicalVar",
    "availableGroupByVar",
    "availableTemporalFeatures",
];

fn tooltips_off() -> Tooltips {
    Tooltips::Enabled(false)
}

/// A validated cohort bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicalBundle {
    pub dataframe: Dataset,
    /// Embedding dimensions (`"Dim 1"`, `"Dim 2"`, ...).
    pub available_dimensions: Vec<String>,
    pub available_input_clinical_var: Vec<String>,
    pub available_output_clinical_var: Vec<String>,
    pub available_group_by_var: Vec<String>,
    pub available_temporal_features: Vec<String>,
    /// Patient IDs. When absent every row's ID is available.
    #[serde(default)]
    pub available_patients: Vec<CellValue>,
    /// Fields shown in per-point tooltips.
    #[serde(default = "tooltips_off")]
    pub tool_tip: Tooltips,
    #[serde(default)]
    pub dataset_description: Option<String>,
    /// Display labels per variable.
    #[serde(default)]
    pub legend: BTreeMap<String, LegendLabels>,
}

/// Item counts shown in the general overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleSummary {
    pub description: Option<String>,
    pub rows: usize,
    pub patients: usize,
    pub dimensions: usize,
    pub input_clinical_variables: usize,
    pub output_clinical_variables: usize,
    pub group_by_variables: usize,
    pub temporal_features: usize,
}

impl ClinicalBundle {
    /// Validate and parse a bundle.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when the value is not an object, `MissingKeys` listing
    /// every absent required key, and the [`Dataset::from_json_value`] errors
    /// for a malformed `dataframe`.
    pub fn from_json_value(value: &Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            VizError::InvalidInput("The uploaded file must hold a JSON object.".to_string())
        })?;

        let missing: Vec<String> = REQUIRED_KEYS
            .iter()
            .filter(|key| !object.contains_key(**key))
            .map(|key| key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(VizError::MissingKeys(missing));
        }

        // Surfaces the dataset's own error messages before the generic serde ones.
        Dataset::from_json_value(&object["dataframe"])?;

        let mut bundle = Self::deserialize(value)?;
        if bundle.available_patients.is_empty() {
            bundle.available_patients = bundle
                .dataframe
                .column(ID_FIELD)
                .into_iter()
                .filter(|id| !id.is_null())
                .cloned()
                .collect();
        }

        info!(
            rows = bundle.dataframe.len(),
            patients = bundle.available_patients.len(),
            "Loaded cohort bundle"
        );
        Ok(bundle)
    }

    /// Read and validate a bundle file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| VizError::from(e).with_context(format!("reading {}", path.display())))?;
        let value: Value = serde_json::from_str(&text)?;
        Self::from_json_value(&value)
    }

    /// Rows of the selected patients.
    pub fn patients(&self) -> Dataset {
        self.dataframe
            .filter_by_ids(ID_FIELD, &self.available_patients)
    }

    /// Legend labels of a variable, if any were provided.
    pub fn legend_for(&self, variable: &str) -> Option<&LegendLabels> {
        self.legend.get(variable)
    }

    pub fn summary(&self) -> BundleSummary {
        BundleSummary {
            description: self.dataset_description.clone(),
            rows: self.dataframe.len(),
            patients: self.available_patients.len(),
            dimensions: self.available_dimensions.len(),
            input_clinical_variables: self.available_input_clinical_var.len(),
            output_clinical_variables: self.available_output_clinical_var.len(),
            group_by_variables: self.available_group_by_var.len(),
            temporal_features: self.available_temporal_features.len(),
        }
    }
}
