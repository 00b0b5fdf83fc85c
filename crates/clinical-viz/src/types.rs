use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, VizError};
use crate::utils::format_number;

/// Column holding the patient identity in every row.
pub const ID_FIELD: &str = "ID";

// ============================================================================
// Cell Values
// ============================================================================

/// A single cell of the uploaded table.
///
/// JSON booleans read as `0`/`1`. Nulls inside a temporal series read as `NaN`
/// and are written back as `null`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Null,
    Number(f64),
    Text(String),
    Series(Vec<f64>),
}

static NULL_CELL: CellValue = CellValue::Null;

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(value) if value.is_finite() => Some(*value),
            _ => None,
        }
    }

    pub fn as_series(&self) -> Option<&[f64]> {
        match self {
            CellValue::Series(values) => Some(values),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            CellValue::Null => 0,
            CellValue::Number(_) => 1,
            CellValue::Text(_) => 2,
            CellValue::Series(_) => 3,
        }
    }

    /// Total order: null < numbers (by value) < text < series.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (CellValue::Number(a), CellValue::Number(b)) => a.total_cmp(b),
            (CellValue::Text(a), CellValue::Text(b)) => a.cmp(b),
            (CellValue::Series(a), CellValue::Series(b)) => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| x.total_cmp(y))
                .find(|ord| ord.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    /// Equality that treats numbers by value and compares text exactly.
    pub fn same_value(&self, other: &Self) -> bool {
        self.total_cmp(other) == Ordering::Equal
    }

    /// Plain JSON form. Non-finite numbers become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CellValue::Null => serde_json::Value::Null,
            CellValue::Number(value) => serde_json::Value::from(*value),
            CellValue::Text(text) => serde_json::Value::String(text.clone()),
            CellValue::Series(values) => values
                .iter()
                .map(|v| serde_json::Value::from(*v))
                .collect(),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => write!(f, "null"),
            CellValue::Number(value) => write!(f, "{}", format_number(*value)),
            CellValue::Text(text) => write!(f, "{}", text),
            CellValue::Series(values) => {
                let parts: Vec<String> = values.iter().map(|v| format_number(*v)).collect();
                write!(f, "{}", parts.join(","))
            }
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<Option<String>> for CellValue {
    fn from(value: Option<String>) -> Self {
        value.map(CellValue::Text).unwrap_or_default()
    }
}

impl From<Vec<f64>> for CellValue {
    fn from(values: Vec<f64>) -> Self {
        CellValue::Series(values)
    }
}

struct CellValueVisitor;

impl<'de> Visitor<'de> for CellValueVisitor {
    type Value = CellValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("null, a number, a string or an array of numbers")
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<CellValue, E> {
        Ok(CellValue::Null)
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<CellValue, E> {
        Ok(CellValue::Null)
    }

    fn visit_bool<E: de::Error>(self, value: bool) -> std::result::Result<CellValue, E> {
        Ok(CellValue::Number(if value { 1.0 } else { 0.0 }))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> std::result::Result<CellValue, E> {
        Ok(CellValue::Number(value as f64))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> std::result::Result<CellValue, E> {
        Ok(CellValue::Number(value as f64))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> std::result::Result<CellValue, E> {
        Ok(CellValue::Number(value))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<CellValue, E> {
        Ok(CellValue::Text(value.to_string()))
    }

    fn visit_string<E: de::Error>(self, value: String) -> std::result::Result<CellValue, E> {
        Ok(CellValue::Text(value))
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<CellValue, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut values = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(value) = seq.next_element::<Option<f64>>()? {
            values.push(value.unwrap_or(f64::NAN));
        }
        Ok(CellValue::Series(values))
    }
}

impl<'de> Deserialize<'de> for CellValue {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(CellValueVisitor)
    }
}

// ============================================================================
// Dataset
// ============================================================================

/// One patient record. A missing key reads as null.
pub type Row = BTreeMap<String, CellValue>;

/// Read a cell from a row, treating a missing key as null.
pub fn cell<'a>(row: &'a Row, column: &str) -> &'a CellValue {
    row.get(column).unwrap_or(&NULL_CELL)
}

/// Ordered sequence of rows. Serializes as a plain JSON array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset {
    rows: Vec<Row>,
}

impl Dataset {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    /// Parse a dataset from JSON, rejecting anything that is not a non-empty
    /// array of row objects.
    pub fn from_json_value(value: &serde_json::Value) -> Result<Self> {
        let items = match value {
            serde_json::Value::Null => {
                return Err(VizError::InvalidInput(
                    "No data passed. Data must be an array of objects.".to_string(),
                ));
            }
            serde_json::Value::Array(items) => items,
            _ => {
                return Err(VizError::InvalidInput(
                    "Data must be an array of objects, not a single value.".to_string(),
                ));
            }
        };

        if items.is_empty() {
            return Err(VizError::InvalidInput("Data array is empty.".to_string()));
        }

        if let Some(position) = items.iter().position(|item| !item.is_object()) {
            return Err(VizError::InvalidInput(format!(
                "Array does not contain objects (element {} is not an object).",
                position
            )));
        }

        let rows = items
            .iter()
            .map(|item| Row::deserialize(item).map_err(VizError::from))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rows })
    }

    /// Fail with `InvalidInput` when there is nothing to plot.
    pub fn ensure_not_empty(&self) -> Result<()> {
        if self.rows.is_empty() {
            return Err(VizError::InvalidInput("Data array is empty.".to_string()));
        }
        Ok(())
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
    }

    /// Whether any row carries the column.
    pub fn has_column(&self, name: &str) -> bool {
        self.rows.iter().any(|row| row.contains_key(name))
    }

    /// Like [`has_column`](Self::has_column) but as a `ColumnNotFound` error.
    pub fn require_column(&self, name: &str) -> Result<()> {
        if self.has_column(name) {
            Ok(())
        } else {
            Err(VizError::ColumnNotFound(name.to_string()))
        }
    }

    /// Values of a column, one per row.
    pub fn column(&self, name: &str) -> Vec<&CellValue> {
        self.rows.iter().map(|row| cell(row, name)).collect()
    }

    /// Finite numeric values of a column, one per row.
    pub fn numeric_column(&self, name: &str) -> Vec<Option<f64>> {
        self.rows.iter().map(|row| cell(row, name).as_f64()).collect()
    }

    /// Sorted distinct non-null values of a column.
    pub fn distinct_values(&self, name: &str) -> Vec<CellValue> {
        let mut values: Vec<CellValue> = self
            .rows
            .iter()
            .map(|row| cell(row, name))
            .filter(|value| !value.is_null())
            .cloned()
            .collect();
        values.sort_by(|a, b| a.total_cmp(b));
        values.dedup_by(|a, b| a.same_value(b));
        values
    }

    /// Columns holding at least one number, in the order they are first seen.
    pub fn numeric_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for row in &self.rows {
            for (key, value) in row {
                if matches!(value, CellValue::Number(_)) && !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
        columns
    }

    /// Return a new dataset with `name` set on every row.
    pub fn with_column(&self, name: &str, values: Vec<CellValue>) -> Result<Self> {
        if values.len() != self.rows.len() {
            return Err(VizError::InvalidInput(format!(
                "Column '{}' has {} values for {} rows",
                name,
                values.len(),
                self.rows.len()
            )));
        }

        let rows = self
            .rows
            .iter()
            .zip(values)
            .map(|(row, value)| {
                let mut row = row.clone();
                row.insert(name.to_string(), value);
                row
            })
            .collect();

        Ok(Self { rows })
    }

    /// Keep only the rows whose `id_field` is one of `ids`.
    pub fn filter_by_ids(&self, id_field: &str, ids: &[CellValue]) -> Self {
        let rows = self
            .rows
            .iter()
            .filter(|row| {
                let id = cell(row, id_field);
                ids.iter().any(|candidate| candidate.same_value(id))
            })
            .cloned()
            .collect();
        Self { rows }
    }
}

impl From<Vec<Row>> for Dataset {
    fn from(rows: Vec<Row>) -> Self {
        Self::new(rows)
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Variable type, always re-inferred from the current values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarType {
    Boolean,
    Integer,
    Float,
    Categorical,
}

impl VarType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VarType::Boolean => "boolean",
            VarType::Integer => "integer",
            VarType::Float => "float",
            VarType::Categorical => "categorical",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, VarType::Integer | VarType::Float)
    }
}

/// Significance test chosen for a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatTest {
    ChiSquare,
    Anova,
    KruskalWallis,
}

impl StatTest {
    pub fn display_name(&self) -> &'static str {
        match self {
            StatTest::ChiSquare => "χ² Test",
            StatTest::Anova => "ANOVA",
            StatTest::KruskalWallis => "Kruskal-Wallis Test",
        }
    }
}

/// The implicit "All" aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverallSummary {
    #[serde(rename = "N")]
    pub n: usize,
    /// 4-decimal p-value, or `""` when no test could run.
    #[serde(rename = "pValue", skip_serializing_if = "Option::is_none")]
    pub p_value: Option<String>,
    #[serde(rename = "pValueDisplay", skip_serializing_if = "Option::is_none")]
    pub p_value_display: Option<String>,
    #[serde(skip)]
    pub test: Option<StatTest>,
    #[serde(skip)]
    pub p: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    #[serde(skip)]
    pub key: CellValue,
    #[serde(rename = "N")]
    pub n: usize,
    /// Formatted statistic, or `"---"` for a group without usable values.
    pub statistics: String,
}

/// Per-group summary of one variable.
///
/// Serializes as `{"All": {...}, "<group>": {"N", "statistics"}, ...}`.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupStats {
    pub var_type: VarType,
    pub is_normal: bool,
    pub all: OverallSummary,
    /// Groups in ascending key order.
    pub groups: Vec<GroupSummary>,
}

impl GroupStats {
    /// Whether the overall test found a difference at the 5% level.
    pub fn is_significant(&self) -> bool {
        self.all.p.is_some_and(|p| p < 0.05)
    }

    pub fn group(&self, key: &str) -> Option<&GroupSummary> {
        self.groups.iter().find(|group| group.key.to_string() == key)
    }
}

impl Serialize for GroupStats {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.groups.len() + 1))?;
        map.serialize_entry("All", &self.all)?;
        for group in &self.groups {
            map.serialize_entry(&group.key.to_string(), group)?;
        }
        map.end()
    }
}

// ============================================================================
// Density Map
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DensityCell {
    pub x: f64,
    pub y: f64,
    pub norm_density: f64,
    pub norm_density_positive: f64,
    pub corrected_density: f64,
}

/// Row-major `size x size` grid of density cells.
///
/// Row `i` holds the density at the `i`-th pixel center counted from the
/// lowest y. Its `y` label is flipped (`max` first) so an ordinal axis that
/// sorts top-down draws the map upright.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityGrid {
    pub size: usize,
    pub cells: Vec<DensityCell>,
}

impl DensityGrid {
    pub fn cell(&self, row: usize, col: usize) -> Option<&DensityCell> {
        if row >= self.size || col >= self.size {
            return None;
        }
        self.cells.get(row * self.size + col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cohort() -> Dataset {
        Dataset::from_json_value(&json!([
            {"ID": 1, "age": 30, "sex": 0, "ecg": [1.0, 2.0]},
            {"ID": 2, "age": 70, "sex": 1, "site": "B"},
            {"ID": 3, "age": null, "sex": 0, "site": "A"}
        ]))
        .unwrap()
    }

    #[test]
    fn test_cell_value_deserialization() {
        let row: Row =
            serde_json::from_value(json!({"a": null, "b": 2, "c": "x", "d": [1, null], "e": true}))
                .unwrap();
        assert_eq!(row["a"], CellValue::Null);
        assert_eq!(row["b"], CellValue::Number(2.0));
        assert_eq!(row["c"], CellValue::Text("x".to_string()));
        assert!(matches!(&row["d"], CellValue::Series(v) if v.len() == 2 && v[1].is_nan()));
        assert_eq!(row["e"], CellValue::Number(1.0));
    }

    #[test]
    fn test_cell_value_display() {
        assert_eq!(CellValue::Number(30.0).to_string(), "30");
        assert_eq!(CellValue::Number(2.5).to_string(), "2.5");
        assert_eq!(CellValue::Text("A".to_string()).to_string(), "A");
        assert_eq!(CellValue::Null.to_string(), "null");
    }

    #[test]
    fn test_to_json() {
        assert_eq!(CellValue::Null.to_json(), json!(null));
        assert_eq!(CellValue::Number(f64::NAN).to_json(), json!(null));
        assert_eq!(CellValue::Number(2.5).to_json(), json!(2.5));
        assert_eq!(CellValue::from("IV").to_json(), json!("IV"));
        assert_eq!(CellValue::Series(vec![1.0, 2.0]).to_json(), json!([1.0, 2.0]));
    }

    #[test]
    fn test_total_order() {
        let mut values = vec![
            CellValue::from("b"),
            CellValue::Number(10.0),
            CellValue::Null,
            CellValue::Number(2.0),
            CellValue::from("a"),
        ];
        values.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(
            values,
            vec![
                CellValue::Null,
                CellValue::Number(2.0),
                CellValue::Number(10.0),
                CellValue::from("a"),
                CellValue::from("b"),
            ]
        );
    }

    #[test]
    fn test_from_json_value_rejects_bad_input() {
        for value in [json!(null), json!({"a": 1}), json!([]), json!([{"a": 1}, 3])] {
            let error = Dataset::from_json_value(&value).unwrap_err();
            assert_eq!(error.error_code(), "INVALID_INPUT");
        }
    }

    #[test]
    fn test_column_access() {
        let data = cohort();
        assert_eq!(data.len(), 3);
        assert_eq!(data.numeric_column("age"), vec![Some(30.0), Some(70.0), None]);
        assert_eq!(data.column("site")[0], &CellValue::Null);
        assert_eq!(
            data.distinct_values("sex"),
            vec![CellValue::Number(0.0), CellValue::Number(1.0)]
        );
        assert!(data.has_column("ecg"));
        assert!(data.require_column("weight").is_err());
    }

    #[test]
    fn test_numeric_columns() {
        let data = cohort();
        assert_eq!(data.numeric_columns(), vec!["ID", "age", "sex"]);
    }

    #[test]
    fn test_with_column_returns_new_dataset() {
        let data = cohort();
        let binned = data
            .with_column("flag", vec![CellValue::from("x"), CellValue::Null, CellValue::Null])
            .unwrap();
        assert!(!data.has_column("flag"));
        assert_eq!(binned.rows()[0]["flag"], CellValue::from("x"));
        assert!(data.with_column("flag", vec![]).is_err());
    }

    #[test]
    fn test_filter_by_ids() {
        let data = cohort();
        let filtered = data.filter_by_ids(ID_FIELD, &[CellValue::Number(1.0), CellValue::Number(3.0)]);
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered.rows()[1]["ID"], CellValue::Number(3.0));
    }

    #[test]
    fn test_group_stats_serialization() {
        let stats = GroupStats {
            var_type: VarType::Float,
            is_normal: true,
            all: OverallSummary {
                n: 3,
                p_value: Some("0.5000".to_string()),
                p_value_display: Some("ANOVA: 0.5000".to_string()),
                test: Some(StatTest::Anova),
                p: Some(0.5),
            },
            groups: vec![GroupSummary {
                key: CellValue::Number(0.0),
                n: 2,
                statistics: "40.00 ± 14.14".to_string(),
            }],
        };
        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(
            value,
            json!({
                "All": {"N": 3, "pValue": "0.5000", "pValueDisplay": "ANOVA: 0.5000"},
                "0": {"N": 2, "statistics": "40.00 ± 14.14"}
            })
        );
        assert!(!stats.is_significant());
        assert!(stats.group("0").is_some());
    }
}
