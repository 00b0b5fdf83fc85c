//! Variable type inference from the distinct values of a column.

use crate::types::{CellValue, VarType};

/// Infer the type of a column from its current values.
///
/// - any non-numeric value: categorical
/// - exactly two distinct numbers: boolean
/// - only whole numbers: integer
/// - otherwise: float
pub(crate) fn infer_var_type(values: &[&CellValue]) -> VarType {
    let mut distinct: Vec<f64> = Vec::new();

    for value in values {
        match value {
            CellValue::Null => {}
            CellValue::Number(number) if number.is_finite() => {
                if !distinct.contains(number) {
                    distinct.push(*number);
                }
            }
            _ => return VarType::Categorical,
        }
    }

    if distinct.len() == 2 {
        VarType::Boolean
    } else if distinct.iter().all(|v| v.fract() == 0.0) {
        VarType::Integer
    } else {
        VarType::Float
    }
}
