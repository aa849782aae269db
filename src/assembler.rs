//! Converts collected answers into a model-ordered feature row.

use crate::collector::Selections;
use crate::error::{PredictError, Result};
use serde::Serialize;

/// Single-row input in a model's training order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy as `f32`, the element type ONNX classifiers take.
    pub fn to_f32(&self) -> Vec<f32> {
        self.0.iter().map(|&v| v as f32).collect()
    }
}

/// Build the row for `model` so that entry `i` is the answer for
/// `feature_names[i]`.
///
/// Missing answers are never filled in: every absent name is reported in a
/// `SchemaMismatch`.
pub fn assemble<S: AsRef<str>>(
    model: &str,
    selections: &Selections,
    feature_names: &[S],
) -> Result<FeatureVector> {
    let mut values = Vec::with_capacity(feature_names.len());
    let mut missing = Vec::new();

    for name in feature_names {
        let name = name.as_ref();
        match selections.get(name) {
            Some(value) => values.push(value as f64),
            None => missing.push(name.to_string()),
        }
    }

    if !missing.is_empty() {
        return Err(PredictError::SchemaMismatch {
            model: model.to_string(),
            missing,
        });
    }

    Ok(FeatureVector(values))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_in_schema_order() {
        let selections: Selections = [("Fruits", 3), ("Milk", 1)].into_iter().collect();

        let vector = assemble("logistic", &selections, &["Fruits", "Milk"]).unwrap();
        assert_eq!(vector.values(), &[3.0, 1.0]);

        let reversed = assemble("logistic", &selections, &["Milk", "Fruits"]).unwrap();
        assert_eq!(reversed.values(), &[1.0, 3.0]);
    }

    #[test]
    fn test_assemble_matches_lookup_for_every_position() {
        let names: Vec<String> = (0..22).map(|i| format!("q{}", i)).collect();
        let selections: Selections = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), (i * 7 % 11) as i64))
            .collect();

        let vector = assemble("m", &selections, &names).unwrap();
        assert_eq!(vector.len(), names.len());
        for (i, name) in names.iter().enumerate() {
            assert_eq!(vector.values()[i], selections.get(name).unwrap() as f64);
        }
    }

    #[test]
    fn test_assemble_reports_every_missing_feature() {
        let selections: Selections = [("Fruits", 3)].into_iter().collect();

        let err = assemble("forest", &selections, &["Milk", "Fruits", "Red Meat"]).unwrap_err();
        assert_eq!(
            err,
            PredictError::SchemaMismatch {
                model: "forest".to_string(),
                missing: vec!["Milk".to_string(), "Red Meat".to_string()],
            }
        );
    }

    #[test]
    fn test_extra_answers_are_ignored() {
        let selections: Selections = [("Fruits", 3), ("Milk", 1), ("Eggs", 2)]
            .into_iter()
            .collect();
        let vector = assemble("m", &selections, &["Eggs"]).unwrap();
        assert_eq!(vector.values(), &[2.0]);
    }
}
