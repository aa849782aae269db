//! Collects the answers submitted for each feature.
//!
//! `Selections` is a plain name -> value map, so tests and the JSON API can
//! build one directly instead of going through the HTML form.

use crate::error::{PredictError, Result};
use crate::schema::FeatureSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Feature name -> chosen answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Selections(HashMap<String, i64>);

impl Selections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every feature set to the first value of its domain.
    pub fn defaults(schema: &FeatureSchema) -> Self {
        Self(
            schema
                .features()
                .iter()
                .map(|f| (f.name.clone(), f.domain.first()))
                .collect(),
        )
    }

    /// Parse raw form fields against the schema.
    ///
    /// Fields that are not features are ignored. Values must be integers in
    /// the feature's domain. Features without a field stay absent.
    pub fn from_form<I, K, V>(schema: &FeatureSchema, fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut selections = Self::new();
        for (name, raw) in fields {
            let (name, raw) = (name.as_ref(), raw.as_ref());
            if schema.get(name).is_none() {
                debug!(field = %name, "Ignoring form field that is not a feature");
                continue;
            }
            let value = raw
                .trim()
                .parse::<i64>()
                .map_err(|_| PredictError::InvalidSelection {
                    feature: name.to_string(),
                    value: raw.to_string(),
                })?;
            selections.set(schema, name, value)?;
        }
        Ok(selections)
    }

    /// Validate an already-typed mapping against the schema.
    pub fn from_values(schema: &FeatureSchema, values: HashMap<String, i64>) -> Result<Self> {
        let mut selections = Self::new();
        for (name, value) in values {
            if schema.get(&name).is_none() {
                debug!(field = %name, "Ignoring value for unknown feature");
                continue;
            }
            selections.set(schema, &name, value)?;
        }
        Ok(selections)
    }

    /// Record an answer, enforcing the feature's domain.
    pub fn set(&mut self, schema: &FeatureSchema, name: &str, value: i64) -> Result<()> {
        let in_domain = schema
            .get(name)
            .map(|f| f.domain.contains(value))
            .unwrap_or(false);
        if !in_domain {
            return Err(PredictError::InvalidSelection {
                feature: name.to_string(),
                value: value.to_string(),
            });
        }
        self.0.insert(name.to_string(), value);
        Ok(())
    }

    /// Insert without domain checks.
    pub fn insert(&mut self, name: impl Into<String>, value: i64) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<i64> {
        self.0.get(name).copied()
    }

    /// Value to show as selected: the recorded answer, else the domain's
    /// first value.
    pub fn selected(&self, schema: &FeatureSchema, name: &str) -> Option<i64> {
        self.get(name)
            .or_else(|| schema.get(name).map(|f| f.domain.first()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, i64)> for Selections {
    fn from_iter<T: IntoIterator<Item = (S, i64)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Two-column layout: row `i` holds feature `i` on the left and feature
/// `i + ceil(n / 2)` on the right, when that index exists.
pub fn column_rows(count: usize) -> Vec<(usize, Option<usize>)> {
    let half = (count + 1) / 2;
    (0..half)
        .map(|i| {
            let right = i + half;
            (i, (right < count).then_some(right))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DomainTable;

    fn schema() -> FeatureSchema {
        FeatureSchema::from_names(&["Fruits", "Milk"], &DomainTable::survey(37))
    }

    #[test]
    fn test_defaults_use_first_value() {
        let selections = Selections::defaults(&schema());
        assert_eq!(selections.len(), 2);
        assert_eq!(selections.get("Fruits"), Some(0));
        assert_eq!(selections.get("Milk"), Some(0));
    }

    #[test]
    fn test_from_form() {
        let fields = vec![("Fruits", "3"), ("Milk", " 1 "), ("submit", "Predict")];
        let selections = Selections::from_form(&schema(), fields).unwrap();

        assert_eq!(selections.len(), 2);
        assert_eq!(selections.get("Fruits"), Some(3));
        assert_eq!(selections.get("Milk"), Some(1));
    }

    #[test]
    fn test_from_form_rejects_out_of_domain() {
        let err = Selections::from_form(&schema(), vec![("Milk", "6")]).unwrap_err();
        assert_eq!(err.kind(), "invalid_selection");

        let err = Selections::from_form(&schema(), vec![("Fruits", "many")]).unwrap_err();
        assert!(err.to_string().contains("Fruits"));
    }

    #[test]
    fn test_selected_falls_back_to_domain_start() {
        let schema = schema();
        let mut selections = Selections::new();
        selections.set(&schema, "Fruits", 7).unwrap();

        assert_eq!(selections.selected(&schema, "Fruits"), Some(7));
        assert_eq!(selections.selected(&schema, "Milk"), Some(0));
        assert_eq!(selections.selected(&schema, "Eggs"), None);
    }

    #[test]
    fn test_from_values_ignores_unknown() {
        let values: HashMap<String, i64> =
            [("Fruits".to_string(), 2), ("Bread".to_string(), 40)].into();
        let selections = Selections::from_values(&schema(), values).unwrap();
        assert_eq!(selections.len(), 1);
    }

    #[test]
    fn test_column_rows() {
        assert!(column_rows(0).is_empty());
        assert_eq!(column_rows(1), vec![(0, None)]);
        assert_eq!(column_rows(4), vec![(0, Some(2)), (1, Some(3))]);
        assert_eq!(
            column_rows(5),
            vec![(0, Some(3)), (1, Some(4)), (2, None)]
        );
    }
}
