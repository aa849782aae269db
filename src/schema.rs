//! Feature schema: ordered feature names and the answer domain of each.
//!
//! Domains are resolved against a static table keyed by a normalized form of
//! the feature name. Names without a table entry get the default integer range,
//! so resolution never fails.

use serde::Serialize;
use std::collections::HashMap;

/// Number of placeholder features rendered when no model could be loaded.
pub const PLACEHOLDER_FEATURE_COUNT: usize = 10;

/// Ordered, non-empty set of permitted integer answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FeatureDomain {
    values: Vec<i64>,
}

impl FeatureDomain {
    /// Inclusive range `0..=upper`. Negative bounds collapse to `[0]`.
    pub fn range(upper: i64) -> Self {
        Self {
            values: (0..=upper.max(0)).collect(),
        }
    }

    /// Explicit value list; `None` when empty.
    pub fn from_values(mut values: Vec<i64>) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        values.sort_unstable();
        values.dedup();
        Some(Self { values })
    }

    /// The lowest value, used as the initial selection.
    pub fn first(&self) -> i64 {
        self.values[0]
    }

    pub fn contains(&self, value: i64) -> bool {
        self.values.binary_search(&value).is_ok()
    }

    pub fn values(&self) -> &[i64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Lowercase and drop spaces and underscores.
pub fn normalize_key(name: &str) -> String {
    name.chars()
        .filter(|c| *c != ' ' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Human-facing label: underscores become spaces and every word is
/// title-cased. A letter directly after a non-letter starts a new word.
pub fn display_label(name: &str) -> String {
    let mut label = String::with_capacity(name.len());
    let mut prev_is_letter = false;
    for c in name.chars() {
        let c = if c == '_' { ' ' } else { c };
        if c.is_alphabetic() {
            if prev_is_letter {
                label.extend(c.to_lowercase());
            } else {
                label.extend(c.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            label.push(c);
            prev_is_letter = false;
        }
    }
    label
}

/// Normalized-key lookup table with a default range for unmatched names.
#[derive(Debug, Clone)]
pub struct DomainTable {
    domains: HashMap<String, FeatureDomain>,
    default_domain: FeatureDomain,
}

impl DomainTable {
    /// Build from `(name, domain)` pairs. When two names normalize to the
    /// same key the first one is kept.
    pub fn new<I, S>(entries: I, default_upper_bound: i64) -> Self
    where
        I: IntoIterator<Item = (S, FeatureDomain)>,
        S: AsRef<str>,
    {
        let mut domains = HashMap::new();
        for (name, domain) in entries {
            domains
                .entry(normalize_key(name.as_ref()))
                .or_insert(domain);
        }
        Self {
            domains,
            default_domain: FeatureDomain::range(default_upper_bound),
        }
    }

    /// Table used by the DMCH dietary survey.
    pub fn survey(default_upper_bound: i64) -> Self {
        Self::survey_with(Vec::new(), default_upper_bound)
    }

    /// Survey table with `overrides` taking precedence over its entries.
    pub fn survey_with(overrides: Vec<(String, FeatureDomain)>, default_upper_bound: i64) -> Self {
        let survey = SURVEY_DOMAINS
            .iter()
            .map(|(name, upper)| (name.to_string(), FeatureDomain::range(*upper)));
        Self::new(overrides.into_iter().chain(survey), default_upper_bound)
    }

    /// Resolve the domain for a feature name. Total: unmatched names get the
    /// default range.
    pub fn lookup(&self, name: &str) -> &FeatureDomain {
        self.domains
            .get(&normalize_key(name))
            .unwrap_or(&self.default_domain)
    }

    /// Whether `name` has an explicit entry.
    pub fn has_entry(&self, name: &str) -> bool {
        self.domains.contains_key(&normalize_key(name))
    }

    pub fn default_domain(&self) -> &FeatureDomain {
        &self.default_domain
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

/// Survey questions and the upper bound of each answer range.
const SURVEY_DOMAINS: [(&str, i64); 22] = [
    ("Wheat(Chapati,Roti,Naan,Dalia,Rawa/Sooji,Seviyaan", 5),
    ("Wheat Free Cereals", 35),
    ("Fruits", 20),
    ("Other Vegetables", 25),
    ("Starchy(Potato,Sweet Patato,Arbi Etc)", 5),
    ("Pulses And Legumes", 15),
    ("Predominant Saturated Fats", 10),
    ("Predominant Unsaturated Fats", 10),
    ("Trans Fats", 5),
    ("Nuts And Oilseeds", 5),
    ("Eggs,Fish And Poultry", 15),
    ("Red Meat", 5),
    ("Milk", 5),
    ("Low Lactose Dairy", 15),
    ("Sweetend Beverages", 20),
    ("Ultra Processed Foods", 75),
    ("Readt To Eat Packaged Snacks", 10),
    ("Savory Snacks", 20),
    ("Processed Foods", 45),
    ("Indian Sweet Meats", 10),
    ("Food Supplements", 25),
    ("Ergogenic Supplements", 5),
];

/// One question on the form.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureSpec {
    pub name: String,
    pub label: String,
    pub domain: FeatureDomain,
}

/// Ordered list of features the form collects.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureSchema {
    features: Vec<FeatureSpec>,
    /// True when the names are placeholders rather than a model's inputs.
    placeholder: bool,
}

impl FeatureSchema {
    /// Resolve a domain for every name, keeping the given order.
    pub fn from_names<S: AsRef<str>>(names: &[S], table: &DomainTable) -> Self {
        let features = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                FeatureSpec {
                    name: name.to_string(),
                    label: display_label(name),
                    domain: table.lookup(name).clone(),
                }
            })
            .collect();

        Self {
            features,
            placeholder: false,
        }
    }

    /// `Feature_0..Feature_9` with default domains.
    pub fn placeholder(table: &DomainTable) -> Self {
        let names: Vec<String> = (0..PLACEHOLDER_FEATURE_COUNT)
            .map(|i| format!("Feature_{}", i))
            .collect();
        Self {
            placeholder: true,
            ..Self::from_names(&names, table)
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    pub fn features(&self) -> &[FeatureSpec] {
        &self.features
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.features.iter().map(|f| f.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&FeatureSpec> {
        self.features.iter().find(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}
