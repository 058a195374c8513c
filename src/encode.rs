//! One-hot encoding of categorical car attributes.
//!
//! The encoder is fitted once on the full training dataset, then frozen and
//! persisted alongside the model. Inference re-applies the same encoding and
//! must never re-fit or mutate the vocabularies: the column layout of the
//! trained model depends on them.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// A fitted mapping from raw categorical string values to 0/1 indicator
/// blocks, one block per attribute and one indicator per vocabulary entry.
///
/// Vocabularies are sorted lexicographically, so fitting twice on the same
/// data produces byte-identical encoders and a stable output column order
/// across process restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    /// Per-attribute vocabularies, in the attribute order seen at fit time.
    vocabularies: Vec<AttributeVocabulary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct AttributeVocabulary {
    attribute: String,
    /// Distinct values observed during fitting, sorted lexicographically.
    values: Vec<String>,
}

impl OneHotEncoder {
    /// Fits the encoder on `(attribute name, observed values)` column pairs.
    ///
    /// Any string is accepted as a category; no normalization is applied.
    /// An empty column list, or columns with zero rows, yield an encoder
    /// with empty vocabularies rather than an error.
    pub fn fit(columns: &[(String, Vec<String>)]) -> Self {
        let vocabularies = columns
            .iter()
            .map(|(attribute, values)| AttributeVocabulary {
                attribute: attribute.clone(),
                values: values
                    .iter()
                    .unique()
                    .sorted()
                    .cloned()
                    .collect(),
            })
            .collect();
        OneHotEncoder { vocabularies }
    }

    /// Encodes one record's categorical part into a flat indicator vector.
    ///
    /// `pairs` maps attribute names to this record's values. For each fitted
    /// attribute, exactly one indicator per vocabulary entry is emitted. A
    /// value never seen during fitting, or an attribute missing from the
    /// record entirely, produces an all-zero block for that attribute: the
    /// model receives "no signal" rather than an error.
    pub fn transform_row(&self, pairs: &[(String, String)]) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.width());
        for vocab in &self.vocabularies {
            let value = pairs
                .iter()
                .find(|(name, _)| name == &vocab.attribute)
                .map(|(_, v)| v.as_str());
            for entry in &vocab.values {
                let hit = value == Some(entry.as_str());
                out.push(if hit { 1.0 } else { 0.0 });
            }
        }
        out
    }

    /// Synthesized output column names, e.g. `brand_Honda`, in the exact
    /// order `transform_row` emits indicators.
    pub fn feature_names(&self) -> Vec<String> {
        self.vocabularies
            .iter()
            .flat_map(|vocab| {
                vocab
                    .values
                    .iter()
                    .map(|value| format!("{}_{}", vocab.attribute, value))
            })
            .collect()
    }

    /// Total number of indicator columns across all attributes.
    pub fn width(&self) -> usize {
        self.vocabularies.iter().map(|v| v.values.len()).sum()
    }

    /// Names of the attributes the encoder was fitted on, in fit order.
    pub fn attributes(&self) -> Vec<&str> {
        self.vocabularies
            .iter()
            .map(|v| v.attribute.as_str())
            .collect()
    }
}
