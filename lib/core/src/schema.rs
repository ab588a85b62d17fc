//! Feature schemas and the vectors built against them
//!
//! An artifact declares an ordered [`FeatureSchema`]. Adapters compute a
//! loose [`FeatureMap`] and [`FeatureSchema::conform`] turns it into the exact
//! [`FeatureVector`] the artifact expects: every declared slot present, in
//! declared order, nothing else.

use crate::error::{Error, Result};
use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Placeholder used for categorical slots nobody filled.
pub const MISSING_CATEGORY: &str = "None";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    #[default]
    Numeric,
    Categorical,
}

impl FeatureKind {
    /// Type-appropriate zero used to fill absent slots.
    pub fn zero(&self) -> FeatureValue {
        match self {
            FeatureKind::Numeric => FeatureValue::Number(0.0),
            FeatureKind::Categorical => FeatureValue::Category(MISSING_CATEGORY.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSlot {
    pub name: String,
    #[serde(default)]
    pub kind: FeatureKind,
}

impl FeatureSlot {
    pub fn numeric(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: FeatureKind::Numeric }
    }

    pub fn categorical(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: FeatureKind::Categorical }
    }
}

/// A single feature value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Category(String),
}

impl FeatureValue {
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FeatureValue::Number(v) => Some(*v),
            FeatureValue::Category(_) => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FeatureValue::Category(s) => Some(s),
            FeatureValue::Number(_) => None,
        }
    }

    fn coerce(self, kind: FeatureKind) -> FeatureValue {
        match (kind, self) {
            (FeatureKind::Numeric, FeatureValue::Category(s)) => s
                .trim()
                .parse::<f64>()
                .map(FeatureValue::Number)
                .unwrap_or_else(|_| kind.zero()),
            (FeatureKind::Categorical, FeatureValue::Number(v)) => {
                if v.fract() == 0.0 && v.is_finite() {
                    FeatureValue::Category(format!("{}", v as i64))
                } else {
                    FeatureValue::Category(v.to_string())
                }
            }
            (_, value) => value,
        }
    }
}

impl From<f64> for FeatureValue {
    fn from(v: f64) -> Self {
        FeatureValue::Number(v)
    }
}

impl From<u32> for FeatureValue {
    fn from(v: u32) -> Self {
        FeatureValue::Number(f64::from(v))
    }
}

impl From<i32> for FeatureValue {
    fn from(v: i32) -> Self {
        FeatureValue::Number(f64::from(v))
    }
}

impl From<bool> for FeatureValue {
    fn from(v: bool) -> Self {
        FeatureValue::Number(if v { 1.0 } else { 0.0 })
    }
}

impl From<&str> for FeatureValue {
    fn from(v: &str) -> Self {
        FeatureValue::Category(v.to_string())
    }
}

impl From<String> for FeatureValue {
    fn from(v: String) -> Self {
        FeatureValue::Category(v)
    }
}

/// Unordered bag of computed features, before schema selection.
#[derive(Debug, Clone, Default)]
pub struct FeatureMap {
    values: AHashMap<String, FeatureValue>,
}

impl FeatureMap {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FeatureValue>) {
        self.values.insert(name.into(), value.into());
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.values.get(name)
    }

    /// Numeric value of a feature, if present and numeric.
    #[inline]
    pub fn number(&self, name: &str) -> Option<f64> {
        self.values.get(name).and_then(FeatureValue::as_f64)
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn take(&mut self, name: &str) -> Option<FeatureValue> {
        self.values.remove(name)
    }
}

/// Ordered list of named, typed feature slots declared by an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSchema {
    slots: Vec<FeatureSlot>,
}

impl FeatureSchema {
    pub fn new(slots: Vec<FeatureSlot>) -> Self {
        Self { slots }
    }

    /// Schema made only of numeric slots.
    pub fn numeric<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            slots: names.into_iter().map(FeatureSlot::numeric).collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub fn slots(&self) -> &[FeatureSlot] {
        &self.slots
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|s| s.name.as_str())
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.name == name)
    }

    /// Structural check run on upload: non-empty, unique names.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.slots.is_empty() {
            return Err("feature schema is empty".to_string());
        }
        let mut seen = AHashSet::with_capacity(self.slots.len());
        for slot in &self.slots {
            if slot.name.is_empty() {
                return Err("feature schema contains an unnamed slot".to_string());
            }
            if !seen.insert(slot.name.as_str()) {
                return Err(format!("duplicate feature '{}'", slot.name));
            }
        }
        Ok(())
    }

    /// Select the declared slots out of a computed map.
    ///
    /// Absent slots get the kind's zero, mistyped values are coerced and
    /// computed values without a slot are dropped.
    pub fn conform(&self, mut computed: FeatureMap) -> FeatureVector {
        let mut entries = Vec::with_capacity(self.slots.len());
        let mut defaulted = 0usize;
        for slot in &self.slots {
            let value = match computed.take(&slot.name) {
                Some(v) => v.coerce(slot.kind),
                None => {
                    defaulted += 1;
                    slot.kind.zero()
                }
            };
            entries.push((slot.name.clone(), value));
        }
        trace!(
            defaulted,
            dropped = computed.len(),
            "conformed feature vector to schema"
        );
        FeatureVector { entries }
    }
}

/// Fixed-order feature vector matching a [`FeatureSchema`].
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FeatureVector {
    entries: Vec<(String, FeatureValue)>,
}

impl FeatureVector {
    /// Pair an already-ordered dense row with the schema's slot names.
    pub fn from_dense(schema: &FeatureSchema, values: Vec<f64>) -> Result<Self> {
        if values.len() != schema.len() {
            return Err(Error::SchemaMismatch {
                expected: schema.len(),
                actual: values.len(),
            });
        }
        let entries = schema
            .names()
            .map(str::to_string)
            .zip(values.into_iter().map(FeatureValue::Number))
            .collect();
        Ok(Self { entries })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &FeatureValue> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    #[inline]
    pub fn at(&self, index: usize) -> Option<&FeatureValue> {
        self.entries.get(index).map(|(_, v)| v)
    }

    /// All values as numbers; fails on the first categorical slot.
    pub fn to_dense(&self) -> Result<Vec<f64>> {
        self.entries
            .iter()
            .map(|(name, v)| {
                v.as_f64().ok_or_else(|| {
                    Error::InferenceFailure(format!("feature '{}' is categorical", name))
                })
            })
            .collect()
    }

    /// Verify names and order against a schema.
    pub fn check(&self, schema: &FeatureSchema) -> Result<()> {
        let same = self.entries.len() == schema.len()
            && self.names().zip(schema.names()).all(|(a, b)| a == b);
        if same {
            Ok(())
        } else {
            Err(Error::SchemaMismatch {
                expected: schema.len(),
                actual: self.entries.len(),
            })
        }
    }
}
