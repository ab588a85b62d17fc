use crate::error::{Error, Result};
use crate::schema::FeatureSchema;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

fn default_ngram_max() -> usize {
    1
}

/// Fitted TF-IDF vectorizer.
///
/// Input text is expected to be normalized already; tokens are split on
/// whitespace. Output rows are l2-normalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    /// Terms in column order.
    pub vocabulary: Vec<String>,
    pub idf: Vec<f64>,
    /// 1 for unigrams, 2 to add bigrams ("a b").
    #[serde(default = "default_ngram_max")]
    pub ngram_max: usize,
    #[serde(default)]
    pub sublinear_tf: bool,
    #[serde(skip)]
    index: OnceLock<AHashMap<String, usize>>,
}

impl PartialEq for TfidfVectorizer {
    fn eq(&self, other: &Self) -> bool {
        self.vocabulary == other.vocabulary
            && self.idf == other.idf
            && self.ngram_max == other.ngram_max
            && self.sublinear_tf == other.sublinear_tf
    }
}

impl TfidfVectorizer {
    pub fn new(vocabulary: Vec<String>, idf: Vec<f64>) -> Self {
        Self {
            vocabulary,
            idf,
            ngram_max: 1,
            sublinear_tf: false,
            index: OnceLock::new(),
        }
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.vocabulary.len()
    }

    fn index(&self) -> &AHashMap<String, usize> {
        self.index.get_or_init(|| {
            self.vocabulary
                .iter()
                .enumerate()
                .map(|(i, term)| (term.clone(), i))
                .collect()
        })
    }

    pub fn contains(&self, term: &str) -> bool {
        self.index().contains_key(term)
    }

    /// Fails unless `schema` declares exactly this vocabulary, in any order.
    pub fn check_schema(&self, schema: &FeatureSchema) -> Result<()> {
        let covered = schema.names().filter(|name| self.contains(name)).count();
        if covered != schema.len() {
            return Err(Error::SchemaMismatch {
                expected: schema.len(),
                actual: covered,
            });
        }
        if self.dim() != schema.len() {
            return Err(Error::SchemaMismatch {
                expected: schema.len(),
                actual: self.dim(),
            });
        }
        Ok(())
    }

    pub(crate) fn validate(&self, schema: &FeatureSchema) -> std::result::Result<(), String> {
        if self.vocabulary.is_empty() {
            return Err("vectorizer vocabulary is empty".to_string());
        }
        if self.idf.len() != self.vocabulary.len() {
            return Err(format!("{} idf weights for {} terms", self.idf.len(), self.vocabulary.len()));
        }
        if !(1..=2).contains(&self.ngram_max) {
            return Err(format!("unsupported ngram_max {}", self.ngram_max));
        }
        if !schema.names().eq(self.vocabulary.iter().map(String::as_str)) {
            return Err("feature schema does not list the vocabulary in column order".to_string());
        }
        Ok(())
    }

    /// Dense TF-IDF row for one normalized document.
    pub fn transform(&self, text: &str) -> Vec<f64> {
        let index = self.index();
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let mut counts = vec![0.0f64; self.vocabulary.len()];

        for token in &tokens {
            if let Some(&i) = index.get(*token) {
                counts[i] += 1.0;
            }
        }
        if self.ngram_max >= 2 {
            for pair in tokens.windows(2) {
                let bigram = format!("{} {}", pair[0], pair[1]);
                if let Some(&i) = index.get(bigram.as_str()) {
                    counts[i] += 1.0;
                }
            }
        }

        let mut row: Vec<f64> = counts
            .into_iter()
            .zip(self.idf.iter())
            .map(|(tf, idf)| {
                if tf == 0.0 {
                    0.0
                } else if self.sublinear_tf {
                    (1.0 + tf.ln()) * idf
                } else {
                    tf * idf
                }
            })
            .collect();

        let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for v in &mut row {
                *v /= norm;
            }
        }
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vectorizer() -> TfidfVectorizer {
        TfidfVectorizer::new(
            vec!["bom".into(), "produto".into(), "ruim".into()],
            vec![1.5, 1.0, 2.0],
        )
    }

    #[test]
    fn test_transform_is_normalized() {
        let row = vectorizer().transform("produto bom bom desconhecido");
        assert_eq!(row.len(), 3);
        assert_eq!(row[2], 0.0);
        let norm: f64 = row.iter().map(|v| v * v).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
        assert!(row[0] > row[1]);
    }

    #[test]
    fn test_unknown_text_is_zero_row() {
        let row = vectorizer().transform("nada aqui");
        assert!(row.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_bigrams() {
        let mut v = TfidfVectorizer::new(vec!["muito bom".into(), "bom".into()], vec![1.0, 1.0]);
        v.ngram_max = 2;
        let row = v.transform("muito bom");
        assert!(row[0] > 0.0 && row[1] > 0.0);
    }

    #[test]
    fn test_validate_requires_schema_in_vocabulary_order() {
        let ok = FeatureSchema::numeric(["bom", "produto", "ruim"]);
        let shuffled = FeatureSchema::numeric(["produto", "bom", "ruim"]);
        assert!(vectorizer().validate(&ok).is_ok());
        assert!(vectorizer().validate(&shuffled).is_err());
    }

    #[test]
    fn test_check_schema_against_classifier_inputs() {
        let v = vectorizer();
        assert!(v.check_schema(&FeatureSchema::numeric(["ruim", "bom", "produto"])).is_ok());
        assert!(matches!(
            v.check_schema(&FeatureSchema::numeric(["otimo", "pessimo", "produto"])),
            Err(Error::SchemaMismatch { expected: 3, actual: 1 })
        ));
        assert!(matches!(
            v.check_schema(&FeatureSchema::numeric(["bom", "ruim"])),
            Err(Error::SchemaMismatch { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn test_equality_ignores_lookup_cache() {
        let a = vectorizer();
        let b = vectorizer();
        let _ = a.transform("bom");
        assert_eq!(a, b);
    }
}
