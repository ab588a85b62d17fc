//! Review-text features and the keyword heuristic used without a model

use crate::adapter::FeatureAdapter;
use ahash::AHashSet;
use modelvault_core::{FeatureMap, TfidfVectorizer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Turns raw review text into the normalized form the vectorizer was fit on.
pub trait TextNormalizer: Send + Sync {
    fn normalize(&self, text: &str) -> String;
}

const EXTRA_LETTERS: &str = "áàâãéèêíïóôõöúçñ";

/// Lowercases, keeps letters (accented ones included), digits and `!?`,
/// then drops stop words and tokens shorter than two characters.
pub struct BasicNormalizer {
    stop_words: AHashSet<String>,
}

impl Default for BasicNormalizer {
    fn default() -> Self {
        Self::with_stop_words(PORTUGUESE_STOP_WORDS.iter().copied())
    }
}

impl BasicNormalizer {
    pub fn with_stop_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            stop_words: words.into_iter().map(Into::into).collect(),
        }
    }

    fn keep(c: char) -> bool {
        c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() || c == '!' || c == '?' || EXTRA_LETTERS.contains(c)
    }
}

impl TextNormalizer for BasicNormalizer {
    fn normalize(&self, text: &str) -> String {
        let cleaned: String = text
            .to_lowercase()
            .chars()
            .map(|c| if Self::keep(c) { c } else { ' ' })
            .collect();
        cleaned
            .split_whitespace()
            .filter(|w| w.chars().count() >= 2 && !self.stop_words.contains(*w))
            .filter(|w| w.chars().any(|c| c != '!' && c != '?'))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Negative,
    Neutral,
    Positive,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
            Sentiment::Positive => "positive",
        }
    }

    /// Map a classifier label; unknown labels are treated as neutral.
    pub fn from_label(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "negative" | "neg" | "negativo" => Sentiment::Negative,
            "positive" | "pos" | "positivo" => Sentiment::Positive,
            _ => Sentiment::Neutral,
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const POSITIVE_KEYWORDS: [&str; 7] = ["excelente", "ótimo", "perfeito", "recomendo", "bom", "rápida", "adorei"];
pub const NEGATIVE_KEYWORDS: [&str; 6] = ["péssimo", "ruim", "defeito", "decepcionado", "problema", "horrível"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordScore {
    pub sentiment: Sentiment,
    pub confidence: f64,
    pub positive_hits: usize,
    pub negative_hits: usize,
}

/// Three-way classification by counting fixed keywords in the raw text.
///
/// Each keyword counts once, matched as a substring of the lowercased text.
pub fn keyword_sentiment(text: &str) -> KeywordScore {
    let lowered = text.to_lowercase();
    let positive_hits = POSITIVE_KEYWORDS.iter().filter(|k| lowered.contains(*k)).count();
    let negative_hits = NEGATIVE_KEYWORDS.iter().filter(|k| lowered.contains(*k)).count();

    let (sentiment, confidence) = match positive_hits.cmp(&negative_hits) {
        std::cmp::Ordering::Greater => (Sentiment::Positive, 0.7 + 0.05 * positive_hits as f64),
        std::cmp::Ordering::Less => (Sentiment::Negative, 0.7 + 0.05 * negative_hits as f64),
        std::cmp::Ordering::Equal => (Sentiment::Neutral, 0.6),
    };
    KeywordScore {
        sentiment,
        confidence: confidence.min(0.99),
        positive_hits,
        negative_hits,
    }
}

/// Vectorizes normalized review text with a fitted TF-IDF vectorizer.
pub struct SentimentAdapter<'a> {
    normalizer: &'a dyn TextNormalizer,
    vectorizer: &'a TfidfVectorizer,
}

impl<'a> SentimentAdapter<'a> {
    pub fn new(normalizer: &'a dyn TextNormalizer, vectorizer: &'a TfidfVectorizer) -> Self {
        Self { normalizer, vectorizer }
    }
}

impl FeatureAdapter for SentimentAdapter<'_> {
    type Input = str;
    /// The normalized text.
    type Derived = String;

    fn compute(&self, text: &str) -> (FeatureMap, String) {
        let normalized = self.normalizer.normalize(text);
        let row = self.vectorizer.transform(&normalized);
        let mut f = FeatureMap::new();
        for (term, weight) in self.vectorizer.vocabulary.iter().zip(row) {
            if weight != 0.0 {
                f.insert(term.as_str(), weight);
            }
        }
        (f, normalized)
    }
}

/// A compact Portuguese stop-word list.
pub const PORTUGUESE_STOP_WORDS: &[&str] = &[
    "de", "a", "o", "que", "e", "do", "da", "em", "um", "para", "com", "uma", "os", "no", "se", "na",
    "por", "mais", "as", "dos", "como", "mas", "ao", "ele", "das", "à", "seu", "sua", "ou", "quando",
    "muito", "nos", "já", "eu", "também", "só", "pelo", "pela", "até", "isso", "ela", "entre", "depois",
    "sem", "mesmo", "aos", "seus", "quem", "nas", "me", "esse", "eles", "você", "essa", "num", "nem",
    "suas", "meu", "às", "minha", "numa", "pelos", "elas", "qual", "nós", "lhe", "deles", "essas",
    "esses", "pelas", "este", "dele", "tu", "te", "vocês", "vos", "lhes", "meus", "minhas", "teu",
    "tua", "nosso", "nossa", "nossos", "nossas", "dela", "delas", "esta", "estes", "estas", "aquele",
    "aquela", "aqueles", "aquelas", "isto", "aquilo", "estou", "está", "estamos", "estão", "foi",
    "era", "tem", "ter", "não", "é", "são", "ser", "há", "vai", "pra",
];

#[cfg(test)]
mod tests {
    use super::*;
    use modelvault_core::FeatureSchema;

    #[test]
    fn test_normalizer() {
        let n = BasicNormalizer::default();
        assert_eq!(
            n.normalize("Produto EXCELENTE!!! Chegou rápido, e o preço é ótimo :)"),
            "produto excelente!!! chegou rápido preço ótimo"
        );
        assert_eq!(n.normalize("a e o"), "");
        assert_eq!(n.normalize("? ! ok"), "ok");
    }

    #[test]
    fn test_keyword_positive() {
        let score = keyword_sentiment("Produto excelente! Entrega rápida e embalagem perfeita. Recomendo!");
        assert_eq!(score.sentiment, Sentiment::Positive);
        assert_eq!(score.positive_hits, 3);
        assert!((score.confidence - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_keyword_negative() {
        let score = keyword_sentiment("Muito decepcionado. O produto chegou com defeito e o atendimento foi péssimo.");
        assert_eq!(score.sentiment, Sentiment::Negative);
        assert_eq!(score.negative_hits, 3);
    }

    #[test]
    fn test_keyword_neutral_and_cap() {
        let neutral = keyword_sentiment("Chegou no prazo.");
        assert_eq!(neutral.sentiment, Sentiment::Neutral);
        assert_eq!(neutral.confidence, 0.6);

        let gushing = keyword_sentiment("excelente ótimo perfeito recomendo bom rápida adorei");
        assert_eq!(gushing.positive_hits, 7);
        assert!((gushing.confidence - 0.99).abs() < 1e-9);
    }

    #[test]
    fn test_adapter_vector_follows_vocabulary() {
        let normalizer = BasicNormalizer::default();
        let vectorizer = TfidfVectorizer::new(vec!["bom".into(), "ruim".into(), "produto".into()], vec![1.0, 1.0, 1.0]);
        let schema = FeatureSchema::numeric(vectorizer.vocabulary.clone());
        let adapter = SentimentAdapter::new(&normalizer, &vectorizer);
        let built = adapter.build("Produto muito BOM", &schema);
        assert_eq!(built.derived, "produto bom");
        let dense = built.vector.to_dense().unwrap();
        assert_eq!(dense.len(), 3);
        assert_eq!(dense[1], 0.0);
        assert!(dense[0] > 0.0 && dense[2] > 0.0);
    }

    #[test]
    fn test_label_mapping() {
        assert_eq!(Sentiment::from_label("positive"), Sentiment::Positive);
        assert_eq!(Sentiment::from_label("NEGATIVE"), Sentiment::Negative);
        assert_eq!(Sentiment::from_label("mixed"), Sentiment::Neutral);
    }
}
