use ndarray::Array2;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap};

static TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\w\w+\b").expect("valid token pattern"));

/// Term-weighting matrix for one corpus state.
#[derive(Debug, Clone)]
pub struct TfidfMatrix {
    /// Column terms, sorted.
    pub vocabulary: Vec<String>,
    /// One L2-normalized row per input document, in input order.
    pub matrix: Array2<f64>,
}

/// TF-IDF over the whole corpus with smoothed IDF and L2 row normalization.
///
/// The vocabulary is rebuilt from scratch on every call, so adding a document
/// changes every row, not just the new one.
#[derive(Debug, Clone, Copy, Default)]
pub struct TfidfVectorizer;

impl TfidfVectorizer {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    #[must_use]
    pub fn tokenize(text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        TOKEN_PATTERN
            .find_iter(&lowered)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    #[must_use]
    pub fn fit_transform<S: AsRef<str>>(&self, documents: &[S]) -> TfidfMatrix {
        let counts: Vec<BTreeMap<String, usize>> = documents
            .iter()
            .map(|doc| {
                let mut terms = BTreeMap::new();
                for token in Self::tokenize(doc.as_ref()) {
                    *terms.entry(token).or_insert(0) += 1;
                }
                terms
            })
            .collect();

        let vocabulary: Vec<String> = counts
            .iter()
            .flat_map(|terms| terms.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let column: HashMap<&str, usize> = vocabulary
            .iter()
            .enumerate()
            .map(|(idx, term)| (term.as_str(), idx))
            .collect();

        let mut document_frequency = vec![0usize; vocabulary.len()];
        for terms in &counts {
            for term in terms.keys() {
                document_frequency[column[term.as_str()]] += 1;
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let n_docs = documents.len() as f64;
        #[allow(clippy::cast_precision_loss)]
        let idf: Vec<f64> = document_frequency
            .iter()
            .map(|&df| ((1.0 + n_docs) / (1.0 + df as f64)).ln() + 1.0)
            .collect();

        let mut matrix = Array2::<f64>::zeros((documents.len(), vocabulary.len()));
        for (row, terms) in counts.iter().enumerate() {
            for (term, &count) in terms {
                let col = column[term.as_str()];
                #[allow(clippy::cast_precision_loss)]
                let weight = count as f64 * idf[col];
                matrix[[row, col]] = weight;
            }
            let mut values = matrix.row_mut(row);
            let norm = values.iter().map(|v| v * v).sum::<f64>().sqrt();
            if norm > 0.0 {
                values.mapv_inplace(|v| v / norm);
            }
        }

        TfidfMatrix { vocabulary, matrix }
    }
}
