//! Pairwise dissimilarities between leaf samples.
//!
//! The engine does not fix any distance semantics: callers plug in a scoring
//! function over two state vectors, and this module orchestrates the pairwise
//! computation, the prior-probability weight transforms, and the symmetric
//! leaf-indexed table that stores the result. The weighted hamming scorers of
//! the original indel-barcode pipeline ship here as ready-made defaults.

use std::collections::HashMap;

use crate::data::matrix::CharacterMatrix;
use crate::data::state::CharacterState;
use crate::tree_error::LineageTreeError;

/// Per-character, per-state prior probabilities (character -> state -> p).
pub type Priors = HashMap<usize, HashMap<i64, f64>>;

/// Per-character, per-state weights derived from priors by a
/// [`PriorTransformation`].
pub type PriorWeights = HashMap<usize, HashMap<i64, f64>>;

/// How prior probabilities become additive weights.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PriorTransformation {
    /// `w = -ln(p)`
    NegativeLog,
    /// `w = 1 / p`
    Inverse,
    /// `w = sqrt(1 / p)`
    SquareRootInverse,
}

/// Transform a prior table into a weight table.
///
/// # Errors
/// Fails if any probability lies outside `(0, 1]`.
pub fn transform_priors(
    priors: &Priors,
    transformation: PriorTransformation,
) -> Result<PriorWeights, LineageTreeError> {
    let mut weights: PriorWeights = HashMap::with_capacity(priors.len());
    for (&character, states) in priors {
        let entry: &mut HashMap<i64, f64> = weights.entry(character).or_default();
        for (&state, &p) in states {
            if !(p > 0.0 && p <= 1.0) {
                return Err(LineageTreeError::InvalidPrior(p));
            }
            let w = match transformation {
                PriorTransformation::NegativeLog => -p.ln(),
                PriorTransformation::Inverse => 1.0 / p,
                PriorTransformation::SquareRootInverse => (1.0 / p).sqrt(),
            };
            entry.insert(state, w);
        }
    }
    Ok(weights)
}

fn weight_of(weights: &PriorWeights, character: usize, state: i64) -> f64 {
    weights
        .get(&character)
        .and_then(|m| m.get(&state))
        .copied()
        .unwrap_or(0.0)
}

/// Contribution of one resolved candidate pair at one character position.
fn site_dissimilarity(
    a: i64,
    b: i64,
    character: usize,
    weights: Option<&PriorWeights>,
) -> f64 {
    if a == b {
        // Shared mutation: with weights, reward by the (doubled) weight of the
        // state occurring twice independently; unweighted, no contribution.
        if a != 0 {
            weights.map_or(0.0, |w| -2.0 * weight_of(w, character, a))
        } else {
            0.0
        }
    } else if a == 0 || b == 0 {
        let mutated = if a != 0 { a } else { b };
        weights.map_or(1.0, |w| weight_of(w, character, mutated))
    } else {
        weights.map_or(2.0, |w| {
            weight_of(w, character, a) + weight_of(w, character, b)
        })
    }
}

/// Weighted hamming dissimilarity between two state vectors, normalized by
/// the number of positions where both samples were observed.
///
/// Ambiguous entries contribute the mean contribution over all candidate
/// pairs at that position. Positions where either sample is missing are
/// skipped entirely; two samples sharing no observed position score `0`.
pub fn weighted_hamming_distance(
    s1: &[CharacterState],
    s2: &[CharacterState],
    _missing_indicator: i64,
    weights: Option<&PriorWeights>,
) -> f64 {
    let mut d = 0.0;
    let mut num_present = 0usize;
    for (i, (a, b)) in s1.iter().zip(s2.iter()).enumerate() {
        if a.is_missing() || b.is_missing() {
            continue;
        }
        num_present += 1;
        let (ca, cb) = (a.candidates(), b.candidates());
        let mut site = 0.0;
        for &x in ca {
            for &y in cb {
                site += site_dissimilarity(x, y, i, weights);
            }
        }
        d += site / (ca.len() * cb.len()) as f64;
    }
    if num_present == 0 {
        0.0
    } else {
        d / num_present as f64
    }
}

/// Plain hamming distance: the number of positions where two vectors differ.
pub fn hamming_distance(
    s1: &[CharacterState],
    s2: &[CharacterState],
    _missing_indicator: i64,
    _weights: Option<&PriorWeights>,
) -> f64 {
    s1.iter().zip(s2.iter()).filter(|(a, b)| a != b).count() as f64
}

/// Run `scorer` over every unordered pair of matrix rows.
pub fn compute_pairwise_dissimilarities<F>(
    matrix: &CharacterMatrix,
    scorer: F,
    missing_indicator: i64,
    weights: Option<&PriorWeights>,
) -> DissimilarityMap
where
    F: Fn(&[CharacterState], &[CharacterState], i64, Option<&PriorWeights>) -> f64,
{
    let samples = matrix.sample_names();
    let mut map = DissimilarityMap::with_samples(samples.clone(), 0.0);
    for (i, a) in samples.iter().enumerate() {
        for b in samples.iter().skip(i + 1) {
            let d = scorer(
                matrix.row(a).unwrap_or(&[]),
                matrix.row(b).unwrap_or(&[]),
                missing_indicator,
                weights,
            );
            map.set(a, b, d);
        }
    }
    map
}

/// A symmetric sample-by-sample dissimilarity table.
///
/// Rows and columns stay synchronized with the tree's leaf set: samples that
/// appear after the map was built default to infinite dissimilarity against
/// everything until recomputed.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DissimilarityMap {
    samples: Vec<String>,
    index: HashMap<String, usize>,
    values: Vec<Vec<f64>>,
}

impl DissimilarityMap {
    /// A map over `samples` with every off-diagonal entry set to `fill`.
    pub fn with_samples(samples: Vec<String>, fill: f64) -> Self {
        let n = samples.len();
        let index = samples
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i))
            .collect();
        let mut values = vec![vec![fill; n]; n];
        for (i, row) in values.iter_mut().enumerate() {
            row[i] = 0.0;
        }
        Self {
            samples,
            index,
            values,
        }
    }

    /// Build from an explicit square table.
    ///
    /// # Errors
    /// Fails if `values` is not `samples × samples`-shaped or a sample name
    /// repeats.
    pub fn from_square(
        samples: Vec<String>,
        values: Vec<Vec<f64>>,
    ) -> Result<Self, LineageTreeError> {
        let n = samples.len();
        if values.len() != n || values.iter().any(|row| row.len() != n) {
            return Err(LineageTreeError::SampleSetMismatch(format!(
                "dissimilarity table must be {n}x{n}"
            )));
        }
        let mut index = HashMap::with_capacity(n);
        for (i, s) in samples.iter().enumerate() {
            if index.insert(s.clone(), i).is_some() {
                return Err(LineageTreeError::DuplicateMatrixRow(s.clone()));
            }
        }
        Ok(Self {
            samples,
            index,
            values,
        })
    }

    /// Sample names in table order.
    pub fn samples(&self) -> Vec<String> {
        self.samples.clone()
    }

    /// True iff `sample` has a row.
    #[inline]
    pub fn contains(&self, sample: &str) -> bool {
        self.index.contains_key(sample)
    }

    /// Dissimilarity between two samples, if both are present.
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let (&i, &j) = (self.index.get(a)?, self.index.get(b)?);
        Some(self.values[i][j])
    }

    /// Set the dissimilarity of an unordered pair (both directions).
    pub fn set(&mut self, a: &str, b: &str, value: f64) {
        if let (Some(&i), Some(&j)) = (self.index.get(a), self.index.get(b)) {
            self.values[i][j] = value;
            self.values[j][i] = value;
        }
    }

    /// Append a sample with infinite dissimilarity to every existing sample.
    pub fn add_sample(&mut self, sample: impl Into<String>) {
        let sample = sample.into();
        if self.index.contains_key(&sample) {
            return;
        }
        let n = self.samples.len();
        for row in &mut self.values {
            row.push(f64::INFINITY);
        }
        let mut new_row = vec![f64::INFINITY; n + 1];
        new_row[n] = 0.0;
        self.values.push(new_row);
        self.index.insert(sample.clone(), n);
        self.samples.push(sample);
    }

    /// Drop a sample's row and column, if present.
    pub fn drop_sample(&mut self, sample: &str) {
        let Some(&i) = self.index.get(sample) else {
            return;
        };
        self.samples.remove(i);
        self.values.remove(i);
        for row in &mut self.values {
            row.remove(i);
        }
        self.index.clear();
        for (k, s) in self.samples.iter().enumerate() {
            self.index.insert(s.clone(), k);
        }
    }
}
