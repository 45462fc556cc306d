//! Character matrix: sample-indexed table of character-state vectors.
//!
//! The tree keeps two snapshots of this table: an `original` matrix frozen at
//! ingestion and a `current` matrix that tracks per-leaf state edits and is
//! row-synchronized with the live leaf set after every topology mutation.
//!
//! Rows are kept in insertion order so listings and serialization are
//! deterministic.

use std::collections::HashMap;

use crate::data::state::{CharacterState, states_from_raw};
use crate::tree_error::LineageTreeError;

/// A named-row table of character states with a fixed column count.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CharacterMatrix {
    n_characters: usize,
    rows: HashMap<String, Vec<CharacterState>>,
    /// Insertion order of row names, for deterministic iteration.
    order: Vec<String>,
}

impl CharacterMatrix {
    /// An empty matrix with a fixed character count.
    pub fn new(n_characters: usize) -> Self {
        Self {
            n_characters,
            rows: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Build a matrix from `(sample, states)` rows.
    ///
    /// # Errors
    /// Fails on duplicated sample names or rows of unequal length.
    pub fn from_rows<I, S>(rows: I) -> Result<Self, LineageTreeError>
    where
        I: IntoIterator<Item = (S, Vec<CharacterState>)>,
        S: Into<String>,
    {
        let mut matrix: Option<CharacterMatrix> = None;
        for (name, states) in rows {
            let m = matrix.get_or_insert_with(|| CharacterMatrix::new(states.len()));
            let name = name.into();
            if m.rows.contains_key(&name) {
                return Err(LineageTreeError::DuplicateMatrixRow(name));
            }
            m.insert_row(name, states)?;
        }
        Ok(matrix.unwrap_or_else(|| CharacterMatrix::new(0)))
    }

    /// Build a matrix from raw integer rows, decoding against the missing
    /// sentinel.
    pub fn from_raw_rows<I, S>(
        rows: I,
        missing_indicator: i64,
    ) -> Result<Self, LineageTreeError>
    where
        I: IntoIterator<Item = (S, Vec<i64>)>,
        S: Into<String>,
    {
        Self::from_rows(
            rows.into_iter()
                .map(|(name, raw)| (name, states_from_raw(&raw, missing_indicator))),
        )
    }

    /// Number of character columns.
    #[inline]
    pub fn n_characters(&self) -> usize {
        self.n_characters
    }

    /// Number of sample rows.
    #[inline]
    pub fn n_samples(&self) -> usize {
        self.order.len()
    }

    /// Whether the matrix has zero rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Row names in insertion order.
    pub fn sample_names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// True iff `sample` has a row.
    #[inline]
    pub fn contains(&self, sample: &str) -> bool {
        self.rows.contains_key(sample)
    }

    /// Borrow the state vector of `sample`, if present.
    pub fn row(&self, sample: &str) -> Option<&[CharacterState]> {
        self.rows.get(sample).map(Vec::as_slice)
    }

    /// Insert or replace the row of `sample`.
    ///
    /// # Errors
    /// Fails if `states` does not match the matrix's character count.
    pub fn set_row(
        &mut self,
        sample: impl Into<String>,
        states: Vec<CharacterState>,
    ) -> Result<(), LineageTreeError> {
        let sample = sample.into();
        if self.rows.contains_key(&sample) {
            self.check_width(&states)?;
            self.rows.insert(sample, states);
            Ok(())
        } else {
            self.insert_row(sample, states)
        }
    }

    /// Remove the row of `sample`, if present.
    pub fn drop_row(&mut self, sample: &str) {
        if self.rows.remove(sample).is_some() {
            self.order.retain(|name| name.as_str() != sample);
        }
    }

    /// True iff any entry anywhere in the matrix is ambiguous.
    pub fn has_ambiguous(&self) -> bool {
        self.rows
            .values()
            .any(|states| states.iter().any(CharacterState::is_ambiguous))
    }

    /// Iterate `(sample, states)` in insertion order.
    pub fn iter_rows(&self) -> impl Iterator<Item = (&str, &[CharacterState])> {
        self.order
            .iter()
            .map(move |name| (name.as_str(), self.rows[name].as_slice()))
    }

    fn insert_row(
        &mut self,
        sample: String,
        states: Vec<CharacterState>,
    ) -> Result<(), LineageTreeError> {
        self.check_width(&states)?;
        self.order.push(sample.clone());
        self.rows.insert(sample, states);
        Ok(())
    }

    fn check_width(&self, states: &[CharacterState]) -> Result<(), LineageTreeError> {
        if states.len() != self.n_characters {
            return Err(LineageTreeError::CharacterVectorLength {
                expected: self.n_characters,
                found: states.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix() -> CharacterMatrix {
        CharacterMatrix::from_raw_rows(
            [
                ("a", vec![1, 0, 2]),
                ("b", vec![1, -1, 2]),
                ("c", vec![0, 0, 0]),
            ],
            -1,
        )
        .unwrap()
    }

    #[test]
    fn raw_rows_decode_sentinel() {
        let m = matrix();
        assert_eq!(m.n_characters(), 3);
        assert_eq!(m.n_samples(), 3);
        assert_eq!(m.row("b").unwrap()[1], CharacterState::Missing);
    }

    #[test]
    fn duplicate_rows_rejected() {
        let err = CharacterMatrix::from_raw_rows(
            [("a", vec![1]), ("a", vec![2])],
            -1,
        )
        .unwrap_err();
        assert!(matches!(err, LineageTreeError::DuplicateMatrixRow(_)));
    }

    #[test]
    fn width_mismatch_rejected() {
        let mut m = matrix();
        let err = m
            .set_row("a", vec![CharacterState::Scalar(1)])
            .unwrap_err();
        assert!(matches!(
            err,
            LineageTreeError::CharacterVectorLength {
                expected: 3,
                found: 1
            }
        ));
    }

    #[test]
    fn drop_row_keeps_order() {
        let mut m = matrix();
        m.drop_row("b");
        assert_eq!(m.sample_names(), vec!["a", "c"]);
        assert!(!m.contains("b"));
    }

    #[test]
    fn ambiguity_detection() {
        let mut m = matrix();
        assert!(!m.has_ambiguous());
        m.set_row(
            "a",
            vec![
                CharacterState::Ambiguous(vec![1, 2]),
                CharacterState::Scalar(0),
                CharacterState::Scalar(2),
            ],
        )
        .unwrap();
        assert!(m.has_ambiguous());
    }
}
