//! Character states: the per-site observation type shared by all nodes.
//!
//! A state at one cut site is either a concrete integer indel outcome, a
//! missing observation, or an unresolved bag of candidate outcomes. Modeling
//! the three cases as one tagged variant lets the character matrix hold mixed
//! scalar/ambiguous entries without any runtime value-widening step.

use std::fmt;

/// One character position of one node.
///
/// `Ambiguous` carries a multiset: duplicated candidates encode the relative
/// abundance of a state in the ambiguous distribution and are only removed by
/// [`CharacterState::collapse`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum CharacterState {
    /// Site was not observed.
    Missing,
    /// A single resolved indel outcome (`0` is the uncut/ancestral state).
    Scalar(i64),
    /// Multiple candidate outcomes, not yet resolved to one.
    Ambiguous(Vec<i64>),
}

impl CharacterState {
    /// Decode a raw integer against the missing sentinel.
    pub fn from_raw(raw: i64, missing_indicator: i64) -> Self {
        if raw == missing_indicator {
            CharacterState::Missing
        } else {
            CharacterState::Scalar(raw)
        }
    }

    /// Encode back to a raw integer; `Missing` maps to the sentinel.
    ///
    /// Returns `None` for ambiguous states, which have no scalar encoding.
    pub fn to_raw(&self, missing_indicator: i64) -> Option<i64> {
        match self {
            CharacterState::Missing => Some(missing_indicator),
            CharacterState::Scalar(s) => Some(*s),
            CharacterState::Ambiguous(_) => None,
        }
    }

    /// True iff this entry is an unresolved multi-state value.
    #[inline]
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, CharacterState::Ambiguous(_))
    }

    /// True iff this entry is the missing-state indicator.
    #[inline]
    pub fn is_missing(&self) -> bool {
        matches!(self, CharacterState::Missing)
    }

    /// Candidate outcomes of this entry: one value for scalars, the whole bag
    /// for ambiguous entries, empty for missing.
    pub fn candidates(&self) -> &[i64] {
        match self {
            CharacterState::Missing => &[],
            CharacterState::Scalar(s) => std::slice::from_ref(s),
            CharacterState::Ambiguous(cands) => cands,
        }
    }

    /// Deduplicate an ambiguous bag to its distinct candidates,
    /// order-insensitively. Scalar and missing entries are returned unchanged,
    /// as is an ambiguous bag that is already duplicate-free and sorted, so
    /// applying this twice is a no-op.
    pub fn collapse(&self) -> Self {
        match self {
            CharacterState::Ambiguous(cands) => {
                let mut distinct = cands.clone();
                distinct.sort_unstable();
                distinct.dedup();
                CharacterState::Ambiguous(distinct)
            }
            other => other.clone(),
        }
    }
}

impl From<i64> for CharacterState {
    fn from(state: i64) -> Self {
        CharacterState::Scalar(state)
    }
}

impl fmt::Display for CharacterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CharacterState::Missing => write!(f, "-"),
            CharacterState::Scalar(s) => write!(f, "{s}"),
            CharacterState::Ambiguous(cands) => {
                write!(f, "(")?;
                for (i, c) in cands.iter().enumerate() {
                    if i > 0 {
                        write!(f, "|")?;
                    }
                    write!(f, "{c}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Decode a raw integer row into a state vector.
pub fn states_from_raw(raw: &[i64], missing_indicator: i64) -> Vec<CharacterState> {
    raw.iter()
        .map(|&r| CharacterState::from_raw(r, missing_indicator))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_round_trip_respects_sentinel() {
        let s = CharacterState::from_raw(-1, -1);
        assert!(s.is_missing());
        assert_eq!(s.to_raw(-1), Some(-1));
        let s = CharacterState::from_raw(4, -1);
        assert_eq!(s, CharacterState::Scalar(4));
    }

    #[test]
    fn collapse_is_idempotent() {
        let s = CharacterState::Ambiguous(vec![2, 1, 2, 2, 1]);
        let once = s.collapse();
        assert_eq!(once, CharacterState::Ambiguous(vec![1, 2]));
        assert_eq!(once.collapse(), once);
    }

    #[test]
    fn candidates_views() {
        assert_eq!(CharacterState::Missing.candidates(), &[] as &[i64]);
        assert_eq!(CharacterState::Scalar(3).candidates(), &[3]);
        assert_eq!(
            CharacterState::Ambiguous(vec![1, 2]).candidates(),
            &[1, 2]
        );
    }

    #[test]
    fn display_forms() {
        assert_eq!(CharacterState::Missing.to_string(), "-");
        assert_eq!(CharacterState::Scalar(7).to_string(), "7");
        assert_eq!(
            CharacterState::Ambiguous(vec![1, 2]).to_string(),
            "(1|2)"
        );
    }
}
