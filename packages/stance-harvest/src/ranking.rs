//! Candidate ranking against a user's weighted preferences.
//!
//! Consumes a finished table whose responses have been coded as numbers
//! (typically -1, 0, 1) and orders candidates by weighted Euclidean distance
//! to the user's own answers.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs::File;
use std::path::Path;

use crate::error::{RankingError, SourceError};

/// The user's answer to one issue and how much it matters to them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct Preference {
    pub value: f64,
    pub weight: f64,
}

impl From<(f64, f64)> for Preference {
    fn from((value, weight): (f64, f64)) -> Self {
        Self { value, weight }
    }
}

impl From<Preference> for (f64, f64) {
    fn from(p: Preference) -> Self {
        (p.value, p.weight)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCandidate {
    pub name: String,
    pub distance: f64,
}

/// `sqrt(Σ wᵢ·(cᵢ − uᵢ)²)`
pub fn weighted_distance(responses: &[f64], preferences: &[Preference]) -> f64 {
    responses
        .iter()
        .zip(preferences)
        .map(|(c, p)| p.weight * (c - p.value).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// The `k` candidates closest to `preferences`, nearest first. Ties are
/// broken by name.
pub fn rank_candidates(
    table: impl AsRef<Path>,
    preferences: &[Preference],
    k: usize,
) -> Result<Vec<RankedCandidate>, RankingError> {
    let path = table.as_ref();
    let file = File::open(path).map_err(|source| SourceError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::Reader::from_reader(file);

    let malformed = |source| SourceError::Malformed {
        path: path.to_path_buf(),
        source,
    };
    let headers = reader.headers().map_err(malformed)?.clone();
    if headers.is_empty() {
        return Err(SourceError::MissingHeader {
            path: path.to_path_buf(),
        }
        .into());
    }

    let columns: Vec<&str> = headers.iter().skip(1).collect();
    if columns.len() != preferences.len() {
        return Err(RankingError::Shape {
            expected: columns.len(),
            actual: preferences.len(),
        });
    }

    let mut ranked = Vec::new();
    for record in reader.records() {
        let record = record.map_err(malformed)?;
        let name = record.get(0).unwrap_or_default().to_string();

        let responses = columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                let value = record.get(i + 1).unwrap_or_default().trim();
                value.parse::<f64>().map_err(|_| RankingError::NotNumeric {
                    name: name.clone(),
                    column: column.to_string(),
                    value: value.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        ranked.push(RankedCandidate {
            distance: weighted_distance(&responses, preferences),
            name,
        });
    }

    ranked.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
    ranked.truncate(k);
    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stances.csv");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    fn prefs(pairs: &[(f64, f64)]) -> Vec<Preference> {
        pairs.iter().copied().map(Preference::from).collect()
    }

    #[test]
    fn test_weighted_distance() {
        let d = weighted_distance(&[1.0, -1.0], &prefs(&[(0.0, 4.0), (-1.0, 1.0)]));
        assert!((d - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_ranks_nearest_first_then_by_name() {
        let (_dir, path) = table("name,Guns,Tax\nZed,1,1\nAmy,1,1\nBob,-1,-1\nCal,0,1\n");

        let ranked = rank_candidates(&path, &prefs(&[(1.0, 1.0), (1.0, 1.0)]), 3).unwrap();

        let names: Vec<_> = ranked.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Amy", "Zed", "Cal"]);
        assert_eq!(ranked[0].distance, 0.0);
        assert!((ranked[2].distance - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_shape_mismatch() {
        let (_dir, path) = table("name,Guns,Tax\nAmy,1,1\n");

        let err = rank_candidates(&path, &prefs(&[(1.0, 1.0)]), 1).unwrap_err();

        assert!(matches!(err, RankingError::Shape { expected: 2, actual: 1 }));
    }

    #[test]
    fn test_sentinel_cells_are_not_numeric() {
        let (_dir, path) = table("name,Tax\nAmy,Couldn't fetch response\n");

        let err = rank_candidates(&path, &prefs(&[(1.0, 1.0)]), 1).unwrap_err();

        match err {
            RankingError::NotNumeric { name, column, .. } => {
                assert_eq!(name, "Amy");
                assert_eq!(column, "Tax");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_preferences_deserialize_from_pairs() {
        let parsed: Vec<Preference> = serde_json::from_str("[[0.5, 1.2], [-0.2, 0.8]]").unwrap();

        assert_eq!(parsed, prefs(&[(0.5, 1.2), (-0.2, 0.8)]));
    }
}
