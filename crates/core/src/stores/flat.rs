//! Exact L2 index over fixed-dimension vectors, paired row-for-row with chunk texts.
//!
//! A saved index is a directory holding two artifacts that are only valid together:
//! `index.bin` (dimension and row-major vector data) and `chunks.json`.

use crate::models::{RetrievedChunk, Score};
use crate::StoreError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

pub const INDEX_FILE: &str = "index.bin";
pub const CHUNKS_FILE: &str = "chunks.json";

#[derive(Serialize, Deserialize)]
struct IndexArtifact {
    dimension: usize,
    vectors: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    vectors: Vec<f32>,
    chunks: Vec<String>,
}

impl FlatIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
            chunks: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    pub fn add(&mut self, vectors: &[Vec<f32>], chunks: &[String]) -> Result<(), StoreError> {
        if vectors.len() != chunks.len() {
            return Err(StoreError::LengthMismatch {
                vectors: vectors.len(),
                chunks: chunks.len(),
            });
        }
        if let Some(bad) = vectors.iter().find(|vector| vector.len() != self.dimension) {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.len(),
            });
        }

        self.vectors.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            self.vectors.extend_from_slice(vector);
        }
        self.chunks.extend_from_slice(chunks);
        Ok(())
    }

    /// The `k` nearest rows by squared Euclidean distance, ascending, earlier rows first on ties.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievedChunk>, StoreError> {
        if query.len() != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .rows()
            .enumerate()
            .map(|(position, row)| (position, squared_l2(row, query)))
            .filter(|(_, distance)| distance.is_finite())
            .collect();

        scored.sort_by(|left, right| match left.1.total_cmp(&right.1) {
            Ordering::Equal => left.0.cmp(&right.0),
            other => other,
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(position, distance)| RetrievedChunk {
                text: self.chunks[position].clone(),
                score: Score::Distance(distance),
            })
            .collect())
    }

    /// Writes both artifacts to a sibling temp directory, then renames it into place.
    ///
    /// Never writes over an existing `dir`: if one is already there the temp
    /// directory is discarded and [`StoreError::AlreadyPersisted`] is returned.
    pub fn save(&self, dir: &Path) -> Result<(), StoreError> {
        if dir.exists() {
            return Err(StoreError::AlreadyPersisted(dir.to_path_buf()));
        }

        let staging = staging_dir(dir);
        if let Some(parent) = staging.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::create_dir(&staging)?;

        let written = self.write_artifacts(&staging).and_then(|()| {
            fs::rename(&staging, dir).map_err(|error| {
                if dir.exists() {
                    StoreError::AlreadyPersisted(dir.to_path_buf())
                } else {
                    StoreError::Io(error)
                }
            })
        });

        if written.is_err() {
            let _ = fs::remove_dir_all(&staging);
        }
        written
    }

    pub fn load(dir: &Path) -> Result<Self, StoreError> {
        let corrupt = |details: String| StoreError::CorruptIndex {
            path: dir.to_path_buf(),
            details,
        };

        let index_bytes = fs::read(dir.join(INDEX_FILE))
            .map_err(|error| corrupt(format!("{INDEX_FILE}: {error}")))?;
        let chunk_bytes = fs::read(dir.join(CHUNKS_FILE))
            .map_err(|error| corrupt(format!("{CHUNKS_FILE}: {error}")))?;

        let artifact: IndexArtifact = bincode::deserialize(&index_bytes)
            .map_err(|error| corrupt(format!("{INDEX_FILE}: {error}")))?;
        let chunks: Vec<String> = serde_json::from_slice(&chunk_bytes)
            .map_err(|error| corrupt(format!("{CHUNKS_FILE}: {error}")))?;

        if artifact.dimension == 0 || artifact.vectors.len() % artifact.dimension != 0 {
            return Err(corrupt(format!(
                "{} values do not form rows of dimension {}",
                artifact.vectors.len(),
                artifact.dimension
            )));
        }
        let rows = artifact.vectors.len() / artifact.dimension;
        if rows != chunks.len() {
            return Err(corrupt(format!(
                "{rows} vectors but {} chunks",
                chunks.len()
            )));
        }

        Ok(Self {
            dimension: artifact.dimension,
            vectors: artifact.vectors,
            chunks,
        })
    }

    fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.vectors.chunks_exact(self.dimension.max(1))
    }

    fn write_artifacts(&self, dir: &Path) -> Result<(), StoreError> {
        let artifact = IndexArtifact {
            dimension: self.dimension,
            vectors: self.vectors.clone(),
        };
        fs::write(dir.join(INDEX_FILE), bincode::serialize(&artifact)?)?;
        fs::write(dir.join(CHUNKS_FILE), serde_json::to_vec(&self.chunks)?)?;
        Ok(())
    }
}

fn squared_l2(row: &[f32], query: &[f32]) -> f32 {
    row.iter()
        .zip(query)
        .map(|(left, right)| {
            let delta = left - right;
            delta * delta
        })
        .sum()
}

fn staging_dir(dir: &Path) -> PathBuf {
    let name = dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    dir.with_file_name(format!(".{name}.tmp-{}", uuid::Uuid::new_v4()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn chunks(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    fn sample_index() -> FlatIndex {
        let mut index = FlatIndex::new(2);
        index
            .add(
                &[vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 3.0]],
                &chunks(&["origin", "east", "north"]),
            )
            .unwrap();
        index
    }

    #[test]
    fn add_keeps_vectors_and_chunks_aligned() {
        let index = sample_index();
        assert_eq!(index.len(), 3);
        assert_eq!(index.rows().count(), index.chunks().len());
    }

    #[test]
    fn add_rejects_mismatched_input_without_mutating() {
        let mut index = sample_index();

        let error = index.add(&[vec![1.0, 1.0]], &chunks(&["a", "b"])).unwrap_err();
        assert!(matches!(error, StoreError::LengthMismatch { vectors: 1, chunks: 2 }));

        let error = index
            .add(&[vec![1.0, 1.0], vec![1.0]], &chunks(&["a", "b"]))
            .unwrap_err();
        assert!(matches!(error, StoreError::DimensionMismatch { expected: 2, actual: 1 }));

        assert_eq!(index.len(), 3);
        assert_eq!(index.vectors.len(), 6);
    }

    #[test]
    fn search_ranks_by_ascending_squared_distance() {
        let results = sample_index().search(&[0.9, 0.0], 3).unwrap();
        let texts: Vec<_> = results.iter().map(|hit| hit.text.as_str()).collect();
        assert_eq!(texts, vec!["east", "origin", "north"]);

        match results[0].score {
            Score::Distance(distance) => assert!((distance - 0.01).abs() < 1e-6),
            other => panic!("unexpected score {other:?}"),
        }
    }

    #[test]
    fn search_with_large_k_returns_every_row() {
        let results = sample_index().search(&[0.0, 0.0], 10).unwrap();
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn identical_vectors_come_back_in_insertion_order() {
        let mut index = FlatIndex::new(2);
        index
            .add(&[vec![0.6, 0.8], vec![0.6, 0.8]], &chunks(&["first", "second"]))
            .unwrap();

        let results = index.search(&[0.6, 0.8], 2).unwrap();
        let texts: Vec<_> = results.iter().map(|hit| hit.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[test]
    fn empty_index_searches_to_nothing() {
        let index = FlatIndex::new(4);
        assert!(index.search(&[0.0; 4], 5).unwrap().is_empty());
    }

    #[test]
    fn query_dimension_is_checked() {
        assert!(sample_index().search(&[0.0, 0.0, 0.0], 1).is_err());
    }

    #[test]
    fn non_finite_rows_are_skipped() {
        let mut index = FlatIndex::new(1);
        index
            .add(&[vec![f32::NAN], vec![2.0]], &chunks(&["broken", "fine"]))
            .unwrap();

        let results = index.search(&[0.0], 5).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "fine");
    }

    #[test]
    fn save_then_load_round_trips() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let target = dir.path().join("doc");
        let index = sample_index();

        index.save(&target)?;
        let loaded = FlatIndex::load(&target)?;

        assert_eq!(loaded, index);
        assert!(target.join(INDEX_FILE).is_file());
        assert!(target.join(CHUNKS_FILE).is_file());
        Ok(())
    }

    #[test]
    fn save_leaves_no_staging_directory() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        sample_index().save(&dir.path().join("doc"))?;

        let names: Vec<_> = fs::read_dir(dir.path())?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["doc".to_string()]);
        Ok(())
    }

    #[test]
    fn save_refuses_to_overwrite() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let target = dir.path().join("doc");
        sample_index().save(&target)?;

        let mut other = FlatIndex::new(2);
        other.add(&[vec![5.0, 5.0]], &chunks(&["other"]))?;
        let error = other.save(&target).unwrap_err();

        assert!(matches!(error, StoreError::AlreadyPersisted(_)));
        assert_eq!(FlatIndex::load(&target)?, sample_index());
        Ok(())
    }

    #[test]
    fn load_requires_both_artifacts() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let target = dir.path().join("doc");
        sample_index().save(&target)?;
        fs::remove_file(target.join(CHUNKS_FILE))?;

        let error = FlatIndex::load(&target).unwrap_err();
        assert!(matches!(error, StoreError::CorruptIndex { .. }));

        let empty = dir.path().join("empty");
        fs::create_dir(&empty)?;
        assert!(matches!(
            FlatIndex::load(&empty),
            Err(StoreError::CorruptIndex { .. })
        ));
        Ok(())
    }

    #[test]
    fn load_rejects_misaligned_artifacts() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let target = dir.path().join("doc");
        sample_index().save(&target)?;
        fs::write(target.join(CHUNKS_FILE), serde_json::to_vec(&chunks(&["only one"]))?)?;

        assert!(matches!(
            FlatIndex::load(&target),
            Err(StoreError::CorruptIndex { .. })
        ));
        Ok(())
    }
}
