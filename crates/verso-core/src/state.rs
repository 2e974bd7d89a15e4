//! # Run-scoped State Store
//!
//! Shared scratch state for a single run: an artifact map addressed by
//! semantic [`StateKey`] plus a free-form metadata namespace. The store does
//! no type enforcement; callers own the key/value contracts. Typed reads are
//! offered through [`StateStore::get_as`] for convenience.
//!
//! Keys are never removed individually. Clearing a key overwrites it with
//! JSON `null`, and a key counts as present only when it holds a non-null
//! value. [`StateStore::clear`] is the only full reset.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Semantic keys understood by the lyrics and melody workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StateKey {
    InitialInput,
    CreativeBrief,
    SongStructure,
    MelodyStructure,
    Evaluation,
    IterationCount,
    UserFeedback,
    Tempo,
    Key,
    TimeSignature,
    Emotion,
    Mood,
}

impl StateKey {
    /// The camelCase name used in snapshots and traces.
    pub fn as_str(&self) -> &'static str {
        match self {
            StateKey::InitialInput => "initialInput",
            StateKey::CreativeBrief => "creativeBrief",
            StateKey::SongStructure => "songStructure",
            StateKey::MelodyStructure => "melodyStructure",
            StateKey::Evaluation => "evaluation",
            StateKey::IterationCount => "iterationCount",
            StateKey::UserFeedback => "userFeedback",
            StateKey::Tempo => "tempo",
            StateKey::Key => "key",
            StateKey::TimeSignature => "timeSignature",
            StateKey::Emotion => "emotion",
            StateKey::Mood => "mood",
        }
    }
}

impl std::fmt::Display for StateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stored value did not match the shape the reader expected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("State key '{key}' holds an unexpected value: {message}")]
pub struct StateError {
    pub key: StateKey,
    pub message: String,
}

/// Defensive copy of a store's contents, keyed by the camelCase key names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub artifacts: BTreeMap<String, Value>,
    pub metadata: BTreeMap<String, Value>,
}

impl StateSnapshot {
    /// Look up an artifact by key, treating `null` as absent.
    pub fn artifact(&self, key: StateKey) -> Option<&Value> {
        self.artifacts.get(key.as_str()).filter(|v| !v.is_null())
    }
}

/// Run-scoped artifact and metadata maps.
#[derive(Debug, Clone, Default)]
pub struct StateStore {
    artifacts: HashMap<StateKey, Value>,
    metadata: HashMap<String, Value>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value, treating cleared (`null`) entries as absent.
    pub fn get(&self, key: StateKey) -> Option<&Value> {
        self.artifacts.get(&key).filter(|v| !v.is_null())
    }

    /// Deserialize a value into `T`.
    ///
    /// Returns `Ok(None)` when the key is absent or cleared and an error when
    /// the stored value does not have the expected shape.
    pub fn get_as<T: DeserializeOwned>(&self, key: StateKey) -> Result<Option<T>, StateError> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| StateError {
                    key,
                    message: e.to_string(),
                }),
        }
    }

    /// Whether the key holds a non-null value.
    pub fn contains(&self, key: StateKey) -> bool {
        self.get(key).is_some()
    }

    pub fn set(&mut self, key: StateKey, value: impl Into<Value>) {
        self.artifacts.insert(key, value.into());
    }

    /// Overwrite a key with `null` so readers see it as absent.
    pub fn clear_key(&mut self, key: StateKey) {
        if self.artifacts.contains_key(&key) {
            self.artifacts.insert(key, Value::Null);
        }
    }

    /// Current improvement-cycle counter, zero when never written.
    ///
    /// A counter that is not a `u32` (e.g. from a hand-edited resumed state)
    /// is an error rather than a reset budget.
    pub fn iteration_count(&self) -> Result<u32, StateError> {
        Ok(self.get_as::<u32>(StateKey::IterationCount)?.unwrap_or(0))
    }

    /// Increment the improvement-cycle counter by exactly one.
    pub fn increment_iteration(&mut self) -> Result<u32, StateError> {
        let next = self.iteration_count()?.saturating_add(1);
        self.set(StateKey::IterationCount, next);
        Ok(next)
    }

    /// Defensive copy of both namespaces.
    pub fn get_all(&self) -> StateSnapshot {
        StateSnapshot {
            artifacts: self
                .artifacts
                .iter()
                .map(|(k, v)| (k.as_str().to_string(), v.clone()))
                .collect(),
            metadata: self
                .metadata
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    /// Reset both maps to empty.
    pub fn clear(&mut self) {
        self.artifacts.clear();
        self.metadata.clear();
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn get_metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    pub fn get_all_metadata(&self) -> BTreeMap<String, Value> {
        self.metadata
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
