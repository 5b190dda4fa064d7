//! Change tracking for named resources
//!
//! Consumers record a content hash per resource; the resource turns dirty
//! when the hash moves or members were added or removed, and stays dirty
//! until explicitly reset.

use forgeport_core::types::ResourceSignatureState;
use forgeport_core::{Registry, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureState {
    Clean,
    Dirty,
}

impl fmt::Display for SignatureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureState::Clean => f.write_str("clean"),
            SignatureState::Dirty => f.write_str("dirty"),
        }
    }
}

/// sha256 over the canonical (sorted-key) JSON form of `value`
pub fn compute_signature<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let canonical = canonicalize(serde_json::to_value(value)?);
    let bytes = serde_json::to_vec(&canonical)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (key, value) in entries {
                sorted.insert(key, canonicalize(value));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

pub struct SignatureTracker<R> {
    registry: R,
}

impl<R: Registry> SignatureTracker<R> {
    pub fn new(registry: R) -> Self {
        Self { registry }
    }

    /// Record a new hash; dirtiness is sticky until [`reset_dirty`](Self::reset_dirty)
    pub async fn update_signature(
        &self,
        name: &str,
        hash: &str,
        added: usize,
        deleted: usize,
    ) -> Result<ResourceSignatureState> {
        let hash = hash.to_string();
        let state = self
            .registry
            .update_signature_state(
                name,
                Box::new(move |state| {
                    let changed = state.signature != hash || added > 0 || deleted > 0;
                    state.is_dirty = state.is_dirty || changed;
                    state.signature = hash;
                }),
            )
            .await?;
        debug!("Signature of {} updated (dirty: {})", name, state.is_dirty);
        Ok(state)
    }

    pub async fn mark_dirty(&self, name: &str) -> Result<ResourceSignatureState> {
        self.registry
            .update_signature_state(name, Box::new(|state| state.is_dirty = true))
            .await
    }

    pub async fn reset_dirty(&self, name: &str) -> Result<ResourceSignatureState> {
        self.registry
            .update_signature_state(name, Box::new(|state| state.is_dirty = false))
            .await
    }

    pub async fn state(&self, name: &str) -> Result<SignatureState> {
        let state = self
            .registry
            .signature_state(name)
            .await?
            .unwrap_or_else(|| ResourceSignatureState::new(name));
        Ok(if state.is_dirty {
            SignatureState::Dirty
        } else {
            SignatureState::Clean
        })
    }
}
