//! The external augmentation contract.
//!
//! Augmentation is a strategy interface over an external collaborator that
//! may propose better translations for edge-case-tagged snippets. It is
//! strictly additive: every failure mode collapses to "no augmentation"
//! and the deterministic pipeline result stands on its own. The whole
//! suite passes with [`NoAugmentation`] installed.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

use cobalt_transpile::EdgeCaseCategory;

/// What the collaborator gets alongside the raw snippet text.
#[derive(Debug, Clone)]
pub struct SnippetContext {
    /// The edge-case category that triggered the submission.
    pub kind: EdgeCaseCategory,
    /// Names of the data items the snippet touches.
    pub symbols: Vec<String>,
    /// Time budget the implementation must honor for this call.
    pub timeout: Duration,
}

/// A proposed replacement for an edge-case snippet.
#[derive(Debug, Clone, PartialEq)]
pub struct AugmentationHint {
    /// Replacement source in the target language.
    pub replacement: String,
    /// The collaborator's own confidence in the proposal, in `[0, 1]`.
    pub confidence: f64,
}

impl AugmentationHint {
    /// A hint is usable only when it carries text and a sane confidence.
    pub fn is_well_formed(&self) -> bool {
        !self.replacement.trim().is_empty() && (0.0..=1.0).contains(&self.confidence)
    }
}

/// Why a submission produced no hint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AugmentationError {
    /// No collaborator is configured or reachable.
    #[error("augmentation service unavailable")]
    Unavailable,
    /// The call exceeded its time budget.
    #[error("augmentation call timed out")]
    Timeout,
    /// The collaborator answered with something unusable.
    #[error("augmentation response was malformed: {0}")]
    InvalidResponse(String),
}

/// The contract an external augmentation collaborator implements.
///
/// Implementations must enforce the `timeout` carried in the context and
/// return [`AugmentationError::Timeout`] rather than block past it.
pub trait Augmentation: Sync {
    fn submit(
        &self,
        snippet: &str,
        context: &SnippetContext,
    ) -> Result<AugmentationHint, AugmentationError>;
}

/// The default collaborator: none at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAugmentation;

impl Augmentation for NoAugmentation {
    fn submit(
        &self,
        _snippet: &str,
        _context: &SnippetContext,
    ) -> Result<AugmentationHint, AugmentationError> {
        Err(AugmentationError::Unavailable)
    }
}

struct CachedHint {
    hint: AugmentationHint,
    stored_at: Instant,
}

/// Shared response cache, keyed by SHA-256 of the submitted snippet.
///
/// This is the only mutable state workers share; the mutex covers simple
/// map operations and is never held across an augmentation call.
pub struct HintCache {
    ttl: Duration,
    entries: Mutex<HashMap<[u8; 32], CachedHint>>,
}

impl HintCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn key(snippet: &str) -> [u8; 32] {
        Sha256::digest(snippet.as_bytes()).into()
    }

    /// Look up a cached hint, evicting it if its TTL has passed.
    pub fn get(&self, snippet: &str) -> Option<AugmentationHint> {
        let key = Self::key(snippet);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(&key) {
            Some(cached) if cached.stored_at.elapsed() <= self.ttl => Some(cached.hint.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, snippet: &str, hint: AugmentationHint) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            Self::key(snippet),
            CachedHint {
                hint,
                stored_at: Instant::now(),
            },
        );
    }
}

/// Submit a snippet, retrying with exponential backoff.
///
/// Timeouts and malformed responses are retried up to `attempts` times
/// with the delay doubling between attempts; [`AugmentationError::Unavailable`]
/// short-circuits since an absent service will not appear between retries.
/// Every failure path returns `None`, which downstream code treats exactly
/// like a run with no augmentation configured.
pub fn submit_with_retry(
    augmentation: &dyn Augmentation,
    cache: &HintCache,
    snippet: &str,
    context: &SnippetContext,
    attempts: u32,
    base_delay: Duration,
) -> Option<AugmentationHint> {
    if let Some(hit) = cache.get(snippet) {
        return Some(hit);
    }

    let mut delay = base_delay;
    for attempt in 1..=attempts.max(1) {
        match augmentation.submit(snippet, context) {
            Ok(hint) if hint.is_well_formed() => {
                cache.insert(snippet, hint.clone());
                return Some(hint);
            }
            Ok(_) => {
                tracing::debug!(attempt, kind = ?context.kind, "discarding malformed hint");
            }
            Err(AugmentationError::Unavailable) => {
                tracing::debug!(kind = ?context.kind, "augmentation unavailable");
                return None;
            }
            Err(err) => {
                tracing::debug!(attempt, kind = ?context.kind, %err, "augmentation attempt failed");
            }
        }
        if attempt < attempts {
            std::thread::sleep(delay);
            delay *= 2;
        }
    }
    None
}
