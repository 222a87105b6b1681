//! Asset generation collaborators: the cancellation token shared with the
//! worker context, the content-addressed generation cache, and the
//! `AssetGenerator` contract the job coordinator consumes.

pub mod ply;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::debug;

pub use ply::{MeshData, box_mesh, to_ascii_ply};

/// Cooperative cancellation signal for one generation epoch.
///
/// Cloneable and poll-only: `cancel` never blocks, and a worker that does
/// not poll simply runs to completion before its result is discarded.
/// One token belongs to exactly one job; tokens are never reused.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks this epoch as superseded. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Where a generated asset landed: the cache file on disk plus the name
/// the asset route serves it under.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetLocator {
    pub file_name: String,
    pub path: PathBuf,
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("asset cache io: {0}")]
    Io(#[from] std::io::Error),
    #[error("synthesis failed: {0}")]
    Synthesis(String),
}

/// A possibly slow, blocking computation that turns a prompt into an
/// asset. `Ok(None)` means the token was observed cancelled; it is not an
/// error. Implementations must poll the token at least before starting
/// expensive work and before committing output.
pub trait AssetGenerator: Send + Sync {
    fn generate(
        &self,
        prompt: &str,
        token: &CancelToken,
    ) -> Result<Option<AssetLocator>, GenerateError>;
}

/// The blocking synthesis step itself, which may take minutes. External
/// to the hub core; [`PlaceholderSynthesizer`] stands in for the real
/// text-to-3D pipeline.
pub trait MeshSynthesizer: Send + Sync {
    fn synthesize(&self, prompt: &str) -> Result<MeshData, GenerateError>;
}

/// Content-address of a prompt: lowercased, non-alphanumeric characters
/// replaced with `_`, truncated to 60 characters.
pub fn normalize_prompt(prompt: &str) -> String {
    prompt
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .take(60)
        .collect()
}

/// Cache shell around a [`MeshSynthesizer`]: identical prompts are served
/// from disk without re-running synthesis, and the cancellation token is
/// checked before synthesis starts and again before the result is
/// committed.
pub struct CachedGenerator<S> {
    cache_dir: PathBuf,
    synthesizer: S,
}

impl<S> CachedGenerator<S> {
    pub fn new(cache_dir: impl Into<PathBuf>, synthesizer: S) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            synthesizer,
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}

impl<S: MeshSynthesizer> AssetGenerator for CachedGenerator<S> {
    fn generate(
        &self,
        prompt: &str,
        token: &CancelToken,
    ) -> Result<Option<AssetLocator>, GenerateError> {
        fs::create_dir_all(&self.cache_dir)?;
        let file_name = format!("{}.ply", normalize_prompt(prompt));
        let path = self.cache_dir.join(&file_name);

        if path.exists() {
            debug!(prompt, file = %file_name, "generation cache hit");
            return Ok(Some(AssetLocator { file_name, path }));
        }

        if token.is_cancelled() {
            return Ok(None);
        }

        let mesh = self.synthesizer.synthesize(prompt)?;

        if token.is_cancelled() {
            return Ok(None);
        }

        fs::write(&path, to_ascii_ply(&mesh))?;
        Ok(Some(AssetLocator { file_name, path }))
    }
}

/// Deterministic stand-in for the real synthesis algorithm: a small box
/// so the full generate-cache-serve path can run end to end.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderSynthesizer;

impl MeshSynthesizer for PlaceholderSynthesizer {
    fn synthesize(&self, _prompt: &str) -> Result<MeshData, GenerateError> {
        Ok(box_mesh([0.5, 0.5, 0.5]))
    }
}
