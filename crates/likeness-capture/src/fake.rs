//! Deterministic capability fakes for driving the pipeline without hardware.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::capability::{CaptureError, EmbeddingGenerator, FaceLocator, ImageSource};
use crate::frame::{FaceRegion, Frame};
use likeness_core::Embedding;

/// Emits small blank frames with increasing sequence numbers.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    next_sequence: u32,
    failure: Option<String>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A source whose every capture fails.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            next_sequence: 0,
            failure: Some(reason.into()),
        }
    }
}

impl ImageSource for ScriptedSource {
    fn capture(&mut self) -> Result<Frame, CaptureError> {
        if let Some(reason) = &self.failure {
            return Err(CaptureError::CaptureFailed(reason.clone()));
        }
        let frame = Frame::new(vec![0u8; 16], 4, 4, self.next_sequence);
        self.next_sequence += 1;
        Ok(frame)
    }
}

/// Returns scripted face lists in order, then `fallback` forever.
#[derive(Debug, Default)]
pub struct ScriptedLocator {
    script: VecDeque<Vec<FaceRegion>>,
    fallback: Vec<FaceRegion>,
}

impl ScriptedLocator {
    /// Always report the given faces.
    pub fn always(faces: Vec<FaceRegion>) -> Self {
        Self {
            script: VecDeque::new(),
            fallback: faces,
        }
    }

    /// Queue `faces` behind any already scripted calls.
    pub fn then(mut self, faces: Vec<FaceRegion>) -> Self {
        self.script.push_back(faces);
        self
    }
}

impl FaceLocator for ScriptedLocator {
    fn locate(&mut self, _frame: &Frame) -> Result<Vec<FaceRegion>, CaptureError> {
        Ok(self
            .script
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone()))
    }
}

/// Returns scripted embeddings in order, then `fallback` forever.
///
/// Counts calls through a shared counter so tests can observe how often the
/// model would have run after the generator moved into the engine.
#[derive(Debug)]
pub struct ScriptedGenerator {
    dimension: usize,
    script: VecDeque<Result<Embedding, CaptureError>>,
    fallback: Option<Embedding>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedGenerator {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            script: VecDeque::new(),
            fallback: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Produce `embedding` whenever the script is exhausted.
    pub fn always(embedding: Embedding) -> Self {
        let mut generator = Self::new(embedding.len());
        generator.fallback = Some(embedding);
        generator
    }

    pub fn then(mut self, embedding: Embedding) -> Self {
        self.script.push_back(Ok(embedding));
        self
    }

    pub fn then_fail(mut self, reason: impl Into<String>) -> Self {
        self.script
            .push_back(Err(CaptureError::EmbeddingUnavailable(reason.into())));
        self
    }

    /// Shared handle to the number of `embed` calls so far.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl EmbeddingGenerator for ScriptedGenerator {
    fn embed(&mut self, _frame: &Frame, _face: &FaceRegion) -> Result<Embedding, CaptureError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.pop_front() {
            Some(next) => next,
            None => self.fallback.clone().ok_or_else(|| {
                CaptureError::EmbeddingUnavailable("generator script exhausted".into())
            }),
        }
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
