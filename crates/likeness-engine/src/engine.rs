use std::sync::Arc;
use std::time::Instant;

use likeness_capture::{CaptureError, EmbeddingGenerator, FaceLocator, ImageSource};
use likeness_core::{CosineMatcher, EnrollmentRecord, MatchError, MatchResult, Matcher};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::config::Config;
use crate::gallery::{Gallery, GalleryError};
use crate::state::AppState;
use crate::throttle::EmbedThrottle;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),
    #[error("gallery error: {0}")]
    Gallery(#[from] GalleryError),
    #[error("match error: {0}")]
    Match(#[from] MatchError),
    #[error("no face detected")]
    NoFaceDetected,
    #[error("{0} faces detected; enrollment needs exactly one")]
    MultipleFaces(usize),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Outcome of one recognition attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Recognition {
    /// Recognition is switched off.
    Inactive,
    /// Nothing enrolled; the generator was not run.
    EmptyGallery,
    /// No face in the captured frame.
    NoFace,
    /// The face was smaller than the configured minimum.
    FaceTooSmall { width: f32, height: f32 },
    /// A face was found but the embedding interval has not elapsed.
    Throttled,
    /// The face was embedded and matched.
    Completed(MatchResult),
}

/// Snapshot of the engine's application state.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub recognition_active: bool,
    pub enrolled: usize,
    pub dimension: Option<usize>,
    pub last_result: Option<MatchResult>,
}

/// Messages sent from callers to the engine thread.
enum EngineRequest {
    Enroll {
        name: String,
        reply: oneshot::Sender<Result<EnrollmentRecord, EngineError>>,
    },
    Identify {
        reply: oneshot::Sender<Result<Recognition, EngineError>>,
    },
    SetRecognition {
        active: Option<bool>,
        reply: oneshot::Sender<bool>,
    },
    Remove {
        id: String,
        reply: oneshot::Sender<Result<bool, EngineError>>,
    },
    Clear {
        reply: oneshot::Sender<Result<usize, EngineError>>,
    },
    Status {
        reply: oneshot::Sender<StatusReport>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> EngineRequest,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Capture a frame containing exactly one face and enroll it under `name`.
    pub async fn enroll(&self, name: &str) -> Result<EnrollmentRecord, EngineError> {
        let name = name.to_string();
        self.request(|reply| EngineRequest::Enroll { name, reply }).await?
    }

    /// Capture a frame and try to identify the face in it.
    pub async fn identify(&self) -> Result<Recognition, EngineError> {
        self.request(|reply| EngineRequest::Identify { reply }).await?
    }

    /// Flip recognition on or off. Returns the new setting.
    pub async fn toggle_recognition(&self) -> Result<bool, EngineError> {
        self.request(|reply| EngineRequest::SetRecognition {
            active: None,
            reply,
        })
        .await
    }

    pub async fn set_recognition(&self, active: bool) -> Result<bool, EngineError> {
        self.request(|reply| EngineRequest::SetRecognition {
            active: Some(active),
            reply,
        })
        .await
    }

    /// Delete one enrollment by id.
    pub async fn remove(&self, id: &str) -> Result<bool, EngineError> {
        let id = id.to_string();
        self.request(|reply| EngineRequest::Remove { id, reply }).await?
    }

    /// Delete every enrollment.
    pub async fn clear(&self) -> Result<usize, EngineError> {
        self.request(|reply| EngineRequest::Clear { reply }).await?
    }

    pub async fn status(&self) -> Result<StatusReport, EngineError> {
        self.request(|reply| EngineRequest::Status { reply }).await
    }
}

/// State owned by the engine thread.
struct Pipeline<S, L, G> {
    source: S,
    locator: L,
    generator: G,
    state: AppState,
    matcher: CosineMatcher,
    throttle: EmbedThrottle,
    threshold: f32,
    min_face_size: f32,
}

/// Spawn the engine on a dedicated OS thread.
///
/// The thread owns the capture capabilities and the application state and
/// serves requests one at a time until every handle is dropped.
pub fn spawn_engine<S, L, G>(
    source: S,
    locator: L,
    generator: G,
    gallery: Arc<Gallery>,
    config: &Config,
) -> Result<EngineHandle, EngineError>
where
    S: ImageSource + 'static,
    L: FaceLocator + 'static,
    G: EmbeddingGenerator + 'static,
{
    if let Some(dim) = gallery.dimension() {
        if dim != generator.dimension() {
            tracing::warn!(
                gallery = dim,
                generator = generator.dimension(),
                "generator dimension differs from gallery"
            );
        }
    }

    let mut pipeline = Pipeline {
        source,
        locator,
        generator,
        state: AppState::new(gallery),
        matcher: config.matcher(),
        throttle: EmbedThrottle::new(config.embed_interval()),
        threshold: config.similarity_threshold,
        min_face_size: config.min_face_size,
    };

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("likeness-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                pipeline.handle(req);
            }
            tracing::info!("engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle { tx })
}

impl<S, L, G> Pipeline<S, L, G>
where
    S: ImageSource,
    L: FaceLocator,
    G: EmbeddingGenerator,
{
    fn handle(&mut self, req: EngineRequest) {
        match req {
            EngineRequest::Enroll { name, reply } => {
                let _ = reply.send(self.enroll(&name));
            }
            EngineRequest::Identify { reply } => {
                let _ = reply.send(self.identify());
            }
            EngineRequest::SetRecognition { active, reply } => {
                let active = active.unwrap_or(!self.state.is_recognition_active());
                self.state.set_recognition(active);
                if active {
                    self.throttle.reset();
                }
                let _ = reply.send(active);
            }
            EngineRequest::Remove { id, reply } => {
                let _ = reply.send(self.state.remove(&id).map_err(EngineError::from));
            }
            EngineRequest::Clear { reply } => {
                let _ = reply.send(self.state.clear().map_err(EngineError::from));
            }
            EngineRequest::Status { reply } => {
                let gallery = self.state.gallery();
                let _ = reply.send(StatusReport {
                    recognition_active: self.state.is_recognition_active(),
                    enrolled: gallery.len(),
                    dimension: gallery.dimension(),
                    last_result: self.state.last_result().cloned(),
                });
            }
        }
    }

    /// Capture one frame, require exactly one face, embed it, append it.
    fn enroll(&mut self, name: &str) -> Result<EnrollmentRecord, EngineError> {
        let frame = self.source.capture()?;
        let faces = self.locator.locate(&frame)?;
        tracing::debug!(frame = frame.sequence, faces = faces.len(), "enroll: located faces");

        let face = match faces.as_slice() {
            [] => return Err(EngineError::NoFaceDetected),
            [face] => face,
            many => return Err(EngineError::MultipleFaces(many.len())),
        };

        let embedding = self.generator.embed(&frame, face)?;
        Ok(self.state.enroll(name, embedding)?)
    }

    /// Locate on every call; embed only when the face is large enough and the
    /// throttle allows it.
    fn identify(&mut self) -> Result<Recognition, EngineError> {
        if !self.state.is_recognition_active() {
            return Ok(Recognition::Inactive);
        }

        let snapshot = self.state.gallery().snapshot();
        if snapshot.is_empty() {
            return Ok(Recognition::EmptyGallery);
        }

        let frame = self.source.capture()?;
        let faces = self.locator.locate(&frame)?;
        let Some(face) = faces.first() else {
            self.state.set_last_result(None);
            return Ok(Recognition::NoFace);
        };

        if !face.is_at_least(self.min_face_size) {
            tracing::trace!(width = face.width, height = face.height, "face too small");
            return Ok(Recognition::FaceTooSmall {
                width: face.width,
                height: face.height,
            });
        }

        if !self.throttle.try_acquire(Instant::now()) {
            return Ok(Recognition::Throttled);
        }

        let embedding = self.generator.embed(&frame, face)?;
        let result = self.matcher.compare(&embedding, &snapshot, self.threshold)?;

        tracing::info!(
            frame = frame.sequence,
            accepted = result.accepted,
            name = result.name.as_deref().unwrap_or("-"),
            score = result.score,
            "identify complete"
        );

        self.state.set_last_result(Some(result.clone()));
        Ok(Recognition::Completed(result))
    }
}
