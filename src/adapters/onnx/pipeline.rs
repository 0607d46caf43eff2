use async_trait::async_trait;
use image::RgbImage;
use std::thread::JoinHandle;
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};

use crate::application::imaging::{encode_jpeg, Annotator};
use crate::application::inference::run_stream;
use crate::application::ports::{FrameSink, StreamEvent, StreamJob, StreamPort};
use crate::domain::{
    errors::{DomainError, DomainResult},
    stream::{CancellationToken, FrameMeta},
};

/// Runs one stream at a time on a dedicated thread and broadcasts the
/// annotated frames to every WebSocket subscriber.
pub struct PipelineAdapter {
    annotator: Annotator,
    jpeg_quality: u8,
    active: Mutex<Option<ActiveStream>>,
    tx: broadcast::Sender<StreamEvent>,
}

struct ActiveStream {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Display surface backed by the broadcast channel. Frames are only encoded
/// when someone is listening.
struct BroadcastSink {
    tx: broadcast::Sender<StreamEvent>,
    jpeg_quality: u8,
    shown: u64,
}

impl FrameSink for BroadcastSink {
    fn show(&mut self, meta: &FrameMeta, annotated: &RgbImage) {
        self.shown += 1;
        if self.tx.receiver_count() == 0 {
            return;
        }
        match encode_jpeg(annotated, self.jpeg_quality) {
            Ok(jpeg) => {
                let _ = self.tx.send(StreamEvent::Frame(meta.clone(), jpeg));
            }
            Err(e) => warn!("dropping frame {}: {e}", meta.index),
        }
    }
}

impl PipelineAdapter {
    pub fn new(annotator: Annotator, jpeg_quality: u8) -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { annotator, jpeg_quality, active: Mutex::new(None), tx }
    }

    fn spawn_worker(&self, job: StreamJob) -> DomainResult<JoinHandle<()>> {
        let tx = self.tx.clone();
        let annotator = self.annotator.clone();
        let jpeg_quality = self.jpeg_quality;

        std::thread::Builder::new()
            .name("stream-worker".into())
            .spawn(move || {
                let StreamJob { kind, source, detector, confidence, token } = job;
                info!("Pipeline Worker: {:?} stream started (conf {:.2})", kind, confidence.value());

                let mut sink = BroadcastSink { tx: tx.clone(), jpeg_quality, shown: 0 };
                let outcome = run_stream(source, &detector, &annotator, confidence, &token, &mut sink);

                let (cancelled, error) = match outcome {
                    Ok(report) => (report.cancelled, None),
                    Err(e) => {
                        error!("{:?} stream aborted: {e}", kind);
                        (false, Some(e.to_string()))
                    }
                };
                let _ = tx.send(StreamEvent::End { kind, frames: sink.shown, cancelled, error });
            })
            .map_err(|e| DomainError::OperationFailed(format!("could not spawn stream worker: {e}")))
    }
}

#[async_trait]
impl StreamPort for PipelineAdapter {
    async fn start(&self, job: StreamJob) -> DomainResult<()> {
        // Held across the swap so concurrent starts cannot orphan a worker.
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            shutdown(previous).await?;
        }
        let token = job.token.clone();
        let handle = self.spawn_worker(job)?;
        *active = Some(ActiveStream { token, handle });
        Ok(())
    }

    async fn stop(&self) -> DomainResult<bool> {
        let mut active = self.active.lock().await;
        match active.take() {
            Some(previous) => shutdown(previous).await,
            None => Ok(false),
        }
    }

    async fn subscribe(&self) -> DomainResult<broadcast::Receiver<StreamEvent>> {
        Ok(self.tx.subscribe())
    }
}

/// Cancels a worker and waits for it, so its capture handle is released
/// before returning. Returns whether it was still running.
async fn shutdown(previous: ActiveStream) -> DomainResult<bool> {
    let was_running = !previous.handle.is_finished();
    previous.token.cancel();
    tokio::task::spawn_blocking(move || previous.handle.join())
        .await
        .map_err(|e| DomainError::OperationFailed(format!("join task failed: {e}")))?
        .map_err(|_| DomainError::OperationFailed("stream worker panicked".into()))?;
    Ok(was_running)
}
