//! Upload Pipeline
//!
//! Drives a local file through validation, encoding, transmission, and
//! publishing against the remote store. Every outcome is classified: the
//! caller receives either a completed task carrying a remote reference or a
//! [`LocalFallbackRecord`] saying exactly what failed and whether `retry`
//! can pick the task back up.

use bridge_traits::error::BridgeError;
use bridge_traits::media::MediaSource;
use core_auth::TokenGuard;
use core_runtime::{CoreEvent, EventBus, UploadEvent, UploadSettings};
use provider_drive::{CreatedFile, DriveClient};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{FailureKind, Result, UploadError};
use crate::task::{
    EncodedPayload, LocalFallbackRecord, RemoteRef, UploadState, UploadTask,
};

const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Outcome of a submit or retry call. `fallback` is present exactly when
/// the task did not complete.
#[derive(Debug)]
pub struct UploadReport {
    pub task: UploadTask,
    pub fallback: Option<LocalFallbackRecord>,
}

impl UploadReport {
    pub fn is_completed(&self) -> bool {
        self.task.state == UploadState::Completed
    }
}

pub struct UploadPipeline {
    guard: Arc<TokenGuard>,
    drive: Arc<DriveClient>,
    media: Arc<dyn MediaSource>,
    settings: UploadSettings,
    events: EventBus,
    workers: Arc<Semaphore>,
}

impl UploadPipeline {
    /// Build a pipeline, validating the settings before anything runs. The
    /// configured request timeout is applied to every drive call.
    pub fn new(
        guard: Arc<TokenGuard>,
        drive: DriveClient,
        media: Arc<dyn MediaSource>,
        settings: UploadSettings,
        events: EventBus,
    ) -> Result<Self> {
        settings
            .validate()
            .map_err(|e| UploadError::Configuration(e.to_string()))?;
        let drive = Arc::new(drive.with_timeout(settings.request_timeout()));
        let workers = Arc::new(Semaphore::new(settings.worker_limit));
        Ok(Self {
            guard,
            drive,
            media,
            settings,
            events,
            workers,
        })
    }

    /// Run a new upload end to end. Independent tasks run concurrently up
    /// to the configured worker limit; stages within one task are strictly
    /// sequential.
    #[instrument(skip(self, cancel), fields(source_ref = source_ref, name = destination_name))]
    pub async fn submit(
        &self,
        source_ref: &str,
        destination_name: &str,
        owner_id: core_auth::AccountId,
        cancel: CancellationToken,
    ) -> UploadReport {
        let mut task = UploadTask::new(source_ref, destination_name, owner_id);
        self.events.emit(CoreEvent::Upload(UploadEvent::Queued {
            task_id: task.id.to_string(),
        }));

        let _permit = match self.workers.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return self.finish(task, Err(UploadError::Cancelled)),
        };

        let result = self.run_new_task(&mut task, &cancel).await;
        self.finish(task, result)
    }

    /// Resume a task that failed retryably. Re-enters `Transmitting` with
    /// the payload cached on the task; validation and encoding never rerun.
    /// When the remote object was already created (publish-stage failure),
    /// only the permission grant is repeated.
    #[instrument(skip(self, task, cancel), fields(task_id = %task.id))]
    pub async fn retry(&self, mut task: UploadTask, cancel: CancellationToken) -> Result<UploadReport> {
        if task.state != UploadState::FailedRetryable {
            return Err(UploadError::NotRetryable { state: task.state });
        }
        if task.encoded.is_none() {
            return Err(UploadError::Configuration(
                "Task carries no cached payload".to_string(),
            ));
        }

        let _permit = self
            .workers
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| UploadError::Cancelled)?;

        task.last_error = None;
        self.advance(&mut task, UploadState::Transmitting)?;
        let result = self.transmit_with_retries(&mut task, &cancel).await;
        Ok(self.finish(task, result))
    }

    async fn run_new_task(
        &self,
        task: &mut UploadTask,
        cancel: &CancellationToken,
    ) -> Result<RemoteRef> {
        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        self.advance(task, UploadState::Validating)?;
        let info = self
            .media
            .probe(&task.source_ref)
            .await
            .map_err(map_media_error)?;

        if info.size > self.settings.max_bytes {
            return Err(UploadError::Validation(format!(
                "File is {} bytes, limit is {}",
                info.size, self.settings.max_bytes
            )));
        }
        let mime_type = info
            .mime_type
            .unwrap_or_else(|| "application/octet-stream".to_string());
        if !self.settings.allowed_mime_types.is_empty()
            && !self.settings.allowed_mime_types.contains(&mime_type)
        {
            return Err(UploadError::Validation(format!(
                "Type {} is not accepted",
                mime_type
            )));
        }

        self.advance(task, UploadState::Encoding)?;
        let bytes = self
            .media
            .read(&task.source_ref)
            .await
            .map_err(map_media_error)?;
        task.encoded = Some(EncodedPayload { bytes, mime_type });
        debug!(task_id = %task.id, "Payload encoded and cached");

        self.advance(task, UploadState::Transmitting)?;
        self.transmit_with_retries(task, cancel).await
    }

    /// Transmit and publish, consuming the bounded automatic retry budget
    /// on transient failures before surfacing them to the caller.
    async fn transmit_with_retries(
        &self,
        task: &mut UploadTask,
        cancel: &CancellationToken,
    ) -> Result<RemoteRef> {
        let mut auto_retries = 0;
        loop {
            task.attempt_count += 1;
            match self.transmit_once(task, cancel).await {
                Ok(remote) => return Ok(remote),
                Err(e) => {
                    let budget_left = auto_retries < self.settings.max_auto_retries;
                    if !e.is_retryable() || cancel.is_cancelled() || !budget_left {
                        return Err(e);
                    }
                    auto_retries += 1;
                    let delay = RETRY_BASE_DELAY * 2u32.pow(auto_retries - 1);
                    warn!(
                        task_id = %task.id,
                        attempt = task.attempt_count,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient upload failure, retrying"
                    );
                    self.advance(task, UploadState::FailedRetryable)?;
                    tokio::time::sleep(delay).await;
                    self.advance(task, UploadState::Transmitting)?;
                }
            }
        }
    }

    /// One transmit/publish attempt. Expects the task in `Transmitting`;
    /// leaves it in `Publishing` on success.
    async fn transmit_once(
        &self,
        task: &mut UploadTask,
        cancel: &CancellationToken,
    ) -> Result<RemoteRef> {
        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        let mut access_token = self
            .guard
            .get_valid_credential(&task.owner_id)
            .await?
            .access_token;

        if task.pending_remote.is_none() {
            let payload = match &task.encoded {
                Some(payload) => payload.clone(),
                None => {
                    return Err(UploadError::Configuration(
                        "Task carries no cached payload".to_string(),
                    ))
                }
            };

            let create = self.drive.create_file(
                &access_token,
                &task.destination_name,
                &self.settings.folder_id,
                &payload.mime_type,
                &payload.bytes,
            );
            let created = tokio::select! {
                _ = cancel.cancelled() => return Err(UploadError::Cancelled),
                result = create => match result {
                    Ok(created) => created,
                    Err(e) if e.is_auth_expired() => {
                        // The provider rejected a token the clock still
                        // considered valid; refresh once and retry the call.
                        access_token = self
                            .guard
                            .force_refresh(&task.owner_id)
                            .await?
                            .access_token;
                        self.drive
                            .create_file(
                                &access_token,
                                &task.destination_name,
                                &self.settings.folder_id,
                                &payload.mime_type,
                                &payload.bytes,
                            )
                            .await?
                    }
                    Err(e) => return Err(e.into()),
                },
            };
            task.pending_remote = Some(remote_ref_from(created));
        }

        self.advance(task, UploadState::Publishing)?;
        let remote = match &task.pending_remote {
            Some(remote) => remote.clone(),
            None => {
                return Err(UploadError::Configuration(
                    "Publishing with no created object".to_string(),
                ))
            }
        };

        match self.drive.grant_public_read(&access_token, &remote.id).await {
            Ok(()) => {}
            Err(e) if e.is_auth_expired() => {
                let renewed = self.guard.force_refresh(&task.owner_id).await?;
                self.drive
                    .grant_public_read(&renewed.access_token, &remote.id)
                    .await?;
            }
            Err(e) => return Err(e.into()),
        }

        Ok(remote)
    }

    /// Fold the outcome into the task and build the caller-facing report.
    fn finish(&self, mut task: UploadTask, result: Result<RemoteRef>) -> UploadReport {
        match result {
            Ok(remote) => {
                if let Err(e) = self.advance(&mut task, UploadState::Completed) {
                    error!(task_id = %task.id, error = %e, "Completion transition rejected");
                }
                let view_url = remote.view_url.clone().unwrap_or_default();
                task.remote_ref = Some(remote);
                task.pending_remote = None;
                self.events.emit(CoreEvent::Upload(UploadEvent::Completed {
                    task_id: task.id.to_string(),
                    view_url,
                }));
                info!(task_id = %task.id, "Upload completed");
                UploadReport {
                    task,
                    fallback: None,
                }
            }
            Err(e) => {
                let retryable = e.is_retryable();
                let target = if retryable {
                    UploadState::FailedRetryable
                } else {
                    UploadState::FailedFatal
                };
                if let Err(t) = self.advance(&mut task, target) {
                    error!(task_id = %task.id, error = %t, "Failure transition rejected");
                }
                task.last_error = Some(e.to_string());

                let kind = e.kind();
                if kind == FailureKind::Cancelled {
                    self.events.emit(CoreEvent::Upload(UploadEvent::Cancelled {
                        task_id: task.id.to_string(),
                    }));
                } else {
                    self.events.emit(CoreEvent::Upload(UploadEvent::Failed {
                        task_id: task.id.to_string(),
                        message: e.to_string(),
                        retryable,
                    }));
                }
                warn!(task_id = %task.id, kind = ?kind, retryable, "Upload failed");

                let fallback = LocalFallbackRecord {
                    task_id: task.id,
                    source_ref: task.source_ref.clone(),
                    kind,
                    message: e.to_string(),
                    retryable,
                    orphaned_remote_id: task.pending_remote.as_ref().map(|r| r.id.clone()),
                };
                UploadReport {
                    task,
                    fallback: Some(fallback),
                }
            }
        }
    }

    fn advance(&self, task: &mut UploadTask, to: UploadState) -> Result<()> {
        let from = task.state;
        task.transition(to)?;
        self.events.emit(CoreEvent::Upload(UploadEvent::StateChanged {
            task_id: task.id.to_string(),
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        }));
        Ok(())
    }
}

fn remote_ref_from(created: CreatedFile) -> RemoteRef {
    RemoteRef {
        id: created.id,
        view_url: created.web_view_link,
        download_url: created.web_content_link,
    }
}

fn map_media_error(e: BridgeError) -> UploadError {
    match e {
        BridgeError::SourceUnavailable(source_ref) => UploadError::SourceUnavailable(source_ref),
        other => UploadError::Validation(other.to_string()),
    }
}
