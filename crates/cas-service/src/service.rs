use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;

use bytes::Bytes;
use cas_ingest::{SessionManager, SessionStatus, SessionWriter};
use cas_query::{select, select_ok, FilterSet};
use cas_store::{BlobInfo, BlobStore, BlobUpdate, FieldMask};
use cas_types::Digest;
use futures::stream::{BoxStream, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::config::ServiceConfig;
use crate::error::{reason, Code, ServiceError, ServiceResult};
use crate::message::{ReadChunk, WriteAction, WriteRequest, WriteResponse};

/// Stream of results produced by a background task.
///
/// Dropping the stream stops the producer at its next send.
pub type ResponseStream<T> = BoxStream<'static, ServiceResult<T>>;

/// Run store I/O and session locking off the async executor.
///
/// A worker dropped unstarted by runtime shutdown reports
/// [`Code::Cancelled`]; a panic is internal.
async fn blocking<T, F>(resource: &str, f: F) -> ServiceResult<T>
where
    F: FnOnce() -> ServiceResult<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(e) if e.is_cancelled() => Err(ServiceError::cancelled(resource)),
        Err(e) => Err(ServiceError::internal(resource, format!("worker failed: {e}"))),
    }
}

/// All content operations over one store and its session manager.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ContentService {
    store: Arc<dyn BlobStore>,
    sessions: SessionManager,
    config: ServiceConfig,
}

impl std::fmt::Debug for ContentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentService")
            .field("sessions", &self.sessions)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ContentService {
    /// Serve the store the session manager commits into.
    pub fn new(sessions: SessionManager, config: ServiceConfig) -> Self {
        Self {
            store: Arc::clone(sessions.store()),
            sessions,
            config,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn channel<T>(&self) -> (mpsc::Sender<ServiceResult<T>>, mpsc::Receiver<ServiceResult<T>>) {
        mpsc::channel(self.config.stream_buffer.max(1))
    }

    // ---- blobs ----

    pub async fn info(&self, digest: Digest) -> ServiceResult<BlobInfo> {
        let store = Arc::clone(&self.store);
        blocking(&digest.to_string(), move || {
            store
                .info(&digest)?
                .ok_or_else(|| ServiceError::not_found(digest.to_string()))
        })
        .await
    }

    /// Change labels under `mask`; see [`FieldMask`] for path rules.
    pub async fn update(
        &self,
        digest: Digest,
        update: BlobUpdate,
        mask: FieldMask,
    ) -> ServiceResult<BlobInfo> {
        let store = Arc::clone(&self.store);
        let info = blocking(&digest.to_string(), move || {
            Ok(store.update(&digest, &update, &mask)?)
        })
        .await?;
        info!(digest = %info.digest, labels = info.labels.len(), "blob updated");
        Ok(info)
    }

    pub async fn delete(&self, digest: Digest) -> ServiceResult<()> {
        let store = Arc::clone(&self.store);
        let existed = blocking(&digest.to_string(), move || Ok(store.delete(&digest)?)).await?;
        if !existed {
            return Err(ServiceError::not_found(digest.to_string()));
        }
        info!(digest = %digest, "blob deleted");
        Ok(())
    }

    /// Stream the blobs matching any of `filters`, in batches of at most
    /// `list_batch_size` records.
    pub fn list<I, S>(&self, filters: I) -> ServiceResult<ResponseStream<Vec<BlobInfo>>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let filters = FilterSet::parse(filters)?;
        let store = Arc::clone(&self.store);
        let batch_size = self.config.list_batch_size.max(1);
        let (tx, rx) = self.channel();

        tokio::task::spawn_blocking(move || {
            let blobs = match store.list() {
                Ok(blobs) => blobs,
                Err(e) => {
                    let _ = tx.blocking_send(Err(e.into()));
                    return;
                }
            };
            let mut batch = Vec::with_capacity(batch_size);
            for item in select_ok(&filters, blobs) {
                match item {
                    Ok(info) => batch.push(info),
                    Err(e) => {
                        let _ = tx.blocking_send(Err(e.into()));
                        return;
                    }
                }
                if batch.len() == batch_size
                    && tx.blocking_send(Ok(std::mem::take(&mut batch))).is_err()
                {
                    debug!("blob listing cancelled");
                    return;
                }
            }
            if !batch.is_empty() {
                let _ = tx.blocking_send(Ok(batch));
            }
        });

        Ok(ReceiverStream::new(rx).boxed())
    }

    /// Stream `length` bytes of a blob from `offset` (0 means to the end) in
    /// chunks of at most `read_chunk_size` bytes.
    ///
    /// Reading from exactly the blob size yields an empty stream; any larger
    /// offset is out of range.
    pub async fn read(
        &self,
        digest: Digest,
        offset: u64,
        length: u64,
    ) -> ServiceResult<ResponseStream<ReadChunk>> {
        let resource = digest.to_string();
        let store = Arc::clone(&self.store);
        let missing = resource.clone();
        let blob = blocking(&resource, move || {
            store
                .open(&digest)?
                .ok_or_else(|| ServiceError::not_found(missing))
        })
        .await?;

        let size = blob.info.size;
        if offset > size {
            return Err(ServiceError::new(
                Code::OutOfRange,
                resource,
                reason::OFFSET_OUT_OF_RANGE,
                format!("read offset {offset} is beyond blob size {size}"),
            ));
        }
        let end = if length == 0 {
            size
        } else {
            offset.saturating_add(length).min(size)
        };
        let chunk_size = self.config.read_chunk_size.max(1) as u64;
        let (tx, rx) = self.channel();

        tokio::task::spawn_blocking(move || {
            let mut reader = blob.reader;
            if let Err(e) = reader.seek(SeekFrom::Start(offset)) {
                let _ = tx.blocking_send(Err(ServiceError::internal(resource, e.to_string())));
                return;
            }
            let mut pos = offset;
            while pos < end {
                let mut buf = vec![0u8; (end - pos).min(chunk_size) as usize];
                if let Err(e) = reader.read_exact(&mut buf) {
                    let message = format!("read failed at offset {pos}: {e}");
                    let _ = tx.blocking_send(Err(ServiceError::internal(resource, message)));
                    return;
                }
                let len = buf.len() as u64;
                let chunk = ReadChunk {
                    offset: pos,
                    data: Bytes::from(buf),
                };
                if tx.blocking_send(Ok(chunk)).is_err() {
                    debug!(digest = %resource, offset = pos, "read cancelled");
                    return;
                }
                pos += len;
            }
        });

        Ok(ReceiverStream::new(rx).boxed())
    }

    // ---- sessions ----

    /// Snapshot of an open session. Never waits on the writer lock.
    pub async fn status(&self, reference: &str) -> ServiceResult<SessionStatus> {
        let sessions = self.sessions.clone();
        let owned = reference.to_string();
        blocking(reference, move || Ok(sessions.status(&owned)?)).await
    }

    pub async fn list_statuses<I, S>(&self, filters: I) -> ServiceResult<Vec<SessionStatus>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let filters = FilterSet::parse(filters)?;
        let sessions = self.sessions.clone();
        blocking("", move || {
            Ok(select(&filters, sessions.statuses()).collect::<Vec<_>>())
        })
        .await
    }

    pub async fn abort(&self, reference: &str) -> ServiceResult<()> {
        let sessions = self.sessions.clone();
        let owned = reference.to_string();
        blocking(reference, move || Ok(sessions.abort(&owned)?)).await?;
        Ok(())
    }

    /// Drive one write stream.
    ///
    /// The first message acquires its ref; the lock is held until the
    /// stream ends and released on every exit path, including the caller
    /// dropping either side. One response is produced per accepted message.
    /// The first error ends the stream, as does any message after a commit.
    pub fn write<S>(&self, requests: S) -> ResponseStream<WriteResponse>
    where
        S: Stream<Item = WriteRequest> + Send + 'static,
    {
        let (tx, rx) = self.channel();
        let stream = WriteStream {
            sessions: self.sessions.clone(),
            writer: None,
            committed: None,
        };
        tokio::spawn(stream.run(requests, tx));
        ReceiverStream::new(rx).boxed()
    }
}

/// Per-stream state of a write call.
struct WriteStream {
    sessions: SessionManager,
    writer: Option<SessionWriter>,
    /// Ref of the committed session once the stream has committed.
    committed: Option<String>,
}

impl WriteStream {
    async fn run<S>(mut self, requests: S, tx: mpsc::Sender<ServiceResult<WriteResponse>>)
    where
        S: Stream<Item = WriteRequest> + Send + 'static,
    {
        let mut requests = std::pin::pin!(requests);
        while let Some(request) = requests.next().await {
            let result = self.handle(request).await;
            let failed = result.is_err();
            if tx.send(result).await.is_err() {
                debug!("write stream dropped by caller");
                break;
            }
            if failed {
                break;
            }
        }
        // Release the ref before the response stream reports its end.
        drop(self);
    }

    fn take_writer(&mut self, reference: &str) -> ServiceResult<SessionWriter> {
        match self.writer.take() {
            Some(writer) if reference.is_empty() || reference == writer.reference() => Ok(writer),
            Some(writer) => {
                let message = format!(
                    "write stream is bound to ref {:?}, message names {reference:?}",
                    writer.reference()
                );
                let bound = writer.reference().to_string();
                self.writer = Some(writer);
                Err(ServiceError::invalid_argument(bound, reason::REF_MISMATCH, message))
            }
            None => Ok(self.sessions.acquire(reference)?),
        }
    }

    async fn handle(&mut self, request: WriteRequest) -> ServiceResult<WriteResponse> {
        if let Some(reference) = &self.committed {
            return Err(ServiceError::invalid_argument(
                reference.clone(),
                reason::STREAM_CLOSED,
                "write stream already committed",
            ));
        }

        let writer = self.take_writer(&request.reference)?;
        debug!(
            reference = writer.reference(),
            action = ?request.action,
            offset = request.offset,
            len = request.data.len(),
            "write message"
        );
        let reference = writer.reference().to_string();
        let WriteRequest {
            action,
            total,
            expected,
            offset,
            data,
            labels,
            ..
        } = request;
        // Stat only reports; declarations ride on write and commit.
        let declares = action != WriteAction::Stat && (total > 0 || expected.is_some());

        if action == WriteAction::Commit {
            let committed = blocking(&reference, move || {
                if declares {
                    writer.expect(total, expected)?;
                }
                Ok(writer.commit(offset, &data, labels)?)
            })
            .await?;
            self.committed = Some(reference);
            return Ok(WriteResponse::new(action, committed.progress));
        }

        // A failed message drops the writer inside the worker, releasing the ref.
        let (writer, progress) = blocking(&reference, move || {
            if declares {
                writer.expect(total, expected)?;
            }
            let progress = match action {
                WriteAction::Write => writer.write(offset, &data)?,
                _ => writer.stat()?,
            };
            Ok((writer, progress))
        })
        .await?;
        self.writer = Some(writer);
        Ok(WriteResponse::new(action, progress))
    }
}
