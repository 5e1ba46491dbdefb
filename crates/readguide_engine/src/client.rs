use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use readguide_core::{LifecycleEvent, StreamDecoder};
use readguide_logging::{guide_debug, guide_warn};
use reqwest::header::ACCEPT;
use reqwest::multipart::{Form, Part};

use crate::{SourceDescriptor, TransportError};

pub const BATCH_IMPORT_PATH: &str = "/api/literature/batch-import";

/// Multipart field names of a batch submission. Every file is its own `files` part,
/// in submission order.
pub const FILES_FIELD: &str = "files";
pub const PROFILE_FIELD: &str = "profile";
pub const MODEL_FIELD: &str = "model";

/// A batch to upload. `sources` point at local files; their contents are sent under
/// the source name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    pub sources: Vec<SourceDescriptor>,
    pub profile: String,
    pub model: Option<String>,
}

impl BatchRequest {
    async fn to_form(&self) -> Result<Form, TransportError> {
        let mut form = Form::new().text(PROFILE_FIELD, self.profile.clone());
        if let Some(model) = &self.model {
            form = form.text(MODEL_FIELD, model.clone());
        }
        for source in &self.sources {
            let contents =
                tokio::fs::read(&source.path)
                    .await
                    .map_err(|err| TransportError::Upload {
                        name: source.name.clone(),
                        message: err.to_string(),
                    })?;
            form = form.part(
                FILES_FIELD,
                Part::bytes(contents).file_name(source.name.clone()),
            );
        }
        Ok(form)
    }
}

/// Submits batches to a server and decodes the event stream it answers with.
#[derive(Debug, Clone)]
pub struct BatchClient {
    client: reqwest::Client,
    base_url: String,
}

impl BatchClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|err| TransportError::Network(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub async fn submit(&self, request: &BatchRequest) -> Result<EventStream, TransportError> {
        let url = format!("{}{}", self.base_url, BATCH_IMPORT_PATH);
        guide_debug!("Uploading {} source(s) to {}", request.sources.len(), url);
        let form = request.to_form().await?;
        let response = self
            .client
            .post(url)
            .header(ACCEPT, "text/event-stream")
            .multipart(form)
            .send()
            .await
            .map_err(|err| TransportError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        Ok(EventStream::new(response.bytes_stream()))
    }
}

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// Lifecycle events decoded from a response body, in arrival order.
pub struct EventStream {
    body: Option<ByteStream>,
    decoder: StreamDecoder,
    ready: VecDeque<LifecycleEvent>,
}

impl EventStream {
    fn new(body: impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static) -> Self {
        Self {
            body: Some(Box::pin(body)),
            decoder: StreamDecoder::new(),
            ready: VecDeque::new(),
        }
    }

    /// Next decoded event. `None` once the server has closed the stream.
    pub async fn next_event(&mut self) -> Option<Result<LifecycleEvent, TransportError>> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Some(Ok(event));
            }
            let body = self.body.as_mut()?;
            match body.next().await {
                Some(Ok(chunk)) => self.ready.extend(self.decoder.feed(&chunk)),
                Some(Err(err)) => {
                    self.body = None;
                    return Some(Err(TransportError::Network(err.to_string())));
                }
                None => {
                    self.body = None;
                    let decoder = std::mem::take(&mut self.decoder);
                    if decoder.skipped_frames() > 0 {
                        guide_debug!("Ignored {} frame(s) of unknown kind", decoder.skipped_frames());
                    }
                    if decoder.finish() {
                        guide_warn!("Stream closed in the middle of a frame");
                    }
                    return None;
                }
            }
        }
    }
}
