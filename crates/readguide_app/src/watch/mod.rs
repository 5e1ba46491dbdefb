//! Terminal client: submits a batch and follows its progress until it ends.
mod render;

use std::future::Future;
use std::path::PathBuf;

use readguide_core::{update, BatchState, BatchViewModel, Effect, Msg};
use readguide_engine::{BatchClient, BatchRequest, SourceDescriptor, TransportError};
use readguide_logging::{guide_info, guide_warn};

pub use render::render;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchArgs {
    pub server: String,
    pub profile: String,
    pub model: Option<String>,
    pub files: Vec<PathBuf>,
}

/// How a watched batch ended, mapped to the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchExit {
    Succeeded,
    Failed,
    Interrupted,
}

impl WatchExit {
    pub fn from_view(view: &BatchViewModel) -> Self {
        match (view.is_done, view.has_errors) {
            (true, false) => WatchExit::Succeeded,
            (true, true) => WatchExit::Failed,
            (false, _) => WatchExit::Interrupted,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            WatchExit::Succeeded => 0,
            WatchExit::Failed => 1,
            WatchExit::Interrupted => 2,
        }
    }
}

/// Local files to upload, each labelled with its file name.
pub fn sources_for(files: &[PathBuf]) -> Vec<SourceDescriptor> {
    files
        .iter()
        .map(|file| {
            let name = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.display().to_string());
            let path = std::path::absolute(file).unwrap_or_else(|_| file.clone());
            SourceDescriptor::new(name, path)
        })
        .collect()
}

/// Submit `request` and feed every decoded event through [`update`].
///
/// `on_change` sees the view whenever the state turned dirty. When `stop` resolves
/// first the batch is cancelled and the stream dropped, which ends the batch on the
/// server side as well.
pub async fn watch_batch<S, R>(
    client: &BatchClient,
    request: &BatchRequest,
    stop: S,
    mut on_change: R,
) -> Result<BatchViewModel, TransportError>
where
    S: Future<Output = ()>,
    R: FnMut(&BatchViewModel),
{
    let mut state = BatchState::new(request.sources.iter().map(|source| source.name.clone()));
    on_change(&state.view());
    state.consume_dirty();

    let mut events = Some(client.submit(request).await?);
    tokio::pin!(stop);

    while let Some(stream) = events.as_mut() {
        let msg = tokio::select! {
            () = &mut stop => Msg::CancelRequested,
            event = stream.next_event() => match event {
                Some(Ok(event)) => Msg::EventReceived(event),
                Some(Err(err)) => {
                    guide_warn!("Event stream failed: {}", err);
                    Msg::StreamClosed
                }
                None => Msg::StreamClosed,
            },
        };

        let (next, effects) = update(state, msg);
        state = next;
        if state.consume_dirty() {
            on_change(&state.view());
        }
        for effect in effects {
            match effect {
                Effect::CloseStream => {
                    guide_info!("Cancel requested, closing the event stream");
                    events = None;
                }
            }
        }
        if state.is_finished() {
            events = None;
        }
    }

    Ok(state.view())
}

/// Run `readguide watch`, printing a fresh block of lines on every change.
pub async fn run(args: WatchArgs) -> Result<WatchExit, TransportError> {
    let client = BatchClient::new(args.server)?;
    let request = BatchRequest {
        sources: sources_for(&args.files),
        profile: args.profile,
        model: args.model,
    };

    let stop = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let view = watch_batch(&client, &request, stop, |view| {
        for line in render(view) {
            println!("{line}");
        }
        println!();
    })
    .await?;

    let exit = WatchExit::from_view(&view);
    guide_info!("Watch finished: {} (exit {})", view.status_line, exit.code());
    Ok(exit)
}
