//! Where the iframe is actually shown.
//!
//! An [`IframeHost`] creates and removes the iframe container. A browser binding would insert
//! a modal with an `<iframe>`; the command line binary uses [`ConsoleIframeHost`], which prints
//! the URL and relays messages typed on stdin (see [`relay_console_input`]).

use serde::Deserialize;
use serde_json::value::RawValue;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::iframe::channel::{CloseTrigger, IframeMessageChannel};
use crate::iframe::window::{InboundMessage, MessageWindow};

pub trait IframeHost: Send + Sync {
    fn mount(&self, container_id: &str, url: &str);
    fn unmount(&self, container_id: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleIframeHost;

impl IframeHost for ConsoleIframeHost {
    fn mount(&self, container_id: &str, url: &str) {
        tracing::info!(container_id, "Hosted checkout opened");
        println!("Open the hosted checkout to pay:\n  {url}");
        println!(
            "Paste messages as {{\"origin\": \"...\", \"data\": {{...}}}}, or type `escape` to close."
        );
    }

    fn unmount(&self, container_id: &str) {
        tracing::info!(container_id, "Hosted checkout closed");
    }
}

#[derive(Deserialize)]
struct RelayedMessage {
    origin: String,
    data: Box<RawValue>,
}

/// Feeds lines from `input` into the window until it ends.
///
/// `escape`, `close` and `backdrop` act as the corresponding close affordances; any other
/// non-empty line must be a JSON `{"origin", "data"}` object and is dispatched as a message.
pub async fn relay_console_input<R>(
    input: R,
    window: Arc<MessageWindow>,
    channel: IframeMessageChannel,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line.to_ascii_lowercase().as_str() {
            "" => continue,
            "escape" => {
                channel.on_key_down("Escape");
            }
            "close" => {
                channel.close(CloseTrigger::CloseControl);
            }
            "backdrop" => {
                channel.on_backdrop_click(true);
            }
            _ => match serde_json::from_str::<RelayedMessage>(line) {
                Ok(relayed) => {
                    let message = InboundMessage::new(relayed.origin, relayed.data.get());
                    let outcome = window.dispatch(&message);
                    tracing::debug!(?outcome, "Relayed console message");
                }
                Err(error) => {
                    tracing::warn!(%error, "Ignoring console input that is not a message");
                }
            },
        }
    }
    Ok(())
}
