//! The messenger loop: poll for events and answer each in its own task.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::messengers::{CallbackQuery, IncomingMessage, Messenger, MessengerEvent, SendOptions};
use crate::router::{Action, Reply, Router};

/// Pause after a failed poll before trying again.
const RETRY_DELAY: Duration = Duration::from_secs(5);

const WORKING_NOTICE: &str = "⏳ Working...";

/// Poll `messenger` until `cancel` fires. Poll failures are logged and
/// retried; they never end the loop.
pub async fn run_messenger_loop(
    messenger: Arc<dyn Messenger>,
    router: Arc<Router>,
    cancel: CancellationToken,
) {
    info!(
        messenger = messenger.name(),
        platform = messenger.messenger_type(),
        admins = router.allowlist().len(),
        "Starting messenger loop"
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Shutting down messenger loop");
                break;
            }
            polled = messenger.receive_events() => match polled {
                Ok(events) => {
                    for event in events {
                        let messenger = Arc::clone(&messenger);
                        let router = Arc::clone(&router);
                        tokio::spawn(async move {
                            handle_event(messenger.as_ref(), &router, event).await;
                        });
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Polling failed, retrying in {:?}", RETRY_DELAY);
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(RETRY_DELAY) => {}
                    }
                }
            }
        }
    }
}

/// Route one event and deliver the reply. Delivery failures are logged.
pub async fn handle_event(messenger: &dyn Messenger, router: &Router, event: MessengerEvent) {
    debug!(sender = event.sender_id(), chat = event.chat_id(), "Handling event");
    match event {
        MessengerEvent::Message(msg) => handle_message(messenger, router, msg).await,
        MessengerEvent::Callback(query) => handle_callback(messenger, router, query).await,
    }
}

async fn handle_message(messenger: &dyn Messenger, router: &Router, msg: IncomingMessage) {
    if router.allowlist().is_admin(msg.sender_id)
        && router.is_slow_text(msg.sender_id, &msg.text).await
    {
        if let Err(e) = messenger.send_message(msg.chat_id, WORKING_NOTICE).await {
            debug!(error = %e, "Failed to send progress notice");
        }
    }

    let Some(reply) = router.handle_text(msg.sender_id, &msg.text).await else {
        return;
    };
    send_reply(messenger, msg.chat_id, Some(msg.message_id), &reply).await;
}

async fn handle_callback(messenger: &dyn Messenger, router: &Router, query: CallbackQuery) {
    if let Err(e) = messenger.answer_callback(&query.id).await {
        debug!(error = %e, "Failed to acknowledge callback");
    }

    let slow = router.allowlist().is_admin(query.sender_id)
        && query.data.parse::<Action>().is_ok_and(|a| a.is_slow());
    if slow {
        if let Err(e) = messenger
            .edit_message(query.chat_id, query.message_id, WORKING_NOTICE, None)
            .await
        {
            debug!(error = %e, "Failed to show progress notice");
        }
    }

    let reply = router.handle_callback(query.sender_id, &query.data).await;
    if let Err(e) = messenger
        .edit_message(
            query.chat_id,
            query.message_id,
            &reply.text,
            reply.keyboard.as_ref(),
        )
        .await
    {
        // The message may be too old to edit; fall back to a fresh one.
        warn!(error = %e, "Edit failed, sending a new message");
        send_reply(messenger, query.chat_id, None, &reply).await;
    }
}

/// Deliver a reply; text replies quote the operator's message.
async fn send_reply(
    messenger: &dyn Messenger,
    chat_id: i64,
    reply_to: Option<i64>,
    reply: &Reply,
) {
    let opts = SendOptions {
        chat_id,
        content: &reply.text,
        keyboard: reply.keyboard.as_ref(),
        reply_to,
    };
    if let Err(e) = messenger.send_message_with_options(opts).await {
        error!(chat = chat_id, error = %e, "Failed to deliver reply");
    }
}
