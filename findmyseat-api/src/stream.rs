use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use findmyseat_core::{BroadcastHub, Group, HubMessage, SubscriptionId};
use futures_util::stream::{self, Stream, StreamExt};
use std::{convert::Infallible, sync::Arc};
use tokio_stream::wrappers::ReceiverStream;

use crate::state::AppState;

/// Leaves the hub group when the client's stream is dropped.
struct SubscriptionGuard {
    hub: Arc<BroadcastHub>,
    id: SubscriptionId,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.id);
    }
}

pub async fn occupant_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    event_stream(state.hub, Group::Occupant)
}

pub async fn operator_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    event_stream(state.hub, Group::Operator)
}

fn event_stream(
    hub: Arc<BroadcastHub>,
    group: Group,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = hub.subscribe(group);
    let guard = SubscriptionGuard { hub, id: subscription.id };

    let connected = stream::once(async { Ok::<_, Infallible>(Event::default().comment("connected")) });
    let updates = ReceiverStream::new(subscription.receiver).map(move |message| {
        let _subscribed = &guard;
        Ok::<_, Infallible>(to_sse(message))
    });

    // Keep-alives come from the hub's heartbeat, not from axum.
    Sse::new(connected.chain(updates))
}

fn to_sse(message: HubMessage) -> Event {
    match message {
        HubMessage::Heartbeat => Event::default().comment("heartbeat"),
        HubMessage::Event(event) => match serde_json::to_string(&*event) {
            Ok(json) => Event::default().data(json),
            Err(e) => {
                tracing::error!("Failed to encode event: {}", e);
                Event::default().comment("encoding-error")
            }
        },
    }
}
