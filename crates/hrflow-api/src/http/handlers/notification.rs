//! Notification outbox handlers for delivery workers and inbox views, plus a
//! live Server-Sent Events feed of the in-process event bus.
//!
//! The live feed is best effort: a subscriber that falls behind the bus
//! capacity skips the missed events with a warning. The outbox stays the
//! durable record.

use std::convert::Infallible;
use std::time::Duration;

use axum::Json;
use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::Stream;
use uuid::Uuid;

use hrflow_infra::sqlite::outbox::OutboxFilter;
use hrflow_types::error::WorkflowError;
use hrflow_types::event::NotificationEvent;

use crate::http::error::AppError;
use crate::http::extractors::auth::RequestActor;
use crate::http::extractors::query::{NotificationListQuery, NotificationStreamQuery};
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// Outbox row as returned by the API.
#[derive(Debug, Serialize)]
pub struct NotificationView {
    #[serde(flatten)]
    pub event: NotificationEvent,
    pub delivered: bool,
}

#[derive(Debug, Deserialize)]
pub struct AckBody {
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct AckResult {
    pub acknowledged: u64,
}

/// GET /api/v1/notifications - Outbox rows addressed to a recipient.
///
/// Reading another identity's notifications needs an admin or system actor.
pub async fn list_notifications(
    State(state): State<AppState>,
    RequestActor(actor): RequestActor,
    Query(query): Query<NotificationListQuery>,
) -> Result<Json<ApiResponse<Vec<NotificationView>>>, AppError> {
    let timer = RequestTimer::start();
    let recipient = query.recipient.unwrap_or_else(|| actor.id.clone());
    if !actor.may_act_for(&recipient) {
        return Err(WorkflowError::NotPermitted(format!(
            "{} may not read notifications for {recipient}",
            actor.id
        ))
        .into());
    }

    let entries = state
        .outbox
        .list(&OutboxFilter {
            recipient_id: Some(recipient),
            include_delivered: query.include_delivered,
            limit: query.limit,
        })
        .await?;
    let views = entries
        .into_iter()
        .map(|e| NotificationView {
            event: e.event,
            delivered: e.delivered,
        })
        .collect();
    Ok(Json(timer.respond(views)))
}

/// Who a live subscription follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamScope {
    Everyone,
    Recipient(String),
}

impl StreamScope {
    pub fn matches(&self, event: &NotificationEvent) -> bool {
        match self {
            StreamScope::Everyone => true,
            StreamScope::Recipient(id) => event.recipient_ids.iter().any(|r| r == id),
        }
    }
}

/// GET /api/v1/notifications/stream - Live notification events as SSE.
///
/// Each event is sent with its kind as the SSE event name and the JSON
/// event as data. Same read rules as the outbox listing.
pub async fn stream_notifications(
    State(state): State<AppState>,
    RequestActor(actor): RequestActor,
    Query(query): Query<NotificationStreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let scope = match query.recipient.as_deref() {
        Some("*") if actor.is_privileged() => StreamScope::Everyone,
        Some("*") => {
            return Err(WorkflowError::NotPermitted(format!(
                "{} may not follow every notification",
                actor.id
            ))
            .into());
        }
        Some(recipient) if !actor.may_act_for(recipient) => {
            return Err(WorkflowError::NotPermitted(format!(
                "{} may not read notifications for {recipient}",
                actor.id
            ))
            .into());
        }
        Some(recipient) => StreamScope::Recipient(recipient.to_string()),
        None => StreamScope::Recipient(actor.id.clone()),
    };

    // Subscribe before returning so nothing committed after the response
    // starts is missed.
    let mut rx = state.event_bus.subscribe();
    tracing::debug!(actor = %actor.id, ?scope, "notification stream opened");

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) if scope.matches(&event) => match serde_json::to_string(&event) {
                    Ok(json) => {
                        yield Ok::<_, Infallible>(
                            Event::default().event(event.kind.to_string()).data(json),
                        );
                    }
                    Err(err) => {
                        tracing::warn!("failed to serialize notification event: {err}");
                    }
                },
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "notification stream lagged, skipping {n} events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

/// POST /api/v1/notifications/ack - Mark rows delivered (admin or system only).
pub async fn ack_notifications(
    State(state): State<AppState>,
    RequestActor(actor): RequestActor,
    Json(body): Json<AckBody>,
) -> Result<Json<ApiResponse<AckResult>>, AppError> {
    let timer = RequestTimer::start();
    if !actor.is_privileged() {
        return Err(WorkflowError::NotPermitted(
            "only delivery workers may acknowledge notifications".to_string(),
        )
        .into());
    }
    let acknowledged = state.outbox.mark_delivered(&body.ids).await?;
    Ok(Json(timer.respond(AckResult { acknowledged })))
}
