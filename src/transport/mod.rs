//! Server-Sent Events transport
//!
//! A client holds one long-lived event stream (its session) and submits JSON-RPC
//! messages on a separate ingress endpoint. Responses travel back over the stream
//! when the session is alive, or inline on the ingress call otherwise.

pub mod session;

use serde_json::Value;
use tracing::warn;

pub use session::{format_frame, Session, SessionError, SessionRegistry, SessionStream};

pub const ENDPOINT_EVENT: &str = "endpoint";
pub const MESSAGE_EVENT: &str = "message";
pub const SESSION_ID_PARAM: &str = "sessionId";

#[derive(Debug, PartialEq)]
pub enum Delivery {
    /// The response was written to the session stream.
    Pushed,
    /// The response must be returned as the ingress call's body.
    Inline(Value),
}

/// Pushes `response` to the session named by `session_id`, falling back to an
/// inline delivery when the id is absent, unknown, or the push fails.
pub async fn deliver(
    sessions: &SessionRegistry,
    session_id: Option<&str>,
    response: Value,
) -> Delivery {
    let Some(session) = session_id.and_then(|id| sessions.get(id)) else {
        return Delivery::Inline(response);
    };

    match session.send(MESSAGE_EVENT, &response.to_string()).await {
        Ok(()) => Delivery::Pushed,
        Err(err) => {
            warn!(session_id = %session.id(), error = %err, "push failed, responding inline");
            Delivery::Inline(response)
        }
    }
}

/// URL a client posts its messages to, carrying the session id.
pub fn endpoint_url(base_url: &str, message_path: &str, session_id: &str) -> String {
    format!(
        "{}{}?{}={}",
        base_url.trim_end_matches('/'),
        message_path,
        SESSION_ID_PARAM,
        session_id
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use tokio_stream::StreamExt;

    use super::*;

    #[tokio::test]
    async fn pushes_to_live_sessions() {
        let sessions = Arc::new(SessionRegistry::new());
        let (session, mut stream) = sessions.open(8);
        let response = json!({"jsonrpc": "2.0", "id": 1, "result": {}});

        let delivery = deliver(&sessions, Some(session.id()), response).await;
        assert_eq!(delivery, Delivery::Pushed);

        let frame = stream.next().await.expect("frame").expect("infallible");
        assert_eq!(
            frame,
            "event: message\ndata: {\"id\":1,\"jsonrpc\":\"2.0\",\"result\":{}}\n\n"
        );
    }

    #[tokio::test]
    async fn falls_back_inline_for_unknown_or_missing_sessions() {
        let sessions = SessionRegistry::new();
        let response = json!({"jsonrpc": "2.0", "id": 2, "result": {}});

        assert_eq!(
            deliver(&sessions, None, response.clone()).await,
            Delivery::Inline(response.clone())
        );
        assert_eq!(
            deliver(&sessions, Some("no-such-session"), response.clone()).await,
            Delivery::Inline(response)
        );
    }

    #[tokio::test]
    async fn falls_back_inline_when_the_session_closed_mid_flight() {
        let sessions = Arc::new(SessionRegistry::new());
        let (session, stream) = sessions.open(8);
        let id = session.id().to_string();

        // Simulates a lookup that raced with the client disconnecting.
        let stale = Arc::new(SessionRegistry::new());
        drop(stream);
        stale.insert(Arc::clone(&session));

        let response = json!({"jsonrpc": "2.0", "id": 3, "result": {}});
        assert_eq!(
            deliver(&stale, Some(&id), response.clone()).await,
            Delivery::Inline(response)
        );
    }

    #[test]
    fn endpoint_url_embeds_the_session_id() {
        assert_eq!(
            endpoint_url("http://localhost:8080/", "/message", "abc"),
            "http://localhost:8080/message?sessionId=abc"
        );
    }
}
