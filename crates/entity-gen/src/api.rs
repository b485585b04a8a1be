use anyhow::{bail, Context};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type ApiStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Parsed Home Assistant WebSocket API message.
///
/// Only the envelope fields needed for the auth handshake and the
/// `get_states` reply are modeled; anything else collapses into `Other`
/// and is skipped.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApiMessage {
    AuthRequired {
        ha_version: Option<String>,
    },
    AuthOk {
        ha_version: Option<String>,
    },
    AuthInvalid {
        message: Option<String>,
    },
    #[serde(rename = "result")]
    CommandResult {
        id: u64,
        success: bool,
        #[serde(default)]
        result: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

/// One entity from a `get_states` snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct Entity {
    pub entity_id: String,
    #[serde(default)]
    pub attributes: EntityAttributes,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntityAttributes {
    pub friendly_name: Option<String>,
}

/// Command id used for the single `get_states` request.
const GET_STATES_ID: u64 = 1;

/// Connect to the Home Assistant WebSocket API, authenticate with the
/// given long-lived token, and fetch a full state snapshot.
pub async fn fetch_states(url: &str, token: &str) -> anyhow::Result<Vec<Entity>> {
    let (mut ws, _) = connect_async(url)
        .await
        .with_context(|| format!("failed to connect to {url}"))?;

    // The server speaks first with auth_required.
    match next_message(&mut ws).await? {
        ApiMessage::AuthRequired { ha_version } => {
            tracing::debug!(?ha_version, "authentication requested");
        }
        other => bail!("expected auth_required, got {other:?}"),
    }

    let auth = serde_json::json!({ "type": "auth", "access_token": token });
    ws.send(Message::text(auth.to_string())).await?;

    match next_message(&mut ws).await? {
        ApiMessage::AuthOk { .. } => {}
        ApiMessage::AuthInvalid { message } => {
            bail!(
                "authentication rejected: {}",
                message.unwrap_or_else(|| "no reason given".to_string())
            );
        }
        other => bail!("expected auth_ok, got {other:?}"),
    }

    let request = serde_json::json!({ "id": GET_STATES_ID, "type": "get_states" });
    ws.send(Message::text(request.to_string())).await?;

    loop {
        match next_message(&mut ws).await? {
            ApiMessage::CommandResult {
                id: GET_STATES_ID,
                success: true,
                result,
            } => {
                return serde_json::from_value(result).context("malformed get_states result");
            }
            ApiMessage::CommandResult {
                id: GET_STATES_ID,
                success: false,
                ..
            } => bail!("get_states request failed"),
            // Unrelated replies and events are skipped.
            _ => continue,
        }
    }
}

/// Read the next text frame and parse it as an [`ApiMessage`].
async fn next_message(ws: &mut ApiStream) -> anyhow::Result<ApiMessage> {
    while let Some(msg) = ws.next().await {
        match msg? {
            Message::Text(text) => {
                return serde_json::from_str(&text).context("unparseable API message");
            }
            Message::Close(_) => bail!("connection closed by Home Assistant"),
            _ => continue,
        }
    }
    bail!("connection ended before a reply arrived")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_auth_handshake_messages() {
        let msg: ApiMessage =
            serde_json::from_str(r#"{"type": "auth_required", "ha_version": "2024.6.1"}"#)
                .unwrap();
        assert!(matches!(msg, ApiMessage::AuthRequired { .. }));

        let msg: ApiMessage =
            serde_json::from_str(r#"{"type": "auth_invalid", "message": "bad token"}"#).unwrap();
        match msg {
            ApiMessage::AuthInvalid { message } => {
                assert_eq!(message.as_deref(), Some("bad token"));
            }
            other => panic!("expected auth_invalid, got {other:?}"),
        }
    }

    #[test]
    fn parses_get_states_result() {
        let raw = r#"{
            "type": "result",
            "id": 1,
            "success": true,
            "result": [
                {"entity_id": "light.kitchen", "attributes": {"friendly_name": "Kitchen"}},
                {"entity_id": "sensor.bare", "attributes": {}}
            ]
        }"#;
        let msg: ApiMessage = serde_json::from_str(raw).unwrap();
        let entities: Vec<Entity> = match msg {
            ApiMessage::CommandResult {
                success: true,
                result,
                ..
            } => serde_json::from_value(result).unwrap(),
            other => panic!("expected result, got {other:?}"),
        };

        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].entity_id, "light.kitchen");
        assert_eq!(
            entities[0].attributes.friendly_name.as_deref(),
            Some("Kitchen")
        );
        assert!(entities[1].attributes.friendly_name.is_none());
    }

    #[test]
    fn unknown_message_types_collapse_to_other() {
        let msg: ApiMessage =
            serde_json::from_str(r#"{"type": "event", "event": {"data": 1}}"#).unwrap();
        assert!(matches!(msg, ApiMessage::Other));
    }
}
