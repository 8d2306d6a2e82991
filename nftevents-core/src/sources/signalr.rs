//! Minimal SignalR client (JSON hub protocol over WebSockets).
//!
//! Supports what the TzKT event hub needs: negotiate, handshake, client
//! invocations with completions, server invocations, and keep-alive pings.
//! Frames are JSON documents terminated by the ASCII record separator.
//!
//! After the handshake a spawned task owns the socket. It keeps pinging and
//! reading no matter how slowly the caller consumes invocations.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::connect_async_with_config;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tracing::{debug, trace, warn};
use url::Url;

/// Frame terminator of the JSON hub protocol.
pub const RECORD_SEPARATOR: char = '\u{1e}';

/// Largest accepted incoming message.
pub const MAX_MESSAGE_SIZE: usize = 1 << 20;

/// Interval of client keep-alive pings.
pub const PING_INTERVAL: Duration = Duration::from_secs(15);

/// Server invocations held while the caller is busy.
pub const MAX_BUFFERED_INVOCATIONS: usize = 1024;

const MESSAGE_INVOCATION: u8 = 1;
const MESSAGE_COMPLETION: u8 = 3;
const MESSAGE_PING: u8 = 6;
const MESSAGE_CLOSE: u8 = 7;

/// Errors of the hub connection.
#[derive(Debug, Error)]
pub enum SignalrError {
    /// Negotiate request failed at the transport level
    #[error("negotiate request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Hub URL is invalid
    #[error("invalid hub url: {0}")]
    Url(#[from] url::ParseError),

    /// WebSocket failure
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// A frame is not valid JSON
    #[error("invalid hub frame: {0}")]
    Json(#[from] serde_json::Error),

    /// The server refused the negotiation
    #[error("negotiate rejected: {0}")]
    Negotiate(String),

    /// The server refused the protocol handshake
    #[error("handshake rejected: {0}")]
    Handshake(String),

    /// Connecting took longer than allowed
    #[error("hub connection timed out")]
    Timeout,

    /// A client invocation completed with an error
    #[error("invocation of {target} failed: {error}")]
    Invocation { target: String, error: String },

    /// The connection was closed
    #[error("hub connection closed{}", .0.as_deref().map(|e| format!(": {e}")).unwrap_or_default())]
    Closed(Option<String>),

    /// Text without a record separator outgrew the message limit
    #[error("incomplete hub frame of {0} bytes exceeds {max} bytes", max = MAX_MESSAGE_SIZE)]
    FrameTooLarge(usize),

    /// The caller stopped consuming server invocations
    #[error("more than {max} hub invocations are waiting", max = MAX_BUFFERED_INVOCATIONS)]
    Backlog,
}

/// A decoded hub protocol message.
#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    Invocation {
        invocation_id: Option<String>,
        target: String,
        arguments: Vec<Value>,
    },
    Completion {
        invocation_id: String,
        result: Option<Value>,
        error: Option<String>,
    },
    Ping,
    Close {
        error: Option<String>,
    },
    /// Stream items, cancellations and anything newer.
    Other(u8),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawHubMessage {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    invocation_id: Option<String>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    arguments: Vec<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

impl HubMessage {
    pub fn parse(frame: &str) -> Result<Self, SignalrError> {
        let raw: RawHubMessage = serde_json::from_str(frame)?;
        Ok(match raw.kind {
            MESSAGE_INVOCATION => HubMessage::Invocation {
                invocation_id: raw.invocation_id,
                target: raw.target.unwrap_or_default(),
                arguments: raw.arguments,
            },
            MESSAGE_COMPLETION => HubMessage::Completion {
                invocation_id: raw.invocation_id.unwrap_or_default(),
                result: raw.result,
                error: raw.error,
            },
            MESSAGE_PING => HubMessage::Ping,
            MESSAGE_CLOSE => HubMessage::Close { error: raw.error },
            other => HubMessage::Other(other),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InvocationFrame<'a> {
    #[serde(rename = "type")]
    kind: u8,
    invocation_id: &'a str,
    target: &'a str,
    arguments: &'a [Value],
}

/// Encode a client invocation expecting a completion.
pub fn encode_invocation(
    invocation_id: &str,
    target: &str,
    arguments: &[Value],
) -> Result<String, SignalrError> {
    let mut frame = serde_json::to_string(&InvocationFrame {
        kind: MESSAGE_INVOCATION,
        invocation_id,
        target,
        arguments,
    })?;
    frame.push(RECORD_SEPARATOR);
    Ok(frame)
}

fn ping_frame() -> String {
    format!("{{\"type\":{MESSAGE_PING}}}{RECORD_SEPARATOR}")
}

fn handshake_frame() -> String {
    format!("{{\"protocol\":\"json\",\"version\":1}}{RECORD_SEPARATOR}")
}

/// Reassembles frames that may be split across WebSocket messages.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    pending: String,
}

impl FrameBuffer {
    /// Append received text and return every completed frame.
    ///
    /// The unterminated tail may not grow beyond [`MAX_MESSAGE_SIZE`].
    pub fn push(&mut self, text: &str) -> Result<Vec<String>, SignalrError> {
        self.pending.push_str(text);
        let Some(last) = self.pending.rfind(RECORD_SEPARATOR) else {
            return self.check_tail().map(|()| Vec::new());
        };
        let rest = self.pending.split_off(last + RECORD_SEPARATOR.len_utf8());
        let complete = std::mem::replace(&mut self.pending, rest);
        self.check_tail()?;
        Ok(complete
            .split(RECORD_SEPARATOR)
            .filter(|frame| !frame.is_empty())
            .map(str::to_owned)
            .collect())
    }

    fn check_tail(&mut self) -> Result<(), SignalrError> {
        let len = self.pending.len();
        if len > MAX_MESSAGE_SIZE {
            self.pending.clear();
            return Err(SignalrError::FrameTooLarge(len));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NegotiateResponse {
    #[serde(default)]
    connection_id: Option<String>,
    #[serde(default)]
    connection_token: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Transport the connection task drives. Implemented by any WebSocket stream.
pub trait HubSocket:
    Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Send + Unpin + 'static
{
}

impl<T> HubSocket for T where
    T: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Send + Unpin + 'static
{
}

type InvocationReply = oneshot::Sender<Result<Option<Value>, SignalrError>>;

/// A server invocation: target and arguments, or the error that ended the
/// connection.
type ServerInvocation = Result<(String, Vec<Value>), SignalrError>;

struct InvokeCommand {
    target: String,
    arguments: Vec<Value>,
    reply: InvocationReply,
}

/// Handle to an established hub connection.
///
/// Dropping the handle closes the connection.
pub struct HubConnection {
    commands: mpsc::Sender<InvokeCommand>,
    invocations: mpsc::Receiver<ServerInvocation>,
}

impl HubConnection {
    /// Negotiate, open the WebSocket and complete the protocol handshake,
    /// all within `timeout`.
    pub async fn connect(hub_url: &Url, http: &Client, timeout: Duration) -> Result<Self, SignalrError> {
        tokio::time::timeout(timeout, Self::establish(hub_url, http))
            .await
            .map_err(|_| SignalrError::Timeout)?
    }

    async fn establish(hub_url: &Url, http: &Client) -> Result<Self, SignalrError> {
        let mut negotiate_url = Url::parse(&format!(
            "{}/negotiate",
            hub_url.as_str().trim_end_matches('/')
        ))?;
        negotiate_url
            .query_pairs_mut()
            .append_pair("negotiateVersion", "1");

        let negotiated: NegotiateResponse = http
            .post(negotiate_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if let Some(error) = negotiated.error {
            return Err(SignalrError::Negotiate(error));
        }
        if let Some(redirect) = negotiated.url {
            return Err(SignalrError::Negotiate(format!(
                "redirect to {redirect} is not supported"
            )));
        }
        let token = negotiated
            .connection_token
            .or(negotiated.connection_id)
            .ok_or_else(|| SignalrError::Negotiate("no connection token".to_owned()))?;

        let ws_url = websocket_url(hub_url, &token)?;
        let config = WebSocketConfig {
            max_message_size: Some(MAX_MESSAGE_SIZE),
            ..Default::default()
        };
        let (socket, _) = connect_async_with_config(ws_url.as_str(), Some(config), false).await?;
        let connection = Self::handshake(socket).await?;
        debug!(hub = %hub_url, "Hub handshake completed");
        Ok(connection)
    }

    /// Run the protocol handshake on an open socket and hand the socket to
    /// the connection task.
    pub async fn handshake<S: HubSocket>(mut socket: S) -> Result<Self, SignalrError> {
        socket.send(Message::Text(handshake_frame())).await?;

        let mut frames = FrameBuffer::default();
        let mut inbound = VecDeque::new();
        let mut handshake_done = false;
        while !handshake_done {
            let text = match socket.next().await {
                Some(Ok(Message::Text(text))) => text,
                Some(Ok(Message::Close(frame))) => {
                    return Err(SignalrError::Closed(frame.map(|f| f.reason.to_string())));
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => return Err(SignalrError::Closed(None)),
            };
            for frame in frames.push(&text)? {
                if !handshake_done {
                    let response: Value = serde_json::from_str(&frame)?;
                    if let Some(error) = response.get("error").and_then(Value::as_str) {
                        return Err(SignalrError::Handshake(error.to_owned()));
                    }
                    handshake_done = true;
                } else {
                    inbound.push_back(HubMessage::parse(&frame)?);
                }
            }
        }

        let (commands, command_rx) = mpsc::channel(16);
        let (invocation_tx, invocations) = mpsc::channel(16);
        tokio::spawn(
            ConnectionTask {
                socket,
                frames,
                inbound,
                waiting: HashMap::new(),
                outbox: VecDeque::new(),
                next_invocation_id: 0,
            }
            .run(command_rx, invocation_tx),
        );
        Ok(Self {
            commands,
            invocations,
        })
    }

    /// Invoke a hub method and wait for its completion.
    ///
    /// Server invocations arriving in the meantime are kept and returned by
    /// later calls to [`next_invocation`](Self::next_invocation).
    pub async fn invoke(&mut self, target: &str, arguments: Vec<Value>) -> Result<Option<Value>, SignalrError> {
        let (reply, completion) = oneshot::channel();
        self.commands
            .send(InvokeCommand {
                target: target.to_owned(),
                arguments,
                reply,
            })
            .await
            .map_err(|_| SignalrError::Closed(None))?;
        completion.await.map_err(|_| SignalrError::Closed(None))?
    }

    /// Wait for the next server invocation.
    ///
    /// Returns the invocation target and its arguments.
    pub async fn next_invocation(&mut self) -> Result<(String, Vec<Value>), SignalrError> {
        self.invocations
            .recv()
            .await
            .unwrap_or(Err(SignalrError::Closed(None)))
    }
}

/// Owns the socket: answers the keep-alive, sends invocations, matches
/// completions and queues server invocations for the handle.
struct ConnectionTask<S> {
    socket: S,
    frames: FrameBuffer,
    inbound: VecDeque<HubMessage>,
    waiting: HashMap<String, (String, InvocationReply)>,
    outbox: VecDeque<(String, Vec<Value>)>,
    next_invocation_id: u64,
}

impl<S: HubSocket> ConnectionTask<S> {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<InvokeCommand>,
        invocations: mpsc::Sender<ServerInvocation>,
    ) {
        let mut ping = tokio::time::interval_at(Instant::now() + PING_INTERVAL, PING_INTERVAL);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let outcome: Result<(), SignalrError> = loop {
            if let Err(e) = self.dispatch_inbound() {
                break Err(e);
            }

            tokio::select! {
                _ = ping.tick() => {
                    trace!("Sending hub ping");
                    if let Err(e) = self.socket.send(Message::Text(ping_frame())).await {
                        break Err(e.into());
                    }
                }

                command = commands.recv() => match command {
                    Some(command) => {
                        if let Err(e) = self.send_invocation(command).await {
                            break Err(e);
                        }
                    }
                    // The handle is gone.
                    None => break Ok(()),
                },

                permit = invocations.reserve(), if !self.outbox.is_empty() => match permit {
                    Ok(permit) => {
                        if let Some(invocation) = self.outbox.pop_front() {
                            permit.send(Ok(invocation));
                        }
                    }
                    Err(_) => break Ok(()),
                },

                incoming = self.socket.next() => {
                    if let Err(e) = self.receive(incoming) {
                        break Err(e);
                    }
                }
            }
        };

        match outcome {
            Ok(()) => {
                let _ = self.socket.close().await;
                debug!("Hub connection closed by client");
            }
            Err(e) => {
                warn!(error = %e, "Hub connection lost");
                let reason = e.to_string();
                for (_, (_, reply)) in self.waiting.drain() {
                    let _ = reply.send(Err(SignalrError::Closed(Some(reason.clone()))));
                }
                // Hand over what was already received, then the error.
                for invocation in self.outbox.drain(..) {
                    if invocations.send(Ok(invocation)).await.is_err() {
                        return;
                    }
                }
                let _ = invocations.send(Err(e)).await;
            }
        }
    }

    fn receive(&mut self, incoming: Option<Result<Message, WsError>>) -> Result<(), SignalrError> {
        match incoming {
            Some(Ok(Message::Text(text))) => {
                for frame in self.frames.push(&text)? {
                    self.inbound.push_back(HubMessage::parse(&frame)?);
                }
                Ok(())
            }
            Some(Ok(Message::Close(frame))) => {
                Err(SignalrError::Closed(frame.map(|f| f.reason.to_string())))
            }
            Some(Ok(_)) => Ok(()),
            Some(Err(e)) => Err(e.into()),
            None => Err(SignalrError::Closed(None)),
        }
    }

    fn dispatch_inbound(&mut self) -> Result<(), SignalrError> {
        while let Some(message) = self.inbound.pop_front() {
            match message {
                HubMessage::Invocation {
                    target, arguments, ..
                } => {
                    if self.outbox.len() >= MAX_BUFFERED_INVOCATIONS {
                        return Err(SignalrError::Backlog);
                    }
                    self.outbox.push_back((target, arguments));
                }
                HubMessage::Completion {
                    invocation_id,
                    result,
                    error,
                } => match self.waiting.remove(&invocation_id) {
                    Some((target, reply)) => {
                        let outcome = match error {
                            Some(error) => Err(SignalrError::Invocation { target, error }),
                            None => Ok(result),
                        };
                        let _ = reply.send(outcome);
                    }
                    None => trace!(invocation_id = %invocation_id, "Completion of unknown invocation"),
                },
                HubMessage::Close { error } => return Err(SignalrError::Closed(error)),
                HubMessage::Ping => trace!("Hub ping"),
                other => trace!(message = ?other, "Ignoring hub message"),
            }
        }
        Ok(())
    }

    async fn send_invocation(&mut self, command: InvokeCommand) -> Result<(), SignalrError> {
        self.next_invocation_id += 1;
        let id = self.next_invocation_id.to_string();
        let frame = match encode_invocation(&id, &command.target, &command.arguments) {
            Ok(frame) => frame,
            Err(e) => {
                let _ = command.reply.send(Err(e));
                return Ok(());
            }
        };
        self.socket.send(Message::Text(frame)).await?;
        self.waiting.insert(id, (command.target, command.reply));
        Ok(())
    }
}

/// Turn the hub URL into its WebSocket URL carrying the connection token.
pub fn websocket_url(hub_url: &Url, token: &str) -> Result<Url, SignalrError> {
    let mut url = hub_url.clone();
    let scheme = match hub_url.scheme() {
        "https" | "wss" => "wss",
        _ => "ws",
    };
    url.set_scheme(scheme)
        .map_err(|_| SignalrError::Negotiate(format!("cannot use {hub_url} as websocket url")))?;
    url.query_pairs_mut().append_pair("id", token);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::DuplexStream;
    use tokio_tungstenite::WebSocketStream;
    use tokio_tungstenite::tungstenite::protocol::Role;

    type ServerSide = WebSocketStream<DuplexStream>;

    async fn next_text(server: &mut ServerSide) -> String {
        loop {
            if let Message::Text(text) = server.next().await.unwrap().unwrap() {
                return text;
            }
        }
    }

    /// A handshaken connection over an in-memory socket, plus the server end.
    async fn connected() -> (HubConnection, ServerSide) {
        let (client, server) = tokio::io::duplex(1 << 16);
        let client = WebSocketStream::from_raw_socket(client, Role::Client, None).await;
        let mut server = WebSocketStream::from_raw_socket(server, Role::Server, None).await;
        let serve = async move {
            assert_eq!(next_text(&mut server).await, handshake_frame());
            server
                .send(Message::Text(format!("{{}}{RECORD_SEPARATOR}")))
                .await
                .unwrap();
            server
        };
        let (connection, server) = tokio::join!(HubConnection::handshake(client), serve);
        (connection.unwrap(), server)
    }

    fn transfers_invocation(state: u64) -> Message {
        Message::Text(format!(
            r#"{{"type":1,"target":"transfers","arguments":[{{"type":0,"state":{state}}}]}}{RECORD_SEPARATOR}"#
        ))
    }

    #[test]
    fn buffer_reassembles_split_frames() {
        let mut buffer = FrameBuffer::default();
        assert!(buffer.push("{\"type\":6}\u{1e}{\"type\":1,").unwrap().len() == 1);
        let frames = buffer
            .push("\"target\":\"transfers\",\"arguments\":[]}\u{1e}")
            .unwrap();
        assert_eq!(frames, vec!["{\"type\":1,\"target\":\"transfers\",\"arguments\":[]}"]);
        assert!(buffer.push("").unwrap().is_empty());
    }

    #[test]
    fn buffer_rejects_unterminated_text_beyond_limit() {
        let mut buffer = FrameBuffer::default();
        let chunk = "a".repeat(MAX_MESSAGE_SIZE / 2 + 1);
        assert!(buffer.push(&chunk).unwrap().is_empty());
        assert!(matches!(
            buffer.push(&chunk),
            Err(SignalrError::FrameTooLarge(len)) if len == chunk.len() * 2
        ));
        // The buffer starts over after the error.
        assert_eq!(buffer.push("{}\u{1e}").unwrap(), vec!["{}"]);
    }

    #[test]
    fn buffer_limit_applies_to_tail_after_complete_frames() {
        let mut buffer = FrameBuffer::default();
        let text = format!("{{}}{RECORD_SEPARATOR}{}", "a".repeat(MAX_MESSAGE_SIZE + 1));
        assert!(matches!(buffer.push(&text), Err(SignalrError::FrameTooLarge(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_pinging_while_caller_is_busy() {
        let (mut connection, mut server) = connected().await;
        for state in 0..20 {
            server.send(transfers_invocation(state)).await.unwrap();
        }

        // The caller does not touch the connection, as during a long catch-up
        // or while its own consumer is backed up.
        tokio::time::sleep(PING_INTERVAL * 2 + Duration::from_secs(1)).await;
        for _ in 0..2 {
            let frame = tokio::time::timeout(Duration::from_secs(1), next_text(&mut server))
                .await
                .unwrap();
            assert_eq!(frame, ping_frame());
        }

        for state in 0..20 {
            let (target, arguments) = connection.next_invocation().await.unwrap();
            assert_eq!(target, "transfers");
            assert_eq!(arguments[0]["state"], state);
        }
    }

    #[tokio::test]
    async fn invoke_waits_for_its_completion_and_keeps_server_invocations() {
        let (mut connection, mut server) = connected().await;
        let serve = async move {
            let frame = next_text(&mut server).await;
            let request: Value =
                serde_json::from_str(frame.trim_end_matches(RECORD_SEPARATOR)).unwrap();
            assert_eq!(request["target"], "SubscribeToTokenTransfers");
            let id = request["invocationId"].as_str().unwrap().to_owned();
            server.send(transfers_invocation(5)).await.unwrap();
            server
                .send(Message::Text(format!(
                    r#"{{"type":3,"invocationId":"{id}","result":7}}{RECORD_SEPARATOR}"#
                )))
                .await
                .unwrap();
            server
        };
        let (result, _server) = tokio::join!(
            connection.invoke("SubscribeToTokenTransfers", vec![json!({})]),
            serve
        );

        assert_eq!(result.unwrap(), Some(json!(7)));
        let (target, arguments) = connection.next_invocation().await.unwrap();
        assert_eq!(target, "transfers");
        assert_eq!(arguments[0]["state"], 5);
    }

    #[tokio::test]
    async fn failed_completion_is_an_invocation_error() {
        let (mut connection, mut server) = connected().await;
        let serve = async move {
            let frame = next_text(&mut server).await;
            let request: Value =
                serde_json::from_str(frame.trim_end_matches(RECORD_SEPARATOR)).unwrap();
            let id = request["invocationId"].as_str().unwrap().to_owned();
            server
                .send(Message::Text(format!(
                    r#"{{"type":3,"invocationId":"{id}","error":"denied"}}{RECORD_SEPARATOR}"#
                )))
                .await
                .unwrap();
            server
        };
        let (result, _server) = tokio::join!(
            connection.invoke("SubscribeToBigMaps", vec![json!({})]),
            serve
        );

        assert!(matches!(
            result,
            Err(SignalrError::Invocation { target, error })
                if target == "SubscribeToBigMaps" && error == "denied"
        ));
    }

    #[tokio::test]
    async fn close_message_ends_the_invocation_stream() {
        let (mut connection, mut server) = connected().await;
        server.send(transfers_invocation(1)).await.unwrap();
        server
            .send(Message::Text(format!(r#"{{"type":7,"error":"bye"}}{RECORD_SEPARATOR}"#)))
            .await
            .unwrap();

        assert!(connection.next_invocation().await.is_ok());
        assert!(matches!(
            connection.next_invocation().await,
            Err(SignalrError::Closed(Some(reason))) if reason == "bye"
        ));
        assert!(matches!(
            connection.next_invocation().await,
            Err(SignalrError::Closed(None))
        ));
    }

    #[test]
    fn parses_server_invocation() {
        let message = HubMessage::parse(
            r#"{"type":1,"target":"transfers","arguments":[{"type":1,"state":10,"data":[]}]}"#,
        )
        .unwrap();
        assert!(matches!(
            &message,
            HubMessage::Invocation { target, arguments, .. }
                if target == "transfers" && arguments[0]["state"] == 10
        ));
    }

    #[test]
    fn parses_completion_ping_and_close() {
        assert_eq!(
            HubMessage::parse(r#"{"type":3,"invocationId":"1","result":5}"#).unwrap(),
            HubMessage::Completion {
                invocation_id: "1".to_owned(),
                result: Some(json!(5)),
                error: None,
            }
        );
        assert_eq!(HubMessage::parse(r#"{"type":6}"#).unwrap(), HubMessage::Ping);
        assert_eq!(
            HubMessage::parse(r#"{"type":7,"error":"bye"}"#).unwrap(),
            HubMessage::Close {
                error: Some("bye".to_owned())
            }
        );
        assert_eq!(HubMessage::parse(r#"{"type":2,"item":1}"#).unwrap(), HubMessage::Other(2));
    }

    #[test]
    fn encodes_invocation_with_separator() {
        let frame = encode_invocation(
            "2",
            "SubscribeToBigMaps",
            &[json!({"tags": ["token_metadata"]})],
        )
        .unwrap();
        assert!(frame.ends_with(RECORD_SEPARATOR));
        let value: Value = serde_json::from_str(frame.trim_end_matches(RECORD_SEPARATOR)).unwrap();
        assert_eq!(value["type"], 1);
        assert_eq!(value["invocationId"], "2");
        assert_eq!(value["target"], "SubscribeToBigMaps");
        assert_eq!(value["arguments"][0]["tags"][0], "token_metadata");
    }

    #[test]
    fn websocket_url_swaps_scheme_and_adds_token() {
        let hub = Url::parse("https://api.tzkt.io/v1/ws").unwrap();
        let url = websocket_url(&hub, "abc").unwrap();
        assert_eq!(url.as_str(), "wss://api.tzkt.io/v1/ws?id=abc");
    }
}
