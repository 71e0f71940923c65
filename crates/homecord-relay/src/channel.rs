//! Delivery channel to the bot: streaming first, HTTP fallback second

use std::time::Duration;

use futures_util::{FutureExt, SinkExt, StreamExt};
use reqwest::Client;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::payload::{StreamEnvelope, UpdatePayload};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Timeout applied to the HTTP fallback request
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from a delivery attempt
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// No streaming URL is configured
    #[error("no streaming URL configured")]
    NoStreamingUrl,

    /// The streaming connect failed
    #[error("streaming connect to {url} failed: {source}")]
    Connect {
        url: String,
        #[source]
        source: WsError,
    },

    /// The streaming connect exceeded the configured timeout
    #[error("streaming connect to {url} timed out after {timeout:?}")]
    ConnectTimeout { url: String, timeout: Duration },

    /// A send on the established stream failed
    #[error("streaming send failed: {0}")]
    Send(#[from] WsError),

    /// The HTTP fallback request failed in transit
    #[error("fallback request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The HTTP fallback was rejected by the bot
    #[error("fallback request to {url} returned status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    /// The channel was shut down
    #[error("channel is closed")]
    Closed,

    /// Payload serialization failed
    #[error("payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Which path carried a delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Sent as a frame on the streaming connection
    Streamed,
    /// Sent as a one-shot HTTP POST
    HttpFallback,
}

/// Connection lifecycle tag, readable for logs and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

/// Connection lifecycle, with the live stream held in the Connected arm
enum Connection {
    Disconnected,
    Connecting,
    Connected(WsStream),
    Closing,
}

impl Connection {
    fn tag(&self) -> ChannelState {
        match self {
            Connection::Disconnected => ChannelState::Disconnected,
            Connection::Connecting => ChannelState::Connecting,
            Connection::Connected(_) => ChannelState::Connected,
            Connection::Closing => ChannelState::Closing,
        }
    }
}

/// Delivery channel for one configured bot target
///
/// Holds at most one streaming connection, established lazily on the
/// first send. Deliveries and the close are serialized on the connection
/// lock, so connection attempts never race and a payload is sent at most
/// once per path. Nothing is queued: a payload that cannot be streamed
/// goes out over HTTP or is dropped with an error, never retried later.
pub struct DeliveryChannel {
    http: Client,
    notify_url: String,
    ws_url: Option<String>,
    connect_timeout: Duration,
    connection: Mutex<Connection>,
}

impl DeliveryChannel {
    /// Create a channel for the bot at `bot_url`
    ///
    /// `ws_url` is the optional streaming endpoint; without it every
    /// delivery takes the HTTP path.
    pub fn new(
        bot_url: &str,
        ws_url: Option<String>,
        connect_timeout: Duration,
    ) -> Result<Self, DeliveryError> {
        let http = Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            http,
            notify_url: format!("{}/hacs/notify", bot_url.trim_end_matches('/')),
            ws_url,
            connect_timeout,
            connection: Mutex::new(Connection::Disconnected),
        })
    }

    /// Current lifecycle state
    pub async fn state(&self) -> ChannelState {
        self.connection.lock().await.tag()
    }

    /// Deliver one payload, streaming it when possible
    ///
    /// A dead stream is detected before the send and replaced; a send
    /// failure triggers exactly one reconnect-and-resend cycle. When the
    /// stream stays unusable the payload goes out as a single HTTP POST
    /// instead.
    pub async fn deliver(
        &self,
        payload: UpdatePayload,
    ) -> Result<DeliveryOutcome, DeliveryError> {
        let mut connection = self.connection.lock().await;

        if let Connection::Closing = *connection {
            return Err(DeliveryError::Closed);
        }

        let envelope = StreamEnvelope::update(payload);
        let frame = serde_json::to_string(&envelope)?;
        let payload = envelope.data;

        match self.ensure_connected(&mut connection).await {
            Ok(()) => match Self::send_frame(&mut connection, &frame).await {
                Ok(()) => return Ok(DeliveryOutcome::Streamed),
                Err(error) => {
                    warn!(error = %error, "Streaming send failed, reconnecting once");
                    Self::drop_stream(&mut connection).await;

                    match self.ensure_connected(&mut connection).await {
                        Ok(()) => match Self::send_frame(&mut connection, &frame).await {
                            Ok(()) => return Ok(DeliveryOutcome::Streamed),
                            Err(error) => {
                                warn!(error = %error, "Resend after reconnect failed, using HTTP fallback");
                                Self::drop_stream(&mut connection).await;
                            }
                        },
                        Err(error) => {
                            debug!(error = %error, "Reconnect failed, using HTTP fallback");
                        }
                    }
                }
            },
            Err(error) => {
                debug!(error = %error, "Streaming unavailable, using HTTP fallback");
            }
        }

        self.post_fallback(&payload).await?;
        Ok(DeliveryOutcome::HttpFallback)
    }

    /// Close the channel; further deliveries are refused
    ///
    /// Safe to call any number of times.
    pub async fn close(&self) {
        let mut connection = self.connection.lock().await;
        if let Connection::Connected(mut stream) =
            std::mem::replace(&mut *connection, Connection::Closing)
        {
            info!("Closing streaming connection");
            let _ = stream.close(None).await;
        }
    }

    /// Make sure a live stream is in place, connecting when necessary
    async fn ensure_connected(
        &self,
        connection: &mut Connection,
    ) -> Result<(), DeliveryError> {
        if let Connection::Connected(stream) = connection {
            if Self::stream_alive(stream) {
                return Ok(());
            }
            debug!("Streaming connection went stale, replacing it");
            Self::drop_stream(connection).await;
        }
        self.connect(connection).await
    }

    /// Drain any frames the bot pushed and check the stream still lives
    ///
    /// A pending close frame, EOF, or read error marks the stream dead.
    fn stream_alive(stream: &mut WsStream) -> bool {
        loop {
            match stream.next().now_or_never() {
                None => return true,
                Some(Some(Ok(Message::Close(_)))) | Some(Some(Err(_))) | Some(None) => {
                    return false
                }
                Some(Some(Ok(_))) => continue,
            }
        }
    }

    /// Establish a fresh streaming connection
    ///
    /// Any previous stream is closed first; a session is never leaked.
    async fn connect(&self, connection: &mut Connection) -> Result<(), DeliveryError> {
        let url = match self.ws_url.as_deref() {
            Some(url) => url,
            None => return Err(DeliveryError::NoStreamingUrl),
        };

        Self::drop_stream(connection).await;
        *connection = Connection::Connecting;

        debug!(url = %url, "Opening streaming connection");
        match timeout(self.connect_timeout, connect_async(url)).await {
            Ok(Ok((stream, _response))) => {
                info!(url = %url, "Streaming connection established");
                *connection = Connection::Connected(stream);
                Ok(())
            }
            Ok(Err(source)) => {
                *connection = Connection::Disconnected;
                Err(DeliveryError::Connect {
                    url: url.to_string(),
                    source,
                })
            }
            Err(_) => {
                *connection = Connection::Disconnected;
                Err(DeliveryError::ConnectTimeout {
                    url: url.to_string(),
                    timeout: self.connect_timeout,
                })
            }
        }
    }

    /// Close and discard the current stream, if any
    async fn drop_stream(connection: &mut Connection) {
        if let Connection::Connected(mut stream) =
            std::mem::replace(connection, Connection::Disconnected)
        {
            let _ = stream.close(None).await;
        }
    }

    /// Send one text frame on the connected stream
    async fn send_frame(connection: &mut Connection, frame: &str) -> Result<(), DeliveryError> {
        match connection {
            Connection::Connected(stream) => {
                stream.send(Message::Text(frame.to_string())).await?;
                Ok(())
            }
            _ => Err(DeliveryError::Send(WsError::AlreadyClosed)),
        }
    }

    /// POST the payload to the bot's notify endpoint
    async fn post_fallback(&self, payload: &UpdatePayload) -> Result<(), DeliveryError> {
        debug!(url = %self.notify_url, "Delivering over HTTP fallback");
        let response = self
            .http
            .post(&self.notify_url)
            .json(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DeliveryError::HttpStatus {
                url: self.notify_url.clone(),
                status: response.status(),
            });
        }
        Ok(())
    }
}
