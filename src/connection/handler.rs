// src/connection/handler.rs

//! Defines the `ConnectionHandler` which manages the full lifecycle of a client connection.

use super::guard::ConnectionGuard;
use super::session::SessionState;
use crate::core::commands::Command;
use crate::core::errors::CacheError;
use crate::core::events::Event;
use crate::core::handler;
use crate::core::protocol::{RespFrame, RespFrameCodec, RespValue};
use crate::core::pubsub::PubSubMessage;
use crate::core::state::ServerState;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Manages the full lifecycle of a client connection: parsing frames off the
/// wire, dispatching commands, and delivering pub/sub messages as they
/// arrive on the session's mailbox. A single task owns this loop, so there's
/// only ever one write in flight, and no separate CAS flag is needed to
/// enforce that.
pub struct ConnectionHandler {
    framed: Framed<TcpStream, RespFrameCodec>,
    addr: SocketAddr,
    state: Arc<ServerState>,
    session_id: u64,
    session_uuid: Uuid,
    shutdown_rx: broadcast::Receiver<()>,
    global_shutdown_rx: broadcast::Receiver<()>,
    session: SessionState,
}

impl ConnectionHandler {
    pub fn new(
        socket: TcpStream,
        addr: SocketAddr,
        state: Arc<ServerState>,
        session_id: u64,
        session_uuid: Uuid,
        shutdown_rx: broadcast::Receiver<()>,
        global_shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            framed: Framed::new(socket, RespFrameCodec),
            addr,
            state,
            session_id,
            session_uuid,
            shutdown_rx,
            global_shutdown_rx,
            session: SessionState::new(),
        }
    }

    /// The main event loop for the connection: reads frames, delivers
    /// pub/sub messages as they arrive, and honors shutdown signals.
    pub async fn run(mut self) {
        let mut guard = ConnectionGuard::new(
            self.state.clone(),
            self.session_id,
            self.session_uuid,
            self.addr,
        );

        loop {
            tokio::select! {
                biased;

                _ = self.global_shutdown_rx.recv() => {
                    info!("connection {} received global shutdown signal", self.addr);
                    let _ = self.framed.send(RespFrame::Error("SHUTDOWN server is shutting down".into())).await;
                    break;
                }
                _ = self.shutdown_rx.recv() => {
                    info!("connection {} received kill signal", self.addr);
                    break;
                }
                _ = self.session.sink.notified() => {
                    if self.drain_pubsub().await.is_err() {
                        break;
                    }
                }
                result = self.framed.next() => {
                    match result {
                        Some(Ok(frame)) => {
                            if let Err(e) = self.handle_frame(frame).await {
                                warn!("connection {} fatal write error: {}", self.addr, e);
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            if is_normal_disconnect(&e) {
                                debug!("connection {} closed by peer: {}", self.addr, e);
                            } else {
                                warn!("connection {} protocol error: {}", self.addr, e);
                            }
                            break;
                        }
                        None => {
                            debug!("connection {} closed by peer", self.addr);
                            break;
                        }
                    }
                }
            }
        }

        guard.record_subscriptions(
            self.session.subscribed_channels.drain(),
            self.session.subscribed_patterns.drain(),
        );
    }

    /// Parses and dispatches a single incoming frame, sending back its reply
    /// (or a protocol/command error) without tearing down the connection.
    async fn handle_frame(&mut self, frame: RespFrame) -> Result<(), CacheError> {
        let argv = match frame.into_command_args() {
            Ok(argv) => argv,
            Err(e) => return self.send_reply(RespValue::Error(e.to_resp_error_string())).await,
        };
        let arg_count = argv.len();

        let command = match Command::parse(argv) {
            Ok(command) => command,
            Err(e) => return self.send_reply(RespValue::Error(e.to_resp_error_string())).await,
        };

        let name = command.name().to_string();

        let result = self.dispatch(command).await;
        self.state.event_bus.post_event(Event::CommandProcessed { name, arg_count });

        match result {
            Ok(reply) => self.send_reply(reply).await,
            Err(e) => self.send_reply(RespValue::Error(e.to_resp_error_string())).await,
        }
    }

    /// Routes pub/sub subscription commands through the session's own
    /// `MessageSink`; everything else goes through the shared dispatcher.
    async fn dispatch(&mut self, command: Command) -> Result<RespValue, CacheError> {
        match command {
            Command::Subscribe { channels } => Ok(self.exec_subscribe(channels)),
            Command::Unsubscribe { channels } => Ok(self.exec_unsubscribe(channels)),
            Command::PSubscribe { patterns } => Ok(self.exec_psubscribe(patterns)),
            Command::PUnsubscribe { patterns } => Ok(self.exec_punsubscribe(patterns)),
            other => handler::execute(&self.state, other, self.session_id).await,
        }
    }

    fn exec_subscribe(&mut self, channels: Vec<Bytes>) -> RespValue {
        let mut replies = Vec::with_capacity(channels.len());
        for channel in channels {
            if self.session.subscribed_channels.insert(channel.clone()) {
                let sink: Arc<dyn crate::core::pubsub::MessageSink> = self.session.sink.clone();
                self.state.channel_manager.subscribe(&channel, self.session_id, &sink);
            }
            self.session.refresh_mode();
            replies.push(subscribe_reply("subscribe", Some(channel), self.session.subscription_count()));
        }
        RespValue::Array(replies)
    }

    fn exec_unsubscribe(&mut self, channels: Vec<Bytes>) -> RespValue {
        let targets = if channels.is_empty() {
            self.session.subscribed_channels.iter().cloned().collect()
        } else {
            channels
        };

        if targets.is_empty() {
            return RespValue::Array(vec![subscribe_reply("unsubscribe", None, 0)]);
        }

        let mut replies = Vec::with_capacity(targets.len());
        for channel in targets {
            self.session.subscribed_channels.remove(&channel);
            self.state.channel_manager.unsubscribe(&channel, self.session_id);
            self.session.refresh_mode();
            replies.push(subscribe_reply("unsubscribe", Some(channel), self.session.subscription_count()));
        }
        RespValue::Array(replies)
    }

    fn exec_psubscribe(&mut self, patterns: Vec<Bytes>) -> RespValue {
        let mut replies = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            if self.session.subscribed_patterns.insert(pattern.clone()) {
                let sink: Arc<dyn crate::core::pubsub::MessageSink> = self.session.sink.clone();
                self.state.channel_manager.subscribe_pattern(&pattern, self.session_id, sink);
            }
            self.session.refresh_mode();
            replies.push(subscribe_reply("psubscribe", Some(pattern), self.session.subscription_count()));
        }
        RespValue::Array(replies)
    }

    fn exec_punsubscribe(&mut self, patterns: Vec<Bytes>) -> RespValue {
        let targets = if patterns.is_empty() {
            self.session.subscribed_patterns.iter().cloned().collect()
        } else {
            patterns
        };

        if targets.is_empty() {
            return RespValue::Array(vec![subscribe_reply("punsubscribe", None, 0)]);
        }

        let mut replies = Vec::with_capacity(targets.len());
        for pattern in targets {
            self.session.subscribed_patterns.remove(&pattern);
            self.state.channel_manager.unsubscribe_pattern(&pattern, self.session_id);
            self.session.refresh_mode();
            replies.push(subscribe_reply("punsubscribe", Some(pattern), self.session.subscription_count()));
        }
        RespValue::Array(replies)
    }

    /// Drains every pub/sub message currently sitting in this session's
    /// mailbox and writes it out as a `message`/`pmessage` reply frame.
    async fn drain_pubsub(&mut self) -> Result<(), CacheError> {
        while let Some(msg) = self.session.sink.try_recv() {
            let reply = match msg {
                PubSubMessage::Message { channel, payload } => RespValue::Array(vec![
                    RespValue::BulkString(Bytes::from_static(b"message")),
                    RespValue::BulkString(channel),
                    RespValue::BulkString(payload),
                ]),
                PubSubMessage::PMessage { pattern, channel, payload } => RespValue::Array(vec![
                    RespValue::BulkString(Bytes::from_static(b"pmessage")),
                    RespValue::BulkString(pattern),
                    RespValue::BulkString(channel),
                    RespValue::BulkString(payload),
                ]),
            };
            self.send_reply(reply).await?;
        }
        Ok(())
    }

    async fn send_reply(&mut self, reply: RespValue) -> Result<(), CacheError> {
        self.framed.send(RespFrame::from(reply)).await?;
        Ok(())
    }
}

/// Builds a `["subscribe"|"unsubscribe"|..., name-or-nil, count]` reply.
fn subscribe_reply(kind: &'static str, name: Option<Bytes>, count: usize) -> RespValue {
    RespValue::Array(vec![
        RespValue::BulkString(Bytes::from_static(kind.as_bytes())),
        name.map(RespValue::BulkString).unwrap_or(RespValue::Null),
        RespValue::Integer(count as i64),
    ])
}

fn is_normal_disconnect(e: &CacheError) -> bool {
    matches!(e, CacheError::Io(arc_err) if matches!(
        arc_err.kind(),
        std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionAborted
    ))
}
