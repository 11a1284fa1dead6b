// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DNS wire transport: UDP datagrams and length-framed TCP.
//!
//! The transport is deliberately thin. It decodes wire messages, hands them
//! to the engine, and maps the two outcomes the engine cannot express in a
//! response by itself: a delegated query becomes REFUSED (a standalone
//! resolver has no next handler) and a not-ready engine becomes SERVFAIL.
//! Zone transfers only work over TCP, which is the one writer reporting
//! multi-message support.

use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, ResponseCode};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tracing::{debug, error, info, warn};

use crate::errors::GatewayError;
use crate::gateway::{Gateway, ResponseWriter, ServeOutcome};

/// Largest DNS message accepted over UDP.
const UDP_MESSAGE_MAX_BYTES: usize = 4096;

struct UdpResponseWriter {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
}

#[async_trait]
impl ResponseWriter for UdpResponseWriter {
    async fn write(&mut self, response: Message) -> io::Result<()> {
        let bytes = response.to_vec().map_err(io::Error::other)?;
        self.socket.send_to(&bytes, self.peer).await.map(|_| ())
    }
}

struct TcpResponseWriter<'a> {
    stream: &'a mut TcpStream,
}

#[async_trait]
impl ResponseWriter for TcpResponseWriter<'_> {
    async fn write(&mut self, response: Message) -> io::Result<()> {
        let bytes = response.to_vec().map_err(io::Error::other)?;
        let length = u16::try_from(bytes.len())
            .map_err(|_| io::Error::other("response exceeds TCP message size"))?;
        self.stream.write_all(&length.to_be_bytes()).await?;
        self.stream.write_all(&bytes).await
    }

    fn multi_message(&self) -> bool {
        true
    }
}

/// Serve queries from a bound UDP socket until the task is cancelled.
///
/// # Errors
///
/// Returns the first unrecoverable socket error.
pub async fn serve_udp(socket: UdpSocket, gateway: Arc<Gateway>) -> anyhow::Result<()> {
    let socket = Arc::new(socket);
    info!(addr = %socket.local_addr()?, "UDP server listening");
    let mut buffer = vec![0u8; UDP_MESSAGE_MAX_BYTES];
    loop {
        let (length, peer) = socket.recv_from(&mut buffer).await?;
        let packet = buffer[..length].to_vec();
        let socket = Arc::clone(&socket);
        let gateway = Arc::clone(&gateway);
        tokio::spawn(async move {
            let request = match Message::from_vec(&packet) {
                Ok(message) => message,
                Err(err) => {
                    debug!(peer = %peer, error = %err, "dropping undecodable datagram");
                    return;
                }
            };
            let mut writer = UdpResponseWriter { socket, peer };
            dispatch(&gateway, &request, &mut writer).await;
        });
    }
}

/// Serve queries and zone transfers from a TCP listener until cancelled.
///
/// # Errors
///
/// Returns the first unrecoverable accept error.
pub async fn serve_tcp(listener: TcpListener, gateway: Arc<Gateway>) -> anyhow::Result<()> {
    info!(addr = %listener.local_addr()?, "TCP server listening");
    loop {
        let (stream, peer) = listener.accept().await?;
        let gateway = Arc::clone(&gateway);
        tokio::spawn(async move {
            if let Err(err) = handle_tcp_connection(stream, &gateway).await {
                debug!(peer = %peer, error = %err, "TCP connection ended");
            }
        });
    }
}

async fn handle_tcp_connection(mut stream: TcpStream, gateway: &Arc<Gateway>) -> io::Result<()> {
    loop {
        let mut length_bytes = [0u8; 2];
        match stream.read_exact(&mut length_bytes).await {
            Ok(_) => {}
            // Clean close between messages.
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(err) => return Err(err),
        }
        let length = usize::from(u16::from_be_bytes(length_bytes));
        let mut packet = vec![0u8; length];
        stream.read_exact(&mut packet).await?;

        let request = match Message::from_vec(&packet) {
            Ok(message) => message,
            Err(err) => {
                debug!(error = %err, "dropping undecodable TCP message");
                continue;
            }
        };
        let mut writer = TcpResponseWriter {
            stream: &mut stream,
        };
        dispatch(gateway, &request, &mut writer).await;
    }
}

async fn dispatch(gateway: &Arc<Gateway>, request: &Message, writer: &mut dyn ResponseWriter) {
    match gateway.serve_dns(request, writer).await {
        Ok(ServeOutcome::Written(_)) => {}
        Ok(ServeOutcome::Delegated) => {
            // No next handler in a standalone deployment.
            let response = failure_response(request, ResponseCode::Refused, false);
            if let Err(err) = writer.write(response).await {
                warn!(error = %err, "failed to write REFUSED response");
            }
        }
        Err(err @ GatewayError::NotReady { .. }) => {
            error!(error = %err, "engine not ready, answering SERVFAIL");
            // The name is in a served zone, so the failure is still ours.
            let response = failure_response(request, ResponseCode::ServFail, true);
            if let Err(err) = writer.write(response).await {
                warn!(error = %err, "failed to write SERVFAIL response");
            }
        }
    }
}

fn failure_response(request: &Message, rcode: ResponseCode, authoritative: bool) -> Message {
    let mut response = Message::new();
    response.set_id(request.id());
    response.set_message_type(MessageType::Response);
    response.set_op_code(request.op_code());
    response.set_recursion_desired(request.recursion_desired());
    response.set_authoritative(authoritative);
    response.set_response_code(rcode);
    if let Some(query) = request.queries().first() {
        response.add_query(query.clone());
    }
    response
}
