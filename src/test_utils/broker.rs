//! Single-client MQTT 3.1.1 broker for driving a collector over a real socket.
//!
//! It accepts every CONNECT and SUBSCRIBE, answers pings and forwards the
//! publishes queued through [`FakeBroker::publish`] at QoS 0 once the client
//! has subscribed.

use anyhow::Result;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::debug;

const CONNECT: u8 = 0x10;
const SUBSCRIBE: u8 = 0x80;
const PINGREQ: u8 = 0xC0;
const DISCONNECT: u8 = 0xE0;

const CONNACK: [u8; 4] = [0x20, 0x02, 0x00, 0x00];
const PINGRESP: [u8; 2] = [0xD0, 0x00];
const SUBACK: u8 = 0x90;
const PUBLISH_QOS0: u8 = 0x30;

type Message = (String, Vec<u8>);

#[derive(Debug)]
pub struct FakeBroker {
    address: SocketAddr,
    publishes: mpsc::UnboundedSender<Message>,
}

impl FakeBroker {
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?;
        let (publishes, mut queued) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Ok((stream, peer)) = listener.accept().await {
                debug!("Fake broker accepted {}", peer);
                if serve(stream, &mut queued).await.is_err() {
                    debug!("Fake broker lost {}", peer);
                }
            }
        });
        Ok(Self { address, publishes })
    }

    pub fn port(&self) -> u16 {
        self.address.port()
    }

    /// Queues a publish, sent as soon as a client is subscribed.
    pub fn publish(&self, topic: &str, payload: &[u8]) {
        let _ = self.publishes.send((topic.to_string(), payload.to_vec()));
    }
}

async fn serve(stream: TcpStream, queued: &mut mpsc::UnboundedReceiver<Message>) -> Result<()> {
    let (mut reader, mut writer) = stream.into_split();
    let (incoming_sender, mut incoming) = mpsc::unbounded_channel();
    let reader_task = tokio::spawn(async move {
        while let Ok(packet) = read_packet(&mut reader).await {
            if incoming_sender.send(packet).is_err() {
                break;
            }
        }
    });

    let mut subscribed = false;
    let result = loop {
        tokio::select! {
            packet = incoming.recv() => {
                let Some((header, body)) = packet else { break Ok(()) };
                match header & 0xF0 {
                    CONNECT => writer.write_all(&CONNACK).await?,
                    SUBSCRIBE => {
                        let packet_id = body.get(..2).unwrap_or(&[0, 0]);
                        let suback = encode(SUBACK, &[packet_id[0], packet_id[1], 0x01]);
                        writer.write_all(&suback).await?;
                        subscribed = true;
                    }
                    PINGREQ => writer.write_all(&PINGRESP).await?,
                    DISCONNECT => break Ok(()),
                    _ => {}
                }
            }
            Some((topic, payload)) = queued.recv(), if subscribed => {
                writer.write_all(&encode_publish(&topic, &payload)).await?;
            }
        }
    };
    reader_task.abort();
    result
}

async fn read_packet(reader: &mut OwnedReadHalf) -> std::io::Result<(u8, Vec<u8>)> {
    let header = reader.read_u8().await?;
    let mut length = 0usize;
    let mut shift = 0;
    loop {
        let byte = reader.read_u8().await?;
        length |= usize::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    let mut body = vec![0; length];
    reader.read_exact(&mut body).await?;
    Ok((header, body))
}

fn encode_publish(topic: &str, payload: &[u8]) -> Vec<u8> {
    let topic_length = topic.len() as u16;
    let mut body = Vec::with_capacity(2 + topic.len() + payload.len());
    body.extend_from_slice(&topic_length.to_be_bytes());
    body.extend_from_slice(topic.as_bytes());
    body.extend_from_slice(payload);
    encode(PUBLISH_QOS0, &body)
}

/// Fixed header with the variable-length remaining length, then the body.
fn encode(header: u8, body: &[u8]) -> Vec<u8> {
    let mut packet = vec![header];
    let mut remaining = body.len();
    loop {
        let mut byte = (remaining % 128) as u8;
        remaining /= 128;
        if remaining > 0 {
            byte |= 0x80;
        }
        packet.push(byte);
        if remaining == 0 {
            break;
        }
    }
    packet.extend_from_slice(body);
    packet
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining_length_uses_continuation_bytes() {
        assert_eq!(encode(PUBLISH_QOS0, &[]), vec![0x30, 0x00]);
        let packet = encode(PUBLISH_QOS0, &[0; 200]);
        assert_eq!(&packet[..3], &[0x30, 0xC8, 0x01]);
        assert_eq!(packet.len(), 203);
    }

    #[test]
    fn test_publish_layout() {
        let packet = encode_publish("a/b", b"{}");
        assert_eq!(packet, vec![0x30, 0x07, 0x00, 0x03, b'a', b'/', b'b', b'{', b'}']);
    }
}
