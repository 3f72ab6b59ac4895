//! Scripted LDAP server on the loopback interface.
//!
//! Connections are served one after the other, until the client unbinds or
//! hangs up. Binds succeed when the DN and password pair is known; every
//! search is answered with the same script.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, SendError, Sender};
use std::time::Duration;

use ldap3::asn1::{PL, StructureTag, TagClass, parse_tag};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Builder;

use crate::ldap::DirectoryEntry;

const INTEGER: u64 = 2;
const OCTET_STRING: u64 = 4;
const ENUMERATED: u64 = 10;
const SEQUENCE: u64 = 16;
const SET: u64 = 17;

const BIND_REQUEST: u64 = 0;
const BIND_RESPONSE: u64 = 1;
const UNBIND_REQUEST: u64 = 2;
const SEARCH_REQUEST: u64 = 3;
const SEARCH_RESULT_ENTRY: u64 = 4;
const SEARCH_RESULT_DONE: u64 = 5;
const SEARCH_RESULT_REFERENCE: u64 = 19;
const INTERMEDIATE_RESPONSE: u64 = 25;

pub const SUCCESS: i64 = 0;
pub const INVALID_CREDENTIALS: i64 = 49;
pub const INSUFFICIENT_ACCESS_RIGHTS: i64 = 50;

/// Operation received by the [`Responder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Bind { dn: String, password: String },
    Search { base: String, attrs: Vec<String> },
    Other(u64),
}

#[derive(Debug)]
enum Event {
    Request(Request),
    Closed,
}

/// One message sent back for a search.
#[derive(Debug, Clone)]
pub enum Reply {
    Entry(DirectoryEntry),
    Referral(String),
    Intermediate,
    Done(i64),
}

pub struct Responder {
    url: String,
    events: Receiver<Event>,
}

impl Responder {
    pub fn start(passwords: &[(&str, &str)], script: Vec<Reply>) -> Self {
        let listener =
            std::net::TcpListener::bind("127.0.0.1:0").expect("loopback listener");
        let url = format!("ldap://{}", listener.local_addr().expect("address"));
        listener.set_nonblocking(true).expect("non-blocking listener");

        let passwords: HashMap<String, String> = passwords
            .iter()
            .map(|(dn, password)| (dn.to_string(), password.to_string()))
            .collect();
        let (sender, events) = mpsc::channel();

        std::thread::spawn(move || {
            let runtime = Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("responder runtime");

            runtime.block_on(async move {
                let listener =
                    TcpListener::from_std(listener).expect("tokio listener");
                while let Ok((socket, _)) = listener.accept().await {
                    // The test is over once nobody listens to events.
                    let served = serve(socket, &passwords, &script, &sender).await;
                    if served.and_then(|()| sender.send(Event::Closed)).is_err() {
                        break;
                    }
                }
            });
        });

        Self { url, events }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Requests of the next connection, once the client has closed it.
    ///
    /// # Panics
    ///
    /// Panics when the connection is still open after a few seconds.
    pub fn session(&self) -> Vec<Request> {
        let mut requests = Vec::new();
        loop {
            match self.events.recv_timeout(Duration::from_secs(5)) {
                Ok(Event::Request(request)) => requests.push(request),
                Ok(Event::Closed) => return requests,
                Err(err) => panic!("session left open after {requests:?}: {err}"),
            }
        }
    }
}

async fn serve(
    mut socket: TcpStream,
    passwords: &HashMap<String, String>,
    script: &[Reply],
    sender: &Sender<Event>,
) -> Result<(), SendError<Event>> {
    let mut buffer = Vec::new();
    let mut chunk = [0; 4096];

    loop {
        let parsed = parse_tag(&buffer)
            .ok()
            .map(|(rest, tag)| (buffer.len() - rest.len(), tag));
        let Some((used, message)) = parsed else {
            match socket.read(&mut chunk).await {
                Ok(0) | Err(_) => return Ok(()),
                Ok(read) => buffer.extend_from_slice(&chunk[..read]),
            }
            continue;
        };
        buffer.drain(..used);

        let Some(mut parts) = message.expect_constructed() else {
            return Ok(());
        };
        if parts.len() < 2 {
            return Ok(());
        }
        let op = parts.remove(1);
        let id = integer_value(parts.remove(0));

        let replies = match op.id {
            BIND_REQUEST => {
                let fields = op.expect_constructed().unwrap_or_default();
                let dn = fields.get(1).map(text).unwrap_or_default();
                let password = fields.get(2).map(text).unwrap_or_default();

                let code = if passwords.get(&dn) == Some(&password) {
                    SUCCESS
                } else {
                    INVALID_CREDENTIALS
                };
                sender.send(Event::Request(Request::Bind { dn, password }))?;
                vec![ldap_result(BIND_RESPONSE, code)]
            },
            SEARCH_REQUEST => {
                let fields = op.expect_constructed().unwrap_or_default();
                let base = fields.first().map(text).unwrap_or_default();
                let attrs = fields
                    .get(7)
                    .cloned()
                    .and_then(StructureTag::expect_constructed)
                    .unwrap_or_default()
                    .iter()
                    .map(text)
                    .collect();

                sender.send(Event::Request(Request::Search { base, attrs }))?;
                script.iter().map(reply).collect()
            },
            UNBIND_REQUEST => return Ok(()),
            other => {
                sender.send(Event::Request(Request::Other(other)))?;
                Vec::new()
            },
        };

        for op in replies {
            let mut bytes = Vec::new();
            encode(
                universal(SEQUENCE, vec![integer(INTEGER, id), op]),
                &mut bytes,
            );
            if socket.write_all(&bytes).await.is_err() {
                return Ok(());
            }
        }
    }
}

fn reply(reply: &Reply) -> StructureTag {
    match reply {
        Reply::Entry(entry) => {
            let attributes = entry
                .attrs
                .iter()
                .map(|(name, values)| {
                    universal(
                        SEQUENCE,
                        vec![
                            octets(name),
                            universal(
                                SET,
                                values.iter().map(|value| octets(value)).collect(),
                            ),
                        ],
                    )
                })
                .collect();
            application(
                SEARCH_RESULT_ENTRY,
                vec![octets(&entry.dn), universal(SEQUENCE, attributes)],
            )
        },
        Reply::Referral(uri) => {
            application(SEARCH_RESULT_REFERENCE, vec![octets(uri)])
        },
        Reply::Intermediate => application(INTERMEDIATE_RESPONSE, Vec::new()),
        Reply::Done(code) => ldap_result(SEARCH_RESULT_DONE, *code),
    }
}

fn ldap_result(op: u64, code: i64) -> StructureTag {
    application(op, vec![integer(ENUMERATED, code), octets(""), octets("")])
}

fn application(id: u64, inner: Vec<StructureTag>) -> StructureTag {
    StructureTag {
        class: TagClass::Application,
        id,
        payload: PL::C(inner),
    }
}

fn universal(id: u64, inner: Vec<StructureTag>) -> StructureTag {
    StructureTag {
        class: TagClass::Universal,
        id,
        payload: PL::C(inner),
    }
}

fn octets(value: &str) -> StructureTag {
    StructureTag {
        class: TagClass::Universal,
        id: OCTET_STRING,
        payload: PL::P(value.as_bytes().to_vec()),
    }
}

/// Minimal two's complement, big-endian.
fn integer(id: u64, value: i64) -> StructureTag {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1
        && ((bytes[start] == 0 && bytes[start + 1] & 0x80 == 0)
            || (bytes[start] == 0xff && bytes[start + 1] & 0x80 != 0))
    {
        start += 1;
    }

    StructureTag {
        class: TagClass::Universal,
        id,
        payload: PL::P(bytes[start..].to_vec()),
    }
}

fn integer_value(tag: StructureTag) -> i64 {
    tag.expect_primitive()
        .unwrap_or_default()
        .iter()
        .fold(0, |value, byte| value << 8 | i64::from(*byte))
}

fn text(tag: &StructureTag) -> String {
    tag.clone()
        .expect_primitive()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// BER encoding with low tag numbers only.
fn encode(tag: StructureTag, out: &mut Vec<u8>) {
    let (constructed, payload) = match tag.payload {
        PL::P(bytes) => (false, bytes),
        PL::C(inner) => {
            let mut bytes = Vec::new();
            for tag in inner {
                encode(tag, &mut bytes);
            }
            (true, bytes)
        },
    };

    out.push((tag.class as u8) << 6 | u8::from(constructed) << 5 | tag.id as u8);
    match u8::try_from(payload.len()) {
        Ok(len) if len < 0x80 => out.push(len),
        _ => {
            out.push(0x84);
            out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        },
    }
    out.extend_from_slice(&payload);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_bind_response() {
        let mut bytes = Vec::new();
        encode(
            universal(
                SEQUENCE,
                vec![integer(INTEGER, 1), ldap_result(BIND_RESPONSE, 49)],
            ),
            &mut bytes,
        );

        assert_eq!(
            bytes,
            [
                0x30, 0x0c, 0x02, 0x01, 0x01, 0x61, 0x07, 0x0a, 0x01, 0x31,
                0x04, 0x00, 0x04, 0x00
            ]
        );

        let (rest, tag) = parse_tag(&bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(tag.expect_constructed().map(|parts| parts.len()), Some(2));
    }

    #[test]
    fn test_integer_is_minimal() {
        let payload = |value| match integer(INTEGER, value).payload {
            PL::P(bytes) => bytes,
            PL::C(_) => unreachable!(),
        };

        assert_eq!(payload(0), [0x00]);
        assert_eq!(payload(127), [0x7f]);
        assert_eq!(payload(128), [0x00, 0x80]);
        assert_eq!(payload(300), [0x01, 0x2c]);
    }
}
