//! Framing used on the broker link.
//!
//! Each frame on the wire is `[u32 BE payload length][payload]`. The first payload byte is a tag:
//!
//! | tag | envelope | body |
//! |-----|----------|------|
//! | 1 | `Hello` | queue, username, password (each `[u16 BE len][utf8]`) |
//! | 2 | `Request` | `[u32 BE correlation id][command message]` |
//! | 3 | `Reply` | `[u32 BE correlation id][response message]` |
//!
//! A correlation id of zero marks a request that expects no reply.

use thiserror::Error;

pub const LENGTH_PREFIX_SIZE: usize = 4;
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024;

const TAG_HELLO: u8 = 1;
const TAG_REQUEST: u8 = 2;
const TAG_REPLY: u8 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    Hello {
        queue: String,
        username: String,
        password: String,
    },
    Request {
        correlation_id: u32,
        body: Vec<u8>,
    },
    Reply {
        correlation_id: u32,
        body: Vec<u8>,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("empty payload")]
    Empty,
    #[error("unknown envelope tag: {0}")]
    UnknownTag(u8),
    #[error("truncated envelope")]
    Truncated,
    #[error("invalid utf-8 in field '{0}'")]
    InvalidText(&'static str),
    #[error("payload too large. size: {size}, max: {max}", max = MAX_PAYLOAD_SIZE)]
    TooLarge { size: usize },
}

impl Envelope {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Envelope::Hello {
                queue,
                username,
                password,
            } => {
                out.push(TAG_HELLO);
                for field in [queue, username, password] {
                    // fields longer than u16::MAX are truncated on a char boundary
                    let mut end = field.len().min(u16::MAX as usize);
                    while !field.is_char_boundary(end) {
                        end -= 1;
                    }
                    let bytes = &field.as_bytes()[..end];
                    out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
                    out.extend_from_slice(bytes);
                }
            }
            Envelope::Request {
                correlation_id,
                body,
            } => {
                out.push(TAG_REQUEST);
                out.extend_from_slice(&correlation_id.to_be_bytes());
                out.extend_from_slice(body);
            }
            Envelope::Reply {
                correlation_id,
                body,
            } => {
                out.push(TAG_REPLY);
                out.extend_from_slice(&correlation_id.to_be_bytes());
                out.extend_from_slice(body);
            }
        }
        out
    }

    /// Payload with its length prefix, ready to write to the stream.
    pub fn encode_frame(&self) -> Result<Vec<u8>, EnvelopeError> {
        let payload = self.encode();
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(EnvelopeError::TooLarge {
                size: payload.len(),
            });
        }
        let mut frame = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
        frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    pub fn decode(payload: &[u8]) -> Result<Self, EnvelopeError> {
        let (&tag, rest) = payload
            .split_first()
            .ok_or(EnvelopeError::Empty)?;

        match tag {
            TAG_HELLO => {
                let mut reader = FieldReader { remaining: rest };
                let queue = reader.text("queue")?;
                let username = reader.text("username")?;
                let password = reader.text("password")?;
                Ok(Envelope::Hello {
                    queue,
                    username,
                    password,
                })
            }
            TAG_REQUEST | TAG_REPLY => {
                let (id, body) = split_correlation_id(rest)?;
                if tag == TAG_REQUEST {
                    Ok(Envelope::Request {
                        correlation_id: id,
                        body: body.to_vec(),
                    })
                } else {
                    Ok(Envelope::Reply {
                        correlation_id: id,
                        body: body.to_vec(),
                    })
                }
            }
            other => Err(EnvelopeError::UnknownTag(other)),
        }
    }
}

/// Validates a length prefix read from the wire.
pub fn payload_len(prefix: [u8; LENGTH_PREFIX_SIZE]) -> Result<usize, EnvelopeError> {
    let size = u32::from_be_bytes(prefix) as usize;
    if size > MAX_PAYLOAD_SIZE {
        return Err(EnvelopeError::TooLarge {
            size,
        });
    }
    Ok(size)
}

fn split_correlation_id(bytes: &[u8]) -> Result<(u32, &[u8]), EnvelopeError> {
    if bytes.len() < 4 {
        return Err(EnvelopeError::Truncated);
    }
    let (id, body) = bytes.split_at(4);
    let id = u32::from_be_bytes([id[0], id[1], id[2], id[3]]);
    Ok((id, body))
}

struct FieldReader<'a> {
    remaining: &'a [u8],
}

impl FieldReader<'_> {
    fn text(&mut self, name: &'static str) -> Result<String, EnvelopeError> {
        if self.remaining.len() < 2 {
            return Err(EnvelopeError::Truncated);
        }
        let len = u16::from_be_bytes([self.remaining[0], self.remaining[1]]) as usize;
        let rest = &self.remaining[2..];
        if rest.len() < len {
            return Err(EnvelopeError::Truncated);
        }
        let (field, rest) = rest.split_at(len);
        self.remaining = rest;
        String::from_utf8(field.to_vec()).map_err(|_| EnvelopeError::InvalidText(name))
    }
}
