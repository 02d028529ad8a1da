//! Reply encoding — one value per wire line, matching memcached's ASCII
//! reply grammar.

use bytes::{BufMut, Bytes, BytesMut};

/// One `VALUE` line plus its payload, as returned by `get`/`gets`.
#[derive(Debug, Clone)]
pub struct ValueLine {
    pub key: Bytes,
    pub flags: u32,
    pub data: Bytes,
    pub cas_unique: Option<u64>,
}

#[derive(Debug, Clone)]
pub enum Response {
    Stored,
    NotStored,
    Exists,
    NotFound,
    Deleted,
    Touched,
    Ok,
    Error,
    ClientError(String),
    ServerError(String),
    Version(String),
    Number(u64),
    Values(Vec<ValueLine>),
    Stats(Vec<(String, String)>),
    /// `noreply` was requested, or the connection is closing (`quit`):
    /// write nothing.
    None,
}

impl Response {
    pub fn encode_into(&self, dst: &mut BytesMut) {
        match self {
            Response::Stored => dst.extend_from_slice(b"STORED\r\n"),
            Response::NotStored => dst.extend_from_slice(b"NOT_STORED\r\n"),
            Response::Exists => dst.extend_from_slice(b"EXISTS\r\n"),
            Response::NotFound => dst.extend_from_slice(b"NOT_FOUND\r\n"),
            Response::Deleted => dst.extend_from_slice(b"DELETED\r\n"),
            Response::Touched => dst.extend_from_slice(b"TOUCHED\r\n"),
            Response::Ok => dst.extend_from_slice(b"OK\r\n"),
            Response::Error => dst.extend_from_slice(b"ERROR\r\n"),
            Response::ClientError(msg) => {
                dst.extend_from_slice(b"CLIENT_ERROR ");
                dst.extend_from_slice(msg.as_bytes());
                dst.extend_from_slice(b"\r\n");
            }
            Response::ServerError(msg) => {
                dst.extend_from_slice(b"SERVER_ERROR ");
                dst.extend_from_slice(msg.as_bytes());
                dst.extend_from_slice(b"\r\n");
            }
            Response::Version(v) => {
                dst.extend_from_slice(b"VERSION ");
                dst.extend_from_slice(v.as_bytes());
                dst.extend_from_slice(b"\r\n");
            }
            Response::Number(n) => {
                dst.extend_from_slice(n.to_string().as_bytes());
                dst.extend_from_slice(b"\r\n");
            }
            Response::Values(values) => {
                for value in values {
                    dst.extend_from_slice(b"VALUE ");
                    dst.extend_from_slice(&value.key);
                    dst.put_u8(b' ');
                    dst.extend_from_slice(value.flags.to_string().as_bytes());
                    dst.put_u8(b' ');
                    dst.extend_from_slice(value.data.len().to_string().as_bytes());
                    if let Some(cas) = value.cas_unique {
                        dst.put_u8(b' ');
                        dst.extend_from_slice(cas.to_string().as_bytes());
                    }
                    dst.extend_from_slice(b"\r\n");
                    dst.extend_from_slice(&value.data);
                    dst.extend_from_slice(b"\r\n");
                }
                dst.extend_from_slice(b"END\r\n");
            }
            Response::Stats(stats) => {
                for (name, value) in stats {
                    dst.extend_from_slice(b"STAT ");
                    dst.extend_from_slice(name.as_bytes());
                    dst.put_u8(b' ');
                    dst.extend_from_slice(value.as_bytes());
                    dst.extend_from_slice(b"\r\n");
                }
                dst.extend_from_slice(b"END\r\n");
            }
            Response::None => {}
        }
    }
}
