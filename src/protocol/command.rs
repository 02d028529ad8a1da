//! ASCII command line parsing.
//!
//! Grounded in `command.go`'s `StorageCommand.parse`: split the line on
//! runs of whitespace, dispatch on the first token, and for the storage
//! family validate `<flags> <exptime> <bytes> [cas_unique]` before
//! reading the trailing data block.

use bytes::Bytes;

use crate::storage::Direction;

use super::error::ProtocolError;

/// Which storage verb a `StorageCommand` line named.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageVerb {
    Set,
    Add,
    Replace,
    Append,
    Prepend,
    Cas,
}

/// A storage-family command line, parsed but still waiting for its data
/// block to arrive.
#[derive(Debug, Clone)]
pub struct PendingStorage {
    pub verb: StorageVerb,
    pub key: Bytes,
    pub flags: u32,
    pub exptime: u32,
    pub bytes: u32,
    pub cas_unique: u64,
    pub noreply: bool,
}

impl PendingStorage {
    pub fn into_command(self, data: Bytes) -> Command {
        Command::Storage(StorageCommand {
            verb: self.verb,
            key: self.key,
            flags: self.flags,
            exptime: self.exptime,
            cas_unique: self.cas_unique,
            noreply: self.noreply,
            data,
        })
    }
}

#[derive(Debug, Clone)]
pub struct StorageCommand {
    pub verb: StorageVerb,
    pub key: Bytes,
    pub flags: u32,
    pub exptime: u32,
    pub cas_unique: u64,
    pub noreply: bool,
    pub data: Bytes,
}

#[derive(Debug, Clone)]
pub enum Command {
    Storage(StorageCommand),
    Get { keys: Vec<Bytes>, with_cas: bool },
    Delete { key: Bytes, noreply: bool },
    IncrDecr { key: Bytes, value: u64, direction: Direction, noreply: bool },
    Touch { key: Bytes, exptime: u32, noreply: bool },
    Stats,
    FlushAll { noreply: bool },
    Version,
    Quit,
}

/// Result of parsing one command line: either a command ready to run, or
/// a storage command still waiting on its data block.
pub enum ParsedLine {
    Complete(Command),
    NeedsData(PendingStorage),
}

fn parse_u32(token: &str, field: &'static str) -> Result<u32, ProtocolError> {
    token.parse().map_err(|_| ProtocolError::BadInteger(field))
}

fn parse_u64(token: &str, field: &'static str) -> Result<u64, ProtocolError> {
    token.parse().map_err(|_| ProtocolError::BadInteger(field))
}

/// Splits a raw line on runs of ASCII whitespace, matching `command.go`'s
/// `regexp.Compile("  *")` space-collapse before `strings.Split`.
fn tokenize(line: &str) -> Vec<&str> {
    line.split_ascii_whitespace().collect()
}

pub fn parse_line(line: &str) -> Result<ParsedLine, ProtocolError> {
    let tokens = tokenize(line);
    let Some(&verb) = tokens.first() else {
        return Err(ProtocolError::MalformedLine);
    };

    match verb {
        "set" | "add" | "replace" | "append" | "prepend" | "cas" => {
            parse_storage_line(verb, &tokens).map(ParsedLine::NeedsData)
        }
        "get" | "gets" => parse_get_line(verb, &tokens).map(ParsedLine::Complete),
        "delete" => parse_delete_line(&tokens).map(ParsedLine::Complete),
        "incr" | "decr" => parse_incr_line(verb, &tokens).map(ParsedLine::Complete),
        "touch" => parse_touch_line(&tokens).map(ParsedLine::Complete),
        "stats" => Ok(ParsedLine::Complete(Command::Stats)),
        "flush_all" => Ok(ParsedLine::Complete(Command::FlushAll {
            noreply: tokens.last() == Some(&"noreply"),
        })),
        "version" => Ok(ParsedLine::Complete(Command::Version)),
        "quit" => Ok(ParsedLine::Complete(Command::Quit)),
        _ => Err(ProtocolError::UnknownCommand),
    }
}

fn parse_storage_line(verb: &str, tokens: &[&str]) -> Result<PendingStorage, ProtocolError> {
    let min_len = if verb == "cas" { 6 } else { 5 };
    if tokens.len() < min_len {
        return Err(ProtocolError::MalformedLine);
    }
    let storage_verb = match verb {
        "set" => StorageVerb::Set,
        "add" => StorageVerb::Add,
        "replace" => StorageVerb::Replace,
        "append" => StorageVerb::Append,
        "prepend" => StorageVerb::Prepend,
        "cas" => StorageVerb::Cas,
        _ => unreachable!(),
    };
    let key = Bytes::copy_from_slice(tokens[1].as_bytes());
    let flags = parse_u32(tokens[2], "flags")?;
    let exptime = parse_u32(tokens[3], "exptime")?;
    let bytes = parse_u32(tokens[4], "bytes")?;
    let cas_unique = if verb == "cas" { parse_u64(tokens[5], "cas_unique")? } else { 0 };
    let noreply = tokens.last() == Some(&"noreply");
    Ok(PendingStorage {
        verb: storage_verb,
        key,
        flags,
        exptime,
        bytes,
        cas_unique,
        noreply,
    })
}

fn parse_get_line(verb: &str, tokens: &[&str]) -> Result<Command, ProtocolError> {
    if tokens.len() < 2 {
        return Err(ProtocolError::MalformedLine);
    }
    let keys = tokens[1..].iter().map(|k| Bytes::copy_from_slice(k.as_bytes())).collect();
    Ok(Command::Get { keys, with_cas: verb == "gets" })
}

fn parse_delete_line(tokens: &[&str]) -> Result<Command, ProtocolError> {
    if tokens.len() < 2 {
        return Err(ProtocolError::MalformedLine);
    }
    Ok(Command::Delete {
        key: Bytes::copy_from_slice(tokens[1].as_bytes()),
        noreply: tokens.last() == Some(&"noreply"),
    })
}

fn parse_incr_line(verb: &str, tokens: &[&str]) -> Result<Command, ProtocolError> {
    if tokens.len() < 3 {
        return Err(ProtocolError::MalformedLine);
    }
    let value = parse_u64(tokens[2], "value")?;
    Ok(Command::IncrDecr {
        key: Bytes::copy_from_slice(tokens[1].as_bytes()),
        value,
        direction: if verb == "incr" { Direction::Increment } else { Direction::Decrement },
        noreply: tokens.last() == Some(&"noreply"),
    })
}

fn parse_touch_line(tokens: &[&str]) -> Result<Command, ProtocolError> {
    if tokens.len() < 3 {
        return Err(ProtocolError::MalformedLine);
    }
    let exptime = parse_u32(tokens[2], "exptime")?;
    Ok(Command::Touch {
        key: Bytes::copy_from_slice(tokens[1].as_bytes()),
        exptime,
        noreply: tokens.last() == Some(&"noreply"),
    })
}
