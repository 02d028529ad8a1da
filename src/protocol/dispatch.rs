//! Operation dispatcher — runs a parsed [`Command`] against a
//! [`Cache`], turning storage outcomes into wire replies.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::metrics::Metrics;
use crate::storage::{normalize_exptime, now_unix, Cache, StorageError};

use super::command::{Command, StorageCommand, StorageVerb};
use super::response::{Response, ValueLine};

/// What the connection handler should do after a dispatched command.
pub enum Outcome {
    Reply(Response),
    Close,
}

pub async fn dispatch(cache: &Cache, metrics: &Metrics, started_at: Instant, command: Command) -> Outcome {
    let begin = Instant::now();
    let (name, outcome) = match command {
        Command::Storage(cmd) => {
            let name = storage_verb_name(cmd.verb);
            let noreply = cmd.noreply;
            let response = dispatch_storage(cache, cmd).await;
            (name, suppress(response, noreply))
        }
        Command::Get { keys, with_cas } => {
            let name = if with_cas { "gets" } else { "get" };
            (name, Outcome::Reply(dispatch_get(cache, &keys, with_cas)))
        }
        Command::Delete { key, noreply } => {
            let response = match cache.delete(key).await {
                Ok(_) => Response::Deleted,
                Err(StorageError::KeyNotFound) => Response::NotFound,
                Err(_) => Response::ServerError("unexpected delete failure".to_string()),
            };
            ("delete", suppress(response, noreply))
        }
        Command::IncrDecr { key, value, direction, noreply } => {
            let name = match direction {
                crate::storage::Direction::Increment => "incr",
                crate::storage::Direction::Decrement => "decr",
            };
            let response = match cache.incr(&key, value, direction) {
                Ok(entry) => {
                    let text = String::from_utf8_lossy(&entry.content);
                    match text.parse::<u64>() {
                        Ok(n) => Response::Number(n),
                        Err(_) => Response::ServerError("corrupt numeric value".to_string()),
                    }
                }
                Err(StorageError::KeyNotFound) => Response::NotFound,
                Err(StorageError::IllegalParameter) => {
                    Response::ClientError("cannot increment or decrement non-numeric value".to_string())
                }
                Err(_) => Response::ServerError("unexpected incr/decr failure".to_string()),
            };
            (name, suppress(response, noreply))
        }
        Command::Touch { key, exptime, noreply } => {
            let exptime = normalize_exptime(exptime, now_unix());
            let response = match cache.touch(key, exptime).await {
                Ok(_) => Response::Touched,
                Err(StorageError::KeyNotFound) => Response::NotFound,
                Err(_) => Response::ServerError("unexpected touch failure".to_string()),
            };
            ("touch", suppress(response, noreply))
        }
        Command::Stats => ("stats", Outcome::Reply(dispatch_stats(cache, metrics, started_at))),
        Command::FlushAll { noreply } => {
            cache.flush_all();
            ("flush_all", suppress(Response::Ok, noreply))
        }
        Command::Version => ("version", Outcome::Reply(Response::Version(env!("CARGO_PKG_VERSION").to_string()))),
        Command::Quit => ("quit", Outcome::Close),
    };

    metrics.record_operation(name, begin.elapsed());
    debug!(command = name, "dispatched");
    outcome
}

fn suppress(response: Response, noreply: bool) -> Outcome {
    Outcome::Reply(if noreply { Response::None } else { response })
}

fn storage_verb_name(verb: StorageVerb) -> &'static str {
    match verb {
        StorageVerb::Set => "set",
        StorageVerb::Add => "add",
        StorageVerb::Replace => "replace",
        StorageVerb::Append => "append",
        StorageVerb::Prepend => "prepend",
        StorageVerb::Cas => "cas",
    }
}

async fn dispatch_storage(cache: &Cache, cmd: StorageCommand) -> Response {
    let exptime = normalize_exptime(cmd.exptime, now_unix());
    match cmd.verb {
        StorageVerb::Set => {
            cache.set(cmd.key, cmd.flags, exptime, cmd.data).await;
            Response::Stored
        }
        StorageVerb::Add => match cache.add(cmd.key, cmd.flags, exptime, cmd.data).await {
            Ok(_) => Response::Stored,
            Err(StorageError::KeyAlreadyInUse) => Response::NotStored,
            Err(_) => Response::ServerError("unexpected add failure".to_string()),
        },
        StorageVerb::Replace => match cache.replace(cmd.key, cmd.flags, exptime, cmd.data).await {
            Ok(_) => Response::Stored,
            Err(StorageError::KeyNotFound) => Response::NotStored,
            Err(_) => Response::ServerError("unexpected replace failure".to_string()),
        },
        StorageVerb::Append => match cache.append(&cmd.key, cmd.data) {
            Ok(_) => Response::Stored,
            Err(StorageError::KeyNotFound) => Response::NotStored,
            Err(_) => Response::ServerError("unexpected append failure".to_string()),
        },
        StorageVerb::Prepend => match cache.prepend(&cmd.key, cmd.data) {
            Ok(_) => Response::Stored,
            Err(StorageError::KeyNotFound) => Response::NotStored,
            Err(_) => Response::ServerError("unexpected prepend failure".to_string()),
        },
        StorageVerb::Cas => match cache.cas(cmd.key, cmd.flags, exptime, cmd.cas_unique, cmd.data).await {
            Ok(_) => Response::Stored,
            Err(StorageError::KeyNotFound) => Response::NotFound,
            Err(StorageError::CasMismatch) => Response::Exists,
            Err(_) => Response::ServerError("unexpected cas failure".to_string()),
        },
    }
}

fn dispatch_get(cache: &Cache, keys: &[bytes::Bytes], with_cas: bool) -> Response {
    let values = keys
        .iter()
        .filter_map(|key| {
            cache.get(key).map(|entry| ValueLine {
                key: key.clone(),
                flags: entry.flags,
                data: entry.content,
                cas_unique: with_cas.then_some(entry.cas_unique),
            })
        })
        .collect();
    Response::Values(values)
}

fn dispatch_stats(cache: &Cache, metrics: &Metrics, started_at: Instant) -> Response {
    let uptime: Duration = started_at.elapsed();
    let mut stats = vec![
        ("uptime".to_string(), uptime.as_secs().to_string()),
        ("curr_items".to_string(), cache.item_count().to_string()),
        ("total_connections".to_string(), metrics.total_connections().to_string()),
        ("total_ops".to_string(), metrics.total_ops().to_string()),
    ];
    for (command, count) in metrics.ops_by_command() {
        stats.push((format!("cmd_{command}"), count.to_string()));
    }
    Response::Stats(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn storage(verb: StorageVerb, key: &str, exptime: u32, data: &str) -> Command {
        Command::Storage(StorageCommand {
            verb,
            key: Bytes::copy_from_slice(key.as_bytes()),
            flags: 0,
            exptime,
            cas_unique: 0,
            noreply: false,
            data: Bytes::copy_from_slice(data.as_bytes()),
        })
    }

    async fn reply(cache: &Cache, metrics: &Metrics, command: Command) -> Response {
        match dispatch(cache, metrics, Instant::now(), command).await {
            Outcome::Reply(response) => response,
            Outcome::Close => panic!("expected a reply, got Close"),
        }
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = Cache::spawn(2, 60);
        let metrics = Metrics::new();
        assert!(matches!(
            reply(&cache, &metrics, storage(StorageVerb::Set, "k", 0, "v")).await,
            Response::Stored
        ));
        match reply(&cache, &metrics, Command::Get { keys: vec![Bytes::from_static(b"k")], with_cas: false }).await {
            Response::Values(values) => {
                assert_eq!(values.len(), 1);
                assert_eq!(values[0].data, Bytes::from_static(b"v"));
                assert!(values[0].cas_unique.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn gets_includes_cas_token() {
        let cache = Cache::spawn(2, 60);
        let metrics = Metrics::new();
        reply(&cache, &metrics, storage(StorageVerb::Set, "k", 0, "v")).await;
        match reply(&cache, &metrics, Command::Get { keys: vec![Bytes::from_static(b"k")], with_cas: true }).await {
            Response::Values(values) => assert!(values[0].cas_unique.is_some()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn add_on_existing_key_is_not_stored() {
        let cache = Cache::spawn(2, 60);
        let metrics = Metrics::new();
        reply(&cache, &metrics, storage(StorageVerb::Add, "k", 0, "v1")).await;
        assert!(matches!(
            reply(&cache, &metrics, storage(StorageVerb::Add, "k", 0, "v2")).await,
            Response::NotStored
        ));
    }

    #[tokio::test]
    async fn quit_closes_the_connection() {
        let cache = Cache::spawn(2, 60);
        let metrics = Metrics::new();
        assert!(matches!(dispatch(&cache, &metrics, Instant::now(), Command::Quit).await, Outcome::Close));
    }

    #[tokio::test]
    async fn noreply_suppresses_the_response() {
        let cache = Cache::spawn(2, 60);
        let metrics = Metrics::new();
        let mut cmd = storage(StorageVerb::Set, "k", 0, "v");
        if let Command::Storage(ref mut sc) = cmd {
            sc.noreply = true;
        }
        assert!(matches!(reply(&cache, &metrics, cmd).await, Response::None));
    }

    #[tokio::test]
    async fn incr_on_missing_key_is_not_found() {
        let cache = Cache::spawn(2, 60);
        let metrics = Metrics::new();
        let command = Command::IncrDecr {
            key: Bytes::from_static(b"missing"),
            value: 1,
            direction: crate::storage::Direction::Increment,
            noreply: false,
        };
        assert!(matches!(reply(&cache, &metrics, command).await, Response::NotFound));
    }

    #[tokio::test]
    async fn stats_reports_item_count() {
        let cache = Cache::spawn(2, 60);
        let metrics = Metrics::new();
        reply(&cache, &metrics, storage(StorageVerb::Set, "k", 0, "v")).await;
        match reply(&cache, &metrics, Command::Stats).await {
            Response::Stats(stats) => {
                assert!(stats.iter().any(|(name, value)| name == "curr_items" && value == "1"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
