//! Redis Streams primitives: consumer-group creation, claiming, acking and
//! introspection. This module is deliberately payload-agnostic — callers
//! hand in field maps or JSON blobs and get raw entries back, leaving job
//! encoding to the domain layer.

use crate::error::StoreError;
use redis::aio::ConnectionManager;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// A single stream entry as returned by a read or claim operation.
#[derive(Debug, Clone)]
pub struct StreamEntry {
    pub id: String,
    pub fields: HashMap<String, String>,
}

/// Aggregate pending-entries-list summary for a consumer group, as reported
/// by `XPENDING` with no range arguments.
#[derive(Debug, Clone, Default)]
pub struct PendingSummary {
    pub count: u64,
    pub min_id: Option<String>,
    pub max_id: Option<String>,
    pub consumers: Vec<(String, u64)>,
}

/// Stream-level metadata for monitoring and the janitor sweep.
#[derive(Debug, Clone, Default)]
pub struct StreamInfo {
    pub length: usize,
    pub groups: usize,
    pub first_entry_id: Option<String>,
    pub last_entry_id: Option<String>,
}

/// A consumer's standing within a group, as reported by `XINFO CONSUMERS`.
#[derive(Debug, Clone)]
pub struct ConsumerInfo {
    pub name: String,
    pub pending: u64,
    pub idle_ms: u64,
}

#[derive(Clone)]
pub struct StreamStore {
    conn: ConnectionManager,
}

impl StreamStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Create `group` on `stream`, creating the stream itself if absent.
    /// Idempotent: an existing group is not an error.
    pub async fn ensure_group(&self, stream: &str, group: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(stream)
            .arg(group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => {
                info!(stream, group, "created consumer group");
                Ok(())
            }
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!(stream, group, "consumer group already exists");
                Ok(())
            }
            Err(e) => Err(StoreError::ConsumerGroup(e.to_string())),
        }
    }

    /// Append an entry built from field/value pairs. Returns the assigned ID.
    pub async fn add(&self, stream: &str, fields: &[(&str, &str)]) -> Result<String, StoreError> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("XADD");
        cmd.arg(stream).arg("*");
        for (field, value) in fields {
            cmd.arg(*field).arg(*value);
        }
        let id: String = cmd.query_async(&mut conn).await?;
        Ok(id)
    }

    /// Append an entry with a single JSON-encoded field. Returns the assigned ID.
    pub async fn add_json<T: Serialize>(
        &self,
        stream: &str,
        field: &str,
        value: &T,
    ) -> Result<String, StoreError> {
        let payload = serde_json::to_string(value)?;
        self.add(stream, &[(field, &payload)]).await
    }

    /// Read entries newly delivered to `consumer` in `group` (`>` cursor).
    pub async fn read_new(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block_ms: Option<usize>,
    ) -> Result<Vec<StreamEntry>, StoreError> {
        let mut conn = self.conn.clone();

        let mut opts = StreamReadOptions::default().group(group, consumer).count(count);
        if let Some(ms) = block_ms {
            opts = opts.block(ms);
        }

        let result: Result<StreamReadReply, _> =
            conn.xread_options(&[stream], &[">"], &opts).await;

        match result {
            Ok(reply) => Ok(parse_reply(reply)),
            Err(e) => {
                let msg = e.to_string().to_lowercase();
                if msg.contains("timeout") || msg.contains("timed out") || msg.contains("nil") {
                    Ok(vec![])
                } else {
                    Err(StoreError::Redis(e))
                }
            }
        }
    }

    /// Read entries already delivered to `consumer` but not yet acked (`0` cursor).
    pub async fn read_pending(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
    ) -> Result<Vec<StreamEntry>, StoreError> {
        let mut conn = self.conn.clone();

        let opts = StreamReadOptions::default().group(group, consumer).count(count);
        let result: Result<StreamReadReply, _> = conn.xread_options(&[stream], &["0"], &opts).await;

        match result {
            Ok(reply) => Ok(parse_reply(reply)),
            Err(e) if e.to_string().to_lowercase().contains("timeout") => Ok(vec![]),
            Err(e) => Err(StoreError::Redis(e)),
        }
    }

    pub async fn ack(&self, stream: &str, group: &str, id: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn.xack(stream, group, &[id]).await?;
        Ok(())
    }

    /// Claim entries idle for at least `min_idle_ms`, starting at `start_id`
    /// (pass `"0-0"` to start from the beginning). Returns the cursor to
    /// resume from on the next page and the claimed entries.
    pub async fn claim(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        min_idle_ms: u64,
        start_id: &str,
        count: usize,
    ) -> Result<(String, Vec<StreamEntry>), StoreError> {
        let mut conn = self.conn.clone();

        let result: redis::Value = redis::cmd("XAUTOCLAIM")
            .arg(stream)
            .arg(group)
            .arg(consumer)
            .arg(min_idle_ms)
            .arg(start_id)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;

        let redis::Value::Array(arr) = &result else {
            return Ok(("0-0".to_string(), vec![]));
        };
        if arr.len() < 2 {
            return Ok(("0-0".to_string(), vec![]));
        }

        let next_id = match &arr[0] {
            redis::Value::BulkString(bytes) => String::from_utf8_lossy(bytes).to_string(),
            redis::Value::SimpleString(s) => s.clone(),
            _ => "0-0".to_string(),
        };

        let mut entries = Vec::new();
        if let redis::Value::Array(messages) = &arr[1] {
            for message in messages {
                if let Some(entry) = parse_claimed_entry(message) {
                    entries.push(entry);
                }
            }
        }

        if !entries.is_empty() {
            info!(stream, group, consumer, count = entries.len(), "claimed entries");
        }

        Ok((next_id, entries))
    }

    /// Aggregate pending-entries summary for `group`, as reported by `XPENDING`.
    pub async fn pending_summary(&self, stream: &str, group: &str) -> Result<PendingSummary, StoreError> {
        let mut conn = self.conn.clone();

        let result: redis::Value = redis::cmd("XPENDING")
            .arg(stream)
            .arg(group)
            .query_async(&mut conn)
            .await?;

        let redis::Value::Array(arr) = &result else {
            return Ok(PendingSummary::default());
        };
        if arr.len() < 4 {
            return Ok(PendingSummary::default());
        }

        let count = match &arr[0] {
            redis::Value::Int(n) => *n as u64,
            _ => 0,
        };
        let min_id = bulk_string(&arr[1]);
        let max_id = bulk_string(&arr[2]);

        let mut consumers = Vec::new();
        if let redis::Value::Array(per_consumer) = &arr[3] {
            for entry in per_consumer {
                if let redis::Value::Array(pair) = entry {
                    if pair.len() == 2 {
                        if let (Some(name), Some(count_str)) =
                            (bulk_string(&pair[0]), bulk_string(&pair[1]))
                        {
                            if let Ok(count) = count_str.parse::<u64>() {
                                consumers.push((name, count));
                            }
                        }
                    }
                }
            }
        }

        Ok(PendingSummary {
            count,
            min_id,
            max_id,
            consumers,
        })
    }

    pub async fn stream_info(&self, stream: &str) -> Result<StreamInfo, StoreError> {
        let mut conn = self.conn.clone();

        let result: Result<redis::streams::StreamInfoStreamReply, _> = redis::cmd("XINFO")
            .arg("STREAM")
            .arg(stream)
            .query_async(&mut conn)
            .await;

        match result {
            Ok(info) => Ok(StreamInfo {
                length: info.length,
                groups: info.groups,
                first_entry_id: Some(info.first_entry.id.clone()),
                last_entry_id: Some(info.last_entry.id.clone()),
            }),
            Err(e) => {
                let s = e.to_string();
                if s.contains("no such key") {
                    Ok(StreamInfo::default())
                } else {
                    Err(StoreError::Redis(e))
                }
            }
        }
    }

    /// Lists every consumer registered on `group`, with its pending count
    /// and idle time, as reported by `XINFO CONSUMERS`. Returns an empty
    /// list if the stream or group doesn't exist yet.
    pub async fn consumers(&self, stream: &str, group: &str) -> Result<Vec<ConsumerInfo>, StoreError> {
        let mut conn = self.conn.clone();

        let result: Result<redis::Value, _> = redis::cmd("XINFO")
            .arg("CONSUMERS")
            .arg(stream)
            .arg(group)
            .query_async(&mut conn)
            .await;

        let value = match result {
            Ok(value) => value,
            Err(e) => {
                let s = e.to_string();
                if s.contains("no such key") || s.contains("NOGROUP") {
                    return Ok(Vec::new());
                }
                return Err(StoreError::Redis(e));
            }
        };

        let redis::Value::Array(entries) = &value else {
            return Ok(Vec::new());
        };

        let mut consumers = Vec::new();
        for entry in entries {
            let redis::Value::Array(fields) = entry else {
                continue;
            };

            let mut name = None;
            let mut pending = 0u64;
            let mut idle_ms = 0u64;

            for pair in fields.chunks(2) {
                let [key, value] = pair else { continue };
                let Some(key) = bulk_string(key) else { continue };
                match key.as_str() {
                    "name" => name = bulk_string(value),
                    "pending" => {
                        if let redis::Value::Int(n) = value {
                            pending = *n as u64;
                        }
                    }
                    "idle" => {
                        if let redis::Value::Int(n) = value {
                            idle_ms = *n as u64;
                        }
                    }
                    _ => {}
                }
            }

            if let Some(name) = name {
                consumers.push(ConsumerInfo { name, pending, idle_ms });
            }
        }

        Ok(consumers)
    }

    /// Remove a consumer from a group once its pending list is empty,
    /// returning the number of entries that were still pending (and thus
    /// orphaned back into the group) at removal time.
    pub async fn delete_consumer(&self, stream: &str, group: &str, consumer: &str) -> Result<i64, StoreError> {
        let mut conn = self.conn.clone();
        let removed: i64 = redis::cmd("XGROUP")
            .arg("DELCONSUMER")
            .arg(stream)
            .arg(group)
            .arg(consumer)
            .query_async(&mut conn)
            .await?;
        if removed > 0 {
            warn!(stream, group, consumer, pending = removed, "removed consumer with pending entries");
        }
        Ok(removed)
    }

    pub async fn len(&self, stream: &str) -> Result<usize, StoreError> {
        let mut conn = self.conn.clone();
        let len: usize = conn.xlen(stream).await.unwrap_or(0);
        Ok(len)
    }
}

fn bulk_string(value: &redis::Value) -> Option<String> {
    match value {
        redis::Value::BulkString(bytes) => Some(String::from_utf8_lossy(bytes).to_string()),
        redis::Value::SimpleString(s) => Some(s.clone()),
        redis::Value::Nil => None,
        _ => None,
    }
}

fn parse_reply(reply: StreamReadReply) -> Vec<StreamEntry> {
    let mut entries = Vec::new();
    for stream_key in reply.keys {
        for message in stream_key.ids {
            let fields = message
                .map
                .into_iter()
                .filter_map(|(k, v)| field_to_string(v).map(|v| (k, v)))
                .collect();
            entries.push(StreamEntry { id: message.id, fields });
        }
    }
    entries
}

fn parse_claimed_entry(value: &redis::Value) -> Option<StreamEntry> {
    let redis::Value::Array(pair) = value else {
        return None;
    };
    if pair.len() != 2 {
        return None;
    }
    let id = bulk_string(&pair[0])?;
    let redis::Value::Array(kvs) = &pair[1] else {
        return None;
    };

    let mut fields = HashMap::new();
    let mut iter = kvs.iter();
    while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
        if let (Some(key), Some(value)) = (bulk_string(key), bulk_string(value)) {
            fields.insert(key, value);
        }
    }

    Some(StreamEntry { id, fields })
}

fn field_to_string(value: redis::Value) -> Option<String> {
    match value {
        redis::Value::BulkString(bytes) => Some(String::from_utf8_lossy(&bytes).to_string()),
        redis::Value::SimpleString(s) => Some(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_summary_default_is_empty() {
        let summary = PendingSummary::default();
        assert_eq!(summary.count, 0);
        assert!(summary.consumers.is_empty());
    }

    #[test]
    fn test_stream_info_default_is_empty() {
        let info = StreamInfo::default();
        assert_eq!(info.length, 0);
        assert_eq!(info.groups, 0);
    }
}
