//! Builds sink-ready `OutputRecord`s from translated batch items.
//!
//! Projection never fails: a missing id or timestamp stays `None` on the
//! record so the sink can decide (missing id aborts the batch there,
//! missing timestamp interacts with the time window).

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};

use scrollkit_core::{EntityType, OutputRecord};

/// Project one translated batch. `start_position` is the number of
/// records already accepted for this entity; positions are 1-based and
/// continue across batches.
pub fn project_batch(
    entity_type: EntityType,
    entity_id: &str,
    items: &[Value],
    start_position: u64,
) -> Vec<OutputRecord> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let position = start_position + index as u64 + 1;
            match entity_type {
                EntityType::Comments => project_comment(entity_id, item, position),
                EntityType::Posts(_) => project_post(item, position),
                EntityType::Followers | EntityType::Following | EntityType::Likers => {
                    project_user(item, position)
                }
            }
        })
        .collect()
}

fn project_comment(post_id: &str, item: &Value, position: u64) -> OutputRecord {
    let node = item.get("node").unwrap_or(item);
    let id = string_field(node, "id");
    let timestamp = node.get("created_at").and_then(unix_seconds);

    let payload = json!({
        "id": id,
        "postId": post_id,
        "text": node.get("text").cloned().unwrap_or(Value::Null),
        "position": position,
        "timestamp": timestamp.map(|ts| ts.to_rfc3339()),
        "ownerId": node.pointer("/owner/id").cloned().unwrap_or(Value::Null),
        "ownerIsVerified": node.pointer("/owner/is_verified").cloned().unwrap_or(Value::Null),
        "ownerUsername": node.pointer("/owner/username").cloned().unwrap_or(Value::Null),
        "ownerProfilePicUrl": node.pointer("/owner/profile_pic_url").cloned().unwrap_or(Value::Null),
    });

    OutputRecord {
        id,
        timestamp,
        position,
        payload,
    }
}

fn project_post(item: &Value, position: u64) -> OutputRecord {
    let node = item.get("node").unwrap_or(item);
    let id = string_field(node, "id");
    let timestamp = node.get("taken_at_timestamp").and_then(unix_seconds);

    let payload = json!({
        "id": id,
        "shortCode": node.get("shortcode").cloned().unwrap_or(Value::Null),
        "position": position,
        "timestamp": timestamp.map(|ts| ts.to_rfc3339()),
        "caption": node
            .pointer("/edge_media_to_caption/edges/0/node/text")
            .cloned()
            .unwrap_or(Value::Null),
        "ownerId": node.pointer("/owner/id").cloned().unwrap_or(Value::Null),
        "likesCount": node.pointer("/edge_liked_by/count").cloned().unwrap_or(Value::Null),
    });

    OutputRecord {
        id,
        timestamp,
        position,
        payload,
    }
}

/// User items arrive already projected to the minimal shape by the
/// translator; just wrap them. Users carry no timestamp.
fn project_user(item: &Value, position: u64) -> OutputRecord {
    OutputRecord {
        id: string_field(item, "id"),
        timestamp: None,
        position,
        payload: item.clone(),
    }
}

fn string_field(node: &Value, field: &str) -> Option<String> {
    node.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Unix seconds as number or numeric string, the two shapes the remote
/// API serves for timestamps.
fn unix_seconds(value: &Value) -> Option<DateTime<Utc>> {
    let secs = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse::<i64>().ok(),
        _ => None,
    }?;
    Utc.timestamp_opt(secs, 0).single()
}
