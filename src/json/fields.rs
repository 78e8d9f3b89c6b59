//! Required-field lookups over one self-contained JSON buffer.
//!
//! Paths are dot separated (`item.album.name`). A record decodes only if
//! every field its type requires is present; otherwise the whole record is
//! rejected with the path of the first missing key.

use serde_json::Value;

use crate::error::DecodeError;
use crate::model::{DeviceInfo, DeviceList, TrackSnapshot};

/// One element of the playlists `items` array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub name: String,
    pub uri: String,
}

/// Body of a successful refresh-token grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_in: u64,
}

pub fn parse(buffer: &[u8]) -> Result<Value, DecodeError> {
    Ok(serde_json::from_slice(buffer)?)
}

fn lookup<'v>(doc: &'v Value, path: &str) -> Result<&'v Value, DecodeError> {
    path.split('.').try_fold(doc, |node, key| {
        node.get(key)
            .ok_or_else(|| DecodeError::MissingField(path.to_string()))
    })
}

fn wrong_type(path: &str, expected: &str) -> DecodeError {
    DecodeError::Malformed(format!("\"{path}\" is not {expected}"))
}

fn string_at(doc: &Value, path: &str) -> Result<String, DecodeError> {
    lookup(doc, path)?
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| wrong_type(path, "a string"))
}

fn u64_at(doc: &Value, path: &str) -> Result<u64, DecodeError> {
    lookup(doc, path)?
        .as_u64()
        .ok_or_else(|| wrong_type(path, "an unsigned integer"))
}

fn bool_at(doc: &Value, path: &str) -> Result<bool, DecodeError> {
    lookup(doc, path)?
        .as_bool()
        .ok_or_else(|| wrong_type(path, "a boolean"))
}

fn array_at<'v>(doc: &'v Value, path: &str) -> Result<&'v Vec<Value>, DecodeError> {
    lookup(doc, path)?
        .as_array()
        .ok_or_else(|| wrong_type(path, "an array"))
}

pub fn playlist_entry(object: &[u8]) -> Result<PlaylistEntry, DecodeError> {
    let doc = parse(object)?;
    Ok(PlaylistEntry {
        name: string_at(&doc, "name")?,
        uri: string_at(&doc, "uri")?,
    })
}

pub fn token_grant(body: &[u8]) -> Result<TokenGrant, DecodeError> {
    let doc = parse(body)?;
    Ok(TokenGrant {
        access_token: string_at(&doc, "access_token")?,
        expires_in: u64_at(&doc, "expires_in")?,
    })
}

/// Decode a `/me/player` body.
pub fn track_snapshot(body: &[u8]) -> Result<TrackSnapshot, DecodeError> {
    let doc = parse(body)?;
    let name = string_at(&doc, "item.name")?;

    let episode = doc.get("currently_playing_type").and_then(Value::as_str) == Some("episode");
    let (artists, album) = if episode {
        (
            vec![string_at(&doc, "item.show.publisher")?],
            string_at(&doc, "item.show.name")?,
        )
    } else {
        let artists = array_at(&doc, "item.artists")?
            .iter()
            .map(|artist| {
                artist
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_owned)
                    .ok_or_else(|| DecodeError::MissingField("item.artists[].name".to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        (artists, string_at(&doc, "item.album.name")?)
    };

    let volume_percent = lookup(&doc, "device.volume_percent")?
        .as_u64()
        .map(|v| v.min(100) as u8);

    Ok(TrackSnapshot {
        name,
        album,
        artists,
        duration_ms: u64_at(&doc, "item.duration_ms")?,
        progress_ms: u64_at(&doc, "progress_ms")?,
        is_playing: bool_at(&doc, "is_playing")?,
        device: DeviceInfo {
            id: string_at(&doc, "device.id")?,
            name: string_at(&doc, "device.name")?,
            kind: optional_str(&doc["device"], "type"),
            volume_percent,
            is_active: doc["device"]["is_active"].as_bool().unwrap_or(true),
        },
    })
}

/// Decode a `/me/player/devices` body. Only `devices[].id` is required.
pub fn device_list(body: &[u8]) -> Result<DeviceList, DecodeError> {
    let doc = parse(body)?;
    let mut list = DeviceList::default();
    for device in array_at(&doc, "devices")? {
        let id = device
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| DecodeError::MissingField("devices[].id".to_string()))?;
        list.push(DeviceInfo {
            id: id.to_string(),
            name: optional_str(device, "name"),
            kind: optional_str(device, "type"),
            volume_percent: device["volume_percent"].as_u64().map(|v| v.min(100) as u8),
            is_active: device["is_active"].as_bool().unwrap_or(false),
        });
    }
    Ok(list)
}

fn optional_str(node: &Value, key: &str) -> String {
    node.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
