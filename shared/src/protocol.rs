use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::vec3::Vec3;

/// Server-assigned connection identity. Generated fresh for every accepted
/// socket, never reused. String form on the wire.
pub type SessionId = Uuid;

/// Orientation as reported by the client. Three components are an Euler
/// triple, four are a quaternion; `w` is relayed only when it was supplied.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "../../client/src/generated/")]
pub struct Rotation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub w: Option<f64>,
}

impl Rotation {
    pub fn is_finite(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.z.is_finite()
            && self.w.map_or(true, f64::is_finite)
    }
}

impl Default for Rotation {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: None,
        }
    }
}

// === Server -> Client ===

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/src/generated/")]
#[serde(tag = "type", content = "value")]
pub enum ServerMsg {
    /// The newly assigned connection id, sent once right after accept.
    #[serde(rename = "uuid")]
    Uuid(SessionId),
    /// Full world snapshot, including the receiving client's own entry.
    #[serde(rename = "position")]
    Position(HashMap<SessionId, PlayerWire>),
    /// A peer's connection just closed.
    #[serde(rename = "disconnect")]
    Disconnect(SessionId),
}

/// One registry entry as broadcast to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "../../client/src/generated/")]
#[serde(rename_all = "camelCase")]
pub struct PlayerWire {
    pub position: Vec3,
    pub rotation: Rotation,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    /// Display name; absent until the client has sent one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub name: Option<String>,
}

// === Client -> Server ===

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/src/generated/")]
#[serde(tag = "type", content = "value")]
pub enum ClientMsg {
    #[serde(rename = "position")]
    Position(TransformUpdate),
    #[serde(rename = "name")]
    Name(String),
    /// Any unrecognized tag. Ignored by the server, never an error.
    #[serde(other)]
    Unknown,
}

/// Partial transform report. Absent fields keep their previous value on the
/// server; unknown fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/src/generated/")]
#[serde(rename_all = "camelCase", default)]
pub struct TransformUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub position: Option<Vec3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub rotation: Option<Rotation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub linear_velocity: Option<Vec3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub angular_velocity: Option<Vec3>,
}

// === Conversion helpers ===

/// Round to 4 decimal places (plenty for world coordinates, saves ~50% JSON size)
#[inline]
pub fn round4(v: f64) -> f64 {
    (v * 10000.0).round() / 10000.0
}
