//! Payload and response types carried by catalog entries.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a plugin execution context.
///
/// Assigned by whoever mounts the plugin surface; the protocol only requires
/// that it is stable for as long as the surface is mounted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginId(String);

impl PluginId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PluginId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Grid layout of the current map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GridType {
    Square,
    HexVertical,
    HexHorizontal,
    Isometric,
}

/// Grid settings as owned by the host's rendering state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridSettings {
    pub grid_type: GridType,
    /// Width in cells
    pub width: u32,
    /// Height in cells
    pub height: u32,
    /// Cell edge length in scene pixels
    pub cell_size: f64,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            grid_type: GridType::Square,
            width: 30,
            height: 20,
            cell_size: 70.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector2 {
    pub x: f64,
    pub y: f64,
}

impl Vector2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Camera position and zoom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    pub position: Vector2,
    pub zoom: f64,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            position: Vector2::default(),
            zoom: 1.0,
        }
    }
}

/// Request to move the camera.
///
/// `zoom: None` keeps the current zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraAnimation {
    pub position: Vector2,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom: Option<f64>,
    #[serde(default)]
    pub duration_ms: u64,
}

/// Name of an editor tool ("select", "measure", "draw", ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolId(String);

impl ToolId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ToolId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ToolId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Payload of the per-plugin load handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginReady {
    pub plugin_id: PluginId,
}
