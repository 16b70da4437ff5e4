//! Wire-level types shared by host and plugin contexts.

mod catalog;
mod envelope;
mod types;

pub use catalog::{
    AllPluginsReady, AnimateCameraTo, CameraChanged, Command, CommandKind, Event, EventKind,
    GetActiveTool, GetCamera, GetGridCellSize, GetGridHeight, GetGridSettings, GetGridType,
    GetGridWidth, GridChanged, PluginReadyEvent, ResetCamera, SetActiveTool, ToolChanged,
    CATALOG_VERSION,
};
pub use envelope::{response_event_name, split_response_event, Envelope, RESPONSE_MARKER};
pub use types::{
    CameraAnimation, CameraState, GridSettings, GridType, PluginId, PluginReady, ToolId, Vector2,
};
