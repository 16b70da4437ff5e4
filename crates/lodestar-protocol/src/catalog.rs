//! Closed catalog of protocol members.
//!
//! Every command maps to exactly one payload/response pair and every event to
//! exactly one payload type for the lifetime of [`CATALOG_VERSION`]. The
//! [`Command`] and [`Event`] traits are sealed: the only implementors are the
//! marker types generated here, so both sides agree on the table at build time.
//!
//! ```rust
//! use lodestar_protocol::{Command, CommandKind, GetGridType, GridType};
//!
//! assert_eq!(GetGridType::KIND, CommandKind::GetGridType);
//! assert_eq!(GetGridType::KIND.as_str(), "GET_GRID_TYPE");
//! let _: Option<<GetGridType as Command>::Response> = Some(GridType::Square);
//! ```

use crate::types::{CameraAnimation, CameraState, GridSettings, GridType, PluginReady, ToolId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

/// Bumped whenever a catalog row changes shape.
pub const CATALOG_VERSION: u32 = 1;

mod sealed {
    pub trait Sealed {}
}

/// A protocol member with a meaningful response.
pub trait Command: sealed::Sealed + Send + Sync + 'static {
    const KIND: CommandKind;
    type Payload: Serialize + DeserializeOwned + Send + 'static;
    type Response: Serialize + DeserializeOwned + Send + 'static;
}

/// A fire-and-forget protocol member.
pub trait Event: sealed::Sealed + Send + Sync + 'static {
    const KIND: EventKind;
    type Payload: Serialize + DeserializeOwned + Send + 'static;
}

macro_rules! command_catalog {
    ($( $(#[$meta:meta])* $ty:ident => $name:literal : $payload:ty => $response:ty; )*) => {
        /// Every command in the catalog.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum CommandKind {
            $( $ty, )*
        }

        impl CommandKind {
            pub const ALL: &'static [CommandKind] = &[$( CommandKind::$ty, )*];

            /// Wire name of the command
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$ty => $name, )*
                }
            }

            pub fn parse(name: &str) -> Option<Self> {
                match name {
                    $( $name => Some(Self::$ty), )*
                    _ => None,
                }
            }

            /// Payload and response type names, for listings
            pub fn signature(&self) -> (&'static str, &'static str) {
                match self {
                    $( Self::$ty => (stringify!($payload), stringify!($response)), )*
                }
            }
        }

        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, Default)]
            pub struct $ty;

            impl sealed::Sealed for $ty {}

            impl Command for $ty {
                const KIND: CommandKind = CommandKind::$ty;
                type Payload = $payload;
                type Response = $response;
            }
        )*
    };
}

macro_rules! event_catalog {
    ($( $(#[$meta:meta])* $ty:ident => $name:literal : $payload:ty; )*) => {
        /// Every event in the catalog.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum EventKind {
            $( $ty, )*
        }

        impl EventKind {
            pub const ALL: &'static [EventKind] = &[$( EventKind::$ty, )*];

            /// Wire name of the event
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$ty => $name, )*
                }
            }

            pub fn parse(name: &str) -> Option<Self> {
                match name {
                    $( $name => Some(Self::$ty), )*
                    _ => None,
                }
            }

            /// Payload type name, for listings
            pub fn payload_type(&self) -> &'static str {
                match self {
                    $( Self::$ty => stringify!($payload), )*
                }
            }
        }

        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, Default)]
            pub struct $ty;

            impl sealed::Sealed for $ty {}

            impl Event for $ty {
                const KIND: EventKind = EventKind::$ty;
                type Payload = $payload;
            }
        )*
    };
}

command_catalog! {
    GetGridType => "GET_GRID_TYPE": () => GridType;
    /// Grid width in cells
    GetGridWidth => "GET_GRID_WIDTH": () => u32;
    /// Grid height in cells
    GetGridHeight => "GET_GRID_HEIGHT": () => u32;
    GetGridCellSize => "GET_GRID_CELL_SIZE": () => f64;
    GetGridSettings => "GET_GRID_SETTINGS": () => GridSettings;
    GetCamera => "GET_CAMERA": () => CameraState;
    /// Resolves once the host has accepted the animation, not when it finishes.
    AnimateCameraTo => "ANIMATE_CAMERA_TO": CameraAnimation => ();
    ResetCamera => "RESET_CAMERA": () => ();
    GetActiveTool => "GET_ACTIVE_TOOL": () => ToolId;
    SetActiveTool => "SET_ACTIVE_TOOL": ToolId => ();
}

event_catalog! {
    GridChanged => "GRID_CHANGED": GridSettings;
    CameraChanged => "CAMERA_CHANGED": CameraState;
    ToolChanged => "TOOL_CHANGED": ToolId;
    /// Sent by a plugin once its surface finished loading.
    PluginReadyEvent => "PLUGIN_READY": PluginReady;
    /// Broadcast by the host once every registered plugin announced readiness.
    AllPluginsReady => "ALL_PLUGINS_READY": ();
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
