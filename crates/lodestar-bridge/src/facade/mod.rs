//! Per-area convenience APIs over the command catalog
//!
//! Each method maps to exactly one catalog entry and forwards to
//! [`Bridge::request`] or [`Bridge::subscribe`]; failures are those of the
//! underlying call.

mod camera;
mod grid;
mod tools;

pub use camera::CameraApi;
pub use grid::GridApi;
pub use tools::ToolApi;

use crate::bridge::Bridge;

impl Bridge {
    pub fn grid(&self) -> GridApi {
        GridApi::new(self.clone())
    }

    pub fn camera(&self) -> CameraApi {
        CameraApi::new(self.clone())
    }

    pub fn tools(&self) -> ToolApi {
        ToolApi::new(self.clone())
    }
}
