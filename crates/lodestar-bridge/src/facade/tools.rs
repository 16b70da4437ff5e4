use crate::bridge::Bridge;
use crate::bus::Subscription;
use crate::error::Result;
use lodestar_protocol::{Envelope, GetActiveTool, SetActiveTool, ToolChanged, ToolId};

/// Tool selection in the host editor.
#[derive(Debug, Clone)]
pub struct ToolApi {
    bridge: Bridge,
}

impl ToolApi {
    pub fn new(bridge: Bridge) -> Self {
        Self { bridge }
    }

    pub async fn active(&self) -> Result<ToolId> {
        self.bridge.request::<GetActiveTool>(&()).await
    }

    pub async fn select(&self, tool: impl Into<ToolId>) -> Result<()> {
        self.bridge.request::<SetActiveTool>(&tool.into()).await
    }

    pub fn on_change<F>(&self, listener: F) -> Subscription<Envelope>
    where
        F: Fn(ToolId) + Send + Sync + 'static,
    {
        self.bridge.subscribe::<ToolChanged, _>(listener)
    }
}
