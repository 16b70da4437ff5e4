use crate::bridge::Bridge;
use crate::bus::Subscription;
use crate::error::Result;
use lodestar_protocol::{
    Envelope, GetGridCellSize, GetGridHeight, GetGridSettings, GetGridType, GetGridWidth,
    GridChanged, GridSettings, GridType,
};

/// Grid settings of the host scene.
#[derive(Debug, Clone)]
pub struct GridApi {
    bridge: Bridge,
}

impl GridApi {
    pub fn new(bridge: Bridge) -> Self {
        Self { bridge }
    }

    pub async fn grid_type(&self) -> Result<GridType> {
        self.bridge.request::<GetGridType>(&()).await
    }

    /// Width in cells
    pub async fn width(&self) -> Result<u32> {
        self.bridge.request::<GetGridWidth>(&()).await
    }

    /// Height in cells
    pub async fn height(&self) -> Result<u32> {
        self.bridge.request::<GetGridHeight>(&()).await
    }

    /// Cell edge length in scene units
    pub async fn cell_size(&self) -> Result<f64> {
        self.bridge.request::<GetGridCellSize>(&()).await
    }

    pub async fn settings(&self) -> Result<GridSettings> {
        self.bridge.request::<GetGridSettings>(&()).await
    }

    pub fn on_change<F>(&self, listener: F) -> Subscription<Envelope>
    where
        F: Fn(GridSettings) + Send + Sync + 'static,
    {
        self.bridge.subscribe::<GridChanged, _>(listener)
    }
}
