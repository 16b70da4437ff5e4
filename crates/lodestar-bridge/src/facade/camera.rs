use crate::bridge::Bridge;
use crate::bus::Subscription;
use crate::error::Result;
use lodestar_protocol::{
    AnimateCameraTo, CameraAnimation, CameraChanged, CameraState, Envelope, GetCamera, ResetCamera,
};

/// Viewport of the host scene.
#[derive(Debug, Clone)]
pub struct CameraApi {
    bridge: Bridge,
}

impl CameraApi {
    pub fn new(bridge: Bridge) -> Self {
        Self { bridge }
    }

    pub async fn get(&self) -> Result<CameraState> {
        self.bridge.request::<GetCamera>(&()).await
    }

    /// Resolves once the host accepted the animation, not when it finishes.
    pub async fn animate_to(&self, animation: CameraAnimation) -> Result<()> {
        self.bridge.request::<AnimateCameraTo>(&animation).await
    }

    pub async fn reset(&self) -> Result<()> {
        self.bridge.request::<ResetCamera>(&()).await
    }

    pub fn on_change<F>(&self, listener: F) -> Subscription<Envelope>
    where
        F: Fn(CameraState) + Send + Sync + 'static,
    {
        self.bridge.subscribe::<CameraChanged, _>(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::hub::InProcessHub;
    use crate::registry::PluginSet;
    use lodestar_protocol::Vector2;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_animate_then_reset() {
        let hub = InProcessHub::new();
        let host = Bridge::host(
            Arc::new(hub.host_channel()),
            Arc::new(PluginSet::new()),
            BridgeConfig::default(),
        );
        let camera = Arc::new(Mutex::new(CameraState::default()));

        let state = Arc::clone(&camera);
        host.answer::<GetCamera, _>(move |()| *state.lock());
        let state = Arc::clone(&camera);
        host.answer::<AnimateCameraTo, _>(move |animation: CameraAnimation| {
            let mut camera = state.lock();
            camera.position = animation.position;
            if let Some(zoom) = animation.zoom {
                camera.zoom = zoom;
            }
        });
        let state = Arc::clone(&camera);
        host.answer::<ResetCamera, _>(move |()| *state.lock() = CameraState::default());

        let api = host.camera();
        api.animate_to(CameraAnimation {
            position: Vector2::new(3.0, -4.0),
            zoom: Some(2.0),
            duration_ms: 250,
        })
        .await
        .unwrap();
        let moved = api.get().await.unwrap();
        assert_eq!(moved.position, Vector2::new(3.0, -4.0));
        assert_eq!(moved.zoom, 2.0);

        api.reset().await.unwrap();
        assert_eq!(api.get().await.unwrap(), CameraState::default());
    }
}
