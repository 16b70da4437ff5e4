//! `lodestar demo`: one host, several plugins, every facade exercised once.

use crate::config::CliConfig;
use anyhow::{bail, Result};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use lodestar_bridge::{
    announce_ready, Bridge, BridgeConfig, InProcessHub, PluginSet, ReadinessTracker,
};
use lodestar_protocol::{
    AllPluginsReady, AnimateCameraTo, CameraAnimation, CameraChanged, CameraState, GetActiveTool,
    GetCamera, GetGridCellSize, GetGridHeight, GetGridSettings, GetGridType, GetGridWidth,
    GridSettings, PluginId, ResetCamera, SetActiveTool, ToolChanged, ToolId, Vector2,
};
use parking_lot::Mutex;
use std::fmt::Debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Canonical state owned by the host.
#[derive(Debug, Clone)]
pub struct SceneState {
    pub grid: GridSettings,
    pub camera: CameraState,
    pub tool: ToolId,
}

impl Default for SceneState {
    fn default() -> Self {
        Self {
            grid: GridSettings::default(),
            camera: CameraState::default(),
            tool: ToolId::new("select"),
        }
    }
}

impl SceneState {
    /// Install a handler for every catalog command on `host`.
    ///
    /// With `drop_camera`, GET_CAMERA stays unanswered.
    pub fn serve(host: &Bridge, drop_camera: bool) -> Arc<Mutex<SceneState>> {
        let state = Arc::new(Mutex::new(SceneState::default()));

        let s = Arc::clone(&state);
        host.answer::<GetGridType, _>(move |()| s.lock().grid.grid_type);
        let s = Arc::clone(&state);
        host.answer::<GetGridWidth, _>(move |()| s.lock().grid.width);
        let s = Arc::clone(&state);
        host.answer::<GetGridHeight, _>(move |()| s.lock().grid.height);
        let s = Arc::clone(&state);
        host.answer::<GetGridCellSize, _>(move |()| s.lock().grid.cell_size);

        // Settings are answered asynchronously, like a renderer round-trip
        let s = Arc::clone(&state);
        host.handle::<GetGridSettings, _, _>(move |()| {
            let grid = s.lock().grid.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(grid)
            }
        });

        if !drop_camera {
            let s = Arc::clone(&state);
            host.answer::<GetCamera, _>(move |()| s.lock().camera);
        }

        let s = Arc::clone(&state);
        let weak = host.downgrade();
        host.answer::<AnimateCameraTo, _>(move |animation: CameraAnimation| {
            let camera = {
                let mut scene = s.lock();
                scene.camera.position = animation.position;
                if let Some(zoom) = animation.zoom {
                    scene.camera.zoom = zoom;
                }
                scene.camera
            };
            if let Some(host) = weak.upgrade() {
                broadcast::<CameraChanged>(&host, &camera);
            }
        });

        let s = Arc::clone(&state);
        let weak = host.downgrade();
        host.answer::<ResetCamera, _>(move |()| {
            let camera = CameraState::default();
            s.lock().camera = camera;
            if let Some(host) = weak.upgrade() {
                broadcast::<CameraChanged>(&host, &camera);
            }
        });

        let s = Arc::clone(&state);
        host.answer::<GetActiveTool, _>(move |()| s.lock().tool.clone());

        let s = Arc::clone(&state);
        let weak = host.downgrade();
        host.answer::<SetActiveTool, _>(move |tool: ToolId| {
            s.lock().tool = tool.clone();
            if let Some(host) = weak.upgrade() {
                broadcast::<ToolChanged>(&host, &tool);
            }
        });

        state
    }
}

fn broadcast<E: lodestar_protocol::Event>(host: &Bridge, payload: &E::Payload) {
    if let Err(e) = host.emit_event::<E>(payload) {
        warn!(event = %E::KIND, error = %e, "broadcast failed");
    }
}

/// One line of the demo report.
#[derive(Debug, Clone)]
pub struct Step {
    pub operation: &'static str,
    pub outcome: std::result::Result<String, String>,
}

impl Step {
    fn record<T: Debug>(operation: &'static str, result: lodestar_bridge::Result<T>) -> Self {
        Self {
            operation,
            outcome: result.map(|v| format!("{v:?}")).map_err(|e| e.to_string()),
        }
    }
}

/// Everything the demo observed.
#[derive(Debug, Default)]
pub struct Report {
    pub steps: Vec<Step>,
    pub ready_broadcasts: usize,
    pub tool_changes: usize,
    pub camera_changes: usize,
}

pub async fn execute(
    config: CliConfig,
    plugins_override: Vec<String>,
    drop_camera: bool,
) -> Result<()> {
    let plugin_ids = if plugins_override.is_empty() {
        config.demo.plugins.clone()
    } else {
        plugins_override
    };

    let report = run(&plugin_ids, config.bridge.clone(), drop_camera).await?;
    print_report(&plugin_ids, &report);
    Ok(())
}

/// Run the scripted session and collect what happened.
pub async fn run(plugin_ids: &[String], bridge: BridgeConfig, drop_camera: bool) -> Result<Report> {
    if plugin_ids.is_empty() {
        bail!("demo needs at least one plugin");
    }

    let hub = InProcessHub::new();
    let registry: Arc<PluginSet> = Arc::new(plugin_ids.iter().map(String::as_str).collect());
    let host = Bridge::host(Arc::new(hub.host_channel()), registry.clone(), bridge.clone());
    SceneState::serve(&host, drop_camera);
    let tracker = ReadinessTracker::attach(&host, registry)?;

    let ready = Arc::new(AtomicUsize::new(0));
    let tools = Arc::new(AtomicUsize::new(0));
    let cameras = Arc::new(AtomicUsize::new(0));

    let mut plugins = Vec::with_capacity(plugin_ids.len());
    for id in plugin_ids {
        let plugin = Bridge::plugin(Arc::new(hub.plugin_channel(id.as_str())), bridge.clone());

        let r = Arc::clone(&ready);
        plugin.subscribe::<AllPluginsReady, _>(move |()| {
            r.fetch_add(1, Ordering::SeqCst);
        });
        let t = Arc::clone(&tools);
        plugin.tools().on_change(move |_| {
            t.fetch_add(1, Ordering::SeqCst);
        });
        let c = Arc::clone(&cameras);
        plugin.camera().on_change(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        announce_ready(&plugin, &PluginId::new(id.as_str()))?;
        plugins.push(plugin);
    }
    info!(plugins = plugins.len(), broadcast = tracker.has_broadcast(), "plugins mounted");

    let lead = &plugins[0];
    let grid = lead.grid();
    let camera = lead.camera();
    let tool = lead.tools();

    let mut steps = vec![
        Step::record("GET_GRID_TYPE", grid.grid_type().await),
        Step::record("GET_GRID_WIDTH", grid.width().await),
        Step::record("GET_GRID_HEIGHT", grid.height().await),
        Step::record("GET_GRID_CELL_SIZE", grid.cell_size().await),
        Step::record("GET_GRID_SETTINGS", grid.settings().await),
        Step::record("GET_CAMERA", camera.get().await),
    ];
    steps.push(Step::record(
        "ANIMATE_CAMERA_TO",
        camera
            .animate_to(CameraAnimation {
                position: Vector2::new(120.0, 80.0),
                zoom: Some(1.5),
                duration_ms: 250,
            })
            .await,
    ));
    steps.push(Step::record("RESET_CAMERA", camera.reset().await));
    steps.push(Step::record("GET_ACTIVE_TOOL", tool.active().await));
    steps.push(Step::record("SET_ACTIVE_TOOL", tool.select("measure").await));
    steps.push(Step::record("GET_ACTIVE_TOOL", tool.active().await));

    for plugin in &plugins {
        plugin.destroy();
    }
    host.destroy();

    Ok(Report {
        steps,
        ready_broadcasts: ready.load(Ordering::SeqCst),
        tool_changes: tools.load(Ordering::SeqCst),
        camera_changes: cameras.load(Ordering::SeqCst),
    })
}

fn print_report(plugin_ids: &[String], report: &Report) {
    println!(
        "{} {}",
        "Mounted:".bold(),
        plugin_ids.join(", ")
    );
    if report.ready_broadcasts == plugin_ids.len() {
        println!("{}", "all plugins ready".green());
    } else {
        println!("{}", "readiness broadcast incomplete".yellow());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Request", "Outcome"]);
    for step in &report.steps {
        let outcome = match &step.outcome {
            Ok(value) => Cell::new(value).fg(Color::Green),
            Err(e) => Cell::new(e).fg(Color::Red),
        };
        table.add_row(vec![Cell::new(step.operation), outcome]);
    }
    println!("{table}");

    println!(
        "TOOL_CHANGED seen {} times, CAMERA_CHANGED seen {} times",
        report.tool_changes, report.camera_changes
    );
}
