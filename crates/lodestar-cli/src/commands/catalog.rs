use anyhow::{bail, Result};
use comfy_table::{presets::UTF8_FULL, Table};
use lodestar_protocol::{CommandKind, EventKind, CATALOG_VERSION};
use serde_json::{json, Value};

pub fn execute(format: &str) -> Result<()> {
    match format {
        "table" => println!("{}", render_table()),
        "json" => println!("{}", serde_json::to_string_pretty(&render_json())?),
        other => bail!("unsupported format: {other} (expected table or json)"),
    }
    Ok(())
}

pub fn render_table() -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Kind", "Name", "Payload", "Response"]);

    for kind in CommandKind::ALL {
        let (payload, response) = kind.signature();
        table.add_row(vec!["command", kind.as_str(), payload, response]);
    }
    for kind in EventKind::ALL {
        table.add_row(vec!["event", kind.as_str(), kind.payload_type(), "-"]);
    }

    format!("Catalog v{CATALOG_VERSION}\n{table}")
}

pub fn render_json() -> Value {
    let commands: Vec<Value> = CommandKind::ALL
        .iter()
        .map(|kind| {
            let (payload, response) = kind.signature();
            json!({ "name": kind.as_str(), "payload": payload, "response": response })
        })
        .collect();
    let events: Vec<Value> = EventKind::ALL
        .iter()
        .map(|kind| json!({ "name": kind.as_str(), "payload": kind.payload_type() }))
        .collect();

    json!({
        "version": CATALOG_VERSION,
        "commands": commands,
        "events": events,
    })
}
