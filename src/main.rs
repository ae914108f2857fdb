//! Headless satellite tracker
//!
//! Runs the core on a fixed-rate schedule and logs where every tracked object
//! is in the inertial frame.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use bevy::app::ScheduleRunnerPlugin;
use bevy::prelude::*;
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use satcore::config::CoreConfig;
use satcore::{
    CatalogId, SatCorePlugin, SatelliteRegistry, SceneGraph, SharedRecordStore, SimulationClock,
    StandardFrames, TickEpoch, TickSet,
};

#[derive(Parser, Debug)]
#[command(name = "satcore", version, about = "Headless satellite tracker")]
struct Args {
    /// Catalog id to track (repeatable)
    #[arg(short = 'c', long = "catalog-id")]
    catalog_ids: Vec<String>,

    /// Provider group to pre-load into the record cache, e.g. "stations"
    #[arg(short, long)]
    group: Option<String>,

    /// Simulation speed multiplier, clamped to the configured maximum
    #[arg(short, long, default_value_t = 1.0, allow_negative_numbers = true)]
    speed: f64,

    /// Number of ticks to run before exiting
    #[arg(short, long, default_value_t = 10)]
    ticks: u64,

    /// Wall time between ticks in milliseconds
    #[arg(long, default_value_t = 1000)]
    tick_ms: u64,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Resource)]
struct RunPlan {
    catalog_ids: Vec<CatalogId>,
    group: Option<String>,
    speed: f64,
    ticks: u64,
    done: u64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => CoreConfig::from_toml_file(path)
            .with_context(|| format!("load config {}", path.display()))?,
        None => CoreConfig::default(),
    };
    info!(?config, "starting satcore");

    let mut app = App::new();
    app.add_plugins(
        MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_millis(args.tick_ms))),
    )
    .add_plugins(SatCorePlugin { config })
    .insert_resource(RunPlan {
        catalog_ids: args.catalog_ids.into_iter().map(CatalogId::from).collect(),
        group: args.group,
        speed: args.speed,
        ticks: args.ticks,
        done: 0,
    })
    .add_systems(Startup, start_tracking)
    .add_systems(Update, report_positions.after(TickSet::Scene));

    if !app.world().contains_resource::<SharedRecordStore>() {
        anyhow::bail!("orbital record store could not be opened");
    }
    app.run();
    Ok(())
}

/// Startup system: configure the clock and register the requested objects
fn start_tracking(
    plan: Res<RunPlan>,
    clock: Res<SimulationClock>,
    store: Res<SharedRecordStore>,
    frames: Res<StandardFrames>,
    mut registry: ResMut<SatelliteRegistry>,
    mut graph: ResMut<SceneGraph>,
) {
    match clock.set_speed(plan.speed) {
        Ok(speed) => info!(speed, "simulation speed set"),
        Err(err) => warn!(error = %err, "speed rejected, keeping default"),
    }
    clock.start();

    if let Some(group) = &plan.group {
        info!(%group, "requesting group");
        store.request_group(group);
    }
    for id in &plan.catalog_ids {
        if let Err(err) = registry.add(id.clone(), &mut graph, frames.inertial, &store) {
            warn!(catalog_id = %id, error = %err, "could not track object");
        }
    }
}

/// Log every tracked object's world position and subpoint, and stop after the planned ticks
fn report_positions(
    tick: Res<TickEpoch>,
    registry: Res<SatelliteRegistry>,
    graph: Res<SceneGraph>,
    store: Res<SharedRecordStore>,
    mut plan: ResMut<RunPlan>,
    mut exit: MessageWriter<AppExit>,
) {
    plan.done += 1;
    let epoch = tick.instant.to_rfc3339();
    for object in registry.iter() {
        if let Some(err) = &object.last_error {
            warn!(catalog_id = %object.catalog_id, %epoch, error = %err, "not placed");
            continue;
        }
        if !object.placed {
            info!(catalog_id = %object.catalog_id, %epoch, "waiting for orbital data");
            continue;
        }
        match graph.world_transform(object.node) {
            Ok(world) => {
                let p = world.translation();
                info!(
                    catalog_id = %object.catalog_id,
                    %epoch,
                    x_km = p.x,
                    y_km = p.y,
                    z_km = p.z,
                    stale = object.stale,
                    "position"
                );
                if let Some(sub) = object.subpoint {
                    debug!(
                        catalog_id = %object.catalog_id,
                        lat_deg = sub.latitude_deg,
                        lon_deg = sub.longitude_deg,
                        alt_km = sub.altitude_km,
                        "subpoint"
                    );
                }
            }
            Err(err) => warn!(catalog_id = %object.catalog_id, error = %err, "node missing"),
        }
    }
    if plan.done >= plan.ticks {
        info!(ticks = plan.done, cached = store.list_cached().len(), "done");
        exit.write(AppExit::Success);
    }
}
