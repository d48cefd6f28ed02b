mod sim;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use voxelspace_common::ChunkCoord;
use voxelspace_kernel::{ChunkStorage, World, WorldConfig};
use voxelspace_net::{Hub, HubConfig};
use voxelspace_persist::{DirChunkStorage, MemoryChunkStorage, SnapshotStore};
use voxelspace_terrain::TerrainGenerator;

use crate::sim::{RunSummary, Simulation};

#[derive(Parser)]
#[command(name = "voxelspace-cli", about = "Operator tool for voxelspace worlds")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// JSON file with `world` and `hub` sections; missing keys use defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the terrain seed
    #[arg(short, long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and effective configuration
    Info,
    /// Generate terrain around a chunk and report what came out
    Generate {
        /// Center chunk as "x,y,z"
        #[arg(long, default_value = "0,2,0", allow_hyphen_values = true)]
        center: ChunkCoord,
        /// Chebyshev radius in chunks
        #[arg(short, long, default_value = "1")]
        radius: i32,
        /// Write the chunks into this chunk directory
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Run scripted clients against an in-memory server
    Simulate {
        #[arg(short, long, default_value = "100")]
        ticks: u64,
        #[arg(short, long, default_value = "2")]
        players: usize,
        /// Non-player entities to spawn
        #[arg(short, long, default_value = "3")]
        entities: usize,
    },
    /// Simulate against a data directory, then save and reload a snapshot
    Snapshot {
        /// Data directory holding `chunks/` and the snapshot store
        #[arg(short, long)]
        dir: PathBuf,
        #[arg(short, long, default_value = "60")]
        ticks: u64,
        #[arg(short, long, default_value = "2")]
        players: usize,
    },
    /// Check a snapshot store's hash chain and decode its newest snapshot
    Verify {
        #[arg(short, long)]
        dir: PathBuf,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CliConfig {
    world: WorldConfig,
    hub: HubConfig,
}

impl CliConfig {
    fn load(path: Option<&Path>, seed: Option<u64>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => Self::default(),
        };
        if let Some(seed) = seed {
            config.world.terrain.seed = seed;
        }
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = CliConfig::load(cli.config.as_deref(), cli.seed)?;

    match cli.command {
        Commands::Info => {
            println!("voxelspace-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("{}", serde_json::to_string_pretty(&config.world)?);
            println!("{}", serde_json::to_string_pretty(&config.hub)?);
        }
        Commands::Generate {
            center,
            radius,
            out,
        } => {
            let generator = TerrainGenerator::new(config.world.terrain.clone());
            tracing::info!(%center, radius, seed = generator.seed(), "generating terrain");
            let origin = center.origin();
            println!(
                "Generating radius {radius} around {center} (seed {})",
                generator.seed()
            );
            println!(
                "Center column: biome={}, height={}",
                generator.biome_at(origin.x, origin.z).name(),
                generator.height_at(origin.x, origin.z)
            );
            let storage = out.as_deref().map(DirChunkStorage::open).transpose()?;
            let mut chunks = 0usize;
            let mut solid = 0usize;
            for coord in center.neighborhood(radius) {
                let chunk = generator.generate(coord);
                chunks += 1;
                solid += chunk.solid_count();
                if let Some(storage) = &storage {
                    pollster::block_on(storage.put(coord, chunk.to_data()))
                        .with_context(|| format!("writing chunk {coord}"))?;
                }
            }
            tracing::info!(chunks, solid, written = storage.is_some(), "generation finished");
            println!("Generated {chunks} chunks, {solid} solid voxels");
            if let Some(storage) = &storage {
                println!("Wrote chunks to {}", storage.dir().display());
            }
        }
        Commands::Simulate {
            ticks,
            players,
            entities,
        } => {
            let world = World::new(config.world);
            let hub = Hub::new(world, MemoryChunkStorage::new(), config.hub);
            let mut sim = Simulation::new(hub);
            sim.spawn_drones(entities)?;
            tracing::info!(ticks, players, entities, "simulation starting");
            let summary = pollster::block_on(async {
                sim.add_bots(players).await;
                sim.run(ticks).await
            });
            tracing::info!(
                ticks = summary.ticks,
                state_hash = sim.hub.world().state_hash(),
                "simulation finished"
            );
            print_summary(&sim, &summary);
            println!("Stored chunks: {}", sim.hub.storage().len());
        }
        Commands::Snapshot {
            dir,
            ticks,
            players,
        } => {
            let storage = DirChunkStorage::open(&dir)?;
            let world = World::new(config.world.clone());
            let mut hub = Hub::new(world, storage, config.hub);
            let indexed = pollster::block_on(hub.index_storage())?;
            tracing::info!(
                dir = %dir.display(),
                indexed,
                ticks,
                players,
                "snapshot run starting"
            );
            println!("Indexed {indexed} stored chunks");

            let mut sim = Simulation::new(hub);
            let summary = pollster::block_on(async {
                sim.add_bots(players).await;
                sim.run(ticks).await
            });
            print_summary(&sim, &summary);

            let snapshot = sim.hub.snapshot();
            let expected = sim.hub.world().state_hash();
            let mut store = SnapshotStore::open(dir.join("snapshots"))?;
            let index = store.save(&snapshot)?;
            tracing::info!(
                index,
                tick = snapshot.tick,
                chunks = snapshot.chunks.len(),
                "snapshot written"
            );
            println!(
                "Saved snapshot {index}: tick={}, chunks={}, bodies={}",
                snapshot.tick,
                snapshot.chunks.len(),
                snapshot.body_count()
            );

            let mut restored = World::new(config.world);
            restored.load(store.load(index)?)?;
            let actual = restored.state_hash();
            tracing::info!(index, expected, actual, "snapshot reloaded");
            println!("State hash: saved={expected:#018x}, reloaded={actual:#018x}");
            anyhow::ensure!(expected == actual, "reloaded snapshot does not match");
            println!("Round trip OK");
        }
        Commands::Verify { dir } => {
            let store = SnapshotStore::open(dir.join("snapshots"))?;
            let meta = store.meta();
            println!(
                "Schema v{}, {} snapshots, latest tick {}",
                meta.schema_version, meta.snapshot_count, meta.latest_tick
            );
            tracing::info!(
                dir = %dir.display(),
                snapshots = meta.snapshot_count,
                "verifying snapshot store"
            );
            store.verify_integrity()?;
            println!("Hash chain OK ({} entries)", store.manifest().entries.len());
            if meta.snapshot_count > 0 {
                let snapshot = store.load_latest()?;
                let mut world = World::new(config.world);
                world.load(snapshot)?;
                tracing::info!(
                    tick = world.tick(),
                    state_hash = world.state_hash(),
                    "latest snapshot decoded"
                );
                println!(
                    "Latest: tick={}, entities={}, players={}, state hash {:#018x}",
                    world.tick(),
                    world.entity_count(),
                    world.player_count(),
                    world.state_hash()
                );
            }
        }
    }

    Ok(())
}

fn print_summary<S: ChunkStorage>(sim: &Simulation<S>, summary: &RunSummary) {
    let world = sim.hub.world();
    let timer = sim.hub.timer();
    println!(
        "Ran {} ticks: world tick={}, entities={}, players={}",
        summary.ticks,
        world.tick(),
        world.entity_count(),
        world.player_count()
    );
    println!(
        "Chunks: resident={}, parked={}, generated={}, flushed={}, flush failures={}",
        world.chunks().len(),
        world.chunks().parked_len(),
        summary.generated,
        summary.flushed,
        summary.flush_failures
    );
    println!(
        "Tick time: avg={:?}, min={:?}, max={:?}; collisions={}",
        timer.average(),
        timer.min(),
        timer.max(),
        summary.collisions
    );
    println!("World updates sent: {}", summary.updates_sent);
    for (kind, count) in &summary.received {
        println!("  received {kind}: {count}");
    }
    println!("State hash: {:#018x}", world.state_hash());
}
