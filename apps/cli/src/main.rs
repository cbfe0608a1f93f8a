#![deny(warnings)]

//! Headless CLI: seeds a world from the mods directory, runs it and prints
//! per-realm KPIs.

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use sim_core::{validate_config, ResourceKind, SimConfig};
use sim_runtime::{seed_world, ScenarioParams, SimContext};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct Args {
    years: Option<u32>,
    seed: Option<u64>,
    mods: Option<PathBuf>,
    config: Option<PathBuf>,
    save: Option<PathBuf>,
    db: Option<String>,
    version: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--years" => args.years = it.next().and_then(|s| s.parse().ok()),
            "--seed" => args.seed = it.next().and_then(|s| s.parse().ok()),
            "--mods" => args.mods = it.next().map(PathBuf::from),
            "--config" => args.config = it.next().map(PathBuf::from),
            "--save" => args.save = it.next().map(PathBuf::from),
            "--db" => args.db = it.next(),
            "--version" => args.version = true,
            other => bail!("unknown argument: {other}"),
        }
    }
    Ok(args)
}

/// `assets/mods` under the working directory, else the copy next to the sources.
fn default_mods_dir() -> PathBuf {
    let local = PathBuf::from("assets/mods");
    if local.is_dir() {
        local
    } else {
        PathBuf::from(env!("BUNDLED_MODS_DIR"))
    }
}

fn load_config(args: &Args) -> Result<SimConfig> {
    let mut cfg = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => SimConfig::default(),
    };
    if let Some(seed) = args.seed {
        cfg.rng_seed = seed;
    }
    validate_config(&cfg)?;
    Ok(cfg)
}

fn print_kpis(ctx: &SimContext) {
    println!(
        "World {} | cities: {} | food: {} | gold: {} | manpower: {} | tech xp: {}",
        ctx.date(),
        ctx.city_ids().len(),
        ctx.total_resource(ResourceKind::Food),
        ctx.total_resource(ResourceKind::Gold),
        ctx.total_resource(ResourceKind::Manpower),
        ctx.total_resource(ResourceKind::TechXp),
    );
    for gov in ctx.governments().iter() {
        let realm = gov.realm();
        let loyalty = ctx
            .contracts()
            .subject_loyalty(realm)
            .map(|l| l.round_dp(1).to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "{} | {:?} | legitimacy: {} | capacity: {} | revolt: {} ({:?}) | edicts: {} | subject loyalty: {}",
            realm,
            gov.data().form,
            gov.legitimacy().round_dp(1),
            gov.data().admin_capacity,
            gov.revolt_risk().round_dp(1),
            gov.revolt_tier(),
            ctx.edicts().active(realm).len(),
            loyalty,
        );
    }
    let growth: Decimal = ctx
        .city_ids()
        .into_iter()
        .filter_map(|c| ctx.city_growth_bonus(c).ok())
        .sum();
    println!("Growth bonus (all cities): {}", growth.round_dp(3));
}

async fn store_in_db(url: &str, ctx: &SimContext) -> Result<()> {
    let pool = persistence::init_db(url).await?;
    let save = persistence::create_save(&pool, "cli", Some("headless run")).await?;
    persistence::store_snapshot(&pool, save, &ctx.snapshot()).await?;
    info!(%url, save, "snapshot stored in database");
    Ok(())
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .init();

    let args = parse_args()?;
    if args.version {
        println!(
            "realm-sim {} ({} {})",
            env!("CARGO_PKG_VERSION"),
            env!("GIT_SHA"),
            env!("BUILD_DATE")
        );
        return Ok(());
    }
    info!(?args, "starting CLI");

    let cfg = load_config(&args)?;
    let mods = args.mods.clone().unwrap_or_else(default_mods_dir);
    let pack = modkit::ModLoader::new(&mods)
        .load_all()
        .with_context(|| format!("loading mods from {}", mods.display()))?;

    let (mut ctx, providers) = seed_world(cfg, &pack, ScenarioParams::default())?;
    let days = u64::from(args.years.unwrap_or(1)) * 365;
    for _ in 0..days {
        ctx.step_day(&providers)?;
    }
    print_kpis(&ctx);

    if let Some(path) = &args.save {
        std::fs::write(path, ctx.snapshot().to_json_pretty()?)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "snapshot written");
    }
    if let Some(url) = &args.db {
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(store_in_db(url, &ctx))?;
    }
    Ok(())
}
