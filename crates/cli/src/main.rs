use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;
use xprofile_account::{AccountInfo, KeyVariant};
use xprofile_core::{FsStorage, LoadReport, ProfileConfig, ProfileStore, TitleRef};
use xprofile_gpd::TitleCatalogue;

mod report;

#[derive(Parser)]
#[command(name = "xprofile")]
#[command(about = "Inspect and maintain console user profiles", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Profile directory (overrides the config file and XPROFILE_DIR)
    #[arg(long, global = true)]
    profile_dir: Option<PathBuf>,

    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Print JSON on stdout (implies --quiet)
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the account and every title on the dashboard
    Show,

    /// Merge a title's achievement catalogue (JSON) into the profile
    Activate(ActivateArgs),

    /// List achievements of one title, or of every loaded title
    Achievements(AchievementsArgs),

    /// Unlock an achievement
    Unlock(UnlockArgs),

    /// Rewrite every loaded title collection
    Flush,

    /// Seal a new account credential into the profile
    Seal(SealArgs),
}

#[derive(Args)]
struct ActivateArgs {
    /// Path to the catalogue JSON file
    catalogue: PathBuf,
}

#[derive(Args)]
struct AchievementsArgs {
    /// Title id in hex
    #[arg(long, value_parser = parse_hex_u32)]
    title: Option<u32>,
}

#[derive(Args)]
struct UnlockArgs {
    /// Title id in hex
    #[arg(long, value_parser = parse_hex_u32)]
    title: u32,

    /// Achievement id
    #[arg(long)]
    id: u16,
}

#[derive(Args)]
struct SealArgs {
    /// Online account id in hex
    #[arg(long, value_parser = parse_hex_u64)]
    xuid: u64,

    /// Gamertag, at most 15 UTF-16 units
    #[arg(long)]
    gamertag: String,

    /// Seal with the devkit root secret instead of the retail one
    #[arg(long)]
    devkit: bool,
}

fn main() -> Result<()> {
    let mut cli = Cli::parse();
    if cli.json {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = load_config(&cli)?;
    let (store, report) = ProfileStore::open(&config).context("Failed to open profile")?;

    match cli.command {
        Commands::Show => run_show(&store, &report, cli.json)?,
        Commands::Activate(args) => run_activate(store, args, cli.json)?,
        Commands::Achievements(args) => run_achievements(&store, args, cli.json)?,
        Commands::Unlock(args) => run_unlock(store, args, cli.json)?,
        Commands::Flush => run_flush(store, cli.json)?,
        Commands::Seal(args) => run_seal(store, &config, args, cli.json)?,
    }

    Ok(())
}

/// Config file, then `XPROFILE_*` environment, then `--profile-dir`.
fn load_config(cli: &Cli) -> Result<ProfileConfig> {
    let mut config = match &cli.config {
        Some(path) => ProfileConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ProfileConfig::default(),
    };
    config.apply_env();
    if let Some(dir) = &cli.profile_dir {
        config.profile_directory.clone_from(dir);
    }
    config.validate()?;
    Ok(config)
}

fn run_show(store: &ProfileStore<FsStorage>, report: &LoadReport, json: bool) -> Result<()> {
    if json {
        emit_json(&report::profile_json(store.account(), store.dashboard(), report)?)?;
    } else {
        print!(
            "{}",
            report::render_profile(store.account(), store.dashboard(), report)
        );
    }
    Ok(())
}

fn run_activate(mut store: ProfileStore<FsStorage>, args: ActivateArgs, json: bool) -> Result<()> {
    let catalogue = TitleCatalogue::from_path(&args.catalogue)
        .with_context(|| format!("Failed to read catalogue {}", args.catalogue.display()))?;
    catalogue.validate()?;

    store.activate_title(&catalogue)?;
    print_title(&store, catalogue.title_id, json)
}

fn run_achievements(
    store: &ProfileStore<FsStorage>,
    args: AchievementsArgs,
    json: bool,
) -> Result<()> {
    let ids: Vec<u32> = match args.title {
        Some(id) => vec![id],
        None => store.titles().map(|gpd| gpd.title_id()).collect(),
    };

    if json {
        let titles = ids
            .iter()
            .map(|id| {
                let gpd = store.lookup(TitleRef::Id(*id))?;
                report::achievements_json(store.summary(TitleRef::Id(*id)).ok(), gpd)
            })
            .collect::<Result<Vec<Value>>>()?;
        return emit_json(&json!({ "titles": titles }));
    }

    for id in ids {
        print_title(store, id, false)?;
    }
    Ok(())
}

fn run_unlock(mut store: ProfileStore<FsStorage>, args: UnlockArgs, json: bool) -> Result<()> {
    let unlocked = store.unlock_achievement(TitleRef::Id(args.title), args.id)?;
    if json {
        return emit_json(&json!({
            "title_id": format!("{:08X}", args.title),
            "achievement_id": args.id,
            "newly_unlocked": unlocked,
        }));
    }
    if unlocked {
        println!("Unlocked achievement {} for title {:08X}", args.id, args.title);
    } else {
        println!("Achievement {} for title {:08X} was already unlocked", args.id, args.title);
    }
    Ok(())
}

fn run_flush(mut store: ProfileStore<FsStorage>, json: bool) -> Result<()> {
    let persisted = store.persist_all();
    if json {
        emit_json(&report::persist_json(&persisted))?;
    } else {
        print!("{}", report::render_persist(&persisted));
    }
    if !persisted.is_clean() {
        bail!("{} title(s) could not be written", persisted.failed.len());
    }
    Ok(())
}

fn run_seal(
    mut store: ProfileStore<FsStorage>,
    config: &ProfileConfig,
    args: SealArgs,
    json: bool,
) -> Result<()> {
    let variant = if args.devkit {
        KeyVariant::Devkit
    } else {
        KeyVariant::Retail
    };
    let resolver = config.key_resolver()?;
    let info = AccountInfo::new(args.xuid, &args.gamertag)?;
    store.reseal_account(&resolver, variant, info)?;

    if json {
        return emit_json(&json!({
            "gamertag": args.gamertag,
            "xuid": format!("{:016X}", args.xuid),
            "key": variant.as_str(),
        }));
    }
    println!("Sealed account {} ({:016X}) with {variant} key", args.gamertag, args.xuid);
    Ok(())
}

fn print_title(store: &ProfileStore<FsStorage>, title_id: u32, json: bool) -> Result<()> {
    let gpd = store.lookup(TitleRef::Id(title_id))?;
    let summary = store.summary(TitleRef::Id(title_id)).ok();
    if json {
        emit_json(&report::achievements_json(summary, gpd)?)
    } else {
        print!("{}", report::render_achievements(summary, gpd));
        Ok(())
    }
}

fn emit_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_hex_u32(raw: &str) -> std::result::Result<u32, String> {
    u32::from_str_radix(strip_hex_prefix(raw), 16).map_err(|e| format!("invalid hex id: {e}"))
}

fn parse_hex_u64(raw: &str) -> std::result::Result<u64, String> {
    u64::from_str_radix(strip_hex_prefix(raw), 16).map_err(|e| format!("invalid hex id: {e}"))
}

fn strip_hex_prefix(raw: &str) -> &str {
    let raw = raw.trim();
    raw.strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw)
}
