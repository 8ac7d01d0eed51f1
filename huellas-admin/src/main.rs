use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use huellas_core::commands::{OpenOptions, ensure_initialized_at, huellas_root, open_kv, open_list};
use huellas_core::services::quota::{AI_MESSAGES, CANDLES};
use huellas_core::services::{
    Clock, Entitlements, JournalMood, JournalStore, ManualClock, ROUTINES, RoutineProgress,
    StaticIdentity, SystemClock, find_routine,
};
use huellas_core::utils::Logbook;
use huellas_core::{CoreConfig, MemorialList, PetType};

#[derive(Parser)]
#[command(
    name = "huellas-admin",
    about = "Operator helpers for HuellasEternas quotas and memorial order"
)]
struct Cli {
    /// Data root (defaults to $HUELLAS_ROOT or .huellas)
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    /// Act as this user
    #[arg(long, global = true, env = "HUELLAS_UID")]
    uid: Option<String>,
    /// Treat the user as premium
    #[arg(long, global = true)]
    premium: bool,
    /// Pretend today is this date (YYYY-MM-DD) for quota periods
    #[arg(long, global = true)]
    date: Option<NaiveDate>,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Create the data root, default config and logbook
    Init,
    /// Show free-tier counters for every gated feature
    QuotaStatus,
    /// Spend one free use of a feature (candles | ai_messages)
    QuotaUse { feature: String },
    /// Print active and archived memorials in display order
    List,
    /// Create a memorial owned by --uid
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "other")]
        pet: String,
    },
    Archive { id: Uuid },
    Restore { id: Uuid },
    /// Move active positions --from (repeatable) to start at --to
    Reorder {
        #[arg(long, required = true)]
        from: Vec<usize>,
        #[arg(long)]
        to: usize,
    },
    /// Join a memorial by share token or share link
    Join { token: String },
    /// Light a candle (spends a free candle unless --premium)
    Candle {
        id: Uuid,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        message: Option<String>,
    },
    /// List candles lit for a memorial
    Candles { id: Uuid },
    /// Memories written for a memorial
    #[command(subcommand)]
    Memories(MemoriesCmd),
    /// The private journal kept on this device
    #[command(subcommand)]
    Journal(JournalCmd),
    /// Coping routines and how often each was done
    #[command(subcommand)]
    Routines(RoutinesCmd),
    /// Print the last logbook events
    Log {
        #[arg(long, default_value_t = 20)]
        last: usize,
    },
}

#[derive(Subcommand)]
enum MemoriesCmd {
    List { memorial: Uuid },
    /// Add a memory; a photo link counts against the free photo limit
    Add {
        memorial: Uuid,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        text: String,
        #[arg(long)]
        photo: Option<String>,
    },
    Delete { memorial: Uuid, memory: Uuid },
}

#[derive(Subcommand)]
enum JournalCmd {
    List,
    /// Mood is a label ("En paz") or a name (peaceful)
    Add {
        #[arg(long)]
        mood: String,
        text: String,
    },
    Delete { id: Uuid },
}

#[derive(Subcommand)]
enum RoutinesCmd {
    List,
    Done { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let mut cli = Cli::parse();
    let root = cli.root.clone().unwrap_or_else(huellas_root);
    let report = ensure_initialized_at(&root)?;

    if let Cmd::Init = cli.cmd {
        println!("root: {}", report.root.display());
        for c in &report.created {
            println!("  created {c}");
        }
        for e in &report.existed {
            println!("  exists  {e}");
        }
        return Ok(());
    }

    // Device-local commands never touch the memorial list.
    let cmd = match std::mem::replace(&mut cli.cmd, Cmd::Init) {
        Cmd::Journal(cmd) => return journal(&report.config, cmd),
        Cmd::Routines(cmd) => return routines(&report.config, cmd),
        Cmd::Log { last } => return log(&report.config, last),
        other => other,
    };

    let mut list = open(&report.config, &cli)?;
    run(&mut list, &report.config, cmd).await?;

    // Wait for background writes so the process does not exit under them.
    let events = list.settle().await;
    if events > 0 {
        eprintln!("{events} background write(s) reported a problem; see logbook");
    }
    Ok(())
}

fn open(config: &CoreConfig, cli: &Cli) -> Result<MemorialList> {
    let identity = match &cli.uid {
        Some(uid) => StaticIdentity::signed_in(uid),
        None => StaticIdentity::anonymous(),
    };
    let entitlements = if cli.premium { Entitlements::premium() } else { Entitlements::free() };
    let clock: Arc<dyn Clock> = match cli.date {
        Some(d) => Arc::new(ManualClock::new(d)),
        None => Arc::new(SystemClock),
    };

    let mut opts = OpenOptions::new(Arc::new(identity), entitlements);
    opts.clock = clock;
    open_list(config, opts, tokio::runtime::Handle::current())
}

async fn run(list: &mut MemorialList, config: &CoreConfig, cmd: Cmd) -> Result<()> {
    match cmd {
        Cmd::Init | Cmd::Journal(_) | Cmd::Routines(_) | Cmd::Log { .. } => Ok(()),
        Cmd::QuotaStatus => {
            for feature in list.quota().features() {
                let w = list.quota().window(feature)?;
                println!(
                    "{:<12} {:>3}/{:<3} used  period {}  remaining {}",
                    w.feature_id,
                    w.used_count,
                    w.limit,
                    w.period_identifier,
                    w.remaining()
                );
            }
            Ok(())
        }
        Cmd::QuotaUse { feature } => {
            let admission = match feature.as_str() {
                CANDLES | AI_MESSAGES => list.quota().admit(&feature, list.entitlements().is_premium())?,
                other => anyhow::bail!("unknown feature `{other}` (expected {CANDLES} or {AI_MESSAGES})"),
            };
            println!("{feature}: {admission:?}");
            Ok(())
        }
        Cmd::List => {
            list.load().await?;
            print_list(list, config);
            Ok(())
        }
        Cmd::Create { name, pet } => {
            list.load().await?;
            let m = list.create_memorial(&name, PetType::parse(&pet));
            println!("created {} {} ({})", m.id, m.name, config.share.link_for(&m.share_token));
            Ok(())
        }
        Cmd::Archive { id } => {
            list.load().await?;
            anyhow::ensure!(list.archive(&id), "memorial {id} is not in the active list");
            println!("archived {id}");
            Ok(())
        }
        Cmd::Restore { id } => {
            list.load().await?;
            anyhow::ensure!(list.restore(&id), "memorial {id} is not archived");
            println!("restored {id}");
            Ok(())
        }
        Cmd::Reorder { from, to } => {
            list.load().await?;
            list.reorder(&from, to);
            print_list(list, config);
            Ok(())
        }
        Cmd::Join { token } => {
            list.load().await?;
            let m = list.join_by_token(&token).await.context("join failed")?;
            println!("joined {} {}", m.id, m.name);
            Ok(())
        }
        Cmd::Candle { id, from, message } => {
            let candle = list.light_candle(id, from.as_deref(), message.as_deref())?;
            println!(
                "candle {} lit for {}; free candles left today: {}",
                candle.id,
                id,
                list.remaining_free(CANDLES)?
            );
            Ok(())
        }
        Cmd::Candles { id } => {
            for c in list.remote().fetch_candles(&id).await? {
                println!(
                    "{}  {:<16} {}",
                    c.created_at.to_rfc3339(),
                    c.from_name.as_deref().unwrap_or("-"),
                    c.message.as_deref().unwrap_or("")
                );
            }
            Ok(())
        }
        Cmd::Memories(MemoriesCmd::List { memorial }) => {
            for m in list.memories(&memorial).await? {
                println!(
                    "{}  {}  {:<24} {}",
                    m.id,
                    m.created_at.to_rfc3339(),
                    m.title,
                    m.photo_url.as_deref().unwrap_or("")
                );
            }
            Ok(())
        }
        Cmd::Memories(MemoriesCmd::Add { memorial, title, text, photo }) => {
            let m = list.add_memory(memorial, &title, &text, photo.as_deref()).await?;
            println!("memory {} added to {memorial}", m.id);
            Ok(())
        }
        Cmd::Memories(MemoriesCmd::Delete { memorial, memory }) => {
            list.delete_memory(memorial, memory);
            println!("deleted {memory}");
            Ok(())
        }
    }
}

fn journal(config: &CoreConfig, cmd: JournalCmd) -> Result<()> {
    let store = JournalStore::new(open_kv(config)?);
    match cmd {
        JournalCmd::List => {
            for e in store.entries()? {
                println!("{}  {}  {} {:<10} {}", e.id, e.created_at.to_rfc3339(), e.mood.emoji(), e.mood.label(), e.text);
            }
        }
        JournalCmd::Add { mood, text } => {
            let mood = JournalMood::parse(&mood).with_context(|| {
                let known: Vec<&str> = JournalMood::ALL.iter().map(|m| m.label()).collect();
                format!("unknown mood `{mood}` (expected one of: {})", known.join(", "))
            })?;
            let e = store.add(mood, &text)?;
            println!("journal entry {} saved", e.id);
        }
        JournalCmd::Delete { id } => {
            anyhow::ensure!(store.delete(&id)?, "no journal entry {id}");
            println!("deleted {id}");
        }
    }
    Ok(())
}

fn routines(config: &CoreConfig, cmd: RoutinesCmd) -> Result<()> {
    let progress = RoutineProgress::new(open_kv(config)?);
    match cmd {
        RoutinesCmd::List => {
            for r in ROUTINES {
                let last = progress
                    .last_completed_at(r.id)?
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "{:<15} {:<28} {:>2} min  done {:>3}x  last {last}",
                    r.id,
                    r.title,
                    r.estimated_minutes,
                    progress.completion_count(r.id)?
                );
            }
        }
        RoutinesCmd::Done { id } => {
            let routine = find_routine(&id).with_context(|| format!("unknown routine `{id}`"))?;
            let count = progress.mark_completed(routine.id)?;
            println!("{}: done {count} time(s)", routine.title);
        }
    }
    Ok(())
}

fn log(config: &CoreConfig, last: usize) -> Result<()> {
    let book = Logbook::open(config.logbook.path.clone())?;
    let lines = book.read_all()?;
    for line in &lines[lines.len().saturating_sub(last)..] {
        println!("{line}");
    }
    Ok(())
}

fn print_list(list: &MemorialList, config: &CoreConfig) {
    println!("active:");
    for (i, m) in list.active().iter().enumerate() {
        println!("  {i:>2}  {}  {:<20} {:<7} {}", m.id, m.name, m.pet_type.as_str(), config.share.link_for(&m.share_token));
    }
    println!("archived:");
    for m in list.archived() {
        println!("      {}  {:<20} {:<7}", m.id, m.name, m.pet_type.as_str());
    }
}
