use faceroll::{
    cli::{read_embedding_file, read_frames, replay_session, write_attendance_csv, FrameOutcome},
    common::{Config, DevMode},
    core::{AttendanceSession, IdentityResolver, Tracker},
    storage::{AttendanceEvent, AttendanceLedger, Database, Identity, IdentityStore, OrderBy},
    FaceRollError,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "faceroll")]
#[command(about = "Face-tracking attendance with an embedding gallery")]
struct Cli {
    /// Enable development mode (keeps data under ./dev_data)
    #[arg(long, global = true)]
    dev: bool,

    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file, overriding the configuration
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a new identity from a 512-float embedding file
    Enroll {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        image: String,
        /// JSON array holding the face embedding
        #[arg(short, long)]
        embedding: PathBuf,
        /// Identity id (a random UUID when omitted)
        #[arg(long)]
        id: Option<String>,
    },
    /// List enrolled identities
    List {
        /// Sort column: name or id
        #[arg(long, default_value = "name")]
        order_by: String,
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long, default_value = "20")]
        page_size: u32,
    },
    /// Find the closest enrolled identities to an embedding
    Search {
        #[arg(short, long)]
        embedding: PathBuf,
        #[arg(short, long, default_value = "5")]
        k: usize,
    },
    /// Remove an identity that has no attendance events
    Remove {
        #[arg(long)]
        id: String,
    },
    /// Record an attendance event
    Record {
        #[arg(long)]
        identity_id: String,
        /// Evidence frame image
        #[arg(long)]
        frame: String,
        #[arg(long)]
        event_id: Option<String>,
    },
    /// Show the attendance ledger, newest first
    Attendance {
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long, default_value = "20")]
        page_size: u32,
    },
    /// Export the attendance ledger to CSV
    ExportAttendance {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run the tracking and recognition pipeline over recorded detections
    Replay {
        /// JSON-lines file, one frame per line
        #[arg(short, long)]
        detections: PathBuf,
        /// Write arrivals to the attendance ledger
        #[arg(long)]
        record: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.dev);

    let dev_mode = DevMode::new(cli.dev)?;
    let mut config = load_config(cli.config.as_deref(), &dev_mode)?;
    if let Some(database) = cli.database {
        config.store.database_path = Some(database);
    }

    let db = Database::open(&dev_mode.database_path(&config))?;
    let store = IdentityStore::new(db.clone(), &config.store);
    let ledger = AttendanceLedger::new(db);

    match cli.command {
        Commands::Enroll { name, image, embedding, id } => {
            let identity = Identity {
                identity_id: id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                display_name: name,
                reference_image_path: image,
                embedding: read_embedding_file(&embedding)?,
            };
            match store.enroll(&identity) {
                Ok(()) => println!("Enrolled {} as {}", identity.display_name, identity.identity_id),
                Err(FaceRollError::DuplicateId(id)) => {
                    anyhow::bail!("An identity with id {} is already enrolled", id)
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::List { order_by, page, page_size } => {
            let order_by: OrderBy = order_by.parse()?;
            let identities = store.list(order_by, page, page_size)?;
            if identities.is_empty() {
                println!("No identities on page {}", page);
            }
            for identity in identities {
                println!("{}  {}  {}", identity.identity_id, identity.display_name, identity.reference_image_path);
            }
        }
        Commands::Search { embedding, k } => {
            let query = read_embedding_file(&embedding)?;
            let hits = store.find_similar(&query, k)?;
            if hits.is_empty() {
                println!("Gallery is empty");
            }
            for (rank, hit) in hits.iter().enumerate() {
                println!(
                    "{}. {} ({})  similarity {:.3}  distance {:.3}",
                    rank + 1,
                    hit.identity.display_name,
                    hit.identity.identity_id,
                    hit.similarity,
                    hit.distance
                );
            }
        }
        Commands::Remove { id } => {
            if store.remove(&id)? {
                println!("Removed {}", id);
            } else {
                println!("No identity with id {}", id);
            }
        }
        Commands::Record { identity_id, frame, event_id } => {
            let mut event = AttendanceEvent::new(identity_id, frame);
            if let Some(event_id) = event_id {
                event.event_id = event_id;
            }
            match ledger.record(&event) {
                Ok(()) => println!("Recorded {} for {}", event.event_id, event.identity_id),
                Err(FaceRollError::UnknownIdentity(id)) => {
                    anyhow::bail!("Identity {} does not exist; enroll it first", id)
                }
                Err(FaceRollError::DuplicateId(id)) => {
                    anyhow::bail!("Event id {} already used; retry with a new id", id)
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Attendance { page, page_size } => {
            for entry in ledger.list_entries(page, page_size)? {
                println!(
                    "{}  {} ({})  {}  {}",
                    entry.event.occurred_at.format("%Y-%m-%d %H:%M:%S"),
                    entry.display_name,
                    entry.event.identity_id,
                    entry.event.evidence_frame_path,
                    entry.event.event_id
                );
            }
        }
        Commands::ExportAttendance { output } => {
            let output = output.unwrap_or_else(|| dev_mode.get_export_path("attendance"));
            let mut file = std::fs::File::create(&output)
                .with_context(|| format!("creating {}", output.display()))?;
            let written = write_attendance_csv(&ledger, &mut file)?;
            println!("Exported {} attendance events to {}", written, output.display());
        }
        Commands::Replay { detections, record } => {
            replay(&detections, record, &config, &dev_mode, store, ledger)?;
        }
    }

    Ok(())
}

fn replay(
    detections: &Path,
    record: bool,
    config: &Config,
    dev_mode: &DevMode,
    store: IdentityStore,
    ledger: AttendanceLedger,
) -> Result<()> {
    let frames = read_frames(detections)?;
    let evidence_dir = dev_mode.evidence_dir(config);
    let mut resolver = IdentityResolver::new(Tracker::new(config.tracker.clone()), store);
    let mut session = AttendanceSession::new(config.attendance.clone());

    let summary = replay_session(
        &frames,
        &mut resolver,
        &mut session,
        &evidence_dir,
        record.then_some(ledger),
        |index, _, outcome| print_frame(index + 1, outcome),
    )?;

    println!(
        "Replayed {} frames ({} dropped): {} arrivals, {} recorded, {} failed writes, {} tracks active",
        summary.frames,
        summary.dropped,
        summary.arrivals,
        summary.recorded,
        summary.failed_writes,
        resolver.tracker().active_tracks().len()
    );
    Ok(())
}

fn print_frame(number: usize, outcome: FrameOutcome<'_>) {
    let (results, arrivals) = match outcome {
        FrameOutcome::Resolved { results, arrivals } => (results, arrivals),
        FrameOutcome::Dropped(reason) => {
            println!("frame {:>4}: dropped ({})", number, reason);
            return;
        }
    };

    for result in results {
        let track = result
            .track_id
            .map(|id| format!("#{}", id))
            .unwrap_or_else(|| "-".to_string());
        let who = match (&result.best_identity, result.similarity) {
            (Some(identity), Some(similarity)) => {
                format!("{} ({:.3})", identity.display_name, similarity)
            }
            _ => "unknown".to_string(),
        };
        println!(
            "frame {:>4}: track {:<5} {:?}  {}  score {:.2}",
            number, track, result.track_state, who, result.detection_score
        );
    }
    for event in arrivals {
        println!("  arrival: {}", event.identity_id);
    }
}

fn load_config(explicit: Option<&Path>, dev_mode: &DevMode) -> Result<Config> {
    if let Some(path) = explicit {
        return Ok(Config::load_from_path(path)?);
    }
    let default_path = dev_mode.config_path()?;
    let path = default_path.exists().then_some(default_path.as_path());
    Ok(Config::load_or_default(path)?)
}

fn setup_logging(dev_mode: bool) {
    if dev_mode {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt::init();
    }
}
