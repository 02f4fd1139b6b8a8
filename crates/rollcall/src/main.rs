//! rollcall - attendance sessions and student check-in
//!
//! This is the command-line front end. It wires together:
//! - Configuration loading
//! - Store initialization
//! - Session registry and attendance service
//! - Check-in coordinator with a file-backed camera

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rollcall_api::{
    AttendanceReport, CheckInReceipt, DescriptiveKey, ErrorInfo, HealthStatus, IdentityFields,
    ResetReport, SessionDescriptor, SessionView,
};
use rollcall_config::{Settings, load_config_or_default};
use rollcall_core::{
    AttendanceQueryService, CheckInCoordinator, EligibilityChecker, SessionRegistry,
    ShareArtifact, StoreAttendanceService,
};
use rollcall_device::StillImageCamera;
use rollcall_store::{SqliteStore, Store};
use rollcall_util::{
    AttendanceError, DATABASE_FILENAME, RecordId, SessionId, default_config_path,
    format_timestamp,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// rollcall - Attendance sessions with selfie check-in
#[derive(Parser, Debug)]
#[command(name = "rollcall")]
#[command(about = "Attendance sessions with selfie check-in", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/rollcall/config.toml)
    #[arg(short, long, env = "ROLLCALL_CONFIG", default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Data directory override (or set ROLLCALL_DATA_DIR env var)
    #[arg(short, long, env = "ROLLCALL_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// Print responses as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

/// Fields addressing a roster
#[derive(clap::Args, Debug, Clone)]
struct KeyArgs {
    #[arg(long = "class")]
    class_name: String,
    #[arg(long)]
    subject: String,
    #[arg(long)]
    faculty: String,
    #[arg(long)]
    time_slot: String,
    #[arg(long)]
    semester: String,
    /// Class date, e.g. 2024-03-01
    #[arg(long)]
    date: String,
}

impl From<KeyArgs> for DescriptiveKey {
    fn from(args: KeyArgs) -> Self {
        DescriptiveKey {
            class_name: args.class_name,
            subject: args.subject,
            faculty: args.faculty,
            time_slot: args.time_slot,
            semester: args.semester,
            date: args.date,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open a session and print how students can reach it
    Create {
        #[command(flatten)]
        key: KeyArgs,
        /// "Lecture" or "Lab"
        #[arg(long)]
        kind: Option<String>,
        /// Write the QR code PNG here
        #[arg(long)]
        qr_out: Option<PathBuf>,
    },

    /// Resolve a session identifier, QR payload or link
    Show { token: String },

    /// Stop accepting check-ins for a session
    Close { token: String },

    /// Check a student in, using a photo file as the camera
    CheckIn {
        token: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        enrollment: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        photo: PathBuf,
    },

    /// List who checked in
    Query {
        #[command(flatten)]
        key: KeyArgs,
    },

    /// Write the roster as an .xlsx workbook
    Export {
        #[command(flatten)]
        key: KeyArgs,
        /// Output directory (default: current directory)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Delete the roster and close its sessions
    Reset {
        #[command(flatten)]
        key: KeyArgs,
    },

    /// Save the photo stored with a record
    Selfie {
        record_id: String,
        #[arg(long)]
        out: PathBuf,
    },

    /// Show recent audit events
    Audit {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Check the store
    Health,
}

/// Wired components
struct Service {
    settings: Settings,
    store: Arc<dyn Store>,
    registry: Arc<SessionRegistry>,
    attendance: Arc<StoreAttendanceService>,
    json: bool,
}

impl Service {
    fn new(args: &Args) -> Result<Self> {
        let settings = load_config_or_default(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        debug!(
            config_path = %args.config.display(),
            domain = %settings.eligibility.institutional_domain,
            "Configuration loaded"
        );

        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| settings.service.data_dir.clone());

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = data_dir.join(DATABASE_FILENAME);
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );

        debug!(db_path = %db_path.display(), "Store initialized");

        let registry = Arc::new(SessionRegistry::new(store.clone(), settings.sessions));
        let attendance = Arc::new(StoreAttendanceService::new(store.clone()));

        Ok(Self {
            settings,
            store,
            registry,
            attendance,
            json: args.json,
        })
    }

    async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Create { key, kind, qr_out } => {
                let mut descriptor = SessionDescriptor::new(key.into());
                descriptor.lecture_or_lab = kind;

                let session = self.registry.create(descriptor).await?;
                let share = ShareArtifact::for_session(&session.session_id)?;

                if let Some(path) = &qr_out {
                    std::fs::write(path, &share.qr_png)
                        .with_context(|| format!("Failed to write QR code to {:?}", path))?;
                    info!(path = %path.display(), "QR code written");
                }

                let link = share.link.clone();
                let response = share.into_response();
                self.emit(&response, || {
                    let mut text = format!(
                        "{}\n  Session: {}\n  QR payload: {}\n  Link: {}",
                        response.message, response.session_id, response.qr_payload, link
                    );
                    if let Some(path) = &qr_out {
                        text.push_str(&format!("\n  QR code: {}", path.display()));
                    }
                    text
                })
            }

            Command::Show { token } => {
                let session = self.registry.resolve(&token).await?;
                let view = SessionView::from(&session);
                self.emit(&view, || describe_session(&view))
            }

            Command::Close { token } => {
                let session_id = SessionId::from_shared(&token)?;
                self.registry.close(&session_id).await?;
                self.emit(
                    &serde_json::json!({ "session_id": session_id, "status": "closed" }),
                    || format!("Session {} closed", session_id),
                )
            }

            Command::CheckIn {
                token,
                name,
                enrollment,
                email,
                photo,
            } => {
                let identity = IdentityFields::new(name, enrollment, email);
                let record = self.check_in(&token, &identity, &photo).await?;
                let receipt = CheckInReceipt {
                    message: "Attendance marked successfully".into(),
                    record,
                };
                self.emit(&receipt, || {
                    format!(
                        "{}\n  {} ({}) at {}",
                        receipt.message,
                        receipt.record.student_name,
                        receipt.record.enrollment_number,
                        format_timestamp(&receipt.record.timestamp)
                    )
                })
            }

            Command::Query { key } => {
                let key: DescriptiveKey = key.into();
                let records = self.attendance.query(&key).await?;
                let report = AttendanceReport::new(key.trimmed(), records);
                self.emit(&report, || describe_report(&report))
            }

            Command::Export { key, out } => {
                let key: DescriptiveKey = key.into();
                let artifact = self.attendance.export(&key).await?;

                let dir = out.unwrap_or_else(|| PathBuf::from("."));
                let path = dir.join(&artifact.filename);
                std::fs::write(&path, &artifact.bytes)
                    .with_context(|| format!("Failed to write workbook to {:?}", path))?;

                self.emit(
                    &serde_json::json!({
                        "filename": artifact.filename,
                        "content_type": artifact.content_type,
                        "path": path,
                        "bytes": artifact.bytes.len(),
                    }),
                    || format!("Wrote {}", path.display()),
                )
            }

            Command::Reset { key } => {
                let deleted = self.attendance.reset(&key.into()).await?;
                let report = ResetReport::new(deleted);
                self.emit(&report, || report.message.clone())
            }

            Command::Selfie { record_id, out } => {
                let record_id = RecordId::parse(&record_id).ok_or_else(|| {
                    AttendanceError::validation(format!("'{}' is not a record id", record_id))
                })?;
                let selfie = self
                    .attendance
                    .selfie(&record_id)
                    .await?
                    .with_context(|| format!("No record {}", record_id))?;

                write_file(&out, &selfie.bytes)?;
                self.emit(
                    &serde_json::json!({
                        "record_id": record_id,
                        "content_type": selfie.format.mime_type(),
                        "path": out,
                    }),
                    || format!("Wrote {} ({})", out.display(), selfie.format.mime_type()),
                )
            }

            Command::Audit { limit } => {
                let events = self.store.get_recent_audits(limit)?;
                self.emit(&events, || {
                    events
                        .iter()
                        .map(|e| {
                            format!(
                                "{}  {}",
                                format_timestamp(&e.timestamp),
                                serde_json::to_string(&e.event).unwrap_or_default()
                            )
                        })
                        .collect::<Vec<_>>()
                        .join("\n")
                })
            }

            Command::Health => {
                let status = HealthStatus::new(self.store.is_healthy());
                self.emit(&status, || {
                    format!(
                        "Store: {}",
                        if status.store_ok { "ok" } else { "unavailable" }
                    )
                })?;
                if !status.store_ok {
                    anyhow::bail!("store is unhealthy");
                }
                Ok(())
            }
        }
    }

    async fn check_in(
        &self,
        token: &str,
        identity: &IdentityFields,
        photo: &Path,
    ) -> Result<rollcall_api::AttendanceRecord, AttendanceError> {
        let camera = Arc::new(StillImageCamera::new(photo));
        let coordinator = CheckInCoordinator::new(
            self.registry.clone(),
            EligibilityChecker::new(self.settings.eligibility.clone()),
            self.attendance.clone(),
            camera,
            self.settings.capture,
        );

        let mut attempt = coordinator.begin(token).await?;
        coordinator.start_authentication(&mut attempt, identity).await?;

        let capture = attempt.capture_mut();
        capture.start().await?;
        capture.capture().await?;
        capture.accept()?;

        coordinator.submit(&mut attempt).await
    }

    fn emit<T: Serialize>(&self, value: &T, human: impl FnOnce() -> String) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            println!("{}", human());
        }
        Ok(())
    }
}

fn describe_session(view: &SessionView) -> String {
    let key = &view.key;
    let mut text = format!(
        "Session {} ({})\n  {} / {} / {}\n  {} on {}, semester {}",
        view.session_id,
        view.status.as_str(),
        key.class_name,
        key.subject,
        key.faculty,
        key.time_slot,
        key.date,
        key.semester
    );
    if let Some(kind) = &view.lecture_or_lab {
        text.push_str(&format!("\n  {}", kind));
    }
    text.push_str(&format!("\n  Opened {}", format_timestamp(&view.created_at)));
    text
}

fn describe_report(report: &AttendanceReport) -> String {
    let mut lines = vec![format!("Total attendance: {}", report.total_attendance)];
    for record in &report.records {
        lines.push(format!(
            "  {}  {:<12} {:<30} {}",
            format_timestamp(&record.timestamp),
            record.enrollment_number,
            record.email,
            record.student_name
        ));
    }
    lines.join("\n")
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {:?}", path))
}

fn report_error(err: &AttendanceError, json: bool) {
    if json {
        let info = ErrorInfo::from(err);
        match serde_json::to_string_pretty(&info) {
            Ok(text) => eprintln!("{}", text),
            Err(_) => eprintln!("{}", err),
        }
    } else {
        eprintln!("Error: {}", err);
        if err.is_retryable() {
            eprintln!("You can try this step again.");
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    debug!(version = env!("CARGO_PKG_VERSION"), "rollcall starting");
    if rollcall_util::is_mock_time_active() {
        warn!(now = %format_timestamp(&rollcall_util::now()), "Mock time is active");
    }

    let service = Service::new(&args)?;
    let json = args.json;

    match service.run(args.command).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => match e.downcast_ref::<AttendanceError>() {
            Some(err) => {
                report_error(err, json);
                Ok(ExitCode::from(1))
            }
            None => Err(e),
        },
    }
}
