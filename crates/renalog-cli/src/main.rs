//! Renalog CLI - Command-line interface for the Renalog data layer
//!
//! Logs vitals, labs, food, and medications against the local store and
//! inspects the sync queue. Everything works offline.

use std::env;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use renalog_core::db::{
    Database, FoodRepository, LabsRepository, LibSqlFoodRepository, LibSqlLabsRepository,
    LibSqlMedicationsRepository, LibSqlSyncQueueRepository, LibSqlUsersRepository,
    LibSqlVitalsRepository, MedicationsRepository, SyncQueueRepository, UsersRepository,
    VitalsRepository,
};
use renalog_core::models::{
    Frequency, IntakeStatus, MealType, NewFoodEntry, NewLabReport, NewMedication,
    NewMedicationLog, NewUser, NewVitalRecord, User, UserRole,
};
use renalog_core::RecordId;
use thiserror::Error;

#[derive(Parser)]
#[command(name = "renalog")]
#[command(about = "Track dialysis and kidney health from the command line")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Optional path to local database file
    #[arg(long, value_name = "PATH", global = true)]
    db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a local account
    Signup {
        /// Email address
        email: String,
        /// Password (at least 8 characters)
        #[arg(long)]
        password: String,
        /// Account role
        #[arg(long, value_enum, default_value_t = RoleArg::Patient)]
        role: RoleArg,
        /// Display name
        #[arg(long)]
        name: Option<String>,
    },
    /// Daily vital observations
    Vitals {
        #[command(subcommand)]
        command: VitalsCommands,
    },
    /// Lab reports
    Labs {
        #[command(subcommand)]
        command: LabsCommands,
    },
    /// Food log and nutrition totals
    Food {
        #[command(subcommand)]
        command: FoodCommands,
    },
    /// Medications and intake logs
    Med {
        #[command(subcommand)]
        command: MedCommands,
    },
    /// Sync queue state
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },
}

#[derive(Subcommand)]
enum VitalsCommands {
    /// Record today's (or a given day's) vitals
    Add {
        /// Acting user's email
        #[arg(long)]
        user: String,
        /// Observation date (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Weight in kg
        #[arg(long)]
        weight: Option<f64>,
        /// Systolic blood pressure (mmHg)
        #[arg(long)]
        systolic: Option<i64>,
        /// Diastolic blood pressure (mmHg)
        #[arg(long)]
        diastolic: Option<i64>,
        /// Heart rate (bpm)
        #[arg(long)]
        heart_rate: Option<i64>,
        /// Oxygen saturation (%)
        #[arg(long)]
        spo2: Option<i64>,
        /// Fluid intake (ml)
        #[arg(long)]
        fluid_in: Option<f64>,
        /// Fluid output (ml)
        #[arg(long)]
        fluid_out: Option<f64>,
        /// Body temperature (°C)
        #[arg(long)]
        temp: Option<f64>,
        /// Free-text notes
        #[arg(long)]
        notes: Option<String>,
    },
    /// List recent vitals, newest first
    List {
        /// Acting user's email
        #[arg(long)]
        user: String,
        /// Number of records to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a trailing trend window, oldest first
    Trend {
        /// Acting user's email
        #[arg(long)]
        user: String,
        /// Window size in days
        #[arg(long, default_value = "30")]
        days: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum LabsCommands {
    /// Record a lab report
    Add {
        /// Acting user's email
        #[arg(long)]
        user: String,
        /// Draw date (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Serum creatinine (mg/dL)
        #[arg(long)]
        creatinine: Option<f64>,
        /// Estimated GFR
        #[arg(long)]
        egfr: Option<f64>,
        /// Blood urea nitrogen (mg/dL)
        #[arg(long)]
        bun: Option<f64>,
        /// Serum potassium (mEq/L)
        #[arg(long)]
        potassium: Option<f64>,
        /// Serum phosphorus (mg/dL)
        #[arg(long)]
        phosphorus: Option<f64>,
        /// Serum calcium (mg/dL)
        #[arg(long)]
        calcium: Option<f64>,
        /// Serum albumin (g/dL)
        #[arg(long)]
        albumin: Option<f64>,
        /// Hemoglobin (g/dL)
        #[arg(long)]
        hemoglobin: Option<f64>,
        /// Free-text notes
        #[arg(long)]
        notes: Option<String>,
    },
    /// List lab reports, newest draw first
    List {
        /// Acting user's email
        #[arg(long)]
        user: String,
        /// Number of reports to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum FoodCommands {
    /// Log a food item
    Add {
        /// Food name
        name: String,
        /// Acting user's email
        #[arg(long)]
        user: String,
        /// Meal the entry belongs to
        #[arg(long, value_enum, default_value_t = MealArg::Snack)]
        meal: MealArg,
        /// Day eaten (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Calories (kcal)
        #[arg(long)]
        calories: Option<f64>,
        /// Protein (g)
        #[arg(long)]
        protein: Option<f64>,
        /// Carbohydrates (g)
        #[arg(long)]
        carbs: Option<f64>,
        /// Fat (g)
        #[arg(long)]
        fat: Option<f64>,
        /// Sodium (mg)
        #[arg(long)]
        sodium: Option<f64>,
        /// Potassium (mg)
        #[arg(long)]
        potassium: Option<f64>,
        /// Phosphorus (mg)
        #[arg(long)]
        phosphorus: Option<f64>,
        /// Fluid content (ml)
        #[arg(long)]
        fluid: Option<f64>,
    },
    /// Show one day's nutrition totals
    Summary {
        /// Acting user's email
        #[arg(long)]
        user: String,
        /// Day to summarize (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum MedCommands {
    /// Add a medication
    Add {
        /// Medication name
        name: String,
        /// Dose description, e.g. "10mg"
        dosage: String,
        /// Acting user's email
        #[arg(long)]
        user: String,
        /// Intake frequency, e.g. once_daily
        #[arg(long, default_value = "once_daily")]
        frequency: String,
        /// Dose time of day (repeatable), e.g. 08:00
        #[arg(long = "time", required = true)]
        times: Vec<NaiveTime>,
        /// First day of the prescription (defaults to today)
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Enable daily reminders
        #[arg(long)]
        reminders: bool,
    },
    /// List medications
    List {
        /// Acting user's email
        #[arg(long)]
        user: String,
        /// Show only active medications
        #[arg(long)]
        active: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log a dose outcome
    Log {
        /// Medication id
        id: RecordId,
        /// Acting user's email
        #[arg(long)]
        user: String,
        /// Dose outcome
        #[arg(long, value_enum, default_value_t = StatusArg::Taken)]
        status: StatusArg,
    },
    /// Adherence over a trailing window
    Adherence {
        /// Acting user's email
        #[arg(long)]
        user: String,
        /// Window size in days
        #[arg(long, default_value = "7")]
        days: i64,
    },
    /// End a medication (keeps its history)
    End {
        /// Medication id
        id: RecordId,
        /// Last day of the prescription (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Delete a medication and its intake logs
    Delete {
        /// Medication id
        id: RecordId,
    },
}

#[derive(Subcommand)]
enum SyncCommands {
    /// Show pending and failed queue counts
    Status,
    /// Make failed entries eligible for replay again
    Retry,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum RoleArg {
    Patient,
    Caregiver,
    Doctor,
}

impl From<RoleArg> for UserRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Patient => Self::Patient,
            RoleArg::Caregiver => Self::Caregiver,
            RoleArg::Doctor => Self::Doctor,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum MealArg {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl From<MealArg> for MealType {
    fn from(meal: MealArg) -> Self {
        match meal {
            MealArg::Breakfast => Self::Breakfast,
            MealArg::Lunch => Self::Lunch,
            MealArg::Dinner => Self::Dinner,
            MealArg::Snack => Self::Snack,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum StatusArg {
    Taken,
    Missed,
    Skipped,
}

impl From<StatusArg> for IntakeStatus {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::Taken => Self::Taken,
            StatusArg::Missed => Self::Missed,
            StatusArg::Skipped => Self::Skipped,
        }
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Core(#[from] renalog_core::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No account for email: {0}")]
    UserNotFound(String),
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("renalog=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    let db = open_database(&db_path).await?;

    match cli.command {
        Commands::Signup {
            email,
            password,
            role,
            name,
        } => {
            let users = LibSqlUsersRepository::new(&db);
            let user = users
                .sign_up(
                    NewUser {
                        email,
                        role: role.into(),
                        full_name: name,
                        ..NewUser::default()
                    },
                    &password,
                )
                .await?;
            println!("{}", user.id);
        }
        Commands::Vitals { command } => run_vitals(&db, command).await?,
        Commands::Labs { command } => run_labs(&db, command).await?,
        Commands::Food { command } => run_food(&db, command).await?,
        Commands::Med { command } => run_med(&db, command).await?,
        Commands::Sync { command } => run_sync(&db, command).await?,
    }

    Ok(())
}

#[allow(clippy::too_many_lines)]
async fn run_vitals(db: &Database, command: VitalsCommands) -> Result<(), CliError> {
    let repo = LibSqlVitalsRepository::new(db);
    match command {
        VitalsCommands::Add {
            user,
            date,
            weight,
            systolic,
            diastolic,
            heart_rate,
            spo2,
            fluid_in,
            fluid_out,
            temp,
            notes,
        } => {
            let user = resolve_user(db, &user).await?;
            let record = repo
                .create(
                    &user.id,
                    NewVitalRecord {
                        date: date.unwrap_or_else(today),
                        weight_kg: weight,
                        systolic,
                        diastolic,
                        heart_rate,
                        spo2,
                        fluid_intake_ml: fluid_in,
                        fluid_output_ml: fluid_out,
                        temperature_c: temp,
                        notes,
                    },
                )
                .await?;
            println!("{}", record.id);
        }
        VitalsCommands::List { user, limit, json } => {
            let user = resolve_user(db, &user).await?;
            let records = repo.list(&user.id, limit).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                for record in records {
                    println!("{}", format_vital(&record));
                }
            }
        }
        VitalsCommands::Trend { user, days, json } => {
            let user = resolve_user(db, &user).await?;
            let records = repo.trend(&user.id, days).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                for record in records {
                    println!("{}", format_vital(&record));
                }
            }
        }
    }
    Ok(())
}

async fn run_labs(db: &Database, command: LabsCommands) -> Result<(), CliError> {
    let repo = LibSqlLabsRepository::new(db);
    match command {
        LabsCommands::Add {
            user,
            date,
            creatinine,
            egfr,
            bun,
            potassium,
            phosphorus,
            calcium,
            albumin,
            hemoglobin,
            notes,
        } => {
            let user = resolve_user(db, &user).await?;
            let report = repo
                .create(
                    &user.id,
                    NewLabReport {
                        date: date.unwrap_or_else(today),
                        creatinine,
                        egfr,
                        bun,
                        potassium,
                        phosphorus,
                        calcium,
                        albumin,
                        hemoglobin,
                        document_ref: None,
                        notes,
                    },
                )
                .await?;
            println!("{}", report.id);
        }
        LabsCommands::List { user, limit, json } => {
            let user = resolve_user(db, &user).await?;
            let reports = repo.list(&user.id, limit).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                for report in reports {
                    let egfr = report
                        .egfr
                        .map_or_else(|| "-".to_string(), |value| format!("{value:.0}"));
                    let creatinine = report
                        .creatinine
                        .map_or_else(|| "-".to_string(), |value| format!("{value:.2}"));
                    println!(
                        "{}  {}  eGFR {egfr}  creatinine {creatinine}",
                        report.id, report.date
                    );
                }
            }
        }
    }
    Ok(())
}

async fn run_food(db: &Database, command: FoodCommands) -> Result<(), CliError> {
    let repo = LibSqlFoodRepository::new(db);
    match command {
        FoodCommands::Add {
            name,
            user,
            meal,
            date,
            calories,
            protein,
            carbs,
            fat,
            sodium,
            potassium,
            phosphorus,
            fluid,
        } => {
            let user = resolve_user(db, &user).await?;
            let entry = repo
                .create(
                    &user.id,
                    NewFoodEntry {
                        name,
                        meal_type: meal.into(),
                        date: date.unwrap_or_else(today),
                        calories,
                        protein_g: protein,
                        carbs_g: carbs,
                        fat_g: fat,
                        sodium_mg: sodium,
                        potassium_mg: potassium,
                        phosphorus_mg: phosphorus,
                        fluid_ml: fluid,
                    },
                )
                .await?;
            println!("{}", entry.id);
        }
        FoodCommands::Summary { user, date, json } => {
            let user = resolve_user(db, &user).await?;
            let summary = repo
                .daily_summary(&user.id, date.unwrap_or_else(today))
                .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{} ({} entries)", summary.date, summary.entry_count);
                println!("  calories   {:.0} kcal", summary.calories);
                println!("  protein    {:.1} g", summary.protein_g);
                println!("  sodium     {:.0} mg", summary.sodium_mg);
                println!("  potassium  {:.0} mg", summary.potassium_mg);
                println!("  phosphorus {:.0} mg", summary.phosphorus_mg);
                println!("  fluid      {:.0} ml", summary.fluid_ml);
            }
        }
    }
    Ok(())
}

async fn run_med(db: &Database, command: MedCommands) -> Result<(), CliError> {
    let repo = LibSqlMedicationsRepository::new(db);
    match command {
        MedCommands::Add {
            name,
            dosage,
            user,
            frequency,
            times,
            start,
            reminders,
        } => {
            let user = resolve_user(db, &user).await?;
            let medication = repo
                .create(
                    &user.id,
                    NewMedication {
                        name,
                        dosage,
                        frequency: Frequency::parse(&frequency),
                        times_of_day: times,
                        start_date: start.unwrap_or_else(today),
                        end_date: None,
                        instructions: None,
                        reminder_enabled: reminders,
                    },
                )
                .await?;
            println!("{}", medication.id);
        }
        MedCommands::List { user, active, json } => {
            let user = resolve_user(db, &user).await?;
            let medications = if active {
                repo.active(&user.id).await?
            } else {
                repo.list(&user.id, 0).await?
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&medications)?);
            } else {
                for medication in medications {
                    let state = if medication.active { "active" } else { "ended" };
                    println!(
                        "{}  {} {} ({}, {state})",
                        medication.id,
                        medication.name,
                        medication.dosage,
                        medication.frequency.as_str()
                    );
                }
            }
        }
        MedCommands::Log { id, user, status } => {
            let user = resolve_user(db, &user).await?;
            let log = repo
                .log_intake(
                    &user.id,
                    NewMedicationLog {
                        medication_id: id,
                        status: status.into(),
                        scheduled_time: Utc::now(),
                        actual_time: Some(Utc::now()),
                        notes: None,
                    },
                )
                .await?;
            println!("{}", log.id);
        }
        MedCommands::Adherence { user, days } => {
            let user = resolve_user(db, &user).await?;
            let summary = repo.adherence(&user.id, days).await?;
            println!(
                "{:.1}% over {days} days ({} taken, {} missed, {} total)",
                summary.adherence_rate,
                summary.taken_doses,
                summary.missed_doses,
                summary.total_doses
            );
        }
        MedCommands::End { id, date } => {
            repo.end(&id, date.unwrap_or_else(today)).await?;
            println!("{id}");
        }
        MedCommands::Delete { id } => {
            repo.delete(&id).await?;
            println!("{id}");
        }
    }
    Ok(())
}

async fn run_sync(db: &Database, command: SyncCommands) -> Result<(), CliError> {
    let queue = LibSqlSyncQueueRepository::new(db);
    match command {
        SyncCommands::Status => {
            let pending = queue.pending_count().await?;
            let failed = queue.failed_count().await?;
            println!("{pending} pending");
            if failed > 0 {
                println!("{failed} changes failed to sync");
            }
        }
        SyncCommands::Retry => {
            queue.retry_failed().await?;
            println!("Failed entries queued for retry");
        }
    }
    Ok(())
}

async fn resolve_user(db: &Database, email: &str) -> Result<User, CliError> {
    let users = LibSqlUsersRepository::new(db);
    users
        .by_email(&email.trim().to_lowercase())
        .await?
        .ok_or_else(|| CliError::UserNotFound(email.to_string()))
}

fn format_vital(record: &renalog_core::models::VitalRecord) -> String {
    let weight = record
        .weight_kg
        .map_or_else(|| "-".to_string(), |value| format!("{value:.1}kg"));
    let bp = match (record.systolic, record.diastolic) {
        (Some(systolic), Some(diastolic)) => format!("{systolic}/{diastolic}"),
        _ => "-".to_string(),
    };
    format!("{}  {}  {weight}  BP {bp}", record.id, record.date)
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("RENALOG_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("renalog")
        .join("renalog.db")
}

async fn open_database(path: &Path) -> Result<Database, CliError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Database::open(path).await?)
}
