use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand};
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod analyzer;
mod config;
mod db;
mod error;
mod models;
mod report;
mod schedule;
mod section;
mod stats;
mod validate;

use config::{AnalyzerConfig, PortalConfig, DEFAULT_MARKS_HEADER};
use schedule::{EventOptions, PayloadGrammar, ScheduleSource};
use section::DEFAULT_LIMIT_LINES;

#[derive(Parser)]
#[command(name = "exam-portal")]
#[command(about = "Grade distribution and exam calendar tools for the student portal", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: PortalConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load sample students, courses and enrollments
    Seed,
    /// Summarize the marks section of a multi-section CSV export
    #[command(group(
        ArgGroup::new("section")
            .args(["marks_header", "marker"])
            .multiple(false)
    ))]
    Analyze {
        #[arg(long)]
        csv: PathBuf,
        /// Header line that opens the marks section, exactly as exported
        #[arg(long, env = "MARKS_HEADER")]
        marks_header: Option<String>,
        /// Locate the section by a one-field marker record instead of the exact header
        #[arg(long)]
        marker: Option<String>,
        #[arg(long, default_value_t = DEFAULT_LIMIT_LINES)]
        limit: usize,
        #[arg(long)]
        json: bool,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show the full exam calendar from the saved suggestion
    Schedule {
        #[arg(long, value_enum, default_value_t)]
        grammar: PayloadGrammar,
        /// Order the schedule by date before building the calendar
        #[arg(long)]
        sorted: bool,
        #[arg(long)]
        include_study_days: bool,
        #[arg(long)]
        json: bool,
    },
    /// Show the exams of one student
    Student {
        #[arg(long)]
        student_id: String,
        #[arg(long, value_enum, default_value_t)]
        grammar: PayloadGrammar,
        #[arg(long)]
        include_study_days: bool,
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&cli.config).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(&cli.config).await?;
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Analyze {
            csv,
            marks_header,
            marker,
            limit,
            json,
            out,
        } => {
            let analyzer_config = match marker {
                Some(token) => AnalyzerConfig::marker(token),
                None => AnalyzerConfig::exact_header(
                    marks_header.unwrap_or_else(|| DEFAULT_MARKS_HEADER.to_string()),
                ),
            }
            .with_limit(limit);
            let result = analyzer::analyze(&csv, &analyzer_config)?;

            let rendered = if json {
                serde_json::to_string_pretty(&result)?
            } else {
                report::build_marks_report(&csv.display().to_string(), &result)
            };

            match out {
                Some(out) => {
                    std::fs::write(&out, rendered)
                        .with_context(|| format!("failed to write {}", out.display()))?;
                    println!("Report written to {}.", out.display());
                }
                None => println!("{rendered}"),
            }
        }
        Commands::Schedule {
            grammar,
            sorted,
            include_study_days,
            json,
        } => {
            let Some(text) = read_suggestion(&cli.config)? else {
                return Ok(());
            };
            let extraction = if sorted {
                schedule::extract_sorted(&text, grammar)
            } else {
                schedule::extract(&text, grammar)
            };

            if extraction.schedule.is_empty() && extraction.notes.is_empty() {
                println!("(Saved suggestion received but contained no parsable schedule lines or relevant notes)");
                println!("{text}");
                return Ok(());
            }

            let levels = master_levels(&cli.config, &schedule::collect_course_codes(&extraction.schedule)).await;
            let options = EventOptions { include_study_days };
            let events = schedule::master_calendar(&extraction.schedule, &levels, options);

            if json {
                let payload = json!({
                    "schedule": extraction.schedule,
                    "events": events,
                    "notes": extraction.notes,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                print!(
                    "{}",
                    report::build_calendar_report("Exam Schedule", None, &events, &extraction.notes)
                );
            }
        }
        Commands::Student {
            student_id,
            grammar,
            include_study_days,
            json,
        } => {
            let student_id = student_id.trim().to_string();
            let pool = connect(&cli.config).await?;
            let student = db::fetch_student(&pool, &student_id)
                .await?
                .with_context(|| format!("Student with ID '{student_id}' not found."))?;
            let courses = db::fetch_enrolled_courses(&pool, &student_id).await?;

            let Some(text) = read_suggestion(&cli.config)? else {
                return Ok(());
            };
            let extraction = schedule::extract(&text, grammar);

            let enrolled: HashSet<String> = courses.iter().map(|c| c.course_code.clone()).collect();
            let levels: HashMap<String, String> = courses
                .iter()
                .map(|c| (c.course_code.clone(), c.academic_level.clone()))
                .collect();
            let options = EventOptions { include_study_days };
            let events = schedule::join_for_student(&extraction.schedule, &enrolled, &levels, options);
            info!(student = %student.student_id, enrolled = enrolled.len(), exams = events.len(), "student calendar built");

            if json {
                let payload = json!({
                    "student_id": student.student_id,
                    "academic_level": student.academic_level,
                    "events": events,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                print!(
                    "{}",
                    report::build_calendar_report("My Exam Schedule", Some(&student), &events, &[])
                );
            }
        }
    }

    Ok(())
}

async fn connect(config: &PortalConfig) -> anyhow::Result<PgPool> {
    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

fn read_suggestion(config: &PortalConfig) -> anyhow::Result<Option<String>> {
    match schedule::load_schedule_source(&config.schedule_file)? {
        ScheduleSource::Suggestion(text) => Ok(Some(text)),
        ScheduleSource::GeneratorFailed(message) => {
            println!("The schedule generator reported an error: {message}");
            Ok(None)
        }
    }
}

// Levels only colour the calendar, so lookup failures fall back to "Unknown".
async fn master_levels(config: &PortalConfig, codes: &[String]) -> HashMap<String, String> {
    if config.database_url.is_none() {
        return HashMap::new();
    }

    let levels = match connect(config).await {
        Ok(pool) => db::fetch_course_levels(&pool, codes).await,
        Err(err) => Err(err),
    };
    levels.unwrap_or_else(|err| {
        warn!(error = %err, "could not fetch course levels");
        HashMap::new()
    })
}
