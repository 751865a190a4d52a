use std::fmt;

use course_core::model::{
    Course, CourseId, Lecture, LectureId, PlayerSettings, StudentId,
};
use services::{AppServices, CertificateError, CertificateService, LectureSignal};
use storage::repository::CourseRepository;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    MissingLecture,
    InvalidCourseId { raw: String },
    InvalidLectureId { raw: String },
    InvalidStudentId { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::MissingLecture => write!(f, "watch requires --lecture <id>"),
            ArgsError::InvalidCourseId { raw } => write!(f, "invalid --course value: {raw}"),
            ArgsError::InvalidLectureId { raw } => write!(f, "invalid --lecture value: {raw}"),
            ArgsError::InvalidStudentId { raw } => write!(f, "invalid --student value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

/// Stable default learner so repeated invocations share one progress trail.
const DEMO_STUDENT: &str = "00000000-0000-0000-0000-000000000001";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Seed,
    Watch,
    Progress,
    Reset,
    Certificate,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "seed" => Some(Self::Seed),
            "watch" => Some(Self::Watch),
            "progress" => Some(Self::Progress),
            "reset" => Some(Self::Reset),
            "certificate" => Some(Self::Certificate),
            _ => None,
        }
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- seed        [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- watch       [--db <sqlite_url>] [--student <uuid>] [--course <id>] --lecture <id>");
    eprintln!("  cargo run -p app -- progress    [--db <sqlite_url>] [--student <uuid>] [--course <id>]");
    eprintln!("  cargo run -p app -- reset       [--db <sqlite_url>] [--student <uuid>] [--course <id>]");
    eprintln!("  cargo run -p app -- certificate [--db <sqlite_url>] [--student <uuid>] [--course <id>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:lms.sqlite3");
    eprintln!("  --course 1");
    eprintln!("  --student {DEMO_STUDENT}");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  LMS_DB_URL, LMS_STUDENT_ID, RUST_LOG");
}

struct Args {
    db_url: String,
    student_id: StudentId,
    course_id: CourseId,
    lecture_id: Option<LectureId>,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("LMS_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://lms.sqlite3".into(), normalize_sqlite_url);
        let mut student_id = std::env::var("LMS_STUDENT_ID")
            .ok()
            .and_then(|value| value.parse::<StudentId>().ok())
            .unwrap_or_else(default_student);
        let mut course_id = CourseId::new(1);
        let mut lecture_id = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--student" => {
                    let value = require_value(args, "--student")?;
                    student_id = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidStudentId { raw: value.clone() })?;
                }
                "--course" => {
                    let value = require_value(args, "--course")?;
                    course_id = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidCourseId { raw: value.clone() })?;
                }
                "--lecture" => {
                    let value = require_value(args, "--lecture")?;
                    lecture_id = Some(
                        value
                            .parse()
                            .map_err(|_| ArgsError::InvalidLectureId { raw: value.clone() })?,
                    );
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            student_id,
            course_id,
            lecture_id,
        })
    }
}

fn default_student() -> StudentId {
    DEMO_STUDENT
        .parse()
        .unwrap_or_else(|_| StudentId::generate())
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "app=info,services=info,storage=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn demo_course(course_id: CourseId) -> Result<Course, Box<dyn std::error::Error>> {
    let curriculum = vec![
        Lecture::new(
            LectureId::new(1),
            "Welcome & Course Tour",
            Some("https://cdn.example.com/videos/welcome.mp4"),
            true,
        )?,
        Lecture::new(
            LectureId::new(2),
            "Setting Up the Toolchain",
            Some("https://cdn.example.com/videos/setup.mp4"),
            false,
        )?,
        Lecture::new(
            LectureId::new(3),
            "Shipping Your First Project",
            Some("https://cdn.example.com/videos/shipping.mp4"),
            false,
        )?,
    ];

    Ok(Course::new(
        course_id,
        "Rust for Web Developers",
        curriculum,
        true,
        true,
        course_core::Clock::system().now(),
    )?)
}

async fn print_progress(
    services: &AppServices,
    args: &Args,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = services
        .flow
        .start_session(args.student_id, args.course_id)
        .await?;

    let view = session.progress_view();
    println!(
        "{}: {}/{} lectures viewed ({:?})",
        session.course().title(),
        view.viewed,
        view.total_lectures,
        view.status
    );
    if let Some(completed_at) = session.completion_date() {
        println!("completed on {completed_at}");
    }

    match session.current_lecture() {
        Ok(target) => println!("up next: {} (lecture {})", target.title(), target.id()),
        Err(err) => println!("no target lecture: {err}"),
    }

    for lecture in session.course().curriculum() {
        let accessible = session.is_accessible(lecture.id())?;
        let viewed = session
            .snapshot()
            .records
            .iter()
            .any(|record| record.lecture_id == lecture.id() && record.viewed);
        let marker = if viewed {
            "done"
        } else if accessible {
            "open"
        } else {
            "locked"
        };
        println!("  [{marker:>6}] {} {}", lecture.id(), lecture.title());
    }

    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None | Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };
    argv.remove(0);

    let mut iter = argv.into_iter();
    let args = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite at startup. Keep this in the binary glue so
    // core/services stay pure.
    prepare_sqlite_file(&args.db_url)?;
    let services = AppServices::sqlite(&args.db_url, PlayerSettings::default_flow()).await?;

    match cmd {
        Command::Seed => {
            let course = demo_course(args.course_id)?;
            services.storage.courses.upsert_course(&course).await?;
            tracing::info!(course = %course.id(), "seeded demo course");
            println!(
                "seeded \"{}\" with {} lectures (course {})",
                course.title(),
                course.lecture_count(),
                course.id()
            );
            Ok(())
        }
        Command::Watch => {
            let lecture_id = args.lecture_id.ok_or(ArgsError::MissingLecture)?;
            let mut session = services
                .flow
                .start_session(args.student_id, args.course_id)
                .await?;

            let outcome = services.flow.on_lecture_ended(&mut session, lecture_id).await?;
            if !outcome.persisted {
                println!("warning: progress was not saved; continuing locally");
            }
            match outcome.signal {
                LectureSignal::Advance { next } => {
                    println!(
                        "lecture {lecture_id} done; up next after {}s: {} (lecture {})",
                        outcome.advance_delay.num_seconds(),
                        next.title(),
                        next.id()
                    );
                }
                LectureSignal::CourseCompleted {
                    completed,
                    certificate_available,
                } => {
                    if completed {
                        println!("course completed");
                        if certificate_available {
                            println!("certificate available: run the certificate command");
                        }
                    } else {
                        println!("reached the last lecture; earlier lectures remain unviewed");
                    }
                }
            }
            Ok(())
        }
        Command::Progress => print_progress(&services, &args).await,
        Command::Reset => {
            let mut session = services
                .flow
                .start_session(args.student_id, args.course_id)
                .await?;
            services.flow.reset_progress(&mut session).await?;
            println!("progress cleared for course {}", args.course_id);
            Ok(())
        }
        Command::Certificate => {
            let session = services
                .flow
                .start_session(args.student_id, args.course_id)
                .await?;

            if let Err(err) = CertificateService::check_eligibility(&session) {
                match err {
                    CertificateError::NotCompleted | CertificateError::Disabled => {
                        println!("not eligible: {err}");
                        return Ok(());
                    }
                    other => return Err(other.into()),
                }
            }

            match services.certificates.download(&session).await {
                Ok(download) => {
                    std::fs::write(&download.file_name, &download.bytes)?;
                    println!("saved {}", download.file_name);
                    Ok(())
                }
                Err(CertificateError::Api(err)) => {
                    println!("eligible, but the certificate service is unreachable: {err}");
                    Ok(())
                }
                Err(err) => Err(err.into()),
            }
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
