//! Edura CLI
//!
//! Main entry point for running the Edura platform server.

use std::net::SocketAddr;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use edura_engine::{create_router, AppState, Config, HmacCredentials, Platform};
use edura_quizgen::OpenAiQuizService;
use edura_store::{
    generate_invite_code, LessonPatch, MemoryStore, NewCourse, NewGroup, NewLesson, NewProfile,
    NewTopic, NewUser, Store, UserRole,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Default port for the HTTP API server.
const DEFAULT_PORT: u16 = 8000;

/// Password assigned to the demo accounts created by `--seed`.
const DEMO_PASSWORD: &str = "edura-demo";

/// Edura - Adaptive Exam Platform
///
/// Serves the educational platform API: registration, courses and lessons,
/// AI-generated exams, scoring and per-topic mastery tracking.
#[derive(Parser, Debug)]
#[command(name = "edura")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: edura.json in current directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Port for the HTTP API server
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    verbose: bool,

    /// Seed demo accounts and curriculum before serving
    #[arg(long)]
    seed: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Edura platform starting");
    tracing::debug!(config = ?args.config, "Config file");

    match run_server(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Assembles the platform and serves the HTTP API until Ctrl+C.
async fn run_server(args: Args) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    print_config(&config);

    let store = Arc::new(MemoryStore::new());
    let quiz = build_quiz_service(&config);
    let credentials = Arc::new(HmacCredentials::new(
        config.token_secret.as_bytes(),
        config.token_ttl_minutes,
    ));
    let platform = Platform::new(store.clone(), Arc::new(quiz), credentials);

    if args.seed {
        println!();
        println!("Seeding demo data...");
        seed_demo_data(store.as_ref(), &platform).await?;
    }

    let addr: SocketAddr = ([0, 0, 0, 0], args.port).into();
    let router = create_router(AppState::new(config, platform));

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    println!();
    println!("Edura API serving on http://{addr}");
    println!("Press Ctrl+C to stop");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
    } else {
        tracing::info!("Received Ctrl+C, shutting down");
    }
}

/// Loads configuration from the specified path or default location.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load_from_file(Path::new("edura.json")).map_err(|e| anyhow::anyhow!("{e}")),
    }
}

/// Builds the production quiz service from configuration.
fn build_quiz_service(config: &Config) -> OpenAiQuizService {
    let mut service = OpenAiQuizService::new(&config.generator_url, &config.generator_model)
        .with_timeout_secs(config.generation_timeout_secs)
        .with_question_count(config.questions_per_exam);
    if let Some(ref key) = config.generator_api_key {
        service = service.with_api_key(key);
    }
    service
}

/// Prints the loaded configuration.
fn print_config(config: &Config) {
    println!("Configuration loaded:");
    println!("  Generator URL: {}", config.generator_url);
    println!("  Generator model: {}", config.generator_model);
    println!("  Generation timeout: {}s", config.generation_timeout_secs);
    println!("  Questions per exam: {}", config.questions_per_exam);
    println!("  Default difficulty: {}", config.default_difficulty);
    println!("  Token TTL: {}m", config.token_ttl_minutes);
}

/// Seeds one demo institution with a teacher, a student group, a subject
/// tree and a course whose lessons are already published.
#[allow(clippy::too_many_lines)]
async fn seed_demo_data(store: &dyn Store, platform: &Platform) -> anyhow::Result<()> {
    let institution = store.create_institution("Edura Demo School", "DEMO").await?;

    let teacher = store
        .create_user(NewUser {
            email: "teacher@edura.dev".to_string(),
            password_hash: platform.credentials().hash_password(DEMO_PASSWORD)?,
            full_name: "Tina Teacher".to_string(),
            role: UserRole::Teacher,
            institution_id: institution.id,
            profile: NewProfile::Teacher,
        })
        .await?;

    let group = store
        .create_group(NewGroup {
            name: "7A".to_string(),
            institution_id: institution.id,
            teacher_id: Some(teacher.id),
            invite_code: generate_invite_code(8),
        })
        .await?;

    let student = store
        .create_user(NewUser {
            email: "student@edura.dev".to_string(),
            password_hash: platform.credentials().hash_password(DEMO_PASSWORD)?,
            full_name: "Sam Student".to_string(),
            role: UserRole::Student,
            institution_id: institution.id,
            profile: NewProfile::Student { group_id: group.id },
        })
        .await?;

    let math = store.create_subject("Mathematics", Some(teacher.id)).await?;
    let mut topic_ids = Vec::new();
    for (i, title) in [
        "Numbers and arithmetic",
        "Equations and inequalities",
        "Functions and graphs",
        "Probability basics",
    ]
    .iter()
    .enumerate()
    {
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let topic = store
            .create_topic(NewTopic {
                subject_id: math.id,
                parent_id: None,
                title: (*title).to_string(),
                order_num: i as i32 + 1,
            })
            .await?;
        topic_ids.push(topic.id);
    }

    let course = store
        .create_course(NewCourse {
            title: "Mathematics: foundations".to_string(),
            description: Some("Core concepts for first-year students".to_string()),
            institution_id: institution.id,
            created_by: teacher.id,
        })
        .await?;

    for (i, (title, topic_id)) in [
        ("Numbers and numeral systems", Some(topic_ids[0])),
        ("Solving linear equations", Some(topic_ids[1])),
        ("Reading function graphs", Some(topic_ids[2])),
    ]
    .iter()
    .enumerate()
    {
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let lesson = store
            .create_lesson(NewLesson {
                course_id: course.id,
                title: (*title).to_string(),
                description: None,
                content: Some(format!("Demo lesson content for '{title}'.")),
                video_url: None,
                duration_minutes: 30,
                order_num: i as i32 + 1,
                topic_id: *topic_id,
            })
            .await?;
        store
            .update_lesson(
                lesson.id,
                LessonPatch {
                    is_published: Some(true),
                    ..Default::default()
                },
            )
            .await?;
    }

    store.enroll(course.id, student.id).await?;

    println!("Demo data seeded:");
    println!("  Institution: {} (code {})", institution.name, institution.short_code);
    println!("  Group invite code: {}", group.invite_code);
    println!("  Teacher login: {} / {DEMO_PASSWORD}", teacher.email);
    println!("  Student login: {} / {DEMO_PASSWORD}", student.email);
    tracing::info!(
        institution = %institution.short_code,
        course_id = %course.id,
        "demo data seeded"
    );
    Ok(())
}
