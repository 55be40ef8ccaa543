use faceapp::{
    camera::{Camera, CameraCapture, CameraSelection, FrameSource},
    cli::draw_face_boxes,
    common::{config::DEFAULT_CONFIG_PATH, AppPaths, Config, DevMode, FaceAppError, Result},
    core::{DescriptorExtractor, ExtractionMode, FaceLocator, FaceLogin, LoginOutcome, OnnxExtractor},
    storage::{EnrollmentStore, SessionStore, SqliteEnrollmentStore},
};

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "faceapp")]
#[command(about = "Face recognition sign-up and login")]
struct Cli {
    /// Enable development mode (saves data locally for testing)
    #[arg(long, global = true)]
    dev: bool,

    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the user database if it does not exist
    InitDb,
    /// Register a face under a username (repeat to add more captures)
    Signup {
        #[arg(short, long)]
        full_name: String,
        #[arg(short, long)]
        username: String,
    },
    /// Log in by face
    Login,
    /// Show the logged-in user
    Whoami,
    /// End the current session
    Logout,
    /// List enrolled accounts
    Users,
    /// Print the descriptors found in an image file as JSON
    Extract {
        #[arg(short, long)]
        image: PathBuf,
        /// Keep every face instead of only the first
        #[arg(short, long)]
        all: bool,
    },
    /// Capture one frame and save it with detected faces outlined
    TestCamera,
    /// List video devices and find a working camera
    DetectCamera {
        /// Write the working device index to the config file
        #[arg(long)]
        save: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.dev);

    if let Err(e) = run(cli) {
        tracing::debug!("Command failed: {}", e);
        eprintln!("{}", e.user_message());
        std::process::exit(1);
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let dev_mode = DevMode::new(cli.dev)?;
    let config = Config::load_or_default(&cli.config, false)?;
    let paths = AppPaths::resolve(&config, &dev_mode)?;
    paths.ensure_dirs()?;
    let sessions = SessionStore::new(&paths.session_file);

    match cli.command {
        Commands::InitDb => {
            open_store(&paths)?;
            println!("Database ready at {}", paths.database.display());
        }
        Commands::Signup { full_name, username } => {
            refuse_if_logged_in(&sessions)?;
            let store = open_store(&paths)?;
            let extractor = OnnxExtractor::new(&config)?;
            let mut capture = CameraCapture::new(&config, &extractor)
                .save_to(paths.capture_path("signup"));

            println!("Look at the camera and press SPACE...");
            let mut flow = FaceLogin::new(&config, &extractor, &store);
            let outcome = flow.sign_up(&mut capture, &full_name, &username)?;
            report_probed_camera(capture.selection(), &cli.config);

            if outcome.created {
                println!("User {} registered successfully!", full_name.trim());
            } else {
                println!("Added {} capture(s) to {} ({} stored).",
                    outcome.added, username.trim(), outcome.total);
            }
        }
        Commands::Login => {
            refuse_if_logged_in(&sessions)?;
            let store = open_store(&paths)?;
            let extractor = OnnxExtractor::new(&config)?;
            let mut capture = CameraCapture::new(&config, &extractor)
                .save_to(paths.capture_path("login"));

            println!("Look at the camera and press SPACE...");
            let mut flow = FaceLogin::new(&config, &extractor, &store);
            let outcome = flow.log_in(&mut capture)?;
            report_probed_camera(capture.selection(), &cli.config);
            match outcome {
                LoginOutcome::Matched(matches) => {
                    if let Some(first) = matches.first() {
                        let session = sessions.establish(first)?;
                        println!("Welcome, {}!", session.full_name);
                    }
                    if matches.len() > 1 {
                        println!("Also matched: {}", matches.usernames()[1..].join(", "));
                    }
                }
                LoginOutcome::Unmatched => {
                    println!("Face not recognized. Try again or sign up.");
                }
            }
        }
        Commands::Whoami => match sessions.current()? {
            Some(session) => println!("Logged in as {} since {}", session.user, session.started_at),
            None => println!("Not logged in."),
        },
        Commands::Logout => {
            sessions.clear()?;
            println!("Logged out successfully.");
        }
        Commands::Users => {
            let store = open_store(&paths)?;
            let records = store.all_records()?;
            if records.is_empty() {
                println!("No users enrolled.");
            }
            for record in &records {
                println!("{:<20} {:<30} {} descriptor(s)",
                    record.account.username, record.account.full_name, record.descriptors.len());
            }
        }
        Commands::Extract { image, all } => {
            let extractor = OnnxExtractor::new(&config)?;
            let mode = if all { ExtractionMode::All } else { ExtractionMode::First };
            let descriptors = mode.select(extractor.extract_file(&image)?);
            tracing::info!("{} descriptor(s) from {}", descriptors.len(), image.display());
            println!("{}", serde_json::to_string(&descriptors)?);
        }
        Commands::TestCamera => {
            let extractor = OnnxExtractor::new(&config)?;
            let (camera, selection) = Camera::open(&config.camera)?;
            println!("Using camera /dev/video{}{}",
                selection.device_index, if selection.probed { " (probed)" } else { "" });

            let frame = camera.start_stream()?.next_frame()?;
            let frame = if config.camera.mirror { frame.fliph() } else { frame };
            let faces = extractor.locate(&frame)?;
            println!("Found {} face(s)", faces.len());
            for (i, face) in faces.iter().enumerate() {
                println!("  Face {}: confidence {:.3}", i + 1, face.confidence);
            }

            let save_path = dev_mode.debug_dir()
                .map(|dir| dir.join("test_camera.jpg"))
                .unwrap_or_else(|| paths.capture_path("test"));
            draw_face_boxes(&frame, &faces).save(&save_path)?;
            println!("Saved test image to {}", save_path.display());
        }
        Commands::DetectCamera { save } => {
            println!("🔍 Detecting available cameras...\n");

            let devices = Camera::list_devices()?;
            if devices.is_empty() {
                println!("❌ No cameras found!");
                println!("\nTroubleshooting:");
                println!("  1. Check if cameras are connected");
                println!("  2. Ensure you have permission to access /dev/video*");
                return Err(FaceAppError::CameraUnavailable("no /dev/video* devices".into()));
            }
            for device in &devices {
                println!("📷 /dev/video{}: {}", device.index, device.name);
                println!("   - formats: {}", device.formats.join(", "));
                if !device.video_capture {
                    println!("   - no video capture");
                }
            }

            let (_camera, selection) = Camera::open(&config.camera)?;
            println!("\n✅ Working camera: /dev/video{}", selection.device_index);

            if save && selection.device_index != config.camera.device_index {
                let mut updated = config.clone();
                updated.camera.device_index = selection.device_index;
                updated.save_to_path(&cli.config)?;
                println!("📝 Saved device_index = {} to {}", selection.device_index, cli.config.display());
            } else if selection.probed {
                println!("\n📝 To keep using it, set in {}:", cli.config.display());
                println!("   [camera]");
                println!("   device_index = {}", selection.device_index);
            }
        }
    }

    Ok(())
}

/// Opens the database, creating the `users` table on first use.
fn open_store(paths: &AppPaths) -> Result<SqliteEnrollmentStore> {
    SqliteEnrollmentStore::open(&paths.database)
}

fn report_probed_camera(selection: Option<CameraSelection>, config_path: &Path) {
    if let Some(selection) = selection.filter(|s| s.probed) {
        println!("📷 Used /dev/video{} found by probing. Run `faceapp detect-camera --save --config {}` to keep it.",
            selection.device_index, config_path.display());
    }
}

fn refuse_if_logged_in(sessions: &SessionStore) -> Result<()> {
    match sessions.current()? {
        Some(session) => Err(FaceAppError::AlreadyLoggedIn(session.user)),
        None => Ok(()),
    }
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
