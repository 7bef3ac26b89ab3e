use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};

use faceid_core::enrollment::bulk_enroll_use_case::BulkEnrollUseCase;
use faceid_core::enrollment::domain::enrollment_session::{EnrollmentSession, RecognitionLevel};
use faceid_core::enrollment::domain::match_settings::MatchSettings;
use faceid_core::enrollment::domain::session_message::{SessionRequest, SessionResponse};
use faceid_core::enrollment::enrollment_logger::{EnrollmentLogger, LogEnrollmentLogger};
use faceid_core::enrollment::enrollment_protocol::EnrollmentProtocol;
use faceid_core::enrollment::infrastructure::precomputed_embedding_provider::{
    PrecomputedEmbeddingProvider, SidecarImageReader,
};
use faceid_core::enrollment::session_worker::SessionWorker;
use faceid_core::imaging::domain::image_reader::ImageReader;
use faceid_core::imaging::face_image_archive::FaceImageArchive;
use faceid_core::imaging::infrastructure::image_file_reader::ImageFileReader;
use faceid_core::imaging::infrastructure::image_file_writer::ImageFileWriter;
use faceid_core::matching::domain::distance_metric::DistanceMetric;
use faceid_core::shared::config_key::ConfigKey;
use faceid_core::shared::constants::DEFAULT_CROP_PADDING;
use faceid_core::shared::error::FaceIdError;
use faceid_core::shared::recognition_model::RecognitionModel;
use faceid_core::storage::infrastructure::json_store_backend::{default_data_dir, JsonStoreBackend};
use faceid_core::storage::representation_store::RepresentationStore;

/// Face identity matching and enrollment.
///
/// Embeddings are read from `<image>.faces.json` sidecars produced by an
/// external face model.
#[derive(Parser)]
#[command(name = "faceid")]
struct Cli {
    #[command(flatten)]
    settings: SettingsArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct SettingsArgs {
    /// Directory holding store files and face images.
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,

    /// Recognition model that produced the embeddings.
    #[arg(long, global = true, default_value = "Facenet")]
    model: String,

    /// Face detector that produced the boxes.
    #[arg(long, global = true, default_value = "retinaface")]
    detector: String,

    /// Faces were not aligned before embedding.
    #[arg(long, global = true)]
    unaligned: bool,

    /// Input normalization used by the model.
    #[arg(long, global = true, default_value = "base")]
    normalization: String,

    /// Percentage the detected box was expanded by before embedding.
    #[arg(long, global = true, default_value = "0")]
    expand_percentage: u32,

    /// Distance metric: cosine, euclidean or euclidean_l2.
    #[arg(long, global = true, default_value = "cosine")]
    metric: String,

    /// Match threshold (defaults to the model's published value).
    #[arg(long, global = true)]
    threshold: Option<f64>,

    /// Context kept around saved faces (0.0-1.0).
    #[arg(long, global = true, default_value_t = DEFAULT_CROP_PADDING)]
    crop_padding: f64,
}

#[derive(Subcommand)]
enum Command {
    /// Match every face in an image against the store.
    Find { image: PathBuf },
    /// Submit one image as a session message.
    Enroll {
        image: PathBuf,
        /// strict or auto_enroll.
        #[arg(long, default_value = "auto_enroll")]
        level: String,
        /// Identity the caller believes it already holds.
        #[arg(long)]
        hint: Option<String>,
    },
    /// Register a dataset laid out as <dir>/<identity>/<image>.
    Register { dataset: PathBuf },
    /// Run a session over JSON lines on stdin, one response per line.
    Session {
        /// Level in force until a message overrides it.
        #[arg(long, default_value = "strict")]
        level: String,
    },
    /// Show store size and identities.
    Stats,
    /// Print the path of an identity's canonical face image.
    Face { identity: String },
}

/// One line of `faceid session` input.
#[derive(Deserialize)]
struct SessionLine {
    image: PathBuf,
    level: Option<RecognitionLevel>,
    hint_identity: Option<String>,
}

#[derive(Serialize)]
struct StoreStats {
    store: String,
    location: PathBuf,
    representations: usize,
    identities: Vec<String>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let settings = build_settings(&cli.settings)?;
    let store_dir = resolve_store_dir(&cli.settings)?;
    let store = Arc::new(RepresentationStore::new(Box::new(JsonStoreBackend::new(&store_dir))));
    let archive = FaceImageArchive::new(&store_dir, Box::new(ImageFileWriter::new()));

    match cli.command {
        Command::Stats => run_stats(&store, &settings.key),
        Command::Face { identity } => run_face(&archive, &identity),
        Command::Find { image } => {
            let (protocol, reader) = build_protocol(store, archive, settings)?;
            run_find(&protocol, &reader, &image)
        }
        Command::Enroll { image, level, hint } => {
            let (protocol, reader) = build_protocol(store, archive, settings)?;
            run_enroll(&protocol, &reader, &image, level.parse()?, hint)
        }
        Command::Register { dataset } => {
            let (protocol, reader) = build_protocol(store, archive, settings)?;
            run_register(protocol, reader, &dataset)
        }
        Command::Session { level } => {
            let (protocol, reader) = build_protocol(store, archive, settings)?;
            run_session(protocol, &reader, level.parse()?)
        }
    }
}

/// Wires the protocol to sidecar-backed embeddings: every image read through
/// the returned reader makes its detections available to the protocol.
fn build_protocol(
    store: Arc<RepresentationStore>,
    archive: FaceImageArchive,
    settings: MatchSettings,
) -> Result<(Arc<EnrollmentProtocol>, SidecarImageReader), FaceIdError> {
    let provider = PrecomputedEmbeddingProvider::new();
    let reader = SidecarImageReader::new(Box::new(ImageFileReader::new()), provider.clone());
    let protocol = EnrollmentProtocol::new(store, Box::new(provider), archive, settings)?;
    Ok((Arc::new(protocol), reader))
}

fn run_find(
    protocol: &EnrollmentProtocol,
    reader: &dyn ImageReader,
    image: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let frame = reader.read(image)?;
    let mut logger = LogEnrollmentLogger::new();
    let faces = protocol.find(&frame, &mut logger)?;
    logger.summary();
    print_json(&faces)
}

fn run_enroll(
    protocol: &EnrollmentProtocol,
    reader: &dyn ImageReader,
    image: &Path,
    level: RecognitionLevel,
    hint: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let frame = reader.read(image)?;
    let mut request = SessionRequest::new(frame).with_level(level);
    request.hint_identity = hint;

    let mut logger = LogEnrollmentLogger::new();
    let response = protocol.process(&mut EnrollmentSession::new(level), &request, &mut logger);
    logger.summary();
    print_json(&response)?;

    match response.error {
        Some(e) => Err(e.message.into()),
        None => Ok(()),
    }
}

fn run_register(
    protocol: Arc<EnrollmentProtocol>,
    reader: SidecarImageReader,
    dataset: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let use_case = BulkEnrollUseCase::new(Box::new(reader), protocol);
    let mut logger = LogEnrollmentLogger::new();
    let report = use_case.execute(dataset, &mut logger)?;
    logger.summary();
    print_json(&report)
}

fn run_session(
    protocol: Arc<EnrollmentProtocol>,
    reader: &dyn ImageReader,
    level: RecognitionLevel,
) -> Result<(), Box<dyn std::error::Error>> {
    let worker = SessionWorker::spawn(
        protocol,
        EnrollmentSession::new(level),
        Box::new(LogEnrollmentLogger::new()),
    );

    for line in std::io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = match read_session_line(&line, reader) {
            Ok(request) => {
                worker
                    .submit(request)
                    .map_err(|_| "session worker stopped")?;
                worker.responses().recv()?
            }
            Err(e) => SessionResponse::failed(&e),
        };
        print_json_line(&response)?;
    }

    let logger = worker.finish()?;
    logger.summary();
    Ok(())
}

fn read_session_line(line: &str, reader: &dyn ImageReader) -> Result<SessionRequest, FaceIdError> {
    let parsed: SessionLine = serde_json::from_str(line)
        .map_err(|e| FaceIdError::configuration(format!("invalid session message: {e}")))?;
    let frame = reader
        .read(&parsed.image)
        .map_err(|e| FaceIdError::Image(format!("{}: {e}", parsed.image.display())))?;
    Ok(SessionRequest {
        frame,
        level: parsed.level,
        hint_identity: parsed.hint_identity,
    })
}

fn run_stats(store: &RepresentationStore, key: &ConfigKey) -> Result<(), Box<dyn std::error::Error>> {
    let stats = StoreStats {
        store: key.store_name(),
        location: store.location(key),
        representations: store.len(key)?,
        identities: store.identities(key)?,
    };
    print_json(&stats)
}

fn run_face(archive: &FaceImageArchive, identity: &str) -> Result<(), Box<dyn std::error::Error>> {
    match archive.find(identity) {
        Some(path) => {
            println!("{}", path.display());
            Ok(())
        }
        None => Err(format!("No face image for identity '{identity}'").into()),
    }
}

fn build_settings(args: &SettingsArgs) -> Result<MatchSettings, FaceIdError> {
    let model: RecognitionModel = args.model.parse()?;
    let metric: DistanceMetric = args.metric.parse()?;
    let settings = MatchSettings {
        key: ConfigKey::new(
            model,
            &args.detector,
            !args.unaligned,
            &args.normalization,
            args.expand_percentage,
        ),
        metric,
        threshold_override: args.threshold,
        crop_padding: args.crop_padding,
    };
    settings.validate()?;
    Ok(settings)
}

fn resolve_store_dir(args: &SettingsArgs) -> Result<PathBuf, Box<dyn std::error::Error>> {
    match &args.store_dir {
        Some(dir) => Ok(dir.clone()),
        None => default_data_dir()
            .ok_or_else(|| "No platform data directory; pass --store-dir".into()),
    }
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let args = &cli.settings;
    if let Some(t) = args.threshold {
        if t.is_nan() || t < 0.0 {
            return Err(format!("Threshold must be non-negative, got {t}").into());
        }
    }
    if !(0.0..=1.0).contains(&args.crop_padding) {
        return Err(format!(
            "Crop padding must be between 0.0 and 1.0, got {}",
            args.crop_padding
        )
        .into());
    }
    if args.detector.trim().is_empty() {
        return Err("Detector name must not be empty".into());
    }
    match &cli.command {
        Command::Find { image } | Command::Enroll { image, .. } => {
            if !image.exists() {
                return Err(format!("Input file not found: {}", image.display()).into());
            }
        }
        Command::Register { dataset } => {
            if !dataset.is_dir() {
                return Err(format!("Dataset directory not found: {}", dataset.display()).into());
            }
        }
        Command::Session { .. } | Command::Stats | Command::Face { .. } => {}
    }
    if let Command::Enroll { level, .. } | Command::Session { level } = &cli.command {
        level.parse::<RecognitionLevel>()?;
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_json_line<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("faceid").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults_build_default_settings() {
        let cli = parse(&["stats"]);
        let settings = build_settings(&cli.settings).unwrap();
        assert_eq!(settings, MatchSettings::default());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = parse(&["stats", "--model", "ArcFace", "--metric", "euclidean_l2", "--unaligned"]);
        let settings = build_settings(&cli.settings).unwrap();
        assert_eq!(settings.key.model, RecognitionModel::ArcFace);
        assert_eq!(settings.metric, DistanceMetric::EuclideanL2);
        assert!(!settings.key.align);
    }

    #[test]
    fn test_unknown_model_rejected() {
        let cli = parse(&["stats", "--model", "NotAModel"]);
        assert!(build_settings(&cli.settings).is_err());
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let cli = parse(&["stats", "--threshold=-0.5"]);
        assert!(validate(&cli).is_err());
    }

    #[test]
    fn test_padding_out_of_range_rejected() {
        let cli = parse(&["stats", "--crop-padding", "1.5"]);
        assert!(validate(&cli).is_err());
    }

    #[test]
    fn test_missing_image_rejected() {
        let cli = parse(&["find", "/nonexistent/face.jpg"]);
        assert!(validate(&cli).is_err());
    }

    #[test]
    fn test_session_line_parses_level() {
        let line: SessionLine =
            serde_json::from_str(r#"{"image":"a.jpg","level":"auto_enroll","hint_identity":"id1"}"#).unwrap();
        assert_eq!(line.level, Some(RecognitionLevel::AutoEnroll));
        assert_eq!(line.hint_identity.as_deref(), Some("id1"));
    }
}
