use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, ensure, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use speakscore::aligner::SubprocessAligner;
use speakscore::audio::capture::LiveCaptureSource;
use speakscore::audio::recorder::{CancelToken, VoiceActivityRecorder};
use speakscore::audio::wav;
use speakscore::config::{AssessConfig, VadSettings};
use speakscore::phoneme::lexicon::CmuLexicon;
use speakscore::transcribe::WhisperTranscriber;
use speakscore::GradingPipeline;

/// Speakscore - pronunciation and fluency assessment
///
/// Grades a recorded utterance against an expected phrase, producing a
/// composite score, a letter grade, and per-word diagnostics.
#[derive(Parser, Debug)]
#[command(name = "speakscore")]
#[command(version = "0.1.0")]
#[command(about = "Pronunciation and fluency assessment", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Grade a recorded utterance against an expected phrase.
    Grade(GradeArgs),
    /// Record an utterance, stopping automatically on trailing silence.
    Record(RecordArgs),
}

#[derive(Args, Debug)]
struct GradeArgs {
    /// WAV file with the utterance to grade.
    #[arg(value_name = "AUDIO")]
    audio: PathBuf,

    /// Expected phrase the speaker was asked to say.
    #[arg(long)]
    expected: String,

    /// Optional native-reference WAV for similarity scoring.
    #[arg(long)]
    reference: Option<PathBuf>,

    /// Whisper ggml model path (defaults to $WHISPER_MODEL_PATH, then
    /// ./models/ggml-base.en.bin).
    #[arg(long)]
    model: Option<PathBuf>,

    /// Custom CMU-format lexicon file (defaults to the bundled lexicon).
    #[arg(long)]
    lexicon: Option<PathBuf>,

    /// External forced-aligner binary; uniform timings are used when absent
    /// or failing.
    #[arg(long = "aligner")]
    aligner_command: Option<PathBuf>,

    /// Pretty-print the result record.
    #[arg(long)]
    pretty: bool,
}

impl GradeArgs {
    fn validate(&self) -> Result<()> {
        ensure!(
            self.audio.is_file(),
            "audio file does not exist: {:?}",
            self.audio
        );
        if let Some(reference) = &self.reference {
            ensure!(
                reference.is_file(),
                "reference file does not exist: {:?}",
                reference
            );
        }
        ensure!(
            !self.expected.trim().is_empty(),
            "expected phrase must not be empty"
        );
        Ok(())
    }

    fn model_path(&self) -> PathBuf {
        self.model.clone().unwrap_or_else(|| {
            std::env::var("WHISPER_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./models/ggml-base.en.bin"))
        })
    }
}

#[derive(Args, Debug)]
struct RecordArgs {
    /// Output WAV path for the captured utterance.
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Input device name (default input device when omitted).
    #[arg(long)]
    device: Option<String>,

    /// RMS silence threshold in the normalized 0-1 range.
    #[arg(long, default_value_t = 0.015)]
    threshold: f64,

    /// Trailing silence that finalizes the utterance, in seconds.
    #[arg(long = "silence-secs", default_value_t = 1.2)]
    silence_secs: f64,

    /// Hard capture cutoff in seconds.
    #[arg(long = "max-secs", default_value_t = 30.0)]
    max_secs: f64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    match Cli::parse().command {
        Command::Grade(args) => run_grade(args),
        Command::Record(args) => run_record(args),
    }
}

fn run_grade(args: GradeArgs) -> Result<()> {
    args.validate()
        .context("failed to validate command-line arguments")?;

    let config = AssessConfig::default();
    let lexicon = match &args.lexicon {
        Some(path) => CmuLexicon::from_file(path)?,
        None => CmuLexicon::bundled()?,
    };
    let model_path = args.model_path();
    ensure!(
        model_path.is_file(),
        "Whisper model not found at {:?}; download with: \
         wget https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-base.en.bin -P ./models/",
        model_path
    );
    let transcriber = WhisperTranscriber::new(&model_path)?;

    let mut pipeline =
        GradingPipeline::new(&config, Arc::new(lexicon), Arc::new(transcriber))?;
    if let Some(command) = args.aligner_command {
        pipeline = pipeline.with_forced_aligner(Arc::new(SubprocessAligner::new(command)));
    }

    let audio = wav::load(&args.audio)?;
    info!(
        samples = audio.samples.len(),
        sample_rate = audio.sample_rate,
        "utterance loaded"
    );
    let reference = args.reference.as_deref().map(wav::load).transpose()?;

    let record = pipeline.grade(&audio, &args.expected, reference.as_ref())?;
    let rendered = if args.pretty {
        serde_json::to_string_pretty(&record)
    } else {
        serde_json::to_string(&record)
    }
    .context("failed to serialize assessment record")?;
    println!("{rendered}");
    Ok(())
}

fn run_record(args: RecordArgs) -> Result<()> {
    let vad = VadSettings {
        silence_threshold: args.threshold,
        silence_duration_secs: args.silence_secs,
        max_duration_secs: args.max_secs,
        ..VadSettings::default()
    };
    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            bail!("output directory does not exist: {:?}", parent);
        }
    }

    let mut source = LiveCaptureSource::new(speakscore::config::CaptureSettings {
        device_name: args.device.clone(),
        ..Default::default()
    });
    let recorder = VoiceActivityRecorder::new(vad);
    let cancel = CancelToken::new();
    println!("Recording... speak now (stops after trailing silence).");
    let outcome = recorder.capture(&mut source, &cancel)?;
    wav::write(&args.output, &outcome.buffer)?;
    println!(
        "Captured {:.2}s ({:?}, stop reason {:?}) -> {:?}",
        outcome.buffer.duration_secs(),
        outcome.state,
        outcome.reason,
        args.output
    );
    Ok(())
}
