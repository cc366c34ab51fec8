//! handsign - hand gesture template matching from the command line.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use handsign::detection::DetectionConfig;
use handsign::{ipc, persist, MatcherConfig, PoseMatcher, Session};

#[derive(Parser, Debug)]
#[command(name = "handsign", version, about = "Hand gesture template matching")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the normalized descriptor of a pose as JSON
    Normalize {
        /// Landmark array or detector frame (JSON)
        #[arg(long)]
        landmarks: PathBuf,

        /// Minimum handedness score when reading a detector frame
        #[arg(long, default_value_t = 0.5)]
        min_confidence: f32,
    },

    /// Classify a pose against a reference set
    Classify {
        /// Reference set (JSON object of label -> descriptor)
        #[arg(long)]
        reference: PathBuf,

        /// Landmark array or detector frame (JSON)
        #[arg(long)]
        landmarks: PathBuf,

        /// Matches must be strictly closer than this distance
        #[arg(long, default_value_t = handsign::matcher::DEFAULT_THRESHOLD)]
        threshold: f32,

        /// Minimum handedness score when reading a detector frame
        #[arg(long, default_value_t = 0.5)]
        min_confidence: f32,
    },

    /// Average a sample store into a reference set
    Build {
        /// Sample store (JSON object of label -> list of descriptors)
        #[arg(long)]
        samples: PathBuf,

        /// Output reference set path
        #[arg(long)]
        out: PathBuf,
    },

    /// Serve s-expression requests on stdin/stdout
    Serve {
        /// Reference set to load at startup
        #[arg(long)]
        reference: Option<PathBuf>,

        /// Matches must be strictly closer than this distance
        #[arg(long, default_value_t = handsign::matcher::DEFAULT_THRESHOLD)]
        threshold: f32,

        /// Log all IPC messages to stderr
        #[arg(long)]
        trace: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries results and the IPC protocol.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "handsign=info".into()),
        )
        .init();

    match cli.command {
        Command::Normalize {
            landmarks,
            min_confidence,
        } => {
            let detection = detection_config(min_confidence);
            let pose = persist::load_pose(&landmarks, &detection)?;
            let descriptor = PoseMatcher::new().normalize(&pose)?;
            println!("{}", serde_json::to_string(&descriptor)?);
        }
        Command::Classify {
            reference,
            landmarks,
            threshold,
            min_confidence,
        } => {
            let set = persist::load_reference_set(&reference)?;
            let pose = persist::load_pose(&landmarks, &detection_config(min_confidence))?;
            let matcher = PoseMatcher::with_config(MatcherConfig { threshold });
            match matcher.classify(&pose, &set)? {
                Some(m) => println!("{} {:.4}", m.label, m.distance),
                None => println!("no match"),
            }
        }
        Command::Build { samples, out } => {
            let store = persist::load_sample_store(&samples)?;
            let set = store.build_reference_set();
            persist::save_reference_set(&out, &set)
                .with_context(|| format!("writing reference set to {}", out.display()))?;
        }
        Command::Serve {
            reference,
            threshold,
            trace,
        } => {
            let mut session = Session::with_config(MatcherConfig { threshold });
            if let Some(path) = reference {
                session.load_reference(persist::load_reference_set(&path)?);
            }
            info!("handsign v{} serving on stdio", env!("CARGO_PKG_VERSION"));
            let stdin = std::io::stdin();
            let stdout = std::io::stdout();
            ipc::serve(&mut session, stdin.lock(), stdout.lock(), trace)
                .context("IPC loop failed")?;
        }
    }

    Ok(())
}

fn detection_config(min_confidence: f32) -> DetectionConfig {
    DetectionConfig {
        min_confidence,
        ..DetectionConfig::default()
    }
}
