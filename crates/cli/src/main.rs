#![deny(warnings)]

mod shell;

use anyhow::Context;
use clap::{Parser, Subcommand};
use emotion_timeline_core::api::HttpEmotionApi;
use emotion_timeline_core::chart::SvgChartBackend;
use emotion_timeline_core::config::{
    resolve_output_dir, resolve_server_url, AnalyzeSettings, AppConfig, ChunkInput, EmotionMap,
    Model, StdEnv, DEFAULT_CHUNK_INPUT,
};
use emotion_timeline_core::controller::Controller;
use emotion_timeline_core::download::FileDownloadStore;
use emotion_timeline_core::render::TerminalView;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

pub(crate) type AppController =
    Controller<HttpEmotionApi, TerminalView<std::io::Stdout>, SvgChartBackend, FileDownloadStore>;

#[derive(Parser, Debug)]
#[command(name = "emotion-timeline")]
#[command(about = "Upload audio, run server-side emotion analysis and view the timeline")]
struct Args {
    /// Base URL of the analysis server [env: EMOTION_SERVER_URL]
    #[arg(long)]
    server: Option<String>,

    /// Where charts and JSON exports are written [env: EMOTION_OUTPUT_DIR]
    #[arg(long)]
    output_dir: Option<String>,

    #[arg(long, default_value = DEFAULT_CHUNK_INPUT, allow_hyphen_values = true)]
    chunk_ms: String,

    #[arg(long, default_value = "short_to_full")]
    emotion_map: String,

    #[arg(long, default_value = "superb")]
    model: String,

    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Interactive session (the default)
    Shell {
        /// Preselect an audio file
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Upload one file, then analyze it
    Run {
        #[arg(long)]
        file: PathBuf,
    },
    /// Delete every upload on the server
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let env = StdEnv;
    let command = args
        .command
        .clone()
        .unwrap_or(Command::Shell { file: None });
    let cfg = build_config(args, &env)?;

    tracing::info!(
        server = %cfg.server,
        output_dir = %cfg.output_dir.display(),
        "config loaded"
    );

    let controller = Arc::new(build_controller(&cfg)?);

    match command {
        Command::Shell { file } => {
            shell::run(controller, shell::ControlPanel::new(file, cfg.settings)).await
        }
        Command::Run { file } => {
            controller.upload(Some(file.as_path())).await;
            if controller.uploaded_filename().is_none() {
                anyhow::bail!("upload of {} failed", file.display());
            }
            controller.analyze(&cfg.settings).await;
            Ok(())
        }
        Command::Clear => {
            controller.clear().await;
            Ok(())
        }
    }
}

fn build_controller(cfg: &AppConfig) -> anyhow::Result<AppController> {
    let api = HttpEmotionApi::new(&cfg.server)
        .with_context(|| format!("invalid endpoints for {}", cfg.server))?;
    Ok(Controller::new(
        api,
        TerminalView::new(std::io::stdout()),
        SvgChartBackend::new(cfg.output_dir.clone()),
        FileDownloadStore::new(cfg.output_dir.clone()),
    ))
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(
            level
                .parse()
                .with_context(|| format!("invalid --log-level: {level}"))?,
        )
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn build_config(
    args: Args,
    env: &impl emotion_timeline_core::config::Env,
) -> anyhow::Result<AppConfig> {
    let server = resolve_server_url(args.server, env)?;
    let output_dir = resolve_output_dir(args.output_dir, env)?;

    let settings = AnalyzeSettings {
        chunk: ChunkInput::new(args.chunk_ms),
        emotion_map: args.emotion_map.parse::<EmotionMap>()?,
        model: args.model.parse::<Model>()?,
    };

    Ok(AppConfig {
        server,
        output_dir,
        settings,
    })
}
