use crate::AppController;
use anyhow::Context;
use emotion_timeline_core::config::{AnalyzeSettings, ChunkInput, EmotionMap, Model};
use emotion_timeline_core::render::StatusKind;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;

const HELP: &str = "\
commands:
  file <path>     select the audio file to upload
  chunk <ms>      chunk size in milliseconds
  map <name>      emotion map (short_to_full, none)
  model <name>    model (superb)
  upload          upload the selected file
  analyze         analyze the last upload
  clear           delete all uploads on the server
  show            print the current selections
  help            print this help
  quit            wait for pending work and exit";

/// Input values the workflows read at trigger time.
#[derive(Clone, Debug, Default)]
pub struct ControlPanel {
    pub file: Option<PathBuf>,
    pub settings: AnalyzeSettings,
}

impl ControlPanel {
    pub fn new(file: Option<PathBuf>, settings: AnalyzeSettings) -> Self {
        Self { file, settings }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ShellCommand {
    File(PathBuf),
    Chunk(String),
    Map(String),
    Model(String),
    Upload,
    Analyze,
    Clear,
    Show,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

fn parse_command(line: &str) -> ShellCommand {
    let line = line.trim();
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };
    match (head, rest) {
        ("", _) => ShellCommand::Empty,
        ("file", path) if !path.is_empty() => ShellCommand::File(PathBuf::from(path)),
        ("chunk", value) => ShellCommand::Chunk(value.to_owned()),
        ("map", name) => ShellCommand::Map(name.to_owned()),
        ("model", name) => ShellCommand::Model(name.to_owned()),
        ("upload", "") => ShellCommand::Upload,
        ("analyze", "") => ShellCommand::Analyze,
        ("clear", "") => ShellCommand::Clear,
        ("show", "") => ShellCommand::Show,
        ("help" | "?", _) => ShellCommand::Help,
        ("quit" | "exit", "") => ShellCommand::Quit,
        _ => ShellCommand::Unknown(line.to_owned()),
    }
}

fn describe(panel: &ControlPanel, uploaded: Option<&str>) -> String {
    format!(
        "file: {} | chunk: {} | map: {} | model: {} | uploaded: {}",
        panel
            .file
            .as_ref()
            .map(|f| f.display().to_string())
            .unwrap_or_else(|| "-".to_owned()),
        panel.settings.chunk.as_str(),
        panel.settings.emotion_map.as_str(),
        panel.settings.model.as_str(),
        uploaded.unwrap_or("-"),
    )
}

/// Reads commands from stdin until `quit` or end of input. Workflows run as
/// independent tasks so a slow request never blocks the prompt.
pub async fn run(controller: Arc<AppController>, mut panel: ControlPanel) -> anyhow::Result<()> {
    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tasks = JoinSet::new();

    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        while let Some(finished) = tasks.try_join_next() {
            if let Err(e) = finished {
                tracing::error!(error = %e, "workflow task failed");
            }
        }

        match parse_command(&line) {
            ShellCommand::Upload => {
                let controller = controller.clone();
                let file = panel.file.clone();
                tasks.spawn(async move { controller.upload(file.as_deref()).await });
            }
            ShellCommand::Analyze => {
                let controller = controller.clone();
                let settings = panel.settings.clone();
                tasks.spawn(async move { controller.analyze(&settings).await });
            }
            ShellCommand::Clear => {
                let controller = controller.clone();
                tasks.spawn(async move { controller.clear().await });
            }
            ShellCommand::File(path) => {
                controller.set_status(&format!("Selected: {}", path.display()), StatusKind::Info);
                panel.file = Some(path);
            }
            ShellCommand::Chunk(value) => panel.settings.chunk = ChunkInput::new(value),
            ShellCommand::Map(name) => match name.parse::<EmotionMap>() {
                Ok(map) => panel.settings.emotion_map = map,
                Err(e) => controller.set_status(&e.to_string(), StatusKind::Warn),
            },
            ShellCommand::Model(name) => match name.parse::<Model>() {
                Ok(model) => panel.settings.model = model,
                Err(e) => controller.set_status(&e.to_string(), StatusKind::Warn),
            },
            ShellCommand::Show => {
                let uploaded = controller.uploaded_filename();
                controller.set_status(&describe(&panel, uploaded.as_deref()), StatusKind::Info);
            }
            ShellCommand::Help => println!("{HELP}"),
            ShellCommand::Quit => break,
            ShellCommand::Empty => {}
            ShellCommand::Unknown(line) => controller.set_status(
                &format!("Unknown command: {line} (type 'help')"),
                StatusKind::Warn,
            ),
        }
    }

    while let Some(finished) = tasks.join_next().await {
        if let Err(e) = finished {
            tracing::error!(error = %e, "workflow task failed");
        }
    }
    Ok(())
}
