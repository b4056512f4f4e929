use serde::Serialize;
use serde_json::Number;
use std::{fmt, path::PathBuf, str::FromStr};
use url::Url;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000/";
pub const DEFAULT_OUTPUT_DIR: &str = "emotion-output";
pub const DEFAULT_CHUNK_INPUT: &str = "2000";
pub const ENV_SERVER_URL: &str = "EMOTION_SERVER_URL";
pub const ENV_OUTPUT_DIR: &str = "EMOTION_OUTPUT_DIR";

/// Base URL of the analysis server. Always ends with `/` so endpoint joins
/// append instead of replacing the last path segment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerUrl(Url);

impl ServerUrl {
    pub fn new(value: &str) -> Result<Self, ConfigError> {
        let mut url = Url::parse(value.trim())?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme(url.scheme().to_owned()));
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(Self(url))
    }

    pub fn endpoint(&self, name: &str) -> Result<Url, ConfigError> {
        Ok(self.0.join(name)?)
    }
}

impl fmt::Display for ServerUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Label taxonomy the server normalizes predictions into.
#[derive(Clone, Copy, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmotionMap {
    #[default]
    ShortToFull,
    None,
}

impl EmotionMap {
    pub const ALL: [EmotionMap; 2] = [EmotionMap::ShortToFull, EmotionMap::None];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionMap::ShortToFull => "short_to_full",
            EmotionMap::None => "none",
        }
    }
}

impl FromStr for EmotionMap {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s.trim())
            .ok_or_else(|| ConfigError::UnknownEmotionMap(s.to_owned()))
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Model {
    #[default]
    Superb,
}

impl Model {
    pub const ALL: [Model; 1] = [Model::Superb];

    pub fn as_str(&self) -> &'static str {
        match self {
            Model::Superb => "superb",
        }
    }
}

impl FromStr for Model {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s.trim())
            .ok_or_else(|| ConfigError::UnknownModel(s.to_owned()))
    }
}

/// Raw text of the chunk-size input. Parsed only when a request is built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkInput(pub String);

impl ChunkInput {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn parse(&self) -> ChunkMs {
        ChunkMs(parse_leading_int(&self.0))
    }
}

impl Default for ChunkInput {
    fn default() -> Self {
        Self(DEFAULT_CHUNK_INPUT.to_owned())
    }
}

/// Parsed chunk size. `None` is the not-a-number case and goes over the
/// wire as `null`; the server decides what to do with it.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ChunkMs(pub Option<Number>);

impl ChunkMs {
    pub fn is_nan(&self) -> bool {
        self.0.is_none()
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.0.as_ref().and_then(Number::as_i64)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.0.as_ref().and_then(Number::as_f64)
    }
}

/// Leading-integer parse: optional whitespace, optional sign, then digits.
/// Anything after the digits is ignored (`"1500ms"` is 1500). Digit runs
/// beyond `i64` become the nearest float; only an infinite value is lost.
pub fn parse_leading_int(input: &str) -> Option<Number> {
    let s = input.trim_start();
    let sign_len = usize::from(matches!(s.as_bytes().first(), Some(b'-' | b'+')));
    let rest = &s[sign_len..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if end == 0 {
        return None;
    }
    let literal = &s[..sign_len + end];
    match literal.parse::<i64>() {
        Ok(n) => Some(Number::from(n)),
        Err(_) => literal.parse::<f64>().ok().and_then(Number::from_f64),
    }
}

/// Selector and input values read at click time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AnalyzeSettings {
    pub chunk: ChunkInput,
    pub emotion_map: EmotionMap,
    pub model: Model,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub server: ServerUrl,
    pub output_dir: PathBuf,
    pub settings: AnalyzeSettings,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid server url: {0}")]
    InvalidServerUrl(#[from] url::ParseError),
    #[error("unsupported server url scheme: {0}")]
    UnsupportedScheme(String),
    #[error("unknown emotion map: {0}")]
    UnknownEmotionMap(String),
    #[error("unknown model: {0}")]
    UnknownModel(String),
    #[error("output directory must not be empty")]
    EmptyOutputDir,
}

pub trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

#[derive(Clone, Debug, Default)]
pub struct StdEnv;

impl Env for StdEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MapEnv {
    vars: std::collections::BTreeMap<String, String>,
}

impl MapEnv {
    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_owned(), value.to_owned());
        self
    }
}

impl Env for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

pub fn resolve_string_with_default(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
    default: &str,
) -> String {
    match cli_value {
        Some(v) => v,
        None => env.var(env_key).unwrap_or_else(|| default.to_owned()),
    }
}

pub fn resolve_server_url(
    cli_value: Option<String>,
    env: &impl Env,
) -> Result<ServerUrl, ConfigError> {
    let raw = resolve_string_with_default(cli_value, ENV_SERVER_URL, env, DEFAULT_SERVER_URL);
    ServerUrl::new(&raw)
}

pub fn resolve_output_dir(
    cli_value: Option<String>,
    env: &impl Env,
) -> Result<PathBuf, ConfigError> {
    let raw = resolve_string_with_default(cli_value, ENV_OUTPUT_DIR, env, DEFAULT_OUTPUT_DIR);
    if raw.trim().is_empty() {
        return Err(ConfigError::EmptyOutputDir);
    }
    Ok(PathBuf::from(raw))
}
