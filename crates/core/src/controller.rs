//! The UI controller: owns the transient session state and runs the upload,
//! analyze and clear workflows against the API, the view, and the chart and
//! download resources.
//!
//! Every workflow swallows its errors and reports them through the status
//! region. Each workflow has its own in-flight guard; a second trigger while
//! one is pending is ignored with a warning. Different workflows may still
//! overlap, and the last one to finish wins for shared state.

use crate::api::{
    AnalysisPayload, AnalyzeRequest, ApiError, AudioFile, EmotionApi, TimelineEntry,
};
use crate::chart::{ChartBackend, ChartHandle, ChartKind, ChartSpec};
use crate::config::AnalyzeSettings;
use crate::download::{DownloadStore, DownloadUrl};
use crate::render::{StatusKind, TableRow, View};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use url::Url;

const LOG_TARGET: &str = "controller";

pub const MSG_SELECT_FILE: &str = "Select an audio file first.";
pub const MSG_UPLOADING: &str = "Uploading...";
pub const MSG_ANALYZING: &str = "Analyzing...";
pub const MSG_ANALYSIS_COMPLETE: &str = "Analysis complete.";
pub const MSG_NO_DATA: &str = "No emotion data to display.";
pub const MSG_CLEARING: &str = "Clearing uploads...";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Workflow {
    Upload,
    Analyze,
    Clear,
}

impl Workflow {
    pub fn fallback_message(&self) -> &'static str {
        match self {
            Workflow::Upload => "Upload failed",
            Workflow::Analyze => "Analysis failed",
            Workflow::Clear => "Clear failed",
        }
    }

    fn busy_message(&self) -> &'static str {
        match self {
            Workflow::Upload => "Upload already in progress.",
            Workflow::Analyze => "Analysis already in progress.",
            Workflow::Clear => "Clear already in progress.",
        }
    }
}

#[derive(Default)]
struct SessionState {
    uploaded_filename: Option<String>,
    charts: ActiveCharts,
    active_download: Option<DownloadUrl>,
}

#[derive(Default)]
struct ActiveCharts {
    emotion: Option<ChartHandle>,
    confidence: Option<ChartHandle>,
}

impl ActiveCharts {
    fn slot(&mut self, kind: ChartKind) -> &mut Option<ChartHandle> {
        match kind {
            ChartKind::Emotion => &mut self.emotion,
            ChartKind::Confidence => &mut self.confidence,
        }
    }
}

#[derive(Default)]
struct InFlight {
    upload: AtomicBool,
    analyze: AtomicBool,
    clear: AtomicBool,
}

impl InFlight {
    fn flag(&self, workflow: Workflow) -> &AtomicBool {
        match workflow {
            Workflow::Upload => &self.upload,
            Workflow::Analyze => &self.analyze,
            Workflow::Clear => &self.clear,
        }
    }
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Controller<A, V, C, D> {
    api: A,
    view: V,
    charts: C,
    downloads: D,
    state: Mutex<SessionState>,
    in_flight: InFlight,
}

impl<A, V, C, D> Controller<A, V, C, D>
where
    A: EmotionApi,
    V: View,
    C: ChartBackend,
    D: DownloadStore,
{
    pub fn new(api: A, view: V, charts: C, downloads: D) -> Self {
        Self {
            api,
            view,
            charts,
            downloads,
            state: Mutex::new(SessionState::default()),
            in_flight: InFlight::default(),
        }
    }

    pub fn uploaded_filename(&self) -> Option<String> {
        self.state().uploaded_filename.clone()
    }

    pub fn download_url(&self) -> Option<Url> {
        self.state().active_download.as_ref().map(|d| d.url().clone())
    }

    pub fn has_chart(&self, kind: ChartKind) -> bool {
        self.state().charts.slot(kind).is_some()
    }

    pub fn set_status(&self, message: &str, kind: StatusKind) {
        tracing::debug!(target: LOG_TARGET, kind = kind.as_str(), text = message, "status");
        self.view.set_status(message, kind);
    }

    /// Uploads the selected file. Without a selection nothing is sent.
    pub async fn upload(&self, selected: Option<&Path>) {
        let Some(path) = selected else {
            self.set_status(MSG_SELECT_FILE, StatusKind::Warn);
            return;
        };
        let Some(_guard) = self.begin(Workflow::Upload) else {
            return;
        };

        self.set_status(MSG_UPLOADING, StatusKind::Info);

        let file = match AudioFile::read(path).await {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(
                    target: LOG_TARGET,
                    path = %path.display(),
                    error = %e,
                    "cannot read audio file"
                );
                let message = format!("{}: {e}", Workflow::Upload.fallback_message());
                self.set_status(&message, StatusKind::Error);
                return;
            }
        };

        match self.api.upload(file).await {
            Ok(response) => {
                tracing::info!(
                    target: LOG_TARGET,
                    filename = %response.filename,
                    "upload complete"
                );
                let message = format!("Uploaded: {}", response.filename);
                self.state().uploaded_filename = Some(response.filename);
                self.set_status(&message, StatusKind::Success);
            }
            Err(e) => self.report_failure(Workflow::Upload, &e),
        }
    }

    /// Requests analysis of the current upload with the settings read at
    /// trigger time. The filename is sent even when absent; the server
    /// decides what that means.
    pub async fn analyze(&self, settings: &AnalyzeSettings) {
        let Some(_guard) = self.begin(Workflow::Analyze) else {
            return;
        };

        self.set_status(MSG_ANALYZING, StatusKind::Info);

        let chunk_ms = settings.chunk.parse();
        if chunk_ms.is_nan() {
            tracing::warn!(
                target: LOG_TARGET,
                input = settings.chunk.as_str(),
                "chunk size is not a number"
            );
        }
        let request = AnalyzeRequest {
            filename: self.uploaded_filename(),
            chunk_ms,
            emotion_map: settings.emotion_map,
            model: settings.model,
        };

        match self.api.analyze(request).await {
            Ok(payload) => {
                tracing::info!(
                    target: LOG_TARGET,
                    entries = payload.timeline.len(),
                    "analysis complete"
                );
                self.render_results(&payload).await;
            }
            Err(e) => self.report_failure(Workflow::Analyze, &e),
        }
    }

    /// Deletes all uploads on the server and resets local state on success.
    pub async fn clear(&self) {
        let Some(_guard) = self.begin(Workflow::Clear) else {
            return;
        };

        self.set_status(MSG_CLEARING, StatusKind::Info);

        match self.api.clear().await {
            Ok(response) => {
                self.state().uploaded_filename = None;
                self.view.clear_table();
                self.view.set_raw_json("");
                self.release_charts().await;
                self.release_download().await;
                tracing::info!(target: LOG_TARGET, deleted = response.deleted, "uploads cleared");
                let message = format!("Cleared {} file(s).", response.deleted);
                self.set_status(&message, StatusKind::Success);
            }
            Err(e) => self.report_failure(Workflow::Clear, &e),
        }
    }

    /// Fills the table, both charts, raw JSON view and download link from one
    /// analysis payload. Each previous chart and the previous export are
    /// released before their replacements are created.
    pub async fn render_results(&self, payload: &AnalysisPayload) {
        let json = payload.pretty_json();
        self.view.clear_table();

        if payload.timeline.is_empty() {
            self.set_status(MSG_NO_DATA, StatusKind::Warn);
            self.view.set_raw_json(&json);
            self.release_charts().await;
            self.release_download().await;
            return;
        }

        self.set_status(MSG_ANALYSIS_COMPLETE, StatusKind::Success);

        for entry in &payload.timeline {
            self.view.append_row(&TableRow::from(entry));
        }

        for kind in ChartKind::ALL {
            self.render_chart(kind, &payload.timeline).await;
        }

        self.view.set_raw_json(&json);

        self.release_download().await;
        match self.downloads.publish(json).await {
            Ok(download) => {
                self.view.set_download_link(Some(download.url()));
                let stale = self.state().active_download.replace(download);
                if let Some(stale) = stale {
                    self.revoke_download(stale).await;
                }
            }
            Err(e) => {
                tracing::warn!(target: LOG_TARGET, error = %e, "export publishing failed");
                self.set_status(&format!("Export failed: {e}"), StatusKind::Error);
            }
        }
    }

    fn begin(&self, workflow: Workflow) -> Option<InFlightGuard<'_>> {
        let flag = self.in_flight.flag(workflow);
        if flag
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            tracing::debug!(target: LOG_TARGET, ?workflow, "ignored while in flight");
            self.set_status(workflow.busy_message(), StatusKind::Warn);
            return None;
        }
        Some(InFlightGuard(flag))
    }

    fn report_failure(&self, workflow: Workflow, error: &ApiError) {
        tracing::warn!(target: LOG_TARGET, ?workflow, error = %error, "workflow failed");
        self.set_status(
            &error.user_message(workflow.fallback_message()),
            StatusKind::Error,
        );
    }

    async fn render_chart(&self, kind: ChartKind, timeline: &[TimelineEntry]) {
        self.release_chart(kind).await;
        match self
            .charts
            .create(ChartSpec::from_timeline(kind, timeline))
            .await
        {
            Ok(handle) => {
                self.view.set_chart(kind, Some(&handle));
                let stale = self.state().charts.slot(kind).replace(handle);
                // another render finished in between
                if let Some(stale) = stale {
                    self.destroy_chart(stale).await;
                }
            }
            Err(e) => {
                tracing::warn!(
                    target: LOG_TARGET,
                    kind = kind.as_str(),
                    error = %e,
                    "chart rendering failed"
                );
                self.set_status(&format!("Chart rendering failed: {e}"), StatusKind::Error);
            }
        }
    }

    async fn release_charts(&self) {
        for kind in ChartKind::ALL {
            self.release_chart(kind).await;
        }
    }

    async fn release_chart(&self, kind: ChartKind) {
        let handle = self.state().charts.slot(kind).take();
        if let Some(handle) = handle {
            self.view.set_chart(kind, None);
            self.destroy_chart(handle).await;
        }
    }

    async fn destroy_chart(&self, handle: ChartHandle) {
        if let Err(e) = self.charts.destroy(handle).await {
            tracing::warn!(target: LOG_TARGET, error = %e, "chart destroy failed");
        }
    }

    async fn release_download(&self) {
        let download = self.state().active_download.take();
        if let Some(download) = download {
            self.view.set_download_link(None);
            self.revoke_download(download).await;
        }
    }

    async fn revoke_download(&self, download: DownloadUrl) {
        if let Err(e) = self.downloads.revoke(download).await {
            tracing::warn!(target: LOG_TARGET, error = %e, "export revoke failed");
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ClearResponse, UploadResponse};
    use crate::chart::ChartError;
    use crate::config::{ChunkInput, EmotionMap, Model};
    use crate::download::DownloadError;
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use serde_json::json;
    use crate::chart::Series;
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::path::PathBuf;
    use std::sync::atomic::AtomicU64;
    use std::sync::Arc;
    use tokio::sync::Notify;

    enum Reply {
        Upload(Result<UploadResponse, ApiError>),
        Analyze(Result<AnalysisPayload, ApiError>),
        Clear(Result<ClearResponse, ApiError>),
    }

    #[derive(Debug, PartialEq)]
    enum Call {
        Upload(String),
        Analyze(AnalyzeRequest),
        Clear,
    }

    #[derive(Default)]
    struct FakeApi {
        replies: Mutex<VecDeque<Reply>>,
        calls: Mutex<Vec<Call>>,
        gate: Option<Arc<Notify>>,
    }

    impl FakeApi {
        fn with(replies: Vec<Reply>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                ..Default::default()
            }
        }

        fn gated(mut self, gate: Arc<Notify>) -> Self {
            self.gate = Some(gate);
            self
        }

        fn calls(&self) -> std::sync::MutexGuard<'_, Vec<Call>> {
            self.calls.lock().unwrap()
        }

        async fn respond(&self, call: Call) -> Reply {
            self.calls.lock().unwrap().push(call);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected request")
        }
    }

    impl EmotionApi for FakeApi {
        fn upload(&self, file: AudioFile) -> BoxFuture<'_, Result<UploadResponse, ApiError>> {
            async move {
                match self.respond(Call::Upload(file.file_name)).await {
                    Reply::Upload(r) => r,
                    _ => panic!("reply does not match upload"),
                }
            }
            .boxed()
        }

        fn analyze(
            &self,
            request: AnalyzeRequest,
        ) -> BoxFuture<'_, Result<AnalysisPayload, ApiError>> {
            async move {
                match self.respond(Call::Analyze(request)).await {
                    Reply::Analyze(r) => r,
                    _ => panic!("reply does not match analyze"),
                }
            }
            .boxed()
        }

        fn clear(&self) -> BoxFuture<'_, Result<ClearResponse, ApiError>> {
            async move {
                match self.respond(Call::Clear).await {
                    Reply::Clear(r) => r,
                    _ => panic!("reply does not match clear"),
                }
            }
            .boxed()
        }
    }

    #[derive(Default)]
    struct ViewLog {
        statuses: Vec<(String, StatusKind)>,
        rows: Vec<TableRow>,
        raw_json: String,
        download: Option<Url>,
        charts: HashMap<ChartKind, u64>,
    }

    #[derive(Default)]
    struct RecordingView(Mutex<ViewLog>);

    impl RecordingView {
        fn log(&self) -> std::sync::MutexGuard<'_, ViewLog> {
            self.0.lock().unwrap()
        }

        fn last_status(&self) -> (String, StatusKind) {
            self.log().statuses.last().cloned().expect("status set")
        }
    }

    impl View for RecordingView {
        fn set_status(&self, message: &str, kind: StatusKind) {
            self.log().statuses.push((message.to_owned(), kind));
        }

        fn clear_table(&self) {
            self.log().rows.clear();
        }

        fn append_row(&self, row: &TableRow) {
            self.log().rows.push(row.clone());
        }

        fn set_raw_json(&self, json: &str) {
            self.log().raw_json = json.to_owned();
        }

        fn set_download_link(&self, url: Option<&Url>) {
            self.log().download = url.cloned();
        }

        fn set_chart(&self, kind: ChartKind, chart: Option<&ChartHandle>) {
            let mut log = self.log();
            match chart {
                Some(chart) => log.charts.insert(kind, chart.id),
                None => log.charts.remove(&kind),
            };
        }
    }

    #[derive(Default)]
    struct FakeCharts {
        next_id: AtomicU64,
        live: Mutex<HashSet<u64>>,
        created: Mutex<Vec<ChartSpec>>,
        destroyed: Mutex<Vec<u64>>,
    }

    impl ChartBackend for FakeCharts {
        fn create(&self, spec: ChartSpec) -> BoxFuture<'_, Result<ChartHandle, ChartError>> {
            async move {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let kind = spec.kind;
                self.live.lock().unwrap().insert(id);
                self.created.lock().unwrap().push(spec);
                Ok(ChartHandle {
                    id,
                    kind,
                    location: PathBuf::from(format!("{}-{id}.svg", kind.as_str())),
                })
            }
            .boxed()
        }

        fn destroy(&self, handle: ChartHandle) -> BoxFuture<'_, Result<(), ChartError>> {
            async move {
                assert!(self.live.lock().unwrap().remove(&handle.id), "double destroy");
                self.destroyed.lock().unwrap().push(handle.id);
                Ok(())
            }
            .boxed()
        }
    }

    #[derive(Default)]
    struct FakeDownloads {
        next_id: AtomicU64,
        live: Mutex<HashSet<String>>,
        events: Mutex<Vec<String>>,
    }

    impl DownloadStore for FakeDownloads {
        fn publish(&self, json: String) -> BoxFuture<'_, Result<DownloadUrl, DownloadError>> {
            async move {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let path = std::env::temp_dir().join(format!("timeline-{id}.json"));
                let url = Url::from_file_path(&path).expect("absolute path");
                assert!(!json.is_empty());
                self.live.lock().unwrap().insert(url.to_string());
                self.events.lock().unwrap().push(format!("publish {id}"));
                Ok(DownloadUrl::new(url, path))
            }
            .boxed()
        }

        fn revoke(&self, download: DownloadUrl) -> BoxFuture<'_, Result<(), DownloadError>> {
            async move {
                assert!(self.live.lock().unwrap().remove(download.url().as_str()));
                let name = download
                    .path()
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or_default()
                    .trim_start_matches("timeline-")
                    .to_owned();
                self.events.lock().unwrap().push(format!("revoke {name}"));
                Ok(())
            }
            .boxed()
        }
    }

    type TestController = Controller<FakeApi, RecordingView, FakeCharts, FakeDownloads>;

    fn controller(api: FakeApi) -> TestController {
        Controller::new(
            api,
            RecordingView::default(),
            FakeCharts::default(),
            FakeDownloads::default(),
        )
    }

    fn settings() -> AnalyzeSettings {
        AnalyzeSettings {
            chunk: ChunkInput::new("2000"),
            emotion_map: EmotionMap::ShortToFull,
            model: Model::Superb,
        }
    }

    fn populated() -> AnalysisPayload {
        AnalysisPayload::from_value(json!({
            "timeline": [
                {"time": 0, "emotion": "happy", "confidence": 0.9},
                {"time": 1, "emotion": "sad", "confidence": 0.8},
                {"time": 2, "emotion": "happy", "confidence": 0.7},
            ]
        }))
        .unwrap()
    }

    fn empty() -> AnalysisPayload {
        AnalysisPayload::from_value(json!({ "timeline": [] })).unwrap()
    }

    fn server_error(message: Option<&str>) -> ApiError {
        ApiError::Server {
            status: 500,
            message: message.map(str::to_owned),
        }
    }

    fn audio_file(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("a.wav");
        std::fs::write(&path, b"RIFF").unwrap();
        path
    }

    #[tokio::test]
    async fn upload_without_selection_sends_nothing() {
        let c = controller(FakeApi::default());
        c.upload(None).await;

        assert!(c.api.calls().is_empty());
        assert_eq!(
            c.view.last_status(),
            (MSG_SELECT_FILE.to_owned(), StatusKind::Warn)
        );
    }

    #[tokio::test]
    async fn uploaded_filename_is_sent_with_analyze() {
        let dir = tempfile::tempdir().unwrap();
        let path = audio_file(&dir);
        let c = controller(FakeApi::with(vec![
            Reply::Upload(Ok(UploadResponse {
                filename: "a.wav".to_owned(),
            })),
            Reply::Analyze(Ok(empty())),
        ]));

        c.upload(Some(path.as_path())).await;
        assert_eq!(
            c.view.last_status(),
            ("Uploaded: a.wav".to_owned(), StatusKind::Success)
        );
        assert_eq!(c.uploaded_filename().as_deref(), Some("a.wav"));

        c.analyze(&settings()).await;
        let calls = c.api.calls();
        assert_eq!(calls[0], Call::Upload("a.wav".to_owned()));
        match &calls[1] {
            Call::Analyze(request) => {
                assert_eq!(request.filename.as_deref(), Some("a.wav"));
                assert_eq!(request.chunk_ms.as_i64(), Some(2000));
            }
            other => panic!("unexpected call: {other:?}"),
        }
    }

    #[tokio::test]
    async fn analyze_without_upload_sends_null_filename_and_nan_chunk() {
        let c = controller(FakeApi::with(vec![Reply::Analyze(Err(server_error(Some(
            "chunk_ms must be an integer",
        ))))]));
        let mut s = settings();
        s.chunk = ChunkInput::new("abc");

        c.analyze(&s).await;

        match &c.api.calls()[0] {
            Call::Analyze(request) => {
                assert_eq!(request.filename, None);
                assert!(request.chunk_ms.is_nan());
            }
            other => panic!("unexpected call: {other:?}"),
        }
        assert_eq!(
            c.view.last_status(),
            ("chunk_ms must be an integer".to_owned(), StatusKind::Error)
        );
    }

    #[tokio::test]
    async fn empty_timeline_warns_and_shows_raw_json() {
        let c = controller(FakeApi::with(vec![
            Reply::Analyze(Ok(populated())),
            Reply::Analyze(Ok(empty())),
        ]));

        c.analyze(&settings()).await;
        assert!(c.has_chart(ChartKind::Emotion));
        assert!(c.has_chart(ChartKind::Confidence));

        c.analyze(&settings()).await;
        let log = c.view.log();
        assert!(log.rows.is_empty());
        assert_eq!(log.raw_json, "{\n  \"timeline\": []\n}");
        assert_eq!(log.statuses.last().unwrap().1, StatusKind::Warn);
        assert!(log.charts.is_empty());
        assert_eq!(log.download, None);
        drop(log);
        assert!(!c.has_chart(ChartKind::Emotion));
        assert!(!c.has_chart(ChartKind::Confidence));
        assert!(c.charts.live.lock().unwrap().is_empty());
        assert!(c.downloads.live.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn populated_timeline_fills_table_and_chart_in_order() {
        let c = controller(FakeApi::with(vec![Reply::Analyze(Ok(populated()))]));

        c.analyze(&settings()).await;

        let log = c.view.log();
        let emotions: Vec<&str> = log.rows.iter().map(|r| r.emotion.as_str()).collect();
        assert_eq!(emotions, vec!["happy", "sad", "happy"]);
        assert_eq!(log.rows[0].confidence, "0.9");
        assert_eq!(log.raw_json, populated().pretty_json());
        assert!(log.download.is_some());
        assert!(log
            .statuses
            .contains(&(MSG_ANALYSIS_COMPLETE.to_owned(), StatusKind::Success)));
        drop(log);

        let created = c.charts.created.lock().unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(created[0].kind, ChartKind::Emotion);
        assert_eq!(created[0].labels, vec!["0", "1", "2"]);
        match &created[0].series {
            Series::Categorical { categories, .. } => assert_eq!(categories, &["happy", "sad"]),
            other => panic!("unexpected series: {other:?}"),
        }
        assert_eq!(created[1].kind, ChartKind::Confidence);
        assert_eq!(created[1].labels, vec!["0", "1", "2"]);
        assert_eq!(created[1].series, Series::Numeric(vec![0.9, 0.8, 0.7]));
    }

    #[tokio::test]
    async fn repeated_render_keeps_one_chart_per_kind_and_one_export() {
        let c = controller(FakeApi::default());

        c.render_results(&populated()).await;
        c.render_results(&populated()).await;

        assert_eq!(c.charts.live.lock().unwrap().len(), 2);
        assert_eq!(c.downloads.live.lock().unwrap().len(), 1);
        assert_eq!(
            *c.downloads.events.lock().unwrap(),
            vec!["publish 0", "revoke 0", "publish 1"]
        );
        let log = c.view.log();
        assert_eq!(log.charts.get(&ChartKind::Emotion), Some(&2));
        assert_eq!(log.charts.get(&ChartKind::Confidence), Some(&3));
    }

    #[tokio::test]
    async fn both_charts_are_released_on_replace_and_on_clear() {
        let c = controller(FakeApi::with(vec![
            Reply::Analyze(Ok(populated())),
            Reply::Analyze(Ok(populated())),
            Reply::Clear(Ok(ClearResponse { deleted: 1 })),
        ]));

        c.analyze(&settings()).await;
        c.analyze(&settings()).await;
        // each old chart is destroyed before its replacement exists
        assert_eq!(*c.charts.destroyed.lock().unwrap(), vec![0, 1]);
        assert_eq!(*c.charts.live.lock().unwrap(), HashSet::from([2, 3]));

        c.clear().await;
        assert_eq!(*c.charts.destroyed.lock().unwrap(), vec![0, 1, 2, 3]);
        assert!(c.charts.live.lock().unwrap().is_empty());
        assert!(c.view.log().charts.is_empty());
        assert!(!c.has_chart(ChartKind::Emotion));
        assert!(!c.has_chart(ChartKind::Confidence));
    }

    #[tokio::test]
    async fn failure_without_error_text_uses_fallback() {
        let c = controller(FakeApi::with(vec![
            Reply::Analyze(Ok(populated())),
            Reply::Analyze(Err(server_error(None))),
        ]));

        c.analyze(&settings()).await;
        c.analyze(&settings()).await;

        assert_eq!(
            c.view.last_status(),
            ("Analysis failed".to_owned(), StatusKind::Error)
        );
        // stale results stay visible
        assert_eq!(c.view.log().rows.len(), 3);
        assert!(c.has_chart(ChartKind::Emotion));
    }

    #[tokio::test]
    async fn invalid_response_shape_is_reported_distinctly() {
        let shape_error = AnalysisPayload::from_value(json!({"filename": "a.wav"})).unwrap_err();
        let c = controller(FakeApi::with(vec![Reply::Analyze(Err(shape_error))]));

        c.analyze(&settings()).await;

        let (message, kind) = c.view.last_status();
        assert_eq!(kind, StatusKind::Error);
        assert!(message.starts_with("Analysis failed: invalid response shape"));
    }

    #[tokio::test]
    async fn clear_resets_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = audio_file(&dir);
        let c = controller(FakeApi::with(vec![
            Reply::Upload(Ok(UploadResponse {
                filename: "a.wav".to_owned(),
            })),
            Reply::Analyze(Ok(populated())),
            Reply::Clear(Ok(ClearResponse { deleted: 3 })),
        ]));

        c.upload(Some(path.as_path())).await;
        c.analyze(&settings()).await;
        c.clear().await;

        assert_eq!(c.uploaded_filename(), None);
        assert!(!c.has_chart(ChartKind::Emotion));
        assert!(!c.has_chart(ChartKind::Confidence));
        assert_eq!(c.download_url(), None);
        assert!(c.charts.live.lock().unwrap().is_empty());
        let log = c.view.log();
        assert!(log.rows.is_empty());
        assert!(log.raw_json.is_empty());
        assert_eq!(
            log.statuses.last().cloned().unwrap(),
            ("Cleared 3 file(s).".to_owned(), StatusKind::Success)
        );
    }

    #[tokio::test]
    async fn failed_clear_keeps_local_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = audio_file(&dir);
        let c = controller(FakeApi::with(vec![
            Reply::Upload(Ok(UploadResponse {
                filename: "a.wav".to_owned(),
            })),
            Reply::Clear(Err(server_error(Some("disk busy")))),
        ]));

        c.upload(Some(path.as_path())).await;
        c.clear().await;

        assert_eq!(c.uploaded_filename().as_deref(), Some("a.wav"));
        assert_eq!(
            c.view.last_status(),
            ("disk busy".to_owned(), StatusKind::Error)
        );
    }

    #[tokio::test]
    async fn unreadable_file_is_an_upload_error() {
        let dir = tempfile::tempdir().unwrap();
        let c = controller(FakeApi::default());

        c.upload(Some(dir.path().join("missing.wav").as_path())).await;

        assert!(c.api.calls().is_empty());
        let (message, kind) = c.view.last_status();
        assert_eq!(kind, StatusKind::Error);
        assert!(message.starts_with("Upload failed: "));
    }

    #[tokio::test]
    async fn second_upload_is_ignored_while_first_is_pending() {
        let dir = tempfile::tempdir().unwrap();
        let path = audio_file(&dir);
        let gate = Arc::new(Notify::new());
        let api = FakeApi::with(vec![Reply::Upload(Ok(UploadResponse {
            filename: "a.wav".to_owned(),
        }))])
        .gated(gate.clone());
        let c = Arc::new(controller(api));

        let first = {
            let c = c.clone();
            let path = path.clone();
            tokio::spawn(async move { c.upload(Some(path.as_path())).await })
        };
        while c.api.calls().is_empty() {
            tokio::task::yield_now().await;
        }

        c.upload(Some(path.as_path())).await;
        assert_eq!(
            c.view.last_status(),
            ("Upload already in progress.".to_owned(), StatusKind::Warn)
        );

        gate.notify_one();
        first.await.unwrap();
        assert_eq!(c.api.calls().len(), 1);
        assert_eq!(c.uploaded_filename().as_deref(), Some("a.wav"));
    }
}
