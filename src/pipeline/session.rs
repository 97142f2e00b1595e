//! View state machine
//!
//! A load walks `LoadingData → LoadingImages → CreatingBitmaps → Viewing`,
//! and `Viewing ⇄ Detail` afterwards. The machine never does I/O itself:
//! every transition that needs work returns a [`Command`], and the result
//! comes back as a [`PipelineEvent`] tagged with the epoch it was issued
//! under. Events from an older epoch are dropped.

use thiserror::Error;

use crate::data::images::ImageLoadError;
use crate::data::point::{ArtistRecord, ImageHandle, Point, Tier};
use crate::data::service::{validate_method, DataError};
use crate::gui::interaction::{hit_test, ViewportRect};
use crate::gui::viewport::{get_fit_scale, overlay_markers, Gesture, Transform, ViewportController};

use super::bitmap::{Bitmap, BitmapPair};
use super::geometry::BoundsTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    LoadingData,
    LoadingImages,
    CreatingBitmaps,
    Viewing,
    Detail,
}

impl std::fmt::Display for ViewState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ViewState::LoadingData => "LoadingData",
            ViewState::LoadingImages => "LoadingImages",
            ViewState::CreatingBitmaps => "CreatingBitmaps",
            ViewState::Viewing => "Viewing",
            ViewState::Detail => "Detail",
        };
        f.write_str(name)
    }
}

impl ViewState {
    pub fn is_interactive(&self) -> bool {
        matches!(self, ViewState::Viewing | ViewState::Detail)
    }

    /// Human-readable progress text for the status line
    pub fn status_text(&self) -> &'static str {
        match self {
            ViewState::LoadingData => "Loading data…",
            ViewState::LoadingImages => "Loading images…",
            ViewState::CreatingBitmaps => "Creating bitmaps…",
            ViewState::Viewing => "Ready",
            ViewState::Detail => "Showing artist details",
        }
    }
}

/// What to load
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadRequest {
    Projection { method: String, config_id: i64 },
    Visualization { viz_id: i64 },
}

impl std::fmt::Display for LoadRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadRequest::Projection { method, config_id } => write!(f, "{} config {}", method, config_id),
            LoadRequest::Visualization { viz_id } => write!(f, "visualization {}", viz_id),
        }
    }
}

impl LoadRequest {
    fn validate(&self) -> Result<(), LoadError> {
        match self {
            LoadRequest::Projection { method, config_id } => {
                if method.trim().is_empty() {
                    return Err(LoadError::MissingSelection("method"));
                }
                validate_method(method).map_err(|_| LoadError::InvalidRequest(format!("unknown method '{}'", method)))?;
                if *config_id < 0 {
                    return Err(LoadError::InvalidRequest(format!("invalid config id {}", config_id)));
                }
            }
            LoadRequest::Visualization { viz_id } => {
                if *viz_id < 0 {
                    return Err(LoadError::InvalidRequest(format!("invalid visualization id {}", viz_id)));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("please select a {0} first")]
    MissingSelection(&'static str),
    #[error("{0}")]
    InvalidRequest(String),
    #[error("failed to load data: {0}")]
    Data(#[from] DataError),
}

/// Work the machine asks its executor to do
#[derive(Debug, Clone)]
pub enum Command {
    FetchPoints { epoch: u64, request: LoadRequest },
    FetchThumbnails { epoch: u64, points: Vec<Point> },
    BuildBitmaps { epoch: u64, points: Vec<Point> },
    FetchDetail { epoch: u64, filename: String, artist: String },
}

impl Command {
    pub fn epoch(&self) -> u64 {
        match self {
            Command::FetchPoints { epoch, .. }
            | Command::FetchThumbnails { epoch, .. }
            | Command::BuildBitmaps { epoch, .. }
            | Command::FetchDetail { epoch, .. } => *epoch,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::FetchPoints { .. } => "fetch points",
            Command::FetchThumbnails { .. } => "fetch thumbnails",
            Command::BuildBitmaps { .. } => "build bitmaps",
            Command::FetchDetail { .. } => "fetch detail",
        }
    }
}

/// Result of a [`Command`]
#[derive(Debug)]
pub enum PipelineEvent {
    DataLoaded {
        epoch: u64,
        result: Result<Vec<Point>, DataError>,
    },
    /// `points` holds only the points whose thumbnail decoded
    ImagesLoaded {
        epoch: u64,
        points: Vec<Point>,
        failed: Vec<String>,
    },
    BitmapsBuilt {
        epoch: u64,
        points: Vec<Point>,
        bounds: BoundsTable,
        bitmaps: BitmapPair,
    },
    DetailLoaded {
        epoch: u64,
        filename: String,
        image: Result<ImageHandle, ImageLoadError>,
        artist: Result<Option<ArtistRecord>, DataError>,
    },
}

impl PipelineEvent {
    pub fn epoch(&self) -> u64 {
        match self {
            PipelineEvent::DataLoaded { epoch, .. }
            | PipelineEvent::ImagesLoaded { epoch, .. }
            | PipelineEvent::BitmapsBuilt { epoch, .. }
            | PipelineEvent::DetailLoaded { epoch, .. } => *epoch,
        }
    }
}

/// Everything one completed load produced
#[derive(Debug)]
pub struct Session {
    pub epoch: u64,
    pub request: LoadRequest,
    /// Interactive points, in catalog order
    pub points: Vec<Point>,
    pub bounds: BoundsTable,
    pub bitmaps: BitmapPair,
    /// Filenames whose thumbnail failed to load
    pub failed: Vec<String>,
}

/// Contents of the detail pane
#[derive(Debug, Clone)]
pub struct DetailData {
    pub point: Point,
    pub image: Option<ImageHandle>,
    pub artist: Option<ArtistRecord>,
    pub loading: bool,
    pub error: Option<String>,
}

impl DetailData {
    fn pending(point: Point) -> Self {
        Self {
            point,
            image: None,
            artist: None,
            loading: true,
            error: None,
        }
    }
}

/// In-flight load bookkeeping
#[derive(Debug)]
struct PendingLoad {
    request: LoadRequest,
    /// State to return to if the load fails
    resume: ViewState,
    failed: Vec<String>,
}

#[derive(Debug)]
pub struct ViewMachine {
    epoch: u64,
    state: ViewState,
    pending: Option<PendingLoad>,
    session: Option<Session>,
    detail: Option<DetailData>,
    viewport: ViewportController,
    viewport_size: (f64, f64),
    /// Edge of the square content used for the fit scale
    content_size: f64,
    repaints: u64,
    overlay: Vec<(f64, f64)>,
}

impl ViewMachine {
    pub fn new(content_size: f64) -> Self {
        Self {
            epoch: 0,
            state: ViewState::LoadingData,
            pending: None,
            session: None,
            detail: None,
            viewport: ViewportController::new(),
            viewport_size: (800.0, 600.0),
            content_size: content_size.max(1.0),
            repaints: 0,
            overlay: Vec::new(),
        }
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn points(&self) -> &[Point] {
        self.session.as_ref().map(|s| s.points.as_slice()).unwrap_or(&[])
    }

    pub fn detail(&self) -> Option<&DetailData> {
        self.detail.as_ref()
    }

    pub fn selected(&self) -> Option<&Point> {
        self.detail.as_ref().map(|d| &d.point)
    }

    pub fn transform(&self) -> Transform {
        self.viewport.transform()
    }

    /// Incremented on every view repaint (entering `Viewing`/`Detail`, gestures)
    pub fn repaint_count(&self) -> u64 {
        self.repaints
    }

    /// Viewport-local marker positions for the active tier
    pub fn overlay(&self) -> &[(f64, f64)] {
        &self.overlay
    }

    /// `Half` while the detail pane is open, else `Full`
    pub fn active_tier(&self) -> Tier {
        match self.state {
            ViewState::Detail => Tier::Half,
            _ => Tier::Full,
        }
    }

    pub fn active_bitmap(&self) -> Option<&Bitmap> {
        let tier = self.active_tier();
        self.session.as_ref().map(|s| s.bitmaps.get(tier))
    }

    pub fn fit_scale(&self) -> f64 {
        get_fit_scale(self.viewport_size, self.content_size, self.content_size)
    }

    pub fn set_viewport_size(&mut self, width: f64, height: f64) {
        if width > 0.0 && height > 0.0 && (width, height) != self.viewport_size {
            self.viewport_size = (width, height);
        }
    }

    /// Start a new load, superseding any load still in flight. User-input
    /// errors are returned before anything changes.
    pub fn begin_load(&mut self, request: LoadRequest) -> Result<Command, LoadError> {
        request.validate()?;

        let resume = match &self.pending {
            Some(p) => p.resume,
            None => self.state,
        };
        // an open detail's fetch belongs to the old epoch and would never land
        let resume = match resume {
            ViewState::Detail => ViewState::Viewing,
            other => other,
        };
        self.detail = None;
        self.epoch += 1;
        log::info!("Loading {} (epoch {})", request, self.epoch);
        self.pending = Some(PendingLoad {
            request: request.clone(),
            resume,
            failed: Vec::new(),
        });
        self.transition(ViewState::LoadingData);
        Ok(Command::FetchPoints {
            epoch: self.epoch,
            request,
        })
    }

    /// Forget the current session and any load in flight
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.pending = None;
        self.session = None;
        self.detail = None;
        self.overlay.clear();
        self.transition(ViewState::LoadingData);
        let fit = self.fit_scale();
        self.viewport.reset_zoom(fit);
    }

    /// Feed back the outcome of a command. A data failure aborts the load
    /// and restores the state the machine was in before it started.
    pub fn apply(&mut self, event: PipelineEvent) -> Result<Option<Command>, LoadError> {
        if event.epoch() != self.epoch {
            log::debug!(
                "Discarding stale result from epoch {} (current {})",
                event.epoch(),
                self.epoch
            );
            return Ok(None);
        }

        match (self.state, event) {
            (ViewState::LoadingData, PipelineEvent::DataLoaded { epoch, result }) => match result {
                Ok(points) => {
                    log::info!("Fetched {} points", points.len());
                    self.transition(ViewState::LoadingImages);
                    Ok(Some(Command::FetchThumbnails { epoch, points }))
                }
                Err(e) => {
                    log::error!("Load aborted: {}", e);
                    let resume = self.pending.take().map_or(ViewState::LoadingData, |p| p.resume);
                    self.transition(resume);
                    Err(LoadError::Data(e))
                }
            },
            (ViewState::LoadingImages, PipelineEvent::ImagesLoaded { epoch, points, failed }) => {
                if !failed.is_empty() {
                    log::warn!("{} thumbnails failed, {} points kept", failed.len(), points.len());
                }
                if let Some(p) = self.pending.as_mut() {
                    p.failed = failed;
                }
                self.transition(ViewState::CreatingBitmaps);
                Ok(Some(Command::BuildBitmaps { epoch, points }))
            }
            (
                ViewState::CreatingBitmaps,
                PipelineEvent::BitmapsBuilt {
                    epoch,
                    points,
                    bounds,
                    bitmaps,
                },
            ) => {
                let Some(pending) = self.pending.take() else {
                    log::debug!("Bitmaps arrived with no load pending");
                    return Ok(None);
                };
                self.session = Some(Session {
                    epoch,
                    request: pending.request,
                    points,
                    bounds,
                    bitmaps,
                    failed: pending.failed,
                });
                self.detail = None;
                let fit = self.fit_scale();
                self.viewport.reset_zoom(fit);
                self.transition(ViewState::Viewing);
                Ok(None)
            }
            (
                ViewState::Detail,
                PipelineEvent::DetailLoaded {
                    filename,
                    image,
                    artist,
                    ..
                },
            ) => {
                let Some(detail) = self.detail.as_mut().filter(|d| d.point.filename == filename) else {
                    log::debug!("Discarding detail for {}, no longer selected", filename);
                    return Ok(None);
                };
                detail.loading = false;
                let mut errors = Vec::new();
                match image {
                    Ok(img) => detail.image = Some(img),
                    Err(e) => {
                        log::warn!("{}", e);
                        errors.push(e.to_string());
                    }
                }
                match artist {
                    Ok(record) => detail.artist = record,
                    Err(e) => {
                        log::warn!("Artist lookup for {} failed: {}", detail.point.artist, e);
                        errors.push(e.to_string());
                    }
                }
                if !errors.is_empty() {
                    detail.error = Some(errors.join("; "));
                }
                Ok(None)
            }
            (state, event) => {
                log::debug!("Ignoring {} result in state {}", event_name(&event), state);
                Ok(None)
            }
        }
    }

    /// A canvas click at client coordinates. In `Viewing` or `Detail`, a hit
    /// selects that point against the bitmap on screen and returns the fetch
    /// for its detail pane.
    pub fn click(&mut self, client_x: f64, client_y: f64, viewport: &ViewportRect) -> Option<Command> {
        if !self.state.is_interactive() {
            return None;
        }
        let tier = self.active_tier();
        let session = self.session.as_ref()?;
        let transform = self.viewport.transform();
        let point = hit_test(
            &session.points,
            client_x,
            client_y,
            viewport,
            &transform,
            &session.bounds,
            tier,
        )?
        .clone();

        log::info!("Selected {} by {}", point.filename, point.artist);
        let command = Command::FetchDetail {
            epoch: self.epoch,
            filename: point.filename.clone(),
            artist: point.artist.clone(),
        };
        self.detail = Some(DetailData::pending(point));
        if self.state == ViewState::Detail {
            // already split; the new selection only swaps the pane contents
            self.rerender();
        } else {
            self.transition(ViewState::Detail);
        }
        Some(command)
    }

    pub fn close_detail(&mut self) {
        if self.state == ViewState::Detail {
            self.detail = None;
            self.transition(ViewState::Viewing);
        }
    }

    /// Close the detail pane if open, and reset the transform to the fit
    /// scale in any state.
    pub fn escape(&mut self) -> Transform {
        let fit = self.fit_scale();
        let transform = self.viewport.reset_zoom(fit);
        match self.state {
            ViewState::Detail | ViewState::Viewing => {
                self.detail = None;
                self.transition(ViewState::Viewing);
            }
            _ => {}
        }
        transform
    }

    pub fn gesture(&mut self, gesture: Gesture) -> Transform {
        let t = self.viewport.apply_gesture(gesture);
        self.rerender();
        t
    }

    /// Let egui input drive the transform directly
    pub fn handle_response(&mut self, ui: &egui::Ui, response: &egui::Response) {
        let mut changed = false;
        self.viewport.handle_response(ui, response, |_| changed = true);
        if changed {
            self.rerender();
        }
    }

    fn transition(&mut self, to: ViewState) {
        log::info!("State: {} → {}", self.state, to);
        self.state = to;
        if to.is_interactive() {
            self.rerender();
        }
    }

    fn rerender(&mut self) {
        self.repaints += 1;
        let tier = self.active_tier();
        let transform = self.viewport.transform();
        self.overlay = match &self.session {
            Some(s) => overlay_markers(&s.points, &s.bounds, tier, &transform),
            None => Vec::new(),
        };
    }
}

fn event_name(event: &PipelineEvent) -> &'static str {
    match event {
        PipelineEvent::DataLoaded { .. } => "DataLoaded",
        PipelineEvent::ImagesLoaded { .. } => "ImagesLoaded",
        PipelineEvent::BitmapsBuilt { .. } => "BitmapsBuilt",
        PipelineEvent::DetailLoaded { .. } => "DetailLoaded",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn projection() -> LoadRequest {
        LoadRequest::Projection {
            method: "umap".into(),
            config_id: 7,
        }
    }

    #[test]
    fn test_user_input_errors_change_nothing() {
        let mut m = ViewMachine::new(4096.0);
        let before = m.epoch();
        let err = m
            .begin_load(LoadRequest::Projection {
                method: "".into(),
                config_id: 7,
            })
            .unwrap_err();
        assert!(matches!(err, LoadError::MissingSelection(_)));
        let err = m
            .begin_load(LoadRequest::Projection {
                method: "umap; drop table".into(),
                config_id: 7,
            })
            .unwrap_err();
        assert!(matches!(err, LoadError::InvalidRequest(_)));
        assert_eq!(m.epoch(), before);
        assert!(!m.is_loading());
    }

    #[test]
    fn test_new_load_bumps_epoch() {
        let mut m = ViewMachine::new(4096.0);
        let first = m.begin_load(projection()).unwrap();
        let second = m.begin_load(projection()).unwrap();
        assert_eq!(second.epoch(), first.epoch() + 1);
        assert_eq!(m.state(), ViewState::LoadingData);
    }

    #[test]
    fn test_stale_event_is_dropped() {
        let mut m = ViewMachine::new(4096.0);
        let stale = m.begin_load(projection()).unwrap().epoch();
        m.begin_load(projection()).unwrap();

        let next = m
            .apply(PipelineEvent::DataLoaded {
                epoch: stale,
                result: Ok(vec![Point::new("a.jpg", "A", 0.0, 0.0)]),
            })
            .unwrap();
        assert!(next.is_none());
        assert_eq!(m.state(), ViewState::LoadingData);
    }

    #[test]
    fn test_data_failure_surfaces_error() {
        let mut m = ViewMachine::new(4096.0);
        let epoch = m.begin_load(projection()).unwrap().epoch();
        let err = m
            .apply(PipelineEvent::DataLoaded {
                epoch,
                result: Err(DataError::NotFound("umap config 7".into())),
            })
            .unwrap_err();
        assert!(matches!(err, LoadError::Data(_)));
        assert!(!m.is_loading());
        assert!(m.session().is_none());
    }

    #[test]
    fn test_escape_resets_before_any_load() {
        let mut m = ViewMachine::new(1000.0);
        m.set_viewport_size(500.0, 250.0);
        m.gesture(Gesture::Drag { dx: 30.0, dy: 30.0 });
        let t = m.escape();
        assert_eq!(t, Transform { k: 0.25, x: 0.0, y: 0.0 });
        assert_eq!(m.state(), ViewState::LoadingData);
    }

    #[test]
    fn test_click_outside_viewing_is_ignored() {
        let mut m = ViewMachine::new(4096.0);
        m.begin_load(projection()).unwrap();
        assert!(m.click(10.0, 10.0, &ViewportRect::new(0.0, 0.0, 800.0, 600.0)).is_none());
        assert_eq!(m.state(), ViewState::LoadingData);
    }
}
