//! Executes the view machine's commands
//!
//! [`execute`] runs one command to completion on the calling thread.
//! [`Loader`] runs the same function on worker threads and hands the events
//! back through a channel the UI polls once per frame.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

use crate::data::images::{ImageLoadError, ImageService};
use crate::data::point::{ImageKind, Point};
use crate::data::service::DataService;

use super::bitmap::build_bitmaps;
use super::geometry::{BoundsTable, TileLayout};
use super::session::{Command, LoadRequest, PipelineEvent};

/// Run `command` synchronously
pub fn execute(
    command: Command,
    data: &dyn DataService,
    images: &dyn ImageService,
    layout: &TileLayout,
    workers: usize,
) -> PipelineEvent {
    match command {
        Command::FetchPoints { epoch, request } => {
            let result = match &request {
                LoadRequest::Projection { method, config_id } => data.fetch_points(method, *config_id),
                LoadRequest::Visualization { viz_id } => data.fetch_viz_config(*viz_id).and_then(|viz| {
                    log::info!("Visualization {}: {}", viz.viz_id, viz.label());
                    data.fetch_viz_points(*viz_id)
                }),
            };
            PipelineEvent::DataLoaded { epoch, result }
        }
        Command::FetchThumbnails { epoch, points } => {
            let (points, failed) = load_thumbnails(points, images, workers);
            PipelineEvent::ImagesLoaded { epoch, points, failed }
        }
        Command::BuildBitmaps { epoch, points } => {
            let mut bounds = BoundsTable::new();
            let bitmaps = build_bitmaps(&points, layout, &mut bounds);
            PipelineEvent::BitmapsBuilt {
                epoch,
                points,
                bounds,
                bitmaps,
            }
        }
        Command::FetchDetail { epoch, filename, artist } => {
            let (image, artist) = std::thread::scope(|s| {
                let image = s.spawn(|| images.load_image(&filename, ImageKind::Resized));
                let artist = data.fetch_artist(&artist);
                let image = image.join().unwrap_or_else(|_| {
                    Err(ImageLoadError::Missing {
                        filename: filename.clone(),
                        kind: ImageKind::Resized,
                    })
                });
                (image, artist)
            });
            PipelineEvent::DetailLoaded {
                epoch,
                filename,
                image,
                artist,
            }
        }
    }
}

/// Load every thumbnail with up to `workers` threads. Returns the points
/// that got one, in input order, and the filenames that did not.
pub fn load_thumbnails(
    points: Vec<Point>,
    images: &dyn ImageService,
    workers: usize,
) -> (Vec<Point>, Vec<String>) {
    let counter = AtomicUsize::new(0);
    let workers = workers.clamp(1, points.len().max(1));
    let (next, list) = (&counter, &points);

    let mut results: Vec<(usize, Result<_, ImageLoadError>)> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                s.spawn(move || {
                    let mut local = Vec::new();
                    loop {
                        let i = next.fetch_add(1, Ordering::Relaxed);
                        let Some(p) = list.get(i) else { break };
                        local.push((i, images.load_image(&p.filename, ImageKind::Thumbnail)));
                    }
                    local
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap_or_default())
            .collect()
    });
    results.sort_by_key(|(i, _)| *i);

    let mut loaded = vec![None; points.len()];
    for (i, result) in results {
        match result {
            Ok(img) => loaded[i] = Some(img),
            Err(e) => log::warn!("Thumbnail skipped: {}", e),
        }
    }

    let mut kept = Vec::with_capacity(points.len());
    let mut failed = Vec::new();
    for (mut p, img) in points.into_iter().zip(loaded) {
        match img {
            Some(img) => {
                p.thumbnail = Some(img);
                kept.push(p);
            }
            None => failed.push(p.filename),
        }
    }
    log::info!("Loaded {} thumbnails, {} failed", kept.len(), failed.len());
    (kept, failed)
}

/// Background executor
pub struct Loader {
    data: Arc<dyn DataService>,
    images: Arc<dyn ImageService>,
    layout: TileLayout,
    workers: usize,
    tx: Sender<PipelineEvent>,
    rx: Receiver<PipelineEvent>,
    repaint: Option<egui::Context>,
}

impl Loader {
    pub fn new(
        data: Arc<dyn DataService>,
        images: Arc<dyn ImageService>,
        layout: TileLayout,
        workers: usize,
    ) -> Self {
        let (tx, rx) = channel();
        Self {
            data,
            images,
            layout,
            workers,
            tx,
            rx,
            repaint: None,
        }
    }

    /// Wake the UI whenever a result arrives
    pub fn with_repaint(mut self, ctx: egui::Context) -> Self {
        self.repaint = Some(ctx);
        self
    }

    pub fn data(&self) -> &Arc<dyn DataService> {
        &self.data
    }

    pub fn set_data_service(&mut self, data: Arc<dyn DataService>) {
        self.data = data;
    }

    pub fn spawn(&self, command: Command) {
        let data = Arc::clone(&self.data);
        let images = Arc::clone(&self.images);
        let layout = self.layout.clone();
        let workers = self.workers;
        let tx = self.tx.clone();
        let repaint = self.repaint.clone();
        log::debug!("Spawning {} (epoch {})", command.name(), command.epoch());

        std::thread::spawn(move || {
            let event = execute(command, data.as_ref(), images.as_ref(), &layout, workers);
            // the receiver only goes away when the app shuts down
            let _ = tx.send(event);
            if let Some(ctx) = repaint {
                ctx.request_repaint();
            }
        });
    }

    /// Events finished since the last call
    pub fn poll(&self) -> Vec<PipelineEvent> {
        self.rx.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    use image::{Rgba, RgbaImage};

    use crate::data::point::{ArtistRecord, ConfigSummary, ImageHandle, Tier, VizConfig};
    use crate::data::service::DataError;
    use crate::gui::interaction::ViewportRect;
    use crate::gui::viewport::Transform;
    use crate::pipeline::session::{LoadError, ViewMachine, ViewState};

    struct MockData {
        points: Vec<Point>,
        fail: bool,
        calls: Mutex<Vec<String>>,
    }

    impl MockData {
        fn three() -> Self {
            Self {
                points: vec![
                    Point::new("a.jpg", "Claude Monet", 0.0, 0.0),
                    Point::new("b.jpg", "Edgar Degas", 10.0, 10.0),
                    Point::new("c.jpg", "Paul Cezanne", 10.0, 0.0),
                ],
                fail: false,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl DataService for MockData {
        fn fetch_configs(&self, _method: &str) -> Result<Vec<ConfigSummary>, DataError> {
            Ok(Vec::new())
        }

        fn fetch_points(&self, method: &str, config_id: i64) -> Result<Vec<Point>, DataError> {
            self.calls.lock().unwrap().push(format!("{}/{}", method, config_id));
            if self.fail {
                return Err(DataError::NotFound(format!("{} config {}", method, config_id)));
            }
            Ok(self.points.clone())
        }

        fn fetch_viz_list(&self) -> Result<Vec<VizConfig>, DataError> {
            Ok(Vec::new())
        }

        fn fetch_viz_config(&self, viz_id: i64) -> Result<VizConfig, DataError> {
            Ok(VizConfig {
                viz_id,
                method: "umap".into(),
                config_id: 7,
                filename: None,
                name: None,
            })
        }

        fn fetch_viz_points(&self, _viz_id: i64) -> Result<Vec<Point>, DataError> {
            Ok(self.points[..1].to_vec())
        }

        fn fetch_artist(&self, name: &str) -> Result<Option<ArtistRecord>, DataError> {
            Ok(Some(ArtistRecord {
                name: name.to_string(),
                genre: Some("Impressionism".into()),
                ..Default::default()
            }))
        }
    }

    struct MockImages {
        missing: HashSet<String>,
    }

    impl MockImages {
        fn all() -> Self {
            Self { missing: HashSet::new() }
        }

        fn without(name: &str) -> Self {
            Self {
                missing: [name.to_string()].into_iter().collect(),
            }
        }
    }

    impl ImageService for MockImages {
        fn load_image(&self, filename: &str, kind: ImageKind) -> Result<ImageHandle, ImageLoadError> {
            if self.missing.contains(filename) {
                return Err(ImageLoadError::Missing {
                    filename: filename.to_string(),
                    kind,
                });
            }
            Ok(Arc::new(RgbaImage::from_pixel(8, 8, Rgba([0, 200, 0, 255]))))
        }
    }

    fn layout() -> TileLayout {
        TileLayout {
            max_bitmap_size: 400,
            padding: 40.0,
            thumbnail_size: 32.0,
            shrink_threshold: 4000,
        }
    }

    fn umap7() -> LoadRequest {
        LoadRequest::Projection {
            method: "umap".into(),
            config_id: 7,
        }
    }

    /// Drive commands until the machine stops asking for work
    fn run(
        machine: &mut ViewMachine,
        first: Command,
        data: &dyn DataService,
        images: &dyn ImageService,
    ) -> Result<(), LoadError> {
        let mut next = Some(first);
        while let Some(cmd) = next {
            let event = execute(cmd, data, images, &layout(), 2);
            next = machine.apply(event)?;
        }
        Ok(())
    }

    fn loaded_machine(images: &MockImages) -> ViewMachine {
        let data = MockData::three();
        let mut m = ViewMachine::new(400.0);
        m.set_viewport_size(400.0, 400.0);
        let cmd = m.begin_load(umap7()).unwrap();
        run(&mut m, cmd, &data, images).unwrap();
        m
    }

    #[test]
    fn test_load_reaches_viewing_with_all_points() {
        let m = loaded_machine(&MockImages::all());
        assert_eq!(m.state(), ViewState::Viewing);
        assert_eq!(m.points().len(), 3);
        let session = m.session().unwrap();
        assert_eq!(session.bitmaps.full.drawn, 3);
        assert_eq!(session.bitmaps.half.drawn, 3);
        assert_eq!(session.bounds.count(Tier::Full), 3);
        assert_eq!(session.bounds.count(Tier::Half), 3);
        assert_eq!(m.overlay().len(), 3);
    }

    #[test]
    fn test_failed_thumbnail_drops_only_that_point() {
        let m = loaded_machine(&MockImages::without("b.jpg"));
        assert_eq!(m.state(), ViewState::Viewing);
        let names: Vec<_> = m.points().iter().map(|p| p.filename.as_str()).collect();
        assert_eq!(names, vec!["a.jpg", "c.jpg"]);
        assert_eq!(m.session().unwrap().failed, vec!["b.jpg".to_string()]);
    }

    #[test]
    fn test_click_inside_tile_opens_detail() {
        let images = MockImages::all();
        let data = MockData::three();
        let mut m = loaded_machine(&images);
        assert_eq!(m.transform(), Transform { k: 1.0, x: 0.0, y: 0.0 });

        let a = *m.session().unwrap().bounds.get("a.jpg", Tier::Full).unwrap();
        let (cx, cy) = a.center();
        // canvas placed at (30, 50) on screen
        let viewport = ViewportRect::new(30.0, 50.0, 400.0, 400.0);
        let cmd = m.click(cx + 30.0, cy + 50.0, &viewport).unwrap();
        assert_eq!(m.state(), ViewState::Detail);
        assert_eq!(m.selected().unwrap().filename, "a.jpg");

        run(&mut m, cmd, &data, &images).unwrap();
        let detail = m.detail().unwrap();
        assert!(!detail.loading);
        assert!(detail.image.is_some());
        assert_eq!(detail.artist.as_ref().unwrap().name, "Claude Monet");
    }

    #[test]
    fn test_click_far_from_tiles_stays_viewing() {
        let mut m = loaded_machine(&MockImages::all());
        let viewport = ViewportRect::new(0.0, 0.0, 400.0, 400.0);
        assert!(m.click(200.0, 100.0, &viewport).is_none());
        assert_eq!(m.state(), ViewState::Viewing);
    }

    #[test]
    fn test_escape_from_detail_restores_fit() {
        let mut m = loaded_machine(&MockImages::all());
        let viewport = ViewportRect::new(0.0, 0.0, 400.0, 400.0);
        let a = *m.session().unwrap().bounds.get("a.jpg", Tier::Full).unwrap();
        let (cx, cy) = a.center();
        m.click(cx, cy, &viewport).unwrap();
        m.gesture(crate::gui::viewport::Gesture::Drag { dx: 25.0, dy: -5.0 });
        m.gesture(crate::gui::viewport::Gesture::Pinch { factor: 2.0, at: (10.0, 10.0) });
        assert_eq!(m.active_tier(), Tier::Half);

        let t = m.escape();
        assert_eq!(m.state(), ViewState::Viewing);
        assert_eq!(t, Transform { k: m.fit_scale(), x: 0.0, y: 0.0 });
        assert!(m.detail().is_none());
    }

    #[test]
    fn test_stale_load_results_never_apply() {
        let data = MockData::three();
        let images = MockImages::all();
        let mut m = ViewMachine::new(400.0);

        let old = m.begin_load(umap7()).unwrap();
        let fresh = m
            .begin_load(LoadRequest::Visualization { viz_id: 1 })
            .unwrap();

        // the old fetch completes after the new load started
        let stale = execute(old, &data, &images, &layout(), 2);
        assert!(m.apply(stale).unwrap().is_none());
        assert_eq!(m.state(), ViewState::LoadingData);

        run(&mut m, fresh, &data, &images).unwrap();
        assert_eq!(m.points().len(), 1);
        assert_eq!(
            m.session().unwrap().request,
            LoadRequest::Visualization { viz_id: 1 }
        );
    }

    #[test]
    fn test_data_failure_keeps_prior_session() {
        let images = MockImages::all();
        let mut m = loaded_machine(&images);
        let before = m.session().unwrap().epoch;

        let failing = MockData {
            fail: true,
            ..MockData::three()
        };
        let cmd = m.begin_load(umap7()).unwrap();
        let err = run(&mut m, cmd, &failing, &images).unwrap_err();
        assert!(matches!(err, LoadError::Data(DataError::NotFound(_))));
        assert_eq!(m.state(), ViewState::Viewing);
        assert_eq!(m.session().unwrap().epoch, before);
        assert_eq!(m.points().len(), 3);
        assert_eq!(*failing.calls.lock().unwrap(), vec!["umap/7".to_string()]);
    }

    #[test]
    fn test_thumbnails_keep_catalog_order_with_many_workers() {
        let points: Vec<_> = (0..50)
            .map(|i| Point::new(&format!("{}.jpg", i), "A", i as f64, 0.0))
            .collect();
        let (kept, failed) = load_thumbnails(points, &MockImages::without("17.jpg"), 8);
        assert_eq!(kept.len(), 49);
        assert_eq!(failed, vec!["17.jpg".to_string()]);
        assert!(kept.windows(2).all(|w| w[0].x < w[1].x));
    }

    #[test]
    fn test_loader_delivers_events_through_channel() {
        let loader = Loader::new(
            Arc::new(MockData::three()),
            Arc::new(MockImages::all()),
            layout(),
            2,
        );
        let mut m = ViewMachine::new(400.0);
        loader.spawn(m.begin_load(umap7()).unwrap());

        let mut events = Vec::new();
        for _ in 0..200 {
            events.extend(loader.poll());
            if !events.is_empty() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert_eq!(events.len(), 1);
        let next = m.apply(events.remove(0)).unwrap();
        assert!(matches!(next, Some(Command::FetchThumbnails { .. })));
        assert_eq!(m.state(), ViewState::LoadingImages);
    }

    #[test]
    fn test_click_in_detail_selects_from_half_bitmap() {
        let images = MockImages::all();
        let data = MockData::three();
        let mut m = loaded_machine(&images);
        let viewport = ViewportRect::new(0.0, 0.0, 400.0, 400.0);

        let (ax, ay) = m.session().unwrap().bounds.get("a.jpg", Tier::Full).unwrap().center();
        m.click(ax, ay, &viewport).unwrap();
        assert_eq!(m.active_tier(), Tier::Half);

        let (bx, by) = m.session().unwrap().bounds.get("b.jpg", Tier::Half).unwrap().center();
        let cmd = m.click(bx, by, &viewport).unwrap();
        assert!(matches!(&cmd, Command::FetchDetail { filename, .. } if filename == "b.jpg"));
        assert_eq!(m.state(), ViewState::Detail);
        assert_eq!(m.selected().unwrap().filename, "b.jpg");
        assert!(m.detail().unwrap().loading);

        run(&mut m, cmd, &data, &images).unwrap();
        assert_eq!(m.detail().unwrap().artist.as_ref().unwrap().name, "Edgar Degas");
    }

    #[test]
    fn test_failed_reload_during_detail_fetch_returns_to_viewing() {
        let images = MockImages::all();
        let data = MockData::three();
        let mut m = loaded_machine(&images);
        let viewport = ViewportRect::new(0.0, 0.0, 400.0, 400.0);
        let (ax, ay) = m.session().unwrap().bounds.get("a.jpg", Tier::Full).unwrap().center();
        let detail_cmd = m.click(ax, ay, &viewport).unwrap();

        let reload = m.begin_load(umap7()).unwrap();
        assert!(m.detail().is_none());

        // the detail fetch finishes under the old epoch
        let late = execute(detail_cmd, &data, &images, &layout(), 2);
        assert!(m.apply(late).unwrap().is_none());

        let failing = MockData {
            fail: true,
            ..MockData::three()
        };
        assert!(run(&mut m, reload, &failing, &images).is_err());
        assert_eq!(m.state(), ViewState::Viewing);
        assert!(m.detail().is_none());
        assert_eq!(m.points().len(), 3);
    }

    #[test]
    fn test_only_interactive_states_repaint() {
        let images = MockImages::all();
        let data = MockData::three();
        let mut m = ViewMachine::new(400.0);
        m.set_viewport_size(400.0, 400.0);
        let start = m.repaint_count();

        // LoadingData -> LoadingImages -> CreatingBitmaps: no repaint
        let mut next = Some(m.begin_load(umap7()).unwrap());
        assert_eq!(m.repaint_count(), start);
        let mut seen = Vec::new();
        while let Some(cmd) = next {
            let event = execute(cmd, &data, &images, &layout(), 2);
            next = m.apply(event).unwrap();
            seen.push((m.state(), m.repaint_count()));
        }
        assert_eq!(
            seen,
            vec![
                (ViewState::LoadingImages, start),
                (ViewState::CreatingBitmaps, start),
                (ViewState::Viewing, start + 1),
            ]
        );

        let viewport = ViewportRect::new(0.0, 0.0, 400.0, 400.0);
        let (ax, ay) = m.session().unwrap().bounds.get("a.jpg", Tier::Full).unwrap().center();
        m.click(ax, ay, &viewport).unwrap();
        assert_eq!(m.repaint_count(), start + 2);
        m.close_detail();
        assert_eq!(m.state(), ViewState::Viewing);
        assert_eq!(m.repaint_count(), start + 3);

        m.begin_load(umap7()).unwrap();
        assert_eq!(m.repaint_count(), start + 3);
    }
}
