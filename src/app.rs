//! Main application state and eframe::App implementation
//!
//! Ties together all subsystems: data, pipeline, GUI, and run history.

use std::path::Path;
use std::sync::Arc;

use eframe::egui;

use crate::config::AppConfig;
use crate::data::images::FsImageService;
use crate::data::schema::Registry;
use crate::data::service::{DataService, SqliteDataService};
use crate::gui::control_panel::{self, ControlPanelAction, ControlPanelState};
use crate::gui::details::{self, DetailsAction, DetailsState};
use crate::gui::explorer_view::{self, ExplorerAction, ExplorerViewState};
use crate::gui::form::FormState;
use crate::gui::toolbar::{self, ToolbarAction, ToolbarState};
use crate::log::run_history::RunHistory;
use crate::pipeline::command::{check_python_available, ScriptCommand, ScriptRequest, ScriptRunner};
use crate::pipeline::loader::Loader;
use crate::pipeline::session::{ViewMachine, ViewState};

/// The main application
pub struct ExplorerApp {
    config: AppConfig,

    /// None until a database opens
    loader: Option<Loader>,
    machine: ViewMachine,
    /// Description of the load in flight, for the run history
    pending_load: Option<String>,

    runner: ScriptRunner,
    history: RunHistory,

    /// GUI sub-states
    form: FormState<'static>,
    toolbar_state: ToolbarState,
    control_state: ControlPanelState,
    explorer_state: ExplorerViewState,
    details_state: DetailsState,

    status_message: String,
    status_is_error: bool,
    show_log_window: bool,
    show_about: bool,

    ctx: egui::Context,
}

impl ExplorerApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: AppConfig) -> Self {
        let registry = Registry::global();
        if let Err(errors) = registry.validate() {
            for e in &errors {
                log::error!("Schema: {}", e);
            }
        }

        let mut app = Self {
            machine: ViewMachine::new(config.max_bitmap_size as f64),
            loader: None,
            pending_load: None,
            runner: ScriptRunner::default(),
            history: RunHistory::new(),
            form: FormState::new(registry),
            toolbar_state: ToolbarState::default(),
            control_state: ControlPanelState::default(),
            explorer_state: ExplorerViewState::new(),
            details_state: DetailsState::default(),
            status_message: "Ready".to_string(),
            status_is_error: false,
            show_log_window: false,
            show_about: false,
            ctx: cc.egui_ctx.clone(),
            config,
        };

        let db = app.config.database_path.clone();
        app.open_database(&db);
        app
    }

    fn set_status(&mut self, message: String, is_error: bool) {
        if is_error {
            log::error!("{}", message);
        } else {
            log::info!("{}", message);
        }
        self.status_message = message;
        self.status_is_error = is_error;
    }

    /// Swap the catalog; any loaded session belongs to the old one
    fn open_database(&mut self, path: &Path) {
        let data: Arc<dyn DataService> = match SqliteDataService::open(path) {
            Ok(service) => Arc::new(service),
            Err(e) => {
                self.set_status(format!("Cannot open {}: {}", path.display(), e), true);
                return;
            }
        };

        match &mut self.loader {
            Some(loader) => loader.set_data_service(data),
            None => {
                let images = Arc::new(FsImageService::new(&self.config.assets_dir));
                self.loader = Some(
                    Loader::new(data, images, self.config.tile_layout(), self.config.image_workers)
                        .with_repaint(self.ctx.clone()),
                );
            }
        }

        self.machine.reset();
        self.pending_load = None;
        self.details_state.clear();
        self.config.database_path = path.to_path_buf();
        self.history.set_database(&path.display().to_string());
        self.toolbar_state.configs_for = None;
        self.refresh_viz_list();
        self.set_status(format!("Opened {}", path.display()), false);
    }

    fn refresh_viz_list(&mut self) {
        let Some(loader) = &self.loader else { return };
        match loader.data().fetch_viz_list() {
            Ok(list) => self.toolbar_state.set_viz_list(list),
            Err(e) => {
                self.toolbar_state.set_viz_list(Vec::new());
                self.set_status(format!("Cannot list visualizations: {}", e), true);
            }
        }
    }

    /// Fetch the configuration list when the chosen method changed
    fn refresh_configs_if_stale(&mut self) {
        if !self.toolbar_state.configs_stale() {
            return;
        }
        let Some(loader) = &self.loader else { return };
        let method = self.toolbar_state.method.clone();
        match loader.data().fetch_configs(&method) {
            Ok(configs) => self.toolbar_state.set_configs(&method, configs),
            Err(e) => {
                // still mark the list as fetched so the query is not retried every frame
                self.toolbar_state.set_configs(&method, Vec::new());
                self.set_status(format!("Cannot list configurations for {}: {}", method, e), true);
            }
        }
    }

    fn start_load(&mut self) {
        let request = match self.toolbar_state.request() {
            Ok(request) => request,
            Err(e) => {
                self.set_status(e.to_string(), true);
                return;
            }
        };
        let Some(loader) = &self.loader else {
            self.set_status("No database open".to_string(), true);
            return;
        };
        let description = request.to_string();
        match self.machine.begin_load(request) {
            Ok(command) => {
                loader.spawn(command);
                self.details_state.clear();
                self.pending_load = Some(description.clone());
                self.set_status(format!("Loading {}…", description), false);
            }
            Err(e) => self.set_status(e.to_string(), true),
        }
    }

    /// Feed finished background work into the state machine
    fn poll_loader(&mut self) {
        let Some(loader) = &self.loader else { return };
        let mut outcomes = Vec::new();
        for event in loader.poll() {
            let was_loading = self.machine.is_loading();
            match self.machine.apply(event) {
                Ok(Some(command)) => loader.spawn(command),
                Ok(None) => {
                    if was_loading && !self.machine.is_loading() {
                        if let Some(session) = self.machine.session() {
                            outcomes.push((session.request.to_string(), Ok((session.points.len(), session.failed.len()))));
                        }
                    }
                }
                Err(e) => outcomes.push((self.pending_load.clone().unwrap_or_default(), Err(e.to_string()))),
            }
        }

        for (description, outcome) in outcomes {
            self.pending_load = None;
            match outcome {
                Ok((points, failed)) => {
                    self.history.record_load(&description, Ok(points));
                    let message = if failed > 0 {
                        format!("Loaded {}: {} points ({} images missing)", description, points, failed)
                    } else {
                        format!("Loaded {}: {} points", description, points)
                    };
                    self.set_status(message, false);
                }
                Err(e) => {
                    self.history.record_load(&description, Err(e.clone()));
                    self.set_status(format!("Load failed: {}", e), true);
                }
            }
        }
    }

    fn poll_runner(&mut self) {
        let Some((command, result)) = self.runner.poll() else { return };
        self.history.record_run(&command, &result);
        match &result {
            Ok(r) if r.success => {
                // a run usually adds a configuration
                self.toolbar_state.configs_for = None;
                self.set_status(format!("{}: {}", command.description, r.message()), false);
            }
            Ok(r) => self.set_status(format!("{} failed: {}", command.description, r.summary()), true),
            Err(e) => self.set_status(format!("{} failed: {}", command.description, e), true),
        }
    }

    fn start_run(&mut self, module: &str, preset: &str) {
        let request = ScriptRequest::new(module, preset);
        let command = match ScriptCommand::for_request(&self.config.python, &self.config.runner_script, &request) {
            Ok(command) => command,
            Err(e) => {
                self.set_status(e.to_string(), true);
                return;
            }
        };
        let description = command.description.clone();
        if self.runner.start(command, Some(self.ctx.clone())) {
            self.set_status(format!("Running {}…", description), false);
        }
    }

    fn export_configuration(&mut self) {
        let Some(path) = toolbar::save_configuration_dialog() else { return };
        match std::fs::write(&path, self.form.configuration_json()) {
            Ok(()) => self.set_status(format!("Configuration exported: {}", path.display()), false),
            Err(e) => self.set_status(format!("Configuration export failed: {}", e), true),
        }
    }

    fn export_log(&mut self, as_json: bool) {
        let Some(path) = toolbar::save_log_dialog() else { return };
        let json = as_json || path.extension().is_some_and(|ext| ext == "json");
        let result = if json {
            self.history.save_json(&path)
        } else {
            self.history.save_text(&path)
        };
        match result {
            Ok(()) => self.set_status(format!("Run log exported: {}", path.display()), false),
            Err(e) => self.set_status(format!("Run log export failed: {}", e), true),
        }
    }

    fn reset_view(&mut self) {
        let was = self.machine.state();
        let t = self.machine.escape();
        if was == ViewState::Detail {
            self.details_state.clear();
        }
        log::debug!("View reset to k={:.4}", t.k);
    }

    fn handle_toolbar_action(&mut self, action: ToolbarAction) {
        match action {
            ToolbarAction::OpenDatabase => {
                if let Some(path) = toolbar::open_database_dialog() {
                    self.open_database(&path);
                }
            }
            ToolbarAction::ExportConfiguration => self.export_configuration(),
            ToolbarAction::ExportLog => self.export_log(false),
            ToolbarAction::ShowLog => self.show_log_window = true,
            ToolbarAction::RefreshLists => {
                self.toolbar_state.configs_for = None;
                self.refresh_viz_list();
            }
            ToolbarAction::ResetView => self.reset_view(),
            ToolbarAction::Load => self.start_load(),
            ToolbarAction::ShowAbout => self.show_about = true,
            ToolbarAction::None => {}
        }
    }

    fn handle_control_action(&mut self, action: ControlPanelAction) {
        match action {
            ControlPanelAction::Run { module, preset } => self.start_run(&module, &preset),
            ControlPanelAction::ProbePython => {
                let probe = check_python_available(&self.config.python).ok_or_else(|| self.config.python.clone());
                match &probe {
                    Ok(version) => log::info!("Python: {}", version),
                    Err(python) => log::warn!("Python interpreter {} is not runnable", python),
                }
                self.control_state.python_probe = Some(probe);
            }
            ControlPanelAction::ExportConfiguration => self.export_configuration(),
            ControlPanelAction::None => {}
        }
    }
}

impl eframe::App for ExplorerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_loader();
        self.poll_runner();
        self.refresh_configs_if_stale();

        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            self.reset_view();
        }

        // ── Toolbar ──
        let loading = self.machine.is_loading();
        let toolbar_action = toolbar::show_toolbar(ctx, &mut self.toolbar_state, self.form.registry(), loading);
        if toolbar_action != ToolbarAction::None {
            self.handle_toolbar_action(toolbar_action);
        }

        // ── Status Bar ──
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let color = if self.status_is_error {
                    egui::Color32::from_rgb(0xD0, 0x30, 0x30)
                } else {
                    egui::Color32::from_rgb(0x88, 0x8C, 0x94)
                };
                ui.label(egui::RichText::new(self.status_message.as_str()).size(12.0).color(color));
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(
                        egui::RichText::new(format!(
                            "{} │ {} points │ zoom {:.2}×",
                            self.machine.state(),
                            self.machine.points().len(),
                            self.machine.transform().k
                        ))
                        .size(11.5)
                        .color(egui::Color32::from_rgb(0x66, 0x6C, 0x78)),
                    );
                });
            });
        });

        // ── Left Panel: Method Forms ──
        let mut control_action = ControlPanelAction::None;
        egui::SidePanel::left("control_panel")
            .resizable(true)
            .default_width(300.0)
            .min_width(220.0)
            .max_width(460.0)
            .show(ctx, |ui| {
                control_action = control_panel::show_control_panel(
                    ui,
                    &self.control_state,
                    &mut self.form,
                    &self.config.python,
                    self.runner.is_running(),
                );
            });
        self.handle_control_action(control_action);

        // ── Right Panel: Details ──
        let mut details_action = DetailsAction::None;
        if self.machine.state() == ViewState::Detail {
            if let Some(detail) = self.machine.detail() {
                egui::SidePanel::right("details_panel")
                    .resizable(true)
                    .default_width(360.0)
                    .min_width(240.0)
                    .show(ctx, |ui| {
                        details_action = details::show_details(ui, detail, &mut self.details_state);
                    });
            }
        }
        if details_action == DetailsAction::Close {
            self.machine.close_detail();
            self.details_state.clear();
        }

        // ── Central Panel: Explorer ──
        let mut explorer_action = ExplorerAction::None;
        egui::CentralPanel::default()
            .frame(egui::Frame::new().fill(crate::gui::viewport::VIEW_BACKGROUND))
            .show(ctx, |ui| {
                explorer_action = explorer_view::show_explorer(ui, &mut self.machine, &mut self.explorer_state);
            });
        if let ExplorerAction::Fetch(command) = explorer_action {
            if let Some(point) = self.machine.selected() {
                let message = format!("Selected {} by {}", point.filename, point.artist);
                self.set_status(message, false);
            }
            if let Some(loader) = &self.loader {
                loader.spawn(command);
            }
        }

        // ── Run Log Window ──
        if self.show_log_window {
            let mut export = None;
            egui::Window::new("📋 Run Log")
                .open(&mut self.show_log_window)
                .default_size([600.0, 400.0])
                .resizable(true)
                .show(ctx, |ui| {
                    ui.horizontal(|ui| {
                        if ui.button("💾 Save as Text").clicked() {
                            export = Some(false);
                        }
                        if ui.button("💾 Save as JSON").clicked() {
                            export = Some(true);
                        }
                    });
                    ui.separator();

                    egui::ScrollArea::vertical().show(ui, |ui| {
                        ui.style_mut().override_font_id = Some(egui::FontId::monospace(12.0));
                        ui.label(self.history.to_text());
                    });
                });
            if let Some(as_json) = export {
                self.export_log(as_json);
            }
        }

        // ── About Dialog ──
        if self.show_about {
            egui::Window::new("About")
                .open(&mut self.show_about)
                .collapsible(false)
                .resizable(false)
                .show(ctx, |ui| {
                    ui.heading("🖼 DR Explorer");
                    ui.label(format!("Version {}", env!("CARGO_PKG_VERSION")));
                    ui.add_space(10.0);
                    ui.label("Built with Rust + egui");
                    ui.label("Browse dimensionality-reduction projections of a painting catalog");
                    ui.add_space(10.0);
                    ui.label("Drag to pan, scroll or pinch to zoom, click a tile for details.");
                    ui.label("Esc resets the view.");
                });
        }
    }
}
