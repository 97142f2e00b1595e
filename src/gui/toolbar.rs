//! Toolbar: menu bar plus the data-source selectors and the Load button

use std::path::PathBuf;

use crate::data::point::{ConfigSummary, VizConfig};
use crate::data::schema::Registry;
use crate::pipeline::session::{LoadError, LoadRequest};

/// Where points come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Projection,
    Visualization,
}

/// Selector state for the toolbar
#[derive(Debug, Clone)]
pub struct ToolbarState {
    pub source: SourceKind,
    /// Runner module of the chosen method, e.g. `umap`
    pub method: String,
    pub configs: Vec<ConfigSummary>,
    /// Method the `configs` list was fetched for
    pub configs_for: Option<String>,
    pub selected_config: Option<i64>,
    pub viz_list: Vec<VizConfig>,
    pub selected_viz: Option<i64>,
}

impl Default for ToolbarState {
    fn default() -> Self {
        Self {
            source: SourceKind::Projection,
            method: "umap".to_string(),
            configs: Vec::new(),
            configs_for: None,
            selected_config: None,
            viz_list: Vec::new(),
            selected_viz: None,
        }
    }
}

impl ToolbarState {
    /// The load the current selection describes
    pub fn request(&self) -> Result<LoadRequest, LoadError> {
        match self.source {
            SourceKind::Projection => {
                if self.method.is_empty() {
                    return Err(LoadError::MissingSelection("method"));
                }
                let config_id = self
                    .selected_config
                    .ok_or(LoadError::MissingSelection("configuration"))?;
                Ok(LoadRequest::Projection {
                    method: self.method.clone(),
                    config_id,
                })
            }
            SourceKind::Visualization => {
                let viz_id = self
                    .selected_viz
                    .ok_or(LoadError::MissingSelection("visualization"))?;
                Ok(LoadRequest::Visualization { viz_id })
            }
        }
    }

    /// Replace the config list, keeping the selection when it still exists
    pub fn set_configs(&mut self, method: &str, configs: Vec<ConfigSummary>) {
        if !configs.iter().any(|c| Some(c.config_id) == self.selected_config) {
            self.selected_config = configs.first().map(|c| c.config_id);
        }
        self.configs = configs;
        self.configs_for = Some(method.to_string());
    }

    pub fn set_viz_list(&mut self, viz_list: Vec<VizConfig>) {
        if !viz_list.iter().any(|v| Some(v.viz_id) == self.selected_viz) {
            self.selected_viz = viz_list.first().map(|v| v.viz_id);
        }
        self.viz_list = viz_list;
    }

    /// True when the config list belongs to another method
    pub fn configs_stale(&self) -> bool {
        self.configs_for.as_deref() != Some(self.method.as_str())
    }
}

/// Actions that can be triggered from the toolbar
#[derive(Debug, Clone, PartialEq)]
pub enum ToolbarAction {
    None,
    OpenDatabase,
    ExportConfiguration,
    ExportLog,
    ShowLog,
    RefreshLists,
    ResetView,
    Load,
    ShowAbout,
}

/// Render the toolbar and return any triggered action
pub fn show_toolbar(
    ctx: &egui::Context,
    state: &mut ToolbarState,
    registry: &Registry,
    loading: bool,
) -> ToolbarAction {
    let mut action = ToolbarAction::None;

    egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
        egui::menu::bar(ui, |ui| {
            ui.menu_button("📁 File", |ui| {
                if ui.button("🗄 Open Database…").clicked() {
                    action = ToolbarAction::OpenDatabase;
                    ui.close_menu();
                }
                ui.separator();
                if ui.button("💾 Export Configuration…").clicked() {
                    action = ToolbarAction::ExportConfiguration;
                    ui.close_menu();
                }
                if ui.button("📋 Export Run Log…").clicked() {
                    action = ToolbarAction::ExportLog;
                    ui.close_menu();
                }
            });

            ui.menu_button("🔍 View", |ui| {
                if ui.button("🔄 Reset Zoom (Esc)").clicked() {
                    action = ToolbarAction::ResetView;
                    ui.close_menu();
                }
                if ui.button("📋 Run Log").clicked() {
                    action = ToolbarAction::ShowLog;
                    ui.close_menu();
                }
                if ui.button("⟳ Refresh Lists").clicked() {
                    action = ToolbarAction::RefreshLists;
                    ui.close_menu();
                }
            });

            ui.menu_button("❓ Help", |ui| {
                if ui.button("ℹ About").clicked() {
                    action = ToolbarAction::ShowAbout;
                    ui.close_menu();
                }
            });

            ui.separator();
            ui.selectable_value(&mut state.source, SourceKind::Projection, "Projection");
            ui.selectable_value(&mut state.source, SourceKind::Visualization, "Visualization");
            ui.separator();

            match state.source {
                SourceKind::Projection => {
                    let current = registry
                        .methods()
                        .iter()
                        .find(|m| m.module == state.method)
                        .map(|m| m.name.clone())
                        .unwrap_or_else(|| state.method.clone());
                    egui::ComboBox::from_id_salt("toolbar_method")
                        .selected_text(current)
                        .show_ui(ui, |ui| {
                            for m in registry.methods() {
                                ui.selectable_value(&mut state.method, m.module.clone(), m.name.as_str());
                            }
                        });

                    let config_text = state
                        .configs
                        .iter()
                        .find(|c| Some(c.config_id) == state.selected_config)
                        .map(|c| c.label())
                        .unwrap_or_else(|| "(no configuration)".to_string());
                    egui::ComboBox::from_id_salt("toolbar_config")
                        .width(260.0)
                        .selected_text(config_text)
                        .show_ui(ui, |ui| {
                            for c in &state.configs {
                                ui.selectable_value(&mut state.selected_config, Some(c.config_id), c.label());
                            }
                        });
                }
                SourceKind::Visualization => {
                    let viz_text = state
                        .viz_list
                        .iter()
                        .find(|v| Some(v.viz_id) == state.selected_viz)
                        .map(|v| v.label())
                        .unwrap_or_else(|| "(no visualization)".to_string());
                    egui::ComboBox::from_id_salt("toolbar_viz")
                        .width(260.0)
                        .selected_text(viz_text)
                        .show_ui(ui, |ui| {
                            for v in &state.viz_list {
                                ui.selectable_value(&mut state.selected_viz, Some(v.viz_id), v.label());
                            }
                        });
                }
            }

            let label = if loading { "⏳ Loading…" } else { "▶ Load" };
            if ui.add_enabled(!loading, egui::Button::new(label)).clicked() {
                action = ToolbarAction::Load;
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.label(
                    egui::RichText::new("DR Explorer")
                        .color(egui::Color32::from_rgb(0x70, 0x75, 0x80))
                        .size(12.0),
                );
            });
        });
    });

    action
}

/// Show file-open dialog for a catalog database
pub fn open_database_dialog() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Open Projection Database")
        .add_filter("SQLite", &["sqlite", "sqlite3", "db"])
        .add_filter("All Files", &["*"])
        .pick_file()
}

/// Show save dialog for the current form configuration
pub fn save_configuration_dialog() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Export Configuration")
        .set_file_name("configuration.json")
        .add_filter("JSON", &["json"])
        .save_file()
}

/// Show save dialog for log export
pub fn save_log_dialog() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Export Run Log")
        .add_filter("Text File", &["txt"])
        .add_filter("JSON", &["json"])
        .save_file()
}
