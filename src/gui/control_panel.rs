//! Control panel: left sidebar with one parameter form per projection method

use super::form::{show_method_panel, FormState, MethodPanelAction};

/// State for the control panel UI
#[derive(Debug, Clone, Default)]
pub struct ControlPanelState {
    /// Result of the last interpreter probe: `Some(Ok(version))`, `Some(Err(python))`
    pub python_probe: Option<Result<String, String>>,
}

/// Actions that can be triggered from the control panel
#[derive(Debug, Clone, PartialEq)]
pub enum ControlPanelAction {
    None,
    Run { module: String, preset: String },
    ProbePython,
    ExportConfiguration,
}

pub fn show_control_panel(
    ui: &mut egui::Ui,
    state: &ControlPanelState,
    form: &mut FormState<'_>,
    python: &str,
    running: bool,
) -> ControlPanelAction {
    let mut action = ControlPanelAction::None;

    ui.vertical_centered(|ui| {
        ui.heading("⚙️ Methods");
    });
    ui.separator();

    ui.horizontal(|ui| {
        ui.label(
            egui::RichText::new(format!("🐍 {}", python))
                .size(11.5)
                .color(egui::Color32::from_rgb(0x66, 0x6C, 0x78)),
        );
        if ui.small_button("Check").clicked() {
            action = ControlPanelAction::ProbePython;
        }
    });
    match &state.python_probe {
        Some(Ok(version)) => {
            ui.label(
                egui::RichText::new(format!("✓ {}", version))
                    .size(11.0)
                    .color(egui::Color32::from_rgb(0x40, 0x90, 0x50)),
            );
        }
        Some(Err(program)) => {
            ui.label(
                egui::RichText::new(format!("✗ {} not found", program))
                    .size(11.0)
                    .color(egui::Color32::from_rgb(0xD0, 0x30, 0x30)),
            );
        }
        None => {}
    }
    if running {
        ui.horizontal(|ui| {
            ui.spinner();
            ui.label("Running…");
        });
    }
    ui.separator();

    egui::ScrollArea::vertical()
        .max_height(ui.available_height() - 40.0)
        .show(ui, |ui| {
            let registry = form.registry();
            for method in registry.methods() {
                if let MethodPanelAction::Run { module, preset } =
                    show_method_panel(ui, form, &method.name, !running)
                {
                    action = ControlPanelAction::Run { module, preset };
                }
            }
        });

    ui.separator();
    if ui.button("💾 Export Configuration…").clicked() {
        action = ControlPanelAction::ExportConfiguration;
    }

    action
}
