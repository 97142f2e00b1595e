//! Explorer canvas: the active bitmap under the pan/zoom transform, the
//! marker overlay, and click → detail

use egui::{Color32, ColorImage, Sense, TextureHandle, TextureOptions};

use crate::data::point::Tier;
use crate::pipeline::bitmap::Bitmap;
use crate::pipeline::session::{Command, ViewMachine};

use super::interaction::ViewportRect;
use super::viewport::{paint_overlay, render_view, VIEW_BACKGROUND};

/// GPU copies of the bitmaps of the current session
#[derive(Default)]
pub struct ExplorerViewState {
    textures: Vec<(u64, Tier, TextureHandle)>,
    pub show_markers: bool,
}

impl ExplorerViewState {
    pub fn new() -> Self {
        Self {
            textures: Vec::new(),
            show_markers: true,
        }
    }

    fn texture_for(&mut self, ctx: &egui::Context, epoch: u64, bitmap: &Bitmap) -> TextureHandle {
        if let Some((_, _, handle)) = self
            .textures
            .iter()
            .find(|(e, tier, _)| *e == epoch && *tier == bitmap.tier)
        {
            return handle.clone();
        }
        // textures of older sessions are dropped here
        self.textures.retain(|(e, _, _)| *e == epoch);

        let size = [bitmap.width() as usize, bitmap.height() as usize];
        let color = ColorImage::from_rgba_unmultiplied(size, bitmap.image.as_raw());
        let handle = ctx.load_texture(format!("bitmap-{}-{}", bitmap.tier, epoch), color, TextureOptions::LINEAR);
        log::debug!("Uploaded {} bitmap for epoch {}", bitmap.tier, epoch);
        self.textures.push((epoch, bitmap.tier, handle.clone()));
        handle
    }
}

#[derive(Debug, Clone)]
pub enum ExplorerAction {
    None,
    /// A click selected a point; run this fetch for the detail pane
    Fetch(Command),
}

pub fn show_explorer(ui: &mut egui::Ui, machine: &mut ViewMachine, state: &mut ExplorerViewState) -> ExplorerAction {
    let mut action = ExplorerAction::None;

    let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
    machine.set_viewport_size(rect.width() as f64, rect.height() as f64);

    let painter = ui.painter_at(rect);
    let session_epoch = machine.session().map(|s| s.epoch);
    let Some(epoch) = session_epoch else {
        painter.rect_filled(rect, 0.0, VIEW_BACKGROUND);
        let text = if machine.is_loading() {
            machine.state().status_text()
        } else {
            "Choose a projection and press Load"
        };
        painter.text(
            rect.center(),
            egui::Align2::CENTER_CENTER,
            text,
            egui::FontId::proportional(16.0),
            Color32::from_rgb(0xAA, 0xAE, 0xB4),
        );
        return action;
    };

    machine.handle_response(ui, &response);

    if response.clicked() {
        if let Some(pos) = response.interact_pointer_pos() {
            if let Some(cmd) = machine.click(pos.x as f64, pos.y as f64, &ViewportRect::from(rect)) {
                action = ExplorerAction::Fetch(cmd);
            }
        }
    }

    if let Some(bitmap) = machine.active_bitmap() {
        let texture = state.texture_for(ui.ctx(), epoch, bitmap);
        let size = [bitmap.width(), bitmap.height()];
        render_view(&painter, rect, &machine.transform(), texture.id(), size);
        if state.show_markers {
            paint_overlay(&painter, rect, machine.overlay());
        }
    }

    if machine.is_loading() {
        painter.text(
            rect.left_top() + egui::vec2(12.0, 12.0),
            egui::Align2::LEFT_TOP,
            machine.state().status_text(),
            egui::FontId::proportional(14.0),
            Color32::from_rgb(0xF0, 0xC0, 0x40),
        );
    }

    action
}
