//! Detail pane: the selected painting at full size plus its artist record

use egui::{ColorImage, TextureHandle, TextureOptions};

use crate::data::point::ImageHandle;
use crate::pipeline::session::DetailData;

#[derive(Default)]
pub struct DetailsState {
    /// Texture of the image currently shown, keyed by filename
    texture: Option<(String, TextureHandle)>,
}

impl DetailsState {
    pub fn clear(&mut self) {
        self.texture = None;
    }

    fn texture_for(&mut self, ctx: &egui::Context, filename: &str, image: &ImageHandle) -> TextureHandle {
        if let Some((name, handle)) = &self.texture {
            if name == filename {
                return handle.clone();
            }
        }
        let size = [image.width() as usize, image.height() as usize];
        let color = ColorImage::from_rgba_unmultiplied(size, image.as_raw());
        let handle = ctx.load_texture(format!("detail-{}", filename), color, TextureOptions::LINEAR);
        self.texture = Some((filename.to_string(), handle.clone()));
        handle
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetailsAction {
    None,
    Close,
}

pub fn show_details(ui: &mut egui::Ui, detail: &DetailData, state: &mut DetailsState) -> DetailsAction {
    let mut action = DetailsAction::None;

    ui.horizontal(|ui| {
        ui.heading(detail.point.artist.as_str());
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            if ui.button("✕").on_hover_text("Close (Esc)").clicked() {
                action = DetailsAction::Close;
            }
        });
    });
    ui.label(
        egui::RichText::new(&detail.point.filename)
            .size(11.0)
            .color(egui::Color32::from_rgb(0x88, 0x8C, 0x94)),
    );
    ui.separator();

    if detail.loading {
        ui.horizontal(|ui| {
            ui.spinner();
            ui.label("Loading details…");
        });
    }
    if let Some(err) = &detail.error {
        ui.colored_label(egui::Color32::from_rgb(0xD0, 0x30, 0x30), err.as_str());
    }

    egui::ScrollArea::vertical().show(ui, |ui| {
        if let Some(image) = &detail.image {
            let texture = state.texture_for(ui.ctx(), &detail.point.filename, image);
            let size = texture.size_vec2();
            let scale = (ui.available_width() / size.x).min(1.0);
            ui.image((texture.id(), size * scale));
            ui.add_space(6.0);
        }

        match &detail.artist {
            Some(artist) => {
                egui::Grid::new("artist_fields")
                    .num_columns(2)
                    .spacing([12.0, 6.0])
                    .show(ui, |ui| {
                        for (label, value) in artist.fields() {
                            ui.strong(label);
                            if label == "wikipedia" && value.starts_with("http") {
                                ui.hyperlink(value);
                            } else {
                                ui.add(egui::Label::new(value).wrap());
                            }
                            ui.end_row();
                        }
                    });
            }
            None if !detail.loading => {
                ui.label(format!("No record for {}", detail.point.artist));
            }
            None => {}
        }

        // clicking the empty space below closes the pane
        let rest = ui.available_size().max(egui::vec2(0.0, 40.0));
        if ui.allocate_response(rest, egui::Sense::click()).clicked() {
            action = DetailsAction::Close;
        }
    });

    action
}
