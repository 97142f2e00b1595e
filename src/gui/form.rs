//! Parameter forms generated from the method schemas
//!
//! `FormState::render` turns a [`MethodSchema`] plus the current values into
//! a plain view tree ([`PanelNode`]); `show_method_panel` draws that tree with
//! egui and routes every edit back through [`FormState::set_value`], the same
//! path presets take, so numeric readouts never go stale.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::data::schema::{FieldSpec, FieldValue, MethodSchema, Registry, Scope};

#[derive(Debug, Error, PartialEq)]
pub enum FormError {
    #[error("unknown method '{0}'")]
    UnknownMethod(String),
    #[error("method '{method}' has no preset '{preset}'")]
    UnknownPreset { method: String, preset: String },
}

/// Identity of one rendered control
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldKey {
    pub method: String,
    pub scope: Scope,
    pub field: String,
}

impl FieldKey {
    pub fn new(method: &str, scope: Scope, field: &str) -> Self {
        Self {
            method: method.to_string(),
            scope,
            field: field.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Control {
    Slider {
        min: f64,
        max: f64,
        step: f64,
        value: f64,
        readout: String,
    },
    Choice {
        options: Vec<String>,
        value: String,
    },
    Toggle {
        value: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControlNode {
    pub key: FieldKey,
    pub control: Control,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SectionNode {
    pub scope: Scope,
    pub collapsed: bool,
    pub controls: Vec<ControlNode>,
}

/// Everything needed to draw one method panel
#[derive(Debug, Clone, PartialEq)]
pub struct PanelNode {
    pub method: String,
    pub module: String,
    pub sections: Vec<SectionNode>,
    pub presets: Vec<String>,
}

/// Digits after the decimal point in `step`
fn step_decimals(step: f64) -> usize {
    let s = format!("{}", step.abs());
    s.find('.').map_or(0, |dot| s.len() - dot - 1)
}

fn format_readout(value: f64, step: f64) -> String {
    format!("{:.*}", step_decimals(step), value)
}

/// Values of every method panel that has been materialized
#[derive(Debug, Clone)]
pub struct FormState<'r> {
    registry: &'r Registry,
    values: BTreeMap<FieldKey, FieldValue>,
    readouts: BTreeMap<FieldKey, String>,
    rendered: BTreeSet<String>,
    advanced_open: BTreeSet<String>,
    selected_preset: BTreeMap<String, String>,
    changes: u64,
}

impl<'r> FormState<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            values: BTreeMap::new(),
            readouts: BTreeMap::new(),
            rendered: BTreeSet::new(),
            advanced_open: BTreeSet::new(),
            selected_preset: BTreeMap::new(),
            changes: 0,
        }
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    fn schema(&self, method: &str) -> Result<&'r MethodSchema, FormError> {
        self.registry
            .get(method)
            .ok_or_else(|| FormError::UnknownMethod(method.to_string()))
    }

    /// Fill in defaults the first time a method is touched
    fn ensure(&mut self, schema: &MethodSchema) {
        if !self.rendered.insert(schema.name.clone()) {
            return;
        }
        for scope in Scope::ALL {
            for field in schema.fields(scope) {
                let key = FieldKey::new(&schema.name, scope, &field.name);
                self.values.insert(key.clone(), field.spec.default_value());
                self.notify(&key, &field.spec);
            }
        }
    }

    /// Change notification: keep the readout in sync with the stored value
    fn notify(&mut self, key: &FieldKey, spec: &FieldSpec) {
        self.changes += 1;
        let readout = match (spec, self.values.get(key)) {
            (FieldSpec::Range { step, .. }, Some(v)) => v.as_f64().map(|x| format_readout(x, *step)),
            (_, Some(v)) => Some(v.to_string()),
            _ => None,
        };
        if let Some(text) = readout {
            self.readouts.insert(key.clone(), text);
        }
    }

    /// View tree for `method`. The advanced tier starts collapsed.
    pub fn render(&mut self, method: &str) -> Result<PanelNode, FormError> {
        let schema = self.schema(method)?;
        self.ensure(schema);

        let sections = Scope::ALL
            .iter()
            .map(|&scope| SectionNode {
                scope,
                collapsed: scope == Scope::Advanced && !self.advanced_open.contains(method),
                controls: schema
                    .fields(scope)
                    .iter()
                    .map(|field| {
                        let key = FieldKey::new(method, scope, &field.name);
                        let current = self.values.get(&key).cloned().unwrap_or_else(|| field.spec.default_value());
                        ControlNode {
                            control: self.control_for(&key, &field.spec, &current),
                            key,
                        }
                    })
                    .collect(),
            })
            .collect();

        Ok(PanelNode {
            method: schema.name.clone(),
            module: schema.module.clone(),
            sections,
            presets: schema.presets.iter().map(|p| p.name.clone()).collect(),
        })
    }

    fn control_for(&self, key: &FieldKey, spec: &FieldSpec, current: &FieldValue) -> Control {
        match spec {
            FieldSpec::Range { min, max, step, .. } => {
                let value = current.as_f64().unwrap_or(*min);
                Control::Slider {
                    min: *min,
                    max: *max,
                    step: *step,
                    value,
                    readout: self
                        .readouts
                        .get(key)
                        .cloned()
                        .unwrap_or_else(|| format_readout(value, *step)),
                }
            }
            FieldSpec::Select { options, default } => Control::Choice {
                options: options.clone(),
                value: current.as_str().unwrap_or(default).to_string(),
            },
            FieldSpec::Checkbox { default } => Control::Toggle {
                value: current.as_bool().unwrap_or(*default),
            },
        }
    }

    /// Set one control the way a user edit would. Returns the value actually
    /// stored, or `None` when the key or value is not acceptable.
    pub fn set_value(&mut self, key: &FieldKey, value: &FieldValue) -> Option<FieldValue> {
        let schema = self.registry.get(&key.method)?;
        let spec = schema.field(key.scope, &key.field)?;
        let accepted = spec.sanitize(value)?;
        self.ensure(schema);
        self.values.insert(key.clone(), accepted.clone());
        self.notify(key, spec);
        Some(accepted)
    }

    pub fn value(&self, key: &FieldKey) -> Option<&FieldValue> {
        self.values.get(key)
    }

    pub fn readout(&self, key: &FieldKey) -> Option<&str> {
        self.readouts.get(key).map(String::as_str)
    }

    /// Number of change notifications fired so far
    pub fn change_count(&self) -> u64 {
        self.changes
    }

    /// Apply a partial set of values. Each name is looked up in the basic
    /// tier, then the advanced one; names the schema lacks are skipped.
    /// Returns how many values were applied.
    pub fn apply_preset(&mut self, method: &str, values: &[(String, FieldValue)]) -> Result<usize, FormError> {
        let schema = self.schema(method)?;
        self.ensure(schema);

        let mut applied = 0;
        for (name, value) in values {
            let Some((scope, _)) = schema.find_field(name) else {
                log::debug!("Preset for {} names unknown field '{}', skipped", method, name);
                continue;
            };
            if self.set_value(&FieldKey::new(method, scope, name), value).is_some() {
                applied += 1;
            } else {
                log::debug!("Preset value {} refused for {}.{}", value, method, name);
            }
        }
        Ok(applied)
    }

    pub fn apply_named_preset(&mut self, method: &str, preset: &str) -> Result<usize, FormError> {
        let schema = self.schema(method)?;
        let found = schema.preset(preset).ok_or_else(|| FormError::UnknownPreset {
            method: method.to_string(),
            preset: preset.to_string(),
        })?;
        let applied = self.apply_preset(method, &found.values)?;
        self.selected_preset.insert(method.to_string(), preset.to_string());
        log::info!("Applied preset {}/{} ({} values)", method, preset, applied);
        Ok(applied)
    }

    /// Preset most recently applied to `method`, else its first one
    pub fn selected_preset(&self, method: &str) -> Option<String> {
        self.selected_preset.get(method).cloned().or_else(|| {
            self.registry
                .get(method)
                .and_then(|s| s.presets.first())
                .map(|p| p.name.clone())
        })
    }

    pub fn select_preset(&mut self, method: &str, preset: &str) {
        self.selected_preset.insert(method.to_string(), preset.to_string());
    }

    pub fn set_advanced_open(&mut self, method: &str, open: bool) {
        if open {
            self.advanced_open.insert(method.to_string());
        } else {
            self.advanced_open.remove(method);
        }
    }

    /// Every materialized control, grouped by method then field name
    pub fn current_configuration(&self) -> BTreeMap<String, BTreeMap<String, FieldValue>> {
        let mut out: BTreeMap<String, BTreeMap<String, FieldValue>> = BTreeMap::new();
        for (key, value) in &self.values {
            out.entry(key.method.clone())
                .or_default()
                .insert(key.field.clone(), value.clone());
        }
        out
    }

    pub fn configuration_json(&self) -> String {
        serde_json::to_string_pretty(&self.current_configuration()).unwrap_or_else(|e| format!("JSON error: {}", e))
    }
}

/// Actions triggered from a method panel
#[derive(Debug, Clone, PartialEq)]
pub enum MethodPanelAction {
    None,
    Run { module: String, preset: String },
}

/// Draw one collapsible method panel
pub fn show_method_panel(ui: &mut egui::Ui, form: &mut FormState<'_>, method: &str, run_enabled: bool) -> MethodPanelAction {
    let mut action = MethodPanelAction::None;
    let panel = match form.render(method) {
        Ok(panel) => panel,
        Err(e) => {
            ui.colored_label(egui::Color32::from_rgb(0xD0, 0x30, 0x30), e.to_string());
            return action;
        }
    };

    ui.collapsing(panel.method.as_str(), |ui| {
        if !panel.presets.is_empty() {
            ui.horizontal_wrapped(|ui| {
                ui.label("Presets:");
                for preset in &panel.presets {
                    if ui.small_button(preset.as_str()).clicked() {
                        if let Err(e) = form.apply_named_preset(method, preset) {
                            log::warn!("{}", e);
                        }
                    }
                }
            });
        }

        for section in &panel.sections {
            if section.controls.is_empty() {
                continue;
            }
            match section.scope {
                Scope::Basic => show_controls(ui, form, &section.controls),
                Scope::Advanced => {
                    let resp = egui::CollapsingHeader::new("Advanced")
                        .id_salt((method, "advanced"))
                        .default_open(!section.collapsed)
                        .show(ui, |ui| show_controls(ui, form, &section.controls));
                    form.set_advanced_open(method, resp.openness > 0.5);
                }
            }
        }

        ui.separator();
        ui.horizontal(|ui| {
            let selected = form.selected_preset(method).unwrap_or_default();
            let mut choice = selected.clone();
            egui::ComboBox::from_id_salt((method, "run_preset"))
                .selected_text(if choice.is_empty() { "(none)" } else { choice.as_str() })
                .show_ui(ui, |ui| {
                    for preset in &panel.presets {
                        ui.selectable_value(&mut choice, preset.clone(), preset.as_str());
                    }
                });
            if choice != selected {
                form.select_preset(method, &choice);
            }
            let run = ui.add_enabled(run_enabled && !choice.is_empty(), egui::Button::new("▶ Run"));
            if run.clicked() {
                action = MethodPanelAction::Run {
                    module: panel.module.clone(),
                    preset: choice,
                };
            }
        });
    });

    action
}

fn show_controls(ui: &mut egui::Ui, form: &mut FormState<'_>, controls: &[ControlNode]) {
    for node in controls {
        let name = node.key.field.as_str();
        ui.horizontal(|ui| match &node.control {
            Control::Slider {
                min,
                max,
                step,
                value,
                readout,
            } => {
                let mut v = *value;
                let slider = egui::Slider::new(&mut v, *min..=*max)
                    .step_by(*step)
                    .show_value(false)
                    .text(name);
                if ui.add(slider).changed() {
                    form.set_value(&node.key, &FieldValue::Number(v));
                }
                let shown = form.readout(&node.key).unwrap_or(readout.as_str()).to_string();
                ui.monospace(shown);
            }
            Control::Choice { options, value } => {
                let mut choice = value.clone();
                egui::ComboBox::from_id_salt((&node.key.method, &node.key.field))
                    .selected_text(choice.as_str())
                    .show_ui(ui, |ui| {
                        for option in options {
                            ui.selectable_value(&mut choice, option.clone(), option.as_str());
                        }
                    });
                ui.label(name);
                if &choice != value {
                    form.set_value(&node.key, &FieldValue::Text(choice));
                }
            }
            Control::Toggle { value } => {
                let mut on = *value;
                if ui.checkbox(&mut on, name).changed() {
                    form.set_value(&node.key, &FieldValue::Bool(on));
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::schema::{Field, Preset};

    fn tiny_registry() -> Registry {
        Registry::new(vec![MethodSchema {
            name: "Toy".into(),
            module: "toy".into(),
            basic: vec![
                Field::new("a", FieldSpec::Range { min: 0.0, max: 10.0, step: 1.0, default: 0.0 }),
                Field::new("b", FieldSpec::Range { min: 0.0, max: 10.0, step: 1.0, default: 5.0 }),
                Field::new("rate", FieldSpec::Range { min: 0.0, max: 1.0, step: 0.05, default: 0.1 }),
            ],
            advanced: vec![
                Field::new("metric", FieldSpec::Select { options: vec!["euclidean".into(), "cosine".into()], default: "euclidean".into() }),
                Field::new("verbose", FieldSpec::Checkbox { default: false }),
            ],
            presets: vec![Preset::new("quick", vec![("a".into(), 1.into()), ("metric".into(), "cosine".into())])],
        }])
    }

    fn key(scope: Scope, field: &str) -> FieldKey {
        FieldKey::new("Toy", scope, field)
    }

    #[test]
    fn test_render_lists_basic_then_collapsed_advanced() {
        let reg = tiny_registry();
        let mut form = FormState::new(&reg);
        let panel = form.render("Toy").unwrap();

        assert_eq!(panel.sections.len(), 2);
        assert_eq!(panel.sections[0].scope, Scope::Basic);
        assert!(!panel.sections[0].collapsed);
        assert!(panel.sections[1].collapsed);
        assert_eq!(panel.presets, vec!["quick".to_string()]);
        assert!(matches!(
            &panel.sections[1].controls[0].control,
            Control::Choice { value, .. } if value == "euclidean"
        ));

        form.set_advanced_open("Toy", true);
        assert!(!form.render("Toy").unwrap().sections[1].collapsed);
    }

    #[test]
    fn test_unknown_method_is_an_error() {
        let reg = tiny_registry();
        let mut form = FormState::new(&reg);
        assert_eq!(form.render("Nope").unwrap_err(), FormError::UnknownMethod("Nope".into()));
    }

    #[test]
    fn test_preset_is_a_partial_update() {
        let reg = tiny_registry();
        let mut form = FormState::new(&reg);
        form.render("Toy").unwrap();
        form.set_value(&key(Scope::Basic, "b"), &FieldValue::Number(5.0));

        form.apply_preset("Toy", &[("a".into(), FieldValue::Number(1.0))]).unwrap();
        assert_eq!(form.value(&key(Scope::Basic, "a")), Some(&FieldValue::Number(1.0)));
        assert_eq!(form.value(&key(Scope::Basic, "b")), Some(&FieldValue::Number(5.0)));
    }

    #[test]
    fn test_unknown_preset_field_is_skipped() {
        let reg = tiny_registry();
        let mut form = FormState::new(&reg);
        let applied = form
            .apply_preset(
                "Toy",
                &[
                    ("zzz".into(), FieldValue::Number(3.0)),
                    ("a".into(), FieldValue::Number(2.0)),
                    ("metric".into(), FieldValue::Text("cosine".into())),
                ],
            )
            .unwrap();
        assert_eq!(applied, 2);
        assert_eq!(form.value(&key(Scope::Basic, "a")), Some(&FieldValue::Number(2.0)));
        assert_eq!(form.value(&key(Scope::Advanced, "metric")), Some(&FieldValue::Text("cosine".into())));
        assert_eq!(form.value(&key(Scope::Basic, "b")), Some(&FieldValue::Number(5.0)));
    }

    #[test]
    fn test_preset_updates_readout() {
        let reg = tiny_registry();
        let mut form = FormState::new(&reg);
        form.render("Toy").unwrap();
        assert_eq!(form.readout(&key(Scope::Basic, "rate")), Some("0.10"));

        let before = form.change_count();
        form.apply_preset("Toy", &[("rate".into(), FieldValue::Number(0.333))]).unwrap();
        assert_eq!(form.change_count(), before + 1);
        assert_eq!(form.readout(&key(Scope::Basic, "rate")), Some("0.35"));
        match &form.render("Toy").unwrap().sections[0].controls[2].control {
            Control::Slider { readout, value, .. } => {
                assert_eq!(readout, "0.35");
                assert_eq!(*value, 0.35);
            }
            other => panic!("unexpected control {:?}", other),
        }
    }

    #[test]
    fn test_named_preset_and_selection() {
        let reg = tiny_registry();
        let mut form = FormState::new(&reg);
        assert_eq!(form.selected_preset("Toy"), Some("quick".to_string()));
        assert_eq!(form.apply_named_preset("Toy", "quick"), Ok(2));
        assert!(matches!(
            form.apply_named_preset("Toy", "slow"),
            Err(FormError::UnknownPreset { .. })
        ));
    }

    #[test]
    fn test_invalid_values_are_refused() {
        let reg = tiny_registry();
        let mut form = FormState::new(&reg);
        assert!(form.set_value(&key(Scope::Advanced, "metric"), &"hamming".into()).is_none());
        assert!(form.set_value(&key(Scope::Advanced, "a"), &FieldValue::Number(1.0)).is_none());
        assert_eq!(
            form.set_value(&key(Scope::Basic, "a"), &FieldValue::Number(42.0)),
            Some(FieldValue::Number(10.0))
        );
    }

    #[test]
    fn test_every_slider_value_stays_on_grid() {
        let reg = Registry::global();
        let mut form = FormState::new(reg);
        for schema in reg.methods() {
            for scope in Scope::ALL {
                for field in schema.fields(scope) {
                    let FieldSpec::Range { min, max, step, .. } = field.spec else {
                        continue;
                    };
                    let k = FieldKey::new(&schema.name, scope, &field.name);
                    for probe in [min - 1.0, max + 1.0, (min + max) / 2.0 + step / 3.0, min + step * 0.6] {
                        let v = form.set_value(&k, &FieldValue::Number(probe)).unwrap().as_f64().unwrap();
                        assert!(v >= min && v <= max, "{}.{} = {}", schema.name, field.name, v);
                        let n = (v - min) / step;
                        assert!((n - n.round()).abs() < 1e-6, "{}.{} = {} off grid", schema.name, field.name, v);
                    }
                }
            }
        }
    }

    #[test]
    fn test_current_configuration_groups_by_method() {
        let reg = Registry::global();
        let mut form = FormState::new(reg);
        form.render("UMAP").unwrap();
        form.render("PCA").unwrap();
        form.apply_named_preset("UMAP", "detail").unwrap();

        let config = form.current_configuration();
        assert_eq!(config.len(), 2);
        let umap = &config["UMAP"];
        assert_eq!(umap["n_neighbors"], FieldValue::Number(20.0));
        assert_eq!(umap["metric"], FieldValue::Text("euclidean".into()));
        assert_eq!(umap["subset_size"], FieldValue::Number(250.0));
        // shared field names do not collide across methods
        assert!(config["PCA"].contains_key("subset_size"));
        assert!(form.configuration_json().contains("\"UMAP\""));
    }
}
