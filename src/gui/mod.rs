pub mod control_panel;
pub mod details;
pub mod explorer_view;
pub mod form;
pub mod interaction;
pub mod toolbar;
pub mod viewport;
