pub mod run_history;
