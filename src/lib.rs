pub mod backtest;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod linalg;
pub mod model;
pub mod predictor;
pub mod preprocess;
pub mod price_file;
pub mod run_store;
pub mod selector;
pub mod simulator;
pub mod walk_forward;
