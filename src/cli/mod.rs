pub mod export;
pub mod list;
pub mod quote;
pub mod refresh;
pub mod reinit;
pub mod setup;
pub mod status;
pub mod summary;
pub mod ui;
