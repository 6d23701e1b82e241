pub mod load;
pub mod markets;
pub mod predict;
pub mod scenarios;
pub mod setup;
pub mod ui;

/// How command results are rendered on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Output {
    #[default]
    Table,
    Json,
}
