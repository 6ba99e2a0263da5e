pub mod assign;
mod context;
pub mod import;
mod output;
pub mod reconcile;
pub mod status;
pub mod volunteers;
