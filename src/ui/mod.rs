pub mod dashboard;

pub use dashboard::{Dashboard, DashboardView};
