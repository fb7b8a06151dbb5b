// src/service/mod.rs

pub mod host;
pub mod signals;
pub mod unit;

pub use host::{RunningService, ServiceHost};
pub use signals::install_signal_handler;
pub use unit::{DEFAULT_UNIT_DIR, ServiceManager, SystemCtl, Systemd, UnitSpec, render_unit};
