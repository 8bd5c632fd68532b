//! Env-toggled debug logging.

use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};

use crate::store::StateDir;

/// Setting this environment variable (to anything) enables the debug log.
pub const DEBUG_ENV: &str = "CC_SMARTGATE_DEBUG";

/// Initialize a file logger appending to `<state>/debug.log` when
/// [`DEBUG_ENV`] is set. Best-effort: any failure leaves logging disabled
/// and never affects the decision contract.
pub fn init_from_env(state: &StateDir) {
    if std::env::var_os(DEBUG_ENV).is_none() {
        return;
    }
    state.ensure();
    let Ok(file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(state.debug_log())
    else {
        return;
    };
    let config = ConfigBuilder::new().build();
    let _ = WriteLogger::init(LevelFilter::Debug, config, file);
}
