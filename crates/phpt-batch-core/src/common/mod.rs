pub mod config;

pub use config::{
    ANALYZER_ENV, ARGUMENTS_ENV, DEFAULT_ANALYZER_RELATIVE_PATH, DEFAULT_SCRATCH_DIR_NAME,
    SCRATCH_DIR_ENV, TesterConfig,
};
