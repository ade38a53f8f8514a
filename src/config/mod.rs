//! Configuration: the YAML transformation spec and the TOML tool settings.

mod model;
mod settings;

pub use model::{
    ConfigError, ConfigModel, ConfigResult, JoinCondition, SelectEntry, SortCondition,
};
pub use settings::{CompileSettings, LogSettings, Settings, SettingsError};
