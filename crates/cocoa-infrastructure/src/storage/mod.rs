//! Storage for the client configuration file.

mod config_storage;

pub use config_storage::{
    ConfigStorage, ENV_BACKEND_URL, ENV_DEBOUNCE_MS, ENV_QA_CONTEXT_LIMIT, ENV_SEARCH_LIMIT,
    apply_env_overrides,
};
