//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RouterConfig (validated, immutable)
//!     → compiled into a HandlerTree
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → new HandlerTree built
//!     → atomic swap; in-flight requests keep the old tree
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    ActionConfig, AdminConfig, AllowValue, AuthConfig, DispatchConfig, GuardConfig,
    HandlerConfig, ListenerConfig, ObservabilityConfig, RouterConfig, RuleConfig,
    TimeoutConfig, TokenConfig,
};
pub use validation::{validate_config, ValidationError};
