//! Declarative, typed configuration for Rust applications. Declare your keys,
//! point at your sources, and go.
//!
//! Confkit resolves every configuration key from config files, command-line
//! flags, environment variables, and compiled defaults. Each key declares its
//! type, its sources, and its validation rules through a builder API, and
//! processing a [`Config`] reports every problem at once.
//!
//! ```
//! use confkit::{Config, MapEnv};
//!
//! let mut config = Config::with_env(MapEnv::new().with("PORT", "9000"));
//! config.define("PORT").int64().env("PORT").default(8080).range(1.0, 65535.0);
//! config.define("HOST").env("HOST").default("localhost");
//!
//! assert!(config.process().is_empty());
//! assert_eq!(config.get_int64("PORT"), 9000);
//! assert_eq!(config.get_string("HOST"), "localhost");
//! ```
//!
//! # Definitions as source of truth
//!
//! A [`Definition`] is the schema for one key:
//!
//! - **Type**: string (the default), int64, float64, bool, duration, url,
//!   string list, or int64 list. Every raw value is parsed into this type.
//! - **Sources**: an environment variable name, a flag name, and the key
//!   itself in loaded config files (`PORT` also matches a lowercase `port`).
//! - **Default**: the lowest layer, used when no source has a value.
//! - **Rules**: `required`, numeric ranges, lengths, patterns, allowed
//!   values, duration bounds, list sizes, and custom checks.
//! - **Secret**: the resolved value is kept in a [`SecretStore`] instead of
//!   the plain value map, and is masked everywhere it is displayed.
//!
//! Help text, `config list`, `config get`, and override warnings all derive
//! from the same definitions.
//!
//! # Layer precedence
//!
//! ```text
//! Compiled defaults     .default(...)
//!        ↑ overridden by
//! Environment vars      .env("NAME")
//!        ↑ overridden by
//! Command-line flags    .flag("name")
//!        ↑ overridden by
//! Config files          load_file(), later files win
//! ```
//!
//! Every layer is **sparse**: a key falls through to the layer below when a
//! source has nothing for it. When a higher layer shadows a lower one, an
//! [`OverrideWarning`] is recorded so operators can see where a value came
//! from. Secret values in warnings are masked.
//!
//! # Config files
//!
//! [`Config::load_file`] accepts JSON, YAML, and TOML, picked by extension.
//! Loaded files are merged shallowly: top-level keys from later files replace
//! earlier ones. A top-level `environments` table holds per-environment
//! overlays, applied with [`Config::set_environment`].
//!
//! # Errors
//!
//! [`Config::process`] never stops at the first problem. It returns one
//! [`ConfigError`] per failing key, in declaration order, with secret values
//! already masked. [`format_errors`] renders them for humans.
//!
//! Lookups come in two flavours: [`Config::try_get`] returns a [`GetError`],
//! while the typed getters such as [`Config::get_int64`] panic on misuse.
//!
//! # Commands and middleware
//!
//! [`Config::command`] registers a named command with its own definitions,
//! subcommands, and aliases. [`Config::execute`] dispatches a command line,
//! scopes the configuration to the chosen command, and runs the handler
//! through global and per-command [`Middleware`]. The
//! [`middleware`](mod@middleware) module ships logging, auth, timing,
//! recovery, rate limiting, and metrics.
//!
//! # Clap adapter
//!
//! The `cli` module (behind the `clap` feature, on by default) turns flagged
//! definitions into `clap::Arg`s and adds [`ConfigArgs`], a drop-in
//! `config list|get|help` subcommand. To use confkit without clap:
//!
//! ```toml
//! confkit = { version = "...", default-features = false }
//! ```

pub mod codec;
pub mod error;
pub mod middleware;
pub mod types;
pub mod validate;

mod builder;
#[cfg(feature = "clap")]
mod cli;
mod command;
mod config;
mod env;
mod file;
mod flags;
mod get;
pub(crate) mod merge;
mod ops;
mod overrides;
mod resolve;
mod secret;

#[cfg(test)]
mod fixtures;

pub use builder::{Definition, DefinitionBuilder};
#[cfg(feature = "clap")]
pub use cli::{ConfigArgs, ConfigSubcommand};
pub use command::{
    Command, CommandBuilder, CommandConfig, CommandContext, CommandFn, Middleware, handler,
    middleware,
};
pub use config::Config;
pub use env::{EnvSource, MapEnv, ProcessEnv};
pub use error::{
    CommandError, ConfigError, ConfkitError, ErrorKind, GetError, ParseError, format_errors,
    mask_secret,
};
pub use file::{FileFormat, FileSource};
pub use flags::FlagValues;
pub use get::FromValue;
pub use ops::ConfigResult;
pub use overrides::{OverrideWarning, OverrideWarnings};
pub use secret::{SecretStore, SecureString};
pub use types::{ConfigAction, Source, Value, ValueType};
pub use validate::Rule;
