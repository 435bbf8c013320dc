//! Clap adapter for confkit.
//!
//! Everything clap-specific lives here, behind the `clap` Cargo feature (on
//! by default); the rest of the crate never names a clap type.
//!
//! It offers two bridges:
//!
//! - Flags: [`Config::clap_args`] turns every definition that declares a flag
//!   into a `clap::Arg`, and [`Config::set_matches`] feeds the parsed matches
//!   back in as the flag source.
//! - Inspection: [`ConfigArgs`] and [`ConfigSubcommand`] give an app
//!   `config list|get|help` subcommands. [`ConfigArgs::into_action()`]
//!   converts them into a [`ConfigAction`](crate::ConfigAction) for the
//!   clap-free [`Config::handle()`](crate::Config::handle).

use clap::{Arg, ArgMatches, Args, Subcommand};

use crate::builder::Definition;
use crate::config::Config;
use crate::flags::FlagValues;
use crate::types::ConfigAction;

/// The `config` subcommand group, ready to nest in a host's clap derive:
///
/// ```ignore
/// #[derive(Subcommand)]
/// enum Commands {
///     Serve,
///     Config(ConfigArgs),
/// }
/// ```
#[derive(Debug, Args)]
#[command(disable_help_subcommand = true)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: Option<ConfigSubcommand>,
}

/// `config list`, `config get <KEY>` and `config help`.
#[derive(Debug, Subcommand)]
pub enum ConfigSubcommand {
    /// Show every configuration key with its resolved value.
    List,
    /// Show the resolved value and description of one key.
    Get {
        /// Key name as declared (e.g. "DATABASE_URL").
        key: String,
    },
    /// Describe every configuration key.
    Help,
}

impl ConfigArgs {
    /// The clap-free action for [`Config::handle`]. A bare `config` lists.
    pub fn into_action(self) -> ConfigAction {
        match self.action {
            None | Some(ConfigSubcommand::List) => ConfigAction::List,
            Some(ConfigSubcommand::Get { key }) => ConfigAction::Get { key },
            Some(ConfigSubcommand::Help) => ConfigAction::Help,
        }
    }
}

impl FlagValues {
    /// Collect the flag of every definition from clap matches.
    ///
    /// Flags missing from `matches` (or registered with a non-string value
    /// type) are skipped.
    pub fn from_matches<'d>(
        matches: &ArgMatches,
        definitions: impl IntoIterator<Item = &'d Definition>,
    ) -> Self {
        let mut flags = FlagValues::new();
        for def in definitions {
            let Some(flag) = def.flag() else {
                continue;
            };
            if let Some(value) = matches.try_get_one::<String>(flag).ok().flatten() {
                flags.set(flag, value);
            }
        }
        flags
    }
}

impl Config {
    /// One `--<flag> <TYPE>` argument per definition that declares a flag.
    pub fn clap_args(&self) -> Vec<Arg> {
        self.definitions()
            .filter_map(|def| {
                let flag = def.flag()?;
                let mut arg = Arg::new(flag.to_string())
                    .long(flag.to_string())
                    .value_name(def.value_type().name());
                if let Some(description) = def.description() {
                    arg = arg.help(description.to_string());
                }
                Some(arg)
            })
            .collect()
    }

    /// Use clap matches as the flag source.
    pub fn set_matches(&mut self, matches: &ArgMatches) {
        let flags = FlagValues::from_matches(matches, self.definitions());
        self.set_flags(flags);
    }
}
