//! Subcommand dispatch.
//!
//! Commands are registered with [`Config::command`] and run with
//! [`Config::execute`]. A command may declare keys of its own; at execution
//! they are laid over the global definitions and resolved against the
//! command's remaining arguments, so the handler reads a config built for
//! that one invocation.
//!
//! Handlers and middleware are closures behind `Arc`. A middleware takes the
//! next handler in the chain and returns a handler that wraps it:
//!
//! ```
//! use confkit::{CommandFn, Config, handler, middleware};
//!
//! let mut config = Config::new();
//! config.use_middleware(middleware(|next: CommandFn| {
//!     handler(move |ctx| {
//!         ctx.set("seen", true);
//!         next(ctx)
//!     })
//! }));
//! config
//!     .command("status")
//!     .short_help("Show status")
//!     .handler(|ctx| {
//!         assert!(ctx.get_bool("seen"));
//!         Ok(())
//!     });
//! config.execute(&["app", "status"]).unwrap();
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::fmt::Write as _;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::builder::{Definition, DefinitionBuilder, define_in};
use crate::config::Config;
use crate::error::CommandError;
use crate::overrides;

/// A command handler, or a middleware-wrapped one.
pub type CommandFn =
    Arc<dyn Fn(&mut CommandContext<'_>) -> Result<(), CommandError> + Send + Sync>;

/// Wraps the next handler in the chain.
pub type Middleware = Arc<dyn Fn(CommandFn) -> CommandFn + Send + Sync>;

/// Box a closure as a [`CommandFn`].
pub fn handler<F>(f: F) -> CommandFn
where
    F: Fn(&mut CommandContext<'_>) -> Result<(), CommandError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Box a closure as a [`Middleware`].
pub fn middleware<F>(f: F) -> Middleware
where
    F: Fn(CommandFn) -> CommandFn + Send + Sync + 'static,
{
    Arc::new(f)
}

fn is_help(arg: &str) -> bool {
    matches!(arg, "help" | "--help" | "-h")
}

// -- Context --------------------------------------------------------------------

enum Scope<'a> {
    Global(&'a Config),
    Command(Box<Config>),
}

/// Everything a handler (and the middleware around it) can see.
pub struct CommandContext<'a> {
    /// Arguments after the command (and subcommand) name.
    pub args: Vec<String>,
    /// Canonical name of the top-level command.
    pub command: String,
    /// Canonical name of the subcommand, when one was selected.
    pub subcommand: Option<String>,
    /// Flags resolved for this invocation, by flag name.
    pub flags: HashMap<String, String>,
    scope: Scope<'a>,
    data: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl<'a> CommandContext<'a> {
    pub fn new(config: &'a Config, command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            args,
            command: command.into(),
            subcommand: None,
            flags: HashMap::new(),
            scope: Scope::Global(config),
            data: HashMap::new(),
        }
    }

    /// The global config until the command's own scope is built, then the
    /// command-scoped one.
    pub fn config(&self) -> &Config {
        match &self.scope {
            Scope::Global(config) => config,
            Scope::Command(config) => config,
        }
    }

    fn enter_scope(&mut self, config: Config) {
        self.flags = config.flags().to_map();
        self.scope = Scope::Command(Box::new(config));
    }

    /// Store a value for later middleware or the handler.
    pub fn set<T: Any + Send + Sync>(&mut self, key: &str, value: T) {
        self.data.insert(key.to_string(), Box::new(value));
    }

    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.data.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// String data under `key`, or empty when missing or not a string.
    pub fn get_string(&self, key: &str) -> String {
        if let Some(s) = self.get::<String>(key) {
            return s.clone();
        }
        self.get::<&'static str>(key)
            .map(|s| s.to_string())
            .unwrap_or_default()
    }

    /// Integer data under `key`, or 0.
    pub fn get_int(&self, key: &str) -> i64 {
        if let Some(n) = self.get::<i64>(key) {
            return *n;
        }
        if let Some(n) = self.get::<i32>(key) {
            return i64::from(*n);
        }
        self.get::<usize>(key)
            .and_then(|n| i64::try_from(*n).ok())
            .unwrap_or_default()
    }

    /// Boolean data under `key`, or false.
    pub fn get_bool(&self, key: &str) -> bool {
        self.get::<bool>(key).copied().unwrap_or_default()
    }
}

// -- Commands -------------------------------------------------------------------

/// A registered command.
#[derive(Clone)]
pub struct Command {
    name: String,
    handler: Option<CommandFn>,
    short_help: String,
    long_help: String,
    aliases: Vec<String>,
    definitions: IndexMap<String, Definition>,
    subcommands: IndexMap<String, Command>,
    middleware: Vec<Middleware>,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("definitions", &self.definitions.keys().collect::<Vec<_>>())
            .field("subcommands", &self.subcommands.keys().collect::<Vec<_>>())
            .field("middleware", &self.middleware.len())
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

impl Command {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            handler: None,
            short_help: String::new(),
            long_help: String::new(),
            aliases: Vec::new(),
            definitions: IndexMap::new(),
            subcommands: IndexMap::new(),
            middleware: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn short_help(&self) -> &str {
        &self.short_help
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn definitions(&self) -> impl Iterator<Item = &Definition> {
        self.definitions.values()
    }

    pub fn subcommands(&self) -> impl Iterator<Item = &Command> {
        self.subcommands.values()
    }

    fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.aliases.iter().any(|a| a == name)
    }

    /// Subcommand by name or alias.
    pub fn find_subcommand(&self, name: &str) -> Option<&Command> {
        self.subcommands
            .get(name)
            .or_else(|| self.subcommands.values().find(|c| c.answers_to(name)))
    }

    /// Help text: description, options, subcommands.
    pub fn help(&self) -> String {
        let mut out = String::new();

        let text = if self.long_help.is_empty() {
            &self.short_help
        } else {
            &self.long_help
        };
        if !text.is_empty() {
            out.push_str(text);
            out.push_str("\n\n");
        }

        if !self.definitions.is_empty() {
            out.push_str("Options:\n");
            for def in self.definitions.values() {
                let flag = match def.flag() {
                    Some(flag) => format!("--{flag}"),
                    None => format!("--{}", def.key().replace('_', "-").to_lowercase()),
                };
                let required = if def.is_required() { " (required)" } else { "" };
                let default = match def.default_value() {
                    Some(_) if def.is_secret() => " (default: [hidden])".to_string(),
                    Some(value) => format!(" (default: {value})"),
                    None => String::new(),
                };
                let _ = writeln!(
                    out,
                    "  {flag:<20} {}{required}{default}",
                    def.description().unwrap_or_default()
                );
            }
            out.push('\n');
        }

        if !self.subcommands.is_empty() {
            out.push_str("Subcommands:\n");
            for sub in self.subcommands.values() {
                write_listing_line(&mut out, sub);
            }
        }
        out
    }
}

fn write_listing_line(out: &mut String, command: &Command) {
    let aliases = if command.aliases.is_empty() {
        String::new()
    } else {
        format!(" (aliases: {})", command.aliases.join(", "))
    };
    let _ = writeln!(
        out,
        "  {:<12} {}{aliases}",
        command.name, command.short_help
    );
}

/// Chained setup for a registered command.
pub struct CommandBuilder<'a> {
    cmd: &'a mut Command,
}

impl CommandBuilder<'_> {
    pub fn handler<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&mut CommandContext<'_>) -> Result<(), CommandError> + Send + Sync + 'static,
    {
        self.cmd.handler = Some(handler(f));
        self
    }

    pub fn short_help(&mut self, text: &str) -> &mut Self {
        self.cmd.short_help = text.to_string();
        self
    }

    pub fn long_help(&mut self, text: &str) -> &mut Self {
        self.cmd.long_help = text.to_string();
        self
    }

    pub fn aliases<I, S>(&mut self, aliases: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cmd.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    /// Declare command-scoped keys.
    pub fn config<F>(&mut self, f: F) -> &mut Self
    where
        F: FnOnce(&mut CommandConfig<'_>),
    {
        f(&mut CommandConfig {
            definitions: &mut self.cmd.definitions,
        });
        self
    }

    /// Register (or replace) subcommand `name` and set it up with `f`.
    pub fn subcommand<F>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: FnOnce(&mut CommandBuilder<'_>),
    {
        let sub = match self.cmd.subcommands.entry(name.to_string()) {
            indexmap::map::Entry::Occupied(mut slot) => {
                slot.insert(Command::new(name));
                slot.into_mut()
            }
            indexmap::map::Entry::Vacant(slot) => slot.insert(Command::new(name)),
        };
        f(&mut CommandBuilder { cmd: sub });
        self
    }

    /// Add middleware around this command's handler.
    pub fn middleware(&mut self, mw: Middleware) -> &mut Self {
        self.cmd.middleware.push(mw);
        self
    }
}

/// Definition scope of one command.
pub struct CommandConfig<'a> {
    definitions: &'a mut IndexMap<String, Definition>,
}

impl CommandConfig<'_> {
    pub fn define(&mut self, key: &str) -> DefinitionBuilder<'_> {
        define_in(self.definitions, key)
    }
}

/// The innermost link of the global chain: build the command scope, then run
/// the command's own middleware and handler.
fn command_runner(command: &Command) -> CommandFn {
    let name = command.name.clone();
    let definitions = command.definitions.clone();
    let command_handler = command.handler.clone();
    let command_middleware = command.middleware.clone();

    handler(move |ctx| {
        let Some(mut run) = command_handler.clone() else {
            return Err(CommandError::NoHandler(name.clone()));
        };
        let scoped = ctx.config().command_scope(&name, &definitions, &ctx.args)?;
        ctx.enter_scope(scoped);

        for mw in command_middleware.iter().rev() {
            run = mw(run);
        }
        run(ctx)
    })
}

// -- Dispatch -------------------------------------------------------------------

impl Config {
    /// Register (or replace) top-level command `name`.
    pub fn command(&mut self, name: &str) -> CommandBuilder<'_> {
        let cmd = match self.commands.entry(name.to_string()) {
            indexmap::map::Entry::Occupied(mut slot) => {
                slot.insert(Command::new(name));
                slot.into_mut()
            }
            indexmap::map::Entry::Vacant(slot) => slot.insert(Command::new(name)),
        };
        CommandBuilder { cmd }
    }

    /// Top-level command by name or alias.
    pub fn find_command(&self, name: &str) -> Option<&Command> {
        self.commands
            .get(name)
            .or_else(|| self.commands.values().find(|c| c.answers_to(name)))
    }

    pub fn commands(&self) -> impl Iterator<Item = &Command> {
        self.commands.values()
    }

    /// Add middleware around every command. The first one added runs
    /// outermost.
    pub fn use_middleware(&mut self, mw: Middleware) {
        self.middleware.push(mw);
    }

    /// Add middleware that only wraps the named top-level commands.
    pub fn use_middleware_for_commands<I, S>(&mut self, names: I, mw: Middleware)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        self.use_middleware(middleware(move |next: CommandFn| {
            let wrapped = mw(Arc::clone(&next));
            let names = names.clone();
            handler(move |ctx| {
                if names.contains(&ctx.command) {
                    wrapped(ctx)
                } else {
                    next(ctx)
                }
            })
        }));
    }

    /// Add middleware that only wraps the named subcommands of `command`.
    pub fn use_middleware_for_subcommands<I, S>(&mut self, command: &str, subcommands: I, mw: Middleware)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let command = command.to_string();
        let subcommands: Vec<String> = subcommands.into_iter().map(Into::into).collect();
        self.use_middleware(middleware(move |next: CommandFn| {
            let wrapped = mw(Arc::clone(&next));
            let command = command.clone();
            let subcommands = subcommands.clone();
            handler(move |ctx| {
                let selected = ctx.command == command
                    && ctx
                        .subcommand
                        .as_ref()
                        .is_some_and(|sub| subcommands.contains(sub));
                if selected { wrapped(ctx) } else { next(ctx) }
            })
        }));
    }

    /// Dispatch `args`, where `args[0]` is the program name.
    ///
    /// With no command the global config is processed and the global help
    /// printed. `help`, `--help` and `-h` print help. Otherwise the named
    /// command (or alias) runs, with its subcommand when the next argument
    /// names one.
    pub fn execute<S: AsRef<str>>(&mut self, args: &[S]) -> Result<(), CommandError> {
        let args: Vec<String> = args.iter().map(|a| a.as_ref().to_string()).collect();
        let program = args.first().map_or("app", String::as_str);

        let Some(name) = args.get(1) else {
            let errors = self.process();
            if !errors.is_empty() {
                self.print_errors(&errors);
                return Err(CommandError::Configuration(errors));
            }
            print!("{}", self.global_help(program));
            return Ok(());
        };

        if is_help(name) {
            match args.get(2) {
                Some(topic) => print!("{}", self.command_help(program, topic)?),
                None => print!("{}", self.global_help(program)),
            }
            return Ok(());
        }

        let command = self
            .find_command(name)
            .ok_or_else(|| CommandError::UnknownCommand {
                name: name.clone(),
                suggestions: self.suggestions(name),
            })?;

        let mut rest = args[2..].to_vec();
        if rest.first().is_some_and(|a| a == "--help" || a == "-h") {
            print!("{}", self.command_help(program, &command.name)?);
            return Ok(());
        }

        let mut target = command;
        let mut subcommand = None;
        if let Some(sub) = rest.first().and_then(|a| command.find_subcommand(a)) {
            subcommand = Some(sub.name.clone());
            target = sub;
            rest.remove(0);
        }

        info!(
            event = "confkit.command.dispatch",
            command = %command.name,
            subcommand = subcommand.as_deref().unwrap_or(""),
        );

        let mut ctx = CommandContext::new(self, command.name.clone(), rest);
        ctx.subcommand = subcommand;

        let mut run = command_runner(target);
        for mw in self.middleware.iter().rev() {
            run = mw(run);
        }
        let result = run(&mut ctx);
        match &result {
            Ok(()) => debug!(event = "confkit.command.completed", command = %ctx.command),
            Err(e) => debug!(event = "confkit.command.failed", command = %ctx.command, error = %e),
        }
        result
    }

    /// Overlay `definitions` on the global ones and resolve them against
    /// `args`, recording where the command redefines a global key.
    pub(crate) fn command_scope(
        &self,
        command: &str,
        definitions: &IndexMap<String, Definition>,
        args: &[String],
    ) -> Result<Config, CommandError> {
        let mut merged = self.definitions.clone();
        for (key, def) in definitions {
            merged.insert(key.clone(), def.clone());
        }

        let mut scoped = self.child(merged, args.to_vec());
        let errors = scoped.process();
        if !errors.is_empty() {
            return Err(CommandError::Configuration(errors));
        }

        let warnings = overrides::command_overrides(command, &self.definitions, definitions, |key| {
            self.display_value(key)
        });
        if warnings.has_warnings() {
            warnings.log_warnings();
        }
        scoped.override_warnings.extend(warnings);
        Ok(scoped)
    }

    /// Top-level usage and command listing.
    pub fn global_help(&self, program: &str) -> String {
        let mut out = format!("Usage: {program} <command> [options]\n\nAvailable commands:\n\n");
        for command in self.commands.values() {
            write_listing_line(&mut out, command);
        }
        let _ = writeln!(out, "\nUse '{program} <command> --help' for command-specific help");
        out
    }

    /// Usage and help for one command.
    pub fn command_help(&self, program: &str, name: &str) -> Result<String, CommandError> {
        let command = self
            .find_command(name)
            .ok_or_else(|| CommandError::UnknownCommand {
                name: name.to_string(),
                suggestions: self.suggestions(name),
            })?;
        Ok(format!(
            "Usage: {program} {} [options]\n\n{}\n",
            command.name,
            command.help()
        ))
    }

    /// Command names within edit distance 3 of `input`.
    fn suggestions(&self, input: &str) -> String {
        let close: Vec<&str> = self
            .commands
            .keys()
            .filter(|name| levenshtein(input, name) <= 3)
            .map(String::as_str)
            .collect();
        if close.is_empty() {
            "no similar commands found".to_string()
        } else {
            close.join(", ")
        }
    }
}

/// Edit distance over characters.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
