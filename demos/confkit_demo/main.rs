//! # confkit demo application
//!
//! A sample CLI tool that showcases how an application wires up confkit. It
//! is **not** a real app and exists to demonstrate and manually verify
//! confkit's features.
//!
//! ## Running
//!
//! ```sh
//! API_KEY=demo-secret cargo run --example confkit_demo -- serve
//! API_KEY=demo-secret cargo run --example confkit_demo -- config list
//! ```
//!
//! ## Features demonstrated
//!
//! | Feature              | How to exercise it                                                   |
//! |----------------------|----------------------------------------------------------------------|
//! | Compiled defaults    | `API_KEY=demo-secret cargo run --example confkit_demo -- serve`      |
//! | Env var source       | `PORT=9999 API_KEY=demo-secret cargo run --example confkit_demo -- serve` |
//! | Flag source          | `... -- serve --port 7000`                                           |
//! | Config file          | Create `confkit-demo.yaml` in cwd, then run `serve`                  |
//! | Environments         | `CONFKIT_ENV=production ...` with an `environments` table in the file |
//! | Validation errors    | `PORT=0 API_KEY=x cargo run --example confkit_demo -- serve`         |
//! | Command-scoped keys  | `... -- serve --workers 8`                                           |
//! | Subcommands          | `... -- config get PORT`                                             |
//! | Rate limiting        | `deploy` allows two runs per minute within one process               |
//! | Tracing              | `RUST_LOG=confkit=debug ...`                                         |

use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use confkit::middleware::{default_error_handling, default_logging, rate_limit, recovery, timing};
use confkit::{CommandContext, CommandError, Config, ConfigAction};

const CONFIG_FILE: &str = "confkit-demo.yaml";

fn define_globals(config: &mut Config) {
    config
        .define("PORT")
        .int64()
        .env("PORT")
        .flag("port")
        .default(8080)
        .range(1.0, 65535.0)
        .description("HTTP listen port");
    config
        .define("HOST")
        .env("HOST")
        .flag("host")
        .default("localhost")
        .description("Bind address");
    config
        .define("API_KEY")
        .env("API_KEY")
        .required()
        .secret()
        .min_length(8)
        .description("Key presented to upstream services");
    config
        .define("TIMEOUT")
        .duration()
        .env("TIMEOUT")
        .default(Duration::from_secs(30))
        .duration_range(Duration::from_secs(1), Duration::from_secs(300))
        .description("Request timeout");
    config
        .define("LOG_LEVEL")
        .env("LOG_LEVEL")
        .default("info")
        .one_of(["debug", "info", "warn", "error"]);
}

fn run_action(ctx: &CommandContext<'_>, action: ConfigAction) -> Result<(), CommandError> {
    let result = ctx
        .config()
        .handle(&action)
        .map_err(|e| CommandError::msg(e.to_string()))?;
    println!("{result}");
    Ok(())
}

fn register_commands(config: &mut Config) {
    config
        .command("serve")
        .short_help("Start the demo server")
        .long_help("Prints the resolved listen address instead of binding a socket.")
        .aliases(["s", "run"])
        .config(|scope| {
            scope
                .define("WORKERS")
                .int64()
                .flag("workers")
                .default(4)
                .range(1.0, 64.0)
                .description("Worker threads");
        })
        .handler(|ctx| {
            let config = ctx.config();
            println!(
                "listening on {}:{} with {} workers (timeout {:?})",
                config.get_string("HOST"),
                config.get_int64("PORT"),
                config.get_int64("WORKERS"),
                config.get_duration("TIMEOUT"),
            );
            if config.has_override_warnings() {
                config.print_override_warnings();
            }
            Ok(())
        });

    config
        .command("config")
        .short_help("Inspect the resolved configuration")
        .handler(|ctx| run_action(ctx, ConfigAction::List))
        .subcommand("list", |sub| {
            sub.short_help("Show every key")
                .handler(|ctx| run_action(ctx, ConfigAction::List));
        })
        .subcommand("get", |sub| {
            sub.short_help("Show one key").handler(|ctx| {
                let key = ctx
                    .args
                    .first()
                    .cloned()
                    .ok_or_else(|| CommandError::msg("usage: config get <KEY>"))?;
                run_action(ctx, ConfigAction::Get { key })
            });
        })
        .subcommand("help", |sub| {
            sub.short_help("Describe every key")
                .handler(|ctx| run_action(ctx, ConfigAction::Help));
        });

    config
        .command("deploy")
        .short_help("Pretend to deploy, at most twice a minute")
        .middleware(rate_limit(2, Duration::from_secs(60)))
        .handler(|ctx| {
            println!("deploying {}", ctx.config().get_string("HOST"));
            Ok(())
        });
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::new();
    define_globals(&mut config);

    if Path::new(CONFIG_FILE).exists() {
        if let Err(e) = config.load_file(CONFIG_FILE) {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
        if let Err(e) = config.set_environment_from_env("CONFKIT_ENV") {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    }

    register_commands(&mut config);
    config.use_middleware(recovery());
    config.use_middleware(default_error_handling());
    config.use_middleware(default_logging());
    config.use_middleware(timing());

    let args: Vec<String> = std::env::args().collect();
    let result = config.execute(&args);
    config.destroy();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        // Without a command, execute() has already printed these.
        Err(CommandError::Configuration(errors)) => {
            if args.len() > 1 {
                eprint!("{}", confkit::format_errors(&errors));
            }
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
