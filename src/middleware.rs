//! Ready-made [`Middleware`] for common cross-cutting concerns.
//!
//! Every constructor returns a fresh middleware; state that has to outlive a
//! single invocation (the rate-limit window) is created by the constructor
//! and shared by every chain built from it.

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::codec::format_duration;
use crate::command::{CommandContext, CommandFn, Middleware, handler, middleware};
use crate::config::Config;
use crate::error::CommandError;

const ADMIN_PREFIX: &str = "admin-";

/// Log command start, then hand the elapsed time to `report`.
pub fn logging<F>(report: F) -> Middleware
where
    F: Fn(&CommandContext<'_>, Duration) + Send + Sync + 'static,
{
    let report = Arc::new(report);
    middleware(move |next: CommandFn| {
        let report = Arc::clone(&report);
        handler(move |ctx| {
            let start = Instant::now();
            info!(
                event = "confkit.command.started",
                command = %ctx.command,
                subcommand = ctx.subcommand.as_deref().unwrap_or(""),
            );
            let result = next(ctx);
            report(ctx, start.elapsed());
            result
        })
    })
}

/// [`logging`] that reports success or failure from the `error` context key.
pub fn default_logging() -> Middleware {
    logging(|ctx, elapsed| {
        if ctx.contains("error") {
            warn!(
                event = "confkit.command.finished",
                command = %ctx.command,
                status = "failed",
                elapsed_ms = elapsed.as_millis() as u64,
            );
        } else {
            info!(
                event = "confkit.command.finished",
                command = %ctx.command,
                status = "success",
                elapsed_ms = elapsed.as_millis() as u64,
            );
        }
    })
}

/// Run `check` before the command; a failure stops the chain with
/// [`CommandError::AuthFailed`].
pub fn auth<F>(check: F) -> Middleware
where
    F: Fn(&mut CommandContext<'_>) -> Result<(), String> + Send + Sync + 'static,
{
    let check = Arc::new(check);
    middleware(move |next: CommandFn| {
        let check = Arc::clone(&check);
        handler(move |ctx| {
            if let Err(reason) = check(ctx) {
                warn!(event = "confkit.auth.failed", command = %ctx.command, reason = %reason);
                return Err(CommandError::AuthFailed(reason));
            }
            info!(event = "confkit.auth.succeeded", command = %ctx.command);
            next(ctx)
        })
    })
}

/// Plain or secret value of `key`, when set and non-empty.
fn read_token(config: &Config, key: &str) -> Option<String> {
    if !config.has(key) {
        return None;
    }
    let token = if config.is_secret(key) {
        let secret = config.get_secret(key);
        secret.is_set().then(|| secret.as_str().to_string())?
    } else {
        config.try_get::<String>(key).ok()?
    };
    (!token.is_empty()).then_some(token)
}

/// Require a token under config key `key` and store it as `auth_token`.
pub fn token_auth(key: &str) -> Middleware {
    let key = key.to_string();
    auth(move |ctx| {
        let token = read_token(ctx.config(), &key)
            .ok_or_else(|| format!("missing authentication token (config key: {key})"))?;
        ctx.set("auth_token", token);
        Ok(())
    })
}

/// Hand failures to `on_error` after storing their message as `error`.
pub fn error_handling<F>(on_error: F) -> Middleware
where
    F: Fn(&CommandError, &CommandContext<'_>) + Send + Sync + 'static,
{
    let on_error = Arc::new(on_error);
    middleware(move |next: CommandFn| {
        let on_error = Arc::clone(&on_error);
        handler(move |ctx| {
            let result = next(ctx);
            if let Err(e) = &result {
                ctx.set("error", e.to_string());
                on_error(e, ctx);
            }
            result
        })
    })
}

pub fn default_error_handling() -> Middleware {
    error_handling(|e, ctx| {
        error!(event = "confkit.command.error", command = %ctx.command, error = %e);
    })
}

/// Store the execution time as `duration`.
pub fn timing() -> Middleware {
    middleware(|next: CommandFn| {
        handler(move |ctx| {
            let start = Instant::now();
            let result = next(ctx);
            let elapsed = start.elapsed();
            ctx.set("duration", elapsed);
            info!(
                event = "confkit.command.timed",
                command = %ctx.command,
                elapsed = %format_duration(elapsed),
            );
            result
        })
    })
}

/// Apply `inner` only to invocations where `predicate` holds.
pub fn conditional<P>(predicate: P, inner: Middleware) -> Middleware
where
    P: Fn(&CommandContext<'_>) -> bool + Send + Sync + 'static,
{
    let predicate = Arc::new(predicate);
    middleware(move |next: CommandFn| {
        let predicate = Arc::clone(&predicate);
        let wrapped = inner(Arc::clone(&next));
        handler(move |ctx| {
            if predicate(ctx) {
                wrapped(ctx)
            } else {
                next(ctx)
            }
        })
    })
}

/// Require one of `accepted` tokens (config key `token_key`) for commands
/// named `admin-*`.
pub fn admin_only<I, S>(token_key: &str, accepted: I) -> Middleware
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let token_key = token_key.to_string();
    let accepted: Vec<String> = accepted.into_iter().map(Into::into).collect();
    conditional(
        |ctx| ctx.command.len() > ADMIN_PREFIX.len() && ctx.command.starts_with(ADMIN_PREFIX),
        auth(move |ctx| {
            let token = read_token(ctx.config(), &token_key).ok_or_else(|| {
                format!("admin commands require authentication token (config key: {token_key})")
            })?;
            if !accepted.contains(&token) {
                return Err("invalid admin token".to_string());
            }
            Ok(())
        }),
    )
}

/// Turn a panic in the rest of the chain into [`CommandError::Panicked`],
/// storing the panic message as `panic`.
pub fn recovery() -> Middleware {
    middleware(|next: CommandFn| {
        handler(move |ctx| match catch_unwind(AssertUnwindSafe(|| next(ctx))) {
            Ok(result) => result,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(event = "confkit.command.panicked", command = %ctx.command, message = %message);
                ctx.set("panic", message.clone());
                Err(CommandError::Panicked {
                    command: ctx.command.clone(),
                    message,
                })
            }
        })
    })
}

/// Allow at most `max` executions in any sliding `window`.
///
/// The window is shared by every invocation through this middleware value.
/// The current count (this run included) is stored as `execution_count`.
pub fn rate_limit(max: usize, window: Duration) -> Middleware {
    let history: Arc<Mutex<VecDeque<Instant>>> = Arc::new(Mutex::new(VecDeque::new()));
    middleware(move |next: CommandFn| {
        let history = Arc::clone(&history);
        handler(move |ctx| {
            let count = {
                let now = Instant::now();
                let mut history = history.lock();
                while history
                    .front()
                    .is_some_and(|t| now.duration_since(*t) >= window)
                {
                    history.pop_front();
                }
                if history.len() >= max {
                    warn!(event = "confkit.command.rate_limited", command = %ctx.command, max);
                    return Err(CommandError::RateLimited {
                        max,
                        window: format_duration(window),
                    });
                }
                history.push_back(now);
                history.len()
            };
            ctx.set("execution_count", count);
            info!(event = "confkit.command.rate_checked", command = %ctx.command, count, max);
            next(ctx)
        })
    })
}

/// Hand the elapsed time and outcome of every run to `collect`.
pub fn metrics<F>(collect: F) -> Middleware
where
    F: Fn(&CommandContext<'_>, Duration, &Result<(), CommandError>) + Send + Sync + 'static,
{
    let collect = Arc::new(collect);
    middleware(move |next: CommandFn| {
        let collect = Arc::clone(&collect);
        handler(move |ctx| {
            let start = Instant::now();
            let result = next(ctx);
            collect(ctx, start.elapsed(), &result);
            result
        })
    })
}

pub fn default_metrics() -> Middleware {
    metrics(|ctx, elapsed, result| {
        info!(
            event = "confkit.command.metrics",
            command = %ctx.command,
            elapsed_ms = elapsed.as_millis() as u64,
            status = if result.is_ok() { "success" } else { "error" },
        );
    })
}
