use std::io;
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    prelude::*,
    EnvFilter,
};

/// Initialize the logging system with colors and build information
pub fn init_logging(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let filter = if verbose {
        "debug,parkpro_backend=trace,actix_web=debug"
    } else {
        "info,parkpro_backend=info,actix_web=info"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap();

    let use_ansi = atty::is(atty::Stream::Stdout);
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_ansi(use_ansi)
        .with_file(true)
        .with_line_number(true)
        .with_writer(io::stdout);

    // Forward log crate records to tracing
    let _ = tracing_log::LogTracer::init();

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();

    // First log line: PID
    tracing::info!("PID={} starting up", std::process::id());

    Ok(())
}

/// Print build and version information
pub fn print_build_info() {
    let name = env!("CARGO_PKG_NAME");
    let version = option_env!("APP_BUILD_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"));
    let build_timestamp = option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown");
    let git_branch = option_env!("VERGEN_GIT_BRANCH").unwrap_or("no-git");
    let git_sha_full = option_env!("VERGEN_GIT_SHA").unwrap_or("00000000");
    let git_commit = git_sha_full.chars().take(8).collect::<String>();
    let rust_version = option_env!("VERGEN_RUSTC_SEMVER").unwrap_or("unknown");
    let desc = option_env!("APP_PKG_DESCRIPTION").unwrap_or("");
    let bin_name = option_env!("APP_BIN_FILENAME").unwrap_or("");

    println!();
    println!("{} v{} [{} @ {}]", name, version, git_branch, git_commit);
    if !desc.is_empty() {
        println!("  {}", desc);
    }
    println!("  built {} with rustc {}", build_timestamp, rust_version);
    if !bin_name.is_empty() {
        println!("  artifact {}", bin_name);
    }
    println!();
}

/// Log server startup information
pub fn log_server_startup(name: &str, host: &str, port: u16) {
    tracing::info!("🚀 {} starting on http://{}:{}", name, host, port);
}

/// Log CLI command execution
pub fn log_command_start(command: &str, description: &str) {
    tracing::info!("⚡ Executing: {} ({})", command, description);
}

/// Log command completion
pub fn log_command_complete(command: &str, success: bool, duration: std::time::Duration) {
    if success {
        tracing::info!("✅ Command '{}' completed in {:.2?}", command, duration);
    } else {
        tracing::error!("❌ Command '{}' failed after {:.2?}", command, duration);
    }
}

/// Log collection operation status
pub fn log_collection_operation(operation: &str, collection: &str, count: Option<usize>, success: bool) {
    let icon = match operation {
        "seed" => "📝",
        "clear" => "🗑️",
        "dump" => "💾",
        _ => "🔄",
    };

    if success {
        let count_text = count
            .map(|c| format!(" ({} records)", c))
            .unwrap_or_default();
        tracing::info!(
            "{} {} collection {}{}",
            icon,
            operation.to_uppercase(),
            collection,
            count_text
        );
    } else {
        tracing::error!("❌ Failed to {} collection {}", operation, collection);
    }
}

/// Log warning with icon
pub fn log_warning(message: &str) {
    tracing::warn!("⚠️ {}", message);
}

/// Log error with icon
pub fn log_error(message: &str) {
    tracing::error!("❌ {}", message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        // Second call hits the already-initialized branch and must not error
        assert!(init_logging(false).is_ok());
        assert!(init_logging(true).is_ok());
    }

    #[test]
    fn build_info_prints_without_panicking() {
        print_build_info();
    }
}
