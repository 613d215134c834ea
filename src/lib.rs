// Library root
// -----------
// Imports a photo-sharing export (its `media.json` manifest plus image
// files) into a Ghost blog through the blog's private API. The binary
// (`main.rs`) parses flags, loads the config and hands over to `migrate`.
//
// Module responsibilities:
// - `config`: the JSON settings file, env overrides and validation.
// - `export`: reads the export manifest into `MediaRecord`s.
// - `api`: blocking HTTP client for the token, upload and posts endpoints.
// - `post`: derives the post payload (slug, title, location body).
// - `migrate`: the driver that ties the above together for one run.
// - `ui`: progress bar, password prompt and console output.
pub mod api;
pub mod config;
pub mod export;
pub mod migrate;
pub mod post;
pub mod ui;

/// Initialize tracing for the CLI. `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
