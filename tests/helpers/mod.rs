//! Test helpers: a throwaway export directory and a config pointed at a
//! mockito server.

#![allow(dead_code)]

use instaghost_cli::config::{AuthConfig, Config};
use std::path::Path;
use tempfile::TempDir;

pub const API: &str = "/ghost/api/v0.1";
pub const TOKEN: &str = "tok-123";

/// One photo entry: (relative path, file contents, caption, location).
pub struct Photo {
    pub path: &'static str,
    pub contents: Option<&'static str>,
    pub caption: Option<&'static str>,
    pub location: Option<&'static str>,
}

impl Photo {
    pub fn new(path: &'static str, contents: &'static str) -> Self {
        Photo {
            path,
            contents: Some(contents),
            caption: None,
            location: None,
        }
    }

    /// Listed in the manifest but absent on disk.
    pub fn missing(path: &'static str) -> Self {
        Photo {
            path,
            contents: None,
            caption: None,
            location: None,
        }
    }
}

/// Write `media.json` plus the image files into a new temp dir.
pub fn export_dir(photos: &[Photo]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let entries: Vec<_> = photos
        .iter()
        .enumerate()
        .map(|(i, p)| {
            serde_json::json!({
                "path": p.path,
                "caption": p.caption,
                "location": p.location,
                "taken_at": format!("2018-01-0{}T12:00:00", i + 1),
            })
        })
        .collect();
    std::fs::write(
        dir.path().join("media.json"),
        serde_json::json!({ "photos": entries }).to_string(),
    )
    .unwrap();

    for p in photos {
        if let Some(contents) = p.contents {
            let file = dir.path().join(p.path);
            std::fs::create_dir_all(file.parent().unwrap()).unwrap();
            std::fs::write(file, contents).unwrap();
        }
    }
    dir
}

pub fn config_for(server_url: &str, export: &Path) -> Config {
    let mut config = Config::new(AuthConfig {
        username: "me@example.com".into(),
        password: "secret".into(),
        client_id: "ghost-admin".into(),
        client_secret: "000000000".into(),
    });
    config.blog_url = server_url.to_string();
    config.export_dir = export.to_path_buf();
    config.log_errors = true;
    config.request_timeout_secs = 5;
    config
}

pub fn token_mock(server: &mut mockito::ServerGuard) -> mockito::Mock {
    server
        .mock("POST", format!("{}/authentication/token", API).as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(format!(
            r#"{{"access_token":"{}","refresh_token":"r","expires_in":2628000,"token_type":"Bearer"}}"#,
            TOKEN
        ))
        .expect(1)
        .create()
}
