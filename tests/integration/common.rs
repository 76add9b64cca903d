//! Shared helpers: fake usql scripts and test contexts.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use usql_gate::connection::ConnectionRegistry;
use usql_gate::error::{GateError, Result};
use usql_gate::handler::{AppContext, QueryHandler};
use usql_gate::install::{BinaryLocator, LocatorConfig, ReleaseFetcher};
use usql_gate::query::QueryRunner;

/// Script body that prints its arguments as a JSON array of strings.
pub const ECHO_ARGS: &str = r#"printf '['
sep=''
for arg in "$@"; do
  printf '%s"%s"' "$sep" "$arg"
  sep=','
done
printf ']'
"#;

/// Fetcher for tests that must never reach the network.
pub struct NoNetwork;

#[async_trait]
impl ReleaseFetcher for NoNetwork {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        Err(GateError::download(format!("network disabled in tests: {url}")))
    }
}

/// Writes an executable `/bin/sh` script named `name` into `dir`.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Writes a fake usql that records each invocation in `<dir>/invoked`.
#[cfg(unix)]
pub fn fake_usql(dir: &Path, body: &str) -> PathBuf {
    let marker = dir.join("invoked");
    write_script(
        dir,
        "usql",
        &format!("echo called >> '{}'\n{body}", marker.display()),
    )
}

/// True if a script written by [`fake_usql`] in `dir` has run.
pub fn was_invoked(dir: &Path) -> bool {
    dir.join("invoked").exists()
}

/// Registry with a single Postgres-looking connection under number 1.
pub fn single_registry() -> ConnectionRegistry {
    ConnectionRegistry::from_vars([("DB_CS_1", "pg://user:pass@localhost/app")]).unwrap()
}

/// Safe-mode locator that only considers `usql_path`.
pub fn pinned_locator(usql_path: PathBuf) -> BinaryLocator {
    BinaryLocator::new(
        LocatorConfig {
            unsafe_install: false,
            usql_path: Some(usql_path),
            install_dir: PathBuf::from("."),
        },
        Arc::new(NoNetwork),
    )
    .with_search_path(None)
}

/// Handler over `registry` that runs the binary at `usql_path`.
pub fn handler_with(registry: ConnectionRegistry, usql_path: PathBuf) -> QueryHandler {
    QueryHandler::new(AppContext {
        registry,
        locator: pinned_locator(usql_path),
        runner: QueryRunner::new(Duration::from_secs(10)),
    })
}
