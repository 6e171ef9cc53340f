// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Throwaway Postgres clusters for tests. [TempDb] runs `initdb` in a temporary directory, starts
//! a `postgres` server on a free port, and tears both down on drop. The Postgres binaries are
//! looked up on `PATH`, or in `$POSTGRES_BIN` when set.

use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use tracing::{info, trace, warn};
use url::Url;

/// How long to wait for a freshly started server to accept connections.
const STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

/// A Postgres cluster that lives as long as this value, in its own temporary directory.
pub struct TempDb {
    database: LocalDatabase,

    // Dropped after `database`, so the server stops before its data directory is removed.
    dir: tempfile::TempDir,
}

/// A Postgres server running out of a local data directory.
pub struct LocalDatabase {
    dir: PathBuf,
    port: u16,
    url: Url,
    process: Option<Child>,
}

impl TempDb {
    /// Initialize a cluster in a new temporary directory and start it on an available port.
    pub fn new() -> anyhow::Result<Self> {
        let dir = tempfile::TempDir::new().context("Failed to create temporary directory")?;
        let port = get_available_port();
        let database = LocalDatabase::new_initdb(dir.path().to_owned(), port)?;
        Ok(Self { database, dir })
    }

    pub fn database(&self) -> &LocalDatabase {
        &self.database
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

impl LocalDatabase {
    /// Run `initdb` in `dir`, then start a server on `port`.
    pub fn new_initdb(dir: PathBuf, port: u16) -> anyhow::Result<Self> {
        let data = dir.join("data");
        let output = pg_command("initdb")
            .arg("-D")
            .arg(&data)
            .args(["-U", "postgres", "--auth=trust", "--no-instructions"])
            .output()
            .context("Failed to run initdb")?;
        if !output.status.success() {
            bail!(
                "initdb failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let url = Url::parse(&format!("postgres://postgres@localhost:{port}/postgres"))?;
        let mut database = Self {
            dir,
            port,
            url,
            process: None,
        };
        database.start()?;
        Ok(database)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    fn start(&mut self) -> anyhow::Result<()> {
        if self.process.is_some() {
            return Ok(());
        }

        let log = std::fs::File::create(self.dir.join("postgres.log"))?;
        let child = pg_command("postgres")
            .arg("-D")
            .arg(self.dir.join("data"))
            .args(["-p", &self.port.to_string()])
            .args(["-c", "listen_addresses=localhost"])
            .args(["-c", "unix_socket_directories="])
            .args(["-c", "fsync=off"])
            .stdout(Stdio::null())
            .stderr(log)
            .spawn()
            .context("Failed to start postgres")?;
        self.process = Some(child);

        self.wait_till_ready()?;
        info!(url = %self.url, "Started temporary database");
        Ok(())
    }

    fn wait_till_ready(&mut self) -> anyhow::Result<()> {
        let started = Instant::now();
        loop {
            if let Some(child) = self.process.as_mut() {
                if let Some(status) = child.try_wait()? {
                    bail!(
                        "postgres exited during startup with {status}, see {}",
                        self.dir.join("postgres.log").display()
                    );
                }
            }

            let ready = pg_command("pg_isready")
                .args(["-h", "localhost", "-p", &self.port.to_string(), "-U", "postgres"])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .context("Failed to run pg_isready")?;
            if ready.success() {
                return Ok(());
            }

            if started.elapsed() > STARTUP_TIMEOUT {
                bail!("postgres did not accept connections within {STARTUP_TIMEOUT:?}");
            }
            trace!(port = self.port, "Waiting for postgres");
            std::thread::sleep(Duration::from_millis(50));
        }
    }

    fn stop(&mut self) {
        let Some(mut child) = self.process.take() else {
            return;
        };
        if let Err(e) = child.kill() {
            warn!("Failed to stop postgres: {e}");
        }
        let _ = child.wait();
    }
}

impl Drop for LocalDatabase {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Ask the OS for a port nobody is listening on.
pub fn get_available_port() -> u16 {
    const MAX_ATTEMPTS: usize = 100;
    for _ in 0..MAX_ATTEMPTS {
        if let Ok(listener) = TcpListener::bind(("127.0.0.1", 0)) {
            if let Ok(addr) = listener.local_addr() {
                return addr.port();
            }
        }
    }
    panic!("No available port after {MAX_ATTEMPTS} attempts");
}

fn pg_command(program: &str) -> Command {
    match std::env::var_os("POSTGRES_BIN") {
        Some(bin) => Command::new(Path::new(&bin).join(program)),
        None => Command::new(program),
    }
}
