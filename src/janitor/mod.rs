//! Bulk status and teardown of builder-owned servers.
//!
//! The janitor backs the `status` and `destroy` commands. Discovery is always
//! scoped by the ownership label, and servers are processed one at a time in
//! the order the provider returned them. A failure on one server is reported
//! on its own line and never hides the outcome for the others.

use std::io::{self, Write};

use thiserror::Error;
use tracing::{info, warn};

use crate::hetzner::{CloudApi, HetznerClient, HetznerError, ManagedServer};

const STATUS_HEADER: [&str; 5] = ["ID", "NAME", "STATUS", "IPv4", "RESCUE"];
const COLUMN_PADDING: usize = 3;

/// Outcome of a bulk destroy.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DestroySummary {
    /// Servers the provider deleted.
    pub destroyed: usize,
    /// Servers that were already gone.
    pub skipped: usize,
    /// Servers whose deletion failed.
    pub failed: usize,
}

impl DestroySummary {
    /// Returns `true` when every discovered server was handled.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Errors returned by the janitor.
#[derive(Debug, Error)]
pub enum JanitorError {
    /// Discovery of managed servers failed.
    #[error("failed to list servers: {0}")]
    List(#[from] HetznerError),
    /// Writing the report failed.
    #[error("failed to write report: {0}")]
    Output(#[from] io::Error),
}

/// Reports on and removes every server carrying the ownership label.
#[derive(Clone, Debug)]
pub struct Janitor<A: CloudApi> {
    client: HetznerClient<A>,
}

impl<A: CloudApi> Janitor<A> {
    /// Creates a janitor over the given lifecycle client.
    #[must_use]
    pub const fn new(client: HetznerClient<A>) -> Self {
        Self { client }
    }

    /// Writes a table of managed servers to `out`.
    ///
    /// Returns the number of servers found.
    ///
    /// # Errors
    ///
    /// Returns [`JanitorError`] when discovery fails or `out` rejects a write.
    pub async fn print_status(&self, out: &mut impl Write) -> Result<usize, JanitorError> {
        let servers = self.client.list_servers().await?;
        if servers.is_empty() {
            info!("No BlackBSD servers found.");
            return Ok(0);
        }

        let rows: Vec<[String; 5]> = servers.iter().map(status_row).collect();
        write_table(out, &rows)?;
        writeln!(out)?;
        writeln!(out, "Found {} BlackBSD server(s).", servers.len())?;
        Ok(servers.len())
    }

    /// Deletes every managed server, reporting each outcome on its own line.
    ///
    /// Per-server failures are written to `out` and counted in the summary;
    /// they do not stop the remaining deletions.
    ///
    /// # Errors
    ///
    /// Returns [`JanitorError`] when discovery fails or `out` rejects a write.
    pub async fn destroy_all(&self, out: &mut impl Write) -> Result<DestroySummary, JanitorError> {
        let servers = self.client.list_servers().await?;
        let mut summary = DestroySummary::default();
        if servers.is_empty() {
            info!("No BlackBSD servers to destroy.");
            return Ok(summary);
        }

        writeln!(out, "Destroying {} BlackBSD server(s)...", servers.len())?;
        for server in &servers {
            write!(out, "  {} ({})... ", server.name, server.id)?;
            match self.client.delete_server(server).await {
                Ok(true) => {
                    summary.destroyed += 1;
                    writeln!(out, "destroyed")?;
                }
                Ok(false) => {
                    summary.skipped += 1;
                    writeln!(out, "not found (skipped)")?;
                }
                Err(err) => {
                    summary.failed += 1;
                    warn!(server_id = server.id, error = %err, "delete failed");
                    writeln!(out, "error: {err}")?;
                }
            }
        }
        writeln!(out)?;
        writeln!(out, "Done.")?;
        Ok(summary)
    }
}

fn status_row(server: &ManagedServer) -> [String; 5] {
    [
        server.id.to_string(),
        server.name.clone(),
        server.status.to_string(),
        server.ipv4_display(),
        String::from(if server.rescue_enabled { "yes" } else { "no" }),
    ]
}

fn write_table(out: &mut impl Write, rows: &[[String; 5]]) -> io::Result<()> {
    let header = STATUS_HEADER.map(str::to_owned);
    let mut widths = [0_usize; 5];
    for row in std::iter::once(&header).chain(rows) {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    for row in std::iter::once(&header).chain(rows) {
        let mut line = String::new();
        let mut cells = row.iter().zip(widths).peekable();
        while let Some((cell, width)) = cells.next() {
            if cells.peek().is_some() {
                line.push_str(&format!("{cell:<pad$}", pad = width + COLUMN_PADDING));
            } else {
                line.push_str(cell);
            }
        }
        writeln!(out, "{line}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests;
