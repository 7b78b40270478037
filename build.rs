//! Build script rendering the `blackbsd` manual pages.
//!
//! Writes `blackbsd.1` plus one `blackbsd-<subcommand>.1` page per
//! subcommand into `OUT_DIR` for packaging.

use std::env;
use std::io::Write;

use camino::Utf8PathBuf;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli/mod.rs"]
mod cli;

use cli::Cli;

fn render(command: clap::Command) -> Result<Vec<u8>, std::io::Error> {
    let mut buffer = Vec::new();
    Man::new(command).render(&mut buffer)?;
    Ok(buffer)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout();
    writeln!(stdout, "cargo:rerun-if-changed=build.rs")?;
    writeln!(stdout, "cargo:rerun-if-changed=src/cli/mod.rs")?;

    let raw_out_dir = env::var_os("OUT_DIR").ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "OUT_DIR was not set")
    })?;
    let out_dir = Utf8PathBuf::try_from(std::path::PathBuf::from(raw_out_dir))?;
    let dir = Dir::open_ambient_dir(&out_dir, ambient_authority())?;

    let root = Cli::command();
    dir.write("blackbsd.1", render(root.clone())?)?;

    for sub in root.get_subcommands() {
        let page = format!("blackbsd-{}.1", sub.get_name());
        let titled = sub.clone().name(format!("blackbsd-{}", sub.get_name()));
        dir.write(&page, render(titled)?)?;
    }

    Ok(())
}
