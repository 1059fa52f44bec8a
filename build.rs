//! Build script that renders man pages into the build output directory:
//! `nodeplan.1` for the tool and `nodeplan-<command>.1` for each subcommand.

use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Command, CommandFactory};
use clap_mangen::Man;

#[path = "src/cli/mod.rs"]
mod cli;

use cli::Cli;

fn render(command: Command, title: &str, out_dir: &Path) -> io::Result<()> {
    let mut buffer = Vec::new();
    Man::new(command).title(title).render(&mut buffer)?;
    fs::write(out_dir.join(format!("{title}.1")), buffer)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = io::stdout();
    writeln!(stdout, "cargo:rerun-if-changed=build.rs")?;
    writeln!(stdout, "cargo:rerun-if-changed=src/cli/mod.rs")?;

    let out_dir = PathBuf::from(
        env::var_os("OUT_DIR")
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "OUT_DIR was not set"))?,
    );

    let root = Cli::command();
    for subcommand in root.get_subcommands() {
        let name = subcommand.get_name();
        let page = subcommand.clone().bin_name(format!("nodeplan {name}"));
        render(page, &format!("nodeplan-{name}"), &out_dir)?;
    }
    render(root, "nodeplan", &out_dir)?;

    Ok(())
}
