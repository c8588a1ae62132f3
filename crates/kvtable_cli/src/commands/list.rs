//! List command implementation.

use super::{open_engine, CliError, Format};
use std::io::Write;
use std::path::Path;

/// Runs the list command.
pub fn run(dir: &Path, format: Format, out: &mut impl Write) -> Result<(), CliError> {
    let names = open_engine(dir)?.database_names()?;
    match format {
        Format::Json => writeln!(out, "{}", serde_json::to_string(&names)?)?,
        Format::Text => {
            for name in &names {
                writeln!(out, "{name}")?;
            }
        }
    }
    Ok(())
}
