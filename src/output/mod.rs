// mod.rs - Output module: tabulation, batch summaries and writers

pub mod summary;
pub mod table;

pub use summary::BatchSummary;
pub use table::{novel_fingerprint, render_call, tabulate, tabulate_directory, Sentinels, TabulateOptions};

use crate::error::{Result, TypingError};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Ensure parent directory exists before creating file
fn ensure_parent_dir(file_path: &Path) -> Result<()> {
    if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent).map_err(|e| TypingError::io(parent, e))?;
    }
    Ok(())
}

/// Whether an output argument means standard output
pub fn is_stdout(output: Option<&str>) -> bool {
    matches!(output, None | Some("-"))
}

/// Write text to a file, or to stdout when no path (or `-`) is given
pub fn write_text(output: Option<&str>, text: &str) -> Result<()> {
    if is_stdout(output) {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(text.as_bytes())
            .map_err(|e| TypingError::io("<stdout>", e))?;
        handle.flush().map_err(|e| TypingError::io("<stdout>", e))?;
        return Ok(());
    }

    let path = Path::new(output.unwrap_or("-"));
    ensure_parent_dir(path)?;
    let file = File::create(path).map_err(|e| TypingError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(text.as_bytes())
        .map_err(|e| TypingError::io(path, e))?;
    writer.flush().map_err(|e| TypingError::io(path, e))?;
    Ok(())
}
