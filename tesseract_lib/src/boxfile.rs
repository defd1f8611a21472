//! Reader for Tesseract box files.
//!
//! Each line is `<symbol> <left> <bottom> <right> <top> <page>`. In line
//! (`lstmbox`) output the symbol may itself be a space, and a tab marks the
//! end of a text line; neither is a recognizable glyph.

use std::{collections::BTreeSet, fs, path::Path, sync::LazyLock};

use regex::Regex;

use crate::error::EngineError;

static BOX_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?) (-?\d+) (-?\d+) (-?\d+) (-?\d+) (\d+)$").expect("box line pattern is valid")
});

/// Symbols of one box-file body, skipping whitespace markers and lines that
/// do not follow the box layout.
pub fn parse_symbols(contents: &str) -> BTreeSet<String> {
    contents
        .lines()
        .filter_map(|line| BOX_LINE.captures(line.trim_end_matches('\r')))
        .filter_map(|caps| caps.get(1))
        .map(|symbol| symbol.as_str())
        .filter(|symbol| !symbol.trim().is_empty())
        .map(str::to_string)
        .collect()
}

pub fn read_symbols(path: &Path) -> Result<BTreeSet<String>, EngineError> {
    let contents = fs::read_to_string(path).map_err(EngineError::io(path))?;
    Ok(parse_symbols(&contents))
}
