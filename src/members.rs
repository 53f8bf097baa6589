//! Loading group members from commitment list files.
//!
//! A members file holds one identity commitment per line as 64 hex
//! characters (optional `0x`). Blank lines and lines starting with `#` are
//! skipped.

use crate::utils::field_from_hex;
use anyhow::{Context, Result};
use log::debug;
use pasta_curves::pallas;
use std::fs;
use std::path::Path;

/// Largest members file the tools will read (100MB).
pub const MAX_MEMBERS_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Parses commitments from the text of a members file.
///
/// # Examples
///
/// ```
/// use zkp_group_signal::members::parse_members;
///
/// let content = "# group\n0x2A00000000000000000000000000000000000000000000000000000000000000\n";
/// assert_eq!(parse_members(content).unwrap().len(), 1);
/// ```
///
/// # Errors
/// Fails on the first malformed line, naming its line number.
pub fn parse_members(content: &str) -> Result<Vec<pallas::Base>> {
    content
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(line_no, line)| {
            field_from_hex(line)
                .with_context(|| format!("Invalid commitment at line {line_no}: '{line}'"))
        })
        .collect()
}

/// Reads and parses a members file, refusing files over
/// [`MAX_MEMBERS_FILE_SIZE`] and files with no members.
pub fn load_members_file(path: &Path) -> Result<Vec<pallas::Base>> {
    let metadata = fs::metadata(path)
        .with_context(|| format!("Failed to read members file metadata: {}", path.display()))?;
    if metadata.len() > MAX_MEMBERS_FILE_SIZE {
        return Err(anyhow::anyhow!(
            "Members file too large: {} bytes (max {} bytes)",
            metadata.len(),
            MAX_MEMBERS_FILE_SIZE
        ));
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read members file: {}", path.display()))?;
    let members = parse_members(&content)
        .with_context(|| format!("Failed to parse members file: {}", path.display()))?;

    if members.is_empty() {
        return Err(anyhow::anyhow!(
            "No commitments found in members file '{}'",
            path.display()
        ));
    }
    debug!("Loaded {} members from {}", members.len(), path.display());
    Ok(members)
}
