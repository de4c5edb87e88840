use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

pub fn token_path() -> PathBuf {
    let home = std::env::var_os("HOME").unwrap_or_default();
    let mut p = PathBuf::from(home);
    p.push(".config");
    p.push("expense-tracker-cli");
    p.push("token");
    p
}

pub fn load_token(path: &Path) -> anyhow::Result<String> {
    let s = fs::read_to_string(path)
        .with_context(|| format!("reading token file {}", path.display()))?;
    let t = s.trim().to_string();
    if t.is_empty() {
        anyhow::bail!("empty token file");
    }
    Ok(t)
}

/// Token from the file if there is one. A missing file is not an error: the backend may not
/// require authentication.
pub fn load_optional_token(path: &Path) -> anyhow::Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    load_token(path).map(Some)
}
