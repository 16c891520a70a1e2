use std::io;

use crate::prelude::*;

pub(crate) mod check;
pub(crate) mod export_api_schema;


/// Reads one line from stdin. Fails unless it is "yes".
pub(crate) fn prompt_for_yes() -> Result<()> {
    let mut answer = String::new();
    io::stdin().read_line(&mut answer).context("failed to read answer from stdin")?;
    match answer.trim() {
        "yes" => Ok(()),
        other => bail!("aborted: expected 'yes', got '{other}'"),
    }
}
