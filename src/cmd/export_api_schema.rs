use std::path::Path;

use crate::{api, prelude::*};


/// Writes the GraphQL schema of the API in SDL to `target` or stdout.
pub(crate) fn run(target: Option<&Path>) -> Result<()> {
    let schema = api::root_node().as_sdl();

    match target {
        Some(target) => {
            std::fs::write(target, schema)
                .context(format!("failed to write schema to '{}'", target.display()))?;
        }
        None => println!("{schema}"),
    }

    Ok(())
}
