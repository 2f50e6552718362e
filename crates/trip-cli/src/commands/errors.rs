//! `trip --errors FUNC`: the errors a function can be tripped with.

use anyhow::{Result, anyhow};
use trip::registry;

pub fn run(function: &str) -> Result<()> {
    let entry = registry::lookup(function)
        .ok_or_else(|| anyhow!("unknown function \"{function}\", cannot trip"))?;

    for errno in entry.errors {
        println!("{}", errno.name);
    }
    Ok(())
}
