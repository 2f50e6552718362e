//! `trip --scan EXE`: which trippable functions an executable imports.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use goblin::Object;
use tracing::debug;
use trip::{Interceptable, REGISTRY};

pub fn run(path: &Path) -> Result<()> {
    let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    for function in imported(&data).with_context(|| format!("Cannot scan {}", path.display()))? {
        println!("{}", function.name);
    }
    Ok(())
}

/// Registry functions among the undefined dynamic symbols of an ELF image,
/// in registry order.
pub fn imported(data: &[u8]) -> Result<Vec<&'static Interceptable>> {
    if !data.starts_with(b"\x7fELF") {
        bail!("not an ELF file");
    }
    let elf = match Object::parse(data)? {
        Object::Elf(elf) => elf,
        _ => bail!("not an ELF file"),
    };

    let imports: HashSet<&str> = elf
        .dynsyms
        .iter()
        .filter(|sym| sym.is_import())
        .filter_map(|sym| elf.dynstrtab.get_at(sym.st_name))
        // Versioned names (`open@GLIBC_2.2.5`) only appear in some tools'
        // output, but strip them anyway.
        .map(|name| name.split('@').next().unwrap_or(name))
        .collect();
    debug!(imports = imports.len(), "dynamic imports");

    Ok(REGISTRY
        .iter()
        .filter(|function| imports.contains(function.name))
        .collect())
}
