//! `trip version`: build details.

use crate::style::{print_field, print_heading};

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn run() {
    println!("trip {VERSION}");
    println!();
    print_heading("Build info:");
    let fields = [
        ("Functions:", trip::REGISTRY.len().to_string()),
        ("Preload:", trip::relaunch::PRELOAD_LIBRARY.to_owned()),
        ("Target:", std::env::consts::ARCH.to_owned()),
        ("OS:", std::env::consts::OS.to_owned()),
    ];
    for (key, value) in fields {
        print_field(key, value, 10);
    }
}
