//! `trip --list`: the functions that can be tripped.

use trip::REGISTRY;

pub fn run() {
    for function in REGISTRY {
        println!("{}", function.name);
    }
}
