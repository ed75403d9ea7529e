//! PhaseBench demo binary
//!
//! Run with:
//!   cargo run -p phasebench-demos -- demos/suites/sample.toml
//!   cargo run -p phasebench-demos -- -test -line demos/suites/sample.toml
//!   cargo run -p phasebench-demos -- -merge demos/suites/sample.toml demos/suites/threads.toml
//!   cargo run -p phasebench-demos -- list

mod collections;
mod text;

use phasebench::TrackingAllocator;

#[global_allocator]
static GLOBAL: TrackingAllocator = TrackingAllocator;

fn main() {
    let code = match phasebench::run() {
        Ok(errors) => errors,
        Err(err) => {
            eprintln!("Error: {err:#}");
            1
        }
    };
    std::process::exit(code);
}
