//! Runs a single acquire/work/release trial against one backend with a pool
//! of size one, outside the statistical framework.
//!
//! Usage: `smoke [fixed|r2d2]` (defaults to `fixed`).

use pool_cycle::{run_once, BackendKind};

fn main() -> pool_cycle::Result<()> {
    tracing_subscriber::fmt().init();

    let backend = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => BackendKind::Fixed,
    };
    let conn = run_once(backend)?;
    println!("backend {backend}: cycled connection #{}", conn.id());
    Ok(())
}
