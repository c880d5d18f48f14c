//! Wrap `square`, call it with 5, 6 and 5, and show that it ran twice.
//!
//! Run with `RUST_LOG=fnmemo=debug` to see the hits and misses.

use fnmemo::{args, Args, Memoized, Result};
use tracing_subscriber::EnvFilter;

fn square(args: &Args) -> i64 {
    let x = *args.get::<i64>(0).unwrap_or(&0);
    println!("computing square({})", x);
    x.pow(2)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut f = Memoized::named("square", square);

    println!("{}", f.call(args!(5_i64))?);
    println!("{}", f.call(args!(6_i64))?);
    println!("{}", f.call(args!(5_i64))?);

    println!(
        "underlying executions: {}, cache hits: {}",
        f.metrics().misses(),
        f.metrics().hits()
    );

    Ok(())
}
