//! Benchmarks for low-level primitives and single elements.

mod delay;
mod filter;
mod modal;
mod smoother;
mod tables;
mod waveguide;

pub use delay::bench_delay;
pub use filter::bench_filter;
pub use modal::bench_modal;
pub use smoother::bench_smoother;
pub use tables::bench_tables;
pub use waveguide::bench_waveguide;
