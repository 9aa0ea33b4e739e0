//! `Action` execution impls that need access to `Client` internals not exposed to `src/action`.

mod perf;
mod shutdown;