pub mod timing;

pub use timing::{monitor_middleware, RequestAspects};
