pub mod frame;
pub mod gpu;
pub mod pipeline;
pub mod session;
