pub mod decode;
pub mod output;
pub mod sampler;
