pub mod manifest;

pub mod util;
