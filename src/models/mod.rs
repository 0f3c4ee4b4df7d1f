pub mod catalog;
pub mod common;
pub mod image;
pub mod request;
pub mod result;

pub use catalog::{ModelFamily, ModelSpec, PayloadStrategy, Surface};
pub use common::*;
pub use image::*;
pub use request::*;
pub use result::*;
