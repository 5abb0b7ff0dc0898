pub mod result;

pub use self::result::*;
