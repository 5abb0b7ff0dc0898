pub mod base;
pub mod constant;
pub mod entity;

pub use self::base::*;
pub use self::constant::*;
pub use self::entity::*;
