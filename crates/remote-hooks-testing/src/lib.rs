//! Testing utilities and harness for remote hooks

#![allow(non_snake_case)]

pub mod resolver;
pub mod testing;

pub use resolver::DeferredResolver;
pub use testing::*;

pub mod prelude {
    pub use crate::resolver::DeferredResolver;
    pub use crate::testing::*;
}
