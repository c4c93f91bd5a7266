//! the test_utils folder here will share utils or test components between unit
//! tests of different modules
mod common;
mod mock;

pub(crate) use common::*;
pub(crate) use mock::*;
