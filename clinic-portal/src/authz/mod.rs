//! Path-based role authorization shared by the session gate and the route guard.

pub mod decision;
pub mod policy;

pub use decision::{decide, login_location, Verdict, LOGIN_PATH, UNAUTHORIZED_PATH};
pub use policy::{PathPolicy, PolicyEntry, PolicyError};
