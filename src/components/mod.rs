//! Ready-made submodels, connections and load groups.

mod assemblies;
mod bicycle;
mod ground;
mod joints;
mod link;
mod loads;
mod tire;
mod wheel;

pub use assemblies::*;
pub use bicycle::*;
pub use ground::*;
pub use joints::*;
pub use link::*;
pub use loads::*;
pub use tire::*;
pub use wheel::*;

use crate::error::{ModelError, ModelResult};

/// Objects a component creates in the objects stage, or a lookup error before that.
pub(crate) fn created<'a, T>(objects: &'a Option<T>, name: &str) -> ModelResult<&'a T> {
    objects
        .as_ref()
        .ok_or_else(|| ModelError::lookup(format!("'{name}' has not defined its objects yet")))
}
