//! # brim
//!
//! Composable multibody models. A model is a tree of interchangeable submodels
//! held in typed slots, connections that couple submodels without owning them,
//! and load groups attached to hosts. A [`ModelTree`] drives the tree through
//! five build stages in a fixed order and flattens the result into a
//! [`SystemDescription`] for an equation-formation engine. A
//! [`ParameterProvider`] maps the tree's symbols back onto measured values.
//!
//! ```no_run
//! use brim::FourBarLinkage;
//!
//! let mut tree = FourBarLinkage::build("four_bar")?;
//! tree.define_all()?;
//! let system = tree.to_system()?;
//! assert_eq!(system.coordinates.len(), 3);
//! # Ok::<(), brim::ModelError>(())
//! ```

pub mod auxiliary;
pub mod components;
pub mod context;
pub mod error;
pub mod expr;
pub mod mechanics;
pub mod model;
pub mod parametrize;
pub mod symbols;
pub mod system;
pub mod tree;

pub use auxiliary::*;
pub use components::*;
pub use context::*;
pub use error::*;
pub use expr::*;
pub use mechanics::*;
pub use model::*;
pub use parametrize::*;
pub use symbols::*;
pub use system::*;
pub use tree::*;
