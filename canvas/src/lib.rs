//! Shape-and-session engine for the collaborative drawing surface.
//!
//! This crate owns everything that happens between a pointer event and a
//! shape on screen: the geometry predicates, the shape variants, the tool
//! state machines that build shapes from gestures, the authoritative
//! per-session shape collection, and the selection model that separates the
//! local user's selection from their peers'. It performs no I/O — the
//! network side lives in the `client` and `server` crates, and pixels are
//! the embedder's job via [`render::Surface`].
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`geom`] | Points, distances, and area primitives |
//! | [`shape`] | Shape variants, identity, and geometric predicates |
//! | [`tool`] | Drawing-tool state machines and the [`tool::Toolbox`] dispatcher |
//! | [`store`] | Authoritative shape collection ([`store::ShapeStore`]) and remote reconciliation |
//! | [`selection`] | Local selection set and remote-selection map |
//! | [`render`] | The [`render::Surface`] capability and scene draw order |
//! | [`consts`] | Shared tolerances and style defaults |

pub mod consts;
pub mod geom;
pub mod render;
pub mod selection;
pub mod shape;
pub mod store;
pub mod tool;
