//! # State Projector
//!
//! Maps a converged remote object back onto the caller's desired record.
//!
//! - Scalars the API reports are assigned directly. Optional values the API
//!   omits leave the caller's value untouched.
//! - Nested collections are replaced wholesale in remote order.
//! - A missing mandatory field is a `ProjectionError`: the API answered with
//!   a shape this engine does not understand.

use crate::resource::{Identified, RemoteObject, ResourceKind};
use thiserror::Error;

/// The remote object lacks a field the engine requires
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} {id}: remote object is missing mandatory field '{field}'")]
pub struct ProjectionError {
    pub kind: ResourceKind,
    pub id: String,
    pub field: &'static str,
}

/// Projection of a remote object with properties `P` onto `Self`
pub trait Projection<P> {
    /// Populate `self` from `remote`
    ///
    /// Implementations may leave `self` half-written on error; callers
    /// project into a copy.
    fn project(&mut self, remote: &RemoteObject<P>) -> Result<(), ProjectionError>;
}

/// Project into a copy of `desired` and only commit when projection succeeds
pub fn project_onto<D, P>(desired: &mut D, remote: &RemoteObject<P>) -> Result<(), ProjectionError>
where
    D: Projection<P> + Identified + Clone,
{
    let mut projected = desired.clone();
    projected.set_id(Some(remote.id.clone()));
    projected.project(remote)?;
    *desired = projected;
    Ok(())
}

/// Value of a field the engine cannot work without
pub fn required<T: Clone, P>(
    kind: ResourceKind,
    remote: &RemoteObject<P>,
    field: &'static str,
    value: Option<&T>,
) -> Result<T, ProjectionError> {
    value.cloned().ok_or_else(|| ProjectionError {
        kind,
        id: remote.id.clone(),
        field,
    })
}

/// Overwrite `target` only when the remote reports a value
pub fn assign<T: Clone>(target: &mut Option<T>, remote: Option<&T>) {
    if let Some(value) = remote {
        *target = Some(value.clone());
    }
}

/// Replace a nested collection wholesale, an absent remote list means empty
pub fn replace_all<T: Clone>(target: &mut Vec<T>, remote: Option<&Vec<T>>) {
    *target = remote.cloned().unwrap_or_default();
}
