//! # Destroy Verifier
//!
//! A delete that reported success is only trusted once a read of the
//! resource comes back not-found.

use crate::client::ApiError;
use crate::resource::{Locator, RemoteObject, ResourceAdapter};
use tracing::{debug, warn};

/// Outcome of the post-delete read
#[derive(Debug)]
pub enum DestroyVerdict<P> {
    Gone,
    /// The resource can still be read
    StillPresent(RemoteObject<P>),
    /// The read failed with something other than not-found
    Unverifiable(ApiError),
}

/// Read `locator` once and report whether it is gone
pub async fn confirm_gone<A: ResourceAdapter>(
    adapter: &A,
    locator: &Locator,
) -> DestroyVerdict<A::Properties> {
    match adapter.find_by_id(locator).await {
        Err(e) if e.is_not_found() => {
            debug!("{} {} confirmed gone", A::KIND, locator);
            DestroyVerdict::Gone
        }
        Err(e) => {
            warn!("Could not confirm deletion of {} {}: {}", A::KIND, locator, e);
            DestroyVerdict::Unverifiable(e)
        }
        Ok(object) => {
            warn!(
                "{} {} still present in state {} after delete",
                A::KIND,
                locator,
                object.metadata.state
            );
            DestroyVerdict::StillPresent(object)
        }
    }
}
