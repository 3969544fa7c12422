//! Field-by-field comparison of a desired record against a remote object.

use super::UpdatePlan;

/// Collects changed fields while classifying an update
///
/// Unset desired values (`None`) mean "leave as is" and are never a change.
#[derive(Debug, Default)]
pub struct Diff {
    changed: Vec<&'static str>,
    replace: Vec<&'static str>,
}

impl Diff {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Field that can be updated in place
    pub fn field<T: PartialEq + ?Sized>(
        &mut self,
        name: &'static str,
        desired: Option<&T>,
        remote: Option<&T>,
    ) -> &mut Self {
        if differs(desired, remote) {
            self.changed.push(name);
        }
        self
    }

    /// Field whose change forces a delete-then-create
    pub fn replace<T: PartialEq + ?Sized>(
        &mut self,
        name: &'static str,
        desired: Option<&T>,
        remote: Option<&T>,
    ) -> &mut Self {
        if differs(desired, remote) {
            self.replace.push(name);
        }
        self
    }

    #[must_use]
    pub fn plan(&self) -> UpdatePlan {
        if !self.replace.is_empty() {
            UpdatePlan::RequiresReplacement {
                fields: self.replace.clone(),
            }
        } else if self.changed.is_empty() {
            UpdatePlan::NoChange
        } else {
            UpdatePlan::InPlace
        }
    }
}

fn differs<T: PartialEq + ?Sized>(desired: Option<&T>, remote: Option<&T>) -> bool {
    match desired {
        Some(desired) => remote != Some(desired),
        None => false,
    }
}
