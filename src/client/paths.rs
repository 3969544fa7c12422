//! # API Paths
//!
//! Builds Cloud API paths for every resource kind.
//!
//! ```rust
//! use ionoscloud_reconciler::client::paths::PathBuilder;
//!
//! let path = PathBuilder::new()
//!     .datacenter("dc-1")
//!     .nat_gateway("ng-1")
//!     .rules()
//!     .build();
//! assert_eq!(path, "/datacenters/dc-1/natgateways/ng-1/rules");
//! ```

use crate::resource::{Locator, ResourceKind};

/// Builder for relative API paths
#[derive(Debug, Clone, Default)]
pub struct PathBuilder {
    segments: Vec<String>,
}

impl PathBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, segment: &str) -> Self {
        self.segments.push(segment.to_string());
        self
    }

    #[must_use]
    pub fn datacenters(self) -> Self {
        self.push("datacenters")
    }

    #[must_use]
    pub fn datacenter(self, id: &str) -> Self {
        self.datacenters().push(id)
    }

    #[must_use]
    pub fn lans(self) -> Self {
        self.push("lans")
    }

    #[must_use]
    pub fn lan(self, id: &str) -> Self {
        self.lans().push(id)
    }

    #[must_use]
    pub fn nat_gateways(self) -> Self {
        self.push("natgateways")
    }

    #[must_use]
    pub fn nat_gateway(self, id: &str) -> Self {
        self.nat_gateways().push(id)
    }

    #[must_use]
    pub fn rules(self) -> Self {
        self.push("rules")
    }

    #[must_use]
    pub fn rule(self, id: &str) -> Self {
        self.rules().push(id)
    }

    #[must_use]
    pub fn k8s_cluster(self, id: &str) -> Self {
        self.push("k8s").push(id)
    }

    #[must_use]
    pub fn node_pools(self) -> Self {
        self.push("nodepools")
    }

    #[must_use]
    pub fn node_pool(self, id: &str) -> Self {
        self.node_pools().push(id)
    }

    #[must_use]
    pub fn build(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }

    /// Path of the collection a resource kind is created in
    ///
    /// `parents` are the enclosing ids, outermost first. An IP failover group
    /// lives inside its LAN, so its "collection" is the LAN itself.
    #[must_use]
    pub fn collection(kind: ResourceKind, parents: &[String]) -> String {
        let parent = |i: usize| parents.get(i).map_or("", String::as_str);
        let builder = Self::new();
        let builder = match kind {
            ResourceKind::Datacenter => builder.datacenters(),
            ResourceKind::Lan => builder.datacenter(parent(0)).lans(),
            ResourceKind::NatGateway => builder.datacenter(parent(0)).nat_gateways(),
            ResourceKind::NatGatewayRule => builder
                .datacenter(parent(0))
                .nat_gateway(parent(1))
                .rules(),
            ResourceKind::IpFailover => builder.datacenter(parent(0)).lan(parent(1)),
            ResourceKind::NodePool => builder.k8s_cluster(parent(0)).node_pools(),
        };
        builder.build()
    }

    /// Path addressing a single resource
    #[must_use]
    pub fn item(locator: &Locator) -> String {
        match locator.kind {
            // Failover groups are entries of the LAN, not addressable on their own
            ResourceKind::IpFailover => Self::collection(locator.kind, &locator.parents),
            kind => format!("{}/{}", Self::collection(kind, &locator.parents), locator.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locator(kind: ResourceKind, parents: &[&str], id: &str) -> Locator {
        Locator::new(
            kind,
            parents.iter().map(|p| (*p).to_string()).collect(),
            id,
        )
    }

    #[test]
    fn test_collection_paths() {
        assert_eq!(
            PathBuilder::collection(ResourceKind::Datacenter, &[]),
            "/datacenters"
        );
        assert_eq!(
            PathBuilder::collection(ResourceKind::Lan, &["dc".to_string()]),
            "/datacenters/dc/lans"
        );
        assert_eq!(
            PathBuilder::collection(ResourceKind::NodePool, &["cluster".to_string()]),
            "/k8s/cluster/nodepools"
        );
    }

    #[test]
    fn test_item_paths() {
        assert_eq!(
            PathBuilder::item(&locator(ResourceKind::NatGatewayRule, &["dc", "ng"], "r1")),
            "/datacenters/dc/natgateways/ng/rules/r1"
        );
        assert_eq!(
            PathBuilder::item(&locator(ResourceKind::NatGateway, &["dc"], "ng")),
            "/datacenters/dc/natgateways/ng"
        );
        assert_eq!(
            PathBuilder::item(&locator(ResourceKind::IpFailover, &["dc", "3"], "nic-1")),
            "/datacenters/dc/lans/3"
        );
        assert_eq!(
            PathBuilder::item(&locator(ResourceKind::NodePool, &["k8s-1"], "np-1")),
            "/k8s/k8s-1/nodepools/np-1"
        );
    }
}
