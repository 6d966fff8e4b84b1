//! ARM resource identifiers for Power BI Embedded capacities

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Resource provider namespace and type for dedicated capacities
pub const CAPACITY_PROVIDER: &str = "Microsoft.PowerBIDedicated/capacities";

/// API version used for capacity reads and lifecycle actions
pub const CAPACITY_API_VERSION: &str = "2021-01-01";

/// Identity of the capacity under management
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityResourceId {
    pub subscription_id: String,
    pub resource_group: String,
    pub capacity_name: String,
}

impl CapacityResourceId {
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        capacity_name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            capacity_name: capacity_name.into(),
        }
    }

    /// ARM path, e.g. `/subscriptions/{sub}/resourceGroups/{rg}/providers/...`
    pub fn arm_path(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/{}/{}",
            self.subscription_id, self.resource_group, CAPACITY_PROVIDER, self.capacity_name
        )
    }

    /// ARM ids compare case-insensitively
    pub fn same_resource(&self, other: &CapacityResourceId) -> bool {
        self.subscription_id.eq_ignore_ascii_case(&other.subscription_id)
            && self.resource_group.eq_ignore_ascii_case(&other.resource_group)
            && self.capacity_name.eq_ignore_ascii_case(&other.capacity_name)
    }

    /// Operation name the activity log records for an action on this resource type
    pub fn operation_name(action: &str) -> String {
        format!("{}/{}/ACTION", CAPACITY_PROVIDER.to_ascii_uppercase(), action)
    }
}

impl fmt::Display for CapacityResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.arm_path())
    }
}

/// Error parsing an ARM path into a capacity id
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed capacity resource id: {0}")]
pub struct MalformedResourceId(pub String);

impl FromStr for CapacityResourceId {
    type Err = MalformedResourceId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim_matches('/').split('/').collect();
        let malformed = || MalformedResourceId(s.to_string());

        match parts.as_slice() {
            ["subscriptions", sub, "resourceGroups" | "resourcegroups", rg, "providers", ns, ty, name]
                if ns.eq_ignore_ascii_case("Microsoft.PowerBIDedicated")
                    && ty.eq_ignore_ascii_case("capacities")
                    && !sub.is_empty()
                    && !rg.is_empty()
                    && !name.is_empty() =>
            {
                Ok(Self::new(*sub, *rg, *name))
            }
            _ => Err(malformed()),
        }
    }
}
