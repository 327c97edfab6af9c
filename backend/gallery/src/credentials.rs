//! # Credentials
//!
//! Plaintext password gate in front of every album.
//!
//! - Single password: one implicit tenant named [`DEFAULT_TENANT`]
//! - Multi tenant: tenant id to display name, password and storage root, loaded from a JSON secret
//! - Exact string comparison, nothing else. No hashing, no lockout.
use std::{collections::BTreeMap, fmt};

use serde::Deserialize;

pub const DEFAULT_TENANT: &str = "default";

#[derive(Clone, Deserialize)]
pub struct Tenant {
    #[serde(skip)]
    pub id: String,
    pub name: String,
    password: String,
    #[serde(default)]
    pub root: String,
}

impl fmt::Debug for Tenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tenant")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("password", &"***")
            .field("root", &self.root)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct CredentialStore {
    tenants: Vec<Tenant>,
}

impl CredentialStore {
    pub fn single(password: impl Into<String>, root: impl Into<String>) -> Self {
        Self {
            tenants: vec![Tenant {
                id: DEFAULT_TENANT.to_string(),
                name: DEFAULT_TENANT.to_string(),
                password: password.into(),
                root: root.into(),
            }],
        }
    }

    pub fn from_tenants(tenants: BTreeMap<String, Tenant>) -> Self {
        Self {
            tenants: tenants
                .into_iter()
                .map(|(id, tenant)| Tenant { id, ..tenant })
                .collect(),
        }
    }

    /// Parses `{ "<tenant id>": { "name": .., "password": .., "root": .. } }`.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json).map(Self::from_tenants)
    }

    pub fn tenant(&self, id: &str) -> Option<&Tenant> {
        self.tenants.iter().find(|tenant| tenant.id == id)
    }

    /// Display name to tenant.
    pub fn resolve(&self, display_name: &str) -> Option<&Tenant> {
        self.tenants.iter().find(|tenant| tenant.name == display_name)
    }

    /// Without a tenant id the store must hold exactly one tenant.
    pub fn verify(&self, candidate: &str, tenant_id: Option<&str>) -> bool {
        let tenant = match tenant_id {
            Some(id) => self.tenant(id),
            None => self.sole_tenant(),
        };

        tenant.is_some_and(|tenant| tenant.password == candidate)
    }

    pub fn sole_tenant(&self) -> Option<&Tenant> {
        match self.tenants.as_slice() {
            [tenant] => Some(tenant),
            _ => None,
        }
    }

    pub fn is_multi_tenant(&self) -> bool {
        self.tenants.len() > 1
    }
}
