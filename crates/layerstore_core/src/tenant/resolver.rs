//! Tenant resolvers over transport-neutral request metadata.

use crate::tenant::TenantResult;
use std::collections::BTreeMap;
use std::net::IpAddr;

/// Request metadata a resolver may inspect.
///
/// Header names are stored lowercased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParts {
    headers: BTreeMap<String, String>,
    host: Option<String>,
    path: String,
}

impl RequestParts {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Extracts the raw tenant id of one request.
///
/// `Ok(None)` means the request carries no tenant; the middleware turns
/// that, and blank values, into [`crate::tenant::TenantError::Unresolved`].
pub trait TenantResolver: Send + Sync {
    fn resolve(&self, request: &RequestParts) -> TenantResult<Option<String>>;
}

/// Reads the tenant id from a named header.
#[derive(Debug, Clone)]
pub struct HeaderTenantResolver {
    header: String,
}

impl HeaderTenantResolver {
    pub const DEFAULT_HEADER: &'static str = "x-tenant-id";

    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
        }
    }
}

impl Default for HeaderTenantResolver {
    fn default() -> Self {
        Self::new(Self::DEFAULT_HEADER)
    }
}

impl TenantResolver for HeaderTenantResolver {
    fn resolve(&self, request: &RequestParts) -> TenantResult<Option<String>> {
        Ok(request.header(&self.header).map(str::to_string))
    }
}

/// Uses the first subdomain label of the host, e.g. `acme` for
/// `acme.example.com:8080`.
///
/// Hosts with fewer than three labels have no tenant, and neither do IP
/// literals or hosts whose first label is numeric.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostTenantResolver;

impl TenantResolver for HostTenantResolver {
    fn resolve(&self, request: &RequestParts) -> TenantResult<Option<String>> {
        let Some(host) = request.host().map(str::trim) else {
            return Ok(None);
        };
        // Bracketed IPv6, optionally with a port.
        if host.starts_with('[') {
            return Ok(None);
        }
        if host.parse::<IpAddr>().is_ok() {
            return Ok(None);
        }
        let host = host.split(':').next().unwrap_or_default();
        let labels: Vec<&str> = host.split('.').collect();
        if labels.len() < 3 {
            return Ok(None);
        }
        let first = labels[0];
        if first.is_empty() || first.bytes().all(|byte| byte.is_ascii_digit()) {
            return Ok(None);
        }
        Ok(Some(first.to_ascii_lowercase()))
    }
}

/// Always yields the same tenant; single-tenant hosts and tests.
#[derive(Debug, Clone)]
pub struct StaticTenantResolver {
    tenant: String,
}

impl StaticTenantResolver {
    pub fn new(tenant: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
        }
    }
}

impl TenantResolver for StaticTenantResolver {
    fn resolve(&self, _request: &RequestParts) -> TenantResult<Option<String>> {
        Ok(Some(self.tenant.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::{HeaderTenantResolver, HostTenantResolver, RequestParts, TenantResolver};

    #[test]
    fn header_lookup_ignores_case() {
        let request = RequestParts::new("/").with_header("X-Tenant-Id", "acme");
        let resolved = HeaderTenantResolver::default().resolve(&request).unwrap();
        assert_eq!(resolved.as_deref(), Some("acme"));
    }

    #[test]
    fn host_resolver_takes_first_label_without_port() {
        let resolver = HostTenantResolver;
        let request = RequestParts::new("/").with_host("Acme.example.com:8443");
        assert_eq!(resolver.resolve(&request).unwrap().as_deref(), Some("acme"));

        let bare = RequestParts::new("/").with_host("example.com");
        assert_eq!(resolver.resolve(&bare).unwrap(), None);
        assert_eq!(resolver.resolve(&RequestParts::new("/")).unwrap(), None);
    }

    #[test]
    fn host_resolver_ignores_ip_literals() {
        let resolver = HostTenantResolver;
        for host in ["10.0.0.5:8080", "127.0.0.1", "::1", "[::1]:8080", "[2001:db8::1]"] {
            let request = RequestParts::new("/").with_host(host);
            assert_eq!(resolver.resolve(&request).unwrap(), None, "host {host}");
        }
    }

    #[test]
    fn host_resolver_rejects_numeric_or_empty_first_label() {
        let resolver = HostTenantResolver;
        let numeric = RequestParts::new("/").with_host("42.example.com");
        assert_eq!(resolver.resolve(&numeric).unwrap(), None);

        let empty = RequestParts::new("/").with_host(".example.com");
        assert_eq!(resolver.resolve(&empty).unwrap(), None);
    }
}
