//! Route lookup.
//!
//! # Responsibilities
//! - Store the compiled `(method, template) → endpoint` table
//! - Look up the route for a request
//! - Return the match or an explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan, most specific template first
//! - Explicit NoMatch rather than silent default

use axum::http::Method;

use crate::auth::endpoint_id;
use crate::config::ServiceConfig;
use crate::routing::matcher::PathTemplate;

#[derive(Debug, Clone)]
struct Route {
    method: Method,
    template: PathTemplate,
    endpoint: String,
}

/// A successful lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<'a> {
    pub endpoint: &'a str,
    pub params: Vec<(String, String)>,
}

#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Compile every method that carries an HTTP binding.
    pub fn from_services(services: &[ServiceConfig]) -> Self {
        let mut routes: Vec<Route> = services
            .iter()
            .flat_map(|service| {
                service.methods.iter().filter_map(move |method| {
                    let rule = method.http.as_ref()?;
                    let verb = Method::from_bytes(rule.method.to_ascii_uppercase().as_bytes()).ok()?;
                    Some(Route {
                        method: verb,
                        template: PathTemplate::parse(&rule.path),
                        endpoint: endpoint_id(&service.name, &method.name),
                    })
                })
            })
            .collect();

        routes.sort_by_key(|route| std::cmp::Reverse(route.template.specificity()));
        Self { routes }
    }

    pub fn match_request(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        self.routes
            .iter()
            .filter(|route| route.method == *method)
            .find_map(|route| {
                route.template.matches(path).map(|params| RouteMatch {
                    endpoint: &route.endpoint,
                    params,
                })
            })
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HttpRuleConfig, MethodConfig};

    fn method(name: &str, verb: &str, path: &str) -> MethodConfig {
        MethodConfig {
            name: name.into(),
            http: Some(HttpRuleConfig {
                method: verb.into(),
                path: path.into(),
            }),
            options: Default::default(),
        }
    }

    fn table() -> RouteTable {
        RouteTable::from_services(&[ServiceConfig {
            name: "user.v1.MerchantService".into(),
            address: "127.0.0.1:9000".into(),
            methods: vec![
                method("GetMerchant", "GET", "/v1/merchants/{id}"),
                method("GetCurrentMerchant", "GET", "/v1/merchants/me"),
                method("LoginMerchant", "post", "/v1/merchants/login"),
                MethodConfig {
                    name: "Internal".into(),
                    http: None,
                    options: Default::default(),
                },
            ],
        }])
    }

    #[test]
    fn test_unbound_methods_are_skipped() {
        assert_eq!(table().len(), 3);
    }

    #[test]
    fn test_literal_beats_param() {
        let table = table();
        let m = table.match_request(&Method::GET, "/v1/merchants/me").unwrap();
        assert_eq!(m.endpoint, "/user.v1.MerchantService/GetCurrentMerchant");

        let m = table.match_request(&Method::GET, "/v1/merchants/m-9").unwrap();
        assert_eq!(m.endpoint, "/user.v1.MerchantService/GetMerchant");
        assert_eq!(m.params, vec![("id".to_string(), "m-9".to_string())]);
    }

    #[test]
    fn test_method_must_match() {
        let table = table();
        assert!(table.match_request(&Method::POST, "/v1/merchants/login").is_some());
        assert_eq!(
            table.match_request(&Method::GET, "/v1/merchants/login").map(|m| m.endpoint),
            Some("/user.v1.MerchantService/GetMerchant")
        );
        assert!(table.match_request(&Method::DELETE, "/v1/merchants/m-9").is_none());
        assert!(table.match_request(&Method::GET, "/v2/unknown").is_none());
    }
}
