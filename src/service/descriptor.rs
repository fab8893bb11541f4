//! Service declaration: everything a service exposes to the host.
//!
//! # Responsibilities
//! - Hold the HTTP endpoint table and the RPC method table in declaration order
//! - Hold service-wide middleware and options for each transport
//! - Hold the router configuration
//!
//! # Design Decisions
//! - A plain data aggregate built with a builder; the host reads it once
//! - Nothing is validated here; duplicates and bad patterns are reported when
//!   the host registers the tables, before any listener is bound
//! - Dependencies reach handlers through the closures that build them

use axum::http::Method;

use crate::codec::{HttpDecoder, HttpEncoder, RpcDecoder, RpcEncoder};
use crate::http::HttpOption;
use crate::middleware::Middleware;
use crate::routing::RouterConfig;
use crate::rpc::RpcOption;
use crate::service::Endpoint;

/// An endpoint bound to an HTTP route, with its own middleware, options and codec.
#[derive(Debug, Clone)]
pub struct HttpEndpoint {
    pub(crate) endpoint: Endpoint,
    pub(crate) middleware: Vec<Middleware>,
    pub(crate) options: Vec<HttpOption>,
    pub(crate) decoder: Option<HttpDecoder>,
    pub(crate) encoder: Option<HttpEncoder>,
}

impl HttpEndpoint {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            middleware: Vec::new(),
            options: Vec::new(),
            decoder: None,
            encoder: None,
        }
    }

    /// Append endpoint-specific middleware; runs inside service-wide middleware.
    pub fn middleware(mut self, middleware: Middleware) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn option(mut self, option: HttpOption) -> Self {
        self.options.push(option);
        self
    }

    /// Replace the default JSON request decoding.
    pub fn decoder(mut self, decoder: HttpDecoder) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// Replace the default JSON response encoding.
    pub fn encoder(mut self, encoder: HttpEncoder) -> Self {
        self.encoder = Some(encoder);
        self
    }
}

impl From<Endpoint> for HttpEndpoint {
    fn from(endpoint: Endpoint) -> Self {
        Self::new(endpoint)
    }
}

/// An endpoint bound to an RPC method name.
#[derive(Debug, Clone)]
pub struct RpcMethod {
    pub(crate) endpoint: Endpoint,
    pub(crate) middleware: Vec<Middleware>,
    pub(crate) options: Vec<RpcOption>,
    pub(crate) decoder: Option<RpcDecoder>,
    pub(crate) encoder: Option<RpcEncoder>,
}

impl RpcMethod {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            middleware: Vec::new(),
            options: Vec::new(),
            decoder: None,
            encoder: None,
        }
    }

    pub fn middleware(mut self, middleware: Middleware) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn option(mut self, option: RpcOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn decoder(mut self, decoder: RpcDecoder) -> Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn encoder(mut self, encoder: RpcEncoder) -> Self {
        self.encoder = Some(encoder);
        self
    }
}

impl From<Endpoint> for RpcMethod {
    fn from(endpoint: Endpoint) -> Self {
        Self::new(endpoint)
    }
}

/// One row of the HTTP endpoint table.
#[derive(Debug, Clone)]
pub struct HttpRoute {
    pub path: String,
    pub method: Method,
    pub endpoint: HttpEndpoint,
}

/// Everything a service exposes.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    name: String,
    http_routes: Vec<HttpRoute>,
    http_middleware: Vec<Middleware>,
    http_options: Vec<HttpOption>,
    router_config: RouterConfig,
    rpc_service: String,
    rpc_methods: Vec<(String, RpcMethod)>,
    rpc_middleware: Vec<Middleware>,
    rpc_options: Vec<RpcOption>,
}

impl ServiceDescriptor {
    /// Start declaring a service. The name doubles as the RPC service name
    /// unless [`ServiceBuilder::rpc_service`] sets another.
    pub fn builder(name: impl Into<String>) -> ServiceBuilder {
        let name = name.into();
        ServiceBuilder {
            descriptor: ServiceDescriptor {
                rpc_service: name.clone(),
                name,
                http_routes: Vec::new(),
                http_middleware: Vec::new(),
                http_options: Vec::new(),
                router_config: RouterConfig::default(),
                rpc_methods: Vec::new(),
                rpc_middleware: Vec::new(),
                rpc_options: Vec::new(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn http_routes(&self) -> &[HttpRoute] {
        &self.http_routes
    }

    pub fn http_middleware(&self) -> &[Middleware] {
        &self.http_middleware
    }

    pub fn http_options(&self) -> &[HttpOption] {
        &self.http_options
    }

    pub fn router_config(&self) -> RouterConfig {
        self.router_config
    }

    pub fn rpc_service(&self) -> &str {
        &self.rpc_service
    }

    /// Method names (without the service prefix) and their bindings.
    pub fn rpc_methods(&self) -> &[(String, RpcMethod)] {
        &self.rpc_methods
    }

    pub fn rpc_middleware(&self) -> &[Middleware] {
        &self.rpc_middleware
    }

    pub fn rpc_options(&self) -> &[RpcOption] {
        &self.rpc_options
    }

    /// `{rpc_service}/{method}`
    pub fn full_method_name(&self, method: &str) -> String {
        format!("{}/{}", self.rpc_service, method)
    }
}

/// Builder for [`ServiceDescriptor`].
#[derive(Debug)]
pub struct ServiceBuilder {
    descriptor: ServiceDescriptor,
}

impl ServiceBuilder {
    /// Bind an endpoint to `method path`.
    pub fn http_endpoint(mut self, path: impl Into<String>, method: Method, endpoint: impl Into<HttpEndpoint>) -> Self {
        self.descriptor.http_routes.push(HttpRoute {
            path: path.into(),
            method,
            endpoint: endpoint.into(),
        });
        self
    }

    /// Middleware wrapped around every HTTP endpoint, outermost first.
    pub fn http_middleware(mut self, middleware: Middleware) -> Self {
        self.descriptor.http_middleware.push(middleware);
        self
    }

    pub fn http_option(mut self, option: HttpOption) -> Self {
        self.descriptor.http_options.push(option);
        self
    }

    pub fn router_config(mut self, config: RouterConfig) -> Self {
        self.descriptor.router_config = config;
        self
    }

    /// Name the RPC service, e.g. `pets.Cats`.
    pub fn rpc_service(mut self, name: impl Into<String>) -> Self {
        self.descriptor.rpc_service = name.into();
        self
    }

    pub fn rpc_method(mut self, name: impl Into<String>, method: impl Into<RpcMethod>) -> Self {
        self.descriptor.rpc_methods.push((name.into(), method.into()));
        self
    }

    /// Interceptors wrapped around every RPC method, outermost first.
    pub fn rpc_middleware(mut self, middleware: Middleware) -> Self {
        self.descriptor.rpc_middleware.push(middleware);
        self
    }

    pub fn rpc_option(mut self, option: RpcOption) -> Self {
        self.descriptor.rpc_options.push(option);
        self
    }

    pub fn build(self) -> ServiceDescriptor {
        self.descriptor
    }
}
