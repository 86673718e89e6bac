//! Unisphere REST client implementing [`ArrayClient`].
//!
//! Every request carries basic credentials and the `X-EMC-REST-CLIENT`
//! header. The session cookie and the CSRF token issued at login are reused
//! for later calls; mutating calls must present the token.

mod error;
mod payload;


use std::fmt;
use std::sync::{Mutex, PoisonError};

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

pub use self::error::UnityApiError;
use self::payload::{
    CollectionResponse, CreateLunRequest, CreatedLun, HostContent, InstanceResponse, LunContent,
    ModifyHostAccessRequest, PoolContent, SystemContent,
};
use crate::array::{ArrayClient, ArrayFuture, Host, HostAccess, Lun, LunRequest, Pool};
use crate::config::UnityConfig;

const CLIENT_HEADER: &str = "x-emc-rest-client";
const CSRF_HEADER: &str = "emc-csrf-token";
const LUN_FIELDS: &str = "id,name,sizeTotal,hostAccess";
const POOL_FIELDS: &str = "id,name";
const HOST_FIELDS: &str = "id,name";

/// Authenticated handle on a Unity array's management interface.
pub struct UnityClient {
    http: reqwest::Client,
    base: Url,
    user_name: String,
    password: String,
    csrf_token: Mutex<Option<String>>,
}

impl fmt::Debug for UnityClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnityClient")
            .field("base", &self.base.as_str())
            .field("user_name", &self.user_name)
            .finish_non_exhaustive()
    }
}

impl UnityClient {
    /// Builds a client for the configured endpoint. Endpoints given without a
    /// scheme are reached over HTTPS.
    ///
    /// # Errors
    ///
    /// Returns [`UnityApiError::InvalidEndpoint`] when the endpoint is not a
    /// usable URL and [`UnityApiError::Transport`] when the HTTP client cannot
    /// be built.
    pub fn new(config: &UnityConfig) -> Result<Self, UnityApiError> {
        let base = parse_endpoint(&config.endpoint)?;
        let mut headers = HeaderMap::new();
        headers.insert(CLIENT_HEADER, HeaderValue::from_static("true"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .cookie_store(true)
            .danger_accept_invalid_certs(config.insecure)
            .timeout(config.api_timeout())
            .build()?;
        Ok(Self {
            http,
            base,
            user_name: config.user_name.clone(),
            password: config.password.clone(),
            csrf_token: Mutex::new(None),
        })
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, segments: &[&str]) -> Result<Url, UnityApiError> {
        endpoint_url(&self.base, segments)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self
            .http
            .request(method, url)
            .basic_auth(&self.user_name, Some(&self.password));
        match self.token() {
            Some(token) => builder.header(CSRF_HEADER, token),
            None => builder,
        }
    }

    fn token(&self) -> Option<String> {
        self.csrf_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store_token(&self, token: Option<String>) {
        *self
            .csrf_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = token;
    }

    /// Reads a JSON document; a 404 resolves to `None`.
    async fn fetch<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, &str)],
    ) -> Result<Option<T>, UnityApiError> {
        debug!(url = %url, "GET");
        let response = self.request(Method::GET, url).query(query).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(UnityApiError::from_response(status, &body));
        }
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|err| UnityApiError::Decode(err.to_string()))
    }

    async fn send_mutation<B: Serialize + Sync>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<Vec<u8>, UnityApiError> {
        debug!(url = %url, method = %method, "mutating request");
        let builder = self.request(method, url);
        let response = match body {
            Some(payload) => builder.json(payload),
            None => builder,
        }
        .send()
        .await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            return Err(UnityApiError::from_response(status, &bytes));
        }
        Ok(bytes.to_vec())
    }

    async fn login(&self) -> Result<(), UnityApiError> {
        let url = self.url(&["api", "types", "loginSessionInfo", "instances"])?;
        let response = self.request(Method::GET, url).send().await?;
        let status = response.status();
        let token = response
            .headers()
            .get(CSRF_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        if !status.is_success() {
            let body = response.bytes().await?;
            return Err(UnityApiError::from_response(status, &body));
        }
        self.store_token(token);
        Ok(())
    }

    async fn fetch_lun(&self, id: &str) -> Result<Option<Lun>, UnityApiError> {
        let url = self.url(&["api", "instances", "lun", id])?;
        let found: Option<InstanceResponse<LunContent>> = self
            .fetch(url, &[("fields", LUN_FIELDS), ("compact", "true")])
            .await?;
        Ok(found.map(|response| response.content.into()))
    }

    async fn fetch_pool(&self, key: &str) -> Result<Option<Pool>, UnityApiError> {
        let url = self.url(&["api", "instances", "pool", key])?;
        let found: Option<InstanceResponse<PoolContent>> = self
            .fetch(url, &[("fields", POOL_FIELDS), ("compact", "true")])
            .await?;
        Ok(found.map(|response| response.content.into()))
    }

    /// Replaces the LUN's host access list.
    async fn set_host_access<'a>(
        &self,
        lun: &Lun,
        host_ids: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), UnityApiError> {
        let url = self.url(&[
            "api",
            "instances",
            "storageResource",
            lun.id.as_str(),
            "action",
            "modifyLun",
        ])?;
        let body = ModifyHostAccessRequest::new(host_ids);
        self.send_mutation(Method::POST, url, Some(&body))
            .await
            .map(drop)
    }

    /// Current host associations, read fresh from the array.
    async fn current_hosts(&self, lun: &Lun) -> Result<Vec<HostAccess>, UnityApiError> {
        let fresh = self.fetch_lun(&lun.id).await?.ok_or_else(|| UnityApiError::Api {
            status: StatusCode::NOT_FOUND.as_u16(),
            code: None,
            message: format!("LUN {} no longer exists", lun.id),
        })?;
        Ok(fresh.host_access)
    }
}

fn parse_endpoint(endpoint: &str) -> Result<Url, UnityApiError> {
    let trimmed = endpoint.trim().trim_end_matches('/');
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_owned()
    } else {
        format!("https://{trimmed}")
    };
    let url = Url::parse(&with_scheme).map_err(|err| UnityApiError::InvalidEndpoint {
        endpoint: endpoint.to_owned(),
        message: err.to_string(),
    })?;
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(UnityApiError::InvalidEndpoint {
            endpoint: endpoint.to_owned(),
            message: String::from("endpoint has no host"),
        });
    }
    Ok(url)
}

/// Appends percent-encoded path segments to `base`.
fn endpoint_url(base: &Url, segments: &[&str]) -> Result<Url, UnityApiError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| UnityApiError::InvalidEndpoint {
            endpoint: base.to_string(),
            message: String::from("endpoint cannot carry a path"),
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

impl ArrayClient for UnityClient {
    type Error = UnityApiError;

    fn authenticate(&self) -> ArrayFuture<'_, (), Self::Error> {
        Box::pin(async move { self.login().await })
    }

    fn serial_number(&self) -> ArrayFuture<'_, String, Self::Error> {
        Box::pin(async move {
            let url = self.url(&["api", "types", "system", "instances"])?;
            let systems: CollectionResponse<SystemContent> = self
                .fetch(url, &[("fields", "serialNumber"), ("compact", "true")])
                .await?
                .ok_or_else(|| UnityApiError::Decode(String::from("system collection missing")))?;
            systems
                .into_contents()
                .find_map(|system| system.serial_number)
                .ok_or_else(|| UnityApiError::Decode(String::from("array serial number missing")))
        })
    }

    fn pool_by_id<'a>(&'a self, id: &'a str) -> ArrayFuture<'a, Option<Pool>, Self::Error> {
        Box::pin(async move { self.fetch_pool(id).await })
    }

    fn pool_by_name<'a>(&'a self, name: &'a str) -> ArrayFuture<'a, Option<Pool>, Self::Error> {
        Box::pin(async move { self.fetch_pool(&format!("name:{name}")).await })
    }

    fn luns<'a>(&'a self, pool: &'a Pool) -> ArrayFuture<'a, Vec<Lun>, Self::Error> {
        Box::pin(async move {
            let url = self.url(&["api", "types", "lun", "instances"])?;
            let filter = format!("pool.id eq \"{}\"", pool.id);
            let luns: Option<CollectionResponse<LunContent>> = self
                .fetch(
                    url,
                    &[
                        ("fields", LUN_FIELDS),
                        ("filter", filter.as_str()),
                        ("compact", "true"),
                    ],
                )
                .await?;
            Ok(luns
                .map(|collection| collection.into_contents().map(Lun::from).collect())
                .unwrap_or_default())
        })
    }

    fn create_lun<'a>(
        &'a self,
        pool: &'a Pool,
        request: &'a LunRequest,
    ) -> ArrayFuture<'a, Lun, Self::Error> {
        Box::pin(async move {
            let url = self.url(&["api", "types", "storageResource", "action", "createLun"])?;
            let body = CreateLunRequest::new(pool, &request.name, request.size_bytes, request.thin);
            let raw = self.send_mutation(Method::POST, url, Some(&body)).await?;
            let created: InstanceResponse<CreatedLun> = serde_json::from_slice(&raw)
                .map_err(|err| UnityApiError::Decode(err.to_string()))?;
            let id = created.content.storage_resource.id;
            self.fetch_lun(&id).await?.ok_or_else(|| {
                UnityApiError::Decode(format!("created LUN {id} could not be read back"))
            })
        })
    }

    fn lun_by_id<'a>(&'a self, id: &'a str) -> ArrayFuture<'a, Option<Lun>, Self::Error> {
        Box::pin(async move { self.fetch_lun(id).await })
    }

    fn delete_lun<'a>(&'a self, lun: &'a Lun) -> ArrayFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let url = self.url(&["api", "instances", "storageResource", lun.id.as_str()])?;
            self.send_mutation::<()>(Method::DELETE, url, None)
                .await
                .map(drop)
        })
    }

    fn host_associations<'a>(
        &'a self,
        lun: &'a Lun,
    ) -> ArrayFuture<'a, Vec<HostAccess>, Self::Error> {
        Box::pin(async move { self.current_hosts(lun).await })
    }

    /// Unisphere replaces the whole host list on `modifyLun`, so this reads
    /// the current list and writes it back with `host` appended. An update
    /// made by another client between the two calls is overwritten.
    fn attach_host<'a>(
        &'a self,
        lun: &'a Lun,
        host: &'a Host,
    ) -> ArrayFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let current = self.current_hosts(lun).await?;
            if current.iter().any(|access| access.host.id == host.id) {
                return Ok(());
            }
            let ids = current
                .iter()
                .map(|access| access.host.id.as_str())
                .chain(std::iter::once(host.id.as_str()));
            self.set_host_access(lun, ids).await
        })
    }

    /// Reads the host list and writes it back without `host`. Shares the
    /// lost-update window of `attach_host`.
    fn detach_host<'a>(
        &'a self,
        lun: &'a Lun,
        host: &'a Host,
    ) -> ArrayFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let current = self.current_hosts(lun).await?;
            let ids = current
                .iter()
                .map(|access| access.host.id.as_str())
                .filter(|id| *id != host.id);
            self.set_host_access(lun, ids).await
        })
    }

    fn replace_host_access<'a>(
        &'a self,
        lun: &'a Lun,
        host: &'a Host,
    ) -> ArrayFuture<'a, (), Self::Error> {
        Box::pin(async move {
            self.set_host_access(lun, std::iter::once(host.id.as_str()))
                .await
        })
    }

    fn detach_all_hosts<'a>(&'a self, lun: &'a Lun) -> ArrayFuture<'a, (), Self::Error> {
        Box::pin(async move { self.set_host_access(lun, std::iter::empty()).await })
    }

    fn host_by_id<'a>(&'a self, id: &'a str) -> ArrayFuture<'a, Option<Host>, Self::Error> {
        Box::pin(async move {
            let url = self.url(&["api", "instances", "host", id])?;
            let found: Option<InstanceResponse<HostContent>> = self
                .fetch(url, &[("fields", HOST_FIELDS), ("compact", "true")])
                .await?;
            Ok(found.map(|response| response.content.into()))
        })
    }

    fn host_by_name<'a>(&'a self, name: &'a str) -> ArrayFuture<'a, Option<Host>, Self::Error> {
        Box::pin(async move {
            let url = self.url(&["api", "types", "host", "instances"])?;
            let filter = format!("name eq \"{name}\"");
            let hosts: Option<CollectionResponse<HostContent>> = self
                .fetch(
                    url,
                    &[
                        ("fields", HOST_FIELDS),
                        ("filter", filter.as_str()),
                        ("compact", "true"),
                    ],
                )
                .await?;
            Ok(hosts.and_then(|collection| collection.into_contents().next().map(Host::from)))
        })
    }
}
