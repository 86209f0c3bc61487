//! Session façade over the service protocol.

use std::collections::HashMap;

use bytes::Bytes;
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use crate::auth::AuthContext;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::path::{decode_component, query_url, resource_path, Action};
use crate::types::{
    blobs_from_elements, Blob, BlobId, BlobSetWire, Collection, CollectionDetailWire,
    CollectionInfo, CollectionListWire, Permission, ShareLink,
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// One connection to a Hearty Rabbit server.
///
/// A Session owns its transport and its identity; nothing is shared between
/// Session instances, so independent sessions (distinct users, or an
/// anonymous viewer) can run side by side against the same server. Each
/// operation is one request/response exchange; calls that would both mutate
/// the identity (`login`, `logout`) must not run concurrently on the same
/// Session.
pub struct Session {
    base: Url,
    http: Client,
    auth: AuthContext,
    auth_key: Option<String>,
}

impl Session {
    /// Create an anonymous session against the configured server.
    pub fn new(config: Config) -> Result<Self> {
        let base = Url::parse(&config.endpoint).map_err(|err| {
            Error::BadRequest(format!("invalid endpoint {:?}: {err}", config.endpoint))
        })?;

        let mut builder = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout);

        // TLS trust material is forwarded opaquely to the transport.
        if let Some(pem) = &config.extra_root_cert {
            let cert = reqwest::Certificate::from_pem(&std::fs::read(pem)?)?;
            builder = builder.add_root_certificate(cert);
        }
        if config.danger_accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http = builder.build()?;
        Ok(Self {
            base,
            http,
            auth: AuthContext::default(),
            auth_key: None,
        })
    }

    /// Create with endpoint URL
    pub fn with_endpoint(endpoint: &str) -> Result<Self> {
        Self::new(Config::new(endpoint))
    }

    /// The authenticated user name, or `None` when anonymous.
    pub fn user(&self) -> Option<&str> {
        self.auth.user()
    }

    /// The identity this session acts as.
    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    /// Present a collection share key on subsequent read operations.
    ///
    /// The key is sent as the `auth` query parameter. It only grants access
    /// to the collection it was issued for; against any other collection the
    /// server behaves as if no key were given, and on mutating paths it is
    /// rejected outright.
    pub fn set_auth_key(&mut self, key: Option<String>) {
        self.auth_key = key;
    }

    /// The share key currently presented on reads, if any.
    pub fn auth_key(&self) -> Option<&str> {
        self.auth_key.as_deref()
    }

    // ==================== Session lifecycle ====================

    /// Authenticate. On success the session leaves the anonymous state and
    /// `user()` reports the logged-in name.
    #[instrument(skip(self, password))]
    pub async fn login(&mut self, user: &str, password: &str) -> Result<()> {
        let body = format!(
            "username={}&password={}",
            urlencoding::encode(user),
            urlencoding::encode(password)
        );
        let response = self
            .request(Method::POST, "/login")
            .header(header::CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(body)
            .send()
            .await?;

        let token = match session_cookie(&response) {
            Some(token) if response.status() == StatusCode::NO_CONTENT => token,
            _ => {
                return Err(Error::from_status(
                    response.status(),
                    format!("login rejected for {user}"),
                ))
            }
        };

        self.auth.set(user.to_owned(), token);
        Ok(())
    }

    /// Invalidate the session token server-side and return to anonymous.
    #[instrument(skip(self))]
    pub async fn logout(&mut self) -> Result<()> {
        let response = self.request(Method::GET, "/logout").send().await?;
        if response.status() != StatusCode::OK {
            return Err(Error::from_status(response.status(), "cannot logout"));
        }
        self.auth.clear();
        Ok(())
    }

    /// Release the local transport. Unlike [`logout`](Self::logout) this does
    /// not invalidate the server-side session.
    pub fn close(self) {}

    // ==================== Collection operations ====================

    /// List the collections owned by `user` (default: the logged-in user).
    /// Only name, owner and cover are populated.
    #[instrument(skip(self))]
    pub async fn list_collections(&self, user: Option<&str>) -> Result<Vec<CollectionInfo>> {
        let user = self.resolve_owner(user)?;
        let url = query_url("/query/collection", &[("user", Some(user)), ("json", None)]);
        let response = self.request(Method::GET, &url).send().await?;
        if response.status() != StatusCode::OK {
            return Err(Error::from_status(
                response.status(),
                format!("cannot list collections of {user}"),
            ));
        }

        let wire: CollectionListWire = parse_json(response).await?;
        wire.colls.into_iter().map(CollectionInfo::try_from).collect()
    }

    /// Fetch a collection with its member blobs.
    ///
    /// When the session is anonymous or not the owner, the response is the
    /// third-party view: only blobs visible to this session are listed and
    /// the server omits its `username` echo. A response that carries a
    /// `username` different from this session's user is malformed.
    #[instrument(skip(self))]
    pub async fn get_collection(&self, collection: &str, owner: Option<&str>) -> Result<Collection> {
        let owner = self.resolve_owner(owner)?;
        let url = self.read_url(resource_path(Action::Api, owner, collection, ""), &[]);
        let response = self.request(Method::GET, &url).send().await?;
        if response.status() != StatusCode::OK {
            return Err(Error::from_status(
                response.status(),
                format!("cannot get collection {collection:?} of {owner}"),
            ));
        }

        let wire: CollectionDetailWire = parse_json(response).await?;
        if wire.username.as_deref() != self.auth.user() {
            return Err(Error::InvalidResponse(format!(
                "collection response for another session: {:?}",
                wire.username
            )));
        }
        Collection::try_from(wire)
    }

    /// Delete every blob of a collection. The collection itself disappears
    /// with its last member.
    #[instrument(skip(self))]
    pub async fn delete_collection(&self, collection: &str) -> Result<()> {
        let coll = self.get_collection(collection, None).await?;
        for id in coll.elements.keys() {
            self.delete_blob(collection, id).await?;
        }
        Ok(())
    }

    /// Designate a member blob as the collection cover. A blob from any
    /// other collection is rejected with `BadRequest`.
    #[instrument(skip(self))]
    pub async fn set_cover(&self, collection: &str, cover: &BlobId) -> Result<()> {
        let owner = self.resolve_owner(None)?;
        let path = resource_path(Action::Api, owner, collection, "");
        let response = self.post_form(&path, format!("cover={cover}")).await?;
        expect_no_content(
            response,
            format!("cannot set cover of {collection:?} to {cover}"),
        )
    }

    // ==================== Blob operations ====================

    /// Upload one blob. The server assigns the id and reports it in the
    /// `Location` header.
    #[instrument(skip(self, data))]
    pub async fn upload(
        &self,
        collection: &str,
        filename: &str,
        data: impl Into<Bytes>,
    ) -> Result<BlobId> {
        let owner = self.resolve_owner(None)?;
        let path = resource_path(Action::Upload, owner, collection, filename);
        let response = self
            .request(Method::PUT, &path)
            .body(data.into())
            .send()
            .await?;
        if response.status() != StatusCode::CREATED {
            return Err(Error::from_status(
                response.status(),
                format!("cannot upload {filename:?} to {collection:?}"),
            ));
        }

        BlobId::from_location(location_header(&response)?)
    }

    /// Fetch a blob's content from a collection. `rendition` selects a named
    /// derived representation; `None` requests the default.
    #[instrument(skip(self))]
    pub async fn get_blob(
        &self,
        collection: &str,
        id: &BlobId,
        owner: Option<&str>,
        rendition: Option<&str>,
    ) -> Result<Blob> {
        let owner = self.resolve_owner(owner)?;
        let url = self.read_url(
            resource_path(Action::Api, owner, collection, id.as_str()),
            &[("rendition", rendition)],
        );
        self.fetch_blob(id, &url).await
    }

    /// Fetch a blob by id alone, without knowing its collection.
    #[instrument(skip(self))]
    pub async fn query_blob(
        &self,
        id: &BlobId,
        owner: Option<&str>,
        rendition: Option<&str>,
    ) -> Result<Blob> {
        let owner = self.resolve_owner(owner)?;
        let mut params = vec![("id", Some(id.as_str())), ("owner", Some(owner))];
        if let Some(rendition) = rendition {
            params.push(("rendition", Some(rendition)));
        }
        let url = query_url("/query/blob", &params);
        self.fetch_blob(id, &url).await
    }

    /// Delete a blob. Deleting it again yields `NotFound`.
    #[instrument(skip(self))]
    pub async fn delete_blob(&self, collection: &str, id: &BlobId) -> Result<()> {
        let owner = self.resolve_owner(None)?;
        let path = resource_path(Action::Api, owner, collection, id.as_str());
        let response = self.request(Method::DELETE, &path).send().await?;
        expect_no_content(response, format!("cannot delete blob {id}"))
    }

    /// Re-parent a blob into another collection owned by the same user.
    #[instrument(skip(self))]
    pub async fn move_blob(&self, src: &str, id: &BlobId, dest: &str) -> Result<()> {
        let owner = self.resolve_owner(None)?;
        let path = resource_path(Action::Api, owner, src, id.as_str());
        let body = format!("move={}", urlencoding::encode(dest));
        let response = self.post_form(&path, body).await?;
        expect_no_content(
            response,
            format!("cannot move blob {id} from {src:?} to {dest:?}"),
        )
    }

    /// Set a blob's visibility tier.
    #[instrument(skip(self))]
    pub async fn set_permission(
        &self,
        collection: &str,
        id: &BlobId,
        perm: Permission,
    ) -> Result<()> {
        let owner = self.resolve_owner(None)?;
        let path = resource_path(Action::Api, owner, collection, id.as_str());
        let response = self.post_form(&path, format!("perm={}", perm.as_str())).await?;
        expect_no_content(response, format!("cannot set permission of blob {id} to {perm}"))
    }

    /// List public blobs of one user, or of the whole service when `user` is
    /// `None`. This is a different enumeration axis from collection
    /// membership: only `Permission::Public` blobs ever appear here.
    #[instrument(skip(self))]
    pub async fn list_public_blobs(&self, user: Option<&str>) -> Result<HashMap<BlobId, Blob>> {
        let url = query_url(
            "/query/blob_set",
            &[("public", Some(user.unwrap_or(""))), ("json", None)],
        );
        let response = self.request(Method::GET, &url).send().await?;
        if response.status() != StatusCode::OK {
            return Err(Error::from_status(response.status(), "cannot list public blobs"));
        }

        let wire: BlobSetWire = parse_json(response).await?;
        blobs_from_elements(wire.elements)
    }

    // ==================== Sharing ====================

    /// Create an anonymous, read-only share link for a collection.
    #[instrument(skip(self))]
    pub async fn share_collection(&self, collection: &str) -> Result<ShareLink> {
        let owner = self.resolve_owner(None)?;
        let path = resource_path(Action::Api, owner, collection, "");
        let response = self.post_form(&path, "share=create".to_owned()).await?;
        if response.status() != StatusCode::NO_CONTENT {
            return Err(Error::from_status(
                response.status(),
                format!("cannot share collection {collection:?}"),
            ));
        }
        Ok(ShareLink::new(location_header(&response)?.to_owned()))
    }

    /// Enumerate the active share keys of a collection.
    #[instrument(skip(self))]
    pub async fn list_shares(&self, collection: &str) -> Result<Vec<String>> {
        let owner = self.resolve_owner(None)?;
        let path = resource_path(Action::Api, owner, collection, "");
        let response = self.post_form(&path, "share=list".to_owned()).await?;
        if response.status() != StatusCode::OK {
            return Err(Error::from_status(
                response.status(),
                format!("cannot list shares of collection {collection:?}"),
            ));
        }
        parse_json(response).await
    }

    // ==================== Helpers ====================

    /// Default-resolution order for the acting owner: explicit argument,
    /// then the logged-in user, otherwise a typed error.
    fn resolve_owner<'a>(&'a self, explicit: Option<&'a str>) -> Result<&'a str> {
        explicit
            .or_else(|| self.auth.user())
            .ok_or_else(|| Error::BadRequest("no owner given and not logged in".to_owned()))
    }

    fn request(&self, method: Method, path_and_query: &str) -> RequestBuilder {
        let url = format!(
            "{}{}",
            self.base.as_str().trim_end_matches('/'),
            path_and_query
        );
        debug!(%method, %url, "sending request");
        let mut request = self.http.request(method, url);
        if let Some(token) = self.auth.token() {
            request = request.header(header::COOKIE, format!("id={token}"));
        }
        request
    }

    /// Build a read-path URL, appending the share key when one is set.
    fn read_url(&self, path: String, params: &[(&str, Option<&str>)]) -> String {
        let mut params: Vec<(&str, Option<&str>)> = params
            .iter()
            .filter(|(_, value)| value.is_some())
            .copied()
            .collect();
        if let Some(key) = self.auth_key.as_deref() {
            params.push(("auth", Some(key)));
        }
        query_url(&path, &params)
    }

    async fn post_form(&self, path: &str, body: String) -> Result<Response> {
        let response = self
            .request(Method::POST, path)
            .header(header::CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(body)
            .send()
            .await?;
        Ok(response)
    }

    async fn fetch_blob(&self, id: &BlobId, path_and_query: &str) -> Result<Blob> {
        let response = self.request(Method::GET, path_and_query).send().await?;
        if response.status() != StatusCode::OK {
            return Err(Error::from_status(
                response.status(),
                format!("cannot get blob {id}"),
            ));
        }

        let mime = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| Error::InvalidResponse(format!("no content type for blob {id}")))?
            .to_owned();

        let filename = match response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(disposition_filename)
        {
            Some(encoded) => Some(decode_component(encoded).ok_or_else(|| {
                Error::InvalidResponse(format!("undecodable filename for blob {id}"))
            })?),
            None => None,
        };

        let data = response.bytes().await?;
        Ok(Blob {
            id: id.clone(),
            filename,
            mime,
            timestamp: None,
            permission: None,
            data: Some(data),
        })
    }
}

/// The percent-encoded filename carried by a content-disposition header.
fn disposition_filename(disposition: &str) -> Option<&str> {
    let (_, rest) = disposition.split_once("filename=")?;
    let name = rest.split(';').next().unwrap_or(rest).trim();
    (!name.is_empty()).then_some(name)
}

/// The value of the `id` cookie issued by the server, if any.
fn session_cookie(response: &Response) -> Option<String> {
    for value in response.headers().get_all(header::SET_COOKIE) {
        let Ok(text) = value.to_str() else { continue };
        let Some(first) = text.split(';').next() else { continue };
        if let Some((name, value)) = first.split_once('=') {
            if name.trim() == "id" && !value.is_empty() {
                return Some(value.to_owned());
            }
        }
    }
    None
}

fn location_header(response: &Response) -> Result<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| Error::InvalidResponse("response carries no location".to_owned()))
}

fn expect_no_content(response: Response, context: String) -> Result<()> {
    if response.status() != StatusCode::NO_CONTENT {
        return Err(Error::from_status(response.status(), context));
    }
    Ok(())
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let text = response.text().await?;
    serde_json::from_str(&text)
        .map_err(|err| Error::InvalidResponse(format!("malformed response body: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_filename_extraction() {
        assert_eq!(
            disposition_filename("inline; filename=%E6%B4%BE%E7%9F%B3.jpg"),
            Some("%E6%B4%BE%E7%9F%B3.jpg")
        );
        assert_eq!(disposition_filename("attachment"), None);
        assert_eq!(
            disposition_filename("filename=a.jpg; size=123"),
            Some("a.jpg")
        );
    }
}
