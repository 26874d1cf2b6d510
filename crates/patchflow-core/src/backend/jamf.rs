//! Classic API client.
//!
//! Talks XML to `<server>/JSSResource/...` with basic auth. The pipeline is
//! synchronous, so each call drives the async reqwest client to completion on
//! a runtime owned by the client.

use std::fmt;
use std::path::Path;

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE};
use tokio_util::io::ReaderStream;
use tracing::debug;
use url::Url;

use crate::error::{BackendError, BackendResult};
use crate::model::{
    DeploymentPolicy, PackageMetadata, PatchDefinition, PatchPolicy, PatchPolicySummary,
    PatchTitleSummary,
};

use super::{Backend, xml};

const API_ROOT: &str = "JSSResource";
const XML: &str = "application/xml";

/// Load-balancer cookies that pin a session to one server node.
const AFFINITY_COOKIES: [&str; 2] = ["APBALANCEID", "AWSALB"];

/// API account credentials.
#[derive(Clone)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug)]
pub struct JamfClient {
    server: Url,
    credentials: Credentials,
    http: reqwest::Client,
    runtime: tokio::runtime::Runtime,
}

impl JamfClient {
    /// Build a client for `server` and open a session against it.
    ///
    /// The first request fetches the server's front page so the cookie store
    /// picks up the load-balancer affinity cookie; every later request then
    /// reaches the same node and sees its own earlier writes.
    pub fn connect(server: &str, credentials: Credentials) -> BackendResult<Self> {
        let server = Url::parse(server).map_err(|e| BackendError::Transport {
            operation: "parse server url".to_string(),
            message: format!("{server}: {e}"),
        })?;
        if server.cannot_be_a_base() {
            return Err(BackendError::Transport {
                operation: "parse server url".to_string(),
                message: format!("{server} cannot carry API paths"),
            });
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("patchflow/", env!("CARGO_PKG_VERSION")))
            .cookie_store(true)
            .build()
            .map_err(|e| BackendError::Transport {
                operation: "build HTTP client".to_string(),
                message: e.to_string(),
            })?;

        let client = Self {
            server,
            credentials,
            http,
            runtime,
        };
        client.open_session()?;
        Ok(client)
    }

    fn open_session(&self) -> BackendResult<()> {
        let operation = "open session";
        let response = self
            .runtime
            .block_on(self.http.get(self.server.clone()).send())
            .map_err(|e| transport(operation, e))?;
        match response
            .cookies()
            .find(|c| AFFINITY_COOKIES.contains(&c.name()))
        {
            Some(cookie) => debug!("Session pinned with {} cookie", cookie.name()),
            None => debug!("No affinity cookie offered by {}", self.server),
        }
        Ok(())
    }

    fn resource(&self, segments: &[&str]) -> Url {
        let mut url = self.server.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push(API_ROOT).extend(segments);
        }
        url
    }

    fn get(&self, operation: &str, url: Url) -> BackendResult<String> {
        debug!("GET {}", url);
        self.runtime.block_on(async {
            let response = self
                .http
                .get(url)
                .basic_auth(&self.credentials.user, Some(&self.credentials.password))
                .header(ACCEPT, XML)
                .send()
                .await
                .map_err(|e| transport(operation, e))?;
            match response.status() {
                StatusCode::OK => response.text().await.map_err(|e| transport(operation, e)),
                StatusCode::NOT_FOUND => Err(BackendError::NotFound {
                    what: operation.to_string(),
                }),
                status => Err(BackendError::Status {
                    operation: operation.to_string(),
                    status: status.as_u16(),
                }),
            }
        })
    }

    /// PUT an XML body; the server answers 201 with the record id.
    fn put(&self, operation: &str, url: Url, body: String) -> BackendResult<u64> {
        debug!("PUT {}", url);
        let text = self.runtime.block_on(async {
            let response = self
                .http
                .put(url)
                .basic_auth(&self.credentials.user, Some(&self.credentials.password))
                .header(CONTENT_TYPE, XML)
                .header(ACCEPT, XML)
                .body(body)
                .send()
                .await
                .map_err(|e| transport(operation, e))?;
            match response.status() {
                StatusCode::CREATED => response.text().await.map_err(|e| transport(operation, e)),
                StatusCode::NOT_FOUND => Err(BackendError::NotFound {
                    what: operation.to_string(),
                }),
                status => Err(BackendError::Status {
                    operation: operation.to_string(),
                    status: status.as_u16(),
                }),
            }
        })?;
        xml::parse_id_echo(operation, &text)
    }
}

impl Backend for JamfClient {
    fn find_package(&self, name: &str) -> BackendResult<Option<u64>> {
        let operation = format!("package '{name}'");
        match self.get(&operation, self.resource(&["packages", "name", name])) {
            Ok(body) => xml::parse_id_echo(&operation, &body).map(Some),
            Err(BackendError::NotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn upload_artifact(&self, path: &Path) -> BackendResult<u64> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let operation = format!("upload {file_name}");
        let mut url = self.server.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("dbfileupload");
        }
        debug!("POST {} ({})", url, path.display());

        let text = self.runtime.block_on(async {
            let file = tokio::fs::File::open(path).await?;
            let length = file.metadata().await?.len();
            let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
            let response = self
                .http
                .post(url)
                .basic_auth(&self.credentials.user, Some(&self.credentials.password))
                .header("DESTINATION", "0")
                .header("OBJECT_ID", "-1")
                .header("FILE_TYPE", "0")
                .header("FILE_NAME", file_name.as_str())
                .header(CONTENT_LENGTH, length)
                .body(body)
                .send()
                .await
                .map_err(|e| transport(&operation, e))?;
            let status = response.status();
            if !status.is_success() {
                return Err(BackendError::Status {
                    operation: operation.clone(),
                    status: status.as_u16(),
                });
            }
            response.text().await.map_err(|e| transport(&operation, e))
        })?;
        xml::parse_id_echo(&operation, &text)
    }

    fn put_package(&self, id: u64, metadata: &PackageMetadata) -> BackendResult<()> {
        let id_text = id.to_string();
        let url = self.resource(&["packages", "id", &id_text]);
        self.put(
            &format!("update package {id}"),
            url,
            xml::package_body(id, metadata)?,
        )
        .map(|_| ())
    }

    fn get_policy(&self, name: &str) -> BackendResult<DeploymentPolicy> {
        let body = self.get(
            &format!("policy '{name}'"),
            self.resource(&["policies", "name", name]),
        )?;
        xml::parse_policy(&body)
    }

    fn put_policy(&self, policy: &DeploymentPolicy) -> BackendResult<u64> {
        let id_text = policy.id.to_string();
        self.put(
            &format!("update policy '{}'", policy.name),
            self.resource(&["policies", "id", &id_text]),
            xml::policy_body(policy)?,
        )
    }

    fn list_patch_titles(&self) -> BackendResult<Vec<PatchTitleSummary>> {
        let body = self.get("patch title list", self.resource(&["patchsoftwaretitles"]))?;
        xml::parse_patch_titles(&body)
    }

    fn get_patch_definition(&self, id: u64) -> BackendResult<PatchDefinition> {
        let id_text = id.to_string();
        let body = self.get(
            &format!("patch definition {id}"),
            self.resource(&["patchsoftwaretitles", "id", &id_text]),
        )?;
        xml::parse_patch_definition(&body)
    }

    fn put_patch_definition(&self, definition: &PatchDefinition) -> BackendResult<()> {
        let id_text = definition.id.to_string();
        self.put(
            &format!("update patch definition '{}'", definition.name),
            self.resource(&["patchsoftwaretitles", "id", &id_text]),
            xml::patch_definition_body(definition)?,
        )
        .map(|_| ())
    }

    fn list_patch_policies(&self, patch_title_id: u64) -> BackendResult<Vec<PatchPolicySummary>> {
        let id_text = patch_title_id.to_string();
        let body = self.get(
            &format!("patch policy list of title {patch_title_id}"),
            self.resource(&["patchpolicies", "softwaretitleconfig", "id", &id_text]),
        )?;
        xml::parse_patch_policies(&body)
    }

    fn get_patch_policy(&self, id: u64) -> BackendResult<PatchPolicy> {
        let id_text = id.to_string();
        let body = self.get(
            &format!("patch policy {id}"),
            self.resource(&["patchpolicies", "id", &id_text]),
        )?;
        xml::parse_patch_policy(&body)
    }

    fn put_patch_policy(&self, policy: &PatchPolicy) -> BackendResult<u64> {
        let id_text = policy.id.to_string();
        self.put(
            &format!("update patch policy '{}'", policy.name),
            self.resource(&["patchpolicies", "id", &id_text]),
            xml::patch_policy_body(policy)?,
        )
    }
}

fn transport(operation: &str, err: reqwest::Error) -> BackendError {
    BackendError::Transport {
        operation: operation.to_string(),
        message: err.to_string(),
    }
}
