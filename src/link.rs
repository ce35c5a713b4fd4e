//! Download link construction and resolution
//!
//! Links are handed out as `{public_base_url}/{id}/{filename}`. The reverse
//! proxy in front of the server strips its routing segment, so the same
//! download arrives here as `{files_route}/{id}/{filename}`. The filename is
//! cosmetic; only the id segment is ever used for lookup.

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::store::ArtifactId;
use url::Url;

const FALLBACK_FILENAME: &str = "download";

/// Translates between artifact ids and their externally routable URLs
#[derive(Debug, Clone)]
pub struct LinkResolver {
    base: Url,
    /// Path segments of `base`
    public_prefix: Vec<String>,
    /// Path segments of the route the server sees after the proxy rewrite
    route_prefix: Vec<String>,
}

fn segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl LinkResolver {
    /// Create a resolver for links under `public_base_url`, served locally under `files_route`
    pub fn new(public_base_url: &str, files_route: &str) -> Result<Self> {
        let base = Url::parse(public_base_url).map_err(|e| {
            Error::invalid_input(format!("invalid public base url: {}", e))
        })?;
        if base.cannot_be_a_base() {
            return Err(Error::invalid_input(
                "public base url cannot carry a path",
            ));
        }

        let public_prefix = segments(base.path());
        Ok(Self {
            base,
            public_prefix,
            route_prefix: segments(files_route),
        })
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        Self::new(&config.public_base_url, &config.files_route)
    }

    /// Build the public download URL for an artifact
    pub fn build_link(&self, id: ArtifactId, filename: &str) -> String {
        let filename = if filename.is_empty() {
            FALLBACK_FILENAME
        } else {
            filename
        };

        let mut url = self.base.clone();
        url.set_query(None);
        url.set_fragment(None);
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push(&id.to_string()).push(filename);
        }
        url.to_string()
    }

    /// Extract the artifact id from an inbound request path (or a full link).
    ///
    /// Accepts paths under either the local files route or the public base
    /// path. The filename segment, if present, is ignored.
    pub fn resolve(&self, request_path: &str) -> Result<ArtifactId> {
        let malformed = || Error::MalformedPath {
            path: request_path.to_string(),
        };

        let path = if request_path.starts_with("http://") || request_path.starts_with("https://")
        {
            Url::parse(request_path).map_err(|_| malformed())?.path().to_string()
        } else {
            let end = request_path
                .find(['?', '#'])
                .unwrap_or(request_path.len());
            request_path[..end].to_string()
        };

        let parts = segments(&path);
        let rest = [&self.route_prefix, &self.public_prefix]
            .into_iter()
            .find(|prefix| parts.starts_with(prefix))
            .map(|prefix| &parts[prefix.len()..])
            .ok_or_else(malformed)?;

        let id_segment = rest.first().ok_or_else(malformed)?;
        ArtifactId::parse(id_segment).ok_or_else(malformed)
    }
}
