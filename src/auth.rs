//! Identity, credential and endpoint resolution.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use strum::{AsRefStr, Display, EnumString, VariantNames};
use tonic::transport::{Certificate, Channel, ClientTlsConfig};

use crate::error::{ConfigError, Result};
use crate::proto::UserAppIdSet;
use crate::scheme::SchemeCache;

pub const ENV_USER_ID: &str = "CLARIFAI_USER_ID";
pub const ENV_APP_ID: &str = "CLARIFAI_APP_ID";
pub const ENV_PAT: &str = "CLARIFAI_PAT";
pub const ENV_SESSION_TOKEN: &str = "CLARIFAI_SESSION_TOKEN";
pub const ENV_API_BASE: &str = "CLARIFAI_API_BASE";
pub const ENV_UI: &str = "CLARIFAI_UI";
pub const ENV_ROOT_CERTIFICATES_PATH: &str = "CLARIFAI_ROOT_CERTIFICATES_PATH";

pub const DEFAULT_BASE: &str = "https://api.clarifai.com";
pub const DEFAULT_UI: &str = "https://clarifai.com";

const PAT_METADATA_KEY: &str = "authorization";
const SESSION_TOKEN_METADATA_KEY: &str = "x-clarifai-session-token";

/// Resource kinds that can appear in a platform URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, VariantNames)]
#[strum(serialize_all = "snake_case")]
pub enum ResourceType {
    Modules,
    Models,
    Concepts,
    Inputs,
    Workflows,
    Tasks,
    InstalledModuleVersions,
}

/// Raw authentication settings, before validation.
///
/// Empty strings mean "not set", matching unset environment variables.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub user_id: String,
    pub app_id: String,
    pub pat: String,
    pub token: String,
    pub base: String,
    pub ui: String,
    pub root_certificates_path: Option<PathBuf>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            app_id: String::new(),
            pat: String::new(),
            token: String::new(),
            base: DEFAULT_BASE.to_string(),
            ui: DEFAULT_UI.to_string(),
            root_certificates_path: None,
        }
    }
}

impl AuthConfig {
    pub fn new(user_id: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            app_id: app_id.into(),
            ..Default::default()
        }
    }

    /// Reads every `CLARIFAI_*` variable; unset ones keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            user_id: lookup(ENV_USER_ID).unwrap_or_default(),
            app_id: lookup(ENV_APP_ID).unwrap_or_default(),
            pat: lookup(ENV_PAT).unwrap_or_default(),
            token: lookup(ENV_SESSION_TOKEN).unwrap_or_default(),
            base: lookup(ENV_API_BASE)
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.base),
            ui: lookup(ENV_UI).filter(|v| !v.is_empty()).unwrap_or(defaults.ui),
            root_certificates_path: lookup(ENV_ROOT_CERTIFICATES_PATH)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        }
    }

    pub fn with_pat(mut self, pat: impl Into<String>) -> Self {
        self.pat = pat.into();
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = base.into();
        self
    }

    pub fn with_ui(mut self, ui: impl Into<String>) -> Self {
        self.ui = ui.into();
        self
    }

    pub fn with_root_certificates_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.root_certificates_path = Some(path.into());
        self
    }
}

/// Resolved identity, credential and endpoints for one client.
#[derive(Debug, Clone)]
pub struct ClarifaiAuth {
    user_id: String,
    app_id: String,
    pat: Option<SecretString>,
    token: Option<SecretString>,
    base: String,
    ui: String,
    root_certificates_path: Option<PathBuf>,
    base_cache: SchemeCache,
    ui_cache: SchemeCache,
}

impl ClarifaiAuth {
    /// Resolves `config` against the process-wide scheme caches and validates it.
    pub fn new(config: AuthConfig) -> Result<Self> {
        Self::with_caches(config, SchemeCache::global_base(), SchemeCache::global_ui())
    }

    /// Like [`ClarifaiAuth::new`] but skips [`ClarifaiAuth::validate`].
    pub fn new_unvalidated(config: AuthConfig) -> Result<Self> {
        Self::resolve(config, SchemeCache::global_base(), SchemeCache::global_ui())
    }

    pub fn from_env() -> Result<Self> {
        Self::new(AuthConfig::from_env())
    }

    /// Resolves `config` against caller-owned scheme caches and validates it.
    pub fn with_caches(
        config: AuthConfig,
        base_cache: SchemeCache,
        ui_cache: SchemeCache,
    ) -> Result<Self> {
        let auth = Self::resolve(config, base_cache, ui_cache)?;
        auth.validate()?;
        Ok(auth)
    }

    fn resolve(config: AuthConfig, base_cache: SchemeCache, ui_cache: SchemeCache) -> Result<Self> {
        let base = base_cache.resolve(&config.base)?;
        let ui = ui_cache.resolve(&config.ui)?;
        Ok(Self {
            user_id: config.user_id,
            app_id: config.app_id,
            pat: non_empty_secret(config.pat),
            token: non_empty_secret(config.token),
            base,
            ui,
            root_certificates_path: config.root_certificates_path,
            base_cache,
            ui_cache,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.user_id.is_empty() {
            return Err(ConfigError::MissingUserId.into());
        }
        if self.app_id.is_empty() {
            return Err(ConfigError::MissingAppId.into());
        }
        match (&self.pat, &self.token) {
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingCredentials.into()),
            (None, None) => return Err(ConfigError::MissingCredential.into()),
            _ => {}
        }
        if let Some(path) = &self.root_certificates_path {
            if !path.exists() {
                return Err(ConfigError::RootCertificatesNotFound(path.clone()).into());
            }
        }
        Ok(())
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn user_app_id(&self) -> UserAppIdSet {
        UserAppIdSet {
            user_id: self.user_id.clone(),
            app_id: self.app_id.clone(),
        }
    }

    /// The single metadata entry that authenticates a call.
    ///
    /// A personal access token takes precedence over a session token.
    pub fn metadata(&self) -> Result<Vec<(&'static str, String)>> {
        if let Some(pat) = &self.pat {
            Ok(vec![(PAT_METADATA_KEY, format!("Key {}", pat.expose_secret()))])
        } else if let Some(token) = &self.token {
            Ok(vec![(SESSION_TOKEN_METADATA_KEY, token.expose_secret().clone())])
        } else {
            Err(ConfigError::MissingCredential.into())
        }
    }

    /// Scheme-qualified API base URL.
    pub fn base(&self) -> Result<String> {
        self.base_cache.url_for(&self.base)
    }

    /// Scheme-qualified UI URL.
    pub fn ui(&self) -> Result<String> {
        self.ui_cache.url_for(&self.ui)
    }

    pub fn set_base(&mut self, base: &str) -> Result<()> {
        self.base = self.base_cache.resolve(base)?;
        Ok(())
    }

    pub fn set_ui(&mut self, ui: &str) -> Result<()> {
        self.ui = self.ui_cache.resolve(ui)?;
        Ok(())
    }

    /// Builds `{base}/{user}/{app}/{resource_type}/{resource_id}[/versions/{version}]`.
    pub fn clarifai_url(
        &self,
        resource_type: &str,
        resource_id: &str,
        version_id: Option<&str>,
    ) -> Result<String> {
        let resource_type =
            ResourceType::from_str(resource_type).map_err(|_| ConfigError::InvalidResourceType {
                given: resource_type.to_string(),
                valid: ResourceType::VARIANTS.join(", "),
            })?;
        self.resource_url(resource_type, resource_id, version_id)
    }

    pub fn resource_url(
        &self,
        resource_type: ResourceType,
        resource_id: &str,
        version_id: Option<&str>,
    ) -> Result<String> {
        let mut url = format!(
            "{}/{}/{}/{}/{}",
            self.base()?,
            self.user_id,
            self.app_id,
            resource_type,
            resource_id
        );
        if let Some(version_id) = version_id {
            url.push_str("/versions/");
            url.push_str(version_id);
        }
        Ok(url)
    }

    /// Lazily connecting channel to the API base.
    ///
    /// HTTPS hosts get TLS trusting the configured root certificates, or the
    /// native root store when none are configured.
    pub fn channel(&self) -> Result<Channel> {
        let url = self.base()?;
        let mut endpoint = Channel::from_shared(url.clone())
            .map_err(|_| ConfigError::InvalidEndpoint(url.clone()))?;

        if self.base_cache.is_secure(&self.base) == Some(true) {
            let tls = match &self.root_certificates_path {
                Some(path) => {
                    let pem = std::fs::read(path)?;
                    ClientTlsConfig::new().ca_certificate(Certificate::from_pem(pem))
                }
                None => ClientTlsConfig::new().with_native_roots(),
            };
            endpoint = endpoint.tls_config(tls)?;
        }

        Ok(endpoint.connect_lazy())
    }

    /// Environment variables a deployment must provide.
    pub fn required_env_vars() -> &'static [&'static str] {
        &[ENV_USER_ID, ENV_APP_ID, ENV_PAT]
    }

    /// Rejects a secrets map in which any auth key is present but empty.
    pub fn validate_secrets_dict(secrets: &HashMap<String, String>) -> Result<()> {
        for key in [ENV_USER_ID, ENV_APP_ID, ENV_PAT] {
            if secrets.get(key).is_some_and(|value| value.is_empty()) {
                return Err(ConfigError::EmptySecret(key).into());
            }
        }
        Ok(())
    }
}

fn non_empty_secret(value: String) -> Option<SecretString> {
    (!value.is_empty()).then(|| SecretString::new(value))
}
