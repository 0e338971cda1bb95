//! Deploy/revalidation trigger. The default mode asks the storefront
//! host to refresh a single store path; the netlify mode falls back to
//! a full rebuild hook. An unconfigured integration is a no-op
//! success so the fulfillment pipeline never blocks on it.

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use crate::errors::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployProvider {
    Vercel,
    Netlify,
}

impl DeployProvider {
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "netlify" => DeployProvider::Netlify,
            _ => DeployProvider::Vercel,
        }
    }
}

#[async_trait]
pub trait DeployTrigger: Send + Sync {
    /// Refreshes the public cache for one storefront. Failures are
    /// reported as `false`, never as errors.
    async fn trigger_deploy(&self, store_slug: &str) -> bool;

    /// Full-site rebuild. Manual/admin use only; the per-order
    /// pipeline never calls this.
    async fn trigger_full_deploy(&self) -> bool;
}

pub struct HttpDeployTrigger {
    http: reqwest::Client,
    provider: DeployProvider,
    app_url: String,
    revalidate_secret: Option<String>,
    vercel_deploy_hook: Option<String>,
    netlify_build_hook: Option<String>,
}

impl HttpDeployTrigger {
    pub fn new(
        provider: DeployProvider,
        app_url: impl Into<String>,
        revalidate_secret: Option<String>,
        vercel_deploy_hook: Option<String>,
        netlify_build_hook: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("failed to build http client: {e}")))?;
        Ok(Self {
            http,
            provider,
            app_url: app_url.into().trim_end_matches('/').to_string(),
            revalidate_secret,
            vercel_deploy_hook,
            netlify_build_hook,
        })
    }

    async fn revalidate_store(&self, store_slug: &str) -> bool {
        let Some(secret) = &self.revalidate_secret else {
            warn!("revalidate_secret not set; skipping revalidation");
            return true;
        };

        let result = self
            .http
            .post(format!("{}/api/revalidate", self.app_url))
            .header("x-revalidate-secret", secret)
            .json(&json!({ "slug": store_slug }))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                info!(store_slug, "store revalidation triggered");
                true
            }
            Ok(response) => {
                error!(store_slug, status = %response.status(), "revalidation rejected");
                false
            }
            Err(e) => {
                error!(store_slug, error = %e, "revalidation request failed");
                false
            }
        }
    }

    async fn netlify_build(&self) -> bool {
        let Some(hook) = &self.netlify_build_hook else {
            warn!("netlify_build_hook not set; skipping build trigger");
            return true;
        };

        match self.http.post(hook).send().await {
            Ok(response) if response.status().is_success() => {
                info!("netlify build triggered");
                true
            }
            Ok(response) => {
                error!(status = %response.status(), "netlify build trigger rejected");
                false
            }
            Err(e) => {
                error!(error = %e, "netlify build trigger failed");
                false
            }
        }
    }
}

#[async_trait]
impl DeployTrigger for HttpDeployTrigger {
    #[instrument(skip(self))]
    async fn trigger_deploy(&self, store_slug: &str) -> bool {
        match self.provider {
            DeployProvider::Vercel => self.revalidate_store(store_slug).await,
            DeployProvider::Netlify => self.netlify_build().await,
        }
    }

    #[instrument(skip(self))]
    async fn trigger_full_deploy(&self) -> bool {
        let Some(hook) = &self.vercel_deploy_hook else {
            warn!("vercel_deploy_hook not set; skipping full deploy");
            return true;
        };

        match self.http.post(hook).send().await {
            Ok(response) if response.status().is_success() => {
                info!("full deployment triggered");
                true
            }
            Ok(response) => {
                error!(status = %response.status(), "full deploy hook rejected");
                false
            }
            Err(e) => {
                error!(error = %e, "full deploy hook failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn trigger(
        provider: DeployProvider,
        app_url: &str,
        secret: Option<&str>,
        netlify_hook: Option<String>,
    ) -> HttpDeployTrigger {
        HttpDeployTrigger::new(
            provider,
            app_url,
            secret.map(str::to_string),
            None,
            netlify_hook,
            Duration::from_secs(2),
        )
        .expect("deploy trigger")
    }

    #[tokio::test]
    async fn unconfigured_revalidation_is_a_noop_success() {
        let trigger = trigger(DeployProvider::Vercel, "http://localhost:3000", None, None);
        assert!(trigger.trigger_deploy("kedai-aisyah-x1").await);
    }

    #[tokio::test]
    async fn revalidation_targets_a_single_store() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/revalidate"))
            .and(header("x-revalidate-secret", "reval-secret"))
            .and(body_string_contains("kedai-aisyah-x1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let trigger = trigger(
            DeployProvider::Vercel,
            &server.uri(),
            Some("reval-secret"),
            None,
        );
        assert!(trigger.trigger_deploy("kedai-aisyah-x1").await);
    }

    #[tokio::test]
    async fn rejected_revalidation_reports_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/revalidate"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let trigger = trigger(
            DeployProvider::Vercel,
            &server.uri(),
            Some("wrong-secret"),
            None,
        );
        assert!(!trigger.trigger_deploy("kedai-aisyah-x1").await);
    }

    #[tokio::test]
    async fn netlify_mode_posts_the_build_hook() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/build"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let trigger = trigger(
            DeployProvider::Netlify,
            "http://localhost:3000",
            None,
            Some(format!("{}/hooks/build", server.uri())),
        );
        assert!(trigger.trigger_deploy("any-slug").await);
    }
}
