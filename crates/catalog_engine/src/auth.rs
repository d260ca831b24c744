use std::time::Duration;

use catalog_core::normalize_origin;
use harvest_logging::{harvest_debug, harvest_info};

use crate::driver::{DriverError, PageDriver};
use crate::session::SessionBlob;

/// Opaque credential pair handed in by the caller; the engine never reads the
/// environment itself.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub identifier: String,
    pub secret: String,
}

impl Credentials {
    pub fn is_complete(&self) -> bool {
        !self.identifier.is_empty() && !self.secret.is_empty()
    }
}

/// Selectors and labels describing the login surface, configured per
/// deployment.
#[derive(Debug, Clone)]
pub struct AuthSelectors {
    /// Labels of controls that open the login form ("Sign in", "Login").
    pub signin_labels: Vec<String>,
    pub identifier_input: String,
    pub secret_input: String,
    pub submit: String,
    /// Fallback labels when the submit selector matches nothing.
    pub submit_labels: Vec<String>,
    pub error_banner: String,
    /// Element that only exists when authenticated.
    pub authenticated_marker: String,
    /// Bound on the wait for the post-login marker.
    pub login_timeout: Duration,
    /// Bound on the wait for the login form itself.
    pub form_timeout: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("credentials missing from the environment")]
    MissingCredentials,
    #[error("login rejected: {0}")]
    Rejected(String),
    #[error("timed out waiting for the post-login marker")]
    Timeout,
    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Performs interactive credential login. Fatal on failure; retries, if
/// desired, are an external policy.
pub struct Authenticator {
    selectors: AuthSelectors,
}

impl Authenticator {
    pub fn new(selectors: AuthSelectors) -> Self {
        Self { selectors }
    }

    /// Submits credentials and waits (bounded) for the authenticated marker.
    /// On success, captures and returns the fresh session for persistence.
    pub async fn login(
        &self,
        driver: &dyn PageDriver,
        target_url: &str,
        credentials: &Credentials,
    ) -> Result<SessionBlob, AuthError> {
        if !credentials.is_complete() {
            return Err(AuthError::MissingCredentials);
        }

        let sel = &self.selectors;
        if driver.click_text(&sel.signin_labels).await? {
            harvest_debug!("Opened login form via sign-in control");
        }

        // The form may need a direct visit to the login route.
        match driver
            .wait_for(&sel.identifier_input, sel.form_timeout)
            .await
        {
            Ok(()) => {}
            Err(DriverError::WaitTimeout { .. }) => {
                let login_url = format!("{}/login", target_url.trim_end_matches('/'));
                harvest_debug!("Login form not visible; navigating to {}", login_url);
                driver.navigate(&login_url).await?;
                driver
                    .wait_for(&sel.identifier_input, sel.form_timeout)
                    .await?;
            }
            Err(err) => return Err(err.into()),
        }

        driver
            .fill(&sel.identifier_input, &credentials.identifier)
            .await?;
        driver.fill(&sel.secret_input, &credentials.secret).await?;

        match driver.click(&sel.submit).await {
            Ok(()) => {}
            Err(DriverError::NotFound { .. }) => {
                driver.click_text(&sel.submit_labels).await?;
            }
            Err(err) => return Err(err.into()),
        }

        self.await_outcome(driver).await?;

        harvest_info!("Login succeeded; capturing session");
        let mut blob = driver.capture_session().await?;
        if let Some(origin) = normalize_origin(target_url) {
            blob.origin = origin;
        }
        Ok(blob)
    }

    /// Polls for either the authenticated marker or an error banner until the
    /// login timeout elapses.
    async fn await_outcome(&self, driver: &dyn PageDriver) -> Result<(), AuthError> {
        let sel = &self.selectors;
        let deadline = tokio::time::Instant::now() + sel.login_timeout;
        let poll = Duration::from_millis(100);

        loop {
            if driver.exists(&sel.authenticated_marker).await? {
                return Ok(());
            }
            if driver.exists(&sel.error_banner).await? {
                let text = driver
                    .read_text(&sel.error_banner)
                    .await
                    .unwrap_or_default();
                let reason = if text.trim().is_empty() {
                    "login form reported an error".to_string()
                } else {
                    text.trim().to_string()
                };
                return Err(AuthError::Rejected(reason));
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(AuthError::Timeout);
            }
            tokio::time::sleep(poll).await;
        }
    }
}
