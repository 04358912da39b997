use tracing::{debug, info};

use crate::auth::TokenCache;
use crate::credentials::Credential;
use crate::error::{ChordError, CONFIGURE_HINT};
use crate::platform::{Authenticator, Platform, User};

/// An authenticated session together with the identity it belongs to.
pub struct Session<P> {
    pub platform: P,
    pub user: User,
}

/// Turns a credential into an authenticated session. A successful login
/// overwrites the token cache with the session token.
pub async fn open<A: Authenticator>(
    credential: &Credential,
    authenticator: &A,
    cache: &TokenCache,
) -> Result<Session<A::Session>, ChordError> {
    let platform = match credential {
        Credential::Token(token) => authenticator
            .authenticate_with_token(token)
            .await
            .map_err(|error| ChordError::Auth(format!("{error}; {CONFIGURE_HINT}")))?,
        Credential::Login { email, password } => {
            let platform = authenticator
                .authenticate_with_login(email, password)
                .await
                .map_err(|error| ChordError::Auth(format!("login rejected: {error}; {CONFIGURE_HINT}")))?;
            cache.store_token(platform.token())?;
            debug!(path = %cache.path().display(), "cached session token");
            platform
        }
        Credential::Empty => {
            return Err(ChordError::Auth(format!(
                "empty auth credentials, {CONFIGURE_HINT}"
            )));
        }
    };

    let user = platform.current_user().await.map_err(|error| {
        ChordError::Auth(format!(
            "token is invalid or expired ({error}); {CONFIGURE_HINT}"
        ))
    })?;
    info!(user = %user.display_name(), "logged in");

    Ok(Session { platform, user })
}
