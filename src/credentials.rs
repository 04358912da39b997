use tracing::debug;

use crate::error::ChordError;
use crate::prompt;

#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Token(String),
    Login { email: String, password: String },
    Empty,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Token(_) => f.write_str("Token(..)"),
            Credential::Login { email, .. } => f.debug_struct("Login").field("email", email).finish_non_exhaustive(),
            Credential::Empty => f.write_str("Empty"),
        }
    }
}

pub trait CredentialPrompt {
    fn email(&self) -> Result<String, ChordError>;
    fn password(&self) -> Result<String, ChordError>;
}

pub struct TerminalPrompt;

impl CredentialPrompt for TerminalPrompt {
    fn email(&self) -> Result<String, ChordError> {
        prompt::ask("Enter Discord Email", false)
    }

    fn password(&self) -> Result<String, ChordError> {
        prompt::ask("Enter Discord Password", true)
    }
}

/// Picks the credential for this run: CLI token, CLI login, cached token,
/// then an interactive prompt, in that order.
pub fn resolve(
    cli_email: Option<&str>,
    cli_password: Option<&str>,
    cli_token: Option<&str>,
    cached_token: Option<String>,
    prompt: &dyn CredentialPrompt,
) -> Result<Credential, ChordError> {
    if let Some(token) = non_empty(cli_token) {
        debug!("using token from command line");
        return Ok(Credential::Token(token.to_string()));
    }

    if let (Some(email), Some(password)) = (non_empty(cli_email), non_empty(cli_password)) {
        debug!("using login from command line");
        return Ok(Credential::Login {
            email: email.to_string(),
            password: password.to_string(),
        });
    }

    if let Some(token) = cached_token.filter(|token| !token.trim().is_empty()) {
        debug!("using cached token");
        return Ok(Credential::Token(token));
    }

    let email = prompt.email()?.trim().to_string();
    let password = prompt.password()?.trim().to_string();
    if email.is_empty() || password.is_empty() {
        return Ok(Credential::Empty);
    }
    Ok(Credential::Login { email, password })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
