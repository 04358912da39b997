use std::env;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct Config {
    pub api_base_url: String,
    pub gateway_url: Option<String>,
    pub token_path: PathBuf,
    pub log_path: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Self {
        let api_base_url = env::var("CHORD_API_BASE_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let api_base_url = api_base_url.trim_end_matches('/').to_string();

        let gateway_url = env::var("CHORD_GATEWAY_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(|url| url.trim_end_matches('/').to_string());

        let token_path = env::var("CHORD_TOKEN_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_token_path());
        let log_path = env::var("CHORD_LOG_PATH").ok().map(PathBuf::from);

        Self {
            api_base_url,
            gateway_url,
            token_path,
            log_path,
        }
    }
}

const DEFAULT_API_BASE_URL: &str = "https://discord.com/api/v9";
const TOKEN_FILE_NAME: &str = ".chord.config";
const LOG_FILE_NAME: &str = ".chord.log";

fn home_dir() -> PathBuf {
    env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

fn default_token_path() -> PathBuf {
    home_dir().join(TOKEN_FILE_NAME)
}

/// Where logs go while the chat view owns the terminal and no
/// `CHORD_LOG_PATH` is set.
pub fn default_log_path() -> PathBuf {
    home_dir().join(LOG_FILE_NAME)
}
