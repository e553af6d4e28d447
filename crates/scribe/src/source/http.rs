use std::{collections::HashMap, sync::OnceLock, time::Duration};

use parking_lot::Mutex;
use reqwest::{
    Client,
    header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue},
};
use tracing::debug;

use crate::{egress::EgressIdentity, error::RemoteError};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36";

const DIRECT: &str = "direct";

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Another crate installed a provider first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/json;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    headers
}

/// One HTTP client per egress identity, built lazily and reused.
///
/// Connections are never shared across identities, so rotating really does
/// change the apparent origin of the next request.
#[derive(Debug)]
pub struct ClientPool {
    timeout: Duration,
    clients: Mutex<HashMap<Option<EgressIdentity>, Client>>,
}

impl ClientPool {
    pub fn new(timeout: Duration) -> Self {
        install_rustls_provider();
        Self {
            timeout,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn client_for(&self, egress: Option<&EgressIdentity>) -> Result<Client, RemoteError> {
        let key = egress.cloned();
        if let Some(client) = self.clients.lock().get(&key) {
            return Ok(client.clone());
        }

        let client = self.build(egress)?;
        self.clients.lock().insert(key, client.clone());
        Ok(client)
    }

    fn build(&self, egress: Option<&EgressIdentity>) -> Result<Client, RemoteError> {
        let mut builder = Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .default_headers(default_headers())
            .timeout(self.timeout)
            .connect_timeout(Duration::from_secs(15));

        let (label, scheme) = match egress {
            Some(identity) => {
                // An explicit proxy disables the system proxy lookup.
                builder = builder.proxy(identity.to_proxy()?);
                (identity.redacted(), identity.scheme().as_str())
            }
            None => (DIRECT.to_owned(), DIRECT),
        };

        debug!(egress = %label, scheme, "Building HTTP client");
        builder
            .build()
            .map_err(|e| RemoteError::proxy(label, format!("failed to build client: {e}")))
    }

    /// Drop the clients of identities not in `keep`. The direct client stays.
    pub fn retain(&self, keep: &[EgressIdentity]) {
        let mut clients = self.clients.lock();
        let before = clients.len();
        clients.retain(|key, _| key.as_ref().is_none_or(|identity| keep.contains(identity)));
        debug!(
            evicted = before - clients.len(),
            cached = clients.len(),
            "Pruned HTTP clients"
        );
    }

    #[cfg(test)]
    fn cached(&self) -> usize {
        self.clients.lock().len()
    }
}

impl Default for ClientPool {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}
