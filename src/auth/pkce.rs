use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distributions::Alphanumeric};
use sha2::{Digest, Sha256};

static CODE_VERIFIER_LEN: usize = 64;
static STATE_LEN: usize = 56;

#[derive(Debug, Clone)]
pub struct PkceMaterial {
    pub verifier: String,
    pub challenge: String,
}

impl PkceMaterial {
    pub fn generate() -> Self {
        let verifier = random_string(CODE_VERIFIER_LEN);
        let challenge = code_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }
}

// S256: BASE64URL-NOPAD(SHA256(verifier))
pub fn code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

pub(crate) fn generate_state() -> String {
    random_string(STATE_LEN)
}

fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
