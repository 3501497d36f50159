mod callback;
mod oauth;
mod pkce;
mod refresh;
mod token;

pub use callback::{capture_code, wait_for_code};
pub use oauth::{AuthFlow, AuthStatus, AuthorizationRequest, open_in_browser};
pub use pkce::{PkceMaterial, code_challenge};
pub use token::{Credential, FileTokenStore, MemoryTokenStore, StoreKey, TokenStore};
