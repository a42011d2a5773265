//! Umbrella crate for hosts that want one dependency.
//!
//! Each feature re-exports a workspace crate:
//!
//! | Feature         | Re-export                                  |
//! |-----------------|--------------------------------------------|
//! | `desktop-shims` | `core_transfer` with the reqwest transport |
//! | `google-drive`  | `core_transfer`, `provider_google_drive`   |
//! | `onedrive`      | `core_transfer`, `provider_onedrive`       |

#[cfg(any(feature = "desktop-shims", feature = "google-drive", feature = "onedrive"))]
pub use core_transfer;

#[cfg(feature = "google-drive")]
pub use provider_google_drive;

#[cfg(feature = "onedrive")]
pub use provider_onedrive;
