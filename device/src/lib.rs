//! # bstwifi device
//!
//! Host runtime for the bootstrap engine in `bstwifi-core`.
//!
//! ## Components
//!
//! - **Transport**: UDP socket on the provisioning port, broadcasting replies
//! - **Persistence**: bootstrap data and bound secret under a state directory
//! - **Radio**: a table of simulated networks with an association delay
//! - **Console**: stdin commands standing in for the device button
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  UDP 8711  ┌──────────────────────────────┐
//! │ Companion   │◀──────────▶│ service loop                 │
//! │ app         │  broadcast │   └─ Bootstrap<HostPlatform> │
//! └─────────────┘            │        ├─ SimulatedRadio     │
//!                            │        └─ CredentialStore    │
//!                            └──────────────────────────────┘
//! ```
//!
//! ## Environment
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `BIND_ADDR` | `0.0.0.0` | Socket bind address |
//! | `PORT` | `8711` | Provisioning port |
//! | `BROADCAST_ADDR` | `255.255.255.255` | Reply destination |
//! | `STATE_DIR` | `./bst-state` | Persisted state |
//! | `NETWORKS_FILE` | - | JSON table of simulated networks |
//! | `DEVICE_NAME` | `bstwifi-device` | Name shown to the app |
//! | `DEVICE_UID` | `02:00:00:00:00:01` | Device identifier |
//! | `INITIAL_SECRET` | `app_secret` | Factory shared secret |
//! | `BOOTSTRAP_SSID` | `Bootstrap_BST_v1` | Bootstrap access point |
//! | `BOOTSTRAP_KEY` | `bootstrap_key` | Bootstrap passphrase |
//! | `CONFIRMATION_MODE` | `not_required` | `first_start`, `always` |
//! | `RETRY_BOOTSTRAP` / `RETRY_DESTINATION` | `7` | Attempt limits |

pub mod config;
pub mod console;
pub mod error;
pub mod platform;
pub mod radio;
pub mod service;
pub mod store;

pub use config::Config;
pub use error::{DeviceError, Result};
pub use platform::{Clock, HostPlatform, PlatformEvent};
pub use service::{build_radio, run, serve, Device};
pub use store::CredentialStore;
