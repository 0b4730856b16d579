//! # Redcedar Server
//!
//! hyper/tokio host for Redcedar middleware and server-side rendering.
//!
//! - HTTP/1.1 via hyper, one task per connection
//! - Middleware resolution through a [`MiddlewareRouter`](redcedar_middleware::MiddlewareRouter)
//! - Page rendering through a [`Renderer`]
//! - Request timeout and graceful shutdown
//!
//! ## Example
//!
//! ```rust,ignore
//! use redcedar_server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     Server::builder()
//!         .config(ServerConfig::from_file("redcedar.toml")?)
//!         .router(routes)
//!         .renderer(render_page)
//!         .build()
//!         .run()
//!         .await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/redcedar-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod render;
pub mod server;
pub mod shutdown;

pub use config::{ServerConfig, ServerConfigBuilder};
pub use error::{BoxError, ServerError, ServerResult};
pub use render::{RenderRequest, Renderer};
pub use server::{Server, ServerBuilder, NO_MIDDLEWARE_MESSAGE};
pub use shutdown::{ConnectionTracker, ShutdownSignal};
