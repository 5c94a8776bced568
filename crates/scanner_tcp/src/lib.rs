//! TCP connect scanning and banner acquisition
//!
//! - `TcpScanner`: bounded worker pool of connect attempts for one host
//! - `BannerGrabber`: passive/active banner exchange over one connection
//! - `TcpConnector`: the production `Connector`, plain `tokio` sockets

mod banner;
mod scanner;

pub use banner::{BannerGrabber, ProbePayload};
pub use scanner::{TcpConnector, TcpScanner};
