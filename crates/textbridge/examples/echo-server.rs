//! Minimal echo server: accepts one connection and echoes every message on
//! the default channel.
//!
//! Run with:
//!   cargo run --example echo-server
//!
//! In another terminal:
//!   cargo run --features cli -- send /tmp/textbridge-echo-<pid>/echo.sock \
//!     --json '{"hello":"world"}' --attach blob=cafe --wait

use std::fs;
use std::sync::Arc;

use textbridge::transport::UnixDomainSocket;
use textbridge::{BridgeConfig, BridgeContext};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sock_dir = std::env::temp_dir().join(format!("textbridge-echo-{}", std::process::id()));
    fs::create_dir_all(&sock_dir)?;
    let sock_path = sock_dir.join("echo.sock");

    let listener = UnixDomainSocket::bind(&sock_path)?;
    eprintln!("Listening on {}", sock_path.display());

    let transport = listener.accept()?;
    let context = BridgeContext::with_channels(Arc::new(transport), BridgeConfig::default(), [""]);
    let port = context.establish("")?.port();
    eprintln!("Peer connected");

    loop {
        match port.recv() {
            Ok(value) => {
                eprintln!("Received {}", value.to_json());
                port.send(value)?;
            }
            Err(e) => {
                eprintln!("Peer disconnected: {e}");
                break;
            }
        }
    }

    let _ = fs::remove_dir_all(&sock_dir);
    Ok(())
}
