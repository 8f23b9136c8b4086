//! Two bridge contexts joined by an in-memory text pipe.
//!
//! The left side hands the right side a port; the two then play ping-pong
//! over it while the root channel stays free.
//!
//! Run with:
//!   cargo run --example ping-pong

use std::thread;
use std::time::Duration;

use textbridge::transport::memory_pair;
use textbridge::{Binary, BridgeContext, Port, Value};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (left, right) = memory_pair();
    let left = BridgeContext::new(left);
    let right = BridgeContext::new(right);

    let root_left = left.establish("")?.port();
    let root_right = right.establish("")?.port();

    let (give, keep) = Port::pair();
    root_left.send(Value::object([
        ("greeting", Value::from("here is a port")),
        ("seed", Value::from(Binary::from_u32s(&[1, 2, 3]))),
        ("port", Value::from(give)),
    ]))?;

    let welcome = root_right.recv_timeout(Duration::from_secs(1))?;
    let remote = welcome
        .get("port")
        .and_then(Value::as_port)
        .cloned()
        .ok_or("welcome message carries no port")?;
    eprintln!("right received: {}", welcome.to_json());

    let player = thread::spawn(move || -> Result<(), textbridge::envelope::EnvelopeError> {
        for _ in 0..3 {
            let ball = remote.recv()?;
            eprintln!("right got {}", ball.to_json());
            remote.send("pong")?;
        }
        Ok(())
    });

    for _ in 0..3 {
        keep.send("ping")?;
        let ball = keep.recv_timeout(Duration::from_secs(1))?;
        eprintln!("left got {}", ball.to_json());
    }

    player.join().map_err(|_| "player thread panicked")??;
    eprintln!("left stats: {:?}", left.stats());
    eprintln!("right stats: {:?}", right.stats());
    Ok(())
}
