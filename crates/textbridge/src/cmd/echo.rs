use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use textbridge_bridge::{BridgeConfig, BridgeContext};
use textbridge_envelope::{find_transferables, EnvelopeError, Port};
use textbridge_transport::UnixDomainSocket;

use crate::cmd::{install_ctrlc_handler, EchoArgs, POLL_INTERVAL};
use crate::exit::{bridge_error, transport_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

enum Served {
    Disconnected,
    Interrupted,
}

pub fn run(args: EchoArgs, _format: OutputFormat) -> CliResult<i32> {
    let listener =
        UnixDomainSocket::bind(&args.path).map_err(|err| transport_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    while running.load(Ordering::SeqCst) {
        let transport = listener
            .accept()
            .map_err(|err| transport_error("accept failed", err))?;
        let context = BridgeContext::with_channels(
            Arc::new(transport),
            BridgeConfig::default(),
            [args.channel.as_str()],
        );
        let port = context
            .establish(args.channel.as_str())
            .map_err(|err| bridge_error("establish failed", err))?
            .port();

        let served = serve(&port, &args.channel, &running);
        context.shutdown();
        if matches!(served, Served::Interrupted) {
            break;
        }
    }

    Ok(SUCCESS)
}

fn serve(port: &Port, channel_id: &str, running: &AtomicBool) -> Served {
    while running.load(Ordering::SeqCst) {
        let value = match port.recv_timeout(POLL_INTERVAL) {
            Ok(value) => value,
            Err(EnvelopeError::RecvTimeout(_)) => continue,
            Err(_) => {
                tracing::info!(channel_id, "peer disconnected");
                return Served::Disconnected;
            }
        };

        tracing::info!(
            channel_id,
            transfers = find_transferables(&value).len(),
            "echoing message"
        );
        if let Err(err) = port.send(value) {
            tracing::warn!(error = %err, "echo send failed");
            return Served::Disconnected;
        }
    }
    Served::Interrupted
}

#[cfg(test)]
mod tests {
    use std::thread;

    use textbridge_envelope::Value;

    use super::*;

    #[test]
    fn serve_echoes_until_port_closes() {
        let (local, remote) = Port::pair();
        let running = Arc::new(AtomicBool::new(true));

        let flag = Arc::clone(&running);
        let server = thread::spawn(move || serve(&local, "", &flag));

        remote.send("one").unwrap();
        assert_eq!(
            remote.recv_timeout(std::time::Duration::from_secs(2)).unwrap(),
            Value::from("one")
        );
        remote.close();

        let served = server.join().expect("server thread should complete");
        assert!(matches!(served, Served::Disconnected));
    }

    #[test]
    fn serve_stops_when_interrupted() {
        let (local, _remote) = Port::pair();
        let running = AtomicBool::new(false);
        assert!(matches!(serve(&local, "", &running), Served::Interrupted));
    }
}
