use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use textbridge_bridge::{BridgeConfig, BridgeContext};
use textbridge_envelope::EnvelopeError;
use textbridge_transport::UnixDomainSocket;

use crate::cmd::{install_ctrlc_handler, ListenArgs, POLL_INTERVAL};
use crate::exit::{bridge_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let listener =
        UnixDomainSocket::bind(&args.path).map_err(|err| transport_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;

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

        while running.load(Ordering::SeqCst) {
            let value = match port.recv_timeout(POLL_INTERVAL) {
                Ok(value) => value,
                Err(EnvelopeError::RecvTimeout(_)) => continue,
                Err(_) => break,
            };

            print_message(&args.channel, &value, format);
            printed = printed.saturating_add(1);

            if let Some(count) = args.count {
                if printed >= count {
                    return Ok(SUCCESS);
                }
            }
        }

        let stats = context.stats();
        tracing::info!(
            delivered = stats.delivered,
            ignored = stats.ignored,
            faults = stats.faults,
            "connection closed"
        );
    }

    Ok(SUCCESS)
}
