use std::fs;
use std::sync::Arc;
use std::time::Duration;

use textbridge_bridge::{BridgeConfig, BridgeContext};
use textbridge_envelope::{Binary, ElementType, PathSegment, Value};
use textbridge_transport::UnixDomainSocket;

use crate::cmd::SendArgs;
use crate::exit::{
    bridge_error, envelope_error, transport_error, CliError, CliResult, SUCCESS, USAGE,
};
use crate::output::{print_message, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let payload = resolve_payload(&args)?;

    let transport = UnixDomainSocket::connect(&args.path)
        .map_err(|err| transport_error("connect failed", err))?;
    let context = BridgeContext::with_channels(
        Arc::new(transport),
        BridgeConfig::default(),
        [args.channel.as_str()],
    );
    let bridge = context
        .establish(args.channel.as_str())
        .map_err(|err| bridge_error("establish failed", err))?;

    bridge
        .post(payload)
        .map_err(|err| bridge_error("send failed", err))?;
    tracing::debug!(channel_id = %args.channel, "message sent");

    if args.wait {
        let reply = bridge
            .port()
            .recv_timeout(wait_timeout)
            .map_err(|err| envelope_error("receive failed", err))?;
        print_message(&args.channel, &reply, format);
    }

    context.shutdown();
    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Value> {
    let mut payload = if let Some(json) = &args.json {
        parse_json(json, "--json")?
    } else if let Some(data) = &args.data {
        Value::from(data.as_str())
    } else if let Some(path) = &args.file {
        let text = fs::read_to_string(path).map_err(|err| {
            crate::exit::io_error(&format!("failed reading {}", path.display()), err)
        })?;
        parse_json(&text, &path.display().to_string())?
    } else {
        Value::Null
    };

    for spec in &args.attach {
        let (key, binary) = parse_attachment(spec)?;
        if payload.is_null() {
            payload = Value::object(std::iter::empty::<(String, Value)>());
        }
        if payload.as_object().is_none() {
            return Err(CliError::new(
                USAGE,
                "--attach requires an object payload (or none)",
            ));
        }
        payload
            .replace_at(&[PathSegment::Key(key)], Value::from(binary))
            .map_err(|err| envelope_error("attach failed", err))?;
    }

    Ok(payload)
}

fn parse_json(text: &str, source: &str) -> CliResult<Value> {
    serde_json::from_str::<serde_json::Value>(text)
        .map(Value::from_json)
        .map_err(|err| CliError::new(USAGE, format!("{source} is not valid JSON: {err}")))
}

fn parse_attachment(spec: &str) -> CliResult<(String, Binary)> {
    let (key, hex) = spec
        .split_once('=')
        .ok_or_else(|| CliError::new(USAGE, format!("--attach expects KEY=HEX, got {spec:?}")))?;
    if key.is_empty() {
        return Err(CliError::new(USAGE, "--attach key must not be empty"));
    }
    let binary = Binary::from_hex(ElementType::Raw, hex)
        .map_err(|err| CliError::new(USAGE, format!("--attach {key}: {err}")))?;
    Ok((key.to_string(), binary))
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
