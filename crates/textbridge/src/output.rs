use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use textbridge_envelope::{display_path, find_transferables, Value};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    channel_id: &'a str,
    payload: serde_json::Value,
    transfers: Vec<TransferOutput>,
    timestamp: String,
}

#[derive(Serialize)]
struct TransferOutput {
    path: String,
    kind: &'static str,
    detail: String,
}

pub fn print_message(channel_id: &str, value: &Value, format: OutputFormat) {
    let transfers = describe_transfers(value);
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                channel_id,
                payload: value.to_json(),
                transfers,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CHANNEL", "PAYLOAD", "TRANSFERS"])
                .add_row(vec![
                    display_channel(channel_id),
                    value.to_json().to_string(),
                    transfer_summary(&transfers),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "channel={} payload={} transfers=[{}]",
                display_channel(channel_id),
                value.to_json(),
                transfer_summary(&transfers)
            );
        }
    }
}

fn describe_transfers(value: &Value) -> Vec<TransferOutput> {
    find_transferables(value)
        .into_iter()
        .filter_map(|(path, leaf)| match leaf {
            Value::Binary(binary) => Some(TransferOutput {
                path: display_path(&path),
                kind: "binary",
                detail: format!("{} {} bytes", binary.element_type(), binary.len()),
            }),
            Value::Channel(port) => Some(TransferOutput {
                path: display_path(&path),
                kind: "channel",
                detail: format!("port {}", port.id()),
            }),
            _ => None,
        })
        .collect()
}

fn transfer_summary(transfers: &[TransferOutput]) -> String {
    transfers
        .iter()
        .map(|t| format!("{} {} ({})", t.path, t.kind, t.detail))
        .collect::<Vec<_>>()
        .join(", ")
}

fn display_channel(channel_id: &str) -> String {
    if channel_id.is_empty() {
        "<default>".to_string()
    } else {
        channel_id.to_string()
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use textbridge_envelope::Binary;

    use super::*;

    #[test]
    fn describes_binary_leaves_with_paths() {
        let value = Value::object([(
            "a",
            Value::object([("b", Binary::from_u16s(&[1, 2]))]),
        )]);
        let transfers = describe_transfers(&value);
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].path, "$.a.b");
        assert_eq!(transfers[0].kind, "binary");
        assert_eq!(transfers[0].detail, "uint16 4 bytes");
    }

    #[test]
    fn default_channel_has_a_visible_name() {
        assert_eq!(display_channel(""), "<default>");
        assert_eq!(display_channel("x"), "x");
    }
}
