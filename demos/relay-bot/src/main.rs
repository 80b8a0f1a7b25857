//! Relay Bot Example
//!
//! A bot whose only chat channel is the terminal. Lines typed into it are
//! routed from the `console` channel; everything routed to `console` is
//! printed. Lines starting with `!` manage relays and routes:
//!
//! ```text
//! !relay add nady websocket(server="wss://ws.nadybot.org") nadynative()
//! !route add console <-> relay(nady)
//! !relay list
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --package relay-bot -- --config switchyard.toml
//! ```

use std::path::PathBuf;
use std::sync::{Arc, Weak};

use anyhow::Result;
use clap::Parser;
use switchyard::core::{DeliveryResult, RoutableEvent, Source, hop};
use switchyard::prelude::*;
use switchyard::relay::ComponentKind;
use switchyard::routing::NamedEmitter;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Configuration file to load instead of searching for one.
    #[arg(short, long, env = "SWITCHYARD_CONFIG")]
    config: Option<PathBuf>,

    /// Configuration profile, e.g. `dev` for `switchyard.dev.toml`.
    #[arg(short, long)]
    profile: Option<String>,

    /// Name messages typed into the console are sent as.
    #[arg(short, long, default_value = "Console")]
    name: String,
}

// ============================================================================
// Console Channel
// ============================================================================

/// Prints routed events to stdout.
struct ConsoleChannel {
    hub: Weak<MessageHub>,
}

#[async_trait]
impl MessageReceiver for ConsoleChannel {
    fn channel_name(&self) -> String {
        hop::CONSOLE.to_string()
    }

    async fn receive(&self, event: &RoutableEvent, _destination: &str) -> DeliveryResult<bool> {
        let (Some(hub), Some(text)) = (self.hub.upgrade(), event.text()) else {
            return Ok(false);
        };
        let colorize = hub.settings().colorize;
        let mut line = hub.render_path(event, hop::CONSOLE, colorize, false);
        if colorize {
            line.push_str(&hub.text_color(event, hop::CONSOLE));
        }
        line.push_str(text);
        println!("{}", to_ansi(&line));
        Ok(true)
    }
}

/// Turns `<font color=#RRGGBB>` and `<end>` tags into terminal colors.
fn to_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];
        if let Some(tail) = rest.strip_prefix("<end>") {
            out.push_str("\x1b[0m");
            rest = tail;
        } else if let Some(color) = rest
            .strip_prefix("<font color=#")
            .and_then(|s| s.get(..7))
            .and_then(|s| s.strip_suffix('>'))
            && let Ok(rgb) = u32::from_str_radix(color, 16)
        {
            out.push_str(&format!(
                "\x1b[38;2;{};{};{}m",
                rgb >> 16,
                (rgb >> 8) & 0xff,
                rgb & 0xff
            ));
            rest = &rest["<font color=#".len() + 7..];
        } else {
            out.push('<');
            rest = &rest[1..];
        }
    }
    out.push_str(rest);
    if out.contains("\x1b[38") {
        out.push_str("\x1b[0m");
    }
    out
}

// ============================================================================
// Commands
// ============================================================================

async fn command(runtime: &SwitchyardRuntime, line: &str) -> Result<String> {
    let (verb, rest) = split_word(line);
    let (sub, rest) = split_word(rest);
    let relays = runtime.relays();
    let routes = runtime.routes();

    let reply = match (verb, sub) {
        ("relay", "list") => {
            let overview = relays.overview(false).await?;
            if overview.is_empty() {
                "There are no relays defined.".to_string()
            } else {
                overview.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n")
            }
        }
        ("relay", "add") => {
            let (name, expression) = split_word(rest);
            let relay = relays.create_relay(name, expression).await?;
            format!("Relay {} created.", relay.name())
        }
        ("relay", "rem") => {
            relays.delete_relay_by_name(rest).await?;
            format!("Relay {rest} deleted.")
        }
        ("relay", kind @ ("transports" | "layers" | "protocols")) => {
            let kind = match kind {
                "transports" => ComponentKind::Transport,
                "layers" => ComponentKind::Layer,
                _ => ComponentKind::Protocol,
            };
            if rest.is_empty() {
                relays.component_overview(kind)
            } else {
                relays
                    .component_details(kind, rest)
                    .unwrap_or_else(|| format!("No {kind} {rest} found."))
            }
        }
        ("route", "list") => {
            let list = routes.list_routes();
            if list.is_empty() {
                "There are no routes defined.".to_string()
            } else {
                list.iter()
                    .map(|r| format!("#{} {r}", r.id()))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        }
        ("route", "add") => {
            let (source, rest) = split_word(rest);
            let (arrow, rest) = split_word(rest);
            let (destination, modifiers) = split_word(rest);
            let two_way = match arrow {
                "->" => false,
                "<->" => true,
                _ => anyhow::bail!("Usage: !route add <source> <-> | -> <destination> [modifiers]"),
            };
            let route = routes
                .add_route_expression(source, destination, two_way, modifiers)
                .await?;
            format!("Route #{} added: {route}", route.id())
        }
        ("route", "rem") => {
            let id = rest.parse()?;
            routes.delete_route(id).await?;
            format!("Route #{id} deleted.")
        }
        _ => "Commands: !relay list|add|rem|transports|layers|protocols, !route list|add|rem, !quit"
            .to_string(),
    };
    Ok(reply)
}

fn split_word(input: &str) -> (&str, &str) {
    let input = input.trim();
    match input.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (input, ""),
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder = SwitchyardRuntime::builder();
    if let Some(config) = &cli.config {
        builder = builder.config_file(config);
    }
    if let Some(profile) = &cli.profile {
        builder = builder.profile(profile);
    }
    let runtime = builder.build().await?;

    let hub = runtime.hub();
    hub.register_receiver(Arc::new(ConsoleChannel {
        hub: Arc::downgrade(hub),
    }));
    hub.register_emitter(Arc::new(NamedEmitter(hop::CONSOLE.to_string())));

    runtime.start().await?;
    info!("Type a message to route it, !help for commands, !quit to exit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "!quit" {
            break;
        }
        if let Some(cmd) = line.strip_prefix('!') {
            match command(&runtime, cmd).await {
                Ok(reply) => println!("{reply}"),
                Err(e) => println!("{e}"),
            }
            continue;
        }

        let event = RoutableEvent::message(vec![Source::new(hop::CONSOLE, "Console")], line)
            .with_character(Character::new(&cli.name));
        let status = hub.handle(event).await;
        debug!(?status, "Console message handled");
    }

    runtime.stop().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn font_tags_become_ansi() {
        assert_eq!(
            to_ansi("<font color=#FF0000>[Org]<end> hi"),
            "\x1b[38;2;255;0;0m[Org]\x1b[0m hi\x1b[0m"
        );
        assert_eq!(to_ansi("a < b"), "a < b");
    }

    #[test]
    fn words_split_on_whitespace() {
        assert_eq!(split_word("  add  nady x()"), ("add", "nady x()"));
        assert_eq!(split_word("list"), ("list", ""));
    }
}
