use anyhow::Result;
use gardeo_assistant::config::{self, AssistantConfig};
use gardeo_assistant::protocol::AuthCallback;
use gardeo_assistant::runtime::SessionHandle;
use gardeo_assistant::{ConnectionState, ConsentDecision, Role, SessionSnapshot};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

const HELP: &str = "Commands: /accept, /reject, /authorize, /signal <json>, /callback <state>, /quit";

#[derive(Debug, PartialEq)]
enum Input<'a> {
    Message(&'a str),
    Consent(ConsentDecision),
    Authorize,
    Signal(&'a str),
    Callback(&'a str),
    Help,
    Quit,
}

fn parse_input(line: &str) -> Input<'_> {
    let trimmed = line.trim();
    let (command, rest) = match trimmed.split_once(' ') {
        Some((command, rest)) => (command, rest.trim()),
        None => (trimmed, ""),
    };
    match command {
        "/accept" => Input::Consent(ConsentDecision::Accept),
        "/reject" => Input::Consent(ConsentDecision::Reject),
        "/authorize" => Input::Authorize,
        "/signal" => Input::Signal(rest),
        "/callback" => Input::Callback(rest),
        "/help" => Input::Help,
        "/quit" | "/exit" => Input::Quit,
        _ => Input::Message(line),
    }
}

#[derive(Default)]
struct Printer {
    printed: usize,
    connection: Option<ConnectionState>,
    consent: Option<String>,
    authorization: Option<String>,
}

impl Printer {
    fn render(&mut self, snapshot: &SessionSnapshot) {
        if self.connection != Some(snapshot.connection) {
            self.connection = Some(snapshot.connection);
            println!("-- {} --", snapshot.connection.indicator_label());
        }

        for message in snapshot.messages.iter().skip(self.printed) {
            let speaker = match message.role {
                Role::User => "you",
                Role::Assistant => "assistant",
                Role::System => "system",
            };
            println!("[{}] {}: {}", message.display_time(), speaker, message.content);
        }
        self.printed = snapshot.messages.len();

        let consent = snapshot.pending_consent.as_ref().map(|c| c.id.clone());
        if consent != self.consent {
            if let Some(request) = &snapshot.pending_consent {
                println!("{}", request.content);
                println!(
                    "  /accept -> {}   /reject -> {}",
                    request.options.accept, request.options.reject
                );
            }
            self.consent = consent;
        }

        let authorization = snapshot
            .pending_authorization
            .as_ref()
            .map(|a| a.state.clone());
        if authorization != self.authorization {
            if let Some(request) = &snapshot.pending_authorization {
                println!("Authorization required to complete your booking.");
                let details = request.context_summary();
                if !details.is_empty() {
                    println!("Booking Details:");
                    for line in details {
                        println!("  {line}");
                    }
                }
                println!("  /authorize to sign in");
            }
            self.authorization = authorization;
        }
    }
}

async fn print_updates(mut updates: watch::Receiver<SessionSnapshot>) {
    let mut printer = Printer::default();
    printer.render(&updates.borrow_and_update().clone());
    while updates.changed().await.is_ok() {
        let snapshot = updates.borrow_and_update().clone();
        printer.render(&snapshot);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    config::load_dotenv();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let config = AssistantConfig::from_env()?;
    let session = SessionHandle::open(&config)?;
    let printer = tokio::spawn(print_updates(session.subscribe()));
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_input(&line) {
            Input::Message(text) => session.send_message(text),
            Input::Consent(decision) => session.respond_to_consent(decision),
            Input::Authorize => session.begin_authorization(),
            Input::Signal(raw) => {
                if !session.post_signal(raw) {
                    eprintln!("not an auth_callback signal");
                }
            }
            Input::Callback(state) if !state.is_empty() => {
                session.post_auth_callback(AuthCallback::new(state))
            }
            Input::Callback(_) => eprintln!("usage: /callback <state>"),
            Input::Help => println!("{HELP}"),
            Input::Quit => break,
        }
    }

    session.stop().await;
    printer.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("/accept"), Input::Consent(ConsentDecision::Accept));
        assert_eq!(parse_input(" /reject "), Input::Consent(ConsentDecision::Reject));
        assert_eq!(parse_input("/callback s1"), Input::Callback("s1"));
        assert_eq!(
            parse_input(r#"/signal {"type":"auth_callback","state":"s1"}"#),
            Input::Signal(r#"{"type":"auth_callback","state":"s1"}"#)
        );
        assert_eq!(parse_input("book a room"), Input::Message("book a room"));
        assert_eq!(parse_input("/quit"), Input::Quit);
    }
}
