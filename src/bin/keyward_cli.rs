//!
//! keyward CLI binary
//! ------------------
//! Interactive terminal front-end for a keyward server. Prompts for
//! authentication (with a bounded retry loop rather than a fatal exit on bad
//! credentials), then runs a small command interpreter over the session.

use std::env;

use anyhow::{anyhow, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use keyward::client::{ClientError, HttpSession};

const MAX_AUTH_ATTEMPTS: usize = 5;

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [--addr URL] [--user <u>] [--password <p>]\n\nFlags:\n  --addr URL        Server base URL (default: http://127.0.0.1:8080)\n  --user <u>        Username for non-interactive authentication\n  --password <p>    Password for non-interactive authentication\n  -h, --help        Show this help\n\nInteractive commands:\n  get <key>              fetch a secret\n  set <key> <value>      store a secret (overwrites)\n  delete <key>           remove a secret\n  names                  list your secret names\n  help                   show this help\n  quit | exit            exit the interpreter"
    );
}

fn parse_string_arg(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        i += 1;
    }
    None
}

/// Prompt until the user authenticates, registers, or gives up. Credential
/// failures re-prompt; transport and protocol faults that retrying cannot fix
/// abort.
async fn authenticate(session: &mut HttpSession, rl: &mut DefaultEditor) -> Result<bool> {
    for _ in 0..MAX_AUTH_ATTEMPTS {
        println!("auth - to authenticate");
        println!("reg  - to register");
        println!("exit - to exit");
        let cmd = match rl.readline("Enter command: ") {
            Ok(line) => line.trim().to_string(),
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        let register = match cmd.as_str() {
            "auth" => false,
            "reg" => true,
            "exit" | "quit" => return Ok(false),
            _ => continue,
        };

        let username = rl.readline("USERNAME: ")?.trim().to_string();
        let password = rl.readline("PASSWORD: ")?.trim().to_string();

        let outcome = if register {
            session.register(&username, &password).await
        } else {
            session.auth(&username, &password).await
        };

        match outcome {
            Ok(()) => return Ok(true),
            Err(e @ ClientError::InvalidCredentials)
            | Err(e @ ClientError::UsernameExists)
            | Err(e @ ClientError::Unavailable) => {
                eprintln!("{}", e);
                continue;
            }
            Err(ClientError::MissingToken) => {
                return Err(anyhow!("server issued no token after successful auth"))
            }
            Err(e) => return Err(anyhow!("failed to authenticate: {}", e)),
        }
    }
    eprintln!("too many failed attempts");
    Ok(false)
}

async fn operate(session: &HttpSession, rl: &mut DefaultEditor) -> Result<()> {
    loop {
        let line = match rl.readline("keyward> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(line);

        let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
        match cmd {
            "exit" | "quit" => return Ok(()),
            "help" => print_usage("keyward_cli"),
            "get" => {
                let key = rest.trim();
                if key.is_empty() {
                    eprintln!("usage: get <key>");
                    continue;
                }
                match session.get(key).await {
                    Ok(value) => println!("{}", value),
                    Err(e) => eprintln!("failed to get: {}", e),
                }
            }
            "set" => {
                let Some((key, value)) = rest.trim().split_once(' ') else {
                    eprintln!("usage: set <key> <value>");
                    continue;
                };
                match session.set(key.trim(), value.trim()).await {
                    Ok(()) => println!("OK"),
                    Err(e) => eprintln!("failed to set: {}", e),
                }
            }
            "delete" => {
                let key = rest.trim();
                if key.is_empty() {
                    eprintln!("usage: delete <key>");
                    continue;
                }
                match session.delete(key).await {
                    Ok(()) => println!("OK"),
                    Err(e) => eprintln!("failed to delete: {}", e),
                }
            }
            "names" => match session.names().await {
                Ok(names) => {
                    for n in names {
                        println!("{}", n);
                    }
                }
                Err(e) => eprintln!("failed to list: {}", e),
            },
            other => eprintln!("unknown command: {} (try 'help')", other),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let program = args.first().cloned().unwrap_or_else(|| "keyward_cli".into());

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage(&program);
        return Ok(());
    }

    let addr = parse_string_arg(&args, "--addr").unwrap_or_else(|| "http://127.0.0.1:8080".to_string());
    let mut session = HttpSession::connect(&addr)?;
    let mut rl = DefaultEditor::new()?;

    let authed = match (parse_string_arg(&args, "--user"), parse_string_arg(&args, "--password")) {
        (Some(user), Some(pass)) => match session.auth(&user, &pass).await {
            Ok(()) => true,
            Err(e @ ClientError::InvalidCredentials) | Err(e @ ClientError::Unavailable) => {
                eprintln!("{}", e);
                authenticate(&mut session, &mut rl).await?
            }
            Err(e) => return Err(anyhow!("failed to authenticate: {}", e)),
        },
        _ => authenticate(&mut session, &mut rl).await?,
    };

    if !authed {
        return Ok(());
    }

    println!("Authenticated");
    operate(&session, &mut rl).await
}
