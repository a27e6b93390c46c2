mod session;

use std::env;
use std::io::{self, BufRead, IsTerminal, Write};
use std::process;

use session::{Session, SessionOptions};

fn main() -> io::Result<()> {
    let mut options = parse_options().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("Usage: tester-simulator [--transcript <path>] [--plain]");
        process::exit(2);
    });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    options.styled &= stdout.is_terminal();
    let mut writer = stdout.lock();
    let mut session = Session::new(options)?;
    let mut line = String::new();

    writeln!(
        writer,
        "Trailer tester simulator ready. Type `help` for commands or `exit` to quit."
    )?;
    for response in session.drain() {
        writeln!(writer, "{response}")?;
    }

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            break;
        }

        let responses = session.handle_command(trimmed)?;
        for response in responses {
            writeln!(writer, "{response}")?;
        }
    }

    for response in session.shutdown()? {
        writeln!(writer, "{response}")?;
    }
    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_options() -> Result<SessionOptions, String> {
    let mut options = SessionOptions {
        styled: true,
        transcript: None,
    };
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if let Some(value) = arg.strip_prefix("--transcript=") {
            options.transcript = Some(value.to_string());
        } else if arg == "--transcript" {
            let value = args
                .next()
                .ok_or_else(|| "Expected path after --transcript".to_string())?;
            options.transcript = Some(value);
        } else if arg == "--plain" {
            options.styled = false;
        } else {
            return Err(format!("Unknown argument `{arg}`"));
        }
    }
    Ok(options)
}
