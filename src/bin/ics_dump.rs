use std::{
    env,
    io::{stdin, Read},
};

use env_logger::Env;
use ics_feed::Parser;
use log::info;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args: Vec<String> = env::args().collect();
    let parser = match args.get(1).map(|s| s as &str) {
        Some(source) if source.starts_with("http://") || source.starts_with("https://") => {
            Parser::from_url(source)?
        }
        Some("-") | None => {
            let mut data = String::new();
            stdin().read_to_string(&mut data)?;
            Parser::from_string(&data)
        }
        Some(path) => Parser::from_file(path)?,
    };

    for err in parser.errors() {
        eprintln!("warning: {}", err);
    }

    for calendar in parser.calendars() {
        info!(
            "{:?} (version {}, {}): {} events",
            calendar.name,
            calendar.version,
            calendar.timezone,
            calendar.events().len()
        );

        for event in calendar.events() {
            let when = if event.whole_day {
                event.start.format("%Y-%m-%d").to_string()
            } else {
                format!(
                    "{} - {}",
                    event.start.format("%Y-%m-%d %H:%M"),
                    event.end.format("%H:%M")
                )
            };
            println!("{}  {}  [{}]", when, event.summary, event.id);
        }
    }

    Ok(())
}
