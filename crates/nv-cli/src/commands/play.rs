//! Terminal player.

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use colored::{ColoredString, Colorize};

use nv_core::HistoryKind;
use nv_rules::{Notification, Severity};
use nv_session::NovelSession;
use nv_story::{Status, StoryEvent};

enum Flow {
    Continue,
    Quit,
}

pub fn run(
    dir: &Path,
    story: Option<&str>,
    saves: Option<&Path>,
    load: Option<u32>,
) -> Result<(), String> {
    let mut session = super::open_session(dir, saves)?;

    println!("  {} {}", "Playing".bold(), dir.display());
    println!(
        "  {}\n",
        "Enter continues. Commands: :save N, :load N, :history, :retry, :quit".dimmed()
    );

    match load {
        Some(slot) => session.load(slot),
        None => session.start(story),
    }
    .map_err(|e| e.to_string())?;
    render(&mut session);

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let mut line = String::new();

    loop {
        let status = session.status();
        if status == Status::Completed {
            println!("\n  {}", "The End".bold());
            break;
        }
        match status {
            Status::Titles {
                auto_resume_ms: Some(ms),
            } if session.interpreter().pending_title_timer().is_some() => {
                thread::sleep(Duration::from_millis(ms));
                report(session.tick(Utc::now()), &mut session);
                continue;
            }
            _ => {}
        }

        print!("> ");
        io::stdout().flush().map_err(|e| e.to_string())?;

        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break, // EOF
            Err(e) => return Err(e.to_string()),
            _ => {}
        }

        let input = line.trim();
        if let Some(command) = input.strip_prefix(':') {
            match meta_command(&mut session, command) {
                Ok(Flow::Quit) => break,
                Ok(Flow::Continue) => {}
                Err(e) => println!("  {}", e.yellow()),
            }
            continue;
        }

        let result = match session.status() {
            Status::Choice => match input.parse::<usize>() {
                Ok(n) if n > 0 => session.select_choice(n - 1),
                _ => {
                    println!("  {}", "Pick an option by number.".yellow());
                    continue;
                }
            },
            Status::Input => {
                let value = if input.is_empty() {
                    session.interpreter().initial_input_value()
                } else {
                    input.to_string()
                };
                session.submit_input(&value)
            }
            Status::Halted(_) => {
                println!("  {}", "The story is halted. Use :retry or :quit.".yellow());
                continue;
            }
            _ => session.advance(),
        };
        report(result, &mut session);
    }

    Ok(())
}

fn meta_command(session: &mut NovelSession, command: &str) -> Result<Flow, String> {
    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or("");
    let arg = parts.next();

    match name {
        "quit" | "q" => return Ok(Flow::Quit),
        "save" => {
            let slot = parse_slot(arg)?;
            let file = session.save(slot, None).map_err(|e| e.to_string())?;
            println!(
                "  {} slot {slot} ({})",
                "Saved".green().bold(),
                file.timestamp_formatted
            );
        }
        "load" => {
            let slot = parse_slot(arg)?;
            session.load(slot).map_err(|e| e.to_string())?;
            println!("  {} slot {slot}", "Loaded".green().bold());
            render(session);
        }
        "history" => {
            println!("  {}", "History".bold().underline());
            for entry in session.interpreter().history().iter() {
                match entry.kind {
                    HistoryKind::Dialogue => {
                        println!("  {}: {}", entry.speaker.cyan(), entry.text);
                    }
                    HistoryKind::Narration => println!("  {}", entry.text.italic()),
                    HistoryKind::Titles => println!("  == {} ==", entry.text),
                }
            }
        }
        "retry" => report(session.retry(), session),
        other => return Err(format!("unknown command: :{other}")),
    }
    Ok(Flow::Continue)
}

fn parse_slot(arg: Option<&str>) -> Result<u32, String> {
    arg.ok_or("missing slot number")?
        .parse()
        .map_err(|_| "slot must be a number".to_string())
}

fn report<T>(result: Result<T, nv_session::SessionError>, session: &mut NovelSession) {
    match result {
        Ok(_) => render(session),
        Err(e) => println!("  {}", e.to_string().red()),
    }
}

/// Print notifications, handle events and show what is on screen.
fn render(session: &mut NovelSession) {
    for notification in session.drain_notifications() {
        print_notification(&notification);
    }

    let mut effect_ended = false;
    for event in session.drain_events() {
        match event {
            StoryEvent::TitleEffectEnd { effect } => {
                tracing::debug!(%effect, "title exit effect");
                effect_ended = true;
            }
            StoryEvent::AudioPaused | StoryEvent::AudioResumed => {}
            StoryEvent::CharactersLoaded(ids) => tracing::debug!(?ids, "characters loaded"),
            StoryEvent::Completed => {}
        }
    }
    if effect_ended {
        // Nothing to animate in a terminal.
        report(session.acknowledge_title_effect(), session);
        return;
    }

    let p = session.presentation();
    match session.status() {
        Status::Dialogue => {
            let fresh: String = p.line().chars().skip(p.printed_len).collect();
            if p.printed_len > 0 {
                println!("  {fresh}");
            } else if p.speaker.is_empty() {
                println!("  {}", fresh.italic());
            } else {
                println!("  {}: {fresh}", p.speaker.cyan().bold());
            }
        }
        Status::Titles { .. } => {
            if let Some(title) = &p.title {
                println!("\n  {}\n", format!("== {} ==", title.text).bold());
            }
        }
        Status::Choice => {
            if !p.line().is_empty() {
                println!("  {}", p.line());
            }
            for (i, choice) in p.choices.iter().enumerate() {
                println!("  {} {choice}", format!("{})", i + 1).bold());
            }
        }
        Status::Input => {
            if let Some(input) = &p.input {
                println!("  {} {}", input.text, format!("[{}]", input.initial).dimmed());
            }
        }
        Status::Halted(reason) => {
            println!("  {} {reason}", "HALTED".red().bold());
        }
        Status::NotStarted | Status::Completed => {}
    }
}

fn print_notification(notification: &Notification) {
    let label = format!("[{}]", notification.severity);
    let label: ColoredString = match notification.severity {
        Severity::Info => label.blue(),
        Severity::Success => label.green(),
        Severity::Warning => label.yellow(),
        Severity::Danger => label.red().bold(),
    };
    println!("  {label} {}", notification.text);
}
